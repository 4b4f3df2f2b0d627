use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use swarm_config::PIECE_SIZE;
use swarm_core::helpers::piece_offset;

use crate::entities::FileMap;
use crate::LOGGER;

/// Accept loop of the piece server. One thread per inbound peer; the loop
/// exits on the first accept after `running` is cleared.
pub fn serve_peers(
    listener: TcpListener,
    files: Arc<Mutex<FileMap>>,
    running: Arc<AtomicBool>,
) -> io::Result<()> {
    for stream in listener.incoming() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        match stream {
            Ok(stream) => {
                let files = files.clone();
                thread::spawn(move || {
                    let peer = stream
                        .peer_addr()
                        .map(|addr| addr.to_string())
                        .unwrap_or_default();
                    if let Err(e) = handle_peer(stream, files) {
                        LOGGER.error(format!("serving {} failed: {}", peer, e));
                    }
                });
            }
            Err(e) => {
                LOGGER.error(e);
            }
        }
    }
    Ok(())
}

/// Unblock an accept loop so it notices a cleared `running` flag.
pub fn wake_acceptor(addr: SocketAddr) {
    let _ = TcpStream::connect(addr);
}

/// One peer connection: an ordered sequence of GET_BITVECTOR and GET_PIECE
/// requests, one text line each, until the peer hangs up.
fn handle_peer(stream: TcpStream, files: Arc<Mutex<FileMap>>) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        let args: Vec<&str> = line.split_whitespace().collect();
        if args.is_empty() {
            continue;
        }

        match args[0] {
            "GET_BITVECTOR" if args.len() >= 3 => {
                let response = bitvector_response(&files, args[1], args[2]);
                writer.write_all(response.as_bytes())?;
            }
            "GET_PIECE" if args.len() >= 4 => {
                // 4-byte little-endian length, then the body. Zero length
                // means the piece is not available here.
                let body = read_local_piece(&files, args[1], args[2], args[3]);
                writer.write_all(&(body.len() as u32).to_le_bytes())?;
                writer.write_all(&body)?;
            }
            _ => continue,
        }
    }
    Ok(())
}

fn bitvector_response(files: &Arc<Mutex<FileMap>>, group_id: &str, filename: &str) -> String {
    let files = files.lock().unwrap();
    match files.get(group_id).and_then(|group| group.get(filename)) {
        Some(info) => {
            let mut response = String::from("BITVECTOR:");
            for bit in &info.bit_vector {
                response.push_str(if *bit { " 1" } else { " 0" });
            }
            response
        }
        None => String::from("ERROR: File not found"),
    }
}

/// The bytes of one piece, or empty when the request cannot be served:
/// unknown file, unparseable or out-of-range index, a bit-vector that says
/// absent, or a backing file that will not open.
fn read_local_piece(
    files: &Arc<Mutex<FileMap>>,
    group_id: &str,
    filename: &str,
    index: &str,
) -> Vec<u8> {
    let piece: u32 = match index.parse() {
        Ok(piece) => piece,
        Err(_) => return Vec::new(),
    };

    // Take what we need from the map, then read the disk outside the lock.
    let filepath = {
        let files = files.lock().unwrap();
        match files.get(group_id).and_then(|group| group.get(filename)) {
            Some(info) if info.bit_vector.get(piece as usize).copied().unwrap_or(false) => {
                info.filepath.clone()
            }
            _ => return Vec::new(),
        }
    };

    match read_piece_from_disk(&filepath, piece) {
        Ok(body) => body,
        Err(e) => {
            LOGGER.error(format!(
                "cannot read piece {} of {}: {}",
                piece,
                filepath.display(),
                e
            ));
            Vec::new()
        }
    }
}

/// Short reads on the final piece are returned honestly.
fn read_piece_from_disk(path: &Path, piece: u32) -> io::Result<Vec<u8>> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(piece_offset(piece)))?;
    let mut body = Vec::with_capacity(PIECE_SIZE);
    file.take(PIECE_SIZE as u64).read_to_end(&mut body)?;
    Ok(body)
}
