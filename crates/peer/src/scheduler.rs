use std::fs::OpenOptions;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::Path;
use std::sync::{Arc, Mutex};

use swarm_config::{BUFFER_SIZE, PIECE_SIZE};
use swarm_core::helpers::{create_buffer, piece_offset};
use threadpool::ThreadPool;

use crate::entities::SourceInfo;
use crate::LOGGER;

/// Ask one candidate for its bit-vector. A source that cannot be reached
/// or answers with anything but a non-empty bit-vector is discarded.
pub fn probe_source(addr: SocketAddr, group_id: &str, filename: &str) -> Option<SourceInfo> {
    let mut stream = match TcpStream::connect(addr) {
        Ok(stream) => stream,
        Err(e) => {
            LOGGER.debug(format!("probe: connect {} failed: {}", addr, e));
            return None;
        }
    };
    let request = format!("GET_BITVECTOR {} {}\n", group_id, filename);
    if stream.write_all(request.as_bytes()).is_err() {
        return None;
    }

    let mut buf = create_buffer(BUFFER_SIZE);
    let size = stream.read(&mut buf).ok()?;
    let response = String::from_utf8_lossy(&buf[..size]);
    let bits = parse_bitvector(&response)?;
    if bits.is_empty() {
        return None;
    }
    LOGGER.debug(format!("probe: {} advertises {} pieces", addr, bits.len()));
    Some(SourceInfo::new(addr, bits))
}

pub(crate) fn parse_bitvector(response: &str) -> Option<Vec<bool>> {
    let rest = response.strip_prefix("BITVECTOR:")?;
    Some(rest.split_whitespace().map(|token| token == "1").collect())
}

/// Round-robin partition with availability fallback. Piece `p` goes to the
/// first of `sources[(p + k) % n]`, `k = 0, 1, ...`, that advertises it.
/// Returns how many pieces no source could provide.
pub fn assign_pieces_round_robin(sources: &mut [SourceInfo], num_pieces: u32) -> u32 {
    if sources.is_empty() {
        return num_pieces;
    }
    let n = sources.len();
    let mut unassigned = 0;
    for piece in 0..num_pieces {
        let mut placed = false;
        for k in 0..n {
            let idx = (piece as usize + k) % n;
            if sources[idx].has_piece(piece) {
                sources[idx].assigned_pieces.push(piece);
                placed = true;
                break;
            }
        }
        if !placed {
            unassigned += 1;
        }
    }
    unassigned
}

/// Create the destination if needed and make sure it spans `file_size`
/// bytes. An existing longer file keeps its tail.
fn preallocate(dest: &Path, file_size: u64) -> io::Result<()> {
    let file = OpenOptions::new().write(true).create(true).open(dest)?;
    if file.metadata()?.len() < file_size {
        file.set_len(file_size)?;
    }
    Ok(())
}

/// Download `filename` into `dest` in parallel, one worker flow per source
/// that got pieces assigned. Returns the per-piece success vector; the
/// caller decides what a partial result means.
pub fn download_file(
    group_id: &str,
    filename: &str,
    dest: &Path,
    candidates: &[SocketAddr],
    file_size: u64,
    num_pieces: u32,
) -> io::Result<Vec<bool>> {
    LOGGER.info(format!(
        "download: {} ({} bytes, {} pieces) from up to {} sources",
        filename,
        file_size,
        num_pieces,
        candidates.len()
    ));

    // A zero-piece file completes without touching the network.
    if num_pieces == 0 {
        OpenOptions::new().write(true).create(true).open(dest)?;
        return Ok(Vec::new());
    }

    let mut sources: Vec<SourceInfo> = candidates
        .iter()
        .filter_map(|addr| probe_source(*addr, group_id, filename))
        .collect();
    if sources.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            "no source answered with a usable bit-vector",
        ));
    }

    let unassigned = assign_pieces_round_robin(&mut sources, num_pieces);
    if unassigned > 0 {
        LOGGER.warn(format!(
            "download: {} of {} pieces held by no source, the copy will be incomplete",
            unassigned, num_pieces
        ));
    }

    preallocate(dest, file_size)?;

    let piece_done = Arc::new(Mutex::new(vec![false; num_pieces as usize]));
    let workers: Vec<SourceInfo> = sources
        .into_iter()
        .filter(|source| !source.assigned_pieces.is_empty())
        .collect();

    let pool = ThreadPool::new(workers.len().max(1));
    for source in workers {
        let group_id = group_id.to_string();
        let filename = filename.to_string();
        let dest = dest.to_path_buf();
        let piece_done = piece_done.clone();
        pool.execute(move || {
            let addr = source.addr;
            match fetch_assigned(&source, &group_id, &filename, &dest, piece_done) {
                Ok(_) => (),
                Err(e) => {
                    // The worker abandons its remaining pieces; they stay
                    // absent in the destination.
                    LOGGER.error(format!("download: worker for {} stopped early: {}", addr, e));
                }
            }
        });
    }
    pool.join();

    let done = piece_done.lock().unwrap().clone();
    Ok(done)
}

/// One worker: a fresh connection to its source, then each assigned piece
/// in order, written at its computed offset through a private handle.
fn fetch_assigned(
    source: &SourceInfo,
    group_id: &str,
    filename: &str,
    dest: &Path,
    piece_done: Arc<Mutex<Vec<bool>>>,
) -> io::Result<()> {
    let mut stream = TcpStream::connect(source.addr)?;
    let mut file = OpenOptions::new().write(true).open(dest)?;

    for &piece in &source.assigned_pieces {
        let request = format!("GET_PIECE {} {} {}\n", group_id, filename, piece);
        stream.write_all(request.as_bytes())?;

        let mut header = [0u8; 4];
        stream.read_exact(&mut header)?;
        let len = u32::from_le_bytes(header) as usize;
        if len == 0 {
            // The source cannot serve this one; the piece stays absent.
            LOGGER.debug(format!("download: {} has no piece {}", source.addr, piece));
            continue;
        }
        if len > PIECE_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} announced an oversized piece ({} bytes)", source.addr, len),
            ));
        }

        let mut body = vec![0u8; len];
        stream.read_exact(&mut body)?;

        file.seek(SeekFrom::Start(piece_offset(piece)))?;
        file.write_all(&body)?;
        piece_done.lock().unwrap()[piece as usize] = true;
        LOGGER.debug(format!(
            "download: piece {} from {} ({} bytes)",
            piece, source.addr, len
        ));
    }
    Ok(())
}
