use swarm_core::utils::Logger;

pub mod entities;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod tracker_link;

pub static LOGGER: Logger = Logger::verbose("Peer");

//////////////////
/// TESTS
/////////////////


#[cfg(test)] //Functional tests
mod func_tests {
    use std::fs;
    use std::io::{Read, Write};
    use std::net::{SocketAddr, TcpListener, TcpStream};
    use std::path::PathBuf;
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, Mutex};
    use std::thread;

    use rand::Rng;
    use swarm_config::{BUFFER_SIZE, LOCALHOST};
    use swarm_core::helpers::create_buffer;

    use crate::entities::{FileMap, LocalFileInfo};
    use crate::{scheduler, service};

    fn temp_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("swarm_peer_{}_{}", tag, rand::random::<u64>()))
    }

    fn write_payload(tag: &str, len: usize) -> (PathBuf, Vec<u8>) {
        let mut payload = vec![0u8; len];
        rand::thread_rng().fill(&mut payload[..]);
        let path = temp_path(tag);
        fs::write(&path, &payload).unwrap();
        (path, payload)
    }

    fn start_source(entries: Vec<(&str, &str, LocalFileInfo)>) -> SocketAddr {
        let listener = TcpListener::bind((LOCALHOST, 0)).unwrap();
        let addr = listener.local_addr().unwrap();

        let mut files = FileMap::new();
        for (group_id, filename, info) in entries {
            files
                .entry(group_id.to_string())
                .or_default()
                .insert(filename.to_string(), info);
        }
        let files = Arc::new(Mutex::new(files));
        let running = Arc::new(AtomicBool::new(true));
        thread::spawn(move || {
            service::serve_peers(listener, files, running).unwrap();
        });
        addr
    }

    fn request_line(stream: &mut TcpStream, request: &str) -> String {
        stream
            .write_all(format!("{}\n", request).as_bytes())
            .unwrap();
        let mut buf = create_buffer(BUFFER_SIZE);
        let size = stream.read(&mut buf).unwrap();
        String::from_utf8_lossy(&buf[..size]).into_owned()
    }

    fn request_piece(stream: &mut TcpStream, group_id: &str, filename: &str, piece: u32) -> Vec<u8> {
        stream
            .write_all(format!("GET_PIECE {} {} {}\n", group_id, filename, piece).as_bytes())
            .unwrap();
        let mut header = [0u8; 4];
        stream.read_exact(&mut header).unwrap();
        let mut body = vec![0u8; u32::from_le_bytes(header) as usize];
        stream.read_exact(&mut body).unwrap();
        body
    }

    #[test]
    fn test_bitvector_request() {
        let (path, _) = write_payload("bitvec", 12345);
        let info = LocalFileInfo::with_pieces(path.clone(), 12345, vec![true, true, false]);
        let addr = start_source(vec![("g", "a.dat", info)]);

        let mut stream = TcpStream::connect(addr).unwrap();
        assert_eq!(
            request_line(&mut stream, "GET_BITVECTOR g a.dat"),
            "BITVECTOR: 1 1 0"
        );
        assert_eq!(
            request_line(&mut stream, "GET_BITVECTOR g ghost.dat"),
            "ERROR: File not found"
        );

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_piece_requests_over_one_connection() {
        let (path, payload) = write_payload("pieces", 12345);
        let info = LocalFileInfo::complete(path.clone(), 12345);
        let addr = start_source(vec![("g", "a.dat", info)]);

        let mut stream = TcpStream::connect(addr).unwrap();
        assert_eq!(request_piece(&mut stream, "g", "a.dat", 0), &payload[..5120]);
        assert_eq!(request_piece(&mut stream, "g", "a.dat", 1), &payload[5120..10240]);
        // The final piece comes back short, exactly as long as what is left.
        assert_eq!(request_piece(&mut stream, "g", "a.dat", 2), &payload[10240..]);
        // Out of range means a zero-length reply.
        assert!(request_piece(&mut stream, "g", "a.dat", 9).is_empty());

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_piece_marked_absent_is_refused() {
        let (path, _) = write_payload("absent", 12345);
        let info = LocalFileInfo::with_pieces(path.clone(), 12345, vec![true, false, true]);
        let addr = start_source(vec![("g", "a.dat", info)]);

        // The bytes exist on disk, but the bit-vector is authoritative.
        let mut stream = TcpStream::connect(addr).unwrap();
        assert!(request_piece(&mut stream, "g", "a.dat", 1).is_empty());
        assert!(!request_piece(&mut stream, "g", "a.dat", 2).is_empty());

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_two_peer_exchange_is_byte_identical() {
        let (path, payload) = write_payload("exchange_src", 12345);
        let addr = start_source(vec![("g", "a.dat", LocalFileInfo::complete(path.clone(), 12345))]);

        let dest = temp_path("exchange_dst");
        let done = scheduler::download_file("g", "a.dat", &dest, &[addr], 12345, 3).unwrap();

        assert_eq!(done, vec![true, true, true]);
        assert_eq!(fs::read(&dest).unwrap(), payload);

        let _ = fs::remove_file(path);
        let _ = fs::remove_file(dest);
    }

    #[test]
    fn test_partial_sources_cover_the_whole_file() {
        // 4 pieces, the last one short. Each source holds half the pieces.
        let (path_a, payload) = write_payload("partial_a", 20000);
        let path_b = temp_path("partial_b");
        fs::write(&path_b, &payload).unwrap();

        let first = start_source(vec![(
            "g",
            "a.dat",
            LocalFileInfo::with_pieces(path_a.clone(), 20000, vec![true, false, true, false]),
        )]);
        let second = start_source(vec![(
            "g",
            "a.dat",
            LocalFileInfo::with_pieces(path_b.clone(), 20000, vec![false, true, false, true]),
        )]);

        let dest = temp_path("partial_dst");
        let done =
            scheduler::download_file("g", "a.dat", &dest, &[first, second], 20000, 4).unwrap();

        assert!(done.iter().all(|bit| *bit));
        assert_eq!(fs::read(&dest).unwrap(), payload);

        let _ = fs::remove_file(path_a);
        let _ = fs::remove_file(path_b);
        let _ = fs::remove_file(dest);
    }

    #[test]
    fn test_zero_size_file_completes_without_sources() {
        let dest = temp_path("zero_dst");
        let done = scheduler::download_file("g", "empty.dat", &dest, &[], 0, 0).unwrap();

        assert!(done.is_empty());
        assert_eq!(fs::metadata(&dest).unwrap().len(), 0);

        let _ = fs::remove_file(dest);
    }

    #[test]
    fn test_download_fails_with_no_usable_source() {
        // An endpoint nobody listens on any more.
        let dead = {
            let listener = TcpListener::bind((LOCALHOST, 0)).unwrap();
            listener.local_addr().unwrap()
        };

        let dest = temp_path("dead_dst");
        let result = scheduler::download_file("g", "a.dat", &dest, &[dead], 12345, 3);
        assert!(result.is_err());

        let _ = fs::remove_file(dest);
    }

    #[test]
    fn test_orphan_piece_stays_missing() {
        // The only source lacks piece 1; the download degrades instead of
        // failing outright.
        let (path, payload) = write_payload("orphan", 6000);
        let addr = start_source(vec![(
            "g",
            "a.dat",
            LocalFileInfo::with_pieces(path.clone(), 6000, vec![true, false]),
        )]);

        let dest = temp_path("orphan_dst");
        let done = scheduler::download_file("g", "a.dat", &dest, &[addr], 6000, 2).unwrap();

        assert_eq!(done, vec![true, false]);
        let written = fs::read(&dest).unwrap();
        assert_eq!(written.len(), 6000);
        assert_eq!(&written[..5120], &payload[..5120]);

        let _ = fs::remove_file(path);
        let _ = fs::remove_file(dest);
    }
}
