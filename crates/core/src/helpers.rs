use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::net::SocketAddr;
use std::path::Path;
use std::str::FromStr;

use swarm_config::PIECE_SIZE;

/// How many pieces a file of `file_size` bytes splits into. A size of zero
/// yields zero pieces.
pub fn piece_count(file_size: u64) -> u32 {
    ((file_size + PIECE_SIZE as u64 - 1) / PIECE_SIZE as u64) as u32
}

/// Byte offset of piece `index` inside its file.
pub fn piece_offset(index: u32) -> u64 {
    index as u64 * PIECE_SIZE as u64
}

/// Length of piece `index` in a file of `file_size` bytes. The final piece
/// is short when the size is not a multiple of `PIECE_SIZE`.
pub fn piece_len(index: u32, file_size: u64) -> usize {
    let start = piece_offset(index);
    std::cmp::min(PIECE_SIZE as u64, file_size.saturating_sub(start)) as usize
}

pub fn create_buffer(size: usize) -> Vec<u8> {
    vec![0u8; size]
}

/// Basename of a path given as a raw string. Both separators count, the
/// command surface accepts Windows-style paths too.
pub fn base_name(filepath: &str) -> &str {
    match filepath.rfind(|c| c == '/' || c == '\\') {
        Some(pos) => &filepath[pos + 1..],
        None => filepath,
    }
}

/// Parse an `<ip>:<port>` endpoint.
pub fn parse_endpoint(addr: &str) -> io::Result<SocketAddr> {
    SocketAddr::from_str(addr.trim()).map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("invalid endpoint '{}': {}", addr.trim(), e),
        )
    })
}

/// Read the `ordinal`-th line (1-based) of the trackers file and parse it as
/// an endpoint.
pub fn read_tracker_line(path: &Path, ordinal: usize) -> io::Result<SocketAddr> {
    if ordinal == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "tracker ordinal starts at 1",
        ));
    }
    let file = File::open(path)?;
    let line = BufReader::new(file)
        .lines()
        .nth(ordinal - 1)
        .transpose()?
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("trackers file has no line {}", ordinal),
            )
        })?;
    parse_endpoint(&line)
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_piece_count_boundaries() {
        assert_eq!(piece_count(0), 0);
        assert_eq!(piece_count(1), 1);
        assert_eq!(piece_count(5120), 1);
        assert_eq!(piece_count(5121), 2);
        assert_eq!(piece_count(12345), 3);
    }

    #[test]
    fn test_piece_len_last_piece_short() {
        assert_eq!(piece_len(0, 12345), 5120);
        assert_eq!(piece_len(1, 12345), 5120);
        assert_eq!(piece_len(2, 12345), 2105);
        assert_eq!(piece_len(0, 5120), 5120);
        assert_eq!(piece_len(1, 5121), 1);
    }

    #[test]
    fn test_piece_len_past_end_is_zero() {
        assert_eq!(piece_len(3, 12345), 0);
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("dir/sub/file.dat"), "file.dat");
        assert_eq!(base_name("dir\\file.dat"), "file.dat");
        assert_eq!(base_name("file.dat"), "file.dat");
    }

    #[test]
    fn test_parse_endpoint() {
        let addr = parse_endpoint("127.0.0.1:6000").unwrap();
        assert_eq!(addr.port(), 6000);
        assert!(parse_endpoint("nonsense").is_err());
        assert!(parse_endpoint("127.0.0.1").is_err());
    }
}
