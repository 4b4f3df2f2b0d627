use std::net::SocketAddr;

#[derive(Debug)]
/// One probed download source: its endpoint, the pieces it advertises, and
/// the pieces the partition step handed to it.
pub struct SourceInfo {
    pub addr: SocketAddr,
    pub bit_vector: Vec<bool>,
    pub assigned_pieces: Vec<u32>,
}

impl SourceInfo {
    pub fn new(addr: SocketAddr, bit_vector: Vec<bool>) -> Self {
        SourceInfo {
            addr,
            bit_vector,
            assigned_pieces: Vec::new(),
        }
    }

    /// A bit-vector shorter than the piece count means the source never
    /// advertised the tail; those pieces count as absent.
    pub fn has_piece(&self, piece: u32) -> bool {
        self.bit_vector.get(piece as usize).copied().unwrap_or(false)
    }
}
