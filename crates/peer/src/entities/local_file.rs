use std::collections::BTreeMap;
use std::path::PathBuf;

use swarm_core::helpers::piece_count;

// group_id -> filename -> what this peer holds
pub type FileMap = BTreeMap<String, BTreeMap<String, LocalFileInfo>>;

#[derive(Debug, Clone)]
/// One locally held file. `bit_vector[i]` is true iff piece `i` is fully
/// present on disk at its expected offset in `filepath`.
pub struct LocalFileInfo {
    pub filepath: PathBuf,
    pub file_size: u64,
    pub num_pieces: u32,
    pub bit_vector: Vec<bool>,
}

impl LocalFileInfo {
    /// A file this peer holds in full.
    pub fn complete(filepath: PathBuf, file_size: u64) -> Self {
        let num_pieces = piece_count(file_size);
        LocalFileInfo {
            filepath,
            file_size,
            num_pieces,
            bit_vector: vec![true; num_pieces as usize],
        }
    }

    /// A file with only some pieces present, as left behind by an
    /// interrupted download.
    pub fn with_pieces(filepath: PathBuf, file_size: u64, bit_vector: Vec<bool>) -> Self {
        LocalFileInfo {
            filepath,
            file_size,
            num_pieces: piece_count(file_size),
            bit_vector,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.bit_vector.iter().all(|bit| *bit)
    }
}
