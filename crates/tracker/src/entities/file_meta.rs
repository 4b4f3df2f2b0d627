#[derive(Debug)]
/// Placement metadata for one published file, registered at upload time.
pub struct FileMetadata {
    pub filename: String,
    pub file_size: u64,
    pub num_pieces: u32,
    /// Reserved for end-to-end integrity. Never populated yet.
    pub sha256_hash: Option<String>,
}

impl FileMetadata {
    pub fn new(filename: String, file_size: u64, num_pieces: u32) -> Self {
        FileMetadata {
            filename,
            file_size,
            num_pieces,
            sha256_hash: None,
        }
    }
}
