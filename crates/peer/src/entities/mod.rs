mod local_file;
mod source;

pub use local_file::{FileMap, LocalFileInfo};
pub use source::SourceInfo;
