pub const LOCALHOST: &str = "127.0.0.1";

/// Unit of transfer between peers. The final piece of a file is short
/// whenever the size is not a multiple of this.
pub const PIECE_SIZE: usize = 5120;

/// Read buffer for one textual request or response on either wire.
pub const BUFFER_SIZE: usize = 65536;
