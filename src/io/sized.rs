use std::fs::File;
use std::io::Read;

/// A reader that knows its total size up front (a file, a tar entry). Gzip
/// and counting readers deliberately do not implement this: their length
/// isn't known until EOF, so display code should treat its absence as
/// "unknown total".
pub trait SizedRead: Read {
    fn total_size(&self) -> Option<u64>;
}

impl SizedRead for File {
    fn total_size(&self) -> Option<u64> {
        self.metadata().ok().map(|m| m.len())
    }
}
