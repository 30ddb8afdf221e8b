pub mod counting;
pub mod gzip;
pub mod sized;

pub use counting::CountingReader;
pub use gzip::GzipReader;
pub use sized::SizedRead;
