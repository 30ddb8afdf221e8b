use std::fmt;
use std::io::{self, BufReader, Read};

use flate2::read::MultiGzDecoder;

/// Transparent gzip decompression over an arbitrary reader. Uses
/// `MultiGzDecoder` rather than a single-member decoder so a component
/// whose `.gz` entry concatenates several gzip members still decodes to one
/// logical stream with EOF only at the true end.
pub struct GzipReader<R: Read> {
    inner: MultiGzDecoder<BufReader<R>>,
    started: bool,
}

impl<R: Read> GzipReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner: MultiGzDecoder::new(BufReader::with_capacity(16 * 1024, inner)),
            started: false,
        }
    }
}

impl<R: Read> Read for GzipReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.inner.read(buf) {
            Ok(n) => {
                if n > 0 {
                    self.started = true;
                }
                Ok(n)
            }
            Err(e) => Err(tag_error(e, self.started)),
        }
    }
}

/// Tags an `io::Error` as originating from gzip decoding so the crate-wide
/// `From<io::Error>` conversion can surface it as `Error::GzipInit` or
/// `Error::GzipDecode` instead of a generic `Error::Io`. `init` is set when
/// no byte has been decoded yet (a malformed header); once decoding is
/// underway, a later failure is a decode error instead.
#[derive(Debug)]
pub(crate) struct GzipErrorTag {
    pub init: bool,
    pub message: String,
}

impl fmt::Display for GzipErrorTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for GzipErrorTag {}

fn tag_error(e: io::Error, started: bool) -> io::Error {
    io::Error::new(
        io::ErrorKind::Other,
        GzipErrorTag {
            init: !started,
            message: e.to_string(),
        },
    )
}

/// Recovers a `GzipErrorTag` from an `io::Error`, if it was produced by
/// `GzipReader`.
pub(crate) fn downcast(e: &io::Error) -> Option<&GzipErrorTag> {
    e.get_ref().and_then(|inner| inner.downcast_ref::<GzipErrorTag>())
}
