//! Incremental SHA-256 and the reader/writer wrappers used to compute a
//! digest while bytes are otherwise being copied somewhere.

use std::io::{self, Read, Write};

use sha2::{Digest, Sha256};

use crate::error::Result;

/// Incremental hasher. `final_hex` may only be called once; subsequent
/// calls return an empty string as a sentinel, mirroring the grounded
/// checksum module's one-shot finalize contract.
pub struct IncrementalSha256 {
    inner: Option<Sha256>,
}

impl Default for IncrementalSha256 {
    fn default() -> Self {
        Self::new()
    }
}

impl IncrementalSha256 {
    pub fn new() -> Self {
        Self {
            inner: Some(Sha256::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        if let Some(h) = self.inner.as_mut() {
            h.update(data);
        }
    }

    pub fn final_hex(&mut self) -> String {
        match self.inner.take() {
            Some(h) => hex::encode(h.finalize()),
            None => String::new(),
        }
    }
}

/// A `Read` wrapper that feeds every byte pulled through it into a SHA-256
/// hasher. Call `finalize_hex()` once the underlying stream is exhausted.
pub struct Sha256Reader<R> {
    inner: R,
    hasher: IncrementalSha256,
}

impl<R: Read> Sha256Reader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: IncrementalSha256::new(),
        }
    }

    pub fn finalize_hex(&mut self) -> String {
        self.hasher.final_hex()
    }
}

impl<R: Read> Read for Sha256Reader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
        }
        Ok(n)
    }
}

/// A `Write` wrapper that feeds every byte written through it into a
/// SHA-256 hasher before forwarding to the inner writer.
pub struct Sha256Writer<W> {
    inner: W,
    hasher: IncrementalSha256,
}

impl<W: Write> Sha256Writer<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: IncrementalSha256::new(),
        }
    }

    pub fn finalize_hex(&mut self) -> String {
        self.hasher.final_hex()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for Sha256Writer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
        }
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Hashes an entire reader, consuming it, and returns the lowercase hex
/// digest.
pub fn sha256_hex_of_reader<R: Read>(mut reader: R) -> Result<String> {
    let mut hasher = IncrementalSha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.final_hex())
}

/// Case-insensitive digest comparison, matching the staging verifier's
/// lowercase/lowercase compare.
pub fn digests_equal(expected: &str, actual: &str) -> bool {
    expected.eq_ignore_ascii_case(actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn known_vector() {
        // sha256("") == e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855
        let digest = sha256_hex_of_reader(Cursor::new(b"")).unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn hello_vector() {
        let digest = sha256_hex_of_reader(Cursor::new(b"hello")).unwrap();
        assert_eq!(
            digest,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn final_hex_is_one_shot() {
        let mut h = IncrementalSha256::new();
        h.update(b"x");
        let first = h.final_hex();
        assert!(!first.is_empty());
        assert_eq!(h.final_hex(), "");
    }

    #[test]
    fn case_insensitive_compare() {
        assert!(digests_equal("ABCD", "abcd"));
        assert!(!digests_equal("abcd", "abce"));
    }

    #[test]
    fn reader_wrapper_matches_direct_hash() {
        let direct = sha256_hex_of_reader(Cursor::new(b"streamed bytes")).unwrap();
        let mut wrapped = Sha256Reader::new(Cursor::new(b"streamed bytes"));
        let mut sink = Vec::new();
        io::copy(&mut wrapped, &mut sink).unwrap();
        assert_eq!(wrapped.finalize_hex(), direct);
    }
}
