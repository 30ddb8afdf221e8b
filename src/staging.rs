//! Stages a bundle entry to a local temp file while computing its digest,
//! verifies it against the expected value, then hands back a fresh reader
//! over the staged bytes.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use tempfile::NamedTempFile;

use crate::digest::IncrementalSha256;
use crate::error::{Error, Result};
use crate::io::SizedRead;

/// Owns the staged temp file; the file is unlinked when this value drops.
pub struct StagedEntry {
    _temp: NamedTempFile,
    file: File,
    size: u64,
}

impl Read for StagedEntry {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl SizedRead for StagedEntry {
    fn total_size(&self) -> Option<u64> {
        Some(self.size)
    }
}

/// Copies `source` into a fresh temp file (mode 0600) while hashing it,
/// fails on a digest mismatch, and returns a reader reopened at the start
/// of the staged contents.
pub fn stage_and_verify<R: Read>(mut source: R, expected_sha256: &str) -> Result<StagedEntry> {
    if expected_sha256.is_empty() {
        return Err(Error::EmptyDigest);
    }

    let mut temp = new_private_temp_file()?;
    let mut hasher = IncrementalSha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut size: u64 = 0;
    loop {
        let n = source.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        temp.write_all_to(&buf[..n])?;
        size += n as u64;
    }
    temp.sync_and_rewind()?;

    let actual = hasher.final_hex();
    if !crate::digest::digests_equal(expected_sha256, &actual) {
        return Err(Error::DigestMismatch {
            expected: expected_sha256.to_string(),
            actual,
        });
    }

    let file = temp.reopen_for_read()?;
    Ok(StagedEntry {
        _temp: temp.into_inner(),
        file,
        size,
    })
}

/// Thin helper around `NamedTempFile` so `stage_and_verify` above reads
/// linearly instead of juggling raw file handles.
struct PrivateTempFile(NamedTempFile);

fn new_private_temp_file() -> Result<PrivateTempFile> {
    let temp = tempfile::Builder::new()
        .prefix(".ota-staging-")
        .tempfile()
        .map_err(Error::Io)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(temp.path(), perms)?;
    }
    Ok(PrivateTempFile(temp))
}

impl PrivateTempFile {
    fn write_all_to(&mut self, data: &[u8]) -> io::Result<()> {
        use std::io::Write;
        self.0.as_file_mut().write_all(data)
    }

    fn sync_and_rewind(&mut self) -> io::Result<()> {
        self.0.as_file_mut().sync_all()?;
        self.0.as_file_mut().seek(SeekFrom::Start(0))?;
        Ok(())
    }

    fn reopen_for_read(&self) -> io::Result<File> {
        self.0.reopen()
    }

    fn into_inner(self) -> NamedTempFile {
        self.0
    }
}
