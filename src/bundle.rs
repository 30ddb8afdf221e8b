//! One-pass reader over the outer OTA bundle tar stream.
//!
//! States: `closed -> open -> (in_entry <-> between_entries) -> eof`. Only
//! regular-file entries are surfaced; directories, symlinks, and other
//! special entries are silently skipped while scanning for the next one.
//!
//! `OtaBundleReader` itself implements `std::io::Read`, reading from
//! whichever entry is currently open; `&mut OtaBundleReader<R>` therefore
//! works anywhere a `Read` is expected (std's blanket `impl Read for &mut
//! R`), without needing a separate borrowed sub-reader type. This also
//! means the borrow checker — not a runtime check — prevents two live
//! sub-readers over the same bundle from existing at once.

use std::io::{self, Read};
use std::path::Path;

use crate::error::{Error, Result};
use crate::io::SizedRead;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleEntryInfo {
    pub name: String,
    pub size: u64,
}

/// Self-referential by construction: `entries` borrows `archive`, and the
/// `Entry` objects `next()` hands out borrow `entries`. We box `archive` so
/// its heap address is stable and transmute the entries iterator's lifetime
/// to `'static`; soundness relies on field declaration order (below) making
/// `entries`/`current` drop before `archive` does, and on neither `archive`
/// nor this struct being moved out from under the box (a `Box<T>` move
/// relocates the pointer, not the heap allocation it points to, so this
/// holds even if `OtaBundleReader` itself is moved).
pub struct OtaBundleReader<R: Read> {
    current: Option<tar::Entry<'static, R>>,
    current_size: Option<u64>,
    entries: Option<tar::Entries<'static, R>>,
    _archive: Box<tar::Archive<R>>,
    in_entry: bool,
    eof: bool,
}

impl<R: Read> OtaBundleReader<R> {
    pub fn open(reader: R) -> Result<Self> {
        let mut archive = Box::new(tar::Archive::new(reader));
        let entries = archive
            .entries()
            .map_err(|e| Error::BundleOpen(e.to_string()))?;
        // SAFETY: see struct doc comment.
        let entries: tar::Entries<'static, R> = unsafe { std::mem::transmute(entries) };
        Ok(Self {
            current: None,
            current_size: None,
            entries: Some(entries),
            _archive: archive,
            in_entry: false,
            eof: false,
        })
    }

    /// Advances to the next regular-file entry, or `None` at bundle EOF.
    /// Fails if the previously returned entry was not fully consumed or
    /// explicitly skipped.
    pub fn next(&mut self) -> Result<Option<BundleEntryInfo>> {
        if self.in_entry {
            return Err(Error::EntryNotFinished);
        }
        if self.eof {
            return Ok(None);
        }
        let entries = self
            .entries
            .as_mut()
            .expect("entries iterator present while open");
        loop {
            match entries.next() {
                None => {
                    self.eof = true;
                    return Ok(None);
                }
                Some(Err(e)) => return Err(Error::BundleOpen(e.to_string())),
                Some(Ok(entry)) => {
                    if !entry.header().entry_type().is_file() {
                        continue;
                    }
                    let name = entry_name(&entry)?;
                    let size = entry.header().size().unwrap_or(0);
                    self.current = Some(entry);
                    self.current_size = Some(size);
                    self.in_entry = true;
                    return Ok(Some(BundleEntryInfo { name, size }));
                }
            }
        }
    }

    /// Discards the remainder of the current entry without reading it.
    /// Safe to call even if the entry has already been fully read.
    pub fn skip_current(&mut self) {
        self.current = None;
        self.current_size = None;
        self.in_entry = false;
    }

    /// Reads the current entry fully into a UTF-8 string (used for the
    /// manifest, whose size is bounded by the bundle itself).
    pub fn read_current_to_string(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        self.read_to_end(&mut buf)?;
        String::from_utf8(buf).map_err(|e| Error::Schema(format!("invalid utf-8: {e}")))
    }
}

fn entry_name<R: Read>(entry: &tar::Entry<'_, R>) -> Result<String> {
    let path = entry
        .path()
        .map_err(|e| Error::BundleOpen(format!("invalid entry path: {e}")))?;
    Ok(path.to_string_lossy().into_owned())
}

impl<R: Read> Read for OtaBundleReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(entry) = self.current.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "no current bundle entry is open",
            ));
        };
        let n = entry.read(buf)?;
        if n == 0 {
            self.in_entry = false;
            self.current_size = None;
        }
        Ok(n)
    }
}

impl<R: Read> SizedRead for OtaBundleReader<R> {
    /// The current entry's declared tar header size, or `None` if no entry
    /// is open. Declared, not remaining: this is the entry's total length,
    /// matching the `total_size()` contract for a reader that knows its
    /// length "up front".
    fn total_size(&self) -> Option<u64> {
        self.current_size
    }
}

/// True when `path` (after the caller's own normalization) names the
/// manifest entry.
pub fn is_manifest_name(path: &str) -> bool {
    Path::new(path) == Path::new("manifest.json")
}
