pub mod archive;
pub mod file;
pub mod pipe;
pub mod raw;

use std::fs::File;
use std::io::{self, Read, Write};

use crate::error::Result;
use crate::manifest::Component;
use pipe::{Fsync, PipeOptions};

/// A single installation target type, selected via `supports()` by the
/// ordered registry in `default_strategies()`.
pub trait InstallerStrategy {
    fn supports(&self, comp: &Component) -> bool;
    fn install(
        &self,
        comp: &Component,
        reader: &mut dyn Read,
        opt: &PipeOptions<'_>,
        tag: &str,
    ) -> Result<()>;
}

/// Fixed dispatch order: raw, then archive, then file. The first strategy
/// whose `supports()` predicate matches wins.
pub fn default_strategies() -> Vec<Box<dyn InstallerStrategy>> {
    vec![
        Box::new(raw::RawInstaller),
        Box::new(archive::ArchiveInstaller::default()),
        Box::new(file::FileInstaller),
    ]
}

/// Adapts a plain `File` to the `Fsync` contract the pipe helper needs.
pub struct FileWriter(pub File);

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}

impl Fsync for FileWriter {
    fn fsync_now(&mut self) -> io::Result<()> {
        self.0.sync_all()
    }
}

pub(crate) fn with_tmp_extension(path: &std::path::Path) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    std::path::PathBuf::from(os)
}
