use std::fs::OpenOptions;
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};
use crate::manifest::{Component, ComponentType};

use super::pipe::{pipe_reader_to_writer, PipeOptions};
use super::{FileWriter, InstallerStrategy};

/// Pipes the component's payload directly onto a block device (or, for
/// tests/non-device paths, a regular file opened with create+truncate).
pub struct RawInstaller;

impl InstallerStrategy for RawInstaller {
    fn supports(&self, comp: &Component) -> bool {
        comp.kind == ComponentType::Raw
    }

    fn install(
        &self,
        comp: &Component,
        reader: &mut dyn Read,
        opt: &PipeOptions<'_>,
        tag: &str,
    ) -> Result<()> {
        if comp.install_to.is_empty() {
            return Err(Error::Schema("raw component missing install_to".into()));
        }
        let target = Path::new(&comp.install_to);
        let file = if target.starts_with("/dev/") {
            OpenOptions::new().write(true).open(target)?
        } else {
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(target)?
        };
        pipe_reader_to_writer(reader, FileWriter(file), tag, opt)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn pipes_into_regular_file_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("partition.img");
        let comp = Component {
            name: "part".into(),
            kind: ComponentType::Raw,
            filename: "part.img".into(),
            size: 5,
            sha256: String::new(),
            version: "0.0.0".into(),
            force: false,
            install_to: target.to_string_lossy().into_owned(),
            path: String::new(),
            permissions: String::new(),
            create_destination: false,
        };
        let opt = PipeOptions::default();
        RawInstaller
            .install(&comp, &mut Cursor::new(b"hello".to_vec()), &opt, "part")
            .unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"hello");
    }

    #[test]
    fn rejects_missing_install_to() {
        let comp = Component {
            name: "part".into(),
            kind: ComponentType::Raw,
            filename: "part.img".into(),
            size: 0,
            sha256: String::new(),
            version: "0.0.0".into(),
            force: false,
            install_to: String::new(),
            path: String::new(),
            permissions: String::new(),
            create_destination: false,
        };
        let opt = PipeOptions::default();
        let err = RawInstaller
            .install(&comp, &mut Cursor::new(Vec::new()), &opt, "part")
            .unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }
}
