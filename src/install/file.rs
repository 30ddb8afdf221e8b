use std::fs::{self, OpenOptions};
use std::io::Read;
use std::path::Path;

use crate::error::{Error, Result};
use crate::manifest::{Component, ComponentType};

use super::pipe::{pipe_reader_to_writer, PipeOptions};
use super::{with_tmp_extension, FileWriter, InstallerStrategy};

/// Atomically replaces a single regular file: write to `path.tmp`, fsync,
/// rename over `path`, then optionally chmod.
pub struct FileInstaller;

impl InstallerStrategy for FileInstaller {
    fn supports(&self, comp: &Component) -> bool {
        comp.kind == ComponentType::File
    }

    fn install(
        &self,
        comp: &Component,
        reader: &mut dyn Read,
        opt: &PipeOptions<'_>,
        tag: &str,
    ) -> Result<()> {
        if comp.path.is_empty() {
            return Err(Error::Schema("file component missing path".into()));
        }
        let path = Path::new(&comp.path);
        let parent = path.parent().filter(|p| !p.as_os_str().is_empty());

        if let Some(parent) = parent {
            if !parent.exists() {
                if !comp.create_destination {
                    return Err(Error::MissingDestinationDir {
                        path: parent.to_path_buf(),
                    });
                }
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = with_tmp_extension(path);
        let pipe_result: Result<()> = (|| {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;
            pipe_reader_to_writer(reader, FileWriter(file), tag, opt)?;
            Ok(())
        })();

        if let Err(e) = pipe_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(e);
        }

        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(Error::Io(e));
        }

        if !comp.permissions.is_empty() {
            let mode = u32::from_str_radix(&comp.permissions, 8)
                .map_err(|_| Error::InvalidPermissions(comp.permissions.clone()))?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn component(path: &Path, create_destination: bool, permissions: &str) -> Component {
        Component {
            name: "cfg".into(),
            kind: ComponentType::File,
            filename: "cfg.txt".into(),
            size: 0,
            sha256: String::new(),
            version: "0.0.0".into(),
            force: false,
            install_to: String::new(),
            path: path.to_string_lossy().into_owned(),
            permissions: permissions.to_string(),
            create_destination,
        }
    }

    #[test]
    fn atomic_install_leaves_no_tmp_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("cfg.txt");
        let comp = component(&target, false, "");
        let opt = PipeOptions::default();
        FileInstaller
            .install(&comp, &mut Cursor::new(b"version=42\n".to_vec()), &opt, "cfg")
            .unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"version=42\n");
        assert!(!with_tmp_extension(&target).exists());
    }

    #[test]
    fn fails_with_missing_parent_and_create_destination_false() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("new/dir/out");
        let comp = component(&target, false, "");
        let opt = PipeOptions::default();
        let err = FileInstaller
            .install(&comp, &mut Cursor::new(b"x".to_vec()), &opt, "cfg")
            .unwrap_err();
        assert!(matches!(err, Error::MissingDestinationDir { .. }));
    }

    #[test]
    fn creates_parent_when_requested() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("new/dir/out");
        let comp = component(&target, true, "");
        let opt = PipeOptions::default();
        FileInstaller
            .install(&comp, &mut Cursor::new(b"x".to_vec()), &opt, "cfg")
            .unwrap();
        assert!(target.exists());
    }

    #[test]
    fn applies_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out");
        let comp = component(&target, false, "600");
        let opt = PipeOptions::default();
        FileInstaller
            .install(&comp, &mut Cursor::new(b"x".to_vec()), &opt, "cfg")
            .unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&target).unwrap().permissions().mode() & 0o777;
            assert_eq!(mode, 0o600);
        }
    }

    #[test]
    fn rejects_invalid_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out");
        let comp = component(&target, false, "not-octal");
        let opt = PipeOptions::default();
        let err = FileInstaller
            .install(&comp, &mut Cursor::new(b"x".to_vec()), &opt, "cfg")
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPermissions(_)));
    }
}
