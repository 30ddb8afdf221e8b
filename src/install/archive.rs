use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::extract::{extract_to_dir, ExtractOptions};
use crate::manifest::{Component, ComponentType};
use crate::mount::{mount_device, NixSystemOps, DEFAULT_MOUNT_FLAGS};

use super::pipe::PipeOptions;
use super::InstallerStrategy;

enum ArchiveTarget {
    Device(PathBuf),
    Directory(PathBuf),
}

/// Resolution precedence: `install_to` wins only when it names a `/dev/`
/// path (then the archive is extracted into a mounted filesystem);
/// otherwise `path` wins if present; otherwise `install_to` is used as a
/// plain directory.
fn resolve_target(comp: &Component) -> Result<ArchiveTarget> {
    if !comp.install_to.is_empty() && Path::new(&comp.install_to).starts_with("/dev/") {
        return Ok(ArchiveTarget::Device(PathBuf::from(&comp.install_to)));
    }
    if !comp.path.is_empty() {
        return Ok(ArchiveTarget::Directory(PathBuf::from(&comp.path)));
    }
    if !comp.install_to.is_empty() {
        return Ok(ArchiveTarget::Directory(PathBuf::from(&comp.install_to)));
    }
    Err(Error::Schema(
        "archive component missing both install_to and path".into(),
    ))
}

/// Drains whatever remains of `reader` so the outer bundle reader can
/// advance past this entry, regardless of whether extraction stopped
/// early.
fn drain(reader: &mut dyn Read) -> Result<()> {
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            return Ok(());
        }
    }
}

pub struct ArchiveInstaller {
    mount_base_dir: PathBuf,
    fs_type: String,
}

impl Default for ArchiveInstaller {
    fn default() -> Self {
        Self {
            mount_base_dir: PathBuf::from("/mnt/ota"),
            fs_type: "ext4".to_string(),
        }
    }
}

impl InstallerStrategy for ArchiveInstaller {
    fn supports(&self, comp: &Component) -> bool {
        comp.kind == ComponentType::Archive
    }

    fn install(
        &self,
        comp: &Component,
        reader: &mut dyn Read,
        opt: &PipeOptions<'_>,
        tag: &str,
    ) -> Result<()> {
        let extract_opt = ExtractOptions {
            component_total_bytes: opt.component_total_bytes,
            overall_total_bytes: opt.overall_total_bytes,
            overall_done_base_bytes: opt.overall_done_base_bytes,
            progress_sink: opt.progress_sink,
            progress_interval_bytes: opt.progress_interval_bytes,
            bytes_in: opt.bytes_in.clone(),
        };

        match resolve_target(comp)? {
            ArchiveTarget::Device(device) => {
                let ops = NixSystemOps;
                let mut session = mount_device(
                    &ops,
                    &device,
                    &self.mount_base_dir,
                    "ota-",
                    &self.fs_type,
                    DEFAULT_MOUNT_FLAGS,
                )?;
                let extract_result = extract_to_dir(&mut *reader, session.path(), tag, &extract_opt);
                let drain_result = drain(reader);
                extract_result?;
                drain_result?;
                session.unmount()?;
                Ok(())
            }
            ArchiveTarget::Directory(dir) => {
                fs::create_dir_all(&dir)?;
                let extract_result = extract_to_dir(&mut *reader, &dir, tag, &extract_opt);
                let drain_result = drain(reader);
                extract_result?;
                drain_result?;
                Ok(())
            }
        }
    }
}
