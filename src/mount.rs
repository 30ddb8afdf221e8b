//! Scoped mount of a block device onto a temporary directory.
//!
//! Mount/unmount/mkdir are abstracted behind `SystemOps` so tests can stub
//! them without root; `NixSystemOps` is the real implementation, backed by
//! the `nix` crate.

use std::fs;
use std::path::{Path, PathBuf};

use nix::mount::MsFlags;

use crate::error::{Error, Result};

pub trait SystemOps {
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn remove_dir(&self, path: &Path) -> Result<()>;
    fn mount(&self, device: &Path, target: &Path, fs_type: &str, flags: MsFlags) -> Result<()>;
    fn unmount(&self, target: &Path) -> Result<()>;
}

pub struct NixSystemOps;

impl SystemOps for NixSystemOps {
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }

    fn remove_dir(&self, path: &Path) -> Result<()> {
        fs::remove_dir(path)?;
        Ok(())
    }

    fn mount(&self, device: &Path, target: &Path, fs_type: &str, flags: MsFlags) -> Result<()> {
        nix::mount::mount(Some(device), target, Some(fs_type), flags, None::<&str>)
            .map_err(|e| Error::MountFailed(format!("{device:?} -> {target:?}: {e}")))
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        nix::mount::umount(target).map_err(|e| Error::UnmountFailed(format!("{target:?}: {e}")))
    }
}

/// Default mount flags: "relative atime", matching the installer's stated
/// default.
pub const DEFAULT_MOUNT_FLAGS: MsFlags = MsFlags::MS_RELATIME;

/// Owns a temporary mount-point directory and tracks whether it is
/// currently mounted. Dropping an un-unmounted session unmounts and removes
/// the directory; failures during drop are logged, not propagated (`Drop`
/// cannot return a `Result`).
pub struct MountSession<'a> {
    ops: &'a dyn SystemOps,
    dir: PathBuf,
    mounted: bool,
}

impl<'a> MountSession<'a> {
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Idempotent. Safe to call before drop; on failure the session keeps
    /// `mounted = true` so drop will retry.
    pub fn unmount(&mut self) -> Result<()> {
        if !self.mounted {
            return Ok(());
        }
        self.ops.unmount(&self.dir)?;
        self.mounted = false;
        Ok(())
    }
}

impl Drop for MountSession<'_> {
    fn drop(&mut self) {
        if self.mounted {
            if let Err(e) = self.ops.unmount(&self.dir) {
                log::warn!("failed to unmount {:?} during drop: {e}", self.dir);
                return;
            }
            self.mounted = false;
        }
        if let Err(e) = self.ops.remove_dir(&self.dir) {
            log::warn!("failed to remove mount directory {:?}: {e}", self.dir);
        }
    }
}

/// Creates `base_dir` if needed, reserves a uniquely-named subdirectory,
/// and mounts `device` there. Any failure during this sequence removes the
/// partially-created subdirectory before returning the error.
pub fn mount_device<'a>(
    ops: &'a dyn SystemOps,
    device: &Path,
    base_dir: &Path,
    prefix: &str,
    fs_type: &str,
    flags: MsFlags,
) -> Result<MountSession<'a>> {
    ops.create_dir_all(base_dir)?;

    let dir = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(base_dir)
        .map_err(|e| Error::MkdtempFailed(e.to_string()))?
        .into_path();

    if let Err(e) = ops.mount(device, &dir, fs_type, flags) {
        let _ = ops.remove_dir(&dir);
        return Err(e);
    }

    Ok(MountSession {
        ops,
        dir,
        mounted: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;

    #[derive(Default)]
    struct FakeOps {
        mounted: RefCell<HashSet<PathBuf>>,
        fail_mount: bool,
        removed: RefCell<Vec<PathBuf>>,
    }

    impl SystemOps for FakeOps {
        fn create_dir_all(&self, path: &Path) -> Result<()> {
            fs::create_dir_all(path)?;
            Ok(())
        }

        fn remove_dir(&self, path: &Path) -> Result<()> {
            self.removed.borrow_mut().push(path.to_path_buf());
            fs::remove_dir(path)?;
            Ok(())
        }

        fn mount(&self, _device: &Path, target: &Path, _fs_type: &str, _flags: MsFlags) -> Result<()> {
            if self.fail_mount {
                return Err(Error::MountFailed("boom".into()));
            }
            self.mounted.borrow_mut().insert(target.to_path_buf());
            Ok(())
        }

        fn unmount(&self, target: &Path) -> Result<()> {
            self.mounted.borrow_mut().remove(target);
            Ok(())
        }
    }

    #[test]
    fn successful_mount_then_drop_unmounts_and_removes() {
        let base = tempfile::tempdir().unwrap();
        let ops = FakeOps::default();
        let dir_path;
        {
            let session = mount_device(
                &ops,
                Path::new("/dev/fake"),
                base.path(),
                "ota-",
                "ext4",
                DEFAULT_MOUNT_FLAGS,
            )
            .unwrap();
            dir_path = session.path().to_path_buf();
            assert!(ops.mounted.borrow().contains(&dir_path));
        }
        assert!(!ops.mounted.borrow().contains(&dir_path));
        assert!(!dir_path.exists());
    }

    #[test]
    fn mount_failure_cleans_up_partial_directory() {
        let base = tempfile::tempdir().unwrap();
        let ops = FakeOps {
            fail_mount: true,
            ..Default::default()
        };
        let result = mount_device(
            &ops,
            Path::new("/dev/fake"),
            base.path(),
            "ota-",
            "ext4",
            DEFAULT_MOUNT_FLAGS,
        );
        assert!(result.is_err());
        assert_eq!(ops.removed.borrow().len(), 1);
    }

    #[test]
    fn explicit_unmount_is_idempotent() {
        let base = tempfile::tempdir().unwrap();
        let ops = FakeOps::default();
        let mut session = mount_device(
            &ops,
            Path::new("/dev/fake"),
            base.path(),
            "ota-",
            "ext4",
            DEFAULT_MOUNT_FLAGS,
        )
        .unwrap();
        session.unmount().unwrap();
        session.unmount().unwrap();
    }
}
