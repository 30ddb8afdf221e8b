//! Extracts a nested tar stream into a target directory, rewriting every
//! entry path to an absolute path under the target directory rather than
//! chdir-ing into it (see the grounding ledger for why).

use std::fs;
use std::io::Read;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::path_safety::{normalize_entry_path, normalize_hardlink_target};
use crate::progress::{ProgressEvent, ProgressSink};

pub struct ExtractOptions<'a> {
    pub component_total_bytes: u64,
    pub overall_total_bytes: u64,
    pub overall_done_base_bytes: u64,
    pub progress_sink: &'a dyn ProgressSink,
    pub progress_interval_bytes: u64,
    /// Live count of bytes read from the component's source (pre-gzip);
    /// shared with the counting reader `update` wraps the source in, so
    /// `comp_done` stays in the same units as `comp_total` regardless of
    /// how much larger the decompressed/extracted bytes are.
    pub bytes_in: Arc<AtomicU64>,
}

impl Default for ExtractOptions<'static> {
    fn default() -> Self {
        use crate::progress::NullProgressSink;
        static NULL: NullProgressSink = NullProgressSink;
        Self {
            component_total_bytes: 0,
            overall_total_bytes: 0,
            overall_done_base_bytes: 0,
            progress_sink: &NULL,
            progress_interval_bytes: 4 * 1024 * 1024,
            bytes_in: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Streams the entries of `tar_stream` into `dst_dir`. `dst_dir` must
/// already exist. Every entry's path and hardlink target is validated by
/// `path_safety` *before* being rewritten to `dst_dir.join(rel)`; the `tar`
/// crate's own absolute-path handling is irrelevant here because every
/// unpacked path is always rewritten to be absolute under `dst_dir`.
pub fn extract_to_dir<R: Read>(
    tar_stream: R,
    dst_dir: &Path,
    tag: &str,
    opt: &ExtractOptions<'_>,
) -> Result<()> {
    if !dst_dir.exists() {
        return Err(Error::MissingDestinationDir {
            path: dst_dir.to_path_buf(),
        });
    }
    if !dst_dir.is_dir() {
        return Err(Error::NotADirectory(dst_dir.to_path_buf()));
    }

    let mut archive = tar::Archive::new(tar_stream);
    let interval = if opt.progress_interval_bytes > 0 {
        opt.progress_interval_bytes
    } else {
        4 * 1024 * 1024
    };
    let mut next_progress = interval;

    let mut emit = |force: bool| {
        let bytes_in = opt.bytes_in.load(Ordering::Relaxed);
        if force || bytes_in >= next_progress {
            opt.progress_sink.on_progress(&ProgressEvent {
                component: tag.to_string(),
                comp_done: bytes_in,
                comp_total: opt.component_total_bytes,
                overall_done: opt.overall_done_base_bytes + bytes_in,
                overall_total: opt.overall_total_bytes,
            });
            next_progress = bytes_in + interval;
        }
    };

    for entry in archive
        .entries()
        .map_err(|e| Error::BundleOpen(e.to_string()))?
    {
        let mut entry = entry.map_err(|e| Error::BundleOpen(e.to_string()))?;

        let raw_path = entry
            .path()
            .map_err(|e| Error::UnsafePath(e.to_string()))?
            .to_string_lossy()
            .into_owned();
        let rel = normalize_entry_path(&raw_path)?;
        if rel.is_empty() || rel == "." {
            continue;
        }
        let target_path = dst_dir.join(&rel);
        let is_hardlink = entry.header().entry_type() == tar::EntryType::Link;

        let rel_link = match entry.link_name().ok().flatten() {
            Some(link) => normalize_hardlink_target(&link.to_string_lossy())?,
            None => String::new(),
        };

        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent)?;
        }
        if target_path.exists() {
            if target_path.is_dir() {
                fs::remove_dir_all(&target_path)?;
            } else {
                fs::remove_file(&target_path)?;
            }
        }

        if is_hardlink && !rel_link.is_empty() && rel_link != "." {
            // Rewritten the same way entry paths are: the hardlink target is
            // re-rooted under `dst_dir` rather than resolved relative to
            // whatever the extracting process's cwd happens to be.
            fs::hard_link(dst_dir.join(&rel_link), &target_path)?;
        } else {
            entry.unpack(&target_path)?;
        }

        emit(false);
    }

    emit(true);
    Ok(())
}
