//! The reader-to-writer pump shared by all three installer strategies:
//! chunked copy, periodic fsync, periodic progress, with one progress event
//! emitted before the loop starts and one (with a closing fsync) at EOF.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::Result;
use crate::progress::{ProgressEvent, ProgressSink};

pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;
pub const DEFAULT_FSYNC_INTERVAL_BYTES: u64 = 1024 * 1024;
pub const DEFAULT_PROGRESS_INTERVAL_BYTES: u64 = 4 * 1024 * 1024;

pub trait Fsync {
    fn fsync_now(&mut self) -> std::io::Result<()>;
}

pub struct PipeOptions<'a> {
    pub component_total_bytes: u64,
    pub overall_total_bytes: u64,
    pub overall_done_base_bytes: u64,
    pub fsync_interval_bytes: u64,
    pub progress_interval_bytes: u64,
    pub progress_sink: &'a dyn ProgressSink,
    /// Live count of bytes read from the component's *source* (pre-gzip,
    /// as stored in the bundle), shared with the counting reader `update`
    /// wraps the source in. Progress is reported against this, not bytes
    /// written, so a gzip component's `comp_done` stays denominated in the
    /// same (compressed) units as `comp_total` instead of exceeding it.
    pub bytes_in: Arc<AtomicU64>,
}

impl Default for PipeOptions<'static> {
    fn default() -> Self {
        use crate::progress::NullProgressSink;
        static NULL: NullProgressSink = NullProgressSink;
        Self {
            component_total_bytes: 0,
            overall_total_bytes: 0,
            overall_done_base_bytes: 0,
            fsync_interval_bytes: DEFAULT_FSYNC_INTERVAL_BYTES,
            progress_interval_bytes: DEFAULT_PROGRESS_INTERVAL_BYTES,
            progress_sink: &NULL,
            bytes_in: Arc::new(AtomicU64::new(0)),
        }
    }
}

/// Pipes `reader` into `writer` until clean EOF, fsyncing periodically and
/// at the end, and reporting progress against `opt.bytes_in` (bytes read
/// from the component's source, before any decompression).
pub fn pipe_reader_to_writer<R: Read, W: Write + Fsync>(
    mut reader: R,
    mut writer: W,
    tag: &str,
    opt: &PipeOptions<'_>,
) -> Result<u64> {
    let mut total: u64 = 0;
    let mut since_fsync: u64 = 0;
    let progress_interval = if opt.progress_interval_bytes > 0 {
        opt.progress_interval_bytes
    } else {
        DEFAULT_PROGRESS_INTERVAL_BYTES
    };
    let mut next_progress = progress_interval;

    let emit = |done: u64| {
        opt.progress_sink.on_progress(&ProgressEvent {
            component: tag.to_string(),
            comp_done: done,
            comp_total: opt.component_total_bytes,
            overall_done: opt.overall_done_base_bytes + done,
            overall_total: opt.overall_total_bytes,
        });
    };
    emit(opt.bytes_in.load(Ordering::Relaxed));

    let mut buf = vec![0u8; DEFAULT_CHUNK_SIZE];
    loop {
        crate::cancel::check()?;
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        writer.write_all(&buf[..n])?;
        total += n as u64;
        since_fsync += n as u64;

        if opt.fsync_interval_bytes > 0 && since_fsync >= opt.fsync_interval_bytes {
            writer.fsync_now()?;
            since_fsync = 0;
        }
        let bytes_in = opt.bytes_in.load(Ordering::Relaxed);
        if bytes_in >= next_progress {
            emit(bytes_in);
            next_progress = bytes_in + progress_interval;
        }
    }

    writer.fsync_now()?;
    emit(opt.bytes_in.load(Ordering::Relaxed));
    Ok(total)
}
