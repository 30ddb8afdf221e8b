//! Progress reporting: a plain event type and the two concrete sinks
//! (console and file) that render it.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct ProgressEvent {
    pub component: String,
    pub comp_done: u64,
    pub comp_total: u64,
    pub overall_done: u64,
    pub overall_total: u64,
}

impl ProgressEvent {
    fn percent(done: u64, total: u64) -> u32 {
        if total == 0 {
            return 0;
        }
        ((done.min(total) * 100) / total) as u32
    }

    pub fn component_percent(&self) -> u32 {
        Self::percent(self.comp_done, self.comp_total)
    }

    pub fn overall_percent(&self) -> u32 {
        Self::percent(self.overall_done, self.overall_total)
    }
}

pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// A sink that does nothing; used when the caller asked for no progress
/// reporting at all.
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Set while the console sink's progress line is the last thing written to
/// the terminal, so the logger wrapper knows to print a newline before a
/// log record, and the console sink knows to repaint after one.
static LINE_ACTIVE: AtomicBool = AtomicBool::new(false);

pub fn console_line_active() -> bool {
    LINE_ACTIVE.load(Ordering::Relaxed)
}

/// Called by the logging backend immediately before emitting a record.
pub fn clear_console_line_for_log() {
    if LINE_ACTIVE.swap(false, Ordering::Relaxed) {
        eprintln!();
    }
}

/// Re-paints a single carriage-return line: `[<component>] <p>% | OTA <o>%`.
/// Advances exactly one newline per component reaching 100%, and one more
/// when the overall total reaches 100%.
pub struct ConsoleProgressSink {
    last_overall_100: AtomicBool,
}

impl Default for ConsoleProgressSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleProgressSink {
    pub fn new() -> Self {
        Self {
            last_overall_100: AtomicBool::new(false),
        }
    }
}

impl ProgressSink for ConsoleProgressSink {
    fn on_progress(&self, event: &ProgressEvent) {
        let comp_pct = event.component_percent();
        let overall = if event.overall_total == 0 {
            "--".to_string()
        } else {
            format!("{}", event.overall_percent())
        };
        eprint!("\r[{}] {}% | OTA {}%", event.component, comp_pct, overall);
        let _ = io_stderr_flush();
        LINE_ACTIVE.store(true, Ordering::Relaxed);

        if comp_pct >= 100 {
            eprintln!();
            LINE_ACTIVE.store(false, Ordering::Relaxed);
        }
        if event.overall_total != 0 && event.overall_percent() >= 100 {
            if !self.last_overall_100.swap(true, Ordering::Relaxed) {
                eprintln!();
                LINE_ACTIVE.store(false, Ordering::Relaxed);
            }
        }
    }
}

fn io_stderr_flush() -> std::io::Result<()> {
    std::io::stderr().flush()
}

/// Writes `{"component":...,"component_percent":...,"overall_percent":...}`
/// to `path`, via a `path + ".tmp"` write and an atomic rename, so a reader
/// polling `path` never observes a partial write.
pub struct FileProgressSink {
    path: PathBuf,
}

impl FileProgressSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn write(&self, event: &ProgressEvent) -> Result<()> {
        let tmp = tmp_path(&self.path);
        let body = format!(
            r#"{{"component":"{}","component_percent":{},"overall_percent":{}}}"#,
            escape_json(&event.component),
            event.component_percent(),
            event.overall_percent(),
        );
        fs::write(&tmp, body)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(".tmp");
    PathBuf::from(os)
}

fn escape_json(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

impl ProgressSink for FileProgressSink {
    fn on_progress(&self, event: &ProgressEvent) {
        if let Err(e) = self.write(event) {
            log::warn!("failed to write progress file: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read as _;

    #[test]
    fn percent_is_zero_for_unknown_total() {
        let event = ProgressEvent {
            component: "x".into(),
            comp_done: 5,
            comp_total: 0,
            overall_done: 0,
            overall_total: 0,
        };
        assert_eq!(event.component_percent(), 0);
        assert_eq!(event.overall_percent(), 0);
    }

    #[test]
    fn percent_clamped_to_100() {
        let event = ProgressEvent {
            component: "x".into(),
            comp_done: 200,
            comp_total: 100,
            overall_done: 10,
            overall_total: 10,
        };
        assert_eq!(event.component_percent(), 100);
        assert_eq!(event.overall_percent(), 100);
    }

    #[test]
    fn file_sink_writes_valid_json_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let sink = FileProgressSink::new(&path);
        sink.on_progress(&ProgressEvent {
            component: "cfg.txt".into(),
            comp_done: 50,
            comp_total: 100,
            overall_done: 50,
            overall_total: 200,
        });
        let mut contents = String::new();
        std::fs::File::open(&path)
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert!(contents.contains("\"component\":\"cfg.txt\""));
        assert!(contents.contains("\"component_percent\":50"));
        assert!(contents.contains("\"overall_percent\":25"));
        assert!(!tmp_path(&path).exists());
    }
}
