//! Process-wide cancellation flag, set by the signal handler the CLI
//! registers on startup and checked by every blocking read loop.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{Error, Result};

static CANCEL: AtomicBool = AtomicBool::new(false);

pub fn request_cancel() {
    CANCEL.store(true, Ordering::Relaxed);
}

pub fn is_cancelled() -> bool {
    CANCEL.load(Ordering::Relaxed)
}

/// Resets the flag. Only meaningful in tests, where the flag would
/// otherwise leak between cases in the same process.
#[cfg(test)]
pub fn reset_for_test() {
    CANCEL.store(false, Ordering::Relaxed);
}

/// Returns `Err(Error::Cancelled)` if a cancellation has been requested.
/// Called between reads inside the pipe helper and the pre-scanner.
pub fn check() -> Result<()> {
    if is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}
