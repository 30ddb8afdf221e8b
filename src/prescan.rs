//! Computes the overall byte total for progress reporting by re-opening the
//! input and walking it once, read-only, before the real install pass.
//!
//! Skipped entirely when the input is stdin (signalled by the path `-`);
//! any error encountered while scanning degrades to an "unknown total" (0)
//! rather than failing the run.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::bundle::OtaBundleReader;
use crate::coordinator::ComponentIndex;

pub const STDIN_SENTINEL: &str = "-";

fn try_compute(input_path: &Path, index: &ComponentIndex) -> Option<u64> {
    let file = File::open(input_path).ok()?;
    let mut bundle = OtaBundleReader::open(BufReader::new(file)).ok()?;

    // The manifest is always the first entry; skip it unconditionally
    // without re-validating its name (the real pass already did that).
    bundle.next().ok()??;
    bundle.skip_current();

    let mut total: u64 = 0;
    loop {
        let entry = match bundle.next() {
            Ok(Some(e)) => e,
            Ok(None) => break,
            Err(_) => return None,
        };
        let name = crate::path_safety::normalize_entry_path(&entry.name).ok()?;
        if let Some(comp) = index.get(&name) {
            total += if comp.size > 0 { comp.size } else { entry.size };
        }
        bundle.skip_current();
    }
    Some(total)
}

/// Returns the sum of declared/observed sizes for every bundle entry that
/// matches a selected component, or 0 if the input is stdin or any error
/// occurred while scanning.
pub fn compute_overall_total(input_path_display: &str, index: &ComponentIndex) -> u64 {
    if input_path_display == STDIN_SENTINEL {
        return 0;
    }
    try_compute(Path::new(input_path_display), index).unwrap_or(0)
}
