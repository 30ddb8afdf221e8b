//! Walks the bundle's entries, staging/verifying/dispatching each one that
//! matches a selected component.

use std::collections::{HashMap, HashSet};
use std::io::Read;

use crate::bundle::OtaBundleReader;
use crate::error::{Error, Result};
use crate::install::pipe::PipeOptions;
use crate::manifest::Component;
use crate::path_safety::normalize_entry_path;
use crate::progress::ProgressSink;
use crate::staging::stage_and_verify;
use crate::update::UpdateModule;

pub struct ComponentIndex {
    by_filename: HashMap<String, Component>,
}

impl ComponentIndex {
    pub fn build(components: &[Component]) -> Self {
        let mut by_filename = HashMap::new();
        for comp in components {
            by_filename.insert(comp.filename.clone(), comp.clone());
        }
        Self { by_filename }
    }

    pub fn get(&self, filename: &str) -> Option<&Component> {
        self.by_filename.get(filename)
    }

    pub fn filenames(&self) -> impl Iterator<Item = &str> {
        self.by_filename.keys().map(String::as_str)
    }
}

pub struct CoordinatorOptions<'a> {
    pub overall_total_bytes: u64,
    pub progress_sink: &'a dyn ProgressSink,
    pub require_all_components: bool,
}

/// Drives the bundle forward one entry at a time: normalize the name, skip
/// non-matching entries, stage+verify when a digest is declared, dispatch
/// to the update module, and advance the running overall-bytes-done base.
pub fn install_matching_entries<R: Read>(
    bundle: &mut OtaBundleReader<R>,
    index: &ComponentIndex,
    opt: &CoordinatorOptions<'_>,
) -> Result<()> {
    let update = UpdateModule::default();
    let mut overall_done_base: u64 = 0;
    let mut consumed: HashSet<String> = HashSet::new();

    while let Some(entry) = bundle.next()? {
        let name = normalize_entry_path(&entry.name)?;
        let Some(comp) = index.get(&name) else {
            bundle.skip_current();
            continue;
        };

        let comp_total = if comp.size > 0 { comp.size } else { entry.size };

        let result: Result<()> = (|| {
            let pipe_opt = PipeOptions {
                component_total_bytes: comp_total,
                overall_total_bytes: opt.overall_total_bytes,
                overall_done_base_bytes: overall_done_base,
                fsync_interval_bytes: crate::install::pipe::DEFAULT_FSYNC_INTERVAL_BYTES,
                progress_interval_bytes: crate::install::pipe::DEFAULT_PROGRESS_INTERVAL_BYTES,
                progress_sink: opt.progress_sink,
                // Overridden by `update::execute_component` with the live
                // counter on the counting reader it builds around the
                // source; never read before that happens.
                bytes_in: std::sync::Arc::new(std::sync::atomic::AtomicU64::new(0)),
            };

            if comp.sha256.is_empty() {
                update.execute_component(comp, &mut *bundle, &pipe_opt)
            } else {
                let staged = stage_and_verify(&mut *bundle, &comp.sha256)?;
                update.execute_component(comp, staged, &pipe_opt)
            }
        })();

        bundle.skip_current();

        result.map_err(|e| Error::component_failed(comp.name.clone(), e))?;

        consumed.insert(name);
        overall_done_base += comp_total;
    }

    if opt.require_all_components {
        for filename in index.filenames() {
            if !consumed.contains(filename) {
                return Err(Error::ComponentMissingFromBundle(filename.to_string()));
            }
        }
    }

    Ok(())
}
