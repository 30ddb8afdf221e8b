//! Top-level orchestration: open the input, read the manifest, apply slot
//! selection, pre-scan for the overall byte total, then install.

use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use crate::bundle::{is_manifest_name, OtaBundleReader};
use crate::coordinator::{install_matching_entries, ComponentIndex, CoordinatorOptions};
use crate::error::{Error, Result};
use crate::manifest::{parse_manifest, select_for_device, DeviceConfig, Manifest};
use crate::prescan::{compute_overall_total, STDIN_SENTINEL};
use crate::progress::ProgressSink;

pub struct RunOptions<'a> {
    pub input_path: String,
    pub progress_sink: &'a dyn ProgressSink,
    pub device_config: Option<DeviceConfig>,
    pub require_all_components: bool,
}

fn open_input(input_path: &str) -> Result<Box<dyn Read>> {
    if input_path == STDIN_SENTINEL {
        Ok(Box::new(io::stdin()))
    } else {
        Ok(Box::new(BufReader::new(File::open(Path::new(input_path))?)))
    }
}

fn load_manifest<R: Read>(bundle: &mut OtaBundleReader<R>) -> Result<Manifest> {
    let entry = bundle.next()?.ok_or(Error::ManifestNotFirst)?;
    let name = crate::path_safety::normalize_entry_path(&entry.name)?;
    if !is_manifest_name(&name) {
        return Err(Error::ManifestNotFirst);
    }
    let text = bundle.read_current_to_string()?;
    parse_manifest(text.as_bytes())
}

/// Applies slot selection when the manifest carries any `slot-*` sections;
/// a manifest with only a flat `components` list runs unchanged and
/// requires no device config at all.
fn apply_slot_selection(manifest: Manifest, device_config: Option<&DeviceConfig>) -> Result<Manifest> {
    if manifest.slot_components.is_empty() {
        return Ok(manifest);
    }
    let device = device_config.ok_or(Error::NoSlotSections)?;
    select_for_device(&manifest, device)
}

pub fn run(opt: &RunOptions<'_>) -> Result<()> {
    let input = open_input(&opt.input_path)?;
    let mut bundle = OtaBundleReader::open(input)?;

    let manifest = load_manifest(&mut bundle)?;
    let manifest = apply_slot_selection(manifest, opt.device_config.as_ref())?;

    let index = ComponentIndex::build(&manifest.components);
    let overall_total = compute_overall_total(&opt.input_path, &index);

    let coordinator_opt = CoordinatorOptions {
        overall_total_bytes: overall_total,
        progress_sink: opt.progress_sink,
        require_all_components: opt.require_all_components,
    };

    install_matching_entries(&mut bundle, &index, &coordinator_opt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NullProgressSink;
    use std::io::Write as _;

    fn build_tar(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, *data).unwrap();
        }
        builder.into_inner().unwrap()
    }

    #[test]
    fn flat_manifest_runs_without_device_config() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("cfg.txt");
        let manifest = format!(
            r#"{{"hw_compatibility":"board-z","components":[
                {{"name":"cfg","type":"file","filename":"cfg.txt","path":"{}"}}
            ]}}"#,
            target.to_string_lossy().replace('\\', "\\\\")
        );
        let bytes = build_tar(&[
            ("manifest.json", manifest.as_bytes()),
            ("cfg.txt", b"version=1\n".as_slice()),
        ]);
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&bytes).unwrap();
        f.flush().unwrap();

        let sink = NullProgressSink;
        let opt = RunOptions {
            input_path: f.path().to_string_lossy().into_owned(),
            progress_sink: &sink,
            device_config: None,
            require_all_components: false,
        };
        run(&opt).unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "version=1\n");
    }

    #[test]
    fn slotted_manifest_requires_device_config() {
        let bytes = build_tar(&[(
            "manifest.json",
            br#"{"hw_compatibility":"board-z","slot-a":{"components":[]}}"#,
        )]);
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&bytes).unwrap();
        f.flush().unwrap();

        let sink = NullProgressSink;
        let opt = RunOptions {
            input_path: f.path().to_string_lossy().into_owned(),
            progress_sink: &sink,
            device_config: None,
            require_all_components: false,
        };
        let err = run(&opt).unwrap_err();
        assert!(matches!(err, Error::NoSlotSections));
    }

    #[test]
    fn manifest_must_be_first_entry() {
        let bytes = build_tar(&[("not-manifest.json", b"{}".as_slice())]);
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&bytes).unwrap();
        f.flush().unwrap();

        let sink = NullProgressSink;
        let opt = RunOptions {
            input_path: f.path().to_string_lossy().into_owned(),
            progress_sink: &sink,
            device_config: None,
            require_all_components: false,
        };
        let err = run(&opt).unwrap_err();
        assert!(matches!(err, Error::ManifestNotFirst));
    }
}
