//! Manifest and device-config data model, parsing, slot selection, and
//! version comparison.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};

pub const SLOT_PREFIX: &str = "slot-";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub enum ComponentType {
    #[serde(rename = "raw")]
    Raw,
    #[serde(rename = "archive")]
    Archive,
    #[serde(rename = "file")]
    File,
}

impl ComponentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Raw => "raw",
            ComponentType::Archive => "archive",
            ComponentType::File => "file",
        }
    }
}

fn default_version() -> String {
    "0.0.0".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct Component {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ComponentType,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub sha256: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub force: bool,
    #[serde(default)]
    pub install_to: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub permissions: String,
    #[serde(default, rename = "create-destination")]
    pub create_destination: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct SlotSectionRaw {
    #[serde(default)]
    components: Option<Vec<Component>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ManifestRaw {
    #[serde(default)]
    version: String,
    #[serde(default)]
    hw_compatibility: String,
    #[serde(default)]
    force_all: bool,
    #[serde(default)]
    components: Option<Vec<Component>>,
    #[serde(flatten)]
    rest: HashMap<String, Value>,
}

#[derive(Debug, Clone)]
pub struct Manifest {
    pub version: String,
    pub hw_compatibility: String,
    pub force_all: bool,
    pub components: Vec<Component>,
    pub slot_components: HashMap<String, Vec<Component>>,
}

/// Parses a manifest document. Permissive on unknown top-level keys; any
/// key prefixed with `slot-` must map to an object containing its own
/// `components` array.
pub fn parse_manifest(bytes: &[u8]) -> Result<Manifest> {
    let raw: ManifestRaw =
        serde_json::from_slice(bytes).map_err(|e| Error::Schema(format!("manifest.json: {e}")))?;

    let mut slot_components = HashMap::new();
    for (key, value) in &raw.rest {
        if !key.starts_with(SLOT_PREFIX) {
            continue;
        }
        let section: SlotSectionRaw = serde_json::from_value(value.clone())
            .map_err(|e| Error::Schema(format!("slot section '{key}': {e}")))?;
        let components = section
            .components
            .ok_or_else(|| Error::Schema(format!("slot section '{key}' missing components")))?;
        slot_components.insert(key.clone(), components);
    }

    Ok(Manifest {
        version: raw.version,
        hw_compatibility: raw.hw_compatibility,
        force_all: raw.force_all,
        components: raw.components.unwrap_or_default(),
        slot_components,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    #[serde(alias = "current-slot", default)]
    pub current_slot: String,
    #[serde(alias = "hw-compatibility", default)]
    pub hw_compatibility: String,
}

/// Picks the component list for `device.current_slot` out of a manifest's
/// slot sections, returning a new manifest whose `components` is that list.
///
/// Fails when the device is missing its slot/hw fields, the manifest has no
/// slot sections, the requested slot is absent, or the manifest and device
/// disagree on hardware compatibility (a stricter check than the slot
/// lookup alone; see the grounding ledger for why this crate enforces it
/// even though the system it was grounded on does not).
pub fn select_for_device(input: &Manifest, device: &DeviceConfig) -> Result<Manifest> {
    if device.current_slot.is_empty() {
        return Err(Error::EmptyCurrentSlot);
    }
    if device.hw_compatibility.is_empty() {
        return Err(Error::EmptyHwCompatibility);
    }
    if input.slot_components.is_empty() {
        return Err(Error::NoSlotSections);
    }
    let components = input
        .slot_components
        .get(&device.current_slot)
        .ok_or_else(|| Error::MissingSlotSection(device.current_slot.clone()))?
        .clone();
    if input.hw_compatibility != device.hw_compatibility {
        return Err(Error::HwCompatibilityMismatch {
            manifest: input.hw_compatibility.clone(),
            device: device.hw_compatibility.clone(),
        });
    }
    Ok(Manifest {
        version: input.version.clone(),
        hw_compatibility: input.hw_compatibility.clone(),
        force_all: input.force_all,
        components,
        slot_components: input.slot_components.clone(),
    })
}

/// Splits a dotted version string into numeric fields, treating a
/// non-numeric field as 0.
fn version_fields(v: &str) -> Vec<i64> {
    v.split('.').map(|f| f.parse::<i64>().unwrap_or(0)).collect()
}

/// Three-way, field-by-field comparison of two dotted version strings,
/// padding the shorter side with zeros.
pub fn compare_versions(a: &str, b: &str) -> std::cmp::Ordering {
    let mut fa = version_fields(a);
    let mut fb = version_fields(b);
    let len = fa.len().max(fb.len());
    fa.resize(len, 0);
    fb.resize(len, 0);
    fa.cmp(&fb)
}

pub fn should_update(comp: &Component, manifest: &Manifest, current_version: &str) -> bool {
    manifest.force_all
        || comp.force
        || compare_versions(&comp.version, current_version) == std::cmp::Ordering::Greater
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn parses_flat_components() {
        let json = br#"{
            "version": "1.0",
            "hw_compatibility": "board-z",
            "components": [
                {"name": "c", "type": "file", "filename": "c.bin", "path": "/x"}
            ]
        }"#;
        let m = parse_manifest(json).unwrap();
        assert_eq!(m.components.len(), 1);
        assert_eq!(m.components[0].kind, ComponentType::File);
        assert_eq!(m.components[0].permissions, "");
        assert_eq!(m.components[0].version, "0.0.0");
        assert_eq!(m.components[0].size, 0);
    }

    #[test]
    fn parses_slot_sections_and_dashed_create_destination() {
        let json = br#"{
            "hw_compatibility": "board-z",
            "slot-a": {"components": [{"type": "raw", "filename": "a.img", "install_to": "/dev/x"}]},
            "slot-b": {"components": [{"type": "file", "filename": "b.bin", "path": "/y", "create-destination": true}]}
        }"#;
        let m = parse_manifest(json).unwrap();
        assert_eq!(m.slot_components.len(), 2);
        assert!(m.slot_components["slot-b"][0].create_destination);
    }

    #[test]
    fn rejects_slot_section_missing_components() {
        let json = br#"{"slot-a": {}}"#;
        assert!(parse_manifest(json).is_err());
    }

    #[test]
    fn select_for_device_requires_matching_hw() {
        let json = br#"{
            "hw_compatibility": "board-z",
            "slot-b": {"components": []}
        }"#;
        let m = parse_manifest(json).unwrap();
        let device = DeviceConfig {
            current_slot: "slot-b".into(),
            hw_compatibility: "board-y".into(),
        };
        assert!(matches!(
            select_for_device(&m, &device),
            Err(Error::HwCompatibilityMismatch { .. })
        ));
    }

    #[test]
    fn select_for_device_picks_slot() {
        let json = br#"{
            "hw_compatibility": "board-z",
            "slot-a": {"components": [{"type": "raw", "filename": "a.img"}]},
            "slot-b": {"components": [{"type": "file", "filename": "b.bin"}]}
        }"#;
        let m = parse_manifest(json).unwrap();
        let device = DeviceConfig {
            current_slot: "slot-b".into(),
            hw_compatibility: "board-z".into(),
        };
        let selected = select_for_device(&m, &device).unwrap();
        assert_eq!(selected.components.len(), 1);
        assert_eq!(selected.components[0].filename, "b.bin");
    }

    #[test]
    fn version_ordering() {
        assert_eq!(compare_versions("1.2", "1.2.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.2.1", "1.2"), Ordering::Greater);
        assert_eq!(compare_versions("2", "1.9.9"), Ordering::Greater);
        assert_eq!(compare_versions("1.2.a", "1.2.0"), Ordering::Equal);
    }

    #[test]
    fn should_update_rules() {
        let manifest = Manifest {
            version: "1".into(),
            hw_compatibility: "x".into(),
            force_all: false,
            components: vec![],
            slot_components: HashMap::new(),
        };
        let mut comp = Component {
            name: "c".into(),
            kind: ComponentType::File,
            filename: "c".into(),
            size: 0,
            sha256: String::new(),
            version: "1.0.0".into(),
            force: false,
            install_to: String::new(),
            path: String::new(),
            permissions: String::new(),
            create_destination: false,
        };
        assert!(!should_update(&comp, &manifest, "1.0.0"));
        comp.version = "1.1.0".into();
        assert!(should_update(&comp, &manifest, "1.0.0"));
        comp.version = "1.0.0".into();
        comp.force = true;
        assert!(should_update(&comp, &manifest, "1.0.0"));
    }
}
