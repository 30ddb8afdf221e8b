//! Loads the device configuration that drives slot selection.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::manifest::DeviceConfig;

pub const DEVICE_CONFIG_ENV: &str = "OTA_DEVICE_CONFIG";
pub const DEFAULT_DEVICE_CONFIG_PATH: &str = "/etc/ota/ota.conf";

/// Resolves the device-config path: `$OTA_DEVICE_CONFIG` if set, else the
/// default path.
pub fn resolve_path() -> PathBuf {
    match env::var(DEVICE_CONFIG_ENV) {
        Ok(v) if !v.is_empty() => PathBuf::from(v),
        _ => PathBuf::from(DEFAULT_DEVICE_CONFIG_PATH),
    }
}

pub fn load_from_path(path: &Path) -> Result<DeviceConfig> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| Error::Schema(format!("device config: {e}")))
}

pub fn load() -> Result<DeviceConfig> {
    load_from_path(&resolve_path())
}
