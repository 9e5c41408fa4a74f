//! Configuration file loading and resolution
//!
//! Services resolve their TOML configuration file in priority order:
//! 1. Explicit path (command-line argument)
//! 2. Environment variable (`PARCELBAY_<SERVICE>_CONFIG`)
//! 3. Platform config directory (`~/.config/parcelbay/<service>.toml`,
//!    then `/etc/parcelbay/<service>.toml` on Linux)
//!
//! A missing config file is not an error at this layer; services decide
//! whether each setting is required.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Resolve the configuration file path for a service
///
/// `explicit` wins when provided. The environment variable name is derived
/// from the service name (`av` → `PARCELBAY_AV_CONFIG`). Falls back to the
/// platform config directory; returns the user-level path even when the file
/// does not exist yet, so callers can create it.
pub fn resolve_config_path(service: &str, explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    let env_var = format!("PARCELBAY_{}_CONFIG", service.to_uppercase());
    if let Ok(path) = std::env::var(&env_var) {
        return PathBuf::from(path);
    }

    let file_name = format!("{}.toml", service);

    if cfg!(target_os = "linux") {
        if let Some(user_path) = dirs::config_dir().map(|d| d.join("parcelbay").join(&file_name)) {
            if user_path.exists() {
                return user_path;
            }
            let system_path = PathBuf::from("/etc/parcelbay").join(&file_name);
            if system_path.exists() {
                return system_path;
            }
            return user_path;
        }
        return PathBuf::from("/etc/parcelbay").join(&file_name);
    }

    dirs::config_dir()
        .map(|d| d.join("parcelbay").join(&file_name))
        .unwrap_or_else(|| PathBuf::from(".").join(&file_name))
}

/// Read and parse a TOML configuration file
pub fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Write a TOML configuration file
///
/// Writes to a sibling temp file first and renames it into place so a
/// concurrent reader never observes a half-written file.
pub fn write_toml<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(value)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp_path = path.with_extension("toml.tmp");
    std::fs::write(&tmp_path, content)?;
    std::fs::rename(&tmp_path, path)?;

    tracing::debug!(path = %path.display(), "Wrote TOML config");
    Ok(())
}
