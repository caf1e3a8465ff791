//! INI configuration file loading.
//!
//! ```ini
//! [download]
//! concurrency = 8
//! timeout_secs = 30
//! max_retries = 2
//! retry_delay_ms = 250
//! user_agent = tilevault/0.1.0
//!
//! [storage]
//! directory = ~/.tilevault/data
//! ```
//!
//! Every key is optional; missing keys keep their defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use super::settings::{clamp_concurrency, EngineConfig};

/// Errors that can occur when loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Load configuration from the default path (~/.tilevault/config.ini).
///
/// Returns defaults if the file does not exist.
pub fn load_config() -> Result<EngineConfig, ConfigFileError> {
    load_config_from(&config_file_path())
}

/// Load configuration from a specific path.
///
/// Returns defaults if the file does not exist.
pub fn load_config_from(path: &Path) -> Result<EngineConfig, ConfigFileError> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }

    let ini = Ini::load_from_file(path)?;
    parse_ini(&ini)
}

/// Overlay INI values onto the defaults.
fn parse_ini(ini: &Ini) -> Result<EngineConfig, ConfigFileError> {
    let mut config = EngineConfig::default();

    // [download] section
    if let Some(section) = ini.section(Some("download")) {
        if let Some(v) = section.get("concurrency") {
            let n: usize = parse_number("download", "concurrency", v)?;
            config.download.concurrency = clamp_concurrency(n);
        }
        if let Some(v) = section.get("timeout_secs") {
            let secs: u64 = parse_number("download", "timeout_secs", v)?;
            if secs == 0 {
                return Err(invalid("download", "timeout_secs", v, "must be at least 1"));
            }
            config.download.timeout = Duration::from_secs(secs);
        }
        if let Some(v) = section.get("max_retries") {
            config.download.max_retries = parse_number("download", "max_retries", v)?;
        }
        if let Some(v) = section.get("retry_delay_ms") {
            let ms: u64 = parse_number("download", "retry_delay_ms", v)?;
            config.download.retry_delay = Duration::from_millis(ms);
        }
        if let Some(v) = section.get("user_agent") {
            let v = v.trim();
            if !v.is_empty() {
                config.download.user_agent = v.to_string();
            }
        }
    }

    // [storage] section
    if let Some(section) = ini.section(Some("storage")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.storage.directory = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

fn parse_number<T: FromStr>(section: &str, key: &str, value: &str) -> Result<T, ConfigFileError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(section, key, value, "expected a non-negative integer"))
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

/// Expand a leading `~` to the home directory.
fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

/// Get the tilevault directory (~/.tilevault).
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tilevault")
}

/// Get the path to the config file (~/.tilevault/config.ini).
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
