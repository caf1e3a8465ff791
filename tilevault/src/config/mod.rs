//! Configuration for the offline tile engine.
//!
//! [`EngineConfig`] holds download and storage settings. Values come from
//! defaults, the INI file at `~/.tilevault/config.ini`, and the `with_*`
//! setters, in that order of precedence (lowest first).

mod file;
mod settings;

pub use file::{
    config_directory, config_file_path, load_config, load_config_from, ConfigFileError,
};
pub use settings::{
    clamp_concurrency, DownloadConfig, EngineConfig, StorageConfig, DEFAULT_CONCURRENCY,
    DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY, DEFAULT_TIMEOUT, MAX_CONCURRENCY,
};
