//! Engine settings with defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::provider::DEFAULT_USER_AGENT;

/// Default number of tiles downloaded in parallel.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Upper bound on parallel tile downloads.
pub const MAX_CONCURRENCY: usize = 64;

/// Default per-fetch timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of retries after a transient fetch failure.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default base delay between retries, multiplied by the attempt number.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(250);

/// Clamp a concurrency value to `1..=MAX_CONCURRENCY`.
pub fn clamp_concurrency(value: usize) -> usize {
    value.clamp(1, MAX_CONCURRENCY)
}

/// Download batch settings.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadConfig {
    /// Tiles fetched in parallel; always within `1..=MAX_CONCURRENCY`
    pub concurrency: usize,
    /// Per-fetch timeout
    pub timeout: Duration,
    /// Retries after a transient failure (0 disables retrying)
    pub max_retries: u32,
    /// Base retry delay; attempt `n` waits `n * retry_delay`
    pub retry_delay: Duration,
    /// User-Agent sent to tile servers
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl DownloadConfig {
    /// Worker pool size for a batch of `tile_count` tiles.
    pub fn effective_concurrency(&self, tile_count: usize) -> usize {
        clamp_concurrency(self.concurrency).min(tile_count.max(1))
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn retry_delay_for(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt)
    }
}

/// Storage location settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StorageConfig {
    /// Root data directory
    pub directory: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            directory: super::file::config_directory().join("data"),
        }
    }
}

impl StorageConfig {
    /// Directory holding tile blobs.
    pub fn tiles_dir(&self) -> PathBuf {
        self.directory.join("tiles")
    }

    /// Directory holding map manifests.
    pub fn maps_dir(&self) -> PathBuf {
        self.directory.join("maps")
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub download: DownloadConfig,
    pub storage: StorageConfig,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets download concurrency, clamped to `1..=MAX_CONCURRENCY`.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.download.concurrency = clamp_concurrency(concurrency);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.download.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.download.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.download.retry_delay = delay;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.download.user_agent = user_agent.into();
        self
    }

    pub fn with_storage_dir(mut self, directory: impl Into<PathBuf>) -> Self {
        self.storage.directory = directory.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.download.concurrency, 8);
        assert_eq!(config.download.timeout, Duration::from_secs(30));
        assert_eq!(config.download.max_retries, 2);
        assert!(config.storage.directory.ends_with(".tilevault/data"));
    }

    #[test]
    fn test_concurrency_clamped() {
        assert_eq!(EngineConfig::new().with_concurrency(0).download.concurrency, 1);
        assert_eq!(EngineConfig::new().with_concurrency(500).download.concurrency, 64);
        assert_eq!(EngineConfig::new().with_concurrency(12).download.concurrency, 12);
    }

    #[test]
    fn test_effective_concurrency() {
        let config = DownloadConfig::default();
        assert_eq!(config.effective_concurrency(2), 2);
        assert_eq!(config.effective_concurrency(100), 8);
        assert_eq!(config.effective_concurrency(0), 1);
    }

    #[test]
    fn test_linear_retry_delay() {
        let config = DownloadConfig::default();
        assert_eq!(config.retry_delay_for(1), Duration::from_millis(250));
        assert_eq!(config.retry_delay_for(2), Duration::from_millis(500));
    }

    #[test]
    fn test_storage_subdirs() {
        let config = EngineConfig::new().with_storage_dir("/data/tv");
        assert_eq!(config.storage.tiles_dir(), PathBuf::from("/data/tv/tiles"));
        assert_eq!(config.storage.maps_dir(), PathBuf::from("/data/tv/maps"));
    }
}
