//! Terminal result of a download batch.

use std::fmt;

use crate::coord::TileKey;

/// A tile that could not be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTile {
    pub key: TileKey,
    pub reason: String,
    /// Fetch attempts made, including retries
    pub attempts: u32,
}

/// Overall classification of a finished batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Every tile was stored
    Complete,
    /// Every tile was attempted, some failed
    PartialFailure,
    /// The batch was cancelled before every tile was attempted
    Cancelled,
}

impl fmt::Display for DownloadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadOutcome::Complete => write!(f, "complete"),
            DownloadOutcome::PartialFailure => write!(f, "completed with failures"),
            DownloadOutcome::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// What happened to each tile of a batch.
///
/// The map manifest is written before any tile is fetched, so the map
/// exists in the catalog whatever this report says.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadReport {
    pub map_name: String,
    /// Distinct tiles in the batch
    pub total: usize,
    /// Tiles fetched and stored
    pub stored: usize,
    /// Tiles that failed after all attempts
    pub failed: Vec<FailedTile>,
    /// Whether the batch was cancelled
    pub cancelled: bool,
    /// Tiles not finished when the batch was cancelled
    pub unfinished: Vec<TileKey>,
}

impl DownloadReport {
    pub(crate) fn new(map_name: &str, total: usize) -> Self {
        Self {
            map_name: map_name.to_string(),
            total,
            stored: 0,
            failed: Vec::new(),
            cancelled: false,
            unfinished: Vec::new(),
        }
    }

    pub fn outcome(&self) -> DownloadOutcome {
        if self.cancelled {
            DownloadOutcome::Cancelled
        } else if self.failed.is_empty() {
            DownloadOutcome::Complete
        } else {
            DownloadOutcome::PartialFailure
        }
    }

    /// Tiles that finished, successfully or not.
    pub fn attempted(&self) -> usize {
        self.stored + self.failed.len()
    }

    pub fn failed_keys(&self) -> impl Iterator<Item = &TileKey> {
        self.failed.iter().map(|f| &f.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> TileKey {
        s.parse().unwrap()
    }

    #[test]
    fn test_outcomes() {
        let mut report = DownloadReport::new("M", 2);
        report.stored = 2;
        assert_eq!(report.outcome(), DownloadOutcome::Complete);

        report.stored = 1;
        report.failed.push(FailedTile {
            key: key("osm/3/4/6"),
            reason: "HTTP 404".to_string(),
            attempts: 1,
        });
        assert_eq!(report.outcome(), DownloadOutcome::PartialFailure);
        assert_eq!(report.attempted(), 2);
        assert_eq!(report.failed_keys().collect::<Vec<_>>(), vec![&key("osm/3/4/6")]);

        report.cancelled = true;
        assert_eq!(report.outcome(), DownloadOutcome::Cancelled);
    }
}
