//! Storage size accounting for sets of tile keys.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};

use crate::coord::TileKey;
use crate::store::{StoreError, TileStore};

/// Number of blob length lookups in flight at once.
const LOOKUP_CONCURRENCY: usize = 16;

const KB: u64 = 1024;
const MB: u64 = KB * 1024;
const GB: u64 = MB * 1024;

/// Aggregate size of a set of tile keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SizeReport {
    /// Sum of stored blob lengths
    pub bytes: u64,
    /// Keys with a stored blob
    pub present: usize,
    /// Keys absent from the store (counted as zero bytes)
    pub missing: usize,
}

impl SizeReport {
    /// Human-readable size, e.g. `"1.5 MB"`.
    pub fn display(&self) -> String {
        format_bytes(self.bytes)
    }
}

/// Sums stored blob sizes.
#[derive(Clone)]
pub struct SizeAccountant {
    tiles: Arc<dyn TileStore>,
}

impl SizeAccountant {
    pub fn new(tiles: Arc<dyn TileStore>) -> Self {
        Self { tiles }
    }

    /// Total stored bytes for `keys`.
    ///
    /// Duplicate keys are counted once. Absent keys contribute zero and
    /// are reported in [`SizeReport::missing`].
    pub async fn size_of(&self, keys: &[TileKey]) -> Result<SizeReport, StoreError> {
        let unique: HashSet<String> = keys.iter().map(TileKey::to_string).collect();

        let lengths: Vec<Option<u64>> = stream::iter(unique)
            .map(|key| {
                let tiles = Arc::clone(&self.tiles);
                async move { tiles.value_len(&key).await }
            })
            .buffer_unordered(LOOKUP_CONCURRENCY)
            .try_collect()
            .await?;

        Ok(lengths
            .into_iter()
            .fold(SizeReport::default(), |mut report, len| {
                match len {
                    Some(n) => {
                        report.bytes += n;
                        report.present += 1;
                    }
                    None => report.missing += 1,
                }
                report
            }))
    }
}

/// Formats a byte count with binary units and one decimal place.
///
/// ```
/// assert_eq!(tilevault::size::format_bytes(512), "512 B");
/// assert_eq!(tilevault::size::format_bytes(1536), "1.5 KB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
