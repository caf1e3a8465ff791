//! Progress events emitted during a download batch.

use crate::coord::TileKey;

/// How one tile's attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TilePhase {
    /// Fetched and written to the tile store
    Stored,
    /// Given up on after all attempts
    Failed,
}

/// One tile finished, successfully or not.
///
/// `completed` counts finished tiles including this one. It increases by
/// exactly one per event and the last event of an uncancelled batch has
/// `completed == total`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProgress {
    pub completed: usize,
    pub total: usize,
    pub key: TileKey,
    pub phase: TilePhase,
}
