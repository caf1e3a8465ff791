//! Map download orchestration.
//!
//! [`DownloadCoordinator::download_map`] turns a list of tile coordinates
//! into a stored map:
//!
//! 1. resolve the provider and write the manifest
//! 2. fetch and store every tile with bounded concurrency and retries
//! 3. report progress per tile and return a [`DownloadReport`]

mod coordinator;
mod progress;
mod report;

pub use coordinator::DownloadCoordinator;
pub use progress::{DownloadProgress, TilePhase};
pub use report::{DownloadOutcome, DownloadReport, FailedTile};

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::coord::CoordError;
use crate::provider::ProviderError;

/// Errors that prevent a download batch from starting.
///
/// Per-tile failures are not errors; they are listed in the report.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Provider id is not registered
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// A tile key could not be formed
    #[error("Invalid tile: {0}")]
    InvalidTile(#[from] CoordError),

    /// The manifest could not be written
    #[error("Failed to record map: {0}")]
    Catalog(#[from] CatalogError),
}
