//! Single-tile network fetch.
//!
//! [`TileFetcher`] performs exactly one HTTP request for one tile. It
//! picks a mirror, builds `mirror + "z/x/y" + "." + format`, bounds the
//! request with a timeout and classifies the outcome. It never retries;
//! the download coordinator owns the retry policy and uses
//! [`FetchError::is_retryable`] to decide.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::trace;

use crate::coord::TileCoord;
use crate::provider::{AsyncHttpClient, ProviderError, ProviderRegistry, TileProvider};

/// Default per-fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Why a single tile fetch failed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Transport failure, no response received
    #[error("Network error: {0}")]
    Network(String),

    /// Server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// No response within the fetch timeout
    #[error("Timed out after {after:?} fetching {url}")]
    Timeout { url: String, after: Duration },

    /// Server answered 2xx with no bytes
    #[error("Empty response body from {url}")]
    EmptyBody { url: String },
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// Transport failures, timeouts, server errors and rate limiting are
    /// transient. Client errors such as 404 and empty bodies are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_) | FetchError::Timeout { .. } => true,
            FetchError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            FetchError::EmptyBody { .. } => false,
        }
    }
}

impl From<ProviderError> for FetchError {
    fn from(e: ProviderError) -> Self {
        FetchError::Network(e.to_string())
    }
}

/// Raw tile image bytes with their MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileBlob {
    pub data: Vec<u8>,
    pub mime: String,
}

impl TileBlob {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Fetches individual tiles from provider mirrors.
pub struct TileFetcher<C> {
    registry: Arc<ProviderRegistry>,
    client: C,
    timeout: Duration,
}

impl<C: AsyncHttpClient> TileFetcher<C> {
    pub fn new(registry: Arc<ProviderRegistry>, client: C) -> Self {
        Self {
            registry,
            client,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Sets the per-fetch timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// URL of `coord` on one randomly chosen mirror of `provider`.
    pub fn tile_url(&self, provider: &TileProvider, coord: TileCoord) -> String {
        format!(
            "{}{}.{}",
            self.registry.pick_mirror(provider),
            coord,
            provider.image_format
        )
    }

    /// Fetches one tile. Makes exactly one request.
    pub async fn fetch(
        &self,
        provider: &TileProvider,
        coord: TileCoord,
    ) -> Result<TileBlob, FetchError> {
        let url = self.tile_url(provider, coord);
        trace!(provider = %provider.id, tile = %coord, url = %url, "Fetching tile");

        let response = match tokio::time::timeout(self.timeout, self.client.get(&url)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(FetchError::Timeout {
                    url,
                    after: self.timeout,
                })
            }
        };

        if !response.is_success() {
            return Err(FetchError::HttpStatus {
                status: response.status,
                url,
            });
        }
        if response.body.is_empty() {
            return Err(FetchError::EmptyBody { url });
        }

        Ok(TileBlob {
            data: response.body,
            mime: provider.mime.clone(),
        })
    }
}
