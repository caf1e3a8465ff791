//! High-level offline tile API.
//!
//! [`OfflineTiles`] wires the provider registry, tile fetcher, download
//! coordinator and map catalog over a pair of stores and exposes the
//! operations a client application needs.
//!
//! # Example
//!
//! ```ignore
//! use tilevault::config::load_config;
//! use tilevault::engine::OfflineTiles;
//! use tokio_util::sync::CancellationToken;
//!
//! let engine = OfflineTiles::open(&load_config()?).await?;
//! let coords = vec!["3/4/5".parse()?, "3/4/6".parse()?];
//! let report = engine
//!     .download_map("TestMap", "osm", &coords, None, CancellationToken::new())
//!     .await?;
//! for map in engine.list_maps().await? {
//!     println!("{} {}", map.name, map.size_display());
//! }
//! ```

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::catalog::{CatalogError, DeleteSummary, MapCatalog, MapManifest, MapSummary};
use crate::config::{DownloadConfig, EngineConfig};
use crate::coord::{TileCoord, TileKey};
use crate::download::{DownloadCoordinator, DownloadError, DownloadProgress, DownloadReport};
use crate::fetch::{TileBlob, TileFetcher};
use crate::provider::{
    AsyncHttpClient, AsyncReqwestClient, ProviderError, ProviderRegistry, TileProvider,
};
use crate::store::{DiskTileStore, StoreError, TileStore};

/// MIME type reported for tiles whose provider is no longer registered.
const FALLBACK_MIME: &str = "application/octet-stream";

/// Errors raised while opening an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A store could not be opened
    #[error("Failed to open storage: {0}")]
    Store(#[from] StoreError),

    /// The HTTP client could not be created
    #[error("Failed to create HTTP client: {0}")]
    Provider(#[from] ProviderError),
}

/// Offline map tile engine.
pub struct OfflineTiles<C = AsyncReqwestClient> {
    registry: Arc<ProviderRegistry>,
    catalog: Arc<MapCatalog>,
    coordinator: DownloadCoordinator<C>,
}

impl OfflineTiles<AsyncReqwestClient> {
    /// Opens disk-backed stores under the configured directory with the
    /// built-in providers and a reqwest client.
    pub async fn open(config: &EngineConfig) -> Result<Self, EngineError> {
        let tiles = DiskTileStore::open(config.storage.tiles_dir()).await?;
        let manifests = DiskTileStore::open(config.storage.maps_dir()).await?;
        let client =
            AsyncReqwestClient::with_options(&config.download.user_agent, config.download.timeout)?;

        info!(dir = %config.storage.directory.display(), "Offline tile engine opened");

        Ok(Self::new(
            ProviderRegistry::builtin(),
            client,
            Arc::new(tiles),
            Arc::new(manifests),
            config.download.clone(),
        ))
    }
}

impl<C: AsyncHttpClient + 'static> OfflineTiles<C> {
    /// Builds an engine from explicit parts.
    pub fn new(
        registry: ProviderRegistry,
        client: C,
        tiles: Arc<dyn TileStore>,
        manifests: Arc<dyn TileStore>,
        download: DownloadConfig,
    ) -> Self {
        let registry = Arc::new(registry);
        let catalog = Arc::new(MapCatalog::new(tiles, manifests));
        let fetcher = Arc::new(
            TileFetcher::new(Arc::clone(&registry), client).with_timeout(download.timeout),
        );
        let coordinator = DownloadCoordinator::new(fetcher, Arc::clone(&catalog), download);

        Self {
            registry,
            catalog,
            coordinator,
        }
    }

    /// Registered providers in registration order.
    pub fn providers(&self) -> impl Iterator<Item = &TileProvider> {
        self.registry.iter()
    }

    /// Downloads tiles and records them as a map.
    ///
    /// See [`DownloadCoordinator::download_map`].
    pub async fn download_map(
        &self,
        map_name: &str,
        provider_id: &str,
        coords: &[TileCoord],
        progress: Option<mpsc::Sender<DownloadProgress>>,
        cancel: CancellationToken,
    ) -> Result<DownloadReport, DownloadError> {
        self.coordinator
            .download_map(map_name, provider_id, coords, progress, cancel)
            .await
    }

    pub async fn list_maps(&self) -> Result<Vec<MapSummary>, CatalogError> {
        self.catalog.list_maps().await
    }

    pub async fn get_map(&self, name: &str) -> Result<MapManifest, CatalogError> {
        self.catalog.get_map(name).await
    }

    pub async fn delete_map(&self, name: &str) -> Result<DeleteSummary, CatalogError> {
        self.catalog.delete_map(name).await
    }

    pub async fn rename_map(&self, old: &str, new: &str) -> Result<(), CatalogError> {
        self.catalog.rename_map(old, new).await
    }

    pub async fn clear_all(&self) -> Result<(), CatalogError> {
        self.catalog.clear_all().await
    }

    pub async fn tile_count(&self) -> Result<u64, CatalogError> {
        self.catalog.tile_count().await
    }

    /// Reads a stored tile with its provider's MIME type.
    pub async fn read_tile(&self, key: &TileKey) -> Result<Option<TileBlob>, StoreError> {
        let Some(data) = self.catalog.tiles().get(&key.to_string()).await? else {
            return Ok(None);
        };
        let mime = self
            .registry
            .resolve(key.provider_id())
            .map(|p| p.mime.clone())
            .unwrap_or_else(|_| FALLBACK_MIME.to_string());
        Ok(Some(TileBlob { data, mime }))
    }
}
