//! Named map catalog.
//!
//! A map is a manifest (name → ordered tile keys) stored in the manifest
//! store; its tiles live in the tile store under their [`TileKey`]s.
//! [`MapCatalog`] lists, renames and deletes maps while keeping the two
//! stores consistent:
//!
//! - delete removes tiles first and the manifest last, so an interrupted
//!   delete leaves the manifest behind as a handle to retry with
//! - tiles still listed by another manifest are kept
//! - mutations of one map name are serialized by a per-name lock
//! - a delete holds the catalog exclusively from its reference scan until
//!   its manifest is gone, so no manifest can appear or disappear under it
//!
//! A manifest that cannot be decoded is logged and skipped by listings and
//! reference scans, and can still be deleted.

mod manifest;

pub use manifest::MapManifest;

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use futures::stream::{self, StreamExt, TryStreamExt};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::coord::TileKey;
use crate::size::{SizeAccountant, SizeReport};
use crate::store::{StoreError, TileStore};

/// Number of tile deletions in flight at once.
const DELETE_CONCURRENCY: usize = 16;

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// No map with this name exists
    #[error("Map not found: {0}")]
    NotFound(String),

    /// A map with this name already exists
    #[error("Map already exists: {0}")]
    Conflict(String),

    /// Map names must be non-empty
    #[error("Invalid map name: '{0}'")]
    InvalidName(String),

    /// A stored manifest could not be parsed
    #[error("Corrupt manifest for map '{name}': {reason}")]
    CorruptManifest { name: String, reason: String },

    /// Underlying store failure
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Tiles were wiped but the manifests were not
    #[error("Tiles were cleared but clearing map manifests failed: {0}")]
    ManifestWipe(#[source] StoreError),
}

/// One entry of [`MapCatalog::list_maps`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapSummary {
    pub name: String,
    pub tile_keys: Vec<TileKey>,
    pub size: SizeReport,
}

impl MapSummary {
    pub fn size_bytes(&self) -> u64 {
        self.size.bytes
    }

    /// Human-readable size, e.g. `"2.3 MB"`.
    pub fn size_display(&self) -> String {
        self.size.display()
    }
}

/// Outcome of [`MapCatalog::delete_map`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    /// Tile blobs removed from the tile store
    pub tiles_deleted: usize,
    /// Keys with no stored blob
    pub tiles_missing: usize,
    /// Keys kept because another map lists them
    pub tiles_shared: usize,
}

/// Manages map manifests and the tiles they own.
pub struct MapCatalog {
    tiles: Arc<dyn TileStore>,
    manifests: Arc<dyn TileStore>,
    sizer: SizeAccountant,
    locks: DashMap<String, Arc<Mutex<()>>>,
    /// Shared by manifest writers, exclusive for deletes and clears
    references: RwLock<()>,
}

impl MapCatalog {
    pub fn new(tiles: Arc<dyn TileStore>, manifests: Arc<dyn TileStore>) -> Self {
        Self {
            sizer: SizeAccountant::new(Arc::clone(&tiles)),
            tiles,
            manifests,
            locks: DashMap::new(),
            references: RwLock::new(()),
        }
    }

    pub fn tiles(&self) -> &Arc<dyn TileStore> {
        &self.tiles
    }

    fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(name.to_string()).or_default().value())
    }

    async fn read_manifest(&self, name: &str) -> Result<Option<MapManifest>, CatalogError> {
        match self.manifests.get(name).await? {
            Some(bytes) => MapManifest::decode(name, &bytes)
                .map(Some)
                .map_err(|e| CatalogError::CorruptManifest {
                    name: name.to_string(),
                    reason: e.to_string(),
                }),
            None => Ok(None),
        }
    }

    /// Persists `manifest`, replacing any manifest with the same name.
    ///
    /// Returns `true` if an existing map was replaced.
    pub async fn write_manifest(&self, manifest: &MapManifest) -> Result<bool, CatalogError> {
        if manifest.name.is_empty() {
            return Err(CatalogError::InvalidName(manifest.name.clone()));
        }
        let bytes = manifest
            .encode()
            .map_err(|e| CatalogError::CorruptManifest {
                name: manifest.name.clone(),
                reason: e.to_string(),
            })?;

        let _shared = self.references.read().await;
        let lock = self.lock_for(&manifest.name);
        let _guard = lock.lock().await;

        let replaced = self.manifests.get(&manifest.name).await?.is_some();
        if replaced {
            warn!(map = %manifest.name, "Replacing existing map manifest");
        }
        self.manifests.set(&manifest.name, bytes).await?;

        debug!(map = %manifest.name, tiles = manifest.len(), "Manifest written");
        Ok(replaced)
    }

    /// Reads one map's manifest.
    pub async fn get_map(&self, name: &str) -> Result<MapManifest, CatalogError> {
        self.read_manifest(name)
            .await?
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }

    /// Every map with its computed storage size, sorted by name.
    pub async fn list_maps(&self) -> Result<Vec<MapSummary>, CatalogError> {
        let mut names = self.manifests.keys().await?;
        names.sort();

        let mut maps = Vec::with_capacity(names.len());
        for name in names {
            let manifest = match self.read_manifest(&name).await {
                Ok(Some(manifest)) => manifest,
                // Deleted or renamed since the key listing
                Ok(None) => continue,
                Err(CatalogError::CorruptManifest { name, reason }) => {
                    warn!(map = %name, error = %reason, "Skipping unreadable map manifest");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let size = self.sizer.size_of(&manifest.tile_keys).await?;
            maps.push(MapSummary {
                name: manifest.name,
                tile_keys: manifest.tile_keys,
                size,
            });
        }
        Ok(maps)
    }

    /// Tile keys listed by any manifest other than `except`.
    async fn keys_referenced_elsewhere(&self, except: &str) -> Result<HashSet<String>, CatalogError> {
        let mut referenced = HashSet::new();
        for name in self.manifests.keys().await? {
            if name == except {
                continue;
            }
            match self.read_manifest(&name).await {
                Ok(Some(manifest)) => {
                    referenced.extend(manifest.tile_keys.iter().map(TileKey::to_string));
                }
                Ok(None) => {}
                Err(CatalogError::CorruptManifest { name, reason }) => {
                    warn!(map = %name, error = %reason, "Unreadable manifest ignored in reference scan");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(referenced)
    }

    /// Deletes a map's tiles and then its manifest.
    ///
    /// Tiles that another map also lists are left in place. Missing tiles
    /// are not an error. If a tile deletion fails, the manifest is kept.
    /// A manifest that cannot be decoded is removed without touching tiles.
    pub async fn delete_map(&self, name: &str) -> Result<DeleteSummary, CatalogError> {
        let _exclusive = self.references.write().await;

        let manifest = match self.get_map(name).await {
            Ok(manifest) => manifest,
            Err(CatalogError::CorruptManifest { reason, .. }) => {
                self.manifests.delete(name).await?;
                warn!(map = %name, error = %reason, "Deleted unreadable map manifest");
                return Ok(DeleteSummary::default());
            }
            Err(e) => return Err(e),
        };
        let shared = self.keys_referenced_elsewhere(name).await?;

        let unique: HashSet<String> = manifest.tile_keys.iter().map(TileKey::to_string).collect();
        let (kept, owned): (Vec<String>, Vec<String>) =
            unique.into_iter().partition(|key| shared.contains(key));

        let results: Vec<bool> = stream::iter(owned)
            .map(|key| {
                let tiles = Arc::clone(&self.tiles);
                async move { tiles.delete(&key).await }
            })
            .buffer_unordered(DELETE_CONCURRENCY)
            .try_collect()
            .await?;

        self.manifests.delete(name).await?;

        let summary = DeleteSummary {
            tiles_deleted: results.iter().filter(|&&deleted| deleted).count(),
            tiles_missing: results.iter().filter(|&&deleted| !deleted).count(),
            tiles_shared: kept.len(),
        };
        info!(
            map = %name,
            deleted = summary.tiles_deleted,
            missing = summary.tiles_missing,
            shared = summary.tiles_shared,
            "Map deleted"
        );
        Ok(summary)
    }

    /// Renames a map. Tiles are not touched.
    ///
    /// Renaming a map to its own name succeeds without changes.
    pub async fn rename_map(&self, old: &str, new: &str) -> Result<(), CatalogError> {
        if new.is_empty() {
            return Err(CatalogError::InvalidName(new.to_string()));
        }
        if old == new {
            self.get_map(old).await?;
            return Ok(());
        }

        let _shared = self.references.read().await;

        // Lock both names in a fixed order so opposing renames cannot deadlock
        let (first, second) = if old < new { (old, new) } else { (new, old) };
        let first_lock = self.lock_for(first);
        let second_lock = self.lock_for(second);
        let _first = first_lock.lock().await;
        let _second = second_lock.lock().await;

        let bytes = self
            .manifests
            .get(old)
            .await?
            .ok_or_else(|| CatalogError::NotFound(old.to_string()))?;
        if self.manifests.get(new).await?.is_some() {
            return Err(CatalogError::Conflict(new.to_string()));
        }

        self.manifests.set(new, bytes).await?;
        self.manifests.delete(old).await?;

        info!(from = %old, to = %new, "Map renamed");
        Ok(())
    }

    /// Deletes every tile and then every manifest.
    pub async fn clear_all(&self) -> Result<(), CatalogError> {
        let _exclusive = self.references.write().await;

        self.tiles.clear().await?;
        self.manifests
            .clear()
            .await
            .map_err(CatalogError::ManifestWipe)?;

        info!("All offline tiles and maps cleared");
        Ok(())
    }

    /// Number of stored tile blobs.
    pub async fn tile_count(&self) -> Result<u64, CatalogError> {
        Ok(self.tiles.count().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{BoxFuture, MemoryTileStore};

    struct Fixture {
        tiles: Arc<MemoryTileStore>,
        manifests: Arc<MemoryTileStore>,
        catalog: MapCatalog,
    }

    fn fixture() -> Fixture {
        let tiles = Arc::new(MemoryTileStore::new());
        let manifests = Arc::new(MemoryTileStore::new());
        let catalog = MapCatalog::new(tiles.clone(), manifests.clone());
        Fixture {
            tiles,
            manifests,
            catalog,
        }
    }

    fn manifest(name: &str, keys: &[&str]) -> MapManifest {
        MapManifest::new(name, keys.iter().map(|k| k.parse().unwrap()).collect())
    }

    async fn store_map(f: &Fixture, name: &str, keys: &[&str], size: usize) {
        for key in keys {
            f.tiles.set(key, vec![0; size]).await.unwrap();
        }
        f.catalog.write_manifest(&manifest(name, keys)).await.unwrap();
    }

    #[tokio::test]
    async fn test_list_maps_with_sizes() {
        let f = fixture();
        store_map(&f, "B", &["osm/1/0/0"], 10).await;
        store_map(&f, "A", &["osm/3/4/5", "osm/3/4/6"], 100).await;

        let maps = f.catalog.list_maps().await.unwrap();

        assert_eq!(maps.len(), 2);
        assert_eq!(maps[0].name, "A");
        assert_eq!(maps[0].size_bytes(), 200);
        assert_eq!(maps[0].size_display(), "200 B");
        assert_eq!(maps[1].name, "B");
        assert_eq!(maps[1].size_bytes(), 10);
    }

    #[tokio::test]
    async fn test_map_with_missing_tiles_is_listed() {
        let f = fixture();
        f.catalog
            .write_manifest(&manifest("Ghost", &["osm/3/4/5"]))
            .await
            .unwrap();

        let maps = f.catalog.list_maps().await.unwrap();
        assert_eq!(maps[0].size_bytes(), 0);
        assert_eq!(maps[0].size.missing, 1);
    }

    #[tokio::test]
    async fn test_write_manifest_reports_replacement() {
        let f = fixture();
        assert!(!f.catalog.write_manifest(&manifest("M", &[])).await.unwrap());
        assert!(f
            .catalog
            .write_manifest(&manifest("M", &["osm/0/0/0"]))
            .await
            .unwrap());
        assert_eq!(f.catalog.get_map("M").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let f = fixture();
        let err = f.catalog.write_manifest(&manifest("", &[])).await;
        assert!(matches!(err, Err(CatalogError::InvalidName(_))));
    }

    #[tokio::test]
    async fn test_delete_map() {
        let f = fixture();
        store_map(&f, "M", &["osm/3/4/5", "osm/3/4/6"], 10).await;
        store_map(&f, "Other", &["osm/5/0/0"], 10).await;

        let summary = f.catalog.delete_map("M").await.unwrap();

        assert_eq!(summary.tiles_deleted, 2);
        assert!(f.tiles.get("osm/3/4/5").await.unwrap().is_none());
        assert!(f.tiles.get("osm/3/4/6").await.unwrap().is_none());
        assert!(f.tiles.get("osm/5/0/0").await.unwrap().is_some());
        let names: Vec<String> = f
            .catalog
            .list_maps()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["Other"]);
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_tiles() {
        let f = fixture();
        f.tiles.set("osm/3/4/5", vec![1]).await.unwrap();
        f.catalog
            .write_manifest(&manifest("M", &["osm/3/4/5", "osm/3/4/6"]))
            .await
            .unwrap();

        let summary = f.catalog.delete_map("M").await.unwrap();

        assert_eq!(summary.tiles_deleted, 1);
        assert_eq!(summary.tiles_missing, 1);
        assert!(f.manifests.get("M").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_keeps_shared_tiles() {
        let f = fixture();
        store_map(&f, "A", &["osm/3/4/5", "osm/3/4/6"], 10).await;
        store_map(&f, "B", &["osm/3/4/6"], 10).await;

        let summary = f.catalog.delete_map("A").await.unwrap();

        assert_eq!(summary.tiles_deleted, 1);
        assert_eq!(summary.tiles_shared, 1);
        assert!(f.tiles.get("osm/3/4/5").await.unwrap().is_none());
        assert!(f.tiles.get("osm/3/4/6").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_unknown_map() {
        let f = fixture();
        let err = f.catalog.delete_map("nope").await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(name) if name == "nope"));
    }

    #[tokio::test]
    async fn test_rename_map() {
        let f = fixture();
        store_map(&f, "A", &["osm/3/4/5", "osm/3/4/6"], 50).await;
        let before = f.catalog.list_maps().await.unwrap();

        f.catalog.rename_map("A", "B").await.unwrap();

        let after = f.catalog.list_maps().await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].name, "B");
        assert_eq!(after[0].tile_keys, before[0].tile_keys);
        assert_eq!(after[0].size, before[0].size);
        assert_eq!(f.tiles.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_rename_conflict_leaves_both() {
        let f = fixture();
        store_map(&f, "A", &["osm/3/4/5"], 10).await;
        store_map(&f, "B", &["osm/3/4/6"], 10).await;

        let err = f.catalog.rename_map("A", "B").await.unwrap_err();

        assert!(matches!(err, CatalogError::Conflict(name) if name == "B"));
        assert_eq!(f.catalog.get_map("A").await.unwrap(), manifest("A", &["osm/3/4/5"]));
        assert_eq!(f.catalog.get_map("B").await.unwrap(), manifest("B", &["osm/3/4/6"]));
    }

    #[tokio::test]
    async fn test_rename_not_found() {
        let f = fixture();
        let err = f.catalog.rename_map("A", "B").await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(name) if name == "A"));
    }

    #[tokio::test]
    async fn test_rename_to_same_name() {
        let f = fixture();
        store_map(&f, "A", &["osm/3/4/5"], 10).await;

        f.catalog.rename_map("A", "A").await.unwrap();
        assert!(f.catalog.get_map("A").await.is_ok());

        let err = f.catalog.rename_map("Z", "Z").await.unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_concurrent_opposing_renames() {
        let f = Arc::new(fixture());
        store_map(&f, "A", &["osm/3/4/5"], 10).await;

        let a = {
            let f = Arc::clone(&f);
            tokio::spawn(async move { f.catalog.rename_map("A", "B").await })
        };
        let b = {
            let f = Arc::clone(&f);
            tokio::spawn(async move { f.catalog.rename_map("B", "A").await })
        };
        let (ra, rb) = (a.await.unwrap(), b.await.unwrap());

        // Serialized: at least one succeeds and exactly one map remains
        assert!(ra.is_ok() || rb.is_ok());
        assert_eq!(f.catalog.list_maps().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_manifest() {
        let f = fixture();
        f.manifests.set("Bad", b"garbage".to_vec()).await.unwrap();

        let err = f.catalog.get_map("Bad").await.unwrap_err();
        assert!(matches!(err, CatalogError::CorruptManifest { .. }));
    }

    #[tokio::test]
    async fn test_corrupt_manifest_does_not_block_others() {
        let f = fixture();
        store_map(&f, "Good", &["osm/3/4/5"], 10).await;
        f.manifests.set("Bad", b"garbage".to_vec()).await.unwrap();

        let maps = f.catalog.list_maps().await.unwrap();
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].name, "Good");

        let summary = f.catalog.delete_map("Good").await.unwrap();
        assert_eq!(summary.tiles_deleted, 1);

        // The unreadable entry itself can still be removed
        assert_eq!(f.catalog.delete_map("Bad").await.unwrap(), DeleteSummary::default());
        assert_eq!(f.manifests.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let f = fixture();
        store_map(&f, "A", &["osm/3/4/5"], 10).await;
        store_map(&f, "B", &["osm/3/4/6"], 10).await;

        f.catalog.clear_all().await.unwrap();

        assert_eq!(f.catalog.tile_count().await.unwrap(), 0);
        assert!(f.catalog.list_maps().await.unwrap().is_empty());
    }

    /// Store whose `clear` always fails.
    struct UnclearableStore(MemoryTileStore);

    impl TileStore for UnclearableStore {
        fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, StoreError>> {
            self.0.get(key)
        }
        fn set(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, Result<(), StoreError>> {
            self.0.set(key, value)
        }
        fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>> {
            self.0.delete(key)
        }
        fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>> {
            self.0.keys()
        }
        fn clear(&self) -> BoxFuture<'_, Result<(), StoreError>> {
            Box::pin(async { Err(StoreError::Backend("read-only".to_string())) })
        }
        fn count(&self) -> BoxFuture<'_, Result<u64, StoreError>> {
            self.0.count()
        }
    }

    #[tokio::test]
    async fn test_clear_all_surfaces_manifest_failure() {
        let tiles = Arc::new(MemoryTileStore::new());
        let manifests = Arc::new(UnclearableStore(MemoryTileStore::new()));
        let catalog = MapCatalog::new(tiles.clone(), manifests.clone());
        tiles.set("osm/3/4/5", vec![1]).await.unwrap();
        catalog
            .write_manifest(&manifest("A", &["osm/3/4/5"]))
            .await
            .unwrap();

        let err = catalog.clear_all().await.unwrap_err();

        assert!(matches!(err, CatalogError::ManifestWipe(_)));
        assert_eq!(tiles.count().await.unwrap(), 0);
        assert_eq!(catalog.list_maps().await.unwrap().len(), 1);
    }

    /// Tile store whose deletes take a while, so concurrent deletes overlap.
    struct SlowDeleteStore(MemoryTileStore);

    impl TileStore for SlowDeleteStore {
        fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, StoreError>> {
            self.0.get(key)
        }
        fn set(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, Result<(), StoreError>> {
            self.0.set(key, value)
        }
        fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>> {
            let key = key.to_string();
            Box::pin(async move {
                tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                self.0.delete(&key).await
            })
        }
        fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>> {
            self.0.keys()
        }
        fn clear(&self) -> BoxFuture<'_, Result<(), StoreError>> {
            self.0.clear()
        }
        fn count(&self) -> BoxFuture<'_, Result<u64, StoreError>> {
            self.0.count()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_deletes_of_sharing_maps() {
        let tiles = Arc::new(SlowDeleteStore(MemoryTileStore::new()));
        let manifests = Arc::new(MemoryTileStore::new());
        let catalog = Arc::new(MapCatalog::new(tiles.clone(), manifests.clone()));
        for key in ["osm/3/4/5", "osm/3/4/6", "osm/3/4/7"] {
            tiles.set(key, vec![1]).await.unwrap();
        }
        catalog
            .write_manifest(&manifest("A", &["osm/3/4/5", "osm/3/4/6"]))
            .await
            .unwrap();
        catalog
            .write_manifest(&manifest("B", &["osm/3/4/5", "osm/3/4/7"]))
            .await
            .unwrap();

        let a = {
            let catalog = Arc::clone(&catalog);
            tokio::spawn(async move { catalog.delete_map("A").await })
        };
        let b = {
            let catalog = Arc::clone(&catalog);
            tokio::spawn(async move { catalog.delete_map("B").await })
        };
        let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

        // Whichever delete ran second owned the shared tile
        assert_eq!(a.tiles_shared + b.tiles_shared, 1);
        assert_eq!(a.tiles_deleted + b.tiles_deleted, 3);
        assert!(catalog.list_maps().await.unwrap().is_empty());
        assert_eq!(tiles.count().await.unwrap(), 0);
    }
}
