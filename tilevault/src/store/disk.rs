//! Durable file-per-key store.
//!
//! Each entry is one file under the store directory. The key is split on
//! `/` and every segment becomes one path component, so tile keys lay out
//! as a browsable `provider/z/x/y.bin` hierarchy.
//!
//! # File Layout
//!
//! ```text
//! {root}/osm/3/4/5.bin        <- key "osm/3/4/5"
//! {root}/Lake%20Trail.bin     <- key "Lake Trail"
//! {root}/~9f86d0….bin         <- key whose encoded name is too long
//! {root}/~9f86d0….key         <- the raw segment for the entry above
//! ```
//!
//! Segments are percent-encoded: only ASCII letters, digits, `-` and `_`
//! are kept verbatim, so no segment can be `.` or `..` and every key maps
//! to exactly one path. An empty segment is written as a lone `%`.
//!
//! An encoded segment longer than 200 bytes is stored under
//! `~` plus its SHA-256 instead. `~` is always escaped by the encoding, so
//! hashed names never collide with encoded ones. The raw segment is kept
//! in a `.key` sidecar next to the hashed entry so `keys()` can recover it.
//!
//! Writes go to a temporary sibling file first and are renamed into place.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::store::traits::{BoxFuture, StoreError, TileStore};

/// Extension of value files.
const VALUE_EXTENSION: &str = "bin";

/// Extension of in-progress writes.
const TEMP_EXTENSION: &str = "tmp";

/// Extension of files holding the raw name of a hashed segment.
const SIDECAR_EXTENSION: &str = "key";

/// Marker for an empty key segment.
const EMPTY_SEGMENT: &str = "%";

/// Prefix of hashed path components.
const HASHED_PREFIX: char = '~';

/// Longest encoded segment stored verbatim. Leaves room for the extension
/// under the common 255-byte file name limit.
const MAX_SEGMENT_LEN: usize = 200;

/// Where a key lives on disk.
struct KeyLocation {
    /// Value file
    path: PathBuf,
    /// Sidecar files to write for hashed segments, with their contents
    sidecars: Vec<(PathBuf, String)>,
}

/// File-backed key-value store.
#[derive(Debug, Clone)]
pub struct DiskTileStore {
    root: PathBuf,
}

impl DiskTileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;

        info!(dir = %root.display(), "Disk store opened");

        Ok(Self { root })
    }

    /// Map a key to its value file and the sidecars it needs.
    fn locate(&self, key: &str) -> Result<KeyLocation, StoreError> {
        if key.is_empty() {
            return Err(StoreError::InvalidKey {
                key: key.to_string(),
                reason: "key is empty".to_string(),
            });
        }

        let segments: Vec<&str> = key.split('/').collect();
        let last_index = segments.len() - 1;
        let mut path = self.root.clone();
        let mut sidecars = Vec::new();

        for (i, segment) in segments.iter().enumerate() {
            let component = path_component(segment);
            if component.starts_with(HASHED_PREFIX) {
                let sidecar = path.join(format!("{}.{}", component, SIDECAR_EXTENSION));
                sidecars.push((sidecar, segment.to_string()));
            }
            if i == last_index {
                path.push(format!("{}.{}", component, VALUE_EXTENSION));
            } else {
                path.push(component);
            }
        }

        Ok(KeyLocation { path, sidecars })
    }

    fn key_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        self.locate(key).map(|location| location.path)
    }

    /// Recover the key of a value file from its path relative to the root.
    fn path_to_key(root: &Path, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(root).ok()?;
        let components: Vec<&str> = relative
            .iter()
            .map(|c| c.to_str())
            .collect::<Option<_>>()?;
        let last_index = components.len().checked_sub(1)?;

        let mut current = root.to_path_buf();
        let mut segments = Vec::with_capacity(components.len());
        for (i, component) in components.into_iter().enumerate() {
            current.push(component);
            let name = if i == last_index {
                component.strip_suffix(&format!(".{}", VALUE_EXTENSION))?
            } else {
                component
            };
            let segment = if name.starts_with(HASHED_PREFIX) {
                std::fs::read_to_string(current.with_extension(SIDECAR_EXTENSION)).ok()?
            } else {
                decode_segment(name)?
            };
            segments.push(segment);
        }
        Some(segments.join("/"))
    }

    /// Recursively collect value files.
    fn collect_value_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), StoreError> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        for entry in entries {
            let path = entry?.path();
            if path.is_dir() {
                Self::collect_value_files(&path, files)?;
            } else if path.extension().and_then(|e| e.to_str()) == Some(VALUE_EXTENSION) {
                files.push(path);
            }
        }
        Ok(())
    }

    /// Remove now-empty directories between `path` and the root, along
    /// with the sidecars of hashed ones.
    async fn prune_empty_parents(&self, path: &Path) {
        let mut current = path.parent();
        while let Some(dir) = current {
            if dir == self.root || !dir.starts_with(&self.root) {
                break;
            }
            // Fails (and stops) as soon as a directory is not empty
            if tokio::fs::remove_dir(dir).await.is_err() {
                break;
            }
            remove_sidecar(dir).await;
            current = dir.parent();
        }
    }

    async fn write_atomic(path: &Path, value: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp_path = path.with_extension(TEMP_EXTENSION);
        tokio::fs::write(&temp_path, value).await?;
        tokio::fs::rename(&temp_path, path).await
    }

    async fn write_value(location: &KeyLocation, value: &[u8]) -> std::io::Result<()> {
        Self::write_atomic(&location.path, value).await?;
        // Sidecar contents are fixed by the path, so rewriting is harmless
        for (sidecar, segment) in &location.sidecars {
            tokio::fs::write(sidecar, segment).await?;
        }
        Ok(())
    }
}

/// File name for one key segment, before any extension.
fn path_component(segment: &str) -> String {
    let encoded = encode_segment(segment);
    if encoded.len() <= MAX_SEGMENT_LEN {
        return encoded;
    }
    format!("{}{:x}", HASHED_PREFIX, Sha256::digest(segment.as_bytes()))
}

/// Delete the sidecar belonging to a hashed entry, if `entry` is one.
async fn remove_sidecar(entry: &Path) {
    let hashed = entry
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(HASHED_PREFIX));
    if hashed {
        let _ = tokio::fs::remove_file(entry.with_extension(SIDECAR_EXTENSION)).await;
    }
}

fn encode_segment(segment: &str) -> String {
    if segment.is_empty() {
        return EMPTY_SEGMENT.to_string();
    }
    let mut encoded = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }
    encoded
}

fn decode_segment(segment: &str) -> Option<String> {
    if segment == EMPTY_SEGMENT {
        return Some(String::new());
    }
    let bytes = segment.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = segment.get(i + 1..i + 3)?;
            decoded.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).ok()
}

impl TileStore for DiskTileStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, StoreError>> {
        let path = self.key_path(key);
        Box::pin(async move {
            match tokio::fs::read(path?).await {
                Ok(data) => Ok(Some(data)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn set(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, Result<(), StoreError>> {
        let location = self.locate(key);
        Box::pin(async move {
            let location = location?;
            match Self::write_value(&location, &value).await {
                // A concurrent delete may prune the parent directory between
                // create_dir_all and the write; one more attempt recreates it.
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    debug!(path = %location.path.display(), "Parent directory vanished, retrying write");
                    Self::write_value(&location, &value).await?;
                }
                result => result?,
            }
            Ok(())
        })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>> {
        let path = self.key_path(key);
        Box::pin(async move {
            let path = path?;
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    remove_sidecar(&path).await;
                    self.prune_empty_parents(&path).await;
                    Ok(true)
                }
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>> {
        let root = self.root.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || -> Result<Vec<String>, StoreError> {
                let mut files = Vec::new();
                Self::collect_value_files(&root, &mut files)?;
                Ok(files
                    .iter()
                    .filter_map(|path| Self::path_to_key(&root, path))
                    .collect())
            })
            .await
            .map_err(|e| StoreError::SpawnError(e.to_string()))?
        })
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        Box::pin(async move {
            match tokio::fs::remove_dir_all(&self.root).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            tokio::fs::create_dir_all(&self.root).await?;

            info!(dir = %self.root.display(), "Disk store cleared");
            Ok(())
        })
    }

    fn count(&self) -> BoxFuture<'_, Result<u64, StoreError>> {
        Box::pin(async move { Ok(self.keys().await?.len() as u64) })
    }

    fn value_len(&self, key: &str) -> BoxFuture<'_, Result<Option<u64>, StoreError>> {
        let path = self.key_path(key);
        Box::pin(async move {
            match tokio::fs::metadata(path?).await {
                Ok(metadata) => Ok(Some(metadata.len())),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn open_temp() -> (TempDir, DiskTileStore) {
        let dir = TempDir::new().unwrap();
        let store = DiskTileStore::open(dir.path().join("tiles")).await.unwrap();
        (dir, store)
    }

    #[test]
    fn test_segment_encoding() {
        assert_eq!(encode_segment("osm"), "osm");
        assert_eq!(encode_segment("Lake Trail"), "Lake%20Trail");
        assert_eq!(encode_segment(".."), "%2E%2E");
        assert_eq!(encode_segment(""), "%");
        assert_eq!(decode_segment("Lake%20Trail").as_deref(), Some("Lake Trail"));
        assert_eq!(decode_segment("%").as_deref(), Some(""));
        assert_eq!(decode_segment("%ZZ"), None);
        assert_eq!(decode_segment("%4"), None);
    }

    #[test]
    fn test_unicode_segment() {
        let encoded = encode_segment("Gipfel über");
        assert!(encoded.is_ascii());
        assert_eq!(decode_segment(&encoded).as_deref(), Some("Gipfel über"));
    }

    #[tokio::test]
    async fn test_tile_key_layout() {
        let (_dir, store) = open_temp().await;
        store.set("osm/3/4/5", vec![1, 2, 3]).await.unwrap();

        assert!(store.root.join("osm/3/4/5.bin").is_file());
        assert_eq!(store.get("osm/3/4/5").await.unwrap(), Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let (_dir, store) = open_temp().await;
        assert!(store.get("osm/0/0/0").await.unwrap().is_none());
        assert!(store.value_len("osm/0/0/0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_key_rejected() {
        let (_dir, store) = open_temp().await;
        let result = store.set("", vec![1]).await;
        assert!(matches!(result, Err(StoreError::InvalidKey { .. })));
    }

    #[tokio::test]
    async fn test_dot_segments_stay_inside_root() {
        let (dir, store) = open_temp().await;
        store.set("../escape", vec![9]).await.unwrap();

        assert!(!dir.path().join("escape.bin").exists());
        assert_eq!(store.keys().await.unwrap(), vec!["../escape".to_string()]);
    }

    #[tokio::test]
    async fn test_keys_roundtrip_odd_names() {
        let (_dir, store) = open_temp().await;
        let names = ["Lake Trail", "a//b", "trailing/", "osm/3/4", "osm/3/4/5"];
        for name in names {
            store.set(name, vec![0]).await.unwrap();
        }

        let mut keys = store.keys().await.unwrap();
        keys.sort();
        let mut expected: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        expected.sort();
        assert_eq!(keys, expected);
        assert_eq!(store.count().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_delete_prunes_directories() {
        let (_dir, store) = open_temp().await;
        store.set("osm/3/4/5", vec![1]).await.unwrap();

        assert!(store.delete("osm/3/4/5").await.unwrap());
        assert!(!store.delete("osm/3/4/5").await.unwrap());
        assert!(!store.root.join("osm").exists());
        assert!(store.root.exists());
    }

    #[tokio::test]
    async fn test_value_len_from_metadata() {
        let (_dir, store) = open_temp().await;
        store.set("osm/1/1/1", vec![0u8; 1234]).await.unwrap();
        assert_eq!(store.value_len("osm/1/1/1").await.unwrap(), Some(1234));
    }

    #[tokio::test]
    async fn test_clear() {
        let (_dir, store) = open_temp().await;
        store.set("osm/1/0/0", vec![1]).await.unwrap();
        store.set("osm/1/0/1", vec![2]).await.unwrap();

        store.clear().await.unwrap();

        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.root.is_dir());
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = DiskTileStore::open(dir.path()).await.unwrap();
            store.set("osm/2/1/1", vec![7, 7]).await.unwrap();
        }
        let store = DiskTileStore::open(dir.path()).await.unwrap();
        assert_eq!(store.get("osm/2/1/1").await.unwrap(), Some(vec![7, 7]));
    }

    #[tokio::test]
    async fn test_long_unicode_name_is_hashed() {
        let (_dir, store) = open_temp().await;
        // Every CJK character encodes to nine bytes
        let name = "東京都庁舎から富士山を望む夏季ハイキングコース地図の完全版と詳細な周辺地域の観光案内";
        assert!(encode_segment(name).len() > MAX_SEGMENT_LEN);

        store.set(name, vec![4, 2]).await.unwrap();

        assert_eq!(store.get(name).await.unwrap(), Some(vec![4, 2]));
        assert_eq!(store.value_len(name).await.unwrap(), Some(2));
        assert_eq!(store.keys().await.unwrap(), vec![name.to_string()]);
        assert_eq!(store.count().await.unwrap(), 1);

        let file_name = store.key_path(name).unwrap();
        let file_name = file_name.file_name().unwrap().to_str().unwrap();
        assert!(file_name.starts_with(HASHED_PREFIX));
        assert!(file_name.len() < 80);
    }

    #[tokio::test]
    async fn test_long_directory_segment() {
        let (_dir, store) = open_temp().await;
        let parent = "x".repeat(MAX_SEGMENT_LEN + 1);
        let key = format!("{}/inner", parent);

        store.set(&key, vec![1]).await.unwrap();
        store.set(&format!("{}/other", parent), vec![2]).await.unwrap();

        let mut keys = store.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec![key.clone(), format!("{}/other", parent)]);

        assert!(store.delete(&key).await.unwrap());
        assert!(store.delete(&format!("{}/other", parent)).await.unwrap());
        assert_eq!(std::fs::read_dir(&store.root).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_delete_hashed_removes_sidecar() {
        let (_dir, store) = open_temp().await;
        let name = "%".repeat(MAX_SEGMENT_LEN);

        store.set(&name, vec![1]).await.unwrap();
        assert_eq!(std::fs::read_dir(&store.root).unwrap().count(), 2);

        assert!(store.delete(&name).await.unwrap());
        assert_eq!(std::fs::read_dir(&store.root).unwrap().count(), 0);
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[test]
    fn test_short_segments_not_hashed() {
        assert_eq!(path_component("osm"), "osm");
        let limit = "a".repeat(MAX_SEGMENT_LEN);
        assert_eq!(path_component(&limit), limit);
        assert!(path_component(&"a".repeat(MAX_SEGMENT_LEN + 1)).starts_with(HASHED_PREFIX));
    }

    #[tokio::test]
    async fn test_concurrent_writes() {
        let (_dir, store) = open_temp().await;
        let store = Arc::new(store);
        let mut handles = Vec::new();

        for i in 0..32u32 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .set(&format!("osm/5/{}/{}", i % 4, i), vec![i as u8; 10])
                    .await
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.count().await.unwrap(), 32);
    }
}
