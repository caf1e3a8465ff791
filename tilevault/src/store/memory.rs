//! In-memory store backed by `DashMap`.
//!
//! Used for tests and for callers that do not need durability. Sharded
//! locking keeps concurrent tile writers from contending on one lock.

use dashmap::DashMap;

use crate::store::traits::{BoxFuture, StoreError, TileStore};

/// In-memory key-value store.
#[derive(Debug, Default)]
pub struct MemoryTileStore {
    entries: DashMap<String, Vec<u8>>,
}

impl MemoryTileStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TileStore for MemoryTileStore {
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, StoreError>> {
        let value = self.entries.get(key).map(|v| v.value().clone());
        Box::pin(async move { Ok(value) })
    }

    fn set(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, Result<(), StoreError>> {
        self.entries.insert(key.to_string(), value);
        Box::pin(async { Ok(()) })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>> {
        let existed = self.entries.remove(key).is_some();
        Box::pin(async move { Ok(existed) })
    }

    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>> {
        let keys = self.entries.iter().map(|e| e.key().clone()).collect();
        Box::pin(async move { Ok(keys) })
    }

    fn clear(&self) -> BoxFuture<'_, Result<(), StoreError>> {
        self.entries.clear();
        Box::pin(async { Ok(()) })
    }

    fn count(&self) -> BoxFuture<'_, Result<u64, StoreError>> {
        let count = self.entries.len() as u64;
        Box::pin(async move { Ok(count) })
    }

    fn value_len(&self, key: &str) -> BoxFuture<'_, Result<Option<u64>, StoreError>> {
        let len = self.entries.get(key).map(|v| v.value().len() as u64);
        Box::pin(async move { Ok(len) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_memory_store_set_and_get() {
        let store = MemoryTileStore::new();

        store.set("osm/1/0/0", vec![1, 2, 3]).await.unwrap();

        let value = store.get("osm/1/0/0").await.unwrap();
        assert_eq!(value, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_memory_store_get_missing() {
        let store = MemoryTileStore::new();
        assert!(store.get("nonexistent").await.unwrap().is_none());
        assert!(store.value_len("nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_store_delete() {
        let store = MemoryTileStore::new();
        store.set("key1", vec![1]).await.unwrap();

        assert!(store.delete("key1").await.unwrap());
        assert!(!store.delete("key1").await.unwrap());
        assert_eq!(store.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_memory_store_replace_existing() {
        let store = MemoryTileStore::new();
        store.set("key1", vec![1, 2, 3]).await.unwrap();
        store.set("key1", vec![4, 5, 6, 7]).await.unwrap();

        assert_eq!(store.get("key1").await.unwrap(), Some(vec![4, 5, 6, 7]));
        assert_eq!(store.value_len("key1").await.unwrap(), Some(4));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_keys_entries_and_clear() {
        let store = MemoryTileStore::new();
        store.set("a", vec![1]).await.unwrap();
        store.set("b", vec![2, 2]).await.unwrap();

        let mut keys = store.keys().await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["a".to_string(), "b".to_string()]);

        let mut entries = store.entries().await.unwrap();
        entries.sort();
        assert_eq!(
            entries,
            vec![("a".to_string(), vec![1]), ("b".to_string(), vec![2, 2])]
        );

        store.clear().await.unwrap();
        assert_eq!(store.count().await.unwrap(), 0);
        assert!(store.keys().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_store_concurrent_access() {
        let store = Arc::new(MemoryTileStore::new());
        let mut handles = Vec::new();

        for i in 0..50 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let key = format!("osm/10/{}/0", i);
                let data = vec![i as u8; 100];

                store.set(&key, data.clone()).await.unwrap();
                assert_eq!(store.get(&key).await.unwrap(), Some(data));
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.count().await.unwrap(), 50);
    }
}
