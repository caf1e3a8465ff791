//! Core key-value persistence trait.
//!
//! `TileStore` is the storage capability the engine consumes. Two logical
//! instances are used: one holding tile blobs keyed by `provider/z/x/y`,
//! one holding map manifests keyed by map name.
//!
//! # Design Principles
//!
//! - **String keys**: human-readable, identical across backends
//! - **Vec<u8> values**: raw bytes, no serialization opinions imposed
//! - **Dyn-compatible**: uses `Pin<Box<dyn Future>>` so stores can be
//!   shared as `Arc<dyn TileStore>` and swapped for in-memory fakes

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error in a file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The key cannot be represented by this backend.
    #[error("Invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// A blocking task could not be joined.
    #[error("Failed to spawn task: {0}")]
    SpawnError(String),

    /// Backend-specific failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Durable key-value store.
///
/// All implementations must be `Send + Sync`; tile writers run on many
/// tasks at once, each with a distinct key.
pub trait TileStore: Send + Sync {
    /// Read the value stored under `key`.
    ///
    /// Returns `Ok(None)` if the key is absent.
    fn get(&self, key: &str) -> BoxFuture<'_, Result<Option<Vec<u8>>, StoreError>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: Vec<u8>) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Delete `key`.
    ///
    /// Returns `Ok(false)` if the key did not exist; a missing key is not
    /// an error.
    fn delete(&self, key: &str) -> BoxFuture<'_, Result<bool, StoreError>>;

    /// List every key currently stored, in unspecified order.
    fn keys(&self) -> BoxFuture<'_, Result<Vec<String>, StoreError>>;

    /// Remove every entry.
    fn clear(&self) -> BoxFuture<'_, Result<(), StoreError>>;

    /// Number of stored entries.
    fn count(&self) -> BoxFuture<'_, Result<u64, StoreError>>;

    /// Byte length of the value under `key`, or `None` if absent.
    ///
    /// The default reads the whole value; backends that can answer from
    /// metadata should override it.
    fn value_len(&self, key: &str) -> BoxFuture<'_, Result<Option<u64>, StoreError>> {
        let key = key.to_string();
        Box::pin(async move { Ok(self.get(&key).await?.map(|v| v.len() as u64)) })
    }

    /// Every `(key, value)` pair currently stored.
    ///
    /// Keys deleted between listing and reading are skipped.
    fn entries(&self) -> BoxFuture<'_, Result<Vec<(String, Vec<u8>)>, StoreError>> {
        Box::pin(async move {
            let mut entries = Vec::new();
            for key in self.keys().await? {
                if let Some(value) = self.get(&key).await? {
                    entries.push((key, value));
                }
            }
            Ok(entries)
        })
    }
}
