//! Key-value persistence for tiles and map manifests.
//!
//! The engine only talks to the [`TileStore`] trait. Stores are passed in
//! at construction as `Arc<dyn TileStore>`, so a catalog or coordinator
//! can run against either backend:
//!
//! - [`MemoryTileStore`]: concurrent in-memory map, used by tests
//! - [`DiskTileStore`]: one file per key under a directory

mod disk;
mod memory;
mod traits;

pub use disk::DiskTileStore;
pub use memory::MemoryTileStore;
pub use traits::{BoxFuture, StoreError, TileStore};
