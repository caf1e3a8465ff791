//! TileVault - Offline map tile cache
//!
//! This library downloads raster map tiles from remote tile providers,
//! stores them keyed by provider and coordinate, and groups them into
//! named maps that can be listed, renamed and deleted as a unit.
//!
//! # High-Level API
//!
//! For most use cases, the [`engine`] module provides a simplified facade:
//!
//! ```ignore
//! use tilevault::config::EngineConfig;
//! use tilevault::engine::OfflineTiles;
//! use tokio_util::sync::CancellationToken;
//!
//! let engine = OfflineTiles::open(&EngineConfig::default()).await?;
//! let coords = vec!["3/4/5".parse()?, "3/4/6".parse()?];
//! let report = engine
//!     .download_map("TestMap", "osm", &coords, None, CancellationToken::new())
//!     .await?;
//! ```

pub mod catalog;
pub mod config;
pub mod coord;
pub mod download;
pub mod engine;
pub mod fetch;
pub mod logging;
pub mod provider;
pub mod size;
pub mod store;

/// Version of the tilevault library and CLI.
///
/// This is synchronized across all components in the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
