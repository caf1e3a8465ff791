//! Tile provider catalog and network transport
//!
//! A [`TileProvider`] describes a remote tile source (id, mirrors, image
//! format). The [`ProviderRegistry`] resolves providers by id and spreads
//! requests across mirrors. HTTP access goes through [`AsyncHttpClient`]
//! so tests can substitute a scripted client.
//!
//! ```ignore
//! use tilevault::provider::{AsyncReqwestClient, ProviderRegistry};
//!
//! let registry = ProviderRegistry::builtin();
//! let osm = registry.resolve("osm")?;
//! let url = format!("{}3/4/5.{}", registry.pick_mirror(osm), osm.image_format);
//! ```

mod http;
mod registry;
mod types;

pub use http::{AsyncHttpClient, AsyncReqwestClient, HttpResponse, DEFAULT_USER_AGENT};
pub use registry::ProviderRegistry;
pub use types::{ProviderError, TileProvider};

#[cfg(test)]
pub use http::tests::MockAsyncHttpClient;
