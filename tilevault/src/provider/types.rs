//! Provider types and errors

use thiserror::Error;

/// Errors that can occur during provider lookup and HTTP transport.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// No provider is registered under this id
    #[error("Unknown tile provider: {0}")]
    NotFound(String),

    /// Two providers share the same id
    #[error("Duplicate provider id: {0}")]
    DuplicateId(String),

    /// Provider id is empty or contains '/' or whitespace
    #[error("Invalid provider id: '{0}'")]
    InvalidId(String),

    /// Provider has no mirror URLs
    #[error("Provider '{0}' has no mirrors")]
    NoMirrors(String),

    /// HTTP transport failed before a response arrived
    #[error("HTTP error: {0}")]
    HttpError(String),
}

/// A remote source of raster map tiles.
///
/// Mirrors are interchangeable base URLs; a tile URL is
/// `mirror + "z/x/y" + "." + image_format`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileProvider {
    /// Stable identifier, used as the tile key prefix
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Base URLs, each ending with '/'
    pub mirrors: Vec<String>,
    /// File extension appended to tile URLs (e.g. "png")
    pub image_format: String,
    /// MIME type of stored tiles (e.g. "image/png")
    pub mime: String,
}

impl TileProvider {
    /// Creates a provider, normalizing each mirror to end with '/'.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        mirrors: impl IntoIterator<Item = impl Into<String>>,
        image_format: impl Into<String>,
        mime: impl Into<String>,
    ) -> Self {
        let mirrors = mirrors
            .into_iter()
            .map(|m| {
                let mut mirror: String = m.into();
                if !mirror.ends_with('/') {
                    mirror.push('/');
                }
                mirror
            })
            .collect();

        Self {
            id: id.into(),
            name: name.into(),
            mirrors,
            image_format: image_format.into(),
            mime: mime.into(),
        }
    }
}
