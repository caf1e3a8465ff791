//! Static catalog of tile providers with random mirror selection.

use std::collections::HashMap;

use rand::seq::IndexedRandom;

use super::types::{ProviderError, TileProvider};
use crate::coord::is_valid_provider_id;

/// Immutable lookup table of tile providers.
///
/// Built once at startup; lookups never mutate state, so a registry can
/// be shared across tasks behind an `Arc` without locking.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<TileProvider>,
    index: HashMap<String, usize>,
}

impl ProviderRegistry {
    /// Builds a registry from a list of providers.
    ///
    /// # Errors
    ///
    /// Fails if an id is invalid or repeated, or if a provider has no
    /// mirrors.
    pub fn new(providers: Vec<TileProvider>) -> Result<Self, ProviderError> {
        let mut index = HashMap::with_capacity(providers.len());

        for (i, provider) in providers.iter().enumerate() {
            if !is_valid_provider_id(&provider.id) {
                return Err(ProviderError::InvalidId(provider.id.clone()));
            }
            if provider.mirrors.is_empty() {
                return Err(ProviderError::NoMirrors(provider.id.clone()));
            }
            if index.insert(provider.id.clone(), i).is_some() {
                return Err(ProviderError::DuplicateId(provider.id.clone()));
            }
        }

        Ok(Self { providers, index })
    }

    /// The built-in provider set.
    pub fn builtin() -> Self {
        let providers = builtin_providers();
        let index = providers
            .iter()
            .enumerate()
            .map(|(i, p)| (p.id.clone(), i))
            .collect();
        Self { providers, index }
    }

    /// Looks up a provider by id.
    pub fn resolve(&self, id: &str) -> Result<&TileProvider, ProviderError> {
        self.index
            .get(id)
            .map(|&i| &self.providers[i])
            .ok_or_else(|| ProviderError::NotFound(id.to_string()))
    }

    /// Picks one of the provider's mirrors uniformly at random.
    pub fn pick_mirror<'a>(&self, provider: &'a TileProvider) -> &'a str {
        provider
            .mirrors
            .choose(&mut rand::rng())
            .map(String::as_str)
            // Registries reject providers without mirrors
            .unwrap_or_default()
    }

    /// Providers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &TileProvider> {
        self.providers.iter()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_providers() -> Vec<TileProvider> {
    vec![
        TileProvider::new(
            "osm",
            "OpenStreetMap",
            [
                "https://a.tile.openstreetmap.org/",
                "https://b.tile.openstreetmap.org/",
                "https://c.tile.openstreetmap.org/",
            ],
            "png",
            "image/png",
        ),
        TileProvider::new(
            "opentopomap",
            "OpenTopoMap",
            [
                "https://a.tile.opentopomap.org/",
                "https://b.tile.opentopomap.org/",
                "https://c.tile.opentopomap.org/",
            ],
            "png",
            "image/png",
        ),
        TileProvider::new(
            "carto-light",
            "CARTO Light",
            [
                "https://a.basemaps.cartocdn.com/light_all/",
                "https://b.basemaps.cartocdn.com/light_all/",
                "https://c.basemaps.cartocdn.com/light_all/",
                "https://d.basemaps.cartocdn.com/light_all/",
            ],
            "png",
            "image/png",
        ),
    ]
}
