//! Map manifest type and its persisted encoding.
//!
//! The manifest store is keyed by map name; each value is a JSON array of
//! tile key strings:
//!
//! ```text
//! "TestMap" => ["osm/3/4/5","osm/3/4/6"]
//! ```

use serde::{Deserialize, Serialize};

use crate::coord::{CoordError, TileCoord, TileKey};

/// A named, ordered list of tile keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapManifest {
    pub name: String,
    pub tile_keys: Vec<TileKey>,
}

impl MapManifest {
    pub fn new(name: impl Into<String>, tile_keys: Vec<TileKey>) -> Self {
        Self {
            name: name.into(),
            tile_keys,
        }
    }

    /// Manifest for `coords` fetched from `provider_id`, in input order.
    pub fn for_coords(
        name: impl Into<String>,
        provider_id: &str,
        coords: &[TileCoord],
    ) -> Result<Self, CoordError> {
        let tile_keys = coords
            .iter()
            .map(|&coord| TileKey::new(provider_id, coord))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(name, tile_keys))
    }

    /// Value bytes written to the manifest store.
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.tile_keys)
    }

    /// Parses a stored manifest value.
    pub fn decode(name: &str, bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let tile_keys: Vec<TileKey> = serde_json::from_slice(bytes)?;
        Ok(Self::new(name, tile_keys))
    }

    pub fn len(&self) -> usize {
        self.tile_keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tile_keys.is_empty()
    }
}
