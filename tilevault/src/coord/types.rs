//! Tile coordinate, tile key and bounding box types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum zoom level.
pub const MIN_ZOOM: u8 = 0;

/// Maximum zoom level accepted for a tile coordinate.
pub const MAX_ZOOM: u8 = 22;

/// Minimum latitude representable in Web Mercator.
pub const MIN_LAT: f64 = -85.05112878;

/// Maximum latitude representable in Web Mercator.
pub const MAX_LAT: f64 = 85.05112878;

/// Minimum longitude.
pub const MIN_LON: f64 = -180.0;

/// Maximum longitude.
pub const MAX_LON: f64 = 180.0;

/// Errors produced while parsing or validating coordinates and keys.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoordError {
    #[error("Invalid latitude: {0}")]
    InvalidLatitude(f64),

    #[error("Invalid longitude: {0}")]
    InvalidLongitude(f64),

    #[error("Invalid zoom level: {0} (max 22)")]
    InvalidZoom(u8),

    #[error("Tile {x}/{y} is outside the grid at zoom {zoom}")]
    OutOfRange { zoom: u8, x: u32, y: u32 },

    #[error("Malformed tile coordinate '{0}' - expected 'z/x/y'")]
    MalformedCoordinate(String),

    #[error("Malformed tile key '{0}' - expected 'provider/z/x/y'")]
    MalformedKey(String),

    #[error("Invalid bounds: {0}")]
    InvalidBounds(String),
}

/// A slippy-map tile address.
///
/// Rendered as `z/x/y`, which is also the provider-agnostic string form
/// appended to a mirror URL and to a provider id to build a [`TileKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    /// Zoom level
    pub zoom: u8,
    /// Column (west to east)
    pub x: u32,
    /// Row (north to south)
    pub y: u32,
}

impl TileCoord {
    /// Creates a tile coordinate, checking that it lies inside the grid.
    pub fn new(zoom: u8, x: u32, y: u32) -> Result<Self, CoordError> {
        if zoom > MAX_ZOOM {
            return Err(CoordError::InvalidZoom(zoom));
        }
        let coord = Self { zoom, x, y };
        let n = coord.grid_size();
        if u64::from(x) >= n || u64::from(y) >= n {
            return Err(CoordError::OutOfRange { zoom, x, y });
        }
        Ok(coord)
    }

    /// Number of tiles along one axis at this coordinate's zoom.
    pub fn grid_size(&self) -> u64 {
        1u64 << self.zoom
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

impl FromStr for TileCoord {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || CoordError::MalformedCoordinate(s.to_string());

        let mut parts = s.split('/');
        let (Some(z), Some(x), Some(y), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        let zoom: u8 = parse_canonical(z).ok_or_else(malformed)?;
        let x: u32 = parse_canonical(x).ok_or_else(malformed)?;
        let y: u32 = parse_canonical(y).ok_or_else(malformed)?;

        Self::new(zoom, x, y)
    }
}

/// Parses a number written the way `Display` writes it: plain digits, no
/// sign, no leading zeros. Anything else would name a different stored key.
fn parse_canonical<T: FromStr>(digits: &str) -> Option<T> {
    let canonical = !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit())
        && (digits == "0" || !digits.starts_with('0'));
    if !canonical {
        return None;
    }
    digits.parse().ok()
}

/// Storage key of one tile blob: `{provider_id}/{z}/{x}/{y}`.
///
/// The provider prefix keeps identical coordinates from different
/// providers apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TileKey {
    provider_id: String,
    coord: TileCoord,
}

impl TileKey {
    /// Builds a key for `coord` under `provider_id`.
    pub fn new(provider_id: &str, coord: TileCoord) -> Result<Self, CoordError> {
        if !is_valid_provider_id(provider_id) {
            return Err(CoordError::MalformedKey(format!("{}/{}", provider_id, coord)));
        }
        Ok(Self {
            provider_id: provider_id.to_string(),
            coord,
        })
    }

    /// The provider prefix.
    pub fn provider_id(&self) -> &str {
        &self.provider_id
    }

    /// The tile coordinate suffix.
    pub fn coord(&self) -> TileCoord {
        self.coord
    }
}

/// A provider id is a non-empty token without `/` or whitespace.
pub(crate) fn is_valid_provider_id(id: &str) -> bool {
    !id.is_empty() && !id.chars().any(|c| c == '/' || c.is_whitespace())
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider_id, self.coord)
    }
}

impl FromStr for TileKey {
    type Err = CoordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (provider_id, coord) = s
            .split_once('/')
            .ok_or_else(|| CoordError::MalformedKey(s.to_string()))?;
        let coord = coord
            .parse::<TileCoord>()
            .map_err(|_| CoordError::MalformedKey(s.to_string()))?;
        Self::new(provider_id, coord).map_err(|_| CoordError::MalformedKey(s.to_string()))
    }
}

impl TryFrom<String> for TileKey {
    type Error = CoordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TileKey> for String {
    fn from(key: TileKey) -> Self {
        key.to_string()
    }
}

/// A geographic bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    /// Creates a bounding box, rejecting inverted or out-of-range edges.
    ///
    /// Latitudes beyond the Web Mercator limits are clamped; a box lying
    /// entirely beyond them is rejected.
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Result<Self, CoordError> {
        for lat in [south, north] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(CoordError::InvalidLatitude(lat));
            }
        }
        for lon in [west, east] {
            if !(MIN_LON..=MAX_LON).contains(&lon) {
                return Err(CoordError::InvalidLongitude(lon));
            }
        }
        if south > north {
            return Err(CoordError::InvalidBounds(format!(
                "south ({}) is above north ({})",
                south, north
            )));
        }
        if west > east {
            return Err(CoordError::InvalidBounds(format!(
                "west ({}) is east of east ({})",
                west, east
            )));
        }

        if south > MAX_LAT || north < MIN_LAT {
            return Err(CoordError::InvalidBounds(format!(
                "latitudes {}..{} lie outside the Web Mercator range",
                south, north
            )));
        }

        Ok(Self {
            south: south.clamp(MIN_LAT, MAX_LAT),
            west,
            north: north.clamp(MIN_LAT, MAX_LAT),
            east,
        })
    }
}

impl FromStr for GeoBounds {
    type Err = CoordError;

    /// Parses `south,west,north,east`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values: Vec<f64> = s
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .map_err(|_| CoordError::InvalidBounds(s.to_string()))?;

        match values.as_slice() {
            [south, west, north, east] => Self::new(*south, *west, *north, *east),
            _ => Err(CoordError::InvalidBounds(format!(
                "'{}' - expected 'south,west,north,east'",
                s
            ))),
        }
    }
}
