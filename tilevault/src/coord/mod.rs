//! Coordinate conversion module
//!
//! Provides slippy-map tile coordinates, the provider-scoped [`TileKey`]
//! used as the storage key for tile blobs, and conversions between
//! geographic coordinates (latitude/longitude) and Web Mercator tiles.

mod types;

pub use types::{
    CoordError, GeoBounds, TileCoord, TileKey, MAX_LAT, MAX_LON, MAX_ZOOM, MIN_LAT, MIN_LON,
    MIN_ZOOM,
};

pub(crate) use types::is_valid_provider_id;

use std::f64::consts::PI;
use std::ops::RangeInclusive;

/// Converts geographic coordinates to the tile containing them.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to 22)
///
/// Points on the east or south edge of the world map are assigned to the
/// last column or row.
#[inline]
pub fn to_tile_coords(lat: f64, lon: f64, zoom: u8) -> Result<TileCoord, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=MAX_LON).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let n = 2.0_f64.powi(zoom as i32);
    let max_index = (1u64 << zoom) - 1;

    let x = ((lon + 180.0) / 360.0 * n) as u64;

    let lat_rad = lat * PI / 180.0;
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n) as u64;

    TileCoord::new(zoom, x.min(max_index) as u32, y.min(max_index) as u32)
}

/// Column and row ranges covered by `bounds` at `zoom`.
fn tile_span(
    bounds: &GeoBounds,
    zoom: u8,
) -> Result<(RangeInclusive<u32>, RangeInclusive<u32>), CoordError> {
    let north_west = to_tile_coords(bounds.north, bounds.west, zoom)?;
    let south_east = to_tile_coords(bounds.south, bounds.east, zoom)?;
    Ok((north_west.x..=south_east.x, north_west.y..=south_east.y))
}

/// Lists every tile that intersects `bounds` for each zoom in `zooms`.
///
/// Tiles are ordered by zoom, then column, then row.
pub fn tiles_in_bounds(
    bounds: &GeoBounds,
    zooms: RangeInclusive<u8>,
) -> Result<Vec<TileCoord>, CoordError> {
    if *zooms.end() > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(*zooms.end()));
    }

    let mut tiles = Vec::new();
    for zoom in zooms {
        let (xs, ys) = tile_span(bounds, zoom)?;
        for x in xs {
            for y in ys.clone() {
                tiles.push(TileCoord { zoom, x, y });
            }
        }
    }

    Ok(tiles)
}

/// Number of tiles [`tiles_in_bounds`] would return, without listing them.
pub fn count_tiles_in_bounds(
    bounds: &GeoBounds,
    zooms: RangeInclusive<u8>,
) -> Result<u64, CoordError> {
    if *zooms.end() > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(*zooms.end()));
    }

    let mut count = 0u64;
    for zoom in zooms {
        let (xs, ys) = tile_span(bounds, zoom)?;
        let columns = (*xs.end() - *xs.start()) as u64 + 1;
        let rows = (*ys.end() - *ys.start()) as u64 + 1;
        count += columns * rows;
    }
    Ok(count)
}
