//! Slippy-map tile coordinates (Web Mercator XYZ scheme).

use crate::{BoundingBox, TilerError, TilerResult};
use serde::{Deserialize, Serialize};

/// Deepest zoom level accepted by the tile endpoints.
pub const MAX_ZOOM: u32 = 30;

/// A tile coordinate (z/x/y).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (x)
    pub x: u32,
    /// Row (y)
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// Build a coordinate and check it addresses an existing tile.
    pub fn checked(z: u32, x: u32, y: u32) -> TilerResult<Self> {
        let coord = Self::new(z, x, y);
        coord.validate()?;
        Ok(coord)
    }

    /// Number of tiles along each axis at this zoom.
    pub fn matrix_size(&self) -> u64 {
        1u64 << self.z.min(MAX_ZOOM)
    }

    /// Ensure the zoom is supported and x/y fall inside the tile matrix.
    pub fn validate(&self) -> TilerResult<()> {
        if self.z > MAX_ZOOM {
            return Err(TilerError::invalid_parameter(
                "z",
                format!("zoom {} exceeds maximum {}", self.z, MAX_ZOOM),
            ));
        }
        let n = self.matrix_size();
        if self.x as u64 >= n || self.y as u64 >= n {
            return Err(TilerError::invalid_parameter(
                "tile",
                format!("{} is outside the {}x{} matrix", self.cache_key(), n, n),
            ));
        }
        Ok(())
    }

    /// Generate a key string, also used in log fields.
    pub fn cache_key(&self) -> String {
        format!("{}/{}/{}", self.z, self.x, self.y)
    }

    /// Lat/lon bounds covered by this tile.
    pub fn latlon_bounds(&self) -> BoundingBox {
        tile_to_latlon_bounds(self)
    }
}

impl std::fmt::Display for TileCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.z, self.x, self.y)
    }
}

/// Convert lat/lon to Web Mercator tile coordinates.
pub fn latlon_to_tile(lat: f64, lon: f64, zoom: u32) -> TileCoord {
    let n = (1u64 << zoom.min(MAX_ZOOM)) as f64;

    let x = ((lon + 180.0) / 360.0 * n).floor().clamp(0.0, n - 1.0) as u32;
    let lat_rad = lat.to_radians();
    let y = ((1.0 - lat_rad.tan().asinh() / std::f64::consts::PI) / 2.0 * n)
        .floor()
        .clamp(0.0, n - 1.0) as u32;

    TileCoord { z: zoom, x, y }
}

/// Convert Web Mercator tile coordinates to lat/lon bounds.
pub fn tile_to_latlon_bounds(coord: &TileCoord) -> BoundingBox {
    let n = coord.matrix_size() as f64;

    let lon_min = coord.x as f64 / n * 360.0 - 180.0;
    let lon_max = (coord.x as f64 + 1.0) / n * 360.0 - 180.0;

    let lat_max = (std::f64::consts::PI * (1.0 - 2.0 * coord.y as f64 / n))
        .sinh()
        .atan()
        .to_degrees();
    let lat_min = (std::f64::consts::PI * (1.0 - 2.0 * (coord.y as f64 + 1.0) / n))
        .sinh()
        .atan()
        .to_degrees();

    BoundingBox::new(lon_min, lat_min, lon_max, lat_max)
}
