use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::bounds::GeoBox;
use crate::math::{clamp_mercator_lat, gd, gd_inv};

/// Deepest level a dataset may declare; tile indices still fit in `u32`.
pub const MAX_ZOOM: u8 = 30;

/// Address of one cell in the quad-tree tile grid.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileId {
    pub zoom: u8,
    pub x: u32,
    pub y: u32,
}

impl TileId {
    pub fn new(zoom: u8, x: u32, y: u32) -> Self {
        Self { zoom, x, y }
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.zoom, self.x, self.y)
    }
}

/// How tile rows map to latitude.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileProjection {
    /// Slippy-map rows, valid inside the ±85° band.
    #[default]
    Mercator,
    /// Rows evenly spaced in latitude from pole to pole.
    Equirectangular,
}

/// Shape of a tiled dataset: how many tiles level 0 has and how many pixels
/// each tile spans.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileGrid {
    pub level_zero_columns: u32,
    pub level_zero_rows: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub projection: TileProjection,
}

impl Default for TileGrid {
    fn default() -> Self {
        Self {
            level_zero_columns: 1,
            level_zero_rows: 1,
            tile_width: 256,
            tile_height: 256,
            projection: TileProjection::Mercator,
        }
    }
}

impl TileGrid {
    /// Tile columns at `zoom`, saturating at `u32::MAX`.
    pub fn columns(&self, zoom: u8) -> u32 {
        scale_count(self.level_zero_columns, zoom)
    }

    /// Tile rows at `zoom`, saturating at `u32::MAX`.
    pub fn rows(&self, zoom: u8) -> u32 {
        scale_count(self.level_zero_rows, zoom)
    }

    pub fn level_zero_width(&self) -> u32 {
        self.tile_width * self.level_zero_columns
    }

    pub fn level_zero_height(&self) -> u32 {
        self.tile_height * self.level_zero_rows
    }

    /// Tile column containing `lon` (radians), clamped to the grid.
    pub fn lon_to_tile_x(&self, lon: f64, zoom: u8) -> u32 {
        let columns = self.columns(zoom);
        let x = (0.5 * (lon / PI + 1.0) * columns as f64).floor();
        clamp_index(x, columns)
    }

    /// Tile row containing `lat` (radians), clamped to the grid.
    pub fn lat_to_tile_y(&self, lat: f64, zoom: u8) -> u32 {
        let rows = self.rows(zoom);
        let fraction = match self.projection {
            TileProjection::Mercator => 0.5 * (1.0 - gd_inv(clamp_mercator_lat(lat)) / PI),
            TileProjection::Equirectangular => 0.5 - lat / PI,
        };
        clamp_index((fraction * rows as f64).floor(), rows)
    }

    pub fn tile_bounds(&self, id: TileId) -> GeoBox {
        let columns = self.columns(id.zoom) as f64;
        let rows = self.rows(id.zoom) as f64;
        let west = id.x as f64 / columns * TAU - PI;
        let east = (id.x + 1) as f64 / columns * TAU - PI;
        let row_lat = |y: u32| match self.projection {
            TileProjection::Mercator => gd(PI * (1.0 - 2.0 * y as f64 / rows)),
            TileProjection::Equirectangular => FRAC_PI_2 - y as f64 / rows * PI,
        };
        GeoBox::new(row_lat(id.y), row_lat(id.y + 1), east, west)
    }
}

fn scale_count(level_zero: u32, zoom: u8) -> u32 {
    let scaled = u64::from(level_zero) << u32::from(zoom.min(32));
    scaled.min(u64::from(u32::MAX)) as u32
}

fn clamp_index(v: f64, count: u32) -> u32 {
    if v.is_nan() || v < 0.0 {
        0
    } else {
        (v as u64).min(count.saturating_sub(1) as u64) as u32
    }
}
