use std::f64::consts::{FRAC_PI_2, PI, TAU};

use foundation::math::{clamp_mercator_lat, gd_inv};
use foundation::{TileGrid, TileId, TileProjection};

use crate::tile_source::{RasterTile, TileSource, TileUsage};

struct CurrentTile<'a> {
    origin_x: f64,
    origin_y: f64,
    raster: Option<&'a RasterTile>,
}

/// Maps longitude/latitude to the global pixel space of one zoom level and
/// reads texels from the tile that contains them.
///
/// The tile under the last sample is kept; a sample outside it rebases onto
/// the neighboring tile. Longitude wraps around the globe, latitude is only
/// clamped at the top and bottom of the world.
pub struct TileSampler<'a, S: TileSource + ?Sized> {
    source: &'a S,
    projection: TileProjection,
    zoom: u8,
    columns: u32,
    rows: u32,
    tile_width: f64,
    tile_height: f64,
    global_width: f64,
    global_height: f64,
    fallback: u32,
    current: Option<CurrentTile<'a>>,
    usage: TileUsage,
}

impl<'a, S: TileSource + ?Sized> TileSampler<'a, S> {
    pub fn new(source: &'a S, fallback: u32) -> Self {
        let grid: TileGrid = source.grid();
        let zoom = source.zoom();
        let columns = grid.columns(zoom).max(1);
        let rows = grid.rows(zoom).max(1);
        let tile_width = grid.tile_width.max(1) as f64;
        let tile_height = grid.tile_height.max(1) as f64;
        Self {
            source,
            projection: grid.projection,
            zoom,
            columns,
            rows,
            tile_width,
            tile_height,
            global_width: columns as f64 * tile_width,
            global_height: rows as f64 * tile_height,
            fallback,
            current: None,
            usage: TileUsage::default(),
        }
    }

    pub fn global_width(&self) -> f64 {
        self.global_width
    }

    pub fn global_height(&self) -> f64 {
        self.global_height
    }

    /// Global pixel coordinate of a longitude/latitude in radians.
    pub fn to_global(&self, lon: f64, lat: f64) -> (f64, f64) {
        let x = (lon + PI) / TAU * self.global_width;
        let y = match self.projection {
            TileProjection::Equirectangular => (FRAC_PI_2 - lat) / PI * self.global_height,
            TileProjection::Mercator => {
                (PI - gd_inv(clamp_mercator_lat(lat))) / TAU * self.global_height
            }
        };
        (x, y)
    }

    pub fn sample_lon_lat(&mut self, lon: f64, lat: f64, smooth: bool) -> u32 {
        let (x, y) = self.to_global(lon, lat);
        self.sample_global(x, y, smooth)
    }

    pub fn sample_global(&mut self, x: f64, y: f64, smooth: bool) -> u32 {
        let x = x.rem_euclid(self.global_width);
        let y = y.clamp(0.0, self.global_height - 1e-6);

        let inside = self.current.as_ref().is_some_and(|t| {
            x >= t.origin_x
                && x < t.origin_x + self.tile_width
                && y >= t.origin_y
                && y < t.origin_y + self.tile_height
        });
        if !inside {
            self.advance_tile(x, y);
        }

        let Some(current) = &self.current else {
            return self.fallback;
        };
        let Some(raster) = current.raster else {
            return self.fallback;
        };
        let lx = (x - current.origin_x) * raster.width() as f64 / self.tile_width;
        let ly = (y - current.origin_y) * raster.height() as f64 / self.tile_height;
        if smooth {
            raster.pixel_bilinear(lx, ly)
        } else {
            raster.pixel(lx, ly)
        }
    }

    fn advance_tile(&mut self, x: f64, y: f64) {
        let tx = ((x / self.tile_width) as u32).min(self.columns - 1);
        let ty = ((y / self.tile_height) as u32).min(self.rows - 1);
        let id = TileId::new(self.zoom, tx, ty);
        self.usage.mark(id);
        self.current = Some(CurrentTile {
            origin_x: tx as f64 * self.tile_width,
            origin_y: ty as f64 * self.tile_height,
            raster: self.source.tile(id),
        });
    }

    pub fn reset_usage(&mut self) {
        self.usage.reset();
        self.current = None;
    }

    pub fn flush_usage(&mut self) -> Vec<TileId> {
        self.usage.flush()
    }
}
