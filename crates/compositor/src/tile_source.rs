use std::collections::BTreeSet;

use foundation::{TileGrid, TileId};

use crate::canvas::{blue, green, red, rgb};

/// Decoded raster tile, `0xAARRGGBB` pixels in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterTile {
    width: u32,
    height: u32,
    pixels: Vec<u32>,
}

impl RasterTile {
    /// `None` when `pixels` does not hold exactly `width * height` entries.
    pub fn new(width: u32, height: u32, pixels: Vec<u32>) -> Option<Self> {
        if width == 0 || height == 0 || pixels.len() != (width as usize) * (height as usize) {
            return None;
        }
        Some(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> u32) -> Self {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Nearest pixel at a local coordinate; out-of-range values are clamped.
    pub fn pixel(&self, x: f64, y: f64) -> u32 {
        let xi = clamp_coord(x, self.width);
        let yi = clamp_coord(y, self.height);
        self.pixels[yi * self.width as usize + xi]
    }

    /// Bilinear blend of the pixel at `(x, y)` with its right and lower
    /// neighbors, weighted by the fractional position.
    pub fn pixel_bilinear(&self, x: f64, y: f64) -> u32 {
        let x0 = clamp_coord(x, self.width);
        let y0 = clamp_coord(y, self.height);
        let x1 = (x0 + 1).min(self.width as usize - 1);
        let y1 = (y0 + 1).min(self.height as usize - 1);
        let fx = (x - x0 as f64).clamp(0.0, 1.0);
        let fy = (y - y0 as f64).clamp(0.0, 1.0);

        let w = self.width as usize;
        let top_left = self.pixels[y0 * w + x0];
        let top_right = self.pixels[y0 * w + x1];
        let bottom_left = self.pixels[y1 * w + x0];
        let bottom_right = self.pixels[y1 * w + x1];

        let mix = |channel: fn(u32) -> u8| {
            let top = channel(top_left) as f64 * (1.0 - fx) + channel(top_right) as f64 * fx;
            let bottom =
                channel(bottom_left) as f64 * (1.0 - fx) + channel(bottom_right) as f64 * fx;
            (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8
        };
        rgb(mix(red), mix(green), mix(blue))
    }
}

fn clamp_coord(v: f64, size: u32) -> usize {
    if v.is_nan() || v < 0.0 {
        0
    } else {
        (v as usize).min(size as usize - 1)
    }
}

/// Read access to resident tiles of one zoom level.
///
/// Lookups never block: a tile that is not resident yields `None` and the
/// compositor paints the fallback color.
pub trait TileSource {
    fn grid(&self) -> TileGrid;

    fn zoom(&self) -> u8;

    fn tile(&self, id: TileId) -> Option<&RasterTile>;

    /// Called once per composited frame with the tiles it touched.
    fn frame_finished(&mut self, _used: &[TileId]) {}
}

/// Tiles touched during one frame.
#[derive(Debug, Default, Clone)]
pub struct TileUsage {
    used: BTreeSet<TileId>,
}

impl TileUsage {
    pub fn reset(&mut self) {
        self.used.clear();
    }

    pub fn mark(&mut self, id: TileId) {
        self.used.insert(id);
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    /// Hands out the ids in order and starts over.
    pub fn flush(&mut self) -> Vec<TileId> {
        std::mem::take(&mut self.used).into_iter().collect()
    }
}
