use std::f64::consts::{FRAC_PI_2, PI, TAU};
use std::path::{Path, PathBuf};

use compositor::{rgb, RasterTile};
use foundation::math::gd;
use foundation::{TileId, TileProjection};
use streaming::{TileDataset, TileLoader};
use tracing::{debug, warn};

const OCEAN: u32 = rgb(0x1f, 0x4e, 0x8c);
const LAND: u32 = rgb(0x5a, 0x8f, 0x3c);
const ICE: u32 = rgb(0xee, 0xf2, 0xf5);
const GRATICULE: u32 = rgb(0xd0, 0xd0, 0xd0);

/// Degrees between graticule lines.
const GRATICULE_STEP: f64 = 15.0;

/// Synthesizes tiles from a closed-form land/ocean pattern with a graticule,
/// so the globe can be rendered without any tile data on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProceduralLoader;

impl TileLoader<RasterTile> for ProceduralLoader {
    fn load(&self, dataset: &TileDataset, id: TileId) -> Option<RasterTile> {
        let grid = dataset.grid;
        if grid.tile_width == 0 || grid.tile_height == 0 {
            return None;
        }
        if id.x >= grid.columns(id.zoom) || id.y >= grid.rows(id.zoom) {
            return None;
        }
        let columns = grid.columns(id.zoom) as f64;
        let rows = grid.rows(id.zoom) as f64;
        let (w, h) = (grid.tile_width, grid.tile_height);
        // Half a texel in degrees, so graticule lines stay one texel wide.
        let texel_deg = 180.0 / (columns * w as f64);

        Some(RasterTile::from_fn(w, h, |px, py| {
            let u = (id.x as f64 + (px as f64 + 0.5) / w as f64) / columns;
            let v = (id.y as f64 + (py as f64 + 0.5) / h as f64) / rows;
            let lon = u * TAU - PI;
            let lat = match grid.projection {
                TileProjection::Mercator => gd(PI * (1.0 - 2.0 * v)),
                TileProjection::Equirectangular => FRAC_PI_2 - v * PI,
            };
            texel_color(lon, lat, texel_deg)
        }))
    }
}

fn texel_color(lon: f64, lat: f64, half_width_deg: f64) -> u32 {
    let on_line = |deg: f64| {
        let offset = deg.rem_euclid(GRATICULE_STEP);
        offset < half_width_deg || GRATICULE_STEP - offset < half_width_deg
    };
    if on_line(lon.to_degrees()) || on_line(lat.to_degrees()) {
        return GRATICULE;
    }
    if lat.abs() > 70f64.to_radians() {
        return ICE;
    }
    let relief = (3.0 * lon).sin() * (2.0 * lat).cos()
        + 0.5 * (5.0 * lon + 1.3).cos() * (3.0 * lat).sin();
    if relief > 0.35 {
        LAND
    } else {
        OCEAN
    }
}

/// Reads tiles stored by `globe fetch`: `<root>/<dataset>/<z>/<x>/<y>.png`.
#[derive(Debug, Clone)]
pub struct DiskLoader {
    root: PathBuf,
}

impl DiskLoader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TileLoader<RasterTile> for DiskLoader {
    fn load(&self, dataset: &TileDataset, id: TileId) -> Option<RasterTile> {
        let path = self.root.join(dataset.relative_path(id));
        if !path.exists() {
            debug!(%id, "tile not on disk: {path:?}");
            return None;
        }
        let img = match image::open(&path) {
            Ok(img) => img.to_rgba8(),
            Err(err) => {
                warn!(%id, "decoding {path:?} failed: {err}");
                return None;
            }
        };
        let (w, h) = img.dimensions();
        let pixels = img.pixels().map(|p| rgb(p[0], p[1], p[2])).collect();
        RasterTile::new(w, h, pixels)
    }
}
