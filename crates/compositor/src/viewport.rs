use std::f64::consts::{FRAC_PI_2, PI, TAU};

use foundation::GeoBox;
use foundation::math::{Vec3, rotate_with_matrix};

use crate::scanline::{FrameGeometry, ViewParams};

/// Samples per canvas axis when estimating the visible region.
const GRID_STEPS: i64 = 32;

/// Samples along the silhouette.
const RIM_STEPS: usize = 128;

/// Estimates the geographic box visible on a `width` x `height` canvas.
///
/// Samples a grid of canvas pixels plus the sphere's silhouette. A visible
/// pole extends the box to that pole and the full longitude range.
pub fn visible_bounds(width: usize, height: usize, view: &ViewParams) -> GeoBox {
    if view.radius == 0 || width == 0 || height == 0 {
        return GeoBox::world();
    }
    let geometry = FrameGeometry::new(width, height, view);
    let matrix = view.orientation.to_matrix();
    let (w, h, r) = (width as i64, height as i64, view.radius as f64);

    let mut points: Vec<(f64, f64)> = Vec::new();
    for gy in 0..=GRID_STEPS {
        let y = (h - 1) * gy / GRID_STEPS;
        for gx in 0..=GRID_STEPS {
            let x = (w - 1) * gx / GRID_STEPS;
            let v = geometry.view_vector(x, y);
            if v.x * v.x + v.y * v.y <= 1.0 {
                points.push(geometry.lon_lat(x, y));
            }
        }
    }
    for i in 0..RIM_STEPS {
        let angle = i as f64 / RIM_STEPS as f64 * TAU;
        let (s, c) = angle.sin_cos();
        let x = (w / 2) as f64 + c * r;
        let y = (h / 2) as f64 - s * r;
        if x >= 0.0 && x < w as f64 && y >= 0.0 && y < h as f64 {
            let v = Vec3::new(c, s, 0.0);
            points.push(rotate_with_matrix(&matrix, v).to_lon_lat());
        }
    }
    if points.is_empty() {
        return GeoBox::world();
    }

    let mut north = points.iter().map(|p| p.1).fold(f64::MIN, f64::max);
    let mut south = points.iter().map(|p| p.1).fold(f64::MAX, f64::min);

    let north_visible = pole_on_canvas(&geometry, view, Vec3::NORTH);
    let south_visible = pole_on_canvas(&geometry, view, Vec3::new(0.0, -1.0, 0.0));
    if north_visible {
        north = FRAC_PI_2;
    }
    if south_visible {
        south = -FRAC_PI_2;
    }
    if north_visible || south_visible {
        return GeoBox::new(north, south, PI, -PI);
    }

    let mut lons: Vec<f64> = points.iter().map(|p| p.0).collect();
    lons.sort_by(f64::total_cmp);
    let (west, east) = longitude_extent(&lons);
    GeoBox::new(north, south, east, west)
}

fn pole_on_canvas(geometry: &FrameGeometry, view: &ViewParams, pole: Vec3) -> bool {
    let v = view.orientation.inverse().rotate(pole);
    if v.z <= 0.0 {
        return false;
    }
    let r = view.radius as f64;
    let x = (geometry.width() / 2) as f64 + r * v.x;
    let y = (geometry.height() / 2) as f64 - r * v.y;
    x >= 0.0 && x < geometry.width() as f64 && y >= 0.0 && y < geometry.height() as f64
}

/// Smallest arc `(west, east)` containing all sorted longitudes: the
/// complement of the widest gap between neighbors.
fn longitude_extent(sorted: &[f64]) -> (f64, f64) {
    let (Some(&first), Some(&last)) = (sorted.first(), sorted.last()) else {
        return (-PI, PI);
    };
    let mut widest_gap = first + TAU - last;
    let mut extent = (first, last);
    for pair in sorted.windows(2) {
        let gap = pair[1] - pair[0];
        if gap > widest_gap {
            widest_gap = gap;
            extent = (pair[1], pair[0]);
        }
    }
    extent
}
