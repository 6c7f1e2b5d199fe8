//! Scanline texture mapping of a sphere.
//!
//! Each visible row is walked in steps of an interpolation stride `n`: anchor
//! pixels get the full view-vector rotation and lon/lat conversion, the
//! `n - 1` pixels between two anchors are interpolated in texture space.
//! Rows passing the projected north pole and anchor pairs straddling the
//! antimeridian fall back to exact sampling.

use std::f64::consts::{PI, TAU};
use std::ops::Range;

use foundation::math::{Quaternion, RotationMatrix, Vec3, normalize_lon, rotate_with_matrix};
use foundation::TileId;
use tracing::debug;

use crate::canvas::Canvas;
use crate::config::CompositorConfig;
use crate::quality::MapQuality;
use crate::sampler::TileSampler;
use crate::stride::{frame_stride, optimal_stride};
use crate::tile_source::TileSource;

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ViewParams {
    /// Projected sphere radius in pixels.
    pub radius: u32,
    /// Rotates view-space directions into planet-fixed ones.
    pub orientation: Quaternion,
    pub quality: MapQuality,
}

impl ViewParams {
    pub fn new(radius: u32, orientation: Quaternion, quality: MapQuality) -> Self {
        Self {
            radius,
            orientation,
            quality,
        }
    }
}

/// Screen position of the north pole for one frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PoleProjection {
    pub x: i64,
    pub y: i64,
    /// The pole is on the hemisphere facing the viewer.
    pub visible: bool,
}

/// Placement of the projected sphere on the canvas.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FrameGeometry {
    width: i64,
    height: i64,
    radius: i64,
    matrix: RotationMatrix,
}

impl FrameGeometry {
    pub fn new(width: usize, height: usize, view: &ViewParams) -> Self {
        Self {
            width: width as i64,
            height: height as i64,
            radius: view.radius as i64,
            matrix: view.orientation.to_matrix(),
        }
    }

    pub fn width(&self) -> i64 {
        self.width
    }

    pub fn height(&self) -> i64 {
        self.height
    }

    /// The sphere reaches every canvas corner.
    pub fn covers_canvas(&self) -> bool {
        (self.width * self.width + self.height * self.height) / 4 < self.radius * self.radius
    }

    /// Rows touched by the sphere. `skip` trims the last row when scanlines
    /// are duplicated.
    pub fn row_range(&self, skip: i64) -> Range<i64> {
        let half_h = self.height / 2;
        let top = (half_h - self.radius).max(0);
        let bottom = if top == 0 {
            self.height - skip
        } else {
            (top + 2 * self.radius - skip).min(self.height)
        };
        top..bottom.max(top)
    }

    /// Horizontal span `[left, right)` of the sphere's silhouette on row `y`
    /// and whether the silhouette edge is on screen.
    pub fn row_span(&self, y: i64) -> (i64, i64, bool) {
        let half_w = self.width / 2;
        let dy = y - self.height / 2;
        let rx = ((self.radius * self.radius - dy * dy).max(0) as f64).sqrt() as i64;
        if half_w - rx > 0 {
            let left = half_w - rx;
            (left, (left + 2 * rx).min(self.width), true)
        } else {
            (0, self.width, false)
        }
    }

    /// Unit-sphere point under pixel `(x, y)` in view space. Outside the
    /// silhouette the depth is clamped to zero.
    pub fn view_vector(&self, x: i64, y: i64) -> Vec3 {
        let inv = 1.0 / self.radius as f64;
        let qx = (x - self.width / 2) as f64 * inv;
        let qy = (self.height / 2 - y) as f64 * inv;
        let qz2 = 1.0 - qx * qx - qy * qy;
        let qz = if qz2 > 0.0 { qz2.sqrt() } else { 0.0 };
        Vec3::new(qx, qy, qz)
    }

    /// Longitude/latitude in radians under pixel `(x, y)`.
    pub fn lon_lat(&self, x: i64, y: i64) -> (f64, f64) {
        rotate_with_matrix(&self.matrix, self.view_vector(x, y)).to_lon_lat()
    }

    pub fn north_pole(&self, orientation: Quaternion) -> PoleProjection {
        let pole = orientation.inverse().rotate(Vec3::NORTH);
        let r = self.radius as f64;
        PoleProjection {
            x: self.width / 2 + (r * pole.x) as i64,
            y: self.height / 2 - (r * pole.y) as i64,
            visible: pole.z > 0.0,
        }
    }
}

/// Bookkeeping scoped to one composite call.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScanlineFrameState {
    pub stride: usize,
    pub smooth: bool,
    pub interlaced: bool,
    pub pole: PoleProjection,
    pub prev_lon: f64,
    pub prev_lat: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    pub stride: usize,
    pub rows: usize,
    pub exact_samples: usize,
    pub interpolated_samples: usize,
    pub tiles_used: Vec<TileId>,
}

/// Longitudes between two anchors whose straight path would cross the back
/// of the sphere: `n - 1` steps of `(2π - |Δlon|) / n` through the
/// antimeridian, each normalized into `(-π, π]`.
pub fn dateline_longitudes(prev_lon: f64, lon: f64, n: usize) -> impl Iterator<Item = f64> {
    let step = (TAU - (lon - prev_lon).abs()) / n as f64;
    let direction = if prev_lon < lon { -1.0 } else { 1.0 };
    (1..n).map(move |j| normalize_lon(prev_lon + direction * step * j as f64))
}

/// Anchor range of a row: pixels in `[left, right]` may be interpolated.
fn interpolation_bounds(x_left: i64, x_right: i64, n: i64, edge_visible: bool) -> (i64, i64) {
    if edge_visible {
        (n * (x_left / n + 1), n * (x_right / n - 1))
    } else {
        (1, n * (x_right / n - 1) + 1)
    }
}

pub struct SphericalCompositor {
    config: CompositorConfig,
    width: usize,
    n_best: usize,
}

impl SphericalCompositor {
    pub fn new(config: CompositorConfig) -> Self {
        Self {
            config,
            width: 0,
            n_best: 1,
        }
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Recomputes the best stride for a new canvas width.
    pub fn resize(&mut self, width: usize) {
        if width != self.width {
            self.width = width;
            self.n_best = optimal_stride(width);
            debug!(width, n_best = self.n_best, "compositor resized");
        }
    }

    pub fn n_best(&self) -> usize {
        self.n_best
    }

    /// Composites the visible hemisphere into `canvas`.
    pub fn render<S: TileSource + ?Sized>(
        &mut self,
        canvas: &mut Canvas,
        view: &ViewParams,
        source: &mut S,
    ) -> FrameReport {
        self.resize(canvas.width());
        canvas.fill(self.config.background);

        if view.radius == 0 || canvas.width() == 0 || canvas.height() == 0 {
            source.frame_finished(&[]);
            return FrameReport::default();
        }

        let geometry = FrameGeometry::new(canvas.width(), canvas.height(), view);
        let mut state = ScanlineFrameState {
            stride: frame_stride(self.n_best, view.quality, geometry.covers_canvas()),
            smooth: view.quality.is_smooth(),
            interlaced: self.config.interlaced || view.quality.duplicates_scanlines(),
            pole: geometry.north_pole(view.orientation),
            prev_lon: 0.0,
            prev_lat: 0.0,
        };

        let mut report = FrameReport {
            stride: state.stride,
            ..FrameReport::default()
        };
        let used = {
            let mut sampler = TileSampler::new(&*source, self.config.fallback_color);
            sampler.reset_usage();
            scan(canvas, &geometry, &mut state, &mut sampler, &mut report);
            sampler.flush_usage()
        };
        source.frame_finished(&used);

        debug!(
            stride = report.stride,
            quality = ?view.quality,
            exact = report.exact_samples,
            interpolated = report.interpolated_samples,
            tiles = used.len(),
            "frame composited"
        );
        report.tiles_used = used;
        report
    }
}

fn scan<S: TileSource + ?Sized>(
    canvas: &mut Canvas,
    geometry: &FrameGeometry,
    state: &mut ScanlineFrameState,
    sampler: &mut TileSampler<'_, S>,
    report: &mut FrameReport,
) {
    let n = state.stride as i64;
    let skip = i64::from(state.interlaced);
    let rows = geometry.row_range(skip);
    let pole_band = 0.75 * n as f64;

    let mut y = rows.start;
    while y < rows.end {
        let (x_left, x_right, edge_visible) = geometry.row_span(y);
        let (ip_left, ip_right) = interpolation_bounds(x_left, x_right, n, edge_visible);
        let crossing_pole = state.pole.visible && ((y - state.pole.y).abs() as f64) <= pole_band;

        let mut x = x_left;
        while x < x_right {
            let mut interpolate = false;
            if n > 1 && x >= ip_left && x <= ip_right {
                let near_pole = crossing_pole
                    && x + n - 1 >= state.pole.x - 2 * n
                    && x <= state.pole.x + 2 * n;
                if !near_pole {
                    x += n - 1;
                    interpolate = true;
                }
            }

            let (lon, lat) = geometry.lon_lat(x, y);
            if interpolate {
                fill_between_anchors(canvas, y as usize, x, lon, lat, state, sampler);
                report.interpolated_samples += state.stride - 1;
            }
            if x < geometry.width() {
                let color = sampler.sample_lon_lat(lon, lat, state.smooth);
                canvas.set_pixel(x as usize, y as usize, color);
                report.exact_samples += 1;
            }
            state.prev_lon = lon;
            state.prev_lat = lat;
            x += 1;
        }
        report.rows += 1;

        if state.interlaced && y + 1 < rows.end {
            canvas.copy_row_span(y as usize, y as usize + 1, x_left as usize, x_right as usize);
            report.rows += 1;
            y += 1;
        }
        y += 1;
    }
}

/// Fills the `n - 1` pixels left of the anchor at `anchor_x`.
fn fill_between_anchors<S: TileSource + ?Sized>(
    canvas: &mut Canvas,
    y: usize,
    anchor_x: i64,
    lon: f64,
    lat: f64,
    state: &ScanlineFrameState,
    sampler: &mut TileSampler<'_, S>,
) {
    let n = state.stride;
    let first = (anchor_x - n as i64 + 1) as usize;

    if (lon - state.prev_lon).abs() >= PI {
        let lat_step = (lat - state.prev_lat) / n as f64;
        for (j, step_lon) in dateline_longitudes(state.prev_lon, lon, n).enumerate() {
            let step_lat = state.prev_lat + lat_step * (j + 1) as f64;
            let color = sampler.sample_lon_lat(step_lon, step_lat, state.smooth);
            canvas.set_pixel(first + j, y, color);
        }
        return;
    }

    let (x0, y0) = sampler.to_global(state.prev_lon, state.prev_lat);
    let (x1, y1) = sampler.to_global(lon, lat);
    let dx = (x1 - x0) / n as f64;
    let dy = (y1 - y0) / n as f64;

    let mut last_raw = None;
    let mut unfiltered: Option<(usize, f64, f64)> = None;
    for j in 1..n {
        let gx = x0 + dx * j as f64;
        let gy = y0 + dy * j as f64;
        let raw = sampler.sample_global(gx, gy, false);
        let pos = first + j - 1;

        let color = if !state.smooth {
            raw
        } else if last_raw != Some(raw) {
            // Color edge: filter this texel and the unfiltered one before it.
            if let Some((px, bx, by)) = unfiltered.take() {
                let blended = sampler.sample_global(bx, by, true);
                canvas.set_pixel(px, y, blended);
            }
            sampler.sample_global(gx, gy, true)
        } else {
            unfiltered = Some((pos, gx, gy));
            raw
        };
        last_raw = Some(raw);
        canvas.set_pixel(pos, y, color);
    }
}

#[cfg(test)]
mod tests {
    use super::{FrameGeometry, SphericalCompositor, ViewParams, dateline_longitudes};
    use crate::canvas::{Canvas, blue, green, red, rgb};
    use crate::config::CompositorConfig;
    use crate::quality::MapQuality;
    use crate::sampler::TileSampler;
    use crate::tile_source::{RasterTile, TileSource};
    use foundation::math::{Quaternion, normalize_lon};
    use foundation::{TileGrid, TileId, TileProjection};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::f64::consts::{PI, TAU};

    const BACKGROUND: u32 = 0xff00_0000;

    /// Two 256-pixel equirectangular tiles whose red channel follows
    /// `cos(lon)` and green channel the row index.
    struct World {
        grid: TileGrid,
        tiles: BTreeMap<TileId, RasterTile>,
        finished: Vec<Vec<TileId>>,
    }

    impl World {
        fn new() -> Self {
            let grid = TileGrid {
                level_zero_columns: 2,
                level_zero_rows: 1,
                tile_width: 256,
                tile_height: 256,
                projection: TileProjection::Equirectangular,
            };
            let mut tiles = BTreeMap::new();
            for tx in 0..2u32 {
                let tile = RasterTile::from_fn(256, 256, |x, y| {
                    let gx = (tx * 256 + x) as f64;
                    let lon = (gx + 0.5) / 512.0 * TAU - PI;
                    let r = (128.0 + 127.0 * lon.cos()).round() as u8;
                    rgb(r, y as u8, tx as u8)
                });
                tiles.insert(TileId::new(0, tx, 0), tile);
            }
            Self {
                grid,
                tiles,
                finished: Vec::new(),
            }
        }
    }

    impl TileSource for World {
        fn grid(&self) -> TileGrid {
            self.grid
        }

        fn zoom(&self) -> u8 {
            0
        }

        fn tile(&self, id: TileId) -> Option<&RasterTile> {
            self.tiles.get(&id)
        }

        fn frame_finished(&mut self, used: &[TileId]) {
            self.finished.push(used.to_vec());
        }
    }

    fn render(world: &mut World, size: usize, view: ViewParams) -> Canvas {
        let mut compositor = SphericalCompositor::new(CompositorConfig {
            background: BACKGROUND,
            ..CompositorConfig::default()
        });
        let mut canvas = Canvas::new(size, size, BACKGROUND);
        compositor.render(&mut canvas, &view, world);
        canvas
    }

    /// Exact per-pixel rendition of the silhouette.
    fn reference(world: &World, size: usize, view: &ViewParams, smooth: bool) -> Canvas {
        let geometry = FrameGeometry::new(size, size, view);
        let mut sampler = TileSampler::new(world, 0);
        let mut canvas = Canvas::new(size, size, BACKGROUND);
        for y in geometry.row_range(0) {
            let (left, right, _) = geometry.row_span(y);
            for x in left..right {
                let (lon, lat) = geometry.lon_lat(x, y);
                let color = sampler.sample_lon_lat(lon, lat, smooth);
                canvas.set_pixel(x as usize, y as usize, color);
            }
        }
        canvas
    }

    fn max_channel_diff(a: u32, b: u32) -> u8 {
        [
            red(a).abs_diff(red(b)),
            green(a).abs_diff(green(b)),
            blue(a).abs_diff(blue(b)),
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    #[test]
    fn print_quality_is_exact() {
        let mut world = World::new();
        let view = ViewParams::new(
            90,
            Quaternion::from_view_center(0.7, 0.4),
            MapQuality::Print,
        );
        let canvas = render(&mut world, 200, view);
        let expected = reference(&world, 200, &view, true);
        assert!(canvas == expected, "print output differs from exact mapping");
    }

    #[test]
    fn normal_quality_stays_close_to_exact() {
        for center_lon in [0.0, PI] {
            let mut world = World::new();
            let view = ViewParams::new(
                1000,
                Quaternion::from_view_center(center_lon, 0.0),
                MapQuality::Normal,
            );
            let canvas = render(&mut world, 201, view);
            let expected = reference(&world, 201, &view, false);
            for y in 0..201 {
                for x in 0..201 {
                    let diff = max_channel_diff(canvas.pixel(x, y), expected.pixel(x, y));
                    assert!(
                        diff <= 3,
                        "pixel ({x}, {y}) off by {diff} at center lon {center_lon}"
                    );
                }
            }
        }
    }

    #[test]
    fn pole_neighborhood_is_computed_exactly() {
        let mut world = World::new();
        let view = ViewParams::new(
            80,
            Quaternion::from_view_center(0.0, 60f64.to_radians()),
            MapQuality::Normal,
        );
        let canvas = render(&mut world, 200, view);
        let expected = reference(&world, 200, &view, false);

        let pole = FrameGeometry::new(200, 200, &view).north_pole(view.orientation);
        assert!(pole.visible);
        assert!((pole.x - 100).abs() <= 1);
        assert!((pole.y - 60).abs() <= 1);

        for y in 56..=64 {
            for x in 88..=112 {
                assert_eq!(canvas.pixel(x, y), expected.pixel(x, y), "pixel ({x}, {y})");
            }
        }
    }

    #[test]
    fn low_quality_duplicates_scanlines() {
        let mut world = World::new();
        let view = ViewParams::new(60, Quaternion::IDENTITY, MapQuality::Low);
        let canvas = render(&mut world, 160, view);
        let rows = FrameGeometry::new(160, 160, &view).row_range(1);
        let mut y = rows.start;
        while y + 1 < rows.end {
            assert_eq!(canvas.row(y as usize), canvas.row(y as usize + 1), "row {y}");
            y += 2;
        }
    }

    #[test]
    fn reports_stride_and_tile_usage() {
        let mut world = World::new();
        let mut compositor = SphericalCompositor::new(CompositorConfig::default());
        let mut canvas = Canvas::new(361, 200, BACKGROUND);

        let view = ViewParams::new(1000, Quaternion::IDENTITY, MapQuality::Normal);
        let report = compositor.render(&mut canvas, &view, &mut world);
        assert_eq!(compositor.n_best(), 45);
        assert_eq!(report.stride, 45);
        assert!(report.interpolated_samples > report.exact_samples);
        assert_eq!(
            report.tiles_used,
            vec![TileId::new(0, 0, 0), TileId::new(0, 1, 0)]
        );
        assert_eq!(world.finished, vec![report.tiles_used.clone()]);

        let small = ViewParams::new(50, Quaternion::IDENTITY, MapQuality::High);
        let report = compositor.render(&mut canvas, &small, &mut world);
        assert_eq!(report.stride, 4);
        assert_eq!(canvas.pixel(0, 0), BACKGROUND);
        assert_eq!(world.finished.len(), 2);
    }

    #[test]
    fn missing_tiles_render_fallback() {
        let mut world = World::new();
        world.tiles.remove(&TileId::new(0, 1, 0));
        let fallback = rgb(1, 2, 3);
        let mut compositor = SphericalCompositor::new(CompositorConfig {
            fallback_color: fallback,
            ..CompositorConfig::default()
        });
        let mut canvas = Canvas::new(100, 100, 0);
        let view = ViewParams::new(
            40,
            Quaternion::from_view_center(PI / 2.0, 0.0),
            MapQuality::Normal,
        );
        compositor.render(&mut canvas, &view, &mut world);
        assert_eq!(canvas.pixel(50, 50), fallback);
    }

    #[test]
    fn zero_radius_draws_background_only() {
        let mut world = World::new();
        let view = ViewParams::new(0, Quaternion::IDENTITY, MapQuality::Normal);
        let canvas = render(&mut world, 32, view);
        assert!(canvas.pixels().iter().all(|&p| p == BACKGROUND));
        assert_eq!(world.finished, vec![Vec::<TileId>::new()]);
    }

    #[test]
    fn dateline_steps_wrap_monotonically() {
        let prev = 179f64.to_radians();
        let lon = (-179f64).to_radians();
        for n in [2usize, 8, 45] {
            let steps: Vec<f64> = dateline_longitudes(prev, lon, n).collect();
            assert_eq!(steps.len(), n - 1);

            let mut chain = vec![prev];
            chain.extend(&steps);
            chain.push(lon);
            for pair in chain.windows(2) {
                let delta = normalize_lon(pair[1] - pair[0]);
                assert!(delta > 0.0, "not eastward: {pair:?}");
                assert!(delta <= TAU / n as f64 + 1e-12, "step {delta} too large");
            }
            assert!(steps.iter().all(|l| *l > -PI && *l <= PI));
        }
    }

    #[test]
    fn westward_dateline_crossing_steps_west() {
        let prev = (-170f64).to_radians();
        let lon = 170f64.to_radians();
        let steps: Vec<f64> = dateline_longitudes(prev, lon, 4).collect();
        let degrees: Vec<i64> = steps
            .iter()
            .map(|l| (l.to_degrees().round() as i64).rem_euclid(360))
            .collect();
        assert_eq!(degrees, vec![185, 180, 175]);
    }

    #[test]
    fn row_span_clamps_at_silhouette() {
        let view = ViewParams::new(10, Quaternion::IDENTITY, MapQuality::Normal);
        let g = FrameGeometry::new(100, 100, &view);
        assert_eq!(g.row_range(0), 40..60);
        assert_eq!(g.row_span(50), (40, 60, true));
        assert_eq!(g.row_span(40), (50, 50, true));
        let v = g.view_vector(60, 50);
        assert_eq!(v.z, 0.0);
    }
}
