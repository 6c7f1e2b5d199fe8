use std::f64::consts::{FRAC_PI_2, PI, TAU};

use serde::{Deserialize, Serialize};

use crate::math::normalize_lon;

/// Geographic bounding box in radians.
///
/// A box whose `east` edge is smaller than its `west` edge wraps across the
/// antimeridian.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl GeoBox {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        GeoBox {
            north,
            south,
            east,
            west,
        }
    }

    pub fn from_degrees(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self::new(
            north.to_radians(),
            south.to_radians(),
            east.to_radians(),
            west.to_radians(),
        )
    }

    pub fn world() -> Self {
        Self::new(FRAC_PI_2, -FRAC_PI_2, PI, -PI)
    }

    pub fn crosses_dateline(&self) -> bool {
        self.east < self.west
    }

    pub fn width(&self) -> f64 {
        if self.crosses_dateline() {
            self.east - self.west + TAU
        } else {
            self.east - self.west
        }
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Center as `(lon, lat)`.
    pub fn center(&self) -> (f64, f64) {
        let lon = normalize_lon(self.west + 0.5 * self.width());
        (lon, 0.5 * (self.north + self.south))
    }

    /// Box with the same center whose width and height are multiplied by the
    /// given factors. Latitudes are clamped to the poles; a width reaching a
    /// full turn becomes the whole longitude range.
    pub fn scaled(&self, lon_scale: f64, lat_scale: f64) -> Self {
        let (center_lon, center_lat) = self.center();
        let half_height = 0.5 * self.height() * lat_scale;
        let north = (center_lat + half_height).clamp(-FRAC_PI_2, FRAC_PI_2);
        let south = (center_lat - half_height).clamp(-FRAC_PI_2, FRAC_PI_2);

        let width = self.width() * lon_scale;
        if width >= TAU {
            return Self::new(north, south, PI, -PI);
        }
        let west = normalize_lon(center_lon - 0.5 * width);
        let east = normalize_lon(center_lon + 0.5 * width);
        Self::new(north, south, east, west)
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        if lat > self.north || lat < self.south {
            return false;
        }
        if self.crosses_dateline() {
            lon >= self.west || lon <= self.east
        } else {
            lon >= self.west && lon <= self.east
        }
    }

    pub fn intersects(&self, other: &GeoBox) -> bool {
        if self.north < other.south || self.south > other.north {
            return false;
        }
        match (self.crosses_dateline(), other.crosses_dateline()) {
            (false, false) => !(self.east < other.west || self.west > other.east),
            // Both contain the antimeridian.
            (true, true) => true,
            (true, false) => other.east >= self.west || other.west <= self.east,
            (false, true) => self.east >= other.west || self.west <= other.east,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::GeoBox;
    use std::f64::consts::PI;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn width_accounts_for_dateline() {
        let plain = GeoBox::from_degrees(10.0, -10.0, 20.0, -20.0);
        assert_close(plain.width(), 40f64.to_radians(), 1e-12);
        assert!(!plain.crosses_dateline());

        let wrapped = GeoBox::from_degrees(10.0, -10.0, -170.0, 170.0);
        assert!(wrapped.crosses_dateline());
        assert_close(wrapped.width(), 20f64.to_radians(), 1e-12);
        let (lon, _) = wrapped.center();
        assert_close(lon.abs(), PI, 1e-12);
    }

    #[test]
    fn scaling_doubles_around_center() {
        let b = GeoBox::from_degrees(20.0, 10.0, 40.0, 30.0);
        let s = b.scaled(2.0, 2.0);
        assert_close(s.north, 25f64.to_radians(), 1e-12);
        assert_close(s.south, 5f64.to_radians(), 1e-12);
        assert_close(s.west, 25f64.to_radians(), 1e-12);
        assert_close(s.east, 45f64.to_radians(), 1e-12);
    }

    #[test]
    fn scaling_clamps_latitude_and_saturates_longitude() {
        let b = GeoBox::from_degrees(80.0, 0.0, 120.0, -120.0);
        let s = b.scaled(2.0, 2.0);
        assert_close(s.north, PI / 2.0, 1e-12);
        assert_eq!(s.west, -PI);
        assert_eq!(s.east, PI);
    }

    #[test]
    fn scaling_can_produce_dateline_crossing() {
        let b = GeoBox::from_degrees(10.0, -10.0, 180.0, 160.0);
        let s = b.scaled(2.0, 1.0);
        assert!(s.crosses_dateline());
        assert!(s.contains((-175f64).to_radians(), 0.0));
    }

    #[test]
    fn intersection_cases() {
        let a = GeoBox::from_degrees(10.0, -10.0, 10.0, -10.0);
        let b = GeoBox::from_degrees(5.0, -5.0, 30.0, 5.0);
        let far = GeoBox::from_degrees(10.0, -10.0, 60.0, 40.0);
        let north = GeoBox::from_degrees(50.0, 30.0, 10.0, -10.0);
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&far));
        assert!(!a.intersects(&north));

        let wrapped = GeoBox::from_degrees(10.0, -10.0, -170.0, 170.0);
        let east_edge = GeoBox::from_degrees(10.0, -10.0, 180.0, 175.0);
        let west_edge = GeoBox::from_degrees(10.0, -10.0, -175.0, -180.0);
        assert!(wrapped.intersects(&east_edge));
        assert!(west_edge.intersects(&wrapped));
        assert!(!wrapped.intersects(&a));
        assert!(wrapped.intersects(&GeoBox::from_degrees(5.0, -5.0, 179.0, -179.0)));
    }
}
