use std::f64::consts::{PI, TAU};

/// Latitude bound (radians) of the Mercator band; the inverse Gudermannian is
/// unbounded at the poles.
pub const MAX_MERCATOR_LAT: f64 = 85.0 * PI / 180.0;

/// Gudermannian function: Mercator y (radians) → latitude.
pub fn gd(y: f64) -> f64 {
    y.sinh().atan()
}

/// Inverse Gudermannian: latitude → Mercator y (radians).
pub fn gd_inv(lat: f64) -> f64 {
    lat.tan().asinh()
}

pub fn clamp_mercator_lat(lat: f64) -> f64 {
    lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT)
}

/// Normalizes a longitude into `(-PI, PI]`.
pub fn normalize_lon(lon: f64) -> f64 {
    let mut l = lon.rem_euclid(TAU);
    if l > PI {
        l -= TAU;
    }
    l
}

#[cfg(test)]
mod tests {
    use super::{MAX_MERCATOR_LAT, clamp_mercator_lat, gd, gd_inv, normalize_lon};
    use std::f64::consts::PI;

    fn assert_close(a: f64, b: f64, eps: f64) {
        let diff = (a - b).abs();
        assert!(diff <= eps, "expected {a} ~= {b} (diff {diff})");
    }

    #[test]
    fn gudermannian_inverts() {
        for lat in [-1.2, -0.3, 0.0, 0.5, 1.4] {
            assert_close(gd(gd_inv(lat)), lat, 1e-12);
        }
    }

    #[test]
    fn mercator_clamp_limits_to_band() {
        assert_eq!(clamp_mercator_lat(PI / 2.0), MAX_MERCATOR_LAT);
        assert_eq!(clamp_mercator_lat(-PI / 2.0), -MAX_MERCATOR_LAT);
        assert_eq!(clamp_mercator_lat(0.2), 0.2);
    }

    #[test]
    fn normalize_lon_wraps_into_half_open_range() {
        assert_close(normalize_lon(PI + 0.1), -PI + 0.1, 1e-12);
        assert_close(normalize_lon(-PI - 0.1), PI - 0.1, 1e-12);
        assert_close(normalize_lon(PI), PI, 1e-12);
        assert_close(normalize_lon(-PI), PI, 1e-12);
        assert_close(normalize_lon(0.3), 0.3, 1e-12);
    }
}
