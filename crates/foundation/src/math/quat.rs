use super::Vec3;

/// Unit quaternion describing the orientation of the planet relative to the
/// viewer.
///
/// Rotating a view-space direction by the quaternion yields the corresponding
/// planet-fixed direction; the inverse maps planet-fixed points (such as the
/// north pole) back into view space.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Quaternion {
    pub w: f64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Row-major 3x3 rotation matrix, cheaper than quaternion rotation when the
/// same orientation is applied to every pixel of a frame.
pub type RotationMatrix = [[f64; 3]; 3];

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Quaternion {
    pub const IDENTITY: Quaternion = Quaternion {
        w: 1.0,
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(w: f64, x: f64, y: f64, z: f64) -> Self {
        Self { w, x, y, z }
    }

    /// Rotation by `angle_rad` around `axis` (need not be normalized).
    pub fn from_axis_angle(axis: Vec3, angle_rad: f64) -> Self {
        let axis = axis.normalized();
        let (s, c) = (angle_rad * 0.5).sin_cos();
        Self::new(c, axis.x * s, axis.y * s, axis.z * s)
    }

    /// Orientation that puts `(lon, lat)` (radians) at the center of the view
    /// with north pointing up.
    pub fn from_view_center(lon: f64, lat: f64) -> Self {
        let yaw = Self::from_axis_angle(Vec3::new(0.0, 1.0, 0.0), lon);
        let pitch = Self::from_axis_angle(Vec3::new(1.0, 0.0, 0.0), -lat);
        yaw.mul(pitch).normalized()
    }

    /// Hamilton product `self * other` (applies `other` first).
    pub fn mul(self, other: Self) -> Self {
        let a = self;
        let b = other;
        Self::new(
            a.w * b.w - a.x * b.x - a.y * b.y - a.z * b.z,
            a.w * b.x + a.x * b.w + a.y * b.z - a.z * b.y,
            a.w * b.y - a.x * b.z + a.y * b.w + a.z * b.x,
            a.w * b.z + a.x * b.y - a.y * b.x + a.z * b.w,
        )
    }

    /// Conjugate; the inverse for unit quaternions.
    pub fn inverse(self) -> Self {
        Self::new(self.w, -self.x, -self.y, -self.z)
    }

    pub fn normalized(self) -> Self {
        let n = (self.w * self.w + self.x * self.x + self.y * self.y + self.z * self.z).sqrt();
        if n > 1e-10 {
            Self::new(self.w / n, self.x / n, self.y / n, self.z / n)
        } else {
            Self::IDENTITY
        }
    }

    pub fn rotate(self, v: Vec3) -> Vec3 {
        let qv = Vec3::new(self.x, self.y, self.z);
        let t = qv.cross(v).scale(2.0);
        v + t.scale(self.w) + qv.cross(t)
    }

    pub fn to_matrix(self) -> RotationMatrix {
        let Self { w, x, y, z } = self;
        [
            [
                1.0 - 2.0 * (y * y + z * z),
                2.0 * (x * y - w * z),
                2.0 * (x * z + w * y),
            ],
            [
                2.0 * (x * y + w * z),
                1.0 - 2.0 * (x * x + z * z),
                2.0 * (y * z - w * x),
            ],
            [
                2.0 * (x * z - w * y),
                2.0 * (y * z + w * x),
                1.0 - 2.0 * (x * x + y * y),
            ],
        ]
    }
}

pub fn rotate_with_matrix(m: &RotationMatrix, v: Vec3) -> Vec3 {
    Vec3::new(
        m[0][0] * v.x + m[0][1] * v.y + m[0][2] * v.z,
        m[1][0] * v.x + m[1][1] * v.y + m[1][2] * v.z,
        m[2][0] * v.x + m[2][1] * v.y + m[2][2] * v.z,
    )
}

#[cfg(test)]
mod tests {
    use super::{Quaternion, rotate_with_matrix};
    use crate::math::Vec3;

    fn assert_vec_close(a: Vec3, b: Vec3, eps: f64) {
        let d = (a - b).length();
        assert!(d <= eps, "expected {a:?} ~= {b:?} (diff {d})");
    }

    #[test]
    fn identity_keeps_vectors() {
        let v = Vec3::new(1.0, 2.0, 3.0);
        assert_vec_close(Quaternion::IDENTITY.rotate(v), v, 1e-12);
    }

    #[test]
    fn view_center_maps_screen_center_to_location() {
        let lon = 2.0;
        let lat = -0.4;
        let q = Quaternion::from_view_center(lon, lat);
        let center = q.rotate(Vec3::new(0.0, 0.0, 1.0));
        let (lon_rt, lat_rt) = center.to_lon_lat();
        assert!((lon_rt - lon).abs() < 1e-9);
        assert!((lat_rt - lat).abs() < 1e-9);
    }

    #[test]
    fn view_center_keeps_north_up() {
        let q = Quaternion::from_view_center(0.0, 0.5);
        let pole = q.inverse().rotate(Vec3::NORTH);
        assert!(pole.x.abs() < 1e-12);
        assert!(pole.y > 0.0);
        assert!(pole.z > 0.0, "pole tilts towards the viewer when looking north");
    }

    #[test]
    fn matrix_agrees_with_quaternion_rotation() {
        let q = Quaternion::from_axis_angle(Vec3::new(1.0, 2.0, -0.5), 0.9);
        let v = Vec3::new(-0.3, 0.8, 0.1);
        assert_vec_close(rotate_with_matrix(&q.to_matrix(), v), q.rotate(v), 1e-12);
    }

    #[test]
    fn inverse_undoes_rotation() {
        let q = Quaternion::from_view_center(-1.2, 0.3);
        let v = Vec3::new(0.2, -0.4, 0.9);
        assert_vec_close(q.inverse().rotate(q.rotate(v)), v, 1e-12);
    }
}
