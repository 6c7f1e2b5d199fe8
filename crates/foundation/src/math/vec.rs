/// Cartesian vector on (or around) the unit sphere.
///
/// Axis convention shared by the whole workspace: `x` points right, `y` points
/// to the north pole and `z` points towards the viewer, so the point at
/// longitude 0 / latitude 0 is `(0, 0, 1)`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const NORTH: Vec3 = Vec3::new(0.0, 1.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Unit vector for a longitude/latitude pair given in radians.
    pub fn from_lon_lat(lon: f64, lat: f64) -> Self {
        let cos_lat = lat.cos();
        Self::new(cos_lat * lon.sin(), lat.sin(), cos_lat * lon.cos())
    }

    /// Longitude/latitude in radians of the direction this vector points to.
    ///
    /// Near the poles the longitude is undefined and reported as `0.0`.
    pub fn to_lon_lat(self) -> (f64, f64) {
        let lat = self.y.clamp(-1.0, 1.0).asin();
        let lon = if self.x * self.x + self.z * self.z > 0.000_05 {
            self.x.atan2(self.z)
        } else {
            0.0
        };
        (lon, lat)
    }

    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn scale(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn normalized(self) -> Self {
        let n = self.length();
        if n > 1e-10 {
            self.scale(1.0 / n)
        } else {
            Self::new(0.0, 0.0, 0.0)
        }
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}
