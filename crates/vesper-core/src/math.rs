//! Math types used by the render layer.
//!
//! Vectors and matrices come straight from [`glam`]; this module only adds the
//! handful of engine-level value types that sit on top of them.

pub use glam::{Mat4, Vec3, Vec4};

/// A plane in Hessian normal form: `normal · p + d = 0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub d: f32,
}

impl Plane {
    pub const fn new(normal: Vec3, d: f32) -> Self {
        Self { normal, d }
    }

    /// Build the plane through `point` facing along `normal`.
    pub fn from_point_normal(point: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize_or_zero();
        Self {
            normal,
            d: -normal.dot(point),
        }
    }

    /// Signed distance of `point` from the plane, scaled by the normal length.
    pub fn distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.d
    }

    /// The plane as a 4-component vector `(a, b, c, d)`, the form backends upload.
    pub fn to_vec4(&self) -> Vec4 {
        self.normal.extend(self.d)
    }
}

impl Default for Plane {
    fn default() -> Self {
        Self::new(Vec3::Y, 0.0)
    }
}

/// RGBA colour with floating point channels.
pub type ColourValue = Vec4;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_distance() {
        let plane = Plane::from_point_normal(Vec3::new(0.0, 2.0, 0.0), Vec3::Y);
        assert_eq!(plane.distance(Vec3::new(5.0, 3.0, -1.0)), 1.0);
        assert_eq!(plane.distance(Vec3::new(0.0, 2.0, 0.0)), 0.0);
        assert_eq!(plane.to_vec4(), Vec4::new(0.0, 1.0, 0.0, -2.0));
    }
}
