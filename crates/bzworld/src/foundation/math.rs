//! Vector types and angle helpers
//!
//! World coordinates are `f32` with z up. Obstacle rotations are radians
//! about +z; world files and transforms speak degrees, so the conversions
//! live here.

pub use nalgebra::{Matrix3, Matrix4, Vector2, Vector3, Vector4};

/// Ground-plane vector
pub type Vec2 = Vector2<f32>;
/// World point or direction, z up
pub type Vec3 = Vector3<f32>;
/// Also a plane `ax + by + cz + d = 0`
pub type Vec4 = Vector4<f32>;
/// Normal and rotation matrices
pub type Mat3 = Matrix3<f32>;
/// Affine transforms in homogeneous coordinates
pub type Mat4 = Matrix4<f32>;

/// Angle constants
pub mod constants {
    /// Half turn
    pub const PI: f32 = std::f32::consts::PI;
    /// Full turn
    pub const TAU: f32 = std::f32::consts::TAU;
    /// Quarter turn
    pub const HALF_PI: f32 = std::f32::consts::FRAC_PI_2;
}

/// Small conversions shared by every module
pub mod utils {
    use super::{Vec2, Vec3};

    /// Degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees.to_radians()
    }

    /// Radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians.to_degrees()
    }

    /// Ground-plane projection
    pub fn xy(v: &Vec3) -> Vec2 {
        v.xy()
    }

    /// Remainder with the sign of `a`, as C `fmod` gives it
    pub fn fmod(a: f32, b: f32) -> f32 {
        a % b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fmod_keeps_dividend_sign() {
        assert_relative_eq!(
            utils::fmod(-3.0 * constants::HALF_PI, constants::PI),
            -constants::HALF_PI,
            epsilon = 1e-6,
        );
        assert_relative_eq!(utils::fmod(5.0, 2.0), 1.0);
    }

    #[test]
    fn test_angle_conversion() {
        assert_relative_eq!(utils::deg_to_rad(180.0), constants::PI);
        assert_relative_eq!(utils::rad_to_deg(constants::HALF_PI), 90.0, epsilon = 1e-4);
    }

    #[test]
    fn test_xy_drops_height() {
        assert_eq!(utils::xy(&Vec3::new(1.0, 2.0, 3.0)), Vec2::new(1.0, 2.0));
    }
}
