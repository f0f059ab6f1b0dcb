//! Axis-aligned bounding boxes

use crate::foundation::math::Vec3;

/// Axis-aligned bounds
///
/// A freshly constructed value is empty (`mins > maxs`) so that expanding
/// it by the first point makes it exactly that point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extents {
    /// Minimum corner
    pub mins: Vec3,
    /// Maximum corner
    pub maxs: Vec3,
}

impl Default for Extents {
    fn default() -> Self {
        Self::empty()
    }
}

impl Extents {
    /// Bounds that contain nothing
    pub fn empty() -> Self {
        Self {
            mins: Vec3::repeat(f32::MAX),
            maxs: Vec3::repeat(-f32::MAX),
        }
    }

    /// Bounds from two corners
    pub fn new(mins: Vec3, maxs: Vec3) -> Self {
        Self { mins, maxs }
    }

    /// Bounds of a z-rotated rectangular prism
    ///
    /// `size` holds the half-width, half-breadth and full height; the prism
    /// spans `pos.z ..= pos.z + size.z`.
    pub fn from_rotated_box(pos: Vec3, angle: f32, size: Vec3) -> Self {
        let (s, c) = angle.sin_cos();
        let xspan = c.abs() * size.x + s.abs() * size.y;
        let yspan = s.abs() * size.x + c.abs() * size.y;
        Self {
            mins: Vec3::new(pos.x - xspan, pos.y - yspan, pos.z),
            maxs: Vec3::new(pos.x + xspan, pos.y + yspan, pos.z + size.z),
        }
    }

    /// True when no point has been added
    pub fn is_empty(&self) -> bool {
        self.mins.x > self.maxs.x || self.mins.y > self.maxs.y || self.mins.z > self.maxs.z
    }

    /// Reset to empty
    pub fn reset(&mut self) {
        *self = Self::empty();
    }

    /// Grow to include a point
    pub fn expand_to_point(&mut self, p: Vec3) {
        self.mins = self.mins.inf(&p);
        self.maxs = self.maxs.sup(&p);
    }

    /// Grow to include other bounds
    pub fn expand_to_box(&mut self, other: &Self) {
        if other.is_empty() {
            return;
        }
        self.mins = self.mins.inf(&other.mins);
        self.maxs = self.maxs.sup(&other.maxs);
    }

    /// Grow every side by `margin`
    pub fn add_margin(&mut self, margin: f32) {
        self.mins -= Vec3::repeat(margin);
        self.maxs += Vec3::repeat(margin);
    }

    /// Center point
    pub fn center(&self) -> Vec3 {
        (self.mins + self.maxs) * 0.5
    }

    /// Inclusive containment
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.mins.x && p.x <= self.maxs.x
            && p.y >= self.mins.y && p.y <= self.maxs.y
            && p.z >= self.mins.z && p.z <= self.maxs.z
    }

    /// True if the boxes overlap or share a face
    pub fn touches(&self, other: &Self) -> bool {
        self.mins.x <= other.maxs.x && self.maxs.x >= other.mins.x
            && self.mins.y <= other.maxs.y && self.maxs.y >= other.mins.y
            && self.mins.z <= other.maxs.z && self.maxs.z >= other.mins.z
    }

    /// True if `other` lies entirely inside
    pub fn contains(&self, other: &Self) -> bool {
        self.mins.x <= other.mins.x && self.maxs.x >= other.maxs.x
            && self.mins.y <= other.mins.y && self.maxs.y >= other.maxs.y
            && self.mins.z <= other.mins.z && self.maxs.z >= other.maxs.z
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::constants::PI;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_then_point() {
        let mut ext = Extents::empty();
        assert!(ext.is_empty());
        ext.expand_to_point(Vec3::new(1.0, 2.0, 3.0));
        assert!(!ext.is_empty());
        assert_eq!(ext.mins, ext.maxs);
    }

    #[test]
    fn test_rotated_box_bounds() {
        let ext = Extents::from_rotated_box(
            Vec3::new(10.0, 0.0, 1.0),
            PI * 0.25,
            Vec3::new(1.0, 1.0, 2.0),
        );
        let half = 2.0f32.sqrt();
        assert_relative_eq!(ext.maxs.x, 10.0 + half, epsilon = 1e-5);
        assert_relative_eq!(ext.mins.y, -half, epsilon = 1e-5);
        assert_relative_eq!(ext.mins.z, 1.0);
        assert_relative_eq!(ext.maxs.z, 3.0);
    }

    #[test]
    fn test_touches_and_contains() {
        let a = Extents::new(Vec3::zeros(), Vec3::repeat(2.0));
        let b = Extents::new(Vec3::repeat(2.0), Vec3::repeat(3.0));
        let c = Extents::new(Vec3::repeat(0.5), Vec3::repeat(1.0));
        assert!(a.touches(&b));
        assert!(!a.contains(&b));
        assert!(a.contains(&c));
    }

    #[test]
    fn test_expand_ignores_empty() {
        let mut a = Extents::new(Vec3::zeros(), Vec3::repeat(1.0));
        a.expand_to_box(&Extents::empty());
        assert_eq!(a.maxs, Vec3::repeat(1.0));
    }
}
