//! Parametric rays

use crate::foundation::math::Vec3;

/// A ray `origin + t * direction`
///
/// The direction keeps its length so that `t` can be measured in the
/// caller's units, e.g. `t = 1` is the end of a motion segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Start point
    pub origin: Vec3,
    /// Direction, not normalized
    pub direction: Vec3,
}

impl Ray {
    /// Creates a new ray with the given origin and direction
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Ray from `from` reaching `to` at `t = 1`
    pub fn segment(from: Vec3, to: Vec3) -> Self {
        Self { origin: from, direction: to - from }
    }

    /// Get a point along the ray at parameter t
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}
