//! Plane equations `ax + by + cz + d = 0`

use crate::foundation::math::{Vec3, Vec4};

/// Squared cross-product length below which three points count as collinear
pub const DEGENERATE_EPSILON: f32 = 1.0e-20;

/// Plane through `origin` containing the edges to `p1` and `p2`
///
/// The normal is `(p1 - origin) x (p2 - origin)`, normalized. Returns `None`
/// when the squared length of the cross product is below `min_len_sq`.
pub fn make_plane_with_tolerance(
    p1: Vec3,
    p2: Vec3,
    origin: Vec3,
    min_len_sq: f32,
) -> Option<Vec4> {
    let cross = (p1 - origin).cross(&(p2 - origin));
    let len_sq = cross.norm_squared();
    if len_sq < min_len_sq {
        return None;
    }
    let n = cross / len_sq.sqrt();
    Some(Vec4::new(n.x, n.y, n.z, -n.dot(&origin)))
}

/// [`make_plane_with_tolerance`] with the face tolerance
pub fn make_plane(p1: Vec3, p2: Vec3, origin: Vec3) -> Option<Vec4> {
    make_plane_with_tolerance(p1, p2, origin, DEGENERATE_EPSILON)
}

/// Signed distance of `p` from a normalized plane
pub fn plane_distance(plane: &Vec4, p: Vec3) -> f32 {
    plane.x * p.x + plane.y * p.y + plane.z * p.z + plane.w
}

/// Normal part of a plane
pub fn plane_normal(plane: &Vec4) -> Vec3 {
    Vec3::new(plane.x, plane.y, plane.z)
}
