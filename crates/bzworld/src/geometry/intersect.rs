//! Intersection tests used by the obstacle kinds
//!
//! Most tests work on z-rotated rectangles in the horizontal plane: a
//! rectangle is a center, a rotation angle and two half sizes. Ray tests
//! return the ray parameter of first contact, or `-1.0` for a miss.

use crate::foundation::math::{constants::PI, Vec2, Vec3, Vec4};
use super::{Extents, Ray};

/// Side of a rectangle, in rectangle-local terms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RectSide {
    /// +x face
    East,
    /// +y face
    North,
    /// -x face
    West,
    /// -y face
    South,
}

impl RectSide {
    /// Outward normal angle in the rectangle's frame
    pub fn local_angle(self) -> f32 {
        match self {
            Self::East => 0.0,
            Self::North => 0.5 * PI,
            Self::West => PI,
            Self::South => 1.5 * PI,
        }
    }
}

/// Result of a ray against a rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RectHit {
    /// The ray starts inside
    Inside,
    /// No contact for `t >= 0`
    Miss,
    /// First contact at `time` through `side`
    Hit {
        /// Ray parameter of contact
        time: f32,
        /// Face crossed
        side: RectSide,
    },
}

const UNIT_CORNERS: [(f32, f32); 4] = [(1.0, 1.0), (1.0, -1.0), (-1.0, -1.0), (-1.0, 1.0)];

/// Move `p` into the frame of a rectangle at `origin` rotated by `angle`
fn to_local(p: Vec2, origin: Vec2, angle: f32) -> Vec2 {
    let (s, c) = (-angle).sin_cos();
    let pa = p - origin;
    Vec2::new(c * pa.x - s * pa.y, c * pa.y + s * pa.x)
}

/// Rotate a direction into a frame rotated by `angle`
fn dir_to_local(d: Vec3, angle: f32) -> Vec3 {
    let (s, c) = (-angle).sin_cos();
    Vec3::new(c * d.x - s * d.y, c * d.y + s * d.x, d.z)
}

fn xy(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.y)
}

/// True if two circles overlap
pub fn test_circle_circle(o1: Vec3, r1: f32, o2: Vec3, r2: f32) -> bool {
    let x = o1.x - o2.x;
    let y = o1.y - o2.y;
    let r = r1 + r2;
    x * x + y * y <= r * r
}

/// Angle of the outward normal of an origin-centered rect nearest to `p`
fn normal_angle_orig_rect(p: Vec2, dx: f32, dy: f32) -> f32 {
    if p.x > dx {
        return if p.y > dy {
            (p.y - dy).atan2(p.x - dx)
        } else if p.y < -dy {
            (p.y + dy).atan2(p.x - dx)
        } else {
            0.0
        };
    }
    if p.x < -dx {
        return if p.y > dy {
            (p.y - dy).atan2(p.x + dx)
        } else if p.y < -dy {
            (p.y + dy).atan2(p.x + dx)
        } else {
            PI
        };
    }
    if p.y > dy {
        return 0.5 * PI;
    }
    if p.y < -dy {
        return 1.5 * PI;
    }

    // inside: pick the wall the point is closest to in the rect's aspect
    if p.x > 0.0 {
        if p.y > 0.0 {
            if dy * p.x > dx * p.y { 0.0 } else { 0.5 * PI }
        } else if dy * p.x > -dx * p.y {
            0.0
        } else {
            1.5 * PI
        }
    } else if p.y > 0.0 {
        if dy * p.x < -dx * p.y { PI } else { 0.5 * PI }
    } else if dy * p.x < dx * p.y {
        PI
    } else {
        1.5 * PI
    }
}

/// Horizontal outward normal of a rotated rect at the wall nearest to `p`
pub fn get_normal_rect(p: Vec3, center: Vec3, angle: f32, dx: f32, dy: f32) -> Vec3 {
    let local = to_local(xy(p), xy(center), angle);
    let normal_angle = normal_angle_orig_rect(local, dx, dy) + angle;
    Vec3::new(normal_angle.cos(), normal_angle.sin(), 0.0)
}

fn test_orig_rect_circle(dx: f32, dy: f32, p: Vec2, r: f32) -> bool {
    let rr = r * r;
    let rx = -p.x;
    let ry = -p.y;
    if rx + dx < 0.0 {
        if ry + dy < 0.0 {
            (rx + dx) * (rx + dx) + (ry + dy) * (ry + dy) < rr
        } else if ry - dy > 0.0 {
            (rx + dx) * (rx + dx) + (ry - dy) * (ry - dy) < rr
        } else {
            rx + dx > -r
        }
    } else if rx - dx > 0.0 {
        if ry + dy < 0.0 {
            (rx - dx) * (rx - dx) + (ry + dy) * (ry + dy) < rr
        } else if ry - dy > 0.0 {
            (rx - dx) * (rx - dx) + (ry - dy) * (ry - dy) < rr
        } else {
            rx - dx < r
        }
    } else if ry + dy < 0.0 {
        ry + dy > -r
    } else if ry - dy > 0.0 {
        ry - dy < r
    } else {
        true
    }
}

/// True if a rotated rect overlaps a circle
pub fn test_rect_circle(center: Vec3, angle: f32, dx: f32, dy: f32, p: Vec3, r: f32) -> bool {
    test_orig_rect_circle(dx, dy, to_local(xy(p), xy(center), angle), r)
}

/// Ray parameter where the ray is `radius` from the origin, `-1` if never
pub fn ray_at_distance_from_origin(ray: &Ray, radius: f32) -> f32 {
    let d = ray.direction;
    if d == Vec3::zeros() {
        return 0.0;
    }
    let p = ray.origin;
    let a = d.norm_squared();
    let b = -p.dot(&d);
    let c = p.norm_squared() - radius * radius;
    let disc = b * b - a * c;
    if disc < 0.0 {
        return -1.0;
    }
    let root = disc.sqrt();
    let t0 = b + root;
    let t1 = b - root;
    if t0 < t1 {
        if t0 < 0.0 { t1 / a } else { t0 / a }
    } else if t1 < 0.0 {
        t0 / a
    } else {
        t1 / a
    }
}

/// Slab entry along one axis of an origin-centered interval `[-d, d]`
///
/// `Err(())` means the ray is outside and moving away.
fn slab_entry(p: f32, v: f32, lo: f32, hi: f32) -> Result<f32, ()> {
    if p > hi {
        if v >= 0.0 { Err(()) } else { Ok((hi - p) / v) }
    } else if p < lo {
        if v <= 0.0 { Err(()) } else { Ok((lo - p) / v) }
    } else {
        Ok(-1.0)
    }
}

/// Smallest non-negative candidate, `-1` when none
fn closest_time(candidates: &[f32]) -> f32 {
    candidates
        .iter()
        .copied()
        .filter(|t| *t >= 0.0)
        .fold(-1.0, |best, t| if best < 0.0 || t < best { t } else { best })
}

/// Block covering `x=[-dx,dx], y=[-dy,dy], z=[0,dz]`
fn time_ray_hits_orig_box(p: Vec3, v: Vec3, dx: f32, dy: f32, dz: f32) -> f32 {
    if p.x.abs() <= dx && p.y.abs() <= dy && p.z >= 0.0 && p.z <= dz {
        return 0.0;
    }

    let Ok(mut tx) = slab_entry(p.x, v.x, -dx, dx) else { return -1.0 };
    let Ok(mut ty) = slab_entry(p.y, v.y, -dy, dy) else { return -1.0 };
    let Ok(mut tz) = slab_entry(p.z, v.z, 0.0, dz) else { return -1.0 };

    // throw out solutions that hit the face plane outside the face
    if tx < 0.0
        || (p.y + tx * v.y).abs() > dy
        || p.z + tx * v.z < 0.0
        || p.z + tx * v.z > dz
    {
        tx = -1.0;
    }
    if ty < 0.0
        || (p.x + ty * v.x).abs() > dx
        || p.z + ty * v.z < 0.0
        || p.z + ty * v.z > dz
    {
        ty = -1.0;
    }
    if tz < 0.0 || (p.x + tz * v.x).abs() > dx || (p.y + tz * v.y).abs() > dy {
        tz = -1.0;
    }

    closest_time(&[tx, ty, tz])
}

/// Time a ray enters a rotated block standing on `center`
///
/// Returns `0` when the ray starts inside and `-1` on a miss.
pub fn time_ray_hits_block(ray: &Ray, center: Vec3, angle: f32, dx: f32, dy: f32, dz: f32) -> f32 {
    let local = to_local(xy(ray.origin), xy(center), angle);
    let pb = Vec3::new(local.x, local.y, ray.origin.z - center.z);
    let db = dir_to_local(ray.direction, angle);
    time_ray_hits_orig_box(pb, db, dx, dy, dz)
}

/// Time to reach the half space behind the plane through three points
///
/// `0` if already behind it, `-1` if moving away.
fn time_ray_hits_plane(pb: Vec3, db: Vec3, x1: Vec3, x2: Vec3, x3: Vec3) -> f32 {
    let n = (x2 - x1).cross(&(x3 - x1));
    let distance = n.dot(&(pb - x1));
    if distance <= 0.0 {
        return 0.0;
    }
    let velocity = n.dot(&db);
    if velocity > 0.0 {
        return -1.0;
    }
    -distance / velocity
}

/// Time a ray enters a (possibly upside-down) rotated pyramid
pub fn time_ray_hits_pyramids(
    ray: &Ray,
    center: Vec3,
    angle: f32,
    dx: f32,
    dy: f32,
    dz: f32,
    flip_z: bool,
) -> f32 {
    const EPSILON: f32 = 1.0e-3;

    let local = to_local(xy(ray.origin), xy(center), angle);
    let mut pb = Vec3::new(local.x, local.y, ray.origin.z - center.z);
    let mut db = dir_to_local(ray.direction, angle);

    let dx = dx.abs();
    let dy = dy.abs();
    let dz = dz.abs();
    if flip_z {
        pb.z = dz - pb.z;
        db.z = -db.z;
    }

    // clip against one half space at a time: the four walls, then the base
    let apex = Vec3::new(0.0, 0.0, dz);
    let faces = [
        (Vec3::new(-dx, -dy, 0.0), Vec3::new(dx, -dy, 0.0), apex),
        (Vec3::new(dx, -dy, 0.0), Vec3::new(dx, dy, 0.0), apex),
        (Vec3::new(dx, dy, 0.0), Vec3::new(-dx, dy, 0.0), apex),
        (Vec3::new(-dx, dy, 0.0), Vec3::new(-dx, -dy, 0.0), apex),
        (Vec3::new(-dx, -dy, 0.0), Vec3::new(-dx, dy, 0.0), Vec3::new(dx, dy, 0.0)),
    ];

    let mut residual_time = 0.0;
    for (x1, x2, x3) in faces {
        let step = time_ray_hits_plane(pb, db, x1, x2, x3);
        if step < -0.5 {
            return step;
        }
        pb += db * step;
        residual_time += step;
    }

    // the point can't move further; check it is really inside
    let px = pb.x.abs();
    let py = pb.y.abs();
    if px > dx + EPSILON * dx || py > dy + EPSILON * dy || pb.z < -EPSILON * dz {
        return -1.0;
    }
    let scaled_distance = if px * dy > py * dx {
        dz * (dx - px) - pb.z * dx
    } else {
        dz * (dy - py) - pb.z * dy
    };
    if scaled_distance < -EPSILON * dz {
        return -1.0;
    }
    residual_time
}

fn time_and_side_ray_hits_orig_rect(p: Vec2, v: Vec2, dx: f32, dy: f32) -> RectHit {
    if p.x.abs() <= dx && p.y.abs() <= dy {
        return RectHit::Inside;
    }

    let Ok(mut tx) = slab_entry(p.x, v.x, -dx, dx) else { return RectHit::Miss };
    let Ok(mut ty) = slab_entry(p.y, v.y, -dy, dy) else { return RectHit::Miss };

    if (p.y + tx * v.y).abs() > dy {
        tx = -1.0;
    }
    if (p.x + ty * v.x).abs() > dx {
        ty = -1.0;
    }
    if tx < 0.0 && ty < 0.0 {
        return RectHit::Miss;
    }

    if tx < 0.0 || (ty >= 0.0 && ty < tx) {
        let side = if p.y > dy { RectSide::North } else { RectSide::South };
        return RectHit::Hit { time: ty, side };
    }
    let side = if p.x > dx { RectSide::East } else { RectSide::West };
    RectHit::Hit { time: tx, side }
}

/// Time and side a ray first crosses into a rotated rectangle (z ignored)
pub fn time_and_side_ray_hits_rect(
    ray: &Ray,
    center: Vec3,
    angle: f32,
    dx: f32,
    dy: f32,
) -> RectHit {
    let pb = to_local(xy(ray.origin), xy(center), angle);
    let db = dir_to_local(ray.direction, angle);
    time_and_side_ray_hits_orig_rect(pb, xy(db), dx, dy)
}

/// Rect 1 at `p` rotated by `angle` against rect 2 centered at the origin
fn test_orig_rect_rect(p: Vec2, angle: f32, dx1: f32, dy1: f32, dx2: f32, dy2: f32) -> bool {
    let (s, c) = angle.sin_cos();

    // rect 2's center inside rect 1
    let sx = c * p.x + s * p.y;
    let sy = c * p.y - s * p.x;
    if sx.abs() < dx1 && sy.abs() < dy1 {
        return true;
    }

    // classify rect 1's corners against rect 2; any corner inside is a hit
    let mut corner1 = [Vec2::zeros(); 4];
    let mut region = [(0i32, 0i32); 4];
    for (i, (bx, by)) in UNIT_CORNERS.iter().enumerate() {
        let corner = Vec2::new(
            p.x + c * dx1 * bx - s * dy1 * by,
            p.y + s * dx1 * bx + c * dy1 * by,
        );
        let rx = if corner.x < -dx2 { -1 } else if corner.x > dx2 { 1 } else { 0 };
        let ry = if corner.y < -dy2 { -1 } else if corner.y > dy2 { 1 } else { 0 };
        if rx == 0 && ry == 0 {
            return true;
        }
        corner1[i] = corner;
        region[i] = (rx, ry);
    }

    // edges of rect 1
    for i in 0..4 {
        let j = (i + 1) % 4;
        let (ri, rj) = (region[i], region[j]);

        if ri.0 == rj.0 {
            if ri.0 == 0 && ri.1 != rj.1 {
                return true;
            }
            continue;
        } else if ri.1 == rj.1 {
            if ri.1 == 0 {
                return true;
            }
            continue;
        }

        // corner of rect 2 the edge might pass on either side of
        let corner2 = if ri.0 == 0 {
            Vec2::new(rj.0 as f32 * dx2, ri.1 as f32 * dy2)
        } else if rj.0 == 0 {
            Vec2::new(ri.0 as f32 * dx2, rj.1 as f32 * dy2)
        } else if ri.1 == 0 {
            Vec2::new(ri.0 as f32 * dx2, rj.1 as f32 * dy2)
        } else {
            Vec2::new(rj.0 as f32 * dx2, ri.1 as f32 * dy2)
        };

        let e = corner1[j] - corner1[i];
        let ci = corner1[i];
        if (e.y * (corner2.x - ci.x) - e.x * (corner2.y - ci.y))
            * (e.y * (corner2.x + ci.x) - e.x * (corner2.y + ci.y))
            > 0.0
        {
            return true;
        }
    }
    false
}

/// True if two rotated rectangles overlap
pub fn test_rect_rect(
    p1: Vec3,
    angle1: f32,
    dx1: f32,
    dy1: f32,
    p2: Vec3,
    angle2: f32,
    dx2: f32,
    dy2: f32,
) -> bool {
    let pb = to_local(xy(p2), xy(p1), angle1);
    test_orig_rect_rect(pb, angle2 - angle1, dx2, dy2, dx1, dy1)
}

/// True if rect 2 lies completely inside rect 1
pub fn test_rect_in_rect(
    p1: Vec3,
    angle1: f32,
    dx1: f32,
    dy1: f32,
    p2: Vec3,
    angle2: f32,
    dx2: f32,
    dy2: f32,
) -> bool {
    let pb = to_local(xy(p2), xy(p1), angle1);
    let (s2, c2) = (angle2 - angle1).sin_cos();
    UNIT_CORNERS.iter().all(|(bx, by)| {
        let x = pb.x + c2 * dx2 * bx - s2 * dy2 * by;
        let y = pb.y + s2 * dx2 * bx + c2 * dy2 * by;
        x.abs() <= dx1 && y.abs() <= dy1
    })
}

/// Corners of the box nearest and furthest along `dir`
fn box_corners_along(dir: &Vec3, extents: &Extents) -> (Vec3, Vec3) {
    let mut inside = Vec3::zeros();
    let mut outside = Vec3::zeros();
    for t in 0..3 {
        if dir[t] > 0.0 {
            inside[t] = extents.maxs[t];
            outside[t] = extents.mins[t];
        } else {
            inside[t] = extents.mins[t];
            outside[t] = extents.maxs[t];
        }
    }
    (inside, outside)
}

fn project_axis_box(dir: &Vec3, extents: &Extents) -> (f32, f32) {
    let (i, o) = box_corners_along(dir, extents);
    let idist = i.dot(dir);
    let odist = o.dot(dir);
    if idist < odist { (idist, odist) } else { (odist, idist) }
}

fn project_polygon(dir: &Vec3, points: &[Vec3]) -> (f32, f32) {
    points.iter().fold((f32::MAX, -f32::MAX), |(lo, hi), p| {
        let d = p.dot(dir);
        (lo.min(d), hi.max(d))
    })
}

/// True if a planar polygon touches an axis-aligned box
///
/// Assumes the caller already checked that the polygon's own bounds touch
/// the box.
pub fn test_polygon_in_axis_box(points: &[Vec3], plane: &Vec4, extents: &Extents) -> bool {
    let normal = Vec3::new(plane.x, plane.y, plane.z);
    let (i, o) = box_corners_along(&normal, extents);
    let icross = normal.dot(&i) + plane.w;
    let ocross = normal.dot(&o) + plane.w;
    if icross * ocross > 0.0 {
        return false;
    }

    let count = points.len();
    for t in 0..count {
        let edge = points[(t + 1) % count] - points[t];
        for axis in [Vec3::x(), Vec3::y(), Vec3::z()] {
            let cross = edge.cross(&axis);
            if cross.norm_squared() < 0.001 {
                continue;
            }
            let (box_min, box_max) = project_axis_box(&cross, extents);
            let (poly_min, poly_max) = project_polygon(&cross, points);
            if box_min > poly_max || box_max < poly_min {
                return false;
            }
        }
    }
    true
}

/// Entry time of a ray into an axis-aligned box (`0` if it starts inside)
pub fn test_ray_hits_axis_box(ray: &Ray, extents: &Extents) -> Option<f32> {
    let o = ray.origin;
    let v = ray.direction;
    let mut zone = [None; 3];
    let mut inside = true;

    for a in 0..3 {
        if o[a] < extents.mins[a] {
            if v[a] <= 0.0 {
                return None;
            }
            zone[a] = Some(extents.mins[a]);
            inside = false;
        } else if o[a] > extents.maxs[a] {
            if v[a] >= 0.0 {
                return None;
            }
            zone[a] = Some(extents.maxs[a]);
            inside = false;
        }
    }
    if inside {
        return Some(0.0);
    }

    let hit_time: Vec<f32> = (0..3)
        .map(|a| zone[a].map_or(-1.0, |plane| (plane - o[a]) / v[a]))
        .collect();
    let mut hit_plane = 0;
    if hit_time[1] > hit_time[0] {
        hit_plane = 1;
    }
    if hit_time[2] > hit_time[hit_plane] {
        hit_plane = 2;
    }

    let use_time = hit_time[hit_plane];
    if use_time < 0.0 {
        return None;
    }
    for a in (0..3).filter(|a| *a != hit_plane) {
        let hit_dist = o[a] + use_time * v[a];
        if hit_dist < extents.mins[a] || hit_dist > extents.maxs[a] {
            return None;
        }
    }
    Some(use_time)
}

/// Entry and exit times of a ray through an axis-aligned box
pub fn test_ray_hits_axis_box_in_out(ray: &Ray, extents: &Extents) -> Option<(f32, f32)> {
    let in_time = test_ray_hits_axis_box(ray, extents)?;
    let o = ray.origin;
    let v = ray.direction;
    let out_time = (0..3)
        .map(|a| {
            if v[a] == 0.0 {
                f32::MAX
            } else if v[a] < 0.0 {
                (extents.mins[a] - o[a]) / v[a]
            } else {
                (extents.maxs[a] - o[a]) / v[a]
            }
        })
        .fold(f32::MAX, f32::min);
    Some((in_time, out_time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_block_hit_from_east() {
        let ray = Ray::new(Vec3::new(5.0, 0.0, 0.5), Vec3::new(-1.0, 0.0, 0.0));
        let t = time_ray_hits_block(&ray, Vec3::zeros(), 0.0, 1.0, 1.0, 1.0);
        assert_relative_eq!(t, 4.0);
    }

    #[test]
    fn test_block_inside_and_miss() {
        let inside = Ray::new(Vec3::new(0.0, 0.0, 0.5), Vec3::x());
        assert_eq!(time_ray_hits_block(&inside, Vec3::zeros(), 0.0, 1.0, 1.0, 1.0), 0.0);

        let above = Ray::new(Vec3::new(5.0, 0.0, 3.0), Vec3::new(-1.0, 0.0, 0.0));
        assert!(time_ray_hits_block(&above, Vec3::zeros(), 0.0, 1.0, 1.0, 1.0) < 0.0);
    }

    #[test]
    fn test_block_hit_from_above() {
        let ray = Ray::new(Vec3::new(0.2, 0.3, 5.0), Vec3::new(0.0, 0.0, -2.0));
        let t = time_ray_hits_block(&ray, Vec3::zeros(), 0.3, 1.0, 1.0, 1.0);
        assert_relative_eq!(t, 2.0);
    }

    #[test]
    fn test_normal_rect_sides_and_corner() {
        let n = get_normal_rect(Vec3::new(1.0, 0.0, 0.5), Vec3::zeros(), 0.0, 1.0, 1.0);
        assert_relative_eq!(n, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-6);

        let n = get_normal_rect(Vec3::new(0.0, -3.0, 0.0), Vec3::zeros(), 0.0, 1.0, 1.0);
        assert_relative_eq!(n, Vec3::new(0.0, -1.0, 0.0), epsilon = 1e-6);

        let n = get_normal_rect(Vec3::new(2.0, 2.0, 0.0), Vec3::zeros(), 0.0, 1.0, 1.0);
        let h = 0.5f32.sqrt();
        assert_relative_eq!(n, Vec3::new(h, h, 0.0), epsilon = 1e-6);
    }

    #[test]
    fn test_rect_circle_cases() {
        assert!(test_rect_circle(Vec3::zeros(), 0.0, 1.0, 1.0, Vec3::new(1.5, 0.0, 0.0), 0.6));
        assert!(!test_rect_circle(Vec3::zeros(), 0.0, 1.0, 1.0, Vec3::new(1.5, 1.5, 0.0), 0.6));
        assert!(test_rect_circle(
            Vec3::zeros(),
            PI * 0.25,
            1.0,
            1.0,
            Vec3::new(1.5, 0.0, 0.0),
            0.2,
        ));
    }

    #[test]
    fn test_rect_rect_cases() {
        // separated
        assert!(!test_rect_rect(
            Vec3::zeros(),
            0.0,
            1.0,
            1.0,
            Vec3::new(3.0, 0.0, 0.0),
            0.0,
            1.0,
            1.0,
        ));
        // overlapping corners
        assert!(test_rect_rect(
            Vec3::zeros(),
            0.0,
            1.0,
            1.0,
            Vec3::new(1.5, 1.5, 0.0),
            0.0,
            1.0,
            1.0,
        ));
        // thin bar crossing without any corner inside
        assert!(test_rect_rect(Vec3::zeros(), 0.0, 0.2, 5.0, Vec3::zeros(), 0.0, 5.0, 0.2));
        // rotated diamond tip reaching in
        assert!(test_rect_rect(
            Vec3::zeros(),
            0.0,
            1.0,
            1.0,
            Vec3::new(2.3, 0.0, 0.0),
            PI * 0.25,
            1.0,
            1.0,
        ));
    }

    #[test]
    fn test_rect_in_rect_cases() {
        assert!(test_rect_in_rect(
            Vec3::zeros(),
            0.0,
            2.0,
            2.0,
            Vec3::new(0.5, 0.0, 0.0),
            0.3,
            1.0,
            1.0,
        ));
        assert!(!test_rect_in_rect(
            Vec3::zeros(),
            0.0,
            2.0,
            2.0,
            Vec3::new(1.5, 0.0, 0.0),
            0.0,
            1.0,
            1.0,
        ));
    }

    #[test]
    fn test_side_hits() {
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 0.0));
        match time_and_side_ray_hits_rect(&ray, Vec3::zeros(), 0.0, 1.0, 1.0) {
            RectHit::Hit { time, side } => {
                assert_relative_eq!(time, 1.0);
                assert_eq!(side, RectSide::West);
            }
            other => panic!("unexpected {other:?}"),
        }
        let inside = Ray::new(Vec3::zeros(), Vec3::x());
        assert_eq!(
            time_and_side_ray_hits_rect(&inside, Vec3::zeros(), 0.0, 1.0, 1.0),
            RectHit::Inside,
        );
        let away = Ray::new(Vec3::new(0.0, 5.0, 0.0), Vec3::y());
        assert_eq!(time_and_side_ray_hits_rect(&away, Vec3::zeros(), 0.0, 1.0, 1.0), RectHit::Miss);
    }

    #[test]
    fn test_pyramid_ray() {
        // straight down onto the apex region
        let ray = Ray::new(Vec3::new(0.0, 0.0, 10.0), Vec3::new(0.0, 0.0, -1.0));
        let t = time_ray_hits_pyramids(&ray, Vec3::zeros(), 0.0, 2.0, 2.0, 4.0, false);
        assert_relative_eq!(t, 6.0, epsilon = 1e-4);

        // passes over the sloped side
        let ray = Ray::new(Vec3::new(-10.0, 0.0, 3.5), Vec3::x());
        let t = time_ray_hits_pyramids(&ray, Vec3::zeros(), 0.0, 2.0, 2.0, 4.0, false);
        assert_relative_eq!(t, 10.0 - 0.25, epsilon = 1e-3);

        // misses over the top
        let ray = Ray::new(Vec3::new(-10.0, 0.0, 5.0), Vec3::x());
        assert!(time_ray_hits_pyramids(&ray, Vec3::zeros(), 0.0, 2.0, 2.0, 4.0, false) < 0.0);
    }

    #[test]
    fn test_distance_from_origin() {
        let ray = Ray::new(Vec3::new(-5.0, 0.0, 0.0), Vec3::x());
        assert_relative_eq!(ray_at_distance_from_origin(&ray, 1.0), 4.0);
        let miss = Ray::new(Vec3::new(-5.0, 3.0, 0.0), Vec3::x());
        assert!(ray_at_distance_from_origin(&miss, 1.0) < 0.0);
    }

    #[test]
    fn test_axis_box_ray() {
        let ext = Extents::new(Vec3::repeat(-1.0), Vec3::repeat(1.0));
        let ray = Ray::new(Vec3::new(-3.0, 0.0, 0.0), Vec3::x());
        let (tin, tout) = test_ray_hits_axis_box_in_out(&ray, &ext).unwrap();
        assert_relative_eq!(tin, 2.0);
        assert_relative_eq!(tout, 4.0);
        let miss = Ray::new(Vec3::new(-3.0, 2.0, 0.0), Vec3::x());
        assert!(test_ray_hits_axis_box(&miss, &ext).is_none());
    }

    #[test]
    fn test_polygon_box_overlap() {
        let ext = Extents::new(Vec3::repeat(-1.0), Vec3::repeat(1.0));
        let tri = [Vec3::new(-2.0, -2.0, 0.0), Vec3::new(2.0, -2.0, 0.0), Vec3::new(0.0, 2.0, 0.0)];
        let plane = Vec4::new(0.0, 0.0, 1.0, 0.0);
        assert!(test_polygon_in_axis_box(&tri, &plane, &ext));
        let high = Vec4::new(0.0, 0.0, 1.0, -5.0);
        assert!(!test_polygon_in_axis_box(&tri, &high, &ext));
    }

    #[test]
    fn test_circles() {
        assert!(test_circle_circle(Vec3::zeros(), 1.0, Vec3::new(2.0, 0.0, 9.0), 1.0));
        assert!(!test_circle_circle(Vec3::zeros(), 1.0, Vec3::new(2.1, 0.0, 0.0), 1.0));
    }
}
