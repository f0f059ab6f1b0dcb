//! Swept collision between a moving tank footprint and a rectangular prism
//!
//! The tank is a rectangle of half sizes `dx, dy` moving from one pose to
//! another. Its corners trace straight segments, so testing only those
//! against the obstacle misses an obstacle corner slipping between two tank
//! corners. The obstacle's corners are therefore also traced through the
//! tank's frame and tested against the tank's own rectangle, and the
//! earliest contact of either pass wins.

use crate::foundation::math::{constants::PI, Vec3};
use crate::geometry::{intersect, Ray, RectHit};

/// Earliest contact of a swept footprint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitNormal {
    /// Fraction of the motion at contact, in `[0, 1]` for hits within it
    pub time: f32,
    /// Outward normal of the surface that was hit
    pub normal: Vec3,
}

const CORNERS: [(f32, f32); 4] = [(1.0, 1.0), (-1.0, 1.0), (-1.0, -1.0), (1.0, -1.0)];

fn corner(pos: Vec3, angle: f32, dx: f32, dy: f32, (sx, sy): (f32, f32)) -> Vec3 {
    let (s, c) = angle.sin_cos();
    let lx = sx * dx;
    let ly = sy * dy;
    Vec3::new(pos.x + c * lx - s * ly, pos.y + s * lx + c * ly, 0.0)
}

/// Express `p` in the frame of a rectangle at `origin` rotated by `angle`
fn to_frame(p: Vec3, origin: Vec3, angle: f32) -> Vec3 {
    let (s, c) = (-angle).sin_cos();
    let x = p.x - origin.x;
    let y = p.y - origin.y;
    Vec3::new(c * x - s * y, c * y + s * x, 0.0)
}

fn unit_at(angle: f32) -> Vec3 {
    Vec3::new(angle.cos(), angle.sin(), 0.0)
}

/// Earliest time the footprint moving from `(old_pos, old_angle)` to
/// `(pos, angle)` touches the rectangle at `center`, with the normal of the
/// contact
///
/// Times are measured along the motion; callers interested only in the
/// current step should reject times above `1`. Contacts that already exist
/// at the start of the motion are not reported.
pub(crate) fn swept_rect_time(
    old_pos: Vec3,
    old_angle: f32,
    pos: Vec3,
    angle: f32,
    dx: f32,
    dy: f32,
    center: Vec3,
    rect_angle: f32,
    rect_dx: f32,
    rect_dy: f32,
) -> Option<(f32, Vec3)> {
    let mut best: Option<(f32, Vec3)> = None;

    // tank corners against the obstacle
    for unit in CORNERS {
        let from = corner(old_pos, old_angle, dx, dy, unit);
        let to = corner(pos, angle, dx, dy, unit);
        let hit = intersect::time_and_side_ray_hits_rect(
            &Ray::segment(from, to),
            center,
            rect_angle,
            rect_dx,
            rect_dy,
        );
        if let RectHit::Hit { time, side } = hit {
            if best.map_or(true, |(t, _)| time < t) {
                best = Some((time, unit_at(rect_angle + side.local_angle())));
            }
        }
    }

    // obstacle corners against the tank, seen from the tank
    for unit in CORNERS {
        let c = corner(center, rect_angle, rect_dx, rect_dy, unit);
        let from = to_frame(c, old_pos, old_angle);
        let to = to_frame(c, pos, angle);
        let hit = intersect::time_and_side_ray_hits_rect(
            &Ray::segment(from, to),
            Vec3::zeros(),
            0.0,
            dx,
            dy,
        );
        if let RectHit::Hit { time, side } = hit {
            if best.map_or(true, |(t, _)| time < t) {
                let azimuth = old_angle + time * (angle - old_angle);
                best = Some((time, unit_at(azimuth + side.local_angle() + PI)));
            }
        }
    }

    best
}

/// Swept contact against a prism standing on `o_pos`
///
/// Side contacts come from [`swept_rect_time`]. A footprint that starts at
/// or above the roof and ends below it lands on the roof instead, unless a
/// side was hit first.
pub(crate) fn rect_hit_normal(
    pos1: Vec3,
    azimuth1: f32,
    pos2: Vec3,
    azimuth2: f32,
    dx: f32,
    dy: f32,
    o_pos: Vec3,
    o_angle: f32,
    o_dx: f32,
    o_dy: f32,
    o_height: f32,
) -> Option<HitNormal> {
    let side = swept_rect_time(pos1, azimuth1, pos2, azimuth2, dx, dy, o_pos, o_angle, o_dx, o_dy)
        .filter(|(t, _)| *t <= 1.0)
        .map(|(time, normal)| HitNormal { time, normal });

    let top = o_pos.z + o_height;
    let roof = if pos1.z >= top && pos2.z < top {
        let time = (pos1.z - top) / (pos1.z - pos2.z);
        let azimuth = azimuth1 + time * (azimuth2 - azimuth1);
        let landing = pos1 + (pos2 - pos1) * time;
        intersect::test_rect_rect(o_pos, o_angle, o_dx, o_dy, landing, azimuth, dx, dy)
            .then_some(HitNormal { time, normal: Vec3::z() })
    } else {
        None
    };

    match (side, roof) {
        (Some(s), Some(r)) => Some(if r.time < s.time { r } else { s }),
        (s, r) => s.or(r),
    }
}
