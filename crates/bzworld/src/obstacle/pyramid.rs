//! Four-sided pyramids
//!
//! The base is the usual `2 * width` by `2 * breadth` rectangle and the apex
//! sits `height` above its center. A z-flipped pyramid stands on its apex
//! with the flat base on top, which makes a drivable plateau.

use std::fmt::{self, Write};

use super::common::{prism, ObstacleBase, ZERO_TOLERANCE};
use super::hit_normal::HitNormal;
use crate::export::obj::{self, ObjCounter};
use crate::foundation::math::{constants::PI, utils, Vec2, Vec3, Vec4};
use crate::geometry::{intersect, Ray};
use crate::pack::{PackBuffer, PackError, Packable, UnpackBuffer};
use crate::transform::{MeshTransform, MeshTransformTool};

/// A z-rotated pyramid standing on its position
#[derive(Debug, Clone, PartialEq)]
pub struct PyramidBuilding {
    /// Placement, pass-through attributes and `z_flip`
    pub base: ObstacleBase,
}

impl PyramidBuilding {
    /// Pyramid over a base of half sizes `size.x, size.y` with apex height
    /// `size.z`
    pub fn new(pos: Vec3, angle: f32, size: Vec3) -> Self {
        Self { base: ObstacleBase::new(pos, angle, size) }
    }

    /// Extents are finite and in range
    pub fn is_valid(&self) -> bool {
        self.base.has_valid_extents()
    }

    /// Upside down pyramids have a flat top
    pub fn is_flat_top(&self) -> bool {
        self.base.z_flip
    }

    /// Height made positive, with the flip toggled for negative heights
    fn oriented_height(&self) -> (f32, bool) {
        let height = self.base.size.z;
        if height < 0.0 {
            (-height, !self.base.z_flip)
        } else {
            (height, self.base.z_flip)
        }
    }

    /// Fraction of the base rectangle present at height `z`
    ///
    /// For flipped pyramids the widest section met by something `height`
    /// tall standing at `z` is at its top, so that is what is measured.
    pub fn shrink_factor(&self, z: f32, height: f32) -> f32 {
        let (o_height, flip) = self.oriented_height();
        let z = z - self.base.pos.z;
        let shrink = if o_height <= ZERO_TOLERANCE {
            1.0
        } else if flip {
            (z + height) / o_height
        } else {
            1.0 - z / o_height
        };
        shrink.clamp(0.0, 1.0)
    }

    /// Slope a horizontal wall normal for a wall rising over `base_length`
    fn slope(&self, n: Vec3, base_length: f32) -> Vec3 {
        let height = self.base.size.z;
        let h = 1.0 / height.hypot(base_length);
        let z = if self.base.z_flip { -h * base_length } else { h * base_length };
        Vec3::new(n.x * h * height, n.y * h * height, z)
    }

    /// Normal to the cap at the apex level, if `p` is past it
    fn cap_normal(&self, p: Vec3, shrink: f32) -> Option<Vec3> {
        if shrink != 0.0 {
            return None;
        }
        let b = &self.base;
        if b.z_flip && p.z >= b.pos.z + b.size.z {
            Some(Vec3::z())
        } else if !b.z_flip && p.z <= b.pos.z {
            Some(-Vec3::z())
        } else {
            None
        }
    }

    /// Ray entry time, `-1` on a miss
    pub fn intersect(&self, ray: &Ray) -> f32 {
        let b = &self.base;
        intersect::time_ray_hits_pyramids(
            ray,
            b.pos,
            b.angle,
            b.size.x,
            b.size.y,
            b.size.z,
            b.z_flip,
        )
    }

    /// Sloped normal of the wall nearest to `p`
    ///
    /// Treats the base as square, using the width for the slope.
    pub fn get_normal(&self, p: Vec3) -> Vec3 {
        let b = &self.base;
        let s = self.shrink_factor(p.z, 0.0);
        let n = intersect::get_normal_rect(p, b.pos, b.angle, s * b.size.x, s * b.size.y);
        self.cap_normal(p, s).unwrap_or_else(|| self.slope(n, b.size.x))
    }

    /// Sloped normal that picks the width or breadth by the wall hit, with
    /// the base face handled
    pub fn get_3d_normal(&self, p: Vec3) -> Vec3 {
        let b = &self.base;
        let s = self.shrink_factor(p.z, 0.0);
        let n = intersect::get_normal_rect(p, b.pos, b.angle, s * b.size.x, s * b.size.y);
        if let Some(cap) = self.cap_normal(p, s) {
            return cap;
        }
        if s >= 1.0 - ZERO_TOLERANCE {
            return if b.z_flip { Vec3::z() } else { -Vec3::z() };
        }

        // walls facing along the local y axis rise over the breadth
        let normal_angle = n.y.atan2(n.x);
        let right_angle = utils::fmod(normal_angle - b.angle + 0.5 * PI, PI).abs();
        let base_length = if right_angle < 0.1 || right_angle > PI - 0.1 {
            b.size.y
        } else {
            b.size.x
        };
        self.slope(n, base_length)
    }

    /// Rough overlap with an upright cylinder, ignoring the taper
    pub fn in_cylinder(&self, p: Vec3, radius: f32, height: f32) -> bool {
        let b = &self.base;
        prism::overlaps_height(b, p, height)
            && intersect::test_rect_circle(b.pos, b.angle, b.size.x, b.size.y, p, radius)
    }

    /// Overlap with a tank footprint, using the section at the widest
    /// height the tank spans
    pub fn in_box(&self, p: Vec3, angle: f32, dx: f32, dy: f32, height: f32) -> bool {
        let b = &self.base;
        if p.z + height < b.pos.z || p.z >= b.pos.z + b.size.z {
            return false;
        }
        let s = self.shrink_factor(p.z, height);
        intersect::test_rect_rect(b.pos, b.angle, s * b.size.x, s * b.size.y, p, angle, dx, dy)
    }

    /// Overlap at the new pose; the slopes push tanks out instead of
    /// stopping them
    pub fn in_moving_box(
        &self,
        _old_p: Vec3,
        _old_angle: f32,
        p: Vec3,
        angle: f32,
        dx: f32,
        dy: f32,
        height: f32,
    ) -> bool {
        self.in_box(p, angle, dx, dy, height)
    }

    /// Plane of the sloped wall a footprint straddles
    pub fn is_crossing(&self, p: Vec3, angle: f32, dx: f32, dy: f32, height: f32) -> Option<Vec4> {
        let b = &self.base;
        if !self.in_box(p, angle, dx, dy, height)
            || intersect::test_rect_in_rect(b.pos, b.angle, b.size.x, b.size.y, p, angle, dx, dy)
        {
            return None;
        }
        let (normal, point) = prism::nearest_wall(b, p);
        let h = 1.0 / b.size.z.hypot(b.size.x);
        let n = Vec2::new(normal.x, normal.y) * (h * b.size.z);
        Some(Vec4::new(n.x, n.y, h * b.size.x, -n.dot(&point)))
    }

    /// Contact normal for a tank moving between two poses
    ///
    /// Pyramids always report a contact: the plateau of a flipped pyramid
    /// from above, the base from below, or otherwise the sloped wall at the
    /// first pose.
    pub fn get_hit_normal(
        &self,
        pos1: Vec3,
        _azimuth1: f32,
        pos2: Vec3,
        _azimuth2: f32,
        _dx: f32,
        _dy: f32,
        height: f32,
    ) -> Option<HitNormal> {
        let b = &self.base;
        let (o_height, flip) = self.oriented_height();
        let bottom = b.pos.z;
        let top = bottom + o_height;
        let (low, high) = if pos1.z < pos2.z { (pos1.z, pos2.z) } else { (pos2.z, pos1.z) };

        if flip && high >= top {
            return Some(HitNormal { time: 0.0, normal: Vec3::z() });
        }
        if !flip && low + height < bottom {
            return Some(HitNormal { time: 0.0, normal: -Vec3::z() });
        }

        let s = self.shrink_factor(pos1.z, height);
        let n = intersect::get_normal_rect(pos1, b.pos, b.angle, s * b.size.x, s * b.size.y);
        let h = 1.0 / o_height.hypot(b.size.x);
        let z = if flip { -h * b.size.x } else { h * b.size.x };
        let normal = Vec3::new(n.x * h * o_height, n.y * h * o_height, z);
        Some(HitNormal { time: 0.0, normal })
    }

    /// Base corners `0..4` counter-clockwise from `(+w, +b)`, apex at `4`
    ///
    /// Flipped pyramids report the corners on top and the apex at the
    /// bottom.
    pub fn corner(&self, index: usize) -> Option<Vec3> {
        let b = &self.base;
        let top = b.pos.z + b.size.z;
        let (px, py) = match index {
            4 => {
                let z = if b.z_flip { b.pos.z } else { top };
                return Some(Vec3::new(b.pos.x, b.pos.y, z));
            }
            0 => (1.0, 1.0),
            1 => (-1.0, 1.0),
            2 => (-1.0, -1.0),
            3 => (1.0, -1.0),
            _ => return None,
        };
        let w = px * b.size.x;
        let h = py * b.size.y;
        let (s, c) = b.angle.sin_cos();
        let z = if b.z_flip { top } else { b.pos.z };
        Some(Vec3::new(b.pos.x + c * w - s * h, b.pos.y + s * w + c * h, z))
    }

    /// Copy placed by `xform`; a transform that turns the z axis over
    /// toggles the flip
    pub fn copy_with_transform(&self, xform: &MeshTransform) -> Self {
        let tool = MeshTransformTool::new(xform);
        let old = tool.old_style(self.base.pos, self.base.size, self.base.angle);
        let mut copy = self.clone();
        copy.base.pos = old.pos;
        copy.base.size = old.size;
        copy.base.angle = old.angle;
        copy.base.z_flip = self.base.z_flip != old.flip_z;
        copy.base.set_extents();
        copy
    }

    /// World-file block
    pub fn print(&self, out: &mut impl Write, indent: &str) -> fmt::Result {
        writeln!(out, "{indent}pyramid")?;
        self.base.print_placement(out, indent)?;
        if self.base.z_flip {
            writeln!(out, "{indent}  flipz")?;
        }
        self.base.print_flags(out, indent)?;
        writeln!(out, "{indent}end")?;
        writeln!(out)
    }

    /// OBJ object block: four walls and the base
    pub fn print_obj(&self, out: &mut impl Write, counter: &mut ObjCounter) -> fmt::Result {
        let b = &self.base;
        let sqrt1_2 = std::f32::consts::FRAC_1_SQRT_2;
        let verts = [
            Vec3::new(-1.0, -1.0, 0.0),
            Vec3::new(1.0, -1.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
            Vec3::new(0.0, 0.0, 1.0),
        ];
        let norms = [
            Vec3::new(0.0, -sqrt1_2, sqrt1_2),
            Vec3::new(sqrt1_2, 0.0, sqrt1_2),
            Vec3::new(0.0, sqrt1_2, sqrt1_2),
            Vec3::new(-sqrt1_2, 0.0, sqrt1_2),
            Vec3::new(0.0, 0.0, -1.0),
        ];
        let s = b.size;
        let k = 1.0 / 8.0;
        let txcds = [
            Vec2::new(0.0, 0.0),
            Vec2::new(k * s.x, 0.0),
            Vec2::new(k * s.x, k * s.y),
            Vec2::new(0.0, k * s.y),
            Vec2::new(0.5 * k * s.x, k * s.x.hypot(s.z)),
            Vec2::new(k * s.y, 0.0),
            Vec2::new(0.5 * k * s.y, k * s.y.hypot(s.z)),
        ];

        let mut xform = MeshTransform::new();
        if b.z_flip {
            xform.add_spin(180.0, Vec3::x());
            xform.add_shift(Vec3::z());
        }
        xform.add_scale(s);
        xform.add_spin(utils::rad_to_deg(b.angle), Vec3::z());
        xform.add_shift(b.pos);
        let tool = MeshTransformTool::new(&xform);

        writeln!(out, "# OBJ - start pyramid")?;
        writeln!(out, "o bzpyr_{}", counter.next())?;
        for v in &verts {
            obj::write_vertex(out, &tool.vertex(*v))?;
        }
        for t in &txcds {
            obj::write_texcoord(out, t)?;
        }
        for n in &norms {
            obj::write_normal(out, &tool.normal(*n))?;
        }
        writeln!(out, "usemtl pyrwall")?;
        obj::write_face(out, &[(-1, -1, -5), (-5, -7, -5), (-4, -6, -5)])?;
        obj::write_face(out, &[(-1, -3, -4), (-4, -7, -4), (-3, -2, -4)])?;
        obj::write_face(out, &[(-1, -1, -3), (-3, -7, -3), (-2, -6, -3)])?;
        obj::write_face(out, &[(-1, -3, -2), (-2, -7, -2), (-5, -2, -2)])?;
        obj::write_face(out, &[(-2, -7, -1), (-3, -6, -1), (-4, -5, -1), (-5, -4, -1)])?;
        writeln!(out)
    }
}

impl Packable for PyramidBuilding {
    fn pack(&self, buf: &mut PackBuffer) {
        self.base.pack_prism(buf);
    }

    fn pack_size(&self) -> usize {
        ObstacleBase::PRISM_PACK_SIZE
    }

    fn unpack(buf: &mut UnpackBuffer<'_>) -> Result<Self, PackError> {
        Ok(Self { base: ObstacleBase::unpack_prism(buf)? })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pyramid() -> PyramidBuilding {
        PyramidBuilding::new(Vec3::zeros(), 0.0, Vec3::new(2.0, 2.0, 2.0))
    }

    #[test]
    fn test_shrink_factor() {
        let p = pyramid();
        assert_relative_eq!(p.shrink_factor(0.0, 0.0), 1.0);
        assert_relative_eq!(p.shrink_factor(1.0, 0.0), 0.5);
        assert_relative_eq!(p.shrink_factor(5.0, 0.0), 0.0);
        assert_relative_eq!(p.shrink_factor(-1.0, 0.0), 1.0);

        let mut flipped = pyramid();
        flipped.base.z_flip = true;
        assert_relative_eq!(flipped.shrink_factor(0.5, 0.5), 0.5);

        let flat = PyramidBuilding::new(Vec3::zeros(), 0.0, Vec3::new(2.0, 2.0, 0.0));
        assert_relative_eq!(flat.shrink_factor(3.0, 0.0), 1.0);
    }

    #[test]
    fn test_sloped_normal() {
        let p = pyramid();
        let n = p.get_normal(Vec3::new(1.0, 0.0, 1.0));
        let expected = Vec3::new(1.0, 0.0, 1.0).normalize();
        assert_relative_eq!(n, expected, epsilon = 1e-5);

        let mut flipped = pyramid();
        flipped.base.z_flip = true;
        let n = flipped.get_normal(Vec3::new(1.0, 0.0, 1.0));
        assert!(n.z < 0.0);
    }

    #[test]
    fn test_3d_normal_uses_breadth_for_y_walls() {
        let p = PyramidBuilding::new(Vec3::zeros(), 0.0, Vec3::new(2.0, 4.0, 2.0));
        let n = p.get_3d_normal(Vec3::new(0.0, 2.0, 1.0));
        let expected = Vec3::new(0.0, 2.0, 4.0).normalize();
        assert_relative_eq!(n, expected, epsilon = 1e-5);
        assert_eq!(p.get_3d_normal(Vec3::new(0.0, 0.0, 0.0)), -Vec3::z());
    }

    #[test]
    fn test_ray_from_above_meets_slope() {
        let p = pyramid();
        let ray = Ray::new(Vec3::new(1.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        assert_relative_eq!(p.intersect(&ray), 4.0, epsilon = 1e-4);
        let miss = Ray::new(Vec3::new(3.0, 0.0, 5.0), Vec3::new(0.0, 0.0, -1.0));
        assert!(p.intersect(&miss) < 0.0);
    }

    #[test]
    fn test_in_box_tapers() {
        let p = pyramid();
        assert!(p.in_box(Vec3::new(1.5, 0.0, 0.0), 0.0, 0.1, 0.1, 0.1));
        assert!(!p.in_box(Vec3::new(1.5, 0.0, 1.5), 0.0, 0.1, 0.1, 0.1));
        assert!(p.in_box(Vec3::new(0.2, 0.0, 1.5), 0.0, 0.1, 0.1, 0.1));
        assert!(!p.in_box(Vec3::new(0.0, 0.0, 2.0), 0.0, 0.1, 0.1, 0.1));
    }

    #[test]
    fn test_hit_normal_plateau() {
        let mut p = pyramid();
        p.base.z_flip = true;
        let hit = p
            .get_hit_normal(
                Vec3::new(0.0, 0.0, 2.5),
                0.0,
                Vec3::new(0.0, 0.0, 1.9),
                0.0,
                1.0,
                1.0,
                1.0,
            )
            .unwrap();
        assert_eq!(hit.normal, Vec3::z());
    }

    #[test]
    fn test_corners() {
        let p = PyramidBuilding::new(Vec3::new(1.0, 1.0, 0.0), 0.0, Vec3::new(2.0, 3.0, 4.0));
        assert_relative_eq!(p.corner(0).unwrap(), Vec3::new(3.0, 4.0, 0.0));
        assert_relative_eq!(p.corner(2).unwrap(), Vec3::new(-1.0, -2.0, 0.0));
        assert_relative_eq!(p.corner(4).unwrap(), Vec3::new(1.0, 1.0, 4.0));
        assert!(p.corner(5).is_none());
    }

    #[test]
    fn test_upside_down_transform_toggles_flip() {
        let p = pyramid();
        let mut xform = MeshTransform::new();
        xform.add_spin(180.0, Vec3::x());
        let copy = p.copy_with_transform(&xform);
        assert!(copy.is_flat_top());
        let back = copy.copy_with_transform(&xform);
        assert!(!back.is_flat_top());
    }

    #[test]
    fn test_pack_keeps_flip() {
        let mut p = pyramid();
        p.base.z_flip = true;
        let back = PyramidBuilding::from_bytes(&p.to_bytes()).unwrap();
        assert_eq!(back, p);
    }

    #[test]
    fn test_obj_block() {
        let mut text = String::new();
        let mut counter = ObjCounter::new();
        counter.next();
        pyramid().print_obj(&mut text, &mut counter).unwrap();
        assert!(text.contains("o bzpyr_1\n"));
        assert!(text.contains("usemtl pyrwall\n"));
        assert!(text.contains("v 0.00000000 0.00000000 2.00000000\n"));
        assert!(text.contains("f -2/-7/-1 -3/-6/-1 -4/-5/-1 -5/-4/-1\n"));
    }
}
