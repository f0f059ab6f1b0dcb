//! Rectangular prisms

use std::fmt::{self, Write};

use super::common::{prism, ObstacleBase};
use super::hit_normal::{self, HitNormal};
use crate::export::obj::{self, ObjCounter};
use crate::foundation::math::{Vec3, Vec4};
use crate::geometry::{intersect, Ray};
use crate::pack::{PackBuffer, PackError, Packable, UnpackBuffer};
use crate::transform::{MeshTransform, MeshTransformTool};

/// A z-rotated box standing on its position
#[derive(Debug, Clone, PartialEq)]
pub struct BoxBuilding {
    /// Placement and pass-through attributes
    pub base: ObstacleBase,
    /// Collides but is not drawn
    pub invisible: bool,
}

impl BoxBuilding {
    /// Box with half-width `size.x`, half-breadth `size.y` and height `size.z`
    pub fn new(pos: Vec3, angle: f32, size: Vec3) -> Self {
        Self { base: ObstacleBase::new(pos, angle, size), invisible: false }
    }

    fn top(&self) -> f32 {
        self.base.pos.z + self.base.size.z
    }

    /// Extents are finite and in range
    pub fn is_valid(&self) -> bool {
        self.base.has_valid_extents()
    }

    /// Ray entry time, `-1` on a miss
    pub fn intersect(&self, ray: &Ray) -> f32 {
        prism::intersect(&self.base, ray)
    }

    /// Horizontal normal of the nearest wall
    pub fn get_normal(&self, p: Vec3) -> Vec3 {
        let b = &self.base;
        intersect::get_normal_rect(p, b.pos, b.angle, b.size.x, b.size.y)
    }

    /// Normal including the top and bottom faces
    pub fn get_3d_normal(&self, p: Vec3) -> Vec3 {
        prism::normal_3d(&self.base, p)
    }

    /// Overlap with an upright cylinder standing on `p`
    pub fn in_cylinder(&self, p: Vec3, radius: f32, height: f32) -> bool {
        let b = &self.base;
        prism::overlaps_height(b, p, height)
            && intersect::test_rect_circle(b.pos, b.angle, b.size.x, b.size.y, p, radius)
    }

    /// Overlap with a tank footprint of half sizes `dx, dy` standing on `p`
    pub fn in_box(&self, p: Vec3, angle: f32, dx: f32, dy: f32, height: f32) -> bool {
        let b = &self.base;
        prism::overlaps_height(b, p, height)
            && intersect::test_rect_rect(b.pos, b.angle, b.size.x, b.size.y, p, angle, dx, dy)
    }

    /// Overlap at the new pose, or contact anywhere on the way there
    pub fn in_moving_box(
        &self,
        old_p: Vec3,
        old_angle: f32,
        p: Vec3,
        angle: f32,
        dx: f32,
        dy: f32,
        height: f32,
    ) -> bool {
        let b = &self.base;
        let top = self.top();
        // ground level slabs are handled by the ground itself
        if top <= 0.0 {
            return false;
        }
        let (low, high) = if old_p.z > p.z { (p.z, old_p.z) } else { (old_p.z, p.z) };
        if low >= top || high + height < b.pos.z {
            return false;
        }
        prism::swept_overlap(old_p, old_angle, p, angle, dx, dy, b.pos, b.angle, b.size.x, b.size.y)
    }

    /// Plane of the wall a footprint straddles
    ///
    /// `None` when the footprint is clear of the box or entirely inside it.
    pub fn is_crossing(&self, p: Vec3, angle: f32, dx: f32, dy: f32, height: f32) -> Option<Vec4> {
        let b = &self.base;
        if !self.in_box(p, angle, dx, dy, height)
            || intersect::test_rect_in_rect(b.pos, b.angle, b.size.x, b.size.y, p, angle, dx, dy)
        {
            return None;
        }
        let (normal, point) = prism::nearest_wall(b, p);
        Some(prism::wall_plane(normal, point))
    }

    /// Earliest contact of a footprint moving between two poses
    pub fn get_hit_normal(
        &self,
        pos1: Vec3,
        azimuth1: f32,
        pos2: Vec3,
        azimuth2: f32,
        dx: f32,
        dy: f32,
        _height: f32,
    ) -> Option<HitNormal> {
        let b = &self.base;
        hit_normal::rect_hit_normal(
            pos1, azimuth1, pos2, azimuth2, dx, dy, b.pos, b.angle, b.size.x, b.size.y, b.size.z,
        )
    }

    /// Copy placed by `xform`
    pub fn copy_with_transform(&self, xform: &MeshTransform) -> Self {
        let tool = MeshTransformTool::new(xform);
        let old = tool.old_style(self.base.pos, self.base.size, self.base.angle);
        let mut copy = self.clone();
        copy.base.pos = old.pos;
        copy.base.size = old.size;
        copy.base.angle = old.angle;
        copy.base.set_extents();
        copy
    }

    /// World-file block
    pub fn print(&self, out: &mut impl Write, indent: &str) -> fmt::Result {
        writeln!(out, "{indent}box")?;
        self.base.print_placement(out, indent)?;
        self.base.print_flags(out, indent)?;
        writeln!(out, "{indent}end")?;
        writeln!(out)
    }

    /// OBJ object block
    pub fn print_obj(&self, out: &mut impl Write, counter: &mut ObjCounter) -> fmt::Result {
        let b = &self.base;
        obj::write_prism(out, counter, "box", b.pos, b.angle, b.size, "boxtop", "boxwall")
    }
}

impl Packable for BoxBuilding {
    fn pack(&self, buf: &mut PackBuffer) {
        self.base.pack_prism(buf);
    }

    fn pack_size(&self) -> usize {
        ObstacleBase::PRISM_PACK_SIZE
    }

    fn unpack(buf: &mut UnpackBuffer<'_>) -> Result<Self, PackError> {
        Ok(Self { base: ObstacleBase::unpack_prism(buf)?, invisible: false })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::constants::HALF_PI;
    use approx::assert_relative_eq;

    fn unit_box() -> BoxBuilding {
        BoxBuilding::new(Vec3::zeros(), 0.0, Vec3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_ray_hits_east_face() {
        let b = unit_box();
        let ray = Ray::new(Vec3::new(5.0, 0.0, 0.5), Vec3::new(-1.0, 0.0, 0.0));
        assert_relative_eq!(b.intersect(&ray), 4.0);
        assert_relative_eq!(b.get_normal(Vec3::new(1.0, 0.0, 0.5)), Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_3d_normal_on_roof() {
        let b = unit_box();
        assert_eq!(b.get_3d_normal(Vec3::new(0.2, 0.1, 1.0)), Vec3::z());
        assert_eq!(b.get_3d_normal(Vec3::new(0.2, 0.1, 0.0)), -Vec3::z());
        assert_relative_eq!(
            b.get_3d_normal(Vec3::new(0.1, -1.0, 0.5)),
            Vec3::new(0.0, -1.0, 0.0),
            epsilon = 1e-6,
        );
    }

    #[test]
    fn test_face_point_stays_inside_under_jitter() {
        let b = unit_box();
        for jitter in [-1.0e-5_f32, 0.0, 1.0e-5] {
            assert!(b.in_box(Vec3::new(1.0 + jitter, 0.0, 0.0), 0.0, 0.01, 0.01, 0.0));
        }
    }

    #[test]
    fn test_in_box_points_lie_in_extents() {
        let b = BoxBuilding::new(Vec3::new(3.0, -2.0, 1.0), 0.6, Vec3::new(2.0, 1.0, 4.0));
        let mut bounds = b.base.extents;
        bounds.add_margin(1.0e-2);
        for i in -20..=20 {
            for j in -20..=20 {
                let p = Vec3::new(3.0 + i as f32 * 0.2, -2.0 + j as f32 * 0.2, 2.0);
                if b.in_box(p, 0.0, 1.0e-3, 1.0e-3, 0.0) {
                    assert!(bounds.contains_point(p));
                }
            }
        }
    }

    #[test]
    fn test_height_ranges() {
        let b = unit_box();
        assert!(!b.in_box(Vec3::new(0.0, 0.0, 1.0), 0.0, 0.5, 0.5, 1.0));
        assert!(b.in_box(Vec3::new(0.0, 0.0, -1.0), 0.0, 0.5, 0.5, 1.0));
        assert!(!b.in_cylinder(Vec3::new(0.0, 0.0, -2.0), 0.5, 1.0));
        assert!(b.in_cylinder(Vec3::new(1.4, 0.0, 0.5), 0.5, 1.0));
    }

    #[test]
    fn test_moving_box_catches_tunneling() {
        let b = unit_box();
        let old = Vec3::new(-5.0, 0.0, 0.0);
        let new = Vec3::new(5.0, 0.0, 0.0);
        assert!(!b.in_box(new, 0.0, 0.5, 0.5, 1.0));
        assert!(b.in_moving_box(old, 0.0, new, 0.0, 0.5, 0.5, 1.0));
        assert!(!b.in_moving_box(old, 0.0, Vec3::new(-3.0, 0.0, 0.0), 0.0, 0.5, 0.5, 1.0));
    }

    #[test]
    fn test_flat_ground_box_never_collides_when_moving() {
        let b = BoxBuilding::new(Vec3::zeros(), 0.0, Vec3::new(5.0, 5.0, 0.0));
        assert!(!b.in_moving_box(Vec3::zeros(), 0.0, Vec3::new(1.0, 0.0, 0.0), 0.0, 1.0, 1.0, 1.0));
    }

    #[test]
    fn test_crossing_plane_faces_away() {
        let b = unit_box();
        let plane = b.is_crossing(Vec3::new(1.2, 0.0, 0.0), 0.0, 0.5, 0.5, 1.0).unwrap();
        assert_relative_eq!(plane, Vec4::new(1.0, 0.0, 0.0, -1.0), epsilon = 1e-6);
        assert!(b.is_crossing(Vec3::zeros(), 0.0, 0.2, 0.2, 1.0).is_none());
        assert!(b.is_crossing(Vec3::new(5.0, 0.0, 0.0), 0.0, 0.2, 0.2, 1.0).is_none());
    }

    #[test]
    fn test_identity_copy_is_unchanged() {
        let b = BoxBuilding::new(Vec3::new(1.0, 2.0, 3.0), 0.3, Vec3::new(4.0, 5.0, 6.0));
        let copy = b.copy_with_transform(&MeshTransform::new());
        assert_eq!(copy, b);
    }

    #[test]
    fn test_spun_copy() {
        let b = BoxBuilding::new(Vec3::new(10.0, 0.0, 0.0), 0.0, Vec3::new(1.0, 2.0, 3.0));
        let mut xform = MeshTransform::new();
        xform.add_spin(90.0, Vec3::z());
        let copy = b.copy_with_transform(&xform);
        assert_relative_eq!(copy.base.pos, Vec3::new(0.0, 10.0, 0.0), epsilon = 1e-4);
        assert_relative_eq!(copy.base.angle, HALF_PI, epsilon = 1e-5);
        assert_relative_eq!(copy.base.size, Vec3::new(1.0, 2.0, 3.0), epsilon = 1e-5);
    }

    #[test]
    fn test_pack_round_trip() {
        let mut b = BoxBuilding::new(Vec3::new(1.0, -2.0, 0.5), 1.25, Vec3::new(3.0, 4.0, 5.0));
        b.base.shoot_through = 0xFF;
        b.base.ricochet = true;
        let bytes = b.to_bytes();
        assert_eq!(bytes.len(), b.pack_size());
        assert_eq!(BoxBuilding::from_bytes(&bytes).unwrap(), b);
    }

    #[test]
    fn test_print_block() {
        let mut b = BoxBuilding::new(Vec3::new(1.0, 2.0, 0.0), 0.0, Vec3::new(3.0, 4.0, 5.0));
        b.base.drive_through = 0xFF;
        let mut text = String::new();
        b.print(&mut text, "").unwrap();
        assert_eq!(
            text,
            "box\n  position 1 2 0\n  size 3 4 5\n  rotation 0\n  drivethrough\nend\n\n"
        );
    }
}
