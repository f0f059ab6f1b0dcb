//! Team bases

use std::fmt::{self, Write};

use super::common::{prism, ObstacleBase, SURFACE_EPSILON};
use super::hit_normal::{self, HitNormal};
use crate::export::obj::{self, ObjCounter};
use crate::foundation::math::{Vec3, Vec4};
use crate::geometry::{intersect, Ray};
use crate::pack::{PackBuffer, PackError, Packable, UnpackBuffer};
use crate::transform::{MeshTransform, MeshTransformTool};

/// A box owned by a team
///
/// Bases are often flat pads at ground level (height `0`); those take part
/// in "am I on my base" checks but never block movement.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseBuilding {
    /// Placement and pass-through attributes
    pub base: ObstacleBase,
    /// Owning team
    pub team: u16,
}

impl BaseBuilding {
    /// Base of `team` with the given box geometry
    pub fn new(pos: Vec3, angle: f32, size: Vec3, team: u16) -> Self {
        Self { base: ObstacleBase::new(pos, angle, size), team }
    }

    fn top(&self) -> f32 {
        self.base.pos.z + self.base.size.z
    }

    /// Extents are finite and in range
    pub fn is_valid(&self) -> bool {
        self.base.has_valid_extents()
    }

    /// True when `p` stands on or inside the base's footprint
    pub fn is_on_base(&self, p: Vec3) -> bool {
        let b = &self.base;
        p.z >= b.pos.z
            && p.z <= self.top() + SURFACE_EPSILON
            && intersect::test_rect_circle(b.pos, b.angle, b.size.x, b.size.y, p, 0.0)
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

    /// Overlap with a tank footprint; standing exactly on the top counts
    pub fn in_box(&self, p: Vec3, angle: f32, dx: f32, dy: f32, height: f32) -> bool {
        let b = &self.base;
        p.z <= self.top()
            && p.z + height >= b.pos.z
            && intersect::test_rect_rect(b.pos, b.angle, b.size.x, b.size.y, p, angle, dx, dy)
    }

    /// Swept overlap; flat ground-level bases never collide
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

    /// Earliest contact of a footprint moving between two poses; flat
    /// ground-level bases report none
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
        if self.top() <= 0.0 {
            return None;
        }
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
        writeln!(out, "{indent}base")?;
        self.base.print_placement(out, indent)?;
        writeln!(out, "{indent}  color {}", self.team)?;
        self.base.print_flags(out, indent)?;
        writeln!(out, "{indent}end")?;
        writeln!(out)
    }

    /// OBJ object block
    pub fn print_obj(&self, out: &mut impl Write, counter: &mut ObjCounter) -> fmt::Result {
        let b = &self.base;
        let top = format!("basetop_team{}", self.team);
        obj::write_prism(out, counter, "base", b.pos, b.angle, b.size, &top, "basewall")
    }
}

impl Packable for BaseBuilding {
    fn pack(&self, buf: &mut PackBuffer) {
        buf.pack_u16(self.team);
        self.base.pack_prism(buf);
    }

    fn pack_size(&self) -> usize {
        2 + ObstacleBase::PRISM_PACK_SIZE
    }

    fn unpack(buf: &mut UnpackBuffer<'_>) -> Result<Self, PackError> {
        let team = buf.unpack_u16()?;
        Ok(Self { base: ObstacleBase::unpack_prism(buf)?, team })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_team_packed_first() {
        let base = BaseBuilding::new(Vec3::new(1.0, 2.0, 0.0), 0.0, Vec3::new(5.0, 5.0, 1.0), 3);
        let bytes = base.to_bytes();
        assert_eq!(bytes.len(), base.pack_size());
        assert_eq!(&bytes[..2], &[0, 3]);
        assert_eq!(BaseBuilding::from_bytes(&bytes).unwrap(), base);
    }

    #[test]
    fn test_ground_pad_never_blocks() {
        let pad = BaseBuilding::new(Vec3::zeros(), 0.0, Vec3::new(10.0, 10.0, 0.0), 1);
        assert!(!pad.in_moving_box(
            Vec3::new(-20.0, 0.0, 0.0),
            0.0,
            Vec3::new(0.0, 0.0, 0.0),
            0.0,
            1.0,
            1.0,
            2.0
        ));
        assert!(pad
            .get_hit_normal(Vec3::new(-20.0, 0.0, 0.0), 0.0, Vec3::zeros(), 0.0, 1.0, 1.0, 2.0)
            .is_none());
        // still counts as being on the base
        assert!(pad.in_box(Vec3::zeros(), 0.0, 1.0, 1.0, 2.0));
        assert!(pad.is_on_base(Vec3::new(3.0, 3.0, 0.0)));
        assert!(!pad.is_on_base(Vec3::new(11.0, 0.0, 0.0)));
    }

    #[test]
    fn test_raised_base_blocks() {
        let base = BaseBuilding::new(Vec3::zeros(), 0.0, Vec3::new(2.0, 2.0, 1.0), 1);
        assert!(base.in_moving_box(
            Vec3::new(-10.0, 0.0, 0.0),
            0.0,
            Vec3::new(10.0, 0.0, 0.0),
            0.0,
            1.0,
            1.0,
            2.0
        ));
        let hit = base
            .get_hit_normal(Vec3::new(-10.0, 0.0, 0.0), 0.0, Vec3::zeros(), 0.0, 1.0, 1.0, 2.0)
            .unwrap();
        assert!(hit.normal.x < 0.0);
        // resting on the roof touches
        assert!(base.in_box(Vec3::new(0.0, 0.0, 1.0), 0.0, 1.0, 1.0, 2.0));
    }

    #[test]
    fn test_print_color() {
        let base = BaseBuilding::new(Vec3::zeros(), 0.0, Vec3::new(1.0, 1.0, 0.0), 2);
        let mut text = String::new();
        base.print(&mut text, "").unwrap();
        assert!(text.starts_with("base\n"));
        assert!(text.contains("  color 2\n"));
    }
}
