//! Attributes shared by every obstacle kind

use std::fmt::{self, Write};

use bitflags::bitflags;

use crate::foundation::math::{utils, Vec2, Vec3, Vec4};
use crate::geometry::{intersect, Extents, Ray};
use crate::pack::{PackBuffer, PackError, UnpackBuffer};

/// Largest coordinate magnitude a valid obstacle may reach
pub const MAX_EXTENT: f32 = 1.0e30;

/// Tolerance for degenerate heights and surface tests
pub const ZERO_TOLERANCE: f32 = 1.0e-6;

/// Distance from a top or bottom face that still counts as touching it
pub(crate) const SURFACE_EPSILON: f32 = 1.0e-3;

pub(crate) const STATE_DRIVE_THRU: u8 = 1 << 0;
pub(crate) const STATE_SHOOT_THRU: u8 = 1 << 1;
pub(crate) const STATE_FLIP_Z: u8 = 1 << 2;
pub(crate) const STATE_RICOCHET: u8 = 1 << 3;

bitflags! {
    /// Where an obstacle came from
    ///
    /// An empty set means the obstacle was authored directly in the world
    /// description.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ObstacleSource: u8 {
        /// Produced by expanding a group instance
        const GROUP_DEF = 1 << 0;
        /// The mesh generated by a container shape
        const CONTAINER = 1 << 1;
    }
}

/// Position, size, rotation and pass-through attributes
#[derive(Debug, Clone, PartialEq)]
pub struct ObstacleBase {
    /// Anchor: bottom center for prisms, extents bottom center for meshes
    pub pos: Vec3,
    /// Half-width, half-breadth, height
    pub size: Vec3,
    /// Rotation about z, radians
    pub angle: f32,
    /// Team mask of tanks that drive through; `0` is solid
    pub drive_through: u8,
    /// Team mask of shots that pass through; `0` is solid
    pub shoot_through: u8,
    /// Shots bounce off
    pub ricochet: bool,
    /// Upside-down variant
    pub z_flip: bool,
    /// Provenance
    pub source: ObstacleSource,
    /// Optional name
    pub name: String,
    /// Slot in the flattened world list of this kind
    pub list_id: u16,
    /// Bounds of everything the obstacle occupies
    pub extents: Extents,
}

impl Default for ObstacleBase {
    fn default() -> Self {
        Self {
            pos: Vec3::zeros(),
            size: Vec3::zeros(),
            angle: 0.0,
            drive_through: 0,
            shoot_through: 0,
            ricochet: false,
            z_flip: false,
            source: ObstacleSource::empty(),
            name: String::new(),
            list_id: 0,
            extents: Extents::empty(),
        }
    }
}

impl ObstacleBase {
    /// Base record for a z-rotated prism
    pub fn new(pos: Vec3, angle: f32, size: Vec3) -> Self {
        let mut base = Self { pos, size, angle, ..Self::default() };
        base.set_extents();
        base
    }

    /// Recompute the extents of the rotated prism
    pub fn set_extents(&mut self) {
        self.extents = Extents::from_rotated_box(self.pos, self.angle, self.size);
    }

    /// Tanks can drive through
    pub fn is_drive_through(&self) -> bool {
        self.drive_through != 0
    }

    /// Shots can pass through
    pub fn is_shoot_through(&self) -> bool {
        self.shoot_through != 0
    }

    /// Both tanks and shots pass through
    pub fn is_passable(&self) -> bool {
        self.is_drive_through() && self.is_shoot_through()
    }

    /// Authored directly in the world description
    pub fn is_from_world(&self) -> bool {
        self.source.is_empty()
    }

    /// Generated from a container shape
    pub fn is_from_container(&self) -> bool {
        self.source.contains(ObstacleSource::CONTAINER)
    }

    /// Extents stay within [`MAX_EXTENT`] and are finite
    pub fn has_valid_extents(&self) -> bool {
        !self.extents.is_empty()
            && self
                .extents
                .mins
                .iter()
                .chain(self.extents.maxs.iter())
                .all(|v| v.is_finite() && v.abs() <= MAX_EXTENT)
    }

    /// Pass-through flags as state bits
    pub(crate) fn pass_bits(&self) -> u8 {
        let mut state = 0;
        if self.is_drive_through() {
            state |= STATE_DRIVE_THRU;
        }
        if self.is_shoot_through() {
            state |= STATE_SHOOT_THRU;
        }
        if self.ricochet {
            state |= STATE_RICOCHET;
        }
        state
    }

    /// Restore pass-through flags from state bits
    pub(crate) fn apply_pass_bits(&mut self, state: u8) {
        self.drive_through = if state & STATE_DRIVE_THRU != 0 { 0xFF } else { 0 };
        self.shoot_through = if state & STATE_SHOOT_THRU != 0 { 0xFF } else { 0 };
        self.ricochet = state & STATE_RICOCHET != 0;
    }

    /// `pos, angle, size, state` as written for prisms
    pub(crate) fn pack_prism(&self, buf: &mut PackBuffer) {
        buf.pack_vec3(&self.pos);
        buf.pack_f32(self.angle);
        buf.pack_vec3(&self.size);
        let mut state = self.pass_bits();
        if self.z_flip {
            state |= STATE_FLIP_Z;
        }
        buf.pack_u8(state);
    }

    pub(crate) const PRISM_PACK_SIZE: usize = 12 + 4 + 12 + 1;

    pub(crate) fn unpack_prism(buf: &mut UnpackBuffer<'_>) -> Result<Self, PackError> {
        let pos = buf.unpack_vec3()?;
        let angle = buf.unpack_f32()?;
        let size = buf.unpack_vec3()?;
        let state = buf.unpack_u8()?;
        let mut base = Self::new(pos, angle, size);
        base.apply_pass_bits(state);
        base.z_flip = state & STATE_FLIP_Z != 0;
        Ok(base)
    }

    /// `position`, `size` and `rotation` lines
    pub(crate) fn print_placement(&self, out: &mut impl Write, indent: &str) -> fmt::Result {
        if !self.name.is_empty() {
            writeln!(out, "{indent}  name {}", self.name)?;
        }
        writeln!(out, "{indent}  position {} {} {}", self.pos.x, self.pos.y, self.pos.z)?;
        writeln!(out, "{indent}  size {} {} {}", self.size.x, self.size.y, self.size.z)?;
        writeln!(out, "{indent}  rotation {}", utils::rad_to_deg(self.angle))
    }

    /// `passable`, `drivethrough`, `shootthrough` and `ricochet` lines
    pub(crate) fn print_flags(&self, out: &mut impl Write, indent: &str) -> fmt::Result {
        if self.is_passable() {
            writeln!(out, "{indent}  passable")?;
        } else {
            if self.is_drive_through() {
                writeln!(out, "{indent}  drivethrough")?;
            }
            if self.is_shoot_through() {
                writeln!(out, "{indent}  shootthrough")?;
            }
        }
        if self.ricochet {
            writeln!(out, "{indent}  ricochet")?;
        }
        Ok(())
    }
}

/// Queries shared by the rectangular prisms (boxes, bases, teleporters)
pub(crate) mod prism {
    use super::*;

    /// Outward normal, with the top and bottom faces handled
    pub fn normal_3d(base: &ObstacleBase, p: Vec3) -> Vec3 {
        let top = base.pos.z + base.size.z;
        if (p.z - top).abs() < SURFACE_EPSILON {
            Vec3::z()
        } else if (p.z - base.pos.z).abs() < SURFACE_EPSILON {
            -Vec3::z()
        } else {
            intersect::get_normal_rect(p, base.pos, base.angle, base.size.x, base.size.y)
        }
    }

    /// Vertical overlap between `[p.z, p.z + height]` and the prism
    pub fn overlaps_height(base: &ObstacleBase, p: Vec3, height: f32) -> bool {
        p.z < base.pos.z + base.size.z && p.z + height >= base.pos.z
    }

    /// The footprint rect at the new pose overlaps, or any corner path
    /// between the poses crosses the obstacle's rect
    pub fn swept_overlap(
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
    ) -> bool {
        if intersect::test_rect_rect(center, rect_angle, rect_dx, rect_dy, pos, angle, dx, dy) {
            return true;
        }
        crate::obstacle::hit_normal::swept_rect_time(
            old_pos, old_angle, pos, angle, dx, dy, center, rect_angle, rect_dx, rect_dy,
        )
        .is_some_and(|(t, _)| t <= 1.0)
    }

    /// Plane of the wall nearest to `p` when the tank straddles the outline
    ///
    /// Only the horizontal part is filled; callers slope it if needed.
    pub fn nearest_wall(base: &ObstacleBase, p: Vec3) -> (Vec2, Vec2) {
        let center = utils::xy(&base.pos);
        let (s, c) = (-base.angle).sin_cos();
        let d = utils::xy(&p) - center;
        let x = c * d.x - s * d.y;
        let y = c * d.y + s * d.x;
        let (sa, ca) = base.angle.sin_cos();
        let (normal, reach) = if (x.abs() - base.size.x).abs() < (y.abs() - base.size.y).abs() {
            let n = if x < 0.0 { Vec2::new(-ca, -sa) } else { Vec2::new(ca, sa) };
            (n, base.size.x)
        } else {
            let n = if y < 0.0 { Vec2::new(sa, -ca) } else { Vec2::new(-sa, ca) };
            (n, base.size.y)
        };
        (normal, center + normal * reach)
    }

    /// Vertical wall plane through `point` facing `normal`
    pub fn wall_plane(normal: Vec2, point: Vec2) -> Vec4 {
        Vec4::new(normal.x, normal.y, 0.0, -normal.dot(&point))
    }

    /// Ray entry time into the prism
    pub fn intersect(base: &ObstacleBase, ray: &Ray) -> f32 {
        intersect::time_ray_hits_block(
            ray,
            base.pos,
            base.angle,
            base.size.x,
            base.size.y,
            base.size.z,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passable_needs_both_flags() {
        let mut base = ObstacleBase::default();
        for (drive, shoot) in [(0u8, 0u8), (0xFF, 0), (0, 0xFF), (0xFF, 0xFF), (1, 4)] {
            base.drive_through = drive;
            base.shoot_through = shoot;
            assert_eq!(base.is_passable(), drive != 0 && shoot != 0);
        }
    }

    #[test]
    fn test_prism_state_round_trip() {
        let mut base = ObstacleBase::new(Vec3::new(1.0, 2.0, 3.0), 0.5, Vec3::new(4.0, 5.0, 6.0));
        base.drive_through = 3;
        base.z_flip = true;
        base.ricochet = true;
        let mut buf = PackBuffer::new();
        base.pack_prism(&mut buf);
        assert_eq!(buf.len(), ObstacleBase::PRISM_PACK_SIZE);
        let back = ObstacleBase::unpack_prism(&mut UnpackBuffer::new(buf.as_bytes())).unwrap();
        assert_eq!(back.drive_through, 0xFF);
        assert_eq!(back.shoot_through, 0);
        assert!(back.z_flip && back.ricochet);
        assert_eq!(back.extents, base.extents);
    }

    #[test]
    fn test_source_flags() {
        let mut base = ObstacleBase::default();
        assert!(base.is_from_world());
        base.source = ObstacleSource::GROUP_DEF | ObstacleSource::CONTAINER;
        assert!(!base.is_from_world());
        assert!(base.is_from_container());
    }

    #[test]
    fn test_huge_extents_invalid() {
        let base = ObstacleBase::new(Vec3::new(2.0e30, 0.0, 0.0), 0.0, Vec3::repeat(1.0));
        assert!(!base.has_valid_extents());
        let base = ObstacleBase::new(Vec3::zeros(), 0.0, Vec3::repeat(1.0));
        assert!(base.has_valid_extents());
    }
}
