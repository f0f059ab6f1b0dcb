//! Teleporters
//!
//! A teleporter is a frame: two square posts joined by a crossbar, with the
//! teleporting field filling the opening. The stored size covers the whole
//! frame (breadth widened by a post on each side, height raised by the
//! crossbar); the authored size, which is what gets packed and printed, is
//! the opening alone.

use std::fmt::{self, Write};

use super::common::{prism, ObstacleBase, SURFACE_EPSILON};
use super::hit_normal::{self, HitNormal};
use crate::export::obj::{self, ObjCounter};
use crate::foundation::math::{constants::PI, utils, Vec2, Vec3, Vec4};
use crate::geometry::{intersect, Ray};
use crate::pack::{string_pack_size, PackBuffer, PackError, Packable, UnpackBuffer};
use crate::transform::{MeshTransform, MeshTransformTool};

/// Side of a teleporter a tank or shot enters through
pub type TeleporterFace = usize;

/// A teleporter frame
#[derive(Debug, Clone, PartialEq)]
pub struct Teleporter {
    /// Placement with the frame-inclusive size
    pub base: ObstacleBase,
    /// Post and crossbar thickness
    pub border: f32,
}

impl Teleporter {
    /// Teleporter whose opening has half-width `size.x`, half-breadth
    /// `size.y` and height `size.z`
    pub fn new(pos: Vec3, angle: f32, size: Vec3, border: f32) -> Self {
        let framed = Vec3::new(size.x, size.y + 2.0 * border, size.z + border);
        Self { base: ObstacleBase::new(pos, angle, framed), border }
    }

    /// The opening's size, as authored
    pub fn authored_size(&self) -> Vec3 {
        let s = self.base.size;
        Vec3::new(s.x, s.y - 2.0 * self.border, s.z - self.border)
    }

    fn width(&self) -> f32 {
        self.base.size.x
    }

    fn breadth(&self) -> f32 {
        self.base.size.y
    }

    fn height(&self) -> f32 {
        self.base.size.z
    }

    /// Half-breadth of the opening
    fn field_breadth(&self) -> f32 {
        self.breadth() - self.border
    }

    /// Height of the opening
    fn field_height(&self) -> f32 {
        self.height() - self.border
    }

    /// Point expressed in the teleporter's frame, relative to its position
    fn local(&self, p: Vec3) -> Vec3 {
        let (s, c) = (-self.base.angle).sin_cos();
        let d = p - self.base.pos;
        Vec3::new(c * d.x - s * d.y, c * d.y + s * d.x, d.z)
    }

    /// Center of the post at signed distance `offset` along the local y axis
    fn post_center(&self, offset: f32) -> Vec3 {
        let (s, c) = self.base.angle.sin_cos();
        self.base.pos + Vec3::new(-s * offset, c * offset, 0.0)
    }

    /// Extents are finite and in range
    pub fn is_valid(&self) -> bool {
        self.base.has_valid_extents()
    }

    /// Ray entry time into the frame's bounding block, `-1` on a miss
    pub fn intersect(&self, ray: &Ray) -> f32 {
        prism::intersect(&self.base, ray)
    }

    /// Normal of the nearest post, treating the post as a column
    pub fn get_normal(&self, p: Vec3) -> Vec3 {
        let half = 0.5 * self.border;
        let d = self.breadth() - half;
        let j = if self.local(p).y > 0.0 { d } else { -d };
        intersect::get_normal_rect(p, self.post_center(j), self.base.angle, half, half)
    }

    /// Normal including the crossbar top and the ground face
    pub fn get_3d_normal(&self, p: Vec3) -> Vec3 {
        let top = self.base.pos.z + self.height();
        if (p.z - top).abs() < SURFACE_EPSILON {
            return Vec3::z();
        }
        self.get_normal(p)
    }

    /// Overlap of an upright cylinder with the frame's block
    pub fn in_cylinder(&self, p: Vec3, radius: f32, height: f32) -> bool {
        let b = &self.base;
        p.z + height >= b.pos.z
            && p.z <= b.pos.z + self.height()
            && intersect::test_rect_circle(b.pos, b.angle, self.width(), self.breadth(), p, radius)
    }

    /// Overlap with the posts or the crossbar
    pub fn in_box(&self, p: Vec3, angle: f32, dx: f32, dy: f32, height: f32) -> bool {
        let b = &self.base;
        let bar_bottom = b.pos.z + self.field_height();
        let top = b.pos.z + self.height();

        if p.z < bar_bottom && p.z + height >= b.pos.z {
            let r = 0.5 * self.border;
            let d = self.breadth() - r;
            for offset in [d, -d] {
                if intersect::test_rect_rect(
                    p,
                    angle,
                    dx,
                    dy,
                    self.post_center(offset),
                    b.angle,
                    r,
                    r,
                ) {
                    return true;
                }
            }
        }
        p.z <= top
            && p.z + height >= bar_bottom
            && intersect::test_rect_rect(
                p,
                angle,
                dx,
                dy,
                b.pos,
                b.angle,
                self.width(),
                self.breadth(),
            )
    }

    /// Overlap at the new pose
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

    /// Plane of the field a footprint is pushing through
    pub fn is_crossing(&self, p: Vec3, angle: f32, dx: f32, dy: f32, _height: f32) -> Option<Vec4> {
        let b = &self.base;
        if !intersect::test_rect_rect(
            p,
            angle,
            dx,
            dy,
            b.pos,
            b.angle,
            self.width(),
            self.field_breadth(),
        )
            || p.z < b.pos.z
            || p.z > b.pos.z + self.field_height()
        {
            return None;
        }
        let (sa, ca) = b.angle.sin_cos();
        let normal = if self.local(p).x < 0.0 { Vec2::new(-ca, -sa) } else { Vec2::new(ca, sa) };
        let point = utils::xy(&b.pos) + normal * self.width();
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
            pos1,
            azimuth1,
            pos2,
            azimuth2,
            dx,
            dy,
            b.pos,
            b.angle,
            self.width(),
            self.breadth(),
            self.height(),
        )
    }

    /// Time a ray passes through the field and the face it enters by
    ///
    /// `None` when the ray misses the opening or hits the frame first.
    pub fn is_teleported(&self, ray: &Ray) -> Option<(f32, TeleporterFace)> {
        let b = &self.base;
        let tb = self.intersect(ray);
        let t = intersect::time_ray_hits_block(
            ray,
            b.pos,
            b.angle,
            self.width(),
            self.field_breadth(),
            self.field_height(),
        );
        if (tb >= 0.0 && t - tb > 1.0e-6) || t < 0.0 {
            return None;
        }
        let local = self.local(ray.point_at(t));
        if local.z < 0.0 || local.z > self.field_height() {
            return None;
        }
        Some((t, if local.x > 0.0 { 0 } else { 1 }))
    }

    /// How close a tank of `radius` at `p` is to entering, in `[0, 1]`
    pub fn get_proximity(&self, p: Vec3, radius: f32) -> f32 {
        let b = &self.base;
        let reach = 1.2 * radius;
        if !intersect::test_rect_circle(
            b.pos,
            b.angle,
            self.width(),
            self.field_breadth(),
            p,
            reach,
        ) {
            return 0.0;
        }
        let local = self.local(p);
        if local.z < -reach || local.z > self.field_height() + reach {
            return 0.0;
        }

        let x = local.x.abs();
        let y = local.y.abs();
        let mut t = 1.2 - x / radius;

        // fade out beside the opening, and above or below it
        if y > self.field_breadth() {
            let f = (2.0 / PI) * x.atan2(y - self.field_breadth());
            t *= f * f;
        } else if local.z < 0.0 {
            let f = 1.0 + local.z / reach;
            if (0.0..=1.0).contains(&f) {
                t *= f * f;
            }
        } else if local.z > self.field_height() {
            let f = 1.0 - (local.z - self.field_height()) / reach;
            if (0.0..=1.0).contains(&f) {
                t *= f * f;
            }
        }
        t.clamp(0.0, 1.0)
    }

    /// Face entered when moving from `p1` to `p2` through the field
    pub fn has_crossed(&self, p1: Vec3, p2: Vec3) -> Option<TeleporterFace> {
        let bottom = self.base.pos.z;
        let top = bottom + self.field_height();
        if (p1.z < bottom && p2.z < bottom) || (p1.z > top && p2.z > top) {
            return None;
        }
        let l1 = self.local(p1);
        let l2 = self.local(p2);
        if l1.x * l2.x < 0.0 && l2.y.abs() <= self.field_breadth() {
            Some(if l1.x > 0.0 { 0 } else { 1 })
        } else {
            None
        }
    }

    /// Position, direction and azimuth after passing from `face1` of this
    /// teleporter to `face2` of `target`
    ///
    /// The offset from the source is scaled to the target's opening.
    pub fn get_point_wrt(
        &self,
        target: &Self,
        face1: TeleporterFace,
        face2: TeleporterFace,
        pos: Vec3,
        dir: Vec3,
        angle: f32,
    ) -> (Vec3, Vec3, f32) {
        let a = target.base.angle - self.base.angle + if face1 == face2 { PI } else { 0.0 };
        let (s, c) = a.sin_cos();
        let x1 = pos.x - self.base.pos.x;
        let y1 = pos.y - self.base.pos.y;
        let x2 = c * x1 - s * y1;
        let y2 = c * y1 + s * x1;

        let scale = target.field_breadth() / self.breadth();
        let out_pos = Vec3::new(
            target.base.pos.x + x2 * scale,
            target.base.pos.y + y2 * scale,
            target.base.pos.z + (pos.z - self.base.pos.z) * target.field_height() / self.height(),
        );
        let out_dir = Vec3::new(c * dir.x - s * dir.y, c * dir.y + s * dir.x, dir.z);
        (out_pos, out_dir, angle + a)
    }

    /// Copy placed by `xform`; the border keeps its thickness
    pub fn copy_with_transform(&self, xform: &MeshTransform) -> Self {
        let tool = MeshTransformTool::new(xform);
        let old = tool.old_style(self.base.pos, self.authored_size(), self.base.angle);
        let mut copy = Self::new(old.pos, old.angle, old.size, self.border);
        copy.base.drive_through = self.base.drive_through;
        copy.base.shoot_through = self.base.shoot_through;
        copy.base.ricochet = self.base.ricochet;
        copy.base.source = self.base.source;
        copy.base.name.clone_from(&self.base.name);
        copy
    }

    /// World-file block
    pub fn print(&self, out: &mut impl Write, indent: &str) -> fmt::Result {
        let b = &self.base;
        if b.name.is_empty() {
            writeln!(out, "{indent}teleporter")?;
        } else {
            writeln!(out, "{indent}teleporter {}", b.name)?;
        }
        let size = self.authored_size();
        writeln!(out, "{indent}  position {} {} {}", b.pos.x, b.pos.y, b.pos.z)?;
        writeln!(out, "{indent}  size {} {} {}", size.x, size.y, size.z)?;
        writeln!(out, "{indent}  rotation {}", utils::rad_to_deg(b.angle))?;
        writeln!(out, "{indent}  border {}", self.border)?;
        b.print_flags(out, indent)?;
        writeln!(out, "{indent}end")?;
        writeln!(out)
    }

    /// OBJ blocks for the two posts and the crossbar
    pub fn print_obj(&self, out: &mut impl Write, counter: &mut ObjCounter) -> fmt::Result {
        let b = &self.base;
        let r = 0.5 * self.border;
        let d = self.breadth() - r;
        for offset in [d, -d] {
            let post = Vec3::new(self.width(), r, self.height());
            obj::write_prism(
                out,
                counter,
                "tele",
                self.post_center(offset),
                b.angle,
                post,
                "teleframe",
                "teleframe",
            )?;
        }
        let bar_pos = Vec3::new(b.pos.x, b.pos.y, b.pos.z + self.field_height());
        let bar = Vec3::new(self.width(), self.breadth(), self.border);
        obj::write_prism(out, counter, "tele", bar_pos, b.angle, bar, "teleframe", "teleframe")
    }
}

impl Packable for Teleporter {
    fn pack(&self, buf: &mut PackBuffer) {
        let b = &self.base;
        buf.pack_string(&b.name);
        buf.pack_vec3(&b.pos);
        buf.pack_f32(b.angle);
        buf.pack_vec3(&self.authored_size());
        buf.pack_f32(self.border);
        buf.pack_u8(b.pass_bits());
    }

    fn pack_size(&self) -> usize {
        string_pack_size(&self.base.name) + 12 + 4 + 12 + 4 + 1
    }

    fn unpack(buf: &mut UnpackBuffer<'_>) -> Result<Self, PackError> {
        let name = buf.unpack_string()?;
        let pos = buf.unpack_vec3()?;
        let angle = buf.unpack_f32()?;
        let size = buf.unpack_vec3()?;
        let border = buf.unpack_f32()?;
        let state = buf.unpack_u8()?;
        let mut tele = Self::new(pos, angle, size, border);
        tele.base.name = name;
        tele.base.apply_pass_bits(state);
        Ok(tele)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn tele() -> Teleporter {
        Teleporter::new(Vec3::zeros(), 0.0, Vec3::new(0.56, 4.48, 9.08), 1.12)
    }

    #[test]
    fn test_frame_inflates_size() {
        let t = tele();
        assert_relative_eq!(t.base.size, Vec3::new(0.56, 6.72, 10.2), epsilon = 1e-5);
        assert_relative_eq!(t.authored_size(), Vec3::new(0.56, 4.48, 9.08), epsilon = 1e-5);
    }

    #[test]
    fn test_shot_through_field() {
        let t = tele();
        let ray = Ray::new(Vec3::new(5.0, 0.0, 3.0), Vec3::new(-1.0, 0.0, 0.0));
        let (time, face) = t.is_teleported(&ray).unwrap();
        assert_relative_eq!(time, 4.44, epsilon = 1e-5);
        assert_eq!(face, 0);

        let back = Ray::new(Vec3::new(-5.0, 0.0, 3.0), Vec3::x());
        assert_eq!(t.is_teleported(&back).unwrap().1, 1);
    }

    #[test]
    fn test_shot_into_post_does_not_teleport() {
        let t = tele();
        let ray = Ray::new(Vec3::new(5.0, 6.2, 3.0), Vec3::new(-1.0, 0.0, 0.0));
        assert!(t.intersect(&ray) >= 0.0);
        assert!(t.is_teleported(&ray).is_none());
    }

    #[test]
    fn test_posts_block_but_opening_does_not() {
        let t = tele();
        assert!(t.in_box(Vec3::new(0.0, 6.0, 0.0), 0.0, 0.5, 0.5, 2.0));
        assert!(!t.in_box(Vec3::new(0.0, 0.0, 0.0), 0.0, 0.5, 0.5, 2.0));
        // the crossbar above the opening
        assert!(t.in_box(Vec3::new(0.0, 0.0, 9.5), 0.0, 0.5, 0.5, 2.0));
    }

    #[test]
    fn test_post_normal() {
        let t = tele();
        let n = t.get_normal(Vec3::new(0.0, 6.72, 3.0));
        assert_relative_eq!(n, Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-5);
    }

    #[test]
    fn test_crossing_and_proximity() {
        let t = tele();
        assert_eq!(t.has_crossed(Vec3::new(1.0, 0.0, 1.0), Vec3::new(-1.0, 0.0, 1.0)), Some(0));
        assert_eq!(t.has_crossed(Vec3::new(-1.0, 0.0, 1.0), Vec3::new(1.0, 0.0, 1.0)), Some(1));
        assert_eq!(t.has_crossed(Vec3::new(1.0, 6.0, 1.0), Vec3::new(-1.0, 6.0, 1.0)), None);
        assert_relative_eq!(t.get_proximity(Vec3::new(0.0, 0.0, 1.0), 1.0), 1.0);
        assert_eq!(t.get_proximity(Vec3::new(10.0, 0.0, 1.0), 1.0), 0.0);
    }

    #[test]
    fn test_point_wrt_same_face_turns_around() {
        let a = tele();
        let b = Teleporter::new(Vec3::new(100.0, 0.0, 0.0), 0.0, Vec3::new(0.56, 4.48, 9.08), 1.12);
        let (pos, dir, angle) = a.get_point_wrt(
            &b,
            0,
            0,
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(-1.0, 0.0, 0.0),
            0.0,
        );
        assert_relative_eq!(pos, Vec3::new(100.0, 0.0, 0.0), epsilon = 1e-4);
        assert_relative_eq!(dir, Vec3::new(1.0, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(angle, PI, epsilon = 1e-6);

        let (_, dir, angle) = a.get_point_wrt(
            &b,
            0,
            1,
            Vec3::zeros(),
            Vec3::new(-1.0, 0.0, 0.0),
            0.0,
        );
        assert_relative_eq!(dir, Vec3::new(-1.0, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(angle, 0.0);
    }

    #[test]
    fn test_pack_uses_authored_size() {
        let mut t = Teleporter::new(Vec3::new(1.0, 2.0, 3.0), 0.5, Vec3::new(1.0, 4.0, 9.0), 1.0);
        t.base.name = "gate".to_string();
        t.base.drive_through = 0xFF;
        let bytes = t.to_bytes();
        assert_eq!(bytes.len(), t.pack_size());
        let size: Vec<u8> = [1.0_f32, 4.0, 9.0].iter().flat_map(|v| v.to_be_bytes()).collect();
        assert_eq!(&bytes[4 + 4 + 16..4 + 4 + 28], &size[..]);
        let back = Teleporter::from_bytes(&bytes).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_print_block() {
        let mut t = Teleporter::new(Vec3::zeros(), 0.0, Vec3::new(1.0, 4.0, 9.0), 1.0);
        t.base.name = "gate".to_string();
        let mut text = String::new();
        t.print(&mut text, "").unwrap();
        assert_eq!(
            text,
            "teleporter gate\n  position 0 0 0\n  size 1 4 9\n  rotation 0\n  border 1\nend\n\n"
        );
    }
}
