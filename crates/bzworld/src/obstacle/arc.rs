//! Arcs: swept rings and pie slices

use std::fmt::{self, Write};

use super::common::{ObstacleBase, STATE_RICOCHET};
use super::container::{self, MeshBuilder, MeshContainer, Sweep, MIN_SIZE};
use super::mesh::{CheckPoint, MeshObstacle};
use crate::export::obj::ObjCounter;
use crate::foundation::math::{Vec2, Vec3};
use crate::material::{pack_material_ref, unpack_material_ref, MaterialManager, MaterialRef};
use crate::pack::{PackBuffer, PackError, Packable, UnpackBuffer};
use crate::transform::MeshTransform;

const ARC_RICOCHET: u8 = STATE_RICOCHET << 1;

/// Texture size used when none is given: repeat every 8 units
pub const DEFAULT_TEXSIZE: f32 = -8.0;

/// Material slots of an arc
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArcSlot {
    /// Upper cap
    Top = 0,
    /// Lower cap
    Bottom,
    /// Inner wall
    Inside,
    /// Outer wall
    Outside,
    /// Cut face at the start angle
    StartFace,
    /// Cut face at the end angle
    EndFace,
}

const SLOT_NAMES: [&str; 6] = ["top", "bottom", "inside", "outside", "startside", "endside"];

/// A horizontal ring or pie slice of an elliptical cylinder
///
/// `base.size` holds the outer x and y radii and the height; `ratio` is the
/// ring thickness as a fraction of the outer radius, `1` giving a pie.
#[derive(Debug, Clone, PartialEq)]
pub struct ArcObstacle {
    /// Authored position, radii, height and start rotation
    pub base: ObstacleBase,
    /// Placement applied to the generated mesh
    pub transform: MeshTransform,
    /// Swept angle in degrees; negative sweeps run clockwise
    pub sweep: f32,
    /// Inner radius as a fraction of the outer
    pub ratio: f32,
    /// Segments along the sweep
    pub divisions: i32,
    /// Physics driver index, `-1` for none
    pub phydrv: i32,
    /// Around, up, and across-the-disc texture sizes
    pub texsize: [f32; 4],
    /// Materials by [`ArcSlot`]
    pub materials: [MaterialRef; 6],
    /// Bounces use interpolated normals
    pub smooth_bounce: bool,
    /// Emit vertex normals for smooth shading
    pub use_normals: bool,
    mesh: Option<Box<MeshObstacle>>,
}

impl ArcObstacle {
    /// Arc with default texturing and no materials
    pub fn new(
        transform: MeshTransform,
        pos: Vec3,
        size: Vec3,
        rotation: f32,
        sweep: f32,
        ratio: f32,
        divisions: i32,
    ) -> Self {
        let mut arc = Self {
            base: ObstacleBase { pos, size, angle: rotation, ..ObstacleBase::default() },
            transform,
            sweep,
            ratio,
            divisions,
            phydrv: -1,
            texsize: [DEFAULT_TEXSIZE; 4],
            materials: [None; 6],
            smooth_bounce: false,
            use_normals: true,
            mesh: None,
        };
        arc.finalize();
        arc
    }

    /// Material of one slot
    pub fn material(&self, slot: ArcSlot) -> MaterialRef {
        self.materials[slot as usize]
    }

    /// Rebuild the mesh after a parameter changed
    pub fn finalize(&mut self) {
        self.mesh = self.make_mesh().map(Box::new);
        self.base.extents = self.mesh_extents();
    }

    /// Take the generated mesh for insertion into the world
    pub fn container_mesh(&self) -> Option<MeshObstacle> {
        self.mesh.as_deref().cloned()
    }

    /// Tessellate; `None` for degenerate parameters
    pub fn make_mesh(&self) -> Option<MeshObstacle> {
        let sz = self.base.size.abs();
        if sz.iter().any(|&s| s < MIN_SIZE)
            || self.texsize.iter().any(|t| t.abs() < MIN_SIZE)
            || !(0.0..=1.0).contains(&self.ratio)
        {
            return None;
        }

        let mut texsz = self.texsize;
        texsz[0] = container::wrap_texsize(texsz[0], container::ellipse_circumference(sz.x, sz.y));
        texsz[1] = container::span_texsize(texsz[1], sz.z);

        let sweep = Sweep::new(self.base.angle, self.sweep, self.divisions)?;
        let divisions = usize::try_from(self.divisions).ok()?;

        let mut inner = sz.x * (1.0 - self.ratio);
        let mut outer = sz.x;
        if inner > outer {
            std::mem::swap(&mut inner, &mut outer);
        }
        if outer < MIN_SIZE || outer - inner < MIN_SIZE {
            return None;
        }
        let squish = sz.y / sz.x;

        let builder = if inner < MIN_SIZE {
            self.make_pie(&sweep, divisions, sz.z, outer, squish, texsz)
        } else {
            self.make_ring(&sweep, divisions, sz.z, inner, outer, squish, texsz)
        };
        builder.build(&self.transform, &self.base, self.phydrv, self.smooth_bounce)
    }

    fn make_pie(
        &self,
        sweep: &Sweep,
        divisions: usize,
        h: f32,
        radius: f32,
        squish: f32,
        mut texsz: [f32; 4],
    ) -> MeshBuilder {
        let pos = self.base.pos;
        let mut b = MeshBuilder::new();

        let mut check = if sweep.is_circle {
            pos
        } else {
            let dir = sweep.start + 0.5 * sweep.angle;
            pos + Vec3::new(dir.cos() * radius * 0.5, dir.sin() * radius * 0.5 * squish, 0.0)
        };
        check.z = pos.z + 0.5 * h;
        b.checks.push(CheckPoint::inside(check));

        texsz[2] = container::span_texsize(texsz[2], 2.0 * radius);
        texsz[3] = container::span_texsize(texsz[3], 2.0 * radius * squish);

        for i in 0..=divisions {
            let (sin, cos) = sweep.at(i, divisions).sin_cos();
            if !sweep.is_circle || i != divisions {
                let v = pos + Vec3::new(cos * radius, sin * radius * squish, 0.0);
                b.vertex(v);
                b.vertex(v + Vec3::new(0.0, 0.0, h));
                if self.use_normals {
                    b.normal(Vec3::new(cos * squish, sin, 0.0).normalize());
                }
            }
            let u = texsz[0] * i as f32 / divisions as f32;
            b.texcoord(Vec2::new(u, 0.0));
            b.texcoord(Vec2::new(u, texsz[1]));
        }
        for i in 0..=divisions {
            let (sin, cos) = (sweep.angle * i as f32 / divisions as f32).sin_cos();
            b.texcoord(Vec2::new(texsz[2] * (0.5 + 0.5 * cos), texsz[3] * (0.5 + 0.5 * sin)));
        }
        let vbot = b.vertex(pos);
        let vtop = b.vertex(pos + Vec3::new(0.0, 0.0, h));
        let tmid = b.texcoord(Vec2::new(texsz[2] * 0.5, texsz[3] * 0.5));

        let (vlen, nlen) = if sweep.is_circle {
            (divisions * 2, divisions)
        } else {
            ((divisions + 1) * 2, divisions + 1)
        };
        let disc = (divisions + 1) * 2;
        for i in 0..divisions {
            let pv = |x: usize| (x + i * 2) % vlen;
            let pn = |x: usize| (x + i) % nlen;
            let pto = |x: usize| x + i * 2;
            let ptc = |x: usize| disc + x + i;
            let ptci = |x: usize| (divisions + 1) * 3 - x - i - 1;

            let normals =
                if self.use_normals { vec![pn(0), pn(1), pn(1), pn(0)] } else { Vec::new() };
            b.face(
                vec![pv(0), pv(2), pv(3), pv(1)],
                normals,
                vec![pto(0), pto(2), pto(3), pto(1)],
                self.material(ArcSlot::Outside),
            );
            b.face(
                vec![vtop, pv(1), pv(3)],
                Vec::new(),
                vec![tmid, ptc(0), ptc(1)],
                self.material(ArcSlot::Top),
            );
            b.face(
                vec![vbot, pv(2), pv(0)],
                Vec::new(),
                vec![tmid, ptci(1), ptci(0)],
                self.material(ArcSlot::Bottom),
            );
        }

        if !sweep.is_circle {
            let tc = divisions * 2;
            b.face(
                vec![vbot, 0, 1, vtop],
                Vec::new(),
                vec![0, tc, tc + 1, 1],
                self.material(ArcSlot::StartFace),
            );
            let e = divisions * 2;
            b.face(
                vec![e, vbot, vtop, e + 1],
                Vec::new(),
                vec![0, tc, tc + 1, 1],
                self.material(ArcSlot::EndFace),
            );
        }
        b
    }

    fn make_ring(
        &self,
        sweep: &Sweep,
        divisions: usize,
        h: f32,
        inner: f32,
        outer: f32,
        squish: f32,
        texsz: [f32; 4],
    ) -> MeshBuilder {
        let pos = self.base.pos;
        let mut b = MeshBuilder::new();

        // the hole is reached from above and below, the rest from the sides
        for offset in [
            Vec3::new(0.0, 0.0, -h),
            Vec3::new(0.0, 0.0, 2.0 * h),
            Vec3::new(outer * 2.0, 0.0, 0.5 * h),
            Vec3::new(-outer * 2.0, 0.0, 0.5 * h),
            Vec3::new(0.0, outer * squish * 2.0, 0.5 * h),
            Vec3::new(0.0, -outer * squish * 2.0, 0.5 * h),
        ] {
            b.checks.push(CheckPoint::outside(pos + offset));
        }

        for i in 0..=divisions {
            let (sin, cos) = sweep.at(i, divisions).sin_cos();
            if !sweep.is_circle || i != divisions {
                for radius in [inner, outer] {
                    let v = pos + Vec3::new(cos * radius, squish * sin * radius, 0.0);
                    b.vertex(v);
                    b.vertex(v + Vec3::new(0.0, 0.0, h));
                }
                if self.use_normals {
                    let n = Vec3::new(-cos * squish, -sin, 0.0).normalize();
                    b.normal(n);
                    b.normal(-n);
                }
            }
            let u = texsz[0] * i as f32 / divisions as f32;
            b.texcoord(Vec2::new(u, 0.0));
            b.texcoord(Vec2::new(u, texsz[1]));
        }

        let (vlen, nlen) = if sweep.is_circle {
            (divisions * 4, divisions * 2)
        } else {
            ((divisions + 1) * 4, (divisions + 1) * 2)
        };
        for i in 0..divisions {
            let rv = |x: usize| (x + i * 4) % vlen;
            let rn = |x: usize| (x + i * 2) % nlen;
            let rt = |x: usize| x + i * 2;
            let rit = |x: usize| (divisions + x % 2) * 2 - (x + i * 2);
            let with_normals = |list: Vec<usize>| if self.use_normals { list } else { Vec::new() };

            b.face(
                vec![rv(4), rv(0), rv(1), rv(5)],
                with_normals(vec![rn(2), rn(0), rn(0), rn(2)]),
                vec![rit(2), rit(0), rit(1), rit(3)],
                self.material(ArcSlot::Inside),
            );
            b.face(
                vec![rv(2), rv(6), rv(7), rv(3)],
                with_normals(vec![rn(1), rn(3), rn(3), rn(1)]),
                vec![rt(0), rt(2), rt(3), rt(1)],
                self.material(ArcSlot::Outside),
            );
            b.face(
                vec![rv(3), rv(7), rv(5), rv(1)],
                Vec::new(),
                vec![rt(0), rt(2), rt(3), rt(1)],
                self.material(ArcSlot::Top),
            );
            b.face(
                vec![rv(0), rv(4), rv(6), rv(2)],
                Vec::new(),
                vec![rt(0), rt(2), rt(3), rt(1)],
                self.material(ArcSlot::Bottom),
            );
        }

        if !sweep.is_circle {
            let tc = divisions * 2;
            b.face(
                vec![0, 2, 3, 1],
                Vec::new(),
                vec![0, tc, tc + 1, 1],
                self.material(ArcSlot::StartFace),
            );
            let e = divisions * 4;
            b.face(
                vec![e + 2, e, e + 1, e + 3],
                Vec::new(),
                vec![0, tc, tc + 1, 1],
                self.material(ArcSlot::EndFace),
            );
        }
        b
    }

    /// Copy with `xform` applied after the arc's own transform
    pub fn copy_with_transform(&self, xform: &MeshTransform) -> Self {
        let mut copy = self.clone();
        copy.transform.append(xform);
        copy.finalize();
        copy
    }

    /// World-file block
    pub fn print(
        &self,
        out: &mut impl Write,
        indent: &str,
        materials: &MaterialManager,
    ) -> fmt::Result {
        let t = &self.texsize;
        writeln!(out, "{indent}arc")?;
        self.base.print_placement(out, indent)?;
        writeln!(out, "{indent}  angle {}", self.sweep)?;
        writeln!(out, "{indent}  ratio {}", self.ratio)?;
        writeln!(out, "{indent}  divisions {}", self.divisions)?;
        writeln!(out, "{indent}  texsize {} {} {} {}", t[0], t[1], t[2], t[3])?;
        let slots: Vec<(&str, MaterialRef)> =
            SLOT_NAMES.iter().copied().zip(self.materials).collect();
        container::print_tail(
            out,
            indent,
            &self.base,
            &self.transform,
            &slots,
            materials,
            self.phydrv,
            self.smooth_bounce,
            self.use_normals,
        )
    }

    /// OBJ block of the generated mesh
    pub fn print_obj(
        &self,
        out: &mut impl Write,
        counter: &mut ObjCounter,
        materials: &MaterialManager,
    ) -> fmt::Result {
        match &self.mesh {
            Some(mesh) => mesh.print_obj(out, counter, materials),
            None => Ok(()),
        }
    }
}

impl MeshContainer for ArcObstacle {
    const KEYWORD: &'static str = "arc";

    fn mesh(&self) -> Option<&MeshObstacle> {
        self.mesh.as_deref()
    }
}

impl Packable for ArcObstacle {
    fn pack(&self, buf: &mut PackBuffer) {
        self.transform.pack(buf);
        buf.pack_vec3(&self.base.pos);
        buf.pack_vec3(&self.base.size);
        buf.pack_f32(self.base.angle);
        buf.pack_f32(self.sweep);
        buf.pack_f32(self.ratio);
        buf.pack_i32(self.divisions);
        buf.pack_i32(self.phydrv);
        for t in self.texsize {
            buf.pack_f32(t);
        }
        for m in self.materials {
            pack_material_ref(buf, m);
        }
        buf.pack_u8(container::state_bits(
            &self.base,
            self.smooth_bounce,
            self.use_normals,
            ARC_RICOCHET,
        ));
    }

    fn pack_size(&self) -> usize {
        self.transform.pack_size() + 12 + 12 + 4 * 3 + 4 * 2 + 4 * 4 + 4 * 6 + 1
    }

    fn unpack(buf: &mut UnpackBuffer<'_>) -> Result<Self, PackError> {
        let transform = MeshTransform::unpack(buf)?;
        let pos = buf.unpack_vec3()?;
        let size = buf.unpack_vec3()?;
        let rotation = buf.unpack_f32()?;
        let sweep = buf.unpack_f32()?;
        let ratio = buf.unpack_f32()?;
        let divisions = buf.unpack_i32()?;
        let mut arc = Self::new(transform, pos, size, rotation, sweep, ratio, divisions);
        arc.phydrv = buf.unpack_i32()?;
        for t in &mut arc.texsize {
            *t = buf.unpack_f32()?;
        }
        for m in &mut arc.materials {
            *m = unpack_material_ref(buf)?;
        }
        let state = buf.unpack_u8()?;
        (arc.smooth_bounce, arc.use_normals) = container::apply_state_bits(
            state,
            &mut arc.base,
            ARC_RICOCHET,
        );
        arc.finalize();
        Ok(arc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Ray;
    use crate::material::MaterialId;

    fn quarter_pie() -> ArcObstacle {
        ArcObstacle::new(
            MeshTransform::new(),
            Vec3::zeros(),
            Vec3::new(10.0, 10.0, 5.0),
            0.0,
            90.0,
            1.0,
            4,
        )
    }

    #[test]
    fn test_pie_faces_and_containment() {
        let pie = quarter_pie();
        let mesh = pie.mesh().unwrap();
        assert_eq!(mesh.faces.len(), 4 * 3 + 2);
        assert!(pie.is_valid());
        assert!(mesh.contains_point(Vec3::new(3.0, 3.0, 2.5)));
        assert!(!mesh.contains_point(Vec3::new(5.0, -3.0, 2.5)));
        assert!(pie.in_box(Vec3::new(3.0, 3.0, 0.0), 0.0, 1.0, 1.0, 2.0));
        assert!(!pie.in_box(Vec3::new(-5.0, -5.0, 0.0), 0.0, 1.0, 1.0, 2.0));
    }

    #[test]
    fn test_ray_hits_outer_wall() {
        let pie = quarter_pie();
        let t = pie.intersect(&Ray::new(Vec3::new(20.0, 5.0, 2.5), Vec3::new(-1.0, 0.0, 0.0)));
        // the tessellated wall sits a little inside the true circle
        assert!(t > 11.3 && t < 11.8, "t = {t}");
    }

    #[test]
    fn test_full_ring_has_a_hole() {
        let ring = ArcObstacle::new(
            MeshTransform::new(),
            Vec3::zeros(),
            Vec3::new(10.0, 10.0, 2.0),
            0.0,
            360.0,
            0.5,
            16,
        );
        let mesh = ring.mesh().unwrap();
        assert_eq!(mesh.faces.len(), 16 * 4);
        assert!(mesh.contains_point(Vec3::new(7.5, 0.0, 1.0)));
        assert!(!mesh.contains_point(Vec3::new(0.0, 0.0, 1.0)));
        assert!(!mesh.contains_point(Vec3::new(0.0, 12.0, 1.0)));
        assert!(!ring.in_box(Vec3::new(0.0, 0.0, 0.0), 0.0, 1.0, 1.0, 1.0));
    }

    #[test]
    fn test_degenerate_parameters_have_no_mesh() {
        let mut arc = quarter_pie();
        arc.ratio = 1.5;
        arc.finalize();
        assert!(!arc.is_valid());
        assert!(arc.base.extents.is_empty());
        assert_eq!(arc.intersect(&Ray::new(Vec3::new(20.0, 5.0, 2.5), -Vec3::x())), -1.0);
        assert!(!arc.in_box(Vec3::new(3.0, 3.0, 0.0), 0.0, 1.0, 1.0, 2.0));

        arc.ratio = 1.0;
        arc.divisions = 0;
        arc.finalize();
        assert!(!arc.is_valid());
    }

    #[test]
    fn test_mesh_tagged_as_container() {
        let pie = quarter_pie();
        let mesh = pie.container_mesh().unwrap();
        assert!(mesh.base.is_from_container());
    }

    #[test]
    fn test_transformed_copy() {
        let pie = quarter_pie();
        let mut shift = MeshTransform::new();
        shift.add_shift(Vec3::new(100.0, 0.0, 0.0));
        let copy = pie.copy_with_transform(&shift);
        assert_eq!(copy.transform.ops().len(), 1);
        assert!((copy.base.extents.mins.x - 100.0).abs() < 1e-3);
        // authored parameters are untouched
        assert_eq!(copy.base.pos, pie.base.pos);
    }

    #[test]
    fn test_pack_round_trip() {
        let mut arc = quarter_pie();
        arc.materials[ArcSlot::Top as usize] = Some(MaterialId(2));
        arc.base.ricochet = true;
        arc.use_normals = false;
        arc.finalize();
        let bytes = arc.to_bytes();
        assert_eq!(bytes.len(), arc.pack_size());
        assert_eq!(ArcObstacle::from_bytes(&bytes).unwrap(), arc);
    }

    #[test]
    fn test_print_block() {
        let arc = quarter_pie();
        let mut text = String::new();
        arc.print(&mut text, "", &MaterialManager::new()).unwrap();
        assert!(text.starts_with(
            "arc\n  position 0 0 0\n  size 10 10 5\n  rotation 0\n  angle 90\n"
        ));
        assert!(text.contains("  startside matref -1\n"));
        assert!(text.ends_with("end\n\n"));
    }
}
