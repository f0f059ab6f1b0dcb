//! Cones: elliptical bases swept to a single apex

use std::fmt::{self, Write};

use super::common::{ObstacleBase, STATE_RICOCHET};
use super::container::{self, MeshBuilder, MeshContainer, Sweep, MIN_SIZE};
use super::mesh::{CheckPoint, MeshObstacle};
use crate::export::obj::ObjCounter;
use crate::foundation::math::{Vec2, Vec3};
use crate::material::{pack_material_ref, unpack_material_ref, MaterialManager, MaterialRef};
use crate::pack::{PackBuffer, PackError, Packable, UnpackBuffer};
use crate::transform::MeshTransform;

use super::arc::DEFAULT_TEXSIZE;

const CONE_RICOCHET: u8 = STATE_RICOCHET << 1;

/// Material slots of a cone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConeSlot {
    /// Sloped side
    Edge = 0,
    /// Base disc
    Bottom,
    /// Cut face at the start angle
    StartFace,
    /// Cut face at the end angle
    EndFace,
}

const SLOT_NAMES: [&str; 4] = ["edge", "bottom", "startside", "endside"];

/// A cone, or a wedge of one when the sweep is under a full turn
#[derive(Debug, Clone, PartialEq)]
pub struct ConeObstacle {
    /// Base center, x and y radii with the height, and start rotation
    pub base: ObstacleBase,
    /// Placement applied to the generated mesh
    pub transform: MeshTransform,
    /// Swept angle in degrees
    pub sweep: f32,
    /// Segments around the axis
    pub divisions: i32,
    /// Physics driver index, `-1` for none
    pub phydrv: i32,
    /// Around and up texture sizes
    pub texsize: [f32; 2],
    /// Materials by [`ConeSlot`]
    pub materials: [MaterialRef; 4],
    /// Bounces use interpolated normals
    pub smooth_bounce: bool,
    /// Emit vertex normals for smooth shading
    pub use_normals: bool,
    mesh: Option<Box<MeshObstacle>>,
}

impl ConeObstacle {
    /// Cone with its mesh already built
    pub fn new(
        transform: MeshTransform,
        pos: Vec3,
        size: Vec3,
        rotation: f32,
        sweep: f32,
        divisions: i32,
    ) -> Self {
        let mut cone = Self {
            base: ObstacleBase { pos, size, angle: rotation, ..ObstacleBase::default() },
            transform,
            sweep,
            divisions,
            phydrv: -1,
            texsize: [DEFAULT_TEXSIZE; 2],
            materials: [None; 4],
            smooth_bounce: false,
            use_normals: true,
            mesh: None,
        };
        cone.finalize();
        cone
    }

    /// Material of one slot
    pub fn material(&self, slot: ConeSlot) -> MaterialRef {
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
        if sz.iter().any(|&s| s < MIN_SIZE) || self.texsize.iter().any(|t| t.abs() < MIN_SIZE) {
            return None;
        }

        let mut texsz = self.texsize;
        texsz[0] = container::wrap_texsize(texsz[0], container::ellipse_circumference(sz.x, sz.y));
        texsz[1] = container::span_texsize(texsz[1], sz.z);

        let sweep = Sweep::new(self.base.angle, self.sweep, self.divisions)?;
        let divisions = usize::try_from(self.divisions).ok()?;
        let pos = self.base.pos;
        let mut b = MeshBuilder::new();

        // a quarter of the way up the axis, or into the wedge
        let mut check = pos;
        if !sweep.is_circle {
            let (sin, cos) = (sweep.start + 0.5 * sweep.angle).sin_cos();
            check += Vec3::new(cos * sz.x * 0.25, sin * sz.y * 0.25, 0.0);
        }
        check.z += 0.25 * sz.z;
        b.checks.push(CheckPoint::inside(check));

        let slope_normal = |angle: f32| {
            let (sin, cos) = angle.sin_cos();
            Vec3::new(cos / sz.x, sin / sz.y, 1.0 / sz.z).normalize()
        };

        for i in 0..=divisions {
            let angle = sweep.at(i, divisions);
            let (sin, cos) = angle.sin_cos();
            if !sweep.is_circle || i != divisions {
                b.vertex(pos + Vec3::new(cos * sz.x, sin * sz.y, 0.0));
                if self.use_normals {
                    b.normal(slope_normal(angle));
                }
            }
            b.texcoord(Vec2::new(texsz[0] * (0.5 + 0.5 * cos), texsz[1] * (0.5 + 0.5 * sin)));
        }
        // apex normals, one per division
        if self.use_normals {
            let step = sweep.angle / divisions as f32;
            for i in 0..divisions {
                b.normal(slope_normal(sweep.start + step * (0.5 + i as f32)));
            }
        }

        let vbot = b.vertex(pos);
        let vtop = b.vertex(pos + Vec3::new(0.0, 0.0, sz.z));
        let tmid = b.texcoord(Vec2::new(texsz[0] * 0.5, texsz[1] * 0.5));
        let corners = if sweep.is_circle {
            None
        } else {
            Some([
                b.texcoord(Vec2::new(0.0, 0.0)),
                b.texcoord(Vec2::new(texsz[0], 0.0)),
                b.texcoord(Vec2::new(texsz[0], texsz[1])),
                b.texcoord(Vec2::new(0.0, texsz[1])),
            ])
        };

        let vlen = if sweep.is_circle { divisions } else { divisions + 1 };
        for i in 0..divisions {
            let v = |x: usize| (x + i) % vlen;
            let normals = if self.use_normals { vec![vlen + i, v(0), v(1)] } else { Vec::new() };
            b.face(
                vec![vtop, v(0), v(1)],
                normals,
                vec![tmid, i, i + 1],
                self.material(ConeSlot::Edge),
            );
            b.face(
                vec![vbot, v(1), v(0)],
                Vec::new(),
                vec![tmid, divisions - i - 1, divisions - i],
                self.material(ConeSlot::Bottom),
            );
        }

        if let Some([t00, t10, t11, t01]) = corners {
            b.face(
                vec![vbot, 0, vtop],
                Vec::new(),
                vec![t00, t10, t01],
                self.material(ConeSlot::StartFace),
            );
            b.face(
                vec![vlen - 1, vbot, vtop],
                Vec::new(),
                vec![t00, t10, t11],
                self.material(ConeSlot::EndFace),
            );
        }

        b.build(&self.transform, &self.base, self.phydrv, self.smooth_bounce)
    }

    /// Copy with `xform` appended to its transform
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
        writeln!(out, "{indent}cone")?;
        self.base.print_placement(out, indent)?;
        writeln!(out, "{indent}  angle {}", self.sweep)?;
        writeln!(out, "{indent}  divisions {}", self.divisions)?;
        writeln!(out, "{indent}  texsize {} {}", self.texsize[0], self.texsize[1])?;
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

    /// OBJ group for the generated mesh
    pub fn print_obj(
        &self,
        out: &mut impl Write,
        counter: &mut ObjCounter,
        materials: &MaterialManager,
    ) -> fmt::Result {
        self.mesh.as_ref().map_or(Ok(()), |m| m.print_obj(out, counter, materials))
    }
}

impl MeshContainer for ConeObstacle {
    const KEYWORD: &'static str = "cone";

    fn mesh(&self) -> Option<&MeshObstacle> {
        self.mesh.as_deref()
    }
}

impl Packable for ConeObstacle {
    fn pack(&self, buf: &mut PackBuffer) {
        self.transform.pack(buf);
        buf.pack_vec3(&self.base.pos);
        buf.pack_vec3(&self.base.size);
        buf.pack_f32(self.base.angle);
        buf.pack_f32(self.sweep);
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
            CONE_RICOCHET,
        ));
    }

    fn pack_size(&self) -> usize {
        self.transform.pack_size() + 12 + 12 + 4 + 4 + 4 + 4 + 4 * 2 + 4 * 4 + 1
    }

    fn unpack(buf: &mut UnpackBuffer<'_>) -> Result<Self, PackError> {
        let transform = MeshTransform::unpack(buf)?;
        let pos = buf.unpack_vec3()?;
        let size = buf.unpack_vec3()?;
        let rotation = buf.unpack_f32()?;
        let sweep = buf.unpack_f32()?;
        let divisions = buf.unpack_i32()?;
        let mut cone = Self::new(transform, pos, size, rotation, sweep, divisions);
        cone.phydrv = buf.unpack_i32()?;
        for t in &mut cone.texsize {
            *t = buf.unpack_f32()?;
        }
        for m in &mut cone.materials {
            *m = unpack_material_ref(buf)?;
        }
        let state = buf.unpack_u8()?;
        (cone.smooth_bounce, cone.use_normals) =
            container::apply_state_bits(state, &mut cone.base, CONE_RICOCHET);
        cone.finalize();
        Ok(cone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Ray;
    use crate::material::MaterialId;
    use approx::assert_relative_eq;

    fn full_cone() -> ConeObstacle {
        ConeObstacle::new(
            MeshTransform::new(),
            Vec3::zeros(),
            Vec3::new(10.0, 10.0, 10.0),
            0.0,
            360.0,
            16,
        )
    }

    #[test]
    fn test_full_cone_is_closed() {
        let cone = full_cone();
        let mesh = cone.mesh().unwrap();
        assert_eq!(mesh.faces.len(), 16 * 2);
        assert_eq!(mesh.vertices.len(), 16 + 2);
        assert!(mesh.contains_point(Vec3::new(0.0, 0.0, 9.5)));
        assert!(mesh.contains_point(Vec3::new(3.0, 2.0, 1.0)));
        assert!(!mesh.contains_point(Vec3::new(5.0, 1.0, 7.0)));
    }

    #[test]
    fn test_ray_down_hits_apex() {
        let cone = full_cone();
        let t = cone.intersect(&Ray::new(Vec3::new(0.0, 0.0, 20.0), -Vec3::z()));
        assert_relative_eq!(t, 10.0, epsilon = 1e-3);
    }

    #[test]
    fn test_wedge_has_side_faces() {
        let mut cone = full_cone();
        cone.sweep = 90.0;
        cone.divisions = 4;
        cone.materials[ConeSlot::StartFace as usize] = Some(MaterialId(1));
        cone.finalize();
        let mesh = cone.mesh().unwrap();
        assert_eq!(mesh.faces.len(), 4 * 2 + 2);
        assert!(mesh.faces.iter().any(|f| f.def.material == Some(MaterialId(1))));
        // a quarter turn fits in the first quadrant
        assert!(cone.base.extents.mins.x > -1e-3 && cone.base.extents.mins.y > -1e-3);
    }

    #[test]
    fn test_too_few_divisions() {
        let mut cone = full_cone();
        cone.divisions = 2;
        cone.finalize();
        assert!(!cone.is_valid());
        assert!(cone.container_mesh().is_none());
    }

    #[test]
    fn test_flat_shading_drops_normals() {
        let mut cone = full_cone();
        cone.use_normals = false;
        cone.finalize();
        let mesh = cone.mesh().unwrap();
        assert!(mesh.normals.is_empty());
        assert!(mesh.faces.iter().all(|f| !f.use_normals()));
    }

    #[test]
    fn test_pack_round_trip() {
        let mut cone = full_cone();
        cone.base.drive_through = 0xFF;
        cone.phydrv = 2;
        cone.finalize();
        let bytes = cone.to_bytes();
        assert_eq!(bytes.len(), cone.pack_size());
        let back = ConeObstacle::from_bytes(&bytes).unwrap();
        assert_eq!(back, cone);
        assert!(back.mesh().unwrap().faces.iter().all(|f| f.def.phydrv == 2));
    }

    #[test]
    fn test_print_block() {
        let cone = full_cone();
        let mut text = String::new();
        cone.print(&mut text, "", &MaterialManager::new()).unwrap();
        assert!(text.starts_with("cone\n"));
        assert!(text.contains("  divisions 16\n  texsize -8 -8\n"));
        assert!(text.contains("  edge matref -1\n"));
    }
}
