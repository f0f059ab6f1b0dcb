//! Spheres, ellipsoids and hemispheres

use std::fmt::{self, Write};

use super::arc::DEFAULT_TEXSIZE;
use super::common::ObstacleBase;
use super::container::{self, MeshBuilder, MeshContainer, MIN_SIZE};
use super::mesh::{CheckPoint, MeshObstacle};
use crate::export::obj::ObjCounter;
use crate::foundation::math::{
    constants::{HALF_PI, TAU},
    Vec2, Vec3,
};
use crate::material::{pack_material_ref, unpack_material_ref, MaterialManager, MaterialRef};
use crate::pack::{PackBuffer, PackError, Packable, UnpackBuffer};
use crate::transform::MeshTransform;

const SPHERE_HEMISPHERE: u8 = 1 << 4;
const SPHERE_RICOCHET: u8 = 1 << 5;

/// Material slots of a sphere
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SphereSlot {
    /// Curved surface
    Edge = 0,
    /// Flat cap of a hemisphere
    Bottom,
}

const SLOT_NAMES: [&str; 2] = ["edge", "bottom"];

/// An ellipsoid centered on `base.pos` with radii `base.size`
///
/// A hemisphere keeps only the upper half and closes it with a flat cap, so
/// it rests on `base.pos`. The surface is cut into `4 * divisions` slices
/// around and `divisions` bands per half.
#[derive(Debug, Clone, PartialEq)]
pub struct SphereObstacle {
    /// Center, radii and rotation
    pub base: ObstacleBase,
    /// Placement applied to the generated mesh
    pub transform: MeshTransform,
    /// Bands per half
    pub divisions: i32,
    /// Keep only the upper half
    pub hemisphere: bool,
    /// Physics driver index, `-1` for none
    pub phydrv: i32,
    /// Around and up texture sizes
    pub texsize: [f32; 2],
    /// Materials by [`SphereSlot`]
    pub materials: [MaterialRef; 2],
    /// Bounces use interpolated normals
    pub smooth_bounce: bool,
    /// Emit vertex normals for smooth shading
    pub use_normals: bool,
    mesh: Option<Box<MeshObstacle>>,
}

impl SphereObstacle {
    /// Sphere with its mesh already built
    pub fn new(
        transform: MeshTransform,
        pos: Vec3,
        size: Vec3,
        rotation: f32,
        divisions: i32,
        hemisphere: bool,
    ) -> Self {
        let mut sphere = Self {
            base: ObstacleBase { pos, size, angle: rotation, ..ObstacleBase::default() },
            transform,
            divisions,
            hemisphere,
            phydrv: -1,
            texsize: [DEFAULT_TEXSIZE; 2],
            materials: [None; 2],
            smooth_bounce: false,
            use_normals: true,
            mesh: None,
        };
        sphere.finalize();
        sphere
    }

    /// Material of one slot
    pub fn material(&self, slot: SphereSlot) -> MaterialRef {
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
        let mut texsz = self.texsize;
        texsz[0] = container::wrap_texsize(texsz[0], container::ellipse_circumference(sz.x, sz.y));
        texsz[1] = container::span_texsize(texsz[1], 2.0 * sz.z);
        if self.divisions < 1
            || texsz.iter().any(|&t| t < MIN_SIZE)
            || sz.iter().any(|&s| s < MIN_SIZE)
        {
            return None;
        }
        let divisions = usize::try_from(self.divisions).ok()?;

        let segments = divisions * 4;
        let bands = if self.hemisphere { divisions } else { divisions * 2 };
        // the last hemisphere ring is the equator; a full sphere ends in a pole
        let rings = if self.hemisphere { bands } else { bands - 1 };
        let lat_step = HALF_PI / divisions as f32;
        let pos = self.base.pos;
        let mut b = MeshBuilder::new();

        let mut check = pos;
        if self.hemisphere {
            check.z += 0.5 * sz.z;
        }
        b.checks.push(CheckPoint::inside(check));

        let top = b.vertex(pos + Vec3::new(0.0, 0.0, sz.z));
        if self.use_normals {
            b.normal(Vec3::z());
        }
        let top_tex = b.texcoord(Vec2::new(texsz[0] * 0.5, texsz[1]));

        for j in 1..=rings {
            let lat = HALF_PI - lat_step * j as f32;
            let v = texsz[1] * (1.0 - j as f32 / bands as f32);
            for s in 0..=segments {
                if s < segments {
                    let lon = self.base.angle + TAU * s as f32 / segments as f32;
                    let unit = Vec3::new(lon.cos() * lat.cos(), lon.sin() * lat.cos(), lat.sin());
                    b.vertex(pos + unit.component_mul(&sz));
                    if self.use_normals {
                        b.normal(unit.component_div(&sz).normalize());
                    }
                }
                b.texcoord(Vec2::new(texsz[0] * s as f32 / segments as f32, v));
            }
        }

        let ring_v = |k: usize, s: usize| 1 + k * segments + s % segments;
        let ring_t = |k: usize, s: usize| 1 + k * (segments + 1) + s;
        let edge = self.material(SphereSlot::Edge);
        let normals_for =
            |list: &[usize]| if self.use_normals { list.to_vec() } else { Vec::new() };

        for s in 0..segments {
            let verts = [ring_v(0, s), ring_v(0, s + 1), top];
            b.face(
                verts.to_vec(),
                normals_for(&verts),
                vec![ring_t(0, s), ring_t(0, s + 1), top_tex],
                edge,
            );
        }
        for k in 0..rings - 1 {
            for s in 0..segments {
                let verts = [ring_v(k + 1, s), ring_v(k + 1, s + 1), ring_v(k, s + 1), ring_v(
                    k,
                    s,
                )];
                let texs = vec![ring_t(k + 1, s), ring_t(k + 1, s + 1), ring_t(k, s + 1), ring_t(
                    k,
                    s,
                )];
                b.face(verts.to_vec(), normals_for(&verts), texs, edge);
            }
        }

        let last = rings - 1;
        if self.hemisphere {
            let first_tex = b.texcoords.len();
            for s in 0..segments {
                let (sin, cos) = (TAU * s as f32 / segments as f32).sin_cos();
                b.texcoord(Vec2::new(texsz[0] * (0.5 + 0.5 * cos), texsz[1] * (0.5 + 0.5 * sin)));
            }
            let verts = (0..segments).rev().map(|s| ring_v(last, s)).collect();
            let texs = (0..segments).rev().map(|s| first_tex + s).collect();
            b.face(verts, Vec::new(), texs, self.material(SphereSlot::Bottom));
        } else {
            let bottom = b.vertex(pos - Vec3::new(0.0, 0.0, sz.z));
            if self.use_normals {
                b.normal(-Vec3::z());
            }
            let bottom_tex = b.texcoord(Vec2::new(texsz[0] * 0.5, 0.0));
            for s in 0..segments {
                let verts = [bottom, ring_v(last, s + 1), ring_v(last, s)];
                b.face(
                    verts.to_vec(),
                    normals_for(&verts),
                    vec![bottom_tex, ring_t(last, s + 1), ring_t(last, s)],
                    edge,
                );
            }
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
        writeln!(out, "{indent}sphere")?;
        self.base.print_placement(out, indent)?;
        writeln!(out, "{indent}  divisions {}", self.divisions)?;
        if self.hemisphere {
            writeln!(out, "{indent}  hemisphere")?;
        }
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

impl MeshContainer for SphereObstacle {
    const KEYWORD: &'static str = "sphere";

    fn mesh(&self) -> Option<&MeshObstacle> {
        self.mesh.as_deref()
    }
}

impl Packable for SphereObstacle {
    fn pack(&self, buf: &mut PackBuffer) {
        self.transform.pack(buf);
        buf.pack_vec3(&self.base.pos);
        buf.pack_vec3(&self.base.size);
        buf.pack_f32(self.base.angle);
        buf.pack_i32(self.divisions);
        buf.pack_i32(self.phydrv);
        for t in self.texsize {
            buf.pack_f32(t);
        }
        for m in self.materials {
            pack_material_ref(buf, m);
        }
        let mut state = container::state_bits(
            &self.base,
            self.smooth_bounce,
            self.use_normals,
            SPHERE_RICOCHET,
        );
        if self.hemisphere {
            state |= SPHERE_HEMISPHERE;
        }
        buf.pack_u8(state);
    }

    fn pack_size(&self) -> usize {
        self.transform.pack_size() + 12 + 12 + 4 + 4 + 4 + 4 * 2 + 4 * 2 + 1
    }

    fn unpack(buf: &mut UnpackBuffer<'_>) -> Result<Self, PackError> {
        let transform = MeshTransform::unpack(buf)?;
        let pos = buf.unpack_vec3()?;
        let size = buf.unpack_vec3()?;
        let rotation = buf.unpack_f32()?;
        let divisions = buf.unpack_i32()?;
        let phydrv = buf.unpack_i32()?;
        let mut texsize = [0.0; 2];
        for t in &mut texsize {
            *t = buf.unpack_f32()?;
        }
        let mut materials = [None; 2];
        for m in &mut materials {
            *m = unpack_material_ref(buf)?;
        }
        let state = buf.unpack_u8()?;

        let mut sphere = Self::new(
            transform,
            pos,
            size,
            rotation,
            divisions,
            state & SPHERE_HEMISPHERE != 0,
        );
        sphere.phydrv = phydrv;
        sphere.texsize = texsize;
        sphere.materials = materials;
        (sphere.smooth_bounce, sphere.use_normals) =
            container::apply_state_bits(state, &mut sphere.base, SPHERE_RICOCHET);
        sphere.finalize();
        Ok(sphere)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Ray;
    use crate::material::MaterialId;

    fn ball(divisions: i32, hemisphere: bool) -> SphereObstacle {
        SphereObstacle::new(
            MeshTransform::new(),
            Vec3::zeros(),
            Vec3::repeat(5.0),
            0.0,
            divisions,
            hemisphere,
        )
    }

    #[test]
    fn test_face_counts() {
        assert_eq!(ball(2, false).mesh().unwrap().faces.len(), 32);
        assert_eq!(ball(2, true).mesh().unwrap().faces.len(), 17);
        assert_eq!(ball(1, false).mesh().unwrap().faces.len(), 8);
    }

    #[test]
    fn test_full_sphere_bounds_and_containment() {
        let sphere = ball(4, false);
        let ext = sphere.base.extents;
        assert!((ext.mins.z + 5.0).abs() < 1e-4 && (ext.maxs.z - 5.0).abs() < 1e-4);
        let mesh = sphere.mesh().unwrap();
        assert!(mesh.contains_point(Vec3::new(1.0, 1.0, 1.0)));
        assert!(mesh.contains_point(Vec3::new(0.0, 0.0, -4.0)));
        assert!(!mesh.contains_point(Vec3::new(4.0, 4.0, 0.0)));

        let t = sphere.intersect(&Ray::new(Vec3::new(20.0, 0.2, 0.3), -Vec3::x()));
        assert!(t > 15.0 && t < 15.5, "t = {t}");
    }

    #[test]
    fn test_hemisphere_rests_on_its_cap() {
        let mut dome = ball(3, true);
        dome.materials[SphereSlot::Bottom as usize] = Some(MaterialId(4));
        dome.finalize();
        assert!(dome.base.extents.mins.z.abs() < 1e-4);
        let mesh = dome.mesh().unwrap();
        assert!(mesh.contains_point(Vec3::new(1.0, 1.0, 1.0)));
        assert!(!mesh.contains_point(Vec3::new(0.0, 0.0, -1.0)));
        let caps: Vec<_> =
            mesh.faces.iter().filter(|f| f.def.material == Some(MaterialId(4))).collect();
        assert_eq!(caps.len(), 1);
        assert_eq!(caps[0].vertex_count(), 12);
        assert!(caps[0].normal().z < -0.99);
    }

    #[test]
    fn test_zero_divisions_invalid() {
        let sphere = ball(0, false);
        assert!(!sphere.is_valid());
        assert!(!sphere.in_cylinder(Vec3::zeros(), 1.0, 1.0));
    }

    #[test]
    fn test_transformed_copy_scales_mesh() {
        let sphere = ball(2, false);
        let mut scale = MeshTransform::new();
        scale.add_scale(Vec3::new(2.0, 2.0, 2.0));
        let copy = sphere.copy_with_transform(&scale);
        assert!((copy.base.extents.maxs.z - 10.0).abs() < 1e-3);
        assert_eq!(copy.base.size, sphere.base.size);
    }

    #[test]
    fn test_pack_round_trip() {
        let mut dome = ball(3, true);
        dome.base.ricochet = true;
        dome.smooth_bounce = true;
        dome.finalize();
        let bytes = dome.to_bytes();
        assert_eq!(bytes.len(), dome.pack_size());
        assert_eq!(SphereObstacle::from_bytes(&bytes).unwrap(), dome);
    }

    #[test]
    fn test_print_block() {
        let dome = ball(3, true);
        let mut text = String::new();
        dome.print(&mut text, "  ", &MaterialManager::new()).unwrap();
        assert!(text.starts_with("  sphere\n"));
        assert!(text.contains("    divisions 3\n    hemisphere\n"));
        assert!(text.contains("    bottom matref -1\n"));
        assert!(text.ends_with("  end\n\n"));
    }
}
