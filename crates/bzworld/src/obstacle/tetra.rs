//! Tetrahedrons given by their four corners

use std::fmt::{self, Write};

use log::debug;

use super::common::ObstacleBase;
use super::container::{self, MeshBuilder, MeshContainer};
use super::mesh::{CheckPoint, MeshObstacle};
use crate::export::obj::ObjCounter;
use crate::foundation::math::Vec3;
use crate::material::{pack_material_ref, unpack_material_ref, MaterialManager, MaterialRef};
use crate::pack::{PackBuffer, PackError, Packable, UnpackBuffer};
use crate::transform::MeshTransform;

const TETRA_RICOCHET: u8 = 1 << 3;

/// Smallest triple product of the edges that still has volume
const MIN_VOLUME: f32 = 1.0e-4;

/// Corner rings of the faces; face `i` is opposite corner `i`
const FACES: [[usize; 3]; 4] = [[3, 1, 2], [2, 0, 3], [3, 0, 1], [1, 0, 2]];

/// Triple product of the edges leaving corner 0
fn edge_product(v: &[Vec3; 4]) -> f32 {
    let e0 = v[1] - v[0];
    let e1 = v[2] - v[0];
    let e2 = v[3] - v[0];
    e0.cross(&e1).dot(&e2)
}

/// A tetrahedron
///
/// `materials[i]` covers the face opposite `vertices[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct TetraBuilding {
    /// Bounding placement derived from the corners
    pub base: ObstacleBase,
    /// Placement applied to the corners
    pub transform: MeshTransform,
    /// Corner positions
    pub vertices: [Vec3; 4],
    /// Materials by opposite corner
    pub materials: [MaterialRef; 4],
    /// Physics driver index, `-1` for none
    pub phydrv: i32,
    /// Bounces use interpolated normals
    pub smooth_bounce: bool,
    mesh: Option<Box<MeshObstacle>>,
}

impl TetraBuilding {
    /// Tetrahedron over `vertices`, reordered if needed so its faces point out
    pub fn new(transform: MeshTransform, mut vertices: [Vec3; 4]) -> Self {
        if edge_product(&vertices) < 0.0 {
            vertices.swap(1, 2);
        }
        let mut tetra = Self {
            base: ObstacleBase::default(),
            transform,
            vertices,
            materials: [None; 4],
            phydrv: -1,
            smooth_bounce: false,
            mesh: None,
        };
        tetra.finalize();
        tetra
    }

    /// Rebuild the mesh and bounds
    pub fn finalize(&mut self) {
        self.mesh = self.make_mesh().map(Box::new);
        let ext = self.mesh_extents();
        self.base.extents = ext;
        if !ext.is_empty() {
            self.base.pos = Vec3::new(
                0.5 * (ext.maxs.x + ext.mins.x),
                0.5 * (ext.maxs.y + ext.mins.y),
                ext.mins.z,
            );
            self.base.size = Vec3::new(
                0.5 * (ext.maxs.x - ext.mins.x),
                0.5 * (ext.maxs.y - ext.mins.y),
                ext.maxs.z - ext.mins.z,
            );
        }
    }

    /// Take the generated mesh for insertion into the world
    pub fn container_mesh(&self) -> Option<MeshObstacle> {
        self.mesh.as_deref().cloned()
    }

    /// Four triangles; `None` when the corners are coplanar
    pub fn make_mesh(&self) -> Option<MeshObstacle> {
        if edge_product(&self.vertices).abs() < MIN_VOLUME {
            debug!("tetra without volume");
            return None;
        }
        let mut b = MeshBuilder::new();
        let centroid = self.vertices.iter().sum::<Vec3>() * 0.25;
        b.checks.push(CheckPoint::inside(centroid));
        for v in self.vertices {
            b.vertex(v);
        }
        for (ring, material) in FACES.iter().zip(self.materials) {
            b.face(ring.to_vec(), Vec::new(), Vec::new(), material);
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
        writeln!(out, "{indent}tetra")?;
        if !self.base.name.is_empty() {
            writeln!(out, "{indent}  name {}", self.base.name)?;
        }
        for (v, material) in self.vertices.iter().zip(self.materials) {
            writeln!(out, "{indent}  vertex {} {} {}", v.x, v.y, v.z)?;
            write!(out, "{indent}  matref ")?;
            materials.print_reference(out, material)?;
            writeln!(out)?;
        }
        container::print_tail(
            out,
            indent,
            &self.base,
            &self.transform,
            &[],
            materials,
            self.phydrv,
            self.smooth_bounce,
            true,
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

impl MeshContainer for TetraBuilding {
    const KEYWORD: &'static str = "tetra";

    fn mesh(&self) -> Option<&MeshObstacle> {
        self.mesh.as_deref()
    }
}

impl Packable for TetraBuilding {
    fn pack(&self, buf: &mut PackBuffer) {
        self.transform.pack(buf);
        for v in &self.vertices {
            buf.pack_vec3(v);
        }
        for m in self.materials {
            pack_material_ref(buf, m);
        }
        buf.pack_i32(self.phydrv);
        buf.pack_u8(container::state_bits(&self.base, self.smooth_bounce, false, TETRA_RICOCHET));
    }

    fn pack_size(&self) -> usize {
        self.transform.pack_size() + 12 * 4 + 4 * 4 + 4 + 1
    }

    fn unpack(buf: &mut UnpackBuffer<'_>) -> Result<Self, PackError> {
        let transform = MeshTransform::unpack(buf)?;
        let mut vertices = [Vec3::zeros(); 4];
        for v in &mut vertices {
            *v = buf.unpack_vec3()?;
        }
        let mut tetra = Self::new(transform, vertices);
        for m in &mut tetra.materials {
            *m = unpack_material_ref(buf)?;
        }
        tetra.phydrv = buf.unpack_i32()?;
        let state = buf.unpack_u8()?;
        (tetra.smooth_bounce, _) = container::apply_state_bits(
            state,
            &mut tetra.base,
            TETRA_RICOCHET,
        );
        tetra.finalize();
        Ok(tetra)
    }
}
