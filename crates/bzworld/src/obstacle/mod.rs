//! Static world obstacles
//!
//! Every obstacle kind lives in its own module and answers the same set of
//! queries: ray intersection, surface normals, tank footprint overlap (static
//! and swept), wall crossing, packing and printing. [`Obstacle`] is the
//! closed set of kinds the world stores; its methods forward to the concrete
//! type with an exhaustive match, so a new query has to be answered by every
//! kind before the crate compiles.
//!
//! # Module Organization
//!
//! - [`common`] - attributes shared by every kind ([`ObstacleBase`])
//! - [`box_building`], [`pyramid`], [`base_building`], [`teleporter`] -
//!   z-rotated prisms with analytic queries
//! - [`mesh`], [`mesh_face`] - polygonal solids
//! - [`container`], [`arc`], [`cone`], [`sphere`], [`tetra`] - parametric
//!   shapes that collide through the mesh they generate
//! - [`hit_normal`] - swept footprint against a rectangle

pub mod arc;
pub mod base_building;
pub mod box_building;
pub mod common;
pub mod cone;
pub mod container;
pub mod hit_normal;
pub mod mesh;
pub mod mesh_face;
pub mod pyramid;
pub mod sphere;
pub mod teleporter;
pub mod tetra;

use std::fmt::{self, Write};

use crate::export::obj::ObjCounter;
use crate::foundation::math::{Vec3, Vec4};
use crate::geometry::{Extents, Ray};
use crate::material::MaterialManager;
use crate::pack::{PackBuffer, PackError, Packable, UnpackBuffer};
use crate::transform::MeshTransform;

pub use arc::{ArcObstacle, ArcSlot};
pub use base_building::BaseBuilding;
pub use box_building::BoxBuilding;
pub use common::{ObstacleBase, ObstacleSource, MAX_EXTENT};
pub use cone::{ConeObstacle, ConeSlot};
pub use container::MeshContainer;
pub use hit_normal::HitNormal;
pub use mesh::{CheckPoint, CheckType, MeshObstacle};
pub use mesh_face::{FaceDef, FaceError, MeshFace};
pub use pyramid::PyramidBuilding;
pub use sphere::{SphereObstacle, SphereSlot};
pub use teleporter::{Teleporter, TeleporterFace};
pub use tetra::TetraBuilding;

/// Obstacle kinds, in the order they are stored, packed and printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ObstacleType {
    /// Axis-aligned box, rotated about z
    Box = 0,
    /// Four-sided pyramid
    Pyramid,
    /// Team base
    Base,
    /// Teleporter frame
    Teleporter,
    /// Polygon mesh
    Mesh,
    /// Arc container
    Arc,
    /// Cone container
    Cone,
    /// Sphere container
    Sphere,
    /// Tetrahedron container
    Tetra,
}

impl ObstacleType {
    /// Number of kinds
    pub const COUNT: usize = 9;

    /// Every kind in storage order
    pub const ALL: [Self; Self::COUNT] = [
        Self::Box,
        Self::Pyramid,
        Self::Base,
        Self::Teleporter,
        Self::Mesh,
        Self::Arc,
        Self::Cone,
        Self::Sphere,
        Self::Tetra,
    ];

    /// Position in [`ObstacleType::ALL`]
    pub fn index(self) -> usize {
        self as usize
    }

    /// World-file keyword
    pub fn name(self) -> &'static str {
        match self {
            Self::Box => "box",
            Self::Pyramid => "pyramid",
            Self::Base => "base",
            Self::Teleporter => "teleporter",
            Self::Mesh => "mesh",
            Self::Arc => "arc",
            Self::Cone => "cone",
            Self::Sphere => "sphere",
            Self::Tetra => "tetra",
        }
    }

    /// Collides through a generated mesh
    pub fn is_container(self) -> bool {
        matches!(self, Self::Arc | Self::Cone | Self::Sphere | Self::Tetra)
    }
}

impl TryFrom<u8> for ObstacleType {
    type Error = PackError;

    fn try_from(value: u8) -> Result<Self, PackError> {
        Self::ALL
            .get(usize::from(value))
            .copied()
            .ok_or(PackError::UnknownObstacleType(value))
    }
}

/// Compact id of a world obstacle: kind in the high half, list slot in the low
pub fn make_guid(kind: ObstacleType, list_id: u16) -> u32 {
    (u32::from(kind as u8) << 16) | u32::from(list_id)
}

/// Split a [`make_guid`] id
pub fn split_guid(guid: u32) -> Result<(ObstacleType, u16), PackError> {
    let kind = u8::try_from(guid >> 16).map_err(|_| PackError::InvalidCount(i64::from(guid)))?;
    #[allow(clippy::cast_possible_truncation)]
    let list_id = (guid & 0xFFFF) as u16;
    Ok((ObstacleType::try_from(kind)?, list_id))
}

macro_rules! dispatch {
    ($value:expr, $o:ident => $body:expr) => {
        match $value {
            Obstacle::Box($o) => $body,
            Obstacle::Pyramid($o) => $body,
            Obstacle::Base($o) => $body,
            Obstacle::Teleporter($o) => $body,
            Obstacle::Mesh($o) => $body,
            Obstacle::Arc($o) => $body,
            Obstacle::Cone($o) => $body,
            Obstacle::Sphere($o) => $body,
            Obstacle::Tetra($o) => $body,
        }
    };
}

macro_rules! dispatch_map {
    ($value:expr, $o:ident => $body:expr) => {
        match $value {
            Obstacle::Box($o) => Obstacle::Box($body),
            Obstacle::Pyramid($o) => Obstacle::Pyramid($body),
            Obstacle::Base($o) => Obstacle::Base($body),
            Obstacle::Teleporter($o) => Obstacle::Teleporter($body),
            Obstacle::Mesh($o) => Obstacle::Mesh($body),
            Obstacle::Arc($o) => Obstacle::Arc($body),
            Obstacle::Cone($o) => Obstacle::Cone($body),
            Obstacle::Sphere($o) => Obstacle::Sphere($body),
            Obstacle::Tetra($o) => Obstacle::Tetra($body),
        }
    };
}

/// Any world obstacle
#[derive(Debug, Clone, PartialEq)]
pub enum Obstacle {
    /// A box
    Box(BoxBuilding),
    /// A pyramid
    Pyramid(PyramidBuilding),
    /// A team base
    Base(BaseBuilding),
    /// A teleporter
    Teleporter(Teleporter),
    /// A mesh
    Mesh(MeshObstacle),
    /// An arc
    Arc(ArcObstacle),
    /// A cone
    Cone(ConeObstacle),
    /// A sphere
    Sphere(SphereObstacle),
    /// A tetrahedron
    Tetra(TetraBuilding),
}

impl Obstacle {
    /// Kind of the wrapped obstacle
    pub fn obstacle_type(&self) -> ObstacleType {
        match self {
            Self::Box(_) => ObstacleType::Box,
            Self::Pyramid(_) => ObstacleType::Pyramid,
            Self::Base(_) => ObstacleType::Base,
            Self::Teleporter(_) => ObstacleType::Teleporter,
            Self::Mesh(_) => ObstacleType::Mesh,
            Self::Arc(_) => ObstacleType::Arc,
            Self::Cone(_) => ObstacleType::Cone,
            Self::Sphere(_) => ObstacleType::Sphere,
            Self::Tetra(_) => ObstacleType::Tetra,
        }
    }

    /// Shared placement and flags
    pub fn base(&self) -> &ObstacleBase {
        dispatch!(self, o => &o.base)
    }

    /// Mutable placement and flags
    pub fn base_mut(&mut self) -> &mut ObstacleBase {
        dispatch!(self, o => &mut o.base)
    }

    /// Bounds of the obstacle
    pub fn extents(&self) -> &Extents {
        &self.base().extents
    }

    /// Id used in network messages; valid once list ids are assigned
    pub fn guid(&self) -> u32 {
        make_guid(self.obstacle_type(), self.base().list_id)
    }

    /// Geometry is well formed and in range
    pub fn is_valid(&self) -> bool {
        dispatch!(self, o => o.is_valid())
    }

    /// Both tanks and shots pass through
    pub fn is_passable(&self) -> bool {
        self.base().is_passable()
    }

    /// Entry time of `ray`, `-1` on a miss
    pub fn intersect(&self, ray: &Ray) -> f32 {
        dispatch!(self, o => o.intersect(ray))
    }

    /// Horizontal-ish outward normal at a surface point
    pub fn get_normal(&self, p: Vec3) -> Vec3 {
        dispatch!(self, o => o.get_normal(p))
    }

    /// Outward normal including sloped and horizontal faces
    pub fn get_3d_normal(&self, p: Vec3) -> Vec3 {
        dispatch!(self, o => o.get_3d_normal(p))
    }

    /// Conservative overlap with an upright cylinder standing on `p`
    pub fn in_cylinder(&self, p: Vec3, radius: f32, height: f32) -> bool {
        dispatch!(self, o => o.in_cylinder(p, radius, height))
    }

    /// Overlap with a tank footprint of half sizes `dx, dy` standing on `p`
    pub fn in_box(&self, p: Vec3, angle: f32, dx: f32, dy: f32, height: f32) -> bool {
        dispatch!(self, o => o.in_box(p, angle, dx, dy, height))
    }

    /// Overlap anywhere along a move between two poses
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
        dispatch!(self, o => o.in_moving_box(old_p, old_angle, p, angle, dx, dy, height))
    }

    /// Plane of the surface a footprint straddles
    pub fn is_crossing(&self, p: Vec3, angle: f32, dx: f32, dy: f32, height: f32) -> Option<Vec4> {
        dispatch!(self, o => o.is_crossing(p, angle, dx, dy, height))
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
        height: f32,
    ) -> Option<HitNormal> {
        dispatch!(self, o => o.get_hit_normal(pos1, azimuth1, pos2, azimuth2, dx, dy, height))
    }

    /// Copy placed by `xform`; provenance and name are kept
    pub fn copy_with_transform(&self, xform: &MeshTransform) -> Self {
        dispatch_map!(self, o => o.copy_with_transform(xform))
    }

    /// The mesh a container collides through
    ///
    /// `None` for other kinds and for containers whose parameters are
    /// degenerate.
    pub fn container_mesh(&self) -> Option<MeshObstacle> {
        match self {
            Self::Arc(o) => o.container_mesh(),
            Self::Cone(o) => o.container_mesh(),
            Self::Sphere(o) => o.container_mesh(),
            Self::Tetra(o) => o.container_mesh(),
            _ => None,
        }
    }

    /// Read one obstacle of `kind`
    pub fn unpack_kind(kind: ObstacleType, buf: &mut UnpackBuffer<'_>) -> Result<Self, PackError> {
        Ok(match kind {
            ObstacleType::Box => Self::Box(BoxBuilding::unpack(buf)?),
            ObstacleType::Pyramid => Self::Pyramid(PyramidBuilding::unpack(buf)?),
            ObstacleType::Base => Self::Base(BaseBuilding::unpack(buf)?),
            ObstacleType::Teleporter => Self::Teleporter(Teleporter::unpack(buf)?),
            ObstacleType::Mesh => Self::Mesh(MeshObstacle::unpack(buf)?),
            ObstacleType::Arc => Self::Arc(ArcObstacle::unpack(buf)?),
            ObstacleType::Cone => Self::Cone(ConeObstacle::unpack(buf)?),
            ObstacleType::Sphere => Self::Sphere(SphereObstacle::unpack(buf)?),
            ObstacleType::Tetra => Self::Tetra(TetraBuilding::unpack(buf)?),
        })
    }

    /// Append the kind-specific record; the kind itself is not written
    pub fn pack(&self, buf: &mut PackBuffer) {
        dispatch!(self, o => o.pack(buf));
    }

    /// Bytes [`Obstacle::pack`] writes
    pub fn pack_size(&self) -> usize {
        dispatch!(self, o => o.pack_size())
    }

    /// World-file block
    pub fn print(
        &self,
        out: &mut impl Write,
        indent: &str,
        materials: &MaterialManager,
    ) -> fmt::Result {
        match self {
            Self::Box(o) => o.print(out, indent),
            Self::Pyramid(o) => o.print(out, indent),
            Self::Base(o) => o.print(out, indent),
            Self::Teleporter(o) => o.print(out, indent),
            Self::Mesh(o) => o.print(out, indent, materials),
            Self::Arc(o) => o.print(out, indent, materials),
            Self::Cone(o) => o.print(out, indent, materials),
            Self::Sphere(o) => o.print(out, indent, materials),
            Self::Tetra(o) => o.print(out, indent, materials),
        }
    }

    /// Wavefront OBJ object block
    pub fn print_obj(
        &self,
        out: &mut impl Write,
        counter: &mut ObjCounter,
        materials: &MaterialManager,
    ) -> fmt::Result {
        match self {
            Self::Box(o) => o.print_obj(out, counter),
            Self::Pyramid(o) => o.print_obj(out, counter),
            Self::Base(o) => o.print_obj(out, counter),
            Self::Teleporter(o) => o.print_obj(out, counter),
            Self::Mesh(o) => o.print_obj(out, counter, materials),
            Self::Arc(o) => o.print_obj(out, counter, materials),
            Self::Cone(o) => o.print_obj(out, counter, materials),
            Self::Sphere(o) => o.print_obj(out, counter, materials),
            Self::Tetra(o) => o.print_obj(out, counter, materials),
        }
    }
}

macro_rules! impl_from_kind {
    ($($kind:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Obstacle {
                fn from(o: $ty) -> Self {
                    Self::$kind(o)
                }
            }
        )*
    };
}

impl_from_kind!(
    Box(BoxBuilding),
    Pyramid(PyramidBuilding),
    Base(BaseBuilding),
    Teleporter(Teleporter),
    Mesh(MeshObstacle),
    Arc(ArcObstacle),
    Cone(ConeObstacle),
    Sphere(SphereObstacle),
    Tetra(TetraBuilding),
);

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_box() -> Obstacle {
        BoxBuilding::new(Vec3::zeros(), 0.0, Vec3::new(1.0, 1.0, 1.0)).into()
    }

    #[test]
    fn test_box_ray_and_normal() {
        let b = unit_box();
        let t = b.intersect(&Ray::new(Vec3::new(5.0, 0.0, 0.5), Vec3::new(-1.0, 0.0, 0.0)));
        assert_relative_eq!(t, 4.0, epsilon = 1e-5);
        assert_relative_eq!(b.get_normal(Vec3::new(1.0, 0.0, 0.5)), Vec3::x(), epsilon = 1e-5);
    }

    #[test]
    fn test_guid_round_trip() {
        let guid = make_guid(ObstacleType::Teleporter, 7);
        assert_eq!(guid, (3 << 16) | 7);
        assert_eq!(split_guid(guid).unwrap(), (ObstacleType::Teleporter, 7));
        assert!(split_guid(make_guid(ObstacleType::Tetra, 0) + (1 << 16)).is_err());
    }

    #[test]
    fn test_type_byte_range() {
        for kind in ObstacleType::ALL {
            assert_eq!(ObstacleType::try_from(kind as u8).unwrap(), kind);
        }
        assert_eq!(ObstacleType::try_from(9), Err(PackError::UnknownObstacleType(9)));
    }

    #[test]
    fn test_every_kind_packs_to_its_size() {
        let xform = MeshTransform::new();
        let obstacles: Vec<Obstacle> = vec![
            unit_box(),
            PyramidBuilding::new(Vec3::zeros(), 0.3, Vec3::new(2.0, 2.0, 3.0)).into(),
            BaseBuilding::new(Vec3::zeros(), 0.0, Vec3::new(5.0, 5.0, 0.0), 2).into(),
            Teleporter::new(Vec3::zeros(), 0.0, Vec3::new(0.5, 5.0, 10.0), 1.0).into(),
            mesh::test_cube(Vec3::zeros(), 1.0).into(),
            ArcObstacle::new(
                xform.clone(),
                Vec3::zeros(),
                Vec3::new(5.0, 5.0, 2.0),
                0.0,
                180.0,
                0.5,
                8,
            ).into(),
            ConeObstacle::new(
                xform.clone(),
                Vec3::zeros(),
                Vec3::new(5.0, 5.0, 5.0),
                0.0,
                360.0,
                8,
            ).into(),
            SphereObstacle::new(
                xform.clone(),
                Vec3::zeros(),
                Vec3::repeat(3.0),
                0.0,
                2,
                false,
            ).into(),
            TetraBuilding::new(
                xform,
                [Vec3::zeros(), Vec3::x(), Vec3::y(), Vec3::z()],
            )
            .into(),
        ];
        for o in obstacles {
            let mut buf = PackBuffer::new();
            o.pack(&mut buf);
            assert_eq!(buf.len(), o.pack_size(), "{}", o.obstacle_type().name());
            let mut reader = UnpackBuffer::new(buf.as_bytes());
            let back = Obstacle::unpack_kind(o.obstacle_type(), &mut reader).unwrap();
            assert_eq!(back.obstacle_type(), o.obstacle_type());
            assert_eq!(back.extents(), o.extents(), "{}", o.obstacle_type().name());
            assert!(back.is_valid());
        }
    }

    #[test]
    fn test_identity_copy_keeps_geometry() {
        let xform = MeshTransform::new();
        for o in [
            unit_box(),
            ArcObstacle::new(
                xform.clone(),
                Vec3::zeros(),
                Vec3::new(5.0, 5.0, 2.0),
                0.0,
                90.0,
                1.0,
                4,
            ).into(),
        ] {
            let copy = o.copy_with_transform(&xform);
            let (a, b) = (copy.extents(), o.extents());
            assert_relative_eq!(a.mins, b.mins, epsilon = 1e-5);
            assert_relative_eq!(a.maxs, b.maxs, epsilon = 1e-5);
            assert_eq!(copy.base().pos, o.base().pos);
        }
    }

    #[test]
    fn test_only_containers_have_meshes() {
        assert!(unit_box().container_mesh().is_none());
        let cone: Obstacle =
            ConeObstacle::new(
                MeshTransform::new(),
                Vec3::zeros(),
                Vec3::repeat(2.0),
                0.0,
                360.0,
                6,
            ).into();
        assert!(cone.obstacle_type().is_container());
        assert!(cone.container_mesh().is_some());
    }

    #[test]
    fn test_extents_bound_the_shape() {
        let pyr: Obstacle = PyramidBuilding::new(
            Vec3::new(3.0, -2.0, 0.0),
            0.7,
            Vec3::new(2.0, 1.0, 4.0),
        ).into();
        let ext = *pyr.extents();
        for i in -20..=20 {
            for j in -20..=20 {
                let p = Vec3::new(i as f32 * 0.4, j as f32 * 0.4, 1.0);
                if pyr.in_box(p, 0.0, 1e-3, 1e-3, 0.0) {
                    let mut grown = ext;
                    grown.add_margin(1e-2);
                    assert!(grown.contains_point(p), "{p:?}");
                }
            }
        }
    }
}
