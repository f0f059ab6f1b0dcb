//! Planar polygons of a mesh
//!
//! A face stores indices into its mesh's vertex, normal and texcoord arrays
//! together with a cached copy of its points, its plane and one bounding
//! plane per edge. Rings are counter-clockwise when seen from outside the
//! solid, so the plane normal points out of the mesh and every edge plane
//! points away from the interior of the polygon.

use std::fmt::{self, Write};

use thiserror::Error;

use crate::foundation::math::{Vec2, Vec3, Vec4};
use crate::geometry::{plane, Extents, Ray};
use crate::material::{pack_material_ref, unpack_material_ref, MaterialManager, MaterialRef};
use crate::pack::{PackBuffer, PackError, UnpackBuffer};

const FACE_NORMALS: u8 = 1 << 0;
const FACE_TEXCOORDS: u8 = 1 << 1;
const FACE_DRIVE_THRU: u8 = 1 << 2;
const FACE_SHOOT_THRU: u8 = 1 << 3;
const FACE_SMOOTH_BOUNCE: u8 = 1 << 4;
const FACE_NO_CLUSTERS: u8 = 1 << 5;
const FACE_RICOCHET: u8 = 1 << 6;

/// Largest distance of a ring point from the face plane
const PLANAR_TOLERANCE: f32 = 1.0e-3;

/// Slack for points on an edge plane
const EDGE_TOLERANCE: f32 = 1.0e-3;

/// Rays must meet the front of a face at least this steeply
const FRONT_FACING: f32 = -1.0e-3;

/// Why a candidate face was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FaceError {
    /// Fewer than three corners
    #[error("face needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),

    /// Normal list length differs
    #[error("face has {normals} normals for {vertices} vertices")]
    NormalCountMismatch { vertices: usize, normals: usize },

    /// Texcoord list length differs
    #[error("face has {texcoords} texcoords for {vertices} vertices")]
    TexcoordCountMismatch { vertices: usize, texcoords: usize },

    /// An index past its list
    #[error("{kind} index {index} out of range ({count} available)")]
    IndexOutOfRange { kind: &'static str, index: usize, count: usize },

    /// Zero area
    #[error("face has no area")]
    Degenerate,

    /// Corners off the face plane
    #[error("face vertices are not coplanar")]
    NonPlanar,

    /// A reflex corner
    #[error("face is not convex")]
    NonConvex,
}

/// Authored description of a face, before its geometry is cached
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaceDef {
    /// Vertex indices, counter-clockwise seen from outside
    pub vertices: Vec<usize>,
    /// Normal indices, empty or one per vertex
    pub normals: Vec<usize>,
    /// Texcoord indices, empty or one per vertex
    pub texcoords: Vec<usize>,
    /// Surface material
    pub material: MaterialRef,
    /// Physics driver index, `-1` for none
    pub phydrv: i32,
    /// Kept out of render clusters
    pub no_clusters: bool,
    /// Bounces use interpolated normals
    pub smooth_bounce: bool,
    /// Tanks pass through
    pub drive_through: bool,
    /// Shots pass through
    pub shoot_through: bool,
    /// Shots bounce
    pub ricochet: bool,
}

impl FaceDef {
    /// Face over `vertices` with no normals, texcoords or driver
    pub fn new(vertices: Vec<usize>) -> Self {
        Self { vertices, phydrv: -1, ..Self::default() }
    }

    /// Check list lengths and that every index exists in the mesh
    pub fn validate(
        &self,
        vertex_count: usize,
        normal_count: usize,
        texcoord_count: usize,
    ) -> Result<(), FaceError> {
        let count = self.vertices.len();
        if count < 3 {
            return Err(FaceError::TooFewVertices(count));
        }
        if !self.normals.is_empty() && self.normals.len() != count {
            return Err(FaceError::NormalCountMismatch {
                vertices: count,
                normals: self.normals.len(),
            });
        }
        if !self.texcoords.is_empty() && self.texcoords.len() != count {
            return Err(FaceError::TexcoordCountMismatch {
                vertices: count,
                texcoords: self.texcoords.len(),
            });
        }
        for (kind, indices, available) in [
            ("vertex", &self.vertices, vertex_count),
            ("normal", &self.normals, normal_count),
            ("texcoord", &self.texcoords, texcoord_count),
        ] {
            if let Some(&index) = indices.iter().find(|&&i| i >= available) {
                return Err(FaceError::IndexOutOfRange { kind, index, count: available });
            }
        }
        Ok(())
    }

    /// Reverse the ring, keeping normals and texcoords with their vertices
    pub fn reverse(&mut self) {
        self.vertices.reverse();
        self.normals.reverse();
        self.texcoords.reverse();
    }

    /// Same attributes over a different ring
    fn with_corners(&self, corners: [usize; 3]) -> Self {
        let pick = |list: &Vec<usize>| {
            if list.is_empty() {
                Vec::new()
            } else {
                corners.iter().map(|&c| list[c]).collect()
            }
        };
        Self {
            vertices: pick(&self.vertices),
            normals: pick(&self.normals),
            texcoords: pick(&self.texcoords),
            ..self.clone()
        }
    }
}

/// A planar convex polygon of a mesh
#[derive(Debug, Clone, PartialEq)]
pub struct MeshFace {
    /// Indices and attributes as authored
    pub def: FaceDef,
    points: Vec<Vec3>,
    plane: Vec4,
    edge_planes: Vec<Vec4>,
    extents: Extents,
}

/// Newell's method: area-weighted normal of a possibly non-planar ring
fn newell_normal(points: &[Vec3]) -> Vec3 {
    let count = points.len();
    (0..count).fold(Vec3::zeros(), |acc, i| {
        let a = points[i];
        let b = points[(i + 1) % count];
        acc + Vec3::new(
            (a.y - b.y) * (a.z + b.z),
            (a.z - b.z) * (a.x + b.x),
            (a.x - b.x) * (a.y + b.y),
        )
    })
}

impl MeshFace {
    /// Validated face over `vertices`
    ///
    /// The ring must be planar, convex and have area.
    pub fn new(def: FaceDef, vertices: &[Vec3]) -> Result<Self, FaceError> {
        def.validate(vertices.len(), usize::MAX, usize::MAX)?;
        let face = Self::from_def(def, vertices);
        face.check_shape()?;
        Ok(face)
    }

    /// Cache geometry without validating the shape
    ///
    /// Indices must already be in range. Degenerate rings get a zero plane
    /// and are never hit.
    pub(crate) fn from_def(def: FaceDef, vertices: &[Vec3]) -> Self {
        let points: Vec<Vec3> = def.vertices.iter().map(|&i| vertices[i]).collect();
        let mut extents = Extents::empty();
        for p in &points {
            extents.expand_to_point(*p);
        }

        let normal = newell_normal(&points);
        let plane = match normal.try_normalize(f32::EPSILON) {
            Some(n) => {
                let centroid = points.iter().sum::<Vec3>() / points.len() as f32;
                Vec4::new(n.x, n.y, n.z, -n.dot(&centroid))
            }
            None => Vec4::zeros(),
        };

        let n = plane::plane_normal(&plane);
        let count = points.len();
        let edge_planes = (0..count)
            .map(|i| {
                let a = points[i];
                let b = points[(i + 1) % count];
                match (b - a).cross(&n).try_normalize(f32::EPSILON) {
                    Some(e) => Vec4::new(e.x, e.y, e.z, -e.dot(&a)),
                    None => Vec4::zeros(),
                }
            })
            .collect();

        Self { def, points, plane, edge_planes, extents }
    }

    fn check_shape(&self) -> Result<(), FaceError> {
        if self.plane == Vec4::zeros() || self.edge_planes.iter().any(|e| *e == Vec4::zeros()) {
            return Err(FaceError::Degenerate);
        }
        if self
            .points
            .iter()
            .any(|p| plane::plane_distance(&self.plane, *p).abs() > PLANAR_TOLERANCE)
        {
            return Err(FaceError::NonPlanar);
        }
        let n = plane::plane_normal(&self.plane);
        let count = self.points.len();
        for i in 0..count {
            let a = self.points[(i + 1) % count] - self.points[i];
            let b = self.points[(i + 2) % count] - self.points[(i + 1) % count];
            if a.cross(&b).dot(&n) < -PLANAR_TOLERANCE * a.norm() * b.norm() {
                return Err(FaceError::NonConvex);
            }
        }
        Ok(())
    }

    /// Ring points in world space
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// Outward plane `ax + by + cz + d = 0`
    pub fn plane(&self) -> &Vec4 {
        &self.plane
    }

    /// Outward unit normal
    pub fn normal(&self) -> Vec3 {
        plane::plane_normal(&self.plane)
    }

    /// Bounds of the corners
    pub fn extents(&self) -> &Extents {
        &self.extents
    }

    /// Number of corners
    pub fn vertex_count(&self) -> usize {
        self.points.len()
    }

    /// Has vertex normals
    pub fn use_normals(&self) -> bool {
        !self.def.normals.is_empty()
    }

    /// Has texture coordinates
    pub fn use_texcoords(&self) -> bool {
        !self.def.texcoords.is_empty()
    }

    /// Time a ray meets the front of the face, `-1` on a miss
    ///
    /// Rays running parallel to the face or leaving through its back never
    /// hit.
    pub fn intersect(&self, ray: &Ray) -> f32 {
        let normal = self.normal();
        let linedot = normal.dot(&ray.direction);
        if linedot >= FRONT_FACING {
            return -1.0;
        }
        let time = -plane::plane_distance(&self.plane, ray.origin) / linedot;
        if time < 0.0 {
            return -1.0;
        }
        let point = ray.point_at(time);
        if self
            .edge_planes
            .iter()
            .any(|e| plane::plane_distance(e, point) > EDGE_TOLERANCE)
        {
            return -1.0;
        }
        time
    }

    /// How far `p` is from the polygon: plane distance plus the amount it
    /// lies beyond any edge
    pub(crate) fn distance_to(&self, p: Vec3) -> f32 {
        let outside: f32 = self
            .edge_planes
            .iter()
            .map(|e| plane::plane_distance(e, p).max(0.0))
            .sum();
        plane::plane_distance(&self.plane, p).abs() + outside
    }

    fn state_bits(&self) -> u8 {
        let d = &self.def;
        [
            (self.use_normals(), FACE_NORMALS),
            (self.use_texcoords(), FACE_TEXCOORDS),
            (d.drive_through, FACE_DRIVE_THRU),
            (d.shoot_through, FACE_SHOOT_THRU),
            (d.smooth_bounce, FACE_SMOOTH_BOUNCE),
            (d.no_clusters, FACE_NO_CLUSTERS),
            (d.ricochet, FACE_RICOCHET),
        ]
        .iter()
        .filter(|(set, _)| *set)
        .fold(0, |state, (_, bit)| state | bit)
    }

    /// Append the face record
    pub fn pack(&self, buf: &mut PackBuffer) {
        buf.pack_u8(self.state_bits());
        buf.pack_count_i32(self.def.vertices.len());
        for list in [&self.def.vertices, &self.def.normals, &self.def.texcoords] {
            for &index in list {
                buf.pack_i32(i32::try_from(index).unwrap_or(i32::MAX));
            }
        }
        pack_material_ref(buf, self.def.material);
        buf.pack_i32(self.def.phydrv);
    }

    /// Bytes `pack` writes
    pub fn pack_size(&self) -> usize {
        let lists = self.def.vertices.len() + self.def.normals.len() + self.def.texcoords.len();
        1 + 4 + 4 * lists + 4 + 4
    }

    /// Read a face of a mesh whose arrays are already known
    pub fn unpack(
        buf: &mut UnpackBuffer<'_>,
        vertices: &[Vec3],
        normal_count: usize,
        texcoord_count: usize,
    ) -> Result<Self, PackError> {
        let state = buf.unpack_u8()?;
        let count = buf.unpack_count_i32()?;
        let mut read_indices = |present: bool, available: usize| -> Result<Vec<usize>, PackError> {
            if !present {
                return Ok(Vec::new());
            }
            (0..count)
                .map(|_| {
                    let raw = buf.unpack_i32()?;
                    usize::try_from(raw)
                        .ok()
                        .filter(|&i| i < available)
                        .ok_or(PackError::InvalidCount(i64::from(raw)))
                })
                .collect()
        };
        let vertex_indices = read_indices(true, vertices.len())?;
        let normals = read_indices(state & FACE_NORMALS != 0, normal_count)?;
        let texcoords = read_indices(state & FACE_TEXCOORDS != 0, texcoord_count)?;
        if vertex_indices.len() < 3 {
            return Err(PackError::InvalidCount(vertex_indices.len() as i64));
        }
        let def = FaceDef {
            vertices: vertex_indices,
            normals,
            texcoords,
            material: unpack_material_ref(buf)?,
            phydrv: buf.unpack_i32()?,
            no_clusters: state & FACE_NO_CLUSTERS != 0,
            smooth_bounce: state & FACE_SMOOTH_BOUNCE != 0,
            drive_through: state & FACE_DRIVE_THRU != 0,
            shoot_through: state & FACE_SHOOT_THRU != 0,
            ricochet: state & FACE_RICOCHET != 0,
        };
        Ok(Self::from_def(def, vertices))
    }

    /// `face ... endface` block inside a mesh
    pub fn print(
        &self,
        out: &mut impl Write,
        indent: &str,
        materials: &MaterialManager,
    ) -> fmt::Result {
        let d = &self.def;
        writeln!(out, "{indent}  face")?;
        for (keyword, list) in
            [("vertices", &d.vertices), ("normals", &d.normals), ("texcoords", &d.texcoords)]
        {
            if list.is_empty() {
                continue;
            }
            write!(out, "{indent}    {keyword}")?;
            for index in list {
                write!(out, " {index}")?;
            }
            writeln!(out)?;
        }
        if d.material.is_some() {
            write!(out, "{indent}    matref ")?;
            materials.print_reference(out, d.material)?;
            writeln!(out)?;
        }
        if d.phydrv >= 0 {
            writeln!(out, "{indent}    phydrv {}", d.phydrv)?;
        }
        for (set, keyword) in [
            (d.smooth_bounce, "smoothbounce"),
            (d.no_clusters, "noclusters"),
            (d.drive_through, "drivethrough"),
            (d.shoot_through, "shootthrough"),
            (d.ricochet, "ricochet"),
        ] {
            if set {
                writeln!(out, "{indent}    {keyword}")?;
            }
        }
        writeln!(out, "{indent}  endface")
    }
}

/// Split a ring into triangles by ear clipping
///
/// The ring is projected onto the plane of its dominant normal axis.
/// Triangles keep the ring's winding; a ring that cannot be fully clipped
/// (self-intersecting input) yields the ears found so far.
pub fn triangulate(def: &FaceDef, vertices: &[Vec3]) -> Vec<FaceDef> {
    let points: Vec<Vec3> = def.vertices.iter().filter_map(|&i| vertices.get(i).copied()).collect();
    if points.len() != def.vertices.len() || points.len() < 3 {
        return Vec::new();
    }

    let normal = newell_normal(&points);
    let axis = normal.iamax();
    let sign = if normal[axis] < 0.0 { -1.0 } else { 1.0 };
    // cyclic axis order keeps the projection right-handed
    let flat: Vec<Vec2> = points
        .iter()
        .map(|p| Vec2::new(p[(axis + 1) % 3], p[(axis + 2) % 3]))
        .collect();

    let turn = |a: Vec2, b: Vec2, c: Vec2| {
        sign * ((b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x))
    };
    let contains = |a: Vec2, b: Vec2, c: Vec2, p: Vec2| {
        turn(a, b, p) >= 0.0 && turn(b, c, p) >= 0.0 && turn(c, a, p) >= 0.0
    };

    let mut ring: Vec<usize> = (0..points.len()).collect();
    let mut triangles = Vec::new();
    while ring.len() > 3 {
        let len = ring.len();
        let ear = (0..len).find(|&i| {
            let (ia, ib, ic) = (ring[(i + len - 1) % len], ring[i], ring[(i + 1) % len]);
            let (a, b, c) = (flat[ia], flat[ib], flat[ic]);
            if turn(a, b, c) <= f32::EPSILON {
                return false;
            }
            !ring
                .iter()
                .filter(|&&j| j != ia && j != ib && j != ic)
                .any(|&j| {
                    flat[j] != a && flat[j] != b && flat[j] != c && contains(a, b, c, flat[j])
                })
        });
        let Some(i) = ear else {
            break;
        };
        triangles.push([ring[(i + len - 1) % len], ring[i], ring[(i + 1) % len]]);
        ring.remove(i);
    }
    if ring.len() == 3 {
        triangles.push([ring[0], ring[1], ring[2]]);
    }

    triangles.into_iter().map(|corners| def.with_corners(corners)).collect()
}
