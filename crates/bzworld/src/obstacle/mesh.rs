//! Polygonal solids
//!
//! A [`MeshObstacle`] owns its vertex, normal and texcoord arrays and a
//! list of convex planar [`MeshFace`]s indexing into them. Check points
//! seed the inside/outside test: a point is inside when rays towards every
//! inside check point cross no face, and rays from every outside check point
//! towards it do cross one.

use std::fmt::{self, Write};

use log::debug;

use super::common::{ObstacleBase, MAX_EXTENT, STATE_DRIVE_THRU, STATE_SHOOT_THRU};
use super::hit_normal::HitNormal;
use super::mesh_face::{self, FaceDef, FaceError, MeshFace};
use crate::export::obj::{self, ObjCounter};
use crate::foundation::math::{Vec2, Vec3, Vec4};
use crate::geometry::{intersect, Extents, Ray};
use crate::material::MaterialManager;
use crate::pack::{PackBuffer, PackError, Packable, UnpackBuffer};
use crate::transform::{MeshTransform, MeshTransformTool};

const MESH_DRIVE_THRU: u8 = STATE_DRIVE_THRU;
const MESH_SHOOT_THRU: u8 = STATE_SHOOT_THRU;
const MESH_SMOOTH_BOUNCE: u8 = 1 << 2;
const MESH_NO_CLUSTERS: u8 = 1 << 3;
const MESH_RICOCHET: u8 = 1 << 4;

/// Which side of the surface a check point is on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CheckType {
    /// Inside the solid
    Inside = 0,
    /// Outside the solid
    Outside = 1,
}

impl TryFrom<u8> for CheckType {
    type Error = PackError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Inside),
            1 => Ok(Self::Outside),
            other => Err(PackError::InvalidCount(i64::from(other))),
        }
    }
}

/// A seed point for [`MeshObstacle::contains_point`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckPoint {
    /// Side the point is on
    pub kind: CheckType,
    /// The point itself
    pub point: Vec3,
}

impl CheckPoint {
    /// Known interior point
    pub fn inside(point: Vec3) -> Self {
        Self { kind: CheckType::Inside, point }
    }

    /// Known exterior point
    pub fn outside(point: Vec3) -> Self {
        Self { kind: CheckType::Outside, point }
    }
}

/// A solid bounded by planar faces
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshObstacle {
    /// Bounding placement and mesh-wide pass-through flags
    pub base: ObstacleBase,
    /// Seed points for containment
    pub checks: Vec<CheckPoint>,
    /// Corner positions
    pub vertices: Vec<Vec3>,
    /// Vertex normals
    pub normals: Vec<Vec3>,
    /// Texture coordinates
    pub texcoords: Vec<Vec2>,
    /// Validated faces
    pub faces: Vec<MeshFace>,
    /// Faces are not merged into render clusters
    pub no_clusters: bool,
    /// Bounces use interpolated normals
    pub smooth_bounce: bool,
    inverted: bool,
}

impl MeshObstacle {
    /// Mesh whose points are placed by `xform`
    ///
    /// Faces are added afterwards with [`add_face`](Self::add_face) and the
    /// bounds computed by [`finalize`](Self::finalize). Mesh-wide flags
    /// should be set before faces are added, since each face inherits them.
    pub fn new(
        xform: &MeshTransform,
        checks: Vec<CheckPoint>,
        vertices: Vec<Vec3>,
        normals: Vec<Vec3>,
        texcoords: Vec<Vec2>,
    ) -> Self {
        let tool = MeshTransformTool::new(xform);
        let checks = checks
            .into_iter()
            .map(|c| CheckPoint { kind: c.kind, point: tool.vertex(c.point) })
            .collect();
        Self {
            checks,
            vertices: vertices.into_iter().map(|v| tool.vertex(v)).collect(),
            normals: normals.into_iter().map(|n| tool.normal(n)).collect(),
            texcoords,
            inverted: tool.is_inverted(),
            ..Self::default()
        }
    }

    /// The transform mirrored the mesh, so rings are stored reversed
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Add a face, inheriting the mesh-wide flags
    ///
    /// A ring that is not planar or not convex is split into triangles when
    /// `triangulate` is set and rejected otherwise.
    pub fn add_face(&mut self, mut def: FaceDef, triangulate: bool) -> Result<(), FaceError> {
        if let Err(err) = def.validate(
            self.vertices.len(),
            self.normals.len(),
            self.texcoords.len(),
        ) {
            debug!("mesh face rejected: {err}");
            return Err(err);
        }
        if self.inverted {
            def.reverse();
        }
        def.no_clusters |= self.no_clusters;
        def.smooth_bounce |= self.smooth_bounce;
        def.drive_through |= self.base.is_drive_through();
        def.shoot_through |= self.base.is_shoot_through();
        def.ricochet |= self.base.ricochet;

        match MeshFace::new(def.clone(), &self.vertices) {
            Ok(face) => {
                self.faces.push(face);
                Ok(())
            }
            Err(FaceError::NonPlanar | FaceError::NonConvex) if triangulate => {
                let before = self.faces.len();
                for tri in mesh_face::triangulate(&def, &self.vertices) {
                    // slivers from nearly collinear corners are skipped
                    if let Ok(face) = MeshFace::new(tri, &self.vertices) {
                        self.faces.push(face);
                    }
                }
                if self.faces.len() == before {
                    debug!("mesh face could not be triangulated");
                    return Err(FaceError::Degenerate);
                }
                Ok(())
            }
            Err(err) => {
                debug!("mesh face rejected: {err}");
                Err(err)
            }
        }
    }

    /// Compute bounds and the legacy placement from the faces
    pub fn finalize(&mut self) {
        let mut extents = Extents::empty();
        for face in &self.faces {
            extents.expand_to_box(face.extents());
        }
        let b = &mut self.base;
        if extents.is_empty() {
            b.extents = extents;
            return;
        }
        b.pos = Vec3::new(
            (extents.maxs.x + extents.mins.x) * 0.5,
            (extents.maxs.y + extents.mins.y) * 0.5,
            extents.mins.z,
        );
        b.size = Vec3::new(
            (extents.maxs.x - extents.mins.x) * 0.5,
            (extents.maxs.y - extents.mins.y) * 0.5,
            extents.maxs.z - extents.mins.z,
        );
        b.angle = 0.0;
        b.z_flip = false;
        b.extents = extents;
    }

    /// Has faces and every vertex is finite and in range
    pub fn is_valid(&self) -> bool {
        !self.faces.is_empty()
            && self
                .vertices
                .iter()
                .flat_map(|v| v.iter())
                .all(|c| c.is_finite() && c.abs() <= MAX_EXTENT)
    }

    fn segment_crosses_face(&self, from: Vec3, to: Vec3) -> bool {
        let ray = Ray::segment(from, to);
        self.faces.iter().any(|f| {
            let t = f.intersect(&ray);
            t > 0.0 && t <= 1.0
        })
    }

    /// Point is inside the solid according to the check points
    ///
    /// A mesh without check points contains nothing.
    pub fn contains_point(&self, p: Vec3) -> bool {
        if self.checks.is_empty() {
            return false;
        }
        let mut has_outsides = false;
        for check in &self.checks {
            match check.kind {
                CheckType::Inside => {
                    if !self.segment_crosses_face(p, check.point) {
                        return true;
                    }
                }
                CheckType::Outside => {
                    has_outsides = true;
                    if !self.segment_crosses_face(check.point, p) {
                        return false;
                    }
                }
            }
        }
        has_outsides
    }

    /// Nearest front-face hit over all faces, `-1` on a miss
    pub fn intersect(&self, ray: &Ray) -> f32 {
        self.faces
            .iter()
            .map(|f| f.intersect(ray))
            .filter(|&t| t >= 0.0)
            .fold(-1.0, |best, t| if best < 0.0 || t < best { t } else { best })
    }

    /// Direction from the middle of the bounds, never pointing down
    pub fn get_normal(&self, p: Vec3) -> Vec3 {
        let b = &self.base;
        let center = Vec3::new(b.pos.x, b.pos.y, b.pos.z + 0.5 * b.size.z);
        let mut n = p - center;
        if n.z < 0.0 {
            n.z = 0.0;
        }
        n.try_normalize(f32::EPSILON).unwrap_or_else(Vec3::z)
    }

    fn nearest_face(&self, p: Vec3) -> Option<&MeshFace> {
        self.faces
            .iter()
            .map(|f| (f.distance_to(p), f))
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, f)| f)
    }

    /// Normal of the face nearest to `p`
    pub fn get_3d_normal(&self, p: Vec3) -> Vec3 {
        self.nearest_face(p).map_or_else(|| self.get_normal(p), MeshFace::normal)
    }

    /// First face touching the footprint at `p`, in the footprint's frame
    fn touching_face(
        &self,
        p: Vec3,
        angle: f32,
        dx: f32,
        dy: f32,
        height: f32,
    ) -> Option<&MeshFace> {
        let bounds = Extents::from_rotated_box(p, angle, Vec3::new(dx, dy, height));
        let local_box = Extents::new(Vec3::new(-dx, -dy, 0.0), Vec3::new(dx, dy, height));
        let (s, c) = (-angle).sin_cos();
        let rotate = |v: Vec3| Vec3::new(c * v.x - s * v.y, s * v.x + c * v.y, v.z);
        self.faces.iter().filter(|f| f.extents().touches(&bounds)).find(|f| {
            let points: Vec<Vec3> = f.points().iter().map(|v| rotate(v - p)).collect();
            let n = rotate(f.normal());
            let local_plane = Vec4::new(n.x, n.y, n.z, -n.dot(&points[0]));
            intersect::test_polygon_in_axis_box(&points, &local_plane, &local_box)
        })
    }

    /// Overlap with a tank footprint: touching a face or fully inside
    pub fn in_box(&self, p: Vec3, angle: f32, dx: f32, dy: f32, height: f32) -> bool {
        let bounds = Extents::from_rotated_box(p, angle, Vec3::new(dx, dy, height));
        if !self.base.extents.touches(&bounds) {
            return false;
        }
        self.touching_face(p, angle, dx, dy, height).is_some()
            || self.contains_point(p + Vec3::new(0.0, 0.0, 0.5 * height))
    }

    /// [`in_box`](Self::in_box) with a square footprint of half size `radius`
    pub fn in_cylinder(&self, p: Vec3, radius: f32, height: f32) -> bool {
        self.in_box(p, 0.0, radius, radius, height)
    }

    /// The footprint at its new pose, stretched over the vertical motion
    pub fn in_moving_box(
        &self,
        old_p: Vec3,
        _old_angle: f32,
        p: Vec3,
        angle: f32,
        dx: f32,
        dy: f32,
        height: f32,
    ) -> bool {
        let low = Vec3::new(p.x, p.y, old_p.z.min(p.z));
        let stretched = height + (p.z - old_p.z).abs();
        self.in_box(low, angle, dx, dy, stretched)
    }

    /// Plane of the face a footprint touches
    pub fn is_crossing(&self, p: Vec3, angle: f32, dx: f32, dy: f32, height: f32) -> Option<Vec4> {
        self.touching_face(p, angle, dx, dy, height).map(|f| *f.plane())
    }

    /// First face crossed by the moving footprint's center
    ///
    /// Falls back to [`get_normal`](Self::get_normal) at the end pose when
    /// the footprint overlaps the mesh there without its center crossing a
    /// face.
    pub fn get_hit_normal(
        &self,
        pos1: Vec3,
        _azimuth1: f32,
        pos2: Vec3,
        azimuth2: f32,
        dx: f32,
        dy: f32,
        height: f32,
    ) -> Option<HitNormal> {
        let ray = Ray::segment(pos1, pos2);
        let crossing = self
            .faces
            .iter()
            .map(|f| (f.intersect(&ray), f))
            .filter(|(t, _)| (0.0..=1.0).contains(t))
            .min_by(|a, b| a.0.total_cmp(&b.0));
        if let Some((time, face)) = crossing {
            return Some(HitNormal { time, normal: face.normal() });
        }
        self.in_box(pos2, azimuth2, dx, dy, height)
            .then(|| HitNormal { time: 0.0, normal: self.get_normal(pos2) })
    }

    /// Copy with every point placed by `xform`
    ///
    /// Faces are re-added in their stored order; a mirroring transform
    /// reverses them again.
    pub fn copy_with_transform(&self, xform: &MeshTransform) -> Self {
        let mut copy = Self::new(
            xform,
            self.checks.clone(),
            self.vertices.clone(),
            self.normals.clone(),
            self.texcoords.clone(),
        );
        copy.base.drive_through = self.base.drive_through;
        copy.base.shoot_through = self.base.shoot_through;
        copy.base.ricochet = self.base.ricochet;
        copy.base.source = self.base.source;
        copy.base.name.clone_from(&self.base.name);
        copy.no_clusters = self.no_clusters;
        copy.smooth_bounce = self.smooth_bounce;
        for face in &self.faces {
            if let Err(err) = copy.add_face(face.def.clone(), true) {
                debug!("face lost in transformed mesh copy: {err}");
            }
        }
        copy.finalize();
        copy
    }

    fn state_bits(&self) -> u8 {
        let mut state = 0;
        if self.base.is_drive_through() {
            state |= MESH_DRIVE_THRU;
        }
        if self.base.is_shoot_through() {
            state |= MESH_SHOOT_THRU;
        }
        if self.smooth_bounce {
            state |= MESH_SMOOTH_BOUNCE;
        }
        if self.no_clusters {
            state |= MESH_NO_CLUSTERS;
        }
        if self.base.ricochet {
            state |= MESH_RICOCHET;
        }
        state
    }

    /// World-file block
    pub fn print(
        &self,
        out: &mut impl Write,
        indent: &str,
        materials: &MaterialManager,
    ) -> fmt::Result {
        let e = &self.base.extents;
        writeln!(out, "{indent}mesh")?;
        writeln!(out, "{indent}# faces = {}", self.faces.len())?;
        writeln!(out, "{indent}# checks = {}", self.checks.len())?;
        writeln!(out, "{indent}# vertices = {}", self.vertices.len())?;
        writeln!(out, "{indent}# normals = {}", self.normals.len())?;
        writeln!(out, "{indent}# texcoords = {}", self.texcoords.len())?;
        writeln!(out, "{indent}# mins = {} {} {}", e.mins.x, e.mins.y, e.mins.z)?;
        writeln!(out, "{indent}# maxs = {} {} {}", e.maxs.x, e.maxs.y, e.maxs.z)?;
        if !self.base.name.is_empty() {
            writeln!(out, "{indent}  name {}", self.base.name)?;
        }
        if self.no_clusters {
            writeln!(out, "{indent}  noclusters")?;
        }
        if self.smooth_bounce {
            writeln!(out, "{indent}  smoothbounce")?;
        }
        self.base.print_flags(out, indent)?;

        for check in &self.checks {
            let keyword = match check.kind {
                CheckType::Inside => "inside",
                CheckType::Outside => "outside",
            };
            let p = check.point;
            writeln!(out, "{indent}  {keyword} {:.8} {:.8} {:.8}", p.x, p.y, p.z)?;
        }
        for v in &self.vertices {
            writeln!(out, "{indent}  vertex {:.8} {:.8} {:.8}", v.x, v.y, v.z)?;
        }
        for n in &self.normals {
            writeln!(out, "{indent}  normal {:.8} {:.8} {:.8}", n.x, n.y, n.z)?;
        }
        for t in &self.texcoords {
            writeln!(out, "{indent}  texcoord {:.8} {:.8}", t.x, t.y)?;
        }
        for face in &self.faces {
            face.print(out, indent, materials)?;
        }
        writeln!(out, "{indent}end")?;
        writeln!(out)
    }

    /// OBJ object block; faces switch material only when it changes
    pub fn print_obj(
        &self,
        out: &mut impl Write,
        counter: &mut ObjCounter,
        materials: &MaterialManager,
    ) -> fmt::Result {
        writeln!(out, "# OBJ - start mesh")?;
        writeln!(out, "o bzmesh_{}", counter.next())?;
        for v in &self.vertices {
            obj::write_vertex(out, v)?;
        }
        for t in &self.texcoords {
            obj::write_texcoord(out, t)?;
        }
        for n in &self.normals {
            obj::write_normal(out, n)?;
        }

        let back = |index: usize, len: usize| index as i64 - len as i64;
        let mut current = None;
        for face in &self.faces {
            let label = materials.obj_label(face.def.material);
            if current.as_ref() != Some(&label) {
                writeln!(out, "usemtl {label}")?;
                current = Some(label);
            }
            let d = &face.def;
            let corners: Vec<(i64, i64, i64)> = (0..d.vertices.len())
                .map(|i| {
                    (
                        back(d.vertices[i], self.vertices.len()),
                        d.texcoords.get(i).map_or(0, |&t| back(t, self.texcoords.len())),
                        d.normals.get(i).map_or(0, |&n| back(n, self.normals.len())),
                    )
                })
                .collect();
            obj::write_face(out, &corners)?;
        }
        writeln!(out)
    }
}

impl Packable for MeshObstacle {
    fn pack(&self, buf: &mut PackBuffer) {
        buf.pack_count_i32(self.checks.len());
        for check in &self.checks {
            buf.pack_u8(check.kind as u8);
            buf.pack_vec3(&check.point);
        }
        buf.pack_count_i32(self.vertices.len());
        for v in &self.vertices {
            buf.pack_vec3(v);
        }
        buf.pack_count_i32(self.normals.len());
        for n in &self.normals {
            buf.pack_vec3(n);
        }
        buf.pack_count_i32(self.texcoords.len());
        for t in &self.texcoords {
            buf.pack_f32(t.x);
            buf.pack_f32(t.y);
        }
        buf.pack_count_i32(self.faces.len());
        for face in &self.faces {
            face.pack(buf);
        }
        buf.pack_u8(self.state_bits());
    }

    fn pack_size(&self) -> usize {
        5 * 4
            + self.checks.len() * 13
            + self.vertices.len() * 12
            + self.normals.len() * 12
            + self.texcoords.len() * 8
            + self.faces.iter().map(MeshFace::pack_size).sum::<usize>()
            + 1
    }

    fn unpack(buf: &mut UnpackBuffer<'_>) -> Result<Self, PackError> {
        let mut mesh = Self::default();
        for _ in 0..buf.unpack_count_i32()? {
            let kind = CheckType::try_from(buf.unpack_u8()?)?;
            mesh.checks.push(CheckPoint { kind, point: buf.unpack_vec3()? });
        }
        for _ in 0..buf.unpack_count_i32()? {
            mesh.vertices.push(buf.unpack_vec3()?);
        }
        for _ in 0..buf.unpack_count_i32()? {
            mesh.normals.push(buf.unpack_vec3()?);
        }
        for _ in 0..buf.unpack_count_i32()? {
            let u = buf.unpack_f32()?;
            mesh.texcoords.push(Vec2::new(u, buf.unpack_f32()?));
        }
        for _ in 0..buf.unpack_count_i32()? {
            let face = MeshFace::unpack(
                buf,
                &mesh.vertices,
                mesh.normals.len(),
                mesh.texcoords.len(),
            )?;
            mesh.faces.push(face);
        }
        let state = buf.unpack_u8()?;
        mesh.base.drive_through = if state & MESH_DRIVE_THRU != 0 { 0xFF } else { 0 };
        mesh.base.shoot_through = if state & MESH_SHOOT_THRU != 0 { 0xFF } else { 0 };
        mesh.base.ricochet = state & MESH_RICOCHET != 0;
        mesh.smooth_bounce = state & MESH_SMOOTH_BOUNCE != 0;
        mesh.no_clusters = state & MESH_NO_CLUSTERS != 0;
        mesh.finalize();
        Ok(mesh)
    }
}

/// Axis-aligned cube `[-h, h]³` around `center`, faces wound outward
#[cfg(test)]
pub(crate) fn test_cube(center: Vec3, h: f32) -> MeshObstacle {
    let mut vertices = Vec::new();
    for z in [-h, h] {
        for (x, y) in [(-h, -h), (h, -h), (h, h), (-h, h)] {
            vertices.push(center + Vec3::new(x, y, z));
        }
    }
    let mut mesh = MeshObstacle::new(
        &MeshTransform::new(),
        vec![CheckPoint::inside(center)],
        vertices,
        Vec::new(),
        Vec::new(),
    );
    for ring in [
        [4, 5, 6, 7],
        [0, 3, 2, 1],
        [0, 1, 5, 4],
        [1, 2, 6, 5],
        [2, 3, 7, 6],
        [3, 0, 4, 7],
    ] {
        mesh.add_face(FaceDef::new(ring.to_vec()), false).unwrap();
    }
    mesh.finalize();
    mesh
}
