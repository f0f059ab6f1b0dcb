//! Shapes that are stored as parameters and collide through a generated mesh
//!
//! Arcs, cones, spheres and tetrahedrons keep their authoring parameters so
//! they can be printed, packed and re-transformed, but every geometric query
//! is answered by the [`MeshObstacle`] they tessellate into. That mesh is
//! built once by `finalize` and also inserted into the world on its own,
//! tagged as coming from a container.

use std::fmt::{self, Write};

use log::debug;

use super::common::{ObstacleBase, ObstacleSource};
use super::hit_normal::HitNormal;
use super::mesh::{CheckPoint, MeshObstacle};
use super::mesh_face::FaceDef;
use crate::foundation::math::{constants::{PI, TAU}, utils, Vec2, Vec3, Vec4};
use crate::geometry::{Extents, Ray};
use crate::material::{MaterialManager, MaterialRef};
use crate::transform::MeshTransform;

/// Smallest size, texture size or radius difference a container accepts
pub(crate) const MIN_SIZE: f32 = 1.0e-6;

pub(crate) const CONTAINER_DRIVE_THRU: u8 = 1 << 0;
pub(crate) const CONTAINER_SHOOT_THRU: u8 = 1 << 1;
pub(crate) const CONTAINER_SMOOTH_BOUNCE: u8 = 1 << 2;
pub(crate) const CONTAINER_NORMALS: u8 = 1 << 3;

/// State byte of a container; the ricochet bit differs per shape
pub(crate) fn state_bits(
    base: &ObstacleBase,
    smooth_bounce: bool,
    use_normals: bool,
    ricochet_bit: u8,
) -> u8 {
    let mut state = 0;
    if base.is_drive_through() {
        state |= CONTAINER_DRIVE_THRU;
    }
    if base.is_shoot_through() {
        state |= CONTAINER_SHOOT_THRU;
    }
    if smooth_bounce {
        state |= CONTAINER_SMOOTH_BOUNCE;
    }
    if use_normals {
        state |= CONTAINER_NORMALS;
    }
    if base.ricochet {
        state |= ricochet_bit;
    }
    state
}

/// Restore the pass-through flags; returns `(smooth_bounce, use_normals)`
pub(crate) fn apply_state_bits(
    state: u8,
    base: &mut ObstacleBase,
    ricochet_bit: u8,
) -> (bool, bool) {
    base.drive_through = if state & CONTAINER_DRIVE_THRU != 0 { 0xFF } else { 0 };
    base.shoot_through = if state & CONTAINER_SHOOT_THRU != 0 { 0xFF } else { 0 };
    base.ricochet = state & ricochet_bit != 0;
    (state & CONTAINER_SMOOTH_BOUNCE != 0, state & CONTAINER_NORMALS != 0)
}

/// Perimeter of an ellipse with semi-axes `a` and `b` (Ramanujan)
pub(crate) fn ellipse_circumference(a: f32, b: f32) -> f32 {
    PI * (3.0 * (a + b) - ((a + 3.0 * b) * (b + 3.0 * a)).sqrt())
}

/// Resolve an around-the-edge texture size
///
/// Negative sizes ask for a repeat distance; the repeat count is made whole
/// so the texture meets itself where a closed shape wraps.
pub(crate) fn wrap_texsize(texsize: f32, circumference: f32) -> f32 {
    if texsize < 0.0 {
        -(circumference / texsize).floor()
    } else {
        texsize
    }
}

/// Resolve a texture size along a straight run of `length`
pub(crate) fn span_texsize(texsize: f32, length: f32) -> f32 {
    if texsize < 0.0 {
        -(length / texsize)
    } else {
        texsize
    }
}

/// Angular range of an arc or cone after normalization
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Sweep {
    /// Start angle, radians
    pub start: f32,
    /// Positive sweep, radians
    pub angle: f32,
    /// The sweep closes on itself
    pub is_circle: bool,
}

impl Sweep {
    /// Normalize a sweep in degrees starting at `rotation` radians
    ///
    /// Negative sweeps run backwards from the rotation. Returns `None` when
    /// `divisions` is too small to approximate the sweep (fewer than one
    /// division per half turn).
    pub fn new(rotation: f32, sweep_degrees: f32, divisions: i32) -> Option<Self> {
        let mut start = rotation;
        let mut angle = utils::deg_to_rad(sweep_degrees.clamp(-360.0, 360.0));
        if angle < 0.0 {
            start += angle;
            angle = -angle;
        }
        #[allow(clippy::cast_possible_truncation)]
        let min_divisions = ((angle + MIN_SIZE) / PI) as i32;
        if divisions <= min_divisions {
            return None;
        }
        let is_circle = (PI - utils::fmod(angle + PI, TAU)).abs() < MIN_SIZE;
        Some(Self { start, angle, is_circle })
    }

    /// Angle of ring position `i` out of `divisions`
    pub fn at(&self, i: usize, divisions: usize) -> f32 {
        self.start + self.angle * i as f32 / divisions as f32
    }
}

/// Accumulates points and faces for a container's mesh
#[derive(Debug, Default)]
pub(crate) struct MeshBuilder {
    pub checks: Vec<CheckPoint>,
    pub vertices: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub texcoords: Vec<Vec2>,
    faces: Vec<FaceDef>,
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex(&mut self, v: Vec3) -> usize {
        self.vertices.push(v);
        self.vertices.len() - 1
    }

    pub fn normal(&mut self, n: Vec3) -> usize {
        self.normals.push(n);
        self.normals.len() - 1
    }

    pub fn texcoord(&mut self, t: Vec2) -> usize {
        self.texcoords.push(t);
        self.texcoords.len() - 1
    }

    /// Queue a face; `normals` may be empty
    pub fn face(
        &mut self,
        vertices: Vec<usize>,
        normals: Vec<usize>,
        texcoords: Vec<usize>,
        material: MaterialRef,
    ) {
        self.faces.push(FaceDef {
            vertices,
            normals,
            texcoords,
            material,
            ..FaceDef::new(Vec::new())
        });
    }

    /// Place the points with `xform` and assemble the mesh
    ///
    /// Faces inherit the container's pass-through flags and physics driver.
    /// Faces that do not survive validation are dropped; `None` when the
    /// result is not a valid mesh.
    pub fn build(
        self,
        xform: &MeshTransform,
        base: &ObstacleBase,
        phydrv: i32,
        smooth_bounce: bool,
    ) -> Option<MeshObstacle> {
        let mut mesh = MeshObstacle::new(
            xform,
            self.checks,
            self.vertices,
            self.normals,
            self.texcoords,
        );
        mesh.base.drive_through = base.drive_through;
        mesh.base.shoot_through = base.shoot_through;
        mesh.base.ricochet = base.ricochet;
        mesh.base.source = base.source | ObstacleSource::CONTAINER;
        mesh.smooth_bounce = smooth_bounce;
        for mut def in self.faces {
            def.phydrv = phydrv;
            if let Err(err) = mesh.add_face(def, false) {
                debug!("container face dropped: {err}");
            }
        }
        mesh.finalize();
        if mesh.is_valid() {
            Some(mesh)
        } else {
            debug!("container produced no valid mesh");
            None
        }
    }
}

/// Geometric queries answered by a container's generated mesh
///
/// Every method falls back to a miss, logged at debug level, when the
/// container's parameters did not produce a mesh.
pub trait MeshContainer {
    /// World-file keyword of the shape
    const KEYWORD: &'static str;

    /// The generated mesh, if the parameters describe a valid shape
    fn mesh(&self) -> Option<&MeshObstacle>;

    /// A mesh was generated
    fn is_valid(&self) -> bool {
        self.mesh().is_some_and(MeshObstacle::is_valid)
    }

    /// Bounds of the generated mesh, empty without one
    fn mesh_extents(&self) -> Extents {
        self.mesh().map_or_else(Extents::empty, |m| m.base.extents)
    }

    /// Time the ray meets the mesh, `-1` on a miss
    fn intersect(&self, ray: &Ray) -> f32 {
        self.mesh().map_or_else(
            || {
                debug!("{} without a mesh cannot be intersected", Self::KEYWORD);
                -1.0
            },
            |m| m.intersect(ray),
        )
    }

    /// Ground-plane normal nearest `p`
    fn get_normal(&self, p: Vec3) -> Vec3 {
        self.mesh().map_or_else(Vec3::z, |m| m.get_normal(p))
    }

    /// Surface normal nearest `p`
    fn get_3d_normal(&self, p: Vec3) -> Vec3 {
        self.mesh().map_or_else(Vec3::z, |m| m.get_3d_normal(p))
    }

    /// Overlap with an upright cylinder
    fn in_cylinder(&self, p: Vec3, radius: f32, height: f32) -> bool {
        self.mesh().is_some_and(|m| m.in_cylinder(p, radius, height))
    }

    /// Overlap with a tank footprint
    fn in_box(&self, p: Vec3, angle: f32, dx: f32, dy: f32, height: f32) -> bool {
        self.mesh().is_some_and(|m| m.in_box(p, angle, dx, dy, height))
    }

    /// Overlap anywhere along a move
    fn in_moving_box(
        &self,
        old_p: Vec3,
        old_angle: f32,
        p: Vec3,
        angle: f32,
        dx: f32,
        dy: f32,
        height: f32,
    ) -> bool {
        self.mesh()
            .is_some_and(|m| m.in_moving_box(old_p, old_angle, p, angle, dx, dy, height))
    }

    /// Plane of the face a footprint straddles
    fn is_crossing(&self, p: Vec3, angle: f32, dx: f32, dy: f32, height: f32) -> Option<Vec4> {
        self.mesh().and_then(|m| m.is_crossing(p, angle, dx, dy, height))
    }

    /// Earliest contact of a moving footprint
    fn get_hit_normal(
        &self,
        pos1: Vec3,
        azimuth1: f32,
        pos2: Vec3,
        azimuth2: f32,
        dx: f32,
        dy: f32,
        height: f32,
    ) -> Option<HitNormal> {
        self.mesh()
            .and_then(|m| m.get_hit_normal(pos1, azimuth1, pos2, azimuth2, dx, dy, height))
    }
}

/// Lines shared by every container's world-file block
pub(crate) fn print_tail(
    out: &mut impl Write,
    indent: &str,
    base: &ObstacleBase,
    transform: &MeshTransform,
    slots: &[(&str, MaterialRef)],
    materials: &MaterialManager,
    phydrv: i32,
    smooth_bounce: bool,
    use_normals: bool,
) -> fmt::Result {
    transform.print_ops(out, indent)?;
    for (slot, material) in slots {
        write!(out, "{indent}  {slot} matref ")?;
        materials.print_reference(out, *material)?;
        writeln!(out)?;
    }
    if phydrv >= 0 {
        writeln!(out, "{indent}  phydrv {phydrv}")?;
    }
    if smooth_bounce {
        writeln!(out, "{indent}  smoothbounce")?;
    }
    base.print_flags(out, indent)?;
    if !use_normals {
        writeln!(out, "{indent}  flatshading")?;
    }
    writeln!(out, "{indent}end")?;
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_circle_circumference() {
        assert_relative_eq!(ellipse_circumference(1.0, 1.0), TAU, epsilon = 1e-5);
    }

    #[test]
    fn test_negative_texsize_is_repeat_distance() {
        assert_eq!(wrap_texsize(-2.0, 9.0), 5.0);
        assert_eq!(wrap_texsize(3.0, 9.0), 3.0);
        assert_eq!(span_texsize(-2.0, 5.0), 2.5);
    }

    #[test]
    fn test_sweep_normalization() {
        let s = Sweep::new(0.5, -90.0, 4).unwrap();
        assert_relative_eq!(s.start, 0.5 - PI * 0.5, epsilon = 1e-6);
        assert_relative_eq!(s.angle, PI * 0.5, epsilon = 1e-6);
        assert!(!s.is_circle);

        let full = Sweep::new(0.0, 720.0, 8).unwrap();
        assert!(full.is_circle);
        assert_relative_eq!(full.angle, TAU, epsilon = 1e-6);
    }

    #[test]
    fn test_build_skips_bad_faces() {
        let mut b = MeshBuilder::new();
        let v: Vec<usize> = [Vec3::zeros(), Vec3::x(), Vec3::y(), Vec3::z()]
            .into_iter()
            .map(|p| b.vertex(p))
            .collect();
        b.face(vec![v[0], v[2], v[1]], Vec::new(), Vec::new(), None);
        b.face(vec![v[0], v[1], v[3]], Vec::new(), Vec::new(), None);
        // refers past the vertex list
        b.face(vec![v[0], v[1], 9], Vec::new(), Vec::new(), None);
        let mesh = b
            .build(&MeshTransform::default(), &ObstacleBase::default(), -1, false)
            .unwrap();
        assert_eq!(mesh.faces.len(), 2);
        assert!(mesh.base.source.contains(ObstacleSource::CONTAINER));
    }

    #[test]
    fn test_too_few_divisions() {
        // a full turn needs more than two
        assert!(Sweep::new(0.0, 360.0, 2).is_none());
        assert!(Sweep::new(0.0, 360.0, 3).is_some());
        assert!(Sweep::new(0.0, 90.0, 0).is_none());
        assert!(Sweep::new(0.0, 90.0, 1).is_some());
    }
}
