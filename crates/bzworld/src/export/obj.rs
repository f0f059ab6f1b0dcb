//! Wavefront OBJ records
//!
//! Faces use negative indices that count back from the most recent vertex,
//! texcoord or normal, so every object block is self-contained and blocks
//! can be concatenated in any order.

use std::fmt::{self, Write};

use crate::foundation::math::{Vec2, Vec3};
use crate::transform::{MeshTransform, MeshTransformTool};

/// Running object number for `o` records within one export pass
#[derive(Debug, Clone, Default)]
pub struct ObjCounter {
    count: u32,
}

impl ObjCounter {
    /// Start counting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Number the next object will get
    pub fn current(&self) -> u32 {
        self.count
    }

    /// Take a number for an object
    pub fn next(&mut self) -> u32 {
        let n = self.count;
        self.count += 1;
        n
    }

    /// Start a new export pass
    pub fn reset(&mut self) {
        self.count = 0;
    }
}

/// `v x y z`
pub fn write_vertex(out: &mut impl Write, v: &Vec3) -> fmt::Result {
    writeln!(out, "v {:.8} {:.8} {:.8}", v.x, v.y, v.z)
}

/// `vt u v`
pub fn write_texcoord(out: &mut impl Write, t: &Vec2) -> fmt::Result {
    writeln!(out, "vt {:.8} {:.8}", t.x, t.y)
}

/// `vn x y z`
pub fn write_normal(out: &mut impl Write, n: &Vec3) -> fmt::Result {
    writeln!(out, "vn {:.8} {:.8} {:.8}", n.x, n.y, n.z)
}

/// One `f` record; each corner is `(vertex, texcoord, normal)` as negative
/// back-references, `0` meaning absent
pub fn write_face(out: &mut impl Write, corners: &[(i64, i64, i64)]) -> fmt::Result {
    write!(out, "f")?;
    for &(v, t, n) in corners {
        match (t != 0, n != 0) {
            (true, true) => write!(out, " {v}/{t}/{n}")?,
            (false, true) => write!(out, " {v}//{n}")?,
            (true, false) => write!(out, " {v}/{t}")?,
            (false, false) => write!(out, " {v}")?,
        }
    }
    writeln!(out)
}

/// Unit cube corners, bottom ring then top ring
const CUBE: [(f32, f32, f32); 8] = [
    (-1.0, -1.0, 0.0),
    (1.0, -1.0, 0.0),
    (1.0, 1.0, 0.0),
    (-1.0, 1.0, 0.0),
    (-1.0, -1.0, 1.0),
    (1.0, -1.0, 1.0),
    (1.0, 1.0, 1.0),
    (-1.0, 1.0, 1.0),
];

/// Write a z-rotated prism as a closed block: `+z`, `-z` then the walls
pub fn write_prism(
    out: &mut impl Write,
    counter: &mut ObjCounter,
    label: &str,
    pos: Vec3,
    angle: f32,
    size: Vec3,
    top_material: &str,
    wall_material: &str,
) -> fmt::Result {
    let mut xform = MeshTransform::new();
    xform.add_scale(size);
    xform.add_spin(crate::foundation::math::utils::rad_to_deg(angle), Vec3::z());
    xform.add_shift(pos);
    let tool = MeshTransformTool::new(&xform);

    let k = 1.0 / 8.0;
    writeln!(out, "# OBJ - start {label}")?;
    writeln!(out, "o bz{label}_{}", counter.next())?;
    for (x, y, z) in CUBE {
        write_vertex(out, &tool.vertex(Vec3::new(x, y, z)))?;
    }
    for t in [
        Vec2::new(0.0, 0.0),
        Vec2::new(k * size.x, 0.0),
        Vec2::new(k * size.x, k * size.y),
        Vec2::new(0.0, k * size.y),
    ] {
        write_texcoord(out, &t)?;
    }
    let (s, c) = angle.sin_cos();
    let normals = [
        Vec3::z(),
        -Vec3::z(),
        Vec3::new(c, s, 0.0),
        Vec3::new(-s, c, 0.0),
        Vec3::new(-c, -s, 0.0),
        Vec3::new(s, -c, 0.0),
    ];
    for n in &normals {
        write_normal(out, n)?;
    }

    // vertex i of CUBE is -(8 - i)
    let v = |i: i64| i - 8;
    writeln!(out, "usemtl {top_material}")?;
    write_face(out, &[(v(4), -4, -6), (v(5), -3, -6), (v(6), -2, -6), (v(7), -1, -6)])?;
    write_face(out, &[(v(0), -4, -5), (v(3), -1, -5), (v(2), -2, -5), (v(1), -3, -5)])?;
    writeln!(out, "usemtl {wall_material}")?;
    write_face(out, &[(v(1), -4, -4), (v(2), -3, -4), (v(6), -2, -4), (v(5), -1, -4)])?;
    write_face(out, &[(v(2), -4, -3), (v(3), -3, -3), (v(7), -2, -3), (v(6), -1, -3)])?;
    write_face(out, &[(v(3), -4, -2), (v(0), -3, -2), (v(4), -2, -2), (v(7), -1, -2)])?;
    write_face(out, &[(v(0), -4, -1), (v(1), -3, -1), (v(5), -2, -1), (v(4), -1, -1)])?;
    writeln!(out)
}
