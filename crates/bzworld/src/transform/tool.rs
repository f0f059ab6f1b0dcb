//! Flattened transform matrices

use nalgebra::{Rotation3, Unit};

use crate::foundation::math::{Mat3, Mat4, Vec3};
use super::{MeshTransform, TransformOp};

/// Legacy position/size/rotation after a transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OldStyle {
    /// Anchor position (bottom center, or top center when flipped)
    pub pos: Vec3,
    /// Half-width, half-breadth, height
    pub size: Vec3,
    /// Rotation about z, radians
    pub angle: f32,
    /// The transformed z axis points down
    pub flip_z: bool,
}

/// Matrices for applying a [`MeshTransform`]
#[derive(Debug, Clone)]
pub struct MeshTransformTool {
    vertex_matrix: Mat4,
    normal_matrix: Mat3,
    empty: bool,
    inverted: bool,
    skewed: bool,
}

impl MeshTransformTool {
    /// Compose the operations of `xform` in order
    pub fn new(xform: &MeshTransform) -> Self {
        let mut tool = Self {
            vertex_matrix: Mat4::identity(),
            normal_matrix: Mat3::identity(),
            empty: xform.is_empty(),
            inverted: false,
            skewed: false,
        };
        if tool.empty {
            return tool;
        }

        for op in xform.ops() {
            let step = match *op {
                TransformOp::Shift(p) => Mat4::new_translation(&p),
                TransformOp::Scale(p) => {
                    tool.skewed = true;
                    Mat4::new_nonuniform_scaling(&p)
                }
                TransformOp::Shear(p) => {
                    tool.skewed = true;
                    Mat4::new(
                        1.0, 0.0, p.x, 0.0,
                        0.0, 1.0, p.y, 0.0,
                        p.z, 0.0, 1.0, 0.0,
                        0.0, 0.0, 0.0, 1.0,
                    )
                }
                TransformOp::Spin { angle, axis } => {
                    if axis.norm_squared() <= 0.0 {
                        continue;
                    }
                    Rotation3::from_axis_angle(&Unit::new_normalize(axis), angle).to_homogeneous()
                }
                TransformOp::Xform { origin, x_axis, y_axis, z_axis } => {
                    tool.skewed = true;
                    Mat4::new(
                        x_axis.x, y_axis.x, z_axis.x, origin.x,
                        x_axis.y, y_axis.y, z_axis.y, origin.y,
                        x_axis.z, y_axis.z, z_axis.z, origin.z,
                        0.0, 0.0, 0.0, 1.0,
                    )
                }
            };
            tool.vertex_matrix = step * tool.vertex_matrix;
        }

        let linear: Mat3 = tool.vertex_matrix.fixed_view::<3, 3>(0, 0).into_owned();
        tool.normal_matrix = cofactor(&linear);
        tool.inverted = linear.determinant() < 0.0;
        tool
    }

    /// No operations; every method is the identity
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    /// The transform mirrors (negative determinant), so face winding must
    /// be reversed to keep normals outward
    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Contains a scale, shear or basis change
    pub fn is_skewed(&self) -> bool {
        self.skewed
    }

    /// Linear part
    pub fn linear(&self) -> Mat3 {
        self.vertex_matrix.fixed_view::<3, 3>(0, 0).into_owned()
    }

    /// Transform a point
    pub fn vertex(&self, v: Vec3) -> Vec3 {
        if self.empty {
            return v;
        }
        self.vertex_matrix.transform_point(&v.into()).coords
    }

    /// Transform a direction (no translation)
    pub fn direction(&self, v: Vec3) -> Vec3 {
        if self.empty {
            return v;
        }
        self.linear() * v
    }

    /// Transform a unit normal so it stays perpendicular to transformed
    /// surfaces and outward under mirroring
    pub fn normal(&self, n: Vec3) -> Vec3 {
        if self.empty {
            return n;
        }
        let t = self.normal_matrix * n;
        let len_sq = t.norm_squared();
        let unit = if len_sq > 0.0 { t / len_sq.sqrt() } else { Vec3::z() };
        if self.inverted { -unit } else { unit }
    }

    /// Transform a legacy z-rotated prism
    pub fn old_style(&self, pos: Vec3, size: Vec3, angle: f32) -> OldStyle {
        if self.empty {
            return OldStyle { pos, size, angle, flip_z: false };
        }

        let mut pos = self.vertex(pos);
        let (s, c) = angle.sin_cos();
        let linear = self.linear();
        let x = linear * Vec3::new(c, s, 0.0);
        let y = linear * Vec3::new(-s, c, 0.0);
        let z = linear.column(2).into_owned();
        let size = Vec3::new(size.x * x.norm(), size.y * y.norm(), size.z * z.norm());
        let angle = x.y.atan2(x.x);

        let flip_z = z.z < 0.0;
        if flip_z {
            pos.z -= size.z;
        }
        OldStyle { pos, size, angle, flip_z }
    }
}

/// Cofactor matrix; equals `det(m) * inverse(m)^T`, defined for singular m
fn cofactor(m: &Mat3) -> Mat3 {
    let r0 = m.row(0).transpose();
    let r1 = m.row(1).transpose();
    let r2 = m.row(2).transpose();
    let c0 = r1.cross(&r2);
    let c1 = r2.cross(&r0);
    let c2 = r0.cross(&r1);
    Mat3::from_rows(&[c0.transpose(), c1.transpose(), c2.transpose()])
}
