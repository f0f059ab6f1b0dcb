//! Mesh transforms
//!
//! A [`MeshTransform`] is an ordered list of affine operations. Group
//! instances carry one, and expansion composes them by prepending the
//! instance's operations to the parent's, so the innermost transform runs
//! first. [`MeshTransformTool`] flattens a transform into matrices that can
//! be applied to vertices, normals and legacy pos/size/rotation triples.

pub mod tool;

use std::fmt::{self, Write};

use crate::foundation::math::{utils, Vec3};
use crate::pack::{string_pack_size, PackBuffer, PackError, Packable, UnpackBuffer};

pub use tool::{MeshTransformTool, OldStyle};

const OP_SHIFT: u8 = 0;
const OP_SCALE: u8 = 1;
const OP_SHEAR: u8 = 2;
const OP_SPIN: u8 = 3;
const OP_XFORM: u8 = 4;

/// One affine operation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformOp {
    /// Translate
    Shift(Vec3),
    /// Per-axis scale (negative components mirror)
    Scale(Vec3),
    /// `x += s.x * z`, `y += s.y * z`, `z += s.z * x`
    Shear(Vec3),
    /// Rotate by `angle` radians about `axis` (right-handed)
    Spin {
        /// Rotation in radians
        angle: f32,
        /// Rotation axis, any non-zero length
        axis: Vec3,
    },
    /// Map the unit axes onto `x_axis`, `y_axis`, `z_axis` and the origin
    /// onto `origin`
    Xform {
        /// Image of the origin
        origin: Vec3,
        /// Image of +x
        x_axis: Vec3,
        /// Image of +y
        y_axis: Vec3,
        /// Image of +z
        z_axis: Vec3,
    },
}

impl TransformOp {
    fn type_code(&self) -> u8 {
        match self {
            Self::Shift(_) => OP_SHIFT,
            Self::Scale(_) => OP_SCALE,
            Self::Shear(_) => OP_SHEAR,
            Self::Spin { .. } => OP_SPIN,
            Self::Xform { .. } => OP_XFORM,
        }
    }

    fn pack_size(&self) -> usize {
        1 + match self {
            Self::Shift(_) | Self::Scale(_) | Self::Shear(_) => 12,
            Self::Spin { .. } => 16,
            Self::Xform { .. } => 48,
        }
    }

    fn pack(&self, buf: &mut PackBuffer) {
        buf.pack_u8(self.type_code());
        match self {
            Self::Shift(v) | Self::Scale(v) | Self::Shear(v) => buf.pack_vec3(v),
            Self::Spin { angle, axis } => {
                buf.pack_vec3(axis);
                buf.pack_f32(*angle);
            }
            Self::Xform { origin, x_axis, y_axis, z_axis } => {
                buf.pack_vec3(origin);
                buf.pack_vec3(x_axis);
                buf.pack_vec3(y_axis);
                buf.pack_vec3(z_axis);
            }
        }
    }

    fn unpack(buf: &mut UnpackBuffer<'_>) -> Result<Self, PackError> {
        let code = buf.unpack_u8()?;
        Ok(match code {
            OP_SHIFT => Self::Shift(buf.unpack_vec3()?),
            OP_SCALE => Self::Scale(buf.unpack_vec3()?),
            OP_SHEAR => Self::Shear(buf.unpack_vec3()?),
            OP_SPIN => {
                let axis = buf.unpack_vec3()?;
                let angle = buf.unpack_f32()?;
                Self::Spin { angle, axis }
            }
            OP_XFORM => Self::Xform {
                origin: buf.unpack_vec3()?,
                x_axis: buf.unpack_vec3()?,
                y_axis: buf.unpack_vec3()?,
                z_axis: buf.unpack_vec3()?,
            },
            other => return Err(PackError::UnknownTransformOp(other)),
        })
    }

    fn print(&self, out: &mut impl Write, indent: &str) -> fmt::Result {
        match self {
            Self::Shift(v) => writeln!(out, "{indent}  shift {} {} {}", v.x, v.y, v.z),
            Self::Scale(v) => writeln!(out, "{indent}  scale {} {} {}", v.x, v.y, v.z),
            Self::Shear(v) => writeln!(out, "{indent}  shear {} {} {}", v.x, v.y, v.z),
            Self::Spin { angle, axis } => writeln!(
                out,
                "{indent}  spin {} {} {} {}",
                utils::rad_to_deg(*angle),
                axis.x,
                axis.y,
                axis.z
            ),
            Self::Xform { origin, x_axis, y_axis, z_axis } => writeln!(
                out,
                "{indent}  xform {} {} {}  {} {} {}  {} {} {}  {} {} {}",
                origin.x, origin.y, origin.z,
                x_axis.x, x_axis.y, x_axis.z,
                y_axis.x, y_axis.y, y_axis.z,
                z_axis.x, z_axis.y, z_axis.z
            ),
        }
    }
}

/// True for names usable as references: non-empty, not starting with a digit
pub(crate) fn is_valid_reference_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| !c.is_ascii_digit())
}

/// Ordered list of affine operations
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshTransform {
    name: String,
    ops: Vec<TransformOp>,
}

impl MeshTransform {
    /// The identity transform
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a list of operations
    pub fn from_ops(ops: Vec<TransformOp>) -> Self {
        Self { name: String::new(), ops }
    }

    /// Optional name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the name; empty names and names starting with a digit are
    /// rejected (and clear the current name)
    pub fn set_name(&mut self, name: &str) -> bool {
        if is_valid_reference_name(name) {
            self.name = name.to_string();
            true
        } else {
            self.name.clear();
            false
        }
    }

    /// Operations in application order
    pub fn ops(&self) -> &[TransformOp] {
        &self.ops
    }

    /// True when there are no operations
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Append a translation
    pub fn add_shift(&mut self, shift: Vec3) {
        self.ops.push(TransformOp::Shift(shift));
    }

    /// Append a scale
    pub fn add_scale(&mut self, scale: Vec3) {
        self.ops.push(TransformOp::Scale(scale));
    }

    /// Append a shear
    pub fn add_shear(&mut self, shear: Vec3) {
        self.ops.push(TransformOp::Shear(shear));
    }

    /// Append a rotation given in degrees
    pub fn add_spin(&mut self, degrees: f32, axis: Vec3) {
        self.ops.push(TransformOp::Spin { angle: utils::deg_to_rad(degrees), axis });
    }

    /// Append a basis change
    pub fn add_xform(&mut self, origin: Vec3, x_axis: Vec3, y_axis: Vec3, z_axis: Vec3) {
        self.ops.push(TransformOp::Xform { origin, x_axis, y_axis, z_axis });
    }

    /// Run `other` after this transform
    pub fn append(&mut self, other: &Self) {
        self.ops.extend_from_slice(&other.ops);
    }

    /// Run `other` before this transform
    pub fn prepend(&mut self, other: &Self) {
        if other.ops.is_empty() {
            return;
        }
        let mut ops = other.ops.clone();
        ops.append(&mut self.ops);
        self.ops = ops;
    }

    /// Write the operations, one per line
    pub fn print_ops(&self, out: &mut impl Write, indent: &str) -> fmt::Result {
        for op in &self.ops {
            op.print(out, indent)?;
        }
        Ok(())
    }

    /// Write a standalone `transform` block
    pub fn print(&self, out: &mut impl Write, indent: &str) -> fmt::Result {
        writeln!(out, "{indent}transform")?;
        if !self.name.is_empty() {
            writeln!(out, "{indent}  name {}", self.name)?;
        }
        self.print_ops(out, indent)?;
        writeln!(out, "{indent}end")?;
        writeln!(out)
    }
}

impl Packable for MeshTransform {
    fn pack(&self, buf: &mut PackBuffer) {
        buf.pack_string(&self.name);
        buf.pack_count(self.ops.len());
        for op in &self.ops {
            op.pack(buf);
        }
    }

    fn pack_size(&self) -> usize {
        let ops: usize = self.ops.iter().map(TransformOp::pack_size).sum();
        string_pack_size(&self.name) + 4 + ops
    }

    fn unpack(buf: &mut UnpackBuffer<'_>) -> Result<Self, PackError> {
        let name = buf.unpack_string()?;
        let count = buf.unpack_count()?;
        let ops = (0..count)
            .map(|_| TransformOp::unpack(buf))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { name, ops })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MeshTransform {
        let mut xform = MeshTransform::new();
        xform.add_scale(Vec3::new(2.0, 2.0, 1.0));
        xform.add_spin(90.0, Vec3::z());
        xform.add_shift(Vec3::new(10.0, 0.0, 0.0));
        xform.add_xform(Vec3::zeros(), Vec3::x(), Vec3::y(), Vec3::z());
        xform
    }

    #[test]
    fn test_pack_round_trip() {
        let mut xform = sample();
        assert!(xform.set_name("lift"));
        let bytes = xform.to_bytes();
        assert_eq!(bytes.len(), xform.pack_size());
        assert_eq!(MeshTransform::from_bytes(&bytes).unwrap(), xform);
    }

    #[test]
    fn test_unknown_op_rejected() {
        let mut buf = PackBuffer::new();
        buf.pack_string("");
        buf.pack_u32(1);
        buf.pack_u8(9);
        buf.pack_vec3(&Vec3::zeros());
        assert_eq!(
            MeshTransform::from_bytes(buf.as_bytes()),
            Err(PackError::UnknownTransformOp(9))
        );
    }

    #[test]
    fn test_prepend_runs_first() {
        let mut outer = MeshTransform::new();
        outer.add_shift(Vec3::new(1.0, 0.0, 0.0));
        let mut inner = MeshTransform::new();
        inner.add_scale(Vec3::repeat(2.0));
        outer.prepend(&inner);
        assert_eq!(outer.ops()[0], TransformOp::Scale(Vec3::repeat(2.0)));
        assert_eq!(outer.ops().len(), 2);
    }

    #[test]
    fn test_set_name_rules() {
        let mut xform = MeshTransform::new();
        assert!(!xform.set_name(""));
        assert!(!xform.set_name("9lives"));
        assert!(xform.set_name("spinner"));
        assert_eq!(xform.name(), "spinner");
    }

    #[test]
    fn test_print_spin_in_degrees() {
        let mut xform = MeshTransform::new();
        xform.add_spin(90.0, Vec3::z());
        let mut text = String::new();
        xform.print_ops(&mut text, "  ").unwrap();
        assert!(text.starts_with("    spin 90"));
        assert!(text.trim_end().ends_with("0 0 1"));
    }
}
