//! Surface materials
//!
//! Mesh faces and container slots refer to materials by [`MaterialId`], an
//! index into the [`MaterialManager`]. Geometry never looks inside a
//! material; the manager exists so references survive packing, printing and
//! the tint/swap overrides applied by group instances.

pub mod bz_material;
pub mod manager;

use std::collections::BTreeMap;

use crate::pack::{PackBuffer, PackError, UnpackBuffer};

pub use bz_material::{BzMaterial, CombineMode, MaterialFlags, TextureInfo};
pub use manager::MaterialManager;

/// Index of a material in the [`MaterialManager`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialId(pub u32);

impl MaterialId {
    /// Position in the manager
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Value written on the wire
    pub fn to_wire(self) -> i32 {
        i32::try_from(self.0).unwrap_or(i32::MAX)
    }
}

/// Optional material reference; `None` renders with the default material
pub type MaterialRef = Option<MaterialId>;

/// Material substitution table used by group instances
pub type MaterialMap = BTreeMap<MaterialId, MaterialId>;

/// Write a reference as an `i32` (`-1` for none)
pub fn pack_material_ref(buf: &mut PackBuffer, material: MaterialRef) {
    buf.pack_i32(material.map_or(-1, MaterialId::to_wire));
}

/// Read a reference written by [`pack_material_ref`]
pub fn unpack_material_ref(buf: &mut UnpackBuffer<'_>) -> Result<MaterialRef, PackError> {
    let raw = buf.unpack_i32()?;
    Ok(u32::try_from(raw).ok().map(MaterialId))
}
