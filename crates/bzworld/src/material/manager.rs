//! Material registry
//!
//! Materials are stored in insertion order and referenced by index. Adding a
//! material whose appearance matches an existing entry returns the existing
//! id, so tinting the same material twice does not grow the table.

use std::fmt::{self, Write};

use super::{BzMaterial, MaterialId, MaterialRef};
use crate::foundation::math::Vec4;
use crate::pack::{PackBuffer, PackError, Packable, UnpackBuffer};

/// Owner of every material in a world
#[derive(Debug, Clone, Default)]
pub struct MaterialManager {
    materials: Vec<BzMaterial>,
    default_material: BzMaterial,
}

impl MaterialManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered materials
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    /// True when nothing has been registered
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    /// Remove every material
    pub fn clear(&mut self) {
        self.materials.clear();
    }

    /// Register a material, reusing an existing entry with the same
    /// appearance
    ///
    /// When an equal material exists, the new name is recorded as one of its
    /// aliases. A new material whose name is already taken loses its name.
    pub fn add_material(&mut self, material: &BzMaterial) -> MaterialId {
        if let Some(index) = self.materials.iter().position(|m| m.same_appearance(material)) {
            if !material.name().is_empty() {
                self.materials[index].add_alias(material.name());
            }
            return MaterialId(index as u32);
        }

        let mut added = material.clone();
        if !added.name().is_empty() && self.find_material(added.name()).is_some() {
            log::debug!("Material name {:?} already in use, clearing it", added.name());
            added.set_name("");
        }
        let id = MaterialId(self.materials.len() as u32);
        log::debug!("Registered material {:?} with {:?}", added.name(), id);
        self.materials.push(added);
        id
    }

    /// Find a material by name, alias or numeric index
    ///
    /// Names starting with a digit are parsed as indices.
    pub fn find_material(&self, target: &str) -> Option<MaterialId> {
        let first = target.chars().next()?;
        if first.is_ascii_digit() {
            let index: usize = target.parse().ok()?;
            return (index < self.materials.len()).then(|| MaterialId(index as u32));
        }
        self.materials
            .iter()
            .position(|m| m.name() == target || m.aliases().iter().any(|a| a == target))
            .map(|index| MaterialId(index as u32))
    }

    /// Material by id, if registered
    pub fn get(&self, id: MaterialId) -> Option<&BzMaterial> {
        self.materials.get(id.index())
    }

    /// Material for a reference; missing or unknown references resolve to
    /// the default material
    pub fn material(&self, material: MaterialRef) -> &BzMaterial {
        material
            .and_then(|id| self.get(id))
            .unwrap_or(&self.default_material)
    }

    /// Iterate over `(id, material)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (MaterialId, &BzMaterial)> {
        self.materials
            .iter()
            .enumerate()
            .map(|(index, material)| (MaterialId(index as u32), material))
    }

    /// Register a tinted copy of `material` and return its id
    pub fn tinted(&mut self, material: MaterialRef, tint: &Vec4) -> MaterialId {
        let tinted = self.material(material).tinted(tint);
        self.add_material(&tinted)
    }

    /// Write a reference the way world files name materials: `-1` for none,
    /// the name when there is one, the index otherwise
    pub fn print_reference(&self, out: &mut impl Write, material: MaterialRef) -> fmt::Result {
        match material.and_then(|id| self.get(id).map(|m| (id, m))) {
            None => write!(out, "-1"),
            Some((_, m)) if !m.name().is_empty() => write!(out, "{}", m.name()),
            Some((id, _)) => write!(out, "{}", id.0),
        }
    }

    /// Name used for a material in OBJ output
    pub fn obj_label(&self, material: MaterialRef) -> String {
        match material.and_then(|id| self.get(id).map(|m| (id, m))) {
            None => "default".to_string(),
            Some((_, m)) if !m.name().is_empty() => m.name().to_string(),
            Some((id, _)) => format!("mat{}", id.0),
        }
    }

    /// Write every material as a world-file block
    pub fn print(&self, out: &mut impl Write, indent: &str) -> fmt::Result {
        for material in &self.materials {
            material.print(out, indent)?;
        }
        Ok(())
    }

    /// Write every material as an OBJ material library
    pub fn print_mtl(&self, out: &mut impl Write) -> fmt::Result {
        self.default_material.print_mtl(out, &self.obj_label(None))?;
        for (id, material) in self.iter() {
            material.print_mtl(out, &self.obj_label(Some(id)))?;
        }
        Ok(())
    }
}

impl Packable for MaterialManager {
    fn pack(&self, buf: &mut PackBuffer) {
        buf.pack_count(self.materials.len());
        for material in &self.materials {
            material.pack(buf);
        }
    }

    fn pack_size(&self) -> usize {
        4 + self.materials.iter().map(Packable::pack_size).sum::<usize>()
    }

    fn unpack(buf: &mut UnpackBuffer<'_>) -> Result<Self, PackError> {
        let count = buf.unpack_count()?;
        let materials = (0..count)
            .map(|_| BzMaterial::unpack(buf))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { materials, default_material: BzMaterial::default() })
    }
}
