//! Placed references to group definitions

use std::collections::BTreeMap;
use std::fmt::{self, Write};

use crate::foundation::math::Vec4;
use crate::material::{
    pack_material_ref, unpack_material_ref, MaterialId, MaterialManager, MaterialMap,
};
use crate::pack::{string_pack_size, PackBuffer, PackError, Packable, UnpackBuffer};
use crate::transform::MeshTransform;

/// Physics driver substitutions, source index to replacement
pub type PhysicsDriverMap = BTreeMap<i32, i32>;

const MODIFY_TEAM: u8 = 1 << 0;
const MODIFY_TINT: u8 = 1 << 1;
const MODIFY_PHYDRV: u8 = 1 << 2;
const MODIFY_MATERIAL: u8 = 1 << 3;
const DRIVE_THRU: u8 = 1 << 4;
const SHOOT_THRU: u8 = 1 << 5;
const RICOCHET: u8 = 1 << 6;

/// One use of a group definition
///
/// The transform places every obstacle of the definition; the remaining
/// fields override attributes of what the expansion produces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupInstance {
    /// Name of the definition to expand
    pub group_def: String,
    /// Optional instance name, used in generated teleporter names
    pub name: String,
    /// Placement of the instanced definition
    pub transform: MeshTransform,
    /// Team forced onto bases
    pub team: Option<u16>,
    /// Colour multiplier for every produced material
    pub tint: Option<Vec4>,
    /// Physics driver forced onto every face
    pub phydrv: Option<i32>,
    /// Material forced onto every face
    pub material: Option<MaterialId>,
    /// Material swaps
    pub material_map: MaterialMap,
    /// Physics driver swaps
    pub phydrv_map: PhysicsDriverMap,
    /// Tanks pass through the results
    pub drive_through: bool,
    /// Shots pass through the results
    pub shoot_through: bool,
    /// Shots bounce off the results
    pub ricochet: bool,
}

impl GroupInstance {
    /// Plain instance of `group_def`
    pub fn new(group_def: impl Into<String>) -> Self {
        Self { group_def: group_def.into(), ..Self::default() }
    }

    /// Instance of `group_def` placed by `transform`
    pub fn with_transform(group_def: impl Into<String>, transform: MeshTransform) -> Self {
        Self { transform, ..Self::new(group_def) }
    }

    /// Replace `src` with `dst` wherever the expansion meets it
    pub fn add_material_swap(&mut self, src: MaterialId, dst: MaterialId) {
        self.material_map.insert(src, dst);
    }

    /// Replace physics driver `src` with `dst`
    pub fn add_phydrv_swap(&mut self, src: i32, dst: i32) {
        self.phydrv_map.insert(src, dst);
    }

    /// Segment appended to the naming path while this instance expands
    pub fn path_segment(&self) -> &str {
        if self.name.is_empty() {
            &self.group_def
        } else {
            &self.name
        }
    }

    fn bits(&self) -> u8 {
        let mut bits = 0;
        if self.team.is_some() {
            bits |= MODIFY_TEAM;
        }
        if self.tint.is_some() {
            bits |= MODIFY_TINT;
        }
        if self.phydrv.is_some() {
            bits |= MODIFY_PHYDRV;
        }
        if self.material.is_some() {
            bits |= MODIFY_MATERIAL;
        }
        if self.drive_through {
            bits |= DRIVE_THRU;
        }
        if self.shoot_through {
            bits |= SHOOT_THRU;
        }
        if self.ricochet {
            bits |= RICOCHET;
        }
        bits
    }

    fn swap_record_size(&self) -> usize {
        if self.material_map.is_empty() && self.phydrv_map.is_empty() {
            0
        } else {
            4 + 8 * self.material_map.len() + 4 + 8 * self.phydrv_map.len()
        }
    }

    fn pack_swap_record(&self, buf: &mut PackBuffer) {
        buf.pack_count(self.material_map.len());
        for (src, dst) in &self.material_map {
            pack_material_ref(buf, Some(*src));
            pack_material_ref(buf, Some(*dst));
        }
        buf.pack_count(self.phydrv_map.len());
        for (src, dst) in &self.phydrv_map {
            buf.pack_i32(*src);
            buf.pack_i32(*dst);
        }
    }

    fn unpack_swap_record(&mut self, buf: &mut UnpackBuffer<'_>) -> Result<(), PackError> {
        let len = buf.unpack_count()?;
        if len == 0 {
            return Ok(());
        }
        let mut record = UnpackBuffer::new(buf.take(len)?);
        for _ in 0..record.unpack_count()? {
            let src = unpack_material_ref(&mut record)?;
            let dst = unpack_material_ref(&mut record)?;
            if let (Some(src), Some(dst)) = (src, dst) {
                self.material_map.insert(src, dst);
            }
        }
        for _ in 0..record.unpack_count()? {
            let src = record.unpack_i32()?;
            let dst = record.unpack_i32()?;
            self.phydrv_map.insert(src, dst);
        }
        Ok(())
    }

    /// World-file block
    pub fn print(
        &self,
        out: &mut impl Write,
        indent: &str,
        materials: &MaterialManager,
    ) -> fmt::Result {
        writeln!(out, "{indent}group {}", self.group_def)?;
        if !self.name.is_empty() {
            writeln!(out, "{indent}  name {}", self.name)?;
        }
        self.transform.print_ops(out, indent)?;
        if let Some(team) = self.team {
            writeln!(out, "{indent}  team {team}")?;
        }
        if let Some(t) = self.tint {
            writeln!(out, "{indent}  tint {} {} {} {}", t.x, t.y, t.z, t.w)?;
        }
        if let Some(phydrv) = self.phydrv {
            writeln!(out, "{indent}  phydrv {phydrv}")?;
        }
        if let Some(material) = self.material {
            write!(out, "{indent}  matref ")?;
            materials.print_reference(out, Some(material))?;
            writeln!(out)?;
        }
        for (src, dst) in &self.material_map {
            write!(out, "{indent}  matswap ")?;
            materials.print_reference(out, Some(*src))?;
            write!(out, " ")?;
            materials.print_reference(out, Some(*dst))?;
            writeln!(out)?;
        }
        for (src, dst) in &self.phydrv_map {
            writeln!(out, "{indent}  phydrvswap {src} {dst}")?;
        }
        if self.drive_through {
            writeln!(out, "{indent}  drivethrough")?;
        }
        if self.shoot_through {
            writeln!(out, "{indent}  shootthrough")?;
        }
        if self.ricochet {
            writeln!(out, "{indent}  ricochet")?;
        }
        writeln!(out, "{indent}end")?;
        writeln!(out)
    }
}

impl Packable for GroupInstance {
    fn pack(&self, buf: &mut PackBuffer) {
        buf.pack_string(&self.group_def);
        buf.pack_string(&self.name);
        self.transform.pack(buf);
        buf.pack_u8(self.bits());
        if let Some(team) = self.team {
            buf.pack_u16(team);
        }
        if let Some(tint) = &self.tint {
            buf.pack_vec4(tint);
        }
        if let Some(phydrv) = self.phydrv {
            buf.pack_i32(phydrv);
        }
        if let Some(material) = self.material {
            pack_material_ref(buf, Some(material));
        }
        let swap_len = self.swap_record_size();
        buf.pack_count(swap_len);
        if swap_len > 0 {
            self.pack_swap_record(buf);
        }
    }

    fn pack_size(&self) -> usize {
        let mut size = string_pack_size(&self.group_def) + string_pack_size(&self.name);
        size += self.transform.pack_size() + 1;
        if self.team.is_some() {
            size += 2;
        }
        if self.tint.is_some() {
            size += 16;
        }
        if self.phydrv.is_some() {
            size += 4;
        }
        if self.material.is_some() {
            size += 4;
        }
        size + 4 + self.swap_record_size()
    }

    fn unpack(buf: &mut UnpackBuffer<'_>) -> Result<Self, PackError> {
        let mut inst = Self::new(buf.unpack_string()?);
        inst.name = buf.unpack_string()?;
        inst.transform = MeshTransform::unpack(buf)?;
        let bits = buf.unpack_u8()?;
        if bits & MODIFY_TEAM != 0 {
            inst.team = Some(buf.unpack_u16()?);
        }
        if bits & MODIFY_TINT != 0 {
            inst.tint = Some(buf.unpack_vec4()?);
        }
        if bits & MODIFY_PHYDRV != 0 {
            inst.phydrv = Some(buf.unpack_i32()?);
        }
        if bits & MODIFY_MATERIAL != 0 {
            inst.material = unpack_material_ref(buf)?;
        }
        inst.drive_through = bits & DRIVE_THRU != 0;
        inst.shoot_through = bits & SHOOT_THRU != 0;
        inst.ricochet = bits & RICOCHET != 0;
        inst.unpack_swap_record(buf)?;
        Ok(inst)
    }
}
