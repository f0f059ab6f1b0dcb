//! Material records

use std::fmt::{self, Write};

use bitflags::bitflags;

use crate::foundation::math::Vec4;
use crate::pack::{string_pack_size, PackBuffer, PackError, Packable, UnpackBuffer};
use crate::transform::is_valid_reference_name;

bitflags! {
    /// Rendering mode bits, packed as one byte
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MaterialFlags: u8 {
        /// Draw both sides
        const NO_CULLING = 1 << 0;
        /// Skip depth sorting
        const NO_SORTING = 1 << 1;
        /// Hidden on radar
        const NO_RADAR = 1 << 2;
        /// Casts no shadow
        const NO_SHADOW = 1 << 3;
        /// Hides what is behind it
        const OCCLUDER = 1 << 4;
        /// Blend the whole group as one
        const GROUP_ALPHA = 1 << 5;
        /// Unlit
        const NO_LIGHTING = 1 << 6;
    }
}

/// How a texture combines with the surface colour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CombineMode {
    /// Texture replaces the colour
    Replace,
    /// Texture multiplies the colour
    Modulate,
    /// Texture over colour using texture alpha
    #[default]
    Decal,
    /// Blend with the environment colour
    Blend,
    /// Additive
    Add,
    /// Full combiner setup
    Combine,
}

impl CombineMode {
    fn to_wire(self) -> i32 {
        match self {
            Self::Replace => 0,
            Self::Modulate => 1,
            Self::Decal => 2,
            Self::Blend => 3,
            Self::Add => 4,
            Self::Combine => 5,
        }
    }

    fn from_wire(value: i32) -> Self {
        match value {
            0 => Self::Replace,
            1 => Self::Modulate,
            3 => Self::Blend,
            4 => Self::Add,
            5 => Self::Combine,
            _ => Self::Decal,
        }
    }
}

/// One texture layer
#[derive(Debug, Clone, PartialEq)]
pub struct TextureInfo {
    /// Texture name or URL
    pub name: String,
    /// Texture matrix index, `-1` for none
    pub matrix: i32,
    /// Combination with the surface colour
    pub combine_mode: CombineMode,
    /// Use the texture's alpha channel
    pub use_alpha: bool,
    /// Tint the texture with the material colour
    pub use_color: bool,
    /// Sphere-map the texture
    pub use_sphere_map: bool,
}

impl TextureInfo {
    /// Texture with the default layer settings
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            matrix: -1,
            combine_mode: CombineMode::Decal,
            use_alpha: true,
            use_color: true,
            use_sphere_map: false,
        }
    }

    fn pack_size(&self) -> usize {
        string_pack_size(&self.name) + 4 + 4 + 1
    }
}

/// Surface appearance
#[derive(Debug, Clone, PartialEq)]
pub struct BzMaterial {
    name: String,
    aliases: Vec<String>,
    /// Dynamic colour index, `-1` for none
    pub dynamic_color: i32,
    /// Ambient colour
    pub ambient: Vec4,
    /// Diffuse colour; alpha is the material's opacity
    pub diffuse: Vec4,
    /// Specular colour
    pub specular: Vec4,
    /// Emissive colour
    pub emission: Vec4,
    /// Specular exponent
    pub shininess: f32,
    /// Alpha test cutoff
    pub alpha_threshold: f32,
    /// Mode bits
    pub flags: MaterialFlags,
    /// Texture layers
    pub textures: Vec<TextureInfo>,
    /// Shader names
    pub shaders: Vec<String>,
}

impl Default for BzMaterial {
    fn default() -> Self {
        Self {
            name: String::new(),
            aliases: Vec::new(),
            dynamic_color: -1,
            ambient: Vec4::new(0.2, 0.2, 0.2, 1.0),
            diffuse: Vec4::new(1.0, 1.0, 1.0, 1.0),
            specular: Vec4::new(0.0, 0.0, 0.0, 1.0),
            emission: Vec4::new(0.0, 0.0, 0.0, 1.0),
            shininess: 0.0,
            alpha_threshold: 0.0,
            flags: MaterialFlags::empty(),
            textures: Vec::new(),
            shaders: Vec::new(),
        }
    }
}

impl BzMaterial {
    /// Default material
    pub fn new() -> Self {
        Self::default()
    }

    /// Material name, may be empty
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Other names this material answers to
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Set the name; empty names and names starting with a digit are
    /// rejected and clear the name
    pub fn set_name(&mut self, name: &str) -> bool {
        if is_valid_reference_name(name) {
            self.name = name.to_string();
            true
        } else {
            self.name.clear();
            false
        }
    }

    /// Add an alias, with the same rules as [`BzMaterial::set_name`]
    pub fn add_alias(&mut self, alias: &str) -> bool {
        if !is_valid_reference_name(alias) {
            return false;
        }
        if !self.aliases.iter().any(|a| a == alias) {
            self.aliases.push(alias.to_string());
        }
        true
    }

    /// Append a texture layer
    pub fn add_texture(&mut self, name: impl Into<String>) {
        self.textures.push(TextureInfo::new(name));
    }

    /// Append a shader
    pub fn add_shader(&mut self, name: impl Into<String>) {
        self.shaders.push(name.into());
    }

    /// Same appearance, ignoring names and aliases
    pub fn same_appearance(&self, other: &Self) -> bool {
        self.dynamic_color == other.dynamic_color
            && self.ambient == other.ambient
            && self.diffuse == other.diffuse
            && self.specular == other.specular
            && self.emission == other.emission
            && self.shininess == other.shininess
            && self.alpha_threshold == other.alpha_threshold
            && self.flags == other.flags
            && self.textures == other.textures
            && self.shaders == other.shaders
    }

    /// Fully transparent with nothing drawn on top
    pub fn is_invisible(&self) -> bool {
        self.diffuse.w == 0.0
            && self.dynamic_color < 0
            && !self.textures.first().is_some_and(|t| !t.use_color)
    }

    /// Copy with every colour multiplied component-wise by `tint`
    pub fn tinted(&self, tint: &Vec4) -> Self {
        let mut out = self.clone();
        out.name.clear();
        out.aliases.clear();
        out.ambient.component_mul_assign(tint);
        out.diffuse.component_mul_assign(tint);
        out.specular.component_mul_assign(tint);
        out.emission.component_mul_assign(tint);
        out
    }

    /// Write a `material` block; `reference` names the material when it
    /// has no name of its own
    pub fn print(&self, out: &mut impl Write, indent: &str) -> fmt::Result {
        let defaults = Self::default();
        writeln!(out, "{indent}material")?;
        if !self.name.is_empty() {
            writeln!(out, "{indent}  name {}", self.name)?;
        }
        if self.dynamic_color != defaults.dynamic_color {
            writeln!(out, "{indent}  dyncol {}", self.dynamic_color)?;
        }
        for (label, color, default) in [
            ("ambient", &self.ambient, &defaults.ambient),
            ("diffuse", &self.diffuse, &defaults.diffuse),
            ("specular", &self.specular, &defaults.specular),
            ("emission", &self.emission, &defaults.emission),
        ] {
            if color != default {
                writeln!(out, "{indent}  {label} {} {} {} {}", color.x, color.y, color.z, color.w)?;
            }
        }
        if self.shininess != defaults.shininess {
            writeln!(out, "{indent}  shininess {}", self.shininess)?;
        }
        if self.alpha_threshold != defaults.alpha_threshold {
            writeln!(out, "{indent}  alphathresh {}", self.alpha_threshold)?;
        }
        for (flag, keyword) in [
            (MaterialFlags::OCCLUDER, "occluder"),
            (MaterialFlags::GROUP_ALPHA, "groupAlpha"),
            (MaterialFlags::NO_RADAR, "noradar"),
            (MaterialFlags::NO_SHADOW, "noshadow"),
            (MaterialFlags::NO_CULLING, "noculling"),
            (MaterialFlags::NO_SORTING, "nosorting"),
            (MaterialFlags::NO_LIGHTING, "nolighting"),
        ] {
            if self.flags.contains(flag) {
                writeln!(out, "{indent}  {keyword}")?;
            }
        }
        for tex in &self.textures {
            writeln!(out, "{indent}  addtexture {}", tex.name)?;
            if tex.matrix != -1 {
                writeln!(out, "{indent}    texmat {}", tex.matrix)?;
            }
            if !tex.use_alpha {
                writeln!(out, "{indent}    notexalpha")?;
            }
            if !tex.use_color {
                writeln!(out, "{indent}    notexcolor")?;
            }
            if tex.use_sphere_map {
                writeln!(out, "{indent}    spheremap")?;
            }
        }
        for shader in &self.shaders {
            writeln!(out, "{indent}  addshader {shader}")?;
        }
        writeln!(out, "{indent}end")?;
        writeln!(out)
    }

    /// Write an OBJ `newmtl` record named `label`
    pub fn print_mtl(&self, out: &mut impl Write, label: &str) -> fmt::Result {
        writeln!(out, "newmtl {label}")?;
        let illum = if self.flags.contains(MaterialFlags::NO_LIGHTING) { 0 } else { 2 };
        writeln!(out, "illum {illum}")?;
        writeln!(out, "d {}", self.diffuse.w)?;
        let a = &self.ambient;
        writeln!(out, "#Ka {} {} {}", a.x, a.y, a.z)?;
        let d = &self.diffuse;
        writeln!(out, "Kd {} {} {}", d.x, d.y, d.z)?;
        let e = &self.emission;
        writeln!(out, "Ke {} {} {}", e.x, e.y, e.z)?;
        let s = &self.specular;
        writeln!(out, "Ks {} {} {}", s.x, s.y, s.z)?;
        writeln!(out, "Ns {}", 1000.0 * (self.shininess / 128.0))?;
        if let Some(tex) = self.textures.first().filter(|t| !t.name.is_empty()) {
            writeln!(out, "map_Kd {}", tex.name)?;
        }
        writeln!(out)
    }
}

impl Packable for BzMaterial {
    fn pack(&self, buf: &mut PackBuffer) {
        buf.pack_string(&self.name);
        buf.pack_u8(self.flags.bits());
        buf.pack_i32(self.dynamic_color);
        buf.pack_vec4(&self.ambient);
        buf.pack_vec4(&self.diffuse);
        buf.pack_vec4(&self.specular);
        buf.pack_vec4(&self.emission);
        buf.pack_f32(self.shininess);
        buf.pack_f32(self.alpha_threshold);

        let textures = &self.textures[..self.textures.len().min(255)];
        buf.pack_u8(textures.len() as u8);
        for tex in textures {
            buf.pack_string(&tex.name);
            buf.pack_i32(tex.matrix);
            buf.pack_i32(tex.combine_mode.to_wire());
            let mut state = 0u8;
            if tex.use_alpha {
                state |= 1 << 0;
            }
            if tex.use_color {
                state |= 1 << 1;
            }
            if tex.use_sphere_map {
                state |= 1 << 2;
            }
            buf.pack_u8(state);
        }

        let shaders = &self.shaders[..self.shaders.len().min(255)];
        buf.pack_u8(shaders.len() as u8);
        for shader in shaders {
            buf.pack_string(shader);
        }
    }

    fn pack_size(&self) -> usize {
        let colors = 4 + 4 * 16 + 4 + 4;
        let textures: usize = self.textures.iter().take(255).map(TextureInfo::pack_size).sum();
        let shaders: usize = self.shaders.iter().take(255).map(|s| string_pack_size(s)).sum();
        string_pack_size(&self.name) + 1 + colors + 1 + textures + 1 + shaders
    }

    fn unpack(buf: &mut UnpackBuffer<'_>) -> Result<Self, PackError> {
        let name = buf.unpack_string()?;
        let flags = MaterialFlags::from_bits_truncate(buf.unpack_u8()?);
        let dynamic_color = buf.unpack_i32()?;
        let ambient = buf.unpack_vec4()?;
        let diffuse = buf.unpack_vec4()?;
        let specular = buf.unpack_vec4()?;
        let emission = buf.unpack_vec4()?;
        let shininess = buf.unpack_f32()?;
        let alpha_threshold = buf.unpack_f32()?;

        let texture_count = buf.unpack_u8()?;
        let mut textures = Vec::with_capacity(usize::from(texture_count));
        for _ in 0..texture_count {
            let name = buf.unpack_string()?;
            let matrix = buf.unpack_i32()?;
            let combine_mode = CombineMode::from_wire(buf.unpack_i32()?);
            let state = buf.unpack_u8()?;
            textures.push(TextureInfo {
                name,
                matrix,
                combine_mode,
                use_alpha: state & (1 << 0) != 0,
                use_color: state & (1 << 1) != 0,
                use_sphere_map: state & (1 << 2) != 0,
            });
        }

        let shader_count = buf.unpack_u8()?;
        let shaders = (0..shader_count)
            .map(|_| buf.unpack_string())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name,
            aliases: Vec::new(),
            dynamic_color,
            ambient,
            diffuse,
            specular,
            emission,
            shininess,
            alpha_threshold,
            flags,
            textures,
            shaders,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fancy() -> BzMaterial {
        let mut mat = BzMaterial::new();
        mat.set_name("glass");
        mat.diffuse = Vec4::new(0.5, 0.6, 0.7, 0.3);
        mat.shininess = 64.0;
        mat.flags = MaterialFlags::NO_RADAR | MaterialFlags::OCCLUDER;
        mat.add_texture("glass.png");
        mat.textures[0].use_sphere_map = true;
        mat.add_shader("refract");
        mat
    }

    #[test]
    fn test_pack_round_trip() {
        let mat = fancy();
        let bytes = mat.to_bytes();
        assert_eq!(bytes.len(), mat.pack_size());
        let back = BzMaterial::from_bytes(&bytes).unwrap();
        assert_eq!(back, mat);
    }

    #[test]
    fn test_names_rejected() {
        let mut mat = BzMaterial::new();
        assert!(!mat.set_name("1st"));
        assert!(!mat.add_alias(""));
        assert!(mat.add_alias("other"));
        assert!(mat.add_alias("other"));
        assert_eq!(mat.aliases().len(), 1);
    }

    #[test]
    fn test_appearance_ignores_names() {
        let mut a = fancy();
        let b = fancy();
        a.set_name("window");
        assert!(a.same_appearance(&b));
        a.shininess = 1.0;
        assert!(!a.same_appearance(&b));
    }

    #[test]
    fn test_invisible() {
        let mut mat = BzMaterial::new();
        assert!(!mat.is_invisible());
        mat.diffuse.w = 0.0;
        assert!(mat.is_invisible());
        mat.add_texture("decal.png");
        mat.textures[0].use_color = false;
        assert!(!mat.is_invisible());
    }

    #[test]
    fn test_tint_multiplies_colors() {
        let tinted = fancy().tinted(&Vec4::new(2.0, 1.0, 0.0, 1.0));
        assert_eq!(tinted.diffuse, Vec4::new(1.0, 0.6, 0.0, 0.3));
        assert_eq!(tinted.name(), "");
    }

    #[test]
    fn test_print_only_changed_fields() {
        let mut text = String::new();
        fancy().print(&mut text, "").unwrap();
        assert!(text.starts_with("material\n  name glass\n"));
        assert!(text.contains("  diffuse 0.5 0.6 0.7 0.3\n"));
        assert!(!text.contains("ambient"));
        assert!(text.contains("  noradar\n"));
        assert!(text.contains("    spheremap\n"));
        assert!(text.ends_with("end\n\n"));
    }
}
