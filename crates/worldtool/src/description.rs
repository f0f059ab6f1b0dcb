//! RON world descriptions
//!
//! A description lists materials, named group definitions and the world's
//! own obstacles and instances. Rotations and spins are in degrees, the
//! way world files write them.

use std::fs;
use std::path::Path;

use bzworld::config::{ConfigError, WorldConfig};
use bzworld::foundation::math::{Vec3, Vec4};
use bzworld::group::{GroupDefinition, GroupInstance};
use bzworld::material::{BzMaterial, MaterialId, MaterialManager};
use bzworld::obstacle::{
    ArcObstacle, BaseBuilding, BoxBuilding, ConeObstacle, FaceDef, FaceError, MeshObstacle,
    Obstacle, ObstacleBase, PyramidBuilding, SphereObstacle, Teleporter, TetraBuilding,
};
use bzworld::transform::MeshTransform;
use bzworld::{WorldContext, WorldError};
use serde::{Deserialize, Serialize};

/// Errors raised by the world tool
#[derive(thiserror::Error, Debug)]
pub enum ToolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("description parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    World(#[from] WorldError),

    #[error("output formatting failed")]
    Format(#[from] std::fmt::Error),

    #[error("unknown material {0:?}")]
    UnknownMaterial(String),

    #[error("mesh face {index}: {source}")]
    Face { index: usize, source: FaceError },

    #[error("{0}")]
    Usage(String),
}

/// Complete world description
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldDescription {
    pub config: WorldConfig,
    pub materials: Vec<MaterialDesc>,
    pub groups: Vec<GroupDesc>,
    /// The world itself; its name is ignored
    pub world: GroupDesc,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialDesc {
    pub name: String,
    pub aliases: Vec<String>,
    pub diffuse: Option<[f32; 4]>,
    pub texture: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupDesc {
    pub name: String,
    pub obstacles: Vec<ObstacleDesc>,
    pub instances: Vec<InstanceDesc>,
}

/// Pass-through flags shared by every obstacle
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Flags {
    pub drive_through: bool,
    pub shoot_through: bool,
    pub ricochet: bool,
}

/// One transform operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TransformDesc {
    Shift([f32; 3]),
    Scale([f32; 3]),
    Shear([f32; 3]),
    /// Degrees about an axis
    Spin(f32, [f32; 3]),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ObstacleDesc {
    Box {
        pos: [f32; 3],
        size: [f32; 3],
        #[serde(default)]
        rotation: f32,
        #[serde(default)]
        flags: Flags,
    },
    Pyramid {
        pos: [f32; 3],
        size: [f32; 3],
        #[serde(default)]
        rotation: f32,
        #[serde(default)]
        flip_z: bool,
        #[serde(default)]
        flags: Flags,
    },
    Base {
        pos: [f32; 3],
        size: [f32; 3],
        #[serde(default)]
        rotation: f32,
        team: u16,
    },
    Teleporter {
        #[serde(default)]
        name: String,
        pos: [f32; 3],
        size: [f32; 3],
        #[serde(default)]
        rotation: f32,
        /// Falls back to the configured frame thickness
        #[serde(default)]
        border: Option<f32>,
    },
    Arc {
        pos: [f32; 3],
        size: [f32; 3],
        #[serde(default)]
        rotation: f32,
        sweep: f32,
        ratio: f32,
        divisions: i32,
        #[serde(default)]
        transform: Vec<TransformDesc>,
        #[serde(default)]
        material: Option<String>,
        #[serde(default)]
        flags: Flags,
    },
    Cone {
        pos: [f32; 3],
        size: [f32; 3],
        #[serde(default)]
        rotation: f32,
        sweep: f32,
        divisions: i32,
        #[serde(default)]
        transform: Vec<TransformDesc>,
        #[serde(default)]
        material: Option<String>,
        #[serde(default)]
        flags: Flags,
    },
    Sphere {
        pos: [f32; 3],
        size: [f32; 3],
        #[serde(default)]
        rotation: f32,
        divisions: i32,
        #[serde(default)]
        hemisphere: bool,
        #[serde(default)]
        transform: Vec<TransformDesc>,
        #[serde(default)]
        material: Option<String>,
        #[serde(default)]
        flags: Flags,
    },
    Tetra {
        vertices: [[f32; 3]; 4],
        #[serde(default)]
        transform: Vec<TransformDesc>,
        #[serde(default)]
        material: Option<String>,
        #[serde(default)]
        flags: Flags,
    },
    Mesh {
        vertices: Vec<[f32; 3]>,
        /// Vertex rings, counter-clockwise seen from outside
        faces: Vec<Vec<usize>>,
        #[serde(default)]
        transform: Vec<TransformDesc>,
        #[serde(default)]
        material: Option<String>,
        #[serde(default)]
        flags: Flags,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceDesc {
    pub group: String,
    pub name: String,
    pub transform: Vec<TransformDesc>,
    pub team: Option<u16>,
    pub tint: Option<[f32; 4]>,
    pub material: Option<String>,
    pub phydrv: Option<i32>,
    pub drive_through: bool,
    pub shoot_through: bool,
    pub ricochet: bool,
}

fn vec3(v: [f32; 3]) -> Vec3 {
    Vec3::new(v[0], v[1], v[2])
}

fn make_transform(ops: &[TransformDesc]) -> MeshTransform {
    let mut xform = MeshTransform::new();
    for op in ops {
        match op {
            TransformDesc::Shift(v) => xform.add_shift(vec3(*v)),
            TransformDesc::Scale(v) => xform.add_scale(vec3(*v)),
            TransformDesc::Shear(v) => xform.add_shear(vec3(*v)),
            TransformDesc::Spin(degrees, axis) => xform.add_spin(*degrees, vec3(*axis)),
        }
    }
    xform
}

fn apply_flags(base: &mut ObstacleBase, flags: Flags) {
    if flags.drive_through {
        base.drive_through = 0xFF;
    }
    if flags.shoot_through {
        base.shoot_through = 0xFF;
    }
    base.ricochet |= flags.ricochet;
}

fn resolve(
    materials: &MaterialManager,
    name: Option<&String>,
) -> Result<Option<MaterialId>, ToolError> {
    name.map(|n| materials.find_material(n).ok_or_else(|| ToolError::UnknownMaterial(n.clone())))
        .transpose()
}

impl MaterialDesc {
    fn to_material(&self) -> BzMaterial {
        let mut material = BzMaterial::new();
        material.set_name(&self.name);
        for alias in &self.aliases {
            material.add_alias(alias);
        }
        if let Some([r, g, b, a]) = self.diffuse {
            material.diffuse = Vec4::new(r, g, b, a);
        }
        if let Some(texture) = &self.texture {
            material.add_texture(texture.as_str());
        }
        material
    }
}

impl ObstacleDesc {
    fn to_obstacle(
        &self,
        config: &WorldConfig,
        materials: &MaterialManager,
    ) -> Result<Obstacle, ToolError> {
        let obstacle = match self {
            Self::Box { pos, size, rotation, flags } => {
                let mut b = BoxBuilding::new(vec3(*pos), rotation.to_radians(), vec3(*size));
                apply_flags(&mut b.base, *flags);
                Obstacle::from(b)
            }
            Self::Pyramid { pos, size, rotation, flip_z, flags } => {
                let mut p = PyramidBuilding::new(vec3(*pos), rotation.to_radians(), vec3(*size));
                p.base.z_flip = *flip_z;
                apply_flags(&mut p.base, *flags);
                Obstacle::from(p)
            }
            Self::Base { pos, size, rotation, team } => {
                Obstacle::from(BaseBuilding::new(
                    vec3(*pos),
                    rotation.to_radians(),
                    vec3(*size),
                    *team,
                ))
            }
            Self::Teleporter { name, pos, size, rotation, border } => {
                let border = border.unwrap_or(config.teleporter_border);
                let mut t = Teleporter::new(vec3(*pos), rotation.to_radians(), vec3(*size), border);
                t.base.name.clone_from(name);
                Obstacle::from(t)
            }
            Self::Arc {
                pos,
                size,
                rotation,
                sweep,
                ratio,
                divisions,
                transform,
                material,
                flags,
            } => {
                let mut arc = ArcObstacle::new(
                    make_transform(transform),
                    vec3(*pos),
                    vec3(*size),
                    rotation.to_radians(),
                    *sweep,
                    *ratio,
                    *divisions,
                );
                arc.materials = [resolve(materials, material.as_ref())?; 6];
                apply_flags(&mut arc.base, *flags);
                arc.finalize();
                Obstacle::from(arc)
            }
            Self::Cone { pos, size, rotation, sweep, divisions, transform, material, flags } => {
                let mut cone = ConeObstacle::new(
                    make_transform(transform),
                    vec3(*pos),
                    vec3(*size),
                    rotation.to_radians(),
                    *sweep,
                    *divisions,
                );
                cone.materials = [resolve(materials, material.as_ref())?; 4];
                apply_flags(&mut cone.base, *flags);
                cone.finalize();
                Obstacle::from(cone)
            }
            Self::Sphere {
                pos,
                size,
                rotation,
                divisions,
                hemisphere,
                transform,
                material,
                flags,
            } => {
                let mut sphere = SphereObstacle::new(
                    make_transform(transform),
                    vec3(*pos),
                    vec3(*size),
                    rotation.to_radians(),
                    *divisions,
                    *hemisphere,
                );
                sphere.materials = [resolve(materials, material.as_ref())?; 2];
                apply_flags(&mut sphere.base, *flags);
                sphere.finalize();
                Obstacle::from(sphere)
            }
            Self::Tetra { vertices, transform, material, flags } => {
                let mut tetra = TetraBuilding::new(make_transform(transform), vertices.map(vec3));
                tetra.materials = [resolve(materials, material.as_ref())?; 4];
                apply_flags(&mut tetra.base, *flags);
                tetra.finalize();
                Obstacle::from(tetra)
            }
            Self::Mesh { vertices, faces, transform, material, flags } => {
                let material = resolve(materials, material.as_ref())?;
                let vertices = vertices.iter().copied().map(vec3).collect();
                let mut mesh = MeshObstacle::new(
                    &make_transform(transform),
                    Vec::new(),
                    vertices,
                    Vec::new(),
                    Vec::new(),
                );
                apply_flags(&mut mesh.base, *flags);
                for (index, ring) in faces.iter().enumerate() {
                    let mut def = FaceDef::new(ring.clone());
                    def.material = material;
                    mesh.add_face(def, true).map_err(|source| ToolError::Face { index, source })?;
                }
                mesh.finalize();
                Obstacle::from(mesh)
            }
        };
        Ok(obstacle)
    }
}

impl InstanceDesc {
    fn to_instance(&self, materials: &MaterialManager) -> Result<GroupInstance, ToolError> {
        let mut inst = GroupInstance::with_transform(
            self.group.as_str(),
            make_transform(&self.transform),
        );
        inst.name.clone_from(&self.name);
        inst.team = self.team;
        inst.tint = self.tint.map(|[r, g, b, a]| Vec4::new(r, g, b, a));
        inst.material = resolve(materials, self.material.as_ref())?;
        inst.phydrv = self.phydrv;
        inst.drive_through = self.drive_through;
        inst.shoot_through = self.shoot_through;
        inst.ricochet = self.ricochet;
        Ok(inst)
    }
}

impl GroupDesc {
    fn to_definition(
        &self,
        config: &WorldConfig,
        materials: &MaterialManager,
    ) -> Result<GroupDefinition, ToolError> {
        let mut def = GroupDefinition::new(self.name.as_str());
        for obstacle in &self.obstacles {
            def.add_obstacle(obstacle.to_obstacle(config, materials)?);
        }
        for inst in &self.instances {
            def.add_group_instance(inst.to_instance(materials)?);
        }
        Ok(def)
    }
}

impl WorldDescription {
    /// Read a RON description
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ToolError> {
        Self::parse(&fs::read_to_string(path)?)
    }

    pub fn parse(text: &str) -> Result<Self, ToolError> {
        Ok(ron::from_str(text)?)
    }

    /// Build and expand the described world
    pub fn into_world(self) -> Result<WorldContext, ToolError> {
        let mut world = WorldContext::new(self.config)?;
        for material in &self.materials {
            world.materials.add_material(&material.to_material());
        }
        for group in &self.groups {
            let def = group.to_definition(&world.config, &world.materials)?;
            world.groups.add_group_def(def);
        }
        let mut top = self.world.to_definition(&world.config, &world.materials)?;
        top.name.clear();
        world.groups.world = top;
        world.build();
        Ok(world)
    }
}
