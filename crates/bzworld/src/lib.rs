//! # bzworld
//!
//! Obstacle geometry and collision for a tank-combat world.
//!
//! ## Features
//!
//! - **Obstacles**: boxes, pyramids, team bases, teleporters and polygon
//!   meshes, plus arcs, cones, spheres and tetrahedra that expand to meshes
//! - **Groups**: named definitions instanced with transforms and attribute
//!   overrides, flattened into one world
//! - **Collision**: ray, cylinder, box and swept-box tests with a uniform
//!   broad-phase grid
//! - **Interchange**: compact network packing, world-file text and
//!   Wavefront OBJ export
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bzworld::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut world = WorldContext::new(WorldConfig::default())?;
//!     let size = Vec3::new(10.0, 10.0, 5.0);
//!     world.groups.add_world_obstacle(BoxBuilding::new(Vec3::zeros(), 0.0, size));
//!     world.build();
//!
//!     let mut text = String::new();
//!     world.save(&mut text)?;
//!     print!("{text}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod geometry;
pub mod pack;
pub mod transform;
pub mod material;
pub mod obstacle;
pub mod group;
pub mod collision;
pub mod export;

mod world;

pub use world::{WorldContext, WorldError};

/// Common imports for world users
pub mod prelude {
    pub use crate::{
        WorldContext, WorldError,
        foundation::math::{Vec2, Vec3, Vec4},
        config::{Config, ConfigError, StateStore, WorldConfig},
        geometry::{Extents, Ray},
        pack::{PackBuffer, PackError, Packable, UnpackBuffer},
        transform::{MeshTransform, MeshTransformTool},
        material::{BzMaterial, MaterialManager},
        obstacle::{
            ArcObstacle, BaseBuilding, BoxBuilding, ConeObstacle, MeshObstacle, Obstacle,
            ObstacleType, PyramidBuilding, SphereObstacle, Teleporter, TetraBuilding,
        },
        group::{GroupDefinition, GroupDefinitionMgr, GroupInstance, ObstacleModifier},
        collision::CollisionGrid,
    };
}
