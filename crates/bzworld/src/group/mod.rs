//! Group definitions and their expansion into the flat world
//!
//! A world is authored compactly: named [`GroupDefinition`]s hold obstacles
//! and [`GroupInstance`]s of other definitions, and the world definition
//! instances them with transforms and attribute overrides.
//! [`GroupDefinitionMgr::make_world`] expands that tree into the flat
//! obstacle lists the collision grid and exporters read.

pub mod definition;
pub mod expansion;
pub mod instance;
pub mod manager;
pub mod modifier;

pub use definition::{GroupDefinition, PrintOptions};
pub use expansion::Expansion;
pub use instance::{GroupInstance, PhysicsDriverMap};
pub use manager::GroupDefinitionMgr;
pub use modifier::ObstacleModifier;
