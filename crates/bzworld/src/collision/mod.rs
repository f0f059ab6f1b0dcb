//! Broad-phase collision
//!
//! [`CollisionGrid`] buckets the flattened world into a uniform grid so a
//! query only runs the exact obstacle tests against nearby obstacles.

pub mod grid;

pub use grid::{CollisionCell, CollisionGrid, ObstacleKey, GRID_KINDS};
