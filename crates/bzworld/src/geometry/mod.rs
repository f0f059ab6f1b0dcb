//! Geometric primitives and intersection tests
//!
//! # Module Organization
//!
//! - [`extents`] - axis-aligned bounds shared by obstacles and the grid
//! - [`ray`] - parametric rays (direction is *not* normalized)
//! - [`plane`] - plane equations from points
//! - [`intersect`] - rectangle, box, pyramid and circle tests in the
//!   horizontal plane, used by every obstacle kind

pub mod extents;
pub mod intersect;
pub mod plane;
pub mod ray;

pub use extents::Extents;
pub use intersect::{RectHit, RectSide};
pub use plane::{make_plane, plane_distance};
pub use ray::Ray;
