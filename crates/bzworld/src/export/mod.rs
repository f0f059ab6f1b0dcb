//! Text exports of a world
//!
//! World-file text is written by each type's `print` method straight into a
//! [`std::fmt::Write`] sink. This module holds what the Wavefront OBJ path
//! shares between obstacle kinds.

pub mod obj;

pub use obj::ObjCounter;
