//! Shared vector types and the logging setup used by every other module

pub mod math;
pub mod logging;
