//! World settings
//!
//! Dimensions the obstacle code needs from the outside world: the square
//! world footprint, the default tank footprint used for broad-phase tests,
//! the collision grid resolution, and the flags that pick an export format.

use serde::{Deserialize, Serialize};

use super::{Config, ConfigError};

/// World and export configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Edge length of the square world footprint
    pub world_size: f32,

    /// Default tank width
    pub tank_width: f32,

    /// Default tank length
    pub tank_length: f32,

    /// Default tank height
    pub tank_height: f32,

    /// Collision grid cells along x
    pub grid_size_x: usize,

    /// Collision grid cells along y
    pub grid_size_y: usize,

    /// Frame thickness used when a teleporter gives none
    pub teleporter_border: f32,

    /// Export analytic containers as the meshes they expand to
    pub save_as_meshes: bool,

    /// Export as Wavefront OBJ instead of world text
    pub save_as_obj: bool,

    /// Export the expanded world instead of group definitions
    pub save_flat_file: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            world_size: 800.0,
            tank_width: 2.8,
            tank_length: 6.0,
            tank_height: 2.05,
            grid_size_x: 16,
            grid_size_y: 16,
            teleporter_border: 1.12,
            save_as_meshes: false,
            save_as_obj: false,
            save_flat_file: false,
        }
    }
}

impl WorldConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.world_size.is_nan() || self.world_size <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "world_size must be positive, got {}",
                self.world_size
            )));
        }
        if self.grid_size_x == 0 || self.grid_size_y == 0 {
            return Err(ConfigError::Invalid("grid dimensions must be non-zero".to_string()));
        }
        if self.tank_width <= 0.0 || self.tank_length <= 0.0 || self.tank_height <= 0.0 {
            return Err(ConfigError::Invalid("tank dimensions must be positive".to_string()));
        }
        Ok(())
    }
}

impl Config for WorldConfig {}
