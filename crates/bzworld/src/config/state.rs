//! Key-value state store
//!
//! Geometry code reads world settings by name (`_worldSize`, `_tankHeight`,
//! `saveAsOBJ`, ...). Values are kept as strings and evaluated on demand.
//! [`StateStore::scoped_override`] swaps a value for the lifetime of a guard,
//! which the collision grid uses to turn a 3D inside test into a footprint
//! test while it buckets obstacles.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

use super::WorldConfig;

/// Name of the world edge length
pub const WORLD_SIZE: &str = "_worldSize";
/// Name of the default tank width
pub const TANK_WIDTH: &str = "_tankWidth";
/// Name of the default tank length
pub const TANK_LENGTH: &str = "_tankLength";
/// Name of the default tank height
pub const TANK_HEIGHT: &str = "_tankHeight";
/// Name of the grid resolution along x
pub const GRID_SIZE_X: &str = "_gridSizeX";
/// Name of the grid resolution along y
pub const GRID_SIZE_Y: &str = "_gridSizeY";
/// Name of the teleporter frame thickness
pub const TELEPORTER_BORDER: &str = "_teleBorder";
/// Export containers as meshes
pub const SAVE_AS_MESHES: &str = "saveAsMeshes";
/// Export as OBJ
pub const SAVE_AS_OBJ: &str = "saveAsOBJ";
/// Export the flattened world
pub const SAVE_FLAT_FILE: &str = "saveFlatFile";

/// String-valued settings with numeric and boolean views
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    values: HashMap<String, String>,
}

impl StateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate a store from a world configuration
    pub fn from_config(config: &WorldConfig) -> Self {
        let mut store = Self::new();
        store.set(WORLD_SIZE, config.world_size.to_string());
        store.set(TANK_WIDTH, config.tank_width.to_string());
        store.set(TANK_LENGTH, config.tank_length.to_string());
        store.set(TANK_HEIGHT, config.tank_height.to_string());
        store.set(GRID_SIZE_X, config.grid_size_x.to_string());
        store.set(GRID_SIZE_Y, config.grid_size_y.to_string());
        store.set(TELEPORTER_BORDER, config.teleporter_border.to_string());
        store.set(SAVE_AS_MESHES, bool_text(config.save_as_meshes));
        store.set(SAVE_AS_OBJ, bool_text(config.save_as_obj));
        store.set(SAVE_FLAT_FILE, bool_text(config.save_flat_file));
        store
    }

    /// Raw value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Numeric value, `None` when missing or not a number
    pub fn eval(&self, key: &str) -> Option<f32> {
        self.get(key).and_then(|v| v.trim().parse::<f32>().ok())
    }

    /// Numeric value with a fallback
    pub fn eval_or(&self, key: &str, fallback: f32) -> f32 {
        self.eval(key).unwrap_or(fallback)
    }

    /// Boolean view: `1`, `true`, `yes` and `on` (any case) are true
    pub fn is_true(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| {
            matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
        })
    }

    /// Set a value, returning the previous one
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.to_string(), value.into())
    }

    /// Remove a value
    pub fn unset(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    /// Replace `key` until the returned guard is dropped
    pub fn scoped_override(&mut self, key: &str, value: impl Into<String>) -> StateOverride<'_> {
        let previous = self.set(key, value);
        StateOverride { store: self, key: key.to_string(), previous }
    }
}

fn bool_text(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// Restores an overridden value on drop
pub struct StateOverride<'a> {
    store: &'a mut StateStore,
    key: String,
    previous: Option<String>,
}

impl Deref for StateOverride<'_> {
    type Target = StateStore;

    fn deref(&self) -> &StateStore {
        self.store
    }
}

impl DerefMut for StateOverride<'_> {
    fn deref_mut(&mut self) -> &mut StateStore {
        self.store
    }
}

impl Drop for StateOverride<'_> {
    fn drop(&mut self) {
        match self.previous.take() {
            Some(value) => {
                self.store.set(&self.key, value);
            }
            None => {
                self.store.unset(&self.key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let store = StateStore::from_config(&WorldConfig::default());
        assert_eq!(store.eval(WORLD_SIZE), Some(800.0));
        assert_eq!(store.eval(TANK_HEIGHT), Some(2.05));
        assert!(!store.is_true(SAVE_AS_OBJ));
    }

    #[test]
    fn test_is_true_spellings() {
        let mut store = StateStore::new();
        for text in ["1", "true", "YES", "on"] {
            store.set("flag", text);
            assert!(store.is_true("flag"), "{text}");
        }
        for text in ["0", "false", "no", "maybe"] {
            store.set("flag", text);
            assert!(!store.is_true("flag"), "{text}");
        }
        assert!(!store.is_true("missing"));
    }

    #[test]
    fn test_eval_rejects_garbage() {
        let mut store = StateStore::new();
        store.set("x", "twelve");
        assert_eq!(store.eval("x"), None);
        assert_eq!(store.eval_or("x", 3.0), 3.0);
    }

    #[test]
    fn test_override_restores_previous_value() {
        let mut store = StateStore::new();
        store.set(TANK_HEIGHT, "2.05");
        {
            let guard = store.scoped_override(TANK_HEIGHT, "1e30");
            assert_eq!(guard.eval(TANK_HEIGHT), Some(1e30));
        }
        assert_eq!(store.eval(TANK_HEIGHT), Some(2.05));
    }

    #[test]
    fn test_override_of_missing_key_removes_it() {
        let mut store = StateStore::new();
        {
            let _guard = store.scoped_override("temp", "1");
        }
        assert_eq!(store.get("temp"), None);
    }
}
