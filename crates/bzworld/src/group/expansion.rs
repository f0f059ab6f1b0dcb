//! State threaded through one recursive group expansion

use std::collections::{HashMap, HashSet};

use log::warn;

use super::definition::GroupDefinition;
use super::modifier::ObstacleModifier;
use crate::material::MaterialManager;
use crate::obstacle::{Obstacle, ObstacleSource};

/// Everything a [`GroupDefinition::make_groups`] pass reads and writes
///
/// Definitions currently being expanded are tracked by name, so a
/// definition that instances itself (directly or through others) is
/// expanded once and the cycle is cut with a warning.
pub struct Expansion<'a> {
    defs: &'a [GroupDefinition],
    /// Receives tinted materials
    pub materials: &'a mut MaterialManager,
    /// Receives every produced obstacle
    pub output: &'a mut GroupDefinition,
    active: HashSet<String>,
    path: String,
    teleporters: HashMap<String, usize>,
}

impl<'a> Expansion<'a> {
    /// Expansion writing into `output`
    pub fn new(
        defs: &'a [GroupDefinition],
        materials: &'a mut MaterialManager,
        output: &'a mut GroupDefinition,
    ) -> Self {
        Self {
            defs,
            materials,
            output,
            active: HashSet::new(),
            path: String::new(),
            teleporters: HashMap::new(),
        }
    }

    /// Definition named `name`; the unnamed world is never found
    pub fn find(&self, name: &str) -> Option<&'a GroupDefinition> {
        if name.is_empty() {
            return None;
        }
        self.defs.iter().find(|d| d.name == name)
    }

    /// Mark `def` as being expanded; false when it already is
    pub(crate) fn enter(&mut self, def: &GroupDefinition) -> bool {
        if self.active.insert(def.name.clone()) {
            true
        } else {
            warn!("avoided recursion in group definition {:?}", def.name);
            false
        }
    }

    pub(crate) fn leave(&mut self, def: &GroupDefinition) {
        self.active.remove(&def.name);
    }

    /// Current naming path, `outer:inner:` style
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Extend the naming path for the duration of an instance; returns the
    /// length to restore with [`pop_path`](Self::pop_path)
    pub(crate) fn push_path(&mut self, segment: &str) -> usize {
        let saved = self.path.len();
        self.path.push_str(segment);
        self.path.push(':');
        saved
    }

    pub(crate) fn pop_path(&mut self, saved: usize) {
        self.path.truncate(saved);
    }

    /// Tag, modify and store one produced obstacle
    ///
    /// A container's generated mesh is stored after it, tagged as coming
    /// from a container. The mesh is taken after the modifier ran, so it
    /// already carries the overridden materials and flags.
    pub(crate) fn place(
        &mut self,
        mut obstacle: Obstacle,
        source: ObstacleSource,
        modifier: &ObstacleModifier,
    ) {
        if let Obstacle::Teleporter(tele) = &mut obstacle {
            tele.base.name = self.teleporter_name(&tele.base.name);
        }
        obstacle.base_mut().source = source;
        modifier.execute(&mut obstacle, self.materials);
        let mesh = obstacle.container_mesh();
        self.output.add_obstacle(obstacle);
        if let Some(mut mesh) = mesh {
            mesh.base.source = source | ObstacleSource::CONTAINER;
            self.output.add_obstacle(mesh);
        }
    }

    /// Name for a teleporter produced at the current path
    ///
    /// Unnamed teleporters are numbered per path, `$t0`, `$t1`, ...
    pub fn teleporter_name(&mut self, name: &str) -> String {
        if !name.is_empty() {
            return format!("{}{name}", self.path);
        }
        let count = self.teleporters.entry(self.path.clone()).or_insert(0);
        let generated = format!("{}$t{count}", self.path);
        *count += 1;
        generated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_teleporter_names_count_per_path() {
        let mut materials = MaterialManager::new();
        let mut world = GroupDefinition::new("");
        let mut ctx = Expansion::new(&[], &mut materials, &mut world);
        assert_eq!(ctx.teleporter_name(""), "$t0");
        let saved = ctx.push_path("T");
        assert_eq!(ctx.teleporter_name(""), "T:$t0");
        assert_eq!(ctx.teleporter_name("gate"), "T:gate");
        assert_eq!(ctx.teleporter_name(""), "T:$t1");
        ctx.pop_path(saved);
        assert_eq!(ctx.path(), "");
        assert_eq!(ctx.teleporter_name(""), "$t1");
    }

    #[test]
    fn test_reentry_is_refused() {
        let mut materials = MaterialManager::new();
        let mut world = GroupDefinition::new("");
        let def = GroupDefinition::new("A");
        let mut ctx = Expansion::new(&[], &mut materials, &mut world);
        assert!(ctx.enter(&def));
        assert!(!ctx.enter(&def));
        ctx.leave(&def);
        assert!(ctx.enter(&def));
    }
}
