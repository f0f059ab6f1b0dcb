//! A loaded world
//!
//! [`WorldContext`] owns everything one world needs: its settings, the
//! key-value state the geometry code reads, the materials, the group
//! definitions with the flattened world, and the collision grid. Load
//! steps and queries take the context explicitly; nothing is global.

use std::fmt::{self, Write};

use log::info;

use crate::collision::CollisionGrid;
use crate::config::state::{SAVE_AS_MESHES, SAVE_AS_OBJ, SAVE_FLAT_FILE};
use crate::config::{ConfigError, StateStore, WorldConfig};
use crate::export::obj::ObjCounter;
use crate::foundation::math::Vec3;
use crate::geometry::Ray;
use crate::group::{GroupDefinitionMgr, PrintOptions};
use crate::material::MaterialManager;
use crate::obstacle::Obstacle;
use crate::pack::{PackBuffer, PackError, Packable, UnpackBuffer};

/// Errors raised while setting up a world
#[derive(thiserror::Error, Debug)]
pub enum WorldError {
    /// Settings were rejected
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    /// A packed world could not be read
    #[error("packed world: {0}")]
    Pack(#[from] PackError),
}

/// One world and everything derived from it
#[derive(Debug, Clone)]
pub struct WorldContext {
    /// Settings the world was built with
    pub config: WorldConfig,
    /// String-keyed runtime state
    pub state: StateStore,
    /// Every material the world uses
    pub materials: MaterialManager,
    /// World and group definitions
    pub groups: GroupDefinitionMgr,
    /// Broad-phase grid over the world lists
    pub grid: CollisionGrid,
}

impl WorldContext {
    /// Empty world using `config`
    pub fn new(config: WorldConfig) -> Result<Self, WorldError> {
        config.validate()?;
        Ok(Self {
            state: StateStore::from_config(&config),
            config,
            materials: MaterialManager::new(),
            groups: GroupDefinitionMgr::new(),
            grid: CollisionGrid::new(),
        })
    }

    /// Expand the groups and index the result
    ///
    /// Invalid authored obstacles are swept first. Safe to call again after
    /// the authored content changed.
    pub fn build(&mut self) {
        let removed = self.groups.delete_invalid_obstacles();
        self.groups.make_world(&mut self.materials);
        self.grid.load(&self.groups.world, &mut self.state);
        info!(
            "world built: {} obstacles, {} materials, {removed} invalid dropped",
            self.groups.world.obstacle_count(),
            self.materials.len()
        );
    }

    /// Text layout chosen by the `saveFlatFile` and `saveAsMeshes` flags
    pub fn print_options(&self) -> PrintOptions {
        PrintOptions {
            as_meshes: self.state.is_true(SAVE_AS_MESHES),
            flat: self.state.is_true(SAVE_FLAT_FILE),
        }
    }

    /// Write the world in the format the state flags select
    ///
    /// `saveAsOBJ` picks Wavefront OBJ, which always exports the flattened
    /// world; otherwise world-file text with the materials first.
    pub fn save(&self, out: &mut impl Write) -> fmt::Result {
        if self.state.is_true(SAVE_AS_OBJ) {
            self.save_obj(out)
        } else {
            self.save_text(out)
        }
    }

    /// World-file text
    pub fn save_text(&self, out: &mut impl Write) -> fmt::Result {
        self.materials.print(out, "")?;
        self.groups.print(out, "", &self.materials, self.print_options())
    }

    /// Wavefront OBJ with a fresh object counter
    pub fn save_obj(&self, out: &mut impl Write) -> fmt::Result {
        let mut counter = ObjCounter::new();
        writeln!(out, "mtllib world.mtl")?;
        self.groups.print_obj(out, &mut counter, &self.materials)
    }

    /// Material library for [`save_obj`](Self::save_obj)
    pub fn save_mtl(&self, out: &mut impl Write) -> fmt::Result {
        self.materials.print_mtl(out)
    }

    /// Materials then groups, as sent to clients
    pub fn pack(&self) -> Vec<u8> {
        let mut buf =
            PackBuffer::with_capacity(self.materials.pack_size() + self.groups.pack_size());
        self.materials.pack(&mut buf);
        self.groups.pack(&mut buf);
        buf.into_bytes()
    }

    /// Rebuild a world from [`pack`](Self::pack) output
    pub fn unpack(config: WorldConfig, data: &[u8]) -> Result<Self, WorldError> {
        let mut world = Self::new(config)?;
        let mut buf = UnpackBuffer::new(data);
        world.materials = MaterialManager::unpack(&mut buf)?;
        world.groups = GroupDefinitionMgr::unpack(&mut buf)?;
        world.build();
        Ok(world)
    }

    /// Obstacles the grid lists near a circle
    pub fn obstacles_near(&self, pos: Vec3, radius: f32) -> Vec<&Obstacle> {
        self.grid.get_obstacles(&self.groups.world, pos, radius)
    }

    /// First obstacle a shot along `ray` enters
    ///
    /// Shoot-through obstacles are ignored, as are containers, whose meshes
    /// answer for them.
    pub fn first_hit(&self, ray: &Ray) -> Option<(f32, &Obstacle)> {
        self.groups
            .world
            .obstacles()
            .filter(|o| !o.obstacle_type().is_container() && !o.base().is_shoot_through())
            .map(|o| (o.intersect(ray), o))
            .filter(|(t, _)| *t >= 0.0)
            .min_by(|a, b| a.0.total_cmp(&b.0))
    }

    /// First solid obstacle overlapping a tank footprint
    pub fn in_building(
        &self,
        pos: Vec3,
        angle: f32,
        dx: f32,
        dy: f32,
        height: f32,
    ) -> Option<&Obstacle> {
        self.obstacles_near(pos, dx.hypot(dy))
            .into_iter()
            .find(|o| !o.base().is_drive_through() && o.in_box(pos, angle, dx, dy, height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::logging;
    use crate::group::{GroupDefinition, GroupInstance};
    use crate::material::BzMaterial;
    use crate::obstacle::{BoxBuilding, ObstacleType, SphereObstacle};
    use crate::transform::MeshTransform;
    use approx::assert_relative_eq;

    fn sample_world() -> WorldContext {
        logging::init_for_tests();
        let mut world = WorldContext::new(WorldConfig::default()).unwrap();
        let mut stone = BzMaterial::new();
        stone.set_name("stone");
        world.materials.add_material(&stone);

        let mut pillar = GroupDefinition::new("pillar");
        pillar.add_obstacle(BoxBuilding::new(Vec3::zeros(), 0.0, Vec3::new(2.0, 2.0, 10.0)));
        pillar.add_obstacle(SphereObstacle::new(
            MeshTransform::new(),
            Vec3::new(0.0, 0.0, 12.0),
            Vec3::repeat(2.0),
            0.0,
            4,
            false,
        ));
        world.groups.add_group_def(pillar);
        for x in [-40.0, 40.0] {
            let mut xform = MeshTransform::new();
            xform.add_shift(Vec3::new(x, 0.0, 0.0));
            world.groups.world.add_group_instance(GroupInstance::with_transform("pillar", xform));
        }
        world.groups.add_world_obstacle(BoxBuilding::new(
            Vec3::new(0.0, 100.0, 0.0),
            0.0,
            Vec3::repeat(5.0),
        ));
        world.build();
        world
    }

    #[test]
    fn test_build_flattens_and_indexes() {
        let world = sample_world();
        assert_eq!(world.groups.world_list(ObstacleType::Box).len(), 3);
        assert_eq!(world.groups.world_list(ObstacleType::Sphere).len(), 2);
        assert_eq!(world.groups.world_list(ObstacleType::Mesh).len(), 2);
        assert_eq!(world.obstacles_near(Vec3::new(40.0, 0.0, 0.0), 1.0).len(), 2);
    }

    #[test]
    fn test_queries() {
        let world = sample_world();
        let (t, hit) = world
            .first_hit(&Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::new(1.0, 0.0, 0.0)))
            .unwrap();
        assert_relative_eq!(t, 38.0, epsilon = 1e-4);
        assert_eq!(hit.obstacle_type(), ObstacleType::Box);

        assert!(world.in_building(Vec3::new(-40.0, 1.0, 0.0), 0.0, 1.0, 1.0, 2.0).is_some());
        assert!(world.in_building(Vec3::new(-20.0, 0.0, 0.0), 0.0, 1.0, 1.0, 2.0).is_none());
    }

    #[test]
    fn test_pack_and_unpack_rebuild_the_same_world() {
        let world = sample_world();
        let bytes = world.pack();
        let back = WorldContext::unpack(WorldConfig::default(), &bytes).unwrap();
        assert_eq!(back.groups.world.obstacle_count(), world.groups.world.obstacle_count());
        assert_eq!(back.materials.len(), world.materials.len());
        assert!(WorldContext::unpack(WorldConfig::default(), &bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn test_save_follows_state_flags() {
        let mut world = sample_world();
        let mut text = String::new();
        world.save(&mut text).unwrap();
        assert!(text.contains("define pillar"));
        assert!(text.contains("sphere"));

        world.state.set(SAVE_FLAT_FILE, "1");
        world.state.set(SAVE_AS_MESHES, "1");
        let mut flat = String::new();
        world.save(&mut flat).unwrap();
        assert!(!flat.contains("define"));
        assert!(!flat.contains("sphere"));
        assert_eq!(flat.matches("\nmesh\n").count(), 2);

        world.state.set(SAVE_AS_OBJ, "1");
        let mut obj = String::new();
        world.save(&mut obj).unwrap();
        assert!(obj.starts_with("mtllib world.mtl\n"));
        assert!(obj.contains("\nf "));
    }

    #[test]
    fn test_rejects_bad_config() {
        let config = WorldConfig { world_size: -1.0, ..WorldConfig::default() };
        assert!(matches!(WorldContext::new(config), Err(WorldError::Config(_))));
    }
}
