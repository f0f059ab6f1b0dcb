//! Registry of the world and every group definition

use std::fmt::{self, Write};

use log::{debug, warn};

use super::definition::{GroupDefinition, PrintOptions};
use super::expansion::Expansion;
use super::modifier::ObstacleModifier;
use crate::export::obj::ObjCounter;
use crate::material::MaterialManager;
use crate::obstacle::{split_guid, MeshObstacle, Obstacle, ObstacleSource, ObstacleType};
use crate::pack::{PackBuffer, PackError, Packable, UnpackBuffer};

/// Owner of the world definition and the named definitions it instances
///
/// After [`make_world`](Self::make_world) the world lists hold the flat set
/// of obstacles the collision grid and exporters consume: the authored
/// obstacles, everything the world's instances expand to, and the meshes of
/// every container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupDefinitionMgr {
    /// The unnamed root definition
    pub world: GroupDefinition,
    defs: Vec<GroupDefinition>,
}

impl GroupDefinitionMgr {
    /// Empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove the world and every definition
    pub fn clear(&mut self) {
        self.world.clear();
        self.defs.clear();
    }

    /// Add an obstacle straight to the world
    pub fn add_world_obstacle(&mut self, obstacle: impl Into<Obstacle>) {
        self.world.add_obstacle(obstacle);
    }

    /// Register a named definition; unnamed ones are rejected
    pub fn add_group_def(&mut self, def: GroupDefinition) -> bool {
        if def.name.is_empty() {
            debug!("unnamed group definition ignored");
            return false;
        }
        debug!("added group definition {:?}", def.name);
        self.defs.push(def);
        true
    }

    /// Definition called `name`
    pub fn find_group_def(&self, name: &str) -> Option<&GroupDefinition> {
        if name.is_empty() {
            return None;
        }
        self.defs.iter().find(|d| d.name == name)
    }

    /// Named definitions in registration order
    pub fn group_defs(&self) -> &[GroupDefinition] {
        &self.defs
    }

    /// Build the flattened world
    ///
    /// Authored containers get their meshes, unnamed authored teleporters
    /// get `$t<n>` names, and every world instance is expanded. Output of a
    /// previous call is discarded first. List ids are assigned at the end.
    pub fn make_world(&mut self, materials: &mut MaterialManager) {
        self.world.clear_expansion();

        let mut unnamed = 0;
        let mut meshes = Vec::new();
        for obstacle in self.world.obstacles_mut() {
            if let Obstacle::Teleporter(tele) = obstacle {
                if tele.base.name.is_empty() {
                    tele.base.name = format!("$t{unnamed}");
                    unnamed += 1;
                }
            }
            if let Some(mut mesh) = obstacle.container_mesh() {
                mesh.base.source = ObstacleSource::CONTAINER;
                meshes.push(mesh);
            }
        }
        for mesh in meshes {
            self.world.add_obstacle(mesh);
        }

        let instances = self.world.groups.clone();
        let mut ctx = Expansion::new(&self.defs, materials, &mut self.world);
        for inst in &instances {
            let Some(def) = ctx.find(&inst.group_def) else {
                warn!("group definition {:?} not found, world instance skipped", inst.group_def);
                continue;
            };
            let modifier = ObstacleModifier::for_instance(inst);
            let saved = ctx.push_path(inst.path_segment());
            def.make_groups(&inst.transform, &modifier, &mut ctx);
            ctx.pop_path(saved);
        }
        drop(ctx);

        self.world.assign_list_ids();
        debug!("world holds {} obstacles", self.world.obstacle_count());
    }

    /// Swap world bases for boxes of the same shape
    pub fn replace_bases_with_boxes(&mut self) {
        self.world.replace_bases_with_boxes();
    }

    /// Sweep invalid obstacles out of the world and every definition
    pub fn delete_invalid_obstacles(&mut self) -> usize {
        self.world.delete_invalid_obstacles()
            + self.defs.iter_mut().map(GroupDefinition::delete_invalid_obstacles).sum::<usize>()
    }

    /// Obstacle addressed by a [`make_guid`](crate::obstacle::make_guid) id
    pub fn find_by_guid(&self, guid: u32) -> Option<&Obstacle> {
        let (kind, list_id) = split_guid(guid).ok()?;
        self.world.list(kind).get(usize::from(list_id))
    }

    /// Meshes authored in the world or in any definition, instanced or not
    pub fn source_meshes(&self) -> Vec<&MeshObstacle> {
        self.world
            .source_meshes()
            .filter(|m| m.base.is_from_world())
            .chain(self.defs.iter().flat_map(GroupDefinition::source_meshes))
            .collect()
    }

    /// Flattened world obstacles of one kind
    pub fn world_list(&self, kind: ObstacleType) -> &[Obstacle] {
        self.world.list(kind)
    }

    /// World-file text: definitions then the world, or the flattened world
    pub fn print(
        &self,
        out: &mut impl Write,
        indent: &str,
        materials: &MaterialManager,
        options: PrintOptions,
    ) -> fmt::Result {
        if !options.flat {
            for def in &self.defs {
                def.print(out, indent, materials, options)?;
            }
        }
        self.world.print(out, indent, materials, options)
    }

    /// Wavefront OBJ of the flattened world
    pub fn print_obj(
        &self,
        out: &mut impl Write,
        counter: &mut ObjCounter,
        materials: &MaterialManager,
    ) -> fmt::Result {
        self.world.print_obj(out, counter, materials)
    }
}

impl Packable for GroupDefinitionMgr {
    fn pack(&self, buf: &mut PackBuffer) {
        self.world.pack(buf);
        buf.pack_count(self.defs.len());
        for def in &self.defs {
            def.pack(buf);
        }
    }

    fn pack_size(&self) -> usize {
        self.world.pack_size() + 4 + self.defs.iter().map(Packable::pack_size).sum::<usize>()
    }

    fn unpack(buf: &mut UnpackBuffer<'_>) -> Result<Self, PackError> {
        let mut mgr = Self { world: GroupDefinition::unpack(buf)?, defs: Vec::new() };
        for _ in 0..buf.unpack_count()? {
            mgr.add_group_def(GroupDefinition::unpack(buf)?);
        }
        Ok(mgr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Vec3, Vec4};
    use crate::group::GroupInstance;
    use crate::material::BzMaterial;
    use crate::obstacle::{make_guid, BoxBuilding, ConeObstacle, Teleporter};
    use crate::transform::MeshTransform;
    use approx::assert_relative_eq;

    fn shifted(group_def: &str, x: f32) -> GroupInstance {
        let mut xform = MeshTransform::new();
        xform.add_shift(Vec3::new(x, 0.0, 0.0));
        GroupInstance::with_transform(group_def, xform)
    }

    fn teleporter_world() -> GroupDefinitionMgr {
        let mut mgr = GroupDefinitionMgr::new();
        let mut t = GroupDefinition::new("T");
        t.add_obstacle(Teleporter::new(Vec3::zeros(), 0.0, Vec3::new(0.5, 5.0, 10.0), 1.0));
        mgr.add_group_def(t);
        mgr.world.add_group_instance(shifted("T", -50.0));
        mgr.world.add_group_instance(shifted("T", 50.0));
        mgr
    }

    #[test]
    fn test_instanced_teleporters_get_distinct_names() {
        let mut mgr = teleporter_world();
        mgr.make_world(&mut MaterialManager::new());
        let teles = mgr.world_list(ObstacleType::Teleporter);
        assert_eq!(teles.len(), 2);
        let names: Vec<&str> = teles.iter().map(|o| o.base().name.as_str()).collect();
        assert_eq!(names, vec!["T:$t0", "T:$t1"]);
        assert_relative_eq!(teles[0].base().pos.x, -50.0);
        assert_relative_eq!(teles[1].base().pos.x, 50.0);
    }

    #[test]
    fn test_make_world_is_repeatable() {
        let mut mgr = teleporter_world();
        let mut materials = MaterialManager::new();
        mgr.make_world(&mut materials);
        let first = mgr.world.clone();
        mgr.make_world(&mut materials);
        assert_eq!(mgr.world, first);
    }

    #[test]
    fn test_cycle_through_world_terminates() {
        let mut mgr = GroupDefinitionMgr::new();
        let mut a = GroupDefinition::new("A");
        a.add_obstacle(BoxBuilding::new(Vec3::zeros(), 0.0, Vec3::repeat(1.0)));
        a.add_group_instance(shifted("A", 10.0));
        mgr.add_group_def(a);
        mgr.world.add_group_instance(GroupInstance::new("A"));
        mgr.make_world(&mut MaterialManager::new());
        assert_eq!(mgr.world_list(ObstacleType::Box).len(), 1);
    }

    #[test]
    fn test_nested_transforms_compose_inner_first() {
        let mut mgr = GroupDefinitionMgr::new();
        let mut leaf = GroupDefinition::new("leaf");
        leaf.add_obstacle(BoxBuilding::new(Vec3::new(1.0, 0.0, 0.0), 0.0, Vec3::repeat(1.0)));
        mgr.add_group_def(leaf);

        let mut spin = MeshTransform::new();
        spin.add_spin(90.0, Vec3::z());
        let mut mid = GroupDefinition::new("mid");
        mid.add_group_instance(shifted("leaf", 10.0));
        mgr.add_group_def(mid);
        mgr.world.add_group_instance(GroupInstance::with_transform("mid", spin));

        mgr.make_world(&mut MaterialManager::new());
        let boxes = mgr.world_list(ObstacleType::Box);
        assert_eq!(boxes.len(), 1);
        // shifted to (11, 0) first, then spun about the origin
        assert_relative_eq!(boxes[0].base().pos, Vec3::new(0.0, 11.0, 0.0), epsilon = 1e-4);
    }

    #[test]
    fn test_world_containers_get_meshes_and_guids() {
        let mut mgr = GroupDefinitionMgr::new();
        mgr.add_world_obstacle(ConeObstacle::new(
            MeshTransform::new(),
            Vec3::zeros(),
            Vec3::new(4.0, 4.0, 6.0),
            0.0,
            360.0,
            8,
        ));
        mgr.add_world_obstacle(BoxBuilding::new(Vec3::new(20.0, 0.0, 0.0), 0.0, Vec3::repeat(1.0)));
        mgr.make_world(&mut MaterialManager::new());

        let meshes = mgr.world_list(ObstacleType::Mesh);
        assert_eq!(meshes.len(), 1);
        assert!(meshes[0].base().is_from_container());
        assert!(mgr.source_meshes().is_empty());

        let guid = make_guid(ObstacleType::Box, 0);
        assert_eq!(mgr.find_by_guid(guid).map(Obstacle::obstacle_type), Some(ObstacleType::Box));
        assert!(mgr.find_by_guid(make_guid(ObstacleType::Box, 1)).is_none());
    }

    #[test]
    fn test_instance_tint_reaches_faces() {
        let mut materials = MaterialManager::new();
        let mut grey = BzMaterial::new();
        grey.set_name("grey");
        let grey = materials.add_material(&grey);

        let mut mgr = GroupDefinitionMgr::new();
        let mut def = GroupDefinition::new("cone");
        let mut cone = ConeObstacle::new(
            MeshTransform::new(),
            Vec3::zeros(),
            Vec3::repeat(3.0),
            0.0,
            360.0,
            6,
        );
        cone.materials = [Some(grey); 4];
        cone.finalize();
        def.add_obstacle(cone);
        mgr.add_group_def(def);
        let mut inst = GroupInstance::new("cone");
        inst.tint = Some(Vec4::new(0.5, 0.5, 0.5, 1.0));
        mgr.world.add_group_instance(inst);
        mgr.make_world(&mut materials);

        assert_eq!(materials.len(), 2);
        let mesh = &mgr.world_list(ObstacleType::Mesh)[0];
        let Obstacle::Mesh(mesh) = mesh else { panic!("not a mesh") };
        assert!(mesh.faces.iter().all(|f| f.def.material != Some(grey)));
    }

    #[test]
    fn test_pack_round_trip_then_rebuild() {
        let mut mgr = teleporter_world();
        mgr.add_world_obstacle(BoxBuilding::new(
            Vec3::new(0.0, 30.0, 0.0),
            0.2,
            Vec3::new(4.0, 2.0, 3.0),
        ));
        let mut materials = MaterialManager::new();
        mgr.make_world(&mut materials);

        let bytes = mgr.to_bytes();
        assert_eq!(bytes.len(), mgr.pack_size());
        let mut back = GroupDefinitionMgr::from_bytes(&bytes).unwrap();
        assert_eq!(back.world.obstacle_count(), 1);
        back.make_world(&mut materials);
        assert_eq!(back.world, mgr.world);
    }

    #[test]
    fn test_grouped_and_flat_printing() {
        let mut mgr = teleporter_world();
        mgr.make_world(&mut MaterialManager::new());
        let materials = MaterialManager::new();

        let mut grouped = String::new();
        mgr.print(&mut grouped, "", &materials, PrintOptions::default()).unwrap();
        assert!(grouped.starts_with("define T\n  teleporter\n"));
        assert_eq!(grouped.matches("group T\n").count(), 2);
        assert_eq!(grouped.matches("teleporter").count(), 1);

        let mut flat = String::new();
        let options = PrintOptions { flat: true, ..PrintOptions::default() };
        mgr.print(&mut flat, "", &materials, options).unwrap();
        assert!(!flat.contains("define"));
        assert!(!flat.contains("group"));
        assert_eq!(flat.matches("teleporter ").count(), 2);
        assert!(flat.contains("teleporter T:$t1\n"));
    }

    #[test]
    fn test_unnamed_definitions_are_rejected() {
        let mut mgr = GroupDefinitionMgr::new();
        assert!(!mgr.add_group_def(GroupDefinition::new("")));
        assert!(mgr.find_group_def("").is_none());
        assert!(mgr.add_group_def(GroupDefinition::new("x")));
        assert!(mgr.find_group_def("x").is_some());
    }
}
