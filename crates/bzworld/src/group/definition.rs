//! Named collections of obstacles and nested instances

use std::fmt::{self, Write};

use log::{debug, warn};

use super::expansion::Expansion;
use super::instance::GroupInstance;
use super::modifier::ObstacleModifier;
use crate::export::obj::ObjCounter;
use crate::material::MaterialManager;
use crate::obstacle::{BoxBuilding, MeshObstacle, Obstacle, ObstacleSource, ObstacleType};
use crate::pack::{string_pack_size, PackBuffer, PackError, Packable, UnpackBuffer};
use crate::transform::MeshTransform;

/// How world text is laid out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrintOptions {
    /// Print containers as the meshes they generate
    pub as_meshes: bool,
    /// Print the expanded world with no definitions or instances
    pub flat: bool,
}

/// A group definition
///
/// Obstacles are kept in one list per [`ObstacleType`]. The definition with
/// an empty name is the world: the root of expansion, which is never
/// instanced by reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupDefinition {
    /// Definition name; empty for the world
    pub name: String,
    lists: [Vec<Obstacle>; ObstacleType::COUNT],
    /// Instances of other definitions
    pub groups: Vec<GroupInstance>,
}

impl GroupDefinition {
    /// Empty definition called `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// The unnamed root definition
    pub fn is_world(&self) -> bool {
        self.name.is_empty()
    }

    /// Store an obstacle in the list of its kind
    pub fn add_obstacle(&mut self, obstacle: impl Into<Obstacle>) {
        let obstacle = obstacle.into();
        self.lists[obstacle.obstacle_type().index()].push(obstacle);
    }

    /// Queue an instance for expansion
    pub fn add_group_instance(&mut self, instance: GroupInstance) {
        self.groups.push(instance);
    }

    /// Obstacles of one kind
    pub fn list(&self, kind: ObstacleType) -> &[Obstacle] {
        &self.lists[kind.index()]
    }

    /// Mutable list of one kind
    pub fn list_mut(&mut self, kind: ObstacleType) -> &mut Vec<Obstacle> {
        &mut self.lists[kind.index()]
    }

    /// Every obstacle, kind by kind
    pub fn obstacles(&self) -> impl Iterator<Item = &Obstacle> {
        self.lists.iter().flatten()
    }

    /// Every obstacle, mutably
    pub fn obstacles_mut(&mut self) -> impl Iterator<Item = &mut Obstacle> {
        self.lists.iter_mut().flatten()
    }

    /// Obstacles over all kinds
    pub fn obstacle_count(&self) -> usize {
        self.lists.iter().map(Vec::len).sum()
    }

    /// Remove every obstacle and instance
    pub fn clear(&mut self) {
        for list in &mut self.lists {
            list.clear();
        }
        self.groups.clear();
    }

    /// Drop everything an expansion produced, keeping authored content
    pub fn clear_expansion(&mut self) {
        for list in &mut self.lists {
            list.retain(|o| o.base().is_from_world());
        }
    }

    /// Expand into `ctx.output`
    ///
    /// Every obstacle is copied through `xform`, checked, tagged as coming
    /// from a group definition and modified. Nested instances are expanded
    /// with their transform run before `xform` and their overrides composed
    /// on top of `modifier`. Invalid copies and unknown definitions are
    /// skipped; a definition reached again while it is being expanded is not
    /// expanded a second time.
    pub fn make_groups(
        &self,
        xform: &MeshTransform,
        modifier: &ObstacleModifier,
        ctx: &mut Expansion<'_>,
    ) {
        if !ctx.enter(self) {
            return;
        }

        for template in self.obstacles() {
            let copy = template.copy_with_transform(xform);
            if copy.is_valid() {
                ctx.place(copy, ObstacleSource::GROUP_DEF, modifier);
            } else {
                debug!(
                    "dropped invalid {} from group definition {:?}",
                    copy.obstacle_type().name(),
                    self.name,
                );
            }
        }

        for inst in &self.groups {
            let Some(def) = ctx.find(&inst.group_def) else {
                warn!(
                    "group definition {:?} not found, instance in {:?} skipped",
                    inst.group_def,
                    self.name,
                );
                continue;
            };
            let child_modifier = ObstacleModifier::compose(modifier, inst);
            let mut child_xform = xform.clone();
            child_xform.prepend(&inst.transform);
            let saved = ctx.push_path(inst.path_segment());
            def.make_groups(&child_xform, &child_modifier, ctx);
            ctx.pop_path(saved);
        }

        ctx.leave(self);
    }

    /// Turn every base into a plain box with the same geometry
    pub fn replace_bases_with_boxes(&mut self) {
        let bases = std::mem::take(self.list_mut(ObstacleType::Base));
        for obstacle in bases {
            if let Obstacle::Base(base) = obstacle {
                let mut b = BoxBuilding::new(base.base.pos, base.base.angle, base.base.size);
                b.base.drive_through = base.base.drive_through;
                b.base.shoot_through = base.base.shoot_through;
                b.base.source = base.base.source;
                b.base.name = base.base.name;
                self.add_obstacle(b);
            }
        }
    }

    /// Remove obstacles that fail their validity check; returns how many
    pub fn delete_invalid_obstacles(&mut self) -> usize {
        let mut removed = 0;
        for list in &mut self.lists {
            let before = list.len();
            list.retain(Obstacle::is_valid);
            removed += before - list.len();
        }
        if removed > 0 {
            debug!("deleted {removed} invalid obstacles from {:?}", self.name);
        }
        removed
    }

    /// Number each list from zero, for [`make_guid`](crate::obstacle::make_guid)
    pub fn assign_list_ids(&mut self) {
        for list in &mut self.lists {
            for (index, obstacle) in list.iter_mut().enumerate() {
                obstacle.base_mut().list_id = u16::try_from(index).unwrap_or_else(|_| {
                    warn!("obstacle list longer than {} entries", u16::MAX);
                    u16::MAX
                });
            }
        }
    }

    /// Authored meshes, not those generated by containers
    pub fn source_meshes(&self) -> impl Iterator<Item = &MeshObstacle> {
        self.list(ObstacleType::Mesh).iter().filter_map(|o| match o {
            Obstacle::Mesh(m) if !m.base.is_from_container() => Some(m),
            _ => None,
        })
    }

    fn print_obstacle(
        obstacle: &Obstacle,
        out: &mut impl Write,
        indent: &str,
        materials: &MaterialManager,
        as_meshes: bool,
    ) -> fmt::Result {
        if as_meshes {
            if let Some(mesh) = obstacle.container_mesh() {
                return mesh.print(out, indent, materials);
            }
        }
        obstacle.print(out, indent, materials)
    }

    /// World-file text
    ///
    /// A named definition prints as a `define` block. The world prints its
    /// authored obstacles and instances, or with `flat` every expanded
    /// obstacle and no instances. Container meshes are never printed; the
    /// container that generates them is.
    pub fn print(
        &self,
        out: &mut impl Write,
        indent: &str,
        materials: &MaterialManager,
        options: PrintOptions,
    ) -> fmt::Result {
        let world = self.is_world();
        let inner = if world { indent.to_string() } else { format!("{indent}  ") };
        if !world {
            writeln!(out, "{indent}define {}", self.name)?;
        }

        for obstacle in self.obstacles() {
            let base = obstacle.base();
            if base.is_from_container() || (world && !options.flat && !base.is_from_world()) {
                continue;
            }
            Self::print_obstacle(obstacle, out, &inner, materials, options.as_meshes)?;
        }
        if !(world && options.flat) {
            for inst in &self.groups {
                inst.print(out, &inner, materials)?;
            }
        }

        if !world {
            writeln!(out, "{indent}enddef")?;
            writeln!(out)?;
        }
        Ok(())
    }

    /// Wavefront OBJ for every obstacle; containers appear through their meshes
    pub fn print_obj(
        &self,
        out: &mut impl Write,
        counter: &mut ObjCounter,
        materials: &MaterialManager,
    ) -> fmt::Result {
        for obstacle in self.obstacles().filter(|o| !o.obstacle_type().is_container()) {
            obstacle.print_obj(out, counter, materials)?;
        }
        Ok(())
    }
}

impl Packable for GroupDefinition {
    /// Only authored obstacles are written; expansion output is rebuilt
    /// after unpacking
    fn pack(&self, buf: &mut PackBuffer) {
        buf.pack_string(&self.name);
        for list in &self.lists {
            let authored: Vec<&Obstacle> =
                list.iter().filter(|o| o.base().is_from_world()).collect();
            buf.pack_count(authored.len());
            for obstacle in authored {
                obstacle.pack(buf);
            }
        }
        buf.pack_count(self.groups.len());
        for inst in &self.groups {
            inst.pack(buf);
        }
    }

    fn pack_size(&self) -> usize {
        let obstacles: usize = self
            .obstacles()
            .filter(|o| o.base().is_from_world())
            .map(Obstacle::pack_size)
            .sum();
        let groups: usize = self.groups.iter().map(Packable::pack_size).sum();
        string_pack_size(&self.name) + 4 * ObstacleType::COUNT + obstacles + 4 + groups
    }

    fn unpack(buf: &mut UnpackBuffer<'_>) -> Result<Self, PackError> {
        let mut def = Self::new(buf.unpack_string()?);
        for kind in ObstacleType::ALL {
            for _ in 0..buf.unpack_count()? {
                let obstacle = Obstacle::unpack_kind(kind, buf)?;
                if obstacle.is_valid() {
                    def.add_obstacle(obstacle);
                } else {
                    debug!("dropped invalid unpacked {}", kind.name());
                }
            }
        }
        for _ in 0..buf.unpack_count()? {
            def.add_group_instance(GroupInstance::unpack(buf)?);
        }
        Ok(def)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::obstacle::{ArcObstacle, BaseBuilding, PyramidBuilding, Teleporter};

    fn expand(
        def: &GroupDefinition,
        defs: &[GroupDefinition],
    ) -> (GroupDefinition, MaterialManager) {
        let mut materials = MaterialManager::new();
        let mut world = GroupDefinition::new("");
        let mut ctx = Expansion::new(defs, &mut materials, &mut world);
        def.make_groups(&MeshTransform::new(), &ObstacleModifier::new(), &mut ctx);
        drop(ctx);
        (world, materials)
    }

    #[test]
    fn test_copies_are_placed_and_tagged() {
        let mut def = GroupDefinition::new("post");
        def.add_obstacle(BoxBuilding::new(Vec3::zeros(), 0.0, Vec3::new(1.0, 1.0, 5.0)));
        let mut materials = MaterialManager::new();
        let mut world = GroupDefinition::new("");
        let mut xform = MeshTransform::new();
        xform.add_shift(Vec3::new(20.0, 0.0, 0.0));
        let mut ctx = Expansion::new(&[], &mut materials, &mut world);
        def.make_groups(&xform, &ObstacleModifier::new(), &mut ctx);
        drop(ctx);

        let boxes = world.list(ObstacleType::Box);
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].base().pos, Vec3::new(20.0, 0.0, 0.0));
        assert_eq!(boxes[0].base().source, ObstacleSource::GROUP_DEF);
    }

    #[test]
    fn test_self_reference_stops() {
        let mut a = GroupDefinition::new("A");
        a.add_obstacle(PyramidBuilding::new(Vec3::zeros(), 0.0, Vec3::repeat(2.0)));
        a.add_group_instance(GroupInstance::new("A"));
        let defs = vec![a];
        let (world, _) = expand(&defs[0], &defs);
        assert_eq!(world.obstacle_count(), 1);
    }

    #[test]
    fn test_missing_definition_is_skipped() {
        let mut def = GroupDefinition::new("outer");
        def.add_group_instance(GroupInstance::new("nowhere"));
        def.add_obstacle(BoxBuilding::new(Vec3::zeros(), 0.0, Vec3::repeat(1.0)));
        let (world, _) = expand(&def, &[]);
        assert_eq!(world.obstacle_count(), 1);
    }

    #[test]
    fn test_container_mesh_follows_container() {
        let mut def = GroupDefinition::new("ring");
        def.add_obstacle(ArcObstacle::new(
            MeshTransform::new(),
            Vec3::zeros(),
            Vec3::new(10.0, 10.0, 2.0),
            0.0,
            360.0,
            0.5,
            8,
        ));
        let (world, _) = expand(&def, &[]);
        assert_eq!(world.list(ObstacleType::Arc).len(), 1);
        let meshes = world.list(ObstacleType::Mesh);
        assert_eq!(meshes.len(), 1);
        assert_eq!(meshes[0].base().source, ObstacleSource::GROUP_DEF | ObstacleSource::CONTAINER);
        assert_eq!(world.source_meshes().count(), 0);
    }

    #[test]
    fn test_invalid_copies_are_dropped() {
        let mut def = GroupDefinition::new("bad");
        def.add_obstacle(BoxBuilding::new(Vec3::new(f32::NAN, 0.0, 0.0), 0.0, Vec3::repeat(1.0)));
        let (world, _) = expand(&def, &[]);
        assert_eq!(world.obstacle_count(), 0);
    }

    #[test]
    fn test_replace_bases_with_boxes() {
        let mut def = GroupDefinition::new("");
        let mut base = BaseBuilding::new(
            Vec3::new(1.0, 2.0, 0.0),
            0.5,
            Vec3::new(3.0, 3.0, 1.0),
            2,
        );
        base.base.drive_through = 0xFF;
        def.add_obstacle(base);
        def.replace_bases_with_boxes();
        assert!(def.list(ObstacleType::Base).is_empty());
        let boxes = def.list(ObstacleType::Box);
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].base().angle, 0.5);
        assert!(boxes[0].base().is_drive_through());
    }

    #[test]
    fn test_pack_keeps_only_authored_obstacles() {
        let mut def = GroupDefinition::new("gate");
        def.add_obstacle(Teleporter::new(Vec3::zeros(), 0.0, Vec3::new(0.5, 5.0, 10.0), 1.0));
        let mut produced = BoxBuilding::new(Vec3::zeros(), 0.0, Vec3::repeat(1.0));
        produced.base.source = ObstacleSource::GROUP_DEF;
        def.add_obstacle(produced);
        def.add_group_instance(GroupInstance::new("other"));

        let bytes = def.to_bytes();
        assert_eq!(bytes.len(), def.pack_size());
        let back = GroupDefinition::from_bytes(&bytes).unwrap();
        assert_eq!(back.name, "gate");
        assert_eq!(back.list(ObstacleType::Teleporter).len(), 1);
        assert!(back.list(ObstacleType::Box).is_empty());
        assert_eq!(back.groups, def.groups);
    }

    #[test]
    fn test_print_define_block() {
        let mut def = GroupDefinition::new("post");
        def.add_obstacle(BoxBuilding::new(Vec3::zeros(), 0.0, Vec3::repeat(1.0)));
        def.add_group_instance(GroupInstance::new("cap"));
        let mut text = String::new();
        def.print(&mut text, "", &MaterialManager::new(), PrintOptions::default()).unwrap();
        assert!(text.starts_with("define post\n  box\n"));
        assert!(text.contains("  group cap\n"));
        assert!(text.ends_with("enddef\n\n"));
    }

    #[test]
    fn test_assign_list_ids() {
        let mut def = GroupDefinition::new("");
        for i in 0..3 {
            def.add_obstacle(BoxBuilding::new(
                Vec3::new(i as f32 * 5.0, 0.0, 0.0),
                0.0,
                Vec3::repeat(1.0),
            ));
        }
        def.assign_list_ids();
        let ids: Vec<u16> = def.list(ObstacleType::Box).iter().map(|o| o.base().list_id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }
}
