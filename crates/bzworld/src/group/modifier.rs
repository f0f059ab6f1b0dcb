//! Attribute overrides accumulated through nested group instances
//!
//! A modifier is built per expansion frame from the parent frame's modifier
//! and the instance being expanded, then applied to every obstacle the frame
//! produces. Composition treats each attribute independently: the child's
//! value wins, tints multiply, substitution maps chain (the parent's result
//! is looked up again in the child's map), and pass-through flags OR.

use std::collections::BTreeMap;

use crate::foundation::math::Vec4;
use crate::material::{MaterialId, MaterialManager, MaterialMap, MaterialRef};
use crate::obstacle::{MeshObstacle, Obstacle};

use super::instance::{GroupInstance, PhysicsDriverMap};

/// Overrides applied to obstacles produced by group expansion
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObstacleModifier {
    /// Team forced onto bases
    pub team: Option<u16>,
    /// Colour multiplier
    pub tint: Option<Vec4>,
    /// Physics driver forced onto every face
    pub phydrv: Option<i32>,
    /// Physics driver swaps
    pub phydrv_map: PhysicsDriverMap,
    /// Material forced onto every face
    pub material: Option<MaterialId>,
    /// Material swaps
    pub material_map: MaterialMap,
    /// Tanks pass through
    pub drive_through: bool,
    /// Shots pass through
    pub shoot_through: bool,
    /// Shots bounce
    pub ricochet: bool,
}

/// Chain `child` after `parent`: every parent target is looked up again in
/// `child`, and child entries for sources the parent never mentions are kept
fn chain_maps<K: Ord + Copy>(parent: &BTreeMap<K, K>, child: &BTreeMap<K, K>) -> BTreeMap<K, K> {
    let mut chained: BTreeMap<K, K> = parent
        .iter()
        .map(|(src, dst)| (*src, child.get(dst).copied().unwrap_or(*dst)))
        .collect();
    for (src, dst) in child {
        chained.entry(*src).or_insert(*dst);
    }
    chained
}

impl ObstacleModifier {
    /// The modifier that changes nothing
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides of `inst` applied on top of `parent`
    pub fn compose(parent: &Self, inst: &GroupInstance) -> Self {
        let tint = match (parent.tint, inst.tint) {
            (Some(p), Some(c)) => Some(p.component_mul(&c)),
            (p, c) => c.or(p),
        };

        let (material, material_map) = if inst.material.is_some() {
            (inst.material, MaterialMap::new())
        } else if inst.material_map.is_empty() {
            (parent.material, parent.material_map.clone())
        } else if let Some(m) = parent.material {
            (Some(inst.material_map.get(&m).copied().unwrap_or(m)), MaterialMap::new())
        } else {
            (None, chain_maps(&parent.material_map, &inst.material_map))
        };

        let (phydrv, phydrv_map) = if inst.phydrv.is_some() {
            (inst.phydrv, PhysicsDriverMap::new())
        } else if inst.phydrv_map.is_empty() {
            (parent.phydrv, parent.phydrv_map.clone())
        } else if let Some(p) = parent.phydrv {
            (Some(inst.phydrv_map.get(&p).copied().unwrap_or(p)), PhysicsDriverMap::new())
        } else {
            (None, chain_maps(&parent.phydrv_map, &inst.phydrv_map))
        };

        Self {
            team: inst.team.or(parent.team),
            tint,
            phydrv,
            phydrv_map,
            material,
            material_map,
            drive_through: parent.drive_through || inst.drive_through,
            shoot_through: parent.shoot_through || inst.shoot_through,
            ricochet: parent.ricochet || inst.ricochet,
        }
    }

    /// Modifier of a top-level instance
    pub fn for_instance(inst: &GroupInstance) -> Self {
        Self::compose(&Self::new(), inst)
    }

    /// Nothing would change
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    fn changes_materials(&self) -> bool {
        self.material.is_some() || !self.material_map.is_empty() || self.tint.is_some()
    }

    fn changes_phydrv(&self) -> bool {
        self.phydrv.is_some() || !self.phydrv_map.is_empty()
    }

    /// Material a surface ends up with; tinted variants are registered
    fn resolve_material(
        &self,
        material: MaterialRef,
        materials: &mut MaterialManager,
    ) -> MaterialRef {
        let swapped = self
            .material
            .or_else(|| material.map(|id| self.material_map.get(&id).copied().unwrap_or(id)));
        match &self.tint {
            Some(tint) => Some(materials.tinted(swapped, tint)),
            None => swapped,
        }
    }

    fn resolve_phydrv(&self, phydrv: i32) -> i32 {
        self.phydrv
            .unwrap_or_else(|| self.phydrv_map.get(&phydrv).copied().unwrap_or(phydrv))
    }

    fn apply_to_mesh(&self, mesh: &mut MeshObstacle, materials: &mut MaterialManager) {
        for face in &mut mesh.faces {
            if self.changes_materials() {
                face.def.material = self.resolve_material(face.def.material, materials);
            }
            if self.changes_phydrv() {
                face.def.phydrv = self.resolve_phydrv(face.def.phydrv);
            }
            face.def.drive_through |= self.drive_through;
            face.def.shoot_through |= self.shoot_through;
            face.def.ricochet |= self.ricochet;
        }
    }

    fn apply_to_slots(
        &self,
        slots: &mut [MaterialRef],
        phydrv: &mut i32,
        materials: &mut MaterialManager,
    ) {
        if self.changes_materials() {
            for slot in slots {
                *slot = self.resolve_material(*slot, materials);
            }
        }
        if self.changes_phydrv() {
            *phydrv = self.resolve_phydrv(*phydrv);
        }
    }

    /// Apply the overrides to an obstacle produced by expansion
    pub fn execute(&self, obstacle: &mut Obstacle, materials: &mut MaterialManager) {
        if self.is_empty() {
            return;
        }

        let base = obstacle.base_mut();
        if self.drive_through {
            base.drive_through = 0xFF;
        }
        if self.shoot_through {
            base.shoot_through = 0xFF;
        }
        base.ricochet |= self.ricochet;

        match obstacle {
            Obstacle::Base(b) => {
                if let Some(team) = self.team {
                    b.team = team;
                }
            }
            Obstacle::Mesh(m) => self.apply_to_mesh(m, materials),
            Obstacle::Arc(a) => {
                self.apply_to_slots(&mut a.materials, &mut a.phydrv, materials);
                a.finalize();
            }
            Obstacle::Cone(c) => {
                self.apply_to_slots(&mut c.materials, &mut c.phydrv, materials);
                c.finalize();
            }
            Obstacle::Sphere(s) => {
                self.apply_to_slots(&mut s.materials, &mut s.phydrv, materials);
                s.finalize();
            }
            Obstacle::Tetra(t) => {
                self.apply_to_slots(&mut t.materials, &mut t.phydrv, materials);
                t.finalize();
            }
            Obstacle::Box(_) | Obstacle::Pyramid(_) | Obstacle::Teleporter(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use crate::material::BzMaterial;
    use crate::obstacle::{BaseBuilding, ConeObstacle};
    use crate::transform::MeshTransform;
    use approx::assert_relative_eq;

    fn tinted(tint: Vec4) -> GroupInstance {
        GroupInstance { tint: Some(tint), ..GroupInstance::new("g") }
    }

    #[test]
    fn test_tints_multiply() {
        let parent = ObstacleModifier::for_instance(&tinted(Vec4::new(0.5, 0.5, 0.5, 1.0)));
        let child = ObstacleModifier::compose(&parent, &tinted(Vec4::new(2.0, 1.0, 1.0, 1.0)));
        assert_relative_eq!(child.tint.unwrap(), Vec4::new(1.0, 0.5, 0.5, 1.0));
    }

    #[test]
    fn test_child_values_win_and_flags_or() {
        let mut outer = GroupInstance::new("outer");
        outer.team = Some(1);
        outer.phydrv = Some(4);
        outer.drive_through = true;
        let mut inner = GroupInstance::new("inner");
        inner.team = Some(2);
        inner.ricochet = true;
        let m = ObstacleModifier::compose(&ObstacleModifier::for_instance(&outer), &inner);
        assert_eq!(m.team, Some(2));
        assert_eq!(m.phydrv, Some(4));
        assert!(m.drive_through && m.ricochet && !m.shoot_through);
    }

    #[test]
    fn test_material_maps_chain() {
        let (a, b, c, d) = (MaterialId(0), MaterialId(1), MaterialId(2), MaterialId(3));
        let mut outer = GroupInstance::new("outer");
        outer.add_material_swap(a, b);
        let mut inner = GroupInstance::new("inner");
        inner.add_material_swap(b, c);
        inner.add_material_swap(d, a);
        let m = ObstacleModifier::compose(&ObstacleModifier::for_instance(&outer), &inner);
        assert_eq!(m.material_map.get(&a), Some(&c));
        assert_eq!(m.material_map.get(&d), Some(&a));
        assert_eq!(m.material, None);
    }

    #[test]
    fn test_blanket_material_wins_then_maps_apply_to_it() {
        let (a, b, c) = (MaterialId(0), MaterialId(1), MaterialId(2));
        let mut outer = GroupInstance::new("outer");
        outer.material = Some(a);
        let mut inner = GroupInstance::new("inner");
        inner.add_material_swap(a, b);
        let m = ObstacleModifier::compose(&ObstacleModifier::for_instance(&outer), &inner);
        assert_eq!(m.material, Some(b));

        let mut innermost = GroupInstance::new("innermost");
        innermost.material = Some(c);
        let m = ObstacleModifier::compose(&m, &innermost);
        assert_eq!(m.material, Some(c));
        assert!(m.material_map.is_empty());
    }

    #[test]
    fn test_phydrv_maps_chain() {
        let mut outer = GroupInstance::new("outer");
        outer.add_phydrv_swap(1, 2);
        let mut inner = GroupInstance::new("inner");
        inner.add_phydrv_swap(2, 3);
        let m = ObstacleModifier::compose(&ObstacleModifier::for_instance(&outer), &inner);
        assert_eq!(m.resolve_phydrv(1), 3);
        assert_eq!(m.resolve_phydrv(7), 7);
    }

    #[test]
    fn test_execute_on_base_and_mesh() {
        let mut materials = MaterialManager::new();
        let mut grey = BzMaterial::new();
        grey.set_name("grey");
        let grey = materials.add_material(&grey);

        let mut inst = GroupInstance::new("g");
        inst.team = Some(4);
        inst.material = Some(grey);
        inst.shoot_through = true;
        let m = ObstacleModifier::for_instance(&inst);

        let mut base: Obstacle = BaseBuilding::new(Vec3::zeros(), 0.0, Vec3::repeat(5.0), 1).into();
        m.execute(&mut base, &mut materials);
        match &base {
            Obstacle::Base(b) => assert_eq!(b.team, 4),
            other => panic!("unexpected {other:?}"),
        }
        assert!(base.base().is_shoot_through() && !base.is_passable());

        let mut mesh: Obstacle = crate::obstacle::mesh::test_cube(Vec3::zeros(), 1.0).into();
        m.execute(&mut mesh, &mut materials);
        let Obstacle::Mesh(mesh) = mesh else { panic!("kind changed") };
        assert!(mesh.faces.iter().all(|f| f.def.material == Some(grey) && f.def.shoot_through));
    }

    #[test]
    fn test_tint_registers_material_for_container_slots() {
        let mut materials = MaterialManager::new();
        let m = ObstacleModifier::for_instance(&tinted(Vec4::new(1.0, 0.0, 0.0, 1.0)));
        let mut cone: Obstacle =
            ConeObstacle::new(
                MeshTransform::new(),
                Vec3::zeros(),
                Vec3::repeat(2.0),
                0.0,
                360.0,
                6,
            ).into();
        m.execute(&mut cone, &mut materials);
        assert_eq!(materials.len(), 1);
        let mesh = cone.container_mesh().unwrap();
        assert!(mesh.faces.iter().all(|f| f.def.material == Some(MaterialId(0))));
    }

    #[test]
    fn test_empty_modifier_leaves_obstacle_alone() {
        let mut materials = MaterialManager::new();
        let mut mesh: Obstacle = crate::obstacle::mesh::test_cube(Vec3::zeros(), 1.0).into();
        let before = mesh.clone();
        ObstacleModifier::new().execute(&mut mesh, &mut materials);
        assert_eq!(mesh, before);
        assert!(materials.is_empty());
    }
}
