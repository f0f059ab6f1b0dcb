//! Uniform broad-phase grid over the world footprint

use log::debug;

use crate::config::state::{GRID_SIZE_X, GRID_SIZE_Y, TANK_HEIGHT, WORLD_SIZE};
use crate::config::StateStore;
use crate::foundation::math::Vec3;
use crate::geometry::intersect;
use crate::group::GroupDefinition;
use crate::obstacle::{Obstacle, ObstacleBase, ObstacleType};

/// Tank height used while bucketing, so every obstacle counts as reachable
const UNBOUNDED_HEIGHT: f32 = 1.0e30;

const DEFAULT_WORLD_SIZE: f32 = 800.0;
const DEFAULT_GRID_SIZE: f32 = 16.0;

/// Kinds the grid indexes; containers are present through their meshes
pub const GRID_KINDS: [ObstacleType; 5] = [
    ObstacleType::Box,
    ObstacleType::Pyramid,
    ObstacleType::Base,
    ObstacleType::Teleporter,
    ObstacleType::Mesh,
];

/// Position of an obstacle in the world lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObstacleKey {
    /// Kind list the obstacle lives in
    pub kind: ObstacleType,
    /// Index within that list
    pub index: usize,
}

/// One grid cell and the obstacles that may touch it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollisionCell {
    /// Centre of the cell on the ground
    pub pos: Vec3,
    /// Obstacles whose padded footprint reaches the cell
    pub objs: Vec<ObstacleKey>,
}

/// `grid_x × grid_y` cells covering the square `[-W/2, W/2]²`
///
/// Obstacles are assigned by their rotation-padded bounding circle, which
/// over-includes near cell corners; the narrow-phase queries reject the
/// extras.
#[derive(Debug, Clone, Default)]
pub struct CollisionGrid {
    world_size: f32,
    grid_x: usize,
    grid_y: usize,
    sx: f32,
    sy: f32,
    cells: Vec<CollisionCell>,
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn grid_dimension(state: &StateStore, key: &str) -> usize {
    (state.eval_or(key, DEFAULT_GRID_SIZE).max(1.0)) as usize
}

/// Index of the cell holding `coord`, clamped into `0..count`
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn cell_index(coord: f32, half_world: f32, pitch: f32, count: usize) -> usize {
    let cell = ((coord + half_world) / pitch).floor();
    if cell.is_nan() || cell < 0.0 {
        0
    } else {
        (cell as usize).min(count - 1)
    }
}

impl CollisionGrid {
    /// Empty grid; call `load` to fill it
    pub fn new() -> Self {
        Self::default()
    }

    /// Side of the covered square
    pub fn world_size(&self) -> f32 {
        self.world_size
    }

    /// Cell counts along x and y
    pub fn dimensions(&self) -> (usize, usize) {
        (self.grid_x, self.grid_y)
    }

    /// Cell pitch along x and y
    pub fn cell_size(&self) -> (f32, f32) {
        (self.sx, self.sy)
    }

    /// Cell at column `i`, row `j`
    pub fn cell(&self, i: usize, j: usize) -> Option<&CollisionCell> {
        if i < self.grid_x && j < self.grid_y {
            self.cells.get(j * self.grid_x + i)
        } else {
            None
        }
    }

    /// Every cell, row by row
    pub fn cells(&self) -> &[CollisionCell] {
        &self.cells
    }

    /// Drop every cell
    pub fn clear(&mut self) {
        self.cells.clear();
    }

    /// Column test: the footprint circle meets the cell and the obstacle
    /// starts within a tank's height of the ground
    fn touches(&self, cell: &CollisionCell, base: &ObstacleBase, tank_height: f32) -> bool {
        let radius = base.size.x.hypot(base.size.y);
        base.pos.z <= cell.pos.z + tank_height
            && intersect::test_rect_circle(
                cell.pos,
                0.0,
                0.5 * self.sx,
                0.5 * self.sy,
                base.pos,
                radius,
            )
    }

    /// Rebuild every cell from the flattened world
    ///
    /// The tank height is raised to an unbounded value for the duration of
    /// the load, so the column test only looks at footprints.
    #[allow(clippy::cast_precision_loss)]
    pub fn load(&mut self, world: &GroupDefinition, state: &mut StateStore) {
        self.world_size = state.eval_or(WORLD_SIZE, DEFAULT_WORLD_SIZE);
        self.grid_x = grid_dimension(state, GRID_SIZE_X);
        self.grid_y = grid_dimension(state, GRID_SIZE_Y);
        self.sx = self.world_size / self.grid_x as f32;
        self.sy = self.world_size / self.grid_y as f32;

        let half = 0.5 * self.world_size;
        self.cells = (0..self.grid_y)
            .flat_map(|j| (0..self.grid_x).map(move |i| (i, j)))
            .map(|(i, j)| CollisionCell {
                pos: Vec3::new(
                    -half + (i as f32 + 0.5) * self.sx,
                    -half + (j as f32 + 0.5) * self.sy,
                    0.0,
                ),
                objs: Vec::new(),
            })
            .collect();

        let state = state.scoped_override(TANK_HEIGHT, UNBOUNDED_HEIGHT.to_string());
        let tank_height = state.eval_or(TANK_HEIGHT, UNBOUNDED_HEIGHT);

        let mut cells = std::mem::take(&mut self.cells);
        for kind in GRID_KINDS {
            for (index, obstacle) in world.list(kind).iter().enumerate() {
                let key = ObstacleKey { kind, index };
                for cell in &mut cells {
                    if self.touches(cell, obstacle.base(), tank_height) {
                        cell.objs.push(key);
                    }
                }
            }
        }
        self.cells = cells;

        let filled = self.cells.iter().filter(|c| !c.objs.is_empty()).count();
        debug!("collision grid {}x{}: {filled} cells in use", self.grid_x, self.grid_y);
    }

    /// Non-empty cells meeting the square around a circle
    pub fn get_cells(&self, pos: Vec3, radius: f32) -> Vec<&CollisionCell> {
        if self.cells.is_empty() {
            return Vec::new();
        }
        let half = 0.5 * self.world_size;
        let x0 = cell_index(pos.x - radius, half, self.sx, self.grid_x);
        let x1 = cell_index(pos.x + radius, half, self.sx, self.grid_x);
        let y0 = cell_index(pos.y - radius, half, self.sy, self.grid_y);
        let y1 = cell_index(pos.y + radius, half, self.sy, self.grid_y);

        (y0..=y1)
            .flat_map(|j| (x0..=x1).map(move |i| (i, j)))
            .filter_map(|(i, j)| self.cell(i, j))
            .filter(|c| !c.objs.is_empty())
            .collect()
    }

    /// Obstacles listed in the cells a circle may touch, each once
    pub fn get_obstacles<'w>(
        &self,
        world: &'w GroupDefinition,
        pos: Vec3,
        radius: f32,
    ) -> Vec<&'w Obstacle> {
        let mut keys: Vec<ObstacleKey> = self
            .get_cells(pos, radius)
            .into_iter()
            .flat_map(|c| c.objs.iter().copied())
            .collect();
        keys.sort_unstable();
        keys.dedup();
        keys.into_iter()
            .filter_map(|k| world.list(k.kind).get(k.index))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use crate::obstacle::{BoxBuilding, PyramidBuilding};

    fn loaded(world: &GroupDefinition) -> (CollisionGrid, StateStore) {
        let mut state = StateStore::from_config(&WorldConfig::default());
        let mut grid = CollisionGrid::new();
        grid.load(world, &mut state);
        (grid, state)
    }

    /// Distance from the origin to the nearest point of a cell
    fn cell_distance(cell: &CollisionCell, half: f32) -> f32 {
        let dx = (cell.pos.x.abs() - half).max(0.0);
        let dy = (cell.pos.y.abs() - half).max(0.0);
        dx.hypot(dy)
    }

    #[test]
    fn test_box_fills_cells_within_its_radius() {
        let mut world = GroupDefinition::new("");
        world.add_obstacle(BoxBuilding::new(Vec3::zeros(), 0.0, Vec3::new(50.0, 50.0, 10.0)));
        let (grid, _) = loaded(&world);
        assert_eq!(grid.dimensions(), (16, 16));
        assert_eq!(grid.cell_size(), (50.0, 50.0));

        let radius = 50.0_f32.hypot(50.0);
        for cell in grid.cells() {
            let d = cell_distance(cell, 25.0);
            // cells whose corner lies on the circle could go either way
            if d < radius - 0.5 {
                assert_eq!(cell.objs.len(), 1, "{:?}", cell.pos);
            } else if d > radius + 0.5 {
                assert!(cell.objs.is_empty(), "{:?}", cell.pos);
            }
        }
        let filled = grid.cells().iter().filter(|c| !c.objs.is_empty()).count();
        assert!((12..=16).contains(&filled));
    }

    #[test]
    fn test_tank_height_is_restored() {
        let world = GroupDefinition::new("");
        let (_, state) = loaded(&world);
        assert_eq!(state.eval(TANK_HEIGHT), Some(2.05));
    }

    #[test]
    fn test_raised_obstacles_still_bucketed() {
        let mut world = GroupDefinition::new("");
        world.add_obstacle(PyramidBuilding::new(
            Vec3::new(0.0, 0.0, 500.0),
            0.0,
            Vec3::repeat(5.0),
        ));
        let (grid, _) = loaded(&world);
        assert_eq!(grid.get_cells(Vec3::new(25.0, 25.0, 0.0), 1.0).len(), 1);
    }

    #[test]
    fn test_query_outside_world_is_clamped() {
        let mut world = GroupDefinition::new("");
        world.add_obstacle(BoxBuilding::new(Vec3::new(390.0, 390.0, 0.0), 0.0, Vec3::repeat(5.0)));
        let (grid, _) = loaded(&world);
        let cells = grid.get_cells(Vec3::new(5000.0, 5000.0, 0.0), 10.0);
        assert_eq!(cells.len(), 1);
        assert!(grid.get_cells(Vec3::new(f32::NAN, -9000.0, 0.0), 1.0).is_empty());
    }

    #[test]
    fn test_obstacles_are_reported_once() {
        let mut world = GroupDefinition::new("");
        world.add_obstacle(BoxBuilding::new(Vec3::zeros(), 0.0, Vec3::new(50.0, 50.0, 10.0)));
        world.add_obstacle(BoxBuilding::new(Vec3::new(300.0, 0.0, 0.0), 0.0, Vec3::repeat(2.0)));
        let (grid, _) = loaded(&world);
        let near = grid.get_obstacles(&world, Vec3::zeros(), 60.0);
        assert_eq!(near.len(), 1);
        assert_eq!(grid.get_obstacles(&world, Vec3::new(300.0, 0.0, 0.0), 1.0).len(), 1);
    }

    #[test]
    fn test_grid_size_comes_from_state() {
        let config = WorldConfig { grid_size_x: 4, grid_size_y: 2, ..WorldConfig::default() };
        let mut state = StateStore::from_config(&config);
        let mut grid = CollisionGrid::new();
        grid.load(&GroupDefinition::new(""), &mut state);
        assert_eq!(grid.dimensions(), (4, 2));
        assert_eq!(grid.cells().len(), 8);
        assert!(grid.cell(4, 0).is_none());
    }
}
