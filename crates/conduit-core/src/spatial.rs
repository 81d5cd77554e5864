//! Node locations and six-way adjacency over the voxel grid.
//!
//! Adjacency is a pure lookup against [`World`] state: a neighbor exists in a
//! direction only when the offset location is loaded and holds a block.

use serde::{Deserialize, Serialize};

use crate::id::DimensionId;
use crate::world::World;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Identity of a node: a block position inside a dimension.
///
/// Locations are stable keys for storage lookups. They are never a handle to
/// the block itself; callers look the block up again on every operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeLocation {
    pub dimension: DimensionId,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl NodeLocation {
    pub fn new(dimension: DimensionId, x: i32, y: i32, z: i32) -> Self {
        Self { dimension, x, y, z }
    }

    /// The location one step away in `dir`, in the same dimension.
    pub fn offset(&self, dir: Direction) -> Self {
        let (dx, dy, dz) = dir.offset();
        Self {
            dimension: self.dimension,
            x: self.x.wrapping_add(dx),
            y: self.y.wrapping_add(dy),
            z: self.z.wrapping_add(dz),
        }
    }
}

/// The six axis-aligned directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
    Up,
    Down,
}

impl Direction {
    /// All six directions in traversal order.
    pub fn all() -> [Direction; 6] {
        [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
            Direction::Up,
            Direction::Down,
        ]
    }

    /// Offset for this direction as (dx, dy, dz). North is -z.
    pub fn offset(&self) -> (i32, i32, i32) {
        match self {
            Direction::North => (0, 0, -1),
            Direction::East => (1, 0, 0),
            Direction::South => (0, 0, 1),
            Direction::West => (-1, 0, 0),
            Direction::Up => (0, 1, 0),
            Direction::Down => (0, -1, 0),
        }
    }
}

// ---------------------------------------------------------------------------
// Adjacency
// ---------------------------------------------------------------------------

/// The neighboring node in `dir`, if the location is loaded and occupied.
pub fn neighbor<W: World + ?Sized>(
    world: &W,
    location: NodeLocation,
    dir: Direction,
) -> Option<NodeLocation> {
    let candidate = location.offset(dir);
    if !world.is_loaded(candidate) {
        return None;
    }
    world.block_at(candidate).map(|_| candidate)
}

/// Every occupied neighbor, in [`Direction::all`] order.
pub fn neighbors<W: World + ?Sized>(
    world: &W,
    location: NodeLocation,
) -> Vec<(Direction, NodeLocation)> {
    Direction::all()
        .into_iter()
        .filter_map(|dir| neighbor(world, location, dir).map(|n| (dir, n)))
        .collect()
}

/// All six candidate locations around `location`, occupied or not.
pub fn adjacent_locations(location: NodeLocation) -> [NodeLocation; 6] {
    Direction::all().map(|dir| location.offset(dir))
}
