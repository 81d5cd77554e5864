//! The voxel world as seen by the network engine.
//!
//! The engine never owns block state. It reads it through [`World`] on
//! demand and never caches a block beyond a single operation.
//! [`GridWorld`] is an in-memory implementation for headless hosts, tests,
//! and benchmarks.

use std::collections::{BTreeMap, BTreeSet};

use crate::id::{BlockTypeId, DimensionId};
use crate::spatial::NodeLocation;

/// Read access to block state.
pub trait World {
    /// The block at `location`. `None` for empty, unloaded, or out of bounds.
    fn block_at(&self, location: NodeLocation) -> Option<BlockTypeId>;

    /// Whether `location` is inside the build range and currently loaded.
    fn is_loaded(&self, location: NodeLocation) -> bool;

    /// Wire name of a dimension ("overworld").
    fn dimension_name(&self, dimension: DimensionId) -> Option<&str>;

    /// Resolve a dimension by its wire name.
    fn dimension_id(&self, name: &str) -> Option<DimensionId>;
}

/// Chunk edge length used for load tracking.
pub const CHUNK_SIZE: i32 = 16;

/// Minimum and maximum (exclusive) build height of a fresh [`GridWorld`].
pub const DEFAULT_HEIGHT_RANGE: (i32, i32) = (-64, 320);

/// An in-memory sparse voxel world.
#[derive(Debug, Clone)]
pub struct GridWorld {
    blocks: BTreeMap<NodeLocation, BlockTypeId>,
    min_y: i32,
    max_y: i32,
    dimensions: Vec<String>,
    /// (dimension, chunk x, chunk z) that are currently unloaded.
    unloaded: BTreeSet<(DimensionId, i32, i32)>,
}

impl Default for GridWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl GridWorld {
    /// A world with the default build range and the three standard dimensions.
    pub fn new() -> Self {
        let (min_y, max_y) = DEFAULT_HEIGHT_RANGE;
        Self::with_height_range(min_y, max_y)
    }

    pub fn with_height_range(min_y: i32, max_y: i32) -> Self {
        Self {
            blocks: BTreeMap::new(),
            min_y,
            max_y,
            dimensions: vec![
                "overworld".to_string(),
                "nether".to_string(),
                "the_end".to_string(),
            ],
            unloaded: BTreeSet::new(),
        }
    }

    /// Register an additional dimension and return its id.
    pub fn add_dimension(&mut self, name: &str) -> DimensionId {
        if let Some(existing) = self.dimension_id(name) {
            return existing;
        }
        let id = DimensionId(self.dimensions.len() as u32);
        self.dimensions.push(name.to_string());
        id
    }

    /// Place (or replace) a block. Returns the block previously there.
    pub fn set_block(&mut self, location: NodeLocation, block: BlockTypeId) -> Option<BlockTypeId> {
        self.blocks.insert(location, block)
    }

    /// Remove a block. Returns the block that was there.
    pub fn remove_block(&mut self, location: NodeLocation) -> Option<BlockTypeId> {
        self.blocks.remove(&location)
    }

    /// Move a block by one step, as a piston would. Returns the destination.
    pub fn move_block(
        &mut self,
        from: NodeLocation,
        dir: crate::spatial::Direction,
    ) -> Option<NodeLocation> {
        let block = self.blocks.remove(&from)?;
        let to = from.offset(dir);
        self.blocks.insert(to, block);
        Some(to)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Mark the chunk containing `location` as unloaded.
    pub fn unload_chunk(&mut self, location: NodeLocation) {
        self.unloaded.insert(chunk_key(location));
    }

    /// Mark the chunk containing `location` as loaded again.
    pub fn load_chunk(&mut self, location: NodeLocation) {
        self.unloaded.remove(&chunk_key(location));
    }
}

fn chunk_key(location: NodeLocation) -> (DimensionId, i32, i32) {
    (
        location.dimension,
        location.x.div_euclid(CHUNK_SIZE),
        location.z.div_euclid(CHUNK_SIZE),
    )
}

impl World for GridWorld {
    fn block_at(&self, location: NodeLocation) -> Option<BlockTypeId> {
        if !self.is_loaded(location) {
            return None;
        }
        self.blocks.get(&location).copied()
    }

    fn is_loaded(&self, location: NodeLocation) -> bool {
        (location.dimension.0 as usize) < self.dimensions.len()
            && location.y >= self.min_y
            && location.y < self.max_y
            && !self.unloaded.contains(&chunk_key(location))
    }

    fn dimension_name(&self, dimension: DimensionId) -> Option<&str> {
        self.dimensions.get(dimension.0 as usize).map(String::as_str)
    }

    fn dimension_id(&self, name: &str) -> Option<DimensionId> {
        self.dimensions
            .iter()
            .position(|d| d == name)
            .map(|i| DimensionId(i as u32))
    }
}
