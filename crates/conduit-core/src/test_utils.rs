//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::config::EngineConfig;
use crate::engine::ConduitEngine;
use crate::id::*;
use crate::registry::{BlockTag, ResourceRegistry, ResourceRegistryBuilder};
use crate::spatial::NodeLocation;
use crate::world::GridWorld;

// ===========================================================================
// Locations
// ===========================================================================

/// A location in the overworld (dimension 0).
pub fn at(x: i32, y: i32, z: i32) -> NodeLocation {
    NodeLocation::new(DimensionId(0), x, y, z)
}

/// Place `len` copies of `block` along +x starting at `start`.
pub fn line(world: &mut GridWorld, start: NodeLocation, len: i32, block: BlockTypeId) {
    for i in 0..len {
        let mut loc = start;
        loc.x = start.x.wrapping_add(i);
        world.set_block(loc, block);
    }
}

// ===========================================================================
// Standard registry
// ===========================================================================

/// Ids registered by [`standard_registry`].
#[derive(Debug, Clone, Copy)]
pub struct StandardBlocks {
    pub energy: CategoryId,
    pub gas: CategoryId,

    pub energy_type: StorageTypeId,
    pub hydrogen: StorageTypeId,
    pub oxygen: StorageTypeId,

    /// No tags at all.
    pub stone: BlockTypeId,
    pub energy_conduit: BlockTypeId,
    pub gas_conduit: BlockTypeId,
    /// Energy consumer.
    pub battery: BlockTypeId,
    /// Energy generator: I/O tagged, neither conduit nor consumer.
    pub generator: BlockTypeId,
    /// Energy consumer and gas generator.
    pub electrolyzer: BlockTypeId,
    /// Gas consumer.
    pub gas_tank: BlockTypeId,
    /// Energy conduit that can carry link overlay connections.
    pub energy_relay: BlockTypeId,
}

/// Two categories (energy, gas), three storage types and a handful of
/// blocks covering every role.
pub fn standard_registry() -> (ResourceRegistry, StandardBlocks) {
    let mut b = ResourceRegistryBuilder::new();
    let energy = b.register_category("energy").unwrap();
    let gas = b.register_category("gas").unwrap();

    let energy_type = b.register_storage_type("energy", energy).unwrap();
    let hydrogen = b.register_storage_type("hydrogen", gas).unwrap();
    let oxygen = b.register_storage_type("oxygen", gas).unwrap();

    let stone = b.register_block("stone", []).unwrap();
    let energy_conduit = b
        .register_block("energy_conduit", [BlockTag::Io(energy), BlockTag::Conduit(energy)])
        .unwrap();
    let gas_conduit = b
        .register_block("gas_conduit", [BlockTag::Io(gas), BlockTag::Conduit(gas)])
        .unwrap();
    let battery = b
        .register_block("battery", [BlockTag::Io(energy), BlockTag::Consumer(energy)])
        .unwrap();
    let generator = b.register_block("generator", [BlockTag::Io(energy)]).unwrap();
    let electrolyzer = b
        .register_block(
            "electrolyzer",
            [
                BlockTag::Io(energy),
                BlockTag::Consumer(energy),
                BlockTag::Io(gas),
            ],
        )
        .unwrap();
    let gas_tank = b
        .register_block("gas_tank", [BlockTag::Io(gas), BlockTag::Consumer(gas)])
        .unwrap();
    let energy_relay = b
        .register_block(
            "energy_relay",
            [
                BlockTag::Io(energy),
                BlockTag::Conduit(energy),
                BlockTag::NetworkLink,
            ],
        )
        .unwrap();

    let registry = b.build().unwrap();
    (
        registry,
        StandardBlocks {
            energy,
            gas,
            energy_type,
            hydrogen,
            oxygen,
            stone,
            energy_conduit,
            gas_conduit,
            battery,
            generator,
            electrolyzer,
            gas_tank,
            energy_relay,
        },
    )
}

// ===========================================================================
// Engine construction
// ===========================================================================

/// An engine over the standard registry with the given capacity.
/// Distribution runs every tick with an unbounded step budget.
pub fn test_engine(max_storage: u64) -> (ConduitEngine, StandardBlocks) {
    let (registry, blocks) = standard_registry();
    let config = EngineConfig::default()
        .with_max_storage(max_storage)
        .with_distribution_interval(1)
        .with_steps_per_tick(usize::MAX);
    let engine = ConduitEngine::new(registry, config).unwrap();
    (engine, blocks)
}

/// A generator at x=0 feeding a conduit line along +x, with `batteries`
/// batteries hanging off the line on +z.
///
/// Returns the generator location and the battery locations.
pub fn generator_with_batteries(
    world: &mut GridWorld,
    blocks: &StandardBlocks,
    batteries: usize,
) -> (NodeLocation, Vec<NodeLocation>) {
    let producer = at(0, 0, 0);
    world.set_block(producer, blocks.generator);
    let len = batteries.max(1) as i32;
    line(world, at(1, 0, 0), len, blocks.energy_conduit);
    let consumers: Vec<NodeLocation> = (0..batteries as i32).map(|i| at(1 + i, 0, 1)).collect();
    for &loc in &consumers {
        world.set_block(loc, blocks.battery);
    }
    (producer, consumers)
}
