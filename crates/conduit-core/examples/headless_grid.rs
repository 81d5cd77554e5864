//! Headless grid example: a generator charging batteries over a conduit line.
//!
//! Builds a small world, establishes the energy network, and runs 40 ticks.
//! Every 5 ticks the generator produces 120 energy and sends it together
//! with whatever reserve it still holds from the last pass. Halfway through
//! a battery is broken and the network reforms on the next send.
//!
//! Run with: `RUST_LOG=conduit_core=debug cargo run -p conduit-core --example headless_grid`

use conduit_core::storage::{MemoryStorage, StorageAccessor};
use conduit_core::test_utils::*;
use conduit_core::world::GridWorld;

const PRODUCTION: u64 = 120;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let (mut engine, blocks) = test_engine(100);
    let mut world = GridWorld::new();
    let (producer, batteries) = generator_with_batteries(&mut world, &blocks, 3);
    let mut storage = MemoryStorage::new();
    let energy = blocks.energy_type;

    for tick in 1..=40u64 {
        if tick == 20 {
            world.remove_block(batteries[2]);
            storage.clear_node(batteries[2]);
            let destroyed = engine.on_node_removed(batteries[2]);
            tracing::info!(tick, ?destroyed, "battery broken");
        }

        if tick % 5 == 0 {
            let network = engine
                .get_or_establish(&world, blocks.energy, producer)
                .expect("generator sits on a network");
            // The reserve from the previous pass rides along with new output.
            let reserve = storage
                .get_amount(producer, energy)
                .expect("memory storage never fails");
            let amount = (PRODUCTION + reserve) as i64;
            engine
                .queue_send(network, producer, energy, amount)
                .expect("send accepted");
        }

        for event in engine.tick(&mut storage).expect("storage is healthy") {
            tracing::info!(?event, "network event");
        }

        if tick % 10 == 0 {
            let stored: Vec<u64> = batteries.iter().map(|b| storage.amount(*b, energy)).collect();
            tracing::info!(
                tick,
                ?stored,
                reserve = storage.amount(producer, energy),
                "charge levels"
            );
        }
    }
}
