//! Conduit Core -- resource networks for voxel worlds.
//!
//! This crate discovers connected networks of machines, conduits, and
//! network links in a 3D voxel grid, caches them as ephemeral network
//! objects, invalidates them on topology change, and fairly distributes
//! queued resource transfers among consumers over multiple ticks.
//!
//! # Data Flow
//!
//! 1. **Topology change** -- the host reports a placed, removed, or moved
//!    block; every network touching it is destroyed.
//! 2. **Discovery** -- the next access walks the grid from a node and
//!    records conduits, consumers, and generators of one category.
//! 3. **Establish** -- the component becomes a [`network::Network`] in the
//!    [`network::NetworkRegistry`].
//! 4. **Queue** -- machines enqueue sends against the network.
//! 5. **Distribute** -- the [`scheduler::DistributionScheduler`] starts
//!    passes periodically and advances them a bounded number of steps per
//!    tick, writing through a [`storage::StorageAccessor`].
//!
//! # Example
//!
//! ```rust,ignore
//! let mut engine = ConduitEngine::new(registry, EngineConfig::default())?;
//! let id = engine.get_or_establish(&world, energy, generator).unwrap();
//! engine.queue_send(id, generator, energy_type, 500)?;
//! let events = engine.tick(&mut storage)?;
//! ```
//!
//! # Key Types
//!
//! - [`engine::ConduitEngine`] -- Owns all network state; the host's entry point.
//! - [`discovery::discover`] -- Depth-first component discovery.
//! - [`distribution::DistributionPass`] -- Resumable least-stored-first pass.
//! - [`link::LinkOverlay`] -- Symmetric point-to-point connections.
//! - [`registry::ResourceRegistry`] -- Categories, storage types, block tags
//!   (frozen at startup).
//! - [`protocol`] -- Serializable request/response boundary.

pub mod config;
pub mod discovery;
pub mod distribution;
pub mod engine;
pub mod event;
pub mod id;
pub mod link;
pub mod network;
pub mod protocol;
pub mod registry;
pub mod scheduler;
pub mod spatial;
pub mod storage;
pub mod world;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::EngineConfig;
pub use discovery::{NodeRole, RoleClassifier};
pub use engine::ConduitEngine;
pub use event::NetworkEvent;
pub use id::{BlockTypeId, CategoryId, DimensionId, NetworkId, StorageTypeId};
pub use network::NetworkError;
pub use spatial::NodeLocation;
pub use storage::{MemoryStorage, StorageAccessor};
pub use world::{GridWorld, World};
