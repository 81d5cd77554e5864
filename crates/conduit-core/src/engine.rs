//! The engine facade: one explicit context owning every piece of network
//! state.
//!
//! # Architecture
//!
//! The `ConduitEngine` owns:
//! - A frozen [`ResourceRegistry`] (categories, storage types, block tags)
//! - A [`NetworkRegistry`] of established networks with their queues
//! - A [`LinkOverlay`] of explicit point-to-point connections
//! - A [`DistributionScheduler`] and the tick counter
//! - A buffer of [`NetworkEvent`]s not yet handed to the host
//!
//! Block state and stored amounts stay with the host and are passed in per
//! call through [`World`] and [`StorageAccessor`].
//!
//! # Topology changes
//!
//! The engine does not watch the world. The host reports changes:
//! - [`on_node_placed`](ConduitEngine::on_node_placed) after a block appears
//! - [`on_node_removed`](ConduitEngine::on_node_removed) after a block is
//!   broken or exploded
//! - [`on_node_moved`](ConduitEngine::on_node_moved) after a piston move
//!
//! Affected networks are destroyed. The next query rediscovers them.

use crate::config::{ConfigError, EngineConfig};
use crate::discovery::NodeRole;
use crate::event::NetworkEvent;
use crate::id::{CategoryId, NetworkId, StorageTypeId};
use crate::link::{LinkError, LinkOverlay};
use crate::network::{NetworkError, NetworkRegistry, NetworkSummary};
use crate::registry::ResourceRegistry;
use crate::scheduler::DistributionScheduler;
use crate::spatial::NodeLocation;
use crate::storage::StorageAccessor;
use crate::world::World;

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ConduitEngine {
    resources: ResourceRegistry,
    networks: NetworkRegistry,
    links: LinkOverlay,
    scheduler: DistributionScheduler,
    config: EngineConfig,
    tick: u64,
    events: Vec<NetworkEvent>,
}

impl ConduitEngine {
    pub fn new(resources: ResourceRegistry, config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let scheduler = DistributionScheduler::new(config.distribution_interval, config.steps_per_tick);
        Ok(Self {
            resources,
            networks: NetworkRegistry::new(),
            links: LinkOverlay::new(),
            scheduler,
            config,
            tick: 0,
            events: Vec::new(),
        })
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn resources(&self) -> &ResourceRegistry {
        &self.resources
    }

    pub fn networks(&self) -> &NetworkRegistry {
        &self.networks
    }

    pub fn links(&self) -> &LinkOverlay {
        &self.links
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Number of ticks run so far.
    pub fn current_tick(&self) -> u64 {
        self.tick
    }

    /// Take every buffered event.
    pub fn drain_events(&mut self) -> Vec<NetworkEvent> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------------
    // Query interface
    // -----------------------------------------------------------------------

    /// Force discovery from `origin` and register the result as a new
    /// network, even if one already contains `origin`.
    pub fn establish<W: World + ?Sized>(
        &mut self,
        world: &W,
        category: CategoryId,
        origin: NodeLocation,
    ) -> Option<NetworkId> {
        let id = self
            .networks
            .establish(world, &self.resources, Some(&self.links), category, origin)?;
        self.events.push(NetworkEvent::Established {
            network: id,
            category,
            tick: self.tick,
        });
        Some(id)
    }

    pub fn get<W: World + ?Sized>(
        &self,
        world: &W,
        category: CategoryId,
        location: NodeLocation,
    ) -> Option<NetworkId> {
        self.networks.get(world, &self.resources, category, location)
    }

    pub fn get_or_establish<W: World + ?Sized>(
        &mut self,
        world: &W,
        category: CategoryId,
        location: NodeLocation,
    ) -> Option<NetworkId> {
        self.get(world, category, location)
            .or_else(|| self.establish(world, category, location))
    }

    pub fn get_all_with(&self, location: NodeLocation) -> Vec<NetworkId> {
        self.networks.get_all_with(location)
    }

    pub fn is_part_of_network(
        &self,
        id: NetworkId,
        location: NodeLocation,
        role: NodeRole,
    ) -> Result<bool, NetworkError> {
        self.networks.is_part_of_network(id, location, role)
    }

    /// Destroy a network. Destroying an already destroyed network is a no-op.
    pub fn destroy(&mut self, id: NetworkId) -> bool {
        let destroyed = self.networks.destroy(id);
        if destroyed {
            self.events.push(NetworkEvent::Destroyed {
                network: id,
                tick: self.tick,
            });
        }
        destroyed
    }

    /// Queue `amount` of `storage_type` out of `source` on network `id`.
    ///
    /// The storage type must belong to the network's category.
    pub fn queue_send(
        &mut self,
        id: NetworkId,
        source: NodeLocation,
        storage_type: StorageTypeId,
        amount: i64,
    ) -> Result<(), NetworkError> {
        if amount <= 0 {
            return Err(NetworkError::InvalidAmount(amount));
        }
        let network = self.networks.network(id).ok_or(NetworkError::Destroyed(id))?;
        let category = self
            .resources
            .category_of(storage_type)
            .ok_or(NetworkError::UnknownStorageType(storage_type))?;
        if category != network.category {
            return Err(NetworkError::CategoryMismatch {
                storage_type,
                category: network.category,
            });
        }
        self.networks.queue_send(id, source, storage_type, amount)
    }

    pub fn summary(&self, id: NetworkId) -> Option<NetworkSummary> {
        self.networks.network(id).map(|n| n.summary())
    }

    pub fn summaries(&self) -> Vec<NetworkSummary> {
        self.networks.iter().map(|n| n.summary()).collect()
    }

    // -----------------------------------------------------------------------
    // Topology notifications
    // -----------------------------------------------------------------------

    /// A block was placed at `location`. Networks around it are destroyed,
    /// as is any network that held a previous block at the same spot.
    pub fn on_node_placed(&mut self, location: NodeLocation) -> Vec<NetworkId> {
        let mut destroyed = self.networks.update_with_node(location);
        destroyed.extend(self.networks.update_adjacent(location));
        self.record_destroyed(&destroyed);
        destroyed
    }

    /// The block at `location` was removed. Its networks are destroyed and
    /// its link entry, if any, is torn down.
    pub fn on_node_removed(&mut self, location: NodeLocation) -> Vec<NetworkId> {
        let peers = self.links.destroy(location);
        let mut destroyed = self.networks.update_with_node(location);
        for peer in peers {
            destroyed.extend(self.networks.update_with_node(peer));
        }
        self.record_destroyed(&destroyed);
        destroyed
    }

    /// A block moved from `from` to `to`. Link connections do not follow it.
    pub fn on_node_moved(&mut self, from: NodeLocation, to: NodeLocation) -> Vec<NetworkId> {
        let mut destroyed = self.on_node_removed(from);
        destroyed.extend(self.on_node_placed(to));
        destroyed
    }

    fn record_destroyed(&mut self, ids: &[NetworkId]) {
        for &network in ids {
            self.events.push(NetworkEvent::Destroyed {
                network,
                tick: self.tick,
            });
        }
    }

    // -----------------------------------------------------------------------
    // Link overlay
    // -----------------------------------------------------------------------

    /// Connect two link nodes. Networks containing either end are destroyed
    /// so the next discovery follows the new connection.
    pub fn add_link<W: World + ?Sized>(
        &mut self,
        world: &W,
        a: NodeLocation,
        b: NodeLocation,
    ) -> Result<Vec<NetworkId>, LinkError> {
        self.links.add_connection(world, &self.resources, a, b)?;
        Ok(self.invalidate_link_ends(a, b))
    }

    /// Disconnect two link nodes. Returns the destroyed networks; empty if
    /// there was no connection.
    pub fn remove_link(&mut self, a: NodeLocation, b: NodeLocation) -> Vec<NetworkId> {
        if !self.links.remove_connection(a, b) {
            return Vec::new();
        }
        self.invalidate_link_ends(a, b)
    }

    pub fn link_connections<W: World + ?Sized>(
        &self,
        world: &W,
        location: NodeLocation,
    ) -> Result<Vec<NodeLocation>, LinkError> {
        self.links.get_connections(world, &self.resources, location)
    }

    fn invalidate_link_ends(&mut self, a: NodeLocation, b: NodeLocation) -> Vec<NetworkId> {
        let mut destroyed = self.networks.update_with_node(a);
        destroyed.extend(self.networks.update_with_node(b));
        self.record_destroyed(&destroyed);
        destroyed
    }

    // -----------------------------------------------------------------------
    // Tick
    // -----------------------------------------------------------------------

    /// Advance one tick: start due passes and spend the step budget.
    ///
    /// Returns every event buffered since the last drain. If a pass aborted,
    /// the error is returned instead and the events stay buffered for
    /// [`drain_events`](Self::drain_events).
    pub fn tick<S: StorageAccessor + ?Sized>(
        &mut self,
        storage: &mut S,
    ) -> Result<Vec<NetworkEvent>, NetworkError> {
        self.tick += 1;
        self.scheduler.run_tick(
            self.tick,
            &mut self.networks,
            storage,
            self.config.max_storage,
            &mut self.events,
        )?;
        Ok(self.drain_events())
    }

    /// Run ticks until no pass is running or queued, or `max_ticks` have
    /// elapsed. Returns all events produced.
    pub fn run_until_idle<S: StorageAccessor + ?Sized>(
        &mut self,
        storage: &mut S,
        max_ticks: u64,
    ) -> Result<Vec<NetworkEvent>, NetworkError> {
        let mut events = Vec::new();
        for _ in 0..max_ticks {
            events.extend(self.tick(storage)?);
            let busy = self
                .networks
                .iter()
                .any(|n| n.is_running() || !n.queued().is_empty());
            if !busy {
                break;
            }
        }
        Ok(events)
    }
}
