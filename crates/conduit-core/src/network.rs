//! Network registry and lifecycle.
//!
//! A [`Network`] is one connected component of one resource category, found
//! by [`discovery`](crate::discovery). Its membership is fixed for its whole
//! life: any topology change destroys it and the next access rediscovers.
//!
//! The [`NetworkRegistry`] is an arena keyed by generational [`NetworkId`]s.
//! Destroying a network removes it from the arena, and a stale id never
//! resolves again, so operations on a destroyed network fail with
//! [`NetworkError::Destroyed`] instead of touching a dead object.
//!
//! Each network also owns its send queue and, while running, its
//! [`DistributionPass`]. Destroying a network drops both.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;

use crate::discovery::{Discovery, NodeRole, RoleClassifier, discover_with_links, role_at};
use crate::distribution::{DistributionError, DistributionPass, PassStep, SendEntry};
use crate::id::{CategoryId, DimensionId, NetworkId, StorageTypeId};
use crate::link::LinkOverlay;
use crate::spatial::{NodeLocation, adjacent_locations};
use crate::storage::StorageAccessor;
use crate::world::World;

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// An established network: immutable membership plus queue and pass state.
#[derive(Debug, Clone)]
pub struct Network {
    pub id: NetworkId,
    pub category: CategoryId,
    pub dimension: DimensionId,
    conduits: BTreeSet<NodeLocation>,
    consumers: BTreeSet<NodeLocation>,
    generators: BTreeSet<NodeLocation>,
    queue: Vec<SendEntry>,
    /// `Some` while a distribution pass is running.
    pass: Option<DistributionPass>,
}

impl Network {
    fn from_discovery(
        id: NetworkId,
        category: CategoryId,
        dimension: DimensionId,
        found: Discovery,
    ) -> Self {
        Self {
            id,
            category,
            dimension,
            conduits: found.conduits,
            consumers: found.consumers,
            generators: found.generators,
            queue: Vec::new(),
            pass: None,
        }
    }

    pub fn conduits(&self) -> &BTreeSet<NodeLocation> {
        &self.conduits
    }

    pub fn consumers(&self) -> &BTreeSet<NodeLocation> {
        &self.consumers
    }

    pub fn generators(&self) -> &BTreeSet<NodeLocation> {
        &self.generators
    }

    /// Whether `location` is a member in the given role.
    pub fn contains(&self, location: NodeLocation, role: NodeRole) -> bool {
        if location.dimension != self.dimension {
            return false;
        }
        match role {
            NodeRole::Conduit => self.conduits.contains(&location),
            NodeRole::Consumer => self.consumers.contains(&location),
            NodeRole::Generator => self.generators.contains(&location),
        }
    }

    /// Whether `location` is a member in any role.
    pub fn contains_any(&self, location: NodeLocation) -> bool {
        location.dimension == self.dimension
            && (self.conduits.contains(&location)
                || self.consumers.contains(&location)
                || self.generators.contains(&location))
    }

    pub fn queued(&self) -> &[SendEntry] {
        &self.queue
    }

    pub fn is_running(&self) -> bool {
        self.pass.is_some()
    }

    pub fn summary(&self) -> NetworkSummary {
        NetworkSummary {
            id: self.id.to_raw(),
            category: self.category,
            dimension: self.dimension,
            conduits: self.conduits.len(),
            consumers: self.consumers.len(),
            generators: self.generators.len(),
            queued: self.queue.len(),
            running: self.is_running(),
        }
    }
}

/// Read-only snapshot of a network for inspection and the request boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkSummary {
    pub id: u64,
    pub category: CategoryId,
    pub dimension: DimensionId,
    pub conduits: usize,
    pub consumers: usize,
    pub generators: usize,
    pub queued: usize,
    pub running: bool,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from network operations. All are caller contract violations except
/// [`NetworkError::PassAborted`], which reports a storage failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("network {0:?} has been destroyed")]
    Destroyed(NetworkId),
    #[error("send amount must be positive, got {0}")]
    InvalidAmount(i64),
    #[error("unknown storage type {0:?}")]
    UnknownStorageType(StorageTypeId),
    #[error("storage type {storage_type:?} does not belong to category {category:?}")]
    CategoryMismatch {
        storage_type: StorageTypeId,
        category: CategoryId,
    },
    #[error("distribution pass on {network:?} aborted, {dropped} sends dropped: {source}")]
    PassAborted {
        network: NetworkId,
        dropped: usize,
        source: DistributionError,
    },
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// All active networks.
#[derive(Debug, Default)]
pub struct NetworkRegistry {
    networks: SlotMap<NetworkId, Network>,
}

impl NetworkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discover the component around `origin` and register it as a new
    /// network. Returns `None` when the component has no consumer and no
    /// generator.
    pub fn establish<W, C>(
        &mut self,
        world: &W,
        classifier: &C,
        links: Option<&LinkOverlay>,
        category: CategoryId,
        origin: NodeLocation,
    ) -> Option<NetworkId>
    where
        W: World + ?Sized,
        C: RoleClassifier + ?Sized,
    {
        let found = discover_with_links(world, classifier, links, origin, category);
        if !found.has_endpoints() {
            tracing::trace!(?origin, ?category, "no endpoints, network not established");
            return None;
        }
        let id = self.networks.insert_with_key(|id| {
            Network::from_discovery(id, category, origin.dimension, found)
        });
        tracing::debug!(network = ?id, ?category, ?origin, "network established");
        Some(id)
    }

    /// The active network of `category` that contains `location` in the role
    /// its block currently has.
    pub fn get<W, C>(
        &self,
        world: &W,
        classifier: &C,
        category: CategoryId,
        location: NodeLocation,
    ) -> Option<NetworkId>
    where
        W: World + ?Sized,
        C: RoleClassifier + ?Sized,
    {
        let role = role_at(world, classifier, location, category)?;
        self.networks
            .iter()
            .find(|(_, n)| n.category == category && n.contains(location, role))
            .map(|(id, _)| id)
    }

    /// [`get`](Self::get), falling back to [`establish`](Self::establish).
    pub fn get_or_establish<W, C>(
        &mut self,
        world: &W,
        classifier: &C,
        links: Option<&LinkOverlay>,
        category: CategoryId,
        location: NodeLocation,
    ) -> Option<NetworkId>
    where
        W: World + ?Sized,
        C: RoleClassifier + ?Sized,
    {
        self.get(world, classifier, category, location)
            .or_else(|| self.establish(world, classifier, links, category, location))
    }

    /// Every active network containing `location` in any role and category.
    pub fn get_all_with(&self, location: NodeLocation) -> Vec<NetworkId> {
        self.networks
            .iter()
            .filter(|(_, n)| n.contains_any(location))
            .map(|(id, _)| id)
            .collect()
    }

    /// Whether `location` is a member of network `id` in `role`.
    pub fn is_part_of_network(
        &self,
        id: NetworkId,
        location: NodeLocation,
        role: NodeRole,
    ) -> Result<bool, NetworkError> {
        let network = self.networks.get(id).ok_or(NetworkError::Destroyed(id))?;
        Ok(network.contains(location, role))
    }

    /// Destroy a network, dropping its queue and any running pass. Returns
    /// `false` if it was already gone.
    pub fn destroy(&mut self, id: NetworkId) -> bool {
        match self.networks.remove(id) {
            Some(network) => {
                tracing::debug!(
                    network = ?id,
                    dropped = network.queue.len(),
                    running = network.pass.is_some(),
                    "network destroyed"
                );
                true
            }
            None => false,
        }
    }

    /// Destroy every network containing a neighbor of `location`. Called after
    /// a node is placed so neighboring networks reform around it.
    pub fn update_adjacent(&mut self, location: NodeLocation) -> Vec<NetworkId> {
        let mut doomed: BTreeSet<NetworkId> = BTreeSet::new();
        for neighbor in adjacent_locations(location) {
            doomed.extend(self.get_all_with(neighbor));
        }
        self.destroy_all(doomed)
    }

    /// Destroy every network containing `location`. Called after a node is
    /// removed.
    pub fn update_with_node(&mut self, location: NodeLocation) -> Vec<NetworkId> {
        let doomed: BTreeSet<NetworkId> = self.get_all_with(location).into_iter().collect();
        self.destroy_all(doomed)
    }

    fn destroy_all(&mut self, ids: BTreeSet<NetworkId>) -> Vec<NetworkId> {
        ids.into_iter().filter(|id| self.destroy(*id)).collect()
    }

    /// Queue a send on network `id`. Rejects non-positive amounts before
    /// anything is queued.
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
        let network = self
            .networks
            .get_mut(id)
            .ok_or(NetworkError::Destroyed(id))?;
        network.queue.push(SendEntry {
            source,
            storage_type,
            amount: amount as u64,
        });
        Ok(())
    }

    /// Move an idle network with queued sends into the running state.
    /// Returns the queue length if a pass was started.
    pub fn start_pass(&mut self, id: NetworkId) -> Option<usize> {
        let network = self.networks.get_mut(id)?;
        if network.pass.is_some() || network.queue.is_empty() {
            return None;
        }
        network.pass = Some(DistributionPass::new());
        tracing::trace!(network = ?id, queued = network.queue.len(), "pass started");
        Some(network.queue.len())
    }

    /// Advance the running pass of `id` by one step.
    ///
    /// Returns `Ok(None)` when the network is idle. A finished pass returns
    /// the network to idle. A storage failure aborts the pass and drops the
    /// remaining queue.
    pub fn advance<S: StorageAccessor + ?Sized>(
        &mut self,
        id: NetworkId,
        storage: &mut S,
        capacity: u64,
    ) -> Result<Option<PassStep>, NetworkError> {
        let network = self
            .networks
            .get_mut(id)
            .ok_or(NetworkError::Destroyed(id))?;
        let Network {
            pass,
            queue,
            consumers,
            ..
        } = network;
        let Some(running) = pass.as_mut() else {
            return Ok(None);
        };

        match running.advance(queue, consumers, storage, capacity) {
            Ok(step) => {
                if let PassStep::Finished { sends } = step {
                    *pass = None;
                    tracing::trace!(network = ?id, sends, "pass finished");
                }
                Ok(Some(step))
            }
            Err(source) => {
                // The in-flight send is lost along with the queue.
                let dropped = queue.len() + usize::from(running.has_in_flight());
                queue.clear();
                *pass = None;
                tracing::warn!(network = ?id, dropped, error = %source, "distribution pass aborted");
                Err(NetworkError::PassAborted {
                    network: id,
                    dropped,
                    source,
                })
            }
        }
    }

    pub fn network(&self, id: NetworkId) -> Option<&Network> {
        self.networks.get(id)
    }

    pub fn contains(&self, id: NetworkId) -> bool {
        self.networks.contains_key(id)
    }

    /// Ids of all active networks, in arena order.
    pub fn ids(&self) -> Vec<NetworkId> {
        self.networks.keys().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Network> {
        self.networks.values()
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use crate::test_utils::*;
    use crate::world::GridWorld;

    /// generator - conduit x3 - battery, along +x at y=0.
    fn simple_line(blocks: &StandardBlocks) -> GridWorld {
        let mut world = GridWorld::new();
        world.set_block(at(0, 0, 0), blocks.generator);
        line(&mut world, at(1, 0, 0), 3, blocks.energy_conduit);
        world.set_block(at(4, 0, 0), blocks.battery);
        world
    }

    #[test]
    fn establish_registers_network() {
        let (reg, blocks) = standard_registry();
        let world = simple_line(&blocks);
        let mut networks = NetworkRegistry::new();

        let id = networks
            .establish(&world, &reg, None, blocks.energy, at(0, 0, 0))
            .unwrap();
        let network = networks.network(id).unwrap();
        assert_eq!(network.conduits().len(), 3);
        assert_eq!(network.consumers().len(), 1);
        assert_eq!(network.generators().len(), 1);
        assert_eq!(network.dimension, at(0, 0, 0).dimension);
        assert!(!network.is_running());
    }

    #[test]
    fn conduit_only_component_is_not_established() {
        let (reg, blocks) = standard_registry();
        let mut world = GridWorld::new();
        line(&mut world, at(0, 0, 0), 5, blocks.energy_conduit);
        let mut networks = NetworkRegistry::new();

        assert_eq!(
            networks.establish(&world, &reg, None, blocks.energy, at(0, 0, 0)),
            None
        );
        assert!(networks.is_empty());
    }

    #[test]
    fn get_uses_current_role() {
        let (reg, blocks) = standard_registry();
        let world = simple_line(&blocks);
        let mut networks = NetworkRegistry::new();
        let id = networks
            .establish(&world, &reg, None, blocks.energy, at(0, 0, 0))
            .unwrap();

        assert_eq!(networks.get(&world, &reg, blocks.energy, at(2, 0, 0)), Some(id));
        assert_eq!(networks.get(&world, &reg, blocks.energy, at(4, 0, 0)), Some(id));
        assert_eq!(networks.get(&world, &reg, blocks.gas, at(2, 0, 0)), None);
        assert_eq!(networks.get(&world, &reg, blocks.energy, at(9, 0, 0)), None);
    }

    #[test]
    fn get_rejects_role_change() {
        let (reg, blocks) = standard_registry();
        let mut world = simple_line(&blocks);
        let mut networks = NetworkRegistry::new();
        networks
            .establish(&world, &reg, None, blocks.energy, at(0, 0, 0))
            .unwrap();

        // The battery was swapped for a generator without a topology update.
        world.set_block(at(4, 0, 0), blocks.generator);
        assert_eq!(networks.get(&world, &reg, blocks.energy, at(4, 0, 0)), None);
    }

    #[test]
    fn get_or_establish_reuses_existing() {
        let (reg, blocks) = standard_registry();
        let world = simple_line(&blocks);
        let mut networks = NetworkRegistry::new();

        let a = networks
            .get_or_establish(&world, &reg, None, blocks.energy, at(4, 0, 0))
            .unwrap();
        let b = networks
            .get_or_establish(&world, &reg, None, blocks.energy, at(1, 0, 0))
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(networks.len(), 1);
    }

    #[test]
    fn destroy_is_idempotent() {
        let (reg, blocks) = standard_registry();
        let world = simple_line(&blocks);
        let mut networks = NetworkRegistry::new();
        let id = networks
            .establish(&world, &reg, None, blocks.energy, at(0, 0, 0))
            .unwrap();

        assert!(networks.destroy(id));
        assert!(!networks.destroy(id));
        assert!(networks.is_empty());
    }

    #[test]
    fn destroyed_network_rejects_queries() {
        let (reg, blocks) = standard_registry();
        let world = simple_line(&blocks);
        let mut networks = NetworkRegistry::new();
        let id = networks
            .establish(&world, &reg, None, blocks.energy, at(0, 0, 0))
            .unwrap();
        networks.destroy(id);

        assert_eq!(
            networks.is_part_of_network(id, at(1, 0, 0), NodeRole::Conduit),
            Err(NetworkError::Destroyed(id))
        );
        assert_eq!(
            networks.queue_send(id, at(0, 0, 0), blocks.energy_type, 5),
            Err(NetworkError::Destroyed(id))
        );
    }

    #[test]
    fn stale_id_does_not_alias_new_network() {
        let (reg, blocks) = standard_registry();
        let world = simple_line(&blocks);
        let mut networks = NetworkRegistry::new();
        let old = networks
            .establish(&world, &reg, None, blocks.energy, at(0, 0, 0))
            .unwrap();
        networks.destroy(old);
        let new = networks
            .establish(&world, &reg, None, blocks.energy, at(0, 0, 0))
            .unwrap();

        assert_ne!(old, new);
        assert!(networks.is_part_of_network(old, at(1, 0, 0), NodeRole::Conduit).is_err());
        assert_eq!(
            networks.is_part_of_network(new, at(1, 0, 0), NodeRole::Conduit),
            Ok(true)
        );
    }

    #[test]
    fn is_part_of_network_checks_role_and_dimension() {
        let (reg, blocks) = standard_registry();
        let world = simple_line(&blocks);
        let mut networks = NetworkRegistry::new();
        let id = networks
            .establish(&world, &reg, None, blocks.energy, at(0, 0, 0))
            .unwrap();

        assert_eq!(networks.is_part_of_network(id, at(4, 0, 0), NodeRole::Consumer), Ok(true));
        assert_eq!(networks.is_part_of_network(id, at(4, 0, 0), NodeRole::Conduit), Ok(false));
        let nether = NodeLocation::new(DimensionId(1), 4, 0, 0);
        assert_eq!(networks.is_part_of_network(id, nether, NodeRole::Consumer), Ok(false));
    }

    #[test]
    fn update_adjacent_destroys_neighbors_networks() {
        let (reg, blocks) = standard_registry();
        let world = simple_line(&blocks);
        let mut networks = NetworkRegistry::new();
        let id = networks
            .establish(&world, &reg, None, blocks.energy, at(0, 0, 0))
            .unwrap();

        // A block placed next to the middle conduit.
        let destroyed = networks.update_adjacent(at(2, 1, 0));
        assert_eq!(destroyed, vec![id]);
        assert!(!networks.contains(id));

        // Placement far away touches nothing.
        let id = networks
            .establish(&world, &reg, None, blocks.energy, at(0, 0, 0))
            .unwrap();
        assert!(networks.update_adjacent(at(40, 0, 0)).is_empty());
        assert!(networks.contains(id));
    }

    #[test]
    fn update_with_node_destroys_only_containing_networks() {
        let (reg, blocks) = standard_registry();
        let mut world = simple_line(&blocks);
        // A second, unrelated network.
        world.set_block(at(0, 0, 10), blocks.generator);
        world.set_block(at(1, 0, 10), blocks.battery);
        let mut networks = NetworkRegistry::new();
        let a = networks
            .establish(&world, &reg, None, blocks.energy, at(0, 0, 0))
            .unwrap();
        let b = networks
            .establish(&world, &reg, None, blocks.energy, at(0, 0, 10))
            .unwrap();

        assert_eq!(networks.update_with_node(at(3, 0, 0)), vec![a]);
        assert!(networks.contains(b));
        assert!(networks.update_with_node(at(3, 0, 0)).is_empty());
    }

    #[test]
    fn queue_send_rejects_non_positive() {
        let (reg, blocks) = standard_registry();
        let world = simple_line(&blocks);
        let mut networks = NetworkRegistry::new();
        let id = networks
            .establish(&world, &reg, None, blocks.energy, at(0, 0, 0))
            .unwrap();

        assert_eq!(
            networks.queue_send(id, at(0, 0, 0), blocks.energy_type, 0),
            Err(NetworkError::InvalidAmount(0))
        );
        assert_eq!(
            networks.queue_send(id, at(0, 0, 0), blocks.energy_type, -3),
            Err(NetworkError::InvalidAmount(-3))
        );
        assert!(networks.network(id).unwrap().queued().is_empty());
    }

    #[test]
    fn pass_lifecycle_idle_running_idle() {
        let (reg, blocks) = standard_registry();
        let world = simple_line(&blocks);
        let mut networks = NetworkRegistry::new();
        let mut storage = MemoryStorage::new();
        let id = networks
            .establish(&world, &reg, None, blocks.energy, at(0, 0, 0))
            .unwrap();

        // Nothing queued: no pass.
        assert_eq!(networks.start_pass(id), None);
        assert_eq!(networks.advance(id, &mut storage, 100), Ok(None));

        networks.queue_send(id, at(0, 0, 0), blocks.energy_type, 40).unwrap();
        assert_eq!(networks.start_pass(id), Some(1));
        // Already running: second start is refused.
        assert_eq!(networks.start_pass(id), None);

        loop {
            match networks.advance(id, &mut storage, 100).unwrap() {
                Some(PassStep::Finished { sends }) => {
                    assert_eq!(sends, 1);
                    break;
                }
                Some(_) => {}
                None => panic!("pass ended without Finished"),
            }
        }
        assert!(!networks.network(id).unwrap().is_running());
        assert_eq!(storage.amount(at(4, 0, 0), blocks.energy_type), 40);
    }

    #[test]
    fn storage_failure_aborts_and_drops_queue() {
        let (reg, blocks) = standard_registry();
        let world = simple_line(&blocks);
        let mut networks = NetworkRegistry::new();
        let mut storage = MemoryStorage::new();
        let id = networks
            .establish(&world, &reg, None, blocks.energy, at(0, 0, 0))
            .unwrap();
        networks.queue_send(id, at(0, 0, 0), blocks.energy_type, 10).unwrap();
        networks.queue_send(id, at(0, 0, 0), blocks.energy_type, 20).unwrap();
        networks.start_pass(id);
        storage.fail_node(at(4, 0, 0));

        let err = networks.advance(id, &mut storage, 100).unwrap_err();
        assert!(matches!(err, NetworkError::PassAborted { dropped: 2, .. }), "got {err:?}");
        let network = networks.network(id).unwrap();
        assert!(network.queued().is_empty());
        assert!(!network.is_running());
    }

    #[test]
    fn reserve_write_failure_counts_in_flight_send() {
        let (reg, blocks) = standard_registry();
        let world = simple_line(&blocks);
        let mut networks = NetworkRegistry::new();
        let mut storage = MemoryStorage::new();
        let id = networks
            .establish(&world, &reg, None, blocks.energy, at(0, 0, 0))
            .unwrap();
        networks.queue_send(id, at(0, 0, 0), blocks.energy_type, 10).unwrap();
        networks.queue_send(id, at(0, 0, 0), blocks.energy_type, 20).unwrap();
        networks.start_pass(id);

        assert!(matches!(
            networks.advance(id, &mut storage, 100).unwrap(),
            Some(PassStep::TargetsBuilt { .. })
        ));
        assert!(matches!(
            networks.advance(id, &mut storage, 100).unwrap(),
            Some(PassStep::Delivered { amount: 20, .. })
        ));

        // The next step writes the source's reserve.
        storage.fail_node(at(0, 0, 0));
        let err = networks.advance(id, &mut storage, 100).unwrap_err();
        assert!(matches!(err, NetworkError::PassAborted { dropped: 2, .. }), "got {err:?}");
        assert!(!networks.network(id).unwrap().is_running());
    }

    #[test]
    fn destroy_mid_pass_drops_pass() {
        let (reg, blocks) = standard_registry();
        let world = simple_line(&blocks);
        let mut networks = NetworkRegistry::new();
        let mut storage = MemoryStorage::new();
        let id = networks
            .establish(&world, &reg, None, blocks.energy, at(0, 0, 0))
            .unwrap();
        networks.queue_send(id, at(0, 0, 0), blocks.energy_type, 10).unwrap();
        networks.start_pass(id);
        networks.advance(id, &mut storage, 100).unwrap();

        networks.destroy(id);
        assert_eq!(
            networks.advance(id, &mut storage, 100),
            Err(NetworkError::Destroyed(id))
        );
    }

    #[test]
    fn summary_reports_counts() {
        let (reg, blocks) = standard_registry();
        let world = simple_line(&blocks);
        let mut networks = NetworkRegistry::new();
        let id = networks
            .establish(&world, &reg, None, blocks.energy, at(0, 0, 0))
            .unwrap();
        networks.queue_send(id, at(0, 0, 0), blocks.energy_type, 1).unwrap();

        let summary = networks.network(id).unwrap().summary();
        assert_eq!(summary.id, id.to_raw());
        assert_eq!(
            (summary.conduits, summary.consumers, summary.generators, summary.queued),
            (3, 1, 1, 1)
        );
        assert!(!summary.running);
    }
}
