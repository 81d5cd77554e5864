//! Periodic trigger and per-tick work budget for distribution passes.
//!
//! Every `interval` ticks the scheduler moves each idle network with queued
//! sends into the running state. That is the only way a pass starts, so a
//! queue is never drained by two passes at once.
//!
//! Every tick, running passes share a budget of `steps_per_tick` steps,
//! handed out one step per network in round-robin order. The starting
//! network rotates from tick to tick so a small budget cannot starve the
//! networks at the end of the list.

use crate::distribution::PassStep;
use crate::event::NetworkEvent;
use crate::id::NetworkId;
use crate::network::{NetworkError, NetworkRegistry};
use crate::storage::StorageAccessor;

#[derive(Debug, Clone)]
pub struct DistributionScheduler {
    interval: u64,
    steps_per_tick: usize,
    cursor: usize,
}

impl DistributionScheduler {
    pub fn new(interval: u64, steps_per_tick: usize) -> Self {
        Self {
            interval: interval.max(1),
            steps_per_tick,
            cursor: 0,
        }
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn steps_per_tick(&self) -> usize {
        self.steps_per_tick
    }

    /// Whether passes may start on `tick`.
    pub fn is_trigger_tick(&self, tick: u64) -> bool {
        tick % self.interval == 0
    }

    /// Run one tick: trigger idle networks if due, then spend the step
    /// budget on running passes. Events are appended to `events`.
    ///
    /// A pass that aborts is reported with [`NetworkEvent::PassAborted`] and
    /// the remaining passes keep running. The first abort is returned once
    /// the budget is spent.
    pub fn run_tick<S: StorageAccessor + ?Sized>(
        &mut self,
        tick: u64,
        networks: &mut NetworkRegistry,
        storage: &mut S,
        capacity: u64,
        events: &mut Vec<NetworkEvent>,
    ) -> Result<(), NetworkError> {
        if self.is_trigger_tick(tick) {
            for network in networks.ids() {
                if let Some(queued) = networks.start_pass(network) {
                    events.push(NetworkEvent::PassStarted {
                        network,
                        queued,
                        tick,
                    });
                }
            }
        }

        let mut running: Vec<NetworkId> = networks
            .iter()
            .filter(|n| n.is_running())
            .map(|n| n.id)
            .collect();
        if running.is_empty() {
            return Ok(());
        }
        let start = self.cursor % running.len();
        running.rotate_left(start);
        self.cursor = self.cursor.wrapping_add(1);

        let mut budget = self.steps_per_tick;
        let mut first_error = None;
        let mut i = 0;
        while budget > 0 && !running.is_empty() {
            if i >= running.len() {
                i = 0;
            }
            let network = running[i];
            budget -= 1;

            match networks.advance(network, storage, capacity) {
                Ok(Some(PassStep::Finished { sends })) => {
                    events.push(NetworkEvent::PassCompleted {
                        network,
                        items: sends,
                        tick,
                    });
                    running.remove(i);
                }
                Ok(Some(_)) => i += 1,
                Ok(None) => {
                    running.remove(i);
                }
                Err(err) => {
                    if let NetworkError::PassAborted { dropped, .. } = &err {
                        events.push(NetworkEvent::PassAborted {
                            network,
                            dropped: *dropped,
                            tick,
                        });
                    }
                    running.remove(i);
                    first_error.get_or_insert(err);
                }
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::NetworkEventKind;
    use crate::storage::MemoryStorage;
    use crate::test_utils::*;
    use crate::world::GridWorld;

    fn two_networks() -> (NetworkRegistry, NetworkId, NetworkId, StandardBlocks) {
        let (reg, blocks) = standard_registry();
        let mut world = GridWorld::new();
        world.set_block(at(0, 0, 0), blocks.generator);
        world.set_block(at(1, 0, 0), blocks.battery);
        world.set_block(at(0, 0, 10), blocks.generator);
        world.set_block(at(1, 0, 10), blocks.battery);
        let mut networks = NetworkRegistry::new();
        let a = networks
            .establish(&world, &reg, None, blocks.energy, at(0, 0, 0))
            .unwrap();
        let b = networks
            .establish(&world, &reg, None, blocks.energy, at(0, 0, 10))
            .unwrap();
        (networks, a, b, blocks)
    }

    fn kinds(events: &[NetworkEvent]) -> Vec<NetworkEventKind> {
        events.iter().map(|e| e.kind()).collect()
    }

    #[test]
    fn passes_start_only_on_trigger_ticks() {
        let (mut networks, a, _, blocks) = two_networks();
        let mut storage = MemoryStorage::new();
        let mut scheduler = DistributionScheduler::new(5, 100);
        networks.queue_send(a, at(0, 0, 0), blocks.energy_type, 10).unwrap();

        let mut events = Vec::new();
        for tick in 1..5 {
            scheduler
                .run_tick(tick, &mut networks, &mut storage, 100, &mut events)
                .unwrap();
        }
        assert!(events.is_empty());
        assert_eq!(storage.amount(at(1, 0, 0), blocks.energy_type), 0);

        scheduler
            .run_tick(5, &mut networks, &mut storage, 100, &mut events)
            .unwrap();
        assert_eq!(
            kinds(&events),
            vec![NetworkEventKind::PassStarted, NetworkEventKind::PassCompleted]
        );
        assert_eq!(storage.amount(at(1, 0, 0), blocks.energy_type), 10);
    }

    #[test]
    fn idle_network_without_sends_is_not_started() {
        let (mut networks, _, _, _) = two_networks();
        let mut storage = MemoryStorage::new();
        let mut scheduler = DistributionScheduler::new(1, 100);
        let mut events = Vec::new();
        scheduler
            .run_tick(0, &mut networks, &mut storage, 100, &mut events)
            .unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn small_budget_spreads_pass_over_ticks() {
        let (mut networks, a, _, blocks) = two_networks();
        let mut storage = MemoryStorage::new();
        // One send takes 4 steps: targets, deliver, finish send, finish pass.
        let mut scheduler = DistributionScheduler::new(100, 1);
        networks.queue_send(a, at(0, 0, 0), blocks.energy_type, 10).unwrap();

        let mut events = Vec::new();
        scheduler
            .run_tick(0, &mut networks, &mut storage, 100, &mut events)
            .unwrap();
        assert!(networks.network(a).unwrap().is_running());

        for tick in 1..4 {
            scheduler
                .run_tick(tick, &mut networks, &mut storage, 100, &mut events)
                .unwrap();
        }
        assert!(!networks.network(a).unwrap().is_running());
        assert_eq!(
            kinds(&events),
            vec![NetworkEventKind::PassStarted, NetworkEventKind::PassCompleted]
        );
        assert_eq!(events[1].tick(), 3);
    }

    #[test]
    fn budget_is_shared_round_robin() {
        let (mut networks, a, b, blocks) = two_networks();
        let mut storage = MemoryStorage::new();
        let mut scheduler = DistributionScheduler::new(100, 4);
        networks.queue_send(a, at(0, 0, 0), blocks.energy_type, 10).unwrap();
        networks.queue_send(b, at(0, 0, 10), blocks.energy_type, 10).unwrap();

        let mut events = Vec::new();
        scheduler
            .run_tick(0, &mut networks, &mut storage, 100, &mut events)
            .unwrap();
        // Two steps each: both delivered, neither finished.
        assert_eq!(storage.amount(at(1, 0, 0), blocks.energy_type), 10);
        assert_eq!(storage.amount(at(1, 0, 10), blocks.energy_type), 10);
        assert!(networks.network(a).unwrap().is_running());
        assert!(networks.network(b).unwrap().is_running());
    }

    #[test]
    fn abort_in_one_network_does_not_stop_others() {
        let (mut networks, a, b, blocks) = two_networks();
        let mut storage = MemoryStorage::new();
        storage.fail_node(at(1, 0, 0));
        let mut scheduler = DistributionScheduler::new(1, 100);
        networks.queue_send(a, at(0, 0, 0), blocks.energy_type, 10).unwrap();
        networks.queue_send(b, at(0, 0, 10), blocks.energy_type, 10).unwrap();

        let mut events = Vec::new();
        let err = scheduler
            .run_tick(0, &mut networks, &mut storage, 100, &mut events)
            .unwrap_err();
        assert!(matches!(err, NetworkError::PassAborted { network, .. } if network == a));
        assert!(events.iter().any(|e| e.kind() == NetworkEventKind::PassAborted));
        assert!(events.iter().any(|e| matches!(
            e,
            NetworkEvent::PassCompleted { network, .. } if *network == b
        )));
        assert_eq!(storage.amount(at(1, 0, 10), blocks.energy_type), 10);
    }

    #[test]
    fn zero_interval_is_clamped() {
        let scheduler = DistributionScheduler::new(0, 1);
        assert_eq!(scheduler.interval(), 1);
        assert!(scheduler.is_trigger_tick(7));
    }
}
