//! Distribution engine: a resumable pass that drains one network's send queue.
//!
//! A [`DistributionPass`] is an explicit state machine. Each call to
//! [`DistributionPass::advance`] performs one bounded unit of work and
//! returns the [`PassStep`] it completed, so the host can interleave other
//! work between steps and spread a long pass over several ticks.
//!
//! # Algorithm
//!
//! 1. The queue is drained newest-first (LIFO).
//! 2. The first time a storage type is seen in a pass, its target list is
//!    built: every consumer below capacity, with its stored amount at that
//!    moment. The list is ordered so the least-stored consumer comes first.
//! 3. The popped send walks the target list, topping each target up towards
//!    capacity. Each write re-reads the live amount first, because earlier
//!    steps of the same pass may already have credited that target. Targets
//!    are consumed as they are visited.
//! 4. Whatever could not be placed is written back to the source as its
//!    reserve, clamped to capacity.
//!
//! # Steps
//!
//! One step ends after building a target list, after each target write,
//! and after each finished send.

use std::collections::{BTreeMap, BTreeSet};

use crate::id::StorageTypeId;
use crate::spatial::NodeLocation;
use crate::storage::{StorageAccessor, StorageError};

// ---------------------------------------------------------------------------
// Queue entries
// ---------------------------------------------------------------------------

/// A pending transfer out of `source`. `amount` is always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendEntry {
    pub source: NodeLocation,
    pub storage_type: StorageTypeId,
    pub amount: u64,
}

// ---------------------------------------------------------------------------
// Pass state
// ---------------------------------------------------------------------------

/// A consumer snapshot taken when a target list is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Target {
    node: NodeLocation,
    amount: u64,
}

/// The send currently being placed.
#[derive(Debug, Clone, Copy)]
struct InFlight {
    entry: SendEntry,
    remaining: u64,
}

/// What one call to [`DistributionPass::advance`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStep {
    /// Built the target list for a storage type.
    TargetsBuilt {
        storage_type: StorageTypeId,
        targets: usize,
    },
    /// Credited `amount` to one target. `amount` may be 0 when the target
    /// filled up from elsewhere since the list was built.
    Delivered { target: NodeLocation, amount: u64 },
    /// Finished one send and wrote `reserve` back to its source.
    SendFinished { source: NodeLocation, reserve: u64 },
    /// The queue is empty. The pass is over.
    Finished { sends: usize },
}

/// Resumable state of one distribution pass.
#[derive(Debug, Clone, Default)]
pub struct DistributionPass {
    /// Per-type target lists, ordered most-stored first so `pop` yields the
    /// least-stored consumer.
    targets: BTreeMap<StorageTypeId, Vec<Target>>,
    in_flight: Option<InFlight>,
    sends: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DistributionError {
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl DistributionPass {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sends fully processed so far.
    pub fn sends_processed(&self) -> usize {
        self.sends
    }

    /// Whether a send is partially placed.
    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Perform one bounded unit of work.
    ///
    /// `queue` is the network's send queue; entries pushed between calls are
    /// picked up by the same pass. On error the pass must be discarded.
    pub fn advance<S: StorageAccessor + ?Sized>(
        &mut self,
        queue: &mut Vec<SendEntry>,
        consumers: &BTreeSet<NodeLocation>,
        storage: &mut S,
        capacity: u64,
    ) -> Result<PassStep, DistributionError> {
        if self.in_flight.is_none() {
            let Some(next) = queue.last() else {
                return Ok(PassStep::Finished { sends: self.sends });
            };
            let storage_type = next.storage_type;

            if !self.targets.contains_key(&storage_type) {
                let list = build_targets(consumers, storage, storage_type, capacity)?;
                let count = list.len();
                self.targets.insert(storage_type, list);
                return Ok(PassStep::TargetsBuilt {
                    storage_type,
                    targets: count,
                });
            }

            // Just peeked, so the pop always succeeds.
            if let Some(entry) = queue.pop() {
                self.in_flight = Some(InFlight {
                    entry,
                    remaining: entry.amount,
                });
            }
        }

        let Some(flight) = self.in_flight.as_mut() else {
            return Ok(PassStep::Finished { sends: self.sends });
        };
        let storage_type = flight.entry.storage_type;

        if flight.remaining > 0 {
            let target = self
                .targets
                .get_mut(&storage_type)
                .and_then(|list| list.pop());
            if let Some(target) = target {
                let live = storage.get_amount(target.node, storage_type)?;
                let amount = capacity.saturating_sub(live).min(flight.remaining);
                if amount > 0 {
                    storage.set_amount(target.node, storage_type, live + amount)?;
                    flight.remaining -= amount;
                }
                return Ok(PassStep::Delivered {
                    target: target.node,
                    amount,
                });
            }
        }

        // Out of targets or out of resource: the rest becomes reserve.
        let source = flight.entry.source;
        let reserve = flight.remaining.min(capacity);
        storage.set_amount(source, storage_type, reserve)?;
        self.in_flight = None;
        self.sends += 1;
        Ok(PassStep::SendFinished { source, reserve })
    }

    /// Drive the pass to completion. For hosts that do not need to spread
    /// work over ticks.
    pub fn run_to_completion<S: StorageAccessor + ?Sized>(
        &mut self,
        queue: &mut Vec<SendEntry>,
        consumers: &BTreeSet<NodeLocation>,
        storage: &mut S,
        capacity: u64,
    ) -> Result<usize, DistributionError> {
        loop {
            if let PassStep::Finished { sends } = self.advance(queue, consumers, storage, capacity)? {
                return Ok(sends);
            }
        }
    }
}

fn build_targets<S: StorageAccessor + ?Sized>(
    consumers: &BTreeSet<NodeLocation>,
    storage: &S,
    storage_type: StorageTypeId,
    capacity: u64,
) -> Result<Vec<Target>, StorageError> {
    let mut targets = Vec::with_capacity(consumers.len());
    for &node in consumers {
        let amount = storage.get_amount(node, storage_type)?;
        if amount < capacity {
            targets.push(Target { node, amount });
        }
    }
    // Descending, so popping from the end visits the least-stored first.
    // Ties resolve to the lowest location first.
    targets.sort_by(|a, b| b.amount.cmp(&a.amount).then(b.node.cmp(&a.node)));
    Ok(targets)
}
