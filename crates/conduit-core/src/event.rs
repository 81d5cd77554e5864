//! Events emitted by the engine.
//!
//! Events are buffered on the engine as they happen and handed to the host
//! from [`ConduitEngine::tick`] or [`ConduitEngine::drain_events`].
//!
//! [`ConduitEngine::tick`]: crate::engine::ConduitEngine::tick
//! [`ConduitEngine::drain_events`]: crate::engine::ConduitEngine::drain_events

use crate::id::{CategoryId, NetworkId};

/// A network lifecycle or distribution event. All events carry the tick at
/// which they occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    Established {
        network: NetworkId,
        category: CategoryId,
        tick: u64,
    },
    Destroyed {
        network: NetworkId,
        tick: u64,
    },
    PassStarted {
        network: NetworkId,
        queued: usize,
        tick: u64,
    },
    PassCompleted {
        network: NetworkId,
        items: usize,
        tick: u64,
    },
    /// A storage failure aborted the pass; `dropped` sends were lost,
    /// counting the one in flight.
    PassAborted {
        network: NetworkId,
        dropped: usize,
        tick: u64,
    },
}

/// Discriminant tag for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkEventKind {
    Established,
    Destroyed,
    PassStarted,
    PassCompleted,
    PassAborted,
}

impl NetworkEvent {
    pub fn kind(&self) -> NetworkEventKind {
        match self {
            NetworkEvent::Established { .. } => NetworkEventKind::Established,
            NetworkEvent::Destroyed { .. } => NetworkEventKind::Destroyed,
            NetworkEvent::PassStarted { .. } => NetworkEventKind::PassStarted,
            NetworkEvent::PassCompleted { .. } => NetworkEventKind::PassCompleted,
            NetworkEvent::PassAborted { .. } => NetworkEventKind::PassAborted,
        }
    }

    pub fn network(&self) -> NetworkId {
        match self {
            NetworkEvent::Established { network, .. }
            | NetworkEvent::Destroyed { network, .. }
            | NetworkEvent::PassStarted { network, .. }
            | NetworkEvent::PassCompleted { network, .. }
            | NetworkEvent::PassAborted { network, .. } => *network,
        }
    }

    pub fn tick(&self) -> u64 {
        match self {
            NetworkEvent::Established { tick, .. }
            | NetworkEvent::Destroyed { tick, .. }
            | NetworkEvent::PassStarted { tick, .. }
            | NetworkEvent::PassCompleted { tick, .. }
            | NetworkEvent::PassAborted { tick, .. } => *tick,
        }
    }
}
