//! Storage accessor: integer quantities keyed by (node, storage type).
//!
//! The engine treats storage as a synchronous capability owned by the host.
//! Persistence is the host's concern; [`MemoryStorage`] is the in-process
//! implementation used by headless hosts and tests.

use std::collections::{BTreeMap, BTreeSet};

use crate::id::StorageTypeId;
use crate::spatial::NodeLocation;

/// Get/set access to stored amounts.
pub trait StorageAccessor {
    /// Current amount of `storage_type` held at `node`. Missing entries are 0.
    fn get_amount(
        &self,
        node: NodeLocation,
        storage_type: StorageTypeId,
    ) -> Result<u64, StorageError>;

    /// Overwrite the amount of `storage_type` held at `node`.
    fn set_amount(
        &mut self,
        node: NodeLocation,
        storage_type: StorageTypeId,
        value: u64,
    ) -> Result<(), StorageError>;
}

/// Errors raised by a storage backend. Any of these aborts a distribution pass.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("storage unavailable at {node:?}")]
    Unavailable { node: NodeLocation },
    #[error("storage backend failed: {0}")]
    Backend(String),
}

/// A sparse in-memory store. Zero amounts are not kept.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    amounts: BTreeMap<(NodeLocation, StorageTypeId), u64>,
    /// Nodes whose reads and writes fail, for exercising abort paths.
    failing: BTreeSet<NodeLocation>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Amount at `node`, treating failures as 0. Convenience for inspection.
    pub fn amount(&self, node: NodeLocation, storage_type: StorageTypeId) -> u64 {
        self.amounts
            .get(&(node, storage_type))
            .copied()
            .unwrap_or(0)
    }

    /// Sum of one storage type across every node.
    pub fn total(&self, storage_type: StorageTypeId) -> u64 {
        self.amounts
            .iter()
            .filter(|((_, ty), _)| *ty == storage_type)
            .map(|(_, v)| *v)
            .sum()
    }

    /// Drop every amount held at `node` (the block was removed).
    pub fn clear_node(&mut self, node: NodeLocation) {
        self.amounts.retain(|(n, _), _| *n != node);
    }

    /// Make every access to `node` fail with [`StorageError::Unavailable`].
    pub fn fail_node(&mut self, node: NodeLocation) {
        self.failing.insert(node);
    }

    pub fn restore_node(&mut self, node: NodeLocation) {
        self.failing.remove(&node);
    }
}

impl StorageAccessor for MemoryStorage {
    fn get_amount(
        &self,
        node: NodeLocation,
        storage_type: StorageTypeId,
    ) -> Result<u64, StorageError> {
        if self.failing.contains(&node) {
            return Err(StorageError::Unavailable { node });
        }
        Ok(self.amount(node, storage_type))
    }

    fn set_amount(
        &mut self,
        node: NodeLocation,
        storage_type: StorageTypeId,
        value: u64,
    ) -> Result<(), StorageError> {
        if self.failing.contains(&node) {
            return Err(StorageError::Unavailable { node });
        }
        if value == 0 {
            self.amounts.remove(&(node, storage_type));
        } else {
            self.amounts.insert((node, storage_type), value);
        }
        Ok(())
    }
}
