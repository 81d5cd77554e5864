//! Network link overlay: explicit point-to-point connections between nodes.
//!
//! Links bypass spatial adjacency. Every connection is stored on both ends;
//! adding `a -> b` also adds `b -> a`, and destroying a node strips every
//! back-reference to it from its former peers.
//!
//! Entries are materialized lazily, and only for blocks carrying the network
//! link tag. Removal paths do not consult the world, since they usually run
//! after the block is already gone.

use std::collections::BTreeMap;

use crate::discovery::RoleClassifier;
use crate::spatial::NodeLocation;
use crate::world::World;

/// Side-table entry for one linkable node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkNode {
    pub location: NodeLocation,
    pub connections: Vec<NodeLocation>,
}

impl LinkNode {
    fn new(location: NodeLocation) -> Self {
        Self {
            location,
            connections: Vec::new(),
        }
    }

    fn connect(&mut self, other: NodeLocation) {
        if !self.connections.contains(&other) {
            self.connections.push(other);
        }
    }

    fn disconnect(&mut self, other: NodeLocation) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| *c != other);
        self.connections.len() != before
    }
}

/// Errors from link overlay operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    #[error("node at {0:?} has no link entry and is not tagged as a network link")]
    NotLinkable(NodeLocation),
    #[error("cannot link node at {0:?} to itself")]
    SelfLink(NodeLocation),
}

/// All materialized link nodes, keyed by location.
#[derive(Debug, Clone, Default)]
pub struct LinkOverlay {
    nodes: BTreeMap<NodeLocation, LinkNode>,
}

impl LinkOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find or create the entry for `location`. Creation requires the block
    /// there to carry the network link tag.
    pub fn get_or_create<W, C>(
        &mut self,
        world: &W,
        classifier: &C,
        location: NodeLocation,
    ) -> Result<&LinkNode, LinkError>
    where
        W: World + ?Sized,
        C: RoleClassifier + ?Sized,
    {
        self.materialize(world, classifier, location)?;
        self.nodes
            .get(&location)
            .ok_or(LinkError::NotLinkable(location))
    }

    /// Connections of `location`. A linkable node without an entry yet has
    /// none.
    pub fn get_connections<W, C>(
        &self,
        world: &W,
        classifier: &C,
        location: NodeLocation,
    ) -> Result<Vec<NodeLocation>, LinkError>
    where
        W: World + ?Sized,
        C: RoleClassifier + ?Sized,
    {
        if let Some(node) = self.nodes.get(&location) {
            return Ok(node.connections.clone());
        }
        if is_linkable(world, classifier, location) {
            Ok(Vec::new())
        } else {
            Err(LinkError::NotLinkable(location))
        }
    }

    /// Connections of `location` without any world check. Empty when the
    /// node has no entry.
    pub fn connections_of(&self, location: NodeLocation) -> &[NodeLocation] {
        self.nodes
            .get(&location)
            .map(|n| n.connections.as_slice())
            .unwrap_or(&[])
    }

    /// Connect `a` and `b` in both directions. Both ends are validated before
    /// anything is written.
    pub fn add_connection<W, C>(
        &mut self,
        world: &W,
        classifier: &C,
        a: NodeLocation,
        b: NodeLocation,
    ) -> Result<(), LinkError>
    where
        W: World + ?Sized,
        C: RoleClassifier + ?Sized,
    {
        if a == b {
            return Err(LinkError::SelfLink(a));
        }
        for end in [a, b] {
            if !self.nodes.contains_key(&end) && !is_linkable(world, classifier, end) {
                return Err(LinkError::NotLinkable(end));
            }
        }
        self.nodes.entry(a).or_insert_with(|| LinkNode::new(a)).connect(b);
        self.nodes.entry(b).or_insert_with(|| LinkNode::new(b)).connect(a);
        tracing::debug!(?a, ?b, "link added");
        Ok(())
    }

    /// Remove the connection between `a` and `b` in both directions.
    /// Returns whether anything was removed.
    pub fn remove_connection(&mut self, a: NodeLocation, b: NodeLocation) -> bool {
        let mut removed = false;
        if let Some(node) = self.nodes.get_mut(&a) {
            removed |= node.disconnect(b);
        }
        if let Some(node) = self.nodes.get_mut(&b) {
            removed |= node.disconnect(a);
        }
        if removed {
            tracing::debug!(?a, ?b, "link removed");
        }
        removed
    }

    /// Delete the entry for `location` and every back-reference to it.
    /// Returns the former peers.
    pub fn destroy(&mut self, location: NodeLocation) -> Vec<NodeLocation> {
        let Some(node) = self.nodes.remove(&location) else {
            return Vec::new();
        };
        for peer in &node.connections {
            if let Some(peer_node) = self.nodes.get_mut(peer) {
                peer_node.disconnect(location);
            }
        }
        tracing::debug!(?location, peers = node.connections.len(), "link node destroyed");
        node.connections
    }

    pub fn contains(&self, location: NodeLocation) -> bool {
        self.nodes.contains_key(&location)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn materialize<W, C>(
        &mut self,
        world: &W,
        classifier: &C,
        location: NodeLocation,
    ) -> Result<(), LinkError>
    where
        W: World + ?Sized,
        C: RoleClassifier + ?Sized,
    {
        if self.nodes.contains_key(&location) {
            return Ok(());
        }
        if !is_linkable(world, classifier, location) {
            return Err(LinkError::NotLinkable(location));
        }
        self.nodes.insert(location, LinkNode::new(location));
        Ok(())
    }
}

fn is_linkable<W, C>(world: &W, classifier: &C, location: NodeLocation) -> bool
where
    W: World + ?Sized,
    C: RoleClassifier + ?Sized,
{
    world
        .block_at(location)
        .map(|block| classifier.is_network_link(block))
        .unwrap_or(false)
}
