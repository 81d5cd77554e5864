//! Connection discovery: depth-first traversal of one connected component.
//!
//! Starting from an origin node, the traversal walks the voxel grid through
//! nodes tagged for a single resource category. Conduits are transparent and
//! keep the walk going; consumers and generators are leaves that are recorded
//! but never expanded. The origin itself is always expanded, whatever its
//! role, so a machine can discover the network it sits on.
//!
//! The walk uses an explicit stack rather than recursion so its depth is
//! bounded by heap, not by the call stack.

use std::collections::BTreeSet;

use crate::id::{BlockTypeId, CategoryId};
use crate::link::LinkOverlay;
use crate::spatial::{NodeLocation, neighbors};
use crate::world::World;

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// The role a node plays in a network of one category.
///
/// Roles are derived at discovery time and may change between discoveries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum NodeRole {
    /// Pass-through wire. Extends traversal, holds nothing.
    Conduit,
    /// Traversal leaf that accepts resources up to capacity.
    Consumer,
    /// Traversal leaf that produces resources and keeps unsent reserve.
    Generator,
}

/// Capability lookup that resolves a block's role for a category.
pub trait RoleClassifier {
    /// `None` when the block does not take part in networks of `category`.
    fn classify(&self, block: BlockTypeId, category: CategoryId) -> Option<NodeRole>;

    /// Whether the block may be materialized in the link overlay.
    fn is_network_link(&self, block: BlockTypeId) -> bool;
}

/// Resolve the role of whatever block currently sits at `location`.
pub fn role_at<W, C>(
    world: &W,
    classifier: &C,
    location: NodeLocation,
    category: CategoryId,
) -> Option<NodeRole>
where
    W: World + ?Sized,
    C: RoleClassifier + ?Sized,
{
    world
        .block_at(location)
        .and_then(|block| classifier.classify(block, category))
}

// ---------------------------------------------------------------------------
// Discovery result
// ---------------------------------------------------------------------------

/// The members of one connected component, split by role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovery {
    pub conduits: BTreeSet<NodeLocation>,
    pub consumers: BTreeSet<NodeLocation>,
    pub generators: BTreeSet<NodeLocation>,
}

impl Discovery {
    /// Whether nothing at all was found.
    pub fn is_empty(&self) -> bool {
        self.conduits.is_empty() && self.consumers.is_empty() && self.generators.is_empty()
    }

    /// Whether at least one consumer or generator was found. Components made
    /// only of conduits never become networks.
    pub fn has_endpoints(&self) -> bool {
        !self.consumers.is_empty() || !self.generators.is_empty()
    }

    /// Total number of recorded nodes.
    pub fn len(&self) -> usize {
        self.conduits.len() + self.consumers.len() + self.generators.len()
    }

    /// The role `location` was recorded under, if any.
    pub fn role_of(&self, location: &NodeLocation) -> Option<NodeRole> {
        if self.conduits.contains(location) {
            Some(NodeRole::Conduit)
        } else if self.consumers.contains(location) {
            Some(NodeRole::Consumer)
        } else if self.generators.contains(location) {
            Some(NodeRole::Generator)
        } else {
            None
        }
    }

    fn record(&mut self, location: NodeLocation, role: NodeRole) {
        match role {
            NodeRole::Conduit => self.conduits.insert(location),
            NodeRole::Consumer => self.consumers.insert(location),
            NodeRole::Generator => self.generators.insert(location),
        };
    }
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

/// Discover the component reachable from `origin` through spatial adjacency.
pub fn discover<W, C>(world: &W, classifier: &C, origin: NodeLocation, category: CategoryId) -> Discovery
where
    W: World + ?Sized,
    C: RoleClassifier + ?Sized,
{
    discover_with_links(world, classifier, None, origin, category)
}

/// Discover the component reachable from `origin`, also following explicit
/// link overlay connections out of expanded nodes.
///
/// Returns an empty result without traversing when the origin does not take
/// part in networks of `category`.
pub fn discover_with_links<W, C>(
    world: &W,
    classifier: &C,
    links: Option<&LinkOverlay>,
    origin: NodeLocation,
    category: CategoryId,
) -> Discovery
where
    W: World + ?Sized,
    C: RoleClassifier + ?Sized,
{
    let mut result = Discovery::default();

    if role_at(world, classifier, origin, category).is_none() {
        tracing::trace!(?origin, ?category, "origin does not participate");
        return result;
    }

    let mut visited: BTreeSet<NodeLocation> = BTreeSet::new();
    let mut stack: Vec<NodeLocation> = vec![origin];

    while let Some(location) = stack.pop() {
        if !visited.insert(location) {
            continue;
        }
        // Blocks may have vanished or changed since being pushed.
        let Some(role) = role_at(world, classifier, location, category) else {
            continue;
        };
        result.record(location, role);

        let expand = location == origin || role == NodeRole::Conduit;
        if !expand {
            continue;
        }

        for (_, next) in neighbors(world, location) {
            if !visited.contains(&next) {
                stack.push(next);
            }
        }

        // Leaves, including a leaf origin, are never expanded through links.
        if let (Some(links), NodeRole::Conduit) = (links, role) {
            for &peer in links.connections_of(location) {
                if peer.dimension == location.dimension && !visited.contains(&peer) {
                    stack.push(peer);
                }
            }
        }
    }

    tracing::debug!(
        ?origin,
        ?category,
        conduits = result.conduits.len(),
        consumers = result.consumers.len(),
        generators = result.generators.len(),
        "discovery finished"
    );
    result
}
