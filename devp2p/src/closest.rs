//! Fixed-capacity closest-node selector (`spec.md` §4.4).

use crate::distance::distcmp;
use crate::node::{Node, NodeHash};

pub const CLOSEST_CAPACITY: usize = 16;

/// Keeps the `CLOSEST_CAPACITY` nodes nearest to a target hash, stably
/// deduplicated by [`crate::node::NodeId`].
pub struct ClosestSet {
    target: NodeHash,
    nodes: Vec<Node>,
}

impl ClosestSet {
    pub fn new(target: NodeHash) -> Self {
        ClosestSet { target, nodes: Vec::with_capacity(CLOSEST_CAPACITY + 1) }
    }

    /// Offers a node. If it is closer than the current worst kept entry (or
    /// there is spare capacity), it is inserted in distance order; a prior
    /// entry with the same id is replaced rather than duplicated.
    pub fn offer(&mut self, node: Node) {
        if let Some(idx) = self.nodes.iter().position(|n| n.id == node.id) {
            self.nodes.remove(idx);
        }

        let pos = self
            .nodes
            .iter()
            .position(|existing| distcmp(&self.target, &node.hash, &existing.hash) == std::cmp::Ordering::Less)
            .unwrap_or(self.nodes.len());
        self.nodes.insert(pos, node);
        self.nodes.truncate(CLOSEST_CAPACITY);
    }

    pub fn offer_all(&mut self, nodes: impl IntoIterator<Item = Node>) {
        for n in nodes {
            self.offer(n);
        }
    }

    pub fn into_nodes(self) -> Vec<Node> {
        self.nodes
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}
