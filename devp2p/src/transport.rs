//! The injected transport boundary (`spec.md` §4.5, §6).
//!
//! The on-the-wire codec (RLP framing, packet authentication) belongs to
//! the transport implementation itself and is out of scope here (`spec.md`
//! §1); this module specifies only the shape the discovery table depends
//! on: four async operations, and the message fields callers need.

use async_trait::async_trait;

use crate::error::DiscoveryError;
use crate::node::{Endpoint, Node, NodeId};

/// `PING`/`PONG` carry liveness plus endpoint publication (`spec.md` §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ping {
    pub from: Endpoint,
    pub to: Endpoint,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pong {
    pub to: Endpoint,
    /// The endpoint the sender observed us at, per the PONG wire contract.
    pub observed: Endpoint,
}

/// `FINDNODE(target)`: request the closest known nodes to `target`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindNode {
    pub target: crate::node::NodeHash,
}

/// `NEIGHBORS(nodes)`: reply to `FINDNODE`, carrying at most
/// [`crate::closest::CLOSEST_CAPACITY`] valid records (`spec.md` §6).
#[derive(Debug, Clone)]
pub struct Neighbors {
    pub nodes: Vec<Node>,
}

/// The four operations the discovery table needs from an authenticated
/// peer-to-peer transport (`spec.md` §4.5).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a PING and awaits the matching PONG.
    async fn ping(&self, id: &NodeId, addr: Endpoint) -> Result<(), DiscoveryError>;

    /// Blocks until the peer pings us (or this times out). Used by the
    /// bonding initiator so the remote may bond back; a timeout here is
    /// ignored by the caller, not propagated as a failure.
    async fn waitping(&self, id: &NodeId) -> Result<(), DiscoveryError>;

    /// Requests the peer's closest-known nodes to `target`.
    async fn findnode(&self, id: &NodeId, addr: Endpoint, target: crate::node::NodeHash) -> Result<Vec<Node>, DiscoveryError>;

    /// Shuts the transport down; idempotent.
    async fn close(&self);
}
