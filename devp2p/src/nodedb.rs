//! Persistent node bookkeeping (`spec.md` §3, §6 "Persistent state:
//! nodeDB"; SPEC_FULL.md §4.5 [ADDED]).
//!
//! The trait is the boundary the discovery table depends on; the on-disk
//! implementation is an external collaborator (`spec.md` §1). This module
//! also provides `MemoryNodeDb`, a `tokio::sync`-protected in-memory
//! reference implementation for embedders and tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::node::{Node, NodeId};

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Key-value store mapping `(NodeID, field-tag) -> timestamp-or-counter`
/// (`spec.md` §6), generalized to the handful of fields the table reads
/// and writes.
#[async_trait]
pub trait NodeDb: Send + Sync {
    async fn last_ping(&self, id: &NodeId) -> Option<u64>;
    async fn last_pong(&self, id: &NodeId) -> Option<u64>;
    async fn find_failures(&self, id: &NodeId) -> u32;
    async fn update_last_ping(&self, id: &NodeId, now: u64);
    async fn update_last_pong(&self, id: &NodeId, now: u64);
    async fn update_find_failures(&self, id: &NodeId, count: u32);
    /// Creates or refreshes the node record itself (`spec.md` §4.5: "Create
    /// / update the Node record in nodeDB" during a bonding exchange).
    async fn upsert_node(&self, node: Node);
    /// Up to `limit` nodes seen more recently than `max_age_secs`, for
    /// refresh seeding (`spec.md` §4.5 "load up to 30 seed nodes from
    /// nodeDB (age ≤ ~5 days)").
    async fn seeds(&self, max_age_secs: u64, limit: usize) -> Vec<Node>;
    /// Drops entries whose last-pong exceeds `older_than_secs`.
    async fn expire(&self, older_than_secs: u64);
}

#[derive(Debug, Clone, Default)]
struct Record {
    node: Option<Node>,
    last_ping: Option<u64>,
    last_pong: Option<u64>,
    find_failures: u32,
}

/// In-memory reference [`NodeDb`]. Not persistent across process restarts;
/// a real node wires a durable implementation in its place.
#[derive(Default)]
pub struct MemoryNodeDb {
    records: Arc<RwLock<HashMap<NodeId, Record>>>,
}

impl MemoryNodeDb {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl NodeDb for MemoryNodeDb {
    async fn upsert_node(&self, node: Node) {
        let mut records = self.records.write().await;
        records.entry(node.id).or_default().node = Some(node);
    }

    async fn last_ping(&self, id: &NodeId) -> Option<u64> {
        self.records.read().await.get(id).and_then(|r| r.last_ping)
    }

    async fn last_pong(&self, id: &NodeId) -> Option<u64> {
        self.records.read().await.get(id).and_then(|r| r.last_pong)
    }

    async fn find_failures(&self, id: &NodeId) -> u32 {
        self.records.read().await.get(id).map(|r| r.find_failures).unwrap_or(0)
    }

    async fn update_last_ping(&self, id: &NodeId, now: u64) {
        self.records.write().await.entry(*id).or_default().last_ping = Some(now);
    }

    async fn update_last_pong(&self, id: &NodeId, now: u64) {
        self.records.write().await.entry(*id).or_default().last_pong = Some(now);
    }

    async fn update_find_failures(&self, id: &NodeId, count: u32) {
        self.records.write().await.entry(*id).or_default().find_failures = count;
    }

    async fn seeds(&self, max_age_secs: u64, limit: usize) -> Vec<Node> {
        let records = self.records.read().await;
        let now = unix_now();
        records
            .values()
            .filter_map(|r| r.node.clone().map(|n| (n, r.last_pong.unwrap_or(0))))
            .filter(|(_, last_pong)| now.saturating_sub(*last_pong) <= max_age_secs)
            .take(limit)
            .map(|(n, _)| n)
            .collect()
    }

    async fn expire(&self, older_than_secs: u64) {
        let mut records = self.records.write().await;
        let now = unix_now();
        records.retain(|_, r| match r.last_pong {
            Some(t) => now.saturating_sub(t) <= older_than_secs,
            None => true,
        });
    }
}
