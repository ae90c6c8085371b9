//! The Kademlia routing table: bonding, lookup, refresh, and the
//! bucket-owning actor (`spec.md` §4.5, §5; SPEC_FULL.md §4.5, §5, §9).
//!
//! Bucket mutations are owned by a single task (the refresh-loop actor)
//! reached over a command channel, per the REDESIGN FLAG in `spec.md` §9
//! ("replace the implicit-shared-memory layout with a refresh-loop actor
//! that owns the buckets and receives commands"). Bonding state lives
//! behind its own lock, separate from the actor, matching §5's "bonding
//! map and bucket mutations use separate locks to avoid a dependency
//! cycle."
//!
//! Two lookup/bond implementations exist side by side: the public,
//! channel-based ones on [`Table`] (for external callers), and private
//! ones on [`TableState`] that mutate buckets directly (used by the
//! refresh loop, which already runs on the actor task and would deadlock
//! if it routed its own mutations back through its own command channel).

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::future::{FutureExt, Shared};
use tokio::sync::{mpsc, oneshot, watch, Mutex, Semaphore};
use tokio::time;

use crate::bucket::{AddOutcome, Bucket};
use crate::closest::ClosestSet;
use crate::distance::{bucket_index, logdist, NUM_BUCKETS};
use crate::error::DiscoveryError;
use crate::node::{node_hash, Endpoint, Node, NodeHash, NodeId};
use crate::nodedb::NodeDb;
use crate::salts::Salts;
use crate::transport::Transport;

const BOND_SLOTS: usize = 16;
const FIND_FAILURE_LIMIT: u32 = 5;
const BOND_EXPIRY_SECS: u64 = 24 * 3600;
const REFRESH_SEED_MAX_AGE_SECS: u64 = 5 * 24 * 3600;
const REFRESH_SEED_LIMIT: usize = 30;
const REFRESH_INTERVAL: std::time::Duration = std::time::Duration::from_secs(3600);
const LOOKUP_ALPHA: usize = 3;
const RANDOM_LOOKUPS_PER_REFRESH: usize = 3;
const TABLE_IP_LIMIT: usize = 10;

type BondFuture = Pin<Box<dyn Future<Output = Result<(), DiscoveryError>> + Send>>;
type SharedBond = Shared<BondFuture>;

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn random_hash() -> NodeHash {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    NodeHash::from(bytes)
}

/// Shared, Arc-held context: everything bonding and lookups need that
/// isn't actor-owned bucket state.
struct TableContext {
    self_id: NodeId,
    transport: Arc<dyn Transport>,
    nodedb: Arc<dyn NodeDb>,
    salts: Salts,
    bonding: Mutex<HashMap<NodeId, SharedBond>>,
    bond_semaphore: Semaphore,
}

/// The bucket array and nursery; owned exclusively by the actor task.
struct TableState {
    self_hash: NodeHash,
    buckets: Vec<Bucket>,
    nursery: Vec<Node>,
}

impl TableState {
    fn new(self_hash: NodeHash) -> Self {
        TableState {
            self_hash,
            buckets: (0..NUM_BUCKETS).map(|_| Bucket::new()).collect(),
            nursery: Vec::new(),
        }
    }

    fn bucket_of(&self, hash: &NodeHash) -> Option<usize> {
        bucket_index(logdist(&self.self_hash, hash))
    }

    fn ip_total(&self) -> usize {
        self.buckets.iter().map(Bucket::ip_total).sum()
    }

    fn insert(&mut self, node: Node) {
        let Some(idx) = self.bucket_of(&node.hash) else { return };
        let table_ip = self.ip_total();
        if let AddOutcome::Replaced { evicted: Some(evicted) } = self.buckets[idx].add(node, table_ip, TABLE_IP_LIMIT) {
            self.buckets[idx].release_evicted_ip(&evicted);
        }
    }

    fn stuff(&mut self, salts: &Salts, node: Node) -> bool {
        match self.bucket_of(&node.hash) {
            Some(idx) => self.buckets[idx].stuff(node, |hash| salts.admits(hash)),
            None => false,
        }
    }

    fn delete(&mut self, id: &NodeId) -> Option<Node> {
        let idx = self.bucket_of(&node_hash(id))?;
        self.buckets[idx].delete(id)
    }

    fn closest_to(&self, target: &NodeHash) -> Vec<Node> {
        let mut set = ClosestSet::new(*target);
        for bucket in &self.buckets {
            set.offer_all(bucket.entries.iter().cloned());
        }
        set.into_nodes()
    }

    fn read_random(&self, limit: usize, rng: &mut impl rand::Rng) -> Vec<Node> {
        use rand::seq::SliceRandom;
        let mut order: Vec<usize> = (0..self.buckets.len()).filter(|&i| !self.buckets[i].entries.is_empty()).collect();
        order.shuffle(rng);

        let mut cursors = vec![0usize; self.buckets.len()];
        let mut out = Vec::new();
        loop {
            if out.len() >= limit {
                break;
            }
            let mut progressed = false;
            for &b in &order {
                if out.len() >= limit {
                    break;
                }
                let cursor = cursors[b];
                if cursor < self.buckets[b].entries.len() {
                    out.push(self.buckets[b].entries[cursor].clone());
                    cursors[b] += 1;
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
        out
    }

    /// Internal lookup, run directly on the actor task (`spec.md` §4.5
    /// `Lookup`).
    async fn lookup(&mut self, ctx: &Arc<TableContext>, target: NodeHash) -> Vec<Node> {
        let seed = self.closest_to(&target);
        let mut closest = ClosestSet::new(target);
        closest.offer_all(seed);

        let mut asked: HashSet<NodeId> = HashSet::new();
        loop {
            let candidates: Vec<Node> =
                closest.nodes().iter().filter(|n| !asked.contains(&n.id)).take(LOOKUP_ALPHA).cloned().collect();
            if candidates.is_empty() {
                break;
            }
            for n in &candidates {
                asked.insert(n.id);
            }

            let queries = candidates.iter().map(|n| {
                let ctx = ctx.clone();
                let id = n.id;
                let addr = n.endpoint;
                async move { ctx.transport.findnode(&id, addr, target).await }
            });
            let results = futures::future::join_all(queries).await;

            for (n, result) in candidates.iter().zip(results) {
                match result {
                    Ok(found) => {
                        ctx.nodedb.update_find_failures(&n.id, 0).await;
                        let bonded = bond_all_via_ctx(ctx, found).await;
                        for node in &bonded {
                            self.insert(node.clone());
                        }
                        closest.offer_all(bonded);
                    }
                    Err(_) => {
                        let failures = ctx.nodedb.find_failures(&n.id).await + 1;
                        ctx.nodedb.update_find_failures(&n.id, failures).await;
                        if failures >= FIND_FAILURE_LIMIT {
                            self.delete(&n.id);
                        }
                    }
                }
            }
        }
        closest.into_nodes()
    }

    /// `spec.md` §4.5 `Refresh loop`: one refresh cycle, run on the actor
    /// task.
    async fn refresh(&mut self, ctx: &Arc<TableContext>) {
        let mut seeds = ctx.nodedb.seeds(REFRESH_SEED_MAX_AGE_SECS, REFRESH_SEED_LIMIT).await;
        seeds.extend(self.nursery.clone());
        let bonded = bond_all_via_ctx(ctx, seeds).await;
        for node in bonded {
            self.stuff(&ctx.salts, node);
        }

        self.lookup(ctx, ctx.salts.self_lookup_target()).await;
        for _ in 0..RANDOM_LOOKUPS_PER_REFRESH {
            let target = random_hash();
            self.lookup(ctx, target).await;
        }
    }
}

/// Bonds with `id`, sharing one in-flight exchange across concurrent
/// callers (`spec.md` §4.5 "Bonding", concurrency contract).
async fn bond_via_ctx(ctx: &Arc<TableContext>, id: NodeId, addr: Endpoint, pinged: bool) -> Result<(), DiscoveryError> {
    if id == ctx.self_id {
        return Err(DiscoveryError::IsSelf);
    }

    let shared = {
        let mut bonding = ctx.bonding.lock().await;
        if let Some(existing) = bonding.get(&id) {
            existing.clone()
        } else {
            let ctx_owned = ctx.clone();
            let fut: BondFuture = Box::pin(do_bond_exchange(ctx_owned, id, addr, pinged));
            let shared = fut.shared();
            bonding.insert(id, shared.clone());
            shared
        }
    };

    let result = shared.await;
    ctx.bonding.lock().await.remove(&id);
    result
}

/// The bonding exchange itself (`spec.md` §4.5 step list), guarded by the
/// table-wide bonding slot semaphore.
async fn do_bond_exchange(ctx: Arc<TableContext>, id: NodeId, addr: Endpoint, pinged: bool) -> Result<(), DiscoveryError> {
    let last_pong = ctx.nodedb.last_pong(&id).await;
    let failures = ctx.nodedb.find_failures(&id).await;
    let now = unix_now();
    let needs_bond =
        last_pong.is_none() || failures > 0 || last_pong.map_or(true, |t| now.saturating_sub(t) > BOND_EXPIRY_SECS);

    if !needs_bond {
        return Ok(());
    }

    let _permit = ctx.bond_semaphore.acquire().await.map_err(|_| DiscoveryError::BondFailed)?;

    ctx.transport.ping(&id, addr).await?;
    ctx.nodedb.update_last_ping(&id, now).await;

    if !pinged {
        let _ = ctx.transport.waitping(&id).await;
    }

    ctx.nodedb.update_last_pong(&id, now).await;
    ctx.nodedb.upsert_node(Node::new(id, addr, now)).await;
    ctx.nodedb.update_find_failures(&id, 0).await;
    Ok(())
}

/// Bonds every node in `nodes` concurrently and returns the survivors
/// (`spec.md` §4.5: "bond all returned nodes (concurrently)").
async fn bond_all_via_ctx(ctx: &Arc<TableContext>, nodes: Vec<Node>) -> Vec<Node> {
    let futures = nodes.into_iter().map(|n| {
        let ctx = ctx.clone();
        async move {
            let addr = n.endpoint;
            match bond_via_ctx(&ctx, n.id, addr, false).await {
                Ok(()) => Some(n),
                Err(_) => None,
            }
        }
    });
    futures::future::join_all(futures).await.into_iter().flatten().collect()
}

fn validate_fallback(node: &Node) -> Result<(), DiscoveryError> {
    if node.endpoint.address.is_unspecified() || node.endpoint.udp_port == 0 {
        return Err(DiscoveryError::FallbackInvalid);
    }
    Ok(())
}

enum Command {
    Insert { node: Node, reply: oneshot::Sender<()> },
    Delete { id: NodeId, reply: oneshot::Sender<Option<Node>> },
    /// `seed: None` shuffles bucket order with the process RNG; `Some(seed)`
    /// drives it from a deterministic `StdRng`, the seam a caller (tests,
    /// or an embedder replaying a simulation) uses to make
    /// `ReadRandomNodes`'s ordering reproducible (`spec.md` §4.5
    /// `ReadRandomNodes`).
    ReadRandom { limit: usize, seed: Option<u64>, reply: oneshot::Sender<Vec<Node>> },
    ClosestTo { target: NodeHash, reply: oneshot::Sender<Vec<Node>> },
    SetNursery { nodes: Vec<Node>, reply: oneshot::Sender<()> },
}

fn handle_command(state: &mut TableState, cmd: Command) {
    match cmd {
        Command::Insert { node, reply } => {
            state.insert(node);
            let _ = reply.send(());
        }
        Command::Delete { id, reply } => {
            let removed = state.delete(&id);
            let _ = reply.send(removed);
        }
        Command::ReadRandom { limit, seed, reply } => {
            let nodes = match seed {
                Some(seed) => {
                    use rand::SeedableRng;
                    state.read_random(limit, &mut rand::rngs::StdRng::seed_from_u64(seed))
                }
                None => state.read_random(limit, &mut rand::thread_rng()),
            };
            let _ = reply.send(nodes);
        }
        Command::ClosestTo { target, reply } => {
            let nodes = state.closest_to(&target);
            let _ = reply.send(nodes);
        }
        Command::SetNursery { nodes, reply } => {
            state.nursery = nodes;
            let _ = reply.send(());
        }
    }
}

async fn run_actor(
    mut state: TableState,
    ctx: Arc<TableContext>,
    mut cmd_rx: mpsc::Receiver<Command>,
    mut refresh_rx: mpsc::Receiver<oneshot::Sender<()>>,
    mut closed_rx: watch::Receiver<bool>,
) {
    let mut ticker = time::interval(REFRESH_INTERVAL);
    ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
    ticker.tick().await; // first tick fires immediately; consume it so the loop waits a full interval

    loop {
        tokio::select! {
            changed = closed_rx.changed() => {
                if changed.is_err() || *closed_rx.borrow() {
                    break;
                }
            }
            maybe_cmd = cmd_rx.recv() => {
                match maybe_cmd {
                    Some(cmd) => handle_command(&mut state, cmd),
                    None => break,
                }
            }
            maybe_reply = refresh_rx.recv() => {
                match maybe_reply {
                    Some(reply) => {
                        let mut waiters = vec![reply];
                        while let Ok(extra) = refresh_rx.try_recv() {
                            waiters.push(extra);
                        }
                        state.refresh(&ctx).await;
                        for w in waiters {
                            let _ = w.send(());
                        }
                    }
                    None => break,
                }
            }
            _ = ticker.tick() => {
                state.refresh(&ctx).await;
            }
        }
    }

    log::debug!("discovery table actor exiting");
}

/// Public handle to a running discovery table (`spec.md` §3 `Table`, §4.5,
/// §5).
pub struct Table {
    cmd_tx: mpsc::Sender<Command>,
    refresh_tx: mpsc::Sender<oneshot::Sender<()>>,
    closed_tx: watch::Sender<bool>,
    actor_done: Shared<Pin<Box<dyn Future<Output = ()> + Send>>>,
    ctx: Arc<TableContext>,
}

impl Table {
    /// Spawns the refresh-loop actor and returns a handle to it. Must be
    /// called from within a `tokio` runtime.
    pub fn new(self_id: NodeId, transport: Arc<dyn Transport>, nodedb: Arc<dyn NodeDb>) -> Self {
        let self_hash = node_hash(&self_id);
        let ctx = Arc::new(TableContext {
            self_id,
            transport,
            nodedb,
            salts: Salts::random(),
            bonding: Mutex::new(HashMap::new()),
            bond_semaphore: Semaphore::new(BOND_SLOTS),
        });

        let state = TableState::new(self_hash);

        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (refresh_tx, refresh_rx) = mpsc::channel(8);
        let (closed_tx, closed_rx) = watch::channel(false);

        let actor_ctx = ctx.clone();
        let handle = tokio::spawn(run_actor(state, actor_ctx, cmd_rx, refresh_rx, closed_rx));
        let actor_done: Shared<Pin<Box<dyn Future<Output = ()> + Send>>> =
            (async move {
                let _ = handle.await;
            })
            .boxed()
            .shared();

        Table { cmd_tx, refresh_tx, closed_tx, actor_done, ctx }
    }

    /// `spec.md` §4.5 `Bonding`. Rejects `id == self` with
    /// [`DiscoveryError::IsSelf`] (`spec.md` §8 boundary behavior).
    pub async fn bond(&self, id: NodeId, addr: Endpoint, pinged: bool) -> Result<(), DiscoveryError> {
        let result = bond_via_ctx(&self.ctx, id, addr, pinged).await;
        if !matches!(result, Err(DiscoveryError::IsSelf)) {
            self.insert(Node::new(id, addr, unix_now())).await;
        }
        result
    }

    /// `spec.md` §4.5 `Lookup`.
    pub async fn lookup(&self, target: NodeHash) -> Vec<Node> {
        let mut seed = self.closest_to(target).await;
        if seed.is_empty() {
            self.refresh().await;
            seed = self.closest_to(target).await;
        }

        let mut closest = ClosestSet::new(target);
        closest.offer_all(seed);

        let mut asked: HashSet<NodeId> = HashSet::new();
        loop {
            let candidates: Vec<Node> =
                closest.nodes().iter().filter(|n| !asked.contains(&n.id)).take(LOOKUP_ALPHA).cloned().collect();
            if candidates.is_empty() {
                break;
            }
            for n in &candidates {
                asked.insert(n.id);
            }

            let queries = candidates.iter().map(|n| {
                let ctx = self.ctx.clone();
                let id = n.id;
                let addr = n.endpoint;
                async move { ctx.transport.findnode(&id, addr, target).await }
            });
            let results = futures::future::join_all(queries).await;

            for (n, result) in candidates.iter().zip(results) {
                match result {
                    Ok(found) => {
                        self.ctx.nodedb.update_find_failures(&n.id, 0).await;
                        let bonded = bond_all_via_ctx(&self.ctx, found).await;
                        for node in &bonded {
                            self.insert(node.clone()).await;
                        }
                        closest.offer_all(bonded);
                    }
                    Err(e) => {
                        log::debug!("findnode against {:?} failed: {}", n.id, e);
                        let failures = self.ctx.nodedb.find_failures(&n.id).await + 1;
                        self.ctx.nodedb.update_find_failures(&n.id, failures).await;
                        if failures >= FIND_FAILURE_LIMIT {
                            self.delete(n.id).await;
                        }
                    }
                }
            }
        }
        closest.into_nodes()
    }

    async fn insert(&self, node: Node) {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::Insert { node, reply: tx }).await.is_ok() {
            let _ = rx.await;
        }
    }

    pub async fn delete(&self, id: NodeId) -> Option<Node> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx.send(Command::Delete { id, reply: tx }).await.ok()?;
        rx.await.ok().flatten()
    }

    pub async fn closest_to(&self, target: NodeHash) -> Vec<Node> {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::ClosestTo { target, reply: tx }).await.is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// `ReadRandomNodes` (`spec.md` §4.5): one cryptographically-randomly-
    /// ordered head-of-bucket per non-empty bucket, round-robin across
    /// buckets until `limit` nodes are collected or all buckets drain.
    pub async fn read_random_nodes(&self, limit: usize) -> Vec<Node> {
        self.read_random_nodes_inner(limit, None).await
    }

    /// As [`Table::read_random_nodes`], but the bucket-visiting order is
    /// drawn from a `seed`-derived deterministic RNG instead of the
    /// process RNG — the seam `spec.md` §8's round-robin test drives.
    pub async fn read_random_nodes_seeded(&self, limit: usize, seed: u64) -> Vec<Node> {
        self.read_random_nodes_inner(limit, Some(seed)).await
    }

    async fn read_random_nodes_inner(&self, limit: usize, seed: Option<u64>) -> Vec<Node> {
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::ReadRandom { limit, seed, reply: tx }).await.is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// `spec.md` §4.5/§7 `SetFallbackNodes`: structural validation, then an
    /// atomic nursery replacement (`spec.md` §8 boundary behavior: a
    /// zero-length list empties the nursery without error).
    pub async fn set_fallback_nodes(&self, nodes: Vec<Node>) -> Result<(), DiscoveryError> {
        for node in &nodes {
            validate_fallback(node)?;
        }
        let (tx, rx) = oneshot::channel();
        if self.cmd_tx.send(Command::SetNursery { nodes, reply: tx }).await.is_ok() {
            let _ = rx.await;
        }
        Ok(())
    }

    /// Triggers a refresh and waits for it to complete; concurrent callers
    /// share the in-flight refresh's completion (`spec.md` §4.5 `Refresh
    /// loop`).
    pub async fn refresh(&self) {
        let (tx, rx) = oneshot::channel();
        if self.refresh_tx.send(tx).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// Idempotent shutdown (`spec.md` §5 `Cancellation`): cancels the
    /// transport, waits for any in-flight refresh to finish, and signals
    /// closed. A second concurrent call awaits the same completion.
    pub async fn close(&self) {
        let _ = self.closed_tx.send(true);
        self.ctx.transport.close().await;
        self.actor_done.clone().await;
    }
}
