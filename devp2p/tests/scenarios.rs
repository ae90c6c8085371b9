//! Black-box end-to-end scenarios exercised through the public API only,
//! matching the scenarios catalogued in `SPEC_FULL.md` §8.

use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use devp2p::{DiscoveryError, Endpoint, MemoryNodeDb, Node, NodeHash, NodeId, Table, Transport};
use primitive_types::H512;

fn endpoint(ip: [u8; 4], port: u16) -> Endpoint {
    Endpoint { address: IpAddr::V4(Ipv4Addr::from(ip)), udp_port: port, tcp_port: port }
}

struct CountingTransport {
    pings: AtomicUsize,
}

impl CountingTransport {
    fn new() -> Self {
        CountingTransport { pings: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl Transport for CountingTransport {
    async fn ping(&self, _id: &NodeId, _addr: Endpoint) -> Result<(), DiscoveryError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        Ok(())
    }
    async fn waitping(&self, _id: &NodeId) -> Result<(), DiscoveryError> {
        Err(DiscoveryError::TransportTimeout)
    }
    async fn findnode(&self, _id: &NodeId, _addr: Endpoint, _target: NodeHash) -> Result<Vec<Node>, DiscoveryError> {
        Ok(Vec::new())
    }
    async fn close(&self) {}
}

#[tokio::test]
async fn bucket_assignment_matches_logdist_formula() {
    let self_hash = devp2p::node_hash(&H512::repeat_byte(0));
    let mut peer_hash = self_hash;
    // Set the highest differing bit to the one with weight 2^99, so the
    // XOR's bit-length (logdist) is exactly 100.
    let byte_idx = 31 - 99 / 8;
    let bit_in_byte = 99 % 8;
    peer_hash.0[byte_idx] ^= 1 << bit_in_byte;

    let dist = devp2p::logdist(&self_hash, &peer_hash);
    assert_eq!(dist, 100);
    assert_eq!(devp2p::bucket_index(dist), Some(100 - devp2p::BUCKET_MIN_DISTANCE as u32 - 1));
}

#[tokio::test]
async fn concurrent_bonds_for_the_same_peer_issue_one_ping() {
    let self_id = H512::repeat_byte(1);
    let transport = Arc::new(CountingTransport::new());
    let table = Arc::new(Table::new(self_id, transport.clone(), Arc::new(MemoryNodeDb::new())));

    let peer = H512::repeat_byte(2);
    let addr = endpoint([1, 1, 1, 1], 30303);

    let t1 = { let table = table.clone(); tokio::spawn(async move { table.bond(peer, addr, false).await }) };
    let t2 = { let table = table.clone(); tokio::spawn(async move { table.bond(peer, addr, false).await }) };

    let (r1, r2) = tokio::join!(t1, t2);
    assert!(r1.unwrap().is_ok());
    assert!(r2.unwrap().is_ok());
    assert_eq!(transport.pings.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn distance_identity_properties() {
    let a = devp2p::node_hash(&H512::repeat_byte(9));
    assert_eq!(devp2p::logdist(&a, &a), 0);
    assert_eq!(devp2p::distcmp(&a, &a, &a), std::cmp::Ordering::Equal);
}

#[tokio::test]
async fn lookup_on_empty_table_returns_empty_set() {
    let self_id = H512::repeat_byte(3);
    let transport = Arc::new(CountingTransport::new());
    let table = Table::new(self_id, transport, Arc::new(MemoryNodeDb::new()));

    let target = devp2p::node_hash(&H512::repeat_byte(4));
    assert!(table.lookup(target).await.is_empty());
    table.close().await;
}
