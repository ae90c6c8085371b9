//! Node identity, endpoint, and the per-node bookkeeping the table keeps.

use primitive_types::{H256, H512};
use sha3::{Digest, Keccak256};

/// The 512-bit node identifier: an uncompressed public key minus its
/// prefix byte (`spec.md` §3).
pub type NodeId = H512;

/// The 256-bit Keccak hash of a [`NodeId`], used for all distance
/// computations.
pub type NodeHash = H256;

/// Hashes a [`NodeId`] into its [`NodeHash`].
pub fn node_hash(id: &NodeId) -> NodeHash {
    let digest = Keccak256::digest(id.as_bytes());
    H256::from_slice(&digest)
}

/// `(IP, UDP port, TCP port)` (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub address: std::net::IpAddr,
    pub udp_port: u16,
    pub tcp_port: u16,
}

impl Endpoint {
    /// `true` for addresses exempt from the per-/24 and table-wide IP
    /// rate limits (`spec.md` §3: "excluding LAN addresses, which are
    /// exempt from both limits").
    pub fn is_lan(&self) -> bool {
        match self.address {
            std::net::IpAddr::V4(v4) => {
                v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
            }
            std::net::IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified() || (v6.segments()[0] & 0xfe00) == 0xfc00,
        }
    }

    /// The `/24` (IPv4) or `/64`-equivalent (here: whole-address, IPv6
    /// rate limiting is coarser in practice but out of scope to refine)
    /// key used by the per-subnet IP counters.
    pub fn subnet_key(&self) -> SubnetKey {
        match self.address {
            std::net::IpAddr::V4(v4) => {
                let o = v4.octets();
                SubnetKey::V4([o[0], o[1], o[2]])
            }
            std::net::IpAddr::V6(v6) => SubnetKey::V6(v6.segments()[0]),
        }
    }
}

/// Key used to bucket nodes into IP-rate-limit groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubnetKey {
    V4([u8; 3]),
    V6(u16),
}

/// A single entry in the routing table (`spec.md` §3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    pub id: NodeId,
    pub hash: NodeHash,
    pub endpoint: Endpoint,
    /// Unix timestamp (seconds) the node was first added to the table.
    pub added_at: u64,
    /// Consecutive `findnode` timeouts against this node. Reset to 0 on a
    /// successful bond.
    pub find_failures: u32,
}

impl Node {
    /// Builds a `Node`, computing its hash from its id.
    pub fn new(id: NodeId, endpoint: Endpoint, added_at: u64) -> Self {
        Node {
            hash: node_hash(&id),
            id,
            endpoint,
            added_at,
            find_failures: 0,
        }
    }
}
