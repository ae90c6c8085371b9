//! Process-local randomness, threaded explicitly instead of living in a
//! global (`spec.md` §4.4 "Salt"; SPEC_FULL.md §3 [ADDED] Process-Scope
//! object; `spec.md` §9 REDESIGN FLAG on global mutable state).

use primitive_types::{H256, H512};
use rand::RngCore;
use sha3::{Digest, Keccak256};

use crate::node::NodeHash;

/// Two 32-byte salts and one 64-byte salt, drawn once when a
/// [`crate::table::Table`] is constructed and carried in its context for
/// the lifetime of the process.
#[derive(Debug, Clone, Copy)]
pub struct Salts {
    pub s1: H256,
    pub s2: H256,
    pub s3: H512,
}

impl Salts {
    /// Draws fresh, uniformly random salts from the OS CSPRNG.
    pub fn random() -> Self {
        let mut rng = rand::rngs::OsRng;
        let mut s1 = [0u8; 32];
        let mut s2 = [0u8; 32];
        let mut s3 = [0u8; 64];
        rng.fill_bytes(&mut s1);
        rng.fill_bytes(&mut s2);
        rng.fill_bytes(&mut s3);
        Salts {
            s1: H256::from(s1),
            s2: H256::from(s2),
            s3: H512::from(s3),
        }
    }

    /// The target a self-lookup uses instead of the local node's own hash,
    /// to avoid the degenerate case of immediately finding ourselves
    /// (`spec.md` §4.4: "self-lookup uses S3 as the target").
    pub fn self_lookup_target(&self) -> NodeHash {
        crate::node::node_hash(&self.s3)
    }

    /// The salted comparison used when the table needs a process-local,
    /// pseudo-random admission gate for a node hash during `stuff`/`delete`
    /// (`spec.md` §4.4: "hashes the node hash concatenated with S2 and
    /// compares against S1"). Used as a tie-breaker when reseeding offers
    /// more survivors than a bucket has free capacity.
    pub fn admits(&self, hash: &NodeHash) -> bool {
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(hash.as_bytes());
        buf[32..].copy_from_slice(self.s2.as_bytes());
        let digest = Keccak256::digest(buf);
        H256::from_slice(&digest) < self.s1
    }
}
