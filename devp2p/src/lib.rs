//! Kademlia-style node-discovery table for an Ethereum Classic node core.
//!
//! See `SPEC_FULL.md` §4.4–§4.5 for the full specification this crate
//! implements. `chain-config` (the sibling workspace crate) has no
//! dependency on this crate or vice versa.

mod bucket;
mod closest;
mod distance;
mod error;
mod node;
mod nodedb;
mod salts;
mod table;
mod transport;

pub use bucket::{Bucket, MAX_ENTRIES, MAX_IP_PER_BUCKET, MAX_REPLACEMENTS};
pub use closest::{ClosestSet, CLOSEST_CAPACITY};
pub use distance::{bucket_index, distcmp, logdist, BUCKET_MIN_DISTANCE, HASH_BITS, NUM_BUCKETS};
pub use error::DiscoveryError;
pub use node::{node_hash, Endpoint, Node, NodeHash, NodeId, SubnetKey};
pub use nodedb::{MemoryNodeDb, NodeDb};
pub use salts::Salts;
pub use table::Table;
pub use transport::{FindNode, Neighbors, Ping, Pong, Transport};
