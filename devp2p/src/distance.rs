//! XOR distance, log-distance, and bucket indexing (`spec.md` §3, §4.4).
//!
//! The table keeps one bucket per possible log-distance: `hashBits + 1`
//! (257) slots, indices `0..=256`. Because `nBuckets` here equals the full
//! log-distance range rather than a folded-down subset (contrast
//! go-ethereum's discv4, which folds 256 possible distances into 17
//! buckets), the "fold short distances into bucket 0" branch of the
//! indexing formula is never taken: `hashBits - nBuckets` is negative, so
//! every reachable node (distance 1..=256) gets its own bucket and
//! `bucketMinDistance` is 0. Bucket index 256 is consequently unreachable
//! in practice (no two distinct 256-bit hashes differ in all 256 bits plus
//! one), but the slot is kept so the array stays a literal one-bucket-per-
//! distance map.

use super::node::NodeHash;

/// Bits in a [`NodeHash`].
pub const HASH_BITS: u32 = 256;

/// One bucket per possible log-distance, `0..=HASH_BITS`.
pub const NUM_BUCKETS: usize = HASH_BITS as usize + 1;

/// Always 0 in this table: see the module doc comment.
pub const BUCKET_MIN_DISTANCE: i64 = 0;

/// The log-distance between two hashes: the bit-length of their XOR, i.e.
/// the position (counting from 1, MSB-relative) of the highest differing
/// bit. `logdist(a, a) == 0`.
pub fn logdist(a: &NodeHash, b: &NodeHash) -> u32 {
    for i in 0..32 {
        let x = a.as_bytes()[i] ^ b.as_bytes()[i];
        if x != 0 {
            return HASH_BITS - (i as u32) * 8 - x.leading_zeros();
        }
    }
    0
}

/// Orders `a` and `b` by distance to `target`: negative if `a` is closer,
/// positive if `b` is closer, zero if equidistant.
pub fn distcmp(target: &NodeHash, a: &NodeHash, b: &NodeHash) -> std::cmp::Ordering {
    for i in 0..32 {
        let da = a.as_bytes()[i] ^ target.as_bytes()[i];
        let db = b.as_bytes()[i] ^ target.as_bytes()[i];
        if da != db {
            return da.cmp(&db);
        }
    }
    std::cmp::Ordering::Equal
}

/// Maps a log-distance to its bucket index (`spec.md` §4.4).
///
/// Returns `None` for `logdist == 0` (self; never inserted into the
/// table).
pub fn bucket_index(logdist: u32) -> Option<usize> {
    if logdist == 0 {
        return None;
    }
    let threshold = HASH_BITS as i64 - NUM_BUCKETS as i64;
    let idx = if logdist as i64 <= threshold {
        0
    } else {
        logdist as i64 - BUCKET_MIN_DISTANCE - 1
    };
    usize::try_from(idx).ok()
}
