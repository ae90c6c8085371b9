//! The fork configuration model (`spec.md` §4.1) and feature resolver
//! (`spec.md` §4.2).

use primitive_types::H256;

use crate::error::ConfigError;
use crate::fork::Fork;
use crate::gas_table::{GasTable, GasTableKind};
use crate::signer::Signer;

/// A single entry on the bad-hash list: a block whose canonical hash the
/// network has agreed is poisoned.
#[derive(Debug, Clone, PartialEq)]
pub struct BadHash {
    pub block: u64,
    pub hash: H256,
}

/// Chain id, ordered fork list, and bad-hash list. Built once by the
/// loader and immutable for the rest of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    /// Raw `chainId` field from the descriptor (distinct from the
    /// `eip155` feature's `chainID` option, which is what
    /// [`ChainConfig::chain_id`] resolves — see `spec.md` §4.1).
    pub chain_id_field: Option<u64>,
    pub(crate) forks: Vec<Fork>,
    pub bad_hashes: Vec<BadHash>,

    /// Convenience block numbers materialized from the sorted fork list
    /// at load time (`spec.md` §4.3).
    pub homestead_block: Option<u64>,
    pub eip150_block: Option<u64>,
    pub eip155_block: Option<u64>,
    pub eip158_block: Option<u64>,
    pub byzantium_block: Option<u64>,
}

/// Minimal header shape [`ChainConfig::header_check`] needs. The full
/// block header belongs to the (out-of-scope) block-import pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderCheckInput {
    pub number: u64,
    pub hash: H256,
}

impl ChainConfig {
    /// Builds a `ChainConfig` from an already block-sorted fork list. The
    /// loader is responsible for sorting (`spec.md` §4.3); this
    /// constructor trusts its input and only materializes the convenience
    /// fields, per invariant 4 in `spec.md` §8.
    pub fn from_sorted_forks(forks: Vec<Fork>, bad_hashes: Vec<BadHash>, chain_id_field: Option<u64>) -> Self {
        let homestead_block = forks.iter().find(|f| f.name == "Homestead").and_then(|f| f.block);
        let eip150_block = forks.iter().find(|f| f.name == "GasReprice" || f.name == "EIP150").and_then(|f| f.block);
        let eip155_block = forks.iter().find(|f| f.name == "EIP155" || f.name == "Diehard" || f.name == "DieHard")
            .and_then(|f| f.block);
        let eip158_block = forks.iter().find(|f| f.name == "EIP158").and_then(|f| f.block);
        let byzantium_block = forks.iter().find(|f| f.name == "Byzantium").and_then(|f| f.block);

        ChainConfig {
            chain_id_field,
            forks,
            bad_hashes,
            homestead_block,
            eip150_block,
            eip155_block,
            eip158_block,
            byzantium_block,
        }
    }

    /// The fork list, sorted block-ascending.
    pub fn forks(&self) -> &[Fork] {
        &self.forks
    }

    /// `ForkByName` (`spec.md` §4.1): linear scan, fork counts are small.
    pub fn fork_by_name(&self, name: &str) -> Option<&Fork> {
        self.forks.iter().find(|f| f.name == name)
    }

    fn fork_active_at(&self, name: &str, n: Option<u64>) -> bool {
        let n = match n {
            Some(n) => n,
            None => return false,
        };
        match self.fork_by_name(name).and_then(|f| f.block) {
            Some(block) => n >= block,
            None => false,
        }
    }

    /// `true` iff the Homestead fork is defined and `n >= homestead.block`.
    /// `IsHomestead(nil)` returns `false` (`spec.md` §8 boundary behavior).
    pub fn is_homestead(&self, n: Option<u64>) -> bool {
        self.fork_active_at("Homestead", n)
    }

    /// `true` iff the DieHard (anti-replay) fork is active at `n`.
    pub fn is_diehard(&self, n: Option<u64>) -> bool {
        self.fork_by_name("DieHard").is_some() && self.fork_active_at("DieHard", n)
            || self.fork_by_name("Diehard").is_some() && self.fork_active_at("Diehard", n)
    }

    /// `true` iff the DAO Fork is active at `n`.
    pub fn is_dao_fork(&self, n: Option<u64>) -> bool {
        self.fork_active_at("DAO Fork", n)
    }

    /// `true` iff the Byzantium fork is active at `n`.
    ///
    /// Resolves the Open Question in `spec.md` §9 about
    /// `"newopcodes-placholderid"`: Byzantium is identified the same way
    /// every other fork is (name + block comparison), not through a
    /// feature id. See `SPEC_FULL.md` §4.1 and `DESIGN.md` for the
    /// rationale.
    pub fn is_byzantium(&self, n: Option<u64>) -> bool {
        self.fork_active_at("Byzantium", n)
    }

    /// `GetFeature(n, id)` (`spec.md` §4.2): scans all forks with
    /// `block <= n`, remembering the *latest* one that defines a feature
    /// with the given id. Returns the feature together with its owning
    /// fork so callers can consult `fork.block` (invariant 5, `spec.md`
    /// §8: `GetFeature(n, id).fork.block <= n` whenever found).
    pub fn get_feature(&self, n: u64, id: &str) -> Option<(&crate::feature::ForkFeature, &Fork)> {
        let mut found = None;
        for fork in &self.forks {
            if let Some(block) = fork.block {
                if block <= n {
                    if let Some(feature) = fork.feature(id) {
                        found = Some((feature, fork));
                    }
                }
            }
        }
        found
    }

    /// `HasFeature(id)` (`spec.md` §4.2): same as [`ChainConfig::get_feature`]
    /// but block-unbounded.
    pub fn has_feature(&self, id: &str) -> Option<(&crate::feature::ForkFeature, &Fork)> {
        let mut found = None;
        for fork in &self.forks {
            if let Some(feature) = fork.feature(id) {
                found = Some((feature, fork));
            }
        }
        found
    }

    /// `GasTable(n)` (`spec.md` §4.2). An unknown `gastable.type` or a
    /// missing `gastable` feature is fatal.
    pub fn gas_table(&self, n: u64) -> Result<GasTable, ConfigError> {
        let (feature, _) = self
            .get_feature(n, "gastable")
            .ok_or(ConfigError::Invalid { field: "gastable" })?;
        let raw_type = feature
            .string_option("type")
            .ok_or(ConfigError::Invalid { field: "gastable.type" })?;
        let kind = GasTableKind::parse(&raw_type).ok_or(ConfigError::Invalid { field: "gastable.type" })?;
        Ok(GasTable::for_kind(kind))
    }

    /// `IsExplosion(n)` (`spec.md` §4.1): `true` iff the active difficulty
    /// feature is `ecip1010` and `n >= fork.block + feature.length`.
    ///
    /// Resolves the `DefaultIsExplosion` Open Question in `spec.md` §9: a
    /// missing `length` where `ecip1010` is active is a
    /// [`ConfigError::Invalid`], not a panic and not a silent large-sentinel
    /// default (per the REDESIGN FLAG in §9: "convert to a typed
    /// configuration error surfaced at load time"; we surface it here,
    /// at first use, since the condition can only be detected once we know
    /// which feature is active at `n`).
    pub fn is_explosion(&self, n: u64) -> Result<bool, ConfigError> {
        match self.get_feature(n, "difficulty") {
            None => Ok(false),
            Some((feature, fork)) => {
                if feature.string_option("type").as_deref() != Some("ecip1010") {
                    return Ok(false);
                }
                let length = feature
                    .int_option("length")
                    .ok_or(ConfigError::Invalid { field: "difficulty.length" })?;
                let fork_block = fork.block.ok_or(ConfigError::Invalid { field: "block" })?;
                Ok(n >= fork_block.saturating_add(length as u64))
            }
        }
    }

    /// `GetChainID()` (`spec.md` §4.1): the `eip155` feature's `chainID`
    /// option at the latest fork that carries it; zero if unset.
    pub fn chain_id(&self) -> u64 {
        self.has_feature("eip155")
            .and_then(|(f, _)| f.int_option("chainID"))
            .map(|i| i as u64)
            .unwrap_or(0)
    }

    /// `GetSigner(n)` (`spec.md` §4.1). A missing chain id while `eip155`
    /// is active is a fatal configuration error.
    pub fn signer(&self, n: u64) -> Result<Signer, ConfigError> {
        if self.get_feature(n, "eip155").is_some() {
            let chain_id = self.chain_id();
            if chain_id == 0 {
                return Err(ConfigError::Invalid { field: "eip155.chainID" });
            }
            Ok(Signer::Eip155 { chain_id })
        } else {
            Ok(Signer::PreEip155)
        }
    }

    /// `GetLatestRequiredHashFork(n)` (`spec.md` §4.1): latest fork at or
    /// below `n` whose `requiredHash` is non-empty. Implemented as a
    /// linear scan; correctness does not depend on sort order.
    pub fn latest_required_hash_fork(&self, n: u64) -> Option<&Fork> {
        let mut found: Option<&Fork> = None;
        for fork in &self.forks {
            if let Some(block) = fork.block {
                if block <= n && fork.has_required_hash() {
                    let better = match found {
                        None => true,
                        Some(cur) => block >= cur.block.unwrap_or(0),
                    };
                    if better {
                        found = Some(fork);
                    }
                }
            }
        }
        found
    }

    /// `HeaderCheck(header)` (`spec.md` §4.1): for every fork whose block
    /// equals `header.number`, enforces a non-empty required hash matches;
    /// for every bad-hash entry at that block, rejects.
    pub fn header_check(&self, header: HeaderCheckInput) -> Result<(), ConfigError> {
        for fork in &self.forks {
            if fork.block == Some(header.number) && fork.has_required_hash() {
                if fork.required_hash_h256() != Some(header.hash) {
                    return Err(ConfigError::KnownForkHashMismatch { block: header.number });
                }
            }
        }
        for bad in &self.bad_hashes {
            if bad.block == header.number && bad.hash == header.hash {
                return Err(ConfigError::KnownBadHash { block: header.number });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::RawForkFeature;
    use crate::fork::RawFork;

    fn fork(name: &str, block: Option<u64>, features_json: &str) -> Fork {
        let features: Vec<RawForkFeature> = serde_json::from_str(features_json).unwrap();
        Fork {
            name: name.to_string(),
            block,
            required_hash: Vec::new(),
            features: features.into_iter().map(RawForkFeature::into_feature).collect(),
        }
    }

    #[test]
    fn sort_invariant_and_homestead_boundary() {
        let mut blocks = vec![1_150_000u64, 0, 1_920_000, 3_000_000, 2_500_000];
        blocks.sort_unstable();
        assert_eq!(blocks, vec![0, 1_150_000, 1_920_000, 2_500_000, 3_000_000]);

        let forks: Vec<Fork> = blocks.iter().map(|b| fork(&format!("f{b}"), Some(*b), "[]")).collect();
        let mut named = forks;
        named[1].name = "Homestead".to_string();
        let cfg = ChainConfig::from_sorted_forks(named, vec![], None);

        assert!(cfg.is_homestead(Some(1_150_000)));
        assert!(!cfg.is_homestead(Some(1_149_999)));
        assert!(!cfg.is_homestead(None));
    }

    #[test]
    fn feature_latest_wins() {
        let f1 = fork("Homestead", Some(1_150_000), r#"[{"id":"gastable","options":{"type":"homestead"}}]"#);
        let f2 = fork("GasReprice", Some(2_500_000), r#"[{"id":"gastable","options":{"type":"eip150"}}]"#);
        let cfg = ChainConfig::from_sorted_forks(vec![f1, f2], vec![], None);

        assert_eq!(cfg.gas_table(2_500_000).unwrap().kind, GasTableKind::Eip150);
        assert_eq!(cfg.gas_table(2_499_999).unwrap().kind, GasTableKind::Homestead);
    }

    #[test]
    fn required_hash_check() {
        let good_hash = H256::repeat_byte(0xAB);
        let mut dao = fork("DAO Fork", Some(1_920_000), "[]");
        dao.required_hash = good_hash.as_bytes().to_vec();
        let cfg = ChainConfig::from_sorted_forks(vec![dao], vec![], None);

        let bad = HeaderCheckInput { number: 1_920_000, hash: H256::repeat_byte(0xCD) };
        assert!(matches!(cfg.header_check(bad), Err(ConfigError::KnownForkHashMismatch { block: 1_920_000 })));

        let ok = HeaderCheckInput { number: 1_920_000, hash: good_hash };
        assert!(cfg.header_check(ok).is_ok());
    }

    #[test]
    fn explosion_requires_length() {
        let f = fork("Explosion", Some(1_000_000), r#"[{"id":"difficulty","options":{"type":"ecip1010"}}]"#);
        let cfg = ChainConfig::from_sorted_forks(vec![f], vec![], None);
        assert!(matches!(cfg.is_explosion(1_000_000), Err(ConfigError::Invalid { field: "difficulty.length" })));
    }

    #[test]
    fn explosion_with_length() {
        let f = fork(
            "Explosion",
            Some(1_000_000),
            r#"[{"id":"difficulty","options":{"type":"ecip1010","length":100000}}]"#,
        );
        let cfg = ChainConfig::from_sorted_forks(vec![f], vec![], None);
        assert!(!cfg.is_explosion(1_000_000 + 99_999).unwrap());
        assert!(cfg.is_explosion(1_000_000 + 100_000).unwrap());
    }

    #[test]
    fn signer_requires_chain_id_once_eip155_active() {
        let f = fork("EIP155", Some(3_000_000), r#"[{"id":"eip155","options":{}}]"#);
        let cfg = ChainConfig::from_sorted_forks(vec![f], vec![], None);
        assert!(matches!(cfg.signer(3_000_000), Err(ConfigError::Invalid { field: "eip155.chainID" })));

        let f2 = fork("EIP155", Some(3_000_000), r#"[{"id":"eip155","options":{"chainID":61}}]"#);
        let cfg2 = ChainConfig::from_sorted_forks(vec![f2], vec![], None);
        assert_eq!(cfg2.signer(3_000_000).unwrap(), Signer::Eip155 { chain_id: 61 });
        assert_eq!(cfg2.signer(2_999_999).unwrap(), Signer::PreEip155);
    }
}
