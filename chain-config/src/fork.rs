//! A named, block-numbered configuration change that activates a set of
//! feature variants.

use primitive_types::H256;
use serde::Deserialize;

use crate::feature::{ForkFeature, RawForkFeature};
use crate::hexutil::decode_prefixed_hex;

/// One entry in the chain's ordered fork list.
#[derive(Debug, Clone, PartialEq)]
pub struct Fork {
    /// Human-readable fork name (`"Homestead"`, `"DieHard"`, ...).
    pub name: String,
    /// Activation block number. `None` means the fork is defined but
    /// never activates (used by some descriptors to carry
    /// feature-only, block-less entries).
    pub block: Option<u64>,
    /// Hash the block at `block` must have for the local node to agree
    /// with the network. Empty when the fork carries no required hash.
    pub required_hash: Vec<u8>,
    /// Feature variants this fork activates.
    pub features: Vec<ForkFeature>,
}

impl Fork {
    /// Finds a feature by id among this fork's own features (not the
    /// resolved, block-aware lookup — see [`crate::ChainConfig::get_feature`]
    /// for that).
    pub fn feature(&self, id: &str) -> Option<&ForkFeature> {
        self.features.iter().find(|f| f.id == id)
    }

    /// `true` if this fork carries a non-empty required hash.
    pub fn has_required_hash(&self) -> bool {
        !self.required_hash.is_empty()
    }

    /// The required hash as an `H256`, if present and well-formed.
    pub fn required_hash_h256(&self) -> Option<H256> {
        if self.required_hash.len() == 32 {
            Some(H256::from_slice(&self.required_hash))
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawFork {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) block: Option<u64>,
    #[serde(default, rename = "requiredHash")]
    pub(crate) required_hash: String,
    #[serde(default)]
    pub(crate) features: Vec<RawForkFeature>,
}

impl RawFork {
    pub(crate) fn into_fork(self) -> Result<Fork, crate::ConfigError> {
        let required_hash = decode_prefixed_hex(&self.required_hash)
            .map_err(|_| crate::ConfigError::Invalid { field: "requiredHash" })?;
        Ok(Fork {
            name: self.name,
            block: self.block,
            required_hash,
            features: self.features.into_iter().map(RawForkFeature::into_feature).collect(),
        })
    }
}
