//! The genesis block declaration and allocation table (`spec.md` §4.3,
//! §6).

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::hexutil::{decode_hex_exact, decode_prefixed_hex, decode_prefixed_quantity};

/// A single `alloc` entry: the starting balance of a genesis account.
/// Non-goal fields (code, storage) are not modeled — allocation files are
/// plain `address,balance` pairs per `spec.md` §6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenesisAccount {
    pub balance: String,
}

/// The genesis block header plus the initial account balances.
#[derive(Debug, Clone, PartialEq)]
pub struct Genesis {
    /// 8-byte proof-of-work nonce.
    pub nonce: Vec<u8>,
    /// 32-byte mix hash. Optional in some descriptors.
    pub mix_hash: Vec<u8>,
    /// 20-byte beneficiary address. Optional in some descriptors.
    pub coinbase: Vec<u8>,
    pub timestamp: u64,
    pub extra_data: Vec<u8>,
    /// Big-endian, variable-width big integer.
    pub gas_limit: Vec<u8>,
    /// Big-endian, variable-width big integer.
    pub difficulty: Vec<u8>,
    pub alloc: BTreeMap<String, GenesisAccount>,
}

impl Genesis {
    /// Validates the "non-empty nonce/gasLimit/difficulty" rule from
    /// `spec.md` §4.3.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.nonce.is_empty() {
            return Err(ConfigError::Invalid { field: "genesis.nonce" });
        }
        if self.gas_limit.is_empty() {
            return Err(ConfigError::Invalid { field: "genesis.gasLimit" });
        }
        if self.difficulty.is_empty() {
            return Err(ConfigError::Invalid { field: "genesis.difficulty" });
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawGenesisAccount {
    pub(crate) balance: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawGenesis {
    #[serde(default)]
    nonce: String,
    #[serde(default, rename = "mixhash")]
    mix_hash: String,
    #[serde(default)]
    coinbase: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default, rename = "extraData")]
    extra_data: String,
    #[serde(default, rename = "gasLimit")]
    gas_limit: String,
    #[serde(default)]
    difficulty: String,
    #[serde(default)]
    alloc: BTreeMap<String, RawGenesisAccount>,
}

impl RawGenesis {
    pub(crate) fn alloc_is_empty(&self) -> bool {
        self.alloc.is_empty()
    }

    pub(crate) fn extend_alloc(&mut self, entries: impl Iterator<Item = (String, RawGenesisAccount)>) {
        self.alloc.extend(entries);
    }

    pub(crate) fn into_genesis(self) -> Result<Genesis, ConfigError> {
        let nonce = decode_hex_exact(&self.nonce, 8).map_err(|_| ConfigError::Invalid { field: "genesis.nonce" })?;
        let mix_hash =
            decode_hex_exact(&self.mix_hash, 32).map_err(|_| ConfigError::Invalid { field: "genesis.mixhash" })?;
        let coinbase =
            decode_hex_exact(&self.coinbase, 20).map_err(|_| ConfigError::Invalid { field: "genesis.coinbase" })?;
        let extra_data =
            decode_prefixed_hex(&self.extra_data).map_err(|_| ConfigError::Invalid { field: "genesis.extraData" })?;
        let gas_limit = decode_prefixed_quantity(&self.gas_limit)
            .map_err(|_| ConfigError::Invalid { field: "genesis.gasLimit" })?;
        let difficulty = decode_prefixed_quantity(&self.difficulty)
            .map_err(|_| ConfigError::Invalid { field: "genesis.difficulty" })?;
        let timestamp = if self.timestamp.is_empty() {
            0
        } else {
            let bytes = decode_prefixed_quantity(&self.timestamp)
                .map_err(|_| ConfigError::Invalid { field: "genesis.timestamp" })?;
            bytes.iter().fold(0u64, |acc, b| (acc << 8) | (*b as u64))
        };

        let genesis = Genesis {
            nonce,
            mix_hash,
            coinbase,
            timestamp,
            extra_data,
            gas_limit,
            difficulty,
            alloc: self
                .alloc
                .into_iter()
                .map(|(addr, acct)| (addr, GenesisAccount { balance: acct.balance }))
                .collect(),
        };
        genesis.validate()?;
        Ok(genesis)
    }
}
