//! Parses and validates the external JSON chain descriptor, including
//! `include` files and CSV allocation files, into a
//! [`crate::SufficientChainConfig`] (`spec.md` §4.3).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::{BadHash, ChainConfig};
use crate::error::ConfigError;
use crate::feature::{FeatureValue, ForkFeature};
use crate::fork::{Fork, RawFork};
use crate::genesis::{Genesis, RawGenesis, RawGenesisAccount};
use crate::hexutil::decode_prefixed_hex;
use crate::SufficientChainConfig;

#[derive(Debug, Default, Deserialize)]
struct RawRoot {
    #[serde(default)]
    identity: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    network: Option<u64>,
    #[serde(default)]
    consensus: Option<String>,
    #[serde(default)]
    genesis: Option<RawGenesis>,
    #[serde(default, rename = "chainConfig")]
    chain_config: Option<RawChainConfig>,
    #[serde(default)]
    bootstrap: Vec<String>,
    #[serde(default)]
    include: Vec<String>,
    #[serde(default, rename = "alloc_file")]
    alloc_file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawChainConfig {
    #[serde(default)]
    forks: Vec<RawFork>,
    #[serde(default, rename = "badHashes")]
    bad_hashes: Vec<RawBadHash>,
    #[serde(default, rename = "chainId")]
    chain_id: Option<u64>,
    /// Convenience key some descriptors carry alongside the fork list
    /// (SPEC_FULL.md §4.3 [ADDED]); surfaced as an ordinary `ForkFeature`
    /// on the EIP150/GasReprice fork rather than a bespoke struct field.
    #[serde(default, rename = "eip150_hash")]
    eip150_hash: Option<String>,
    /// Convenience key some descriptors carry alongside the fork list
    /// (SPEC_FULL.md §4.3 [ADDED]); surfaced as an ordinary `ForkFeature`
    /// on the DAO Fork fork rather than a bespoke struct field.
    #[serde(default, rename = "dao_fork_support")]
    dao_fork_support: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawBadHash {
    block: u64,
    hash: String,
}

/// Accumulates the merged result of the root descriptor plus every file
/// it (transitively) includes.
#[derive(Default)]
struct Accumulator {
    identity: Option<String>,
    id: Option<String>,
    name: Option<String>,
    network: Option<u64>,
    consensus: Option<String>,
    genesis: Option<RawGenesis>,
    forks: Vec<RawFork>,
    bad_hashes: Vec<RawBadHash>,
    chain_id: Option<u64>,
    bootstrap: Vec<String>,
    csv_alloc: Vec<(String, String)>,
    eip150_hash: Option<String>,
    dao_fork_support: Option<bool>,
}

/// Loads a [`SufficientChainConfig`] from a root JSON descriptor at
/// `path`, resolving `include` files relative to each file's own parent
/// directory and CSV `alloc_file` entries the same way.
pub fn load(path: impl AsRef<Path>) -> Result<SufficientChainConfig, ConfigError> {
    let mut acc = Accumulator::default();
    let mut visited = HashSet::new();
    load_file(path.as_ref(), &mut visited, &mut acc)?;
    finish(acc)
}

fn load_file(path: &Path, visited: &mut HashSet<PathBuf>, acc: &mut Accumulator) -> Result<(), ConfigError> {
    let canonical = std::fs::canonicalize(path).map_err(|e| ConfigError::parse(path, e))?;
    if !visited.insert(canonical.clone()) {
        return Ok(());
    }

    let text = std::fs::read_to_string(&canonical).map_err(|e| ConfigError::parse(&canonical, e))?;
    let raw: RawRoot = serde_json::from_str(&text).map_err(|e| ConfigError::parse(&canonical, e))?;
    let dir = canonical.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));

    if acc.identity.is_none() {
        acc.identity = raw.identity;
    }
    if acc.id.is_none() {
        acc.id = raw.id;
    }
    if acc.name.is_none() {
        acc.name = raw.name;
    }
    if acc.network.is_none() {
        acc.network = raw.network;
    }
    if acc.consensus.is_none() {
        acc.consensus = raw.consensus;
    }
    if acc.genesis.is_none() {
        acc.genesis = raw.genesis;
    }
    acc.bootstrap.extend(raw.bootstrap);

    if let Some(cc) = raw.chain_config {
        acc.forks.extend(cc.forks);
        acc.bad_hashes.extend(cc.bad_hashes);
        if acc.chain_id.is_none() {
            acc.chain_id = cc.chain_id;
        }
        if acc.eip150_hash.is_none() {
            acc.eip150_hash = cc.eip150_hash;
        }
        if acc.dao_fork_support.is_none() {
            acc.dao_fork_support = cc.dao_fork_support;
        }
    }

    if let Some(alloc_file) = raw.alloc_file {
        let alloc_path = resolve(&dir, &alloc_file);
        load_alloc_csv(&alloc_path, acc)?;
    }

    for include in raw.include {
        let include_path = resolve(&dir, &include);
        load_file(&include_path, visited, acc)?;
    }

    Ok(())
}

/// Surfaces the `eip150_hash`/`dao_fork_support` convenience keys
/// (SPEC_FULL.md §4.3 [ADDED]) as ordinary `ForkFeature`s on the fork they
/// describe, rather than bespoke struct fields — `eip150_hash` names the
/// EIP150/GasReprice fork's required block hash (queried via
/// `get_feature(n, "eip150_hash")`), `dao_fork_support` names whether the
/// DAO Fork fork is to be honored (queried via `has_feature("dao_fork_support")`).
/// A key present with no matching fork in the descriptor is dropped with a
/// warning rather than rejected, since the fork list is the source of
/// truth for which forks exist at all.
fn attach_convenience_features(forks: &mut [Fork], eip150_hash: Option<String>, dao_fork_support: Option<bool>) {
    if let Some(hash) = eip150_hash {
        match forks.iter_mut().find(|f| f.name == "GasReprice" || f.name == "EIP150") {
            Some(fork) => fork.features.push(ForkFeature::single_option(
                "eip150_hash",
                "hash",
                FeatureValue::Str(hash),
            )),
            None => log::warn!("eip150_hash given but no GasReprice/EIP150 fork is configured"),
        }
    }

    if let Some(supported) = dao_fork_support {
        match forks.iter_mut().find(|f| f.name == "DAO Fork") {
            Some(fork) => fork.features.push(ForkFeature::single_option(
                "dao_fork_support",
                "supported",
                FeatureValue::Bool(supported),
            )),
            None => log::warn!("dao_fork_support given but no DAO Fork fork is configured"),
        }
    }
}

fn resolve(dir: &Path, relative: &str) -> PathBuf {
    let candidate = Path::new(relative);
    if candidate.is_absolute() {
        candidate.to_path_buf()
    } else {
        dir.join(candidate)
    }
}

/// Loads `address,balance` pairs from a CSV allocation file. Malformed row
/// arity is an error; a trailing empty line is tolerated (`spec.md` §6).
fn load_alloc_csv(path: &Path, acc: &mut Accumulator) -> Result<(), ConfigError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(false)
        .from_path(path)
        .map_err(|e| ConfigError::parse(path, e))?;

    for record in reader.records() {
        let record = record.map_err(|e| ConfigError::parse(path, e))?;
        if record.len() != 2 {
            return Err(ConfigError::Invalid { field: "alloc_file row" });
        }
        acc.csv_alloc.push((record[0].to_string(), record[1].to_string()));
    }
    Ok(())
}

fn finish(acc: Accumulator) -> Result<SufficientChainConfig, ConfigError> {
    // Legacy `id` -> `identity` mapping: only when `identity` itself is unset.
    let identity = acc.identity.or(acc.id).ok_or(ConfigError::Invalid { field: "identity" })?;
    if identity.is_empty() {
        return Err(ConfigError::Invalid { field: "identity" });
    }

    let network_id = acc.network.ok_or(ConfigError::Invalid { field: "network" })?;
    if network_id == 0 {
        return Err(ConfigError::Invalid { field: "network" });
    }

    let consensus = acc.consensus.unwrap_or_else(|| "ethash".to_string());
    if consensus != "ethash" && consensus != "ethash-test" {
        return Err(ConfigError::Invalid { field: "consensus" });
    }

    let mut raw_genesis = acc.genesis.ok_or(ConfigError::Invalid { field: "genesis" })?;
    if !acc.csv_alloc.is_empty() {
        if !raw_genesis.alloc_is_empty() {
            return Err(ConfigError::Invalid { field: "alloc_file" });
        }
        raw_genesis.extend_alloc(acc.csv_alloc.into_iter().map(|(addr, balance)| {
            (addr, RawGenesisAccount { balance })
        }));
    }
    let genesis: Genesis = raw_genesis.into_genesis()?;

    if acc.forks.is_empty() {
        return Err(ConfigError::Invalid { field: "chainConfig.forks" });
    }

    let mut forks = acc
        .forks
        .into_iter()
        .map(|f| f.into_fork())
        .collect::<Result<Vec<_>, _>>()?;
    forks.sort_by_key(|f| f.block.unwrap_or(u64::MAX));

    attach_convenience_features(&mut forks, acc.eip150_hash, acc.dao_fork_support);

    let bad_hashes = acc
        .bad_hashes
        .into_iter()
        .map(|b| {
            decode_prefixed_hex(&b.hash)
                .ok()
                .filter(|bytes| bytes.len() == 32)
                .map(|bytes| BadHash { block: b.block, hash: primitive_types::H256::from_slice(&bytes) })
                .ok_or(ConfigError::Invalid { field: "badHashes.hash" })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let chain_config = ChainConfig::from_sorted_forks(forks, bad_hashes, acc.chain_id);

    let mut bootstrap = Vec::new();
    for entry in acc.bootstrap {
        match url::Url::parse(&entry) {
            Ok(url) => bootstrap.push(url.to_string()),
            Err(_) => log::warn!("dropping malformed bootstrap endpoint: {entry}"),
        }
    }

    Ok(SufficientChainConfig {
        identity,
        name: acc.name.unwrap_or_default(),
        network_id,
        consensus,
        genesis,
        chain_config,
        bootstrap,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn loads_minimal_descriptor() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(
            dir.path(),
            "root.json",
            r#"{
                "identity": "classic",
                "name": "Ethereum Classic",
                "network": 1,
                "genesis": {
                    "nonce": "0x0000000000000042",
                    "gasLimit": "0x1388",
                    "difficulty": "0x400000000"
                },
                "chainConfig": {
                    "forks": [
                        {"name": "Homestead", "block": 1150000, "features": []}
                    ]
                },
                "bootstrap": ["enode://abc@127.0.0.1:30303", "not a url"]
            }"#,
        );

        let cfg = load(&root).unwrap();
        assert_eq!(cfg.identity, "classic");
        assert_eq!(cfg.consensus, "ethash");
        assert!(cfg.chain_config.is_homestead(Some(1_150_000)));
        assert_eq!(cfg.bootstrap.len(), 1);
    }

    #[test]
    fn rejects_missing_forks() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(
            dir.path(),
            "root.json",
            r#"{
                "identity": "classic",
                "network": 1,
                "genesis": {"nonce": "0x0000000000000042", "gasLimit": "0x1388", "difficulty": "0x400000000"},
                "chainConfig": {"forks": []}
            }"#,
        );
        assert!(matches!(load(&root), Err(ConfigError::Invalid { field: "chainConfig.forks" })));
    }

    #[test]
    fn legacy_id_field_maps_to_identity() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(
            dir.path(),
            "root.json",
            r#"{
                "id": "legacy-classic",
                "network": 1,
                "genesis": {"nonce": "0x0000000000000042", "gasLimit": "0x1388", "difficulty": "0x400000000"},
                "chainConfig": {"forks": [{"name": "Frontier", "block": 0, "features": []}]}
            }"#,
        );
        assert_eq!(load(&root).unwrap().identity, "legacy-classic");
    }

    #[test]
    fn includes_are_merged_and_not_revisited() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "shared.json",
            r#"{"chainConfig": {"forks": [{"name": "Homestead", "block": 1150000, "features": []}]}, "include": ["root.json"]}"#,
        );
        let root = write(
            dir.path(),
            "root.json",
            r#"{
                "identity": "classic",
                "network": 1,
                "genesis": {"nonce": "0x0000000000000042", "gasLimit": "0x1388", "difficulty": "0x400000000"},
                "chainConfig": {"forks": [{"name": "Frontier", "block": 0, "features": []}]},
                "include": ["shared.json"]
            }"#,
        );

        let cfg = load(&root).unwrap();
        assert_eq!(cfg.chain_config.forks().len(), 2);
    }

    #[test]
    fn alloc_csv_malformed_row_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "alloc.csv", "0xabc,100\nnot,enough,columns\n");
        let root = write(
            dir.path(),
            "root.json",
            r#"{
                "identity": "classic",
                "network": 1,
                "genesis": {"nonce": "0x0000000000000042", "gasLimit": "0x1388", "difficulty": "0x400000000"},
                "chainConfig": {"forks": [{"name": "Frontier", "block": 0, "features": []}]},
                "alloc_file": "alloc.csv"
            }"#,
        );
        assert!(load(&root).is_err());
    }

    #[test]
    fn alloc_csv_tolerates_trailing_newline() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "alloc.csv", "0xabc,100\n0xdef,200\n");
        let root = write(
            dir.path(),
            "root.json",
            r#"{
                "identity": "classic",
                "network": 1,
                "genesis": {"nonce": "0x0000000000000042", "gasLimit": "0x1388", "difficulty": "0x400000000"},
                "chainConfig": {"forks": [{"name": "Frontier", "block": 0, "features": []}]},
                "alloc_file": "alloc.csv"
            }"#,
        );
        let cfg = load(&root).unwrap();
        assert_eq!(cfg.genesis.alloc.len(), 2);
    }

    #[test]
    fn eip150_hash_and_dao_fork_support_surface_as_features() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(
            dir.path(),
            "root.json",
            r#"{
                "identity": "classic",
                "network": 1,
                "genesis": {"nonce": "0x0000000000000042", "gasLimit": "0x1388", "difficulty": "0x400000000"},
                "chainConfig": {
                    "forks": [
                        {"name": "Frontier", "block": 0, "features": []},
                        {"name": "DAO Fork", "block": 1920000, "features": []},
                        {"name": "GasReprice", "block": 2500000, "features": []}
                    ],
                    "eip150_hash": "0x2086799aeebeae135c246c65021c82b4e15a2c451340993aacfd2751886514f",
                    "dao_fork_support": true
                }
            }"#,
        );

        let cfg = load(&root).unwrap();
        let (eip150_hash, _) = cfg.chain_config.get_feature(2_500_000, "eip150_hash").unwrap();
        assert_eq!(
            eip150_hash.string_option("hash"),
            Some("0x2086799aeebeae135c246c65021c82b4e15a2c451340993aacfd2751886514f".to_string())
        );

        let (dao_support, _) = cfg.chain_config.get_feature(1_920_000, "dao_fork_support").unwrap();
        assert_eq!(dao_support.option("supported").and_then(FeatureValue::as_bool), Some(true));
    }

    #[test]
    fn convenience_keys_with_no_matching_fork_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let root = write(
            dir.path(),
            "root.json",
            r#"{
                "identity": "classic",
                "network": 1,
                "genesis": {"nonce": "0x0000000000000042", "gasLimit": "0x1388", "difficulty": "0x400000000"},
                "chainConfig": {
                    "forks": [{"name": "Frontier", "block": 0, "features": []}],
                    "dao_fork_support": true
                }
            }"#,
        );

        let cfg = load(&root).unwrap();
        assert!(cfg.chain_config.has_feature("dao_fork_support").is_none());
    }
}
