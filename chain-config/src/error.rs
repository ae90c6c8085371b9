//! Errors raised while loading or querying a chain configuration.

use std::path::PathBuf;

/// Everything that can go wrong building or using a [`crate::ChainConfig`].
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// A required field failed validation. Carries the offending field
    /// name so the caller can report it without re-deriving which check
    /// failed.
    #[error("invalid chain configuration: {field}")]
    Invalid {
        /// Name of the field that failed validation.
        field: &'static str,
    },

    /// JSON or CSV decoding failed while reading `path`.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// File that failed to parse.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A header's hash did not match the required hash pinned for its
    /// fork. Recoverable at the import layer: the header is simply
    /// rejected.
    #[error("header at block {block} does not match the required fork hash")]
    KnownForkHashMismatch {
        /// Block number of the offending header.
        block: u64,
    },

    /// A header's hash is on the configured bad-hash list. Fatal for the
    /// chain tip that carries it.
    #[error("header at block {block} is a known bad hash")]
    KnownBadHash {
        /// Block number of the offending header.
        block: u64,
    },
}

impl ConfigError {
    pub(crate) fn parse(path: impl Into<PathBuf>, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        ConfigError::Parse {
            path: path.into(),
            source: Box::new(source),
        }
    }
}
