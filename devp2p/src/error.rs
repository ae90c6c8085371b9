//! Error type for the discovery table (`spec.md` §7).

use thiserror::Error;

/// Errors surfaced by [`crate::table::Table`] operations.
#[derive(Debug, Clone, Error)]
pub enum DiscoveryError {
    #[error("transport call timed out")]
    TransportTimeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("bonding failed")]
    BondFailed,

    #[error("node is not registered in the table")]
    NotRegistered,

    #[error("node is already registered in the table")]
    AlreadyRegistered,

    #[error("fallback node list is invalid")]
    FallbackInvalid,

    #[error("operation target is the local node")]
    IsSelf,
}
