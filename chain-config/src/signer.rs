//! The signature scheme active at a given block: plain pre-EIP-155
//! (`v = 27/28`) or chain-id-bound EIP-155 (`v = chain_id*2 + 35/36`).
//!
//! Transaction signing/verification itself belongs to the (out-of-scope)
//! transaction pool; this module only resolves *which* scheme applies, per
//! `spec.md` §4.1 `GetSigner`.

/// The signature scheme active at a particular block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signer {
    /// Pre-EIP-155: recovery id encodes only parity.
    PreEip155,
    /// EIP-155: recovery id is bound to `chain_id`, preventing replay
    /// across chains.
    Eip155 { chain_id: u64 },
}

impl Signer {
    /// The chain id this signer binds signatures to, if any.
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Signer::PreEip155 => None,
            Signer::Eip155 { chain_id } => Some(*chain_id),
        }
    }
}
