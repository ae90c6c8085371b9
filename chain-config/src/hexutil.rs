//! Two hex flavors used across the chain-config JSON schema: plain hex
//! with no declared width (`decode_hex`) and `0x`-prefixed hex, either at
//! a fixed width (genesis header fields, via `decode_hex_exact`) or
//! variable-width and optionally empty (required-hash fields, via
//! `decode_prefixed_hex`). Allocation balances are decimal, not hex, so
//! they are not handled here.

use thiserror::Error;

/// Error returned by [`decode_hex`] / [`decode_prefixed_hex`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HexError {
    /// The input contained a non-hex-digit character.
    #[error("invalid hex digit in {0:?}")]
    InvalidDigit(String),
    /// The input had an odd number of hex digits.
    #[error("odd number of hex digits in {0:?}")]
    OddLength(String),
    /// The decoded byte count did not match the width the caller expected.
    #[error("expected {expected} bytes, got {got}")]
    WrongWidth { expected: usize, got: usize },
}

/// Decodes plain hex (no `0x` prefix) into exactly `width` bytes. An empty
/// input decodes to an empty vector, never an error, regardless of
/// `width` — callers that require a fixed width check the result length
/// themselves via [`decode_hex_exact`].
pub fn decode_hex(input: &str) -> Result<Vec<u8>, HexError> {
    if input.is_empty() {
        return Ok(Vec::new());
    }
    hex::decode(input).map_err(|e| match e {
        hex::FromHexError::OddLength => HexError::OddLength(input.to_string()),
        _ => HexError::InvalidDigit(input.to_string()),
    })
}

/// Decodes hex and requires the result to be exactly `width` bytes
/// (unless the input is empty, which always succeeds with an empty vec —
/// genesis fields treat an absent value as "not yet known" rather than a
/// decode error). An optional `0x`/`0X` prefix is stripped first: genesis
/// header fields are fixed-width but still use the same `0x`-prefixed
/// convention as the rest of the descriptor.
pub fn decode_hex_exact(input: &str, width: usize) -> Result<Vec<u8>, HexError> {
    let stripped = input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")).unwrap_or(input);
    let bytes = decode_hex(stripped)?;
    if !bytes.is_empty() && bytes.len() != width {
        return Err(HexError::WrongWidth {
            expected: width,
            got: bytes.len(),
        });
    }
    Ok(bytes)
}

/// Decodes `0x`-prefixed hex. The prefix is optional; an empty string (with
/// or without prefix) decodes to an empty vector.
pub fn decode_prefixed_hex(input: &str) -> Result<Vec<u8>, HexError> {
    let stripped = input.strip_prefix("0x").unwrap_or(input);
    decode_hex(stripped)
}

/// Decodes a `0x`-prefixed big-integer quantity (genesis `gasLimit`,
/// `difficulty`, `timestamp`): like [`decode_prefixed_hex`], but an odd
/// number of hex digits is left-padded with a zero nibble rather than
/// rejected, matching how these fields are written in real genesis
/// descriptors (e.g. `"0x400000000"`, `"0x0"`).
pub fn decode_prefixed_quantity(input: &str) -> Result<Vec<u8>, HexError> {
    let stripped = input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")).unwrap_or(input);
    if stripped.len() % 2 == 1 {
        let padded = format!("0{stripped}");
        return decode_hex(&padded);
    }
    decode_hex(stripped)
}

/// Encodes bytes as `0x`-prefixed lowercase hex.
pub fn encode_prefixed_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_hex_round_trips() {
        let bytes = decode_hex("deadbeef").unwrap();
        assert_eq!(bytes, vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(hex::encode(&bytes), "deadbeef");
    }

    #[test]
    fn empty_input_is_not_an_error() {
        assert_eq!(decode_hex("").unwrap(), Vec::<u8>::new());
        assert_eq!(decode_prefixed_hex("0x").unwrap(), Vec::<u8>::new());
        assert_eq!(decode_prefixed_hex("").unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn prefixed_hex_strips_prefix() {
        assert_eq!(decode_prefixed_hex("0xdead").unwrap(), vec![0xde, 0xad]);
        assert_eq!(decode_prefixed_hex("dead").unwrap(), vec![0xde, 0xad]);
    }

    #[test]
    fn wrong_width_is_rejected() {
        let err = decode_hex_exact("dead", 4).unwrap_err();
        assert_eq!(err, HexError::WrongWidth { expected: 4, got: 2 });
    }

    #[test]
    fn exact_width_strips_optional_prefix() {
        assert_eq!(decode_hex_exact("0x0000000000000042", 8).unwrap(), hex::decode("0000000000000042").unwrap());
        assert_eq!(decode_hex_exact("0000000000000042", 8).unwrap(), hex::decode("0000000000000042").unwrap());
    }

    #[test]
    fn odd_length_is_rejected() {
        assert!(matches!(decode_hex("abc"), Err(HexError::OddLength(_))));
    }

    #[test]
    fn quantity_tolerates_odd_length() {
        assert_eq!(decode_prefixed_quantity("0x400000000").unwrap(), hex::decode("0400000000").unwrap());
        assert_eq!(decode_prefixed_quantity("0x0").unwrap(), vec![0u8]);
        assert_eq!(decode_prefixed_quantity("0x1388").unwrap(), hex::decode("1388").unwrap());
    }
}
