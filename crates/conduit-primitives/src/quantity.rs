//! Hex encodings used on the JSON-RPC wire
//!
//! Quantities are `0x`-prefixed big-endian hex without leading zeros
//! (`0x0`, `0x1a4`); data blobs are `0x`-prefixed, two chars per byte.

use primitive_types::U256;
use thiserror::Error;

/// Quantity or data decoding error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuantityError {
    /// Not valid hex
    #[error("invalid hex quantity {value:?}: {reason}")]
    InvalidHex {
        /// Offending input
        value: String,
        /// Decoder message
        reason: String,
    },
    /// Does not fit the target integer
    #[error("quantity {0:?} overflows the target type")]
    Overflow(String),
}

fn strip(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Parse a hex quantity into `u64`
pub fn parse_u64(s: &str) -> Result<u64, QuantityError> {
    let digits = strip(s);
    if digits.is_empty() {
        return Ok(0);
    }
    if digits.len() > 16 && digits.trim_start_matches('0').len() > 16 {
        return Err(QuantityError::Overflow(s.to_string()));
    }
    u64::from_str_radix(digits, 16).map_err(|e| QuantityError::InvalidHex {
        value: s.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a hex quantity into `u128`
pub fn parse_u128(s: &str) -> Result<u128, QuantityError> {
    let digits = strip(s);
    if digits.is_empty() {
        return Ok(0);
    }
    if digits.trim_start_matches('0').len() > 32 {
        return Err(QuantityError::Overflow(s.to_string()));
    }
    u128::from_str_radix(digits, 16).map_err(|e| QuantityError::InvalidHex {
        value: s.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a hex quantity into `U256`
pub fn parse_u256(s: &str) -> Result<U256, QuantityError> {
    let digits = strip(s);
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    if digits.trim_start_matches('0').len() > 64 {
        return Err(QuantityError::Overflow(s.to_string()));
    }
    U256::from_str_radix(digits, 16).map_err(|e| QuantityError::InvalidHex {
        value: s.to_string(),
        reason: format!("{:?}", e),
    })
}

/// Decode a `0x`-prefixed data blob (`0x` alone is empty)
pub fn parse_bytes(s: &str) -> Result<Vec<u8>, QuantityError> {
    let digits = strip(s);
    if digits.is_empty() {
        return Ok(Vec::new());
    }
    hex::decode(digits).map_err(|e| QuantityError::InvalidHex {
        value: s.to_string(),
        reason: e.to_string(),
    })
}

/// Encode a `u64` as a quantity
pub fn u64_to_quantity(value: u64) -> String {
    format!("0x{:x}", value)
}

/// Encode a `U256` as a quantity
pub fn u256_to_quantity(value: &U256) -> String {
    format!("0x{:x}", value)
}

/// Encode bytes as a data blob
pub fn bytes_to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}
