//! # conduit-primitives
//!
//! Wire-level primitive types shared by the Conduit crates: addresses,
//! 32-byte hashes, 256-bit integers, Keccak-256 and the hex encodings the
//! JSON-RPC surface uses for quantities and data.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod error;
mod hash;
pub mod quantity;

pub use address::{Address, AddressError};
pub use error::PrimitiveError;
pub use hash::{keccak256, HashError, H256};
pub use quantity::QuantityError;

// Re-export primitive-types for U256
pub use primitive_types::U256;
