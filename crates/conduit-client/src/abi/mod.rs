//! ABI encoding and decoding for Solidity contracts
//!
//! This module provides functionality for:
//! - Parsing compiler ABI JSON into descriptors
//! - Encoding call arguments against declared types
//! - Decoding return values and event data
//! - Computing function selectors and event topics
//!
//! # Example
//!
//! ```rust
//! use conduit_client::abi::{decode, encode_params, function_selector, ParamType, Token};
//! use conduit_primitives::{Address, U256};
//!
//! let selector = function_selector("transfer(address,uint256)");
//! let data = encode_params(
//!     &[ParamType::Address, ParamType::Uint(256)],
//!     &[Token::Address(Address::ZERO), Token::Uint(U256::from(1000))],
//! )
//! .unwrap();
//! assert_eq!(selector, [0xa9, 0x05, 0x9c, 0xbb]);
//! assert_eq!(data.len(), 64);
//!
//! let return_data = [0u8; 32];
//! let balance = decode(&[ParamType::Uint(256)], &return_data).unwrap();
//! assert_eq!(balance, vec![Token::Uint(U256::zero())]);
//! ```

mod decode;
mod descriptor;
mod encode;
mod types;

pub use decode::{decode, decode_output};
pub use descriptor::{
    Abi, ConstructorDescriptor, EventDescriptor, FunctionDescriptor, Param, StateMutability,
};
pub use encode::{
    encode, encode_function_call, encode_params, encode_topic, event_topic, function_selector,
};
pub use types::{parse_type, ParamType, Token, I256};
