//! Client error types

use std::time::Duration;

use conduit_primitives::{AddressError, HashError, PrimitiveError, QuantityError, H256};
use serde_json::Value;
use thiserror::Error;

/// Longest params summary carried in an error
const PARAMS_SUMMARY_LEN: usize = 160;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    /// Connection refused, timeout, malformed or uncorrelated response
    #[error("Transport error calling {method}: {message}")]
    Transport {
        /// RPC method being called
        method: String,
        /// Underlying failure
        message: String,
    },

    /// The node answered with an error envelope
    #[error("RPC error from {method}({params}): {code} - {message}")]
    Rpc {
        /// RPC method being called
        method: String,
        /// Truncated summary of the request params
        params: String,
        /// JSON-RPC error code
        code: i64,
        /// Error message
        message: String,
        /// Optional error payload
        data: Option<Value>,
    },

    /// The node refused to create an account
    #[error("Account creation failed: {0}")]
    AccountCreation(String),

    /// Contract deployment was rejected or did not produce a contract
    #[error("Deployment failed: {reason}")]
    Deployment {
        /// What went wrong
        reason: String,
        /// Deployment transaction, if one was submitted
        tx_hash: Option<H256>,
    },

    /// No receipt within the allowed time; the transaction may still mine
    #[error("Transaction {hash} has no receipt after {waited:?}")]
    TransactionTimeout {
        /// Transaction hash
        hash: H256,
        /// Time spent polling
        waited: Duration,
    },

    /// Derived selector disagrees with the compiler's method identifier
    #[error("Selector mismatch for {signature}: derived 0x{derived}, compiler reported 0x{reported}")]
    SelectorMismatch {
        /// Canonical signature
        signature: String,
        /// Selector computed from the signature
        derived: String,
        /// Selector reported by the compiler
        reported: String,
    },

    /// Bytecode still references libraries without addresses
    #[error("Unresolved library links: {}", .placeholders.join(", "))]
    UnresolvedLink {
        /// Every placeholder with no link table entry
        placeholders: Vec<String>,
    },

    /// ABI encoding error
    #[error("ABI encoding error: {0}")]
    AbiEncode(String),

    /// ABI decoding error
    #[error("ABI decoding error: {0}")]
    AbiDecode(String),

    /// Function or event not present in the bound ABI
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Malformed compiler output
    #[error("Invalid artifact: {0}")]
    Artifact(String),

    /// Invalid hex string
    #[error("Invalid hex: {0}")]
    InvalidHex(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration could not be loaded
    #[error("Config error: {0}")]
    Config(String),

    /// Start/stop issued in the wrong watcher state
    #[error("Watcher state error: {0}")]
    WatcherState(String),
}

impl ClientError {
    /// Whether the same request may succeed if issued again
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Transport { .. })
    }

    /// Build a transport error for `method`
    pub fn transport(method: &str, message: impl Into<String>) -> Self {
        ClientError::Transport {
            method: method.to_string(),
            message: message.into(),
        }
    }

    /// Build an RPC error for `method` carrying a summary of `params`
    pub fn rpc(
        method: &str,
        params: &[Value],
        code: i64,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        ClientError::Rpc {
            method: method.to_string(),
            params: summarize_params(params),
            code,
            message: message.into(),
            data,
        }
    }
}

/// Render params for an error message, truncated
pub fn summarize_params(params: &[Value]) -> String {
    let rendered = params
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    if rendered.len() <= PARAMS_SUMMARY_LEN {
        return rendered;
    }
    let mut cut = PARAMS_SUMMARY_LEN;
    while !rendered.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}...", &rendered[..cut])
}

impl From<hex::FromHexError> for ClientError {
    fn from(e: hex::FromHexError) -> Self {
        ClientError::InvalidHex(e.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::Serialization(e.to_string())
    }
}

impl From<PrimitiveError> for ClientError {
    fn from(e: PrimitiveError) -> Self {
        ClientError::InvalidHex(e.to_string())
    }
}

impl From<AddressError> for ClientError {
    fn from(e: AddressError) -> Self {
        ClientError::InvalidHex(e.to_string())
    }
}

impl From<HashError> for ClientError {
    fn from(e: HashError) -> Self {
        ClientError::InvalidHex(e.to_string())
    }
}

impl From<QuantityError> for ClientError {
    fn from(e: QuantityError) -> Self {
        ClientError::InvalidHex(e.to_string())
    }
}

/// Client result alias
pub type Result<T> = std::result::Result<T, ClientError>;
