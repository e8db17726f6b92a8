//! # conduit-client
//!
//! JSON-RPC client for Ethereum-style nodes whose wallet holds the keys.
//!
//! ## Features
//!
//! - **Client**: transport, per-account nonce serialization and receipt polling
//! - **AccountManager**: create, unlock, list and fund node accounts
//! - **ContractBinder**: deploy compiled artifacts and attach to addresses
//! - **ContractHandle**: dispatch calls and transactions through the ABI
//! - **Linker**: resolve library placeholders in bytecode
//! - **EventWatcher**: poll, decode and deliver contract events in order
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use conduit_client::abi::Token;
//! use conduit_client::{AccountManager, Client, CompiledArtifact, ContractBinder, U256};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Client::connect("http://localhost:8545").await?;
//!     let accounts = AccountManager::new(client.clone());
//!
//!     let mut owner = accounts.create_account("mypasswd").await?;
//!     accounts.unlock(&mut owner, "mypasswd", Duration::from_secs(1000)).await?;
//!
//!     let coinbase = accounts.coinbase().await?;
//!     let mut funding = accounts.transfer(&coinbase, &owner.address, U256::exp10(18)).await?;
//!     client.wait(&mut funding).await?;
//!
//!     let artifact = CompiledArtifact::load("Debit.json".as_ref(), None)?;
//!     let debit = ContractBinder::new(client.clone())
//!         .deploy(&artifact, &[], &owner.address, None)
//!         .await?;
//!
//!     debit.send_and_wait("setBuffer", &[Token::Uint(U256::from(69))]).await?;
//!     let value = debit.call("getBuffer", &[]).await?;
//!     println!("buffer = {:?}", value[0]);
//!
//!     client.shutdown();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod abi;
mod accounts;
mod client;
mod config;
pub mod contract;
mod error;
pub mod events;
pub mod linker;
mod nonce;
mod transport;
pub mod types;

pub use accounts::{Account, AccountManager, LockState};
pub use client::Client;
pub use config::ClientConfig;
pub use contract::{CallOptions, CompiledArtifact, ContractBinder, ContractHandle, Invocation};
pub use error::{summarize_params, ClientError, Result};
pub use events::{DecodedEvent, EventWatcher, LogFilter, WatcherState};
pub use linker::{link, LinkTable};
pub use transport::{deserialize_response, MockTransport};

/// Re-export Transport trait for custom implementations
pub use transport::Transport;

#[cfg(feature = "http")]
pub use transport::HttpTransport;

// Re-export primitives for convenience
pub use conduit_primitives::{Address, H256, U256};
