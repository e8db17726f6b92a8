//! Contract deployment and binding
//!
//! A handle's ABI and the code at its address come from the same
//! [`CompiledArtifact`], and the dispatch table is built once when the
//! handle is bound.

mod artifact;
mod dispatch;
mod handle;

use bytes::Bytes;
use conduit_primitives::Address;

use crate::abi::{encode_params, Abi, Token};
use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::types::{TransactionRequest, TxStatus};

pub use artifact::CompiledArtifact;
pub use dispatch::{DispatchEntry, DispatchTable};
pub use handle::{CallOptions, ContractHandle, Invocation};

/// Deploys artifacts and attaches to existing contracts
#[derive(Debug, Clone)]
pub struct ContractBinder {
    client: Client,
}

impl ContractBinder {
    /// Binder sharing `client`'s transport
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// The underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Deploy `artifact` from `sender` and wait for it to be mined
    ///
    /// The bytecode must already be linked. Constructor arguments are
    /// checked against the ABI constructor; a contract without one accepts
    /// no arguments. A missing gas limit takes the configured default.
    pub async fn deploy(
        &self,
        artifact: &CompiledArtifact,
        args: &[Token],
        sender: &Address,
        gas: Option<u64>,
    ) -> Result<ContractHandle> {
        let mut code = artifact.bytecode_bytes()?;
        let table = DispatchTable::build(
            &artifact.abi.functions,
            artifact.method_identifiers.as_ref(),
        )?;

        match &artifact.abi.constructor {
            Some(constructor) => code.extend(encode_params(&constructor.input_types(), args)?),
            None if !args.is_empty() => {
                return Err(ClientError::AbiEncode(format!(
                    "{} has no constructor but {} arguments were given",
                    artifact.name,
                    args.len()
                )))
            }
            None => {}
        }

        let gas_limit = gas.unwrap_or(self.client.config().gas_limit);
        let tx = TransactionRequest {
            from: *sender,
            gas: Some(gas_limit),
            data: Some(Bytes::from(code)),
            ..Default::default()
        };

        let mut pending = match self.client.send_transaction(tx).await {
            Ok(pending) => pending,
            Err(ClientError::Rpc { message, .. }) => {
                return Err(ClientError::Deployment {
                    reason: format!("node rejected {}: {}", artifact.name, message),
                    tx_hash: None,
                })
            }
            Err(e) => return Err(e),
        };
        tracing::debug!(contract = %artifact.name, hash = %pending.hash, "deployment submitted");

        let receipt = self.client.wait(&mut pending).await?;
        if receipt.tx_status() == TxStatus::Failed {
            return Err(ClientError::Deployment {
                reason: format!("{} reverted during construction", artifact.name),
                tx_hash: Some(pending.hash),
            });
        }
        // status-less receipts signal out-of-gas only by using every unit
        if receipt.status.is_none() && receipt.gas_used == Some(gas_limit) {
            return Err(ClientError::Deployment {
                reason: format!("{} ran out of gas ({})", artifact.name, gas_limit),
                tx_hash: Some(pending.hash),
            });
        }
        let address = receipt.contract_address.ok_or_else(|| ClientError::Deployment {
            reason: format!("receipt for {} has no contract address", artifact.name),
            tx_hash: Some(pending.hash),
        })?;

        tracing::info!(contract = %artifact.name, address = %address, "contract deployed");
        Ok(ContractHandle::new(
            self.client.clone(),
            address,
            artifact.abi.clone(),
            table,
            Some(*sender),
        ))
    }

    /// Bind `abi` to an existing address; no network call
    ///
    /// The code at `address` is not checked.
    pub fn attach(&self, address: Address, abi: Abi) -> ContractHandle {
        let table = DispatchTable::build(&abi.functions, None).unwrap_or_default();
        ContractHandle::new(self.client.clone(), address, abi, table, None)
    }

    /// Bind an artifact's ABI to an existing address, checking reported selectors
    pub fn attach_artifact(
        &self,
        address: Address,
        artifact: &CompiledArtifact,
    ) -> Result<ContractHandle> {
        let table = DispatchTable::build(
            &artifact.abi.functions,
            artifact.method_identifiers.as_ref(),
        )?;
        Ok(ContractHandle::new(
            self.client.clone(),
            address,
            artifact.abi.clone(),
            table,
            None,
        ))
    }
}
