//! Bound contract handles

use std::sync::Arc;

use bytes::Bytes;
use conduit_primitives::{Address, U256};

use super::dispatch::{DispatchEntry, DispatchTable};
use crate::abi::{Abi, StateMutability, Token};
use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::events::{decode_log, DecodedEvent, LogFilter};
use crate::types::{BlockId, CallRequest, Log, PendingTransaction, Receipt, TransactionRequest};

/// Per-call overrides of the handle's defaults
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Sending account instead of the handle's owner
    pub from: Option<Address>,
    /// Gas limit instead of the configured default
    pub gas: Option<u64>,
    /// Wei to send; payable functions only
    pub value: Option<U256>,
}

impl CallOptions {
    /// Send from `from`
    pub fn from(from: Address) -> Self {
        Self {
            from: Some(from),
            ..Default::default()
        }
    }

    /// Set the gas limit
    pub fn gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }

    /// Attach value
    pub fn value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }
}

/// Outcome of [`ContractHandle::invoke`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    /// A read-only function returned these values
    Returned(Vec<Token>),
    /// A mutating function was submitted
    Submitted(PendingTransaction),
}

/// A deployed contract bound to its ABI
///
/// Handles are cheap to clone and several may point at the same address.
#[derive(Debug, Clone)]
pub struct ContractHandle {
    client: Client,
    address: Address,
    abi: Arc<Abi>,
    table: Arc<DispatchTable>,
    sender: Option<Address>,
}

impl ContractHandle {
    pub(crate) fn new(
        client: Client,
        address: Address,
        abi: Abi,
        table: DispatchTable,
        sender: Option<Address>,
    ) -> Self {
        Self {
            client,
            address,
            abi: Arc::new(abi),
            table: Arc::new(table),
            sender,
        }
    }

    /// Contract address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Bound ABI
    pub fn abi(&self) -> &Abi {
        &self.abi
    }

    /// Dispatch table built at bind time
    pub fn dispatch_table(&self) -> &DispatchTable {
        &self.table
    }

    /// Owning account
    pub fn sender(&self) -> Option<Address> {
        self.sender
    }

    /// Same contract, owned by `sender`
    pub fn with_sender(&self, sender: Address) -> Self {
        Self {
            sender: Some(sender),
            ..self.clone()
        }
    }

    /// Read through `eth_call`; allowed for any function, nothing is mined
    pub async fn call(&self, function: &str, args: &[Token]) -> Result<Vec<Token>> {
        self.call_with(function, args, &CallOptions::default()).await
    }

    /// [`call`](Self::call) with overrides
    pub async fn call_with(
        &self,
        function: &str,
        args: &[Token],
        options: &CallOptions,
    ) -> Result<Vec<Token>> {
        let entry = self.table.resolve(function, args)?;
        let data = entry.encode_call(args)?;
        let request = CallRequest {
            from: options.from.or(self.sender),
            to: Some(self.address),
            gas: options.gas,
            value: options.value,
            data: Some(Bytes::from(data)),
        };
        let output = self.client.call(&request, BlockId::Latest).await?;
        entry.decode_output(&output)
    }

    /// Submit a transaction; returns once the node accepts it
    pub async fn send(&self, function: &str, args: &[Token]) -> Result<PendingTransaction> {
        self.send_with(function, args, &CallOptions::default()).await
    }

    /// [`send`](Self::send) with overrides
    pub async fn send_with(
        &self,
        function: &str,
        args: &[Token],
        options: &CallOptions,
    ) -> Result<PendingTransaction> {
        let entry = self.table.resolve(function, args)?;
        if entry.is_read_only() {
            return Err(ClientError::AbiEncode(format!(
                "{} is {} and cannot be sent as a transaction",
                entry.signature, entry.function.state_mutability
            )));
        }
        self.submit(entry, args, options).await
    }

    /// Send and wait for the receipt with the configured interval and timeout
    pub async fn send_and_wait(&self, function: &str, args: &[Token]) -> Result<Receipt> {
        let mut pending = self.send(function, args).await?;
        self.client.wait(&mut pending).await
    }

    /// Call read-only functions, send mutating ones
    pub async fn invoke(&self, function: &str, args: &[Token]) -> Result<Invocation> {
        self.invoke_with(function, args, &CallOptions::default()).await
    }

    /// [`invoke`](Self::invoke) with overrides
    pub async fn invoke_with(
        &self,
        function: &str,
        args: &[Token],
        options: &CallOptions,
    ) -> Result<Invocation> {
        let entry = self.table.resolve(function, args)?;
        if entry.is_read_only() {
            self.call_with(&entry.signature, args, options)
                .await
                .map(Invocation::Returned)
        } else {
            self.submit(entry, args, options)
                .await
                .map(Invocation::Submitted)
        }
    }

    async fn submit(
        &self,
        entry: &DispatchEntry,
        args: &[Token],
        options: &CallOptions,
    ) -> Result<PendingTransaction> {
        let from = options.from.or(self.sender).ok_or_else(|| {
            ClientError::Config(format!(
                "no sending account for {}; set one with with_sender or CallOptions",
                entry.signature
            ))
        })?;

        let value = options.value.filter(|v| !v.is_zero());
        if value.is_some() && entry.function.state_mutability != StateMutability::Payable {
            return Err(ClientError::AbiEncode(format!(
                "{} is not payable",
                entry.signature
            )));
        }

        let data = entry.encode_call(args)?;
        let tx = TransactionRequest {
            from,
            to: Some(self.address),
            gas: options.gas,
            value,
            data: Some(Bytes::from(data)),
            ..Default::default()
        };
        self.client.send_transaction(tx).await
    }

    /// Filter for `event` emitted by this contract
    pub fn event_filter(&self, event: &str) -> Result<LogFilter> {
        let descriptor = self
            .abi
            .event(event)
            .ok_or_else(|| ClientError::UnknownFunction(format!("event {}", event)))?;
        Ok(LogFilter::new()
            .address(self.address)
            .event(descriptor.clone()))
    }

    /// Decode a log emitted by this contract
    pub fn decode_log(&self, log: &Log) -> Result<DecodedEvent> {
        let topic0 = log
            .topics
            .first()
            .ok_or_else(|| ClientError::AbiDecode("log has no topics".into()))?;
        let descriptor = self
            .abi
            .event_by_topic(topic0)
            .ok_or_else(|| ClientError::AbiDecode(format!("no event with topic {}", topic0)))?;
        decode_log(descriptor, log)
    }
}
