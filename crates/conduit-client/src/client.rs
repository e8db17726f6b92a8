//! Client - owns the transport, nonce locks and configuration

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use conduit_primitives::{quantity, Address, H256, U256};
use serde_json::Value;
use tokio::sync::OnceCell;
use tokio::time::Instant;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::nonce::NonceManager;
use crate::transport::{deserialize_response, Transport};
use crate::types::{BlockId, CallRequest, LogQuery, Log, PendingTransaction, Receipt, TransactionRequest};

#[cfg(feature = "http")]
use crate::transport::HttpTransport;

/// Node client
///
/// Cheap to clone; clones share the transport, the per-account nonce locks
/// and the configuration.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
    nonces: NonceManager,
    chain_id: OnceCell<u64>,
    closed: AtomicBool,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("rpc_url", &self.inner.config.rpc_url)
            .field("closed", &self.inner.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl Client {
    /// Connect over HTTP with default settings and check the node answers
    #[cfg(feature = "http")]
    pub async fn connect(url: &str) -> Result<Self> {
        let client = Self::from_config(ClientConfig::new(url))?;
        let chain_id = client.chain_id().await?;
        tracing::debug!(url, chain_id, "connected");
        Ok(client)
    }

    /// Build an HTTP client from configuration, without any network call
    #[cfg(feature = "http")]
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = HttpTransport::new(&config.rpc_url, config.request_timeout())?;
        Ok(Self::with_transport(Arc::new(transport), config))
    }

    /// Create a client over a custom transport
    pub fn with_transport(transport: Arc<dyn Transport>, config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                transport,
                config,
                nonces: NonceManager::new(),
                chain_id: OnceCell::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Configuration supplied at construction
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Stop issuing requests; later calls fail with a transport error
    pub fn shutdown(&self) {
        if !self.inner.closed.swap(true, Ordering::SeqCst) {
            tracing::debug!(accounts = self.inner.nonces.tracked(), "client shut down");
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shut_down(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Send a request and return the raw `result`
    pub async fn request_raw(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        if self.is_shut_down() {
            return Err(ClientError::transport(method, "client is shut down"));
        }
        self.inner.transport.request_json(method, params).await
    }

    pub(crate) async fn request<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T> {
        let value = self.request_raw(method, params).await?;
        deserialize_response(method, value)
    }

    /// Request for reads that are safe to repeat; transport failures are
    /// retried up to `read_retries` times
    pub(crate) async fn request_idempotent<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T> {
        let retries = self.inner.config.read_retries;
        let mut attempt = 0u32;
        loop {
            match self.request_raw(method, params.clone()).await {
                Ok(value) => return deserialize_response(method, value),
                Err(e) if e.is_retryable() && attempt < retries && !self.is_shut_down() => {
                    attempt += 1;
                    tracing::warn!(method, attempt, error = %e, "retrying read");
                    tokio::time::sleep(self.inner.config.poll_interval()).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    // ==================== Node Info ====================

    /// Chain ID, fetched once and cached
    pub async fn chain_id(&self) -> Result<u64> {
        self.inner
            .chain_id
            .get_or_try_init(|| async {
                let result: String = self.request_idempotent("eth_chainId", vec![]).await?;
                Ok::<u64, ClientError>(quantity::parse_u64(&result)?)
            })
            .await
            .copied()
    }

    /// Current gas price
    pub async fn gas_price(&self) -> Result<U256> {
        let result: String = self.request_idempotent("eth_gasPrice", vec![]).await?;
        Ok(quantity::parse_u256(&result)?)
    }

    /// Latest block number
    pub async fn block_number(&self) -> Result<u64> {
        let result: String = self.request_idempotent("eth_blockNumber", vec![]).await?;
        Ok(quantity::parse_u64(&result)?)
    }

    /// Node software version string
    pub async fn client_version(&self) -> Result<String> {
        self.request_idempotent("web3_clientVersion", vec![]).await
    }

    // ==================== Account Queries ====================

    /// Accounts held by the node wallet
    pub async fn accounts(&self) -> Result<Vec<Address>> {
        self.request_idempotent("eth_accounts", vec![]).await
    }

    /// Account that receives mining rewards
    pub async fn coinbase(&self) -> Result<Address> {
        self.request_idempotent("eth_coinbase", vec![]).await
    }

    /// Balance of an address
    pub async fn get_balance(&self, address: &Address, block: BlockId) -> Result<U256> {
        let result: String = self
            .request_idempotent(
                "eth_getBalance",
                vec![Value::String(address.to_hex()), serde_json::to_value(block)?],
            )
            .await?;
        Ok(quantity::parse_u256(&result)?)
    }

    /// Transaction count of an address
    pub async fn get_nonce(&self, address: &Address, block: BlockId) -> Result<u64> {
        let result: String = self
            .request_idempotent(
                "eth_getTransactionCount",
                vec![Value::String(address.to_hex()), serde_json::to_value(block)?],
            )
            .await?;
        Ok(quantity::parse_u64(&result)?)
    }

    /// Code deployed at an address
    pub async fn get_code(&self, address: &Address, block: BlockId) -> Result<Bytes> {
        let result: String = self
            .request_idempotent(
                "eth_getCode",
                vec![Value::String(address.to_hex()), serde_json::to_value(block)?],
            )
            .await?;
        Ok(Bytes::from(quantity::parse_bytes(&result)?))
    }

    // ==================== Calls & Transactions ====================

    /// Execute a call without creating a transaction
    pub async fn call(&self, request: &CallRequest, block: BlockId) -> Result<Bytes> {
        let result: String = self
            .request(
                "eth_call",
                vec![serde_json::to_value(request)?, serde_json::to_value(block)?],
            )
            .await?;
        Ok(Bytes::from(quantity::parse_bytes(&result)?))
    }

    /// Submit a transaction signed by the node wallet
    ///
    /// Sends from one account are serialized: the account lock is held from
    /// the nonce lookup until the node accepts or rejects the transaction. A
    /// missing gas limit takes the configured default.
    pub async fn send_transaction(&self, mut tx: TransactionRequest) -> Result<PendingTransaction> {
        let from = tx.from;
        let slot = self.inner.nonces.slot(&from);
        let mut next = slot.lock().await;

        let nonce = match (tx.nonce, *next) {
            (Some(explicit), _) => explicit,
            (None, Some(cached)) => cached,
            (None, None) => self.get_nonce(&from, BlockId::Pending).await?,
        };
        tx.nonce = Some(nonce);
        tx.gas.get_or_insert(self.inner.config.gas_limit);

        let result: Result<H256> = self
            .request("eth_sendTransaction", vec![serde_json::to_value(&tx)?])
            .await;
        match result {
            Ok(hash) => {
                *next = Some(nonce + 1);
                tracing::debug!(from = %from, nonce, hash = %hash, "transaction submitted");
                Ok(PendingTransaction::new(hash, from, nonce))
            }
            Err(e) => {
                // re-read from the node on the next send
                *next = None;
                Err(e)
            }
        }
    }

    /// Receipt for a transaction, `None` while it is pending
    pub async fn get_receipt(&self, hash: &H256) -> Result<Option<Receipt>> {
        self.request_idempotent("eth_getTransactionReceipt", vec![Value::String(hash.to_hex())])
            .await
    }

    /// Poll for a receipt until it appears or `timeout` elapses
    ///
    /// A reverted transaction is returned as a receipt with failed status.
    /// No request is issued once the timeout has passed. A retryable
    /// transport failure counts as a pending lookup and is polled again on
    /// the next tick.
    pub async fn wait_for_receipt(
        &self,
        hash: &H256,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<Receipt> {
        let start = Instant::now();
        let deadline = start + timeout;
        loop {
            let lookup: Result<Option<Receipt>> = self
                .request(
                    "eth_getTransactionReceipt",
                    vec![Value::String(hash.to_hex())],
                )
                .await;
            match lookup {
                Ok(Some(receipt)) => return Ok(receipt),
                Ok(None) => {}
                Err(e) if e.is_retryable() && !self.is_shut_down() => {
                    tracing::warn!(hash = %hash, error = %e, "receipt lookup failed");
                }
                Err(e) => return Err(e),
            }
            let now = Instant::now();
            if now + poll_interval >= deadline {
                tokio::time::sleep_until(deadline).await;
                return Err(ClientError::TransactionTimeout {
                    hash: *hash,
                    waited: start.elapsed(),
                });
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Wait for `pending` with the configured interval and timeout, then
    /// record its outcome
    pub async fn wait(&self, pending: &mut PendingTransaction) -> Result<Receipt> {
        let receipt = self
            .wait_for_receipt(
                &pending.hash,
                self.inner.config.poll_interval(),
                self.inner.config.receipt_timeout(),
            )
            .await?;
        pending.settle(&receipt);
        Ok(receipt)
    }

    // ==================== Logs ====================

    /// Logs matching `query`
    pub async fn get_logs(&self, query: &LogQuery) -> Result<Vec<Log>> {
        self.request_idempotent("eth_getLogs", vec![serde_json::to_value(query)?])
            .await
    }
}
