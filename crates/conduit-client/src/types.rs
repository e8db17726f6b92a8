//! RPC request and response types

use std::cmp::Ordering;

use bytes::Bytes;
use conduit_primitives::{quantity, Address, H256, U256};
use serde::{Deserialize, Deserializer, Serialize};

/// Block identifier for RPC queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockId {
    /// Block number
    Number(u64),
    /// Latest block
    #[default]
    Latest,
    /// Pending block (includes pending transactions)
    Pending,
    /// Earliest block (genesis)
    Earliest,
}

impl Serialize for BlockId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            BlockId::Number(n) => serializer.serialize_str(&quantity::u64_to_quantity(*n)),
            BlockId::Latest => serializer.serialize_str("latest"),
            BlockId::Pending => serializer.serialize_str("pending"),
            BlockId::Earliest => serializer.serialize_str("earliest"),
        }
    }
}

/// Call request for `eth_call`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallRequest {
    /// Sender address
    pub from: Option<Address>,
    /// Recipient address
    pub to: Option<Address>,
    /// Gas limit
    pub gas: Option<u64>,
    /// Value to transfer
    pub value: Option<U256>,
    /// Input data
    pub data: Option<Bytes>,
}

impl Serialize for CallRequest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialize_tx_fields(
            serializer,
            TxFields {
                from: self.from.as_ref(),
                to: self.to.as_ref(),
                gas: self.gas,
                gas_price: None,
                value: self.value.as_ref(),
                data: self.data.as_ref(),
                nonce: None,
            },
        )
    }
}

/// Transaction for `eth_sendTransaction`; the node signs with an unlocked account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionRequest {
    /// Sender, must be unlocked on the node
    pub from: Address,
    /// Recipient (None for contract creation)
    pub to: Option<Address>,
    /// Gas limit
    pub gas: Option<u64>,
    /// Gas price
    pub gas_price: Option<U256>,
    /// Value to transfer
    pub value: Option<U256>,
    /// Input data
    pub data: Option<Bytes>,
    /// Explicit nonce; filled in by the client
    pub nonce: Option<u64>,
}

impl TransactionRequest {
    /// Plain value transfer
    pub fn transfer(from: Address, to: Address, value: U256) -> Self {
        Self {
            from,
            to: Some(to),
            value: Some(value),
            ..Default::default()
        }
    }

    /// Contract creation carrying `code`
    pub fn create(from: Address, code: Vec<u8>) -> Self {
        Self {
            from,
            data: Some(Bytes::from(code)),
            ..Default::default()
        }
    }
}

impl Serialize for TransactionRequest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serialize_tx_fields(
            serializer,
            TxFields {
                from: Some(&self.from),
                to: self.to.as_ref(),
                gas: self.gas,
                gas_price: self.gas_price.as_ref(),
                value: self.value.as_ref(),
                data: self.data.as_ref(),
                nonce: self.nonce,
            },
        )
    }
}

struct TxFields<'a> {
    from: Option<&'a Address>,
    to: Option<&'a Address>,
    gas: Option<u64>,
    gas_price: Option<&'a U256>,
    value: Option<&'a U256>,
    data: Option<&'a Bytes>,
    nonce: Option<u64>,
}

fn serialize_tx_fields<S>(serializer: S, fields: TxFields<'_>) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeMap;

    // None fields are omitted entirely
    let mut map = serializer.serialize_map(None)?;
    if let Some(from) = fields.from {
        map.serialize_entry("from", &from.to_hex())?;
    }
    if let Some(to) = fields.to {
        map.serialize_entry("to", &to.to_hex())?;
    }
    if let Some(gas) = fields.gas {
        map.serialize_entry("gas", &quantity::u64_to_quantity(gas))?;
    }
    if let Some(gas_price) = fields.gas_price {
        map.serialize_entry("gasPrice", &quantity::u256_to_quantity(gas_price))?;
    }
    if let Some(value) = fields.value {
        map.serialize_entry("value", &quantity::u256_to_quantity(value))?;
    }
    if let Some(data) = fields.data {
        map.serialize_entry("data", &quantity::bytes_to_hex(data))?;
    }
    if let Some(nonce) = fields.nonce {
        map.serialize_entry("nonce", &quantity::u64_to_quantity(nonce))?;
    }
    map.end()
}

/// Filter object for `eth_getLogs`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    /// First block, inclusive
    pub from_block: BlockId,
    /// Last block, inclusive
    pub to_block: BlockId,
    /// Emitting contracts; empty matches any
    pub addresses: Vec<Address>,
    /// Per-position topic alternatives; `None` matches any
    pub topics: Vec<Option<Vec<H256>>>,
}

impl Serialize for LogQuery {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("fromBlock", &self.from_block)?;
        map.serialize_entry("toBlock", &self.to_block)?;
        match self.addresses.as_slice() {
            [] => {}
            [single] => map.serialize_entry("address", single)?,
            many => map.serialize_entry("address", many)?,
        }

        let used = self
            .topics
            .iter()
            .rposition(Option::is_some)
            .map_or(0, |last| last + 1);
        if used > 0 {
            map.serialize_entry("topics", &self.topics[..used])?;
        }
        map.end()
    }
}

fn de_opt_quantity<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|s| quantity::parse_u64(&s).map_err(serde::de::Error::custom))
        .transpose()
}

fn de_bytes<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        Some(s) => quantity::parse_bytes(&s).map_err(serde::de::Error::custom),
        None => Ok(Vec::new()),
    }
}

/// A log entry as returned by `eth_getLogs` or inside a receipt
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    /// Emitting contract
    pub address: Address,
    /// Indexed topics; topic0 is the event signature hash
    #[serde(default)]
    pub topics: Vec<H256>,
    /// Non-indexed data
    #[serde(default, deserialize_with = "de_bytes")]
    pub data: Vec<u8>,
    /// Block number (None while pending)
    #[serde(default, deserialize_with = "de_opt_quantity")]
    pub block_number: Option<u64>,
    /// Position within the block
    #[serde(default, deserialize_with = "de_opt_quantity")]
    pub log_index: Option<u64>,
    /// Producing transaction
    #[serde(default)]
    pub transaction_hash: Option<H256>,
    /// Removed by a reorg
    #[serde(default)]
    pub removed: bool,
}

impl Log {
    /// (blockNumber, logIndex), missing parts sort first
    pub fn position(&self) -> (u64, u64) {
        (
            self.block_number.unwrap_or_default(),
            self.log_index.unwrap_or_default(),
        )
    }

    /// Order by chain position
    pub fn cmp_position(&self, other: &Log) -> Ordering {
        self.position().cmp(&other.position())
    }
}

/// Outcome of a mined transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    /// Submitted, no receipt yet
    Pending,
    /// Included and succeeded
    Mined,
    /// Included but reverted
    Failed,
}

/// Transaction receipt
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    /// Transaction hash
    pub transaction_hash: H256,
    /// Including block
    #[serde(default, deserialize_with = "de_opt_quantity")]
    pub block_number: Option<u64>,
    /// Sender
    #[serde(default)]
    pub from: Option<Address>,
    /// Recipient (None for creations)
    #[serde(default)]
    pub to: Option<Address>,
    /// Created contract, for deployments
    #[serde(default)]
    pub contract_address: Option<Address>,
    /// Gas consumed by this transaction
    #[serde(default, deserialize_with = "de_opt_quantity")]
    pub gas_used: Option<u64>,
    /// 1 on success, 0 on revert; absent on pre-Byzantium nodes
    #[serde(default, deserialize_with = "de_opt_quantity")]
    pub status: Option<u64>,
    /// Emitted logs
    #[serde(default)]
    pub logs: Vec<Log>,
}

impl Receipt {
    /// Receipts without a status field count as mined
    pub fn tx_status(&self) -> TxStatus {
        match self.status {
            Some(0) => TxStatus::Failed,
            _ => TxStatus::Mined,
        }
    }

    /// Whether the transaction succeeded
    pub fn succeeded(&self) -> bool {
        self.tx_status() == TxStatus::Mined
    }
}

/// Handle to a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    /// Transaction hash
    pub hash: H256,
    /// Sender
    pub from: Address,
    /// Nonce the transaction was sent with
    pub nonce: u64,
    /// Last observed status
    pub status: TxStatus,
}

impl PendingTransaction {
    /// Create a pending handle
    pub fn new(hash: H256, from: Address, nonce: u64) -> Self {
        Self {
            hash,
            from,
            nonce,
            status: TxStatus::Pending,
        }
    }

    /// Get the transaction hash
    pub fn hash(&self) -> &H256 {
        &self.hash
    }

    /// Record the outcome carried by `receipt`
    pub fn settle(&mut self, receipt: &Receipt) {
        self.status = receipt.tx_status();
    }
}
