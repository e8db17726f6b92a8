//! Scripted in-memory node used by the integration tests
//!
//! Understands just enough of the wallet and eth surface to run the
//! Debit contract: `getBuffer()`, `setBuffer(uint256)` emitting
//! `BufferSet(address indexed, uint256)`, and libraries. Every transaction
//! is mined into its own block as soon as it is accepted.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use conduit_client::abi::{event_topic, function_selector, Abi};
use conduit_client::{ClientError, CompiledArtifact, Result, Transport};
use conduit_primitives::{keccak256, quantity, Address, H256, U256};
use parking_lot::Mutex;
use serde_json::{json, Value};

pub const DEBIT_ABI: &str = r#"[
    {"constant":true,"inputs":[],"name":"getBuffer","outputs":[{"name":"","type":"uint256"}],"payable":false,"type":"function"},
    {"constant":false,"inputs":[{"name":"x","type":"uint256"}],"name":"setBuffer","outputs":[],"payable":false,"type":"function"},
    {"anonymous":false,"inputs":[{"indexed":true,"name":"who","type":"address"},{"indexed":false,"name":"value","type":"uint256"}],"name":"BufferSet","type":"event"}
]"#;


pub const BUFFER_SET: &str = "BufferSet(address,uint256)";

pub fn debit_artifact() -> CompiledArtifact {
    CompiledArtifact::new(
        "Debit.sol:Debit",
        "0x60606040520de617",
        Abi::parse(DEBIT_ABI).expect("Debit ABI"),
    )
}

#[derive(Debug, Clone)]
struct Wallet {
    passphrase: String,
    unlocked: bool,
}

#[derive(Debug, Clone)]
struct Contract {
    code: Vec<u8>,
    buffer: U256,
}

#[derive(Default)]
struct DevState {
    order: Vec<Address>,
    wallets: HashMap<Address, Wallet>,
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    contracts: HashMap<Address, Contract>,
    receipts: HashMap<H256, Value>,
    logs: Vec<Value>,
    block: u64,
    /// receipt lookups that answer `null` before the receipt shows
    receipt_delay: u32,
    receipt_polls: HashMap<H256, u32>,
    sent_nonces: Vec<(Address, u64)>,
    revert_next: bool,
}

/// In-memory node implementing [`Transport`]
#[derive(Clone)]
pub struct DevNode {
    state: Arc<Mutex<DevState>>,
    coinbase: Address,
}

impl DevNode {
    pub fn new() -> Self {
        let coinbase = Address::from_bytes([0xc0; 20]);
        let mut state = DevState::default();
        state.order.push(coinbase);
        state.wallets.insert(
            coinbase,
            Wallet {
                passphrase: String::new(),
                unlocked: true,
            },
        );
        state.balances.insert(coinbase, U256::exp10(24));
        Self {
            state: Arc::new(Mutex::new(state)),
            coinbase,
        }
    }

    pub fn coinbase(&self) -> Address {
        self.coinbase
    }

    /// Number of `null` answers before a receipt becomes visible
    pub fn set_receipt_delay(&self, polls: u32) {
        self.state.lock().receipt_delay = polls;
    }

    /// Make the next contract transaction revert
    pub fn revert_next(&self) {
        self.state.lock().revert_next = true;
    }

    /// Nonces in the order transactions were accepted
    pub fn sent_nonces(&self) -> Vec<(Address, u64)> {
        self.state.lock().sent_nonces.clone()
    }

    pub fn block_number(&self) -> u64 {
        self.state.lock().block
    }

    pub fn code_at(&self, address: &Address) -> Option<Vec<u8>> {
        self.state.lock().contracts.get(address).map(|c| c.code.clone())
    }

    fn rpc_error(method: &str, params: &[Value], message: &str) -> ClientError {
        ClientError::rpc(method, params, -32000, message, None)
    }

    fn handle(&self, method: &str, params: &[Value]) -> Result<Value> {
        let mut state = self.state.lock();
        match method {
            "web3_clientVersion" => Ok(json!("DevNode/v1.0.0")),
            "eth_chainId" => Ok(json!("0x539")),
            "eth_gasPrice" => Ok(json!("0x1")),
            "eth_blockNumber" => Ok(json!(quantity::u64_to_quantity(state.block))),
            "eth_coinbase" => Ok(json!(self.coinbase.to_hex())),
            "eth_accounts" | "personal_listAccounts" => Ok(json!(state
                .order
                .iter()
                .map(Address::to_hex)
                .collect::<Vec<_>>())),
            "personal_newAccount" => {
                let passphrase = params[0].as_str().unwrap_or_default().to_string();
                if passphrase.is_empty() {
                    return Err(Self::rpc_error(method, params, "passphrase must not be empty"));
                }
                let seed = state.order.len() as u8;
                let address = Address::from_bytes([seed; 20]);
                state.order.push(address);
                state.wallets.insert(
                    address,
                    Wallet {
                        passphrase,
                        unlocked: false,
                    },
                );
                Ok(json!(address.to_hex()))
            }
            "personal_unlockAccount" => {
                let address = parse_address(&params[0]);
                let passphrase = params[1].as_str().unwrap_or_default();
                match state.wallets.get_mut(&address) {
                    Some(wallet) if wallet.passphrase == passphrase => {
                        wallet.unlocked = true;
                        Ok(json!(true))
                    }
                    Some(_) => Err(Self::rpc_error(
                        method,
                        params,
                        "could not decrypt key with given passphrase",
                    )),
                    None => Err(Self::rpc_error(method, params, "unknown account")),
                }
            }
            "eth_getBalance" => {
                let address = parse_address(&params[0]);
                let balance = state.balances.get(&address).copied().unwrap_or_default();
                Ok(json!(quantity::u256_to_quantity(&balance)))
            }
            "eth_getTransactionCount" => {
                let address = parse_address(&params[0]);
                let nonce = state.nonces.get(&address).copied().unwrap_or_default();
                Ok(json!(quantity::u64_to_quantity(nonce)))
            }
            "eth_getCode" => {
                let address = parse_address(&params[0]);
                let code = state
                    .contracts
                    .get(&address)
                    .map(|c| c.code.clone())
                    .unwrap_or_default();
                Ok(json!(quantity::bytes_to_hex(&code)))
            }
            "eth_sendTransaction" => self.send(&mut state, method, params),
            "eth_call" => {
                let to = parse_address(&params[0]["to"]);
                let data = parse_data(&params[0]["data"]);
                let contract = state.contracts.get(&to);
                match contract {
                    Some(c) if data.starts_with(&function_selector("getBuffer()")) => {
                        let mut word = [0u8; 32];
                        c.buffer.to_big_endian(&mut word);
                        Ok(json!(quantity::bytes_to_hex(&word)))
                    }
                    _ => Ok(json!("0x")),
                }
            }
            "eth_getTransactionReceipt" => {
                let hash: H256 = params[0].as_str().unwrap_or_default().parse().map_err(|_| {
                    Self::rpc_error(method, params, "invalid hash")
                })?;
                let delay = state.receipt_delay;
                let polls = state.receipt_polls.entry(hash).or_default();
                if *polls < delay {
                    *polls += 1;
                    return Ok(Value::Null);
                }
                Ok(state.receipts.get(&hash).cloned().unwrap_or(Value::Null))
            }
            "eth_getLogs" => {
                let filter = &params[0];
                let from = quantity::parse_u64(filter["fromBlock"].as_str().unwrap_or("0x0"))
                    .unwrap_or_default();
                let to = quantity::parse_u64(filter["toBlock"].as_str().unwrap_or("0x0"))
                    .unwrap_or(u64::MAX);
                let address = filter.get("address").and_then(Value::as_str);
                let topic0 = filter["topics"][0][0].as_str();
                let logs: Vec<Value> = state
                    .logs
                    .iter()
                    .filter(|log| {
                        let block = quantity::parse_u64(log["blockNumber"].as_str().unwrap_or("0x0"))
                            .unwrap_or_default();
                        block >= from
                            && block <= to
                            && address.map_or(true, |a| log["address"] == a)
                            && topic0.map_or(true, |t| log["topics"][0] == t)
                    })
                    .cloned()
                    .collect();
                Ok(Value::Array(logs))
            }
            _ => Err(ClientError::rpc(method, params, -32601, "method not found", None)),
        }
    }

    fn send(&self, state: &mut DevState, method: &str, params: &[Value]) -> Result<Value> {
        let tx = &params[0];
        let from = parse_address(&tx["from"]);
        match state.wallets.get(&from) {
            Some(wallet) if wallet.unlocked => {}
            _ => {
                return Err(Self::rpc_error(
                    method,
                    params,
                    "authentication needed: password or unlock",
                ))
            }
        }

        let expected = state.nonces.get(&from).copied().unwrap_or_default();
        let nonce = tx["nonce"]
            .as_str()
            .map(|n| quantity::parse_u64(n).unwrap_or_default())
            .unwrap_or(expected);
        if nonce != expected {
            return Err(Self::rpc_error(
                method,
                params,
                &format!("invalid nonce: expected {}, got {}", expected, nonce),
            ));
        }

        let value = tx["value"]
            .as_str()
            .map(|v| quantity::parse_u256(v).unwrap_or_default())
            .unwrap_or_default();
        let balance = state.balances.get(&from).copied().unwrap_or_default();
        if balance < value {
            return Err(Self::rpc_error(method, params, "insufficient funds for transfer"));
        }

        let mut preimage = from.as_bytes().to_vec();
        preimage.extend(nonce.to_be_bytes());
        let hash = keccak256(&preimage);

        state.nonces.insert(from, nonce + 1);
        state.sent_nonces.push((from, nonce));
        state.block += 1;
        let block = state.block;

        let data = parse_data(&tx["data"]);
        let reverted = std::mem::take(&mut state.revert_next);
        let mut contract_address = Value::Null;
        let mut logs = Vec::new();

        if !reverted {
            *state.balances.entry(from).or_default() -= value;
            match tx.get("to").and_then(Value::as_str) {
                None => {
                    let created = Address::from_word(hash.as_bytes());
                    state.contracts.insert(
                        created,
                        Contract {
                            code: data.clone(),
                            buffer: U256::zero(),
                        },
                    );
                    contract_address = json!(created.to_hex());
                }
                Some(to) => {
                    let to: Address = to.parse().expect("valid to address");
                    *state.balances.entry(to).or_default() += value;
                    let selector = function_selector("setBuffer(uint256)");
                    if let Some(contract) = state.contracts.get_mut(&to) {
                        if data.len() >= 36 && data[..4] == selector {
                            contract.buffer = U256::from_big_endian(&data[4..36]);
                            let mut who = [0u8; 32];
                            who[12..].copy_from_slice(from.as_bytes());
                            logs.push(json!({
                                "address": to.to_hex(),
                                "topics": [
                                    event_topic(BUFFER_SET).to_hex(),
                                    H256::from_bytes(who).to_hex(),
                                ],
                                "data": quantity::bytes_to_hex(&data[4..36]),
                                "blockNumber": quantity::u64_to_quantity(block),
                                "logIndex": "0x0",
                                "transactionHash": hash.to_hex(),
                            }));
                        }
                    }
                }
            }
        }

        state.logs.extend(logs.iter().cloned());
        state.receipts.insert(
            hash,
            json!({
                "transactionHash": hash.to_hex(),
                "blockNumber": quantity::u64_to_quantity(block),
                "from": from.to_hex(),
                "to": tx.get("to").cloned().unwrap_or(Value::Null),
                "contractAddress": contract_address,
                "gasUsed": "0x5208",
                "status": if reverted { "0x0" } else { "0x1" },
                "logs": logs,
            }),
        );
        Ok(json!(hash.to_hex()))
    }
}

fn parse_address(value: &Value) -> Address {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .unwrap_or(Address::ZERO)
}

fn parse_data(value: &Value) -> Vec<u8> {
    value
        .as_str()
        .and_then(|s| quantity::parse_bytes(s).ok())
        .unwrap_or_default()
}

#[async_trait]
impl Transport for DevNode {
    async fn request_json(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        // let other tasks interleave between requests
        tokio::task::yield_now().await;
        self.handle(method, &params)
    }
}
