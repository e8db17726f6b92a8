//! Transport layer for JSON-RPC communication

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crate::error::{ClientError, Result};

/// Transport trait for RPC communication (object-safe)
///
/// Implementations may be called concurrently; each call is one
/// request/response exchange.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send an RPC request and get the JSON `result`
    async fn request_json(&self, method: &str, params: Vec<Value>) -> Result<Value>;
}

/// Helper to deserialize a `result` value
pub fn deserialize_response<T: serde::de::DeserializeOwned>(
    method: &str,
    value: Value,
) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| ClientError::Serialization(format!("{} result: {}", method, e)))
}

#[derive(Debug, Clone)]
enum MockReply {
    Result(Value),
    Error { code: i64, message: String },
    Disconnected,
}

impl MockReply {
    fn into_result(self, method: &str, params: &[Value]) -> Result<Value> {
        match self {
            MockReply::Result(value) => Ok(value),
            MockReply::Error { code, message } => {
                Err(ClientError::rpc(method, params, code, message, None))
            }
            MockReply::Disconnected => Err(ClientError::transport(method, "connection refused")),
        }
    }
}

/// Mock transport for testing
///
/// Replies come from, in order: queued replies for the method, a fixed reply
/// set with [`set_response`](Self::set_response), then built-in defaults.
/// Every request is recorded.
pub struct MockTransport {
    queued: Arc<Mutex<HashMap<String, VecDeque<MockReply>>>>,
    responses: Arc<Mutex<HashMap<String, MockReply>>>,
    default_responses: HashMap<String, Value>,
    requests: Arc<Mutex<Vec<(String, Vec<Value>)>>>,
}

impl MockTransport {
    /// Create a new mock transport
    pub fn new() -> Self {
        let mut defaults = HashMap::new();

        defaults.insert("eth_chainId".to_string(), Value::String("0x539".to_string())); // 1337
        defaults.insert("eth_gasPrice".to_string(), Value::String("0x3b9aca00".to_string())); // 1 gwei
        defaults.insert("eth_blockNumber".to_string(), Value::String("0x100".to_string())); // Block 256
        defaults.insert("eth_getBalance".to_string(), Value::String("0xde0b6b3a7640000".to_string())); // 1 ETH
        defaults.insert("eth_getTransactionCount".to_string(), Value::String("0x0".to_string()));
        defaults.insert(
            "eth_sendTransaction".to_string(),
            Value::String(
                "0x88df016429689c079f3b2f6ad39fa052532c56795b733da78a91ebe6a713944b".to_string(),
            ),
        );
        defaults.insert("eth_call".to_string(), Value::String("0x".to_string()));
        defaults.insert("eth_getCode".to_string(), Value::String("0x".to_string()));
        defaults.insert("eth_getTransactionReceipt".to_string(), Value::Null);
        defaults.insert("eth_getLogs".to_string(), Value::Array(vec![]));
        defaults.insert("eth_accounts".to_string(), Value::Array(vec![]));
        defaults.insert("personal_listAccounts".to_string(), Value::Array(vec![]));
        defaults.insert(
            "eth_coinbase".to_string(),
            Value::String("0x0000000000000000000000000000000000000000".to_string()),
        );
        defaults.insert("personal_unlockAccount".to_string(), Value::Bool(true));
        defaults.insert(
            "web3_clientVersion".to_string(),
            Value::String("MockNode/v0.0.0".to_string()),
        );

        Self {
            queued: Arc::new(Mutex::new(HashMap::new())),
            responses: Arc::new(Mutex::new(HashMap::new())),
            default_responses: defaults,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Set a fixed reply for a method
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned (only possible if another thread panicked while holding the lock).
    pub fn set_response(&self, method: &str, response: Value) {
        self.responses
            .lock()
            .expect("MockTransport mutex poisoned")
            .insert(method.to_string(), MockReply::Result(response));
    }

    /// Make a method always answer with an error envelope
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn set_error(&self, method: &str, code: i64, message: &str) {
        self.responses
            .lock()
            .expect("MockTransport mutex poisoned")
            .insert(
                method.to_string(),
                MockReply::Error {
                    code,
                    message: message.to_string(),
                },
            );
    }

    /// Queue a one-shot reply; queued replies are consumed first, in order
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn push_response(&self, method: &str, response: Value) {
        self.push(method, MockReply::Result(response));
    }

    /// Queue a one-shot transport failure
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn push_disconnect(&self, method: &str) {
        self.push(method, MockReply::Disconnected);
    }

    fn push(&self, method: &str, reply: MockReply) {
        self.queued
            .lock()
            .expect("MockTransport mutex poisoned")
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
    }

    /// Every request received so far, in arrival order
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn requests(&self) -> Vec<(String, Vec<Value>)> {
        self.requests
            .lock()
            .expect("MockTransport mutex poisoned")
            .clone()
    }

    /// Params of every request made to `method`
    pub fn requests_for(&self, method: &str) -> Vec<Vec<Value>> {
        self.requests()
            .into_iter()
            .filter(|(m, _)| m == method)
            .map(|(_, params)| params)
            .collect()
    }

    /// Number of requests made to `method`
    pub fn request_count(&self, method: &str) -> usize {
        self.requests_for(method).len()
    }

    /// Clear custom and queued responses
    ///
    /// # Panics
    ///
    /// Panics if the mutex is poisoned.
    pub fn clear_responses(&self) {
        self.responses
            .lock()
            .expect("MockTransport mutex poisoned")
            .clear();
        self.queued
            .lock()
            .expect("MockTransport mutex poisoned")
            .clear();
    }
}

fn poisoned<E>(method: &str) -> impl FnOnce(E) -> ClientError + '_ {
    move |_| ClientError::transport(method, "MockTransport mutex poisoned")
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request_json(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        self.requests
            .lock()
            .map_err(poisoned(method))?
            .push((method.to_string(), params.clone()));

        let queued = self
            .queued
            .lock()
            .map_err(poisoned(method))?
            .get_mut(method)
            .and_then(|q| q.pop_front());
        if let Some(reply) = queued {
            return reply.into_result(method, &params);
        }

        let custom = self.responses.lock().map_err(poisoned(method))?.get(method).cloned();
        if let Some(reply) = custom {
            return reply.into_result(method, &params);
        }

        if let Some(response) = self.default_responses.get(method) {
            return Ok(response.clone());
        }

        Err(ClientError::rpc(
            method,
            &params,
            -32601,
            format!("Method not found: {}", method),
            None,
        ))
    }
}

/// HTTP transport for real RPC communication
///
/// Holds one pooled `reqwest` client; dropping the transport closes the pool.
#[cfg(feature = "http")]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    request_id: std::sync::atomic::AtomicU64,
}

#[cfg(feature = "http")]
impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new(url: &str, timeout: std::time::Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::transport("<connect>", e.to_string()))?;
        Ok(Self {
            client,
            url: url.to_string(),
            request_id: std::sync::atomic::AtomicU64::new(1),
        })
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }

    fn next_id(&self) -> u64 {
        self.request_id
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl Transport for HttpTransport {
    async fn request_json(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let id = self.next_id();
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params: &params,
        };

        let started = std::time::Instant::now();
        tracing::debug!(method, id, "rpc request");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClientError::transport(method, describe_reqwest_error(&e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| ClientError::transport(method, describe_reqwest_error(&e)))?;

        tracing::debug!(
            method,
            id,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "rpc response"
        );

        decode_envelope(method, &params, id, &body).map_err(|e| match e {
            ClientError::Transport { method, message } if !status.is_success() => {
                ClientError::Transport {
                    method,
                    message: format!("HTTP {}: {}", status, message),
                }
            }
            other => other,
        })
    }
}

#[cfg(feature = "http")]
fn describe_reqwest_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("timed out: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    }
}

#[cfg(feature = "http")]
#[derive(serde::Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a [Value],
}

/// Decode a JSON-RPC response body and check it answers request `id`
///
/// A `null` result is a valid answer (e.g. a receipt that does not exist yet).
pub(crate) fn decode_envelope(
    method: &str,
    params: &[Value],
    id: u64,
    body: &[u8],
) -> Result<Value> {
    let envelope: Value = serde_json::from_slice(body)
        .map_err(|e| ClientError::transport(method, format!("malformed response: {}", e)))?;

    let mut object = match envelope {
        Value::Object(map) => map,
        other => {
            return Err(ClientError::transport(
                method,
                format!("response is not an object: {}", other),
            ))
        }
    };

    match object.get("id") {
        Some(Value::Number(n)) if n.as_u64() == Some(id) => {}
        Some(Value::String(s)) if s.parse::<u64>().ok() == Some(id) => {}
        other => {
            return Err(ClientError::transport(
                method,
                format!(
                    "response id {} does not match request id {}",
                    other.map(|v| v.to_string()).unwrap_or_else(|| "<missing>".into()),
                    id
                ),
            ))
        }
    }

    if let Some(error) = object.remove("error").filter(|e| !e.is_null()) {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or(-32603);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        let data = error.get("data").cloned();
        return Err(ClientError::rpc(method, params, code, message, data));
    }

    match object.remove("result") {
        Some(result) => Ok(result),
        None => Err(ClientError::transport(
            method,
            "response has neither result nor error",
        )),
    }
}
