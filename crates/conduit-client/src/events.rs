//! Event watching
//!
//! An [`EventWatcher`] polls `eth_getLogs` for one [`LogFilter`]. Each tick
//! fetches logs from the cursor up to the latest block, delivers them in
//! `(blockNumber, logIndex)` order and then moves the cursor past them. The
//! cursor survives stop and restart, so nothing is delivered twice. Logs
//! later dropped by a reorganization are not retracted.

use std::sync::Arc;
use std::time::Duration;

use conduit_primitives::{Address, H256};
use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::abi::{decode, encode_topic, EventDescriptor, ParamType, Token};
use crate::client::Client;
use crate::error::{ClientError, Result};
use crate::types::{BlockId, Log, LogQuery};

/// Which logs to watch and how to decode them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogFilter {
    addresses: Vec<Address>,
    topics: Vec<Option<Vec<H256>>>,
    events: Vec<EventDescriptor>,
    from_block: Option<u64>,
}

impl LogFilter {
    /// Matches every log
    pub fn new() -> Self {
        Self::default()
    }

    /// Only logs from `address`; may be given more than once
    pub fn address(mut self, address: Address) -> Self {
        if !self.addresses.contains(&address) {
            self.addresses.push(address);
        }
        self
    }

    /// Only `event`, decoded against its descriptor
    pub fn event(mut self, event: EventDescriptor) -> Self {
        if !event.anonymous {
            self.set_topic(0, vec![event.topic()]);
        }
        self.events = vec![event];
        self
    }

    /// Any of `events`, each decoded against its own descriptor
    ///
    /// topic0 is only constrained when none of them is anonymous.
    pub fn events(mut self, events: Vec<EventDescriptor>) -> Self {
        if !events.is_empty() && events.iter().all(|e| !e.anonymous) {
            self.set_topic(0, events.iter().map(EventDescriptor::topic).collect());
        }
        self.events = events;
        self
    }

    /// Require topic `position` to be one of `values`
    pub fn topic(mut self, position: usize, values: Vec<H256>) -> Self {
        self.set_topic(position, values);
        self
    }

    /// Require the indexed argument `name` to equal `value`
    pub fn indexed(self, name: &str, value: &Token) -> Result<Self> {
        let event = self
            .events
            .first()
            .ok_or_else(|| ClientError::UnknownFunction("no event set on filter".into()))?;
        let offset = usize::from(!event.anonymous);
        let (position, param) = event
            .inputs
            .iter()
            .filter(|p| p.indexed)
            .enumerate()
            .find(|(_, p)| p.name == name)
            .ok_or_else(|| {
                ClientError::UnknownFunction(format!("{} has no indexed argument {}", event.name, name))
            })?;
        let topic = encode_topic(&param.kind, value)?;
        Ok(self.topic(position + offset, vec![topic]))
    }

    /// First block to scan; defaults to the latest block at the first tick
    pub fn from_block(mut self, block: u64) -> Self {
        self.from_block = Some(block);
        self
    }

    fn set_topic(&mut self, position: usize, values: Vec<H256>) {
        if self.topics.len() <= position {
            self.topics.resize(position + 1, None);
        }
        self.topics[position] = Some(values);
    }

    /// `eth_getLogs` filter for the inclusive range `from..=to`
    pub fn to_query(&self, from: u64, to: u64) -> LogQuery {
        LogQuery {
            from_block: BlockId::Number(from),
            to_block: BlockId::Number(to),
            addresses: self.addresses.clone(),
            topics: self.topics.clone(),
        }
    }

    /// Decode `log` against the filter's event
    ///
    /// A filter without an event yields undecoded events with an empty name.
    pub fn decode(&self, log: &Log) -> Result<DecodedEvent> {
        match self.events.as_slice() {
            [] => Ok(DecodedEvent::raw(log)),
            events => {
                let event = events
                    .iter()
                    .find(|e| e.anonymous || log.topics.first() == Some(&e.topic()))
                    .ok_or_else(|| ClientError::AbiDecode("log matches no watched event".into()))?;
                decode_log(event, log)
            }
        }
    }
}

/// A log decoded against its event ABI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    /// Event name
    pub name: String,
    /// Emitting contract
    pub address: Address,
    /// Block number
    pub block_number: u64,
    /// Position within the block
    pub log_index: u64,
    /// Producing transaction
    pub transaction_hash: Option<H256>,
    /// Arguments in declaration order
    pub params: Vec<(String, Token)>,
    /// The log as received
    pub log: Log,
}

impl DecodedEvent {
    fn raw(log: &Log) -> Self {
        let (block_number, log_index) = log.position();
        Self {
            name: String::new(),
            address: log.address,
            block_number,
            log_index,
            transaction_hash: log.transaction_hash,
            params: Vec::new(),
            log: log.clone(),
        }
    }

    /// Whether the log was handed over without decoding
    ///
    /// Happens when the filter names no events, or when a log matching the
    /// filter does not decode against its ABI.
    pub fn is_raw(&self) -> bool {
        self.name.is_empty()
    }

    /// Argument by name
    pub fn param(&self, name: &str) -> Option<&Token> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, t)| t)
    }

    /// (blockNumber, logIndex)
    pub fn position(&self) -> (u64, u64) {
        (self.block_number, self.log_index)
    }
}

/// Decode `log` as `event`
///
/// Indexed arguments come from topics; dynamic indexed arguments are only
/// available as their 32-byte hash and are returned as `bytes32`.
pub fn decode_log(event: &EventDescriptor, log: &Log) -> Result<DecodedEvent> {
    let mut topics = log.topics.iter();
    if !event.anonymous {
        let topic0 = topics
            .next()
            .ok_or_else(|| ClientError::AbiDecode("log has no topics".into()))?;
        if *topic0 != event.topic() {
            return Err(ClientError::AbiDecode(format!(
                "log topic {} is not {}",
                topic0,
                event.signature()
            )));
        }
    }

    let data_types: Vec<ParamType> = event
        .inputs
        .iter()
        .filter(|p| !p.indexed)
        .map(|p| p.kind.clone())
        .collect();
    let mut data = decode(&data_types, &log.data)?.into_iter();

    let mut params = Vec::with_capacity(event.inputs.len());
    for param in &event.inputs {
        let token = if param.indexed {
            let topic = topics.next().ok_or_else(|| {
                ClientError::AbiDecode(format!("missing topic for {}", param.name))
            })?;
            if param.kind.is_dynamic() {
                Token::FixedBytes(topic.as_bytes().to_vec())
            } else {
                decode(std::slice::from_ref(&param.kind), topic.as_bytes())?
                    .pop()
                    .ok_or_else(|| ClientError::AbiDecode("empty topic".into()))?
            }
        } else {
            data.next()
                .ok_or_else(|| ClientError::AbiDecode(format!("missing data for {}", param.name)))?
        };
        params.push((param.name.clone(), token));
    }

    let mut decoded = DecodedEvent::raw(log);
    decoded.name = event.name.clone();
    decoded.params = params;
    Ok(decoded)
}

/// Watcher lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    /// Not polling
    Idle,
    /// A poll loop is running
    Polling,
}

#[derive(Debug, Clone, Copy, Default)]
struct Cursor {
    /// Next block to scan; `None` until the first tick
    next_block: Option<u64>,
    /// Last delivered position
    delivered: Option<(u64, u64)>,
}

struct RunningPoll {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Polls the node for logs matching one filter
pub struct EventWatcher {
    client: Client,
    filter: Arc<LogFilter>,
    interval: Duration,
    cursor: Arc<Mutex<Cursor>>,
    running: Option<RunningPoll>,
}

impl std::fmt::Debug for EventWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventWatcher")
            .field("filter", &self.filter)
            .field("interval", &self.interval)
            .field("state", &self.state())
            .finish()
    }
}

impl EventWatcher {
    /// Idle watcher polling at the client's configured interval
    pub fn new(client: Client, filter: LogFilter) -> Self {
        let interval = client.config().poll_interval();
        let cursor = Cursor {
            next_block: filter.from_block,
            delivered: None,
        };
        Self {
            client,
            filter: Arc::new(filter),
            interval,
            cursor: Arc::new(Mutex::new(cursor)),
            running: None,
        }
    }

    /// Poll every `interval` instead
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Current state
    pub fn state(&self) -> WatcherState {
        match &self.running {
            Some(running) if !running.task.is_finished() => WatcherState::Polling,
            _ => WatcherState::Idle,
        }
    }

    /// Next block the watcher will scan
    pub fn cursor(&self) -> Option<u64> {
        self.cursor.lock().next_block
    }

    /// Run one tick now and return what it found
    ///
    /// Only allowed while idle, so ticks never overlap.
    pub async fn poll_once(&self) -> Result<Vec<DecodedEvent>> {
        if self.state() == WatcherState::Polling {
            return Err(ClientError::WatcherState(
                "poll_once while the watcher is polling".into(),
            ));
        }
        let mut found = Vec::new();
        tick(&self.client, &self.filter, &self.cursor, |e| found.push(e)).await?;
        Ok(found)
    }

    /// Start polling, handing every event to `on_event` in order
    pub fn start<F>(&mut self, mut on_event: F) -> Result<()>
    where
        F: FnMut(DecodedEvent) + Send + 'static,
    {
        if self.state() == WatcherState::Polling {
            return Err(ClientError::WatcherState("watcher is already polling".into()));
        }

        let (stop, mut stopped) = watch::channel(false);
        let client = self.client.clone();
        let filter = self.filter.clone();
        let cursor = self.cursor.clone();
        let interval = self.interval;

        let task = tokio::spawn(async move {
            loop {
                if let Err(e) = tick(&client, &filter, &cursor, &mut on_event).await {
                    tracing::warn!(error = %e, "event poll failed");
                }
                tokio::select! {
                    biased;
                    _ = stopped.changed() => break,
                    _ = tokio::time::sleep(interval) => {}
                }
                if *stopped.borrow() {
                    break;
                }
            }
        });

        tracing::info!(interval_ms = interval.as_millis() as u64, "event watcher started");
        self.running = Some(RunningPoll { stop, task });
        Ok(())
    }

    /// Start polling into a channel
    pub fn subscribe(&mut self) -> Result<mpsc::UnboundedReceiver<DecodedEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.start(move |event| {
            // a dropped receiver just discards events until stop
            let _ = tx.send(event);
        })?;
        Ok(rx)
    }

    /// Stop polling
    ///
    /// A tick in progress completes, including delivery, before this returns.
    pub async fn stop(&mut self) -> Result<()> {
        let running = self
            .running
            .take()
            .ok_or_else(|| ClientError::WatcherState("watcher is not polling".into()))?;
        let _ = running.stop.send(true);
        if let Err(e) = running.task.await {
            tracing::warn!(error = %e, "event watcher task ended abnormally");
        }
        tracing::info!(cursor = ?self.cursor(), "event watcher stopped");
        Ok(())
    }
}

impl Drop for EventWatcher {
    fn drop(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.stop.send(true);
        }
    }
}

/// One poll: fetch, order, decode, deliver, commit
async fn tick<F>(
    client: &Client,
    filter: &LogFilter,
    cursor: &Mutex<Cursor>,
    mut deliver: F,
) -> Result<()>
where
    F: FnMut(DecodedEvent),
{
    let latest = client.block_number().await?;
    let start = {
        let mut pinned = cursor.lock();
        // the first tick pins the start block so a failed fetch resumes here
        pinned.next_block.get_or_insert(latest);
        *pinned
    };
    let from = start.next_block.unwrap_or(latest);
    if from > latest {
        return Ok(());
    }

    let mut logs = client.get_logs(&filter.to_query(from, latest)).await?;
    logs.retain(|log| !log.removed);
    logs.sort_by(|a, b| a.cmp_position(b));

    let mut delivered = start.delivered;
    let mut events = Vec::with_capacity(logs.len());
    for log in &logs {
        let position = log.position();
        if delivered.is_some_and(|last| position <= last) {
            continue;
        }
        match filter.decode(log) {
            Ok(event) => events.push(event),
            Err(e) => {
                tracing::warn!(block = position.0, index = position.1, error = %e, "undecodable log");
                events.push(DecodedEvent::raw(log));
            }
        }
        delivered = Some(position);
    }

    for event in events {
        deliver(event);
    }

    let mut committed = cursor.lock();
    committed.next_block = Some(latest + 1);
    committed.delivered = delivered;
    Ok(())
}
