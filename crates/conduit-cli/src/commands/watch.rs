//! Event watching

use std::time::Duration;

use clap::Args;
use conduit_client::{ContractBinder, DecodedEvent, EventWatcher, LogFilter};
use conduit_primitives::quantity;
use serde_json::{json, Value};

use super::contract::ArtifactArgs;
use super::{client, load_artifact, parse_address};
use crate::{config::Config, CliError};

/// `watch`
#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Contract address
    pub address: String,
    #[command(flatten)]
    pub source: ArtifactArgs,
    /// Event name; every event of the contract when omitted
    #[arg(short, long)]
    pub event: Option<String>,
    /// First block to scan; the latest block when omitted
    #[arg(long)]
    pub from_block: Option<u64>,
    /// Exit after this many events
    #[arg(long)]
    pub count: Option<usize>,
    /// Poll interval in milliseconds; the configured interval when omitted
    #[arg(long)]
    pub interval_ms: Option<u64>,
}

fn event_json(event: &DecodedEvent) -> Value {
    let params: serde_json::Map<String, Value> = event
        .params
        .iter()
        .map(|(name, token)| (name.clone(), token.to_json()))
        .collect();
    json!({
        "event": event.name,
        "address": event.address.to_hex(),
        "block_number": event.block_number,
        "log_index": event.log_index,
        "transaction_hash": event.transaction_hash.map(|h| h.to_hex()),
        "params": params,
        "raw": event.is_raw(),
        "data": quantity::bytes_to_hex(&event.log.data),
    })
}

fn event_line(event: &DecodedEvent) -> String {
    let params: Vec<String> = event
        .params
        .iter()
        .map(|(name, token)| format!("{}={}", name, token.to_json()))
        .collect();
    let (block, index) = event.position();
    if event.is_raw() {
        return format!(
            "[{}:{}] undecoded data={}",
            block,
            index,
            quantity::bytes_to_hex(&event.log.data)
        );
    }
    format!("[{}:{}] {}({})", block, index, event.name, params.join(", "))
}

impl WatchArgs {
    pub async fn execute(self, config: &Config, json: bool) -> Result<(), CliError> {
        let address = parse_address(&self.address)?;
        let artifact = load_artifact(&self.source.artifact, self.source.contract.as_deref())?;
        let client = client(config)?;
        let handle = ContractBinder::new(client.clone()).attach_artifact(address, &artifact)?;

        let mut filter = match &self.event {
            Some(name) => handle.event_filter(name)?,
            None => LogFilter::new()
                .address(address)
                .events(handle.abi().events.clone()),
        };
        if let Some(block) = self.from_block {
            filter = filter.from_block(block);
        }

        let mut watcher = EventWatcher::new(client, filter);
        if let Some(ms) = self.interval_ms {
            watcher = watcher.with_interval(Duration::from_millis(ms));
        }
        let mut events = watcher.subscribe()?;

        let mut seen = 0usize;
        loop {
            tokio::select! {
                event = events.recv() => {
                    let Some(event) = event else { break };
                    if json {
                        println!("{}", event_json(&event));
                    } else {
                        println!("{}", event_line(&event));
                    }
                    seen += 1;
                    if self.count.is_some_and(|count| seen >= count) {
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        watcher.stop().await?;
        Ok(())
    }
}
