//! Event watcher against the dev node

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{debit_artifact, DevNode};
use conduit_client::abi::Token;
use conduit_client::{
    AccountManager, Client, ClientConfig, ContractBinder, ContractHandle, DecodedEvent,
    EventWatcher, WatcherState, U256,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

async fn deployed() -> (DevNode, Client, ContractHandle) {
    let node = DevNode::new();
    let config = ClientConfig {
        poll_interval_ms: 5,
        ..ClientConfig::default()
    };
    let client = Client::with_transport(Arc::new(node.clone()), config);
    let coinbase = AccountManager::new(client.clone()).coinbase().await.unwrap();
    let debit = ContractBinder::new(client.clone())
        .deploy(&debit_artifact(), &[], &coinbase.address, None)
        .await
        .unwrap();
    (node, client, debit)
}

async fn set(debit: &ContractHandle, value: u64) {
    debit
        .send_and_wait("setBuffer", &[Token::Uint(U256::from(value))])
        .await
        .unwrap();
}

async fn next(rx: &mut UnboundedReceiver<DecodedEvent>) -> DecodedEvent {
    timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("event within two seconds")
        .expect("watcher still running")
}

fn value_of(event: &DecodedEvent) -> U256 {
    event.param("value").and_then(Token::as_uint).unwrap()
}

#[tokio::test]
async fn test_events_arrive_in_chain_order() {
    let (node, client, debit) = deployed().await;
    let filter = debit
        .event_filter("BufferSet")
        .unwrap()
        .from_block(node.block_number() + 1);
    let mut watcher = EventWatcher::new(client.clone(), filter);
    let mut rx = watcher.subscribe().unwrap();
    assert_eq!(watcher.state(), WatcherState::Polling);

    for value in [1, 2, 3] {
        set(&debit, value).await;
    }

    let mut seen = Vec::new();
    for _ in 0..3 {
        let event = next(&mut rx).await;
        assert_eq!(event.name, "BufferSet");
        assert_eq!(event.address, debit.address());
        assert_eq!(
            event.param("who").and_then(Token::as_address),
            debit.sender()
        );
        seen.push((event.position(), value_of(&event)));
    }
    assert!(seen.windows(2).all(|pair| pair[0].0 < pair[1].0));
    let values: Vec<U256> = seen.into_iter().map(|(_, value)| value).collect();
    assert_eq!(values, vec![U256::from(1), U256::from(2), U256::from(3)]);

    watcher.stop().await.unwrap();
    assert_eq!(watcher.state(), WatcherState::Idle);
}

#[tokio::test]
async fn test_restart_resumes_without_redelivery() {
    let (node, client, debit) = deployed().await;
    let filter = debit
        .event_filter("BufferSet")
        .unwrap()
        .from_block(node.block_number() + 1);
    let mut watcher = EventWatcher::new(client.clone(), filter);

    let mut rx = watcher.subscribe().unwrap();
    set(&debit, 10).await;
    assert_eq!(value_of(&next(&mut rx).await), U256::from(10));
    watcher.stop().await.unwrap();
    let resumed_at = watcher.cursor().unwrap();

    // emitted while nobody is watching
    set(&debit, 11).await;
    assert!(node.block_number() >= resumed_at);

    let mut rx = watcher.subscribe().unwrap();
    set(&debit, 12).await;
    assert_eq!(value_of(&next(&mut rx).await), U256::from(11));
    assert_eq!(value_of(&next(&mut rx).await), U256::from(12));
    watcher.stop().await.unwrap();

    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_poll_once_only_while_idle() {
    let (node, client, debit) = deployed().await;
    let filter = debit
        .event_filter("BufferSet")
        .unwrap()
        .from_block(node.block_number());
    let mut watcher = EventWatcher::new(client, filter);

    set(&debit, 7).await;
    let found = watcher.poll_once().await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(value_of(&found[0]), U256::from(7));
    assert!(watcher.poll_once().await.unwrap().is_empty());

    let _rx = watcher.subscribe().unwrap();
    assert!(watcher.poll_once().await.is_err());
    assert!(watcher.subscribe().is_err());
    watcher.stop().await.unwrap();
    assert!(watcher.stop().await.is_err());
}
