//! End-to-end tests for price sync between two nodes on localhost.

use price_sync::catalog::parse_timestamp;
use price_sync::{
    CatalogStore, ItemRecord, PricingEngine, PushOutcome, Role, SyncAgent, SyncConfig,
};
use std::sync::Arc;
use std::time::Duration;

fn store() -> Arc<CatalogStore> {
    Arc::new(CatalogStore::in_memory(vec![
        ("A".to_string(), ItemRecord::new("Apples", 10.0)),
        ("B".to_string(), ItemRecord::new("Bread", 2.5)),
    ]))
}

fn unused_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

fn local_config(role: Role, listen_port: u16, peer_port: u16) -> SyncConfig {
    SyncConfig {
        role,
        bind_host: "127.0.0.1".to_string(),
        listen_port,
        peer_host: "127.0.0.1".to_string(),
        peer_port,
    }
}

async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..150 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}

/// Start a connected pair: (server, client)
async fn start_pair(
    server_store: &Arc<CatalogStore>,
    client_store: &Arc<CatalogStore>,
) -> (SyncAgent, SyncAgent) {
    let server_port = unused_port();
    let client = SyncAgent::start(
        local_config(Role::Client, 0, server_port),
        Arc::clone(client_store),
    )
    .await
    .unwrap();
    let server = SyncAgent::start(
        local_config(Role::Server, server_port, client.local_addr().port()),
        Arc::clone(server_store),
    )
    .await
    .unwrap();
    (server, client)
}

#[tokio::test]
async fn purchase_on_one_node_reaches_the_peer() {
    let server_store = store();
    let client_store = store();
    let (server, client) = start_pair(&server_store, &client_store).await;

    let now = parse_timestamp("2026-02-01 12:00:00").unwrap();
    PricingEngine::new(Arc::clone(&server_store)).process_at(&["A"; 5], now);

    assert_eq!(server.push(now).await.unwrap(), PushOutcome::Sent(1));
    assert!(eventually(|| client_store.get("A").unwrap().current_price == 10.07).await);

    // Merged prices are not stamped, so nothing echoes back
    let merged = client_store.get("A").unwrap();
    assert!(merged.last_updated.is_none());
    assert_eq!(client.push(now).await.unwrap(), PushOutcome::NothingToSend);

    // A duplicate delivery changes nothing
    assert_eq!(server.push(now).await.unwrap(), PushOutcome::Sent(1));
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(client_store.get("A").unwrap(), merged);

    server.shutdown().await;
    client.shutdown().await;
}

#[tokio::test]
async fn higher_price_wins_in_both_directions() {
    let server_store = store();
    let client_store = store();
    let (server, client) = start_pair(&server_store, &client_store).await;

    let now = parse_timestamp("2026-02-01 12:00:00").unwrap();
    PricingEngine::new(Arc::clone(&server_store)).process_at(&["A"; 5], now);
    PricingEngine::new(Arc::clone(&client_store)).process_at(&["A"; 10], now);

    server.push_all().await.unwrap();
    client.push_all().await.unwrap();

    let expected = client_store.get("A").unwrap().current_price;
    assert!(expected > 10.07);
    assert!(eventually(|| server_store.get("A").unwrap().current_price == expected).await);
    assert_eq!(client_store.get("A").unwrap().current_price, expected);
    assert_eq!(server_store.get("B").unwrap().current_price, 2.5);

    server.shutdown().await;
    client.shutdown().await;
}

#[tokio::test]
async fn node_keeps_running_when_peer_goes_away() {
    let server_store = store();
    let client_store = store();
    let (server, client) = start_pair(&server_store, &client_store).await;
    client.shutdown().await;

    let now = parse_timestamp("2026-02-01 12:00:00").unwrap();
    PricingEngine::new(Arc::clone(&server_store)).process_at(&["A"; 5], now);

    // The first write may still land in the closed socket's buffer; a later one fails
    let mut failed = false;
    for _ in 0..10 {
        if server.push(now).await.is_err() {
            failed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(failed);
    assert!(server.is_running());
    assert_eq!(server_store.get("A").unwrap().current_price, 10.07);

    server.shutdown().await;
}
