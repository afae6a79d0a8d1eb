//! Reconnection integration tests: linear backoff, the attempt cap, and
//! explicit recovery with `connect()`.

mod common;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use common::{MockServer, init_logging, wait_for_open, wait_until};
use scene_link::{ConnectionOptions, ConnectionStatus, EventHandlers, SceneLinkClient};
use tokio::net::TcpListener;

/// Reserve an ephemeral port with nothing listening on it.
async fn dead_endpoint() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("ws://{}", addr)
}

#[tokio::test]
async fn test_backoff_stops_at_attempt_cap() {
    init_logging();
    let url = dead_endpoint().await;

    let dial_failures = Arc::new(Mutex::new(Vec::new()));
    let handlers = {
        let dial_failures = dial_failures.clone();
        EventHandlers::new().on_error(move |error| {
            if error.recoverable {
                dial_failures.lock().unwrap().push(Instant::now());
            }
        })
    };

    let client = SceneLinkClient::builder()
        .url(&url)
        .options(
            ConnectionOptions::new()
                .with_reconnect_base_delay_ms(40)
                .with_max_reconnect_attempts(3),
        )
        .event_handlers(handlers)
        .build()
        .unwrap();

    // 1 initial dial + 3 scheduled retries, then nothing.
    wait_until("all dial attempts", Duration::from_secs(3), || {
        dial_failures.lock().unwrap().len() == 4
    })
    .await;
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(dial_failures.lock().unwrap().len(), 4);
    assert_eq!(client.connection_status(), ConnectionStatus::Disconnected);

    // Delays grow linearly: attempt n waits at least n * base.
    let failures = dial_failures.lock().unwrap();
    let gap1 = failures[1] - failures[0];
    let gap2 = failures[2] - failures[1];
    let gap3 = failures[3] - failures[2];
    assert!(gap1 >= Duration::from_millis(35), "gap1 = {:?}", gap1);
    assert!(gap2 >= Duration::from_millis(75), "gap2 = {:?}", gap2);
    assert!(gap3 >= Duration::from_millis(115), "gap3 = {:?}", gap3);
}

#[tokio::test]
async fn test_unexpected_close_schedules_reconnect() {
    init_logging();
    let server = MockServer::spawn_closing().await;

    let client = SceneLinkClient::builder()
        .url(&server.url)
        .options(ConnectionOptions::new().with_reconnect_base_delay_ms(20))
        .build()
        .unwrap();

    // The server slams the door after each handshake; each successful open
    // resets the attempt budget, so the client keeps coming back.
    wait_until("repeated reconnects", Duration::from_secs(3), || {
        server.connection_count() >= 3
    })
    .await;

    client.disconnect().await.unwrap();
    wait_until("disconnect to settle", Duration::from_secs(2), || {
        client.connection_status() == ConnectionStatus::Disconnected
    })
    .await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    let settled = server.connection_count();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(server.connection_count(), settled);
}

#[tokio::test]
async fn test_explicit_connect_restarts_after_give_up() {
    init_logging();
    // Nothing is listening yet; reserve the port first.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let url = format!("ws://{}", addr);

    let client = SceneLinkClient::builder()
        .url(&url)
        .options(
            ConnectionOptions::new()
                .with_reconnect_base_delay_ms(20)
                .with_max_reconnect_attempts(1),
        )
        .build()
        .unwrap();

    wait_until("give-up", Duration::from_secs(3), || {
        client.connection_status() == ConnectionStatus::Disconnected
    })
    .await;

    // Bring a real server up on the reserved port, then explicitly retry.
    let listener = TcpListener::bind(addr).await.unwrap();
    let server = MockServer::spawn_on(listener, Arc::new(|_| Vec::new())).await;

    client.connect().await.unwrap();
    wait_for_open(&client).await;
    assert_eq!(server.connection_count(), 1);

    // connect() while open is a no-op.
    client.connect().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.connection_count(), 1);
}

#[tokio::test]
async fn test_auto_reconnect_disabled_goes_straight_down() {
    init_logging();
    let server = MockServer::spawn_closing().await;

    let client = SceneLinkClient::builder()
        .url(&server.url)
        .options(ConnectionOptions::new().with_auto_reconnect(false))
        .build()
        .unwrap();

    wait_until("down without retries", Duration::from_secs(3), || {
        client.connection_status() == ConnectionStatus::Disconnected
    })
    .await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.connection_count(), 1);
}
