#![allow(dead_code)]
//! Shared test harness: an in-process WebSocket server with scripted
//! replies, plus envelope builders and polling helpers.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use scene_link::RequestEnvelope;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::protocol::Message;

/// Decides which raw frames to send back for each received envelope.
pub type Responder = Arc<dyn Fn(&RequestEnvelope) -> Vec<String> + Send + Sync>;

/// Scripted WebSocket server bound to an ephemeral local port.
///
/// Every received text frame is decoded as a [`RequestEnvelope`], recorded
/// on the `received` channel, and answered with whatever the responder
/// returns.
pub struct MockServer {
    pub url: String,
    connections: Arc<AtomicUsize>,
    received: mpsc::UnboundedReceiver<RequestEnvelope>,
}

impl MockServer {
    /// Serve connections, replying per `responder`.
    pub async fn spawn(responder: Responder) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        Self::spawn_inner(listener, responder, false).await
    }

    /// Serve connections on an already-bound listener.
    pub async fn spawn_on(listener: TcpListener, responder: Responder) -> Self {
        Self::spawn_inner(listener, responder, false).await
    }

    /// Serve connections that are closed right after the handshake.
    pub async fn spawn_closing() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        Self::spawn_inner(listener, Arc::new(|_| Vec::new()), true).await
    }

    async fn spawn_inner(
        listener: TcpListener,
        responder: Responder,
        close_after_accept: bool,
    ) -> Self {
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        let connections = Arc::new(AtomicUsize::new(0));

        let conn_counter = connections.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                conn_counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(handle_connection(
                    stream,
                    responder.clone(),
                    tx.clone(),
                    close_after_accept,
                ));
            }
        });

        Self {
            url: format!("ws://{}", addr),
            connections,
            received: rx,
        }
    }

    /// How many WebSocket connections have been accepted so far.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Next received envelope, panicking after `timeout`.
    pub async fn expect_request(&mut self, timeout: Duration) -> RequestEnvelope {
        tokio::time::timeout(timeout, self.received.recv())
            .await
            .expect("timed out waiting for a request")
            .expect("server channel closed")
    }

    /// Assert that nothing arrives within `window`.
    pub async fn expect_silence(&mut self, window: Duration) {
        if let Ok(Some(envelope)) = tokio::time::timeout(window, self.received.recv()).await {
            panic!("unexpected request: command {}", envelope.command);
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    responder: Responder,
    tx: mpsc::UnboundedSender<RequestEnvelope>,
    close_after_accept: bool,
) {
    let Ok(mut ws) = accept_async(stream).await else {
        return;
    };
    if close_after_accept {
        let _ = ws.close(None).await;
        return;
    }

    while let Some(Ok(message)) = ws.next().await {
        match message {
            Message::Text(text) => {
                let Ok(envelope) = serde_json::from_str::<RequestEnvelope>(&text) else {
                    continue;
                };
                let replies = responder(&envelope);
                let _ = tx.send(envelope);
                for reply in replies {
                    if ws.send(Message::Text(reply.into())).await.is_err() {
                        return;
                    }
                }
            }
            Message::Ping(payload) => {
                let _ = ws.send(Message::Pong(payload)).await;
            }
            Message::Close(_) => return,
            _ => {}
        }
    }
}

// ── Reply builders ──────────────────────────────────────────────────────────

pub fn login_success(token: &str, player_id: &str) -> String {
    json!({
        "requestId": 0,
        "type": 2,
        "command": 1,
        "code": 0,
        "message": "",
        "data": {
            "token": token,
            "player": { "playerId": player_id, "charater": "amber" }
        }
    })
    .to_string()
}

pub fn login_failure(code: i32) -> String {
    json!({
        "requestId": 0,
        "type": 2,
        "command": 1,
        "code": code,
        "message": "login denied",
        "data": null
    })
    .to_string()
}

pub fn heartbeat_reply() -> String {
    json!({ "requestId": 0, "type": 2, "command": 6, "code": 0, "message": "", "data": null })
        .to_string()
}

pub fn reply_envelope(command: u16, data: Value) -> String {
    json!({
        "requestId": 0,
        "type": 2,
        "command": command,
        "code": 0,
        "message": "",
        "data": data
    })
    .to_string()
}

// ── Helpers ─────────────────────────────────────────────────────────────────

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Poll `predicate` every 10ms until it holds, panicking after `timeout`.
pub async fn wait_until(what: &str, timeout: Duration, mut predicate: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + timeout;
    while !predicate() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn wait_for_open(client: &scene_link::SceneLinkClient) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !client.is_connection_open() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for the connection to open");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
