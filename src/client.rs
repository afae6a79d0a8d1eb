//! Public client handle with builder pattern.
//!
//! [`SceneLinkClient`] is the single connection owner for a process: the
//! composition root constructs one and hands references to collaborators.
//! All methods are fire-and-forget: `send` returns as soon as the request
//! is handed to the connection task, which transmits it immediately,
//! queues it behind the auth gate, or (on overflow) drops it, without
//! feedback to the caller.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use url::Url;

use crate::command::Command;
use crate::connection::{ConnCmd, ConnectionStatus, SharedStatus, connection_task};
use crate::dispatch::HandlerId;
use crate::endpoint::Endpoint;
use crate::error::{Result, SceneLinkError};
use crate::event_handlers::EventHandlers;
use crate::models::{LoginRequest, ResponseEnvelope, TweetOperation};
use crate::options::ConnectionOptions;
use crate::session::{MemorySessionStore, SessionStore};

/// Capacity of the command channel to the connection task.
const COMMAND_CHANNEL_CAPACITY: usize = 256;

/// Client for the scene service.
///
/// Use [`SceneLinkClient::builder`] to construct instances.
///
/// # Example
///
/// ```rust,no_run
/// use scene_link::{Command, SceneLinkClient};
///
/// # async fn example() -> scene_link::Result<()> {
/// let client = SceneLinkClient::builder()
///     .url("ws://localhost:8081")
///     .build()?;
///
/// let feed_handler = client
///     .on(Command::GetSceneFeed, |envelope| {
///         println!("feed page: {}", envelope.data);
///     })
///     .await?;
///
/// client.get_scene_feed(1).await?;
/// client.off(Command::GetSceneFeed, feed_handler).await?;
/// # Ok(())
/// # }
/// ```
pub struct SceneLinkClient {
    cmd_tx: mpsc::Sender<ConnCmd>,
    shared: SharedStatus,
    next_handler_id: AtomicU64,
    _task: JoinHandle<()>,
}

impl SceneLinkClient {
    /// Create a new builder for configuring the client.
    pub fn builder() -> SceneLinkClientBuilder {
        SceneLinkClientBuilder::new()
    }

    /// Submit a command with a JSON payload.
    ///
    /// LOGIN is transmitted immediately; everything else transmits only on
    /// an authenticated connection and is otherwise queued. `Ok` means the
    /// request was accepted by the connection task, not that it reached
    /// the server.
    pub async fn send(&self, command: Command, payload: Value) -> Result<()> {
        self.command(ConnCmd::Send { command, payload }).await
    }

    /// Register `handler` for every inbound envelope with `command`.
    ///
    /// Returns a token for [`off`](Self::off). Registering the same
    /// closure twice creates two registrations, and both fire.
    pub async fn on(
        &self,
        command: Command,
        handler: impl Fn(&ResponseEnvelope) + Send + Sync + 'static,
    ) -> Result<HandlerId> {
        let id = HandlerId(self.next_handler_id.fetch_add(1, Ordering::Relaxed));
        self.command(ConnCmd::Register {
            command: command.code(),
            id,
            handler: Arc::new(handler),
        })
        .await?;
        Ok(id)
    }

    /// Remove a handler registration. No-op if already removed.
    pub async fn off(&self, command: Command, id: HandlerId) -> Result<()> {
        self.command(ConnCmd::Unregister {
            command: command.code(),
            id,
        })
        .await
    }

    /// Convenience: register a handler for the character-history feed.
    pub async fn subscribe(
        &self,
        handler: impl Fn(&ResponseEnvelope) + Send + Sync + 'static,
    ) -> Result<HandlerId> {
        self.on(Command::GetCharacterHistory, handler).await
    }

    /// Convenience: remove a character-history feed handler.
    pub async fn unsubscribe(&self, id: HandlerId) -> Result<()> {
        self.off(Command::GetCharacterHistory, id).await
    }

    /// Whether the socket is currently open.
    pub fn is_connection_open(&self) -> bool {
        self.shared.is_open()
    }

    /// Current lifecycle state of the connection.
    pub fn connection_status(&self) -> ConnectionStatus {
        self.shared.get()
    }

    /// Snapshot of heartbeat health for the current connection.
    pub async fn heartbeat_stats(&self) -> Result<crate::heartbeat::HeartbeatStats> {
        let (result_tx, result_rx) = oneshot::channel();
        self.command(ConnCmd::HeartbeatStats { result_tx }).await?;
        result_rx.await.map_err(|_| SceneLinkError::ConnectionTaskGone)
    }

    /// Redial after the client gave up reconnecting or was disconnected.
    /// No-op while the connection is open.
    pub async fn connect(&self) -> Result<()> {
        self.command(ConnCmd::Connect).await
    }

    /// Tear the connection down: close the socket, clear the session, and
    /// discard all pending requests. No automatic reconnection follows.
    pub async fn disconnect(&self) -> Result<()> {
        self.command(ConnCmd::Disconnect).await
    }

    // ── Business helpers ────────────────────────────────────────────────

    /// Authenticate with an explicit login request.
    pub async fn login(&self, request: LoginRequest) -> Result<()> {
        let payload = serde_json::to_value(&request)?;
        self.send(Command::Login, payload).await
    }

    /// Request a page of the scene feed.
    pub async fn get_scene_feed(&self, page: u32) -> Result<()> {
        self.send(Command::GetSceneFeed, json!({ "page": page })).await
    }

    /// Request the voting history of a thread.
    pub async fn vote_thread(&self, thread_id: &str) -> Result<()> {
        self.send(Command::VoteThread, json!({ "threadId": thread_id }))
            .await
    }

    /// Request per-room chat summaries for a scene.
    pub async fn get_character_history(&self, scene_id: &str) -> Result<()> {
        self.send(Command::GetCharacterHistory, json!({ "sceneId": scene_id }))
            .await
    }

    /// Apply a like/comment/vote-choice mutation to a tweet.
    pub async fn operate_tweet(&self, operation: TweetOperation) -> Result<()> {
        let payload = serde_json::to_value(&operation)?;
        self.send(Command::OperateTweet, payload).await
    }

    async fn command(&self, cmd: ConnCmd) -> Result<()> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| SceneLinkError::ConnectionTaskGone)
    }
}

impl std::fmt::Debug for SceneLinkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneLinkClient")
            .field("status", &self.shared.get())
            .finish()
    }
}

/// Builder for [`SceneLinkClient`] instances.
pub struct SceneLinkClientBuilder {
    url: Option<String>,
    options: ConnectionOptions,
    session_store: Arc<dyn SessionStore>,
    event_handlers: EventHandlers,
    client_id: Option<String>,
}

impl SceneLinkClientBuilder {
    fn new() -> Self {
        Self {
            url: None,
            options: ConnectionOptions::default(),
            session_store: Arc::new(MemorySessionStore::new()),
            event_handlers: EventHandlers::new(),
            client_id: None,
        }
    }

    /// Set the WebSocket URL to connect to.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Select a well-known endpoint instead of an explicit URL.
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.url = Some(endpoint.url().to_string());
        self
    }

    /// Set connection options (reconnect, heartbeat, queue behavior).
    pub fn options(mut self, options: ConnectionOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the durable session store used for login resumption.
    pub fn session_store(mut self, store: impl SessionStore + 'static) -> Self {
        self.session_store = Arc::new(store);
        self
    }

    /// Set connection lifecycle hooks.
    pub fn event_handlers(mut self, handlers: EventHandlers) -> Self {
        self.event_handlers = handlers;
        self
    }

    /// Override the client id stamped on liveness probes.
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Build the client and start connecting in the background.
    ///
    /// Must be called within a tokio runtime. The initial dial happens
    /// asynchronously; sends issued before the socket opens are queued.
    pub fn build(self) -> Result<SceneLinkClient> {
        let url = match self.url {
            Some(url) => url,
            None => Endpoint::from_env().url().to_string(),
        };
        validate_url(&url)?;

        if self.options.heartbeat_timeout_ms >= self.options.heartbeat_interval_ms {
            return Err(SceneLinkError::ConfigurationError(
                "heartbeat_timeout_ms must be shorter than heartbeat_interval_ms".to_string(),
            ));
        }

        let client_id = self.client_id.unwrap_or_else(generate_client_id);
        let shared = SharedStatus::new();
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);

        let task = tokio::spawn(connection_task(
            cmd_rx,
            url,
            self.options,
            self.session_store,
            self.event_handlers,
            shared.clone(),
            client_id,
        ));

        Ok(SceneLinkClient {
            cmd_tx,
            shared,
            next_handler_id: AtomicU64::new(1),
            _task: task,
        })
    }
}

impl std::fmt::Debug for SceneLinkClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneLinkClientBuilder")
            .field("url", &self.url)
            .field("options", &self.options)
            .field("client_id", &self.client_id)
            .finish()
    }
}

fn validate_url(raw: &str) -> Result<()> {
    let url = Url::parse(raw.trim())
        .map_err(|e| SceneLinkError::ConfigurationError(format!("Invalid URL '{}': {}", raw, e)))?;
    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(SceneLinkError::ConfigurationError(format!(
                "URL must use ws:// or wss:// (found '{}')",
                other
            )));
        }
    }
    if url.host_str().is_none() {
        return Err(SceneLinkError::ConfigurationError(
            "URL must include a host".to_string(),
        ));
    }
    Ok(())
}

fn generate_client_id() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    format!("scene_{}", nanos)
}
