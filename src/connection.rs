//! Connection manager: socket lifecycle, reconnection, and message routing.
//!
//! A single background task owns the WebSocket stream together with all
//! mutable client state (auth gate, dispatcher, heartbeat monitor) and
//! multiplexes socket frames, timer deadlines, and public-API commands
//! through one `tokio::select!` loop. Handlers run synchronously inside
//! the task, so dispatch order and queue-drain order follow a single run
//! loop with no interleaving.
//!
//! Lifecycle: `Disconnected -> Connecting -> Open -> (Closed ->
//! Connecting, while attempts remain) -> Disconnected`. Reconnection after
//! an unexpected close uses linear backoff: the n-th attempt waits
//! `n * reconnect_base_delay`. Once the attempt budget is exhausted the
//! client stays down until an explicit `connect()`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant as TokioInstant;
use tokio_tungstenite::tungstenite::error::Error as WsError;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::connect_async;

use crate::codec;
use crate::command::Command;
use crate::dispatch::{Dispatcher, Handler, HandlerId};
use crate::error::{Result, SceneLinkError};
use crate::event_handlers::{ConnectionError, DisconnectReason, EventHandlers};
use crate::gate::{AuthGate, GateDecision, LoginOutcome};
use crate::heartbeat::{HeartbeatMonitor, HeartbeatStats};
use crate::models::LoginRequest;
use crate::options::ConnectionOptions;
use crate::session::SessionStore;

type WsStream = tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<TcpStream>>;

/// Socket lifecycle state, readable at any time via the client handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// No socket and no reconnect scheduled.
    Disconnected,
    /// A dial is in flight.
    Connecting,
    /// Socket established and traffic flowing.
    Open,
    /// Socket dropped; a reconnect may be scheduled.
    Closed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        write!(f, "{}", name)
    }
}

/// Status cell shared between the client handle and the background task.
#[derive(Clone)]
pub(crate) struct SharedStatus {
    open: Arc<AtomicBool>,
    status: Arc<RwLock<ConnectionStatus>>,
}

impl SharedStatus {
    pub fn new() -> Self {
        Self {
            open: Arc::new(AtomicBool::new(false)),
            status: Arc::new(RwLock::new(ConnectionStatus::Disconnected)),
        }
    }

    pub fn set(&self, status: ConnectionStatus) {
        self.open
            .store(status == ConnectionStatus::Open, Ordering::SeqCst);
        if let Ok(mut slot) = self.status.write() {
            *slot = status;
        }
    }

    pub fn get(&self) -> ConnectionStatus {
        self.status
            .read()
            .map(|slot| *slot)
            .unwrap_or(ConnectionStatus::Disconnected)
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

// ── Commands ────────────────────────────────────────────────────────────────

/// Commands sent from the public API to the background connection task.
pub(crate) enum ConnCmd {
    /// Submit an outbound request through the auth gate.
    Send { command: Command, payload: Value },
    /// Register a handler for a command code.
    Register {
        command: u16,
        id: HandlerId,
        handler: Handler,
    },
    /// Remove a handler registration.
    Unregister { command: u16, id: HandlerId },
    /// (Re)dial after a give-up or an explicit disconnect. No-op while open.
    Connect,
    /// Application-initiated teardown: close the socket, clear the session
    /// and the pending queue, and stop reconnecting.
    Disconnect,
    /// Snapshot heartbeat health.
    HeartbeatStats {
        result_tx: oneshot::Sender<HeartbeatStats>,
    },
}

/// Outcome of one select-loop arm while connected.
enum LoopEvent {
    Continue,
    /// Unexpected loss; clear state and schedule a reconnect.
    ConnectionLost(DisconnectReason),
    /// `disconnect()` was handled; do not reconnect.
    ClientDisconnect,
    /// All client handles are gone; exit the task.
    Shutdown,
}

/// Outcome of a command handled while no socket exists.
enum OfflineAction {
    Continue,
    ConnectNow,
    CancelReconnect,
    Shutdown,
}

// ── Task state ──────────────────────────────────────────────────────────────

/// Everything the connection task owns besides the socket itself.
struct Core {
    gate: AuthGate,
    dispatcher: Dispatcher,
    heartbeat: HeartbeatMonitor,
    options: ConnectionOptions,
    session_store: Arc<dyn SessionStore>,
    handlers: EventHandlers,
    shared: SharedStatus,
    request_counter: u64,
}

impl Core {
    /// Encode and send one envelope on the wire.
    async fn transmit(&mut self, ws: &mut WsStream, command: Command, payload: Value) -> Result<()> {
        let request_id = if self.options.request_ids {
            self.request_counter += 1;
            self.request_counter
        } else {
            0
        };
        let text = codec::encode(command.code(), payload, request_id)?;
        self.handlers.emit_send(&text);
        ws.send(Message::Text(text.into()))
            .await
            .map_err(|e| SceneLinkError::WebSocketError(format!("Failed to send {}: {}", command, e)))
    }

    /// Socket established: reset state, arm the heartbeat, and replay any
    /// stored session as an automatic login.
    async fn on_open(&mut self, ws: &mut WsStream) {
        self.shared.set(ConnectionStatus::Open);
        self.heartbeat.start(Instant::now());
        log::info!("[scene-link] Connected");
        self.handlers.emit_connect();

        match self.session_store.load() {
            Ok(Some(stored)) => {
                log::info!(
                    "[scene-link] Resuming session for player {}",
                    stored.player_id
                );
                let request = LoginRequest::resume(stored.player_id, stored.token);
                let payload = serde_json::to_value(&request).unwrap_or(Value::Null);
                if let Err(e) = self.transmit(ws, Command::Login, payload).await {
                    log::warn!("[scene-link] Auto-login send failed: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => log::warn!("[scene-link] Could not read session store: {}", e),
        }
    }

    /// Unexpected close: stop the heartbeat and clear the in-memory
    /// session. The pending queue is retained.
    fn on_closed(&mut self, reason: DisconnectReason) {
        self.heartbeat.stop();
        self.gate.clear_session();
        self.shared.set(ConnectionStatus::Closed);
        log::warn!("[scene-link] Disconnected: {}", reason);
        self.handlers.emit_disconnect(reason);
    }

    /// Route one raw inbound frame: decode, divert heartbeat and login
    /// replies, dispatch the rest.
    async fn handle_raw(&mut self, ws: &mut WsStream, text: &str) {
        self.handlers.emit_receive(text);
        let envelope = match codec::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                // A single bad frame never tears the connection down.
                log::warn!("[scene-link] Dropping malformed frame: {}", e);
                return;
            }
        };

        if envelope.command == Command::Heartbeat.code() {
            self.heartbeat.on_reply(Instant::now());
            return;
        }

        if envelope.command == Command::Login.code() {
            match self.gate.on_login_reply(&envelope) {
                LoginOutcome::Success { session, drained } => {
                    if let Some(session) = session {
                        log::info!("[scene-link] Logged in as player {}", session.player_id);
                        if let Err(e) = self.session_store.store(&session) {
                            log::warn!("[scene-link] Failed to persist session: {}", e);
                        }
                    }
                    for (command, payload) in drained {
                        if let Err(e) = self.transmit(ws, command, payload).await {
                            log::warn!(
                                "[scene-link] Flush of pending {} failed, dropping remainder: {}",
                                command,
                                e
                            );
                            break;
                        }
                    }
                }
                LoginOutcome::Failure { code, message } => {
                    log::warn!("[scene-link] Login failed (code {}): {}", code, message);
                    self.handlers.emit_error(ConnectionError::new(
                        format!("Login failed (code {}): {}", code, message),
                        false,
                    ));
                }
            }
            // Login replies also reach registered subscribers.
            self.dispatcher.dispatch(&envelope);
            return;
        }

        self.dispatcher.dispatch(&envelope);
    }

    async fn handle_frame(
        &mut self,
        ws: &mut WsStream,
        frame: Option<std::result::Result<Message, WsError>>,
    ) -> LoopEvent {
        match frame {
            Some(Ok(Message::Text(text))) => {
                let text = text.to_string();
                self.handle_raw(ws, &text).await;
                LoopEvent::Continue
            }
            Some(Ok(Message::Binary(data))) => {
                match std::str::from_utf8(&data) {
                    Ok(text) => {
                        let text = text.to_string();
                        self.handle_raw(ws, &text).await;
                    }
                    Err(_) => log::warn!(
                        "[scene-link] Dropping non-UTF-8 binary frame ({} bytes)",
                        data.len()
                    ),
                }
                LoopEvent::Continue
            }
            Some(Ok(Message::Ping(payload))) => {
                let _ = ws.send(Message::Pong(payload)).await;
                LoopEvent::Continue
            }
            Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => LoopEvent::Continue,
            Some(Ok(Message::Close(frame))) => {
                let reason = match frame {
                    Some(f) => DisconnectReason::with_code(f.reason.to_string(), f.code.into()),
                    None => DisconnectReason::new("Server closed connection"),
                };
                LoopEvent::ConnectionLost(reason)
            }
            Some(Err(e)) => {
                log::warn!("[scene-link] WebSocket error: {}", e);
                self.handlers
                    .emit_error(ConnectionError::new(e.to_string(), true));
                LoopEvent::ConnectionLost(DisconnectReason::new(format!("WebSocket error: {}", e)))
            }
            None => LoopEvent::ConnectionLost(DisconnectReason::new("WebSocket stream ended")),
        }
    }

    async fn handle_cmd_online(&mut self, ws: &mut WsStream, cmd: Option<ConnCmd>) -> LoopEvent {
        match cmd {
            Some(ConnCmd::Send { command, payload }) => {
                match self.gate.submit(command, payload) {
                    GateDecision::Transmit(payload) => {
                        if let Err(e) = self.transmit(ws, command, payload).await {
                            log::warn!("[scene-link] Send failed: {}", e);
                            self.handlers
                                .emit_error(ConnectionError::new(e.to_string(), true));
                            return LoopEvent::ConnectionLost(DisconnectReason::new(format!(
                                "Send failed: {}",
                                e
                            )));
                        }
                        LoopEvent::Continue
                    }
                    GateDecision::Queued | GateDecision::Dropped => LoopEvent::Continue,
                    GateDecision::Rejected => {
                        self.handlers.emit_error(ConnectionError::new(
                            format!("Pending queue full, {} rejected", command),
                            false,
                        ));
                        LoopEvent::Continue
                    }
                }
            }
            Some(ConnCmd::Register { command, id, handler }) => {
                self.dispatcher.insert(command, id, handler);
                LoopEvent::Continue
            }
            Some(ConnCmd::Unregister { command, id }) => {
                self.dispatcher.remove(command, id);
                LoopEvent::Continue
            }
            Some(ConnCmd::Connect) => {
                log::debug!("[scene-link] connect(): already connected");
                LoopEvent::Continue
            }
            Some(ConnCmd::Disconnect) => {
                log::info!("[scene-link] Client disconnect");
                self.heartbeat.stop();
                self.gate.clear_session();
                let dropped = self.gate.clear_pending();
                if dropped > 0 {
                    log::debug!("[scene-link] Discarded {} pending request(s)", dropped);
                }
                let _ = ws.close(None).await;
                self.shared.set(ConnectionStatus::Disconnected);
                self.handlers
                    .emit_disconnect(DisconnectReason::new("Client disconnected"));
                LoopEvent::ClientDisconnect
            }
            Some(ConnCmd::HeartbeatStats { result_tx }) => {
                let _ = result_tx.send(self.heartbeat.stats(Instant::now()));
                LoopEvent::Continue
            }
            None => LoopEvent::Shutdown,
        }
    }

    fn handle_cmd_offline(&mut self, cmd: Option<ConnCmd>) -> OfflineAction {
        match cmd {
            Some(ConnCmd::Send { command, payload }) => {
                match self.gate.submit(command, payload) {
                    GateDecision::Transmit(_) => {
                        // Only LOGIN passes the gate unauthenticated; with no
                        // socket it cannot be sent and is not queued.
                        log::warn!("[scene-link] Cannot send {}: not connected", command);
                    }
                    GateDecision::Queued | GateDecision::Dropped => {}
                    GateDecision::Rejected => {
                        self.handlers.emit_error(ConnectionError::new(
                            format!("Pending queue full, {} rejected", command),
                            false,
                        ));
                    }
                }
                OfflineAction::Continue
            }
            Some(ConnCmd::Register { command, id, handler }) => {
                self.dispatcher.insert(command, id, handler);
                OfflineAction::Continue
            }
            Some(ConnCmd::Unregister { command, id }) => {
                self.dispatcher.remove(command, id);
                OfflineAction::Continue
            }
            Some(ConnCmd::Connect) => OfflineAction::ConnectNow,
            Some(ConnCmd::Disconnect) => {
                let dropped = self.gate.clear_pending();
                if dropped > 0 {
                    log::debug!("[scene-link] Discarded {} pending request(s)", dropped);
                }
                self.gate.clear_session();
                self.shared.set(ConnectionStatus::Disconnected);
                OfflineAction::CancelReconnect
            }
            Some(ConnCmd::HeartbeatStats { result_tx }) => {
                let _ = result_tx.send(self.heartbeat.stats(Instant::now()));
                OfflineAction::Continue
            }
            None => OfflineAction::Shutdown,
        }
    }
}

// ── Connection establishment & backoff ──────────────────────────────────────

async fn dial(url: &str, shared: &SharedStatus) -> Result<WsStream> {
    shared.set(ConnectionStatus::Connecting);
    log::debug!("[scene-link] Connecting to {}", url);
    let (stream, _response) = connect_async(url)
        .await
        .map_err(|e| SceneLinkError::WebSocketError(format!("Connection failed: {}", e)))?;
    Ok(stream)
}

/// Schedule the next reconnect attempt with linear backoff, or give up
/// once the attempt budget is spent.
fn schedule_reconnect(
    options: &ConnectionOptions,
    shared: &SharedStatus,
    handlers: &EventHandlers,
    attempts: &mut u32,
    reconnect_at: &mut Option<TokioInstant>,
) {
    if !options.auto_reconnect || *attempts >= options.max_reconnect_attempts {
        log::warn!(
            "[scene-link] Not reconnecting ({} attempt(s) used); call connect() to retry",
            attempts
        );
        handlers.emit_error(ConnectionError::new(
            "Reconnect attempts exhausted".to_string(),
            false,
        ));
        shared.set(ConnectionStatus::Disconnected);
        *reconnect_at = None;
        return;
    }

    *attempts += 1;
    let delay = options.reconnect_base_delay() * *attempts;
    log::info!(
        "[scene-link] Reconnecting in {:?} (attempt {}/{})",
        delay,
        attempts,
        options.max_reconnect_attempts
    );
    *reconnect_at = Some(TokioInstant::now() + delay);
}

// ── Background connection task ──────────────────────────────────────────────

/// The task owning the socket. Spawned once per client; exits when every
/// client handle has been dropped.
pub(crate) async fn connection_task(
    mut cmd_rx: mpsc::Receiver<ConnCmd>,
    url: String,
    options: ConnectionOptions,
    session_store: Arc<dyn SessionStore>,
    event_handlers: EventHandlers,
    shared: SharedStatus,
    client_id: String,
) {
    let heartbeat_interval = options.heartbeat_interval();
    let heartbeat_timeout = options.heartbeat_timeout();

    let mut core = Core {
        gate: AuthGate::new(options.max_pending_requests, options.overflow_policy),
        dispatcher: Dispatcher::new(),
        heartbeat: HeartbeatMonitor::new(client_id, options.max_missed_heartbeats),
        options,
        session_store,
        handlers: event_handlers,
        shared,
        request_counter: 0,
    };

    let mut ws: Option<WsStream> = None;
    let mut reconnect_attempts: u32 = 0;
    let mut reconnect_at: Option<TokioInstant> = None;
    let mut next_probe_at = TokioInstant::now();
    let mut timeout_at = TokioInstant::now();

    // Initial dial.
    match dial(&url, &core.shared).await {
        Ok(mut stream) => {
            core.on_open(&mut stream).await;
            next_probe_at = TokioInstant::now() + heartbeat_interval;
            ws = Some(stream);
        }
        Err(e) => {
            log::warn!("[scene-link] Initial connection failed: {}", e);
            core.handlers
                .emit_error(ConnectionError::new(e.to_string(), true));
            core.shared.set(ConnectionStatus::Closed);
            schedule_reconnect(
                &core.options,
                &core.shared,
                &core.handlers,
                &mut reconnect_attempts,
                &mut reconnect_at,
            );
        }
    }

    loop {
        if let Some(stream) = ws.as_mut() {
            let probe_sleep = tokio::time::sleep_until(next_probe_at);
            tokio::pin!(probe_sleep);
            let timeout_sleep = tokio::time::sleep_until(timeout_at);
            tokio::pin!(timeout_sleep);

            let event = tokio::select! {
                biased;

                // Probe reply overdue.
                _ = &mut timeout_sleep, if core.heartbeat.awaiting_reply() => {
                    if core.heartbeat.on_timeout() {
                        let _ = stream.close(None).await;
                        LoopEvent::ConnectionLost(DisconnectReason::new(
                            "Consecutive heartbeat timeouts exceeded",
                        ))
                    } else {
                        LoopEvent::Continue
                    }
                }

                // Next probe due. Guarded so a probe is never emitted while
                // one is in flight: only one timeout is armed at a time.
                _ = &mut probe_sleep, if core.heartbeat.is_running() && !core.heartbeat.awaiting_reply() => {
                    let ping = core.heartbeat.on_probe_sent(Instant::now());
                    next_probe_at = TokioInstant::now() + heartbeat_interval;
                    timeout_at = TokioInstant::now() + heartbeat_timeout;
                    let payload = serde_json::to_value(&ping).unwrap_or(Value::Null);
                    match core.transmit(stream, Command::Heartbeat, payload).await {
                        Ok(()) => LoopEvent::Continue,
                        Err(e) => {
                            log::warn!("[scene-link] Heartbeat send failed: {}", e);
                            LoopEvent::ConnectionLost(DisconnectReason::new(format!(
                                "Heartbeat send failed: {}",
                                e
                            )))
                        }
                    }
                }

                // Commands from the public API.
                cmd = cmd_rx.recv() => core.handle_cmd_online(stream, cmd).await,

                // Socket frames.
                frame = stream.next() => core.handle_frame(stream, frame).await,
            };

            match event {
                LoopEvent::Continue => {}
                LoopEvent::ConnectionLost(reason) => {
                    core.on_closed(reason);
                    ws = None;
                    schedule_reconnect(
                        &core.options,
                        &core.shared,
                        &core.handlers,
                        &mut reconnect_attempts,
                        &mut reconnect_at,
                    );
                }
                LoopEvent::ClientDisconnect => {
                    ws = None;
                    reconnect_at = None;
                }
                LoopEvent::Shutdown => {
                    let _ = stream.close(None).await;
                    core.shared.set(ConnectionStatus::Disconnected);
                    return;
                }
            }
        } else if let Some(at) = reconnect_at {
            let retry_sleep = tokio::time::sleep_until(at);
            tokio::pin!(retry_sleep);

            tokio::select! {
                biased;

                cmd = cmd_rx.recv() => match core.handle_cmd_offline(cmd) {
                    OfflineAction::Continue => {}
                    OfflineAction::ConnectNow => {
                        reconnect_attempts = 0;
                        reconnect_at = Some(TokioInstant::now());
                    }
                    OfflineAction::CancelReconnect => reconnect_at = None,
                    OfflineAction::Shutdown => return,
                },

                _ = &mut retry_sleep => {
                    reconnect_at = None;
                    match dial(&url, &core.shared).await {
                        Ok(mut stream) => {
                            reconnect_attempts = 0;
                            core.on_open(&mut stream).await;
                            next_probe_at = TokioInstant::now() + heartbeat_interval;
                            ws = Some(stream);
                        }
                        Err(e) => {
                            log::warn!("[scene-link] Reconnection failed: {}", e);
                            core.handlers
                                .emit_error(ConnectionError::new(e.to_string(), true));
                            core.shared.set(ConnectionStatus::Closed);
                            schedule_reconnect(
                                &core.options,
                                &core.shared,
                                &core.handlers,
                                &mut reconnect_attempts,
                                &mut reconnect_at,
                            );
                        }
                    }
                }
            }
        } else {
            // No socket, no scheduled reconnect: wait for commands.
            match core.handle_cmd_offline(cmd_rx.recv().await) {
                OfflineAction::Continue => {}
                OfflineAction::ConnectNow => {
                    reconnect_attempts = 0;
                    reconnect_at = Some(TokioInstant::now());
                }
                OfflineAction::CancelReconnect => {}
                OfflineAction::Shutdown => return,
            }
        }
    }
}
