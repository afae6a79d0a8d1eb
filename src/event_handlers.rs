//! Connection lifecycle hooks.
//!
//! Optional callbacks for observing the socket: `on_connect`,
//! `on_disconnect`, `on_error`, plus raw-frame debug hooks `on_send` and
//! `on_receive`. No failure is ever surfaced to collaborators as an
//! error; these hooks and the logs are the only observability.

use std::fmt;
use std::sync::Arc;

/// Why a connection closed.
#[derive(Debug, Clone)]
pub struct DisconnectReason {
    pub message: String,
    /// WebSocket close code, when the server sent one.
    pub code: Option<u16>,
}

impl DisconnectReason {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: u16) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} (code: {})", self.message, code),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Error information passed to the `on_error` hook.
#[derive(Debug, Clone)]
pub struct ConnectionError {
    pub message: String,
    /// Whether auto-reconnect may recover from this.
    pub recoverable: bool,
}

impl ConnectionError {
    pub fn new(message: impl Into<String>, recoverable: bool) -> Self {
        Self {
            message: message.into(),
            recoverable,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

type OnConnect = Arc<dyn Fn() + Send + Sync>;
type OnDisconnect = Arc<dyn Fn(DisconnectReason) + Send + Sync>;
type OnError = Arc<dyn Fn(ConnectionError) + Send + Sync>;
type OnFrame = Arc<dyn Fn(&str) + Send + Sync>;

/// Optional lifecycle callbacks, registered via the builder pattern.
///
/// # Example
///
/// ```rust
/// use scene_link::EventHandlers;
///
/// let handlers = EventHandlers::new()
///     .on_connect(|| println!("connected"))
///     .on_disconnect(|reason| println!("disconnected: {}", reason));
/// ```
#[derive(Clone, Default)]
pub struct EventHandlers {
    pub(crate) on_connect: Option<OnConnect>,
    pub(crate) on_disconnect: Option<OnDisconnect>,
    pub(crate) on_error: Option<OnError>,
    pub(crate) on_send: Option<OnFrame>,
    pub(crate) on_receive: Option<OnFrame>,
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_connect", &self.on_connect.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("on_send", &self.on_send.is_some())
            .field("on_receive", &self.on_receive.is_some())
            .finish()
    }
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called when the socket opens.
    pub fn on_connect(mut self, f: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_connect = Some(Arc::new(f));
        self
    }

    /// Called when the socket closes, intentionally or not.
    pub fn on_disconnect(mut self, f: impl Fn(DisconnectReason) + Send + Sync + 'static) -> Self {
        self.on_disconnect = Some(Arc::new(f));
        self
    }

    /// Called on connection or protocol errors.
    pub fn on_error(mut self, f: impl Fn(ConnectionError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Debug hook: every raw outbound frame.
    pub fn on_send(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_send = Some(Arc::new(f));
        self
    }

    /// Debug hook: every raw inbound frame.
    pub fn on_receive(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_receive = Some(Arc::new(f));
        self
    }

    pub(crate) fn emit_connect(&self) {
        if let Some(cb) = &self.on_connect {
            cb();
        }
    }

    pub(crate) fn emit_disconnect(&self, reason: DisconnectReason) {
        if let Some(cb) = &self.on_disconnect {
            cb(reason);
        }
    }

    pub(crate) fn emit_error(&self, error: ConnectionError) {
        if let Some(cb) = &self.on_error {
            cb(error);
        }
    }

    pub(crate) fn emit_send(&self, raw: &str) {
        if let Some(cb) = &self.on_send {
            cb(raw);
        }
    }

    pub(crate) fn emit_receive(&self, raw: &str) {
        if let Some(cb) = &self.on_receive {
            cb(raw);
        }
    }
}
