//! Error types for the scene-link client.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SceneLinkError>;

/// Errors surfaced by the scene-link client.
///
/// Most connection-level failures never reach callers: transport drops are
/// recovered by reconnection, malformed frames are logged and discarded,
/// and blocked sends are queued. The variants here cover the remaining
/// caller-visible failures (bad configuration, a dead connection task,
/// session storage I/O).
#[derive(Debug, Error)]
pub enum SceneLinkError {
    /// WebSocket transport failure.
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// A wire frame could not be encoded or decoded.
    #[error("Codec error: {0}")]
    CodecError(#[from] serde_json::Error),

    /// Invalid client configuration (URL, options).
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Session store read/write failure.
    #[error("Session storage error: {0}")]
    StorageError(String),

    /// The background connection task is no longer running.
    #[error("Connection task is not running")]
    ConnectionTaskGone,
}
