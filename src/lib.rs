//! WebSocket client connection manager for the scene drama companion app.
//!
//! One long-lived socket carries all application traffic: login, scene
//! feeds, voting, tweet operations, liveness probes. The crate provides:
//!
//! - A single [`SceneLinkClient`] handle per process, built via
//!   [`SceneLinkClient::builder`], backed by one connection task
//! - An auth gate that buffers non-login traffic until login succeeds and
//!   flushes it in FIFO order
//! - Application-level heartbeats with RTT tracking and forced reconnect
//!   after consecutive timeouts
//! - Automatic reconnection with linear backoff after unexpected closes
//! - Handler registration by command code, with identity-safe removal
//!
//! # Example
//!
//! ```rust,no_run
//! use scene_link::{Command, LoginRequest, SceneLinkClient};
//!
//! # async fn example() -> scene_link::Result<()> {
//! let client = SceneLinkClient::builder()
//!     .url("ws://localhost:8081")
//!     .build()?;
//!
//! client.on(Command::GetSceneFeed, |envelope| {
//!     println!("feed: {}", envelope.data);
//! }).await?;
//!
//! client.login(LoginRequest::password_login("amber", "secret")).await?;
//! client.get_scene_feed(1).await?;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod command;
mod connection;
mod dispatch;
pub mod endpoint;
pub mod error;
pub mod event_handlers;
mod gate;
pub mod heartbeat;
pub mod models;
pub mod options;
pub mod session;

mod client;

pub use client::{SceneLinkClient, SceneLinkClientBuilder};
pub use command::Command;
pub use connection::ConnectionStatus;
pub use dispatch::HandlerId;
pub use endpoint::Endpoint;
pub use error::{Result, SceneLinkError};
pub use event_handlers::{ConnectionError, DisconnectReason, EventHandlers};
pub use heartbeat::HeartbeatStats;
pub use models::{
    HeartbeatPing, LoginReply, LoginRequest, PlayerInfo, RequestEnvelope, ResponseEnvelope,
    TweetOperation,
};
pub use options::{ConnectionOptions, OverflowPolicy};
pub use session::{FileSessionStore, MemorySessionStore, SessionStore, StoredSession};
