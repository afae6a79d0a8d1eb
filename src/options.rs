//! Connection-level options: reconnection, heartbeat, and queue behavior.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What to do with a send that arrives while the pending queue is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Evict the oldest queued request to make room (default).
    #[default]
    DropOldest,
    /// Silently discard the incoming request.
    DropNewest,
    /// Discard the incoming request and surface it via the `on_error` hook.
    RejectNew,
}

/// Options controlling connection behavior.
///
/// # Example
///
/// ```rust
/// use scene_link::ConnectionOptions;
///
/// let options = ConnectionOptions::default()
///     .with_reconnect_base_delay_ms(2000)
///     .with_max_reconnect_attempts(10)
///     .with_max_pending_requests(64);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionOptions {
    /// Automatically reconnect after an unexpected close.
    /// Default: true
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,

    /// Base delay between reconnection attempts, in milliseconds.
    /// The n-th attempt waits `n * reconnect_base_delay_ms` (linear backoff).
    /// Default: 1000
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,

    /// Reconnection attempts before giving up. Once exhausted, the client
    /// stays down until an explicit `connect()` call.
    /// Default: 5
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,

    /// Interval between liveness probes, in milliseconds.
    /// Default: 30000
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    /// Per-probe reply timeout, in milliseconds. Must be shorter than the
    /// probe interval so only one timeout is ever armed at a time.
    /// Default: 10000
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,

    /// Consecutive probe timeouts that force a reconnect.
    /// Default: 3
    #[serde(default = "default_max_missed_heartbeats")]
    pub max_missed_heartbeats: u32,

    /// Maximum depth of the pending-request queue.
    /// Default: 256
    #[serde(default = "default_max_pending_requests")]
    pub max_pending_requests: usize,

    /// Policy applied when the pending queue is full.
    #[serde(default)]
    pub overflow_policy: OverflowPolicy,

    /// Stamp outbound envelopes with a monotonically increasing request id
    /// instead of the fixed 0. Replies are still correlated by command code
    /// alone; this only changes what goes on the wire.
    /// Default: false
    #[serde(default)]
    pub request_ids: bool,
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_reconnect_base_delay_ms() -> u64 {
    1000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_heartbeat_timeout_ms() -> u64 {
    10_000
}

fn default_max_missed_heartbeats() -> u32 {
    3
}

fn default_max_pending_requests() -> usize {
    256
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            auto_reconnect: true,
            reconnect_base_delay_ms: 1000,
            max_reconnect_attempts: 5,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 10_000,
            max_missed_heartbeats: 3,
            max_pending_requests: 256,
            overflow_policy: OverflowPolicy::default(),
            request_ids: false,
        }
    }
}

impl ConnectionOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to automatically reconnect after an unexpected close.
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the base delay between reconnection attempts (milliseconds).
    pub fn with_reconnect_base_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_base_delay_ms = delay_ms;
        self
    }

    /// Set the number of reconnection attempts before giving up.
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Set the liveness probe interval (milliseconds).
    pub fn with_heartbeat_interval_ms(mut self, interval_ms: u64) -> Self {
        self.heartbeat_interval_ms = interval_ms;
        self
    }

    /// Set the per-probe reply timeout (milliseconds).
    pub fn with_heartbeat_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.heartbeat_timeout_ms = timeout_ms;
        self
    }

    /// Set how many consecutive probe timeouts force a reconnect.
    pub fn with_max_missed_heartbeats(mut self, max_missed: u32) -> Self {
        self.max_missed_heartbeats = max_missed;
        self
    }

    /// Set the maximum pending-request queue depth.
    pub fn with_max_pending_requests(mut self, max: usize) -> Self {
        self.max_pending_requests = max;
        self
    }

    /// Set the queue overflow policy.
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Enable monotonically increasing request ids on outbound envelopes.
    pub fn with_request_ids(mut self, enabled: bool) -> Self {
        self.request_ids = enabled;
        self
    }

    pub(crate) fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub(crate) fn heartbeat_timeout(&self) -> Duration {
        Duration::from_millis(self.heartbeat_timeout_ms)
    }

    pub(crate) fn reconnect_base_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_base_delay_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ConnectionOptions::default();
        assert!(options.auto_reconnect);
        assert_eq!(options.reconnect_base_delay_ms, 1000);
        assert_eq!(options.max_reconnect_attempts, 5);
        assert_eq!(options.heartbeat_interval_ms, 30_000);
        assert_eq!(options.heartbeat_timeout_ms, 10_000);
        assert_eq!(options.max_missed_heartbeats, 3);
        assert_eq!(options.overflow_policy, OverflowPolicy::DropOldest);
        assert!(!options.request_ids);
    }

    #[test]
    fn test_builder_setters() {
        let options = ConnectionOptions::new()
            .with_auto_reconnect(false)
            .with_max_reconnect_attempts(2)
            .with_overflow_policy(OverflowPolicy::RejectNew)
            .with_request_ids(true);
        assert!(!options.auto_reconnect);
        assert_eq!(options.max_reconnect_attempts, 2);
        assert_eq!(options.overflow_policy, OverflowPolicy::RejectNew);
        assert!(options.request_ids);
    }

    #[test]
    fn test_serde_defaults_fill_missing_fields() {
        let options: ConnectionOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.max_pending_requests, 256);
        assert!(options.auto_reconnect);
    }
}
