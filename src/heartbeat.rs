//! Heartbeat monitor: periodic liveness probes with RTT tracking.
//!
//! Per connection the monitor moves `Idle -> Armed -> probe sent ->
//! (replied -> Armed) | (timed out -> Armed, missed + 1)`. Once
//! `max_missed` consecutive probes time out, the connection is declared
//! lost and the owner tears the socket down. The monitor holds only
//! state; the connection task owns the actual timers and drives
//! [`on_probe_sent`](HeartbeatMonitor::on_probe_sent) /
//! [`on_reply`](HeartbeatMonitor::on_reply) /
//! [`on_timeout`](HeartbeatMonitor::on_timeout) from its deadlines.

use std::collections::VecDeque;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::models::HeartbeatPing;

/// Retained RTT samples; the oldest is evicted past this.
const RTT_WINDOW: usize = 100;

/// Snapshot of heartbeat health, returned by `get_heartbeat_stats`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeartbeatStats {
    /// Round-trip time of the most recent reply.
    pub last_rtt: Option<Duration>,
    /// Rolling average over the retained RTT window.
    pub average_rtt: Option<Duration>,
    /// Consecutive probes currently unanswered.
    pub missed_count: u32,
    pub total_sent: u64,
    pub total_received: u64,
    pub total_timeouts: u64,
    /// Time since the monitor was (re)started for this connection.
    pub uptime: Option<Duration>,
}

pub(crate) struct HeartbeatMonitor {
    client_id: String,
    max_missed: u32,
    running: bool,
    awaiting_reply: bool,
    last_sent_at: Option<Instant>,
    missed_count: u32,
    rtt_history: VecDeque<Duration>,
    total_sent: u64,
    total_received: u64,
    total_timeouts: u64,
    connection_start: Option<Instant>,
}

impl HeartbeatMonitor {
    pub fn new(client_id: String, max_missed: u32) -> Self {
        Self {
            client_id,
            max_missed,
            running: false,
            awaiting_reply: false,
            last_sent_at: None,
            missed_count: 0,
            rtt_history: VecDeque::with_capacity(RTT_WINDOW),
            total_sent: 0,
            total_received: 0,
            total_timeouts: 0,
            connection_start: None,
        }
    }

    /// Arm the monitor for a fresh connection, resetting counters and the
    /// RTT window.
    pub fn start(&mut self, now: Instant) {
        self.running = true;
        self.awaiting_reply = false;
        self.last_sent_at = None;
        self.missed_count = 0;
        self.rtt_history.clear();
        self.total_sent = 0;
        self.total_received = 0;
        self.total_timeouts = 0;
        self.connection_start = Some(now);
    }

    /// Disarm the monitor. Idempotent.
    pub fn stop(&mut self) {
        self.running = false;
        self.awaiting_reply = false;
        self.last_sent_at = None;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether a probe is in flight (a timeout deadline should be armed).
    pub fn awaiting_reply(&self) -> bool {
        self.running && self.awaiting_reply
    }

    /// Record a probe about to go on the wire and build its payload.
    pub fn on_probe_sent(&mut self, now: Instant) -> HeartbeatPing {
        self.last_sent_at = Some(now);
        self.awaiting_reply = true;
        self.total_sent += 1;
        HeartbeatPing {
            timestamp: unix_millis(),
            client_id: self.client_id.clone(),
        }
    }

    /// Record a probe reply, measuring RTT against the in-flight probe.
    pub fn on_reply(&mut self, now: Instant) {
        if !self.awaiting_reply {
            // Late reply after its timeout already fired; nothing in flight.
            log::debug!("[scene-link] Heartbeat reply with no probe in flight");
            return;
        }
        self.awaiting_reply = false;
        self.missed_count = 0;
        self.total_received += 1;
        if let Some(sent_at) = self.last_sent_at {
            let rtt = now.saturating_duration_since(sent_at);
            if self.rtt_history.len() >= RTT_WINDOW {
                self.rtt_history.pop_front();
            }
            self.rtt_history.push_back(rtt);
            log::debug!(
                "[scene-link] Heartbeat reply, rtt={:?}, avg={:?}",
                rtt,
                self.average_rtt()
            );
        }
    }

    /// Record a probe timeout. Returns `true` when the consecutive-miss
    /// threshold is reached and the connection must be torn down.
    pub fn on_timeout(&mut self) -> bool {
        self.awaiting_reply = false;
        self.missed_count += 1;
        self.total_timeouts += 1;
        log::warn!(
            "[scene-link] Heartbeat timeout ({}/{} missed)",
            self.missed_count,
            self.max_missed
        );
        self.missed_count >= self.max_missed
    }

    pub fn last_rtt(&self) -> Option<Duration> {
        self.rtt_history.back().copied()
    }

    pub fn average_rtt(&self) -> Option<Duration> {
        if self.rtt_history.is_empty() {
            return None;
        }
        let total: Duration = self.rtt_history.iter().sum();
        Some(total / self.rtt_history.len() as u32)
    }

    pub fn stats(&self, now: Instant) -> HeartbeatStats {
        HeartbeatStats {
            last_rtt: self.last_rtt(),
            average_rtt: self.average_rtt(),
            missed_count: self.missed_count,
            total_sent: self.total_sent,
            total_received: self.total_received,
            total_timeouts: self.total_timeouts,
            uptime: self
                .connection_start
                .filter(|_| self.running)
                .map(|start| now.saturating_duration_since(start)),
        }
    }

    #[cfg(test)]
    fn rtt_sample_count(&self) -> usize {
        self.rtt_history.len()
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
