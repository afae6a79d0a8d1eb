//! Auth gate: blocks non-login traffic until authentication succeeds.
//!
//! Every outbound command passes through the gate. LOGIN is always let
//! through; anything else is queued while the session is unauthenticated
//! and flushed in FIFO order once a login reply with `code == 0` arrives.
//! A failed login leaves the queue untouched; commands stay parked until
//! a later login succeeds.

use std::collections::VecDeque;

use serde_json::Value;

use crate::command::Command;
use crate::models::{LoginReply, ResponseEnvelope};
use crate::options::OverflowPolicy;
use crate::session::StoredSession;

/// Authenticated-session state, cleared whenever the socket closes.
#[derive(Debug, Default)]
pub(crate) struct Session {
    pub logged_in: bool,
    pub player_id: Option<String>,
    pub token: Option<String>,
}

/// What the gate decided to do with a submitted command.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum GateDecision {
    /// Transmit now; the payload is handed back to the caller.
    Transmit(Value),
    /// Parked in the pending queue.
    Queued,
    /// Dropped by the overflow policy, without caller-visible feedback.
    Dropped,
    /// Dropped by the overflow policy; surface through the error hook.
    Rejected,
}

/// Outcome of a login reply.
pub(crate) enum LoginOutcome {
    Success {
        /// Resumption material to persist, when the reply payload parsed.
        session: Option<StoredSession>,
        /// Queued requests to transmit, in their original order.
        drained: Vec<(Command, Value)>,
    },
    Failure {
        code: i32,
        message: String,
    },
}

pub(crate) struct AuthGate {
    session: Session,
    pending: VecDeque<(Command, Value)>,
    max_pending: usize,
    overflow_policy: OverflowPolicy,
}

impl AuthGate {
    pub fn new(max_pending: usize, overflow_policy: OverflowPolicy) -> Self {
        Self {
            session: Session::default(),
            pending: VecDeque::new(),
            max_pending,
            overflow_policy,
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.logged_in
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Decide what to do with an outbound command.
    pub fn submit(&mut self, command: Command, payload: Value) -> GateDecision {
        if command == Command::Login || self.session.logged_in {
            return GateDecision::Transmit(payload);
        }

        if self.pending.len() >= self.max_pending {
            match self.overflow_policy {
                OverflowPolicy::DropOldest => {
                    if let Some((dropped, _)) = self.pending.pop_front() {
                        log::warn!(
                            "[scene-link] Pending queue full, evicting oldest {} to queue {}",
                            dropped,
                            command
                        );
                    }
                }
                OverflowPolicy::DropNewest => {
                    log::warn!("[scene-link] Pending queue full, dropping {}", command);
                    return GateDecision::Dropped;
                }
                OverflowPolicy::RejectNew => {
                    log::warn!("[scene-link] Pending queue full, rejecting {}", command);
                    return GateDecision::Rejected;
                }
            }
        }

        log::debug!(
            "[scene-link] Not logged in, queueing {} ({} pending)",
            command,
            self.pending.len() + 1
        );
        self.pending.push_back((command, payload));
        GateDecision::Queued
    }

    /// Process a login reply envelope.
    ///
    /// On success the session opens and the pending queue is drained in
    /// insertion order. A success reply whose payload does not parse still
    /// opens the gate (the server accepted the session); only the
    /// resumption material is unavailable.
    pub fn on_login_reply(&mut self, envelope: &ResponseEnvelope) -> LoginOutcome {
        if !envelope.is_success() {
            return LoginOutcome::Failure {
                code: envelope.code,
                message: envelope.message.clone(),
            };
        }

        match serde_json::from_value::<LoginReply>(envelope.data.clone()) {
            Ok(reply) => {
                self.session.player_id = Some(reply.player.player_id);
                self.session.token = Some(reply.token);
            }
            Err(e) => {
                log::warn!("[scene-link] Login reply payload did not parse: {}", e);
            }
        }
        let session = self
            .session
            .player_id
            .clone()
            .zip(self.session.token.clone())
            .map(|(player_id, token)| StoredSession { player_id, token });

        self.session.logged_in = true;
        let drained: Vec<(Command, Value)> = std::mem::take(&mut self.pending).into();
        if !drained.is_empty() {
            log::info!(
                "[scene-link] Login succeeded, flushing {} pending request(s)",
                drained.len()
            );
        }
        LoginOutcome::Success { session, drained }
    }

    /// Clear the in-memory session. The pending queue is retained: a
    /// passive connection drop must not lose buffered requests.
    pub fn clear_session(&mut self) {
        self.session = Session::default();
    }

    /// Discard all pending requests (application-initiated teardown).
    pub fn clear_pending(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        dropped
    }
}
