//! Event dispatcher: routes decoded envelopes to registered handlers.
//!
//! Handlers are keyed by command code. Registration returns a [`HandlerId`]
//! token, so removal is by identity rather than by function pointer
//! comparison. Registering the same closure twice yields two independent
//! registrations, both invoked on dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use crate::models::ResponseEnvelope;

/// Callback invoked with every envelope matching its registered command.
pub type Handler = Arc<dyn Fn(&ResponseEnvelope) + Send + Sync>;

/// Opaque registration token returned by `on`/`subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub(crate) u64);

/// Registry of handlers, invoked synchronously in registration order.
#[derive(Default)]
pub(crate) struct Dispatcher {
    handlers: HashMap<u16, Vec<(HandlerId, Handler)>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handler` to the list for `command`, creating it if absent.
    pub fn insert(&mut self, command: u16, id: HandlerId, handler: Handler) {
        self.handlers.entry(command).or_default().push((id, handler));
    }

    /// Remove the registration matching `id`. No-op if not present.
    pub fn remove(&mut self, command: u16, id: HandlerId) -> bool {
        let Some(list) = self.handlers.get_mut(&command) else {
            return false;
        };
        let before = list.len();
        list.retain(|(entry_id, _)| *entry_id != id);
        let removed = list.len() < before;
        if list.is_empty() {
            self.handlers.remove(&command);
        }
        removed
    }

    /// Invoke every handler registered for the envelope's command.
    ///
    /// Envelopes with no registered handler are dropped after logging.
    pub fn dispatch(&self, envelope: &ResponseEnvelope) {
        let Some(list) = self.handlers.get(&envelope.command) else {
            log::debug!(
                "[scene-link] No handler for command {}, dropping envelope",
                envelope.command
            );
            return;
        };
        for (_, handler) in list {
            handler(envelope);
        }
    }

    #[cfg(test)]
    pub fn handler_count(&self, command: u16) -> usize {
        self.handlers.get(&command).map_or(0, Vec::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use serde_json::Value;
    use std::sync::Mutex;

    fn envelope(command: u16) -> ResponseEnvelope {
        ResponseEnvelope {
            request_id: 0,
            player_id: None,
            message_type: 2,
            command,
            code: 0,
            message: String::new(),
            data: Value::Null,
        }
    }

    #[test]
    fn test_fan_out_in_registration_order() {
        let mut dispatcher = Dispatcher::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second"] {
            let seen = seen.clone();
            let id = HandlerId(if label == "first" { 1 } else { 2 });
            dispatcher.insert(
                Command::GetSceneFeed.code(),
                id,
                Arc::new(move |_| seen.lock().unwrap().push(label)),
            );
        }

        dispatcher.dispatch(&envelope(Command::GetSceneFeed.code()));
        assert_eq!(*seen.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn test_duplicate_registration_fires_twice() {
        let mut dispatcher = Dispatcher::new();
        let count = Arc::new(Mutex::new(0u32));
        let handler: Handler = {
            let count = count.clone();
            Arc::new(move |_| *count.lock().unwrap() += 1)
        };

        dispatcher.insert(Command::VoteThread.code(), HandlerId(1), handler.clone());
        dispatcher.insert(Command::VoteThread.code(), HandlerId(2), handler);
        dispatcher.dispatch(&envelope(Command::VoteThread.code()));

        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[test]
    fn test_remove_by_identity() {
        let mut dispatcher = Dispatcher::new();
        let count = Arc::new(Mutex::new(0u32));
        let handler: Handler = {
            let count = count.clone();
            Arc::new(move |_| *count.lock().unwrap() += 1)
        };

        dispatcher.insert(Command::OperateTweet.code(), HandlerId(1), handler.clone());
        dispatcher.insert(Command::OperateTweet.code(), HandlerId(2), handler);

        assert!(dispatcher.remove(Command::OperateTweet.code(), HandlerId(1)));
        dispatcher.dispatch(&envelope(Command::OperateTweet.code()));
        assert_eq!(*count.lock().unwrap(), 1);

        // Removing again is a no-op.
        assert!(!dispatcher.remove(Command::OperateTweet.code(), HandlerId(1)));
        assert_eq!(dispatcher.handler_count(Command::OperateTweet.code()), 1);
    }

    #[test]
    fn test_unregistered_command_is_dropped() {
        let dispatcher = Dispatcher::new();
        // Must not panic.
        dispatcher.dispatch(&envelope(99));
    }
}
