use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `type` field value stamped on outbound envelopes.
pub const MESSAGE_TYPE_REQUEST: u8 = 1;

/// Outbound wire envelope.
///
/// `request_id` is 0 unless request-id stamping is enabled on the
/// connection; either way the server correlates by `command` alone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    pub request_id: u64,
    #[serde(rename = "type")]
    pub message_type: u8,
    pub command: u16,
    pub data: Value,
}

/// Inbound wire envelope.
///
/// In addition to the outbound shape, replies carry `code` (0 = success)
/// and a diagnostic `message`. Every field except `command` is optional on
/// the wire; missing fields decode to their defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    #[serde(default)]
    pub request_id: u64,
    #[serde(default)]
    pub player_id: Option<String>,
    #[serde(rename = "type", default)]
    pub message_type: u8,
    pub command: u16,
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

impl ResponseEnvelope {
    /// Whether the server reported success for this envelope.
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}
