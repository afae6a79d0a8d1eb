use serde::{Deserialize, Serialize};

/// Liveness probe payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatPing {
    /// Wall-clock send time, milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Stable identifier for this client process.
    pub client_id: String,
}
