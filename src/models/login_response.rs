use serde::{Deserialize, Serialize};

/// Payload of a successful login reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoginReply {
    /// Session token; persisted for session resumption.
    pub token: String,
    /// Authenticated player information.
    pub player: PlayerInfo,
}

/// Player information carried in the login reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub player_id: String,
    // `charater` is the server's spelling of this field.
    #[serde(rename = "charater", default)]
    pub character: String,
    #[serde(default)]
    pub login_type: String,
    #[serde(default)]
    pub address: String,
}
