use serde::{Deserialize, Serialize};

/// Login request payload.
///
/// All fields are always serialized; unused fields stay at their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Authentication method, e.g. `"password"` or `"token"`.
    pub login_type: String,
    pub name: String,
    pub password: String,
    pub nick_name: String,
    pub avatar: String,
    pub sex: u8,
    pub time_zone: String,
    pub client_os: String,
    pub user_id: String,
    pub invite_code: String,
    pub invite: String,
    pub address: String,
}

impl LoginRequest {
    /// Build a password login for `name`.
    pub fn password_login(name: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            login_type: "password".to_string(),
            name: name.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Build a session-resume login from a previously stored player id and
    /// token. The token travels in the `password` field, the only secret
    /// slot the payload has.
    pub fn resume(player_id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            login_type: "token".to_string(),
            user_id: player_id.into(),
            password: token.into(),
            ..Self::default()
        }
    }
}
