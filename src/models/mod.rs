//! Wire-level data models.

mod envelope;
mod heartbeat_ping;
mod login_request;
mod login_response;
mod tweet_operation;

pub use envelope::{MESSAGE_TYPE_REQUEST, RequestEnvelope, ResponseEnvelope};
pub use heartbeat_ping::HeartbeatPing;
pub use login_request::LoginRequest;
pub use login_response::{LoginReply, PlayerInfo};
pub use tweet_operation::TweetOperation;
