//! Wire codec: JSON text frames in, typed envelopes out.
//!
//! Pure transforms with no side effects. A decode failure is local to the
//! offending frame; the connection layer logs it and keeps the socket open.

use serde_json::Value;

use crate::error::Result;
use crate::models::{MESSAGE_TYPE_REQUEST, RequestEnvelope, ResponseEnvelope};

/// Serialize an outbound command and payload into a wire frame.
///
/// The payload shape is not validated here; the command code is the only
/// framing discriminator the server looks at.
pub fn encode(command: u16, payload: Value, request_id: u64) -> Result<String> {
    let envelope = RequestEnvelope {
        request_id,
        message_type: MESSAGE_TYPE_REQUEST,
        command,
        data: payload,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Parse an inbound text frame into a [`ResponseEnvelope`].
pub fn decode(raw: &str) -> Result<ResponseEnvelope> {
    Ok(serde_json::from_str(raw)?)
}
