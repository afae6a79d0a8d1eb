//! Command codes for the scene wire protocol.
//!
//! Every message on the socket carries an integer command code that
//! identifies its semantic operation. The code is the only framing
//! discriminator: replies are matched to traffic by command code, not by
//! request id.

use std::fmt;

/// The closed set of command codes spoken by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Command {
    /// Authenticate the session.
    Login = 1,
    /// Paged content feed request/response.
    GetSceneFeed = 2,
    /// Voting history request/response.
    VoteThread = 3,
    /// Per-room chat summaries.
    GetCharacterHistory = 4,
    /// Like/comment/vote-choice mutation.
    OperateTweet = 5,
    /// Liveness probe/reply.
    Heartbeat = 6,
}

impl Command {
    /// The wire-level integer code.
    pub fn code(self) -> u16 {
        self as u16
    }

    /// Map a wire code back to a known command, if any.
    ///
    /// Unknown codes are not an error at this layer; inbound envelopes keep
    /// their raw code and are dropped by the dispatcher when nothing is
    /// registered for them.
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::Login),
            2 => Some(Self::GetSceneFeed),
            3 => Some(Self::VoteThread),
            4 => Some(Self::GetCharacterHistory),
            5 => Some(Self::OperateTweet),
            6 => Some(Self::Heartbeat),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Login => "LOGIN",
            Self::GetSceneFeed => "GET_SCENE_FEED",
            Self::VoteThread => "VOTE_THREAD",
            Self::GetCharacterHistory => "GET_CHARACTER_HISTORY",
            Self::OperateTweet => "OPERATE_TWEET",
            Self::Heartbeat => "HEARTBEAT",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for command in [
            Command::Login,
            Command::GetSceneFeed,
            Command::VoteThread,
            Command::GetCharacterHistory,
            Command::OperateTweet,
            Command::Heartbeat,
        ] {
            assert_eq!(Command::from_code(command.code()), Some(command));
        }
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(Command::from_code(0), None);
        assert_eq!(Command::from_code(99), None);
    }
}
