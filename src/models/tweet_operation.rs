use serde::{Deserialize, Serialize};

/// Mutation payload for the tweet-operation command.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TweetOperation {
    pub tweet_id: String,
    /// Operation kind: `"like"`, `"comment"`, or `"vote"`.
    pub operation: String,
    /// Comment text or vote choice, depending on the operation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl TweetOperation {
    pub fn like(tweet_id: impl Into<String>) -> Self {
        Self {
            tweet_id: tweet_id.into(),
            operation: "like".to_string(),
            content: None,
        }
    }

    pub fn comment(tweet_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            tweet_id: tweet_id.into(),
            operation: "comment".to_string(),
            content: Some(text.into()),
        }
    }

    pub fn vote_choice(tweet_id: impl Into<String>, choice: impl Into<String>) -> Self {
        Self {
            tweet_id: tweet_id.into(),
            operation: "vote".to_string(),
            content: Some(choice.into()),
        }
    }
}
