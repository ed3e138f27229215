//! Chat message types.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
    #[serde(other)]
    Other,
}

/// A single message in a session's chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub session_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(default)]
    pub created_at: String,
}

impl ChatMessage {
    pub fn is_from_user(&self) -> bool {
        self.role == MessageRole::User
    }
}

/// Returns the most recent message not authored by the user.
pub fn latest_reply(messages: &[ChatMessage]) -> Option<&ChatMessage> {
    messages.iter().rev().find(|message| !message.is_from_user())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, role: MessageRole, content: &str) -> ChatMessage {
        ChatMessage {
            id: id.into(),
            session_id: "s1".into(),
            role,
            content: content.into(),
            created_at: String::new(),
        }
    }

    #[test]
    fn test_latest_reply_skips_trailing_user_messages() {
        let messages = vec![
            message("m1", MessageRole::Assistant, "first"),
            message("m2", MessageRole::User, "question"),
            message("m3", MessageRole::Assistant, "second"),
            message("m4", MessageRole::User, "follow-up"),
        ];
        assert_eq!(latest_reply(&messages).map(|m| m.id.as_str()), Some("m3"));
        assert!(latest_reply(&messages[1..2]).is_none());
    }
}
