//! Session domain model.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Processing status of a session, as reported by the backend.
///
/// The client never assigns this locally; it only reads what the backend
/// returns and reacts to transitions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Cancelled,
    Error,
    /// Any status string this client does not know about. Treated as
    /// non-terminal so polling keeps observing it.
    #[serde(other)]
    Unknown,
}

impl SessionStatus {
    /// Terminal statuses end a poll loop run.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Error)
    }

    /// Statuses that offer a retry affordance.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Cancelled | Self::Error)
    }
}

/// A unit of work holding uploaded/generated artifacts, chat history and one
/// orchestrated generation batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque identifier, stable for the session lifetime
    pub id: String,
    /// Owning project
    #[serde(default)]
    pub project_id: String,
    /// Human-readable session title
    #[serde(default)]
    pub title: String,
    /// Opaque text field shared by independently-owned sections
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub status: SessionStatus,
    /// Tasks the backend has not finished yet, in execution order
    #[serde(default)]
    pub pending_tasks: Vec<String>,
    /// Timestamp when the session was created (ISO 8601 format)
    #[serde(default)]
    pub created_at: String,
    /// Timestamp of the last server-side update (ISO 8601 format).
    /// Also used as the version token for conditional content writes.
    #[serde(default)]
    pub updated_at: String,
}

impl Session {
    /// Creates a fresh session record the way the backend does: empty content,
    /// `pending` status, no queued work.
    pub fn new(id: impl Into<String>, project_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: id.into(),
            project_id: project_id.into(),
            title: title.into(),
            content: String::new(),
            status: SessionStatus::Pending,
            pending_tasks: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending_tasks.len()
    }

    pub fn is_processing(&self) -> bool {
        self.status == SessionStatus::Processing
    }

    /// Version token for conditional writes, if the backend supplied one.
    pub fn version(&self) -> Option<&str> {
        if self.updated_at.is_empty() {
            None
        } else {
            Some(self.updated_at.as_str())
        }
    }

    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Untitled Session"
        } else {
            &self.title
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_terminal_statuses() {
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Cancelled.is_terminal());
        assert!(SessionStatus::Error.is_terminal());
        assert!(!SessionStatus::Pending.is_terminal());
        assert!(!SessionStatus::Processing.is_terminal());
        assert!(!SessionStatus::Unknown.is_terminal());
    }

    #[test]
    fn test_status_wire_format() {
        let status: SessionStatus = serde_json::from_str("\"processing\"").unwrap();
        assert_eq!(status, SessionStatus::Processing);
        assert_eq!(serde_json::to_string(&SessionStatus::Error).unwrap(), "\"error\"");
        assert_eq!(SessionStatus::Cancelled.to_string(), "cancelled");
        assert_eq!(SessionStatus::from_str("completed").unwrap(), SessionStatus::Completed);
    }

    #[test]
    fn test_unrecognised_status_is_unknown() {
        let status: SessionStatus = serde_json::from_str("\"active\"").unwrap();
        assert_eq!(status, SessionStatus::Unknown);
    }

    #[test]
    fn test_new_session_shape() {
        let session = Session::new("s1", "p1", "");
        assert!(session.content.is_empty());
        assert_eq!(session.status, SessionStatus::Pending);
        assert_eq!(session.pending_count(), 0);
        assert_eq!(session.display_title(), "Untitled Session");
        assert!(session.version().is_some());
    }
}
