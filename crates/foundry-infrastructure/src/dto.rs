//! Data Transfer Objects (DTOs) for the REST API.
//!
//! Response DTOs mirror what the backend sends, with every optional field
//! tolerated, and convert into domain types. Request DTOs are the JSON bodies
//! the client posts.

use foundry_core::session::{Blob, ChatMessage, MessageRole, Project, Session, SessionStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionResponse {
    pub id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    /// `null` for sessions that never had content written.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub status: Option<SessionStatus>,
    #[serde(default)]
    pub pending_tasks: Option<Vec<String>>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl From<SessionResponse> for Session {
    fn from(dto: SessionResponse) -> Self {
        Session {
            id: dto.id,
            project_id: dto.project_id.unwrap_or_default(),
            title: dto.title.unwrap_or_default(),
            content: dto.content.unwrap_or_default(),
            status: dto.status.unwrap_or_default(),
            pending_tasks: dto.pending_tasks.unwrap_or_default(),
            created_at: dto.created_at.unwrap_or_default(),
            updated_at: dto.updated_at.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BlobResponse {
    pub id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub file_name: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl BlobResponse {
    /// Converts into a domain blob, filling in the session the listing was
    /// requested for when the backend omits it.
    pub fn into_blob(self, session_id: &str) -> Blob {
        Blob {
            id: self.id,
            session_id: self.session_id.unwrap_or_else(|| session_id.to_string()),
            file_name: self.file_name,
            content_type: self.content_type.unwrap_or_default(),
            size: self.size.unwrap_or_default(),
            created_at: self.created_at.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageResponse {
    pub id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub role: MessageRole,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl MessageResponse {
    pub fn into_message(self, session_id: &str) -> ChatMessage {
        ChatMessage {
            id: self.id,
            session_id: self.session_id.unwrap_or_else(|| session_id.to_string()),
            role: self.role,
            content: self.content,
            created_at: self.created_at.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProjectResponse {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl From<ProjectResponse> for Project {
    fn from(dto: ProjectResponse) -> Self {
        Project {
            id: dto.id,
            name: dto.name,
            description: dto.description.unwrap_or_default(),
            created_at: dto.created_at.unwrap_or_default(),
            updated_at: dto.updated_at.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QueueTasksRequest<'a> {
    pub tasks: &'a [String],
}

#[derive(Debug, Serialize)]
pub struct UpdateContentRequest<'a> {
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub message: &'a str,
}

/// Error body shape used by the backend: `{"error": "..."}` or
/// `{"message": "..."}`.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorResponse {
    pub fn into_message(self) -> Option<String> {
        self.error.or(self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_with_nulls_converts_to_defaults() {
        let dto: SessionResponse = serde_json::from_str(
            r#"{"id":"s1","project_id":"p1","title":"Drone","content":null,"status":"processing","pending_tasks":null}"#,
        )
        .unwrap();
        let session: Session = dto.into();

        assert_eq!(session.id, "s1");
        assert_eq!(session.content, "");
        assert_eq!(session.status, SessionStatus::Processing);
        assert!(session.pending_tasks.is_empty());
        assert!(session.version().is_none());
    }

    #[test]
    fn test_session_pending_tasks_keep_order() {
        let dto: SessionResponse =
            serde_json::from_str(r#"{"id":"s1","status":"pending","pending_tasks":["a","b","c"]}"#).unwrap();
        let session = Session::from(dto);
        assert_eq!(session.pending_tasks, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_blob_fills_missing_session() {
        let dto: BlobResponse =
            serde_json::from_str(r#"{"id":"b1","file_name":"bom.csv","size":120}"#).unwrap();
        let blob = dto.into_blob("s9");
        assert_eq!(blob.session_id, "s9");
        assert_eq!(blob.size, 120);
        assert!(blob.is_tabular());
    }

    #[test]
    fn test_request_bodies() {
        let tasks = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            serde_json::to_string(&QueueTasksRequest { tasks: &tasks }).unwrap(),
            r#"{"tasks":["a","b"]}"#
        );
        assert_eq!(
            serde_json::to_string(&UpdateContentRequest { content: "{}" }).unwrap(),
            r#"{"content":"{}"}"#
        );
    }

    #[test]
    fn test_error_body_variants() {
        let body: ErrorResponse = serde_json::from_str(r#"{"error":"bad token"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("bad token"));
        let body: ErrorResponse = serde_json::from_str(r#"{"message":"nope"}"#).unwrap();
        assert_eq!(body.into_message().as_deref(), Some("nope"));
    }
}
