//! Backend port traits.
//!
//! The application layer talks to the REST API only through these traits, so
//! the orchestrator can run against an in-memory backend in tests and against
//! the HTTP client in production.

use crate::error::Result;
use crate::session::{Blob, ChatMessage, NewBlob, Project, Session};

/// Session reads, content writes and batch control.
#[async_trait::async_trait]
pub trait SessionApi: Send + Sync {
    /// Fetches one session including `status` and `pending_tasks`.
    ///
    /// # Returns
    ///
    /// - `Ok(Session)`: Session found
    /// - `Err(FoundryError::NotFound)`: No session with this id
    /// - `Err(FoundryError::Transport)`: The request never completed
    async fn get_session(&self, session_id: &str) -> Result<Session>;

    /// Lists the sessions of a project.
    async fn list_sessions(&self, project_id: &str) -> Result<Vec<Session>>;

    /// Submits an ordered task batch as a single request.
    ///
    /// # Arguments
    ///
    /// * `session_id` - Session the batch runs in
    /// * `tasks` - Task prompts in execution order
    async fn queue_tasks(&self, session_id: &str, tasks: &[String]) -> Result<()>;

    /// Replaces the session's `content` field.
    ///
    /// # Arguments
    ///
    /// * `session_id` - Session to update
    /// * `content` - Full serialized content document
    /// * `expected_version` - `updated_at` of the snapshot the write was based
    ///   on. When present the write only succeeds if the server still holds
    ///   that version.
    ///
    /// # Returns
    ///
    /// - `Ok(Session)`: The session as stored after the write
    /// - `Err(FoundryError::Conflict)`: The server copy changed since
    ///   `expected_version`
    async fn update_content(
        &self,
        session_id: &str,
        content: &str,
        expected_version: Option<&str>,
    ) -> Result<Session>;

    /// Asks the backend to stop the running batch. Acceptance does not mean
    /// the batch is stopped; the status reports that.
    async fn cancel(&self, session_id: &str) -> Result<()>;

    /// Asks the backend to resume the batch from its remaining `pending_tasks`.
    async fn retry(&self, session_id: &str) -> Result<()>;
}

/// Artifact storage.
#[async_trait::async_trait]
pub trait BlobApi: Send + Sync {
    async fn list_blobs(&self, session_id: &str) -> Result<Vec<Blob>>;

    /// Uploads a new blob. Always creates a new id.
    async fn upload_blob(&self, session_id: &str, blob: NewBlob) -> Result<Blob>;

    async fn delete_blob(&self, blob_id: &str) -> Result<()>;

    async fn download_blob(&self, blob_id: &str) -> Result<Vec<u8>>;
}

/// Session chat.
#[async_trait::async_trait]
pub trait ChatApi: Send + Sync {
    /// Sends a user message. The assistant's answer shows up in
    /// [`ChatApi::list_messages`].
    async fn send_message(&self, session_id: &str, message: &str) -> Result<()>;

    /// Full chat history, oldest first.
    async fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>>;

    /// Deletes the whole chat history of a session.
    async fn clear_messages(&self, session_id: &str) -> Result<()>;
}

#[async_trait::async_trait]
pub trait ProjectApi: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<Project>>;
}

/// Everything the orchestrator needs from the backend.
pub trait Backend: SessionApi + BlobApi + ChatApi + ProjectApi {}

impl<T> Backend for T where T: SessionApi + BlobApi + ChatApi + ProjectApi {}
