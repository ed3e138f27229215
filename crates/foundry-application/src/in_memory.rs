//! In-memory backend used by tests and offline demos.
//!
//! Behaves like the REST API closely enough for the orchestrator: status
//! changes on queue/retry, conditional content writes, immutable blobs with
//! fresh ids. Poll responses can be scripted per session and any operation
//! can be made to fail once.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use foundry_core::backend::{BlobApi, ChatApi, ProjectApi, SessionApi};
use foundry_core::error::{FoundryError, Result};
use foundry_core::session::{
    Blob, ChatMessage, MessageRole, NewBlob, Project, Session, SessionStatus,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// Backend operations, used for call logs and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    GetSession,
    ListSessions,
    QueueTasks,
    UpdateContent,
    Cancel,
    Retry,
    ListBlobs,
    UploadBlob,
    DeleteBlob,
    DownloadBlob,
    SendMessage,
    ListMessages,
    ClearMessages,
    ListProjects,
}

/// One recorded backend call: the operation and the id it referenced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub op: Op,
    pub target: String,
}

/// State the session reports on one scripted `get_session`.
#[derive(Debug, Clone, PartialEq)]
pub enum PollStep {
    Status { status: SessionStatus, pending: usize },
    Fail(FoundryError),
}

impl PollStep {
    pub fn processing(pending: usize) -> Self {
        Self::Status {
            status: SessionStatus::Processing,
            pending,
        }
    }

    pub fn finished(status: SessionStatus) -> Self {
        Self::Status { status, pending: 0 }
    }
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, Session>,
    blobs: HashMap<String, Vec<Blob>>,
    blob_bytes: HashMap<String, Vec<u8>>,
    messages: HashMap<String, Vec<ChatMessage>>,
    replies: HashMap<String, VecDeque<String>>,
    projects: Vec<Project>,
    scripts: HashMap<String, VecDeque<PollStep>>,
    failures: HashMap<Op, VecDeque<FoundryError>>,
    calls: Vec<Call>,
    id_counters: HashMap<String, usize>,
    clock: i64,
}

impl Inner {
    fn record(&mut self, op: Op, target: &str) -> Result<()> {
        self.calls.push(Call {
            op,
            target: target.to_string(),
        });
        match self.failures.get_mut(&op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Deterministic fake clock: one second per mutation from a fixed epoch.
    fn tick(&mut self) -> String {
        self.clock += 1;
        (epoch() + Duration::seconds(self.clock)).to_rfc3339()
    }

    fn next_id(&mut self, prefix: &str) -> String {
        let counter = self.id_counters.entry(prefix.to_string()).or_insert(0);
        *counter += 1;
        format!("{prefix}-{counter}")
    }

    fn session_mut(&mut self, session_id: &str) -> Result<&mut Session> {
        self.sessions
            .get_mut(session_id)
            .ok_or_else(|| FoundryError::not_found("Session", session_id))
    }
}

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

#[derive(Default)]
pub struct InMemoryBackend {
    inner: Mutex<Inner>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_project(&self, id: &str, name: &str) {
        let mut inner = self.lock();
        let now = inner.tick();
        inner.projects.push(Project {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            created_at: now.clone(),
            updated_at: now,
        });
    }

    /// Inserts (or replaces) a session as-is.
    pub fn insert_session(&self, session: Session) {
        self.lock().sessions.insert(session.id.clone(), session);
    }

    /// Creates a fresh `pending` session with empty content.
    pub fn create_session(&self, id: &str, project_id: &str, title: &str) -> Session {
        let mut inner = self.lock();
        let mut session = Session::new(id, project_id, title);
        let now = inner.tick();
        session.created_at = now.clone();
        session.updated_at = now;
        inner.sessions.insert(id.to_string(), session.clone());
        session
    }

    pub fn session(&self, session_id: &str) -> Option<Session> {
        self.lock().sessions.get(session_id).cloned()
    }

    pub fn blobs(&self, session_id: &str) -> Vec<Blob> {
        self.lock().blobs.get(session_id).cloned().unwrap_or_default()
    }

    /// Scripts the states reported by successive `get_session` calls.
    /// Once the script runs out the session keeps its last state.
    pub fn script_polls(&self, session_id: &str, steps: impl IntoIterator<Item = PollStep>) {
        self.lock()
            .scripts
            .entry(session_id.to_string())
            .or_default()
            .extend(steps);
    }

    /// Makes the next call of `op` fail with `err`.
    pub fn fail_next(&self, op: Op, err: FoundryError) {
        self.lock().failures.entry(op).or_default().push_back(err);
    }

    /// Queues the assistant's answer to the next chat message.
    pub fn script_reply(&self, session_id: &str, reply: &str) {
        self.lock()
            .replies
            .entry(session_id.to_string())
            .or_default()
            .push_back(reply.to_string());
    }

    /// Simulates another client writing the session's content.
    pub fn external_write(&self, session_id: &str, content: &str) -> Result<()> {
        let mut inner = self.lock();
        let now = inner.tick();
        let session = inner.session_mut(session_id)?;
        session.content = content.to_string();
        session.updated_at = now;
        Ok(())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn count_calls(&self, op: Op, target: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.op == op && call.target == target)
            .count()
    }

    /// Number of calls of any kind that referenced `target`.
    pub fn calls_for(&self, target: &str) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.target == target)
            .count()
    }
}

#[async_trait]
impl SessionApi for InMemoryBackend {
    async fn get_session(&self, session_id: &str) -> Result<Session> {
        let mut inner = self.lock();
        inner.record(Op::GetSession, session_id)?;

        let step = inner
            .scripts
            .get_mut(session_id)
            .and_then(VecDeque::pop_front);
        match step {
            Some(PollStep::Fail(err)) => return Err(err),
            Some(PollStep::Status { status, pending }) => {
                let now = inner.tick();
                let session = inner.session_mut(session_id)?;
                session.status = status;
                session.pending_tasks.truncate(pending);
                while session.pending_tasks.len() < pending {
                    session.pending_tasks.push(format!("task-{}", session.pending_tasks.len()));
                }
                session.updated_at = now;
            }
            None => {}
        }

        inner
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| FoundryError::not_found("Session", session_id))
    }

    async fn list_sessions(&self, project_id: &str) -> Result<Vec<Session>> {
        let mut inner = self.lock();
        inner.record(Op::ListSessions, project_id)?;
        Ok(inner
            .sessions
            .values()
            .filter(|session| session.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn queue_tasks(&self, session_id: &str, tasks: &[String]) -> Result<()> {
        let mut inner = self.lock();
        inner.record(Op::QueueTasks, session_id)?;
        let now = inner.tick();
        let session = inner.session_mut(session_id)?;
        session.status = SessionStatus::Processing;
        session.pending_tasks = tasks.to_vec();
        session.updated_at = now;
        Ok(())
    }

    async fn update_content(
        &self,
        session_id: &str,
        content: &str,
        expected_version: Option<&str>,
    ) -> Result<Session> {
        let mut inner = self.lock();
        inner.record(Op::UpdateContent, session_id)?;
        let now = inner.tick();
        let session = inner.session_mut(session_id)?;
        if let Some(expected) = expected_version
            && expected != session.updated_at
        {
            return Err(FoundryError::conflict(format!(
                "Session '{session_id}' changed on the server: expected {expected}, found {}",
                session.updated_at
            )));
        }
        session.content = content.to_string();
        session.updated_at = now;
        Ok(session.clone())
    }

    async fn cancel(&self, session_id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.record(Op::Cancel, session_id)?;
        inner.session_mut(session_id)?;
        Ok(())
    }

    async fn retry(&self, session_id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.record(Op::Retry, session_id)?;
        let now = inner.tick();
        let session = inner.session_mut(session_id)?;
        session.status = SessionStatus::Processing;
        session.updated_at = now;
        Ok(())
    }
}

#[async_trait]
impl BlobApi for InMemoryBackend {
    async fn list_blobs(&self, session_id: &str) -> Result<Vec<Blob>> {
        let mut inner = self.lock();
        inner.record(Op::ListBlobs, session_id)?;
        Ok(inner.blobs.get(session_id).cloned().unwrap_or_default())
    }

    async fn upload_blob(&self, session_id: &str, blob: NewBlob) -> Result<Blob> {
        let mut inner = self.lock();
        inner.record(Op::UploadBlob, session_id)?;
        inner.session_mut(session_id)?;

        let prefix = blob
            .file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_else(|| "blob".to_string());
        let id = inner.next_id(&prefix);
        let created_at = inner.tick();
        let stored = Blob {
            id: id.clone(),
            session_id: session_id.to_string(),
            file_name: blob.file_name,
            content_type: blob.content_type,
            size: blob.bytes.len() as u64,
            created_at,
        };
        inner.blob_bytes.insert(id, blob.bytes);
        inner
            .blobs
            .entry(session_id.to_string())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn delete_blob(&self, blob_id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.record(Op::DeleteBlob, blob_id)?;
        let mut found = false;
        for blobs in inner.blobs.values_mut() {
            let before = blobs.len();
            blobs.retain(|blob| blob.id != blob_id);
            found |= blobs.len() != before;
        }
        inner.blob_bytes.remove(blob_id);
        if found {
            Ok(())
        } else {
            Err(FoundryError::not_found("Blob", blob_id))
        }
    }

    async fn download_blob(&self, blob_id: &str) -> Result<Vec<u8>> {
        let mut inner = self.lock();
        inner.record(Op::DownloadBlob, blob_id)?;
        inner
            .blob_bytes
            .get(blob_id)
            .cloned()
            .ok_or_else(|| FoundryError::not_found("Blob", blob_id))
    }
}

#[async_trait]
impl ChatApi for InMemoryBackend {
    async fn send_message(&self, session_id: &str, message: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.record(Op::SendMessage, session_id)?;
        inner.session_mut(session_id)?;

        let user_id = inner.next_id("msg");
        let user_at = inner.tick();
        let reply = inner
            .replies
            .get_mut(session_id)
            .and_then(VecDeque::pop_front);

        let mut appended = vec![ChatMessage {
            id: user_id,
            session_id: session_id.to_string(),
            role: MessageRole::User,
            content: message.to_string(),
            created_at: user_at,
        }];
        if let Some(reply) = reply {
            appended.push(ChatMessage {
                id: inner.next_id("msg"),
                session_id: session_id.to_string(),
                role: MessageRole::Assistant,
                content: reply,
                created_at: inner.tick(),
            });
        }
        inner
            .messages
            .entry(session_id.to_string())
            .or_default()
            .extend(appended);
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        let mut inner = self.lock();
        inner.record(Op::ListMessages, session_id)?;
        Ok(inner.messages.get(session_id).cloned().unwrap_or_default())
    }

    async fn clear_messages(&self, session_id: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.record(Op::ClearMessages, session_id)?;
        inner.session_mut(session_id)?;
        inner.messages.remove(session_id);
        Ok(())
    }
}

#[async_trait]
impl ProjectApi for InMemoryBackend {
    async fn list_projects(&self) -> Result<Vec<Project>> {
        let mut inner = self.lock();
        inner.record(Op::ListProjects, "*")?;
        Ok(inner.projects.clone())
    }
}
