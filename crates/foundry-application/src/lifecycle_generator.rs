//! Asks the session's assistant to propose lifecycle phases.
//!
//! The assistant answers in prose; the first JSON array of strings in its
//! reply becomes the lifecycle's steps, starting at phase 0.

use crate::content_writer::ContentWriter;
use foundry_core::backend::{ChatApi, SessionApi};
use foundry_core::config::PollSettings;
use foundry_core::content::{extract_string_array, ContentPatch, Lifecycle};
use foundry_core::error::{FoundryError, Result};
use foundry_core::session::{latest_reply, Session};
use std::sync::Arc;

pub const LIFECYCLE_PROMPT: &str = "Based on this session's documents, propose the lifecycle phases \
this product goes through from concept to delivery. Reply with a JSON array of short phase names \
only, for example [\"Concept\", \"Prototype\", \"Pilot Run\", \"Mass Production\"].";

/// How many times the chat history is re-read while waiting for the answer.
const REPLY_POLL_ATTEMPTS: u32 = 30;

pub struct LifecycleGenerator<B: SessionApi + ChatApi + ?Sized> {
    backend: Arc<B>,
    writer: ContentWriter<B>,
    settings: PollSettings,
}

impl<B: SessionApi + ChatApi + ?Sized> LifecycleGenerator<B> {
    pub fn new(backend: Arc<B>, writer: ContentWriter<B>, settings: PollSettings) -> Self {
        Self {
            backend,
            writer,
            settings,
        }
    }

    /// Generates steps and stores them as the session's lifecycle.
    ///
    /// Returns the stored session and the new lifecycle. A reply without a
    /// usable array is a validation error and nothing is written.
    pub async fn generate(&self, snapshot: &Session) -> Result<(Session, Lifecycle)> {
        let reply = self.ask(&snapshot.id).await?;
        let steps = extract_string_array(&reply).ok_or_else(|| {
            tracing::warn!(
                "[LifecycleGenerator] no phase list in reply for {}: {:?}",
                snapshot.id,
                reply
            );
            FoundryError::validation("the assistant did not return a list of phases")
        })?;

        tracing::info!(
            "[LifecycleGenerator] {} phases proposed for {}",
            steps.len(),
            snapshot.id
        );
        let lifecycle = Lifecycle::new(steps);
        let stored = self
            .writer
            .write(snapshot, &ContentPatch::SetLifecycle(lifecycle.clone()))
            .await?;
        Ok((stored, lifecycle))
    }

    /// Sends the prompt and waits for a reply newer than the last one seen.
    async fn ask(&self, session_id: &str) -> Result<String> {
        let before = self.backend.list_messages(session_id).await?;
        let previous = latest_reply(&before).map(|message| message.id.clone());

        self.backend.send_message(session_id, LIFECYCLE_PROMPT).await?;

        for attempt in 1..=REPLY_POLL_ATTEMPTS {
            let messages = self.backend.list_messages(session_id).await?;
            if let Some(reply) = latest_reply(&messages)
                && Some(&reply.id) != previous.as_ref()
            {
                return Ok(reply.content.clone());
            }
            tracing::debug!(
                "[LifecycleGenerator] waiting for reply in {} ({}/{})",
                session_id,
                attempt,
                REPLY_POLL_ATTEMPTS
            );
            tokio::time::sleep(self.settings.interval()).await;
        }

        Err(FoundryError::transport(format!(
            "no reply from the assistant in session '{session_id}'"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::{InMemoryBackend, Op};
    use foundry_core::content::SessionContent;

    fn generator(backend: &Arc<InMemoryBackend>) -> LifecycleGenerator<InMemoryBackend> {
        let settings = PollSettings {
            interval_ms: 1,
            ..PollSettings::default()
        };
        LifecycleGenerator::new(backend.clone(), ContentWriter::new(backend.clone(), 3), settings)
    }

    #[tokio::test]
    async fn test_generate_stores_extracted_steps() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.create_session("s1", "p1", "Drone");
        backend
            .external_write("s1", r#"{"comments":{"pdf-1":["ok"]}}"#)
            .unwrap();
        backend.script_reply(
            "s1",
            r#"Sure! Here are the phases: ["Design", "Prototype", "Certification"]. Good luck."#,
        );
        let snapshot = backend.session("s1").unwrap();

        let (stored, lifecycle) = generator(&backend).generate(&snapshot).await.unwrap();

        assert_eq!(lifecycle.steps, vec!["Design", "Prototype", "Certification"]);
        assert_eq!(lifecycle.current_step, 0);
        let content = SessionContent::parse(&stored.content);
        assert_eq!(content.lifecycle, Some(lifecycle));
        assert!(content.comments.unwrap().has_comments("pdf-1"));
    }

    #[tokio::test]
    async fn test_reply_without_array_writes_nothing() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.create_session("s1", "p1", "Drone");
        backend.script_reply("s1", "I need more information first.");
        let snapshot = backend.session("s1").unwrap();

        let err = generator(&backend).generate(&snapshot).await.unwrap_err();

        assert!(err.is_validation());
        assert_eq!(backend.count_calls(Op::UpdateContent, "s1"), 0);
    }

    #[tokio::test]
    async fn test_missing_reply_times_out() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.create_session("s1", "p1", "Drone");
        let snapshot = backend.session("s1").unwrap();

        let err = generator(&backend).generate(&snapshot).await.unwrap_err();

        assert!(err.is_transport());
        assert_eq!(
            backend.count_calls(Op::ListMessages, "s1"),
            1 + REPLY_POLL_ATTEMPTS as usize
        );
    }
}
