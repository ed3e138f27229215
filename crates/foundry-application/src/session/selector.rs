use super::controller::SessionController;
use foundry_core::backend::Backend;
use foundry_core::config::PollSettings;
use foundry_core::error::Result;
use std::sync::Arc;

/// Tracks the selected session. Selecting another session discards the
/// previous controller, stopping its poll loop first.
pub struct SessionSelector<B: Backend + ?Sized + 'static> {
    backend: Arc<B>,
    settings: PollSettings,
    current: Option<SessionController<B>>,
}

impl<B: Backend + ?Sized + 'static> SessionSelector<B> {
    pub fn new(backend: Arc<B>, settings: PollSettings) -> Self {
        Self {
            backend,
            settings,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&SessionController<B>> {
        self.current.as_ref()
    }

    pub async fn select(&mut self, session_id: &str) -> Result<&SessionController<B>> {
        if let Some(previous) = self.current.take() {
            tracing::info!(
                "[SessionSelector] switching from {} to {}",
                previous.session_id(),
                session_id
            );
            previous.stop();
        }

        let controller =
            SessionController::open(self.backend.clone(), self.settings.clone(), session_id).await?;
        Ok(self.current.insert(controller))
    }

    pub fn clear(&mut self) {
        if let Some(previous) = self.current.take() {
            previous.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::{InMemoryBackend, Op};
    use foundry_core::session::{Session, SessionStatus};
    use std::time::Duration;

    fn processing(id: &str) -> Session {
        let mut session = Session::new(id, "p1", id);
        session.status = SessionStatus::Processing;
        session
    }

    #[tokio::test]
    async fn test_switching_stops_previous_loop() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.insert_session(processing("s1"));
        backend.insert_session(processing("s2"));
        let settings = PollSettings {
            interval_ms: 1,
            ..PollSettings::default()
        };
        let mut selector = SessionSelector::new(backend.clone(), settings);

        assert!(selector.select("s1").await.unwrap().is_polling());
        tokio::time::sleep(Duration::from_millis(10)).await;

        selector.select("s2").await.unwrap();
        let s1_polls = backend.count_calls(Op::GetSession, "s1");
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(backend.count_calls(Op::GetSession, "s1"), s1_polls);
        assert!(backend.count_calls(Op::GetSession, "s2") > 1);
        assert_eq!(selector.current().map(|c| c.session_id()).as_deref(), Some("s2"));

        selector.clear();
        assert!(selector.current().is_none());
    }

    #[tokio::test]
    async fn test_selecting_idle_session_does_not_poll() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.create_session("s1", "p1", "Idle");
        let mut selector = SessionSelector::new(backend.clone(), PollSettings::default());

        let controller = selector.select("s1").await.unwrap();

        assert!(!controller.is_polling());
        assert_eq!(backend.count_calls(Op::GetSession, "s1"), 1);
    }
}
