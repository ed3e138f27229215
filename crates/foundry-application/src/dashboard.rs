//! Cross-project overview of sessions and their lifecycle phase.

use chrono::{DateTime, Duration, Utc};
use foundry_core::backend::{ProjectApi, SessionApi};
use foundry_core::content::{LifecycleSummary, SessionContent};
use foundry_core::error::Result;
use foundry_core::session::{Project, Session, SessionStatus};
use futures::future::join_all;
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;

/// Sessions touched within this window are highlighted.
const RECENT_WINDOW_HOURS: i64 = 24;

/// One row of the overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionCard {
    pub project_id: String,
    pub project_name: String,
    pub session_id: String,
    pub title: String,
    pub status: SessionStatus,
    pub lifecycle: LifecycleSummary,
    pub updated_at: String,
    pub recently_updated: bool,
}

pub struct Dashboard<B: SessionApi + ProjectApi + ?Sized> {
    backend: Arc<B>,
}

impl<B: SessionApi + ProjectApi + ?Sized> Dashboard<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub async fn overview(&self) -> Result<Vec<SessionCard>> {
        self.overview_at(Utc::now()).await
    }

    /// Builds the overview as seen at `now`, newest first.
    ///
    /// Projects whose sessions cannot be listed are skipped with a warning.
    pub async fn overview_at(&self, now: DateTime<Utc>) -> Result<Vec<SessionCard>> {
        let projects = self.backend.list_projects().await?;
        let listings = join_all(
            projects
                .iter()
                .map(|project| self.backend.list_sessions(&project.id)),
        )
        .await;

        let mut cards = Vec::new();
        for (project, listing) in projects.iter().zip(listings) {
            match listing {
                Ok(sessions) => cards.extend(
                    sessions
                        .into_iter()
                        .map(|session| SessionCard::new(project, session, now)),
                ),
                Err(err) => tracing::warn!(
                    "[Dashboard] skipping project {} ('{}'): {}",
                    project.id,
                    project.name,
                    err
                ),
            }
        }

        cards.sort_by(|a, b| compare_updated(&b.updated_at, &a.updated_at));
        tracing::debug!(
            "[Dashboard] {} sessions across {} projects",
            cards.len(),
            projects.len()
        );
        Ok(cards)
    }
}

impl SessionCard {
    fn new(project: &Project, session: Session, now: DateTime<Utc>) -> Self {
        let lifecycle = SessionContent::parse(&session.content).lifecycle;
        let recently_updated = parse_time(&session.updated_at)
            .is_some_and(|at| now - at < Duration::hours(RECENT_WINDOW_HOURS));

        Self {
            project_id: project.id.clone(),
            project_name: project.name.clone(),
            title: session.display_title().to_string(),
            session_id: session.id,
            status: session.status,
            lifecycle: LifecycleSummary::from_lifecycle(lifecycle.as_ref()),
            updated_at: session.updated_at,
            recently_updated,
        }
    }
}

fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|at| at.with_timezone(&Utc))
}

fn compare_updated(a: &str, b: &str) -> Ordering {
    match (parse_time(a), parse_time(b)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::{InMemoryBackend, Op};
    use chrono::TimeZone;
    use foundry_core::error::FoundryError;

    fn session(id: &str, project: &str, updated_at: &str, content: &str) -> Session {
        Session {
            content: content.to_string(),
            updated_at: updated_at.to_string(),
            ..Session::new(id, project, id.to_uppercase())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).single().unwrap()
    }

    #[tokio::test]
    async fn test_overview_sorts_and_summarizes() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.add_project("p1", "Drones");
        backend.add_project("p2", "Pumps");
        backend.insert_session(session("old", "p1", "2024-03-01T08:00:00Z", ""));
        backend.insert_session(session(
            "new",
            "p2",
            "2024-03-10T09:30:00+00:00",
            r#"{"lifecycle":{"steps":["Design","Build"],"currentStep":1}}"#,
        ));
        backend.insert_session(session(
            "done",
            "p1",
            "2024-03-05T00:00:00Z",
            r#"{"lifecycle":{"steps":["Design"],"currentStep":1}}"#,
        ));

        let cards = Dashboard::new(backend).overview_at(now()).await.unwrap();

        let ids: Vec<&str> = cards.iter().map(|c| c.session_id.as_str()).collect();
        assert_eq!(ids, vec!["new", "done", "old"]);
        assert!(cards[0].recently_updated);
        assert!(!cards[1].recently_updated);
        assert_eq!(cards[0].project_name, "Pumps");
        assert_eq!(cards[0].lifecycle.phase, "Build");
        assert_eq!(cards[1].lifecycle.phase, "Completed");
        assert_eq!(cards[2].lifecycle.phase, "Pending Initiation");
    }

    #[tokio::test]
    async fn test_failed_project_is_skipped() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.add_project("p1", "Drones");
        backend.add_project("p2", "Pumps");
        backend.insert_session(session("a", "p1", "2024-03-10T09:00:00Z", ""));
        backend.insert_session(session("b", "p2", "2024-03-10T10:00:00Z", ""));
        backend.fail_next(Op::ListSessions, FoundryError::transport("timeout"));

        let cards = Dashboard::new(backend.clone()).overview_at(now()).await.unwrap();

        assert_eq!(cards.len(), 1);
        assert_eq!(backend.count_calls(Op::ListSessions, "p1") + backend.count_calls(Op::ListSessions, "p2"), 2);
    }

    #[tokio::test]
    async fn test_project_listing_failure_is_surfaced() {
        let backend = Arc::new(InMemoryBackend::new());
        backend.fail_next(Op::ListProjects, FoundryError::Unauthorized("expired".into()));

        assert!(Dashboard::new(backend).overview_at(now()).await.is_err());
    }

    #[test]
    fn test_unparseable_timestamps_sort_last() {
        assert_eq!(compare_updated("2024-01-01T00:00:00Z", "garbage"), Ordering::Greater);
        assert_eq!(compare_updated("", "garbage"), Ordering::Less);
    }
}
