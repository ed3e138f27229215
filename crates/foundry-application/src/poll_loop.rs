//! Poll loop: follows a running batch until the backend reports a terminal
//! status or the attempt budget runs out.
//!
//! The loop only produces [`PollEvent`]s. Whoever owns the session state
//! consumes them, so a push transport could feed the same events without
//! touching the state machine.

use foundry_core::backend::Backend;
use foundry_core::config::PollSettings;
use foundry_core::error::FoundryError;
use foundry_core::progress::{Progress, ProgressTracker};
use foundry_core::session::{Blob, Session, SessionStatus};
use foundry_core::wizard::Outcome;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Something the loop observed.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// A successful non-terminal fetch.
    Snapshot {
        session: Session,
        blobs: Vec<Blob>,
        progress: Progress,
    },
    /// A fetch failed; the loop retries after the error backoff.
    FetchFailed { attempt: u32, error: FoundryError },
    /// The backend reported a terminal status. No further fetches follow.
    Finished {
        session: Session,
        blobs: Vec<Blob>,
        outcome: Outcome,
        progress: Progress,
    },
    /// The attempt budget ran out. The session keeps its last observed status.
    BudgetExhausted { last_status: Option<SessionStatus> },
}

/// Why a loop run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Terminal(Outcome),
    /// Stopped from outside (session switched, controller dropped).
    Stopped,
    BudgetExhausted { last_status: Option<SessionStatus> },
}

/// How many polls may still report the status from before a submit or retry
/// before that status is taken at face value.
pub const STALE_STATUS_GRACE: u32 = 5;

/// The terminal state a session was in when a new batch was requested.
///
/// The backend may keep reporting it for a moment after accepting the
/// request. Until the session is seen running (or its queue changes), a
/// matching terminal status belongs to the previous batch.
#[derive(Debug, Clone)]
struct StaleStatus {
    status: SessionStatus,
    pending: usize,
    grace: u32,
}

impl StaleStatus {
    fn matches(&self, session: &Session) -> bool {
        session.status == self.status && session.pending_count() == self.pending
    }
}

pub struct PollLoop<B: Backend + ?Sized> {
    backend: Arc<B>,
    session_id: String,
    settings: PollSettings,
    tracker: ProgressTracker,
    cancel: CancellationToken,
    stale: Option<StaleStatus>,
}

impl<B: Backend + ?Sized> PollLoop<B> {
    pub fn new(
        backend: Arc<B>,
        session_id: impl Into<String>,
        settings: PollSettings,
        tracker: ProgressTracker,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            backend,
            session_id: session_id.into(),
            settings,
            tracker,
            cancel,
            stale: None,
        }
    }

    /// Follows a batch requested while the session was in `previous`.
    ///
    /// If `previous` is terminal, polls reporting that same status and queue
    /// are skipped until the session is seen running, for at most
    /// [`STALE_STATUS_GRACE`] polls.
    pub fn after(mut self, previous: &Session) -> Self {
        self.stale = previous.status.is_terminal().then(|| StaleStatus {
            status: previous.status,
            pending: previous.pending_count(),
            grace: STALE_STATUS_GRACE,
        });
        self
    }

    /// Budget units a failed fetch consumes. The error backoff is longer
    /// than the interval, so a failure is charged as the number of intervals
    /// it waits; `max_attempts` then bounds wall-clock time either way.
    fn failure_cost(&self) -> u32 {
        let interval = self.settings.interval_ms.max(1);
        let cost = self.settings.error_backoff_ms.div_ceil(interval).max(1);
        u32::try_from(cost).unwrap_or(u32::MAX)
    }

    /// Returns true when `session` still shows the pre-request terminal
    /// state and should be ignored.
    fn is_stale(&mut self, session: &Session) -> bool {
        let skip = match &mut self.stale {
            Some(stale) if stale.matches(session) && stale.grace > 0 => {
                stale.grace -= 1;
                true
            }
            _ => false,
        };
        if !skip {
            self.stale = None;
        }
        skip
    }

    /// Runs until terminal, stopped or out of budget, handing every
    /// observation to `on_event`.
    ///
    /// Stopping is checked after each await: an in-flight fetch is never
    /// aborted, but its result is dropped if the loop was stopped meanwhile.
    pub async fn run(mut self, mut on_event: impl FnMut(PollEvent) + Send) -> PollOutcome {
        let session_id = self.session_id.clone();
        let failure_cost = self.failure_cost();
        let mut attempts: u32 = 0;
        let mut budget_used: u32 = 0;
        let mut last_status: Option<SessionStatus> = None;

        tracing::info!(
            target: "poll_loop",
            "[PollLoop] started for session {} (every {}ms, budget {})",
            session_id,
            self.settings.interval_ms,
            self.settings.max_attempts
        );

        loop {
            if self.cancel.is_cancelled() {
                tracing::debug!(target: "poll_loop", "[PollLoop] stopped before attempt for {}", session_id);
                return PollOutcome::Stopped;
            }
            if budget_used >= self.settings.max_attempts {
                tracing::warn!(
                    target: "poll_loop",
                    "[PollLoop] budget of {} exhausted for {} after {} attempts (last status: {:?})",
                    self.settings.max_attempts,
                    session_id,
                    attempts,
                    last_status
                );
                on_event(PollEvent::BudgetExhausted { last_status });
                return PollOutcome::BudgetExhausted { last_status };
            }
            attempts += 1;

            let fetched = tokio::try_join!(
                self.backend.get_session(&session_id),
                self.backend.list_blobs(&session_id)
            );

            if self.cancel.is_cancelled() {
                tracing::debug!(
                    target: "poll_loop",
                    "[PollLoop] discarding attempt {} for {}: loop stopped",
                    attempts,
                    session_id
                );
                return PollOutcome::Stopped;
            }

            let delay = match fetched {
                Ok((session, blobs)) => {
                    budget_used = budget_used.saturating_add(1);

                    if self.is_stale(&session) {
                        tracing::debug!(
                            target: "poll_loop",
                            "[PollLoop] {} still reports {} from before the request, waiting",
                            session_id,
                            session.status
                        );
                    } else {
                        last_status = Some(session.status);

                        if let Some(outcome) = Outcome::from_status(session.status) {
                            tracing::info!(
                                target: "poll_loop",
                                "[PollLoop] session {} reached {} after {} attempts",
                                session_id,
                                session.status,
                                attempts
                            );
                            let progress = self.tracker.finish(outcome);
                            on_event(PollEvent::Finished {
                                session,
                                blobs,
                                outcome,
                                progress,
                            });
                            return PollOutcome::Terminal(outcome);
                        }

                        let progress = self.tracker.observe(session.pending_count());
                        tracing::debug!(
                            target: "poll_loop",
                            "[PollLoop] {} status={} progress={}",
                            session_id,
                            session.status,
                            progress
                        );
                        on_event(PollEvent::Snapshot {
                            session,
                            blobs,
                            progress,
                        });
                    }
                    self.settings.interval()
                }
                Err(error) => {
                    budget_used = budget_used.saturating_add(failure_cost);
                    tracing::warn!(
                        target: "poll_loop",
                        "[PollLoop] attempt {} for {} failed, backing off {}ms: {}",
                        attempts,
                        session_id,
                        self.settings.error_backoff_ms,
                        error
                    );
                    on_event(PollEvent::FetchFailed {
                        attempt: attempts,
                        error,
                    });
                    self.settings.error_backoff()
                }
            };

            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::debug!(target: "poll_loop", "[PollLoop] stopped while waiting for {}", session_id);
                    return PollOutcome::Stopped;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::{InMemoryBackend, Op, PollStep};

    fn fast_settings(max_attempts: u32) -> PollSettings {
        PollSettings {
            interval_ms: 1,
            error_backoff_ms: 5,
            max_attempts,
            max_conflict_retries: 3,
        }
    }

    fn backend_with_session() -> Arc<InMemoryBackend> {
        let backend = Arc::new(InMemoryBackend::new());
        backend.create_session("s1", "p1", "Drone");
        backend
    }

    async fn run_collecting(
        backend: Arc<InMemoryBackend>,
        settings: PollSettings,
        tracker: ProgressTracker,
    ) -> (PollOutcome, Vec<PollEvent>) {
        let mut events = Vec::new();
        let outcome = PollLoop::new(backend, "s1", settings, tracker, CancellationToken::new())
            .run(|event| events.push(event))
            .await;
        (outcome, events)
    }

    #[tokio::test]
    async fn test_progress_sequence_until_completed() {
        let backend = backend_with_session();
        backend.script_polls(
            "s1",
            [
                PollStep::processing(4),
                PollStep::processing(3),
                PollStep::processing(3),
                PollStep::processing(1),
                PollStep::finished(SessionStatus::Completed),
            ],
        );

        let (outcome, events) =
            run_collecting(backend.clone(), fast_settings(50), ProgressTracker::new(Some(4))).await;

        assert_eq!(outcome, PollOutcome::Terminal(Outcome::Completed));
        let labels: Vec<String> = events
            .iter()
            .map(|event| match event {
                PollEvent::Snapshot { progress, .. } | PollEvent::Finished { progress, .. } => {
                    progress.to_string()
                }
                other => panic!("unexpected event {other:?}"),
            })
            .collect();
        assert_eq!(labels, vec!["0/4", "1/4", "1/4", "3/4", "Completed."]);
        // Nothing is fetched after the terminal status
        assert_eq!(backend.count_calls(Op::GetSession, "s1"), 5);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_reported_and_retried() {
        let backend = backend_with_session();
        backend.script_polls(
            "s1",
            [
                PollStep::Fail(FoundryError::transport("connection refused")),
                PollStep::finished(SessionStatus::Error),
            ],
        );

        let (outcome, events) = run_collecting(backend, fast_settings(10), ProgressTracker::new(None)).await;

        assert_eq!(outcome, PollOutcome::Terminal(Outcome::Failed));
        assert!(matches!(events[0], PollEvent::FetchFailed { attempt: 1, .. }));
        assert!(matches!(events[1], PollEvent::Finished { outcome: Outcome::Failed, .. }));
    }

    #[tokio::test]
    async fn test_budget_exhaustion_keeps_last_status() {
        let backend = backend_with_session();
        backend.script_polls("s1", [PollStep::processing(2)]);

        let (outcome, events) = run_collecting(backend.clone(), fast_settings(3), ProgressTracker::new(None)).await;

        assert_eq!(
            outcome,
            PollOutcome::BudgetExhausted {
                last_status: Some(SessionStatus::Processing)
            }
        );
        assert!(matches!(events.last(), Some(PollEvent::BudgetExhausted { .. })));
        assert_eq!(backend.count_calls(Op::GetSession, "s1"), 3);
        // No failure is synthesized locally
        assert_eq!(backend.session("s1").unwrap().status, SessionStatus::Processing);
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_fetching() {
        let backend = backend_with_session();
        let token = CancellationToken::new();
        token.cancel();

        let outcome = PollLoop::new(backend.clone(), "s1", fast_settings(10), ProgressTracker::default(), token)
            .run(|_| {})
            .await;

        assert_eq!(outcome, PollOutcome::Stopped);
        assert_eq!(backend.calls_for("s1"), 0);
    }

    #[tokio::test]
    async fn test_stop_during_sleep_ends_loop() {
        let backend = backend_with_session();
        backend.script_polls("s1", [PollStep::processing(1)]);
        let token = CancellationToken::new();
        let settings = PollSettings {
            interval_ms: 60_000,
            ..fast_settings(10)
        };

        let handle = tokio::spawn(
            PollLoop::new(backend.clone(), "s1", settings, ProgressTracker::default(), token.clone())
                .run(|_| {}),
        );
        while backend.count_calls(Op::GetSession, "s1") == 0 {
            tokio::task::yield_now().await;
        }
        token.cancel();

        assert_eq!(handle.await.unwrap(), PollOutcome::Stopped);
        assert_eq!(backend.count_calls(Op::GetSession, "s1"), 1);
    }

    fn finished_session(backend: &InMemoryBackend, status: SessionStatus) -> Session {
        let mut session = backend.session("s1").unwrap();
        session.status = status;
        backend.insert_session(session.clone());
        session
    }

    #[tokio::test]
    async fn test_previous_terminal_status_is_skipped_until_running() {
        let backend = backend_with_session();
        let previous = finished_session(&backend, SessionStatus::Completed);
        // The backend keeps reporting the old batch on the first fetch
        backend.script_polls(
            "s1",
            [
                PollStep::finished(SessionStatus::Completed),
                PollStep::processing(2),
                PollStep::processing(1),
                PollStep::finished(SessionStatus::Completed),
            ],
        );

        let mut events = Vec::new();
        let outcome = PollLoop::new(
            backend.clone(),
            "s1",
            fast_settings(50),
            ProgressTracker::new(Some(2)),
            CancellationToken::new(),
        )
        .after(&previous)
        .run(|event| events.push(event))
        .await;

        assert_eq!(outcome, PollOutcome::Terminal(Outcome::Completed));
        let labels: Vec<String> = events
            .iter()
            .filter_map(|event| match event {
                PollEvent::Snapshot { progress, .. } | PollEvent::Finished { progress, .. } => {
                    Some(progress.to_string())
                }
                _ => None,
            })
            .collect();
        assert_eq!(labels, vec!["0/2", "1/2", "Completed."]);
        assert_eq!(backend.count_calls(Op::GetSession, "s1"), 4);
    }

    #[tokio::test]
    async fn test_previous_terminal_status_is_accepted_after_grace() {
        let backend = backend_with_session();
        let previous = finished_session(&backend, SessionStatus::Cancelled);

        let outcome = PollLoop::new(
            backend.clone(),
            "s1",
            fast_settings(50),
            ProgressTracker::default(),
            CancellationToken::new(),
        )
        .after(&previous)
        .run(|_| {})
        .await;

        assert_eq!(outcome, PollOutcome::Terminal(Outcome::Cancelled));
        assert_eq!(
            backend.count_calls(Op::GetSession, "s1"),
            STALE_STATUS_GRACE as usize + 1
        );
    }

    #[tokio::test]
    async fn test_non_terminal_previous_status_changes_nothing() {
        let backend = backend_with_session();
        let previous = backend.session("s1").unwrap();
        backend.script_polls("s1", [PollStep::finished(SessionStatus::Completed)]);

        let outcome = PollLoop::new(
            backend.clone(),
            "s1",
            fast_settings(50),
            ProgressTracker::default(),
            CancellationToken::new(),
        )
        .after(&previous)
        .run(|_| {})
        .await;

        assert_eq!(outcome, PollOutcome::Terminal(Outcome::Completed));
        assert_eq!(backend.count_calls(Op::GetSession, "s1"), 1);
    }

    #[tokio::test]
    async fn test_failures_are_charged_by_backoff_length() {
        let backend = backend_with_session();
        for _ in 0..10 {
            backend.fail_next(Op::GetSession, FoundryError::transport("down"));
        }
        // Each failure waits 5 intervals, so a budget of 10 allows two fetches
        let (outcome, events) = run_collecting(backend.clone(), fast_settings(10), ProgressTracker::new(None)).await;

        assert_eq!(outcome, PollOutcome::BudgetExhausted { last_status: None });
        assert_eq!(backend.count_calls(Op::GetSession, "s1"), 2);
        assert_eq!(
            events
                .iter()
                .filter(|event| matches!(event, PollEvent::FetchFailed { .. }))
                .count(),
            2
        );
    }
}
