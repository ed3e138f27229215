//! SessionController - owns the local snapshot of the selected session.
//!
//! The controller is the only writer of its [`SessionView`]: wizard input,
//! submission, cancel/retry, content writes and blob replacement all go
//! through it, and the poll loop's events are applied here. At most one
//! poll loop runs per controller; starting a new one stops the previous.

use crate::blob_version::{BlobReplaceError, BlobVersionManager, ReplaceOutcome};
use crate::content_writer::ContentWriter;
use crate::lifecycle_generator::LifecycleGenerator;
use crate::poll_loop::{PollEvent, PollLoop, PollOutcome};
use foundry_core::backend::Backend;
use foundry_core::config::PollSettings;
use foundry_core::content::{ContentPatch, Lifecycle};
use foundry_core::error::{FoundryError, Result};
use foundry_core::progress::{Progress, ProgressTracker};
use foundry_core::session::{Blob, ChatMessage, NewBlob, Session};
use foundry_core::wizard::{DeliverableKind, StartType, WizardState};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Everything a front end renders for the selected session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    pub session: Session,
    pub blobs: Vec<Blob>,
    pub wizard: WizardState,
    /// Latest progress; `None` before the first poll.
    pub progress: Option<Progress>,
    /// Number of tasks in the last accepted batch, if this client submitted it.
    pub submitted_total: Option<usize>,
    pub polling: bool,
    /// Last surfaced failure, cleared by the next successful user action.
    pub last_error: Option<String>,
}

impl SessionView {
    fn new(session: Session, blobs: Vec<Blob>) -> Self {
        Self {
            wizard: WizardState::from_status(session.status),
            session,
            blobs,
            progress: None,
            submitted_total: None,
            polling: false,
            last_error: None,
        }
    }

    fn apply(&mut self, event: PollEvent) {
        match event {
            PollEvent::Snapshot {
                session,
                blobs,
                progress,
            } => {
                self.session = session;
                self.blobs = blobs;
                self.progress = Some(progress);
            }
            PollEvent::FetchFailed { .. } => {}
            PollEvent::Finished {
                session,
                blobs,
                progress,
                ..
            } => {
                self.wizard.observe_status(session.status);
                self.session = session;
                self.blobs = blobs;
                self.progress = Some(progress);
                self.polling = false;
            }
            PollEvent::BudgetExhausted { .. } => {
                self.polling = false;
            }
        }
    }
}

struct PollHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<PollOutcome>>,
}

pub struct SessionController<B: Backend + ?Sized + 'static> {
    backend: Arc<B>,
    settings: PollSettings,
    writer: ContentWriter<B>,
    view: Arc<RwLock<SessionView>>,
    poll: Mutex<Option<PollHandle>>,
}

impl<B: Backend + ?Sized + 'static> SessionController<B> {
    /// Loads a session and its artifacts.
    ///
    /// A session that is already `processing` is rejoined: the wizard opens
    /// on the execute step and polling resumes with an unknown total.
    pub async fn open(backend: Arc<B>, settings: PollSettings, session_id: &str) -> Result<Self> {
        let (session, blobs) = tokio::try_join!(
            backend.get_session(session_id),
            backend.list_blobs(session_id)
        )?;

        let rejoin = session.is_processing();
        tracing::info!(
            "[SessionController] opened {} (status {}, {} artifacts)",
            session.id,
            session.status,
            blobs.len()
        );

        let controller = Self {
            writer: ContentWriter::new(backend.clone(), settings.max_conflict_retries),
            backend,
            settings,
            view: Arc::new(RwLock::new(SessionView::new(session, blobs))),
            poll: Mutex::new(None),
        };
        if rejoin {
            tracing::info!("[SessionController] rejoining running batch in {}", session_id);
            controller.start_polling(ProgressTracker::new(None));
        }
        Ok(controller)
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionView> {
        self.view.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionView> {
        self.view.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn poll_handle(&self) -> MutexGuard<'_, Option<PollHandle>> {
        self.poll.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn view(&self) -> SessionView {
        self.read().clone()
    }

    pub fn session_id(&self) -> String {
        self.read().session.id.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.read().polling
    }

    fn surface<T>(&self, result: Result<T>) -> Result<T> {
        let mut view = self.write();
        match &result {
            Ok(_) => view.last_error = None,
            Err(err) => view.last_error = Some(err.to_string()),
        }
        result
    }

    fn with_wizard<T>(&self, f: impl FnOnce(&mut WizardState, &[Blob]) -> Result<T>) -> Result<T> {
        let mut view = self.write();
        let view = &mut *view;
        let result = f(&mut view.wizard, &view.blobs);
        match &result {
            Ok(_) => view.last_error = None,
            Err(err) => view.last_error = Some(err.to_string()),
        }
        result
    }

    // ============================================================================
    // Wizard input
    // ============================================================================

    pub fn set_start_type(&self, start_type: StartType) -> Result<()> {
        self.with_wizard(|wizard, _| wizard.set_start_type(start_type))
    }

    pub fn set_description(&self, description: &str) -> Result<()> {
        self.with_wizard(|wizard, _| wizard.set_description(description))
    }

    pub fn set_target_columns(&self, columns: &str) -> Result<()> {
        self.with_wizard(|wizard, _| wizard.set_target_columns(columns))
    }

    pub fn toggle_deliverable(&self, kind: DeliverableKind) -> Result<bool> {
        self.with_wizard(|wizard, _| wizard.toggle_deliverable(kind))
    }

    pub fn select_deliverables(&self, kinds: &[DeliverableKind]) -> Result<()> {
        self.with_wizard(|wizard, _| wizard.select_deliverables(kinds.iter().copied()))
    }

    /// Context → Deliverables. Validation happens locally; nothing is sent.
    pub fn advance(&self) -> Result<()> {
        self.with_wizard(|wizard, blobs| wizard.advance(blobs))
    }

    pub fn back(&self) -> Result<()> {
        self.with_wizard(|wizard, _| wizard.back())
    }

    pub fn start_new_batch(&self) -> Result<()> {
        self.with_wizard(|wizard, _| wizard.start_new_batch())?;
        let mut view = self.write();
        view.progress = None;
        view.submitted_total = None;
        Ok(())
    }

    /// Uploads a source artifact (BOM or sketch) and refreshes the list.
    pub async fn upload_source(&self, blob: NewBlob) -> Result<Blob> {
        let session_id = self.session_id();
        let result: Result<(Blob, Vec<Blob>)> = async {
            let uploaded = self.backend.upload_blob(&session_id, blob).await?;
            let blobs = self.backend.list_blobs(&session_id).await?;
            Ok((uploaded, blobs))
        }
        .await;

        let (uploaded, blobs) = self.surface(result)?;
        tracing::info!(
            "[SessionController] uploaded {} ('{}') to {}",
            uploaded.id,
            uploaded.file_name,
            session_id
        );
        self.write().blobs = blobs;
        Ok(uploaded)
    }

    // ============================================================================
    // Batch lifecycle
    // ============================================================================

    /// Builds the task batch and submits it as one request.
    ///
    /// On failure the wizard stays on the deliverables step with the error
    /// surfaced; nothing is retried. On success polling starts with the
    /// batch size as the progress denominator.
    pub async fn submit(&self) -> Result<usize> {
        let (session_id, batch) = {
            let view = self.read();
            (view.session.id.clone(), view.wizard.build_batch())
        };
        let batch = self.surface(batch)?;
        let total = batch.len();

        tracing::info!(
            "[SessionController] submitting {} tasks for {}",
            total,
            session_id
        );
        if let Err(err) = self.backend.queue_tasks(&session_id, batch.tasks()).await {
            tracing::error!("[SessionController] submission for {} failed: {}", session_id, err);
            return self.surface(Err(err));
        }

        {
            let mut view = self.write();
            view.wizard.mark_submitted()?;
            view.submitted_total = Some(total);
            view.progress = None;
            view.last_error = None;
        }
        self.start_polling(ProgressTracker::new(Some(total)));
        Ok(total)
    }

    /// Asks the backend to cancel. Polling continues until the backend
    /// reports `cancelled`.
    pub async fn cancel(&self) -> Result<()> {
        let session_id = self.session_id();
        tracing::info!("[SessionController] requesting cancel for {}", session_id);
        let result = self.backend.cancel(&session_id).await;
        if let Err(err) = &result {
            tracing::error!("[SessionController] cancel for {} failed: {}", session_id, err);
        }
        self.surface(result)
    }

    /// Restarts a cancelled or failed batch and resumes polling. The known
    /// total from the original submission is kept.
    pub async fn retry(&self) -> Result<()> {
        let (session_id, mut wizard, total) = {
            let view = self.read();
            (view.session.id.clone(), view.wizard.clone(), view.submitted_total)
        };
        // Validate locally before touching the backend
        self.surface(wizard.retry())?;

        tracing::info!("[SessionController] retrying batch in {}", session_id);
        if let Err(err) = self.backend.retry(&session_id).await {
            tracing::error!("[SessionController] retry for {} failed: {}", session_id, err);
            return self.surface(Err(err));
        }

        {
            let mut view = self.write();
            view.wizard = wizard;
            view.progress = None;
            view.last_error = None;
        }
        self.start_polling(ProgressTracker::new(total));
        Ok(())
    }

    // ============================================================================
    // Content and artifacts
    // ============================================================================

    /// Writes one content section. The snapshot only changes once the
    /// backend stored the write.
    pub async fn write_content(&self, patch: ContentPatch) -> Result<Session> {
        let snapshot = self.read().session.clone();
        let result = self.writer.write(&snapshot, &patch).await;
        let stored = self.surface(result)?;
        self.accept_content(&stored);
        Ok(stored)
    }

    pub async fn add_comment(&self, blob_id: &str, text: &str) -> Result<Session> {
        self.write_content(ContentPatch::add_comment(blob_id, text)).await
    }

    pub async fn set_lifecycle(&self, lifecycle: Lifecycle) -> Result<Session> {
        self.write_content(ContentPatch::SetLifecycle(lifecycle)).await
    }

    /// Asks the assistant for lifecycle phases and stores them.
    pub async fn generate_lifecycle(&self) -> Result<Lifecycle> {
        let snapshot = self.read().session.clone();
        let generator = LifecycleGenerator::new(
            self.backend.clone(),
            self.writer.clone(),
            self.settings.clone(),
        );
        let result = generator.generate(&snapshot).await;
        let (stored, lifecycle) = self.surface(result)?;
        self.accept_content(&stored);
        Ok(lifecycle)
    }

    /// Replaces an artifact with a new version, carrying its comments over.
    pub async fn replace_blob(
        &self,
        old_blob_id: &str,
        replacement: NewBlob,
    ) -> std::result::Result<ReplaceOutcome, BlobReplaceError> {
        let (snapshot, blobs) = {
            let view = self.read();
            (view.session.clone(), view.blobs.clone())
        };
        let manager = BlobVersionManager::new(self.backend.clone(), self.writer.clone());

        match manager.replace(&snapshot, &blobs, old_blob_id, replacement).await {
            Ok(outcome) => {
                self.accept_content(&outcome.session);
                let mut view = self.write();
                view.blobs = outcome.blobs.clone();
                view.last_error = None;
                Ok(outcome)
            }
            Err(err) => {
                self.write().last_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub async fn download_blob(&self, blob_id: &str) -> Result<Vec<u8>> {
        let result = self.backend.download_blob(blob_id).await;
        self.surface(result)
    }

    // ============================================================================
    // Chat
    // ============================================================================

    /// Sends a chat message and returns the refreshed history.
    ///
    /// The assistant may attach artifacts while answering, so the artifact
    /// list is re-read as well.
    pub async fn send_message(&self, text: &str) -> Result<Vec<ChatMessage>> {
        let text = text.trim();
        if text.is_empty() {
            return self.surface(Err(FoundryError::validation("message must not be empty")));
        }

        let session_id = self.session_id();
        let result: Result<(Vec<ChatMessage>, Vec<Blob>)> = async {
            self.backend.send_message(&session_id, text).await?;
            tokio::try_join!(
                self.backend.list_messages(&session_id),
                self.backend.list_blobs(&session_id)
            )
        }
        .await;

        let (messages, blobs) = self.surface(result)?;
        tracing::debug!(
            "[SessionController] chat in {} now has {} messages",
            session_id,
            messages.len()
        );
        self.write().blobs = blobs;
        Ok(messages)
    }

    pub async fn messages(&self) -> Result<Vec<ChatMessage>> {
        let result = self.backend.list_messages(&self.session_id()).await;
        self.surface(result)
    }

    pub async fn clear_messages(&self) -> Result<()> {
        let session_id = self.session_id();
        let result = self.backend.clear_messages(&session_id).await;
        if result.is_ok() {
            tracing::info!("[SessionController] cleared chat history of {}", session_id);
        }
        self.surface(result)
    }

    /// Re-reads the session and its artifacts without touching the wizard.
    pub async fn refresh(&self) -> Result<()> {
        let session_id = self.session_id();
        let result = tokio::try_join!(
            self.backend.get_session(&session_id),
            self.backend.list_blobs(&session_id)
        );
        let (session, blobs) = self.surface(result)?;
        let mut view = self.write();
        view.session = session;
        view.blobs = blobs;
        Ok(())
    }

    fn accept_content(&self, stored: &Session) {
        let mut view = self.write();
        if view.session.id == stored.id {
            view.session.content = stored.content.clone();
            view.session.updated_at = stored.updated_at.clone();
        }
    }

    // ============================================================================
    // Poll loop management
    // ============================================================================

    fn start_polling(&self, tracker: ProgressTracker) {
        let mut slot = self.poll_handle();
        if let Some(previous) = slot.take() {
            tracing::debug!("[SessionController] replacing running poll loop");
            previous.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        // The snapshot still holds the status from before submit/retry
        let (previous, view) = {
            let mut view = self.write();
            view.polling = true;
            (view.session.clone(), Arc::clone(&self.view))
        };
        let poll_loop = PollLoop::new(
            self.backend.clone(),
            previous.id.clone(),
            self.settings.clone(),
            tracker,
            cancel.clone(),
        )
        .after(&previous);

        let guard = cancel.clone();
        let task = tokio::spawn(async move {
            poll_loop
                .run(move |event| {
                    let mut view = view.write().unwrap_or_else(|poisoned| poisoned.into_inner());
                    // A stopped loop's late observation belongs to nobody
                    if !guard.is_cancelled() {
                        view.apply(event);
                    }
                })
                .await
        });

        *slot = Some(PollHandle {
            cancel,
            task: Some(task),
        });
    }

    /// Waits for the current poll loop to end. `None` when no loop was
    /// started or it was already awaited.
    pub async fn wait_for_poll(&self) -> Option<PollOutcome> {
        let task = self.poll_handle().as_mut().and_then(|handle| handle.task.take())?;
        match task.await {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                tracing::error!("[SessionController] poll task failed: {}", err);
                self.write().polling = false;
                None
            }
        }
    }

    /// Stops polling. An in-flight fetch completes but is ignored.
    pub fn stop(&self) {
        if let Some(handle) = self.poll_handle().take() {
            handle.cancel.cancel();
            tracing::debug!("[SessionController] stopped polling {}", self.session_id());
        }
        self.write().polling = false;
    }
}

impl<B: Backend + ?Sized + 'static> Drop for SessionController<B> {
    fn drop(&mut self) {
        if let Some(handle) = self.poll_handle().take() {
            handle.cancel.cancel();
        }
    }
}
