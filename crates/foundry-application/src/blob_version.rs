//! Replace-in-place for artifacts.
//!
//! Blobs are immutable, so "editing" one is: upload the new version, move the
//! old blob's comments to the new id, delete the old blob, re-fetch the list.
//! Steps run strictly in order. A failure stops the sequence and reports the
//! step it happened in; whatever already happened is left as is.

use crate::content_writer::ContentWriter;
use foundry_core::backend::{BlobApi, SessionApi};
use foundry_core::content::{ContentPatch, SessionContent};
use foundry_core::error::FoundryError;
use foundry_core::session::{Blob, NewBlob, Session};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceStep {
    Locate,
    Upload,
    MigrateComments,
    DeleteOld,
    Refresh,
}

impl fmt::Display for ReplaceStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Locate => "looking up the old version",
            Self::Upload => "uploading the new version",
            Self::MigrateComments => "moving comments to the new version",
            Self::DeleteOld => "deleting the old version",
            Self::Refresh => "refreshing the artifact list",
        })
    }
}

/// A replacement that stopped part way.
#[derive(Debug, Clone, Error)]
#[error("Save failed while {step}: {source}")]
pub struct BlobReplaceError {
    pub step: ReplaceStep,
    /// Set once the upload succeeded; the new blob exists from then on.
    pub new_blob_id: Option<String>,
    #[source]
    pub source: FoundryError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplaceOutcome {
    pub new_blob: Blob,
    /// Session after the comment migration (unchanged if none was needed).
    pub session: Session,
    /// Fresh artifact list.
    pub blobs: Vec<Blob>,
    pub comments_moved: bool,
}

pub struct BlobVersionManager<B: SessionApi + BlobApi + ?Sized> {
    backend: Arc<B>,
    writer: ContentWriter<B>,
}

impl<B: SessionApi + BlobApi + ?Sized> BlobVersionManager<B> {
    pub fn new(backend: Arc<B>, writer: ContentWriter<B>) -> Self {
        Self { backend, writer }
    }

    /// Replaces `old_blob_id`, which must be one of `blobs` (the session's
    /// known artifacts). Nothing is uploaded for an unknown id.
    pub async fn replace(
        &self,
        snapshot: &Session,
        blobs: &[Blob],
        old_blob_id: &str,
        replacement: NewBlob,
    ) -> Result<ReplaceOutcome, BlobReplaceError> {
        let session_id = snapshot.id.as_str();
        tracing::info!(
            "[BlobVersionManager] replacing {} in {} with '{}'",
            old_blob_id,
            session_id,
            replacement.file_name
        );

        if !blobs
            .iter()
            .any(|blob| blob.id == old_blob_id && blob.session_id == session_id)
        {
            return Err(fail(
                ReplaceStep::Locate,
                None,
                FoundryError::not_found("Blob", old_blob_id),
            ));
        }

        let new_blob = self
            .backend
            .upload_blob(session_id, replacement)
            .await
            .map_err(|source| fail(ReplaceStep::Upload, None, source))?;
        let new_id = Some(new_blob.id.clone());

        let has_comments = SessionContent::parse(&snapshot.content)
            .comments
            .is_some_and(|comments| comments.has_comments(old_blob_id));
        let session = if has_comments {
            self.writer
                .write(snapshot, &ContentPatch::move_comments(old_blob_id, &new_blob.id))
                .await
                .map_err(|source| fail(ReplaceStep::MigrateComments, new_id.clone(), source))?
        } else {
            snapshot.clone()
        };

        self.backend
            .delete_blob(old_blob_id)
            .await
            .map_err(|source| fail(ReplaceStep::DeleteOld, new_id.clone(), source))?;

        let blobs = self
            .backend
            .list_blobs(session_id)
            .await
            .map_err(|source| fail(ReplaceStep::Refresh, new_id.clone(), source))?;

        tracing::info!(
            "[BlobVersionManager] {} replaced by {} (comments moved: {})",
            old_blob_id,
            new_blob.id,
            has_comments
        );
        Ok(ReplaceOutcome {
            new_blob,
            session,
            blobs,
            comments_moved: has_comments,
        })
    }
}

fn fail(step: ReplaceStep, new_blob_id: Option<String>, source: FoundryError) -> BlobReplaceError {
    tracing::error!(
        "[BlobVersionManager] replacement failed while {} (new blob: {:?}): {}",
        step,
        new_blob_id,
        source
    );
    BlobReplaceError {
        step,
        new_blob_id,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory::{InMemoryBackend, Op};

    async fn setup() -> (Arc<InMemoryBackend>, BlobVersionManager<InMemoryBackend>, Session) {
        let backend = Arc::new(InMemoryBackend::new());
        backend.create_session("s1", "p1", "");
        backend
            .upload_blob("s1", NewBlob::new("bom.csv", "text/csv", "a,b"))
            .await
            .unwrap();
        backend
            .external_write("s1", r#"{"comments":{"csv-1":["check qty"]},"documents":{"x":1}}"#)
            .unwrap();
        let snapshot = backend.session("s1").unwrap();
        let manager = BlobVersionManager::new(backend.clone(), ContentWriter::new(backend.clone(), 3));
        (backend, manager, snapshot)
    }

    #[tokio::test]
    async fn test_replace_moves_comments_and_drops_old_blob() {
        let (backend, manager, snapshot) = setup().await;

        let outcome = manager
            .replace(&snapshot, &backend.blobs("s1"), "csv-1", NewBlob::new("bom.csv", "text/csv", "a,b,c"))
            .await
            .unwrap();

        assert_eq!(outcome.new_blob.id, "csv-2");
        assert!(outcome.comments_moved);
        let ids: Vec<&str> = outcome.blobs.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["csv-2"]);

        let content = SessionContent::parse(&outcome.session.content);
        let comments = content.comments.as_ref().unwrap();
        assert!(!comments.has_comments("csv-1"));
        assert_eq!(comments.for_blob("csv-2"), ["check qty".to_string()]);
        assert_eq!(content.extra("documents"), Some(r#"{"x":1}"#));
        assert_eq!(backend.session("s1").unwrap().content, outcome.session.content);
    }

    #[tokio::test]
    async fn test_replace_without_comments_skips_content_write() {
        let (backend, manager, mut snapshot) = setup().await;
        snapshot.content = String::new();
        backend.external_write("s1", "").unwrap();

        let outcome = manager
            .replace(&snapshot, &backend.blobs("s1"), "csv-1", NewBlob::new("bom.csv", "text/csv", "z"))
            .await
            .unwrap();

        assert!(!outcome.comments_moved);
        assert_eq!(backend.count_calls(Op::UpdateContent, "s1"), 0);
    }

    #[tokio::test]
    async fn test_upload_failure_changes_nothing() {
        let (backend, manager, snapshot) = setup().await;
        backend.fail_next(Op::UploadBlob, FoundryError::api(413, "too large"));

        let err = manager
            .replace(&snapshot, &backend.blobs("s1"), "csv-1", NewBlob::new("bom.csv", "text/csv", "z"))
            .await
            .unwrap_err();

        assert_eq!(err.step, ReplaceStep::Upload);
        assert!(err.new_blob_id.is_none());
        assert_eq!(backend.blobs("s1").len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_blob_is_rejected_before_upload() {
        let (backend, manager, snapshot) = setup().await;

        let err = manager
            .replace(&snapshot, &backend.blobs("s1"), "csv-9", NewBlob::new("bom.csv", "text/csv", "z"))
            .await
            .unwrap_err();

        assert_eq!(err.step, ReplaceStep::Locate);
        assert!(err.source.is_not_found());
        assert!(err.new_blob_id.is_none());
        assert_eq!(backend.count_calls(Op::UploadBlob, "s1"), 1);
        let ids: Vec<String> = backend.blobs("s1").into_iter().map(|b| b.id).collect();
        assert_eq!(ids, vec!["csv-1"]);
    }

    #[tokio::test]
    async fn test_delete_failure_leaves_both_blobs_and_names_the_step() {
        let (backend, manager, snapshot) = setup().await;
        backend.fail_next(Op::DeleteBlob, FoundryError::transport("reset"));

        let err = manager
            .replace(&snapshot, &backend.blobs("s1"), "csv-1", NewBlob::new("bom.csv", "text/csv", "z"))
            .await
            .unwrap_err();

        assert_eq!(err.step, ReplaceStep::DeleteOld);
        assert_eq!(err.new_blob_id.as_deref(), Some("csv-2"));
        assert!(err.to_string().starts_with("Save failed while deleting the old version"));
        // Partial migration is visible, not masked
        assert_eq!(backend.blobs("s1").len(), 2);
        let content = SessionContent::parse(&backend.session("s1").unwrap().content);
        assert!(content.comments.unwrap().has_comments("csv-2"));
    }
}
