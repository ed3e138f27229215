//! Conflict-safe writes to a session's content document.
//!
//! Every write is conditional on the snapshot's version. When the server copy
//! moved on, the writer fetches it, re-applies the same patch to the fresh
//! content and tries again, so concurrent edits to other sections survive.

use foundry_core::backend::SessionApi;
use foundry_core::content::{merge_into, ContentPatch};
use foundry_core::error::{FoundryError, Result};
use foundry_core::session::Session;
use std::sync::Arc;

pub struct ContentWriter<B: SessionApi + ?Sized> {
    backend: Arc<B>,
    max_conflict_retries: u32,
}

impl<B: SessionApi + ?Sized> Clone for ContentWriter<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            max_conflict_retries: self.max_conflict_retries,
        }
    }
}

impl<B: SessionApi + ?Sized> ContentWriter<B> {
    pub fn new(backend: Arc<B>, max_conflict_retries: u32) -> Self {
        Self {
            backend,
            max_conflict_retries,
        }
    }

    /// Applies `patch` on top of `snapshot` and stores the result.
    ///
    /// # Returns
    ///
    /// - `Ok(Session)`: The session as stored. Equal to `snapshot` when the
    ///   patch changed nothing and no request was sent.
    /// - `Err(FoundryError::Conflict)`: Still conflicting after
    ///   `max_conflict_retries` rebases
    /// - `Err(_)`: Validation or transport failure. Nothing was written.
    pub async fn write(&self, snapshot: &Session, patch: &ContentPatch) -> Result<Session> {
        let mut base = snapshot.clone();
        let mut rebases: u32 = 0;

        loop {
            let merged = merge_into(&base.content, patch)?;
            if !merged.changed {
                tracing::debug!(
                    "[ContentWriter] '{}' patch for {} changed nothing, skipping write",
                    patch.key(),
                    base.id
                );
                return Ok(base);
            }

            tracing::debug!(
                "[ContentWriter] writing '{}' for {} (version {:?})",
                patch.key(),
                base.id,
                base.version()
            );
            match self
                .backend
                .update_content(&base.id, &merged.serialized, base.version())
                .await
            {
                Ok(stored) => return Ok(stored),
                Err(err) if err.is_conflict() && rebases < self.max_conflict_retries => {
                    rebases += 1;
                    tracing::warn!(
                        "[ContentWriter] conflict writing '{}' for {} (rebase {}/{}): {}",
                        patch.key(),
                        base.id,
                        rebases,
                        self.max_conflict_retries,
                        err
                    );
                    base = self.backend.get_session(&base.id).await?;
                }
                Err(err) => {
                    tracing::error!(
                        "[ContentWriter] failed to write '{}' for {}: {}",
                        patch.key(),
                        base.id,
                        err
                    );
                    return Err(match err {
                        FoundryError::Conflict(message) => FoundryError::conflict(format!(
                            "{message} (gave up after {rebases} rebases)"
                        )),
                        other => other,
                    });
                }
            }
        }
    }
}
