//! Section-level edits to session content.
//!
//! An edit is stored as a value rather than as the resulting document, so a
//! write that lost a race can be re-applied to whatever the server holds now.

use super::codec::{ContentOrigin, SessionContent, COMMENTS_KEY, LIFECYCLE_KEY};
use super::comments::Comments;
use super::lifecycle::Lifecycle;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ContentPatch {
    /// Replace the whole comments section.
    SetComments(Comments),
    /// Append one comment to a blob's list.
    AddComment { blob_id: String, text: String },
    /// Re-key a blob's comments after the blob was replaced.
    MoveComments { from: String, to: String },
    SetLifecycle(Lifecycle),
    /// Replace an arbitrary section with a JSON value.
    SetRaw { key: String, value: Value },
}

impl ContentPatch {
    pub fn add_comment(blob_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::AddComment {
            blob_id: blob_id.into(),
            text: text.into(),
        }
    }

    pub fn move_comments(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self::MoveComments {
            from: from.into(),
            to: to.into(),
        }
    }

    /// The one top-level key this patch may change.
    pub fn key(&self) -> &str {
        match self {
            Self::SetComments(_) | Self::AddComment { .. } | Self::MoveComments { .. } => COMMENTS_KEY,
            Self::SetLifecycle(_) => LIFECYCLE_KEY,
            Self::SetRaw { key, .. } => key,
        }
    }

    /// Applies the patch in place. Returns false when it changed nothing.
    pub fn apply(&self, content: &mut SessionContent) -> Result<bool> {
        match self {
            Self::SetComments(comments) => {
                content.set_comments(comments.clone());
            }
            Self::AddComment { blob_id, text } => {
                let mut comments = content.comments_or_default();
                comments.add(blob_id, text)?;
                content.set_comments(comments);
            }
            Self::MoveComments { from, to } => {
                let mut comments = content.comments_or_default();
                if !comments.move_to(from, to) {
                    return Ok(false);
                }
                content.set_comments(comments);
            }
            Self::SetLifecycle(lifecycle) => {
                content.set_lifecycle(lifecycle.clone());
            }
            Self::SetRaw { key, value } => {
                content.set_value(key, value)?;
            }
        }
        Ok(true)
    }
}

/// Result of merging a patch into a raw content string.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedContent {
    pub content: SessionContent,
    pub serialized: String,
    pub changed: bool,
}

/// Parses `raw`, applies `patch` and serializes the result.
///
/// Legacy (non-object) content is replaced by a fresh document holding only
/// the patched section.
pub fn merge_into(raw: &str, patch: &ContentPatch) -> Result<MergedContent> {
    let (mut content, origin) = SessionContent::parse_with_origin(raw);
    if origin == ContentOrigin::Legacy {
        tracing::info!(
            "[ContentPatch] discarding legacy content ({} bytes) to write '{}'",
            raw.len(),
            patch.key()
        );
    }
    let changed = patch.apply(&mut content)?;
    let serialized = content.to_json_string()?;
    Ok(MergedContent {
        content,
        serialized,
        changed,
    })
}
