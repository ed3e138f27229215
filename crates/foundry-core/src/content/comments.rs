//! Comments section: free-text notes attached to artifacts.

use crate::error::{FoundryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from blob id to its comments, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Comments(BTreeMap<String, Vec<String>>);

impl Comments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_blob(&self, blob_id: &str) -> &[String] {
        self.0.get(blob_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_comments(&self, blob_id: &str) -> bool {
        !self.for_blob(blob_id).is_empty()
    }

    /// Appends a comment to a blob's list.
    pub fn add(&mut self, blob_id: &str, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Err(FoundryError::validation("comment must not be empty"));
        }
        self.0
            .entry(blob_id.to_string())
            .or_default()
            .push(text.to_string());
        Ok(())
    }

    /// Re-keys `from`'s comments to `to`, keeping their order.
    ///
    /// Returns false when `from` had no comments. Comments already under `to`
    /// stay first.
    pub fn move_to(&mut self, from: &str, to: &str) -> bool {
        if from == to {
            return self.has_comments(from);
        }
        match self.0.remove(from) {
            Some(moved) if !moved.is_empty() => {
                self.0.entry(to.to_string()).or_default().extend(moved);
                true
            }
            _ => false,
        }
    }

    pub fn remove_blob(&mut self, blob_id: &str) -> Option<Vec<String>> {
        self.0.remove(blob_id)
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0
            .iter()
            .map(|(blob_id, comments)| (blob_id.as_str(), comments.as_slice()))
    }
}
