//! Blob (artifact) domain model.
//!
//! Blobs are immutable once created. "Editing" one means uploading a new blob
//! and deleting the old one, never mutating bytes in place.

use serde::{Deserialize, Serialize};

const TABULAR_EXTENSIONS: &[&str] = &["xlsx", "xls", "csv"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp"];

/// An immutable file attached to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    pub id: String,
    pub session_id: String,
    pub file_name: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub created_at: String,
}

impl Blob {
    /// Lower-cased file extension, if any.
    pub fn extension(&self) -> Option<String> {
        let (_, ext) = self.file_name.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_ascii_lowercase())
        }
    }

    /// Spreadsheet or CSV, i.e. a candidate bill of materials.
    pub fn is_tabular(&self) -> bool {
        self.extension()
            .is_some_and(|ext| TABULAR_EXTENSIONS.contains(&ext.as_str()))
    }

    /// Raster image, i.e. a candidate sketch.
    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
            || self
                .extension()
                .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
    }
}

/// Content for a blob that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlob {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl NewBlob {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }
}
