//! Attachment: a file bound to a message, persisted via the file store and
//! referenced in outgoing chat-completion projections by URL.
//!
//! Grounded on `tyler/models/message.py`'s `Attachment` class and
//! `tyler/storage/file_store.py`'s lifecycle.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle status of an Attachment (spec.md §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentStatus {
    Pending,
    Stored,
    Failed,
}

/// A logical file reference bound to a message.
///
/// `data` holds the raw bytes transiently (e.g. between construction and
/// `ensure_stored`); it is not expected to be serialized alongside the
/// persisted thread record the way metadata fields are — storage backends
/// persist file bytes through the file store, not inline in the thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub mime_type: Option<String>,
    #[serde(skip)]
    pub data: Option<Vec<u8>>,
    pub file_id: Option<String>,
    pub storage_path: Option<String>,
    pub status: AttachmentStatus,
    pub processed_content: Option<Value>,
}

impl Attachment {
    /// Create a new attachment from raw bytes, not yet stored.
    pub fn new(filename: impl Into<String>, data: Vec<u8>, mime_type: Option<String>) -> Self {
        Self {
            filename: filename.into(),
            mime_type,
            data: Some(data),
            file_id: None,
            storage_path: None,
            status: AttachmentStatus::Pending,
            processed_content: None,
        }
    }

    /// Build a chat-completion file reference string: `[File: <url> (<mime>)]`
    /// (spec.md §4.1 projection rules).
    pub fn reference(&self, url: &str) -> String {
        format!(
            "[File: {} ({})]",
            url,
            self.mime_type.as_deref().unwrap_or("application/octet-stream")
        )
    }

    pub fn mark_stored(&mut self, file_id: impl Into<String>, storage_path: impl Into<String>) {
        self.file_id = Some(file_id.into());
        self.storage_path = Some(storage_path.into());
        self.status = AttachmentStatus::Stored;
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.status = AttachmentStatus::Failed;
        self.processed_content = Some(serde_json::json!({ "error": reason.into() }));
    }

    pub fn is_image(&self) -> bool {
        self.mime_type
            .as_deref()
            .map(|m| m.starts_with("image/"))
            .unwrap_or(false)
    }
}
