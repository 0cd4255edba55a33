//! Storage errors. These propagate to the caller as fatal failures
//! (spec.md §7): the agent loop never tries to recover from them itself.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("thread not found: {0}")]
    ThreadNotFound(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("file too large: {size} bytes exceeds limit of {limit} bytes")]
    FileTooLarge { size: usize, limit: usize },

    #[error("storage capacity exceeded: {used} bytes used, {needed} bytes needed, {limit} bytes maximum")]
    StorageFull { used: u64, needed: u64, limit: u64 },

    /// An attachment-phase failure during `save` (spec.md §6): attachments
    /// already written during this call must be rolled back.
    #[error("failed to process attachment: {0}")]
    AttachmentPhase(String),

    /// A DB-phase failure during `save` (spec.md §6): attachments already
    /// written are left in place (best-effort orphaning).
    #[error("database error: {0}")]
    DbPhase(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Sql(#[from] sqlx::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
