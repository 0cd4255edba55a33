//! `FileStore`: the file persistence contract (spec.md §6).
//!
//! Default limits and MIME allow-list grounded verbatim on
//! `tyler/storage/file_store.py`'s `DEFAULT_MAX_FILE_SIZE`/
//! `DEFAULT_ALLOWED_MIME_TYPES`.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::error::Result;

pub const DEFAULT_MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

pub const DEFAULT_ALLOWED_MIME_TYPES: &[&str] = &[
    // Documents
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "text/csv",
    "application/json",
    // Images
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "image/svg+xml",
    // Archives
    "application/zip",
    "application/x-tar",
    "application/gzip",
];

#[derive(Debug, Clone)]
pub struct FileMetadata {
    pub id: String,
    pub filename: String,
    pub mime_type: String,
    pub storage_path: String,
    pub size: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub healthy: bool,
    pub total_size: u64,
    pub file_count: usize,
    pub errors: Vec<String>,
}

/// Sharding convention: a file's storage path is rooted at the first two
/// characters of its id (spec.md §6).
pub fn sharded_relative_path(file_id: &str) -> String {
    let (prefix, rest) = file_id.split_at(file_id.len().min(2));
    format!("{prefix}/{rest}")
}

#[async_trait]
pub trait FileStore: Send + Sync {
    async fn save(&self, content: Vec<u8>, filename: &str, mime_type: Option<&str>) -> Result<FileMetadata>;

    async fn get(&self, file_id: &str) -> Result<Vec<u8>>;

    async fn delete(&self, file_id: &str) -> Result<()>;

    async fn list_files(&self) -> Result<Vec<String>>;

    async fn check_health(&self) -> Result<HealthReport>;

    async fn batch_save(
        &self,
        files: Vec<(Vec<u8>, String, Option<String>)>,
    ) -> Result<Vec<FileMetadata>> {
        let mut out = Vec::with_capacity(files.len());
        for (content, filename, mime_type) in files {
            out.push(self.save(content, &filename, mime_type.as_deref()).await?);
        }
        Ok(out)
    }

    async fn batch_delete(&self, file_ids: &[String]) -> Result<()>
    where
        Self: Sized,
    {
        let results = join_all(file_ids.iter().map(|id| self.delete(id))).await;
        for r in results {
            r?;
        }
        Ok(())
    }

    /// Deletes every stored file not named in `referenced_file_ids`, returning
    /// the count deleted and any per-file delete errors (spec.md §6).
    ///
    /// `tyler/storage/file_store.py`'s `cleanup_orphaned_files` takes a
    /// SQLAlchemy session and queries `MessageRecord.attachments` itself for
    /// the referenced set; this crate has no dependency on a thread store, so
    /// the caller computes `referenced_file_ids` (e.g. from
    /// `ThreadStore::list`'s attachment metadata) and passes it in instead.
    async fn cleanup_orphaned_files(&self, referenced_file_ids: &HashSet<String>) -> Result<(usize, Vec<String>)>
    where
        Self: Sized,
    {
        let stored = self.list_files().await?;
        let orphaned: Vec<&String> = stored.iter().filter(|id| !referenced_file_ids.contains(*id)).collect();

        let mut deleted = 0;
        let mut errors = Vec::new();
        for file_id in orphaned {
            match self.delete(file_id).await {
                Ok(()) => deleted += 1,
                Err(e) => errors.push(format!("Failed to delete {file_id}: {e}")),
            }
        }
        Ok((deleted, errors))
    }
}
