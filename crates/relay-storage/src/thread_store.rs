//! `ThreadStore`: the thread persistence contract (spec.md §6).
//!
//! Grounded on `tyler/database/storage_backend.py`'s `StorageBackend` ABC.

use async_trait::async_trait;
use relay_thread::Thread;
use serde_json::Value;

use crate::error::Result;

/// Filter for `find_by_source`: matches `source.name` plus any extra
/// fields supplied.
pub struct SourceFilter<'a> {
    pub name: &'a str,
    pub extra: &'a [(&'a str, Value)],
}

#[async_trait]
pub trait ThreadStore: Send + Sync {
    /// Idempotent setup (schema migration for durable backends, no-op for
    /// in-memory).
    async fn initialize(&self) -> Result<()>;

    /// Atomic: on failure, storage is left unchanged (spec.md §6).
    /// Strips system messages before persisting (spec.md §6 persistence
    /// rules) and returns the thread as it was actually stored.
    async fn save(&self, thread: Thread) -> Result<Thread>;

    async fn get(&self, id: &str) -> Result<Option<Thread>>;

    async fn delete(&self, id: &str) -> Result<bool>;

    /// Newest first by `updated_at`.
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Thread>>;

    async fn list_recent(&self, limit: Option<usize>) -> Result<Vec<Thread>> {
        self.list(limit.unwrap_or(20), 0).await
    }

    /// Exact equality on thread `attributes`.
    async fn find_by_attributes(&self, attributes: &[(&str, Value)]) -> Result<Vec<Thread>>;

    async fn find_by_source(&self, filter: SourceFilter<'_>) -> Result<Vec<Thread>>;
}
