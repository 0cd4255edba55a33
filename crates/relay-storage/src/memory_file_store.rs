//! `InMemoryFileStore`: a plain-map backend for tests and standalone use.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::file_store::{FileMetadata, FileStore, HealthReport};

#[derive(Clone, Default)]
pub struct InMemoryFileStore {
    files: Arc<RwLock<HashMap<String, (FileMetadata, Vec<u8>)>>>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileStore for InMemoryFileStore {
    async fn save(&self, content: Vec<u8>, filename: &str, mime_type: Option<&str>) -> Result<FileMetadata> {
        let id = Uuid::new_v4().to_string();
        let meta = FileMetadata {
            id: id.clone(),
            filename: filename.to_string(),
            mime_type: mime_type.unwrap_or("application/octet-stream").to_string(),
            storage_path: format!("memory://{id}"),
            size: content.len(),
            created_at: Utc::now(),
        };
        self.files.write().await.insert(id, (meta.clone(), content));
        Ok(meta)
    }

    async fn get(&self, file_id: &str) -> Result<Vec<u8>> {
        self.files
            .read()
            .await
            .get(file_id)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| StorageError::FileNotFound(file_id.to_string()))
    }

    async fn delete(&self, file_id: &str) -> Result<()> {
        self.files.write().await.remove(file_id);
        Ok(())
    }

    async fn list_files(&self) -> Result<Vec<String>> {
        Ok(self.files.read().await.keys().cloned().collect())
    }

    async fn check_health(&self) -> Result<HealthReport> {
        let guard = self.files.read().await;
        let total_size = guard.values().map(|(m, _)| m.size as u64).sum();
        Ok(HealthReport {
            healthy: true,
            total_size,
            file_count: guard.len(),
            errors: Vec::new(),
        })
    }
}
