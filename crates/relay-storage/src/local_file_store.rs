//! `LocalFileStore`: disk-backed `FileStore`, sharded by file id prefix.
//!
//! Grounded on `tyler/storage/file_store.py`'s `FileStore._get_file_path`
//! (two-character shard directories) and `save_file`/`get_file`/`delete_file`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use tokio::fs;
use uuid::Uuid;

use crate::error::{Result, StorageError};
use crate::file_store::{sharded_relative_path, FileMetadata, FileStore, HealthReport, DEFAULT_ALLOWED_MIME_TYPES, DEFAULT_MAX_FILE_SIZE};

#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
    max_file_size: usize,
    allowed_mime_types: Vec<String>,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_mime_types: DEFAULT_ALLOWED_MIME_TYPES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_max_file_size(mut self, max_file_size: usize) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    fn path_for(&self, file_id: &str) -> PathBuf {
        self.root.join(sharded_relative_path(file_id))
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn save(&self, content: Vec<u8>, filename: &str, mime_type: Option<&str>) -> Result<FileMetadata> {
        if content.len() > self.max_file_size {
            return Err(StorageError::FileTooLarge {
                size: content.len(),
                limit: self.max_file_size,
            });
        }
        let mime = mime_type.unwrap_or("application/octet-stream");
        if !self.allowed_mime_types.iter().any(|m| m == mime) {
            return Err(StorageError::UnsupportedFileType(mime.to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let path = self.path_for(&id);
        Self::ensure_parent(&path).await?;
        fs::write(&path, &content).await?;

        Ok(FileMetadata {
            id,
            filename: filename.to_string(),
            mime_type: mime.to_string(),
            storage_path: path.to_string_lossy().into_owned(),
            size: content.len(),
            created_at: Utc::now(),
        })
    }

    async fn get(&self, file_id: &str) -> Result<Vec<u8>> {
        let path = self.path_for(file_id);
        fs::read(&path)
            .await
            .map_err(|_| StorageError::FileNotFound(file_id.to_string()))
    }

    async fn delete(&self, file_id: &str) -> Result<()> {
        let path = self.path_for(file_id);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_files(&self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        let mut shard_entries = match fs::read_dir(&self.root).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };
        while let Some(shard) = shard_entries.next_entry().await? {
            if !shard.file_type().await?.is_dir() {
                continue;
            }
            let mut files = fs::read_dir(shard.path()).await?;
            while let Some(f) = files.next_entry().await? {
                if let Some(name) = f.file_name().to_str() {
                    out.push(format!("{}{}", shard.file_name().to_string_lossy(), name));
                }
            }
        }
        Ok(out)
    }

    async fn check_health(&self) -> Result<HealthReport> {
        let mut errors = Vec::new();
        if !self.root.exists() {
            if let Err(e) = fs::create_dir_all(&self.root).await {
                errors.push(format!("cannot create storage root: {e}"));
            }
        }
        let files = self.list_files().await.unwrap_or_default();
        let mut total_size = 0u64;
        for id in &files {
            if let Ok(meta) = fs::metadata(self.path_for(id)).await {
                total_size += meta.len();
            }
        }
        Ok(HealthReport {
            healthy: errors.is_empty(),
            total_size,
            file_count: files.len(),
            errors,
        })
    }
}
