mod config;
mod error;
mod file_store;
mod local_file_store;
mod memory_file_store;
mod memory_store;
mod sql_store;
mod thread_store;

pub use config::{resolve_file_storage_path, SqlStoreConfig};
pub use error::{Result, StorageError};
pub use file_store::{
    sharded_relative_path, FileMetadata, FileStore, HealthReport, DEFAULT_ALLOWED_MIME_TYPES,
    DEFAULT_MAX_FILE_SIZE,
};
pub use local_file_store::LocalFileStore;
pub use memory_file_store::InMemoryFileStore;
pub use memory_store::InMemoryThreadStore;
pub use sql_store::SqlThreadStore;
pub use thread_store::{SourceFilter, ThreadStore};
