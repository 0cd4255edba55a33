//! Environment-variable configuration for the SQL thread store.
//!
//! Renamed from `TYLER_DB_ECHO`/`TYLER_DB_POOL_SIZE`/`TYLER_DB_MAX_OVERFLOW`
//! (`tyler/database/storage_backend.py`'s `SQLBackend.__init__`) to
//! `RELAY_*` (SPEC_FULL §11.3).

use std::env;

#[derive(Debug, Clone)]
pub struct SqlStoreConfig {
    pub echo: bool,
    pub pool_size: u32,
    pub max_overflow: u32,
}

impl SqlStoreConfig {
    pub fn from_env() -> Self {
        Self {
            echo: env::var("RELAY_DB_ECHO")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            pool_size: env::var("RELAY_DB_POOL_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            max_overflow: env::var("RELAY_DB_MAX_OVERFLOW")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        }
    }
}

/// Resolves the file-store root: explicit arg > `RELAY_FILE_STORAGE_PATH` >
/// `~/.relay/files` (renamed from `TYLER_FILE_STORAGE_PATH`).
pub fn resolve_file_storage_path(explicit: Option<&str>) -> std::path::PathBuf {
    if let Some(p) = explicit {
        return std::path::PathBuf::from(p);
    }
    if let Ok(p) = env::var("RELAY_FILE_STORAGE_PATH") {
        return std::path::PathBuf::from(p);
    }
    dirs_home().join(".relay").join("files")
}

fn dirs_home() -> std::path::PathBuf {
    env::var("HOME").map(std::path::PathBuf::from).unwrap_or_else(|_| std::path::PathBuf::from("."))
}
