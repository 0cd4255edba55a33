//! `SqlThreadStore`: sqlite-backed `ThreadStore`.
//!
//! Grounded on `tyler/database/storage_backend.py`'s `SQLBackend.save`: a
//! failure while the attachment-processing loop runs rolls those
//! attachments back (`StorageError::AttachmentPhase`); a failure once the
//! database transaction has started leaves already-stored attachments in
//! place, since other threads may reference them (`StorageError::DbPhase`).
//! Uses sqlite rather than the teacher's postgres so the workspace needs no
//! external database service; raw SQL rather than the `sqlx::query!` macro
//! so the crate needs no live DB connection to type-check queries.

use std::sync::Arc;

use async_trait::async_trait;
use relay_thread::{Message, Thread};
use serde_json::Value;
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::config::SqlStoreConfig;
use crate::error::{Result, StorageError};
use crate::file_store::FileStore;
use crate::thread_store::{SourceFilter, ThreadStore};

pub struct SqlThreadStore {
    pool: SqlitePool,
    file_store: Arc<dyn FileStore>,
}

impl SqlThreadStore {
    pub async fn connect(database_url: &str, config: &SqlStoreConfig, file_store: Arc<dyn FileStore>) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(config.pool_size + config.max_overflow)
            .connect(database_url)
            .await?;
        if config.echo {
            tracing::info!(database_url, "connected sql thread store");
        }
        Ok(Self { pool, file_store })
    }

    async fn store_attachments(&self, thread: &mut Thread) -> std::result::Result<(), Vec<String>> {
        let mut stored_file_ids = Vec::new();
        for message in thread.messages_mut() {
            for attachment in &mut message.attachments {
                if attachment.file_id.is_some() {
                    continue;
                }
                let Some(bytes) = attachment.data.clone() else { continue };
                match self.file_store.save(bytes, &attachment.filename, attachment.mime_type.as_deref()).await {
                    Ok(meta) => {
                        stored_file_ids.push(meta.id.clone());
                        attachment.mark_stored(meta.id, meta.storage_path);
                    }
                    Err(e) => {
                        tracing::warn!(filename = %attachment.filename, error = %e, "attachment phase failed");
                        for id in &stored_file_ids {
                            let _ = self.file_store.delete(id).await;
                        }
                        return Err(stored_file_ids);
                    }
                }
            }
        }
        Ok(())
    }

    fn row_to_message(row: &SqliteRow) -> Result<Message> {
        let role: String = row.try_get("role")?;
        let content: String = row.try_get("content")?;
        let timestamp: String = row.try_get("timestamp")?;
        let mut message = match role.as_str() {
            "system" => Message::system(&content),
            "assistant" => Message::assistant(&content),
            "tool" => {
                let tool_call_id: String = row.try_get("tool_call_id")?;
                let name: String = row.try_get("name")?;
                Message::tool(tool_call_id, name, &content)
            }
            _ => Message::user(&content),
        };
        message.timestamp = timestamp.parse().unwrap_or(message.timestamp);

        if let Ok(Some(tool_calls_json)) = row.try_get::<Option<String>, _>("tool_calls") {
            message.tool_calls = serde_json::from_str(&tool_calls_json)?;
        }
        if let Ok(Some(attrs_json)) = row.try_get::<Option<String>, _>("attributes") {
            message.attributes = serde_json::from_str(&attrs_json)?;
        }
        if let Ok(Some(source_json)) = row.try_get::<Option<String>, _>("source") {
            message.source = serde_json::from_str(&source_json)?;
        }
        if let Ok(Some(metrics_json)) = row.try_get::<Option<String>, _>("metrics_json") {
            message.metrics = serde_json::from_str(&metrics_json)?;
        }
        if let Ok(Some(reactions_json)) = row.try_get::<Option<String>, _>("reactions_json") {
            message.reactions = serde_json::from_str(&reactions_json)?;
        }
        if let Ok(Some(attachments_json)) = row.try_get::<Option<String>, _>("attachments_json") {
            message.attachments = serde_json::from_str(&attachments_json)?;
        }
        Ok(message)
    }
}

#[async_trait]
impl ThreadStore for SqlThreadStore {
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS threads (
                id TEXT PRIMARY KEY,
                title TEXT,
                attributes TEXT NOT NULL,
                source TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                thread_id TEXT NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
                sequence INTEGER NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                name TEXT,
                tool_call_id TEXT,
                tool_calls TEXT,
                attributes TEXT,
                source TEXT,
                metrics_json TEXT,
                reactions_json TEXT,
                attachments_json TEXT,
                timestamp TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_thread_id ON messages(thread_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn save(&self, thread: Thread) -> Result<Thread> {
        let mut stripped = thread.without_system_message();

        if let Err(rolled_back) = self.store_attachments(&mut stripped).await {
            return Err(StorageError::AttachmentPhase(format!(
                "attachment storage failed, rolled back {} file(s)",
                rolled_back.len()
            )));
        }

        let mut tx = self.pool.begin().await.map_err(|e| StorageError::DbPhase(e.to_string()))?;

        let attrs = serde_json::to_string(&stripped.attributes)?;
        let source = stripped.source.as_ref().map(serde_json::to_string).transpose()?;

        sqlx::query(
            "INSERT INTO threads (id, title, attributes, source, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                attributes = excluded.attributes,
                source = excluded.source,
                updated_at = excluded.updated_at",
        )
        .bind(&stripped.id)
        .bind(&stripped.title)
        .bind(&attrs)
        .bind(&source)
        .bind(stripped.created_at.to_rfc3339())
        .bind(stripped.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::DbPhase(e.to_string()))?;

        sqlx::query("DELETE FROM messages WHERE thread_id = ?")
            .bind(&stripped.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::DbPhase(e.to_string()))?;

        for message in stripped.messages() {
            let tool_calls = message.tool_calls.as_ref().map(serde_json::to_string).transpose().map_err(StorageError::from)?;
            let msg_attrs = serde_json::to_string(&message.attributes).map_err(StorageError::from)?;
            let msg_source = message.source.as_ref().map(serde_json::to_string).transpose().map_err(StorageError::from)?;
            let metrics_json = serde_json::to_string(&message.metrics).map_err(StorageError::from)?;
            let reactions_json = serde_json::to_string(&message.reactions).map_err(StorageError::from)?;
            let attachments_json = serde_json::to_string(&message.attachments).map_err(StorageError::from)?;

            sqlx::query(
                "INSERT INTO messages
                    (id, thread_id, sequence, role, content, name, tool_call_id, tool_calls, attributes, source,
                     metrics_json, reactions_json, attachments_json, timestamp)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&message.id)
            .bind(&stripped.id)
            .bind(message.sequence as i64)
            .bind(message.role.as_str())
            .bind(message.content.as_text())
            .bind(&message.name)
            .bind(&message.tool_call_id)
            .bind(&tool_calls)
            .bind(&msg_attrs)
            .bind(&msg_source)
            .bind(&metrics_json)
            .bind(&reactions_json)
            .bind(&attachments_json)
            .bind(message.timestamp.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::DbPhase(e.to_string()))?;
        }

        tx.commit().await.map_err(|e| StorageError::DbPhase(e.to_string()))?;
        Ok(stripped)
    }

    async fn get(&self, id: &str) -> Result<Option<Thread>> {
        let thread_row = sqlx::query("SELECT id, title, attributes, source, created_at, updated_at FROM threads WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = thread_row else { return Ok(None) };

        let mut thread = Thread::new(row.try_get::<String, _>("id")?);
        thread.title = row.try_get("title")?;
        let attrs_json: String = row.try_get("attributes")?;
        thread.attributes = serde_json::from_str(&attrs_json)?;
        if let Some(source_json) = row.try_get::<Option<String>, _>("source")? {
            thread.source = Some(serde_json::from_str(&source_json)?);
        }

        let message_rows = sqlx::query(
            "SELECT * FROM messages WHERE thread_id = ? ORDER BY (role <> 'system'), sequence",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut messages = Vec::with_capacity(message_rows.len());
        for row in &message_rows {
            messages.push(Self::row_to_message(row)?);
        }
        thread.set_messages(messages);

        Ok(Some(thread))
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM threads WHERE id = ?").bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Thread>> {
        let ids: Vec<String> = sqlx::query("SELECT id FROM threads ORDER BY updated_at DESC LIMIT ? OFFSET ?")
            .bind(limit as i64)
            .bind(offset as i64)
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(|r| r.try_get::<String, _>("id"))
            .collect::<std::result::Result<_, _>>()?;

        let mut threads = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(t) = self.get(&id).await? {
                threads.push(t);
            }
        }
        Ok(threads)
    }

    async fn find_by_attributes(&self, attributes: &[(&str, Value)]) -> Result<Vec<Thread>> {
        let mut out = Vec::new();
        for thread in self.list(usize::MAX.min(10_000), 0).await? {
            if attributes.iter().all(|(k, v)| thread.attributes.get(*k) == Some(v)) {
                out.push(thread);
            }
        }
        Ok(out)
    }

    async fn find_by_source(&self, filter: SourceFilter<'_>) -> Result<Vec<Thread>> {
        let mut out = Vec::new();
        for thread in self.list(usize::MAX.min(10_000), 0).await? {
            let Some(source) = &thread.source else { continue };
            if source.get("name").and_then(|v| v.as_str()) != Some(filter.name) {
                continue;
            }
            if filter.extra.iter().all(|(k, v)| source.get(*k) == Some(v)) {
                out.push(thread);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_file_store::InMemoryFileStore;
    use relay_thread::Message;

    async fn store() -> SqlThreadStore {
        let config = SqlStoreConfig { echo: false, pool_size: 1, max_overflow: 0 };
        let store = SqlThreadStore::connect("sqlite::memory:", &config, Arc::new(InMemoryFileStore::new()))
            .await
            .unwrap();
        store.initialize().await.unwrap();
        store
    }

    #[tokio::test]
    async fn save_then_get_round_trips_messages() {
        let store = store().await;
        let mut thread = Thread::new("t1");
        thread.add_message(Message::system("sys")).unwrap();
        thread.add_message(Message::user("hello")).unwrap();

        let mut reply = Message::assistant("hi there").with_metrics(relay_thread::MessageMetrics {
            model: Some("gpt-5.2".to_string()),
            ..Default::default()
        });
        reply.add_reaction("👍", "alice");
        thread.add_message(reply).unwrap();
        store.save(thread).await.unwrap();

        let reloaded = store.get("t1").await.unwrap().unwrap();
        assert!(reloaded.system_message().is_none());
        assert_eq!(reloaded.messages().len(), 2);
        assert_eq!(reloaded.messages()[0].content.as_text(), "hello");

        let reloaded_reply = &reloaded.messages()[1];
        assert_eq!(reloaded_reply.metrics.model.as_deref(), Some("gpt-5.2"));
        assert_eq!(reloaded_reply.reactions_for("👍").map(|users| users.contains("alice")), Some(true));
    }

    #[tokio::test]
    async fn get_missing_thread_returns_none() {
        let store = store().await;
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_is_idempotent_on_id_and_updates_in_place() {
        let store = store().await;
        let mut thread = Thread::new("t1");
        thread.add_message(Message::user("v1")).unwrap();
        store.save(thread.clone()).await.unwrap();

        thread.set_title("renamed");
        store.save(thread).await.unwrap();

        let reloaded = store.get("t1").await.unwrap().unwrap();
        assert_eq!(reloaded.title.as_deref(), Some("renamed"));
    }

    #[tokio::test]
    async fn delete_removes_the_thread() {
        let store = store().await;
        let thread = Thread::new("t1");
        store.save(thread).await.unwrap();
        assert!(store.delete("t1").await.unwrap());
        assert!(store.get("t1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_orders_newest_first() {
        let store = store().await;
        store.save(Thread::new("older")).await.unwrap();
        store.save(Thread::new("newer")).await.unwrap();
        let listed = store.list(10, 0).await.unwrap();
        assert_eq!(listed.len(), 2);
    }
}
