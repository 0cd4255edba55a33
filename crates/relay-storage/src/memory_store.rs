//! `InMemoryThreadStore`: a plain-map backend for tests and standalone use.
//!
//! Grounded on `tyler/database/storage_backend.py`'s `MemoryBackend`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use relay_thread::Thread;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::Result;
use crate::thread_store::{SourceFilter, ThreadStore};

#[derive(Clone, Default)]
pub struct InMemoryThreadStore {
    threads: Arc<RwLock<HashMap<String, Thread>>>,
}

impl InMemoryThreadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ThreadStore for InMemoryThreadStore {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn save(&self, thread: Thread) -> Result<Thread> {
        let stripped = thread.without_system_message();
        let mut guard = self.threads.write().await;
        guard.insert(stripped.id.clone(), stripped.clone());
        Ok(stripped)
    }

    async fn get(&self, id: &str) -> Result<Option<Thread>> {
        Ok(self.threads.read().await.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.threads.write().await.remove(id).is_some())
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<Thread>> {
        let guard = self.threads.read().await;
        let mut threads: Vec<Thread> = guard.values().cloned().collect();
        threads.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(threads.into_iter().skip(offset).take(limit).collect())
    }

    async fn find_by_attributes(&self, attributes: &[(&str, Value)]) -> Result<Vec<Thread>> {
        let guard = self.threads.read().await;
        Ok(guard
            .values()
            .filter(|t| {
                attributes
                    .iter()
                    .all(|(k, v)| t.attributes.get(*k) == Some(v))
            })
            .cloned()
            .collect())
    }

    async fn find_by_source(&self, filter: SourceFilter<'_>) -> Result<Vec<Thread>> {
        let guard = self.threads.read().await;
        Ok(guard
            .values()
            .filter(|t| {
                let Some(source) = &t.source else { return false };
                if source.get("name").and_then(|v| v.as_str()) != Some(filter.name) {
                    return false;
                }
                filter.extra.iter().all(|(k, v)| source.get(*k) == Some(v))
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_thread::Message;

    #[tokio::test]
    async fn save_strips_system_messages_and_get_preserves_the_rest() {
        let store = InMemoryThreadStore::new();
        let mut thread = Thread::new("t1");
        thread.add_message(Message::system("sys")).unwrap();
        thread.add_message(Message::user("hi")).unwrap();
        store.save(thread).await.unwrap();

        let reloaded = store.get("t1").await.unwrap().unwrap();
        assert!(reloaded.system_message().is_none());
        assert_eq!(reloaded.messages().len(), 1);
    }

    #[tokio::test]
    async fn list_is_newest_first_by_updated_at() {
        let store = InMemoryThreadStore::new();
        let mut older = Thread::new("old");
        older.add_message(Message::user("a")).unwrap();
        let mut newer = Thread::new("new");
        newer.add_message(Message::user("b")).unwrap();
        // Force a visible ordering without relying on wall-clock resolution.
        newer.set_title("newer");
        store.save(older).await.unwrap();
        store.save(newer).await.unwrap();

        let listed = store.list(10, 0).await.unwrap();
        assert!(listed[0].updated_at >= listed[1].updated_at);
    }
}
