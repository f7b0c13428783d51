//! Opaque key/value persistence seam
//!
//! The coordinator treats its backend as get/set/list-by-prefix and nothing
//! more, so swapping the in-memory store for the file-backed one (or a real
//! database adapter) never touches coordination logic. Backend failures are
//! typed [`StoreError`]s; callers decide what a failed read or write means.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Persistence seam for coordination state
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Keys with the given prefix, in first-insertion order
    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Map plus insertion order, shared by both store implementations
#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreInner {
    entries: HashMap<String, Value>,
    order: Vec<String>,
}

impl StoreInner {
    fn set(&mut self, key: &str, value: Value) {
        if !self.entries.contains_key(key) {
            self.order.push(key.to_string());
        }
        self.entries.insert(key.to_string(), value);
    }

    fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.order
            .iter()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect()
    }
}

/// In-memory store for tests and single-process runs
#[derive(Debug, Default)]
pub struct InMemoryKvStore {
    inner: RwLock<StoreInner>,
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.inner.read().await.entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.inner.write().await.set(key, value);
        Ok(())
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.inner.read().await.keys_with_prefix(prefix))
    }
}

/// File-backed store: one JSON snapshot, rewritten after every set.
///
/// Suited to CLI runs where coordination state should survive the process;
/// not meant for concurrent processes sharing one file.
#[derive(Debug)]
pub struct FileKvStore {
    inner: RwLock<StoreInner>,
    path: String,
}

impl FileKvStore {
    /// Load state from `path`, or start empty if the file doesn't exist
    pub async fn load_or_create(path: impl Into<String>) -> Result<Self, StoreError> {
        let path = path.into();
        let inner = if Path::new(&path).exists() {
            let content = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| StoreError::Backend(format!("read {}: {}", path, e)))?;
            serde_json::from_str(&content)
                .map_err(|e| StoreError::Backend(format!("malformed state file {}: {}", path, e)))?
        } else {
            StoreInner::default()
        };

        Ok(Self {
            inner: RwLock::new(inner),
            path,
        })
    }

    async fn persist(&self, inner: &StoreInner) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(inner)
            .map_err(|e| StoreError::Backend(format!("encode state: {}", e)))?;
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| StoreError::Backend(format!("write {}: {}", self.path, e)))
    }
}

#[async_trait]
impl KvStore for FileKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.inner.read().await.entries.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        // Hold the write lock through the save so writers serialize
        let mut inner = self.inner.write().await;
        inner.set(key, value);
        self.persist(&inner).await
    }

    async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.inner.read().await.keys_with_prefix(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn get_missing_key_is_none() {
        let store = InMemoryKvStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let store = InMemoryKvStore::new();
        store.set("k", json!({"v": 1})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"v": 1})));
    }

    #[tokio::test]
    async fn keys_preserve_insertion_order() {
        let store = InMemoryKvStore::new();
        store.set("task:c", json!(1)).await.unwrap();
        store.set("task:a", json!(2)).await.unwrap();
        store.set("other:x", json!(3)).await.unwrap();
        store.set("task:b", json!(4)).await.unwrap();
        // Updating an existing key must not move it
        store.set("task:c", json!(5)).await.unwrap();

        let keys = store.keys("task:").await.unwrap();
        assert_eq!(keys, vec!["task:c", "task:a", "task:b"]);
    }

    #[tokio::test]
    async fn file_store_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json").display().to_string();

        {
            let store = FileKvStore::load_or_create(&path).await.unwrap();
            store.set("task:1", json!({"n": 1})).await.unwrap();
            store.set("portfolio:u1", json!({"total": 50.0})).await.unwrap();
        }

        let reloaded = FileKvStore::load_or_create(&path).await.unwrap();
        assert_eq!(
            reloaded.get("task:1").await.unwrap(),
            Some(json!({"n": 1}))
        );
        assert_eq!(reloaded.keys("task:").await.unwrap(), vec!["task:1"]);
    }

    #[tokio::test]
    async fn file_store_rejects_malformed_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let result = FileKvStore::load_or_create(path.display().to_string()).await;
        assert!(matches!(result, Err(StoreError::Backend(_))));
    }
}
