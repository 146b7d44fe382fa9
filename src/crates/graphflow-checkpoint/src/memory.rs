//! In-memory state store for development and testing
//!
//! [`InMemoryStateStore`] keeps every thread's snapshot history in a
//! `HashMap` behind an async `RwLock`. Nothing survives a restart, which
//! makes it suitable for engine unit tests and short-lived embedded use,
//! and unsuitable anywhere the crash-recovery guarantees matter. Use the
//! SQLite-backed store from the `orchestrator` crate there.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::snapshot::StateSnapshot;
use crate::traits::StateStore;

/// Thread-safe, ephemeral snapshot store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStateStore {
    threads: Arc<RwLock<HashMap<String, Vec<StateSnapshot>>>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of threads with at least one snapshot.
    pub async fn thread_count(&self) -> usize {
        self.threads.read().await.len()
    }

    /// Total snapshots across all threads.
    pub async fn snapshot_count(&self) -> usize {
        self.threads.read().await.values().map(Vec::len).sum()
    }

    /// Drop all stored snapshots. Test isolation helper.
    pub async fn clear(&self) {
        self.threads.write().await.clear();
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn save(&self, snapshot: StateSnapshot) -> crate::Result<()> {
        let mut threads = self.threads.write().await;
        threads
            .entry(snapshot.thread_id.clone())
            .or_default()
            .push(snapshot);
        Ok(())
    }

    async fn latest(&self, thread_id: &str) -> crate::Result<Option<StateSnapshot>> {
        let threads = self.threads.read().await;
        Ok(threads.get(thread_id).and_then(|v| v.last()).cloned())
    }

    async fn history(&self, thread_id: &str) -> crate::Result<Vec<StateSnapshot>> {
        let threads = self.threads.read().await;
        let mut snapshots = threads.get(thread_id).cloned().unwrap_or_default();
        snapshots.reverse();
        Ok(snapshots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_and_latest() {
        let store = InMemoryStateStore::new();

        store
            .save(StateSnapshot::new("t1", json!({"step": 1}), vec!["b".into()]))
            .await
            .unwrap();
        store
            .save(StateSnapshot::new("t1", json!({"step": 2}), vec![]))
            .await
            .unwrap();

        let latest = store.latest("t1").await.unwrap().unwrap();
        assert_eq!(latest.values["step"], 2);
        assert!(latest.is_terminal());
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let store = InMemoryStateStore::new();
        for step in 0..3 {
            store
                .save(StateSnapshot::new("t1", json!({"step": step}), vec![]))
                .await
                .unwrap();
        }

        let history = store.history("t1").await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].values["step"], 2);
        assert_eq!(history[2].values["step"], 0);
    }

    #[tokio::test]
    async fn test_thread_isolation() {
        let store = InMemoryStateStore::new();
        store
            .save(StateSnapshot::new("t1", json!({}), vec![]))
            .await
            .unwrap();
        store
            .save(StateSnapshot::new("t2", json!({}), vec![]))
            .await
            .unwrap();

        assert_eq!(store.thread_count().await, 2);
        assert!(store.latest("t3").await.unwrap().is_none());
        assert!(store.history("t3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear() {
        let store = InMemoryStateStore::new();
        store
            .save(StateSnapshot::new("t1", json!({}), vec![]))
            .await
            .unwrap();
        store.clear().await;
        assert_eq!(store.snapshot_count().await, 0);
    }
}
