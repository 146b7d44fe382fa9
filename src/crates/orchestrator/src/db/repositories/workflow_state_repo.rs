//! Workflow state snapshot repository and the durable state store
//!
//! [`SqliteStateStore`] is the production implementation of
//! [`StateStore`]: it is what lets a paused workflow survive a process
//! restart. Writes are serialized through a store-wide mutex on top of
//! SQLite's own locking, so snapshot history stays insertion-ordered even
//! if two service handles share one store.

use std::sync::Arc;

use async_trait::async_trait;
use graphflow_checkpoint::{StateSnapshot, StateStore, StoreError};
use tokio::sync::Mutex;

use crate::db::connection::{Database, DatabasePool};
use crate::db::models::WorkflowStateRow;

/// Raw row operations for the `workflow_states` table
pub struct WorkflowStateRepository;

impl WorkflowStateRepository {
    pub async fn insert(pool: &DatabasePool, row: &WorkflowStateRow) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO workflow_states (snapshot_id, thread_id, state_values, next_nodes, interrupts, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.snapshot_id)
        .bind(&row.thread_id)
        .bind(&row.state_values)
        .bind(&row.next_nodes)
        .bind(&row.interrupts)
        .bind(&row.created_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn latest_for_thread(
        pool: &DatabasePool,
        thread_id: &str,
    ) -> Result<Option<WorkflowStateRow>, sqlx::Error> {
        sqlx::query_as::<_, WorkflowStateRow>(
            "SELECT * FROM workflow_states WHERE thread_id = ? ORDER BY created_at DESC, rowid DESC LIMIT 1",
        )
        .bind(thread_id)
        .fetch_optional(pool)
        .await
    }

    /// Newest first, rowid as tiebreak for same-timestamp snapshots.
    pub async fn list_for_thread(
        pool: &DatabasePool,
        thread_id: &str,
    ) -> Result<Vec<WorkflowStateRow>, sqlx::Error> {
        sqlx::query_as::<_, WorkflowStateRow>(
            "SELECT * FROM workflow_states WHERE thread_id = ? ORDER BY created_at DESC, rowid DESC",
        )
        .bind(thread_id)
        .fetch_all(pool)
        .await
    }
}

/// SQLite-backed [`StateStore`]
#[derive(Clone)]
pub struct SqliteStateStore {
    db: Database,
    write_lock: Arc<Mutex<()>>,
}

impl SqliteStateStore {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            write_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl StateStore for SqliteStateStore {
    async fn save(&self, snapshot: StateSnapshot) -> Result<(), StoreError> {
        let row = WorkflowStateRow::from_snapshot(&snapshot)?;
        let _guard = self.write_lock.lock().await;
        WorkflowStateRepository::insert(self.db.pool(), &row)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn latest(&self, thread_id: &str) -> Result<Option<StateSnapshot>, StoreError> {
        let row = WorkflowStateRepository::latest_for_thread(self.db.pool(), thread_id)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        row.map(WorkflowStateRow::into_snapshot).transpose()
    }

    async fn history(&self, thread_id: &str) -> Result<Vec<StateSnapshot>, StoreError> {
        let rows = WorkflowStateRepository::list_for_thread(self.db.pool(), thread_id)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        rows.into_iter()
            .map(WorkflowStateRow::into_snapshot)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_latest_history() {
        let db = Database::open_in_memory().await.unwrap();
        let store = SqliteStateStore::new(db);

        for step in 0..3 {
            store
                .save(StateSnapshot::new(
                    "wf-1",
                    json!({"step": step}),
                    vec!["next_node".to_string()],
                ))
                .await
                .unwrap();
        }

        let latest = store.latest("wf-1").await.unwrap().unwrap();
        assert_eq!(latest.values["step"], 2);

        let history = store.history("wf-1").await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].values["step"], 2);
        assert_eq!(history[2].values["step"], 0);
    }

    #[tokio::test]
    async fn test_interrupt_survives_round_trip() {
        let db = Database::open_in_memory().await.unwrap();
        let store = SqliteStateStore::new(db);

        let payload = json!({
            "checkpoint_id": "cp-1",
            "step_name": "plan_ready_for_review",
            "actions": {"primary": "send_to_reviewers", "secondary": ["edit_and_continue", "cancel"]},
        });
        store
            .save(
                StateSnapshot::new("wf-1", json!({}), vec!["plan_checkpoint".to_string()])
                    .with_interrupt(payload.clone()),
            )
            .await
            .unwrap();

        let latest = store.latest("wf-1").await.unwrap().unwrap();
        assert!(latest.is_interrupted());
        assert_eq!(latest.pending_interrupt().unwrap(), &payload);
    }

    #[tokio::test]
    async fn test_thread_isolation() {
        let db = Database::open_in_memory().await.unwrap();
        let store = SqliteStateStore::new(db);

        store
            .save(StateSnapshot::new("wf-a", json!({"who": "a"}), vec![]))
            .await
            .unwrap();
        store
            .save(StateSnapshot::new("wf-b", json!({"who": "b"}), vec![]))
            .await
            .unwrap();

        assert_eq!(
            store.latest("wf-a").await.unwrap().unwrap().values["who"],
            "a"
        );
        assert!(store.latest("wf-c").await.unwrap().is_none());
    }
}
