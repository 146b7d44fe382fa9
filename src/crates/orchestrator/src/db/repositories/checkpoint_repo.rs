//! User checkpoint repository for database operations

use chrono::Utc;

use crate::db::connection::DatabasePool;
use crate::db::models::{CheckpointStatus, UserCheckpointRow};

/// Repository for human checkpoint audit rows
pub struct CheckpointRepository;

impl CheckpointRepository {
    /// Insert a checkpoint row in `pending`. Idempotent on `id`: the engine
    /// (and pollers observing the same suspension) may record the same
    /// checkpoint several times.
    pub async fn create(
        pool: &DatabasePool,
        id: &str,
        workflow_id: &str,
        checkpoint_number: i64,
        step_name: &str,
        agent_outputs_json: &str,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT OR IGNORE INTO user_checkpoints (id, workflow_id, checkpoint_number, step_name, agent_outputs, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(workflow_id)
        .bind(checkpoint_number)
        .bind(step_name)
        .bind(agent_outputs_json)
        .bind(CheckpointStatus::Pending.as_str())
        .bind(&now)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Resolve a checkpoint with the user's action and edits.
    pub async fn resolve(
        pool: &DatabasePool,
        id: &str,
        status: CheckpointStatus,
        edited_content: Option<&str>,
        user_notes: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE user_checkpoints
             SET user_edited_content = ?, user_notes = ?, status = ?, resolved_at = ?
             WHERE id = ?",
        )
        .bind(edited_content)
        .bind(user_notes)
        .bind(status.as_str())
        .bind(&now)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Get a checkpoint by id.
    pub async fn get_by_id(
        pool: &DatabasePool,
        id: &str,
    ) -> Result<Option<UserCheckpointRow>, sqlx::Error> {
        sqlx::query_as::<_, UserCheckpointRow>("SELECT * FROM user_checkpoints WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List a workflow's checkpoints in creation order.
    pub async fn list_by_workflow(
        pool: &DatabasePool,
        workflow_id: &str,
    ) -> Result<Vec<UserCheckpointRow>, sqlx::Error> {
        sqlx::query_as::<_, UserCheckpointRow>(
            "SELECT * FROM user_checkpoints WHERE workflow_id = ? ORDER BY checkpoint_number ASC, created_at ASC",
        )
        .bind(workflow_id)
        .fetch_all(pool)
        .await
    }

    /// Count rows for a workflow.
    pub async fn count_by_workflow(
        pool: &DatabasePool,
        workflow_id: &str,
    ) -> Result<i64, sqlx::Error> {
        let result: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM user_checkpoints WHERE workflow_id = ?")
                .bind(workflow_id)
                .fetch_one(pool)
                .await?;
        Ok(result.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::Database;
    use crate::db::models::WorkflowRow;
    use crate::db::repositories::workflow_repo::WorkflowRepository;

    async fn db_with_workflow() -> Database {
        let db = Database::open_in_memory().await.unwrap();
        let row = WorkflowRow::new(
            "wf-1".to_string(),
            "Demo".to_string(),
            "plan_review".to_string(),
            None,
        );
        WorkflowRepository::create(db.pool(), &row).await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_create_is_idempotent_on_id() {
        let db = db_with_workflow().await;

        for _ in 0..3 {
            CheckpointRepository::create(
                db.pool(),
                "cp-1",
                "wf-1",
                1,
                "plan_ready_for_review",
                "[]",
            )
            .await
            .unwrap();
        }

        assert_eq!(
            CheckpointRepository::count_by_workflow(db.pool(), "wf-1")
                .await
                .unwrap(),
            1
        );
    }

    #[tokio::test]
    async fn test_resolve_updates_terminal_status() {
        let db = db_with_workflow().await;
        CheckpointRepository::create(db.pool(), "cp-1", "wf-1", 1, "plan_ready_for_review", "[]")
            .await
            .unwrap();

        CheckpointRepository::resolve(
            db.pool(),
            "cp-1",
            CheckpointStatus::Edited,
            Some("edited plan"),
            Some("tightened scope"),
        )
        .await
        .unwrap();

        let row = CheckpointRepository::get_by_id(db.pool(), "cp-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, "edited");
        assert_eq!(row.user_edited_content.as_deref(), Some("edited plan"));
        assert_eq!(row.user_notes.as_deref(), Some("tightened scope"));
        assert!(row.resolved_at.is_some());
    }

    #[tokio::test]
    async fn test_list_ordered_by_checkpoint_number() {
        let db = db_with_workflow().await;
        CheckpointRepository::create(db.pool(), "cp-2", "wf-1", 2, "reviews_ready", "[]")
            .await
            .unwrap();
        CheckpointRepository::create(db.pool(), "cp-1", "wf-1", 1, "plan_ready_for_review", "[]")
            .await
            .unwrap();

        let rows = CheckpointRepository::list_by_workflow(db.pool(), "wf-1")
            .await
            .unwrap();
        assert_eq!(rows[0].id, "cp-1");
        assert_eq!(rows[1].id, "cp-2");
    }
}
