//! Workflow repository for database operations

use chrono::Utc;

use crate::db::connection::DatabasePool;
use crate::db::models::{WorkflowRow, WorkflowStatus};

/// Workflow repository for managing workflow rows
pub struct WorkflowRepository;

impl WorkflowRepository {
    /// Insert a new workflow row.
    pub async fn create(pool: &DatabasePool, row: &WorkflowRow) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO workflows (id, name, workflow_type, status, workspace_path, created_at, updated_at, completed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&row.id)
        .bind(&row.name)
        .bind(&row.workflow_type)
        .bind(&row.status)
        .bind(&row.workspace_path)
        .bind(&row.created_at)
        .bind(&row.updated_at)
        .bind(&row.completed_at)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Get a workflow by id.
    pub async fn get_by_id(
        pool: &DatabasePool,
        id: &str,
    ) -> Result<Option<WorkflowRow>, sqlx::Error> {
        sqlx::query_as::<_, WorkflowRow>("SELECT * FROM workflows WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all workflows, newest first.
    pub async fn list(pool: &DatabasePool) -> Result<Vec<WorkflowRow>, sqlx::Error> {
        sqlx::query_as::<_, WorkflowRow>("SELECT * FROM workflows ORDER BY created_at DESC")
            .fetch_all(pool)
            .await
    }

    /// Update a workflow's status; terminal statuses also stamp
    /// `completed_at`.
    pub async fn update_status(
        pool: &DatabasePool,
        id: &str,
        status: WorkflowStatus,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        if status.is_terminal() {
            sqlx::query(
                "UPDATE workflows SET status = ?, updated_at = ?, completed_at = ? WHERE id = ?",
            )
            .bind(status.as_str())
            .bind(&now)
            .bind(&now)
            .bind(id)
            .execute(pool)
            .await?;
        } else {
            sqlx::query("UPDATE workflows SET status = ?, updated_at = ? WHERE id = ?")
                .bind(status.as_str())
                .bind(&now)
                .bind(id)
                .execute(pool)
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connection::Database;

    #[tokio::test]
    async fn test_create_and_get() {
        let db = Database::open_in_memory().await.unwrap();
        let row = WorkflowRow::new(
            "wf-1".to_string(),
            "Demo".to_string(),
            "plan_review".to_string(),
            Some("/tmp/ws".to_string()),
        );

        WorkflowRepository::create(db.pool(), &row).await.unwrap();
        let loaded = WorkflowRepository::get_by_id(db.pool(), "wf-1")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(loaded.name, "Demo");
        assert_eq!(loaded.status(), Some(WorkflowStatus::Pending));
        assert_eq!(loaded.workspace_path.as_deref(), Some("/tmp/ws"));
    }

    #[tokio::test]
    async fn test_update_status_terminal_sets_completed_at() {
        let db = Database::open_in_memory().await.unwrap();
        let row = WorkflowRow::new(
            "wf-1".to_string(),
            "Demo".to_string(),
            "plan_review".to_string(),
            None,
        );
        WorkflowRepository::create(db.pool(), &row).await.unwrap();

        WorkflowRepository::update_status(db.pool(), "wf-1", WorkflowStatus::Running)
            .await
            .unwrap();
        let running = WorkflowRepository::get_by_id(db.pool(), "wf-1")
            .await
            .unwrap()
            .unwrap();
        assert!(running.completed_at.is_none());

        WorkflowRepository::update_status(db.pool(), "wf-1", WorkflowStatus::Completed)
            .await
            .unwrap();
        let done = WorkflowRepository::get_by_id(db.pool(), "wf-1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.status(), Some(WorkflowStatus::Completed));
        assert!(done.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let db = Database::open_in_memory().await.unwrap();
        assert!(WorkflowRepository::get_by_id(db.pool(), "missing")
            .await
            .unwrap()
            .is_none());
    }
}
