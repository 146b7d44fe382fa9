//! Agent execution repository for database operations

use chrono::Utc;

use crate::db::connection::DatabasePool;
use crate::db::models::{AgentExecutionRow, ExecutionStatus};

/// Repository for agent invocation audit rows
pub struct AgentExecutionRepository;

impl AgentExecutionRepository {
    /// Open an execution row in `running` and return its id.
    pub async fn start(
        pool: &DatabasePool,
        workflow_id: &str,
        agent_name: &str,
        agent_type: &str,
        input_content: &str,
    ) -> Result<i64, sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT INTO agent_executions (workflow_id, agent_name, agent_type, input_content, status, started_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(workflow_id)
        .bind(agent_name)
        .bind(agent_type)
        .bind(input_content)
        .bind(ExecutionStatus::Running.as_str())
        .bind(&now)
        .execute(pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    /// Close an execution row. `output` is the agent text on success and the
    /// failure reason otherwise.
    pub async fn finish(
        pool: &DatabasePool,
        id: i64,
        status: ExecutionStatus,
        output: &str,
        execution_time_ms: i64,
    ) -> Result<(), sqlx::Error> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "UPDATE agent_executions
             SET status = ?, output_content = ?, completed_at = ?, execution_time_ms = ?
             WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(output)
        .bind(&now)
        .bind(execution_time_ms)
        .bind(id)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Record the review classification for an execution.
    pub async fn set_approval_status(
        pool: &DatabasePool,
        id: i64,
        approval_status: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE agent_executions SET approval_status = ? WHERE id = ?")
            .bind(approval_status)
            .bind(id)
            .execute(pool)
            .await?;
        Ok(())
    }

    /// List executions for a workflow in invocation order.
    pub async fn list_by_workflow(
        pool: &DatabasePool,
        workflow_id: &str,
    ) -> Result<Vec<AgentExecutionRow>, sqlx::Error> {
        sqlx::query_as::<_, AgentExecutionRow>(
            "SELECT * FROM agent_executions WHERE workflow_id = ? ORDER BY id ASC",
        )
        .bind(workflow_id)
        .fetch_all(pool)
        .await
    }

    /// Count rows still marked `running` for a workflow. Zero when all
    /// invocations have been closed.
    pub async fn count_running(
        pool: &DatabasePool,
        workflow_id: &str,
    ) -> Result<i64, sqlx::Error> {
        let result: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM agent_executions WHERE workflow_id = ? AND status = 'running'",
        )
        .bind(workflow_id)
        .fetch_one(pool)
        .await?;
        Ok(result.0)
    }
}
