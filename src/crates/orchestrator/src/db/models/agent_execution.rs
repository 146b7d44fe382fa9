//! Agent execution model for database persistence

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One agent invocation, opened when the subprocess starts and closed with
/// `completed` or `failed` when the call returns. Failure reasons land in
/// `output_content`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AgentExecutionRow {
    /// Monotonic execution id (AUTOINCREMENT)
    pub id: i64,

    pub workflow_id: String,
    pub agent_name: String,
    pub agent_type: String,

    /// Full prompt sent to the agent
    pub input_content: String,

    /// Agent output on success, failure reason otherwise
    pub output_content: Option<String>,

    /// running | completed | failed
    pub status: String,

    pub started_at: String,
    pub completed_at: Option<String>,

    /// Wall-clock duration of the invocation
    pub execution_time_ms: Option<i64>,

    /// Review classification (approved | has_feedback | unclear), when known
    pub approval_status: Option<String>,
}

/// Terminal status of one execution row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }
}
