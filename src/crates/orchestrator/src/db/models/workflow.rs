//! Workflow model for database persistence

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Workflow lifecycle status.
///
/// Transitions are enforced by the status manager: `pending → running`,
/// `running ⇄ awaiting_checkpoint`, and from either of those into one of the
/// terminal states `completed`, `failed`, `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Running,
    AwaitingCheckpoint,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowStatus::Pending => "pending",
            WorkflowStatus::Running => "running",
            WorkflowStatus::AwaitingCheckpoint => "awaiting_checkpoint",
            WorkflowStatus::Completed => "completed",
            WorkflowStatus::Failed => "failed",
            WorkflowStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(WorkflowStatus::Pending),
            "running" => Some(WorkflowStatus::Running),
            "awaiting_checkpoint" => Some(WorkflowStatus::AwaitingCheckpoint),
            "completed" => Some(WorkflowStatus::Completed),
            "failed" => Some(WorkflowStatus::Failed),
            "cancelled" => Some(WorkflowStatus::Cancelled),
            _ => None,
        }
    }

    /// Terminal states never transition again (except the always-recorded
    /// walk to `failed`).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        )
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents a workflow row in the orchestrator database.
///
/// # Timestamps
/// All timestamp fields are RFC3339 strings due to SQLite type limitations.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowRow {
    /// Unique workflow identifier (UUID string)
    pub id: String,

    /// Workflow name
    pub name: String,

    /// Workflow type (e.g. "plan_review")
    pub workflow_type: String,

    /// Current status string
    pub status: String,

    /// Workspace path handed to agent subprocesses
    pub workspace_path: Option<String>,

    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl WorkflowRow {
    /// Create a new workflow row in `pending`.
    pub fn new(
        id: String,
        name: String,
        workflow_type: String,
        workspace_path: Option<String>,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id,
            name,
            workflow_type,
            status: WorkflowStatus::Pending.as_str().to_string(),
            workspace_path,
            created_at: now.clone(),
            updated_at: now,
            completed_at: None,
        }
    }

    /// Parsed status; rows written by this crate always parse.
    pub fn status(&self) -> Option<WorkflowStatus> {
        WorkflowStatus::parse(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            WorkflowStatus::Pending,
            WorkflowStatus::Running,
            WorkflowStatus::AwaitingCheckpoint,
            WorkflowStatus::Completed,
            WorkflowStatus::Failed,
            WorkflowStatus::Cancelled,
        ] {
            assert_eq!(WorkflowStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(WorkflowStatus::parse("bogus"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(WorkflowStatus::Completed.is_terminal());
        assert!(WorkflowStatus::Failed.is_terminal());
        assert!(WorkflowStatus::Cancelled.is_terminal());
        assert!(!WorkflowStatus::Running.is_terminal());
        assert!(!WorkflowStatus::AwaitingCheckpoint.is_terminal());
    }

    #[test]
    fn test_new_row_starts_pending() {
        let row = WorkflowRow::new(
            "wf-1".to_string(),
            "Demo".to_string(),
            "plan_review".to_string(),
            None,
        );
        assert_eq!(row.status(), Some(WorkflowStatus::Pending));
        assert!(row.completed_at.is_none());
    }
}
