//! User checkpoint model for database persistence

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Audit row for a human checkpoint.
///
/// Inserted (idempotently, keyed by `id`) when the engine suspends; updated
/// to a terminal status when the human resolves it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserCheckpointRow {
    /// Checkpoint uuid (also the idempotency key)
    pub id: String,

    pub workflow_id: String,

    /// Sequential number within the workflow; strictly increasing
    pub checkpoint_number: i64,

    /// Step that suspended (e.g. "plan_ready_for_review")
    pub step_name: String,

    /// JSON array of `{agent_name, agent_type, output, timestamp}`
    pub agent_outputs: String,

    /// Content as edited by the user at resolution, if any
    pub user_edited_content: Option<String>,

    pub user_notes: Option<String>,

    /// pending | approved | edited | rejected
    pub status: String,

    pub created_at: String,
    pub resolved_at: Option<String>,
}

/// Resolution status of a checkpoint row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    Pending,
    Approved,
    Edited,
    Rejected,
}

impl CheckpointStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointStatus::Pending => "pending",
            CheckpointStatus::Approved => "approved",
            CheckpointStatus::Edited => "edited",
            CheckpointStatus::Rejected => "rejected",
        }
    }

    /// Fixed action-to-status mapping. Unknown actions count as approvals.
    pub fn from_action(action: &str) -> Self {
        match action {
            "send_to_reviewers"
            | "send_to_planner_for_revision"
            | "request_revision"
            | "approve_plan"
            | "approve" => CheckpointStatus::Approved,
            "edit_and_continue" | "edit_prompt_and_revise" | "edit_full_prompt" => {
                CheckpointStatus::Edited
            }
            "cancel" => CheckpointStatus::Rejected,
            _ => CheckpointStatus::Approved,
        }
    }
}
