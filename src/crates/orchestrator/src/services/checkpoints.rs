//! Checkpoint lifecycle: wire payloads and audit persistence
//!
//! A checkpoint exists in two places: the suspension payload the engine
//! surfaces to callers (the wire shape below), and an audit row in
//! `user_checkpoints`. Row creation is idempotent on the checkpoint id
//! (pollers re-observing the same pending suspension must never duplicate
//! it), and a row-write failure never fails the workflow.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::db::models::CheckpointStatus;
use crate::db::repositories::CheckpointRepository;
use crate::db::Database;
use crate::error::Result;

/// One agent's contribution surfaced at a checkpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentOutput {
    pub agent_name: String,
    pub agent_type: String,
    pub output: String,
    pub timestamp: String,
}

impl AgentOutput {
    pub fn now(
        agent_name: impl Into<String>,
        agent_type: impl Into<String>,
        output: impl Into<String>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            agent_type: agent_type.into(),
            output: output.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Actions offered to the human at a checkpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointActions {
    pub primary: String,
    pub secondary: Vec<String>,
}

impl CheckpointActions {
    pub fn new(primary: impl Into<String>, secondary: &[&str]) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Wire-facing checkpoint payload, also used as the engine interrupt value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointPayload {
    pub checkpoint_id: String,
    pub checkpoint_number: i64,
    pub step_name: String,
    pub workflow_id: String,
    pub iteration: i64,
    pub agent_outputs: Vec<AgentOutput>,
    pub instructions: String,
    pub actions: CheckpointActions,
    pub editable_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

/// Human resolution of a checkpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckpointResolution {
    pub action: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edited_content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_notes: Option<String>,
}

impl CheckpointResolution {
    pub fn action(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            edited_content: None,
            user_notes: None,
        }
    }

    pub fn with_edited_content(mut self, content: impl Into<String>) -> Self {
        self.edited_content = Some(content.into());
        self
    }

    pub fn with_user_notes(mut self, notes: impl Into<String>) -> Self {
        self.user_notes = Some(notes.into());
        self
    }
}

/// Persists checkpoint creation and resolution rows.
#[derive(Clone)]
pub struct CheckpointService {
    db: Database,
}

impl CheckpointService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record a checkpoint the engine just suspended on. Idempotent on the
    /// checkpoint id; persistence failures are logged, never propagated:
    /// the audit row must not take the workflow down with it.
    pub async fn record_created(&self, payload: &CheckpointPayload) {
        let agent_outputs = serde_json::to_string(&payload.agent_outputs)
            .unwrap_or_else(|_| "[]".to_string());
        self.record_row(
            &payload.checkpoint_id,
            &payload.workflow_id,
            payload.checkpoint_number,
            &payload.step_name,
            &agent_outputs,
        )
        .await;
    }

    /// Record a checkpoint row from raw parts (timeout checkpoints carry a
    /// shape of their own). Same idempotence and swallow-on-failure rules.
    pub async fn record_row(
        &self,
        checkpoint_id: &str,
        workflow_id: &str,
        checkpoint_number: i64,
        step_name: &str,
        agent_outputs_json: &str,
    ) {
        if let Err(e) = CheckpointRepository::create(
            self.db.pool(),
            checkpoint_id,
            workflow_id,
            checkpoint_number,
            step_name,
            agent_outputs_json,
        )
        .await
        {
            warn!(
                checkpoint_id = %checkpoint_id,
                error = %e,
                "failed to record checkpoint creation"
            );
        }
    }

    /// Record the human resolution with the fixed action-to-status mapping.
    pub async fn record_resolution(
        &self,
        checkpoint_id: &str,
        resolution: &CheckpointResolution,
    ) -> Result<()> {
        let status = CheckpointStatus::from_action(&resolution.action);
        CheckpointRepository::resolve(
            self.db.pool(),
            checkpoint_id,
            status,
            resolution.edited_content.as_deref(),
            resolution.user_notes.as_deref(),
        )
        .await?;
        Ok(())
    }
}
