//! Workflow status management
//!
//! Centralizes status transitions: each `mark_*` validates against the
//! transition table, writes the in-memory active entry and the database as a
//! pair, then notifies. Readers may observe the memory write before the
//! database write lands, but never an illegal transition: the guard runs
//! against the current in-memory status before anything is touched.
//!
//! The one deliberate exception: a transition *to* `failed` is always
//! recorded, valid or not, so failures can never be lost to a state-machine
//! technicality.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::db::models::WorkflowStatus;
use crate::db::repositories::WorkflowRepository;
use crate::db::Database;
use crate::error::{OrchestratorError, Result};
use crate::services::notifier::{Notifier, WorkflowEvent};

/// In-memory entry for a non-terminal workflow.
#[derive(Debug, Clone)]
pub struct ActiveWorkflow {
    pub status: WorkflowStatus,

    /// Suspension payload captured when entering `awaiting_checkpoint`
    pub last_result: Option<Value>,

    /// Error string captured when entering `failed`
    pub error: Option<String>,
}

/// Validated, atomic status transitions with notification fan-out.
pub struct StatusManager {
    db: Database,
    notifier: Notifier,
    active: RwLock<HashMap<String, ActiveWorkflow>>,
}

impl StatusManager {
    pub fn new(db: Database, notifier: Notifier) -> Arc<Self> {
        Arc::new(Self {
            db,
            notifier,
            active: RwLock::new(HashMap::new()),
        })
    }

    /// Whether `from -> to` is on the allowed transition graph.
    fn transition_allowed(from: WorkflowStatus, to: WorkflowStatus) -> bool {
        use WorkflowStatus::*;
        matches!(
            (from, to),
            (Pending, Running)
                | (Running, AwaitingCheckpoint)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (AwaitingCheckpoint, Running)
                | (AwaitingCheckpoint, Completed)
                | (AwaitingCheckpoint, Failed)
                | (AwaitingCheckpoint, Cancelled)
        )
    }

    /// Register a freshly created workflow in `pending`.
    pub async fn register(&self, workflow_id: &str) {
        self.active.write().await.insert(
            workflow_id.to_string(),
            ActiveWorkflow {
                status: WorkflowStatus::Pending,
                last_result: None,
                error: None,
            },
        );
        debug!(workflow_id = %workflow_id, "workflow registered as pending");
    }

    /// Re-register a workflow loaded from the database after a restart,
    /// keeping its persisted status. No-op if already active.
    pub async fn register_existing(&self, workflow_id: &str, status: WorkflowStatus) {
        let mut active = self.active.write().await;
        active
            .entry(workflow_id.to_string())
            .or_insert(ActiveWorkflow {
                status,
                last_result: None,
                error: None,
            });
    }

    /// Current in-memory status, if the workflow is active.
    pub async fn status(&self, workflow_id: &str) -> Option<WorkflowStatus> {
        self.active
            .read()
            .await
            .get(workflow_id)
            .map(|entry| entry.status)
    }

    /// The pending suspension payload, if the workflow is awaiting one.
    pub async fn last_result(&self, workflow_id: &str) -> Option<Value> {
        self.active
            .read()
            .await
            .get(workflow_id)
            .and_then(|entry| entry.last_result.clone())
    }

    pub async fn mark_running(&self, workflow_id: &str) -> Result<()> {
        self.transition(workflow_id, WorkflowStatus::Running, None, None)
            .await?;
        self.notifier
            .publish(WorkflowEvent::status_update(workflow_id, "running"))
            .await;
        info!(workflow_id = %workflow_id, "workflow running");
        Ok(())
    }

    /// Enter `awaiting_checkpoint`, retaining the suspension payload for
    /// status queries.
    pub async fn mark_awaiting_checkpoint(
        &self,
        workflow_id: &str,
        checkpoint_payload: Value,
    ) -> Result<()> {
        self.transition(
            workflow_id,
            WorkflowStatus::AwaitingCheckpoint,
            Some(checkpoint_payload),
            None,
        )
        .await?;
        self.notifier
            .publish(WorkflowEvent::checkpoint_ready(workflow_id))
            .await;
        info!(workflow_id = %workflow_id, "workflow awaiting checkpoint");
        Ok(())
    }

    pub async fn mark_completed(&self, workflow_id: &str) -> Result<()> {
        self.transition(workflow_id, WorkflowStatus::Completed, None, None)
            .await?;
        self.notifier
            .publish(WorkflowEvent::completed(workflow_id))
            .await;
        self.remove_active(workflow_id).await;
        info!(workflow_id = %workflow_id, "workflow completed");
        Ok(())
    }

    pub async fn mark_cancelled(&self, workflow_id: &str) -> Result<()> {
        self.transition(workflow_id, WorkflowStatus::Cancelled, None, None)
            .await?;
        self.notifier
            .publish(WorkflowEvent::status_update(workflow_id, "cancelled"))
            .await;
        self.remove_active(workflow_id).await;
        info!(workflow_id = %workflow_id, "workflow cancelled");
        Ok(())
    }

    /// Record a failure. Invalid transitions are warned about and recorded
    /// anyway; a failure must never be dropped.
    pub async fn mark_failed(&self, workflow_id: &str, error_message: &str) -> Result<()> {
        let current = self.status(workflow_id).await;
        if let Some(from) = current {
            if !Self::transition_allowed(from, WorkflowStatus::Failed) {
                warn!(
                    workflow_id = %workflow_id,
                    from = %from,
                    "invalid transition to failed, recording anyway"
                );
            }
        }
        error!(workflow_id = %workflow_id, error = %error_message, "workflow failed");

        {
            let mut active = self.active.write().await;
            if let Some(entry) = active.get_mut(workflow_id) {
                entry.status = WorkflowStatus::Failed;
                entry.error = Some(error_message.to_string());
            }
        }
        WorkflowRepository::update_status(self.db.pool(), workflow_id, WorkflowStatus::Failed)
            .await?;

        self.notifier
            .publish(WorkflowEvent::failed(workflow_id, error_message))
            .await;
        self.remove_active(workflow_id).await;
        Ok(())
    }

    async fn transition(
        &self,
        workflow_id: &str,
        to: WorkflowStatus,
        last_result: Option<Value>,
        error_message: Option<String>,
    ) -> Result<()> {
        {
            let mut active = self.active.write().await;
            let entry = active.get_mut(workflow_id).ok_or_else(|| {
                OrchestratorError::WorkflowNotFound(workflow_id.to_string())
            })?;

            if !Self::transition_allowed(entry.status, to) {
                let err = OrchestratorError::InvalidTransition {
                    workflow_id: workflow_id.to_string(),
                    from: entry.status.as_str().to_string(),
                    to: to.as_str().to_string(),
                };
                error!(workflow_id = %workflow_id, %err, "rejected status transition");
                return Err(err);
            }

            entry.status = to;
            if last_result.is_some() {
                entry.last_result = last_result;
            }
            if error_message.is_some() {
                entry.error = error_message;
            }
        }

        WorkflowRepository::update_status(self.db.pool(), workflow_id, to).await?;
        Ok(())
    }

    async fn remove_active(&self, workflow_id: &str) {
        if self.active.write().await.remove(workflow_id).is_some() {
            debug!(workflow_id = %workflow_id, "removed from active workflows");
        }
    }
}
