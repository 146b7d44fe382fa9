//! Workflow service: the interface the external API layer consumes
//!
//! Creates workflows, drives them in background tasks until they suspend or
//! finish, surfaces pending checkpoints, and resumes suspended workflows
//! with human resolutions. Everything it serves is reconstructible from the
//! database and the state store, so a restarted process picks up paused
//! workflows exactly where they stopped.

use std::sync::Arc;

use graphflow_checkpoint::{StateSnapshot, StateStore};
use graphflow_core::{Command, Invocation, RunOutcome};
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::agents::{AgentInvoker, AgentRegistry, CliRunner};
use crate::config::Settings;
use crate::db::models::{AgentExecutionRow, WorkflowRow, WorkflowStatus};
use crate::db::repositories::{AgentExecutionRepository, SqliteStateStore, WorkflowRepository};
use crate::db::Database;
use crate::error::{OrchestratorError, Result};
use crate::services::checkpoints::{CheckpointResolution, CheckpointService};
use crate::services::notifier::Notifier;
use crate::services::status::StatusManager;
use crate::workflow::{step_kind, PlanReviewState, PlanReviewWorkflow};

/// Identity returned from `create`.
#[derive(Debug, Clone)]
pub struct WorkflowHandle {
    pub id: String,
    pub status: WorkflowStatus,
}

/// Full view of one workflow for status surfaces.
#[derive(Debug, Clone)]
pub struct WorkflowView {
    pub workflow: WorkflowRow,
    pub pending_checkpoint: Option<Value>,
    pub current_iteration: i64,
    pub agent_executions: Vec<AgentExecutionRow>,
}

/// One history entry, annotated with the coarse step type derived from the
/// state shape.
#[derive(Debug, Clone)]
pub struct AnnotatedSnapshot {
    pub snapshot: StateSnapshot,
    pub step_type: String,
}

/// The orchestrator's workflow API.
pub struct WorkflowService {
    settings: Arc<Settings>,
    db: Database,
    registry: Arc<AgentRegistry>,
    invoker: Arc<dyn AgentInvoker>,
    store: Arc<SqliteStateStore>,
    checkpoints: CheckpointService,
    status: Arc<StatusManager>,
    notifier: Notifier,
}

impl WorkflowService {
    /// Production constructor: opens the configured database and uses the
    /// real subprocess runner.
    pub async fn new(settings: Arc<Settings>) -> Result<Arc<Self>> {
        let db = Database::open(&settings.database_path).await?;
        Ok(Self::with_parts(settings, db, Arc::new(CliRunner::new())))
    }

    /// Assemble from explicit parts. Tests inject an in-memory database and
    /// a scripted invoker here.
    pub fn with_parts(
        settings: Arc<Settings>,
        db: Database,
        invoker: Arc<dyn AgentInvoker>,
    ) -> Arc<Self> {
        let notifier = Notifier::new();
        Arc::new(Self {
            registry: Arc::new(AgentRegistry::new(Arc::clone(&settings))),
            invoker,
            store: Arc::new(SqliteStateStore::new(db.clone())),
            checkpoints: CheckpointService::new(db.clone()),
            status: StatusManager::new(db.clone(), notifier.clone()),
            notifier,
            settings,
            db,
        })
    }

    /// Event fan-out for the realtime surface.
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Create a workflow and start driving it in the background. Returns as
    /// soon as the row exists; the run continues until its first suspension
    /// or terminal state.
    pub async fn create(
        self: &Arc<Self>,
        name: &str,
        workflow_type: &str,
        initial_prompt: &str,
        workspace_path: Option<String>,
    ) -> Result<WorkflowHandle> {
        if workflow_type != "plan_review" {
            return Err(OrchestratorError::Config(format!(
                "unsupported workflow type: {workflow_type}"
            )));
        }

        let id = Uuid::new_v4().to_string();
        let row = WorkflowRow::new(
            id.clone(),
            name.to_string(),
            workflow_type.to_string(),
            workspace_path.clone(),
        );
        WorkflowRepository::create(self.db.pool(), &row).await?;
        self.status.register(&id).await;

        info!(workflow_id = %id, name = %name, "workflow created");

        let service = Arc::clone(self);
        let initial_prompt = initial_prompt.to_string();
        tokio::spawn(async move {
            service.drive_new(&id, &initial_prompt, workspace_path).await;
        });

        Ok(WorkflowHandle {
            id: row.id,
            status: WorkflowStatus::Pending,
        })
    }

    /// Current state of a workflow, including the pending checkpoint payload
    /// when one is awaiting resolution. Works from persisted state alone, so
    /// it also serves workflows paused before a restart.
    pub async fn get(&self, workflow_id: &str) -> Result<WorkflowView> {
        let workflow = WorkflowRepository::get_by_id(self.db.pool(), workflow_id)
            .await?
            .ok_or_else(|| OrchestratorError::WorkflowNotFound(workflow_id.to_string()))?;

        let latest = self.store.latest(workflow_id).await?;
        let pending_checkpoint = latest
            .as_ref()
            .and_then(|s| s.pending_interrupt().cloned());
        let current_iteration = latest
            .as_ref()
            .and_then(|s| s.values.get("iteration_count"))
            .and_then(Value::as_i64)
            .unwrap_or(0);

        let agent_executions =
            AgentExecutionRepository::list_by_workflow(self.db.pool(), workflow_id).await?;

        Ok(WorkflowView {
            workflow,
            pending_checkpoint,
            current_iteration,
            agent_executions,
        })
    }

    /// Resume a suspended workflow with a human resolution. Returns once the
    /// resolution is recorded; execution continues in the background.
    pub async fn resume(
        self: &Arc<Self>,
        workflow_id: &str,
        resolution: CheckpointResolution,
    ) -> Result<()> {
        let workflow = WorkflowRepository::get_by_id(self.db.pool(), workflow_id)
            .await?
            .ok_or_else(|| OrchestratorError::WorkflowNotFound(workflow_id.to_string()))?;

        let current_status = workflow.status().unwrap_or(WorkflowStatus::Pending);
        if current_status.is_terminal() {
            return Err(OrchestratorError::InvalidTransition {
                workflow_id: workflow_id.to_string(),
                from: current_status.as_str().to_string(),
                to: WorkflowStatus::Running.as_str().to_string(),
            });
        }

        let latest = self
            .store
            .latest(workflow_id)
            .await?
            .filter(StateSnapshot::is_interrupted)
            .ok_or_else(|| OrchestratorError::CheckpointConflict(workflow_id.to_string()))?;

        if let Some(checkpoint_id) = latest
            .pending_interrupt()
            .and_then(|p| p.get("checkpoint_id"))
            .and_then(Value::as_str)
        {
            self.checkpoints
                .record_resolution(checkpoint_id, &resolution)
                .await?;
        }

        // After a restart the workflow is absent from the active table;
        // re-register it with its persisted status before transitioning.
        self.status
            .register_existing(workflow_id, current_status)
            .await;
        self.status.mark_running(workflow_id).await?;

        info!(workflow_id = %workflow_id, action = %resolution.action, "resuming workflow");

        let service = Arc::clone(self);
        let workflow_id = workflow_id.to_string();
        let workspace_path = workflow.workspace_path.clone();
        tokio::spawn(async move {
            service
                .drive_resume(&workflow_id, resolution, workspace_path)
                .await;
        });

        Ok(())
    }

    /// Chronological state history annotated with step types.
    pub async fn history(&self, workflow_id: &str) -> Result<Vec<AnnotatedSnapshot>> {
        WorkflowRepository::get_by_id(self.db.pool(), workflow_id)
            .await?
            .ok_or_else(|| OrchestratorError::WorkflowNotFound(workflow_id.to_string()))?;

        let mut snapshots = self.store.history(workflow_id).await?;
        snapshots.reverse();

        Ok(snapshots
            .into_iter()
            .map(|snapshot| AnnotatedSnapshot {
                step_type: step_kind(&snapshot.values).to_string(),
                snapshot,
            })
            .collect())
    }

    // --- background driving --------------------------------------------

    fn build_workflow(&self, workspace_path: Option<String>) -> Arc<PlanReviewWorkflow> {
        PlanReviewWorkflow::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.invoker),
            self.checkpoints.clone(),
            self.db.clone(),
            workspace_path.map(Into::into),
        )
    }

    async fn drive_new(
        &self,
        workflow_id: &str,
        initial_prompt: &str,
        workspace_path: Option<String>,
    ) {
        if let Err(e) = self.status.mark_running(workflow_id).await {
            error!(workflow_id = %workflow_id, error = %e, "failed to mark workflow running");
            return;
        }

        let workflow = self.build_workflow(workspace_path);
        let store: Arc<dyn StateStore> = self.store.clone();
        let outcome = match workflow.compile(store) {
            Ok(compiled) => {
                compiled
                    .invoke(
                        PlanReviewState::initial(workflow_id, initial_prompt),
                        &Invocation::new(workflow_id),
                    )
                    .await
            }
            Err(e) => Err(e),
        };
        self.handle_outcome(workflow_id, outcome).await;
    }

    async fn drive_resume(
        &self,
        workflow_id: &str,
        resolution: CheckpointResolution,
        workspace_path: Option<String>,
    ) {
        let command = match serde_json::to_value(&resolution) {
            Ok(value) => Command::resume(value),
            Err(e) => {
                self.fail(workflow_id, &format!("invalid resolution: {e}")).await;
                return;
            }
        };

        let workflow = self.build_workflow(workspace_path);
        let store: Arc<dyn StateStore> = self.store.clone();
        let outcome = match workflow.compile(store) {
            Ok(compiled) => compiled.resume(command, &Invocation::new(workflow_id)).await,
            Err(e) => Err(e),
        };
        self.handle_outcome(workflow_id, outcome).await;
    }

    async fn handle_outcome(
        &self,
        workflow_id: &str,
        outcome: graphflow_core::Result<RunOutcome>,
    ) {
        match outcome {
            Ok(RunOutcome::Interrupted(payload)) => {
                if let Err(e) = self
                    .status
                    .mark_awaiting_checkpoint(workflow_id, payload)
                    .await
                {
                    error!(workflow_id = %workflow_id, error = %e, "failed to mark awaiting checkpoint");
                }
            }
            Ok(RunOutcome::Complete(state)) => {
                let final_status = state
                    .get("status")
                    .and_then(Value::as_str)
                    .unwrap_or("completed");
                let result = if final_status == "cancelled" {
                    self.status.mark_cancelled(workflow_id).await
                } else {
                    self.status.mark_completed(workflow_id).await
                };
                if let Err(e) = result {
                    error!(workflow_id = %workflow_id, error = %e, "failed to mark workflow terminal");
                }
            }
            Err(e) => {
                self.fail(workflow_id, &e.to_string()).await;
            }
        }
    }

    async fn fail(&self, workflow_id: &str, message: &str) {
        if let Err(e) = self.status.mark_failed(workflow_id, message).await {
            warn!(workflow_id = %workflow_id, error = %e, "failed to record workflow failure");
        }
    }

    /// Settings this service was built with.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }
}
