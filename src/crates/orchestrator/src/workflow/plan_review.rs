//! The plan-review workflow graph
//!
//! Six nodes: a planner, a parallel reviewer fan-out, and four human
//! checkpoints. Checkpoint nodes follow the engine's two-phase shape: first
//! entry suspends with the wire payload, re-entry consumes the resolution
//! and routes via `next_step`. Agent nodes additionally convert timeouts
//! into timeout checkpoints instead of failing the workflow.
//!
//! Every agent invocation opens an execution row before the subprocess
//! starts and closes it (`completed`/`failed`) when the call returns,
//! whatever happened in between.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use graphflow_checkpoint::StateStore;
use graphflow_core::{
    CompiledGraph, Graph, GraphBuilder, NodeContext, NodeOutput, NodeResult, END,
};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::agents::{AgentConfig, AgentInvoker, AgentRegistry};
use crate::db::models::ExecutionStatus;
use crate::db::repositories::AgentExecutionRepository;
use crate::db::Database;
use crate::error::AgentError;
use crate::services::checkpoints::{
    AgentOutput, CheckpointActions, CheckpointPayload, CheckpointService,
};
use crate::services::review_analyzer;
use crate::workflow::state::{Message, PlanReviewState, ReviewFeedback};
use crate::workflow::templates;

/// Node names
pub const PLANNER: &str = "planner";
pub const PLAN_CHECKPOINT: &str = "plan_checkpoint";
pub const EDIT_REVIEWER_PROMPT: &str = "edit_reviewer_prompt_checkpoint";
pub const REVIEWERS: &str = "reviewers";
pub const REVIEW_CHECKPOINT: &str = "review_checkpoint";
pub const EDIT_PLANNER_PROMPT: &str = "edit_planner_prompt_checkpoint";

/// Extra seconds granted when the user retries a timed-out agent without
/// specifying an extension.
const DEFAULT_TIMEOUT_EXTENSION: u64 = 300;

/// Outcome of one reviewer subtask. Collected as a bag after all siblings
/// settle; a failing reviewer never cancels the others.
enum ReviewOutcome {
    Success {
        slot: usize,
        agent_name: String,
        agent_type: String,
        identifier: String,
        text: String,
        execution_id: i64,
    },
    Timeout {
        agent_name: String,
        agent_type: String,
        prompt: String,
        seconds: u64,
    },
    Error(AgentError),
}

/// Builder for the plan-review graph, holding the collaborators its nodes
/// capture.
pub struct PlanReviewWorkflow {
    registry: Arc<AgentRegistry>,
    invoker: Arc<dyn AgentInvoker>,
    checkpoints: CheckpointService,
    db: Database,
    workspace_path: Option<PathBuf>,
}

impl PlanReviewWorkflow {
    pub fn new(
        registry: Arc<AgentRegistry>,
        invoker: Arc<dyn AgentInvoker>,
        checkpoints: CheckpointService,
        db: Database,
        workspace_path: Option<PathBuf>,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            invoker,
            checkpoints,
            db,
            workspace_path,
        })
    }

    /// Build and validate the graph.
    pub fn build_graph(self: &Arc<Self>) -> graphflow_core::Result<Graph> {
        let planner_wf = Arc::clone(self);
        let plan_cp_wf = Arc::clone(self);
        let edit_reviewer_wf = Arc::clone(self);
        let reviewers_wf = Arc::clone(self);
        let review_cp_wf = Arc::clone(self);
        let edit_planner_wf = Arc::clone(self);

        GraphBuilder::new()
            .with_schema(PlanReviewState::schema())
            .add_node(PLANNER, move |state, ctx| {
                let wf = Arc::clone(&planner_wf);
                async move { wf.planner_node(state, ctx).await }
            })
            .add_node(PLAN_CHECKPOINT, move |state, ctx| {
                let wf = Arc::clone(&plan_cp_wf);
                async move { wf.plan_checkpoint_node(state, ctx).await }
            })
            .add_node(EDIT_REVIEWER_PROMPT, move |state, ctx| {
                let wf = Arc::clone(&edit_reviewer_wf);
                async move { wf.edit_reviewer_prompt_node(state, ctx).await }
            })
            .add_node(REVIEWERS, move |state, ctx| {
                let wf = Arc::clone(&reviewers_wf);
                async move { wf.reviewers_node(state, ctx).await }
            })
            .add_node(REVIEW_CHECKPOINT, move |state, ctx| {
                let wf = Arc::clone(&review_cp_wf);
                async move { wf.review_checkpoint_node(state, ctx).await }
            })
            .add_node(EDIT_PLANNER_PROMPT, move |state, ctx| {
                let wf = Arc::clone(&edit_planner_wf);
                async move { wf.edit_planner_prompt_node(state, ctx).await }
            })
            .add_conditional_edge(
                PLANNER,
                |state: &Value| match next_step(state) {
                    "retry" => "retry".to_string(),
                    "end" => "end".to_string(),
                    _ => "default".to_string(),
                },
                branches(&[
                    ("retry", PLANNER),
                    ("end", END),
                    ("default", PLAN_CHECKPOINT),
                ]),
            )
            .add_conditional_edge(
                PLAN_CHECKPOINT,
                |state: &Value| match next_step(state) {
                    "edit_reviewer_prompt" => "edit_reviewer_prompt".to_string(),
                    "end" => "end".to_string(),
                    _ => "review_agents".to_string(),
                },
                branches(&[
                    ("edit_reviewer_prompt", EDIT_REVIEWER_PROMPT),
                    ("review_agents", REVIEWERS),
                    ("end", END),
                ]),
            )
            .add_conditional_edge(
                EDIT_REVIEWER_PROMPT,
                |state: &Value| {
                    if next_step(state) == "end" {
                        "end".to_string()
                    } else {
                        "reviewers".to_string()
                    }
                },
                branches(&[("reviewers", REVIEWERS), ("end", END)]),
            )
            .add_conditional_edge(
                REVIEWERS,
                |state: &Value| match next_step(state) {
                    "retry" => "retry".to_string(),
                    "end" => "end".to_string(),
                    _ => "default".to_string(),
                },
                branches(&[
                    ("retry", REVIEWERS),
                    ("end", END),
                    ("default", REVIEW_CHECKPOINT),
                ]),
            )
            .add_conditional_edge(
                REVIEW_CHECKPOINT,
                |state: &Value| match next_step(state) {
                    "edit_planner_prompt" => "edit_planner_prompt".to_string(),
                    "end" => "end".to_string(),
                    _ => "planner".to_string(),
                },
                branches(&[
                    ("edit_planner_prompt", EDIT_PLANNER_PROMPT),
                    ("planner", PLANNER),
                    ("end", END),
                ]),
            )
            .add_conditional_edge(
                EDIT_PLANNER_PROMPT,
                |state: &Value| {
                    if next_step(state) == "end" {
                        "end".to_string()
                    } else {
                        "planner".to_string()
                    }
                },
                branches(&[("planner", PLANNER), ("end", END)]),
            )
            .set_entry(PLANNER)
            .build()
    }

    /// Compile against a state store.
    pub fn compile(
        self: &Arc<Self>,
        store: Arc<dyn StateStore>,
    ) -> graphflow_core::Result<CompiledGraph> {
        Ok(CompiledGraph::new(self.build_graph()?, store))
    }

    // --- planner -------------------------------------------------------

    async fn planner_node(&self, state: Value, mut ctx: NodeContext) -> NodeResult {
        let state = PlanReviewState::from_value(&state)?;

        if let Some(resolution) = ctx.take_resume() {
            // Resolving this node's own timeout checkpoint.
            return Ok(match resolution_action(&resolution) {
                "retry_with_extension" => NodeOutput::advance(json!({
                    "retry_agent": true,
                    "timeout_extension": timeout_extension(&resolution),
                    "next_step": "retry",
                })),
                _ => cancelled_update(),
            });
        }

        info!(
            workflow_id = %state.workflow_id,
            iteration = state.iteration_count,
            "running planner"
        );

        let agent = self
            .registry
            .planning_agent(self.workspace_path.as_deref())
            .await;

        let prompt = if let Some(custom) = &state.planner_prompt {
            custom.clone()
        } else if state.iteration_count > 0 {
            templates::planning_with_history(&state.messages, &state.review_feedback)
        } else {
            let requirements = state
                .messages
                .iter()
                .rev()
                .find(|m| m.role == "user")
                .map(|m| m.content.as_str())
                .unwrap_or_default();
            templates::planning_initial(requirements)
        };

        let effective_timeout = agent.timeout_seconds + state.timeout_extension;
        let result = self
            .run_agent(&state.workflow_id, &agent, &prompt, effective_timeout)
            .await?;

        match result {
            Ok(plan) => {
                let message = Message::planner(&agent.name, &plan);
                Ok(NodeOutput::advance(json!({
                    "current_plan": plan,
                    "status": "plan_created",
                    "messages": [message],
                    "checkpoint_number": state.checkpoint_number + 1,
                    "retry_agent": false,
                    "timeout_extension": 0,
                    "planner_prompt": null,
                    "next_step": "",
                })))
            }
            Err(e) if e.is_timeout() => Ok(self
                .timeout_checkpoint(&state, &agent, &prompt, effective_timeout, false)
                .await),
            Err(e) => Err(e.into()),
        }
    }

    // --- reviewers -----------------------------------------------------

    async fn reviewers_node(&self, state: Value, mut ctx: NodeContext) -> NodeResult {
        let state = PlanReviewState::from_value(&state)?;

        if let Some(resolution) = ctx.take_resume() {
            return Ok(self.apply_reviewer_resolution(&state, &resolution));
        }

        let reviewers = self
            .registry
            .review_agents(self.workspace_path.as_deref())
            .await;
        let plan = state.plan_under_review().to_string();

        info!(
            workflow_id = %state.workflow_id,
            reviewers = reviewers.len(),
            "running reviewer fan-out"
        );

        let mut tasks = Vec::new();
        for (idx, agent) in reviewers.iter().enumerate() {
            let slot = idx + 1;
            if state.skip_timed_out_agent.as_deref() == Some(agent.name.as_str()) {
                info!(agent = %agent.name, "skipping previously timed-out reviewer");
                continue;
            }

            let identifier = format!("REVIEW AGENT {slot}");
            let prompt = if let Some(custom) = &state.reviewer_prompt {
                custom.clone()
            } else if state.iteration_count > 0 {
                templates::review_request_with_history(&plan, &identifier, &state.messages)
            } else {
                templates::review_request(&plan, &identifier)
            };

            tasks.push(self.run_reviewer(
                state.workflow_id.clone(),
                Arc::clone(agent),
                slot,
                identifier,
                prompt,
                agent.timeout_seconds + state.timeout_extension,
            ));
        }

        // No barrier-breaking on failure: every sibling settles.
        let outcomes = futures::future::join_all(tasks).await;

        let mut successes: Vec<ReviewOutcome> = Vec::new();
        let mut first_timeout: Option<ReviewOutcome> = None;
        let mut first_error: Option<AgentError> = None;
        for outcome in outcomes {
            match outcome {
                ReviewOutcome::Success { .. } => successes.push(outcome),
                ReviewOutcome::Timeout { .. } => {
                    if first_timeout.is_none() {
                        first_timeout = Some(outcome);
                    }
                }
                ReviewOutcome::Error(e) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(ReviewOutcome::Timeout {
            agent_name,
            agent_type,
            prompt,
            seconds,
        }) = first_timeout
        {
            let partial = self.collect_feedback(&successes).await;
            let number = state.checkpoint_number + 1;
            let checkpoint_id = Uuid::new_v4().to_string();
            let payload = timeout_payload(
                &checkpoint_id,
                &state,
                number,
                &agent_name,
                &agent_type,
                seconds,
                &prompt,
                &["skip", "cancel"],
            );
            self.checkpoints
                .record_row(&checkpoint_id, &state.workflow_id, number, "agent_timeout", "[]")
                .await;

            return Ok(NodeOutput::suspend_with(
                payload,
                json!({
                    "partial_reviews": partial,
                    "checkpoint_number": number,
                    "timed_out_agent": agent_name,
                    "retry_agent": false,
                }),
            ));
        }

        if let Some(error) = first_error {
            return Err(error.into());
        }

        let feedback = self.collect_feedback(&successes).await;
        let mut messages = Vec::with_capacity(successes.len());
        for outcome in &successes {
            if let ReviewOutcome::Success {
                slot,
                agent_name,
                text,
                ..
            } = outcome
            {
                messages.push(Message::reviewer(*slot, agent_name, text));
            }
        }

        Ok(NodeOutput::advance(json!({
            "review_feedback": feedback,
            "status": "reviews_collected",
            "messages": messages,
            "checkpoint_number": state.checkpoint_number + 1,
            "partial_reviews": [],
            "retry_agent": false,
            "timeout_extension": 0,
            "skip_timed_out_agent": null,
            "timed_out_agent": null,
            "reviewer_prompt": null,
            "next_step": "",
        })))
    }

    fn apply_reviewer_resolution(
        &self,
        state: &PlanReviewState,
        resolution: &Value,
    ) -> NodeOutput {
        match resolution_action(resolution) {
            "retry_with_extension" => NodeOutput::advance(json!({
                "retry_agent": true,
                "timeout_extension": timeout_extension(resolution),
                "next_step": "retry",
            })),
            "skip" => {
                // Continue with the reviews that did succeed.
                let messages: Vec<Message> = state
                    .partial_reviews
                    .iter()
                    .enumerate()
                    .map(|(idx, fb)| Message::reviewer(idx + 1, &fb.agent_name, &fb.feedback))
                    .collect();
                info!(
                    workflow_id = %state.workflow_id,
                    skipped = state.timed_out_agent.as_deref().unwrap_or("unknown"),
                    kept = state.partial_reviews.len(),
                    "skipping timed-out reviewer"
                );
                NodeOutput::advance(json!({
                    "review_feedback": &state.partial_reviews,
                    "status": "reviews_collected",
                    "messages": messages,
                    "checkpoint_number": state.checkpoint_number + 1,
                    "skip_timed_out_agent": &state.timed_out_agent,
                    "partial_reviews": [],
                    "retry_agent": false,
                    "timeout_extension": 0,
                    "next_step": "",
                }))
            }
            _ => cancelled_update(),
        }
    }

    /// One reviewer subtask: execution row, invocation, outcome.
    async fn run_reviewer(
        &self,
        workflow_id: String,
        agent: Arc<AgentConfig>,
        slot: usize,
        identifier: String,
        prompt: String,
        timeout_seconds: u64,
    ) -> ReviewOutcome {
        let execution_id = match AgentExecutionRepository::start(
            self.db.pool(),
            &workflow_id,
            &agent.name,
            agent.kind.as_str(),
            &prompt,
        )
        .await
        {
            Ok(id) => id,
            Err(e) => return ReviewOutcome::Error(AgentError::Spawn(std::io::Error::other(e))),
        };

        let started = Instant::now();
        let result = self.invoker.invoke(&agent, &prompt, timeout_seconds).await;
        let elapsed_ms = started.elapsed().as_millis() as i64;

        let (status, output) = match &result {
            Ok(text) => (ExecutionStatus::Completed, text.clone()),
            Err(e) => (ExecutionStatus::Failed, e.to_string()),
        };
        if let Err(e) = AgentExecutionRepository::finish(
            self.db.pool(),
            execution_id,
            status,
            &output,
            elapsed_ms,
        )
        .await
        {
            warn!(execution_id, error = %e, "failed to close execution row");
        }

        match result {
            Ok(text) => ReviewOutcome::Success {
                slot,
                agent_name: agent.name.clone(),
                agent_type: agent.kind.as_str().to_string(),
                identifier,
                text,
                execution_id,
            },
            Err(e) if e.is_timeout() => ReviewOutcome::Timeout {
                agent_name: agent.name.clone(),
                agent_type: agent.kind.as_str().to_string(),
                prompt,
                seconds: timeout_seconds,
            },
            Err(e) => ReviewOutcome::Error(e),
        }
    }

    /// Fold successful outcomes into feedback records, annotating execution
    /// rows with the review classification.
    async fn collect_feedback(&self, successes: &[ReviewOutcome]) -> Vec<ReviewFeedback> {
        let mut feedback = Vec::with_capacity(successes.len());
        for outcome in successes {
            if let ReviewOutcome::Success {
                agent_name,
                agent_type,
                identifier,
                text,
                execution_id,
                ..
            } = outcome
            {
                let verdict = review_analyzer::analyze_review(text);
                if let Err(e) = AgentExecutionRepository::set_approval_status(
                    self.db.pool(),
                    *execution_id,
                    verdict.as_str(),
                )
                .await
                {
                    warn!(execution_id, error = %e, "failed to record approval status");
                }
                feedback.push(ReviewFeedback::new(agent_name, agent_type, identifier, text));
            }
        }
        feedback
    }

    // --- checkpoints ---------------------------------------------------

    async fn plan_checkpoint_node(&self, state: Value, mut ctx: NodeContext) -> NodeResult {
        let state = PlanReviewState::from_value(&state)?;

        if let Some(resolution) = ctx.take_resume() {
            let edited = edited_content(&resolution).unwrap_or(&state.current_plan);
            return Ok(match resolution_action(&resolution) {
                "send_to_reviewers" => NodeOutput::advance(json!({
                    "user_edits": edited,
                    "status": "ready_for_review",
                    "next_step": "review_agents",
                    "messages": [Message::user("[User approved plan for review]")],
                })),
                "edit_and_continue" => NodeOutput::advance(json!({
                    "user_edits": edited,
                    "status": "editing_reviewer_prompt",
                    "next_step": "edit_reviewer_prompt",
                    "messages": [Message::user("[User wants to edit the full reviewer prompt]")],
                })),
                _ => cancelled_update(),
            });
        }

        let payload = CheckpointPayload {
            checkpoint_id: Uuid::new_v4().to_string(),
            checkpoint_number: state.checkpoint_number,
            step_name: "plan_ready_for_review".to_string(),
            workflow_id: state.workflow_id.clone(),
            iteration: state.iteration_count,
            agent_outputs: vec![AgentOutput::now("planner", "planning", &state.current_plan)],
            instructions: "The PLANNING AGENT has created a plan. Review and edit if needed \
                           before sending to REVIEW AGENTS."
                .to_string(),
            actions: CheckpointActions::new(
                "send_to_reviewers",
                &["edit_and_continue", "cancel"],
            ),
            editable_content: state.current_plan.clone(),
            context: None,
        };
        self.checkpoints.record_created(&payload).await;
        Ok(NodeOutput::suspend(serde_json::to_value(payload)?))
    }

    async fn review_checkpoint_node(&self, state: Value, mut ctx: NodeContext) -> NodeResult {
        let state = PlanReviewState::from_value(&state)?;
        let consolidated = templates::consolidate_reviews(&state.review_feedback);

        if let Some(resolution) = ctx.take_resume() {
            let edited = edited_content(&resolution).unwrap_or(&consolidated).to_string();
            return Ok(match resolution_action(&resolution) {
                "request_revision" => {
                    let message = Message::user(format!("[User requested revision]\n{edited}"));
                    NodeOutput::advance(json!({
                        "consolidated_feedback": edited,
                        "status": "revision_needed",
                        "next_step": "planner",
                        "iteration_count": state.iteration_count + 1,
                        "messages": [message],
                    }))
                }
                "edit_prompt_and_revise" => NodeOutput::advance(json!({
                    "consolidated_feedback": edited,
                    "status": "editing_planner_prompt",
                    "next_step": "edit_planner_prompt",
                    "messages": [Message::user(
                        "[User wants to edit the planner prompt before revision]"
                    )],
                })),
                "approve_plan" => NodeOutput::advance(json!({
                    "status": "completed",
                    "next_step": "end",
                    "messages": [Message::user("[User approved final plan]")],
                })),
                _ => cancelled_update(),
            });
        }

        let payload = CheckpointPayload {
            checkpoint_id: Uuid::new_v4().to_string(),
            checkpoint_number: state.checkpoint_number,
            step_name: "reviews_ready_for_consolidation".to_string(),
            workflow_id: state.workflow_id.clone(),
            iteration: state.iteration_count,
            agent_outputs: state
                .review_feedback
                .iter()
                .map(|fb| AgentOutput {
                    agent_name: fb.agent_name.clone(),
                    agent_type: fb.agent_type.clone(),
                    output: fb.feedback.clone(),
                    timestamp: fb.timestamp.clone(),
                })
                .collect(),
            instructions: "Review feedback from all REVIEW AGENTS has been consolidated. \
                           Edit if needed, then choose whether to revise the plan or \
                           complete the workflow."
                .to_string(),
            actions: CheckpointActions::new(
                "request_revision",
                &["edit_prompt_and_revise", "approve_plan", "cancel"],
            ),
            editable_content: consolidated,
            context: Some(json!({"current_plan": state.plan_under_review()})),
        };
        self.checkpoints.record_created(&payload).await;
        Ok(NodeOutput::suspend(serde_json::to_value(payload)?))
    }

    async fn edit_reviewer_prompt_node(&self, state: Value, mut ctx: NodeContext) -> NodeResult {
        let state = PlanReviewState::from_value(&state)?;
        let default_prompt =
            templates::review_request(state.plan_under_review(), "REVIEW AGENT");

        if let Some(resolution) = ctx.take_resume() {
            if resolution_action(&resolution) == "cancel" {
                return Ok(cancelled_update());
            }
            let edited = edited_content(&resolution).unwrap_or(&default_prompt);
            return Ok(NodeOutput::advance(json!({
                "reviewer_prompt": edited,
                "status": "ready_for_review",
                "checkpoint_number": state.checkpoint_number + 1,
                "next_step": "reviewers",
                "messages": [Message::user("[User edited reviewer prompt and approved for review]")],
            })));
        }

        let payload = CheckpointPayload {
            checkpoint_id: Uuid::new_v4().to_string(),
            checkpoint_number: state.checkpoint_number,
            step_name: "edit_reviewer_prompt".to_string(),
            workflow_id: state.workflow_id.clone(),
            iteration: state.iteration_count,
            agent_outputs: Vec::new(),
            instructions: "Edit the full prompt that will be sent to each REVIEW AGENT. \
                           The plan under review is embedded below."
                .to_string(),
            actions: CheckpointActions::new("edit_full_prompt", &["cancel"]),
            editable_content: default_prompt,
            context: None,
        };
        self.checkpoints.record_created(&payload).await;
        Ok(NodeOutput::suspend(serde_json::to_value(payload)?))
    }

    async fn edit_planner_prompt_node(&self, state: Value, mut ctx: NodeContext) -> NodeResult {
        let state = PlanReviewState::from_value(&state)?;
        let default_prompt =
            templates::planning_with_history(&state.messages, &state.review_feedback);

        if let Some(resolution) = ctx.take_resume() {
            if resolution_action(&resolution) == "cancel" {
                return Ok(cancelled_update());
            }
            let edited = edited_content(&resolution).unwrap_or(&default_prompt);
            // This path is the one that counts a revision round.
            return Ok(NodeOutput::advance(json!({
                "planner_prompt": edited,
                "status": "revision_needed",
                "iteration_count": state.iteration_count + 1,
                "checkpoint_number": state.checkpoint_number + 1,
                "next_step": "planner",
                "messages": [Message::user("[User edited planner prompt and requested revision]")],
            })));
        }

        let payload = CheckpointPayload {
            checkpoint_id: Uuid::new_v4().to_string(),
            checkpoint_number: state.checkpoint_number,
            step_name: "edit_planner_prompt".to_string(),
            workflow_id: state.workflow_id.clone(),
            iteration: state.iteration_count,
            agent_outputs: Vec::new(),
            instructions: "Edit the full prompt that will be sent to the PLANNING AGENT \
                           for the revision."
                .to_string(),
            actions: CheckpointActions::new("edit_full_prompt", &["cancel"]),
            editable_content: default_prompt,
            context: None,
        };
        self.checkpoints.record_created(&payload).await;
        Ok(NodeOutput::suspend(serde_json::to_value(payload)?))
    }

    // --- shared helpers ------------------------------------------------

    /// Run one agent with an execution row around it. Returns the invocation
    /// result with the row already closed.
    async fn run_agent(
        &self,
        workflow_id: &str,
        agent: &AgentConfig,
        prompt: &str,
        timeout_seconds: u64,
    ) -> Result<Result<String, AgentError>, Box<dyn std::error::Error + Send + Sync>> {
        let execution_id = AgentExecutionRepository::start(
            self.db.pool(),
            workflow_id,
            &agent.name,
            agent.kind.as_str(),
            prompt,
        )
        .await?;

        let started = Instant::now();
        let result = self.invoker.invoke(agent, prompt, timeout_seconds).await;
        let elapsed_ms = started.elapsed().as_millis() as i64;

        let (status, output) = match &result {
            Ok(text) => (ExecutionStatus::Completed, text.clone()),
            Err(e) => (ExecutionStatus::Failed, e.to_string()),
        };
        AgentExecutionRepository::finish(self.db.pool(), execution_id, status, &output, elapsed_ms)
            .await?;

        Ok(result)
    }

    /// Suspend on an agent timeout, recording the audit row.
    async fn timeout_checkpoint(
        &self,
        state: &PlanReviewState,
        agent: &AgentConfig,
        prompt: &str,
        timeout_seconds: u64,
        offer_skip: bool,
    ) -> NodeOutput {
        let number = state.checkpoint_number + 1;
        let checkpoint_id = Uuid::new_v4().to_string();
        let secondary: &[&str] = if offer_skip {
            &["skip", "cancel"]
        } else {
            &["cancel"]
        };
        let payload = timeout_payload(
            &checkpoint_id,
            state,
            number,
            &agent.name,
            agent.kind.as_str(),
            timeout_seconds,
            prompt,
            secondary,
        );
        self.checkpoints
            .record_row(&checkpoint_id, &state.workflow_id, number, "agent_timeout", "[]")
            .await;

        NodeOutput::suspend_with(
            payload,
            json!({
                "checkpoint_number": number,
                "timed_out_agent": &agent.name,
                "retry_agent": false,
            }),
        )
    }
}

/// Branch map helper.
fn branches(pairs: &[(&str, &str)]) -> std::collections::HashMap<String, String> {
    pairs
        .iter()
        .map(|(label, node)| (label.to_string(), node.to_string()))
        .collect()
}

fn next_step(state: &Value) -> &str {
    state.get("next_step").and_then(Value::as_str).unwrap_or("")
}

fn resolution_action(resolution: &Value) -> &str {
    resolution
        .get("action")
        .and_then(Value::as_str)
        .unwrap_or("cancel")
}

fn edited_content(resolution: &Value) -> Option<&str> {
    resolution
        .get("edited_content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn timeout_extension(resolution: &Value) -> u64 {
    resolution
        .get("timeout_extension")
        .and_then(Value::as_u64)
        .unwrap_or(DEFAULT_TIMEOUT_EXTENSION)
}

fn cancelled_update() -> NodeOutput {
    NodeOutput::advance(json!({
        "status": "cancelled",
        "next_step": "end",
        "messages": [Message::user("[User cancelled workflow]")],
    }))
}

/// Wire payload for a timeout checkpoint: retry with an extension, skip
/// when partial results exist, or cancel.
#[allow(clippy::too_many_arguments)]
fn timeout_payload(
    checkpoint_id: &str,
    state: &PlanReviewState,
    checkpoint_number: i64,
    agent_name: &str,
    agent_type: &str,
    timeout_seconds: u64,
    prompt: &str,
    secondary: &[&str],
) -> Value {
    json!({
        "kind": "timeout",
        "checkpoint_id": checkpoint_id,
        "checkpoint_number": checkpoint_number,
        "step_name": "agent_timeout",
        "workflow_id": state.workflow_id,
        "iteration": state.iteration_count,
        "agent_name": agent_name,
        "agent_type": agent_type,
        "timeout_seconds": timeout_seconds,
        "error": format!("agent {agent_name} timed out after {timeout_seconds} seconds"),
        "prompt": prompt,
        "actions": {
            "primary": "retry_with_extension",
            "secondary": secondary,
        },
    })
}
