//! Checkpointed multi-agent plan-review orchestration
//!
//! This crate coordinates code-planning workflows in which a planner agent
//! drafts a design document, reviewer agents critique it in parallel, and a
//! human approves, edits, or redirects the flow at persisted checkpoints.
//! Agents are external CLI tools run as subprocesses; workflows are durable
//! state machines that survive process restarts while paused.
//!
//! # Layout
//!
//! - [`agents`] - output parsing, the subprocess runner, tool adapters, and
//!   the agent registry
//! - [`workflow`] - the plan-review graph and its state
//! - [`services`] - workflow lifecycle: status transitions, checkpoints,
//!   notifications, review classification, and the [`WorkflowService`]
//!   consumed by the external API layer
//! - [`db`] - SQLite persistence (workflows, executions, checkpoints, state
//!   snapshots)
//! - [`config`] - runtime settings
//!
//! The graph engine itself lives in the `graphflow-core` crate; this crate
//! supplies the concrete nodes and the durable state store.

pub mod agents;
pub mod config;
pub mod db;
pub mod error;
pub mod services;
pub mod workflow;

pub use agents::{AgentConfig, AgentInvoker, AgentKind, AgentRegistry, AgentRole, CliRunner};
pub use config::Settings;
pub use db::Database;
pub use error::{AgentError, OrchestratorError, Result};
pub use services::{
    CheckpointResolution, CheckpointService, Notifier, WorkflowEvent, WorkflowService,
};
pub use workflow::{PlanReviewState, PlanReviewWorkflow};
