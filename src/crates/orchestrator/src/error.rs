//! Error taxonomy for the orchestrator
//!
//! Two layers: [`AgentError`] for a single subprocess invocation, and
//! [`OrchestratorError`] for workflow-level operations. The split matters
//! because agent timeouts are not workflow failures (they become timeout
//! checkpoints) while every other agent error is fatal to the run.

use thiserror::Error;

use crate::agents::parser::ParseError;

/// Errors from a single CLI agent invocation
#[derive(Debug, Error)]
pub enum AgentError {
    /// Subprocess exceeded its deadline; kills the process group
    #[error("agent timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Subprocess exited non-zero; stderr excerpt is bounded
    #[error("agent exited with code {code}: {stderr}")]
    NonzeroExit { code: i32, stderr: String },

    /// Subprocess produced no stdout at all
    #[error("agent returned empty output")]
    EmptyOutput,

    /// Output could not be parsed, even after truncation salvage
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Subprocess could not be spawned or its I/O failed
    #[error("failed to run agent process: {0}")]
    Spawn(#[from] std::io::Error),

    /// Caller cancelled the invocation; same cleanup as a timeout
    #[error("agent invocation cancelled")]
    Cancelled,
}

impl AgentError {
    /// Timeouts are recoverable through a timeout checkpoint; everything
    /// else fails the workflow.
    pub fn is_timeout(&self) -> bool {
        matches!(self, AgentError::Timeout { .. })
    }
}

/// Errors from workflow-level operations
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// No workflow row for the given id
    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),

    /// Status transition rejected by the state machine
    #[error("invalid status transition for workflow {workflow_id}: {from} -> {to}")]
    InvalidTransition {
        workflow_id: String,
        from: String,
        to: String,
    },

    /// Resume targeted a checkpoint that is not the pending one
    #[error("checkpoint conflict for workflow {0}: no matching pending checkpoint")]
    CheckpointConflict(String),

    /// Graph engine failure
    #[error(transparent)]
    Graph(#[from] graphflow_core::GraphError),

    /// State store failure
    #[error(transparent)]
    Store(#[from] graphflow_checkpoint::StoreError),

    /// Database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration failure
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for orchestrator operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_recoverable() {
        assert!(AgentError::Timeout { seconds: 300 }.is_timeout());
        assert!(!AgentError::EmptyOutput.is_timeout());
        assert!(!AgentError::Cancelled.is_timeout());
    }

    #[test]
    fn test_error_display() {
        let err = AgentError::NonzeroExit {
            code: 2,
            stderr: "command not found".to_string(),
        };
        assert!(err.to_string().contains("code 2"));

        let err = OrchestratorError::InvalidTransition {
            workflow_id: "wf-1".to_string(),
            from: "completed".to_string(),
            to: "running".to_string(),
        };
        assert!(err.to_string().contains("completed -> running"));
    }
}
