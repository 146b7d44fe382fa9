//! Orchestration services

pub mod checkpoints;
pub mod notifier;
pub mod review_analyzer;
pub mod status;
pub mod workflows;

pub use checkpoints::{
    AgentOutput, CheckpointActions, CheckpointPayload, CheckpointResolution, CheckpointService,
};
pub use notifier::{Notifier, WorkflowEvent};
pub use review_analyzer::{analyze_review, parse_verdicts, ApprovalSummary, ReviewVerdict};
pub use status::StatusManager;
pub use workflows::{AnnotatedSnapshot, WorkflowHandle, WorkflowService, WorkflowView};
