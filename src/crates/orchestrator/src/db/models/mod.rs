//! Database row models

pub mod agent_execution;
pub mod checkpoint;
pub mod workflow;
pub mod workflow_state;

pub use agent_execution::{AgentExecutionRow, ExecutionStatus};
pub use checkpoint::{CheckpointStatus, UserCheckpointRow};
pub use workflow::{WorkflowRow, WorkflowStatus};
pub use workflow_state::WorkflowStateRow;
