//! Database repositories

pub mod agent_execution_repo;
pub mod checkpoint_repo;
pub mod workflow_repo;
pub mod workflow_state_repo;

pub use agent_execution_repo::AgentExecutionRepository;
pub use checkpoint_repo::CheckpointRepository;
pub use workflow_repo::WorkflowRepository;
pub use workflow_state_repo::{SqliteStateStore, WorkflowStateRepository};
