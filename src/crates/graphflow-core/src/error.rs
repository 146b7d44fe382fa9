//! Error types for graph construction and execution

use thiserror::Error;

/// Errors from building or running a graph
#[derive(Debug, Error)]
pub enum GraphError {
    /// Graph failed structural validation at compile time
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// Execution referenced a node that does not exist
    #[error("unknown node: {0}")]
    UnknownNode(String),

    /// A node body returned an error
    #[error("node '{node}' failed: {message}")]
    Node { node: String, message: String },

    /// A conditional router returned a label with no registered branch
    #[error("conditional edge from '{node}' returned unknown branch '{label}'")]
    UnknownBranch { node: String, label: String },

    /// Resume was called on a thread with no pending suspension
    #[error("no pending interrupt for thread '{0}'")]
    NoPendingInterrupt(String),

    /// State store failure
    #[error(transparent)]
    Store(#[from] graphflow_checkpoint::StoreError),
}

/// Result type for graph operations
pub type Result<T> = std::result::Result<T, GraphError>;
