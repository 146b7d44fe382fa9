//! Storage backend trait for workflow state snapshots
//!
//! [`StateStore`] is the seam that makes workflows durable. The engine calls
//! `save` after every executed node; `latest` drives resumption; `history`
//! feeds audit and inspection surfaces. Implementations must keep snapshots
//! for one thread ordered by insertion so that `latest` and `history` agree.
//!
//! Backends are expected to serialize writes per thread id. The engine itself
//! never issues concurrent writes for a single thread (node execution is
//! strictly serialized), but two service instances sharing a store must not
//! interleave partial writes.

use async_trait::async_trait;
use thiserror::Error;

use crate::snapshot::StateSnapshot;

/// Errors from state store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Snapshot could not be serialized or deserialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure (connection, I/O, constraint)
    #[error("state store backend error: {0}")]
    Backend(String),
}

/// Durable keyed store of workflow state snapshots.
///
/// One `thread_id` keys one workflow's entire history. Implementations append
/// snapshots; nothing is ever updated in place.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Append a snapshot to the thread's history.
    async fn save(&self, snapshot: StateSnapshot) -> crate::Result<()>;

    /// The most recently saved snapshot for a thread, if any.
    async fn latest(&self, thread_id: &str) -> crate::Result<Option<StateSnapshot>>;

    /// Full snapshot history for a thread, newest first.
    async fn history(&self, thread_id: &str) -> crate::Result<Vec<StateSnapshot>>;
}
