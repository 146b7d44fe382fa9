//! Node execution types
//!
//! A node is an async function from the shared state to a [`NodeOutput`].
//! Nodes never mutate state directly; they return an update object that the
//! engine merges according to the graph's [`StateSchema`](crate::state::StateSchema).
//!
//! # Suspension
//!
//! Suspension is a value, not an error: a node that needs human input returns
//! [`NodeOutput::Suspend`] with a payload describing the pause. On resume the
//! engine re-invokes the same node from the top with the resolution available
//! through [`NodeContext::take_resume`], a one-shot continuation. Everything
//! a node does before checking the resume value therefore runs twice across a
//! suspend/resume pair and must be idempotent or cheap.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::{json, Value};

/// Error type node bodies may return; mapped to
/// [`GraphError::Node`](crate::error::GraphError::Node) by the engine.
pub type NodeError = Box<dyn std::error::Error + Send + Sync>;

/// Result of one node invocation
pub type NodeResult = std::result::Result<NodeOutput, NodeError>;

/// Boxed async node function stored in the graph
pub type NodeFn =
    Arc<dyn Fn(Value, NodeContext) -> Pin<Box<dyn Future<Output = NodeResult> + Send>> + Send + Sync>;

/// Per-invocation context handed to a node.
#[derive(Debug)]
pub struct NodeContext {
    thread_id: String,
    resume: Option<Value>,
}

impl NodeContext {
    pub fn new(thread_id: impl Into<String>, resume: Option<Value>) -> Self {
        Self {
            thread_id: thread_id.into(),
            resume,
        }
    }

    /// Thread id of the running workflow.
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }

    /// Whether this invocation is a re-entry after a suspension.
    pub fn is_resuming(&self) -> bool {
        self.resume.is_some()
    }

    /// Consume the resume payload delivered by a `Command`.
    ///
    /// Returns `Some` exactly once, on the first call after a resume; the
    /// suspended node uses this to distinguish first entry (suspend) from
    /// re-entry (process the resolution).
    pub fn take_resume(&mut self) -> Option<Value> {
        self.resume.take()
    }
}

/// Outcome of a node invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeOutput {
    /// Merge the update into shared state and continue along the node's edge.
    Advance(Value),

    /// Pause the workflow. `update` is merged before the snapshot is
    /// persisted; `payload` is surfaced to the caller and stored as the
    /// pending interrupt.
    Suspend { payload: Value, update: Value },
}

impl NodeOutput {
    /// Continue with the given state updates.
    pub fn advance(update: Value) -> Self {
        NodeOutput::Advance(update)
    }

    /// Suspend with a payload and no state changes.
    pub fn suspend(payload: Value) -> Self {
        NodeOutput::Suspend {
            payload,
            update: json!({}),
        }
    }

    /// Suspend with a payload after merging state updates.
    pub fn suspend_with(payload: Value, update: Value) -> Self {
        NodeOutput::Suspend { payload, update }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_resume_is_one_shot() {
        let mut ctx = NodeContext::new("t1", Some(json!({"action": "skip"})));
        assert!(ctx.is_resuming());
        assert_eq!(ctx.take_resume().unwrap()["action"], "skip");
        assert!(ctx.take_resume().is_none());
        assert!(!ctx.is_resuming());
    }

    #[test]
    fn test_fresh_context_has_no_resume() {
        let mut ctx = NodeContext::new("t1", None);
        assert!(!ctx.is_resuming());
        assert!(ctx.take_resume().is_none());
    }
}
