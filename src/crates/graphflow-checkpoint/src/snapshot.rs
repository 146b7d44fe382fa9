//! Persisted workflow state snapshots

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One step of a workflow's persisted history.
///
/// A snapshot captures everything needed to resume execution: the merged
/// shared state (`values`), the nodes scheduled to run next (`next`), and any
/// pending suspension payloads (`interrupts`). A workflow is paused exactly
/// when its latest snapshot has a non-empty `interrupts` list; it is terminal
/// when `next` is empty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateSnapshot {
    /// Unique snapshot identifier
    pub id: Uuid,

    /// Thread this snapshot belongs to (one thread per workflow)
    pub thread_id: String,

    /// Merged shared state after the step that produced this snapshot
    pub values: Value,

    /// Nodes to execute next; empty for terminal snapshots
    pub next: Vec<String>,

    /// Pending suspension payloads awaiting a resume command
    pub interrupts: Vec<Value>,

    /// When the snapshot was persisted
    pub created_at: DateTime<Utc>,
}

impl StateSnapshot {
    /// Create a snapshot for an in-flight step with nothing pending.
    pub fn new(thread_id: impl Into<String>, values: Value, next: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            thread_id: thread_id.into(),
            values,
            next,
            interrupts: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Attach a pending suspension payload.
    pub fn with_interrupt(mut self, payload: Value) -> Self {
        self.interrupts.push(payload);
        self
    }

    /// Whether this snapshot represents a paused workflow.
    pub fn is_interrupted(&self) -> bool {
        !self.interrupts.is_empty()
    }

    /// Whether this snapshot represents a finished workflow.
    pub fn is_terminal(&self) -> bool {
        self.next.is_empty()
    }

    /// The first pending suspension payload, if any.
    pub fn pending_interrupt(&self) -> Option<&Value> {
        self.interrupts.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_flags() {
        let running = StateSnapshot::new("t1", json!({"k": 1}), vec!["node_a".to_string()]);
        assert!(!running.is_interrupted());
        assert!(!running.is_terminal());

        let paused = StateSnapshot::new("t1", json!({}), vec!["node_a".to_string()])
            .with_interrupt(json!({"step_name": "plan_ready_for_review"}));
        assert!(paused.is_interrupted());
        assert_eq!(
            paused.pending_interrupt().unwrap()["step_name"],
            "plan_ready_for_review"
        );

        let done = StateSnapshot::new("t1", json!({}), vec![]);
        assert!(done.is_terminal());
        assert!(done.pending_interrupt().is_none());
    }

    #[test]
    fn test_snapshot_round_trip() {
        let snapshot = StateSnapshot::new("thread-9", json!({"count": 3}), vec![])
            .with_interrupt(json!({"kind": "timeout"}));

        let encoded = serde_json::to_string(&snapshot).unwrap();
        let decoded: StateSnapshot = serde_json::from_str(&encoded).unwrap();
        assert_eq!(snapshot, decoded);
    }
}
