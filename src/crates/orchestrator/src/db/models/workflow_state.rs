//! Persisted workflow state snapshot rows

use chrono::{DateTime, Utc};
use graphflow_checkpoint::{StateSnapshot, StoreError};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One engine snapshot serialized for the `workflow_states` table.
///
/// `state_values`, `next_nodes`, and `interrupts` are JSON columns; the
/// conversion to and from [`StateSnapshot`] is lossless.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowStateRow {
    pub snapshot_id: String,
    pub thread_id: String,
    pub state_values: String,
    pub next_nodes: String,
    pub interrupts: String,
    pub created_at: String,
}

impl WorkflowStateRow {
    pub fn from_snapshot(snapshot: &StateSnapshot) -> Result<Self, StoreError> {
        Ok(Self {
            snapshot_id: snapshot.id.to_string(),
            thread_id: snapshot.thread_id.clone(),
            state_values: serde_json::to_string(&snapshot.values)?,
            next_nodes: serde_json::to_string(&snapshot.next)?,
            interrupts: serde_json::to_string(&snapshot.interrupts)?,
            created_at: snapshot.created_at.to_rfc3339(),
        })
    }

    pub fn into_snapshot(self) -> Result<StateSnapshot, StoreError> {
        let id = Uuid::parse_str(&self.snapshot_id)
            .map_err(|e| StoreError::Backend(format!("invalid snapshot id: {e}")))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| StoreError::Backend(format!("invalid snapshot timestamp: {e}")))?
            .with_timezone(&Utc);

        Ok(StateSnapshot {
            id,
            thread_id: self.thread_id,
            values: serde_json::from_str(&self.state_values)?,
            next: serde_json::from_str(&self.next_nodes)?,
            interrupts: serde_json::from_str(&self.interrupts)?,
            created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_row_round_trip() {
        let snapshot = StateSnapshot::new(
            "wf-1",
            json!({"current_plan": "text"}),
            vec!["plan_checkpoint".to_string()],
        )
        .with_interrupt(json!({"step_name": "plan_ready_for_review"}));

        let row = WorkflowStateRow::from_snapshot(&snapshot).unwrap();
        let back = row.into_snapshot().unwrap();

        assert_eq!(back.id, snapshot.id);
        assert_eq!(back.values, snapshot.values);
        assert_eq!(back.next, snapshot.next);
        assert_eq!(back.interrupts, snapshot.interrupts);
    }
}
