//! Per-workflow event fan-out
//!
//! The notifier is the in-process half of the realtime surface: the status
//! manager publishes here and the (external) socket layer subscribes.
//! Delivery is best-effort (a subscriber whose receiver is gone is pruned
//! during publish) and ordered per workflow because publishes happen from
//! the workflow's single driver task.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// Event delivered to workflow subscribers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// A checkpoint is awaiting human resolution
    CheckpointReady {
        workflow_id: String,
        timestamp: String,
    },

    /// Workflow reached `completed`
    WorkflowCompleted {
        workflow_id: String,
        timestamp: String,
    },

    /// Workflow reached `failed`
    WorkflowFailed {
        workflow_id: String,
        error: String,
        timestamp: String,
    },

    /// Any other status change
    StatusUpdate {
        workflow_id: String,
        status: String,
        timestamp: String,
    },
}

impl WorkflowEvent {
    pub fn checkpoint_ready(workflow_id: impl Into<String>) -> Self {
        WorkflowEvent::CheckpointReady {
            workflow_id: workflow_id.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn completed(workflow_id: impl Into<String>) -> Self {
        WorkflowEvent::WorkflowCompleted {
            workflow_id: workflow_id.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn failed(workflow_id: impl Into<String>, error: impl Into<String>) -> Self {
        WorkflowEvent::WorkflowFailed {
            workflow_id: workflow_id.into(),
            error: error.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn status_update(workflow_id: impl Into<String>, status: impl Into<String>) -> Self {
        WorkflowEvent::StatusUpdate {
            workflow_id: workflow_id.into(),
            status: status.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    pub fn workflow_id(&self) -> &str {
        match self {
            WorkflowEvent::CheckpointReady { workflow_id, .. }
            | WorkflowEvent::WorkflowCompleted { workflow_id, .. }
            | WorkflowEvent::WorkflowFailed { workflow_id, .. }
            | WorkflowEvent::StatusUpdate { workflow_id, .. } => workflow_id,
        }
    }
}

/// Fan-out channel registry keyed by workflow id.
#[derive(Clone, Default)]
pub struct Notifier {
    subscribers: Arc<Mutex<HashMap<String, Vec<mpsc::UnboundedSender<WorkflowEvent>>>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to one workflow's events.
    pub async fn subscribe(&self, workflow_id: &str) -> mpsc::UnboundedReceiver<WorkflowEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .await
            .entry(workflow_id.to_string())
            .or_default()
            .push(tx);
        rx
    }

    /// Publish to all live subscribers of the event's workflow, dropping
    /// any whose receiver has gone away.
    pub async fn publish(&self, event: WorkflowEvent) {
        let mut subscribers = self.subscribers.lock().await;
        let Some(senders) = subscribers.get_mut(event.workflow_id()) else {
            return;
        };

        senders.retain(|tx| tx.send(event.clone()).is_ok());
        if senders.is_empty() {
            let workflow_id = event.workflow_id().to_string();
            subscribers.remove(&workflow_id);
            debug!(workflow_id = %workflow_id, "last subscriber gone, dropping channel list");
        }
    }

    /// Remove all subscribers for a workflow (terminal cleanup).
    pub async fn unsubscribe_all(&self, workflow_id: &str) {
        self.subscribers.lock().await.remove(workflow_id);
    }

    /// Live subscriber count for a workflow.
    pub async fn subscriber_count(&self, workflow_id: &str) -> usize {
        self.subscribers
            .lock()
            .await
            .get(workflow_id)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let notifier = Notifier::new();
        let mut rx1 = notifier.subscribe("wf-1").await;
        let mut rx2 = notifier.subscribe("wf-1").await;

        notifier
            .publish(WorkflowEvent::checkpoint_ready("wf-1"))
            .await;

        assert!(matches!(
            rx1.recv().await.unwrap(),
            WorkflowEvent::CheckpointReady { .. }
        ));
        assert!(matches!(
            rx2.recv().await.unwrap(),
            WorkflowEvent::CheckpointReady { .. }
        ));
    }

    #[tokio::test]
    async fn test_publish_is_scoped_to_workflow() {
        let notifier = Notifier::new();
        let mut rx_other = notifier.subscribe("wf-2").await;

        notifier.publish(WorkflowEvent::completed("wf-1")).await;

        assert!(rx_other.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dead_subscribers_pruned_on_publish() {
        let notifier = Notifier::new();
        let rx = notifier.subscribe("wf-1").await;
        drop(rx);
        let mut live = notifier.subscribe("wf-1").await;
        assert_eq!(notifier.subscriber_count("wf-1").await, 2);

        notifier
            .publish(WorkflowEvent::status_update("wf-1", "running"))
            .await;

        assert_eq!(notifier.subscriber_count("wf-1").await, 1);
        assert!(live.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_delivery_order_follows_publication_order() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe("wf-1").await;

        notifier
            .publish(WorkflowEvent::status_update("wf-1", "running"))
            .await;
        notifier
            .publish(WorkflowEvent::checkpoint_ready("wf-1"))
            .await;
        notifier.publish(WorkflowEvent::completed("wf-1")).await;

        assert!(matches!(
            rx.recv().await.unwrap(),
            WorkflowEvent::StatusUpdate { .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            WorkflowEvent::CheckpointReady { .. }
        ));
        assert!(matches!(
            rx.recv().await.unwrap(),
            WorkflowEvent::WorkflowCompleted { .. }
        ));
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = WorkflowEvent::failed("wf-1", "agent exploded");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "workflow_failed");
        assert_eq!(value["workflow_id"], "wf-1");
        assert_eq!(value["error"], "agent exploded");
        assert!(value["timestamp"].is_string());
    }
}
