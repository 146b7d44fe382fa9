//! Plan-review workflow state
//!
//! The shared state that flows through the graph. It round-trips through the
//! engine's JSON representation: nodes deserialize the full state, compute,
//! and return partial update objects. `messages` is registered append-only in
//! the graph schema; every other field is last-write-wins.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use graphflow_core::StateSchema;

/// One entry in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// `user`, `planner`, or `reviewer_<k>`
    pub role: String,

    /// Concrete agent name, when the message came from an agent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            name: None,
            content: content.into(),
        }
    }

    pub fn planner(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: "planner".to_string(),
            name: Some(name.into()),
            content: content.into(),
        }
    }

    pub fn reviewer(slot: usize, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: format!("reviewer_{slot}"),
            name: Some(name.into()),
            content: content.into(),
        }
    }
}

/// One reviewer's feedback from the most recent round.
///
/// `agent_identifier` is the stable generic handle used inside prompts
/// (`REVIEW AGENT k`); `agent_name` is the real slot name kept for
/// persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewFeedback {
    pub agent_name: String,
    pub agent_type: String,
    pub agent_identifier: String,
    pub feedback: String,
    pub timestamp: String,
}

impl ReviewFeedback {
    pub fn new(
        agent_name: impl Into<String>,
        agent_type: impl Into<String>,
        agent_identifier: impl Into<String>,
        feedback: impl Into<String>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            agent_type: agent_type.into(),
            agent_identifier: agent_identifier.into(),
            feedback: feedback.into(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

/// Shared state for the plan-review graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanReviewState {
    pub workflow_id: String,

    /// Conversation history, append-only across the run
    pub messages: Vec<Message>,

    pub current_plan: String,

    /// Feedback from the most recent completed review round
    pub review_feedback: Vec<ReviewFeedback>,

    /// Revision rounds completed; never decreases
    pub iteration_count: i64,

    /// Strictly increasing across emitted checkpoints
    pub checkpoint_number: i64,

    /// Workflow-logical progress marker (plan_created, reviews_collected, ...)
    pub status: String,

    /// Plan content as last edited by the user
    pub user_edits: String,

    /// Routing label consumed by conditional edges
    pub next_step: String,

    /// Consolidated review document carried into a revision
    pub consolidated_feedback: String,

    /// Full-prompt overrides set via the edit-prompt checkpoints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reviewer_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planner_prompt: Option<String>,

    /// Set when a timeout checkpoint was resolved with retry
    pub retry_agent: bool,

    /// Extra seconds granted by retry_with_extension
    pub timeout_extension: u64,

    /// Agent skipped after its timeout, excluded from re-runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_timed_out_agent: Option<String>,

    /// Successful reviews preserved across a timeout suspension for skip
    pub partial_reviews: Vec<ReviewFeedback>,

    /// Name of the agent whose timeout produced the pending checkpoint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timed_out_agent: Option<String>,
}

impl PlanReviewState {
    /// Deserialize from the engine's JSON state. Missing fields default.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }

    /// The plan reviewers should see: the user's edit when present.
    pub fn plan_under_review(&self) -> &str {
        if self.user_edits.is_empty() {
            &self.current_plan
        } else {
            &self.user_edits
        }
    }

    /// Initial engine state for a new workflow.
    pub fn initial(workflow_id: &str, initial_prompt: &str) -> Value {
        serde_json::json!({
            "workflow_id": workflow_id,
            "messages": [Message::user(initial_prompt)],
            "status": "pending",
            "iteration_count": 0,
            "checkpoint_number": 0,
        })
    }

    /// The merge schema for this workflow's graph.
    pub fn schema() -> StateSchema {
        StateSchema::new().append("messages")
    }
}

/// Coarse step classification for history annotation.
pub fn step_kind(values: &Value) -> &'static str {
    let has_reviews = values
        .get("review_feedback")
        .and_then(Value::as_array)
        .map(|a| !a.is_empty())
        .unwrap_or(false);
    if has_reviews {
        return "review";
    }

    let has_plan = values
        .get("current_plan")
        .and_then(Value::as_str)
        .map(|s| !s.is_empty())
        .unwrap_or(false);
    if has_plan {
        "plan"
    } else {
        "unknown"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_round_trip_through_json() {
        let mut state = PlanReviewState {
            workflow_id: "wf-1".to_string(),
            current_plan: "# Plan".to_string(),
            checkpoint_number: 2,
            ..Default::default()
        };
        state.messages.push(Message::user("build it"));
        state
            .review_feedback
            .push(ReviewFeedback::new("reviewer_1", "claude", "REVIEW AGENT 1", "fine"));

        let value = serde_json::to_value(&state).unwrap();
        let back = PlanReviewState::from_value(&value).unwrap();
        assert_eq!(back.workflow_id, "wf-1");
        assert_eq!(back.checkpoint_number, 2);
        assert_eq!(back.messages.len(), 1);
        assert_eq!(back.review_feedback[0].agent_identifier, "REVIEW AGENT 1");
    }

    #[test]
    fn test_partial_value_defaults() {
        let state = PlanReviewState::from_value(&json!({"workflow_id": "wf-1"})).unwrap();
        assert_eq!(state.iteration_count, 0);
        assert!(state.messages.is_empty());
        assert!(state.planner_prompt.is_none());
        assert!(!state.retry_agent);
    }

    #[test]
    fn test_plan_under_review_prefers_user_edits() {
        let mut state = PlanReviewState {
            current_plan: "original".to_string(),
            ..Default::default()
        };
        assert_eq!(state.plan_under_review(), "original");

        state.user_edits = "edited".to_string();
        assert_eq!(state.plan_under_review(), "edited");
    }

    #[test]
    fn test_step_kind_derivation() {
        assert_eq!(step_kind(&json!({})), "unknown");
        assert_eq!(step_kind(&json!({"current_plan": "# Plan"})), "plan");
        assert_eq!(
            step_kind(&json!({
                "current_plan": "# Plan",
                "review_feedback": [{"agent_name": "r1"}],
            })),
            "review"
        );
        assert_eq!(
            step_kind(&json!({"current_plan": "", "review_feedback": []})),
            "unknown"
        );
    }
}
