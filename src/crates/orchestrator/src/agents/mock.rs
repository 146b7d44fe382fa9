//! In-process mock agents for development without real CLI tools

use std::time::Duration;

use crate::agents::adapters::{AgentConfig, AgentRole};
use crate::error::AgentError;

/// Produce a canned response for a mock agent.
///
/// Keeps a short artificial delay so concurrency behavior (fan-out, status
/// oscillation) stays observable in development.
pub async fn respond(agent: &AgentConfig, prompt: &str) -> Result<String, AgentError> {
    tokio::time::sleep(Duration::from_millis(25)).await;

    let text = match agent.role {
        AgentRole::Planning => plan_response(),
        AgentRole::Review => review_response(&agent.display_name),
        AgentRole::Summary => summary_response(),
        AgentRole::General => {
            let preview: String = prompt.chars().take(100).collect();
            format!("Mock response from {} for: {preview}...", agent.name)
        }
    };
    Ok(text)
}

fn plan_response() -> String {
    "# Development Plan\n\n\
     ## Overview\n\
     Based on the requirements provided, here's a plan for implementation.\n\n\
     ## Architecture\n\
     - Backend API service with a relational database\n\
     - Frontend single-page application\n\
     - Background workers for long-running jobs\n\n\
     ## Implementation Steps\n\
     1. Initialize project structure and database schema\n\
     2. Build core business logic with tests alongside\n\
     3. Add the API surface and real-time updates\n\
     4. Harden: security audit, performance pass, deployment pipeline\n\n\
     ## Risks\n\
     - Third-party API downtime: add retry logic and fallbacks\n\
     - Scaling: plan the database migration path early\n"
        .to_string()
}

fn review_response(reviewer: &str) -> String {
    format!(
        "# Review Feedback from {reviewer}\n\n\
         ## Overall Assessment\n\
         The plan is well-structured and covers the major concerns.\n\n\
         ## Concerns\n\
         1. Testing is scheduled after development; adopt TDD from the start.\n\
         2. The authentication approach lacks specifics; must address before \
         implementation.\n\n\
         ## Recommendation\n\
         Revise and resubmit after addressing the items above.\n"
    )
}

fn summary_response() -> String {
    "## Summary\n\
     Reviewers broadly agree the plan is sound; the recurring asks are \
     earlier testing and concrete authentication choices.\n\n\
     ```verdicts\n\
     REVIEW AGENT 1: APPROVED_WITH_SUGGESTIONS\n\
     REVIEW AGENT 2: NEEDS_REVISION\n\
     REVIEW AGENT 3: APPROVED\n\
     ```\n"
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    #[tokio::test]
    async fn test_mock_responses_by_role() {
        let settings = Settings::default();

        let planner =
            AgentConfig::resolve("planner", AgentRole::Planning, &settings, None);
        let plan = respond(&planner, "Plan a todo list app.").await.unwrap();
        assert!(plan.contains("# Development Plan"));

        let reviewer =
            AgentConfig::resolve("reviewer_1", AgentRole::Review, &settings, None);
        let review = respond(&reviewer, &plan).await.unwrap();
        assert!(review.contains("Review Feedback"));
        assert!(review.contains(&reviewer.display_name));

        let general = AgentConfig::resolve("helper", AgentRole::General, &settings, None);
        let reply = respond(&general, "do something").await.unwrap();
        assert!(reply.contains("helper"));
    }
}
