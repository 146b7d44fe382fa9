//! Prompt templates for the plan-review workflow
//!
//! Prompts refer to reviewers only by their stable generic identifiers
//! (`REVIEW AGENT k`) so that agent output never leaks tool vendor names
//! back into the conversation; real agent names stay in persistence.

use crate::workflow::state::{Message, ReviewFeedback};

/// Prior plans and reviews are truncated to this length in history prompts.
const HISTORY_CONTENT_LIMIT: usize = 500;

/// First planning prompt for a fresh workflow.
pub fn planning_initial(requirements: &str) -> String {
    format!(
        "You are a PLANNING AGENT helping develop a comprehensive plan.\n\n\
         The user has the following requirements:\n\n\
         {requirements}\n\n\
         Please create a detailed development plan that addresses these requirements.\n\
         Include:\n\
         - Architecture overview\n\
         - Implementation steps\n\
         - Timeline estimates\n\
         - Potential challenges\n\n\
         Your plan will be reviewed by multiple REVIEW AGENTS before implementation.\n"
    )
}

/// Revision prompt carrying the conversation history and the latest
/// review feedback.
pub fn planning_with_history(messages: &[Message], review_feedback: &[ReviewFeedback]) -> String {
    let mut history = String::from("Here is the conversation history so far:\n");

    for message in messages {
        let (role, content) = match message.role.as_str() {
            "user" => ("USER".to_string(), message.content.clone()),
            "planner" => (
                "YOU (previous iteration)".to_string(),
                truncate(&message.content),
            ),
            _ => {
                let identifier = message
                    .name
                    .clone()
                    .unwrap_or_else(|| message.role.clone());
                (format!("REVIEW AGENT ({identifier})"), truncate(&message.content))
            }
        };
        history.push_str(&format!("\n--- {role} ---\n{content}\n"));
    }

    let feedback_section = if review_feedback.is_empty() {
        String::new()
    } else {
        let feedback_text = review_feedback
            .iter()
            .map(|review| {
                format!(
                    "**** {id} FEEDBACK START ****\n{feedback}\n**** {id} FEEDBACK END ****",
                    id = review.agent_identifier,
                    feedback = review.feedback
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");
        format!("\n\nThe REVIEW AGENTS have provided new feedback:\n\n{feedback_text}\n\n")
    };

    format!(
        "{history}\n{feedback_section}\
         Based on the conversation history above, please revise your plan.\n\n\
         IMPORTANT:\n\
         - Reference what was tried before and why it didn't work\n\
         - Address all feedback from review agents\n\
         - Build on previous iterations rather than starting from scratch\n\
         - Remember user preferences expressed in earlier messages\n\n\
         Provide your revised plan now.\n"
    )
}

/// Review request for one reviewer, addressed by its generic identifier.
pub fn review_request(plan: &str, agent_identifier: &str) -> String {
    format!(
        "You are a REVIEW AGENT ({agent_identifier}) helping review a development plan.\n\n\
         The PLANNING AGENT has prepared the following plan:\n\n\
         **** PLAN START ****\n\
         {plan}\n\
         **** PLAN END ****\n\n\
         Please provide expert review feedback on the plan.\n\
         Focus on:\n\
         - Technical feasibility\n\
         - Architecture concerns\n\
         - Missing considerations\n\
         - Timeline realism\n\
         - Security and scalability\n\n\
         Provide direct, unambiguous feedback that will help improve the plan.\n"
    )
}

/// Review request for a revision round: the plan plus the history that led
/// to it.
pub fn review_request_with_history(
    plan: &str,
    agent_identifier: &str,
    messages: &[Message],
) -> String {
    let mut history = String::new();
    for message in messages {
        let role = match message.role.as_str() {
            "user" => "USER",
            "planner" => "PLANNING AGENT",
            _ => "REVIEW AGENT",
        };
        history.push_str(&format!("\n--- {role} ---\n{}\n", truncate(&message.content)));
    }

    format!(
        "You are a REVIEW AGENT ({agent_identifier}) reviewing a revised development plan.\n\n\
         Conversation history leading to this revision:\n\
         {history}\n\
         The PLANNING AGENT has prepared the following revised plan:\n\n\
         **** PLAN START ****\n\
         {plan}\n\
         **** PLAN END ****\n\n\
         Review the revision against the history above. Call out feedback that was\n\
         ignored as well as any new concerns.\n"
    )
}

/// Merge one round of reviews into a single editable document.
pub fn consolidate_reviews(feedback: &[ReviewFeedback]) -> String {
    let mut consolidated = String::from("=== CONSOLIDATED REVIEW FEEDBACK ===\n\n");

    for review in feedback {
        consolidated.push_str(&format!("## {}\n\n", review.agent_identifier));
        consolidated.push_str(&review.feedback);
        consolidated.push_str(&format!("\n\n{}\n\n", "=".repeat(60)));
    }

    consolidated.push_str(
        "\n=== USER CONSOLIDATION ===\n\
         [Edit this section to provide consolidated feedback to the PLANNING AGENT]\n\n",
    );
    consolidated
}

fn truncate(content: &str) -> String {
    if content.len() <= HISTORY_CONTENT_LIMIT {
        return content.to_string();
    }
    let mut end = HISTORY_CONTENT_LIMIT;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &content[..end])
}
