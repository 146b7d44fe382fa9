//! Review verdict classification
//!
//! Keyword heuristics over reviewer free text. The classification is
//! advisory: it annotates execution rows and summaries, but routing
//! decisions always belong to the human at the checkpoint. The structured
//! verdict-block parser exists for summary agents that emit explicit
//! verdicts.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Coarse classification of one review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewVerdict {
    Approved,
    HasFeedback,
    Unclear,
}

impl ReviewVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewVerdict::Approved => "approved",
            ReviewVerdict::HasFeedback => "has_feedback",
            ReviewVerdict::Unclear => "unclear",
        }
    }
}

static APPROVAL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\bapproved?\b",
        r"\blooks?\s+good\b",
        r"\bready\s+to\s+(proceed|implement|continue)\b",
        r"\bno\s+(concerns?|issues?|problems?)\b",
        r"\bexcellent\s+plan\b",
        r"\bwell[-\s]structured\b",
        r"\bcomprehensive\s+plan\b",
        r"\bno\s+major\s+(concerns?|issues?)\b",
        r"\ball\s+good\b",
        r"\bproceed\s+with\s+implementation\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static CONCERN_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\b(critical|major|serious)\s+(issue|concern|problem)\b",
        r"\bmust\s+(address|fix|change|add|update)\b",
        r"\brequired?\s+(change|update|fix)\b",
        r"\bmissing\s+(critical|important|essential)\b",
        r"\bshould\s+(add|include|consider|address)\b.*\bbefore\s+implementation\b",
        r"\bsignificant\s+(concern|issue|problem)\b",
        r"\bnot\s+ready\b",
        r"\bneeds?\s+(revision|more\s+work|improvement)\b",
        r"\breject\b",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

static SHOULD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bshould\b").expect("valid regex"));

/// Classify one review's free text.
pub fn analyze_review(review_content: &str) -> ReviewVerdict {
    let content = review_content.to_lowercase();

    let approval_score = APPROVAL_PATTERNS
        .iter()
        .filter(|p| p.is_match(&content))
        .count();
    let concern_score = CONCERN_PATTERNS
        .iter()
        .filter(|p| p.is_match(&content))
        .count();

    if approval_score > 0 && concern_score == 0 {
        return ReviewVerdict::Approved;
    }
    if concern_score > 0 {
        return ReviewVerdict::HasFeedback;
    }

    // "should" statements are suggestions that may or may not block; many of
    // them reads as feedback.
    let should_count = SHOULD_PATTERN.find_iter(&content).count();
    if should_count >= 3 {
        return ReviewVerdict::HasFeedback;
    }

    if approval_score > 0 {
        return ReviewVerdict::Approved;
    }

    // A substantial review with no signals almost always carries feedback.
    if content.len() > 200 {
        ReviewVerdict::HasFeedback
    } else {
        ReviewVerdict::Unclear
    }
}

/// Aggregate verdicts for one review round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApprovalSummary {
    pub approved_count: usize,
    pub feedback_count: usize,
    pub unclear_count: usize,
    pub all_approved: bool,
}

/// Summarize `(agent identifier, review text)` pairs for one round.
pub fn approval_summary<'a, I>(reviews: I) -> ApprovalSummary
where
    I: IntoIterator<Item = &'a str>,
{
    let mut approved = 0;
    let mut feedback = 0;
    let mut unclear = 0;
    let mut total = 0;

    for review in reviews {
        total += 1;
        match analyze_review(review) {
            ReviewVerdict::Approved => approved += 1,
            ReviewVerdict::HasFeedback => feedback += 1,
            ReviewVerdict::Unclear => unclear += 1,
        }
    }

    ApprovalSummary {
        approved_count: approved,
        feedback_count: feedback,
        unclear_count: unclear,
        all_approved: total > 0 && approved == total,
    }
}

static VERDICT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```verdicts\s*(.*?)\s*```").expect("valid regex")
});

static VERDICT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(REVIEW\s+AGENT\s+\d+)\s*:\s*(APPROVED_WITH_SUGGESTIONS|APPROVED|NEEDS_REVISION)")
        .expect("valid regex")
});

/// Parse explicit reviewer verdicts from a summary agent's output.
///
/// Looks for a ```` ```verdicts ```` block with lines like
/// `REVIEW AGENT 1: APPROVED`; falls back to scanning the whole text when
/// the block is missing. Keys are uppercased identifiers.
pub fn parse_verdicts(summary_content: &str) -> HashMap<String, ReviewVerdict> {
    let block = VERDICT_BLOCK
        .captures(summary_content)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(summary_content);

    let mut verdicts = HashMap::new();
    for captures in VERDICT_LINE.captures_iter(block) {
        let agent_id = captures[1].to_uppercase();
        let verdict = match captures[2].to_uppercase().as_str() {
            "APPROVED" | "APPROVED_WITH_SUGGESTIONS" => ReviewVerdict::Approved,
            "NEEDS_REVISION" => ReviewVerdict::HasFeedback,
            _ => ReviewVerdict::Unclear,
        };
        verdicts.insert(agent_id, verdict);
    }

    debug!(count = verdicts.len(), "parsed verdicts from summary");
    verdicts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_approval() {
        assert_eq!(
            analyze_review("The plan is APPROVED, ready to proceed."),
            ReviewVerdict::Approved
        );
        assert_eq!(
            analyze_review("Looks good. No concerns from my side."),
            ReviewVerdict::Approved
        );
    }

    #[test]
    fn test_concerns_win_over_praise() {
        assert_eq!(
            analyze_review(
                "Well-structured overall, but there is a critical issue with the \
                 auth flow that you must fix before shipping."
            ),
            ReviewVerdict::HasFeedback
        );
        assert_eq!(
            analyze_review("This plan is not ready. Needs revision."),
            ReviewVerdict::HasFeedback
        );
        assert_eq!(
            analyze_review("You must fix the database layer."),
            ReviewVerdict::HasFeedback
        );
    }

    #[test]
    fn test_many_shoulds_classify_as_feedback() {
        let review = "You should tighten scope. The API should be versioned. \
                      Tests should come first.";
        assert_eq!(analyze_review(review), ReviewVerdict::HasFeedback);
    }

    #[test]
    fn test_short_signal_free_text_is_unclear() {
        assert_eq!(analyze_review("Interesting."), ReviewVerdict::Unclear);
    }

    #[test]
    fn test_long_signal_free_text_is_feedback() {
        let review = "x".repeat(250);
        assert_eq!(analyze_review(&review), ReviewVerdict::HasFeedback);
    }

    #[test]
    fn test_approval_summary_counts() {
        let summary = approval_summary([
            "Approved, looks good.",
            "There is a major issue here, must fix.",
            "Hm.",
        ]);
        assert_eq!(summary.approved_count, 1);
        assert_eq!(summary.feedback_count, 1);
        assert_eq!(summary.unclear_count, 1);
        assert!(!summary.all_approved);

        let unanimous = approval_summary(["Approved.", "Looks good, no issues."]);
        assert!(unanimous.all_approved);
    }

    #[test]
    fn test_parse_verdicts_block() {
        let summary = "Overall solid work.\n\n```verdicts\nREVIEW AGENT 1: APPROVED\nREVIEW AGENT 2: APPROVED_WITH_SUGGESTIONS\nREVIEW AGENT 3: NEEDS_REVISION\n```\n";
        let verdicts = parse_verdicts(summary);

        assert_eq!(verdicts.len(), 3);
        assert_eq!(verdicts["REVIEW AGENT 1"], ReviewVerdict::Approved);
        assert_eq!(verdicts["REVIEW AGENT 2"], ReviewVerdict::Approved);
        assert_eq!(verdicts["REVIEW AGENT 3"], ReviewVerdict::HasFeedback);
    }

    #[test]
    fn test_parse_verdicts_without_block_scans_text() {
        let summary = "Review Agent 1: approved\nreview agent 2: NEEDS_REVISION";
        let verdicts = parse_verdicts(summary);
        assert_eq!(verdicts["REVIEW AGENT 1"], ReviewVerdict::Approved);
        assert_eq!(verdicts["REVIEW AGENT 2"], ReviewVerdict::HasFeedback);
    }

    #[test]
    fn test_parse_verdicts_empty_input() {
        assert!(parse_verdicts("no verdicts here").is_empty());
    }

    #[test]
    fn test_analyzer_is_pure() {
        let text = "Approved with minor notes.";
        assert_eq!(analyze_review(text), analyze_review(text));
    }
}
