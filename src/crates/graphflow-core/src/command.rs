//! Resume commands for suspended workflows

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope carrying the human resolution back into a suspended workflow.
///
/// When a node suspends, control returns to the caller with the suspension
/// payload. The caller later re-enters the graph with a `Command` whose
/// `resume` value is delivered to the suspended node through
/// [`NodeContext::take_resume`](crate::node::NodeContext::take_resume).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Command {
    /// Value the suspended node receives on re-entry
    pub resume: Value,
}

impl Command {
    /// Build a resume command.
    pub fn resume(value: Value) -> Self {
        Self { resume: value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_command_round_trip() {
        let command = Command::resume(json!({"action": "approve_plan"}));
        let encoded = serde_json::to_string(&command).unwrap();
        let decoded: Command = serde_json::from_str(&encoded).unwrap();
        assert_eq!(command, decoded);
        assert_eq!(decoded.resume["action"], "approve_plan");
    }
}
