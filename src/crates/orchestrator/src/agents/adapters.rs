//! Tool adapters: per-CLI argv construction and delivery quirks
//!
//! Adapters are the only place tool-specific flags live. They decide three
//! things: the argv, whether the prompt travels via stdin (several of these
//! prompts exceed platform arg-length limits), and a content-extraction hint
//! for the generic parser. Adapters never parse output themselves.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::Settings;

/// Agent role; selects default timeouts and role-specific flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Planning,
    Review,
    Summary,
    General,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Planning => "planning",
            AgentRole::Review => "review",
            AgentRole::Summary => "summary",
            AgentRole::General => "general",
        }
    }
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which external tool backs an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Claude,
    Codex,
    Gemini,
    Mock,
}

impl AgentKind {
    /// Map an agent name to its tool by prefix; unknown prefixes fall back
    /// to the mock agent.
    pub fn from_name(name: &str) -> Self {
        if name.starts_with("claude") {
            AgentKind::Claude
        } else if name.starts_with("codex") {
            AgentKind::Codex
        } else if name.starts_with("gemini") {
            AgentKind::Gemini
        } else {
            AgentKind::Mock
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Claude => "claude",
            AgentKind::Codex => "codex",
            AgentKind::Gemini => "gemini",
            AgentKind::Mock => "mock",
        }
    }

    /// Preferred top-level key tried before the generic extraction order.
    pub fn content_hint(&self) -> Option<&'static str> {
        match self {
            AgentKind::Claude => Some("result"),
            AgentKind::Codex => Some("content"),
            AgentKind::Gemini => Some("response"),
            AgentKind::Mock => None,
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fully resolved configuration for one agent. Not persisted.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Stable agent name (e.g. "reviewer_2", "claude_planner")
    pub name: String,

    /// Friendly name for checkpoint surfaces
    pub display_name: String,

    pub role: AgentRole,
    pub kind: AgentKind,

    /// Path to the CLI binary
    pub cli_path: String,

    /// Working directory for the subprocess
    pub workspace_path: PathBuf,

    /// Hard deadline in seconds
    pub timeout_seconds: u64,

    /// Deliver the prompt on stdin instead of argv
    pub prompt_via_stdin: bool,

    /// Restrict the tool to suggestion/plan output (planning role)
    pub restricted_mode: bool,

    /// Auto-approve tool actions (never set for reviewers)
    pub auto_approve: bool,

    /// JSON schema file passed to tools that support structured output
    pub output_schema: Option<PathBuf>,
}

impl AgentConfig {
    /// Resolve a config for `(role, name)` from settings, with the adapter
    /// knobs each tool needs.
    pub fn resolve(
        name: &str,
        role: AgentRole,
        settings: &Settings,
        workspace_path: Option<PathBuf>,
    ) -> Self {
        let kind = if settings.use_mock_agents {
            AgentKind::Mock
        } else {
            AgentKind::from_name(name)
        };
        Self::for_kind(name, name, role, kind, settings, workspace_path)
    }

    /// Build a config for an explicit tool kind, bypassing prefix mapping.
    pub fn for_kind(
        name: &str,
        display_name: &str,
        role: AgentRole,
        kind: AgentKind,
        settings: &Settings,
        workspace_path: Option<PathBuf>,
    ) -> Self {
        let cli_path = match kind {
            AgentKind::Claude => settings.claude_cli_path.clone(),
            AgentKind::Codex => settings.codex_cli_path.clone(),
            AgentKind::Gemini => settings.gemini_cli_path.clone(),
            AgentKind::Mock => String::new(),
        };

        Self {
            name: name.to_string(),
            display_name: display_name.to_string(),
            role,
            kind,
            cli_path,
            workspace_path: workspace_path
                .unwrap_or_else(|| PathBuf::from(&settings.working_directory)),
            timeout_seconds: settings.timeout_for_role(role.as_str()),
            // Claude and Gemini read the prompt from stdin: their prompts
            // routinely exceed argv limits and stdin works with the
            // file-based stdout capture. Codex takes -p <prompt>.
            prompt_via_stdin: matches!(kind, AgentKind::Claude | AgentKind::Gemini),
            restricted_mode: kind == AgentKind::Claude && role == AgentRole::Planning,
            auto_approve: kind == AgentKind::Gemini && role != AgentRole::Review,
            output_schema: None,
        }
    }

    /// Argv for this invocation. When the prompt travels via stdin it does
    /// not appear here.
    pub fn build_argv(&self, prompt: &str) -> Vec<String> {
        match self.kind {
            AgentKind::Claude => {
                // Single-blob JSON, not stream-json: the streaming mode has
                // been observed to exit before flushing its final record.
                let mut argv = vec![
                    "--output-format".to_string(),
                    "json".to_string(),
                ];
                if self.restricted_mode {
                    argv.push("--permission-mode".to_string());
                    argv.push("plan".to_string());
                }
                argv
            }
            AgentKind::Codex => {
                let mut argv = vec!["--json".to_string(), "--quiet".to_string()];
                if let Some(schema) = &self.output_schema {
                    argv.push("--output-schema".to_string());
                    argv.push(schema.display().to_string());
                }
                argv.push("-p".to_string());
                argv.push(prompt.to_string());
                argv
            }
            AgentKind::Gemini => {
                let mut argv = vec!["--output-format".to_string(), "json".to_string()];
                if self.auto_approve {
                    argv.push("--yolo".to_string());
                }
                argv
            }
            AgentKind::Mock => Vec::new(),
        }
    }
}
