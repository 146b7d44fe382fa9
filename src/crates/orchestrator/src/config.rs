//! Runtime configuration
//!
//! Settings load in three layers: serde defaults, an optional TOML file, and
//! `CONDUCTOR_*` environment variables (highest precedence). The API fields
//! are read by the external HTTP layer; nothing in this crate serves them.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

/// Orchestrator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Deployment environment
    pub environment: Environment,

    /// Bind host for the external API layer
    pub api_host: String,

    /// Bind port for the external API layer
    pub api_port: u16,

    /// Allowed CORS origins for the external API layer
    pub cors_origins: Vec<String>,

    /// Path to the SQLite database file
    pub database_path: String,

    /// Use in-process mock agents instead of real CLI tools
    pub use_mock_agents: bool,

    /// Default agent timeout in seconds
    pub agent_timeout: u64,

    /// Timeout for planning-role agents in seconds
    pub planning_agent_timeout: u64,

    /// Timeout for review-role agents in seconds
    pub review_agent_timeout: u64,

    /// Timeout for summary-role agents in seconds
    pub summary_agent_timeout: u64,

    /// Path to the Claude CLI binary
    pub claude_cli_path: String,

    /// Path to the Codex CLI binary
    pub codex_cli_path: String,

    /// Path to the Gemini CLI binary
    pub gemini_cli_path: String,

    /// Default workspace directory for agent subprocesses
    pub working_directory: String,

    /// Log level filter (tracing syntax)
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            environment: Environment::Development,
            api_host: "0.0.0.0".to_string(),
            api_port: 3030,
            cors_origins: vec!["http://localhost:5173".to_string()],
            database_path: "data/conductor.db".to_string(),
            use_mock_agents: true,
            agent_timeout: 300,
            planning_agent_timeout: 600,
            review_agent_timeout: 300,
            summary_agent_timeout: 180,
            claude_cli_path: "claude".to_string(),
            codex_cli_path: "codex".to_string(),
            gemini_cli_path: "gemini".to_string(),
            working_directory: "./workspace".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load settings from a TOML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| OrchestratorError::Config(format!("failed to read config file: {e}")))?;
        let mut settings: Settings = toml::from_str(&raw)
            .map_err(|e| OrchestratorError::Config(format!("failed to parse config file: {e}")))?;
        settings.apply_env();
        Ok(settings)
    }

    /// Defaults plus environment overrides; no file required.
    pub fn from_env() -> Self {
        let mut settings = Settings::default();
        settings.apply_env();
        settings
    }

    /// Timeout in seconds for a given agent role.
    pub fn timeout_for_role(&self, role: &str) -> u64 {
        match role {
            "planning" => self.planning_agent_timeout,
            "review" => self.review_agent_timeout,
            "summary" => self.summary_agent_timeout,
            _ => self.agent_timeout,
        }
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("CONDUCTOR_ENVIRONMENT") {
            if v.eq_ignore_ascii_case("production") {
                self.environment = Environment::Production;
            } else if v.eq_ignore_ascii_case("development") {
                self.environment = Environment::Development;
            }
        }
        if let Ok(v) = std::env::var("CONDUCTOR_API_HOST") {
            self.api_host = v;
        }
        if let Ok(v) = std::env::var("CONDUCTOR_API_PORT") {
            if let Ok(port) = v.parse() {
                self.api_port = port;
            }
        }
        if let Ok(v) = std::env::var("CONDUCTOR_CORS_ORIGINS") {
            let origins = Self::parse_origin_list(&v);
            if !origins.is_empty() {
                self.cors_origins = origins;
            }
        }
        if let Ok(v) = std::env::var("CONDUCTOR_DATABASE_PATH") {
            self.database_path = v;
        }
        if let Ok(v) = std::env::var("CONDUCTOR_USE_MOCK_AGENTS") {
            self.use_mock_agents = matches!(v.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        Self::override_seconds("CONDUCTOR_AGENT_TIMEOUT", &mut self.agent_timeout);
        Self::override_seconds(
            "CONDUCTOR_PLANNING_AGENT_TIMEOUT",
            &mut self.planning_agent_timeout,
        );
        Self::override_seconds(
            "CONDUCTOR_REVIEW_AGENT_TIMEOUT",
            &mut self.review_agent_timeout,
        );
        Self::override_seconds(
            "CONDUCTOR_SUMMARY_AGENT_TIMEOUT",
            &mut self.summary_agent_timeout,
        );
        if let Ok(v) = std::env::var("CONDUCTOR_CLAUDE_CLI_PATH") {
            self.claude_cli_path = v;
        }
        if let Ok(v) = std::env::var("CONDUCTOR_CODEX_CLI_PATH") {
            self.codex_cli_path = v;
        }
        if let Ok(v) = std::env::var("CONDUCTOR_GEMINI_CLI_PATH") {
            self.gemini_cli_path = v;
        }
        if let Ok(v) = std::env::var("CONDUCTOR_WORKING_DIRECTORY") {
            self.working_directory = v;
        }
        if let Ok(v) = std::env::var("CONDUCTOR_LOG_LEVEL") {
            self.log_level = v;
        }
    }

    fn override_seconds(var: &str, field: &mut u64) {
        if let Ok(v) = std::env::var(var) {
            if let Ok(seconds) = v.parse() {
                *field = seconds;
            }
        }
    }

    /// Comma-separated origin list; empty entries and blank input dropped.
    fn parse_origin_list(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.environment, Environment::Development);
        assert!(settings.use_mock_agents);
        assert_eq!(settings.agent_timeout, 300);
        assert_eq!(settings.cors_origins, vec!["http://localhost:5173"]);
    }

    #[test]
    fn test_timeout_for_role() {
        let settings = Settings::default();
        assert_eq!(settings.timeout_for_role("planning"), 600);
        assert_eq!(settings.timeout_for_role("review"), 300);
        assert_eq!(settings.timeout_for_role("summary"), 180);
        assert_eq!(settings.timeout_for_role("general"), 300);
    }

    #[test]
    fn test_parse_origin_list() {
        assert_eq!(
            Settings::parse_origin_list("http://a.test, http://b.test ,"),
            vec!["http://a.test", "http://b.test"]
        );
        assert!(Settings::parse_origin_list("   ").is_empty());
    }

    #[test]
    fn test_toml_round_trip() {
        let toml_str = r#"
            environment = "production"
            use_mock_agents = false
            agent_timeout = 120
        "#;
        let settings: Settings = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.environment, Environment::Production);
        assert!(!settings.use_mock_agents);
        assert_eq!(settings.agent_timeout, 120);
        // unspecified fields fall back to defaults
        assert_eq!(settings.api_port, 3030);
    }
}
