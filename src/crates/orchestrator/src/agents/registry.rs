//! Agent registry: cached `(role, name)` configurations
//!
//! Resolving a config is cheap, but callers hit the registry on every node
//! execution; the cache keeps resolution stable for the life of a process
//! (a workflow sees the same reviewer set on every round).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::agents::adapters::{AgentConfig, AgentKind, AgentRole};
use crate::config::Settings;

/// The fixed reviewer slots, in fan-out order. Generic slot names keep
/// checkpoint surfaces stable while display names identify the tool.
const REVIEWER_SLOTS: [(&str, &str, AgentKind); 3] = [
    ("reviewer_1", "Claude Reviewer", AgentKind::Claude),
    ("reviewer_2", "Codex Reviewer", AgentKind::Codex),
    ("reviewer_3", "Gemini Reviewer", AgentKind::Gemini),
];

/// Cache of resolved agent configurations.
pub struct AgentRegistry {
    settings: Arc<Settings>,
    agents: RwLock<HashMap<(String, String), Arc<AgentConfig>>>,
}

impl AgentRegistry {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            settings,
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Get or create the configuration for `(role, name)`.
    pub async fn get(
        &self,
        role: AgentRole,
        name: &str,
        workspace_path: Option<&Path>,
    ) -> Arc<AgentConfig> {
        let key = (role.as_str().to_string(), name.to_string());

        if let Some(config) = self.agents.read().await.get(&key) {
            return Arc::clone(config);
        }

        let config = Arc::new(AgentConfig::resolve(
            name,
            role,
            &self.settings,
            workspace_path.map(Path::to_path_buf),
        ));
        debug!(role = %role, name = %name, kind = %config.kind, "created agent configuration");

        self.agents
            .write()
            .await
            .entry(key)
            .or_insert_with(|| Arc::clone(&config));
        config
    }

    /// The planner agent used by the plan-review workflow.
    pub async fn planning_agent(&self, workspace_path: Option<&Path>) -> Arc<AgentConfig> {
        self.get(AgentRole::Planning, "claude_planner", workspace_path)
            .await
    }

    /// The ordered reviewer triple for one fan-out round.
    pub async fn review_agents(&self, workspace_path: Option<&Path>) -> Vec<Arc<AgentConfig>> {
        let mut reviewers = Vec::with_capacity(REVIEWER_SLOTS.len());
        for (name, display_name, kind) in REVIEWER_SLOTS {
            let key = (AgentRole::Review.as_str().to_string(), name.to_string());
            if let Some(config) = self.agents.read().await.get(&key) {
                reviewers.push(Arc::clone(config));
                continue;
            }

            let kind = if self.settings.use_mock_agents {
                AgentKind::Mock
            } else {
                kind
            };
            let config = Arc::new(AgentConfig::for_kind(
                name,
                display_name,
                AgentRole::Review,
                kind,
                &self.settings,
                workspace_path.map(Path::to_path_buf),
            ));
            self.agents
                .write()
                .await
                .insert(key, Arc::clone(&config));
            reviewers.push(config);
        }
        reviewers
    }

    /// The summary agent for feedback consolidation.
    pub async fn summary_agent(&self, workspace_path: Option<&Path>) -> Arc<AgentConfig> {
        self.get(AgentRole::Summary, "claude_summary", workspace_path)
            .await
    }

    /// Drain the cache. Subsequent lookups re-resolve from settings.
    pub async fn stop_all(&self) {
        let mut agents = self.agents.write().await;
        info!(count = agents.len(), "stopping all cached agents");
        agents.clear();
    }

    /// Workspace path fallback used by workflows without an explicit one.
    pub fn default_workspace(&self) -> PathBuf {
        PathBuf::from(&self.settings.working_directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(use_mocks: bool) -> AgentRegistry {
        AgentRegistry::new(Arc::new(Settings {
            use_mock_agents: use_mocks,
            ..Settings::default()
        }))
    }

    #[tokio::test]
    async fn test_get_caches_by_role_and_name() {
        let registry = registry(true);
        let first = registry.get(AgentRole::Planning, "claude_planner", None).await;
        let second = registry.get(AgentRole::Planning, "claude_planner", None).await;
        assert!(Arc::ptr_eq(&first, &second));

        // Same name under a different role is a distinct entry.
        let reviewer = registry.get(AgentRole::Review, "claude_planner", None).await;
        assert!(!Arc::ptr_eq(&first, &reviewer));
        assert_eq!(reviewer.timeout_seconds, 300);
    }

    #[tokio::test]
    async fn test_review_agents_fixed_ordered_triple() {
        let registry = registry(false);
        let reviewers = registry.review_agents(None).await;

        assert_eq!(reviewers.len(), 3);
        assert_eq!(reviewers[0].name, "reviewer_1");
        assert_eq!(reviewers[1].name, "reviewer_2");
        assert_eq!(reviewers[2].name, "reviewer_3");
        assert_eq!(reviewers[0].kind, AgentKind::Claude);
        assert_eq!(reviewers[1].kind, AgentKind::Codex);
        assert_eq!(reviewers[2].kind, AgentKind::Gemini);
        assert_eq!(reviewers[0].display_name, "Claude Reviewer");

        // Second call returns the cached configs in the same order.
        let again = registry.review_agents(None).await;
        for (a, b) in reviewers.iter().zip(again.iter()) {
            assert!(Arc::ptr_eq(a, b));
        }
    }

    #[tokio::test]
    async fn test_mock_setting_downgrades_reviewers() {
        let registry = registry(true);
        let reviewers = registry.review_agents(None).await;
        assert!(reviewers.iter().all(|r| r.kind == AgentKind::Mock));
    }

    #[tokio::test]
    async fn test_stop_all_drains_cache() {
        let registry = registry(true);
        let first = registry.get(AgentRole::General, "helper", None).await;
        registry.stop_all().await;
        let second = registry.get(AgentRole::General, "helper", None).await;
        assert!(!Arc::ptr_eq(&first, &second));
    }
}
