//! Runtime configuration (§4.8, §6): the invocation-type router plus agent
//! identity, workspace path, and scheduler/proactive tuning knobs. Shaped
//! like the teacher's `AppConfig` — a TOML-backed struct tree — with
//! environment-variable overrides layered on top at load time.

use std::env;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationType {
    Conversation,
    Reflection,
    Summarization,
    Extraction,
}

impl InvocationType {
    fn env_suffix(self) -> &'static str {
        match self {
            InvocationType::Conversation => "CONVERSATION",
            InvocationType::Reflection => "REFLECTION",
            InvocationType::Summarization => "SUMMARIZATION",
            InvocationType::Extraction => "EXTRACTION",
        }
    }
}

impl fmt::Display for InvocationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            InvocationType::Conversation => "conversation",
            InvocationType::Reflection => "reflection",
            InvocationType::Summarization => "summarization",
            InvocationType::Extraction => "extraction",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMode {
    Yolo,
    Print,
    Api,
}

/// A resolved route: the router's table entry for an invocation type after
/// environment overrides have been applied. Adapters never look up routing
/// themselves — they're handed one of these.
#[derive(Debug, Clone)]
pub struct Route {
    pub model: String,
    pub mode: RouteMode,
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RouteConfig {
    model: String,
    mode: RouteMode,
    timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Router {
    conversation: RouteConfig,
    reflection: RouteConfig,
    summarization: RouteConfig,
    extraction: RouteConfig,
}

impl Default for Router {
    fn default() -> Self {
        Self {
            conversation: RouteConfig {
                model: "claude-sonnet-4-5".to_string(),
                mode: RouteMode::Print,
                timeout_ms: 120_000,
            },
            reflection: RouteConfig {
                model: "claude-haiku-4-5".to_string(),
                mode: RouteMode::Print,
                timeout_ms: 60_000,
            },
            summarization: RouteConfig {
                model: "claude-haiku-4-5".to_string(),
                mode: RouteMode::Print,
                timeout_ms: 45_000,
            },
            extraction: RouteConfig {
                model: "claude-haiku-4-5".to_string(),
                mode: RouteMode::Print,
                timeout_ms: 30_000,
            },
        }
    }
}

impl Router {
    fn config_for(&self, invocation_type: InvocationType) -> &RouteConfig {
        match invocation_type {
            InvocationType::Conversation => &self.conversation,
            InvocationType::Reflection => &self.reflection,
            InvocationType::Summarization => &self.summarization,
            InvocationType::Extraction => &self.extraction,
        }
    }

    /// Resolve a route for `invocation_type`, applying
    /// `<env_prefix>_<TYPE>_MODEL` / `<env_prefix>_<TYPE>_TIMEOUT_MS`
    /// overrides. A malformed timeout override is ignored in favor of the
    /// table default rather than failing resolution.
    pub fn resolve(&self, invocation_type: InvocationType, env_prefix: &str) -> Route {
        let base = self.config_for(invocation_type);
        let suffix = invocation_type.env_suffix();

        let model = env::var(format!("{env_prefix}_{suffix}_MODEL"))
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| base.model.clone());
        let timeout_ms = env::var(format!("{env_prefix}_{suffix}_TIMEOUT_MS"))
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(base.timeout_ms);

        Route { model, mode: base.mode, timeout: Duration::from_millis(timeout_ms) }
    }
}

/// The directive-marker / env-prefix identity (§9's open-question decision:
/// one `CoreRuntime` = one identity, derived once at construction; no
/// support for recognizing multiple directive-marker spellings).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentIdentity {
    pub name: String,
}

impl Default for AgentIdentity {
    fn default() -> Self {
        Self { name: "Cogcore".to_string() }
    }
}

impl AgentIdentity {
    /// Lower-cased, whitespace-stripped token used to recognize this
    /// agent's own directive markers (§4.3).
    pub fn directive_token(&self) -> String {
        self.name.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase()
    }

    /// Upper-cased, whitespace-stripped token used as the env-var prefix
    /// for router/scheduler/proactive overrides (§6).
    pub fn env_prefix(&self) -> String {
        self.name.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_uppercase()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub min_interval_ms: u64,
    pub max_interval_ms: u64,
    pub min_reflection_gap_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: 60_000,
            max_interval_ms: 15 * 60_000,
            min_reflection_gap_ms: 5 * 60_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProactiveConfig {
    pub shadow: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub identity: AgentIdentity,
    pub workspace_path: String,
    pub router: Router,
    pub scheduler: SchedulerConfig,
    pub proactive: ProactiveConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            identity: AgentIdentity::default(),
            workspace_path: ".".to_string(),
            router: Router::default(),
            scheduler: SchedulerConfig::default(),
            proactive: ProactiveConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    pub fn resolve_route(&self, invocation_type: InvocationType) -> Route {
        self.router.resolve(invocation_type, &self.identity.env_prefix())
    }

    fn apply_env_overrides(&mut self) {
        let prefix = self.identity.env_prefix();
        if let Ok(raw) = env::var(format!("{prefix}_PROACTIVE_SHADOW")) {
            self.proactive.shadow = raw.eq_ignore_ascii_case("true");
        }
        if let Some(ms) = env::var(format!("{prefix}_REFLECTION_INTERVAL_MS")).ok().and_then(|v| v.parse().ok()) {
            self.scheduler.max_interval_ms = ms;
        }
        if let Some(ms) = env::var(format!("{prefix}_MIN_REFLECTION_GAP_MS")).ok().and_then(|v| v.parse().ok()) {
            self.scheduler.min_reflection_gap_ms = ms;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_tokens_strip_whitespace_and_case() {
        let identity = AgentIdentity { name: "Cog Core".to_string() };
        assert_eq!(identity.directive_token(), "cogcore");
        assert_eq!(identity.env_prefix(), "COGCORE");
    }

    #[test]
    fn router_falls_back_to_table_defaults_without_env() {
        let router = Router::default();
        let route = router.resolve(InvocationType::Reflection, "UNSET_PREFIX_FOR_TEST");
        assert_eq!(route.timeout, Duration::from_secs(60));
        assert_eq!(route.mode, RouteMode::Print);
    }

    #[test]
    fn router_env_override_wins_and_survives_malformed_timeout() {
        // SAFETY: test-only, single-threaded access to this process's env.
        unsafe {
            env::set_var("COGTEST_REFLECTION_MODEL", "override-model");
            env::set_var("COGTEST_REFLECTION_TIMEOUT_MS", "not-a-number");
        }
        let router = Router::default();
        let route = router.resolve(InvocationType::Reflection, "COGTEST");
        assert_eq!(route.model, "override-model");
        assert_eq!(route.timeout, Duration::from_secs(60));
        unsafe {
            env::remove_var("COGTEST_REFLECTION_MODEL");
            env::remove_var("COGTEST_REFLECTION_TIMEOUT_MS");
        }
    }
}
