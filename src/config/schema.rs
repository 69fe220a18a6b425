use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::review::AgentKind;

/// Default Groq OpenAI-compatible endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Default primary model.
pub const DEFAULT_PRIMARY_MODEL: &str = "mixtral-8x7b-32768";

// ── Top-level config ─────────────────────────────────────────────

/// Review engine configuration.
///
/// Built once per process (defaults → TOML file → environment) and passed
/// by value into the review pipeline, which keeps its own snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// Master switch; when false the caller skips the agentic review.
    pub enable_agentic_review: bool,

    /// Per-agent toggles.
    pub agents: AgentToggles,

    /// Changed-file count above which the caller warns that some files may
    /// not be reviewed.
    pub max_files_per_review: usize,

    /// Rough token budget of the diff embedded in one request.
    pub max_tokens_per_request: usize,

    /// Retries after the first attempt for transient backend failures.
    pub retry_attempts: u32,

    /// Model used for every agent request.
    pub primary_model: String,

    /// Model tried once after the primary model's retries are exhausted.
    pub fallback_model: Option<String>,

    /// Sampling temperature.
    pub temperature: f64,

    /// Maximum length of a single posted comment, in characters.
    pub max_comment_length: usize,

    /// Completion backend connection settings.
    pub backend: BackendConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enable_agentic_review: true,
            agents: AgentToggles::default(),
            max_files_per_review: 20,
            max_tokens_per_request: 30_000,
            retry_attempts: 3,
            primary_model: DEFAULT_PRIMARY_MODEL.into(),
            fallback_model: None,
            temperature: 0.1,
            max_comment_length: 8_000,
            backend: BackendConfig::default(),
        }
    }
}

impl Config {
    /// Agent kinds whose toggle is on, in declaration order.
    pub fn enabled_agents(&self) -> Vec<AgentKind> {
        AgentKind::ALL
            .into_iter()
            .filter(|kind| self.agents.is_enabled(*kind))
            .collect()
    }
}

// ── Agent toggles ────────────────────────────────────────────────

/// Enable flags for each review agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct AgentToggles {
    pub security: bool,
    pub performance: bool,
    pub code_quality: bool,
    pub documentation: bool,
    pub testing: bool,
}

impl Default for AgentToggles {
    fn default() -> Self {
        Self {
            security: true,
            performance: true,
            code_quality: true,
            documentation: true,
            testing: true,
        }
    }
}

impl AgentToggles {
    /// All agents off.
    pub fn none() -> Self {
        Self {
            security: false,
            performance: false,
            code_quality: false,
            documentation: false,
            testing: false,
        }
    }

    /// Only the listed agents on.
    pub fn only(kinds: &[AgentKind]) -> Self {
        let mut toggles = Self::none();
        for kind in kinds {
            toggles.set(*kind, true);
        }
        toggles
    }

    pub fn is_enabled(&self, kind: AgentKind) -> bool {
        match kind {
            AgentKind::Security => self.security,
            AgentKind::Performance => self.performance,
            AgentKind::CodeQuality => self.code_quality,
            AgentKind::Documentation => self.documentation,
            AgentKind::Testing => self.testing,
        }
    }

    pub fn set(&mut self, kind: AgentKind, enabled: bool) {
        let slot = match kind {
            AgentKind::Security => &mut self.security,
            AgentKind::Performance => &mut self.performance,
            AgentKind::CodeQuality => &mut self.code_quality,
            AgentKind::Documentation => &mut self.documentation,
            AgentKind::Testing => &mut self.testing,
        };
        *slot = enabled;
    }
}

// ── Backend ──────────────────────────────────────────────────────

/// Connection settings for the OpenAI-compatible completion backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BackendConfig {
    /// Name used in logs.
    pub name: String,
    /// Base URL of the chat-completions API (without `/chat/completions`).
    pub base_url: String,
    /// Bearer token. Falls back to `GROQ_API_KEY` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            name: "groq".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}
