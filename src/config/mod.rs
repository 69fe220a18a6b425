//! Configuration loading.
//!
//! Resolution order, later wins:
//! 1. Built-in defaults ([`Config::default`])
//! 2. TOML file: explicit path, else `<config_dir>/codescribe/config.toml`
//! 3. Environment variables (`RETRY_ATTEMPTS`, `PRIMARY_MODEL`, …)

pub mod schema;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::review::AgentKind;

pub use schema::{AgentToggles, BackendConfig, Config, DEFAULT_BASE_URL, DEFAULT_PRIMARY_MODEL};

/// Environment variable toggling each agent.
const AGENT_TOGGLE_VARS: &[(&str, AgentKind)] = &[
    ("ENABLE_SECURITY_AGENT", AgentKind::Security),
    ("ENABLE_PERFORMANCE_AGENT", AgentKind::Performance),
    ("ENABLE_CODE_QUALITY_AGENT", AgentKind::CodeQuality),
    ("ENABLE_DOCUMENTATION_AGENT", AgentKind::Documentation),
    ("ENABLE_TESTING_AGENT", AgentKind::Testing),
];

/// Default config file location (`~/.config/codescribe/config.toml` on Linux).
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "codescribe", "codescribe")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Config {
    /// Load from file and process environment.
    ///
    /// A missing default file is not an error; a missing explicit file is.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match default_config_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse TOML text; absent keys keep their defaults.
    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply environment overrides read through `lookup`.
    ///
    /// Boolean toggles are true only for the literal `"true"`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ENABLE_AGENTIC_REVIEW") {
            self.enable_agentic_review = v == "true";
        }
        if let Some(v) = lookup("MAX_FILES_PER_REVIEW") {
            self.max_files_per_review = parse_var("MAX_FILES_PER_REVIEW", &v)?;
        }
        if let Some(v) = lookup("MAX_TOKENS_PER_REQUEST") {
            self.max_tokens_per_request = parse_var("MAX_TOKENS_PER_REQUEST", &v)?;
        }
        if let Some(v) = lookup("RETRY_ATTEMPTS") {
            self.retry_attempts = parse_var("RETRY_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("PRIMARY_MODEL").filter(|v| !v.is_empty()) {
            self.primary_model = v;
        }
        if let Some(v) = lookup("FALLBACK_MODEL") {
            self.fallback_model = Some(v).filter(|m| !m.is_empty());
        }
        if let Some(v) = lookup("TEMPERATURE") {
            self.temperature = parse_var("TEMPERATURE", &v)?;
        }
        for (var, kind) in AGENT_TOGGLE_VARS {
            if let Some(v) = lookup(var) {
                self.agents.set(*kind, v == "true");
            }
        }
        if let Some(v) = lookup("COMPLETION_BASE_URL").filter(|v| !v.is_empty()) {
            self.backend.base_url = v;
        }
        if self.backend.api_key.is_none() {
            self.backend.api_key = lookup("GROQ_API_KEY").filter(|k| !k.is_empty());
        }
        Ok(())
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.primary_model.trim().is_empty() {
            anyhow::bail!("primary_model must not be empty");
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            anyhow::bail!(
                "temperature must be within [0, 2], got {}",
                self.temperature
            );
        }
        if self.backend.base_url.trim().is_empty() {
            anyhow::bail!("backend.base_url must not be empty");
        }
        Ok(())
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {name}: '{value}'"))
}

// ── Tests ────────────────────────────────────────────────────────
