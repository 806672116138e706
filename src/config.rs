//! Assistant configuration loading and validation.
//!
//! Reads `site-assistant.yaml` (if present), resolves `${VAR}` /
//! `${VAR:-default}` references, then applies environment overrides:
//!
//! | Variable          | Field              |
//! |-------------------|--------------------|
//! | `OPENAI_API_KEY`  | `model.api_key`    |
//! | `OPENAI_MODEL`    | `model.model`      |
//! | `OPENAI_BASE_URL` | `model.base_url`   |
//! | `PORT`            | `server.port`      |
//!
//! A `.env` file in the working directory is loaded first.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::inference::RetryPolicy;

// ─── Constants ───────────────────────────────────────────────────────────────

/// File name searched for when no explicit path is given.
pub const CONFIG_FILE_NAME: &str = "site-assistant.yaml";

/// Env var that points directly at a config file.
pub const CONFIG_PATH_ENV: &str = "SITE_ASSISTANT_CONFIG";

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("failed to parse config: {reason}")]
    Parse { reason: String },

    #[error("invalid config: {reason}")]
    Invalid { reason: String },
}

// ─── Public Types ────────────────────────────────────────────────────────────

/// Top-level configuration (mirrors `site-assistant.yaml`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub model: ModelSettings,
    pub server: ServerSettings,
    pub site: SiteSettings,
    pub agent: AgentSettings,
}

/// Remote model endpoint and sampling parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "gpt-4o-mini".into(),
            base_url: "https://api.openai.com/v1".into(),
            temperature: 0.7,
            max_tokens: 4000,
            timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

/// Where site URLs come from and how pages are cached.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    /// URL list or sitemap files. Relative paths resolve against the config file.
    pub url_lists: Vec<PathBuf>,
    pub cache_max_entries: usize,
    /// Replaces the built-in system prompt when set.
    pub system_prompt: Option<String>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            url_lists: Vec::new(),
            cache_max_entries: 1000,
            system_prompt: None,
        }
    }
}

/// Conversation loop limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub max_iterations: usize,
    pub history_window: usize,
    /// Conversations kept in memory; the least recently active is dropped first.
    pub max_sessions: usize,
    pub retry: RetrySettings,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            history_window: 10,
            max_sessions: 1000,
            retry: RetrySettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 5000,
        }
    }
}

impl RetrySettings {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

// ─── Loading ─────────────────────────────────────────────────────────────────

/// Locate the config file.
///
/// 1. `SITE_ASSISTANT_CONFIG`, if it names an existing file.
/// 2. `site-assistant.yaml` in `start` or any parent directory.
pub fn find_config_path(start: &Path) -> Option<PathBuf> {
    if let Ok(explicit) = std::env::var(CONFIG_PATH_ENV) {
        let candidate = PathBuf::from(expand_tilde(&explicit));
        if candidate.is_file() {
            return Some(candidate);
        }
        tracing::warn!(path = %candidate.display(), "SITE_ASSISTANT_CONFIG does not name a file");
    }

    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(CONFIG_FILE_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Load configuration from `explicit` or the discovered file, then apply
/// environment overrides and validate. The binary loads `.env` before this.
pub fn load_config(explicit: Option<&Path>) -> Result<AssistantConfig, ConfigError> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => std::env::current_dir()
            .ok()
            .and_then(|cwd| find_config_path(&cwd)),
    };

    let mut config = match &path {
        Some(p) => load_config_file(p)?,
        None => {
            tracing::info!("no config file found, using defaults");
            AssistantConfig::default()
        }
    };

    config.apply_overrides(|key| std::env::var(key).ok());
    config.validate()?;
    Ok(config)
}

/// Parse a single config file, resolving relative URL list paths.
pub fn load_config_file(path: &Path) -> Result<AssistantConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut config = parse_config(&raw)?;

    if let Some(base) = path.parent() {
        for list in &mut config.site.url_lists {
            if list.is_relative() {
                *list = base.join(&*list);
            }
        }
    }

    tracing::info!(path = %path.display(), "loaded config");
    Ok(config)
}

/// Parse YAML text after env-var interpolation. Empty text yields defaults.
pub fn parse_config(raw: &str) -> Result<AssistantConfig, ConfigError> {
    let interpolated = interpolate_env_vars(raw);
    if interpolated.trim().is_empty() {
        return Ok(AssistantConfig::default());
    }
    serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
        reason: e.to_string(),
    })
}

impl AssistantConfig {
    /// Apply environment overrides through `lookup` (injectable for tests).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("OPENAI_API_KEY") {
            self.model.api_key = key;
        }
        if let Some(model) = non_empty("OPENAI_MODEL") {
            self.model.model = model;
        }
        if let Some(url) = non_empty("OPENAI_BASE_URL") {
            self.model.base_url = url;
        }
        if let Some(port) = non_empty("PORT") {
            match port.trim().parse() {
                Ok(p) => self.server.port = p,
                Err(_) => tracing::warn!(value = %port, "ignoring unparseable PORT"),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::Invalid {
                reason: "agent.max_iterations must be at least 1".into(),
            });
        }
        if self.agent.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid {
                reason: "agent.retry.max_attempts must be at least 1".into(),
            });
        }
        if self.agent.history_window == 0 {
            return Err(ConfigError::Invalid {
                reason: "agent.history_window must be at least 1".into(),
            });
        }
        if self.agent.max_sessions == 0 {
            return Err(ConfigError::Invalid {
                reason: "agent.max_sessions must be at least 1".into(),
            });
        }
        Ok(())
    }
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

fn resolve_var_expr(expr: &str) -> String {
    match expr.split_once(":-") {
        Some((name, default)) => std::env::var(name).unwrap_or_else(|_| expand_tilde(default)),
        None => std::env::var(expr).unwrap_or_default(),
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
