//! Configuration loading, validation, and management for toolrelay.
//!
//! Loads configuration from `~/.toolrelay/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! Sampling temperature is intentionally absent: every tool-calling round
//! runs at temperature 0.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.toolrelay/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the completion endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Which flavour of completion endpoint to talk to
    #[serde(default)]
    pub provider: ProviderKind,

    /// Base URL (OpenAI-compatible) or resource endpoint (Azure)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Azure API version
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Model name, or deployment name for Azure
    #[serde(default = "default_model")]
    pub model: String,

    /// MCP tool host endpoint
    #[serde(default = "default_mcp_url")]
    pub mcp_url: String,

    /// Maximum model calls per exchange
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// How conflicting tool-call fragments are resolved
    #[serde(default)]
    pub merge_policy: ConflictPolicy,

    /// Replaces the built-in system prompt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

/// Completion endpoint flavour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Azure,
    Custom,
}

/// What to do when two fragments for the same tool call disagree on its id,
/// name or type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    #[default]
    LastWriteWins,
    Strict,
}

fn default_api_version() -> String {
    "2025-01-01-preview".into()
}
fn default_model() -> String {
    "gpt-4o".into()
}
fn default_mcp_url() -> String {
    "http://localhost:8006/mcp".into()
}
fn default_max_rounds() -> u32 {
    25
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("api_url", &self.api_url)
            .field("api_version", &self.api_version)
            .field("model", &self.model)
            .field("mcp_url", &self.mcp_url)
            .field("max_rounds", &self.max_rounds)
            .field("merge_policy", &self.merge_policy)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.toolrelay/config.toml).
    ///
    /// Also checks environment variables for the API key:
    /// - `TOOLRELAY_API_KEY` (highest priority)
    /// - `OPENAI_API_KEY`
    /// - `AZURE_OPENAI_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::read_file(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without env overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse the file at `path`; defaults if it does not exist.
    fn read_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(config)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.api_key.is_none() {
            self.api_key = lookup("TOOLRELAY_API_KEY")
                .or_else(|| lookup("OPENAI_API_KEY"))
                .or_else(|| lookup("AZURE_OPENAI_API_KEY"));
        }

        if let Some(model) = lookup("TOOLRELAY_MODEL") {
            self.model = model;
        }

        if let Some(url) = lookup("TOOLRELAY_MCP_URL") {
            self.mcp_url = url;
        }

        if let Some(url) = lookup("TOOLRELAY_API_URL") {
            self.api_url = Some(url);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".toolrelay")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "max_rounds must be at least 1".into(),
            ));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::ValidationError("model must not be empty".into()));
        }

        if !self.mcp_url.starts_with("http://") && !self.mcp_url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "mcp_url must be an http(s) URL, got {}",
                self.mcp_url
            )));
        }

        if matches!(self.provider, ProviderKind::Azure | ProviderKind::Custom)
            && self.api_url.is_none()
        {
            return Err(ConfigError::ValidationError(
                "api_url is required for azure and custom providers".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: ProviderKind::default(),
            api_url: None,
            api_version: default_api_version(),
            model: default_model(),
            mcp_url: default_mcp_url(),
            max_rounds: default_max_rounds(),
            merge_policy: ConflictPolicy::default(),
            system_prompt: None,
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
