//! Configuration management for AskGenie
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files and environment variables.

use crate::error::{GenieError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration structure for AskGenie
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Answer-generation service settings
    #[serde(default)]
    pub answer: AnswerConfig,

    /// Persistence backend settings
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Free-tier quota policy
    #[serde(default)]
    pub quota: QuotaConfig,

    /// Conversation texts and limits
    #[serde(default)]
    pub chat: ChatConfig,

    /// Identity used by local backends
    #[serde(default)]
    pub identity: IdentityConfig,
}

/// Answer-generation service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerConfig {
    /// Full URL of the `ask` endpoint
    #[serde(default = "default_answer_endpoint")]
    pub endpoint: String,

    /// Ask the service to include video results
    #[serde(default = "default_include_video")]
    pub include_video: bool,

    /// Client-side timeout for a single answer request (seconds)
    #[serde(default = "default_answer_timeout")]
    pub timeout_seconds: u64,
}

fn default_answer_endpoint() -> String {
    "https://smartgenei.onrender.com/ask".to_string()
}

fn default_include_video() -> bool {
    true
}

fn default_answer_timeout() -> u64 {
    60
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_answer_endpoint(),
            include_video: default_include_video(),
            timeout_seconds: default_answer_timeout(),
        }
    }
}

/// Which persistence backend to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceBackend {
    /// Local SQLite file
    #[default]
    Sqlite,
    /// Remote PostgREST-style service
    Rest,
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersistenceConfig {
    /// Backend selection
    #[serde(default)]
    pub backend: PersistenceBackend,

    /// Base URL of the remote service (rest backend)
    #[serde(default)]
    pub base_url: Option<String>,

    /// Public API key sent as the `apikey` header (rest backend)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Session token of the signed-in user (rest backend)
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,

    /// Database file location (sqlite backend); platform data dir when unset
    #[serde(default)]
    pub sqlite_path: Option<String>,
}

/// Quota policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Free messages allowed before the gate blocks
    #[serde(default = "default_policy_limit")]
    pub policy_limit: i64,

    /// Whether the gate is enforced; counting happens either way
    #[serde(default = "default_enforce")]
    pub enforce: bool,
}

fn default_policy_limit() -> i64 {
    3
}

fn default_enforce() -> bool {
    true
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            policy_limit: default_policy_limit(),
            enforce: default_enforce(),
        }
    }
}

/// Conversation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Assistant turn shown when a session has no history
    #[serde(default = "default_greeting")]
    pub greeting: String,

    /// Text of the transient pending turn
    #[serde(default = "default_thinking_text")]
    pub thinking_text: String,

    /// Assistant turn stored when the answer service fails
    #[serde(default = "default_apology_text")]
    pub apology_text: String,

    /// Title given to new sessions
    #[serde(default = "default_placeholder_title")]
    pub placeholder_title: String,

    /// Maximum characters kept when titling a session from its first message
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,

    /// Number of sessions listed as recent
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

fn default_greeting() -> String {
    "Hello! I'm your AI assistant. Ask me anything and I'll search the web to give you comprehensive answers with sources.".to_string()
}

fn default_thinking_text() -> String {
    "Searching the web for the most current information...".to_string()
}

fn default_apology_text() -> String {
    "I apologize, but I encountered an error while searching for information. Please try again."
        .to_string()
}

fn default_placeholder_title() -> String {
    "New Chat".to_string()
}

fn default_title_max_chars() -> usize {
    50
}

fn default_recent_limit() -> usize {
    10
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            greeting: default_greeting(),
            thinking_text: default_thinking_text(),
            apology_text: default_apology_text(),
            placeholder_title: default_placeholder_title(),
            title_max_chars: default_title_max_chars(),
            recent_limit: default_recent_limit(),
        }
    }
}

/// Identity configuration for the local backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Owner id used when no remote identity provider is configured
    #[serde(default = "default_owner_id")]
    pub owner_id: String,
}

fn default_owner_id() -> String {
    "local-user".to_string()
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            owner_id: default_owner_id(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment overrides
    ///
    /// A missing file is not an error: defaults are used and a warning is
    /// logged.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| GenieError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| GenieError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(endpoint) = std::env::var("ASKGENIE_ANSWER_ENDPOINT") {
            self.answer.endpoint = endpoint;
        }

        if let Ok(timeout) = std::env::var("ASKGENIE_ANSWER_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.answer.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid ASKGENIE_ANSWER_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(backend) = std::env::var("ASKGENIE_PERSISTENCE_BACKEND") {
            self.persistence.backend = match backend.to_lowercase().as_str() {
                "sqlite" => PersistenceBackend::Sqlite,
                "rest" => PersistenceBackend::Rest,
                _ => {
                    tracing::warn!("Invalid persistence backend: {}, using default", backend);
                    PersistenceBackend::default()
                }
            };
        }

        if let Ok(base_url) = std::env::var("ASKGENIE_PERSISTENCE_URL") {
            self.persistence.base_url = Some(base_url);
        }

        if let Ok(api_key) = std::env::var("ASKGENIE_API_KEY") {
            self.persistence.api_key = Some(api_key);
        }

        if let Ok(token) = std::env::var("ASKGENIE_ACCESS_TOKEN") {
            self.persistence.access_token = Some(token);
        }

        if let Ok(path) = std::env::var("ASKGENIE_SQLITE_PATH") {
            tracing::debug!(path = %path, "Env override: ASKGENIE_SQLITE_PATH");
            self.persistence.sqlite_path = Some(path);
        }

        if let Ok(limit) = std::env::var("ASKGENIE_POLICY_LIMIT") {
            if let Ok(value) = limit.parse() {
                self.quota.policy_limit = value;
            } else {
                tracing::warn!("Invalid ASKGENIE_POLICY_LIMIT: {}", limit);
            }
        }

        if let Ok(enforce) = std::env::var("ASKGENIE_ENFORCE_QUOTA") {
            self.quota.enforce = matches!(enforce.to_lowercase().as_str(), "true" | "1" | "yes");
        }

        if let Ok(owner) = std::env::var("ASKGENIE_OWNER_ID") {
            self.identity.owner_id = owner;
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.answer.endpoint.is_empty() {
            return Err(GenieError::Config("answer.endpoint cannot be empty".to_string()).into());
        }

        url::Url::parse(&self.answer.endpoint).map_err(|e| {
            GenieError::Config(format!(
                "answer.endpoint is not a valid URL ({}): {}",
                self.answer.endpoint, e
            ))
        })?;

        if self.answer.timeout_seconds == 0 {
            return Err(GenieError::Config(
                "answer.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.quota.policy_limit < 0 {
            return Err(
                GenieError::Config("quota.policy_limit cannot be negative".to_string()).into(),
            );
        }

        if self.chat.title_max_chars == 0 {
            return Err(GenieError::Config(
                "chat.title_max_chars must be greater than 0".to_string(),
            )
            .into());
        }

        if self.chat.recent_limit == 0 {
            return Err(
                GenieError::Config("chat.recent_limit must be greater than 0".to_string()).into(),
            );
        }

        if self.persistence.backend == PersistenceBackend::Rest
            && self.persistence.base_url.as_deref().unwrap_or("").is_empty()
        {
            return Err(GenieError::Config(
                "persistence.base_url is required for the rest backend".to_string(),
            )
            .into());
        }

        if self.persistence.backend == PersistenceBackend::Sqlite
            && self.identity.owner_id.trim().is_empty()
        {
            return Err(GenieError::Config(
                "identity.owner_id cannot be empty for the sqlite backend".to_string(),
            )
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.quota.policy_limit, 3);
        assert!(config.quota.enforce);
        assert_eq!(config.chat.title_max_chars, 50);
        assert_eq!(config.chat.recent_limit, 10);
        assert_eq!(config.chat.placeholder_title, "New Chat");
        assert_eq!(config.persistence.backend, PersistenceBackend::Sqlite);
        assert!(config.answer.include_video);
    }

    #[test]
    fn test_config_validation_success() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_bad_endpoint() {
        let mut config = Config::default();
        config.answer.endpoint = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_timeout() {
        let mut config = Config::default();
        config.answer.timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_negative_limit() {
        let mut config = Config::default();
        config.quota.policy_limit = -1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_rest_requires_base_url() {
        let mut config = Config::default();
        config.persistence.backend = PersistenceBackend::Rest;
        assert!(config.validate().is_err());

        config.persistence.base_url = Some("https://db.example.com".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_yaml() {
        let yaml = r#"
answer:
  endpoint: http://localhost:8000/ask
  timeout_seconds: 15

persistence:
  backend: rest
  base_url: https://db.example.com
  api_key: anon

quota:
  policy_limit: 5
  enforce: true

chat:
  placeholder_title: Untitled
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.answer.endpoint, "http://localhost:8000/ask");
        assert_eq!(config.answer.timeout_seconds, 15);
        assert!(config.answer.include_video);
        assert_eq!(config.persistence.backend, PersistenceBackend::Rest);
        assert_eq!(config.quota.policy_limit, 5);
        assert!(config.quota.enforce);
        assert_eq!(config.chat.placeholder_title, "Untitled");
        assert_eq!(config.chat.title_max_chars, 50);
    }

    #[test]
    fn test_quota_enforced_unless_opted_out() {
        let config: Config = serde_yaml::from_str("quota:\n  policy_limit: 4\n").unwrap();
        assert!(config.quota.enforce);

        let config: Config = serde_yaml::from_str("quota:\n  enforce: false\n").unwrap();
        assert!(!config.quota.enforce);
        assert_eq!(config.quota.policy_limit, 3);
    }

    #[test]
    fn test_load_nonexistent_file_uses_defaults() {
        let config = Config::load("nonexistent.yaml").unwrap();
        assert_eq!(config.chat.placeholder_title, "New Chat");
    }
}
