use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_FILE_PATH: &str = "relay.toml";

pub const DEFAULT_API_BASE: &str = "https://api.anthropic.com";
pub const DEFAULT_API_VERSION: &str = "2023-06-01";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-0";
/// Largest accepted `max_response_bytes`.
pub const MAX_RESPONSE_BYTES_LIMIT: usize = 64 * 1024 * 1024;
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a friendly assistant answering questions in a group chat. \
     Keep your replies brief. Today's date is {date}.";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("Invalid value for {name}: {value}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Process-wide settings for the relay, read once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    #[serde(skip_serializing)]
    pub api_key: String,
    pub api_base: String,
    pub api_version: String,
    pub model: String,
    pub max_tokens: u32,
    /// `{date}` is replaced with the current date on every request.
    pub system_prompt: String,
    pub reasoning_enabled: bool,
    pub reasoning_budget_tokens: u32,
    pub web_search_enabled: bool,
    pub web_search_max_uses: u32,
    /// History capacity in turns; must be even.
    pub max_turns: usize,
    pub cooldown_secs: u64,
    pub max_response_bytes: usize,
    pub response_margin: usize,
    pub request_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1024,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            reasoning_enabled: false,
            reasoning_budget_tokens: 512,
            web_search_enabled: false,
            web_search_max_uses: 3,
            max_turns: 20,
            cooldown_secs: 5,
            max_response_bytes: 1024 * 1024,
            response_margin: 100,
            request_timeout_secs: 60,
        }
    }
}

fn parse_bool_env(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "y" | "on"
    )
}

fn parse_num_env<T: std::str::FromStr>(
    name: &'static str,
    value: String,
) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}

impl RelayConfig {
    /// Load defaults, then the TOML file (explicit path, else `relay.toml` if
    /// present), then environment overrides, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(CONFIG_FILE_PATH).exists() => {
                Self::from_file(Path::new(CONFIG_FILE_PATH))?
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Apply overrides from a variable lookup, normally `std::env::var`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("AI_API_KEY").or_else(|| lookup("ANTHROPIC_API_KEY")) {
            self.api_key = key;
        }
        if let Some(base) = lookup("AI_API_BASE") {
            self.api_base = base;
        }
        if let Some(model) = lookup("AI_MODEL") {
            self.model = model;
        }
        if let Some(value) = lookup("AI_MAX_TOKENS") {
            self.max_tokens = parse_num_env("AI_MAX_TOKENS", value)?;
        }
        if let Some(value) = lookup("AI_REASONING") {
            self.reasoning_enabled = parse_bool_env(&value);
        }
        if let Some(value) = lookup("AI_REASONING_BUDGET") {
            self.reasoning_budget_tokens = parse_num_env("AI_REASONING_BUDGET", value)?;
        }
        if let Some(value) = lookup("AI_WEB_SEARCH") {
            self.web_search_enabled = parse_bool_env(&value);
        }
        if let Some(value) = lookup("AI_WEB_SEARCH_MAX_USES") {
            self.web_search_max_uses = parse_num_env("AI_WEB_SEARCH_MAX_USES", value)?;
        }
        if let Some(value) = lookup("RELAY_MAX_TURNS") {
            self.max_turns = parse_num_env("RELAY_MAX_TURNS", value)?;
        }
        if let Some(value) = lookup("RELAY_COOLDOWN_SECS") {
            self.cooldown_secs = parse_num_env("RELAY_COOLDOWN_SECS", value)?;
        }
        if let Some(value) = lookup("RELAY_MAX_RESPONSE_BYTES") {
            self.max_response_bytes = parse_num_env("RELAY_MAX_RESPONSE_BYTES", value)?;
        }
        if let Some(value) = lookup("RELAY_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_num_env("RELAY_REQUEST_TIMEOUT_SECS", value)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "API key is not set (AI_API_KEY or ANTHROPIC_API_KEY)".to_string(),
            ));
        }
        if self.max_turns == 0 || self.max_turns % 2 != 0 {
            return Err(ConfigError::Invalid(format!(
                "max_turns must be a positive even number, got {}",
                self.max_turns
            )));
        }
        if self.max_tokens == 0 {
            return Err(ConfigError::Invalid("max_tokens must be positive".to_string()));
        }
        if self.reasoning_enabled
            && (self.reasoning_budget_tokens == 0
                || self.reasoning_budget_tokens >= self.max_tokens)
        {
            return Err(ConfigError::Invalid(format!(
                "reasoning_budget_tokens ({}) must be positive and below max_tokens ({})",
                self.reasoning_budget_tokens, self.max_tokens
            )));
        }
        if self.web_search_enabled && self.web_search_max_uses == 0 {
            return Err(ConfigError::Invalid(
                "web_search_max_uses must be positive when web search is enabled".to_string(),
            ));
        }
        if self.max_response_bytes <= self.response_margin {
            return Err(ConfigError::Invalid(format!(
                "max_response_bytes ({}) must exceed response_margin ({})",
                self.max_response_bytes, self.response_margin
            )));
        }
        if self.max_response_bytes > MAX_RESPONSE_BYTES_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "max_response_bytes ({}) must not exceed {}",
                self.max_response_bytes, MAX_RESPONSE_BYTES_LIMIT
            )));
        }
        Ok(())
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.api_base.trim_end_matches('/'))
    }
}
