use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SomniaError};

/// Top-level configuration for the Somnia service.
///
/// Loaded from `~/.somnia/config.toml` by default. Every section falls back
/// to its defaults when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SomniaConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl SomniaConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SomniaConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, using defaults when the file does
    /// not exist. A file that exists but fails to parse or validate is an error.
    pub fn load_if_present(path: &Path) -> Result<Self> {
        if !path.exists() {
            warn!("No config file at {}. Using defaults.", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject combinations the engine cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.chat.context_turns == 0 {
            return Err(SomniaError::Config(
                "chat.context_turns must be at least 1".into(),
            ));
        }
        if self.chat.max_message_chars == 0 {
            return Err(SomniaError::Config(
                "chat.max_message_chars must be at least 1".into(),
            ));
        }
        if self.chat.context_char_budget < self.chat.max_message_chars {
            return Err(SomniaError::Config(format!(
                "chat.context_char_budget ({}) is smaller than chat.max_message_chars ({})",
                self.chat.context_char_budget, self.chat.max_message_chars
            )));
        }
        if self.llm.max_attempts == 0 {
            return Err(SomniaError::Config(
                "llm.max_attempts must be at least 1".into(),
            ));
        }
        if self.llm.backoff_multiplier < 1.0 {
            return Err(SomniaError::Config(
                "llm.backoff_multiplier must be >= 1.0".into(),
            ));
        }
        if self.analytics.top_topics == 0 {
            return Err(SomniaError::Config(
                "analytics.top_topics must be at least 1".into(),
            ));
        }
        if self.analytics.default_days == 0 || self.analytics.default_days > self.analytics.max_days
        {
            return Err(SomniaError::Config(format!(
                "analytics.default_days must be within 1..={}",
                self.analytics.max_days
            )));
        }
        if self.rate_limit.window_secs == 0 {
            return Err(SomniaError::Config(
                "rate_limit.window_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// General service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory holding the SQLite database.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
    /// Address the API server binds to.
    pub host: String,
    /// API server port.
    pub port: u16,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.somnia/data".to_string(),
            log_level: "info".to_string(),
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Chat orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Whether the chat endpoint accepts turns.
    pub enabled: bool,
    /// Longest accepted user message, in characters.
    pub max_message_chars: usize,
    /// Most recent history messages sent to the LLM.
    pub context_turns: usize,
    /// Upper bound on the characters of history sent to the LLM.
    pub context_char_budget: usize,
    /// Reply persisted when every LLM attempt fails.
    pub fallback_response: String,
    /// Fixed preamble sent ahead of the history.
    pub system_prompt: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_message_chars: 2000,
            context_turns: 10,
            context_char_budget: 12_000,
            fallback_response: "I'm sorry, I'm having trouble answering right now. \
                                Please try again in a moment."
                .to_string(),
            system_prompt: "You are a knowledgeable sleep science assistant. \
                            Provide accurate, evidence-based information about sleep, \
                            sleep disorders, circadian rhythms, and sleep hygiene. \
                            Encourage users to consult a healthcare professional \
                            for medical concerns."
                .to_string(),
        }
    }
}

/// External LLM service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Messages endpoint URL.
    pub endpoint: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// API key. Usually supplied through SOMNIA_LLM_API_KEY instead.
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Per-attempt timeout.
    pub request_timeout_secs: u64,
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-3-sonnet-20240229".to_string(),
            api_key: None,
            max_tokens: 1024,
            temperature: 0.7,
            request_timeout_secs: 30,
            max_attempts: 3,
            initial_backoff_ms: 500,
            backoff_multiplier: 2.0,
            max_backoff_ms: 8_000,
        }
    }
}

/// Analytics query settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// Window used when a request omits `days`.
    pub default_days: u32,
    /// Largest accepted window.
    pub max_days: u32,
    /// Entries in `top_topics`.
    pub top_topics: usize,
    /// Entries in a user's `favorite_topics`.
    pub favorite_topics: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            default_days: 30,
            max_days: 365,
            top_topics: 5,
            favorite_topics: 3,
        }
    }
}

/// Fixed-window request limiter settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Requests allowed per client per window.
    pub max_requests: u64,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_requests: 100,
            window_secs: 3600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = SomniaConfig::default();
        assert_eq!(config.general.port, 8000);
        assert_eq!(config.chat.max_message_chars, 2000);
        assert_eq!(config.chat.context_turns, 10);
        assert_eq!(config.llm.max_attempts, 3);
        assert_eq!(config.analytics.default_days, 30);
        assert_eq!(config.analytics.top_topics, 5);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_valid_config() {
        let content = r#"
[general]
data_dir = "/custom/data"
log_level = "debug"
port = 9000

[chat]
context_turns = 6
context_char_budget = 4000

[llm]
model = "test-model"
max_attempts = 5
backoff_multiplier = 1.5

[analytics]
top_topics = 3
"#;
        let file = create_temp_config(content);
        let config = SomniaConfig::load(file.path()).unwrap();
        assert_eq!(config.general.data_dir, "/custom/data");
        assert_eq!(config.general.port, 9000);
        assert_eq!(config.chat.context_turns, 6);
        assert_eq!(config.chat.context_char_budget, 4000);
        assert_eq!(config.llm.model, "test-model");
        assert_eq!(config.llm.max_attempts, 5);
        assert_eq!(config.analytics.top_topics, 3);
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[general]
log_level = "warn"
"#;
        let file = create_temp_config(content);
        let config = SomniaConfig::load(file.path()).unwrap();
        assert_eq!(config.general.log_level, "warn");
        // Remaining fields use defaults
        assert_eq!(config.chat.max_message_chars, 2000);
        assert_eq!(config.llm.request_timeout_secs, 30);
    }

    #[test]
    fn test_load_if_present_missing_file() {
        let config = SomniaConfig::load_if_present(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.general.data_dir, "~/.somnia/data");
    }

    #[test]
    fn test_load_if_present_surfaces_invalid_file() {
        let file = create_temp_config("[chat]\ncontext_turns = 0\n");
        let err = SomniaConfig::load_if_present(file.path()).unwrap_err();
        assert!(matches!(err, SomniaError::Config(_)));
        assert!(err.to_string().contains("context_turns"));
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("[chat\ncontext_turns = ");
        let err = SomniaConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, SomniaError::Config(_)));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let file = create_temp_config("[chat]\ncontext_turns = 0\n");
        let err = SomniaConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("context_turns"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = SomniaConfig::default();
        config.llm.max_attempts = 7;
        config.save(&path).unwrap();

        let reloaded = SomniaConfig::load(&path).unwrap();
        assert_eq!(reloaded.llm.max_attempts, 7);
        assert_eq!(reloaded.chat.system_prompt, config.chat.system_prompt);
    }

    // =========================================================================
    // Validation
    // =========================================================================

    #[test]
    fn test_validate_budget_smaller_than_message() {
        let mut config = SomniaConfig::default();
        config.chat.context_char_budget = 100;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("context_char_budget"));
    }

    #[test]
    fn test_validate_zero_attempts() {
        let mut config = SomniaConfig::default();
        config.llm.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_shrinking_backoff() {
        let mut config = SomniaConfig::default();
        config.llm.backoff_multiplier = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_default_days_out_of_range() {
        let mut config = SomniaConfig::default();
        config.analytics.default_days = 400;
        assert!(config.validate().is_err());
        config.analytics.default_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_top_topics() {
        let mut config = SomniaConfig::default();
        config.analytics.top_topics = 0;
        assert!(config.validate().is_err());
    }
}
