//! Configuration management for Hero Atlas.
//!
//! Configuration is loaded from a TOML file with sensible defaults. Every
//! section implements `Default`, so a missing file or a partial file both work.
//! Secrets are referenced as `${ENV_VAR}` and resolved at client construction.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub image_search: ImageSearchConfig,
    pub enrichment: EnrichmentConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to bind
    pub bind: String,
    /// Directory served under `/static`
    pub static_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            static_dir: "web".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file path (supports `~`)
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "heroes.db".to_string(),
        }
    }
}

/// OpenAI-compatible chat completion settings. Defaults target Groq.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Chat Completions endpoint
    pub endpoint: String,
    /// API key (supports ${ENV_VAR} syntax)
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Retries after the first attempt for transient failures
    pub retry_attempts: u32,
    /// Base backoff delay, doubled per retry
    pub retry_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            api_key: "${GROQ_API_KEY}".to_string(),
            model: "llama3-70b-8192".to_string(),
            temperature: 0.7,
            max_tokens: 512,
            timeout_secs: 60,
            retry_attempts: 2,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageSearchConfig {
    /// Fall back to image search when the LLM gives no usable picture
    pub enabled: bool,
    /// Search front page used to obtain the `vqd` token
    pub endpoint: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for ImageSearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "https://duckduckgo.com/".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Descriptions with fewer words than this are regenerated
    pub min_description_words: usize,
    /// Pause between trace steps so clients can render progress
    pub trace_step_delay_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            min_description_words: 20,
            trace_step_delay_ms: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// "error", "warn", "info", "debug" or "trace"
    pub level: String,
    /// "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise from the default location.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load(),
        }
    }

    /// Platform config dir, e.g. `~/.config/hero-atlas/config.toml` on Linux.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("org", "hero-atlas", "hero-atlas")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("hero-atlas.toml"))
    }

    /// Database path with `~` expanded.
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.database.path).into_owned())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enrichment.min_description_words == 0 {
            return Err(ConfigError::ValidationError(
                "enrichment.min_description_words must be at least 1".to_string(),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "llm.model must not be empty".to_string(),
            ));
        }
        if self.llm.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "llm.endpoint must not be empty".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            )));
        }
        if self.image_search.enabled && self.image_search.endpoint.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "image_search.endpoint must not be empty when image search is enabled"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.llm.model, "llama3-70b-8192");
        assert_eq!(config.llm.max_tokens, 512);
        assert_eq!(config.enrichment.min_description_words, 20);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[database]\npath = \"/tmp/figures.db\"\n").unwrap();
        writeln!(file, "[enrichment]\nmin_description_words = 5").unwrap();
        file.flush().unwrap();

        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.database.path, "/tmp/figures.db");
        assert_eq!(config.enrichment.min_description_words, 5);
        assert_eq!(config.enrichment.trace_step_delay_ms, 200);
        assert_eq!(config.server.bind, "0.0.0.0:8000");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.enrichment.min_description_words = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = Config::default();
        config.llm.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[llm\nmodel = ").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            Config::load_from(file.path()),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_database_path_expands_tilde() {
        let mut config = Config::default();
        config.database.path = "~/heroes.db".to_string();
        let path = config.database_path();
        assert!(!path.to_string_lossy().starts_with('~'));
    }
}
