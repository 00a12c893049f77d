//! Configuration loading and typed config structures.
//!
//! The configuration lives in `marcom-config.yaml` (path overridable with
//! `MARCOM_CONFIG`). Every section and field has a default, so an absent
//! file or an empty one yields a working local setup: SQLite in the working
//! directory and an Ollama server on localhost.
//!
//! Environment variables override the file:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `DATABASE_URL` | `database.url` |
//! | `DB_FILE` | `database.url` as `sqlite://<file>?mode=rwc` (when `DATABASE_URL` is unset) |
//! | `MODEL` | `llm.model` |
//! | `LLM_BACKEND` | `llm.backend_type` |
//! | `LLM_API_URL` | `llm.api_url` |
//! | `LLM_API_KEY` | `llm.api_key` |
//! | `PORT` / `GRPC_CONNECTION_PORT` | `server.port` |
//! | `SEARCH_API_KEY` | `research.api_key` |

use std::path::Path;
use std::time::Duration;

use marcom_llm::{BackendType, LlmBackendConfig, RetryPolicy};
use serde::Deserialize;
use tracing::warn;

use crate::memory::DEFAULT_MEMORY_WINDOW;

/// Default config file name.
pub const DEFAULT_CONFIG_PATH: &str = "marcom-config.yaml";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MarcomConfig {
    /// HTTP listener.
    #[serde(default)]
    pub server: ServerConfig,
    /// Durable store.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Text-generation backend and retry policy.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Competitor research.
    #[serde(default)]
    pub research: ResearchConfig,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Engine tuning.
    #[serde(default)]
    pub engine: EngineConfig,
}

impl MarcomConfig {
    /// Load from `MARCOM_CONFIG` or [`DEFAULT_CONFIG_PATH`], then apply
    /// environment overrides. A missing file yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path =
            std::env::var("MARCOM_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
        let path = Path::new(&path);
        let mut config = if path.is_file() {
            Self::from_file(path)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a YAML file without environment overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Override fields from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Override fields from `lookup`, which maps a variable name to its
    /// value.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = url;
        } else if let Some(file) = lookup("DB_FILE") {
            self.database.url = format!("sqlite://{file}?mode=rwc");
        }
        if let Some(model) = lookup("MODEL") {
            self.llm.backend.model = model;
        }
        if let Some(backend) = lookup("LLM_BACKEND") {
            match BackendType::parse(&backend) {
                Ok(backend_type) => self.llm.backend.backend_type = backend_type,
                Err(e) => warn!(error = %e, "ignoring LLM_BACKEND"),
            }
        }
        if let Some(url) = lookup("LLM_API_URL") {
            self.llm.backend.api_url = url;
        }
        if let Some(key) = lookup("LLM_API_KEY") {
            self.llm.backend.api_key = key;
        }
        if let Some(port) = lookup("PORT").or_else(|| lookup("GRPC_CONNECTION_PORT")) {
            match port.trim().parse() {
                Ok(port) => self.server.port = port,
                Err(e) => warn!(value = %port, error = %e, "ignoring invalid port override"),
            }
        }
        if let Some(key) = lookup("SEARCH_API_KEY") {
            self.research.api_key = key;
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 50051,
        }
    }
}

/// Durable store settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection string.
    pub url: String,
    /// Maximum pool connections.
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::from("sqlite://marcom.db?mode=rwc"),
            max_connections: 5,
        }
    }
}

/// Text-generation settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend connection.
    #[serde(flatten)]
    pub backend: LlmBackendConfig,
    /// Directory of `.j2` files overriding the built-in prompt templates.
    pub templates_dir: Option<String>,
    /// Gate attempt limit; unset retries forever.
    pub max_attempts: Option<u32>,
    /// Pause between rejected attempts, in milliseconds.
    pub retry_backoff_ms: u64,
}

impl LlmConfig {
    /// The retry policy these settings describe.
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            backend: LlmBackendConfig::default(),
            templates_dir: None,
            max_attempts: None,
            retry_backoff_ms: 0,
        }
    }
}

/// Which web search provider research uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProvider {
    /// `DuckDuckGo` instant-answer API. No key required.
    DuckDuckGo,
    /// `SerpApi` Google results. Requires `api_key`.
    SerpApi,
}

/// Competitor research settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Search provider.
    pub provider: SearchProvider,
    /// Provider API key, if the provider needs one.
    pub api_key: String,
    /// Maximum search results fed into a report.
    pub max_results: usize,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            provider: SearchProvider::DuckDuckGo,
            api_key: String::new(),
            max_results: 25,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: LogFormat::Pretty,
        }
    }
}

/// Engine tuning.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Agent memory window size.
    pub memory_window: usize,
    /// Total cycles used when a start request omits them; negative means
    /// unbounded.
    pub default_total_cycles: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory_window: DEFAULT_MEMORY_WINDOW,
            default_total_cycles: -1,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn empty_yaml_gives_defaults() {
        let config = MarcomConfig::parse("").unwrap();
        assert_eq!(config, MarcomConfig::default());
        assert_eq!(config.engine.memory_window, 30);
        assert_eq!(config.llm.retry_policy(), RetryPolicy::unbounded());
    }

    #[test]
    fn parse_partial_yaml() {
        let yaml = r"
server:
  port: 8080
llm:
  backend_type: anthropic
  model: claude-sonnet
  max_attempts: 5
  retry_backoff_ms: 250
research:
  provider: serpapi
logging:
  format: json
";
        let config = MarcomConfig::parse(yaml).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.llm.backend.backend_type, BackendType::Anthropic);
        assert_eq!(config.llm.backend.model, "claude-sonnet");
        assert_eq!(
            config.llm.retry_policy(),
            RetryPolicy::bounded(5).with_backoff(Duration::from_millis(250))
        );
        assert_eq!(config.research.provider, SearchProvider::SerpApi);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.database, DatabaseConfig::default());
    }

    #[test]
    fn env_overrides_win() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DB_FILE", "sims.db"),
            ("MODEL", "llama3.1"),
            ("GRPC_CONNECTION_PORT", "6000"),
            ("SEARCH_API_KEY", "secret"),
        ]);
        let mut config = MarcomConfig::default();
        config.apply_overrides(|name| env.get(name).map(|v| (*v).to_owned()));

        assert_eq!(config.database.url, "sqlite://sims.db?mode=rwc");
        assert_eq!(config.llm.backend.model, "llama3.1");
        assert_eq!(config.server.port, 6000);
        assert_eq!(config.research.api_key, "secret");
    }

    #[test]
    fn database_url_beats_db_file_and_bad_port_is_ignored() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("DATABASE_URL", "sqlite::memory:"),
            ("DB_FILE", "ignored.db"),
            ("PORT", "not-a-port"),
        ]);
        let mut config = MarcomConfig::default();
        config.apply_overrides(|name| env.get(name).map(|v| (*v).to_owned()));

        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.server.port, 50051);
    }
}
