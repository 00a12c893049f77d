//! Configuration types for text-generation backends.

use serde::Deserialize;

use crate::error::LlmError;

/// Configuration for a single LLM backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LlmBackendConfig {
    /// The backend wire protocol.
    pub backend_type: BackendType,
    /// Base API URL (e.g. `http://localhost:11434/v1` for Ollama).
    pub api_url: String,
    /// API key for authentication. Ollama ignores it.
    pub api_key: String,
    /// Default model identifier (e.g. `llama3`).
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens per completion.
    pub max_tokens: u32,
}

impl Default for LlmBackendConfig {
    fn default() -> Self {
        Self {
            backend_type: BackendType::OpenAi,
            api_url: String::from("http://localhost:11434/v1"),
            api_key: String::new(),
            model: String::from("llama3"),
            temperature: 0.7,
            max_tokens: 1024,
        }
    }
}

/// Supported LLM backend types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// `OpenAI`-compatible API (works with `OpenAI`, `DeepSeek`, Ollama).
    #[serde(alias = "ollama", alias = "deepseek")]
    OpenAi,
    /// Anthropic Messages API (different request format).
    #[serde(alias = "claude")]
    Anthropic,
}

impl BackendType {
    /// Parse a backend name as written in environment variables.
    pub fn parse(s: &str) -> Result<Self, LlmError> {
        match s.to_lowercase().as_str() {
            "openai" | "deepseek" | "ollama" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            other => Err(LlmError::Config(format!("unknown backend type: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_type_parsing() {
        assert_eq!(BackendType::parse("Ollama").ok(), Some(BackendType::OpenAi));
        assert_eq!(BackendType::parse("claude").ok(), Some(BackendType::Anthropic));
        assert!(BackendType::parse("gemini").is_err());
    }

    #[test]
    fn defaults_target_local_ollama() {
        let config = LlmBackendConfig::default();
        assert_eq!(config.backend_type, BackendType::OpenAi);
        assert_eq!(config.model, "llama3");
        assert!(config.api_url.contains("11434"));
    }
}
