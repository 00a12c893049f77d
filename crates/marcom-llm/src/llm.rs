//! Text-generation backend abstraction and implementations.
//!
//! [`TextGenerator`] is the seam the engine talks to. Production code uses
//! [`LlmBackend`], an enum over the concrete HTTP backends; tests plug in a
//! scripted generator instead. Concrete implementations exist for
//! OpenAI-compatible APIs (`OpenAI`, `DeepSeek`, Ollama) and the Anthropic
//! Messages API. All backends communicate over HTTP via `reqwest`.
//!
//! The engine does not care which model is behind the API -- it sends a
//! prompt and expects text back, JSON when asked for JSON.

use std::future::Future;

use crate::config::{BackendType, LlmBackendConfig};
use crate::error::LlmError;
use crate::prompt::RenderedPrompt;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// The output shape a generation call asks the backend for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
    /// A single JSON object (structured calls through the retry gate).
    Json,
    /// Free-form prose (feedback, research reports).
    Text,
}

/// One call to a text generator.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// System and user messages.
    pub prompt: RenderedPrompt,
    /// Requested output shape.
    pub format: ResponseFormat,
    /// Model override; the backend's configured model when `None`.
    pub model: Option<String>,
}

impl GenerationRequest {
    /// A request for a JSON object.
    pub const fn json(prompt: RenderedPrompt) -> Self {
        Self {
            prompt,
            format: ResponseFormat::Json,
            model: None,
        }
    }

    /// A request for free-form text.
    pub const fn text(prompt: RenderedPrompt) -> Self {
        Self {
            prompt,
            format: ResponseFormat::Text,
            model: None,
        }
    }

    /// Route the request to a specific model.
    #[must_use]
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

// ---------------------------------------------------------------------------
// Generator trait
// ---------------------------------------------------------------------------

/// Anything that turns a prompt into text.
pub trait TextGenerator: Send + Sync {
    /// Send `request` and return the raw response text.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::LlmBackend`] if the call fails or the response
    /// body does not carry any text.
    fn complete(
        &self,
        request: &GenerationRequest,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;
}

// ---------------------------------------------------------------------------
// Unified backend enum
// ---------------------------------------------------------------------------

/// An LLM backend that can process a prompt and return a response.
///
/// Uses enum dispatch so the server can hold one concrete generator type
/// regardless of which API is configured.
pub enum LlmBackend {
    /// OpenAI-compatible chat completions API.
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
}

impl LlmBackend {
    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
        }
    }
}

impl TextGenerator for LlmBackend {
    async fn complete(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        match self {
            Self::OpenAi(backend) => backend.complete(request).await,
            Self::Anthropic(backend) => backend.complete(request).await,
        }
    }
}

/// Connection settings shared by both HTTP backends.
struct HttpSettings {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl HttpSettings {
    fn new(config: &LlmBackendConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    fn model_for<'a>(&'a self, request: &'a GenerationRequest) -> &'a str {
        request.model.as_deref().unwrap_or(&self.model)
    }
}

/// Read a non-success response into a backend error.
async fn error_from_status(provider: &str, response: reqwest::Response) -> LlmError {
    let status = response.status();
    let error_body = response
        .text()
        .await
        .unwrap_or_else(|_| "unable to read error body".to_owned());
    LlmError::LlmBackend(format!("{provider} returned {status}: {error_body}"))
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend
// ---------------------------------------------------------------------------

/// Backend for OpenAI-compatible chat completions APIs.
///
/// Works with `OpenAI`, `DeepSeek`, and Ollama endpoints.
/// Sends requests to `{api_url}/chat/completions`.
pub struct OpenAiBackend {
    http: HttpSettings,
}

impl OpenAiBackend {
    /// Create a new `OpenAI`-compatible backend.
    pub fn new(config: &LlmBackendConfig) -> Self {
        Self {
            http: HttpSettings::new(config),
        }
    }

    /// Send a prompt and return the response text.
    async fn complete(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.http.api_url);

        let mut body = serde_json::json!({
            "model": self.http.model_for(request),
            "messages": [
                {"role": "system", "content": request.prompt.system},
                {"role": "user", "content": request.prompt.user}
            ],
            "temperature": self.http.temperature,
            "max_tokens": self.http.max_tokens,
        });
        if request.format == ResponseFormat::Json
            && let Some(obj) = body.as_object_mut()
        {
            obj.insert(
                "response_format".to_owned(),
                serde_json::json!({"type": "json_object"}),
            );
        }

        let response = self
            .http
            .client
            .post(&url)
            .bearer_auth(&self.http.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::LlmBackend(format!("OpenAI request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(error_from_status("OpenAI", response).await);
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::LlmBackend(format!("OpenAI response parse failed: {e}")))?;

        extract_openai_content(&json)
    }
}

/// Extract the text content from an `OpenAI` chat completions response.
fn extract_openai_content(json: &serde_json::Value) -> Result<String, LlmError> {
    json.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            LlmError::LlmBackend("OpenAI response missing choices[0].message.content".to_owned())
        })
}

// ---------------------------------------------------------------------------
// Anthropic Messages API backend
// ---------------------------------------------------------------------------

/// Backend for the Anthropic Messages API.
///
/// The system prompt is a top-level field, authentication uses the
/// `x-api-key` header, and text comes back in `content[0].text`. There is no
/// JSON mode, so structured calls rely on the template's instructions and
/// the lenient extractor.
pub struct AnthropicBackend {
    http: HttpSettings,
}

impl AnthropicBackend {
    /// Create a new Anthropic Messages API backend.
    pub fn new(config: &LlmBackendConfig) -> Self {
        Self {
            http: HttpSettings::new(config),
        }
    }

    /// Send a prompt and return the response text.
    async fn complete(&self, request: &GenerationRequest) -> Result<String, LlmError> {
        let url = format!("{}/messages", self.http.api_url);

        let body = serde_json::json!({
            "model": self.http.model_for(request),
            "max_tokens": self.http.max_tokens,
            "temperature": self.http.temperature,
            "system": request.prompt.system,
            "messages": [
                {"role": "user", "content": request.prompt.user}
            ]
        });

        let response = self
            .http
            .client
            .post(&url)
            .header("x-api-key", &self.http.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::LlmBackend(format!("Anthropic request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(error_from_status("Anthropic", response).await);
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::LlmBackend(format!("Anthropic response parse failed: {e}")))?;

        extract_anthropic_content(&json)
    }
}

/// Extract the text content from an Anthropic Messages API response.
fn extract_anthropic_content(json: &serde_json::Value) -> Result<String, LlmError> {
    json.get("content")
        .and_then(|c| c.get(0))
        .and_then(|b| b.get("text"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| LlmError::LlmBackend("Anthropic response missing content[0].text".to_owned()))
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Create an LLM backend from configuration.
pub fn create_backend(config: &LlmBackendConfig) -> LlmBackend {
    match config.backend_type {
        BackendType::OpenAi => LlmBackend::OpenAi(OpenAiBackend::new(config)),
        BackendType::Anthropic => LlmBackend::Anthropic(AnthropicBackend::new(config)),
    }
}
