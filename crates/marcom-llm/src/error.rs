//! Error types for the text-generation layer.
//!
//! Uses `thiserror` for typed errors that surface through the generation
//! pipeline: backend calls, prompt rendering, response parsing, and the
//! retry gate.

/// Errors raised by backends, templates, and response parsing.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Failed to render a prompt template.
    #[error("template render error: {0}")]
    Template(String),

    /// An LLM backend returned an error or was unreachable.
    #[error("LLM backend error: {0}")]
    LlmBackend(String),

    /// The LLM response could not be parsed into a JSON object.
    #[error("response parse error: {0}")]
    Parse(String),

    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// Serialization or deserialization failure.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Errors returned by the [`RetryGate`](crate::gate::RetryGate).
///
/// Under the default unbounded policy the gate never gives up, so callers
/// only observe these when a bounded [`RetryPolicy`](crate::gate::RetryPolicy)
/// is configured.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// The retry policy ran out of attempts before a valid response arrived.
    #[error("no valid response after {attempts} attempts (last failure: {last_failure})")]
    AttemptsExhausted {
        /// Number of generator calls made.
        attempts: u32,
        /// Why the final attempt was rejected.
        last_failure: String,
    },
}
