//! Error types for the simulation engine.

use marcom_llm::{GateError, LlmError};
use marcom_types::AgentId;

/// Errors raised while driving a simulation or a research request.
///
/// Malformed generations never show up here; the retry gate absorbs them.
/// What remains are infrastructure failures and misconfiguration.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The durable store rejected a read or write.
    #[error("store error: {0}")]
    Store(String),

    /// A bounded retry policy ran out of attempts.
    #[error(transparent)]
    Generation(#[from] GateError),

    /// A prompt template failed to render.
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// The web search collaborator failed.
    #[error("search error: {0}")]
    Search(String),

    /// A turn referred to an agent that is not on the roster.
    #[error("agent {0} is not part of this simulation")]
    UnknownAgent(AgentId),
}
