//! Text generation for the Marcom consumer simulation.
//!
//! Wraps the external language model behind a small surface the engine can
//! rely on:
//!
//! - [`llm`] -- the [`TextGenerator`] seam and the HTTP backends behind it
//! - [`prompt`] -- minijinja templates for every prompt the simulation sends
//! - [`parse`] -- lenient recovery of a JSON object from model output
//! - [`gate`] -- the retry-until-valid gate every structured call goes through
//! - [`config`] -- backend configuration

pub mod config;
pub mod error;
pub mod gate;
pub mod llm;
pub mod parse;
pub mod prompt;

pub use config::{BackendType, LlmBackendConfig};
pub use error::{GateError, LlmError};
pub use gate::{RetryGate, RetryPolicy, Validator};
pub use llm::{GenerationRequest, LlmBackend, ResponseFormat, TextGenerator, create_backend};
pub use prompt::{PromptEngine, PromptKind, RenderedPrompt};
