//! Error types for the simulation service.
//!
//! [`ServiceError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use marcom_core::CoreError;

/// Errors that can occur in the service layer.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// The requested simulation is not registered.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request body is well-formed JSON but describes an invalid
    /// simulation or product.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Another consumer is already streaming the simulation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The engine, store, or a collaborator failed.
    #[error("internal error: {0}")]
    Internal(#[from] CoreError),
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(e) => {
                tracing::error!(error = %e, "request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = match self {
            Self::NotFound(msg) | Self::InvalidRequest(msg) | Self::Conflict(msg) => msg,
            Self::Internal(e) => e.to_string(),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
