//! Axum router construction for the simulation service.
//!
//! Assembles all routes (REST + `WebSocket`) into a single [`Router`]
//! with CORS and request tracing.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use marcom_core::{SimulationStore, WebSearch};
use marcom_llm::TextGenerator;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the service.
///
/// The router includes:
/// - `GET /health` -- liveness
/// - `POST /api/simulations` -- start or resume
/// - `POST /api/simulations/{id}/pause` -- pause
/// - `GET /api/simulations/{id}/stream` -- `WebSocket` event stream
/// - `GET /api/simulations/{id}/events` -- persisted history
/// - `POST /api/research` -- competitor research
///
/// CORS allows any origin; the web backend that owns the simulation
/// definitions is the expected caller.
pub fn build_router<G, S, W>(state: Arc<AppState<G, S, W>>) -> Router
where
    G: TextGenerator + 'static,
    S: SimulationStore + 'static,
    W: WebSearch + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health::<G, S, W>))
        .route("/api/simulations", post(handlers::start_simulation::<G, S, W>))
        .route(
            "/api/simulations/{id}/pause",
            post(handlers::pause_simulation::<G, S, W>),
        )
        .route(
            "/api/simulations/{id}/stream",
            get(ws::stream_simulation::<G, S, W>),
        )
        .route(
            "/api/simulations/{id}/events",
            get(handlers::list_events::<G, S, W>),
        )
        .route("/api/research", post(handlers::research_competitor::<G, S, W>))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
