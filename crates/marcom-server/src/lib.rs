//! Simulation service for Marcom.
//!
//! This crate provides an Axum HTTP server that exposes:
//!
//! - **Start / pause** endpoints that register and control simulations
//! - **`WebSocket` stream** (`/api/simulations/{id}/stream`) that drives a
//!   simulation and pushes one update per event
//! - **Event history** read from the durable store
//! - **Competitor research** over a configurable web search provider
//!
//! # Architecture
//!
//! Simulations live in an in-process [`SimulationRegistry`]. Nothing runs
//! until a client opens the stream; the stream pulls events from the engine
//! one at a time, so pausing simply stops the pull at the next turn
//! boundary and a later stream resumes from the same place.
//!
//! [`SimulationRegistry`]: registry::SimulationRegistry

pub mod error;
pub mod handlers;
pub mod registry;
pub mod router;
pub mod search;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::ServiceError;
pub use registry::{ActiveSimulation, SimulationRegistry, StartOutcome};
pub use router::build_router;
pub use search::{SearchBackend, create_search};
pub use server::{ServerError, start_server};
pub use state::AppState;
pub use ws::StreamEnd;
