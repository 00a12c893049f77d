//! Shared application state for the simulation service.

use marcom_core::{EngineContext, Researcher, SimulationStore, WebSearch};
use marcom_llm::TextGenerator;

use crate::registry::SimulationRegistry;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`](std::sync::Arc) and injected via Axum's `State`
/// extractor. Generic over the text generator, the store, and the search
/// provider so routes can be exercised in-process without network access.
pub struct AppState<G, S, W> {
    /// Simulations this process is running.
    pub registry: SimulationRegistry<G, S>,
    /// Collaborators handed to every new simulation.
    pub ctx: EngineContext<G, S>,
    /// Competitor research pipeline.
    pub researcher: Researcher<G, W>,
    /// Total cycles used when a start request omits them.
    pub default_total_cycles: i64,
}

impl<G, S, W> AppState<G, S, W>
where
    G: TextGenerator,
    S: SimulationStore,
    W: WebSearch,
{
    /// Create the application state with an empty registry.
    pub fn new(
        ctx: EngineContext<G, S>,
        researcher: Researcher<G, W>,
        default_total_cycles: i64,
    ) -> Self {
        Self {
            registry: SimulationRegistry::new(),
            ctx,
            researcher,
            default_total_cycles,
        }
    }
}
