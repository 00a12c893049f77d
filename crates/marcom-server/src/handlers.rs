//! REST API endpoint handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness and active simulation count |
//! | `POST` | `/api/simulations` | Start or resume a simulation |
//! | `POST` | `/api/simulations/{id}/pause` | Pause at the next turn boundary |
//! | `GET` | `/api/simulations/{id}/events` | Persisted event history |
//! | `POST` | `/api/research` | Competitor research for one product |

use std::collections::HashSet;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use marcom_core::{SimulationStore, WebSearch};
use marcom_llm::TextGenerator;
use marcom_types::{
    AgentAttribute, AgentId, AgentProfile, Event, Product, ProductId, SimulationDefinition,
    SimulationId,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;
use crate::registry::StartOutcome;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request and response bodies
// ---------------------------------------------------------------------------

/// One agent in a start request.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentPayload {
    /// Agent identifier, unique within the simulation.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Third-person description.
    #[serde(alias = "description")]
    pub desc: String,
    /// Ordered key/value attributes.
    #[serde(default, alias = "attributes")]
    pub attrs: Vec<AgentAttribute>,
    /// Model override for this agent.
    #[serde(default)]
    pub model: Option<String>,
}

/// One product in a start or research request.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductPayload {
    /// Product identifier.
    #[serde(default)]
    pub id: i64,
    /// Product name.
    pub name: String,
    /// Product description.
    #[serde(alias = "description")]
    pub desc: String,
    /// Selling price in ringgit.
    pub price: Decimal,
    /// Cost to the seller in ringgit.
    #[serde(default)]
    pub cost: Decimal,
}

impl ProductPayload {
    fn into_product(self, simulation_id: SimulationId) -> Product {
        Product {
            id: ProductId::new(self.id),
            simulation_id,
            name: self.name,
            description: self.desc,
            price: self.price,
            cost: self.cost,
        }
    }
}

/// Body of `POST /api/simulations`.
#[derive(Debug, Clone, Deserialize)]
pub struct StartRequest {
    /// Simulation identifier.
    pub id: i64,
    /// Market environment description.
    #[serde(alias = "environment")]
    pub env_desc: String,
    /// Agents in turn order.
    #[serde(default)]
    pub agents: Vec<AgentPayload>,
    /// Products on offer.
    #[serde(default)]
    pub products: Vec<ProductPayload>,
    /// Cycles to run; negative means unbounded. Defaults to the configured
    /// value when absent.
    #[serde(default)]
    pub total_cycles: Option<i64>,
}

impl StartRequest {
    /// Validate and convert into an engine definition.
    fn into_definition(self, default_total_cycles: i64) -> Result<SimulationDefinition, ServiceError> {
        let mut agent_ids = HashSet::new();
        if let Some(dup) = self.agents.iter().find(|a| !agent_ids.insert(a.id)) {
            return Err(ServiceError::InvalidRequest(format!(
                "duplicate agent id {}",
                dup.id
            )));
        }
        let mut product_ids = HashSet::new();
        if let Some(dup) = self.products.iter().find(|p| !product_ids.insert(p.id)) {
            return Err(ServiceError::InvalidRequest(format!(
                "duplicate product id {}",
                dup.id
            )));
        }

        let id = SimulationId::new(self.id);
        Ok(SimulationDefinition {
            id,
            environment: self.env_desc,
            agents: self
                .agents
                .into_iter()
                .map(|a| AgentProfile {
                    id: AgentId::new(a.id),
                    name: a.name,
                    description: a.desc,
                    attributes: a.attrs,
                    model: a.model,
                })
                .collect(),
            products: self
                .products
                .into_iter()
                .map(|p| p.into_product(id))
                .collect(),
            total_cycles: self.total_cycles.unwrap_or(default_total_cycles),
        })
    }
}

/// Response of `POST /api/simulations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartResponse {
    /// Human-readable outcome.
    pub message: String,
    /// Whether an already-registered simulation was resumed.
    pub resumed: bool,
}

/// Response of the pause endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PauseResponse {
    /// Human-readable outcome.
    pub message: String,
}

/// Response of `POST /api/research`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResponse {
    /// The web search query that was run.
    pub query: String,
    /// The competitor report.
    pub report: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`
pub async fn health<G, S, W>(State(state): State<Arc<AppState<G, S, W>>>) -> Json<serde_json::Value>
where
    G: TextGenerator,
    S: SimulationStore,
    W: WebSearch,
{
    Json(serde_json::json!({
        "status": "ok",
        "active_simulations": state.registry.len().await,
    }))
}

/// `POST /api/simulations`
///
/// Registers the simulation, or resumes it if the id is already active (in
/// which case the body's roster is ignored). The engine does not run until
/// a client opens the stream.
pub async fn start_simulation<G, S, W>(
    State(state): State<Arc<AppState<G, S, W>>>,
    Json(request): Json<StartRequest>,
) -> Result<Json<StartResponse>, ServiceError>
where
    G: TextGenerator,
    S: SimulationStore,
    W: WebSearch,
{
    let definition = request.into_definition(state.default_total_cycles)?;
    let outcome = state.registry.start(definition, &state.ctx).await;
    let response = match outcome {
        StartOutcome::Created => StartResponse {
            message: String::from(
                "Simulation added, open the stream to initialise and run it",
            ),
            resumed: false,
        },
        StartOutcome::Resumed => StartResponse {
            message: String::from(
                "Simulation already running, resumed; open the stream to listen to updates",
            ),
            resumed: true,
        },
    };
    Ok(Json(response))
}

/// `POST /api/simulations/{id}/pause`
pub async fn pause_simulation<G, S, W>(
    State(state): State<Arc<AppState<G, S, W>>>,
    Path(id): Path<i64>,
) -> Result<Json<PauseResponse>, ServiceError>
where
    G: TextGenerator,
    S: SimulationStore,
    W: WebSearch,
{
    if state.registry.pause(SimulationId::new(id)).await {
        Ok(Json(PauseResponse {
            message: String::from("Pausing the simulation gracefully..."),
        }))
    } else {
        Err(ServiceError::NotFound(format!(
            "No simulation {id} in the system, was it started?"
        )))
    }
}

/// `GET /api/simulations/{id}/events`
///
/// Reads the durable log, so history is available for completed and
/// never-streamed simulations alike.
pub async fn list_events<G, S, W>(
    State(state): State<Arc<AppState<G, S, W>>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Event>>, ServiceError>
where
    G: TextGenerator,
    S: SimulationStore,
    W: WebSearch,
{
    let events = state.ctx.store.list_events(SimulationId::new(id)).await?;
    Ok(Json(events))
}

/// `POST /api/research`
pub async fn research_competitor<G, S, W>(
    State(state): State<Arc<AppState<G, S, W>>>,
    Json(request): Json<ProductPayload>,
) -> Result<Json<ResearchResponse>, ServiceError>
where
    G: TextGenerator,
    S: SimulationStore,
    W: WebSearch,
{
    if request.name.trim().is_empty() {
        return Err(ServiceError::InvalidRequest(String::from(
            "product name must not be empty",
        )));
    }
    // Standalone research is not tied to a simulation.
    let product = request.into_product(SimulationId::new(0));
    let report = state.researcher.research(&product).await?;
    Ok(Json(ResearchResponse {
        query: report.query,
        report: report.report,
    }))
}
