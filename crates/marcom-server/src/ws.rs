//! `WebSocket` handler for streaming a simulation's events.
//!
//! Clients connect to `GET /api/simulations/{id}/stream` and receive one
//! JSON-encoded [`SimulationUpdate`] per event. Opening the stream is what
//! drives the engine: events are produced on demand, persisted, and sent.
//! The stream closes normally when the simulation pauses or completes; a
//! completed simulation is removed from the registry.
//!
//! Only one stream may drive a simulation at a time. The engine is claimed
//! before the upgrade, so a second client gets `409 Conflict`.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::Response;
use marcom_core::{SimulationStore, WebSearch};
use marcom_llm::TextGenerator;
use marcom_types::{SimulationId, SimulationUpdate};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::error::ServiceError;
use crate::registry::EngineGuard;
use crate::state::AppState;

/// Updates buffered between the engine and the socket.
const STREAM_BUFFER: usize = 16;

/// Why a stream stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The pause flag was set; the simulation stays registered.
    Paused,
    /// A bounded run completed; the simulation was removed.
    Finished,
    /// The receiving side went away.
    Disconnected,
    /// The engine returned an error; the cursor did not move past it.
    Failed,
}

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming the simulation's events.
///
/// # Route
///
/// `GET /api/simulations/{id}/stream`
pub async fn stream_simulation<G, S, W>(
    ws: WebSocketUpgrade,
    Path(id): Path<i64>,
    State(state): State<Arc<AppState<G, S, W>>>,
) -> Result<Response, ServiceError>
where
    G: TextGenerator + 'static,
    S: SimulationStore + 'static,
    W: WebSearch + 'static,
{
    let id = SimulationId::new(id);
    let active = state
        .registry
        .get(id)
        .await
        .ok_or_else(|| ServiceError::NotFound(format!("No simulation {id} in the system")))?;
    let engine = active.claim().ok_or_else(|| {
        ServiceError::Conflict(format!("Simulation {id} is already being streamed"))
    })?;

    Ok(ws.on_upgrade(move |socket| handle_ws(socket, state, id, engine)))
}

/// Run the engine and the socket side by side until either finishes.
async fn handle_ws<G, S, W>(
    mut socket: WebSocket,
    state: Arc<AppState<G, S, W>>,
    id: SimulationId,
    engine: EngineGuard<G, S>,
) where
    G: TextGenerator,
    S: SimulationStore,
    W: WebSearch,
{
    debug!(simulation_id = %id, "WebSocket client connected");
    let (tx, mut rx) = mpsc::channel::<SimulationUpdate>(STREAM_BUFFER);

    let producer = drive(&state, id, engine, tx);
    let consumer = async {
        while let Some(update) = rx.recv().await {
            let json = match serde_json::to_string(&update) {
                Ok(j) => j,
                Err(e) => {
                    warn!("Failed to serialize simulation update: {e}");
                    continue;
                }
            };
            if socket.send(Message::Text(json.into())).await.is_err() {
                debug!(simulation_id = %id, "WebSocket client disconnected (send failed)");
                return;
            }
        }
    };

    let (end, ()) = tokio::join!(producer, consumer);
    info!(simulation_id = %id, end = ?end, "stream closed");
    let _ = socket.send(Message::Close(None)).await;
}

/// Pull events from `engine` and hand them to `tx` until the simulation
/// pauses, completes, fails, or the receiver is dropped.
///
/// An event whose send fails has already been persisted; it is in the
/// history but was not delivered on this stream.
pub async fn drive<G, S, W>(
    state: &AppState<G, S, W>,
    id: SimulationId,
    mut engine: EngineGuard<G, S>,
    tx: mpsc::Sender<SimulationUpdate>,
) -> StreamEnd
where
    G: TextGenerator,
    S: SimulationStore,
    W: WebSearch,
{
    debug!(
        simulation_id = %id,
        cycle = engine.cycle(),
        total_cycles = engine.total_cycles(),
        "driving simulation"
    );
    loop {
        match engine.next_event().await {
            Ok(Some(event)) => {
                if tx.send(SimulationUpdate::from(&event)).await.is_err() {
                    return StreamEnd::Disconnected;
                }
            }
            Ok(None) if engine.is_finished() => {
                drop(engine);
                state.registry.remove(id).await;
                return StreamEnd::Finished;
            }
            Ok(None) => return StreamEnd::Paused,
            Err(e) => {
                error!(simulation_id = %id, error = %e, "simulation step failed");
                return StreamEnd::Failed;
            }
        }
    }
}
