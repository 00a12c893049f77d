//! The active-simulation registry.
//!
//! A keyed map with insert-if-absent semantics. Starting an id that is
//! already registered resumes it instead of building a new one, and the
//! caller's roster is ignored. A simulation leaves the registry only when a
//! bounded run has completed, never on pause.
//!
//! Each entry guards its engine with an async mutex. Whoever holds the
//! guard is the simulation's one driving consumer; a second stream attempt
//! fails fast instead of waiting.

use std::collections::HashMap;
use std::sync::Arc;

use marcom_core::{EngineContext, Simulation, SimulationControl, SimulationStore};
use marcom_llm::TextGenerator;
use marcom_types::{SimulationDefinition, SimulationId};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::info;

/// Exclusive access to a simulation's engine, held for the life of one
/// stream.
pub type EngineGuard<G, S> = OwnedMutexGuard<Simulation<G, S>>;

/// One registered simulation.
pub struct ActiveSimulation<G, S> {
    control: Arc<SimulationControl>,
    engine: Arc<Mutex<Simulation<G, S>>>,
}

impl<G, S> ActiveSimulation<G, S> {
    /// The pause control shared with the engine.
    pub fn control(&self) -> &SimulationControl {
        &self.control
    }

    /// Claim the engine for streaming, or `None` if another consumer is
    /// already driving it.
    pub fn claim(&self) -> Option<EngineGuard<G, S>> {
        Arc::clone(&self.engine).try_lock_owned().ok()
    }
}

/// Whether a start request built a simulation or resumed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new simulation was registered.
    Created,
    /// The id was already registered; its pause flag was cleared.
    Resumed,
}

/// All simulations this process is running.
pub struct SimulationRegistry<G, S> {
    active: RwLock<HashMap<SimulationId, Arc<ActiveSimulation<G, S>>>>,
}

impl<G, S> SimulationRegistry<G, S>
where
    G: TextGenerator,
    S: SimulationStore,
{
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            active: RwLock::new(HashMap::new()),
        }
    }

    /// Register `definition` unless its id is already active, in which case
    /// the existing simulation is resumed.
    pub async fn start(
        &self,
        definition: SimulationDefinition,
        ctx: &EngineContext<G, S>,
    ) -> StartOutcome {
        let mut active = self.active.write().await;
        if let Some(existing) = active.get(&definition.id) {
            existing.control.resume();
            info!(simulation_id = %definition.id, "simulation resumed");
            return StartOutcome::Resumed;
        }

        let id = definition.id;
        let agents = definition.agents.len();
        let simulation = Simulation::new(definition, ctx.clone());
        let entry = ActiveSimulation {
            control: simulation.control(),
            engine: Arc::new(Mutex::new(simulation)),
        };
        active.insert(id, Arc::new(entry));
        info!(simulation_id = %id, agents, "simulation registered");
        StartOutcome::Created
    }

    /// Look up an active simulation.
    pub async fn get(&self, id: SimulationId) -> Option<Arc<ActiveSimulation<G, S>>> {
        self.active.read().await.get(&id).cloned()
    }

    /// Set the pause flag of `id`. Returns `false` if it is not active.
    pub async fn pause(&self, id: SimulationId) -> bool {
        let Some(sim) = self.get(id).await else {
            return false;
        };
        sim.control.pause();
        info!(simulation_id = %id, "simulation pause requested");
        true
    }

    /// Drop a completed simulation.
    pub async fn remove(&self, id: SimulationId) {
        if self.active.write().await.remove(&id).is_some() {
            info!(simulation_id = %id, "simulation removed from registry");
        }
    }

    /// Number of active simulations.
    pub async fn len(&self) -> usize {
        self.active.read().await.len()
    }

    /// Whether no simulation is active.
    pub async fn is_empty(&self) -> bool {
        self.active.read().await.is_empty()
    }
}

impl<G, S> Default for SimulationRegistry<G, S>
where
    G: TextGenerator,
    S: SimulationStore,
{
    fn default() -> Self {
        Self::new()
    }
}
