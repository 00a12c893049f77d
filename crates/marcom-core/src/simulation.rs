//! The simulation engine: initialization, the cycle loop, and pause/resume.
//!
//! A [`Simulation`] is driven by repeatedly calling
//! [`Simulation::next_event`]. Each call advances an explicit cursor by as
//! little as it can to produce one event, persists that event, and returns
//! it. The cursor survives between calls, so a consumer can stop pulling at
//! any point and a later consumer picks up exactly where the last one left
//! off: nothing is skipped and nothing is emitted twice.
//!
//! # Sequence
//!
//! 1. One `INIT` event per agent whose descriptions had to be generated
//!    (cycle 0, no agent reference).
//! 2. For each cycle, every agent's turn in roster order; each turn opens
//!    with `"Cycle <n> start"` and yields the events of
//!    [`resolver::advance`](crate::resolver::advance).
//! 3. After the last agent the cycle closes: the next cycle number is
//!    written to the store, then the counter increments. A bounded run ends
//!    once the counter passes the total; a negative total never ends.
//!
//! A simulation rebuilt after a restart continues from the stored cycle
//! number, so cycle numbers in the event log never go backwards.
//!
//! An event the store rejects is held and written first on the next call,
//! ahead of anything else; the cursor has already moved past the step that
//! produced it, so that step is never repeated.
//!
//! The pause flag is read at every turn boundary (which includes every
//! cycle boundary). While paused, `next_event` returns `None` without moving
//! the cursor; initialization is not affected by pause.

use std::sync::Arc;

use marcom_llm::TextGenerator;
use marcom_types::{Event, EventKind, Product, SimulationDefinition, SimulationId};
use tracing::{debug, info, warn};

use crate::agent::Agent;
use crate::context::{EngineContext, RosterEntry, Scene};
use crate::control::SimulationControl;
use crate::error::CoreError;
use crate::resolver::{self, TurnStep};
use crate::store::SimulationStore;

/// Where the engine is between two events.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Cursor {
    /// Initializing agents; `next_agent` is the roster index to do next.
    Initializing { next_agent: usize },
    /// Between turns; `agent` is the roster index whose turn is next.
    /// Index 0 is also the cycle boundary.
    TurnBoundary { agent: usize },
    /// Inside `agent`'s turn.
    InTurn { agent: usize, step: TurnStep },
    /// The last turn of the cycle has ended; the cycle is not yet recorded.
    ClosingCycle,
    /// A bounded run has completed.
    Finished,
}

/// One running simulation.
pub struct Simulation<G, S> {
    id: SimulationId,
    environment: String,
    agents: Vec<Agent>,
    products: Vec<Product>,
    roster: Vec<RosterEntry>,
    total_cycles: i64,
    cycle: i64,
    initialized: bool,
    control: Arc<SimulationControl>,
    ctx: EngineContext<G, S>,
    cursor: Cursor,
    unpublished: Option<Event>,
}

impl<G, S> Simulation<G, S>
where
    G: TextGenerator,
    S: SimulationStore,
{
    /// Build a simulation from its definition. No generation happens until
    /// the first call to [`next_event`](Self::next_event).
    pub fn new(definition: SimulationDefinition, ctx: EngineContext<G, S>) -> Self {
        let agents = definition
            .agents
            .into_iter()
            .map(|profile| Agent::new(profile, definition.id, ctx.memory_window))
            .collect();
        Self {
            id: definition.id,
            environment: definition.environment,
            agents,
            products: definition.products,
            roster: Vec::new(),
            total_cycles: definition.total_cycles,
            cycle: 1,
            initialized: false,
            control: Arc::new(SimulationControl::new()),
            ctx,
            cursor: Cursor::Initializing { next_agent: 0 },
            unpublished: None,
        }
    }

    /// Simulation identifier.
    pub const fn id(&self) -> SimulationId {
        self.id
    }

    /// The cycle currently running (or about to run).
    pub const fn cycle(&self) -> i64 {
        self.cycle
    }

    /// Total cycles to run; negative means unbounded.
    pub const fn total_cycles(&self) -> i64 {
        self.total_cycles
    }

    /// Whether every agent has been initialized.
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether a bounded run has completed.
    pub const fn is_finished(&self) -> bool {
        matches!(self.cursor, Cursor::Finished)
    }

    /// The agents in turn order.
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    /// The pause control, shareable with other tasks.
    pub fn control(&self) -> Arc<SimulationControl> {
        Arc::clone(&self.control)
    }

    /// Pause at the next turn boundary.
    pub fn pause(&self) {
        self.control.pause();
    }

    /// Clear the pause flag.
    pub fn resume(&self) {
        self.control.resume();
    }

    /// Produce the next event, or `None` when paused or finished.
    ///
    /// Each event is written to the store before it is returned.
    pub async fn next_event(&mut self) -> Result<Option<Event>, CoreError> {
        if let Some(event) = self.unpublished.take() {
            return self.publish(event).await.map(Some);
        }
        loop {
            match self.cursor.clone() {
                Cursor::Initializing { next_agent } => {
                    if let Some(event) = self.initialize_step(next_agent).await? {
                        return Ok(Some(event));
                    }
                }

                Cursor::TurnBoundary { agent } => {
                    if agent == 0 && self.run_complete() {
                        info!(simulation_id = %self.id, cycle = self.cycle, "simulation finished");
                        self.cursor = Cursor::Finished;
                        return Ok(None);
                    }
                    if self.control.is_paused() {
                        debug!(simulation_id = %self.id, cycle = self.cycle, "paused at turn boundary");
                        return Ok(None);
                    }
                    self.cursor = Cursor::InTurn {
                        agent,
                        step: TurnStep::opening(self.cycle),
                    };
                }

                Cursor::InTurn { agent, step } => {
                    let Some(actor) = self.agents.get(agent).map(Agent::id) else {
                        self.end_turn(agent);
                        continue;
                    };
                    let scene = Scene {
                        simulation_id: self.id,
                        cycle: self.cycle,
                        environment: &self.environment,
                        products: &self.products,
                        roster: &self.roster,
                    };
                    let outcome =
                        resolver::advance(step, actor, &mut self.agents, &scene, &self.ctx).await?;
                    match outcome.next {
                        Some(step) => self.cursor = Cursor::InTurn { agent, step },
                        None => self.end_turn(agent),
                    }
                    if let Some(event) = outcome.event {
                        return self.publish(event).await.map(Some);
                    }
                }

                Cursor::ClosingCycle => self.close_cycle().await?,

                Cursor::Finished => return Ok(None),
            }
        }
    }

    /// Drain the remaining `INIT` events without starting any turn.
    pub async fn initialize(&mut self) -> Result<Vec<Event>, CoreError> {
        let mut events = Vec::new();
        while let Cursor::Initializing { next_agent } = self.cursor {
            let event = match self.unpublished.take() {
                Some(held) => Some(self.publish(held).await?),
                None => self.initialize_step(next_agent).await?,
            };
            events.extend(event);
        }
        Ok(events)
    }

    /// Run until the cycle counter advances or the run stops, returning the
    /// events produced. Initializes first if needed.
    pub async fn advance_cycle(&mut self) -> Result<Vec<Event>, CoreError> {
        let mut events = self.initialize().await?;
        let starting_cycle = self.cycle;
        while self.cycle == starting_cycle {
            if self.cursor == Cursor::ClosingCycle {
                self.close_cycle().await?;
                break;
            }
            let Some(event) = self.next_event().await? else {
                break;
            };
            events.push(event);
        }
        Ok(events)
    }

    /// Pull events until the run pauses or finishes.
    ///
    /// An unbounded run only returns once it is paused from another task.
    pub async fn run(&mut self) -> Result<Vec<Event>, CoreError> {
        let mut events = Vec::new();
        while let Some(event) = self.next_event().await? {
            events.push(event);
        }
        Ok(events)
    }

    /// Initialize the agent at `next_agent`, or finish initialization once
    /// every agent is done. Returns the published `INIT` event, if any.
    async fn initialize_step(&mut self, next_agent: usize) -> Result<Option<Event>, CoreError> {
        let Some(agent) = self.agents.get_mut(next_agent) else {
            if let Some(next_cycle) = self.ctx.store.load_next_cycle(self.id).await? {
                self.cycle = self.cycle.max(next_cycle);
            }
            self.roster = self.agents.iter().map(Agent::roster_entry).collect();
            self.initialized = true;
            self.cursor = Cursor::TurnBoundary { agent: 0 };
            info!(
                simulation_id = %self.id,
                agents = self.agents.len(),
                cycle = self.cycle,
                "simulation initialized"
            );
            return Ok(None);
        };
        let first_run = agent.initialize(&self.ctx).await?;
        let content = first_run.then(|| {
            format!(
                "Initialised agent {} with rewritten description: {}",
                agent.name(),
                agent
                    .descriptions()
                    .map_or("", |d| d.second_person.as_str())
            )
        });
        self.cursor = Cursor::Initializing {
            next_agent: next_agent.saturating_add(1),
        };
        match content {
            Some(content) => {
                let event = Event::new(self.id, None, EventKind::Init, content, 0);
                self.publish(event).await.map(Some)
            }
            None => Ok(None),
        }
    }

    /// Move past `agent`'s turn.
    fn end_turn(&mut self, agent: usize) {
        let next = agent.saturating_add(1);
        self.cursor = if next < self.agents.len() {
            Cursor::TurnBoundary { agent: next }
        } else {
            Cursor::ClosingCycle
        };
    }

    /// Record the finished cycle, then start the next one. A store failure
    /// leaves the cycle open so the next call records it again.
    async fn close_cycle(&mut self) -> Result<(), CoreError> {
        let next_cycle = self.cycle.saturating_add(1);
        self.ctx.store.save_next_cycle(self.id, next_cycle).await?;
        info!(simulation_id = %self.id, cycle = self.cycle, "cycle complete");
        self.cycle = next_cycle;
        self.cursor = Cursor::TurnBoundary { agent: 0 };
        Ok(())
    }

    fn run_complete(&self) -> bool {
        self.agents.is_empty() || (self.total_cycles >= 0 && self.cycle > self.total_cycles)
    }

    async fn publish(&mut self, event: Event) -> Result<Event, CoreError> {
        if let Err(e) = self.ctx.store.append_event(&event).await {
            warn!(
                simulation_id = %self.id,
                cycle = event.cycle,
                kind = %event.kind,
                error = %e,
                "event not persisted, holding it for the next call"
            );
            self.unpublished = Some(event);
            return Err(e);
        }
        debug!(
            simulation_id = %self.id,
            cycle = event.cycle,
            kind = %event.kind,
            "event persisted"
        );
        Ok(event)
    }
}
