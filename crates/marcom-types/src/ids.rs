//! Type-safe identifier wrappers.
//!
//! Simulations, agents, and products are identified by the integer keys
//! assigned by the web backend that owns their definitions. Wrapping them
//! in distinct newtypes prevents accidentally looking up a product with an
//! agent id. Events are the only entity the engine mints itself; they use
//! UUID v7 so that ids sort in creation order.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around an externally assigned `i64` key.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[serde(transparent)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub i64);

        impl $name {
            /// Wrap a raw key.
            pub const fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Return the raw key.
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Identifier of a simulation run.
    SimulationId
}

define_id! {
    /// Identifier of an agent, unique within its simulation.
    AgentId
}

define_id! {
    /// Identifier of a product, unique within its simulation.
    ProductId
}

/// Unique identifier for an event in the event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(transparent)]
#[ts(export, export_to = "bindings/")]
pub struct EventId(pub Uuid);

impl EventId {
    /// Create a new identifier using UUID v7 (time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for EventId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Durable key of an agent's per-simulation record.
///
/// The rewritten descriptions and the memory log of an agent are scoped to
/// the simulation it takes part in, so the same agent definition reused in
/// two simulations owns two independent records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentRecordKey {
    /// The agent the record belongs to.
    pub agent_id: AgentId,
    /// The simulation the agent takes part in.
    pub simulation_id: SimulationId,
}

impl AgentRecordKey {
    /// Build the record key for an (agent, simulation) pair.
    pub const fn new(agent_id: AgentId, simulation_id: SimulationId) -> Self {
        Self {
            agent_id,
            simulation_id,
        }
    }
}

impl core::fmt::Display for AgentRecordKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "agent {} in simulation {}", self.agent_id, self.simulation_id)
    }
}
