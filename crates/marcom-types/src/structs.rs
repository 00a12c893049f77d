//! Core entity structs: agent and product definitions, events, memory.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::EventKind;
use crate::ids::{AgentId, AgentRecordKey, EventId, ProductId, SimulationId};

// ---------------------------------------------------------------------------
// Agent definition
// ---------------------------------------------------------------------------

/// A single key/value trait of an agent, e.g. `Budget: Low`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentAttribute {
    /// Attribute name.
    pub key: String,
    /// Attribute value.
    pub value: String,
}

impl AgentAttribute {
    /// Create an attribute.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Render as a `{key, value}` pair for the rewrite prompt.
    pub fn prompt_fragment(&self) -> String {
        format!("{{{}, {}}}", self.key, self.value)
    }
}

/// The caller-supplied definition of an agent.
///
/// Attribute order is preserved; it is the order the attributes are
/// narrated in when the agent's description is rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentProfile {
    /// Agent identifier, unique within the simulation.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Free-text description written in third person.
    pub description: String,
    /// Ordered key/value attributes.
    #[serde(default)]
    pub attributes: Vec<AgentAttribute>,
    /// Model override for this agent; the configured default when absent.
    #[serde(default)]
    pub model: Option<String>,
}

/// Rewritten descriptions persisted per (agent, simulation) pair.
///
/// Written once on the agent's first run and read back on every later run
/// so that an agent keeps the same persona across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptions {
    /// Second-person narrative used as the agent's own system framing.
    pub second_person: String,
    /// Third-person summary shown to the agent's peers.
    pub third_person: String,
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// A product on offer in a simulation. Immutable for the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Product {
    /// Product identifier, unique within the simulation.
    pub id: ProductId,
    /// The simulation the product belongs to (0 for standalone research).
    pub simulation_id: SimulationId,
    /// Product name.
    pub name: String,
    /// Product description.
    pub description: String,
    /// Selling price in ringgit.
    #[ts(as = "String")]
    pub price: Decimal,
    /// Cost to the seller in ringgit. Never shown to agents.
    #[ts(as = "String")]
    pub cost: Decimal,
}

impl Product {
    /// Price formatted for prompts, e.g. `RM350.00`.
    pub fn display_price(&self) -> String {
        format!("RM{:.2}", self.price)
    }

    /// Render the product as one roster entry for an agent prompt.
    pub fn prompt_fragment(&self) -> String {
        format!(
            "(product_id:{},name:{},description:{},price:{})",
            self.id,
            self.name,
            self.description,
            self.display_price()
        )
    }
}

// ---------------------------------------------------------------------------
// Simulation definition
// ---------------------------------------------------------------------------

/// Everything a caller supplies to start a simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SimulationDefinition {
    /// Simulation identifier.
    pub id: SimulationId,
    /// Description of the market environment the agents live in.
    pub environment: String,
    /// Agents in turn order.
    pub agents: Vec<AgentProfile>,
    /// Products on offer.
    pub products: Vec<Product>,
    /// Number of cycles to run; negative means unbounded.
    pub total_cycles: i64,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// An immutable record of something that happened in a simulation.
///
/// Events are the authoritative history of a run and the only channel
/// through which the engine reports progress. Payload encodings:
///
/// | Kind | Content |
/// |------|---------|
/// | `INIT` | description of the rewrite performed |
/// | `BUY` | `<product_id>:<reason>` |
/// | `SKIP` | empty |
/// | `MESSAGE` | `<counterpart_agent_id>:<text>` |
/// | `ACTION_RESPONSE` | free-text feedback |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct Event {
    /// Unique event identifier.
    pub id: EventId,
    /// The simulation the event belongs to.
    pub simulation_id: SimulationId,
    /// Acting agent; absent for simulation-level events.
    pub agent_id: Option<AgentId>,
    /// Event kind.
    pub kind: EventKind,
    /// Kind-specific payload.
    pub content: String,
    /// Cycle the event happened in.
    pub cycle: i64,
    /// Creation time; the ordering key within a cycle.
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Create an event stamped with the current time.
    pub fn new(
        simulation_id: SimulationId,
        agent_id: Option<AgentId>,
        kind: EventKind,
        content: String,
        cycle: i64,
    ) -> Self {
        Self {
            id: EventId::new(),
            simulation_id,
            agent_id,
            kind,
            content,
            cycle,
            created_at: Utc::now(),
        }
    }

    /// An agent purchased `product` for `reason`.
    pub fn buy(
        simulation_id: SimulationId,
        agent_id: AgentId,
        cycle: i64,
        product: ProductId,
        reason: &str,
    ) -> Self {
        Self::new(
            simulation_id,
            Some(agent_id),
            EventKind::Buy,
            format!("{product}:{reason}"),
            cycle,
        )
    }

    /// An agent skipped its turn.
    pub fn skip(simulation_id: SimulationId, agent_id: AgentId, cycle: i64) -> Self {
        Self::new(simulation_id, Some(agent_id), EventKind::Skip, String::new(), cycle)
    }

    /// `agent_id` sent `text` to `counterpart`.
    pub fn message(
        simulation_id: SimulationId,
        agent_id: AgentId,
        cycle: i64,
        counterpart: AgentId,
        text: &str,
    ) -> Self {
        Self::new(
            simulation_id,
            Some(agent_id),
            EventKind::Message,
            format!("{counterpart}:{text}"),
            cycle,
        )
    }

    /// Feedback produced after a terminal action.
    pub fn action_response(
        simulation_id: SimulationId,
        agent_id: AgentId,
        cycle: i64,
        feedback: String,
    ) -> Self {
        Self::new(
            simulation_id,
            Some(agent_id),
            EventKind::ActionResponse,
            feedback,
            cycle,
        )
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// One durable line of an agent's memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// The agent record the entry belongs to.
    pub record: AgentRecordKey,
    /// Free-text content.
    pub content: String,
    /// Creation time, used to replay entries in order.
    pub created_at: DateTime<Utc>,
}

impl MemoryEntry {
    /// Create a memory entry stamped with the current time.
    pub fn new(record: AgentRecordKey, content: String) -> Self {
        Self {
            record,
            content,
            created_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire update
// ---------------------------------------------------------------------------

/// One streamed update, projected from an [`Event`] for remote clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SimulationUpdate {
    /// Acting agent, or 0 for simulation-level events.
    pub agent_id: i64,
    /// Event kind name (`BUY`, `SKIP`, ...).
    pub action: String,
    /// Event payload.
    pub content: String,
    /// Cycle the event happened in.
    pub cycle: i64,
    /// The simulation the event belongs to.
    pub simulation_id: i64,
}

impl From<&Event> for SimulationUpdate {
    fn from(event: &Event) -> Self {
        Self {
            agent_id: event.agent_id.map_or(0, AgentId::get),
            action: event.kind.as_str().to_owned(),
            content: event.content.clone(),
            cycle: event.cycle,
            simulation_id: event.simulation_id.get(),
        }
    }
}
