//! Collaborators and per-turn context shared by every agent in a run.

use std::sync::Arc;

use marcom_llm::{PromptEngine, RetryGate};
use marcom_types::{ActionKind, AgentId, Product, SimulationId};

/// The collaborators an agent needs to think and remember.
///
/// Cheap to clone: everything heavy sits behind an [`Arc`].
pub struct EngineContext<G, S> {
    /// Retry gate around the text generator.
    pub gate: RetryGate<G>,
    /// Prompt templates.
    pub prompts: Arc<PromptEngine>,
    /// Durable store.
    pub store: Arc<S>,
    /// In-process memory window size.
    pub memory_window: usize,
}

impl<G, S> Clone for EngineContext<G, S> {
    fn clone(&self) -> Self {
        Self {
            gate: self.gate.clone(),
            prompts: Arc::clone(&self.prompts),
            store: Arc::clone(&self.store),
            memory_window: self.memory_window,
        }
    }
}

/// How an agent is introduced to its peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// Agent identifier.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Third-person summary.
    pub summary: String,
}

impl RosterEntry {
    /// Render as one roster entry for an agent prompt.
    pub fn prompt_fragment(&self) -> String {
        format!(
            "(agent_id:{},name:{},description:{})",
            self.id, self.name, self.summary
        )
    }
}

/// What an agent sees when it is asked to act.
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    /// The simulation being run.
    pub simulation_id: SimulationId,
    /// The current cycle.
    pub cycle: i64,
    /// Market environment description.
    pub environment: &'a str,
    /// Products on offer.
    pub products: &'a [Product],
    /// Every agent in turn order.
    pub roster: &'a [RosterEntry],
}

impl Scene<'_> {
    /// Roster fragments for everyone except `agent`.
    pub fn peers_of(&self, agent: AgentId) -> Vec<String> {
        self.roster
            .iter()
            .filter(|entry| entry.id != agent)
            .map(RosterEntry::prompt_fragment)
            .collect()
    }

    /// Product fragments in offer order.
    pub fn product_fragments(&self) -> Vec<String> {
        self.products.iter().map(Product::prompt_fragment).collect()
    }

    /// Actions that can succeed in this scene: BUY needs a product, MESSAGE
    /// needs a second agent.
    pub fn allowed_actions(&self) -> Vec<ActionKind> {
        ActionKind::ALL
            .into_iter()
            .filter(|kind| match kind {
                ActionKind::Buy => !self.products.is_empty(),
                ActionKind::Skip => true,
                ActionKind::Message => self.roster.len() > 1,
            })
            .collect()
    }

    /// The roster entry for `agent`.
    pub fn entry(&self, agent: AgentId) -> Option<&RosterEntry> {
        self.roster.iter().find(|entry| entry.id == agent)
    }
}
