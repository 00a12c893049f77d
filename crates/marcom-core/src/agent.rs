//! The agent decision unit.
//!
//! An [`Agent`] owns one participant's identity, its rewritten descriptions,
//! and its rolling memory. Every call it makes to the text generator goes
//! through the retry gate, so the methods here only ever see responses that
//! have already passed structural validation.
//!
//! # Descriptions
//!
//! The caller supplies a third-person description and a list of attributes.
//! On an agent's first run these are rewritten into a second-person framing
//! (role paragraph followed by attribute paragraph) plus a short third-person
//! summary for peers, and written to the store. Later runs read them back
//! instead of asking again, so a persona stays stable across restarts.

use marcom_llm::{GenerationRequest, PromptKind, TextGenerator};
use marcom_types::{
    ActionKind, AgentAttribute, AgentDescriptions, AgentId, AgentProfile, AgentRecordKey,
    MemoryEntry, Product, SimulationId,
};
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::context::{EngineContext, RosterEntry, Scene};
use crate::error::CoreError;
use crate::memory::MemoryWindow;
use crate::store::SimulationStore;

/// Fields every decision response must carry.
pub const DECISION_FIELDS: [&str; 4] = ["action", "reason", "target_id", "target_content"];

/// A validated action choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// The chosen action.
    pub action: ActionKind,
    /// Why the agent chose it. Never empty.
    pub reason: String,
    /// Raw target reference (`"3"`, `"3:Course"`, or empty for SKIP).
    pub target_id: String,
    /// Product name for BUY, message text for MESSAGE.
    pub target_content: String,
}

impl Decision {
    /// Validate a parsed response against the allowed actions.
    ///
    /// Every non-id field must be a string, `target_id` may be a string or
    /// an integer, `reason` must not be blank, and the action (matched
    /// case-insensitively) must be one of `allowed`.
    pub fn from_response(map: &Map<String, Value>, allowed: &[ActionKind]) -> Option<Self> {
        let action = map
            .get("action")
            .and_then(Value::as_str)
            .and_then(ActionKind::parse)
            .filter(|kind| allowed.contains(kind))?;
        let reason = map
            .get("reason")
            .and_then(Value::as_str)
            .filter(|r| !r.trim().is_empty())?;
        let target_id = match map.get("target_id")? {
            Value::String(s) => s.trim().to_owned(),
            Value::Number(n) if n.is_i64() || n.is_u64() => n.to_string(),
            _ => return None,
        };
        let target_content = map.get("target_content").and_then(Value::as_str)?;

        Some(Self {
            action,
            reason: reason.trim().to_owned(),
            target_id,
            target_content: target_content.to_owned(),
        })
    }
}

/// One participant in a simulation.
#[derive(Debug, Clone)]
pub struct Agent {
    profile: AgentProfile,
    record: AgentRecordKey,
    descriptions: Option<AgentDescriptions>,
    memory: MemoryWindow,
}

impl Agent {
    /// Create an uninitialized agent for `simulation_id`.
    pub fn new(profile: AgentProfile, simulation_id: SimulationId, memory_window: usize) -> Self {
        Self {
            record: AgentRecordKey::new(profile.id, simulation_id),
            profile,
            descriptions: None,
            memory: MemoryWindow::new(memory_window),
        }
    }

    /// Agent identifier.
    pub const fn id(&self) -> AgentId {
        self.profile.id
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.profile.name
    }

    /// Durable record key for this (agent, simulation) pair.
    pub const fn record(&self) -> AgentRecordKey {
        self.record
    }

    /// Rewritten descriptions, once initialized.
    pub const fn descriptions(&self) -> Option<&AgentDescriptions> {
        self.descriptions.as_ref()
    }

    /// The in-process memory window.
    pub const fn memory(&self) -> &MemoryWindow {
        &self.memory
    }

    /// How this agent is introduced to the others.
    pub fn roster_entry(&self) -> RosterEntry {
        RosterEntry {
            id: self.profile.id,
            name: self.profile.name.clone(),
            summary: self.descriptions.as_ref().map_or_else(
                || self.profile.description.clone(),
                |d| d.third_person.clone(),
            ),
        }
    }

    fn second_person(&self) -> &str {
        self.descriptions
            .as_ref()
            .map_or(self.profile.description.as_str(), |d| d.second_person.as_str())
    }

    fn request(&self, prompt: marcom_llm::RenderedPrompt, json_mode: bool) -> GenerationRequest {
        let request = if json_mode {
            GenerationRequest::json(prompt)
        } else {
            GenerationRequest::text(prompt)
        };
        request.with_model(self.profile.model.clone())
    }

    // -----------------------------------------------------------------------
    // Initialization
    // -----------------------------------------------------------------------

    /// Load or synthesize this agent's descriptions.
    ///
    /// Returns `true` when the descriptions were generated (first run) and
    /// `false` when they were read back from the store, in which case the
    /// durable memory is also replayed into the window, oldest first.
    pub async fn initialize<G, S>(&mut self, ctx: &EngineContext<G, S>) -> Result<bool, CoreError>
    where
        G: TextGenerator,
        S: SimulationStore,
    {
        if let Some(cached) = ctx.store.load_descriptions(self.record).await? {
            self.descriptions = Some(cached);
            let entries = ctx.store.recent_memory(self.record, self.memory.limit()).await?;
            let replayed = entries.len();
            for entry in entries {
                self.memory.push(entry.content);
            }
            info!(
                agent_id = %self.profile.id,
                simulation_id = %self.record.simulation_id,
                replayed,
                "agent resumed from stored descriptions"
            );
            return Ok(false);
        }

        let descriptions = self.rewrite_descriptions(ctx).await?;
        ctx.store.save_descriptions(self.record, &descriptions).await?;
        self.descriptions = Some(descriptions);
        info!(
            agent_id = %self.profile.id,
            simulation_id = %self.record.simulation_id,
            "agent descriptions rewritten"
        );
        Ok(true)
    }

    async fn rewrite_descriptions<G, S>(
        &self,
        ctx: &EngineContext<G, S>,
    ) -> Result<AgentDescriptions, CoreError>
    where
        G: TextGenerator,
        S: SimulationStore,
    {
        let role_prompt = ctx.prompts.render(
            PromptKind::RewriteRole,
            &json!({
                "name": self.profile.name,
                "description": self.profile.description,
            }),
        )?;
        let (role, third_person) = ctx
            .gate
            .obtain_with(
                &self.request(role_prompt, true),
                &["description", "third_person_description"],
                |map| Some((braceless(map, "description")?, braceless(map, "third_person_description")?)),
            )
            .await?;

        if self.profile.attributes.is_empty() {
            return Ok(AgentDescriptions {
                second_person: role,
                third_person,
            });
        }

        let attributes: Vec<String> = self
            .profile
            .attributes
            .iter()
            .map(AgentAttribute::prompt_fragment)
            .collect();
        let attributes_prompt = ctx
            .prompts
            .render(PromptKind::RewriteAttributes, &json!({ "attributes": attributes }))?;
        let narrative = ctx
            .gate
            .obtain_with(
                &self.request(attributes_prompt, true),
                &["description"],
                |map| braceless(map, "description"),
            )
            .await?;

        Ok(AgentDescriptions {
            second_person: format!("{role} {narrative}"),
            third_person,
        })
    }

    // -----------------------------------------------------------------------
    // Decisions
    // -----------------------------------------------------------------------

    /// Ask the agent what it does next.
    ///
    /// With `record_incoming` the incoming message is written to memory
    /// first; otherwise it is shown once and forgotten.
    pub async fn decide<G, S>(
        &mut self,
        ctx: &EngineContext<G, S>,
        scene: &Scene<'_>,
        incoming: &str,
        allowed: &[ActionKind],
        record_incoming: bool,
    ) -> Result<Decision, CoreError>
    where
        G: TextGenerator,
        S: SimulationStore,
    {
        if record_incoming {
            self.remember(ctx, incoming.to_owned(), true).await?;
        }
        let mut memory: Vec<String> = self.memory.lines().map(ToOwned::to_owned).collect();
        if !record_incoming {
            memory.push(incoming.to_owned());
        }

        let menu: Vec<&str> = allowed.iter().map(|a| a.menu_entry()).collect();
        let prompt = ctx.prompts.render(
            PromptKind::AgentDecision,
            &json!({
                "environment": scene.environment,
                "description": self.second_person(),
                "memory": memory,
                "agents": scene.peers_of(self.profile.id),
                "products": scene.product_fragments(),
                "actions": menu,
            }),
        )?;

        let decision = ctx
            .gate
            .obtain_with(&self.request(prompt, true), &DECISION_FIELDS, |map| {
                Decision::from_response(map, allowed)
            })
            .await?;
        debug!(
            agent_id = %self.profile.id,
            cycle = scene.cycle,
            action = %decision.action,
            target = %decision.target_id,
            "agent decided"
        );
        Ok(decision)
    }

    /// Ask the agent to answer a direct message from `sender`.
    ///
    /// The inbound message is recorded to memory before the prompt is built.
    pub async fn reply<G, S>(
        &mut self,
        ctx: &EngineContext<G, S>,
        scene: &Scene<'_>,
        incoming: &str,
        sender: &RosterEntry,
    ) -> Result<String, CoreError>
    where
        G: TextGenerator,
        S: SimulationStore,
    {
        self.remember(ctx, incoming.to_owned(), true).await?;

        let memory: Vec<&str> = self.memory.lines().collect();
        let prompt = ctx.prompts.render(
            PromptKind::AgentReply,
            &json!({
                "environment": scene.environment,
                "description": self.second_person(),
                "memory": memory,
                "agents": [sender.prompt_fragment()],
                "products": scene.product_fragments(),
            }),
        )?;

        let message = ctx
            .gate
            .obtain_with(&self.request(prompt, true), &["message"], |map| {
                map.get("message").and_then(Value::as_str).map(ToOwned::to_owned)
            })
            .await?;
        Ok(message)
    }

    /// Ask the agent to describe how its BUY (with `product`) or SKIP went.
    pub async fn feedback<G, S>(
        &self,
        ctx: &EngineContext<G, S>,
        scene: &Scene<'_>,
        product: Option<&Product>,
    ) -> Result<String, CoreError>
    where
        G: TextGenerator,
        S: SimulationStore,
    {
        let memory: Vec<&str> = self.memory.lines().collect();
        let prompt = ctx.prompts.render(
            PromptKind::ActionFeedback,
            &json!({
                "environment": scene.environment,
                "description": self.second_person(),
                "memory": memory,
                "product": product.map(Product::prompt_fragment),
            }),
        )?;
        Ok(ctx.gate.generate_text(&self.request(prompt, false)).await?)
    }

    /// Append `text` to memory, writing it through to the store when
    /// `persist` is set.
    pub async fn remember<G, S>(
        &mut self,
        ctx: &EngineContext<G, S>,
        text: String,
        persist: bool,
    ) -> Result<(), CoreError>
    where
        S: SimulationStore,
    {
        if persist {
            ctx.store
                .append_memory(&MemoryEntry::new(self.record, text.clone()))
                .await?;
        }
        self.memory.push(text);
        Ok(())
    }
}

/// A string field that contains no curly braces.
fn braceless(map: &Map<String, Value>, field: &str) -> Option<String> {
    map.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty() && !s.contains(['{', '}']))
        .map(ToOwned::to_owned)
}
