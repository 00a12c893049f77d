//! Action resolution: turning an agent's decision into events.
//!
//! A turn is a small state machine. It opens in
//! [`TurnStep::AwaitingAction`]; BUY and SKIP pass through
//! [`TurnStep::AwaitingFeedback`] and end the turn; MESSAGE passes through
//! [`TurnStep::AwaitingReply`] and returns to `AwaitingAction` with the
//! reply as the incoming message. Each call to [`advance`] performs one step
//! and yields at most one event, which is what lets the engine hand events
//! out one at a time and stop between any two of them.
//!
//! Target references are parsed tolerantly (see [`parse_target_id`]). A
//! reference that does not resolve sends the agent back to decide again
//! with a correction listing the valid ids; no event is produced and there
//! is no cap on corrections.

use std::fmt::Display;

use marcom_llm::TextGenerator;
use marcom_types::{ActionKind, AgentId, Event, Product, ProductId};
use tracing::{debug, info};

use crate::agent::Agent;
use crate::context::{EngineContext, RosterEntry, Scene};
use crate::error::CoreError;
use crate::store::SimulationStore;

// ---------------------------------------------------------------------------
// Tolerant id parsing
// ---------------------------------------------------------------------------

/// A target reference that is not `<id>` or `<id>:<label>`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid target id format `{0}`")]
pub struct TargetIdError(pub String);

/// Parse a target reference.
///
/// Accepts a bare decimal id (`"3"`) or an id followed by a label
/// (`"3:Intensive Exam Preparation Course"`), in which case only the
/// numeric part is used. Anything else is a format error.
pub fn parse_target_id(raw: &str) -> Result<i64, TargetIdError> {
    let trimmed = raw.trim();
    let id_part = match trimmed.split_once(':') {
        Some((id, label)) if !label.contains(':') => id,
        Some(_) => return Err(TargetIdError(trimmed.to_owned())),
        None => trimmed,
    };
    let id_part = id_part.trim();
    if id_part.is_empty() || !id_part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TargetIdError(trimmed.to_owned()));
    }
    id_part
        .parse::<i64>()
        .ok()
        .ok_or_else(|| TargetIdError(trimmed.to_owned()))
}

fn id_list<T: Display>(ids: impl Iterator<Item = T>) -> String {
    ids.map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

/// Resolve `raw` against the products on offer.
///
/// The error is a correction message for the agent.
pub fn resolve_product<'p>(raw: &str, products: &'p [Product]) -> Result<&'p Product, String> {
    let valid = || id_list(products.iter().map(|p| p.id));
    let id = parse_target_id(raw).map_err(|e| {
        format!(
            "Invalid target_id '{}' for BUY. Provide only the product id or product_id:product_name. Valid product ids: {}.",
            e.0,
            valid()
        )
    })?;
    products
        .iter()
        .find(|p| p.id.get() == id)
        .ok_or_else(|| format!("Product {id} does not exist. Valid product ids: {}.", valid()))
}

/// Resolve `raw` against the agents `actor` may message.
///
/// The actor itself is never a valid target. The error is a correction
/// message for the agent.
pub fn resolve_peer(raw: &str, actor: AgentId, roster: &[RosterEntry]) -> Result<AgentId, String> {
    let valid = || id_list(roster.iter().map(|e| e.id).filter(|id| *id != actor));
    let id = parse_target_id(raw).map_err(|e| {
        format!(
            "Invalid target_id '{}' for MESSAGE. Provide only the agent id or agent_id:agent_name. Valid agent ids: {}.",
            e.0,
            valid()
        )
    })?;
    if id == actor.get() {
        return Err(format!(
            "You cannot send a message to yourself. Valid agent ids: {}.",
            valid()
        ));
    }
    roster
        .iter()
        .find(|e| e.id.get() == id)
        .map(|e| e.id)
        .ok_or_else(|| format!("Agent {id} does not exist in the simulation. Valid agent ids: {}.", valid()))
}

// ---------------------------------------------------------------------------
// Turn state machine
// ---------------------------------------------------------------------------

/// Where a turn is between two steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnStep {
    /// The actor must decide on an action.
    AwaitingAction {
        /// Message shown to the actor with the decision prompt.
        incoming: String,
        /// Whether `incoming` is written to the actor's memory.
        record_incoming: bool,
    },
    /// A BUY (with its product) or SKIP was recorded; feedback is next.
    AwaitingFeedback {
        /// The product bought, `None` after a SKIP.
        product: Option<ProductId>,
    },
    /// A message was sent; the target's reply is next.
    AwaitingReply {
        /// The agent messaged.
        target: AgentId,
        /// The message text.
        text: String,
    },
}

impl TurnStep {
    /// The first step of a turn in `cycle`.
    pub fn opening(cycle: i64) -> Self {
        Self::AwaitingAction {
            incoming: format!("Cycle {cycle} start"),
            record_incoming: false,
        }
    }
}

/// The result of one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    /// Event produced by the step, if any.
    pub event: Option<Event>,
    /// The next step; `None` ends the turn.
    pub next: Option<TurnStep>,
}

impl StepOutcome {
    const fn emit(event: Event, next: Option<TurnStep>) -> Self {
        Self {
            event: Some(event),
            next,
        }
    }

    fn correct(correction: String) -> Self {
        Self {
            event: None,
            next: Some(TurnStep::AwaitingAction {
                incoming: correction,
                record_incoming: false,
            }),
        }
    }
}

/// Perform one step of `actor`'s turn.
pub async fn advance<G, S>(
    step: TurnStep,
    actor: AgentId,
    agents: &mut [Agent],
    scene: &Scene<'_>,
    ctx: &EngineContext<G, S>,
) -> Result<StepOutcome, CoreError>
where
    G: TextGenerator,
    S: SimulationStore,
{
    match step {
        TurnStep::AwaitingAction {
            incoming,
            record_incoming,
        } => {
            let agent = find_agent(agents, actor)?;
            let allowed = scene.allowed_actions();
            let decision = agent
                .decide(ctx, scene, &incoming, &allowed, record_incoming)
                .await?;

            match decision.action {
                ActionKind::Buy => match resolve_product(&decision.target_id, scene.products) {
                    Err(correction) => {
                        info!(agent_id = %actor, target = %decision.target_id, "buy target rejected");
                        Ok(StepOutcome::correct(correction))
                    }
                    Ok(product) => {
                        let memory = format!(
                            "Cycle {}: you bought product {} ({}) for {} because {}",
                            scene.cycle,
                            product.id,
                            product.name,
                            product.display_price(),
                            decision.reason
                        );
                        agent.remember(ctx, memory, true).await?;
                        let event = Event::buy(
                            scene.simulation_id,
                            actor,
                            scene.cycle,
                            product.id,
                            &decision.reason,
                        );
                        Ok(StepOutcome::emit(
                            event,
                            Some(TurnStep::AwaitingFeedback {
                                product: Some(product.id),
                            }),
                        ))
                    }
                },
                ActionKind::Skip => {
                    let memory = format!(
                        "Cycle {}: you skipped this cycle because {}",
                        scene.cycle, decision.reason
                    );
                    agent.remember(ctx, memory, true).await?;
                    let event = Event::skip(scene.simulation_id, actor, scene.cycle);
                    Ok(StepOutcome::emit(
                        event,
                        Some(TurnStep::AwaitingFeedback { product: None }),
                    ))
                }
                ActionKind::Message => match resolve_peer(&decision.target_id, actor, scene.roster) {
                    Err(correction) => {
                        info!(agent_id = %actor, target = %decision.target_id, "message target rejected");
                        Ok(StepOutcome::correct(correction))
                    }
                    Ok(target) => {
                        let memory = format!(
                            "Cycle {}: you sent agent {target} a message: {}",
                            scene.cycle, decision.target_content
                        );
                        agent.remember(ctx, memory, true).await?;
                        let event = Event::message(
                            scene.simulation_id,
                            actor,
                            scene.cycle,
                            target,
                            &decision.target_content,
                        );
                        Ok(StepOutcome::emit(
                            event,
                            Some(TurnStep::AwaitingReply {
                                target,
                                text: decision.target_content,
                            }),
                        ))
                    }
                },
            }
        }

        TurnStep::AwaitingFeedback { product } => {
            let product = product.and_then(|id| scene.products.iter().find(|p| p.id == id));
            let agent = find_agent(agents, actor)?;
            let feedback = agent.feedback(ctx, scene, product).await?;
            agent.remember(ctx, feedback.clone(), true).await?;
            debug!(agent_id = %actor, cycle = scene.cycle, "action feedback recorded");
            let event = Event::action_response(scene.simulation_id, actor, scene.cycle, feedback);
            Ok(StepOutcome::emit(event, None))
        }

        TurnStep::AwaitingReply { target, text } => {
            let sender = scene.entry(actor).ok_or(CoreError::UnknownAgent(actor))?;
            let incoming =
                format!("Agent {actor} sends you a message: {text}, what would you like to reply?");
            let reply = find_agent(agents, target)?
                .reply(ctx, scene, &incoming, sender)
                .await?;
            let event = Event::message(scene.simulation_id, target, scene.cycle, actor, &reply);
            Ok(StepOutcome::emit(
                event,
                Some(TurnStep::AwaitingAction {
                    incoming: format!("Agent {target} replies you: {reply}"),
                    record_incoming: true,
                }),
            ))
        }
    }
}

fn find_agent(agents: &mut [Agent], id: AgentId) -> Result<&mut Agent, CoreError> {
    agents
        .iter_mut()
        .find(|a| a.id() == id)
        .ok_or(CoreError::UnknownAgent(id))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use marcom_types::SimulationId;
    use rust_decimal::Decimal;

    use super::*;

    fn product(id: i64, name: &str) -> Product {
        Product {
            id: ProductId::new(id),
            simulation_id: SimulationId::new(1),
            name: name.to_owned(),
            description: String::from("test product"),
            price: Decimal::new(100, 0),
            cost: Decimal::new(50, 0),
        }
    }

    fn roster() -> Vec<RosterEntry> {
        [1, 2, 3]
            .into_iter()
            .map(|id| RosterEntry {
                id: AgentId::new(id),
                name: format!("Agent {id}"),
                summary: String::new(),
            })
            .collect()
    }

    #[test]
    fn tolerant_id_parsing() {
        assert_eq!(parse_target_id("3"), Ok(3));
        assert_eq!(parse_target_id(" 3 "), Ok(3));
        assert_eq!(parse_target_id("3:ProductName"), Ok(3));
        assert_eq!(parse_target_id("3:"), Ok(3));
        assert!(parse_target_id("abc").is_err());
        assert!(parse_target_id("1:2:3").is_err());
        assert!(parse_target_id("").is_err());
        assert!(parse_target_id("-3").is_err());
        assert!(parse_target_id("agent_id:3").is_err());
    }

    #[test]
    fn product_resolution() {
        let products = [product(1, "Course"), product(3, "Tutor")];

        assert_eq!(resolve_product("3:Tutor", &products).map(|p| p.id.get()), Ok(3));

        let missing = resolve_product("9", &products).unwrap_err();
        assert!(missing.contains("Product 9 does not exist"));
        assert!(missing.contains("1, 3"));

        let malformed = resolve_product("1:2:3", &products).unwrap_err();
        assert!(malformed.starts_with("Invalid target_id"));
    }

    #[test]
    fn peer_resolution_excludes_self() {
        let roster = roster();
        let actor = AgentId::new(1);

        assert_eq!(resolve_peer("2", actor, &roster), Ok(AgentId::new(2)));
        assert_eq!(resolve_peer("3:Agent 3", actor, &roster), Ok(AgentId::new(3)));

        let own = resolve_peer("1", actor, &roster).unwrap_err();
        assert!(own.contains("yourself"));
        assert!(own.contains("2, 3"));
        assert!(!own.contains("1,"));

        let missing = resolve_peer("7", actor, &roster).unwrap_err();
        assert!(missing.contains("Agent 7 does not exist"));
    }

    #[test]
    fn turn_opens_with_cycle_start() {
        assert_eq!(
            TurnStep::opening(4),
            TurnStep::AwaitingAction {
                incoming: String::from("Cycle 4 start"),
                record_incoming: false,
            }
        );
    }
}
