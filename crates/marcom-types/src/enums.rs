//! Enumeration types for the Marcom simulation.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// Action kinds
// ---------------------------------------------------------------------------

/// The closed set of moves an agent may choose on its turn.
///
/// `Buy` and `Skip` end the agent's turn for the cycle. `Message` opens a
/// sub-dialogue with another agent, after which the agent decides again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum ActionKind {
    /// Buy one of the products on offer.
    Buy,
    /// Do nothing this cycle.
    Skip,
    /// Send a message to another agent.
    Message,
}

impl ActionKind {
    /// Every action kind, in menu order.
    pub const ALL: [Self; 3] = [Self::Buy, Self::Skip, Self::Message];

    /// Canonical upper-case name used in prompts and event payloads.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Skip => "SKIP",
            Self::Message => "MESSAGE",
        }
    }

    /// Menu line shown to the agent, including the shape of the target it
    /// has to supply.
    pub const fn menu_entry(self) -> &'static str {
        match self {
            Self::Buy => {
                "BUY to buy a product (target_id needed: 'product_id:product_name', target_content: name of the product)"
            }
            Self::Skip => "SKIP to skip this cycle (target_id and target_content may be left empty)",
            Self::Message => {
                "MESSAGE to send a message to another agent (target_id needed: 'agent_id:agent_name', target_content: the message)"
            }
        }
    }

    /// Parse an action name case-insensitively.
    ///
    /// `TALK` is accepted as an alias of `MESSAGE`; earlier prompt revisions
    /// used that name and models occasionally fall back to it.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Some(Self::Buy),
            "SKIP" => Some(Self::Skip),
            "MESSAGE" | "TALK" => Some(Self::Message),
            _ => None,
        }
    }
}

impl core::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// The kind of an [`Event`](crate::Event) in the simulation log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export, export_to = "bindings/")]
pub enum EventKind {
    /// An agent's simulation description was rewritten on first run.
    Init,
    /// An agent bought a product.
    Buy,
    /// An agent skipped its turn.
    Skip,
    /// An agent sent a message to another agent.
    Message,
    /// Feedback produced after a `Buy` or `Skip`.
    ActionResponse,
}

impl EventKind {
    /// Wire and storage name of the event kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Buy => "BUY",
            Self::Skip => "SKIP",
            Self::Message => "MESSAGE",
            Self::ActionResponse => "ACTION_RESPONSE",
        }
    }

    /// Parse a stored event kind name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "INIT" => Some(Self::Init),
            "BUY" => Some(Self::Buy),
            "SKIP" => Some(Self::Skip),
            "MESSAGE" => Some(Self::Message),
            "ACTION_RESPONSE" => Some(Self::ActionResponse),
            _ => None,
        }
    }
}

impl From<ActionKind> for EventKind {
    fn from(action: ActionKind) -> Self {
        match action {
            ActionKind::Buy => Self::Buy,
            ActionKind::Skip => Self::Skip,
            ActionKind::Message => Self::Message,
        }
    }
}

impl core::fmt::Display for EventKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_parse_is_case_insensitive() {
        assert_eq!(ActionKind::parse("buy"), Some(ActionKind::Buy));
        assert_eq!(ActionKind::parse(" Skip "), Some(ActionKind::Skip));
        assert_eq!(ActionKind::parse("MeSsAgE"), Some(ActionKind::Message));
        assert_eq!(ActionKind::parse("talk"), Some(ActionKind::Message));
        assert_eq!(ActionKind::parse("dance"), None);
    }

    #[test]
    fn event_kind_names_round_trip() {
        for kind in [
            EventKind::Init,
            EventKind::Buy,
            EventKind::Skip,
            EventKind::Message,
            EventKind::ActionResponse,
        ] {
            assert_eq!(EventKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn event_kind_serde_matches_wire_names() {
        let json = serde_json::to_string(&EventKind::ActionResponse).ok();
        assert_eq!(json.as_deref(), Some("\"ACTION_RESPONSE\""));
    }
}
