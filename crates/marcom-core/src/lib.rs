//! The Marcom simulation engine.
//!
//! Agents take turns deciding whether to buy a product, skip, or message
//! another agent, over a bounded or unbounded number of cycles. This crate
//! holds everything between the text generator and the service layer:
//!
//! - [`agent`] -- the agent decision unit: descriptions, memory, decide/reply/feedback
//! - [`resolver`] -- tolerant target parsing and the per-turn state machine
//! - [`simulation`] -- the resumable event cursor, cycle loop, and pause/resume
//! - [`control`] -- the pause flag shared with the service layer
//! - [`store`] -- the persistence trait and an in-memory implementation
//! - [`research`] -- competitor research over a web search provider
//! - [`config`] -- YAML configuration with environment overrides

pub mod agent;
pub mod config;
pub mod context;
pub mod control;
pub mod error;
pub mod memory;
pub mod research;
pub mod resolver;
pub mod simulation;
pub mod store;

pub use agent::{Agent, Decision};
pub use config::{ConfigError, LogFormat, MarcomConfig, SearchProvider};
pub use context::{EngineContext, RosterEntry, Scene};
pub use control::SimulationControl;
pub use error::CoreError;
pub use memory::{DEFAULT_MEMORY_WINDOW, MemoryWindow};
pub use research::{CompetitorReport, Researcher, SearchResult, WebSearch};
pub use resolver::{TargetIdError, parse_target_id};
pub use simulation::Simulation;
pub use store::{InMemoryStore, SimulationStore};
