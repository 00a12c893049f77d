//! Durable `SQLite` store for the Marcom simulation.
//!
//! Four tables hold everything a simulation needs to survive a restart:
//!
//! ```text
//! agent_info           rewritten descriptions, one row per (agent, simulation), write-once
//! agent_memory         timestamped memory lines per (agent, simulation)
//! simulation_event     append-only event log keyed by simulation and cycle
//! simulation_progress  next cycle to run, per simulation
//! ```
//!
//! # Modules
//!
//! - [`sqlite`] -- connection pool, configuration, migrations
//! - [`event_store`] -- event inserts and history queries
//! - [`agent_store`] -- descriptions and memory
//! - [`progress_store`] -- cycle progress
//! - [`store`] -- the engine's [`SimulationStore`](marcom_core::SimulationStore) over the above
//! - [`error`] -- shared error type

pub mod agent_store;
pub mod error;
pub mod event_store;
pub mod progress_store;
pub mod sqlite;
pub mod store;
mod timestamp;

pub use agent_store::AgentStore;
pub use error::DbError;
pub use event_store::{EventRow, EventStore};
pub use progress_store::ProgressStore;
pub use sqlite::{SqliteConfig, SqliteDb};
pub use store::SqliteStore;
