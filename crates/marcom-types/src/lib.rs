//! Shared type definitions for the Marcom consumer simulation.
//!
//! This crate is the single source of truth for the entities that flow
//! between the engine, the durable store, and the service layer. Wire-facing
//! types derive `ts-rs` bindings for the web dashboard.
//!
//! # Modules
//!
//! - [`ids`] -- Typed identifiers for simulations, agents, products, events
//! - [`enums`] -- Action and event kinds
//! - [`structs`] -- Agent and product definitions, events, memory entries

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{ActionKind, EventKind};
pub use ids::{AgentId, AgentRecordKey, EventId, ProductId, SimulationId};
pub use structs::{
    AgentAttribute, AgentDescriptions, AgentProfile, Event, MemoryEntry, Product,
    SimulationDefinition, SimulationUpdate,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for the dashboard.

    #[test]
    fn export_bindings() {
        use ts_rs::TS;

        let _ = crate::ids::SimulationId::export_all();
        let _ = crate::ids::AgentId::export_all();
        let _ = crate::ids::ProductId::export_all();
        let _ = crate::ids::EventId::export_all();

        let _ = crate::enums::ActionKind::export_all();
        let _ = crate::enums::EventKind::export_all();

        let _ = crate::structs::AgentAttribute::export_all();
        let _ = crate::structs::AgentProfile::export_all();
        let _ = crate::structs::Product::export_all();
        let _ = crate::structs::SimulationDefinition::export_all();
        let _ = crate::structs::Event::export_all();
        let _ = crate::structs::SimulationUpdate::export_all();
    }
}
