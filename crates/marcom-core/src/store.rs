//! Durable state the engine reads and writes.
//!
//! [`SimulationStore`] is the seam between the engine and persistence. The
//! SQLite implementation lives in `marcom-db`; [`InMemoryStore`] backs tests
//! and short-lived runs that do not need to survive a restart.
//!
//! All writes are appends except descriptions, which are written once per
//! (agent, simulation) pair and then only read.

use std::collections::HashMap;
use std::future::Future;

use marcom_types::{AgentDescriptions, AgentRecordKey, Event, MemoryEntry, SimulationId};
use tokio::sync::Mutex;

use crate::error::CoreError;

/// Persistence operations the engine depends on.
pub trait SimulationStore: Send + Sync {
    /// Read the cached rewritten descriptions for an agent record.
    fn load_descriptions(
        &self,
        key: AgentRecordKey,
    ) -> impl Future<Output = Result<Option<AgentDescriptions>, CoreError>> + Send;

    /// Write the rewritten descriptions for an agent record.
    fn save_descriptions(
        &self,
        key: AgentRecordKey,
        descriptions: &AgentDescriptions,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Append one memory entry.
    fn append_memory(&self, entry: &MemoryEntry) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// The newest `limit` memory entries of an agent record, oldest first.
    fn recent_memory(
        &self,
        key: AgentRecordKey,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<MemoryEntry>, CoreError>> + Send;

    /// Append one event to the log.
    fn append_event(&self, event: &Event) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Every event of a simulation, ordered by cycle then creation time.
    fn list_events(
        &self,
        simulation_id: SimulationId,
    ) -> impl Future<Output = Result<Vec<Event>, CoreError>> + Send;

    /// The cycle a simulation runs next, if it has ever completed one.
    fn load_next_cycle(
        &self,
        simulation_id: SimulationId,
    ) -> impl Future<Output = Result<Option<i64>, CoreError>> + Send;

    /// Record that every cycle before `next_cycle` has completed. The stored
    /// value never moves backwards.
    fn save_next_cycle(
        &self,
        simulation_id: SimulationId,
        next_cycle: i64,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;
}

#[derive(Debug, Default)]
struct MemoryTables {
    descriptions: HashMap<AgentRecordKey, AgentDescriptions>,
    memory: Vec<MemoryEntry>,
    events: Vec<Event>,
    next_cycle: HashMap<SimulationId, i64>,
}

/// A process-local store.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    tables: Mutex<MemoryTables>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SimulationStore for InMemoryStore {
    async fn load_descriptions(
        &self,
        key: AgentRecordKey,
    ) -> Result<Option<AgentDescriptions>, CoreError> {
        Ok(self.tables.lock().await.descriptions.get(&key).cloned())
    }

    async fn save_descriptions(
        &self,
        key: AgentRecordKey,
        descriptions: &AgentDescriptions,
    ) -> Result<(), CoreError> {
        self.tables
            .lock()
            .await
            .descriptions
            .entry(key)
            .or_insert_with(|| descriptions.clone());
        Ok(())
    }

    async fn append_memory(&self, entry: &MemoryEntry) -> Result<(), CoreError> {
        self.tables.lock().await.memory.push(entry.clone());
        Ok(())
    }

    async fn recent_memory(
        &self,
        key: AgentRecordKey,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, CoreError> {
        let tables = self.tables.lock().await;
        let mut entries: Vec<MemoryEntry> = tables
            .memory
            .iter()
            .filter(|m| m.record == key)
            .cloned()
            .collect();
        entries.sort_by_key(|m| m.created_at);
        let skip = entries.len().saturating_sub(limit);
        Ok(entries.into_iter().skip(skip).collect())
    }

    async fn append_event(&self, event: &Event) -> Result<(), CoreError> {
        self.tables.lock().await.events.push(event.clone());
        Ok(())
    }

    async fn list_events(&self, simulation_id: SimulationId) -> Result<Vec<Event>, CoreError> {
        let tables = self.tables.lock().await;
        let mut events: Vec<Event> = tables
            .events
            .iter()
            .filter(|e| e.simulation_id == simulation_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| (e.cycle, e.created_at));
        Ok(events)
    }

    async fn load_next_cycle(&self, simulation_id: SimulationId) -> Result<Option<i64>, CoreError> {
        Ok(self.tables.lock().await.next_cycle.get(&simulation_id).copied())
    }

    async fn save_next_cycle(
        &self,
        simulation_id: SimulationId,
        next_cycle: i64,
    ) -> Result<(), CoreError> {
        let mut tables = self.tables.lock().await;
        let stored = tables.next_cycle.entry(simulation_id).or_insert(next_cycle);
        *stored = (*stored).max(next_cycle);
        Ok(())
    }
}
