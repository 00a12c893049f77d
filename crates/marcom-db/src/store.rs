//! [`SimulationStore`] backed by `SQLite`.

use marcom_core::{CoreError, SimulationStore};
use marcom_types::{AgentDescriptions, AgentRecordKey, Event, MemoryEntry, SimulationId};

use crate::agent_store::AgentStore;
use crate::error::DbError;
use crate::event_store::EventStore;
use crate::progress_store::ProgressStore;
use crate::sqlite::SqliteDb;

/// The engine's durable store.
#[derive(Clone)]
pub struct SqliteStore {
    db: SqliteDb,
}

impl SqliteStore {
    /// Wrap a connected (and migrated) database.
    pub const fn new(db: SqliteDb) -> Self {
        Self { db }
    }

    /// The underlying database handle.
    pub const fn db(&self) -> &SqliteDb {
        &self.db
    }

    fn agents(&self) -> AgentStore<'_> {
        AgentStore::new(self.db.pool())
    }

    fn events(&self) -> EventStore<'_> {
        EventStore::new(self.db.pool())
    }

    fn progress(&self) -> ProgressStore<'_> {
        ProgressStore::new(self.db.pool())
    }
}

fn store_error(e: DbError) -> CoreError {
    CoreError::Store(e.to_string())
}

impl SimulationStore for SqliteStore {
    async fn load_descriptions(
        &self,
        key: AgentRecordKey,
    ) -> Result<Option<AgentDescriptions>, CoreError> {
        self.agents().load_descriptions(key).await.map_err(store_error)
    }

    async fn save_descriptions(
        &self,
        key: AgentRecordKey,
        descriptions: &AgentDescriptions,
    ) -> Result<(), CoreError> {
        self.agents()
            .save_descriptions(key, descriptions)
            .await
            .map(|_| ())
            .map_err(store_error)
    }

    async fn append_memory(&self, entry: &MemoryEntry) -> Result<(), CoreError> {
        self.agents().append_memory(entry).await.map_err(store_error)
    }

    async fn recent_memory(
        &self,
        key: AgentRecordKey,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, CoreError> {
        self.agents().recent_memory(key, limit).await.map_err(store_error)
    }

    async fn append_event(&self, event: &Event) -> Result<(), CoreError> {
        self.events().insert(event).await.map_err(store_error)
    }

    async fn list_events(&self, simulation_id: SimulationId) -> Result<Vec<Event>, CoreError> {
        self.events()
            .events_for_simulation(simulation_id)
            .await
            .map_err(store_error)
    }

    async fn load_next_cycle(&self, simulation_id: SimulationId) -> Result<Option<i64>, CoreError> {
        self.progress()
            .load_next_cycle(simulation_id)
            .await
            .map_err(store_error)
    }

    async fn save_next_cycle(
        &self,
        simulation_id: SimulationId,
        next_cycle: i64,
    ) -> Result<(), CoreError> {
        self.progress()
            .save_next_cycle(simulation_id, next_cycle)
            .await
            .map_err(store_error)
    }
}
