//! Event store operations for the `simulation_event` table.
//!
//! Events are the source of truth for a simulation's history. The table is
//! append-only (update and delete are rejected by triggers) and is read back
//! ordered by cycle, then creation time.

use marcom_types::{AgentId, Event, EventId, EventKind, SimulationId};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::DbError;
use crate::timestamp::{from_micros, to_micros};

const TABLE: &str = "simulation_event";

/// Operations on the `simulation_event` table.
pub struct EventStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> EventStore<'a> {
    /// Create a new event store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one event.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the insert fails, including when an
    /// event with the same id already exists.
    pub async fn insert(&self, event: &Event) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO simulation_event (id, simulation_id, agent_id, kind, content, cycle, created_at)
              VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(event.id.to_string())
        .bind(event.simulation_id.get())
        .bind(event.agent_id.map(AgentId::get))
        .bind(event.kind.as_str())
        .bind(&event.content)
        .bind(event.cycle)
        .bind(to_micros(event.created_at))
        .execute(self.pool)
        .await?;
        tracing::debug!(
            simulation_id = %event.simulation_id,
            cycle = event.cycle,
            kind = %event.kind,
            "Inserted event"
        );
        Ok(())
    }

    /// Every event of a simulation, ordered by cycle then creation time.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails and
    /// [`DbError::CorruptRow`] if a stored row cannot be decoded.
    pub async fn events_for_simulation(
        &self,
        simulation_id: SimulationId,
    ) -> Result<Vec<Event>, DbError> {
        let rows = sqlx::query_as::<_, EventRow>(
            r"SELECT id, simulation_id, agent_id, kind, content, cycle, created_at
              FROM simulation_event
              WHERE simulation_id = ?1
              ORDER BY cycle, created_at, seq",
        )
        .bind(simulation_id.get())
        .fetch_all(self.pool)
        .await?;

        rows.into_iter().map(Event::try_from).collect()
    }
}

/// A row from the `simulation_event` table.
///
/// Uses runtime types rather than compile-time checked types to
/// avoid requiring a live database during builds.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EventRow {
    /// Event UUID in hyphenated text form.
    pub id: String,
    /// Owning simulation.
    pub simulation_id: i64,
    /// Acting agent, if any.
    pub agent_id: Option<i64>,
    /// Event kind name.
    pub kind: String,
    /// Kind-specific payload.
    pub content: String,
    /// Cycle number.
    pub cycle: i64,
    /// Creation time in microseconds since the epoch.
    pub created_at: i64,
}

impl TryFrom<EventRow> for Event {
    type Error = DbError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| DbError::corrupt(TABLE, format!("event id {}: {e}", row.id)))?;
        let kind = EventKind::parse(&row.kind)
            .ok_or_else(|| DbError::corrupt(TABLE, format!("unknown event kind {}", row.kind)))?;
        Ok(Self {
            id: EventId::from(id),
            simulation_id: SimulationId::new(row.simulation_id),
            agent_id: row.agent_id.map(AgentId::new),
            kind,
            content: row.content,
            cycle: row.cycle,
            created_at: from_micros(TABLE, row.created_at)?,
        })
    }
}
