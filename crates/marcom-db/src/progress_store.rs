//! Per-simulation cycle progress in the `simulation_progress` table.

use chrono::Utc;
use marcom_types::SimulationId;
use sqlx::SqlitePool;

use crate::error::DbError;
use crate::timestamp::to_micros;

/// Operations on the `simulation_progress` table.
pub struct ProgressStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ProgressStore<'a> {
    /// Create a new progress store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// The cycle `simulation_id` runs next, if it has completed one.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn load_next_cycle(&self, simulation_id: SimulationId) -> Result<Option<i64>, DbError> {
        let next: Option<i64> = sqlx::query_scalar(
            "SELECT next_cycle FROM simulation_progress WHERE simulation_id = ?1",
        )
        .bind(simulation_id.get())
        .fetch_optional(self.pool)
        .await?;
        Ok(next)
    }

    /// Record `next_cycle`, keeping the larger value if one is stored.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the upsert fails.
    pub async fn save_next_cycle(
        &self,
        simulation_id: SimulationId,
        next_cycle: i64,
    ) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO simulation_progress (simulation_id, next_cycle, updated_at)
              VALUES (?1, ?2, ?3)
              ON CONFLICT (simulation_id) DO UPDATE SET
                  next_cycle = MAX(next_cycle, excluded.next_cycle),
                  updated_at = excluded.updated_at",
        )
        .bind(simulation_id.get())
        .bind(next_cycle)
        .bind(to_micros(Utc::now()))
        .execute(self.pool)
        .await?;
        tracing::debug!(simulation_id = %simulation_id, next_cycle, "recorded cycle progress");
        Ok(())
    }
}
