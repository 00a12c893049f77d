//! Agent records: rewritten descriptions and durable memory.
//!
//! Both tables are keyed by the (agent, simulation) pair. Descriptions are
//! write-once; memory is an append-only log replayed newest-N on resume.

use chrono::Utc;
use marcom_types::{AgentDescriptions, AgentRecordKey, MemoryEntry};
use sqlx::SqlitePool;

use crate::error::DbError;
use crate::timestamp::{from_micros, to_micros};

/// Operations on the `agent_info` and `agent_memory` tables.
pub struct AgentStore<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AgentStore<'a> {
    /// Create a new agent store bound to a connection pool.
    pub const fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// The stored descriptions for `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails.
    pub async fn load_descriptions(
        &self,
        key: AgentRecordKey,
    ) -> Result<Option<AgentDescriptions>, DbError> {
        let row = sqlx::query_as::<_, DescriptionRow>(
            r"SELECT second_person, third_person
              FROM agent_info
              WHERE agent_id = ?1 AND simulation_id = ?2",
        )
        .bind(key.agent_id.get())
        .bind(key.simulation_id.get())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(|r| AgentDescriptions {
            second_person: r.second_person,
            third_person: r.third_person,
        }))
    }

    /// Store descriptions for `key` unless some are already stored.
    ///
    /// Returns whether a row was written.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the insert fails.
    pub async fn save_descriptions(
        &self,
        key: AgentRecordKey,
        descriptions: &AgentDescriptions,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            r"INSERT INTO agent_info (agent_id, simulation_id, second_person, third_person, created_at)
              VALUES (?1, ?2, ?3, ?4, ?5)
              ON CONFLICT (agent_id, simulation_id) DO NOTHING",
        )
        .bind(key.agent_id.get())
        .bind(key.simulation_id.get())
        .bind(&descriptions.second_person)
        .bind(&descriptions.third_person)
        .bind(to_micros(Utc::now()))
        .execute(self.pool)
        .await?;

        let written = result.rows_affected() > 0;
        if !written {
            tracing::debug!(record = %key, "Descriptions already stored, keeping the original");
        }
        Ok(written)
    }

    /// Append one memory entry.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the insert fails.
    pub async fn append_memory(&self, entry: &MemoryEntry) -> Result<(), DbError> {
        sqlx::query(
            r"INSERT INTO agent_memory (agent_id, simulation_id, content, created_at)
              VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(entry.record.agent_id.get())
        .bind(entry.record.simulation_id.get())
        .bind(&entry.content)
        .bind(to_micros(entry.created_at))
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// The newest `limit` memory entries for `key`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Sqlite`] if the query fails and
    /// [`DbError::CorruptRow`] if a timestamp is out of range.
    pub async fn recent_memory(
        &self,
        key: AgentRecordKey,
        limit: usize,
    ) -> Result<Vec<MemoryEntry>, DbError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut rows = sqlx::query_as::<_, MemoryRow>(
            r"SELECT content, created_at
              FROM agent_memory
              WHERE agent_id = ?1 AND simulation_id = ?2
              ORDER BY created_at DESC, seq DESC
              LIMIT ?3",
        )
        .bind(key.agent_id.get())
        .bind(key.simulation_id.get())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        rows.reverse();

        rows.into_iter()
            .map(|row| {
                Ok(MemoryEntry {
                    record: key,
                    content: row.content,
                    created_at: from_micros("agent_memory", row.created_at)?,
                })
            })
            .collect()
    }
}

#[derive(sqlx::FromRow)]
struct DescriptionRow {
    second_person: String,
    third_person: String,
}

#[derive(sqlx::FromRow)]
struct MemoryRow {
    content: String,
    created_at: i64,
}
