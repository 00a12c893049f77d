//! `SQLite` connection pool.
//!
//! One database file holds agent descriptions, agent memory, and the event
//! log for every simulation. Several simulations write concurrently, so file
//! databases run in WAL mode with a busy timeout rather than failing on a
//! locked database.
//!
//! An in-memory database (`sqlite::memory:`) lives inside a single
//! connection, so its pool is pinned to one connection that is never
//! recycled.

use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::error::DbError;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Pool settings.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// `sqlite://path/to/file.db?mode=rwc` or `sqlite::memory:`.
    pub url: String,
    /// Pool size for file databases. Ignored for in-memory ones.
    pub max_connections: u32,
    /// How long a writer waits on a locked database before erroring.
    pub busy_timeout: Duration,
}

impl SqliteConfig {
    /// Settings for `url` with the default pool size and busy timeout.
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_owned(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Set the pool size for file databases.
    #[must_use]
    pub const fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Whether the URL names an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

/// Shared pool handle.
#[derive(Clone)]
pub struct SqliteDb {
    pool: SqlitePool,
}

impl SqliteDb {
    /// Open the pool described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Config`] if the URL cannot be parsed and
    /// [`DbError::Sqlite`] if the database cannot be opened.
    pub async fn connect(config: &SqliteConfig) -> Result<Self, DbError> {
        let options: SqliteConnectOptions = config
            .url
            .parse()
            .map_err(|e: sqlx::Error| DbError::Config(format!("invalid database URL {}: {e}", config.url)))?;
        let options = options
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        let memory = config.is_memory();
        let (options, max_connections) = if memory {
            (options, 1)
        } else {
            (options.journal_mode(SqliteJournalMode::Wal), config.max_connections.max(1))
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        tracing::info!(
            url = %config.url,
            memory,
            max_connections,
            "opened SQLite store"
        );

        Ok(Self { pool })
    }

    /// Create or upgrade the schema.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Migration`] if a migration fails.
    pub async fn run_migrations(&self) -> Result<(), DbError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        tracing::info!("schema up to date");
        Ok(())
    }

    /// The underlying pool.
    pub const fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for in-flight queries, then close every connection.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("SQLite store closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_urls_are_detected() {
        assert!(SqliteConfig::new("sqlite::memory:").is_memory());
        assert!(SqliteConfig::new("sqlite://sims?mode=memory&cache=shared").is_memory());
        assert!(!SqliteConfig::new("sqlite://marcom.db?mode=rwc").is_memory());
    }
}
