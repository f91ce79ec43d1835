//! Opening the `SQLite` database and applying the embedded migrations.

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use crate::error::StorageError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the database lives and how many connections to keep.
#[derive(Debug, Clone)]
pub struct Config {
    /// `sqlite:` URL, e.g. `sqlite:voltguard.db?mode=rwc` or `sqlite::memory:`.
    pub database_url: String,
    /// Ignored for in-memory databases, which always use one connection.
    pub max_connections: u32,
}

impl Config {
    #[must_use]
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: 4,
        }
    }

    /// A private in-memory database, gone once the pool is dropped.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new("sqlite::memory:")
    }

    #[must_use]
    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections.max(1);
        self
    }

    /// Connect and bring the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the URL is invalid, the database cannot be
    /// opened or a migration fails.
    pub async fn build(self) -> Result<Database, StorageError> {
        let options = SqliteConnectOptions::from_str(&self.database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);

        // the database disappears with its last connection
        let in_memory = self.database_url.contains(":memory:");
        let pool = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(self.max_connections)
                .connect_with(
                    options
                        .journal_mode(SqliteJournalMode::Wal)
                        .synchronous(SqliteSynchronous::Normal),
                )
                .await?
        };

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!(
            database_url = %self.database_url,
            in_memory,
            "database schema up to date"
        );

        Ok(Database { pool })
    }
}

/// An open, migrated connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Wait for in-flight queries and close every connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}
