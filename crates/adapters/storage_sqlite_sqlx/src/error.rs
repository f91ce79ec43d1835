//! Failures of the `SQLite` adapter, surfaced as [`VoltGuardError::Storage`].

use voltguard_domain::error::VoltGuardError;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("sqlite query failed")]
    Database(#[source] sqlx::Error),

    /// A write broke a uniqueness rule, e.g. a second active alert of the
    /// same type for one device.
    #[error("constraint violated: {constraint}")]
    Constraint {
        constraint: String,
        #[source]
        source: sqlx::Error,
    },

    /// A protection or schedule document could not be (de)serialized.
    #[error("device configuration document is not valid")]
    Document(#[from] serde_json::Error),

    #[error("schema migration failed")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for StorageError {
    fn from(source: sqlx::Error) -> Self {
        let constraint = match &source {
            sqlx::Error::Database(db) if db.is_unique_violation() => db.message().to_string(),
            _ => return Self::Database(source),
        };
        Self::Constraint { constraint, source }
    }
}

impl From<StorageError> for VoltGuardError {
    fn from(err: StorageError) -> Self {
        Self::Storage(Box::new(err))
    }
}
