//! # voltguard-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the `AlertStore` and `ConfigStore` port traits defined in `voltguard-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `voltguard-app` (for port traits) and `voltguard-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

mod alert_store;
mod config_store;
mod error;
mod pool;

pub use alert_store::SqliteAlertStore;
pub use config_store::SqliteConfigStore;
pub use error::StorageError;
pub use pool::{Config, Database};

use chrono::SecondsFormat;
use voltguard_domain::time::Timestamp;

/// Fixed-width UTC text so that SQL string comparison orders by time.
fn encode_timestamp(ts: Timestamp) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_timestamp(raw: &str) -> Result<Timestamp, sqlx::Error> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.to_utc())
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))
}
