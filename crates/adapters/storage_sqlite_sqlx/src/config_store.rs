//! `SQLite` implementation of [`ConfigStore`].
//!
//! Protection and schedule parts are stored as JSON documents so that the
//! table does not follow every field of the domain types.

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use voltguard_app::ports::ConfigStore;
use voltguard_domain::device_config::DeviceConfig;
use voltguard_domain::error::VoltGuardError;
use voltguard_domain::id::DeviceId;
use voltguard_domain::time::now;

use crate::encode_timestamp;
use crate::error::StorageError;

struct Wrapper(DeviceConfig);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let protection: String = row.try_get("protection")?;
        let schedule: String = row.try_get("schedule")?;

        Ok(Self(DeviceConfig {
            protection: serde_json::from_str(&protection)
                .map_err(|err| sqlx::Error::Decode(Box::new(err)))?,
            schedule: serde_json::from_str(&schedule)
                .map_err(|err| sqlx::Error::Decode(Box::new(err)))?,
        }))
    }
}

const UPSERT: &str = r"
    INSERT INTO device_configs (device_id, protection, schedule, updated_at)
    VALUES (?, ?, ?, ?)
    ON CONFLICT (device_id) DO UPDATE SET
        protection = excluded.protection,
        schedule = excluded.schedule,
        updated_at = excluded.updated_at
";
const SELECT_BY_DEVICE: &str =
    "SELECT protection, schedule FROM device_configs WHERE device_id = ?";
const DELETE_BY_DEVICE: &str = "DELETE FROM device_configs WHERE device_id = ?";
const SELECT_DEVICE_IDS: &str = "SELECT device_id FROM device_configs ORDER BY device_id";

/// `SQLite`-backed per-device configuration store.
pub struct SqliteConfigStore {
    pool: SqlitePool,
}

impl SqliteConfigStore {
    /// Create a new configuration store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl ConfigStore for SqliteConfigStore {
    async fn get(&self, device_id: DeviceId) -> Result<Option<DeviceConfig>, VoltGuardError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_DEVICE)
            .bind(device_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(row.map(|w| w.0))
    }

    async fn put(&self, device_id: DeviceId, config: DeviceConfig) -> Result<(), VoltGuardError> {
        let protection = serde_json::to_string(&config.protection).map_err(StorageError::from)?;
        let schedule = serde_json::to_string(&config.schedule).map_err(StorageError::from)?;

        sqlx::query(UPSERT)
            .bind(device_id.as_uuid())
            .bind(protection)
            .bind(schedule)
            .bind(encode_timestamp(now()))
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        tracing::debug!(%device_id, "device configuration stored");
        Ok(())
    }

    async fn delete(&self, device_id: DeviceId) -> Result<(), VoltGuardError> {
        sqlx::query(DELETE_BY_DEVICE)
            .bind(device_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(())
    }

    async fn list_device_ids(&self) -> Result<Vec<DeviceId>, VoltGuardError> {
        let ids: Vec<uuid::Uuid> = sqlx::query_scalar(SELECT_DEVICE_IDS)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(ids.into_iter().map(DeviceId::from_uuid).collect())
    }
}
