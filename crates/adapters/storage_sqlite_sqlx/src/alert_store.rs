//! `SQLite` implementation of [`AlertStore`].
//!
//! The partial unique index on `(device_id, alert_type)` for non-resolved
//! rows backs the one-active-alert rule at the storage level.

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use voltguard_app::ports::AlertStore;
use voltguard_domain::alert::{Alert, AlertQuery, AlertType};
use voltguard_domain::error::VoltGuardError;
use voltguard_domain::id::{AlertId, DeviceId};

use crate::error::StorageError;
use crate::{decode_timestamp, encode_timestamp};

struct Wrapper(Alert);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Alert> {
        value.map(|w| w.0)
    }
}

fn decode_enum<T>(raw: &str) -> Result<T, sqlx::Error>
where
    T: std::str::FromStr<Err = String>,
{
    raw.parse().map_err(|err: String| sqlx::Error::Decode(err.into()))
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: uuid::Uuid = row.try_get("id")?;
        let device_id: uuid::Uuid = row.try_get("device_id")?;
        let alert_type: String = row.try_get("alert_type")?;
        let severity: String = row.try_get("severity")?;
        let status: String = row.try_get("status")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;
        let resolved_at: Option<String> = row.try_get("resolved_at")?;

        Ok(Self(Alert {
            id: AlertId::from_uuid(id),
            device_id: DeviceId::from_uuid(device_id),
            alert_type: decode_enum(&alert_type)?,
            severity: decode_enum(&severity)?,
            status: decode_enum(&status)?,
            message: row.try_get("message")?,
            measured_value: row.try_get("measured_value")?,
            threshold_value: row.try_get("threshold_value")?,
            unit: row.try_get("unit")?,
            manual_intervention: row.try_get("manual_intervention")?,
            created_at: decode_timestamp(&created_at)?,
            updated_at: decode_timestamp(&updated_at)?,
            resolved_at: resolved_at.as_deref().map(decode_timestamp).transpose()?,
            resolution_comment: row.try_get("resolution_comment")?,
        }))
    }
}

const UPSERT: &str = r"
    INSERT INTO alerts (
        id, device_id, alert_type, severity, status, message,
        measured_value, threshold_value, unit, manual_intervention,
        created_at, updated_at, resolved_at, resolution_comment
    )
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT (id) DO UPDATE SET
        severity = excluded.severity,
        status = excluded.status,
        message = excluded.message,
        measured_value = excluded.measured_value,
        threshold_value = excluded.threshold_value,
        unit = excluded.unit,
        manual_intervention = excluded.manual_intervention,
        updated_at = excluded.updated_at,
        resolved_at = excluded.resolved_at,
        resolution_comment = excluded.resolution_comment
";

const SELECT_BY_ID: &str = "SELECT * FROM alerts WHERE id = ?";
const SELECT_ACTIVE: &str =
    "SELECT * FROM alerts WHERE device_id = ? AND alert_type = ? AND status != 'resolue'";
const SELECT_MATCHING: &str = r"
    SELECT * FROM alerts
    WHERE (?1 IS NULL OR device_id = ?1)
      AND (?2 IS NULL OR created_at >= ?2)
      AND (?3 IS NULL OR created_at < ?3)
      AND (?4 IS NULL OR severity = ?4)
      AND (?5 IS NULL OR status = ?5)
    ORDER BY created_at DESC
    LIMIT ?6
";

/// `SQLite`-backed alert store.
pub struct SqliteAlertStore {
    pool: SqlitePool,
}

impl SqliteAlertStore {
    /// Create a new alert store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl AlertStore for SqliteAlertStore {
    async fn find_active(
        &self,
        device_id: DeviceId,
        alert_type: AlertType,
    ) -> Result<Option<Alert>, VoltGuardError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_ACTIVE)
            .bind(device_id.as_uuid())
            .bind(alert_type.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Wrapper::maybe(row))
    }

    async fn upsert(&self, alert: Alert) -> Result<Alert, VoltGuardError> {
        sqlx::query(UPSERT)
            .bind(alert.id.as_uuid())
            .bind(alert.device_id.as_uuid())
            .bind(alert.alert_type.as_str())
            .bind(alert.severity.as_str())
            .bind(alert.status.as_str())
            .bind(&alert.message)
            .bind(alert.measured_value)
            .bind(alert.threshold_value)
            .bind(alert.unit.as_deref())
            .bind(alert.manual_intervention)
            .bind(encode_timestamp(alert.created_at))
            .bind(encode_timestamp(alert.updated_at))
            .bind(alert.resolved_at.map(encode_timestamp))
            .bind(alert.resolution_comment.as_deref())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(alert)
    }

    async fn get_by_id(&self, id: AlertId) -> Result<Option<Alert>, VoltGuardError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Wrapper::maybe(row))
    }

    async fn query(&self, query: AlertQuery) -> Result<Vec<Alert>, VoltGuardError> {
        // negative LIMIT means unbounded in SQLite
        let limit = query
            .limit
            .map_or(-1, |limit| i64::try_from(limit).unwrap_or(i64::MAX));
        let rows: Vec<Wrapper> = sqlx::query_as(SELECT_MATCHING)
            .bind(query.device_id.map(DeviceId::as_uuid))
            .bind(query.from.map(encode_timestamp))
            .bind(query.to.map(encode_timestamp))
            .bind(query.severity.map(|s| s.as_str()))
            .bind(query.status.map(|s| s.as_str()))
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(rows.into_iter().map(|w| w.0).collect())
    }
}
