//! Alert store port: append-or-update keyed by `(device_id, alert_type)`.

use std::future::Future;

use voltguard_domain::alert::{Alert, AlertQuery, AlertType};
use voltguard_domain::error::VoltGuardError;
use voltguard_domain::id::{AlertId, DeviceId};

/// Repository for persisting and querying [`Alert`]s.
pub trait AlertStore {
    /// The active (not resolved) alert for `(device_id, alert_type)`, if any.
    fn find_active(
        &self,
        device_id: DeviceId,
        alert_type: AlertType,
    ) -> impl Future<Output = Result<Option<Alert>, VoltGuardError>> + Send;

    /// Insert a new alert or overwrite the one with the same id.
    fn upsert(&self, alert: Alert) -> impl Future<Output = Result<Alert, VoltGuardError>> + Send;

    fn get_by_id(
        &self,
        id: AlertId,
    ) -> impl Future<Output = Result<Option<Alert>, VoltGuardError>> + Send;

    /// Alerts matching `query`, newest first, truncated to `query.limit`.
    fn query(
        &self,
        query: AlertQuery,
    ) -> impl Future<Output = Result<Vec<Alert>, VoltGuardError>> + Send;
}

impl<T: AlertStore + Send + Sync> AlertStore for std::sync::Arc<T> {
    fn find_active(
        &self,
        device_id: DeviceId,
        alert_type: AlertType,
    ) -> impl Future<Output = Result<Option<Alert>, VoltGuardError>> + Send {
        (**self).find_active(device_id, alert_type)
    }

    fn upsert(&self, alert: Alert) -> impl Future<Output = Result<Alert, VoltGuardError>> + Send {
        (**self).upsert(alert)
    }

    fn get_by_id(
        &self,
        id: AlertId,
    ) -> impl Future<Output = Result<Option<Alert>, VoltGuardError>> + Send {
        (**self).get_by_id(id)
    }

    fn query(
        &self,
        query: AlertQuery,
    ) -> impl Future<Output = Result<Vec<Alert>, VoltGuardError>> + Send {
        (**self).query(query)
    }
}
