//! Configuration store port: per-device protection and schedule settings.

use std::future::Future;

use voltguard_domain::device_config::DeviceConfig;
use voltguard_domain::error::VoltGuardError;
use voltguard_domain::id::DeviceId;

/// Whole-object storage of [`DeviceConfig`]s.
///
/// Callers validate before [`put`](Self::put); the store never merges.
pub trait ConfigStore {
    fn get(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<Option<DeviceConfig>, VoltGuardError>> + Send;

    /// Insert or replace the configuration of `device_id`.
    fn put(
        &self,
        device_id: DeviceId,
        config: DeviceConfig,
    ) -> impl Future<Output = Result<(), VoltGuardError>> + Send;

    fn delete(&self, device_id: DeviceId)
    -> impl Future<Output = Result<(), VoltGuardError>> + Send;

    /// Every device that has a stored configuration.
    fn list_device_ids(&self) -> impl Future<Output = Result<Vec<DeviceId>, VoltGuardError>> + Send;
}

impl<T: ConfigStore + Send + Sync> ConfigStore for std::sync::Arc<T> {
    fn get(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<Option<DeviceConfig>, VoltGuardError>> + Send {
        (**self).get(device_id)
    }

    fn put(
        &self,
        device_id: DeviceId,
        config: DeviceConfig,
    ) -> impl Future<Output = Result<(), VoltGuardError>> + Send {
        (**self).put(device_id, config)
    }

    fn delete(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<(), VoltGuardError>> + Send {
        (**self).delete(device_id)
    }

    fn list_device_ids(&self) -> impl Future<Output = Result<Vec<DeviceId>, VoltGuardError>> + Send {
        (**self).list_device_ids()
    }
}
