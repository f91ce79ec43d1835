//! Config service: validated, whole-object replacement of device settings.

use std::future::Future;

use voltguard_domain::device_config::DeviceConfig;
use voltguard_domain::error::VoltGuardError;
use voltguard_domain::id::DeviceId;
use voltguard_domain::protection::ProtectionConfig;
use voltguard_domain::schedule::ScheduleConfig;

use crate::ports::{AlertStore, CommandGateway, ConfigStore, EventPublisher};
use crate::supervisor::AutomationSupervisor;

/// Something that must re-read a device configuration after it changed.
pub trait ConfigReload {
    fn reload(&self, device_id: DeviceId)
    -> impl Future<Output = Result<(), VoltGuardError>> + Send;
}

impl<T: ConfigReload + Send + Sync> ConfigReload for std::sync::Arc<T> {
    fn reload(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<(), VoltGuardError>> + Send {
        (**self).reload(device_id)
    }
}

impl<G, S, C, P> ConfigReload for AutomationSupervisor<G, S, C, P>
where
    G: CommandGateway + Send + Sync + 'static,
    S: AlertStore + Send + Sync + 'static,
    C: ConfigStore + Send + Sync,
    P: EventPublisher + Send + Sync + 'static,
{
    fn reload(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<(), VoltGuardError>> + Send {
        AutomationSupervisor::reload(self, device_id)
    }
}

/// Application service for device automation settings.
pub struct ConfigService<C, R> {
    store: C,
    reload: R,
}

impl<C: ConfigStore, R: ConfigReload> ConfigService<C, R> {
    pub fn new(store: C, reload: R) -> Self {
        Self { store, reload }
    }

    /// Stored settings of `device_id`, or the defaults (everything off).
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the store.
    pub async fn get(&self, device_id: DeviceId) -> Result<DeviceConfig, VoltGuardError> {
        Ok(self.store.get(device_id).await?.unwrap_or_default())
    }

    /// Replace both parts of the settings at once.
    ///
    /// # Errors
    ///
    /// Returns [`VoltGuardError::Validation`] if the config is malformed
    /// (nothing is stored), or a storage error.
    #[tracing::instrument(skip(self, config))]
    pub async fn replace(
        &self,
        device_id: DeviceId,
        config: DeviceConfig,
    ) -> Result<DeviceConfig, VoltGuardError> {
        config.validate()?;
        self.store.put(device_id, config.clone()).await?;
        tracing::info!("device configuration replaced");
        self.reload.reload(device_id).await?;
        Ok(config)
    }

    /// Replace the protection settings, keeping the schedule.
    ///
    /// # Errors
    ///
    /// Returns [`VoltGuardError::Validation`] if the config is malformed
    /// (nothing is stored), or a storage error.
    pub async fn replace_protection(
        &self,
        device_id: DeviceId,
        protection: ProtectionConfig,
    ) -> Result<DeviceConfig, VoltGuardError> {
        let current = self.get(device_id).await?;
        self.replace(
            device_id,
            DeviceConfig {
                protection,
                ..current
            },
        )
        .await
    }

    /// Replace the schedule settings, keeping protection.
    ///
    /// # Errors
    ///
    /// Returns [`VoltGuardError::Validation`] if the config is malformed
    /// (nothing is stored), or a storage error.
    pub async fn replace_schedule(
        &self,
        device_id: DeviceId,
        schedule: ScheduleConfig,
    ) -> Result<DeviceConfig, VoltGuardError> {
        let current = self.get(device_id).await?;
        self.replace(device_id, DeviceConfig { schedule, ..current })
            .await
    }

    /// Drop the stored settings of `device_id`.
    ///
    /// # Errors
    ///
    /// Returns a storage error propagated from the store.
    #[tracing::instrument(skip(self))]
    pub async fn remove(&self, device_id: DeviceId) -> Result<(), VoltGuardError> {
        self.store.delete(device_id).await?;
        self.reload.reload(device_id).await
    }
}
