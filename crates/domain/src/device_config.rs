//! Automation configuration of one device, as held by the configuration store.

use serde::{Deserialize, Serialize};

use crate::error::VoltGuardError;
use crate::protection::ProtectionConfig;
use crate::schedule::ScheduleConfig;

/// Protection and schedule settings of a device. Replaced wholesale on edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub protection: ProtectionConfig,
    pub schedule: ScheduleConfig,
}

impl DeviceConfig {
    /// # Errors
    ///
    /// Returns [`VoltGuardError::Validation`] if either part is malformed.
    pub fn validate(&self) -> Result<(), VoltGuardError> {
        self.protection.validate()?;
        self.schedule.validate()
    }
}
