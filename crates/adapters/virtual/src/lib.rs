//! # voltguard-adapter-virtual
//!
//! Simulated power meters for demos and end-to-end tests.
//!
//! A [`VirtualFleet`] owns a set of [`VirtualMeter`]s and serves both the
//! [`TelemetrySource`] and the [`CommandGateway`] ports, so the automation
//! can be run without any hardware. Readings, availability and command
//! failures are set explicitly; nothing is random.
//!
//! ## Dependency rule
//!
//! Depends on `voltguard-app` (port traits) and `voltguard-domain` only.

mod meter;

use std::collections::HashMap;
use std::sync::Arc;

use voltguard_app::ports::{CommandGateway, TelemetrySource};
use voltguard_domain::error::CommandError;
use voltguard_domain::id::DeviceId;
use voltguard_domain::telemetry::{TelemetrySample, TelemetryUnavailable};
use voltguard_domain::time::now;

pub use meter::{Reading, VirtualMeter};

/// A fixed set of simulated meters, keyed by device id.
#[derive(Debug, Default)]
pub struct VirtualFleet {
    meters: HashMap<DeviceId, Arc<VirtualMeter>>,
}

impl VirtualFleet {
    /// Add a meter, replacing any meter with the same device id.
    #[must_use]
    pub fn with_meter(mut self, meter: VirtualMeter) -> Self {
        self.meters.insert(meter.device_id(), Arc::new(meter));
        self
    }

    /// Handle on a meter, to change its reading while the fleet is shared.
    #[must_use]
    pub fn meter(&self, device_id: DeviceId) -> Option<Arc<VirtualMeter>> {
        self.meters.get(&device_id).cloned()
    }

    /// Ids of every meter, sorted.
    #[must_use]
    pub fn device_ids(&self) -> Vec<DeviceId> {
        let mut ids: Vec<_> = self.meters.keys().copied().collect();
        ids.sort();
        ids
    }
}

impl TelemetrySource for VirtualFleet {
    async fn poll_telemetry(
        &self,
        device_id: DeviceId,
    ) -> Result<TelemetrySample, TelemetryUnavailable> {
        // an unknown device never answers
        let meter = self
            .meters
            .get(&device_id)
            .ok_or(TelemetryUnavailable::Offline)?;
        meter.sample(now())
    }
}

impl CommandGateway for VirtualFleet {
    async fn send_power_command(&self, device_id: DeviceId, on: bool) -> Result<(), CommandError> {
        let meter = self
            .meters
            .get(&device_id)
            .ok_or(CommandError::Unreachable)?;
        meter.switch(on).await
    }
}
