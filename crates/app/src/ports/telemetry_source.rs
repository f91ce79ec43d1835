//! Telemetry source port: where device readings come from.

use std::future::Future;

use voltguard_domain::id::DeviceId;
use voltguard_domain::telemetry::{TelemetrySample, TelemetryUnavailable};

/// Polls the latest reading of a device.
///
/// An unavailable device is an expected outcome, not an error: the
/// automation turns it into a connectivity alert.
pub trait TelemetrySource {
    fn poll_telemetry(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<TelemetrySample, TelemetryUnavailable>> + Send;
}

impl<T: TelemetrySource + Send + Sync> TelemetrySource for std::sync::Arc<T> {
    fn poll_telemetry(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<TelemetrySample, TelemetryUnavailable>> + Send {
        (**self).poll_telemetry(device_id)
    }
}
