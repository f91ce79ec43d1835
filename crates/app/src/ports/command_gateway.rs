//! Device command gateway port: switching device relays.

use std::future::Future;

use voltguard_domain::error::CommandError;
use voltguard_domain::id::DeviceId;

/// Sends power commands to devices.
///
/// Implementations must not retry on their own: failed commands are
/// counted against the protection retry budget by the caller.
pub trait CommandGateway {
    /// Close (`on = true`) or open the relay of `device_id`.
    fn send_power_command(
        &self,
        device_id: DeviceId,
        on: bool,
    ) -> impl Future<Output = Result<(), CommandError>> + Send;
}

impl<T: CommandGateway + Send + Sync> CommandGateway for std::sync::Arc<T> {
    fn send_power_command(
        &self,
        device_id: DeviceId,
        on: bool,
    ) -> impl Future<Output = Result<(), CommandError>> + Send {
        (**self).send_power_command(device_id, on)
    }
}
