//! Automation events: what the automation did, for logs and subscribers.

use serde::{Deserialize, Serialize};

use crate::alert::Alert;
use crate::id::DeviceId;
use crate::power::{PowerAction, PowerCommand};
use crate::time::Timestamp;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AutomationEvent {
    /// The gateway acknowledged a power command.
    CommandIssued { command: PowerCommand, at: Timestamp },
    /// The gateway failed or timed out.
    CommandFailed {
        command: PowerCommand,
        reason: String,
        at: Timestamp,
    },
    /// A schedule action was dropped because protection holds the device.
    ScheduleSuppressed {
        device_id: DeviceId,
        action: PowerAction,
        at: Timestamp,
    },
    AlertRaised { alert: Alert },
    AlertResolved { alert: Alert },
    /// Per-device automation state was cleared by an operator or schedule override.
    StateReset { device_id: DeviceId, at: Timestamp },
}

impl AutomationEvent {
    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        match self {
            Self::CommandIssued { command, .. } | Self::CommandFailed { command, .. } => {
                command.device_id
            }
            Self::AlertRaised { alert } | Self::AlertResolved { alert } => alert.device_id,
            Self::ScheduleSuppressed { device_id, .. } | Self::StateReset { device_id, .. } => {
                *device_id
            }
        }
    }
}
