//! Power state and power commands.

use serde::{Deserialize, Serialize};

use crate::id::DeviceId;
use crate::protection::Metric;

/// Last known relay state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    On,
    Off,
    #[default]
    Unknown,
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::On => f.write_str("on"),
            Self::Off => f.write_str("off"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

/// A desired power transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerAction {
    On,
    Off,
}

impl PowerAction {
    /// The relay state the device is in once this action succeeds.
    #[must_use]
    pub fn target_state(self) -> PowerState {
        match self {
            Self::On => PowerState::On,
            Self::Off => PowerState::Off,
        }
    }

    /// Whether this action drives the relay closed.
    #[must_use]
    pub fn is_on(self) -> bool {
        matches!(self, Self::On)
    }
}

impl From<bool> for PowerAction {
    fn from(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

impl std::fmt::Display for PowerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.target_state().fmt(f)
    }
}

/// Which actor asked for a power command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "actor", rename_all = "snake_case")]
pub enum CommandOrigin {
    /// Automatic shutdown or restart driven by a metric threshold.
    Protection { metric: Metric },
    /// Calendar rule.
    Schedule,
    /// Operator toggle from the console.
    Manual,
}

impl std::fmt::Display for CommandOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Protection { metric } => write!(f, "protection({metric})"),
            Self::Schedule => f.write_str("schedule"),
            Self::Manual => f.write_str("manual"),
        }
    }
}

/// A command addressed to the device command gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerCommand {
    pub device_id: DeviceId,
    pub action: PowerAction,
    pub origin: CommandOrigin,
}
