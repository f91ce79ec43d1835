//! Telemetry: normalized electrical readings from a metered device.
//!
//! A sample carries one reading per phase (one for monophase, three for
//! triphase devices) plus device-level values such as temperature.

use serde::{Deserialize, Serialize};

use crate::alert::AlertType;
use crate::id::DeviceId;
use crate::power::PowerState;
use crate::time::Timestamp;

/// Electrical layout of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseLayout {
    Single,
    Three,
}

/// Voltage and current measured on one phase.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PhaseReading {
    /// Volts.
    pub voltage: Option<f64>,
    /// Amperes.
    pub current: Option<f64>,
}

impl PhaseReading {
    #[must_use]
    pub fn new(voltage: f64, current: f64) -> Self {
        Self {
            voltage: Some(voltage),
            current: Some(current),
        }
    }
}

/// Per-phase readings, shaped by the device layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "layout", rename_all = "lowercase")]
pub enum Phases {
    Single { phase: PhaseReading },
    Three { phases: [PhaseReading; 3] },
}

impl Phases {
    #[must_use]
    pub fn layout(&self) -> PhaseLayout {
        match self {
            Self::Single { .. } => PhaseLayout::Single,
            Self::Three { .. } => PhaseLayout::Three,
        }
    }

    /// All phase readings, in phase order.
    #[must_use]
    pub fn readings(&self) -> &[PhaseReading] {
        match self {
            Self::Single { phase } => std::slice::from_ref(phase),
            Self::Three { phases } => phases,
        }
    }
}

/// One normalized reading of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub device_id: DeviceId,
    pub timestamp: Timestamp,
    pub phases: Phases,
    /// Total active power in watts.
    pub active_power: Option<f64>,
    /// Device temperature in degrees Celsius.
    pub temperature: Option<f64>,
    /// Relay state as reported by the device itself.
    pub relay: Option<PowerState>,
}

impl TelemetrySample {
    /// A monophase sample with a single voltage/current pair.
    #[must_use]
    pub fn single(device_id: DeviceId, timestamp: Timestamp, voltage: f64, current: f64) -> Self {
        Self {
            device_id,
            timestamp,
            phases: Phases::Single {
                phase: PhaseReading::new(voltage, current),
            },
            active_power: None,
            temperature: None,
            relay: None,
        }
    }

    /// A triphase sample, one `(voltage, current)` pair per phase.
    #[must_use]
    pub fn three(device_id: DeviceId, timestamp: Timestamp, phases: [(f64, f64); 3]) -> Self {
        Self {
            device_id,
            timestamp,
            phases: Phases::Three {
                phases: phases.map(|(v, i)| PhaseReading::new(v, i)),
            },
            active_power: None,
            temperature: None,
            relay: None,
        }
    }

    #[must_use]
    pub fn with_temperature(mut self, celsius: f64) -> Self {
        self.temperature = Some(celsius);
        self
    }

    #[must_use]
    pub fn with_active_power(mut self, watts: f64) -> Self {
        self.active_power = Some(watts);
        self
    }

    #[must_use]
    pub fn with_relay(mut self, relay: PowerState) -> Self {
        self.relay = Some(relay);
        self
    }

    #[must_use]
    pub fn layout(&self) -> PhaseLayout {
        self.phases.layout()
    }
}

/// Why no sample could be obtained for a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum TelemetryUnavailable {
    /// The device did not answer at all.
    Offline,
    /// The device answered with something unusable.
    CommunicationError(String),
}

impl TelemetryUnavailable {
    /// The connectivity alert this condition is reported as.
    #[must_use]
    pub fn alert_type(&self) -> AlertType {
        match self {
            Self::Offline => AlertType::HorsLigne,
            Self::CommunicationError(_) => AlertType::ErreurCommunication,
        }
    }
}

impl std::fmt::Display for TelemetryUnavailable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Offline => f.write_str("device offline"),
            Self::CommunicationError(detail) => write!(f, "communication error: {detail}"),
        }
    }
}
