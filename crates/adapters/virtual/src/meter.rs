//! A simulated power meter with a switchable relay.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use voltguard_domain::error::CommandError;
use voltguard_domain::id::DeviceId;
use voltguard_domain::power::PowerState;
use voltguard_domain::telemetry::{PhaseLayout, TelemetrySample, TelemetryUnavailable};
use voltguard_domain::time::Timestamp;

/// Voltage and current the meter reports on each phase while powered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Single { voltage: f64, current: f64 },
    Three([(f64, f64); 3]),
}

impl Reading {
    fn layout(self) -> PhaseLayout {
        match self {
            Self::Single { .. } => PhaseLayout::Single,
            Self::Three(_) => PhaseLayout::Three,
        }
    }
}

#[derive(Debug)]
struct MeterState {
    reading: Reading,
    temperature: Option<f64>,
    relay: PowerState,
    availability: Result<(), TelemetryUnavailable>,
    command_failure: Option<CommandError>,
}

/// A deterministic meter: it reports exactly what it was told to.
///
/// While the relay is open the load draws no current, so current reads zero
/// on every phase and active power is zero.
#[derive(Debug)]
pub struct VirtualMeter {
    device_id: DeviceId,
    name: String,
    command_latency: Duration,
    state: Mutex<MeterState>,
}

impl VirtualMeter {
    /// A monophase meter, relay closed.
    #[must_use]
    pub fn single(device_id: DeviceId, name: impl Into<String>, voltage: f64, current: f64) -> Self {
        Self::with_reading(device_id, name, Reading::Single { voltage, current })
    }

    /// A triphase meter reporting the same voltage and current on all phases.
    #[must_use]
    pub fn three(device_id: DeviceId, name: impl Into<String>, voltage: f64, current: f64) -> Self {
        Self::with_reading(device_id, name, Reading::Three([(voltage, current); 3]))
    }

    fn with_reading(device_id: DeviceId, name: impl Into<String>, reading: Reading) -> Self {
        Self {
            device_id,
            name: name.into(),
            command_latency: Duration::ZERO,
            state: Mutex::new(MeterState {
                reading,
                temperature: None,
                relay: PowerState::On,
                availability: Ok(()),
                command_failure: None,
            }),
        }
    }

    #[must_use]
    pub fn with_temperature(self, celsius: f64) -> Self {
        self.lock().temperature = Some(celsius);
        self
    }

    /// Delay every power command by `latency` before it takes effect.
    #[must_use]
    pub fn with_command_latency(mut self, latency: Duration) -> Self {
        self.command_latency = latency;
        self
    }

    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn layout(&self) -> PhaseLayout {
        self.lock().reading.layout()
    }

    #[must_use]
    pub fn relay(&self) -> PowerState {
        self.lock().relay
    }

    /// Replace the powered reading. The phase layout may change too.
    pub fn set_reading(&self, reading: Reading) {
        self.lock().reading = reading;
    }

    pub fn set_temperature(&self, celsius: Option<f64>) {
        self.lock().temperature = celsius;
    }

    /// Make the next polls fail with `reason`, or succeed again with `None`.
    pub fn set_unavailable(&self, reason: Option<TelemetryUnavailable>) {
        self.lock().availability = reason.map_or(Ok(()), Err);
    }

    /// Make the next power commands fail with `error`, or succeed again with `None`.
    pub fn fail_commands(&self, error: Option<CommandError>) {
        self.lock().command_failure = error;
    }

    /// Take a sample as of `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns the configured [`TelemetryUnavailable`] while the meter is
    /// marked unavailable.
    pub fn sample(&self, timestamp: Timestamp) -> Result<TelemetrySample, TelemetryUnavailable> {
        let state = self.lock();
        state.availability.clone()?;

        let powered = state.relay != PowerState::Off;
        let draw = |current: f64| if powered { current } else { 0.0 };
        let sample = match state.reading {
            Reading::Single { voltage, current } => {
                TelemetrySample::single(self.device_id, timestamp, voltage, draw(current))
            }
            Reading::Three(phases) => TelemetrySample::three(
                self.device_id,
                timestamp,
                phases.map(|(voltage, current)| (voltage, draw(current))),
            ),
        };
        let active_power = sample
            .phases
            .readings()
            .iter()
            .filter_map(|phase| Some(phase.voltage? * phase.current?))
            .sum();
        let sample = sample
            .with_active_power(active_power)
            .with_relay(state.relay);

        Ok(match state.temperature {
            Some(celsius) => sample.with_temperature(celsius),
            None => sample,
        })
    }

    /// Switch the relay, after the configured latency.
    ///
    /// # Errors
    ///
    /// Returns the configured [`CommandError`] and leaves the relay untouched.
    pub async fn switch(&self, on: bool) -> Result<(), CommandError> {
        if !self.command_latency.is_zero() {
            tokio::time::sleep(self.command_latency).await;
        }
        let mut state = self.lock();
        if let Some(error) = state.command_failure.clone() {
            return Err(error);
        }
        if state.availability.is_err() {
            return Err(CommandError::Unreachable);
        }
        state.relay = if on { PowerState::On } else { PowerState::Off };
        tracing::debug!(device_id = %self.device_id, relay = %state.relay, "virtual relay switched");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, MeterState> {
        // a poisoned meter only holds plain values, keep using them
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
