//! Per-device automation runtime.

use crate::power::PowerState;
use crate::protection::{Metric, MetricRuntime, ProtectionStateMachine, ThresholdEvaluator};
use crate::schedule::{ScheduleAction, ScheduleEngine};
use crate::telemetry::TelemetryUnavailable;
use crate::time::Timestamp;

/// Everything the automation remembers about one device.
///
/// Created with the device's first sample or tick, dropped when the device
/// is unassigned. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceAutomationState {
    pub current_power: PowerState,
    pub evaluator: ThresholdEvaluator,
    pub protection: ProtectionStateMachine,
    pub schedule: ScheduleEngine,
    /// Timestamp of the last accepted sample.
    pub last_sample_at: Option<Timestamp>,
    /// Set while the telemetry source reports the device unavailable.
    pub telemetry: Option<TelemetryUnavailable>,
}

impl DeviceAutomationState {
    /// Forget protection and schedule memory. The known power state and
    /// telemetry bookkeeping are facts about the device and survive.
    pub fn reset(&mut self) {
        self.evaluator = ThresholdEvaluator::default();
        self.protection.reset();
        self.schedule = ScheduleEngine::default();
    }

    #[must_use]
    pub fn violation_streak(&self, metric: Metric) -> u32 {
        self.runtime(metric).violation_streak
    }

    #[must_use]
    pub fn retries_used(&self, metric: Metric) -> u32 {
        self.runtime(metric).retries_used
    }

    #[must_use]
    pub fn cooldown_until(&self, metric: Metric) -> Option<Timestamp> {
        self.runtime(metric).cooldown_until
    }

    #[must_use]
    pub fn last_schedule_action(&self) -> Option<ScheduleAction> {
        self.schedule.last_action()
    }

    #[must_use]
    pub fn is_online(&self) -> bool {
        self.telemetry.is_none()
    }

    fn runtime(&self, metric: Metric) -> MetricRuntime {
        self.protection.runtime(metric)
    }
}
