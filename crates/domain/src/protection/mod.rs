//! Protection: automatic shutdown when a measured metric leaves its bounds.
//!
//! A [`ProtectionConfig`] is owned by a device and replaced wholesale on
//! edit. It is validated once, at the write boundary; the
//! [`ThresholdEvaluator`] and [`ProtectionStateMachine`] trust what they are
//! given.

mod evaluator;
mod state_machine;

pub use evaluator::{MetricEvent, MetricEventKind, ThresholdEvaluator};
pub use state_machine::{
    DEBOUNCE_SAMPLES, MetricRuntime, ProtectionDirective, ProtectionPhase, ProtectionStateMachine,
};

use serde::{Deserialize, Serialize};

use crate::alert::AlertType;
use crate::error::{VoltGuardError, ValidationError};

/// Allowed range for [`MetricProtection::restart_delay_minutes`].
pub const RESTART_DELAY_RANGE: std::ops::RangeInclusive<u32> = 1..=60;

/// A protected electrical or thermal quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Voltage,
    Current,
    Temperature,
}

impl Metric {
    /// Every metric, in evaluation order.
    pub const ALL: [Self; 3] = [Self::Voltage, Self::Current, Self::Temperature];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Voltage => "voltage",
            Self::Current => "current",
            Self::Temperature => "temperature",
        }
    }

    /// Alert type raised when this metric is violated.
    #[must_use]
    pub fn alert_type(self) -> AlertType {
        match self {
            Self::Voltage => AlertType::TensionAnormale,
            Self::Current => AlertType::CourantDepasse,
            Self::Temperature => AlertType::TemperatureHaute,
        }
    }

    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            Self::Voltage => "V",
            Self::Current => "A",
            Self::Temperature => "\u{b0}C",
        }
    }

    /// Whether the metric has a lower bound as well as an upper one.
    #[must_use]
    pub fn has_minimum(self) -> bool {
        matches!(self, Self::Voltage)
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Threshold and shutdown policy for one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricProtection {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Lower bound; voltage only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    pub max: f64,
    #[serde(default = "enabled_by_default")]
    pub auto_shutdown: bool,
    #[serde(default = "default_restart_delay")]
    pub restart_delay_minutes: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn enabled_by_default() -> bool {
    true
}

fn default_restart_delay() -> u32 {
    5
}

fn default_max_retries() -> u32 {
    3
}

impl MetricProtection {
    /// Upper-bound-only protection with shutdown enabled.
    #[must_use]
    pub fn upper(max: f64) -> Self {
        Self {
            enabled: true,
            min: None,
            max,
            auto_shutdown: true,
            restart_delay_minutes: default_restart_delay(),
            max_retries: default_max_retries(),
        }
    }

    /// Two-sided protection (voltage) with shutdown enabled.
    #[must_use]
    pub fn band(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            ..Self::upper(max)
        }
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn auto_shutdown(mut self, auto_shutdown: bool) -> Self {
        self.auto_shutdown = auto_shutdown;
        self
    }

    #[must_use]
    pub fn restart_delay_minutes(mut self, minutes: u32) -> Self {
        self.restart_delay_minutes = minutes;
        self
    }

    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    fn validate(&self, metric: Metric) -> Result<(), ValidationError> {
        let name = metric.as_str();
        if !self.max.is_finite() || self.min.is_some_and(|min| !min.is_finite()) {
            return Err(ValidationError::NonFiniteThreshold { metric: name });
        }
        if metric != Metric::Temperature && self.max <= 0.0 {
            return Err(ValidationError::NonPositiveMaximum { metric: name });
        }
        match (metric.has_minimum(), self.min) {
            (true, None) => return Err(ValidationError::MissingMinimum { metric: name }),
            (false, Some(_)) => return Err(ValidationError::UnexpectedMinimum { metric: name }),
            (true, Some(min)) if min >= self.max => {
                return Err(ValidationError::MinimumNotBelowMaximum { metric: name });
            }
            _ => {}
        }
        if !RESTART_DELAY_RANGE.contains(&self.restart_delay_minutes) {
            return Err(ValidationError::RestartDelayOutOfRange {
                metric: name,
                value: self.restart_delay_minutes,
            });
        }
        Ok(())
    }
}

/// Per-device protection settings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtectionConfig {
    /// Master switch; when off no metric is evaluated.
    pub enabled: bool,
    #[serde(default)]
    pub voltage: Option<MetricProtection>,
    #[serde(default)]
    pub current: Option<MetricProtection>,
    #[serde(default)]
    pub temperature: Option<MetricProtection>,
}

impl ProtectionConfig {
    /// The configured rule for `metric`, whether or not it is enabled.
    #[must_use]
    pub fn metric(&self, metric: Metric) -> Option<&MetricProtection> {
        match metric {
            Metric::Voltage => self.voltage.as_ref(),
            Metric::Current => self.current.as_ref(),
            Metric::Temperature => self.temperature.as_ref(),
        }
    }

    /// The rule for `metric` if it should be evaluated at all.
    #[must_use]
    pub fn active(&self, metric: Metric) -> Option<&MetricProtection> {
        if !self.enabled {
            return None;
        }
        self.metric(metric).filter(|rule| rule.enabled)
    }

    /// Check every configured metric rule.
    ///
    /// Rules are validated even when disabled so that re-enabling a stored
    /// config can never surface a malformed threshold.
    ///
    /// # Errors
    ///
    /// Returns [`VoltGuardError::Validation`] for the first offending rule.
    pub fn validate(&self) -> Result<(), VoltGuardError> {
        for metric in Metric::ALL {
            if let Some(rule) = self.metric(metric) {
                rule.validate(metric)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_config() -> ProtectionConfig {
        ProtectionConfig {
            enabled: true,
            voltage: Some(MetricProtection::band(200.0, 250.0)),
            current: Some(MetricProtection::upper(16.0)),
            temperature: Some(MetricProtection::upper(70.0)),
        }
    }

    #[test]
    fn should_accept_well_formed_config() {
        assert!(full_config().validate().is_ok());
    }

    #[test]
    fn should_default_to_disabled_without_rules() {
        let config = ProtectionConfig::default();
        assert!(!config.enabled);
        assert!(config.metric(Metric::Voltage).is_none());
    }

    #[test]
    fn should_hide_all_rules_when_master_switch_is_off() {
        let mut config = full_config();
        config.enabled = false;
        for metric in Metric::ALL {
            assert!(config.active(metric).is_none());
        }
    }

    #[test]
    fn should_hide_disabled_metric_rule() {
        let mut config = full_config();
        config.current = Some(MetricProtection::upper(16.0).enabled(false));
        assert!(config.active(Metric::Current).is_none());
        assert!(config.active(Metric::Voltage).is_some());
    }

    #[test]
    fn should_reject_restart_delay_above_sixty_minutes() {
        let mut config = full_config();
        config.current = Some(MetricProtection::upper(16.0).restart_delay_minutes(61));
        assert!(matches!(
            config.validate(),
            Err(VoltGuardError::Validation(
                ValidationError::RestartDelayOutOfRange { value: 61, .. }
            ))
        ));
    }

    #[test]
    fn should_reject_zero_restart_delay() {
        let mut config = full_config();
        config.temperature = Some(MetricProtection::upper(70.0).restart_delay_minutes(0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_reject_voltage_without_minimum() {
        let mut config = full_config();
        config.voltage = Some(MetricProtection::upper(250.0));
        assert!(matches!(
            config.validate(),
            Err(VoltGuardError::Validation(
                ValidationError::MissingMinimum { .. }
            ))
        ));
    }

    #[test]
    fn should_reject_minimum_on_current() {
        let mut config = full_config();
        config.current = Some(MetricProtection::band(1.0, 16.0));
        assert!(matches!(
            config.validate(),
            Err(VoltGuardError::Validation(
                ValidationError::UnexpectedMinimum { .. }
            ))
        ));
    }

    #[test]
    fn should_reject_inverted_voltage_band() {
        let mut config = full_config();
        config.voltage = Some(MetricProtection::band(250.0, 200.0));
        assert!(matches!(
            config.validate(),
            Err(VoltGuardError::Validation(
                ValidationError::MinimumNotBelowMaximum { .. }
            ))
        ));
    }

    #[test]
    fn should_reject_non_finite_threshold() {
        let mut config = full_config();
        config.current = Some(MetricProtection::upper(f64::NAN));
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_validate_disabled_rules_too() {
        let mut config = full_config();
        config.enabled = false;
        config.voltage = Some(MetricProtection::band(200.0, 250.0).restart_delay_minutes(0));
        assert!(config.validate().is_err());
    }

    #[test]
    fn should_map_metric_to_alert_type_and_unit() {
        assert_eq!(Metric::Voltage.alert_type(), AlertType::TensionAnormale);
        assert_eq!(Metric::Current.alert_type(), AlertType::CourantDepasse);
        assert_eq!(Metric::Temperature.alert_type(), AlertType::TemperatureHaute);
        assert_eq!(Metric::Voltage.unit(), "V");
    }

    #[test]
    fn should_deserialize_config_with_missing_metrics() {
        let json = serde_json::json!({
            "enabled": true,
            "voltage": {
                "enabled": true,
                "min": 200.0,
                "max": 250.0,
                "auto_shutdown": true,
                "restart_delay_minutes": 1,
                "max_retries": 3
            }
        });
        let config: ProtectionConfig = serde_json::from_value(json).unwrap();
        assert!(config.current.is_none());
        assert_eq!(config.voltage.unwrap().min, Some(200.0));
    }

    #[test]
    fn should_fill_metric_defaults_when_only_max_is_given() {
        let json = serde_json::json!({ "current": { "max": 16.0 } });
        let config: ProtectionConfig = serde_json::from_value(json).unwrap();
        assert!(!config.enabled);
        assert_eq!(config.current, Some(MetricProtection::upper(16.0)));
    }
}
