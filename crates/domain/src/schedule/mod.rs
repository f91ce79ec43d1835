//! Scheduling: calendar-driven on/off control independent of telemetry.
//!
//! A [`ScheduleConfig`] holds one "on" and one "off" [`ScheduleRule`], each
//! firing at a local `HH:MM` on a set of ISO weekdays (1 = Monday,
//! 7 = Sunday) in the configured IANA timezone. The two rules are
//! independent: their times may coincide or cross midnight.

mod engine;

pub use engine::{ScheduleAction, ScheduleDecision, ScheduleEngine};

use std::collections::BTreeSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, VoltGuardError};

/// Valid ISO weekday numbers.
pub const WEEKDAYS: std::ops::RangeInclusive<u8> = 1..=7;

/// A local wall-clock time with minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScheduleTime {
    hour: u8,
    minute: u8,
}

impl ScheduleTime {
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTime`] if `hour > 23` or `minute > 59`.
    pub fn new(hour: u8, minute: u8) -> Result<Self, ValidationError> {
        if hour > 23 || minute > 59 {
            return Err(ValidationError::InvalidTime(format!("{hour:02}:{minute:02}")));
        }
        Ok(Self { hour, minute })
    }

    #[must_use]
    pub fn hour(self) -> u8 {
        self.hour
    }

    #[must_use]
    pub fn minute(self) -> u8 {
        self.minute
    }
}

impl FromStr for ScheduleTime {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidTime(s.to_string());
        let (hour, minute) = s.split_once(':').ok_or_else(invalid)?;
        let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
        if !two_digits(hour) || !two_digits(minute) {
            return Err(invalid());
        }
        let hour = hour.parse().map_err(|_| invalid())?;
        let minute = minute.parse().map_err(|_| invalid())?;
        Self::new(hour, minute).map_err(|_| invalid())
    }
}

impl TryFrom<String> for ScheduleTime {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ScheduleTime> for String {
    fn from(value: ScheduleTime) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for ScheduleTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// One calendar rule ("turn on at 07:00 on weekdays").
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleRule {
    pub enabled: bool,
    pub time: ScheduleTime,
    /// ISO weekdays, 1 = Monday.
    pub days: BTreeSet<u8>,
    /// Issue the command even if the device already is in the target state.
    #[serde(alias = "force_on", alias = "force_off")]
    pub force: bool,
}

impl ScheduleRule {
    /// An enabled, non-forced rule.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidTime`] if `time` is not `HH:MM`.
    pub fn at(time: &str, days: impl IntoIterator<Item = u8>) -> Result<Self, ValidationError> {
        Ok(Self {
            enabled: true,
            time: time.parse()?,
            days: days.into_iter().collect(),
            force: false,
        })
    }

    #[must_use]
    pub fn forced(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn validate(&self, rule: &'static str) -> Result<(), ValidationError> {
        if let Some(&day) = self.days.iter().find(|day| !WEEKDAYS.contains(day)) {
            return Err(ValidationError::WeekdayOutOfRange { rule, day });
        }
        if self.enabled && self.days.is_empty() {
            return Err(ValidationError::NoWeekdays { rule });
        }
        Ok(())
    }
}

/// Per-device schedule settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub enabled: bool,
    /// IANA timezone the rule times are expressed in.
    pub timezone: chrono_tz::Tz,
    /// Let schedule commands through while protection holds the device down.
    pub override_protection: bool,
    pub on_rule: ScheduleRule,
    pub off_rule: ScheduleRule,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            timezone: chrono_tz::Tz::UTC,
            override_protection: false,
            on_rule: ScheduleRule::default(),
            off_rule: ScheduleRule::default(),
        }
    }
}

impl ScheduleConfig {
    /// Check both rules.
    ///
    /// # Errors
    ///
    /// Returns [`VoltGuardError::Validation`] if a weekday is outside
    /// `1..=7` or an enabled rule has no weekday.
    pub fn validate(&self) -> Result<(), VoltGuardError> {
        self.on_rule.validate("on_rule")?;
        self.off_rule.validate("off_rule")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_parse_and_display_time() {
        let time: ScheduleTime = "07:05".parse().unwrap();
        assert_eq!(time.hour(), 7);
        assert_eq!(time.minute(), 5);
        assert_eq!(time.to_string(), "07:05");
    }

    #[test]
    fn should_reject_malformed_time() {
        for input in ["7:00", "24:00", "12:60", "12-00", "", "ab:cd", "12:00:00"] {
            assert!(
                input.parse::<ScheduleTime>().is_err(),
                "{input:?} should be rejected"
            );
        }
    }

    #[test]
    fn should_reject_weekday_outside_iso_range() {
        let config = ScheduleConfig {
            on_rule: ScheduleRule::at("07:00", [0, 1]).unwrap(),
            ..ScheduleConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(VoltGuardError::Validation(
                ValidationError::WeekdayOutOfRange { day: 0, .. }
            ))
        ));
    }

    #[test]
    fn should_reject_enabled_rule_without_days() {
        let config = ScheduleConfig {
            off_rule: ScheduleRule::at("22:00", []).unwrap(),
            ..ScheduleConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(VoltGuardError::Validation(ValidationError::NoWeekdays {
                rule: "off_rule"
            }))
        ));
    }

    #[test]
    fn should_accept_disabled_rule_without_days() {
        assert!(ScheduleConfig::default().validate().is_ok());
    }

    #[test]
    fn should_deserialize_config_with_timezone_and_force_alias() {
        let json = serde_json::json!({
            "enabled": true,
            "timezone": "Africa/Abidjan",
            "on_rule": { "enabled": true, "time": "07:00", "days": [1, 2, 3, 4, 5], "force_on": true },
            "off_rule": { "enabled": true, "time": "19:30", "days": [1, 2, 3, 4, 5], "force_off": false }
        });
        let config: ScheduleConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.timezone, chrono_tz::Africa::Abidjan);
        assert!(config.on_rule.force);
        assert!(!config.off_rule.force);
        assert!(!config.override_protection);
        assert_eq!(config.off_rule.time.to_string(), "19:30");
    }

    #[test]
    fn should_reject_unknown_timezone_at_deserialization() {
        let json = serde_json::json!({ "timezone": "Mars/Olympus" });
        assert!(serde_json::from_value::<ScheduleConfig>(json).is_err());
    }

    #[test]
    fn should_reject_bad_time_at_deserialization() {
        let json = serde_json::json!({
            "on_rule": { "enabled": true, "time": "25:00", "days": [1] }
        });
        assert!(serde_json::from_value::<ScheduleConfig>(json).is_err());
    }
}
