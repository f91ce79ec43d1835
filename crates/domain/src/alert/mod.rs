//! Alerts: operator-visible, deduplicated records of abnormal conditions.
//!
//! At most one *active* alert (status `nouvelle` or `vue`) exists per
//! `(device_id, alert_type)`. Repeat signals update that alert in place;
//! resolved alerts are kept for history and statistics.

mod lifecycle;

pub use lifecycle::{AlertLifecycle, Raised};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::{AlertId, DeviceId};
use crate::power::PowerAction;
use crate::protection::Metric;
use crate::telemetry::TelemetryUnavailable;
use crate::time::Timestamp;

/// Relative excess over a threshold above which a violation is critical.
pub const CRITICAL_EXCESS_RATIO: f64 = 0.2;

/// Kind of condition an alert reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    SeuilDepasse,
    HorsLigne,
    ErreurCommunication,
    MaintenanceRequise,
    ProtectionDeclenchee,
    TemperatureHaute,
    TensionAnormale,
    CourantDepasse,
}

impl AlertType {
    pub const ALL: [Self; 8] = [
        Self::SeuilDepasse,
        Self::HorsLigne,
        Self::ErreurCommunication,
        Self::MaintenanceRequise,
        Self::ProtectionDeclenchee,
        Self::TemperatureHaute,
        Self::TensionAnormale,
        Self::CourantDepasse,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SeuilDepasse => "seuil_depasse",
            Self::HorsLigne => "hors_ligne",
            Self::ErreurCommunication => "erreur_communication",
            Self::MaintenanceRequise => "maintenance_requise",
            Self::ProtectionDeclenchee => "protection_declenchee",
            Self::TemperatureHaute => "temperature_haute",
            Self::TensionAnormale => "tension_anormale",
            Self::CourantDepasse => "courant_depasse",
        }
    }

    /// Device offline or unreadable.
    #[must_use]
    pub fn is_connectivity(self) -> bool {
        matches!(self, Self::HorsLigne | Self::ErreurCommunication)
    }
}

impl std::fmt::Display for AlertType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown alert type {s:?}"))
    }
}

/// Ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critique,
}

impl Severity {
    /// Severity of a threshold violation.
    ///
    /// Critical when the device was shut down or the value exceeds the
    /// threshold by more than [`CRITICAL_EXCESS_RATIO`].
    #[must_use]
    pub fn for_violation(value: f64, threshold: f64, shutdown: bool) -> Self {
        if shutdown {
            return Self::Critique;
        }
        let excess = if threshold == 0.0 {
            f64::INFINITY
        } else {
            (value - threshold).abs() / threshold.abs()
        };
        if excess > CRITICAL_EXCESS_RATIO {
            Self::Critique
        } else {
            Self::Warning
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Critique => "critique",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "info" => Ok(Self::Info),
            "warning" => Ok(Self::Warning),
            "critique" => Ok(Self::Critique),
            other => Err(format!("unknown severity {other:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    #[default]
    Nouvelle,
    Vue,
    Resolue,
}

impl AlertStatus {
    /// `nouvelle` and `vue` count against the one-active-alert rule.
    #[must_use]
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Resolue)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nouvelle => "nouvelle",
            Self::Vue => "vue",
            Self::Resolue => "resolue",
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nouvelle" => Ok(Self::Nouvelle),
            "vue" => Ok(Self::Vue),
            "resolue" => Ok(Self::Resolue),
            other => Err(format!("unknown alert status {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub device_id: DeviceId,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub status: AlertStatus,
    pub message: String,
    pub measured_value: Option<f64>,
    pub threshold_value: Option<f64>,
    pub unit: Option<String>,
    /// Automation gave up; an operator has to clear the device.
    pub manual_intervention: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub resolved_at: Option<Timestamp>,
    pub resolution_comment: Option<String>,
}

impl Alert {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Request to raise or refresh an alert, produced by the automation.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertSignal {
    pub device_id: DeviceId,
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    pub measured_value: Option<f64>,
    pub threshold_value: Option<f64>,
    pub unit: Option<String>,
    pub manual_intervention: bool,
}

impl AlertSignal {
    /// A metric left its bounds.
    #[must_use]
    pub fn violation(
        device_id: DeviceId,
        metric: Metric,
        value: f64,
        threshold: f64,
        shutdown: bool,
    ) -> Self {
        let unit = metric.unit();
        let message = if shutdown {
            format!("{metric} {value:.1} {unit} crossed {threshold:.1} {unit}, device switched off")
        } else {
            format!("{metric} {value:.1} {unit} crossed {threshold:.1} {unit}")
        };
        Self {
            device_id,
            alert_type: metric.alert_type(),
            severity: Severity::for_violation(value, threshold, shutdown),
            message,
            measured_value: Some(value),
            threshold_value: Some(threshold),
            unit: Some(unit.to_string()),
            manual_intervention: false,
        }
    }

    /// Protection spent its retry budget on `metric`.
    #[must_use]
    pub fn escalation(device_id: DeviceId, metric: Metric, value: f64, threshold: f64) -> Self {
        let unit = metric.unit();
        Self {
            device_id,
            alert_type: metric.alert_type(),
            severity: Severity::Critique,
            message: format!(
                "{metric} {value:.1} {unit} still out of bounds after automatic restarts, manual intervention required"
            ),
            measured_value: Some(value),
            threshold_value: Some(threshold),
            unit: Some(unit.to_string()),
            manual_intervention: true,
        }
    }

    /// No usable telemetry from the device.
    #[must_use]
    pub fn connectivity(device_id: DeviceId, reason: &TelemetryUnavailable) -> Self {
        Self {
            device_id,
            alert_type: reason.alert_type(),
            severity: Severity::Critique,
            message: reason.to_string(),
            measured_value: None,
            threshold_value: None,
            unit: None,
            manual_intervention: false,
        }
    }

    /// A schedule command was skipped because protection holds the device.
    #[must_use]
    pub fn maintenance(device_id: DeviceId, skipped: PowerAction) -> Self {
        Self {
            device_id,
            alert_type: AlertType::MaintenanceRequise,
            severity: Severity::Info,
            message: format!("scheduled power {skipped} skipped while protection holds the device"),
            measured_value: None,
            threshold_value: None,
            unit: None,
            manual_intervention: false,
        }
    }
}

/// Filter for alert listings and statistics. Empty fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertQuery {
    pub device_id: Option<DeviceId>,
    /// Inclusive lower bound on `created_at`.
    pub from: Option<Timestamp>,
    /// Exclusive upper bound on `created_at`.
    pub to: Option<Timestamp>,
    pub severity: Option<Severity>,
    pub status: Option<AlertStatus>,
    pub limit: Option<usize>,
}

impl AlertQuery {
    #[must_use]
    pub fn for_device(device_id: DeviceId) -> Self {
        Self {
            device_id: Some(device_id),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn between(mut self, from: Timestamp, to: Timestamp) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    #[must_use]
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    #[must_use]
    pub fn with_status(mut self, status: AlertStatus) -> Self {
        self.status = Some(status);
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `alert` passes every filter (the limit is not applied here).
    #[must_use]
    pub fn matches(&self, alert: &Alert) -> bool {
        self.device_id.is_none_or(|id| id == alert.device_id)
            && self.from.is_none_or(|from| alert.created_at >= from)
            && self.to.is_none_or(|to| alert.created_at < to)
            && self.severity.is_none_or(|s| s == alert.severity)
            && self.status.is_none_or(|s| s == alert.status)
    }
}

/// Alert counts for reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertStatistics {
    pub total: usize,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_status: BTreeMap<AlertStatus, usize>,
}

impl AlertStatistics {
    #[must_use]
    pub fn from_alerts<'a>(alerts: impl IntoIterator<Item = &'a Alert>) -> Self {
        alerts.into_iter().fold(Self::default(), |mut stats, alert| {
            stats.total += 1;
            *stats.by_severity.entry(alert.severity).or_default() += 1;
            *stats.by_status.entry(alert.status).or_default() += 1;
            stats
        })
    }

    #[must_use]
    pub fn active(&self) -> usize {
        self.by_status
            .iter()
            .filter(|(status, _)| status.is_active())
            .map(|(_, count)| count)
            .sum()
    }
}
