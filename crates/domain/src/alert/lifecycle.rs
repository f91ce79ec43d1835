//! Alert lifecycle: `None → Nouvelle → Vue → Resolue`.

use super::{Alert, AlertSignal, AlertStatus};
use crate::error::AlertTransitionError;
use crate::id::AlertId;
use crate::time::Timestamp;

/// Result of [`AlertLifecycle::raise`].
#[derive(Debug, Clone, PartialEq)]
pub struct Raised {
    pub alert: Alert,
    /// `false` when an active alert was updated in place.
    pub created: bool,
}

/// Transition rules for alerts.
pub struct AlertLifecycle;

impl AlertLifecycle {
    /// Create a new alert from `signal`, or fold it into `active`.
    ///
    /// `active` must be the active alert for the signal's device and type,
    /// if there is one. Folding keeps the id and creation time, refreshes
    /// the measured values, keeps the highest severity seen and never clears
    /// the manual-intervention marker. An alert the operator already saw
    /// goes back to `Nouvelle` when it escalates.
    #[must_use]
    pub fn raise(active: Option<Alert>, signal: AlertSignal, now: Timestamp) -> Raised {
        match active.filter(Alert::is_active) {
            Some(mut alert) => {
                let escalated = signal.severity > alert.severity
                    || (signal.manual_intervention && !alert.manual_intervention);
                alert.severity = alert.severity.max(signal.severity);
                alert.manual_intervention |= signal.manual_intervention;
                alert.message = signal.message;
                alert.measured_value = signal.measured_value.or(alert.measured_value);
                alert.threshold_value = signal.threshold_value.or(alert.threshold_value);
                alert.unit = signal.unit.or(alert.unit);
                alert.updated_at = now;
                if escalated {
                    alert.status = AlertStatus::Nouvelle;
                }
                Raised {
                    alert,
                    created: false,
                }
            }
            None => Raised {
                alert: Alert {
                    id: AlertId::new(),
                    device_id: signal.device_id,
                    alert_type: signal.alert_type,
                    severity: signal.severity,
                    status: AlertStatus::Nouvelle,
                    message: signal.message,
                    measured_value: signal.measured_value,
                    threshold_value: signal.threshold_value,
                    unit: signal.unit,
                    manual_intervention: signal.manual_intervention,
                    created_at: now,
                    updated_at: now,
                    resolved_at: None,
                    resolution_comment: None,
                },
                created: true,
            },
        }
    }

    /// Operator acknowledged the alert. Seeing a seen alert is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`AlertTransitionError`] if the alert is already resolved.
    pub fn mark_seen(mut alert: Alert, now: Timestamp) -> Result<Alert, AlertTransitionError> {
        match alert.status {
            AlertStatus::Resolue => Err(AlertTransitionError {
                action: "mark as seen",
                from: alert.status,
            }),
            AlertStatus::Vue => Ok(alert),
            AlertStatus::Nouvelle => {
                alert.status = AlertStatus::Vue;
                alert.updated_at = now;
                Ok(alert)
            }
        }
    }

    /// Close an active alert, by an operator or on recovery.
    ///
    /// # Errors
    ///
    /// Returns [`AlertTransitionError`] if the alert is already resolved.
    pub fn resolve(
        mut alert: Alert,
        comment: Option<String>,
        now: Timestamp,
    ) -> Result<Alert, AlertTransitionError> {
        if !alert.is_active() {
            return Err(AlertTransitionError {
                action: "resolve",
                from: alert.status,
            });
        }
        alert.status = AlertStatus::Resolue;
        alert.resolved_at = Some(now);
        alert.resolution_comment = comment;
        alert.updated_at = now;
        Ok(alert)
    }
}
