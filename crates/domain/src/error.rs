//! Common error types used across the workspace.
//!
//! Each layer converts its own failures into [`VoltGuardError`] via `#[from]`.
//! Telemetry gaps and exhausted retry budgets are *not* errors: the first is
//! a value ([`TelemetryUnavailable`](crate::telemetry::TelemetryUnavailable))
//! routed into the alert lifecycle, the second a terminal protection phase.

use crate::alert::AlertStatus;

/// Top-level error shared by every voltguard crate.
#[derive(Debug, thiserror::Error)]
pub enum VoltGuardError {
    /// A configuration object was rejected at the write boundary.
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// A referenced record does not exist.
    #[error("not found")]
    NotFound(#[from] NotFoundError),

    /// An operator tried an alert transition the lifecycle forbids.
    #[error("invalid alert transition")]
    AlertTransition(#[from] AlertTransitionError),

    /// The device command gateway could not execute a power command.
    #[error("command failed")]
    Command(#[from] CommandError),

    /// A persistence adapter failed.
    #[error("storage error")]
    Storage(Box<dyn std::error::Error + Send + Sync>),
}

/// Reasons a protection or schedule configuration is rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{metric}: restart delay must be within 1..=60 minutes, got {value}")]
    RestartDelayOutOfRange { metric: &'static str, value: u32 },

    #[error("{metric}: threshold must be a finite number")]
    NonFiniteThreshold { metric: &'static str },

    #[error("{metric}: maximum must be strictly positive")]
    NonPositiveMaximum { metric: &'static str },

    #[error("{metric}: minimum must be lower than maximum")]
    MinimumNotBelowMaximum { metric: &'static str },

    #[error("{metric}: a minimum threshold is required")]
    MissingMinimum { metric: &'static str },

    #[error("{metric}: only a maximum threshold is supported")]
    UnexpectedMinimum { metric: &'static str },

    #[error("invalid time {0:?}, expected HH:MM")]
    InvalidTime(String),

    #[error("{rule}: weekday {day} is outside 1..=7")]
    WeekdayOutOfRange { rule: &'static str, day: u8 },

    #[error("{rule}: an enabled rule needs at least one weekday")]
    NoWeekdays { rule: &'static str },
}

/// A lookup by identifier found nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// Forbidden operator transition on an alert.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action} an alert in status {from}")]
pub struct AlertTransitionError {
    pub action: &'static str,
    pub from: AlertStatus,
}

/// Why the device command gateway failed to execute a power command.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("gateway did not answer within {0} ms")]
    Timeout(u64),

    #[error("device rejected the command: {0}")]
    Rejected(String),

    #[error("device is unreachable")]
    Unreachable,
}
