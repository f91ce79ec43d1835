use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};

use super::{ScheduleConfig, ScheduleRule};
use crate::power::{PowerAction, PowerState};
use crate::time::{Timestamp, floor_to_minute};

/// What the calendar asks for at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleDecision {
    pub action: PowerAction,
    /// Issue regardless of the current power state.
    pub forced: bool,
}

/// A schedule command that was actually issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleAction {
    pub action: PowerAction,
    pub at: Timestamp,
}

/// Per-device schedule runtime.
///
/// Evaluation is tick-present-only: a tick that does not fall on a rule's
/// minute does nothing, and missed minutes are never backfilled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleEngine {
    last_action: Option<ScheduleAction>,
}

impl ScheduleEngine {
    /// Which rule, if any, matches `now` in the configured timezone.
    ///
    /// When both rules match the same minute the off rule wins.
    #[must_use]
    pub fn evaluate(config: &ScheduleConfig, now: Timestamp) -> Option<ScheduleDecision> {
        if !config.enabled {
            return None;
        }
        let local = now.with_timezone(&config.timezone);
        let weekday = u8::try_from(local.weekday().number_from_monday()).ok()?;
        let (hour, minute) = (local.hour(), local.minute());

        let matches = |rule: &ScheduleRule| {
            rule.enabled
                && rule.days.contains(&weekday)
                && u32::from(rule.time.hour()) == hour
                && u32::from(rule.time.minute()) == minute
        };

        if matches(&config.off_rule) {
            Some(ScheduleDecision {
                action: PowerAction::Off,
                forced: config.off_rule.force,
            })
        } else if matches(&config.on_rule) {
            Some(ScheduleDecision {
                action: PowerAction::On,
                forced: config.on_rule.force,
            })
        } else {
            None
        }
    }

    /// The decision to act on at `now`, after idempotence filtering.
    ///
    /// A non-forced decision is dropped when the device already is in the
    /// target state (`Unknown` never matches). Any decision is dropped when
    /// the same action was already issued within the same minute.
    #[must_use]
    pub fn plan(
        &self,
        config: &ScheduleConfig,
        now: Timestamp,
        current_power: PowerState,
    ) -> Option<ScheduleDecision> {
        let decision = Self::evaluate(config, now)?;
        if !decision.forced && current_power == decision.action.target_state() {
            return None;
        }
        let already_issued = self.last_action.is_some_and(|last| {
            last.action == decision.action && floor_to_minute(last.at) == floor_to_minute(now)
        });
        if already_issued {
            return None;
        }
        Some(decision)
    }

    /// Remember an issued schedule command.
    pub fn record(&mut self, action: PowerAction, at: Timestamp) {
        self.last_action = Some(ScheduleAction { action, at });
    }

    #[must_use]
    pub fn last_action(&self) -> Option<ScheduleAction> {
        self.last_action
    }
}
