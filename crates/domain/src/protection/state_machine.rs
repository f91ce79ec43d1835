//! Protection state machine: shutdown, cooldown, restart and retry budget.
//!
//! Per metric:
//!
//! ```text
//! Normal ──violation──▶ Violating ──streak ≥ 2──▶ (shutdown) ──▶ Cooldown
//!    ▲                     │                                        │ elapsed
//!    └──── recovery ───────┴──────────── recovery ◀── Restarted ◀───┘
//!                                                        │ violation, budget spent
//!                                                        ▼
//!                                                  RetryExhausted
//! ```
//!
//! The machine never performs IO. It returns [`ProtectionDirective`]s that
//! the orchestrator executes, and is told about gateway failures through
//! [`ProtectionStateMachine::on_command_failed`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Metric, MetricEvent, MetricEventKind, MetricProtection, ProtectionConfig};
use crate::power::PowerAction;
use crate::time::{Timestamp, plus_minutes};

/// Consecutive violating samples required before acting.
pub const DEBOUNCE_SAMPLES: u32 = 2;

/// Where a metric stands in the protection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectionPhase {
    #[default]
    Normal,
    Violating,
    Cooldown,
    /// Restart issued, waiting for the next sample to confirm recovery.
    Restarted,
    RetryExhausted,
}

impl ProtectionPhase {
    /// Phases during which samples for the metric are ignored and schedule
    /// commands conflict with protection.
    #[must_use]
    pub fn is_holding(self) -> bool {
        matches!(self, Self::Cooldown | Self::RetryExhausted)
    }
}

/// Runtime counters of one metric on one device.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricRuntime {
    pub phase: ProtectionPhase,
    pub violation_streak: u32,
    pub retries_used: u32,
    pub cooldown_until: Option<Timestamp>,
    /// Last violating value and the bound it crossed, kept for escalation.
    pub last_value: Option<f64>,
    pub last_threshold: Option<f64>,
}

/// Something the orchestrator must do on behalf of protection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProtectionDirective {
    /// Send a power command attributed to `metric`.
    Power { metric: Metric, action: PowerAction },
    /// Raise or update the metric alert.
    RaiseAlert {
        metric: Metric,
        value: f64,
        threshold: f64,
        shutdown: bool,
    },
    /// Resolve the active metric alert, if any.
    ResolveAlert { metric: Metric },
    /// Escalate the metric alert: retry budget spent, operator must act.
    Escalate {
        metric: Metric,
        value: f64,
        threshold: f64,
    },
}

/// Protection state of every metric of one device.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProtectionStateMachine {
    metrics: BTreeMap<Metric, MetricRuntime>,
}

impl ProtectionStateMachine {
    /// Counters for `metric` (all zero if it never moved).
    #[must_use]
    pub fn runtime(&self, metric: Metric) -> MetricRuntime {
        self.metrics.get(&metric).copied().unwrap_or_default()
    }

    #[must_use]
    pub fn phase(&self, metric: Metric) -> ProtectionPhase {
        self.runtime(metric).phase
    }

    /// Whether samples for `metric` should be evaluated at all.
    #[must_use]
    pub fn accepts_samples(&self, metric: Metric) -> bool {
        !self.phase(metric).is_holding()
    }

    /// Whether any metric holds the device down (cooldown or exhausted).
    #[must_use]
    pub fn is_holding(&self) -> bool {
        self.metrics.values().any(|rt| rt.phase.is_holding())
    }

    /// Whether any metric needs an operator.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.metrics
            .values()
            .any(|rt| rt.phase == ProtectionPhase::RetryExhausted)
    }

    /// Forget every counter; used for manual and schedule overrides.
    pub fn reset(&mut self) {
        self.metrics.clear();
    }

    /// Align the counters with a replaced configuration.
    ///
    /// Metrics still protected by `config` keep their phase, cooldown and
    /// retry count. Counters of removed or disabled metrics are dropped and
    /// their alerts resolved, except for exhausted metrics, which wait for a
    /// reset. If a dropped cooldown was the only thing holding the device
    /// down, the pending restart is issued now.
    pub fn retain_configured(&mut self, config: &ProtectionConfig) -> Vec<ProtectionDirective> {
        let dropped: Vec<(Metric, ProtectionPhase)> = self
            .metrics
            .iter()
            .filter(|(metric, rt)| {
                config.active(**metric).is_none() && rt.phase != ProtectionPhase::RetryExhausted
            })
            .map(|(metric, rt)| (*metric, rt.phase))
            .collect();

        let mut directives = Vec::with_capacity(dropped.len() + 1);
        for (metric, _) in &dropped {
            self.metrics.remove(metric);
            directives.push(ProtectionDirective::ResolveAlert { metric: *metric });
        }
        let released = dropped
            .iter()
            .find(|(_, phase)| *phase == ProtectionPhase::Cooldown);
        if let Some((metric, _)) = released
            && !self.is_holding()
        {
            directives.push(ProtectionDirective::Power {
                metric: *metric,
                action: PowerAction::On,
            });
        }
        directives
    }

    /// Feed one evaluator event.
    pub fn on_event(
        &mut self,
        event: &MetricEvent,
        rule: &MetricProtection,
        now: Timestamp,
    ) -> Vec<ProtectionDirective> {
        let metric = event.metric;
        let rt = self.metrics.entry(metric).or_default();
        if rt.phase.is_holding() {
            return Vec::new();
        }

        match event.kind {
            MetricEventKind::Recovery => match rt.phase {
                ProtectionPhase::Violating | ProtectionPhase::Restarted => {
                    *rt = MetricRuntime::default();
                    vec![ProtectionDirective::ResolveAlert { metric }]
                }
                _ => Vec::new(),
            },
            MetricEventKind::Violation => {
                rt.last_value = Some(event.value);
                rt.last_threshold = Some(event.threshold);

                if rt.phase == ProtectionPhase::Restarted {
                    if rt.retries_used >= rule.max_retries {
                        return exhaust(metric, rt, true);
                    }
                    rt.violation_streak = 0;
                }

                rt.phase = ProtectionPhase::Violating;
                rt.violation_streak += 1;
                if rt.violation_streak < DEBOUNCE_SAMPLES {
                    return Vec::new();
                }

                if !rule.auto_shutdown {
                    return vec![ProtectionDirective::RaiseAlert {
                        metric,
                        value: event.value,
                        threshold: event.threshold,
                        shutdown: false,
                    }];
                }

                rt.violation_streak = 0;
                if rt.retries_used >= rule.max_retries {
                    return exhaust(metric, rt, true);
                }
                rt.phase = ProtectionPhase::Cooldown;
                rt.cooldown_until = Some(plus_minutes(now, rule.restart_delay_minutes));
                vec![
                    ProtectionDirective::Power {
                        metric,
                        action: PowerAction::Off,
                    },
                    ProtectionDirective::RaiseAlert {
                        metric,
                        value: event.value,
                        threshold: event.threshold,
                        shutdown: true,
                    },
                ]
            }
        }
    }

    /// Advance cooldown timers.
    ///
    /// Metrics whose cooldown elapsed move to `Restarted` and a single `On`
    /// command is emitted, unless another metric still holds the device
    /// down, in which case nothing happens until that one releases too.
    pub fn on_timer(&mut self, now: Timestamp) -> Vec<ProtectionDirective> {
        let elapsed: Vec<Metric> = self
            .metrics
            .iter()
            .filter(|(_, rt)| {
                rt.phase == ProtectionPhase::Cooldown
                    && rt.cooldown_until.is_some_and(|until| until <= now)
            })
            .map(|(metric, _)| *metric)
            .collect();
        let Some(&first) = elapsed.first() else {
            return Vec::new();
        };

        let still_holding = self
            .metrics
            .iter()
            .any(|(metric, rt)| rt.phase.is_holding() && !elapsed.contains(metric));
        if still_holding {
            return Vec::new();
        }

        for metric in &elapsed {
            if let Some(rt) = self.metrics.get_mut(metric) {
                rt.phase = ProtectionPhase::Restarted;
                rt.cooldown_until = None;
                rt.retries_used += 1;
            }
        }
        vec![ProtectionDirective::Power {
            metric: first,
            action: PowerAction::On,
        }]
    }

    /// The gateway failed to execute a protection command.
    ///
    /// A failure consumes one retry, exactly like a restart that did not
    /// clear the fault.
    pub fn on_command_failed(
        &mut self,
        metric: Metric,
        action: PowerAction,
        config: &ProtectionConfig,
        now: Timestamp,
    ) -> Vec<ProtectionDirective> {
        match action {
            PowerAction::Off => {
                let max_retries = config.metric(metric).map_or(0, |r| r.max_retries);
                let rt = self.metrics.entry(metric).or_default();
                rt.retries_used += 1;
                if rt.phase == ProtectionPhase::RetryExhausted || rt.retries_used >= max_retries {
                    return exhaust(metric, rt, false);
                }
                rt.phase = ProtectionPhase::Violating;
                rt.cooldown_until = None;
                rt.violation_streak = DEBOUNCE_SAMPLES - 1;
                Vec::new()
            }
            PowerAction::On => {
                let mut directives = Vec::new();
                for (metric, rt) in &mut self.metrics {
                    if rt.phase != ProtectionPhase::Restarted {
                        continue;
                    }
                    let rule = config.metric(*metric);
                    let max_retries = rule.map_or(0, |r| r.max_retries);
                    if rt.retries_used >= max_retries {
                        directives.extend(exhaust(*metric, rt, false));
                        continue;
                    }
                    let delay = rule.map_or(1, |r| r.restart_delay_minutes);
                    rt.phase = ProtectionPhase::Cooldown;
                    rt.cooldown_until = Some(plus_minutes(now, delay));
                }
                directives
            }
        }
    }
}

fn exhaust(metric: Metric, rt: &mut MetricRuntime, power_off: bool) -> Vec<ProtectionDirective> {
    rt.phase = ProtectionPhase::RetryExhausted;
    rt.cooldown_until = None;
    rt.violation_streak = 0;

    let mut directives = Vec::with_capacity(2);
    if power_off {
        directives.push(ProtectionDirective::Power {
            metric,
            action: PowerAction::Off,
        });
    }
    directives.push(ProtectionDirective::Escalate {
        metric,
        value: rt.last_value.unwrap_or_default(),
        threshold: rt.last_threshold.unwrap_or_default(),
    });
    directives
}
