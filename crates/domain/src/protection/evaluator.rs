//! Threshold evaluation: turns a sample into per-metric violation/recovery events.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{Metric, MetricProtection, ProtectionConfig};
use crate::telemetry::TelemetrySample;

/// Whether a metric left or re-entered its bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricEventKind {
    Violation,
    Recovery,
}

/// Outcome of evaluating one metric of one sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricEvent {
    pub metric: Metric,
    pub kind: MetricEventKind,
    /// Worst phase value (or the device value for temperature).
    pub value: f64,
    /// The bound `value` was compared against.
    pub threshold: f64,
}

impl MetricEvent {
    #[must_use]
    pub fn is_violation(&self) -> bool {
        self.kind == MetricEventKind::Violation
    }
}

/// Per-device evaluator.
///
/// Violations are reported on every offending sample. A recovery is
/// reported once, on the first in-bounds sample after a violation, which is
/// why the evaluator remembers which metrics were last seen out of bounds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThresholdEvaluator {
    violating: BTreeSet<Metric>,
}

impl ThresholdEvaluator {
    /// Evaluate every metric of `sample`.
    pub fn evaluate(
        &mut self,
        sample: &TelemetrySample,
        config: &ProtectionConfig,
    ) -> Vec<MetricEvent> {
        Metric::ALL
            .into_iter()
            .filter_map(|metric| self.evaluate_metric(metric, sample, config))
            .collect()
    }

    /// Evaluate a single metric of `sample`.
    ///
    /// Returns `None` when the metric is not protected, not present in the
    /// sample, or in bounds without a preceding violation.
    pub fn evaluate_metric(
        &mut self,
        metric: Metric,
        sample: &TelemetrySample,
        config: &ProtectionConfig,
    ) -> Option<MetricEvent> {
        let Some(rule) = config.active(metric) else {
            self.violating.remove(&metric);
            return None;
        };

        let worst = readings(metric, sample)
            .map(|value| Assessment::of(value, rule))
            .max_by(|a, b| a.excess.total_cmp(&b.excess))?;

        if worst.excess > 0.0 {
            self.violating.insert(metric);
            return Some(MetricEvent {
                metric,
                kind: MetricEventKind::Violation,
                value: worst.value,
                threshold: worst.threshold,
            });
        }

        self.violating.remove(&metric).then_some(MetricEvent {
            metric,
            kind: MetricEventKind::Recovery,
            value: worst.value,
            threshold: worst.threshold,
        })
    }

    /// Forget violations of metrics `config` no longer protects.
    pub fn retain_configured(&mut self, config: &ProtectionConfig) {
        self.violating.retain(|metric| config.active(*metric).is_some());
    }

    /// Whether the last evaluated sample had `metric` out of bounds.
    #[must_use]
    pub fn is_violating(&self, metric: Metric) -> bool {
        self.violating.contains(&metric)
    }
}

fn readings(metric: Metric, sample: &TelemetrySample) -> impl Iterator<Item = f64> + '_ {
    let phases = sample.phases.readings().iter();
    let per_phase = phases.filter_map(move |reading| match metric {
        Metric::Voltage => reading.voltage,
        Metric::Current => reading.current,
        Metric::Temperature => None,
    });
    let device_level = match metric {
        Metric::Temperature => sample.temperature,
        Metric::Voltage | Metric::Current => None,
    };
    per_phase.chain(device_level)
}

/// A value positioned against its nearest bound.
///
/// `excess` is relative to the bound: positive when out of bounds, negative
/// (distance to the bound) when inside.
struct Assessment {
    value: f64,
    threshold: f64,
    excess: f64,
}

impl Assessment {
    fn of(value: f64, rule: &MetricProtection) -> Self {
        let above = relative(value - rule.max, rule.max);
        let Some(min) = rule.min else {
            return Self {
                value,
                threshold: rule.max,
                excess: above,
            };
        };
        let below = relative(min - value, min);
        if below > above {
            Self {
                value,
                threshold: min,
                excess: below,
            }
        } else {
            Self {
                value,
                threshold: rule.max,
                excess: above,
            }
        }
    }
}

fn relative(delta: f64, bound: f64) -> f64 {
    if bound.abs() > f64::EPSILON {
        delta / bound.abs()
    } else {
        delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::DeviceId;
    use crate::time::now;

    fn config() -> ProtectionConfig {
        ProtectionConfig {
            enabled: true,
            voltage: Some(MetricProtection::band(200.0, 250.0)),
            current: Some(MetricProtection::upper(16.0)),
            temperature: Some(MetricProtection::upper(70.0)),
        }
    }

    fn single(voltage: f64, current: f64) -> TelemetrySample {
        TelemetrySample::single(DeviceId::new(), now(), voltage, current)
    }

    #[test]
    fn should_report_nothing_when_all_metrics_in_bounds() {
        let mut evaluator = ThresholdEvaluator::default();
        let events = evaluator.evaluate(&single(230.0, 5.0).with_temperature(40.0), &config());
        assert!(events.is_empty());
    }

    #[test]
    fn should_report_overvoltage_against_maximum() {
        let mut evaluator = ThresholdEvaluator::default();
        let events = evaluator.evaluate(&single(260.0, 5.0), &config());
        assert_eq!(
            events,
            vec![MetricEvent {
                metric: Metric::Voltage,
                kind: MetricEventKind::Violation,
                value: 260.0,
                threshold: 250.0,
            }]
        );
    }

    #[test]
    fn should_report_undervoltage_against_minimum() {
        let mut evaluator = ThresholdEvaluator::default();
        let events = evaluator.evaluate(&single(180.0, 5.0), &config());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].threshold, 200.0);
        assert!(events[0].is_violation());
    }

    #[test]
    fn should_treat_value_equal_to_bound_as_in_bounds() {
        let mut evaluator = ThresholdEvaluator::default();
        assert!(evaluator.evaluate(&single(250.0, 16.0), &config()).is_empty());
        assert!(evaluator.evaluate(&single(200.0, 16.0), &config()).is_empty());
    }

    #[test]
    fn should_report_worst_phase_for_three_phase_current() {
        let mut evaluator = ThresholdEvaluator::default();
        let sample = TelemetrySample::three(
            DeviceId::new(),
            now(),
            [(230.0, 17.0), (230.0, 21.0), (230.0, 3.0)],
        );
        let events = evaluator.evaluate(&sample, &config());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].metric, Metric::Current);
        assert_eq!(events[0].value, 21.0);
    }

    #[test]
    fn should_pick_phase_furthest_outside_voltage_band() {
        let mut evaluator = ThresholdEvaluator::default();
        let sample = TelemetrySample::three(
            DeviceId::new(),
            now(),
            [(255.0, 1.0), (150.0, 1.0), (230.0, 1.0)],
        );
        let events = evaluator.evaluate(&sample, &config());
        assert_eq!(events[0].value, 150.0);
        assert_eq!(events[0].threshold, 200.0);
    }

    #[test]
    fn should_report_recovery_once_after_violation() {
        let mut evaluator = ThresholdEvaluator::default();
        evaluator.evaluate(&single(230.0, 20.0), &config());

        let events = evaluator.evaluate(&single(230.0, 5.0), &config());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, MetricEventKind::Recovery);
        assert_eq!(events[0].metric, Metric::Current);

        assert!(evaluator.evaluate(&single(230.0, 5.0), &config()).is_empty());
    }

    #[test]
    fn should_report_violation_on_every_offending_sample() {
        let mut evaluator = ThresholdEvaluator::default();
        assert_eq!(evaluator.evaluate(&single(230.0, 20.0), &config()).len(), 1);
        assert_eq!(evaluator.evaluate(&single(230.0, 20.0), &config()).len(), 1);
        assert!(evaluator.is_violating(Metric::Current));
    }

    #[test]
    fn should_evaluate_temperature_from_device_value() {
        let mut evaluator = ThresholdEvaluator::default();
        let events = evaluator.evaluate(&single(230.0, 5.0).with_temperature(85.0), &config());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].metric, Metric::Temperature);
        assert_eq!(events[0].value, 85.0);
    }

    #[test]
    fn should_skip_metric_absent_from_sample() {
        let mut evaluator = ThresholdEvaluator::default();
        let events = evaluator.evaluate(&single(230.0, 5.0), &config());
        assert!(events.iter().all(|e| e.metric != Metric::Temperature));
    }

    #[test]
    fn should_never_evaluate_when_protection_disabled() {
        let mut evaluator = ThresholdEvaluator::default();
        let mut config = config();
        config.enabled = false;
        let events = evaluator.evaluate(&single(400.0, 90.0).with_temperature(150.0), &config);
        assert!(events.is_empty());
    }

    #[test]
    fn should_never_evaluate_disabled_metric() {
        let mut evaluator = ThresholdEvaluator::default();
        let mut config = config();
        config.current = Some(MetricProtection::upper(16.0).enabled(false));
        assert!(evaluator.evaluate(&single(230.0, 90.0), &config).is_empty());
    }

    #[test]
    fn should_forget_violation_when_metric_gets_disabled() {
        let mut evaluator = ThresholdEvaluator::default();
        evaluator.evaluate(&single(230.0, 20.0), &config());

        let mut disabled = config();
        disabled.current = None;
        evaluator.evaluate(&single(230.0, 5.0), &disabled);

        assert!(!evaluator.is_violating(Metric::Current));
        assert!(evaluator.evaluate(&single(230.0, 5.0), &config()).is_empty());
    }

    #[test]
    fn should_keep_violation_of_metric_still_configured_when_config_changes() {
        let mut evaluator = ThresholdEvaluator::default();
        evaluator.evaluate(&single(230.0, 20.0), &config());

        let mut relaxed = config();
        relaxed.voltage = None;
        evaluator.retain_configured(&relaxed);
        assert!(evaluator.is_violating(Metric::Current));

        relaxed.current = None;
        evaluator.retain_configured(&relaxed);
        assert!(!evaluator.is_violating(Metric::Current));
    }
}
