//! Device automation orchestrator: one per device.
//!
//! Owns the device's [`DeviceAutomationState`] and is the only writer of it.
//! Feeds telemetry into the threshold evaluator and protection state
//! machine, runs the schedule on ticks, arbitrates commands through the
//! conflict resolver, talks to the command gateway (with a timeout) and
//! keeps the alert store in line with what the automation observed.

use std::collections::VecDeque;
use std::time::Duration;

use voltguard_domain::alert::{AlertLifecycle, AlertSignal, AlertType};
use voltguard_domain::automation_state::DeviceAutomationState;
use voltguard_domain::conflict::{self, Resolution};
use voltguard_domain::device_config::DeviceConfig;
use voltguard_domain::error::{CommandError, VoltGuardError};
use voltguard_domain::event::AutomationEvent;
use voltguard_domain::id::DeviceId;
use voltguard_domain::power::{CommandOrigin, PowerAction, PowerCommand, PowerState};
use voltguard_domain::protection::{
    Metric, ProtectionDirective, ProtectionPhase,
};
use voltguard_domain::telemetry::{TelemetrySample, TelemetryUnavailable};
use voltguard_domain::time::Timestamp;

use crate::ports::{AlertStore, CommandGateway, EventPublisher};

/// Default bound on a single gateway round-trip.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Automation driver for a single device.
pub struct DeviceAutomationOrchestrator<G, S, P> {
    device_id: DeviceId,
    config: DeviceConfig,
    state: DeviceAutomationState,
    gateway: G,
    alerts: S,
    publisher: P,
    command_timeout: Duration,
}

impl<G, S, P> DeviceAutomationOrchestrator<G, S, P>
where
    G: CommandGateway,
    S: AlertStore,
    P: EventPublisher,
{
    /// Create an orchestrator with empty automation state.
    pub fn new(device_id: DeviceId, config: DeviceConfig, gateway: G, alerts: S, publisher: P) -> Self {
        Self {
            device_id,
            config,
            state: DeviceAutomationState::default(),
            gateway,
            alerts,
            publisher,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    #[must_use]
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    #[must_use]
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> &DeviceAutomationState {
        &self.state
    }

    /// Swap in a new configuration.
    ///
    /// Protection memory of metrics that are still protected survives the
    /// change, so a running cooldown still ends in a restart and an
    /// exhausted metric still waits for the operator. Metrics that lost
    /// their rule are forgotten and their alerts resolved.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the alert store fails.
    #[tracing::instrument(skip(self, config), fields(device_id = %self.device_id))]
    pub async fn set_config(
        &mut self,
        config: DeviceConfig,
        now: Timestamp,
    ) -> Result<(), VoltGuardError> {
        let protection_changed = config.protection != self.config.protection;
        self.config = config;
        if !protection_changed {
            return Ok(());
        }
        self.state.evaluator.retain_configured(&self.config.protection);
        let directives = self
            .state
            .protection
            .retain_configured(&self.config.protection);
        tracing::info!(directives = directives.len(), "protection config replaced");
        self.execute(directives, now).await
    }

    /// Process one telemetry sample.
    ///
    /// Samples not newer than the last accepted one are ignored.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the alert store fails.
    #[tracing::instrument(skip(self, sample), fields(device_id = %self.device_id, at = %sample.timestamp))]
    pub async fn handle_sample(
        &mut self,
        sample: &TelemetrySample,
        now: Timestamp,
    ) -> Result<(), VoltGuardError> {
        if sample.device_id != self.device_id {
            tracing::warn!(sample_device = %sample.device_id, "sample routed to the wrong device, ignoring");
            return Ok(());
        }
        if self
            .state
            .last_sample_at
            .is_some_and(|last| sample.timestamp <= last)
        {
            tracing::debug!("stale or replayed sample, ignoring");
            return Ok(());
        }
        self.state.last_sample_at = Some(sample.timestamp);

        if self.state.telemetry.take().is_some() {
            tracing::info!("telemetry restored");
            for alert_type in [AlertType::HorsLigne, AlertType::ErreurCommunication] {
                self.resolve_active(alert_type, "telemetry restored", now)
                    .await?;
            }
        }
        if let Some(relay) = sample.relay.filter(|r| *r != PowerState::Unknown) {
            self.state.current_power = relay;
        }

        // Readings taken before a restart say nothing about the restarted load.
        let cooling: Vec<Metric> = Metric::ALL
            .into_iter()
            .filter(|m| self.state.protection.phase(*m) == ProtectionPhase::Cooldown)
            .collect();
        let directives = self.state.protection.on_timer(now);
        self.execute(directives, now).await?;
        let restarted: Vec<Metric> = cooling
            .into_iter()
            .filter(|m| self.state.protection.phase(*m) == ProtectionPhase::Restarted)
            .collect();

        for metric in Metric::ALL {
            if restarted.contains(&metric) || !self.state.protection.accepts_samples(metric) {
                continue;
            }
            let Some(event) =
                self.state
                    .evaluator
                    .evaluate_metric(metric, sample, &self.config.protection)
            else {
                continue;
            };
            let Some(rule) = self.config.protection.active(metric) else {
                continue;
            };
            tracing::debug!(%metric, kind = ?event.kind, value = event.value, threshold = event.threshold, "metric event");
            let directives = self.state.protection.on_event(&event, rule, now);
            self.execute(directives, now).await?;
        }
        Ok(())
    }

    /// Record that no sample could be read.
    ///
    /// Raises (or refreshes) the matching connectivity alert and freezes
    /// protection until the next good sample.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the alert store fails.
    #[tracing::instrument(skip(self), fields(device_id = %self.device_id))]
    pub async fn handle_unavailable(
        &mut self,
        reason: TelemetryUnavailable,
        now: Timestamp,
    ) -> Result<(), VoltGuardError> {
        tracing::warn!(%reason, "telemetry unavailable");
        let signal = AlertSignal::connectivity(self.device_id, &reason);
        self.state.telemetry = Some(reason);
        self.raise(signal, now).await
    }

    /// Periodic tick: cooldown expiry, then the schedule.
    ///
    /// Cooldowns do not expire while telemetry is unavailable; the schedule
    /// runs regardless.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the alert store fails.
    #[tracing::instrument(skip(self), fields(device_id = %self.device_id))]
    pub async fn tick(&mut self, now: Timestamp) -> Result<(), VoltGuardError> {
        if self.state.is_online() {
            let directives = self.state.protection.on_timer(now);
            self.execute(directives, now).await?;
        }

        let Some(decision) =
            self.state
                .schedule
                .plan(&self.config.schedule, now, self.state.current_power)
        else {
            return Ok(());
        };
        let resolution = conflict::resolve(
            CommandOrigin::Schedule,
            self.state.protection.is_holding(),
            self.config.schedule.override_protection,
        );
        match resolution {
            Resolution::Suppress => {
                tracing::warn!(action = %decision.action, "schedule action suppressed by protection");
                self.publish(AutomationEvent::ScheduleSuppressed {
                    device_id: self.device_id,
                    action: decision.action,
                    at: now,
                })
                .await;
                self.raise(AlertSignal::maintenance(self.device_id, decision.action), now)
                    .await
            }
            Resolution::Issue { reset_protection } => {
                if reset_protection {
                    tracing::info!("schedule overrides protection");
                    self.reset(now).await?;
                }
                let command = self.command(decision.action, CommandOrigin::Schedule);
                if self.send(command, now).await.is_ok() {
                    self.state.schedule.record(decision.action, now);
                }
                Ok(())
            }
        }
    }

    /// Operator toggle. Bypasses both engines and clears all automation
    /// state of the device.
    ///
    /// # Errors
    ///
    /// Returns [`VoltGuardError::Command`] if the gateway fails, or a
    /// storage error if the alert store fails.
    #[tracing::instrument(skip(self), fields(device_id = %self.device_id))]
    pub async fn manual_toggle(&mut self, on: bool, now: Timestamp) -> Result<(), VoltGuardError> {
        let action = PowerAction::from(on);
        self.reset(now).await?;
        let command = self.command(action, CommandOrigin::Manual);
        self.send(command, now).await?;
        Ok(())
    }

    /// Run protection directives, feeding command failures back into the
    /// state machine until nothing is left to do.
    async fn execute(
        &mut self,
        directives: Vec<ProtectionDirective>,
        now: Timestamp,
    ) -> Result<(), VoltGuardError> {
        let mut queue: VecDeque<ProtectionDirective> = directives.into();
        while let Some(directive) = queue.pop_front() {
            match directive {
                ProtectionDirective::Power { metric, action } => {
                    let command = self.command(action, CommandOrigin::Protection { metric });
                    if self.send(command, now).await.is_err() {
                        let follow_up = self.state.protection.on_command_failed(
                            metric,
                            action,
                            &self.config.protection,
                            now,
                        );
                        queue.extend(follow_up);
                    }
                }
                ProtectionDirective::RaiseAlert {
                    metric,
                    value,
                    threshold,
                    shutdown,
                } => {
                    let signal =
                        AlertSignal::violation(self.device_id, metric, value, threshold, shutdown);
                    self.raise(signal, now).await?;
                }
                ProtectionDirective::Escalate {
                    metric,
                    value,
                    threshold,
                } => {
                    tracing::warn!(%metric, "retry budget exhausted, manual intervention required");
                    let signal = AlertSignal::escalation(self.device_id, metric, value, threshold);
                    self.raise(signal, now).await?;
                }
                ProtectionDirective::ResolveAlert { metric } => {
                    self.resolve_active(metric.alert_type(), "back within bounds", now)
                        .await?;
                }
            }
        }
        Ok(())
    }

    fn command(&self, action: PowerAction, origin: CommandOrigin) -> PowerCommand {
        PowerCommand {
            device_id: self.device_id,
            action,
            origin,
        }
    }

    /// Send a command through the gateway, bounded by the command timeout.
    async fn send(&mut self, command: PowerCommand, now: Timestamp) -> Result<(), CommandError> {
        let timeout_ms = u64::try_from(self.command_timeout.as_millis()).unwrap_or(u64::MAX);
        let outcome = tokio::time::timeout(
            self.command_timeout,
            self.gateway
                .send_power_command(command.device_id, command.action.is_on()),
        )
        .await
        .unwrap_or(Err(CommandError::Timeout(timeout_ms)));

        match outcome {
            Ok(()) => {
                tracing::info!(action = %command.action, origin = %command.origin, "power command issued");
                self.state.current_power = command.action.target_state();
                self.publish(AutomationEvent::CommandIssued { command, at: now })
                    .await;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(action = %command.action, origin = %command.origin, error = %err, "power command failed");
                self.publish(AutomationEvent::CommandFailed {
                    command,
                    reason: err.to_string(),
                    at: now,
                })
                .await;
                Err(err)
            }
        }
    }

    /// Clear automation state. Metric alerts are closed with it since
    /// nothing would resolve them any more.
    async fn reset(&mut self, now: Timestamp) -> Result<(), VoltGuardError> {
        self.state.reset();
        for metric in Metric::ALL {
            self.resolve_active(metric.alert_type(), "automation state reset", now)
                .await?;
        }
        self.publish(AutomationEvent::StateReset {
            device_id: self.device_id,
            at: now,
        })
        .await;
        Ok(())
    }

    async fn raise(&self, signal: AlertSignal, now: Timestamp) -> Result<(), VoltGuardError> {
        let active = self
            .alerts
            .find_active(signal.device_id, signal.alert_type)
            .await?;
        let raised = AlertLifecycle::raise(active, signal, now);
        let alert = self.alerts.upsert(raised.alert).await?;
        if raised.created {
            tracing::info!(alert_type = %alert.alert_type, severity = %alert.severity, "alert raised");
        } else {
            tracing::debug!(alert_type = %alert.alert_type, severity = %alert.severity, "alert updated");
        }
        self.publish(AutomationEvent::AlertRaised { alert }).await;
        Ok(())
    }

    async fn resolve_active(
        &self,
        alert_type: AlertType,
        comment: &str,
        now: Timestamp,
    ) -> Result<(), VoltGuardError> {
        let Some(active) = self.alerts.find_active(self.device_id, alert_type).await? else {
            return Ok(());
        };
        let resolved = AlertLifecycle::resolve(active, Some(comment.to_string()), now)?;
        let alert = self.alerts.upsert(resolved).await?;
        tracing::info!(%alert_type, "alert resolved");
        self.publish(AutomationEvent::AlertResolved { alert }).await;
        Ok(())
    }

    async fn publish(&self, event: AutomationEvent) {
        if let Err(err) = self.publisher.publish(event).await {
            tracing::warn!(error = %err, "failed to publish automation event");
        }
    }
}
