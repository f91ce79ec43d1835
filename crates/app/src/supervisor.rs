//! Automation supervisor: the per-device orchestrator registry.
//!
//! Each device gets its own [`DeviceAutomationOrchestrator`] behind its own
//! [`tokio::sync::Mutex`], so telemetry and ticks for one device are
//! serialized while different devices proceed in parallel. The registry
//! lock is only held to look up or insert an entry, never across device
//! work.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;

use voltguard_domain::automation_state::DeviceAutomationState;
use voltguard_domain::error::VoltGuardError;
use voltguard_domain::id::DeviceId;
use voltguard_domain::telemetry::{TelemetrySample, TelemetryUnavailable};
use voltguard_domain::time::{Timestamp, now};

use crate::orchestrator::{DEFAULT_COMMAND_TIMEOUT, DeviceAutomationOrchestrator};
use crate::ports::{AlertStore, CommandGateway, ConfigStore, EventPublisher, TelemetrySource};

type Orchestrator<G, S, P> = DeviceAutomationOrchestrator<Arc<G>, Arc<S>, Arc<P>>;
type Slot<G, S, P> = Arc<Mutex<Orchestrator<G, S, P>>>;

/// Outcome of a sweep over every assigned device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub devices: usize,
    pub failures: usize,
}

pub struct AutomationSupervisor<G, S, C, P> {
    gateway: Arc<G>,
    alerts: Arc<S>,
    configs: Arc<C>,
    publisher: Arc<P>,
    command_timeout: Duration,
    devices: RwLock<HashMap<DeviceId, Slot<G, S, P>>>,
}

impl<G, S, C, P> AutomationSupervisor<G, S, C, P>
where
    G: CommandGateway + Send + Sync + 'static,
    S: AlertStore + Send + Sync + 'static,
    C: ConfigStore + Send + Sync,
    P: EventPublisher + Send + Sync + 'static,
{
    pub fn new(gateway: Arc<G>, alerts: Arc<S>, configs: Arc<C>, publisher: Arc<P>) -> Self {
        Self {
            gateway,
            alerts,
            configs,
            publisher,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
            devices: RwLock::new(HashMap::new()),
        }
    }

    /// Bound applied to every gateway call of every device.
    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Assigned devices, sorted.
    pub async fn device_ids(&self) -> Vec<DeviceId> {
        let mut ids: Vec<DeviceId> = self.devices.read().await.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Start automating `device_id` with its stored configuration.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the configuration cannot be loaded.
    pub async fn assign(&self, device_id: DeviceId) -> Result<(), VoltGuardError> {
        self.slot(device_id).await.map(|_| ())
    }

    /// Assign every device that has a stored configuration.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the configuration store fails.
    pub async fn assign_configured(&self) -> Result<usize, VoltGuardError> {
        let ids = self.configs.list_device_ids().await?;
        for device_id in &ids {
            self.assign(*device_id).await?;
        }
        Ok(ids.len())
    }

    /// Stop automating `device_id` and drop its runtime state.
    ///
    /// Returns `false` if the device was not assigned.
    #[tracing::instrument(skip(self))]
    pub async fn unassign(&self, device_id: DeviceId) -> bool {
        let removed = self.devices.write().await.remove(&device_id).is_some();
        if removed {
            tracing::info!("device unassigned");
        }
        removed
    }

    /// Re-read the stored configuration of an assigned device.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the configuration cannot be loaded or
    /// the alert store fails.
    #[tracing::instrument(skip(self))]
    pub async fn reload(&self, device_id: DeviceId) -> Result<(), VoltGuardError> {
        let Some(slot) = self.existing(device_id).await else {
            return Ok(());
        };
        let config = self.configs.get(device_id).await?.unwrap_or_default();
        slot.lock().await.set_config(config, now()).await?;
        tracing::info!("device configuration reloaded");
        Ok(())
    }

    /// Feed one sample, assigning the device on first contact.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the configuration or alert store.
    pub async fn ingest(
        &self,
        sample: &TelemetrySample,
        now: Timestamp,
    ) -> Result<(), VoltGuardError> {
        let slot = self.slot(sample.device_id).await?;
        let mut orchestrator = slot.lock().await;
        orchestrator.handle_sample(sample, now).await
    }

    /// Report that a device could not be read.
    ///
    /// # Errors
    ///
    /// Returns a storage error from the configuration or alert store.
    pub async fn report_unavailable(
        &self,
        device_id: DeviceId,
        reason: TelemetryUnavailable,
        now: Timestamp,
    ) -> Result<(), VoltGuardError> {
        let slot = self.slot(device_id).await?;
        let mut orchestrator = slot.lock().await;
        orchestrator.handle_unavailable(reason, now).await
    }

    /// Operator toggle for one device.
    ///
    /// # Errors
    ///
    /// Returns [`VoltGuardError::Command`] if the gateway fails, or a
    /// storage error.
    pub async fn manual_toggle(
        &self,
        device_id: DeviceId,
        on: bool,
        now: Timestamp,
    ) -> Result<(), VoltGuardError> {
        let slot = self.slot(device_id).await?;
        let mut orchestrator = slot.lock().await;
        orchestrator.manual_toggle(on, now).await
    }

    /// A copy of the runtime state of an assigned device.
    pub async fn snapshot(&self, device_id: DeviceId) -> Option<DeviceAutomationState> {
        let slot = self.existing(device_id).await?;
        let orchestrator = slot.lock().await;
        Some(orchestrator.state().clone())
    }

    /// Poll every assigned device and feed what comes back.
    pub async fn poll_all<T>(&self, source: Arc<T>, now: Timestamp) -> SweepReport
    where
        T: TelemetrySource + Send + Sync + 'static,
    {
        let mut tasks = JoinSet::new();
        for (device_id, slot) in self.slots().await {
            let source = Arc::clone(&source);
            tasks.spawn(async move {
                let reading = source.poll_telemetry(device_id).await;
                let mut orchestrator = slot.lock().await;
                let outcome = match reading {
                    Ok(sample) => orchestrator.handle_sample(&sample, now).await,
                    Err(reason) => orchestrator.handle_unavailable(reason, now).await,
                };
                (device_id, outcome)
            });
        }
        collect("poll", tasks).await
    }

    /// Run the periodic tick of every assigned device, in parallel.
    pub async fn tick_all(&self, now: Timestamp) -> SweepReport {
        let mut tasks = JoinSet::new();
        for (device_id, slot) in self.slots().await {
            tasks.spawn(async move {
                let outcome = slot.lock().await.tick(now).await;
                (device_id, outcome)
            });
        }
        collect("tick", tasks).await
    }

    async fn existing(&self, device_id: DeviceId) -> Option<Slot<G, S, P>> {
        self.devices.read().await.get(&device_id).cloned()
    }

    async fn slots(&self) -> Vec<(DeviceId, Slot<G, S, P>)> {
        self.devices
            .read()
            .await
            .iter()
            .map(|(id, slot)| (*id, Arc::clone(slot)))
            .collect()
    }

    async fn slot(&self, device_id: DeviceId) -> Result<Slot<G, S, P>, VoltGuardError> {
        if let Some(slot) = self.existing(device_id).await {
            return Ok(slot);
        }
        let config = self.configs.get(device_id).await?.unwrap_or_default();
        let mut devices = self.devices.write().await;
        let slot = devices.entry(device_id).or_insert_with(|| {
            tracing::info!(%device_id, "device assigned");
            let orchestrator = DeviceAutomationOrchestrator::new(
                device_id,
                config,
                Arc::clone(&self.gateway),
                Arc::clone(&self.alerts),
                Arc::clone(&self.publisher),
            )
            .with_command_timeout(self.command_timeout);
            Arc::new(Mutex::new(orchestrator))
        });
        Ok(Arc::clone(slot))
    }
}

async fn collect(
    sweep: &'static str,
    mut tasks: JoinSet<(DeviceId, Result<(), VoltGuardError>)>,
) -> SweepReport {
    let mut report = SweepReport::default();
    while let Some(joined) = tasks.join_next().await {
        report.devices += 1;
        match joined {
            Ok((_, Ok(()))) => {}
            Ok((device_id, Err(err))) => {
                report.failures += 1;
                tracing::error!(sweep, %device_id, error = %err, "device automation failed");
            }
            Err(err) => {
                report.failures += 1;
                tracing::error!(sweep, error = %err, "device automation task panicked");
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use voltguard_domain::alert::AlertType;
    use voltguard_domain::device_config::DeviceConfig;
    use voltguard_domain::power::PowerState;
    use voltguard_domain::protection::{Metric, MetricProtection, ProtectionConfig, ProtectionPhase};
    use voltguard_domain::schedule::{ScheduleConfig, ScheduleRule};

    use crate::testing::{
        InMemoryAlertStore, InMemoryConfigStore, RecordingPublisher, ScriptedSource, SpyGateway,
    };

    type TestSupervisor =
        AutomationSupervisor<SpyGateway, InMemoryAlertStore, InMemoryConfigStore, RecordingPublisher>;

    struct Harness {
        supervisor: TestSupervisor,
        gateway: Arc<SpyGateway>,
        alerts: Arc<InMemoryAlertStore>,
        configs: Arc<InMemoryConfigStore>,
    }

    fn harness() -> Harness {
        let gateway = Arc::new(SpyGateway::default());
        let alerts = Arc::new(InMemoryAlertStore::default());
        let configs = Arc::new(InMemoryConfigStore::default());
        let supervisor = AutomationSupervisor::new(
            Arc::clone(&gateway),
            Arc::clone(&alerts),
            Arc::clone(&configs),
            Arc::new(RecordingPublisher::default()),
        );
        Harness {
            supervisor,
            gateway,
            alerts,
            configs,
        }
    }

    // 2024-06-04 is a Tuesday.
    fn at(hour: u32, minute: u32, second: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2024, 6, 4, hour, minute, second).unwrap()
    }

    fn current_protection() -> DeviceConfig {
        DeviceConfig {
            protection: ProtectionConfig {
                enabled: true,
                current: Some(MetricProtection::upper(16.0)),
                ..ProtectionConfig::default()
            },
            schedule: ScheduleConfig::default(),
        }
    }

    fn morning_schedule() -> DeviceConfig {
        DeviceConfig {
            schedule: ScheduleConfig {
                enabled: true,
                on_rule: ScheduleRule::at("07:00", 1..=7).unwrap(),
                ..ScheduleConfig::default()
            },
            ..DeviceConfig::default()
        }
    }

    #[tokio::test]
    async fn should_create_device_state_on_first_sample() {
        let h = harness();
        let device_id = DeviceId::new();
        assert!(h.supervisor.snapshot(device_id).await.is_none());

        let sample = TelemetrySample::single(device_id, at(12, 0, 0), 230.0, 3.0)
            .with_relay(PowerState::On);
        h.supervisor.ingest(&sample, at(12, 0, 0)).await.unwrap();

        let state = h.supervisor.snapshot(device_id).await.unwrap();
        assert_eq!(state.current_power, PowerState::On);
        assert_eq!(state.last_sample_at, Some(at(12, 0, 0)));
        assert_eq!(h.supervisor.device_ids().await, vec![device_id]);
    }

    #[tokio::test]
    async fn should_apply_stored_config_when_device_assigned() {
        let h = harness();
        let device_id = DeviceId::new();
        h.configs.put(device_id, current_protection()).await.unwrap();
        assert_eq!(h.supervisor.assign_configured().await.unwrap(), 1);

        for second in [0, 10] {
            let sample = TelemetrySample::single(device_id, at(12, 0, second), 230.0, 20.0);
            h.supervisor.ingest(&sample, at(12, 0, second)).await.unwrap();
        }

        assert_eq!(h.gateway.sent(), vec![(device_id, false)]);
        let state = h.supervisor.snapshot(device_id).await.unwrap();
        assert_eq!(state.protection.phase(Metric::Current), ProtectionPhase::Cooldown);
    }

    #[tokio::test]
    async fn should_discard_state_when_device_unassigned() {
        let h = harness();
        let device_id = DeviceId::new();
        h.supervisor.assign(device_id).await.unwrap();

        assert!(h.supervisor.unassign(device_id).await);
        assert!(!h.supervisor.unassign(device_id).await);
        assert!(h.supervisor.snapshot(device_id).await.is_none());
    }

    #[tokio::test]
    async fn should_pick_up_new_config_on_reload() {
        let h = harness();
        let device_id = DeviceId::new();
        h.supervisor.assign(device_id).await.unwrap();

        h.configs.put(device_id, morning_schedule()).await.unwrap();
        h.supervisor.reload(device_id).await.unwrap();
        h.supervisor.tick_all(at(7, 0, 0)).await;

        assert_eq!(h.gateway.sent(), vec![(device_id, true)]);
    }

    #[tokio::test]
    async fn should_ignore_reload_of_unassigned_device() {
        let h = harness();
        let device_id = DeviceId::new();
        h.supervisor.reload(device_id).await.unwrap();
        assert!(h.supervisor.snapshot(device_id).await.is_none());
    }

    #[tokio::test]
    async fn should_tick_every_device() {
        let h = harness();
        let ids: Vec<DeviceId> = (0..4).map(|_| DeviceId::new()).collect();
        for id in &ids {
            h.configs.put(*id, morning_schedule()).await.unwrap();
        }
        h.supervisor.assign_configured().await.unwrap();

        let report = h.supervisor.tick_all(at(7, 0, 0)).await;

        assert_eq!(
            report,
            SweepReport {
                devices: 4,
                failures: 0
            }
        );
        let mut switched: Vec<DeviceId> = h.gateway.sent().into_iter().map(|(id, _)| id).collect();
        switched.sort();
        let mut expected = ids.clone();
        expected.sort();
        assert_eq!(switched, expected);
    }

    #[tokio::test]
    async fn should_route_polled_readings_and_outages() {
        let h = harness();
        let online = DeviceId::new();
        let offline = DeviceId::new();
        h.supervisor.assign(online).await.unwrap();
        h.supervisor.assign(offline).await.unwrap();

        let source = Arc::new(ScriptedSource::default());
        source.set(
            online,
            Ok(TelemetrySample::single(online, at(12, 0, 0), 231.0, 2.0)),
        );

        let report = h.supervisor.poll_all(source, at(12, 0, 1)).await;
        assert_eq!(report.devices, 2);

        let active = h.alerts.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].device_id, offline);
        assert_eq!(active[0].alert_type, AlertType::HorsLigne);
        let state = h.supervisor.snapshot(online).await.unwrap();
        assert_eq!(state.last_sample_at, Some(at(12, 0, 0)));
    }

    #[tokio::test]
    async fn should_toggle_device_manually() {
        let h = harness();
        let device_id = DeviceId::new();
        h.supervisor
            .manual_toggle(device_id, false, at(12, 0, 0))
            .await
            .unwrap();
        let state = h.supervisor.snapshot(device_id).await.unwrap();
        assert_eq!(state.current_power, PowerState::Off);
    }

    #[tokio::test]
    async fn should_report_unavailable_device() {
        let h = harness();
        let device_id = DeviceId::new();
        h.supervisor
            .report_unavailable(
                device_id,
                TelemetryUnavailable::CommunicationError("timeout".to_string()),
                at(12, 0, 0),
            )
            .await
            .unwrap();
        let active = h.alerts.active();
        assert_eq!(active[0].alert_type, AlertType::ErreurCommunication);
    }
}
