//! In-memory port fakes shared by the unit tests of this crate.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use voltguard_domain::alert::{Alert, AlertQuery, AlertType};
use voltguard_domain::device_config::DeviceConfig;
use voltguard_domain::error::{CommandError, VoltGuardError};
use voltguard_domain::event::AutomationEvent;
use voltguard_domain::id::{AlertId, DeviceId};
use voltguard_domain::telemetry::{TelemetrySample, TelemetryUnavailable};

use crate::ports::{AlertStore, CommandGateway, ConfigStore, EventPublisher, TelemetrySource};

/// Records every command and answers with a scripted outcome.
#[derive(Default)]
pub struct SpyGateway {
    pub sent: Mutex<Vec<(DeviceId, bool)>>,
    failure: Mutex<Option<CommandError>>,
    delay: Mutex<Option<Duration>>,
}

impl SpyGateway {
    pub fn fail_with(&self, err: CommandError) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn succeed(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn hang_for(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn sent(&self) -> Vec<(DeviceId, bool)> {
        self.sent.lock().unwrap().clone()
    }
}

impl CommandGateway for SpyGateway {
    fn send_power_command(
        &self,
        device_id: DeviceId,
        on: bool,
    ) -> impl Future<Output = Result<(), CommandError>> + Send {
        self.sent.lock().unwrap().push((device_id, on));
        let outcome = self.failure.lock().unwrap().clone().map_or(Ok(()), Err);
        let delay = *self.delay.lock().unwrap();
        async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            outcome
        }
    }
}

#[derive(Default)]
pub struct InMemoryAlertStore {
    alerts: Mutex<HashMap<AlertId, Alert>>,
}

impl InMemoryAlertStore {
    pub fn all(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().values().cloned().collect()
    }

    pub fn active(&self) -> Vec<Alert> {
        self.all().into_iter().filter(Alert::is_active).collect()
    }
}

impl AlertStore for InMemoryAlertStore {
    fn find_active(
        &self,
        device_id: DeviceId,
        alert_type: AlertType,
    ) -> impl Future<Output = Result<Option<Alert>, VoltGuardError>> + Send {
        let found = self
            .alerts
            .lock()
            .unwrap()
            .values()
            .find(|a| a.device_id == device_id && a.alert_type == alert_type && a.is_active())
            .cloned();
        async { Ok(found) }
    }

    fn upsert(&self, alert: Alert) -> impl Future<Output = Result<Alert, VoltGuardError>> + Send {
        self.alerts.lock().unwrap().insert(alert.id, alert.clone());
        async { Ok(alert) }
    }

    fn get_by_id(
        &self,
        id: AlertId,
    ) -> impl Future<Output = Result<Option<Alert>, VoltGuardError>> + Send {
        let found = self.alerts.lock().unwrap().get(&id).cloned();
        async { Ok(found) }
    }

    fn query(
        &self,
        query: AlertQuery,
    ) -> impl Future<Output = Result<Vec<Alert>, VoltGuardError>> + Send {
        let mut found: Vec<Alert> = self
            .alerts
            .lock()
            .unwrap()
            .values()
            .filter(|a| query.matches(a))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = query.limit {
            found.truncate(limit);
        }
        async { Ok(found) }
    }
}

#[derive(Default)]
pub struct InMemoryConfigStore {
    configs: Mutex<HashMap<DeviceId, DeviceConfig>>,
}

impl ConfigStore for InMemoryConfigStore {
    fn get(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<Option<DeviceConfig>, VoltGuardError>> + Send {
        let found = self.configs.lock().unwrap().get(&device_id).cloned();
        async { Ok(found) }
    }

    fn put(
        &self,
        device_id: DeviceId,
        config: DeviceConfig,
    ) -> impl Future<Output = Result<(), VoltGuardError>> + Send {
        self.configs.lock().unwrap().insert(device_id, config);
        async { Ok(()) }
    }

    fn delete(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<(), VoltGuardError>> + Send {
        self.configs.lock().unwrap().remove(&device_id);
        async { Ok(()) }
    }

    fn list_device_ids(&self) -> impl Future<Output = Result<Vec<DeviceId>, VoltGuardError>> + Send {
        let ids = self.configs.lock().unwrap().keys().copied().collect();
        async { Ok(ids) }
    }
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub events: Mutex<Vec<AutomationEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<AutomationEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(
        &self,
        event: AutomationEvent,
    ) -> impl Future<Output = Result<(), VoltGuardError>> + Send {
        self.events.lock().unwrap().push(event);
        async { Ok(()) }
    }
}

/// Answers polls from a fixed table; unknown devices are offline.
#[derive(Default)]
pub struct ScriptedSource {
    readings: Mutex<HashMap<DeviceId, Result<TelemetrySample, TelemetryUnavailable>>>,
}

impl ScriptedSource {
    pub fn set(&self, device_id: DeviceId, reading: Result<TelemetrySample, TelemetryUnavailable>) {
        self.readings.lock().unwrap().insert(device_id, reading);
    }
}

impl TelemetrySource for ScriptedSource {
    fn poll_telemetry(
        &self,
        device_id: DeviceId,
    ) -> impl Future<Output = Result<TelemetrySample, TelemetryUnavailable>> + Send {
        let reading = self
            .readings
            .lock()
            .unwrap()
            .get(&device_id)
            .cloned()
            .unwrap_or(Err(TelemetryUnavailable::Offline));
        async { reading }
    }
}
