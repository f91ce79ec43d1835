//! # voltguardd: voltguard daemon
//!
//! Composition root that wires all adapters together and runs the
//! automation loops.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars) and set up logging
//! - Initialize the `SQLite` connection pool and run migrations
//! - Build the virtual meter fleet and seed missing device configurations
//! - Construct the automation supervisor, injecting adapters via port traits
//! - Poll telemetry and tick schedules on fixed intervals
//! - Log every automation event
//! - Handle graceful shutdown (SIGINT)
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod config;

use std::sync::Arc;

use anyhow::Context;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

use voltguard_adapter_storage_sqlite_sqlx::{SqliteAlertStore, SqliteConfigStore};
use voltguard_adapter_virtual::{VirtualFleet, VirtualMeter};
use voltguard_app::event_bus::{InProcessEventBus, Subscription};
use voltguard_app::ports::ConfigStore;
use voltguard_app::services::alert_service::AlertService;
use voltguard_app::services::config_service::ConfigService;
use voltguard_app::supervisor::AutomationSupervisor;
use voltguard_domain::alert::AlertQuery;
use voltguard_domain::event::AutomationEvent;
use voltguard_domain::telemetry::PhaseLayout;
use voltguard_domain::time::now;

use crate::config::{Config, VirtualMeterConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Database
    let db = voltguard_adapter_storage_sqlite_sqlx::Config::new(&config.database.url)
        .with_max_connections(config.database.max_connections)
        .build()
        .await
        .context("failed to open database")?;
    let pool = db.pool().clone();

    // Stores and event bus
    let alerts = Arc::new(SqliteAlertStore::new(pool.clone()));
    let configs = Arc::new(SqliteConfigStore::new(pool));
    let event_bus = Arc::new(InProcessEventBus::default());
    let events = tokio::spawn(log_events(event_bus.subscribe()));

    // Devices
    let fleet = Arc::new(build_fleet(&config.virtual_meters));
    let supervisor = Arc::new(
        AutomationSupervisor::new(
            Arc::clone(&fleet),
            Arc::clone(&alerts),
            Arc::clone(&configs),
            Arc::clone(&event_bus),
        )
        .with_command_timeout(config.automation.command_timeout()),
    );

    // Services
    let config_service = ConfigService::new(Arc::clone(&configs), Arc::clone(&supervisor));
    let alert_service = AlertService::new(alerts, Arc::clone(&event_bus));

    for meter in &config.virtual_meters {
        let Some(device_config) = &meter.config else {
            continue;
        };
        let stored = configs
            .get(meter.id)
            .await
            .with_context(|| format!("failed to read configuration of {}", meter.name))?;
        if stored.is_none() {
            config_service
                .replace(meter.id, device_config.clone())
                .await
                .with_context(|| format!("failed to seed configuration of {}", meter.name))?;
            tracing::info!(device = %meter.name, "device configuration seeded");
        }
    }

    supervisor
        .assign_configured()
        .await
        .context("failed to load device configurations")?;
    for device_id in fleet.device_ids() {
        supervisor.assign(device_id).await?;
    }
    tracing::info!(
        devices = supervisor.device_ids().await.len(),
        "voltguardd started"
    );

    let mut poll = tokio::time::interval(config.automation.poll_interval());
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut tick = tokio::time::interval(config.automation.tick_interval());
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = poll.tick() => {
                let report = supervisor.poll_all(Arc::clone(&fleet), now()).await;
                tracing::debug!(devices = report.devices, failures = report.failures, "poll sweep done");
            }
            _ = tick.tick() => {
                let report = supervisor.tick_all(now()).await;
                tracing::debug!(devices = report.devices, failures = report.failures, "tick sweep done");
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for shutdown signal")?;
                tracing::info!("shutdown requested");
                break;
            }
        }
    }

    match alert_service.statistics(AlertQuery::default()).await {
        Ok(stats) => tracing::info!(
            total = stats.total,
            active = stats.active(),
            "alert summary"
        ),
        Err(err) => tracing::warn!(error = %err, "could not compute alert summary"),
    }
    events.abort();
    db.close().await;

    Ok(())
}

fn build_fleet(meters: &[VirtualMeterConfig]) -> VirtualFleet {
    meters.iter().fold(VirtualFleet::default(), |fleet, meter| {
        let built = match meter.layout {
            PhaseLayout::Single => {
                VirtualMeter::single(meter.id, &meter.name, meter.voltage, meter.current)
            }
            PhaseLayout::Three => {
                VirtualMeter::three(meter.id, &meter.name, meter.voltage, meter.current)
            }
        };
        built.set_temperature(meter.temperature);
        fleet.with_meter(built)
    })
}

async fn log_events(mut subscription: Subscription) {
    while let Some(event) = subscription.next().await {
        log_event(&event);
    }
}

fn log_event(event: &AutomationEvent) {
    let device_id = event.device_id();
    match event {
        AutomationEvent::CommandIssued { command, .. } => tracing::info!(
            %device_id,
            action = %command.action,
            origin = %command.origin,
            "power command issued"
        ),
        AutomationEvent::CommandFailed {
            command, reason, ..
        } => tracing::warn!(
            %device_id,
            action = %command.action,
            origin = %command.origin,
            reason,
            "power command failed"
        ),
        AutomationEvent::ScheduleSuppressed { action, .. } => tracing::info!(
            %device_id,
            %action,
            "scheduled command suppressed by protection"
        ),
        AutomationEvent::AlertRaised { alert } => tracing::warn!(
            %device_id,
            alert_type = %alert.alert_type,
            severity = %alert.severity,
            message = %alert.message,
            "alert raised"
        ),
        AutomationEvent::AlertResolved { alert } => tracing::info!(
            %device_id,
            alert_type = %alert.alert_type,
            "alert resolved"
        ),
        AutomationEvent::StateReset { .. } => {
            tracing::info!(%device_id, "automation state reset");
        }
    }
}
