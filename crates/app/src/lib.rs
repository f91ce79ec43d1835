//! # voltguard-app
//!
//! Application layer: use-cases and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `TelemetrySource`: poll the latest reading of a device
//!   - `CommandGateway`: switch device relays
//!   - `ConfigStore`: whole-object protection and schedule settings
//!   - `AlertStore`: append-or-update alerts and query them
//!   - `EventPublisher`: broadcast automation events
//! - Drive the domain state machines:
//!   - `DeviceAutomationOrchestrator`: one device, single writer of its state
//!   - `AutomationSupervisor`: per-device registry, parallel poll and tick sweeps
//! - Provide operator use-cases (`AlertService`, `ConfigService`)
//! - Provide **in-process infrastructure** (event bus) that doesn't need IO
//!
//! ## Dependency rule
//! Depends on `voltguard-domain` only (plus `tokio` for locks, timeouts and tasks).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod event_bus;
pub mod orchestrator;
pub mod ports;
pub mod services;
pub mod supervisor;

#[cfg(test)]
mod testing;
