//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the application core and the outside world.
//! They are defined here (in `app`) so that both the use-case layer and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod alert_store;
pub mod command_gateway;
pub mod config_store;
pub mod event_bus;
pub mod telemetry_source;

pub use alert_store::AlertStore;
pub use command_gateway::CommandGateway;
pub use config_store::ConfigStore;
pub use event_bus::EventPublisher;
pub use telemetry_source::TelemetrySource;
