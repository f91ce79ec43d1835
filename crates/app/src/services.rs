//! Application services: operator-facing use-cases.
//!
//! Each service struct accepts port trait implementations via generic parameters
//! (constructor injection), keeping this layer decoupled from concrete adapters.

pub mod alert_service;
pub mod config_service;
