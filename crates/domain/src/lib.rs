//! # voltguard-domain
//!
//! Pure domain model for the voltguard device automation core.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Normalized **telemetry** samples (single- and three-phase)
//! - **Protection**: threshold evaluation and the shutdown/restart state machine
//! - **Schedule**: weekday/time rules evaluated in the device timezone
//! - **Conflict** arbitration between protection, schedule and operators
//! - **Alerts** and their deduplicated lifecycle
//! - Per-device automation state and the events the automation emits
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod alert;
pub mod automation_state;
pub mod conflict;
pub mod device_config;
pub mod event;
pub mod power;
pub mod protection;
pub mod schedule;
pub mod telemetry;
