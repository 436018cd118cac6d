//! AirSense firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod alarm;
pub mod app;
pub mod calibration;
pub mod config;
pub mod display;
pub mod error;
pub mod events;
pub mod fsm;
pub mod gas;
pub mod pins;
pub mod quality;
pub mod scheduler;
pub mod telemetry;

// Hardware-facing modules; ESP-IDF code inside is cfg-gated with a host
// simulation fallback so the crate builds and tests on the host.
pub mod adapters;
pub mod drivers;
pub mod sensors;
