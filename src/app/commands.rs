//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (the local HTTP
//! API, boot logic) that the [`AppService`](super::service::AppService)
//! interprets and acts upon between sampling cycles.

use crate::alarm::AlarmSource;
use crate::config::SystemConfig;
use crate::gas::SensorModel;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppCommand {
    /// Hot-reload configuration. Rejected if it fails validation.
    UpdateConfig(SystemConfig),

    /// Buzzer switch plus the two raw-count limits, as posted by the dashboard.
    /// `None` leaves a limit unchanged.
    SetBuzzer {
        enabled: bool,
        mq135_limit: Option<f32>,
        mq2_limit: Option<f32>,
    },

    /// Set (or add) a single alarm limit.
    SetAlarmLimit(AlarmSource, f32),

    /// Install a manual R0 (kΩ) for one sensor.
    SetR0(SensorModel, f32),

    /// Toggle debug-level logging.
    SetDebugLogging(bool),

    /// Run clean-air calibration on one sensor, or both when `None`.
    Calibrate(Option<SensorModel>),

    /// Explicitly persist the current config to NVS immediately.
    SaveConfig,
}
