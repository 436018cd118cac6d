//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, record them in tests,
//! etc.

use crate::alarm::AlarmSource;
use crate::error::{CalibrationError, TransportError};
use crate::gas::SensorModel;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The application service has started.
    Started { push_every_cycles: u32 },

    /// One sampling cycle went through all four states.
    CycleCompleted(CycleSummary),

    AlarmRaised { source: AlarmSource, value: f32 },
    AlarmCleared { source: AlarmSource },

    CalibrationSucceeded { sensor: SensorModel, r0: f32 },
    /// `kept_r0` is the baseline still in use, `None` if the sensor is
    /// now unusable.
    CalibrationFailed {
        sensor: SensorModel,
        error: CalibrationError,
        kept_r0: Option<f32>,
    },

    PushSucceeded { key: u64 },
    /// The request was made and failed.
    PushFailed(TransportError),
    /// Push cycle reached but no request was made (offline, clock not
    /// synced). The next scheduled push is the retry.
    PushSkipped(TransportError),

    /// Runtime configuration changed (not yet persisted).
    ConfigChanged,
    /// Configuration written to NVS.
    ConfigSaved,
    /// A command was refused.
    CommandRejected(&'static str),
}

/// Compact digest of one cycle, for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleSummary {
    pub cycle: u32,
    pub mq135_raw: Option<u16>,
    pub mq2_raw: Option<u16>,
    pub temperature_c: Option<f32>,
    pub humidity_pct: Option<f32>,
    pub score: u8,
    pub buzzer_on: bool,
    pub pushed: bool,
}
