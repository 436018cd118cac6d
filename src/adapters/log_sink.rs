//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! Each line starts with a fixed tag so a serial capture can be grepped.

use log::{info, warn};

use crate::app::events::{AppEvent, CycleSummary};
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

struct Opt<T>(Option<T>);

impl<T: core::fmt::Display> core::fmt::Display for Opt<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.0 {
            Some(v) => write!(f, "{v}"),
            None => f.write_str("ERR"),
        }
    }
}

fn log_cycle(s: &CycleSummary) {
    info!(
        "CYCLE | #{} | MQ135={} MQ2={} | T={}\u{00b0}C H={}% | score={} | buzzer={} | pushed={}",
        s.cycle,
        Opt(s.mq135_raw),
        Opt(s.mq2_raw),
        Opt(s.temperature_c.map(|t| (t * 10.0).round() / 10.0)),
        Opt(s.humidity_pct.map(|h| (h * 10.0).round() / 10.0)),
        s.score,
        if s.buzzer_on { "ON" } else { "off" },
        s.pushed,
    );
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started { push_every_cycles } => {
                info!("START | cloud push every {push_every_cycles} cycles");
            }
            AppEvent::CycleCompleted(summary) => log_cycle(summary),
            AppEvent::AlarmRaised { source, value } => {
                warn!("ALARM | {source} raised at {value:.2}");
            }
            AppEvent::AlarmCleared { source } => {
                info!("ALARM | {source} cleared");
            }
            AppEvent::CalibrationSucceeded { sensor, r0 } => {
                info!("CALIB | {} R0={r0:.3} kOhm", sensor.label());
            }
            AppEvent::CalibrationFailed {
                sensor,
                error,
                kept_r0,
            } => match kept_r0 {
                Some(r0) => warn!("CALIB | {} failed ({error}), keeping R0={r0:.3}", sensor.label()),
                None => warn!("CALIB | {} failed ({error}), sensor unusable", sensor.label()),
            },
            AppEvent::PushSucceeded { key } => {
                info!("PUSH | stored at key {key}");
            }
            AppEvent::PushFailed(e) => {
                warn!("PUSH | failed: {e}");
            }
            AppEvent::PushSkipped(reason) => {
                info!("PUSH | skipped: {reason}");
            }
            AppEvent::ConfigChanged => {
                info!("CONFIG | changed (pending save)");
            }
            AppEvent::ConfigSaved => {
                info!("CONFIG | saved to NVS");
            }
            AppEvent::CommandRejected(reason) => {
                warn!("CONFIG | command rejected: {reason}");
            }
        }
    }
}
