//! Sample frame and its JSON renderings.
//!
//! A [`SampleFrame`] is everything one cycle measured and decided. It is
//! overwritten every cycle; nothing here keeps history.
//!
//! Unavailable values are rendered as JSON `null`, never as `0` or `NaN`.

use core::fmt::Write as _;

use heapless::Vec;
use serde_json::{Map, Value, json};

use crate::alarm::{AlarmState, MAX_THRESHOLDS};
use crate::error::DriverError;
use crate::gas::SensorModel;
use crate::sensors::environment::EnvironmentSample;
use crate::sensors::gas::GasReadout;

/// Base path of the cloud store. Records live at `espData/<unix-seconds>`.
pub const CLOUD_BASE_PATH: &str = "espData";

/// One cycle's worth of measurements and decisions.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFrame {
    /// Cycle number, starting at 1.
    pub cycle: u32,
    /// Milliseconds since boot at the start of sampling.
    pub timestamp_ms: u64,
    pub mq135: GasReadout,
    pub mq2: GasReadout,
    pub environment: Result<EnvironmentSample, DriverError>,
    /// Filled in by the alarm supervisor during evaluation.
    pub alarms: Vec<AlarmState, MAX_THRESHOLDS>,
    pub buzzer_on: bool,
    /// Air-quality score (1–100, lower is cleaner).
    pub score: u8,
}

impl SampleFrame {
    pub fn new(
        cycle: u32,
        timestamp_ms: u64,
        mq135: GasReadout,
        mq2: GasReadout,
        environment: Result<EnvironmentSample, DriverError>,
    ) -> Self {
        Self {
            cycle,
            timestamp_ms,
            mq135,
            mq2,
            environment,
            alarms: Vec::new(),
            buzzer_on: false,
            score: crate::quality::CLEAN_SCORE,
        }
    }

    pub fn gas(&self, sensor: SensorModel) -> &GasReadout {
        match sensor {
            SensorModel::Mq135 => &self.mq135,
            SensorModel::Mq2 => &self.mq2,
        }
    }

    pub fn any_alarm(&self) -> bool {
        self.alarms.iter().any(|a| a.exceeded)
    }
}

/// Two-decimal JSON number, or `null`.
fn number(v: Option<f32>) -> Value {
    match v {
        Some(v) if v.is_finite() => json!((f64::from(v) * 100.0).round() / 100.0),
        _ => Value::Null,
    }
}

/// Channel map for one gas sensor, keyed by the dashboard's field names.
pub fn gas_json(readout: &GasReadout) -> Value {
    let mut obj = Map::new();
    for ch in &readout.channels {
        obj.insert(ch.gas.name().into(), number(ch.ok()));
    }
    obj.insert(
        "Raw".into(),
        readout.raw_value().map_or(Value::Null, |r| json!(r)),
    );
    obj.insert("calibrated".into(), json!(readout.calibrated));
    Value::Object(obj)
}

pub fn environment_json(env: Option<&EnvironmentSample>) -> Value {
    json!({
        "temperature": number(env.map(|e| e.temperature_c)),
        "humidity": number(env.map(|e| e.humidity_pct)),
    })
}

/// Record stored under `espData/<key>`.
pub fn cloud_record(frame: &SampleFrame) -> Value {
    let alarms: std::vec::Vec<String> = frame
        .alarms
        .iter()
        .filter(|a| a.exceeded)
        .map(|a| a.source.to_string())
        .collect();
    json!({
        "mq135": gas_json(&frame.mq135),
        "mq2": gas_json(&frame.mq2),
        "dht": environment_json(frame.environment.as_ref().ok()),
        "score": frame.score,
        "alarms": alarms,
    })
}

/// Cloud key for a wall-clock time: Unix seconds as a decimal string.
pub fn timestamp_key(unix_secs: u64) -> heapless::String<20> {
    let mut key = heapless::String::new();
    // u64::MAX has 20 digits, always fits.
    let _ = write!(key, "{unix_secs}");
    key
}
