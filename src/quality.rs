//! Air-quality score.
//!
//! Maps CO2, acetone and alcohol concentrations onto a 0–100 gauge
//! (lower is cleaner) with three linear bands per gas:
//!
//! ```text
//!   value ≤ good      →  0 … 30
//!   value ≤ moderate  → 30 … 60
//!   value ≤ bad       → 60 … 100
//!   value > bad       → 100
//! ```
//!
//! Each gas is taken from the MQ-135 first and falls back to the MQ-2.
//! The per-gas scores are combined by average or by worst pollutant, then
//! rounded and clamped to 1–100. With no usable gas the score is 100.

use serde::{Deserialize, Serialize};

use crate::gas::{GasKind, SensorModel};
use crate::telemetry::SampleFrame;

/// Score reported when no gas value is available.
pub const CLEAN_SCORE: u8 = 100;

/// How per-gas scores are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScoreMode {
    #[default]
    Average,
    /// Highest (dirtiest) individual score.
    Worst,
}

/// Band edges for one gas, in ppm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bands {
    pub good: f32,
    pub moderate: f32,
    pub bad: f32,
}

pub const SCORED_GASES: [(GasKind, Bands); 3] = [
    (
        GasKind::Co2,
        Bands {
            good: 100.0,
            moderate: 200.0,
            bad: 500.0,
        },
    ),
    (
        GasKind::Acetone,
        Bands {
            good: 200.0,
            moderate: 500.0,
            bad: 1000.0,
        },
    ),
    (
        GasKind::Alcohol,
        Bands {
            good: 100.0,
            moderate: 300.0,
            bad: 1000.0,
        },
    ),
];

/// Score one concentration into 0–100.
pub fn score_gas(bands: &Bands, value: f32) -> f32 {
    let Bands {
        good,
        moderate,
        bad,
    } = *bands;
    let score = if value <= good {
        value / good * 30.0
    } else if value <= moderate {
        30.0 + (value - good) / (moderate - good) * 30.0
    } else if value <= bad {
        60.0 + (value - moderate) / (bad - moderate) * 40.0
    } else {
        100.0
    };
    score.clamp(0.0, 100.0)
}

fn lookup(frame: &SampleFrame, gas: GasKind) -> Option<f32> {
    frame
        .gas(SensorModel::Mq135)
        .value(gas)
        .or_else(|| frame.gas(SensorModel::Mq2).value(gas))
}

/// Overall score for a frame.
pub fn air_quality_score(frame: &SampleFrame, mode: ScoreMode) -> u8 {
    let mut sum = 0.0f32;
    let mut worst = 0.0f32;
    let mut n = 0u32;
    for (gas, bands) in &SCORED_GASES {
        if let Some(v) = lookup(frame, *gas) {
            let s = score_gas(bands, v);
            sum += s;
            worst = worst.max(s);
            n += 1;
        }
    }
    if n == 0 {
        return CLEAN_SCORE;
    }
    let combined = match mode {
        ScoreMode::Average => sum / n as f32,
        ScoreMode::Worst => worst,
    };
    combined.round().clamp(1.0, 100.0) as u8
}
