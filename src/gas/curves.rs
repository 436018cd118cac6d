//! Sensitivity curves for the MQ-135 and MQ-2 sensor families.
//!
//! Slopes and intercepts are the log-log fits of the datasheet curves
//! (derived from the power-law constants `ppm = a · ratio^b` as
//! `slope = 1/b`, `intercept = −log10(a)/b`). They are fixed at build time.

use serde::{Deserialize, Serialize};

use super::{GasChannel, GasKind};

/// Rs/R0 of the MQ-135 in clean air (datasheet).
pub const MQ135_CLEAN_AIR_RATIO: f32 = 3.6;
/// Rs/R0 of the MQ-2 in clean air (datasheet).
pub const MQ2_CLEAN_AIR_RATIO: f32 = 9.83;

/// MQ-135 air-quality sensor.
pub static MQ135_CHANNELS: &[GasChannel] = &[
    GasChannel::new(GasKind::Co, -0.2540, 0.7066),
    GasChannel::new(GasKind::Alcohol, -0.3145, 0.5937),
    GasChannel::new(GasKind::Co2, -0.3494, 0.7139),
    GasChannel::new(GasKind::Toluene, -0.2903, 0.4797),
    GasChannel::new(GasKind::Ammonium, -0.4044, 0.8126),
    GasChannel::new(GasKind::Acetone, -0.2968, 0.4571),
];

/// MQ-2 combustible-gas sensor.
pub static MQ2_CHANNELS: &[GasChannel] = &[
    GasChannel::new(GasKind::Hydrogen, -0.4625, 1.3852),
    GasChannel::new(GasKind::Lpg, -0.4500, 1.2417),
    GasChannel::new(GasKind::Co, -0.3216, 1.4692),
    GasChannel::new(GasKind::Alcohol, -0.3738, 1.3302),
    GasChannel::new(GasKind::Propane, -0.4613, 1.3001),
];

/// The physical gas sensors on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SensorModel {
    Mq135,
    Mq2,
}

impl SensorModel {
    pub const ALL: [Self; 2] = [Self::Mq135, Self::Mq2];

    /// Label used on the LCD and in logs.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Mq135 => "MQ-135",
            Self::Mq2 => "MQ-2",
        }
    }

    /// Object key in the JSON API and the cloud record.
    pub const fn key(self) -> &'static str {
        match self {
            Self::Mq135 => "MQ135",
            Self::Mq2 => "MQ2",
        }
    }

    pub const fn clean_air_ratio(self) -> f32 {
        match self {
            Self::Mq135 => MQ135_CLEAN_AIR_RATIO,
            Self::Mq2 => MQ2_CLEAN_AIR_RATIO,
        }
    }

    pub fn channels(self) -> &'static [GasChannel] {
        match self {
            Self::Mq135 => MQ135_CHANNELS,
            Self::Mq2 => MQ2_CHANNELS,
        }
    }

    /// Curve for `gas` on this sensor, if the sensor is characterised for it.
    pub fn channel(self, gas: GasKind) -> Option<&'static GasChannel> {
        self.channels().iter().find(|ch| ch.gas == gas)
    }
}
