//! DHT11 / DHT22 temperature and humidity sensor.
//!
//! The single-wire bit-banging lives in the hardware adapter; this module
//! decodes and validates the 40-bit frame and keeps the last good sample.
//! A failed read is reported as a [`DriverError`] for the current cycle and
//! never replaced by a stale or zero value.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::app::ports::ClimateInput;
use crate::error::DriverError;

/// Supported DHT variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DhtModel {
    Dht11,
    Dht22,
}

impl DhtModel {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Dht11 => "DHT11",
            Self::Dht22 => "DHT22",
        }
    }

    /// Minimum spacing between two reads.
    pub const fn min_interval_ms(self) -> u32 {
        match self {
            Self::Dht11 => 1000,
            Self::Dht22 => 2000,
        }
    }
}

/// One temperature / humidity measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSample {
    pub temperature_c: f32,
    pub humidity_pct: f32,
    /// Milliseconds since boot.
    pub timestamp_ms: u64,
}

/// Decode a raw frame into `(temperature_c, humidity_pct)`.
pub fn decode_frame(model: DhtModel, frame: [u8; 5]) -> Result<(f32, f32), DriverError> {
    let sum = frame[..4].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    if sum != frame[4] {
        return Err(DriverError::Checksum);
    }

    let (temperature, humidity) = match model {
        DhtModel::Dht11 => {
            let humidity = frame[0] as f32 + frame[1] as f32 * 0.1;
            let mut temperature = frame[2] as f32 + (frame[3] & 0x7F) as f32 * 0.1;
            if frame[3] & 0x80 != 0 {
                temperature = -temperature;
            }
            (temperature, humidity)
        }
        DhtModel::Dht22 => {
            let humidity = u16::from_be_bytes([frame[0], frame[1]]) as f32 / 10.0;
            let raw_temp = u16::from_be_bytes([frame[2] & 0x7F, frame[3]]);
            let mut temperature = raw_temp as f32 / 10.0;
            if frame[2] & 0x80 != 0 {
                temperature = -temperature;
            }
            (temperature, humidity)
        }
    };

    if !(0.0..=100.0).contains(&humidity) || !(-40.0..=80.0).contains(&temperature) {
        return Err(DriverError::InvalidData);
    }
    Ok((temperature, humidity))
}

/// DHT sensor bound to one data line.
pub struct EnvironmentSensor<C> {
    model: DhtModel,
    input: C,
    initialised: bool,
    last_good: Option<EnvironmentSample>,
}

impl<C: ClimateInput> EnvironmentSensor<C> {
    pub fn new(model: DhtModel, input: C) -> Self {
        Self {
            model,
            input,
            initialised: false,
            last_good: None,
        }
    }

    pub fn init(&mut self) -> Result<(), DriverError> {
        self.input.init()?;
        self.initialised = true;
        Ok(())
    }

    pub fn model(&self) -> DhtModel {
        self.model
    }

    pub fn read(&mut self, now_ms: u64) -> Result<EnvironmentSample, DriverError> {
        if !self.initialised {
            return Err(DriverError::NotInitialised);
        }
        let result = self
            .input
            .read_frame()
            .and_then(|frame| decode_frame(self.model, frame));
        match result {
            Ok((temperature_c, humidity_pct)) => {
                let sample = EnvironmentSample {
                    temperature_c,
                    humidity_pct,
                    timestamp_ms: now_ms,
                };
                self.last_good = Some(sample);
                Ok(sample)
            }
            Err(e) => {
                warn!("{}: read failed: {e}", self.model.label());
                Err(e)
            }
        }
    }

    pub fn last_good(&self) -> Option<EnvironmentSample> {
        self.last_good
    }
}
