//! Gas channel model: ADC counts → sensor resistance → concentration.
//!
//! ```text
//!   raw ──▶ V = raw / full_scale · Vcc
//!       ──▶ Rs = Vcc · RL / V − RL
//!       ──▶ ratio = Rs / R0
//!       ──▶ ppm = 10 ^ ((log10(ratio) − intercept) / slope)
//! ```
//!
//! The regression is the log-log fit of the manufacturer's sensitivity
//! curve. Every channel on a physical sensor shares one Rs/R0 ratio; only
//! the `(slope, intercept)` pair differs per gas.

pub mod curves;

use serde::{Deserialize, Serialize};

use crate::error::ReadingError;

pub use curves::SensorModel;

/// Maximum number of gas channels on one physical sensor.
pub const MAX_CHANNELS: usize = 8;

// ---------------------------------------------------------------------------
// Analog front-end
// ---------------------------------------------------------------------------

/// Electrical front-end shared by the MQ sensors: ADC resolution, supply
/// voltage and the load resistor of the divider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdcModel {
    /// ADC resolution in bits (ESP32: 12).
    pub bits: u8,
    /// Divider supply voltage (V).
    pub supply_volts: f32,
    /// Load resistor RL (kΩ).
    pub load_kohm: f32,
}

impl Default for AdcModel {
    fn default() -> Self {
        Self {
            bits: 12,
            supply_volts: 3.3,
            load_kohm: 10.0,
        }
    }
}

impl AdcModel {
    /// Full-scale count, `2^bits − 1`.
    pub fn full_scale(&self) -> u16 {
        ((1u32 << self.bits.min(16)) - 1) as u16
    }

    /// Voltage across the load resistor for a raw count.
    pub fn voltage(&self, raw: u16) -> Result<f32, ReadingError> {
        let full = self.full_scale();
        if raw > full {
            return Err(ReadingError::OutOfRange);
        }
        Ok(raw as f32 / full as f32 * self.supply_volts)
    }

    /// Sensor resistance Rs (kΩ) for a raw count.
    pub fn resistance(&self, raw: u16) -> Result<f32, ReadingError> {
        let volts = self.voltage(raw)?;
        if volts <= 0.0 {
            return Err(ReadingError::Disconnected);
        }
        let rs = (self.supply_volts * self.load_kohm) / volts - self.load_kohm;
        if !rs.is_finite() || rs <= 0.0 {
            return Err(ReadingError::Saturated);
        }
        Ok(rs)
    }
}

// ---------------------------------------------------------------------------
// Gas identity and curves
// ---------------------------------------------------------------------------

/// Every gas the two sensor families are characterised for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GasKind {
    Co,
    Alcohol,
    Co2,
    Toluene,
    Ammonium,
    Acetone,
    Hydrogen,
    Lpg,
    Propane,
}

impl GasKind {
    /// Field name used on the LCD, in JSON and in the cloud record.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Co => "CO",
            Self::Alcohol => "Alcohol",
            Self::Co2 => "CO2",
            Self::Toluene => "Toluen",
            Self::Ammonium => "NH4",
            Self::Acetone => "Aceton",
            Self::Hydrogen => "H2",
            Self::Lpg => "LPG",
            Self::Propane => "Propane",
        }
    }
}

/// Log-log regression of one gas: `log10(ratio) = slope · log10(ppm) + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GasCurve {
    pub slope: f32,
    pub intercept: f32,
}

impl GasCurve {
    pub const fn new(slope: f32, intercept: f32) -> Self {
        Self { slope, intercept }
    }

    /// Invert the regression for a given Rs/R0 ratio.
    pub fn concentration(&self, ratio: f32) -> Result<f32, ReadingError> {
        if !ratio.is_finite() || ratio <= 0.0 || self.slope == 0.0 {
            return Err(ReadingError::InvalidRatio);
        }
        let exponent = (ratio.log10() - self.intercept) / self.slope;
        let ppm = 10f32.powf(exponent);
        if !ppm.is_finite() {
            return Err(ReadingError::InvalidRatio);
        }
        Ok(ppm)
    }
}

/// One gas channel of a physical sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasChannel {
    pub gas: GasKind,
    pub curve: GasCurve,
}

impl GasChannel {
    pub const fn new(gas: GasKind, slope: f32, intercept: f32) -> Self {
        Self {
            gas,
            curve: GasCurve::new(slope, intercept),
        }
    }

    pub const fn name(&self) -> &'static str {
        self.gas.name()
    }
}

/// Outcome for one channel in one sampling pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelReading {
    pub gas: GasKind,
    pub value: Result<f32, ReadingError>,
}

impl ChannelReading {
    /// The concentration if it is available.
    pub fn ok(&self) -> Option<f32> {
        self.value.ok()
    }
}

// ---------------------------------------------------------------------------
// Ratio and full chain
// ---------------------------------------------------------------------------

/// Rs/R0. An R0 that is not a positive finite number means "uncalibrated".
pub fn resistance_ratio(rs: f32, r0: f32) -> Result<f32, ReadingError> {
    if !r0.is_finite() || r0 <= 0.0 {
        return Err(ReadingError::Uncalibrated);
    }
    let ratio = rs / r0;
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err(ReadingError::InvalidRatio);
    }
    Ok(ratio)
}

/// Full formula chain for a single channel: raw count → concentration.
pub fn concentration(
    channel: &GasChannel,
    adc: &AdcModel,
    raw: u16,
    r0: f32,
) -> Result<f32, ReadingError> {
    let rs = adc.resistance(raw)?;
    let ratio = resistance_ratio(rs, r0)?;
    channel.curve.concentration(ratio)
}

/// Evaluate every channel against one shared Rs/R0 ratio.
///
/// A ratio error is reported on every channel; curve errors stay local to the
/// channel that produced them.
pub fn evaluate_channels(
    channels: &[GasChannel],
    ratio: Result<f32, ReadingError>,
) -> heapless::Vec<ChannelReading, MAX_CHANNELS> {
    channels
        .iter()
        .take(MAX_CHANNELS)
        .map(|ch| ChannelReading {
            gas: ch.gas,
            value: ratio.and_then(|r| ch.curve.concentration(r)),
        })
        .collect()
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn monotonic_in_ratio_following_slope_sign(
            slope in prop_oneof![-3.0f32..-0.1, 0.1f32..3.0],
            intercept in -2.0f32..2.0,
            a in 0.05f32..20.0,
            b in 0.05f32..20.0,
        ) {
            prop_assume!((a - b).abs() > 1e-3);
            let curve = GasCurve::new(slope, intercept);
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            let (Ok(c_lo), Ok(c_hi)) = (curve.concentration(lo), curve.concentration(hi)) else {
                return Ok(());
            };
            if slope > 0.0 {
                prop_assert!(c_hi >= c_lo, "slope>0: f({lo})={c_lo} f({hi})={c_hi}");
            } else {
                prop_assert!(c_hi <= c_lo, "slope<0: f({lo})={c_lo} f({hi})={c_hi}");
            }
        }

        #[test]
        fn non_positive_ratio_never_yields_a_number(
            ratio in -1000.0f32..=0.0,
            slope in -3.0f32..-0.1,
            intercept in -2.0f32..2.0,
        ) {
            let curve = GasCurve::new(slope, intercept);
            prop_assert_eq!(curve.concentration(ratio), Err(ReadingError::InvalidRatio));
        }

        #[test]
        fn any_raw_count_gives_finite_value_or_error(raw in 0u16..=u16::MAX, r0 in 0.0f32..100.0) {
            let adc = AdcModel::default();
            for ch in curves::MQ2_CHANNELS {
                match concentration(ch, &adc, raw, r0) {
                    Ok(v) => prop_assert!(v.is_finite() && v >= 0.0),
                    Err(_) => {}
                }
            }
        }
    }
}
