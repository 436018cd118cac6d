//! MQ-series gas sensor driver (MQ-135, MQ-2).
//!
//! Reads the heater-side load resistor through an [`AnalogInput`], owns the
//! sensor's R0 baseline and evaluates every gas channel against one shared
//! Rs/R0 ratio per sample.
//!
//! ## Baseline lifecycle
//!
//! ```text
//!   FactoryDefault(r0) ──[calibrate ok]──▶ Calibrated(r0)
//!          │                                     │
//!          └──[calibrate failed, strict]──▶ Invalid ◀──┘
//! ```
//!
//! A non-strict calibration failure keeps whatever baseline was active.

use heapless::Vec;
use log::{debug, warn};

use crate::app::ports::AnalogInput;
use crate::error::{DriverError, ReadingError};
use crate::gas::{
    AdcModel, ChannelReading, GasKind, MAX_CHANNELS, SensorModel, evaluate_channels,
    resistance_ratio,
};

use super::Baseline;

/// Result of one sampling pass over a gas sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct GasReadout {
    pub sensor: SensorModel,
    /// Raw ADC count, or the driver error that prevented it.
    pub raw: Result<u16, DriverError>,
    /// Rs/R0 shared by every channel.
    pub ratio: Result<f32, ReadingError>,
    pub channels: Vec<ChannelReading, MAX_CHANNELS>,
    /// `true` only when R0 came from a successful calibration.
    pub calibrated: bool,
}

impl GasReadout {
    /// Evaluate a raw sample against `baseline`. Pure: no I/O.
    pub fn evaluate(
        sensor: SensorModel,
        raw: Result<u16, DriverError>,
        adc: &AdcModel,
        baseline: Baseline,
    ) -> Self {
        let ratio = raw
            .map_err(ReadingError::from)
            .and_then(|r| adc.resistance(r))
            .and_then(|rs| baseline.r0().and_then(|r0| resistance_ratio(rs, r0)));
        Self {
            sensor,
            raw,
            ratio,
            channels: evaluate_channels(sensor.channels(), ratio),
            calibrated: baseline.is_calibrated(),
        }
    }

    pub fn raw_value(&self) -> Option<u16> {
        self.raw.ok()
    }

    pub fn channel(&self, gas: GasKind) -> Option<&ChannelReading> {
        self.channels.iter().find(|c| c.gas == gas)
    }

    /// Concentration of `gas`, if that channel produced a value.
    pub fn value(&self, gas: GasKind) -> Option<f32> {
        self.channel(gas).and_then(ChannelReading::ok)
    }
}

/// MQ-series sensor bound to one analog input.
pub struct GasSensor<A> {
    sensor: SensorModel,
    input: A,
    adc: AdcModel,
    baseline: Baseline,
    initialised: bool,
}

impl<A: AnalogInput> GasSensor<A> {
    pub fn new(sensor: SensorModel, input: A, adc: AdcModel, factory_r0: f32) -> Self {
        Self {
            sensor,
            input,
            adc,
            baseline: Baseline::FactoryDefault(factory_r0),
            initialised: false,
        }
    }

    pub fn init(&mut self) -> Result<(), DriverError> {
        self.input.init()?;
        self.initialised = true;
        Ok(())
    }

    pub fn model(&self) -> SensorModel {
        self.sensor
    }

    pub fn adc(&self) -> &AdcModel {
        &self.adc
    }

    pub fn read_raw(&mut self) -> Result<u16, DriverError> {
        if !self.initialised {
            return Err(DriverError::NotInitialised);
        }
        self.input.read_raw_adc()
    }

    /// Current sensor resistance Rs (kΩ).
    pub fn read_resistance(&mut self) -> Result<f32, ReadingError> {
        let raw = self.read_raw()?;
        self.adc.resistance(raw)
    }

    /// Sample once and evaluate every channel.
    pub fn read_all(&mut self) -> GasReadout {
        let raw = self.read_raw();
        if let Err(e) = raw {
            warn!("{}: read failed: {e}", self.sensor.label());
        }
        let readout = GasReadout::evaluate(self.sensor, raw, &self.adc, self.baseline);
        debug!(
            "{}: raw={:?} ratio={:?}",
            self.sensor.label(),
            readout.raw,
            readout.ratio
        );
        readout
    }

    pub fn baseline(&self) -> Baseline {
        self.baseline
    }

    pub fn set_calibrated_r0(&mut self, r0: f32) {
        self.baseline = Baseline::Calibrated(r0);
    }

    /// Manually configured R0. Replaces any calibrated value.
    pub fn set_factory_r0(&mut self, r0: f32) {
        self.baseline = Baseline::FactoryDefault(r0);
    }

    /// Apply the failure policy after an aborted calibration.
    pub fn calibration_failed(&mut self, strict: bool) {
        if strict {
            self.baseline = Baseline::Invalid;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    struct FixedInput<'a> {
        raw: &'a Cell<Result<u16, DriverError>>,
    }

    impl AnalogInput for FixedInput<'_> {
        fn init(&mut self) -> Result<(), DriverError> {
            Ok(())
        }
        fn read_raw_adc(&mut self) -> Result<u16, DriverError> {
            self.raw.get()
        }
    }

    #[test]
    fn read_before_init_is_rejected() {
        let raw = Cell::new(Ok(2048));
        let mut s = GasSensor::new(SensorModel::Mq135, FixedInput { raw: &raw }, AdcModel::default(), 10.0);
        assert_eq!(s.read_raw(), Err(DriverError::NotInitialised));
        s.init().unwrap();
        assert_eq!(s.read_raw(), Ok(2048));
    }

    #[test]
    fn read_all_shares_one_ratio() {
        let raw = Cell::new(Ok(2048));
        let mut s = GasSensor::new(SensorModel::Mq2, FixedInput { raw: &raw }, AdcModel::default(), 10.0);
        s.init().unwrap();
        let r = s.read_all();
        let ratio = r.ratio.unwrap();
        assert!((ratio - 0.999_511_7).abs() < 1e-5);
        assert_eq!(r.channels.len(), SensorModel::Mq2.channels().len());
        for (reading, ch) in r.channels.iter().zip(SensorModel::Mq2.channels()) {
            assert_eq!(reading.value, ch.curve.concentration(ratio));
        }
        assert!(!r.calibrated);
    }

    #[test]
    fn driver_error_reaches_every_channel() {
        let raw = Cell::new(Err(DriverError::AdcReadFailed));
        let mut s = GasSensor::new(SensorModel::Mq135, FixedInput { raw: &raw }, AdcModel::default(), 10.0);
        s.init().unwrap();
        let r = s.read_all();
        assert_eq!(r.raw_value(), None);
        assert!(r.channels.iter().all(|c| c.value
            == Err(ReadingError::Driver(DriverError::AdcReadFailed))));
        assert_eq!(r.value(GasKind::Co2), None);
    }

    #[test]
    fn strict_failure_invalidates_baseline() {
        let raw = Cell::new(Ok(1000));
        let mut s = GasSensor::new(SensorModel::Mq135, FixedInput { raw: &raw }, AdcModel::default(), 2.0);
        s.init().unwrap();

        s.calibration_failed(false);
        assert_eq!(s.baseline(), Baseline::FactoryDefault(2.0));
        assert!(s.read_all().ratio.is_ok());

        s.calibration_failed(true);
        assert_eq!(s.baseline(), Baseline::Invalid);
        let r = s.read_all();
        assert_eq!(r.ratio, Err(ReadingError::Uncalibrated));
        assert!(r.channels.iter().all(|c| c.value.is_err()));
        // Raw count stays available for raw alarms and the API.
        assert_eq!(r.raw_value(), Some(1000));
    }

    #[test]
    fn manual_r0_replaces_calibration() {
        let raw = Cell::new(Ok(1000));
        let mut s = GasSensor::new(SensorModel::Mq2, FixedInput { raw: &raw }, AdcModel::default(), 8.5);
        s.set_calibrated_r0(3.0);
        assert!(s.baseline().is_calibrated());
        s.set_factory_r0(60.0);
        assert_eq!(s.baseline(), Baseline::FactoryDefault(60.0));
    }
}
