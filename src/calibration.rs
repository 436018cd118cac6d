//! Clean-air R0 calibration.
//!
//! ```text
//!   for i in 0..n:  Rs_i = resistance(read_raw())    (settle between reads)
//!   R0 = mean(Rs) / clean_air_ratio
//! ```
//!
//! The sensor must sit in clean air. Any failed read or unusable sample
//! aborts the run; the partial mean is discarded and the sensor's baseline
//! is left untouched.

use embedded_hal::delay::DelayNs;
use log::{info, warn};

use crate::app::ports::AnalogInput;
use crate::config::MAX_R0_KOHM;
use crate::error::{CalibrationError, ReadingError};
use crate::sensors::gas::GasSensor;

/// State of one calibration run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSession {
    sample_count: u32,
    mean_rs: f32,
    target_sample_count: u32,
}

impl CalibrationSession {
    pub fn new(target_sample_count: u32) -> Result<Self, CalibrationError> {
        if target_sample_count == 0 {
            return Err(CalibrationError::NoSamples);
        }
        Ok(Self {
            sample_count: 0,
            mean_rs: 0.0,
            target_sample_count,
        })
    }

    /// Fold one Rs sample into the running mean.
    ///
    /// Incremental form so that N identical samples reproduce the sample
    /// bit-for-bit.
    pub fn push(&mut self, rs: f32) -> Result<(), CalibrationError> {
        if !rs.is_finite() || rs <= 0.0 {
            return Err(CalibrationError::InvalidSample(ReadingError::Saturated));
        }
        self.sample_count += 1;
        self.mean_rs += (rs - self.mean_rs) / self.sample_count as f32;
        Ok(())
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn is_complete(&self) -> bool {
        self.sample_count >= self.target_sample_count
    }

    pub fn mean_rs(&self) -> Option<f32> {
        (self.sample_count > 0).then_some(self.mean_rs)
    }

    /// R0 from the samples collected so far.
    ///
    /// An R0 outside `(0, MAX_R0_KOHM]` is rejected: it would not pass
    /// config validation once written back.
    pub fn finish(&self, clean_air_ratio: f32) -> Result<f32, CalibrationError> {
        let mean = self.mean_rs().ok_or(CalibrationError::NoSamples)?;
        let r0 = mean / clean_air_ratio;
        if !r0.is_finite() || r0 <= 0.0 || r0 > MAX_R0_KOHM {
            return Err(CalibrationError::InvalidSample(ReadingError::InvalidRatio));
        }
        Ok(r0)
    }
}

/// Calibrate `sensor` in clean air and install the resulting R0.
///
/// Takes `sample_count` readings, `settle_ms` apart.
pub fn calibrate<A: AnalogInput, D: DelayNs>(
    sensor: &mut GasSensor<A>,
    sample_count: u32,
    settle_ms: u32,
    delay: &mut D,
) -> Result<f32, CalibrationError> {
    let model = sensor.model();
    let mut session = CalibrationSession::new(sample_count)?;
    info!("{}: calibrating over {sample_count} samples", model.label());

    while !session.is_complete() {
        if session.sample_count() > 0 {
            delay.delay_ms(settle_ms);
        }
        let step = sensor
            .read_resistance()
            .map_err(CalibrationError::from)
            .and_then(|rs| session.push(rs));
        if let Err(e) = step {
            warn!(
                "{}: calibration aborted after {} samples: {e}",
                model.label(),
                session.sample_count()
            );
            return Err(e);
        }
    }

    let r0 = session.finish(model.clean_air_ratio())?;
    sensor.set_calibrated_r0(r0);
    info!("{}: R0 = {r0:.3} kΩ", model.label());
    Ok(r0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriverError;
    use crate::gas::{AdcModel, SensorModel};
    use crate::sensors::Baseline;

    struct Script {
        reads: Vec<Result<u16, DriverError>>,
        pos: usize,
    }

    impl AnalogInput for Script {
        fn init(&mut self) -> Result<(), DriverError> {
            Ok(())
        }
        fn read_raw_adc(&mut self) -> Result<u16, DriverError> {
            let r = self.reads[self.pos.min(self.reads.len() - 1)];
            self.pos += 1;
            r
        }
    }

    #[derive(Default)]
    struct CountingDelay {
        total_ms: u64,
        calls: u32,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.total_ms += u64::from(ns) / 1_000_000;
            self.calls += 1;
        }
        fn delay_ms(&mut self, ms: u32) {
            self.total_ms += u64::from(ms);
            self.calls += 1;
        }
    }

    fn sensor(reads: Vec<Result<u16, DriverError>>) -> GasSensor<Script> {
        let mut s = GasSensor::new(
            SensorModel::Mq135,
            Script { reads, pos: 0 },
            AdcModel::default(),
            2.0,
        );
        s.init().unwrap();
        s
    }

    #[test]
    fn identical_samples_give_exact_r0() {
        let raw = 1234;
        let rs = AdcModel::default().resistance(raw).unwrap();
        let mut s = sensor(vec![Ok(raw)]);
        let mut d = CountingDelay::default();
        let r0 = calibrate(&mut s, 50, 500, &mut d).unwrap();
        assert_eq!(r0, rs / SensorModel::Mq135.clean_air_ratio());
        assert_eq!(s.baseline(), Baseline::Calibrated(r0));
    }

    #[test]
    fn settle_delay_between_samples() {
        let mut s = sensor(vec![Ok(1500)]);
        let mut d = CountingDelay::default();
        calibrate(&mut s, 10, 250, &mut d).unwrap();
        assert_eq!(d.calls, 9);
        assert_eq!(d.total_ms, 9 * 250);
    }

    #[test]
    fn zero_samples_rejected() {
        let mut s = sensor(vec![Ok(1500)]);
        let err = calibrate(&mut s, 0, 10, &mut CountingDelay::default());
        assert_eq!(err, Err(CalibrationError::NoSamples));
        assert_eq!(s.baseline(), Baseline::FactoryDefault(2.0));
    }

    #[test]
    fn driver_error_aborts_without_writing_r0() {
        let mut s = sensor(vec![Ok(1500), Ok(1500), Err(DriverError::AdcReadFailed), Ok(1500)]);
        let err = calibrate(&mut s, 4, 0, &mut CountingDelay::default());
        assert_eq!(err, Err(CalibrationError::Driver(DriverError::AdcReadFailed)));
        assert_eq!(s.baseline(), Baseline::FactoryDefault(2.0));
    }

    #[test]
    fn disconnected_sample_aborts() {
        let mut s = sensor(vec![Ok(1500), Ok(0)]);
        let err = calibrate(&mut s, 3, 0, &mut CountingDelay::default());
        assert_eq!(
            err,
            Err(CalibrationError::InvalidSample(ReadingError::Disconnected))
        );
        assert_eq!(s.baseline(), Baseline::FactoryDefault(2.0));
    }

    #[test]
    fn out_of_range_r0_rejected() {
        // Raw 5 is a near-open circuit: Rs ≈ 8180 kΩ, R0 ≈ 2272 kΩ.
        let mut s = sensor(vec![Ok(5)]);
        let err = calibrate(&mut s, 4, 0, &mut CountingDelay::default());
        assert_eq!(
            err,
            Err(CalibrationError::InvalidSample(ReadingError::InvalidRatio))
        );
        assert_eq!(s.baseline(), Baseline::FactoryDefault(2.0));

        let mut session = CalibrationSession::new(1).unwrap();
        session.push(MAX_R0_KOHM * 3.6).unwrap();
        assert!(session.finish(3.6).is_ok());
        session.push(MAX_R0_KOHM * 3.6 * 4.0).unwrap();
        assert!(session.finish(3.6).is_err());
    }

    #[test]
    fn session_mean_of_distinct_samples() {
        let mut session = CalibrationSession::new(3).unwrap();
        for rs in [9.0, 10.0, 11.0] {
            session.push(rs).unwrap();
        }
        assert!(session.is_complete());
        let r0 = session.finish(2.0).unwrap();
        assert!((r0 - 5.0).abs() < 1e-5);
    }

    #[test]
    fn session_rejects_non_positive_sample() {
        let mut session = CalibrationSession::new(2).unwrap();
        assert!(session.push(-1.0).is_err());
        assert!(session.push(f32::INFINITY).is_err());
        assert_eq!(session.sample_count(), 0);
        assert_eq!(session.finish(3.6), Err(CalibrationError::NoSamples));
    }
}
