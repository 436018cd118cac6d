//! Sensor subsystem: individual drivers and the aggregating [`SensorHub`].
//!
//! The hub owns both gas sensors, the DHT sensor and the delay used for
//! calibration settling, and implements [`SensorPort`] for the service.

pub mod environment;
pub mod gas;

use embedded_hal::delay::DelayNs;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::app::ports::{AnalogInput, ClimateInput, SensorPort};
use crate::calibration;
use crate::error::{CalibrationError, DriverError, ReadingError};
use crate::gas::SensorModel;
use environment::{EnvironmentSample, EnvironmentSensor};
use gas::{GasReadout, GasSensor};

/// Where a sensor's R0 comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Baseline {
    /// Configured value (board preset or set over the API).
    FactoryDefault(f32),
    /// Measured by a clean-air calibration run.
    Calibrated(f32),
    /// No usable R0; every channel reports `Uncalibrated`.
    Invalid,
}

impl Baseline {
    pub fn r0(self) -> Result<f32, ReadingError> {
        match self {
            Self::FactoryDefault(r0) | Self::Calibrated(r0) if r0.is_finite() && r0 > 0.0 => {
                Ok(r0)
            }
            _ => Err(ReadingError::Uncalibrated),
        }
    }

    pub fn is_calibrated(self) -> bool {
        matches!(self, Self::Calibrated(_))
    }
}

/// Aggregates all sensor drivers.
pub struct SensorHub<A, C, D> {
    pub mq135: GasSensor<A>,
    pub mq2: GasSensor<A>,
    pub environment: EnvironmentSensor<C>,
    delay: D,
}

impl<A: AnalogInput, C: ClimateInput, D: DelayNs> SensorHub<A, C, D> {
    /// Construct a new hub. Drivers are built in main where peripheral
    /// ownership is established.
    pub fn new(
        mq135: GasSensor<A>,
        mq2: GasSensor<A>,
        environment: EnvironmentSensor<C>,
        delay: D,
    ) -> Self {
        Self {
            mq135,
            mq2,
            environment,
            delay,
        }
    }

    fn gas_mut(&mut self, sensor: SensorModel) -> &mut GasSensor<A> {
        match sensor {
            SensorModel::Mq135 => &mut self.mq135,
            SensorModel::Mq2 => &mut self.mq2,
        }
    }

    fn gas(&self, sensor: SensorModel) -> &GasSensor<A> {
        match sensor {
            SensorModel::Mq135 => &self.mq135,
            SensorModel::Mq2 => &self.mq2,
        }
    }
}

impl<A: AnalogInput, C: ClimateInput, D: DelayNs> SensorPort for SensorHub<A, C, D> {
    fn init(&mut self) {
        for model in SensorModel::ALL {
            if let Err(e) = self.gas_mut(model).init() {
                warn!("{}: init failed: {e}", model.label());
            }
        }
        if let Err(e) = self.environment.init() {
            warn!("{}: init failed: {e}", self.environment.model().label());
        }
    }

    fn read_gas(&mut self, sensor: SensorModel) -> GasReadout {
        self.gas_mut(sensor).read_all()
    }

    fn read_environment(&mut self, now_ms: u64) -> Result<EnvironmentSample, DriverError> {
        self.environment.read(now_ms)
    }

    fn last_environment(&self) -> Option<EnvironmentSample> {
        self.environment.last_good()
    }

    fn calibrate(
        &mut self,
        sensor: SensorModel,
        sample_count: u32,
        settle_ms: u32,
    ) -> Result<f32, CalibrationError> {
        let (target, delay) = match sensor {
            SensorModel::Mq135 => (&mut self.mq135, &mut self.delay),
            SensorModel::Mq2 => (&mut self.mq2, &mut self.delay),
        };
        calibration::calibrate(target, sample_count, settle_ms, delay)
    }

    fn calibration_failed(&mut self, sensor: SensorModel, strict: bool) {
        self.gas_mut(sensor).calibration_failed(strict);
    }

    fn set_r0(&mut self, sensor: SensorModel, r0: f32) {
        self.gas_mut(sensor).set_factory_r0(r0);
    }

    fn baseline(&self, sensor: SensorModel) -> Baseline {
        self.gas(sensor).baseline()
    }
}
