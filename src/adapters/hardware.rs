//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the [`SensorHub`] and the buzzer driver, exposing them through
//! [`SensorPort`] and [`BuzzerPort`].  This is the only module in the
//! system that touches actual hardware.  On non-espidf targets the ADC and
//! DHT line read from injectable simulation statics instead.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};

use embedded_hal::delay::DelayNs;

use crate::app::ports::{AnalogInput, BuzzerPort, ClimateInput, SensorPort};
use crate::drivers::buzzer::BuzzerDriver;
#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;
use crate::error::{CalibrationError, DriverError};
use crate::gas::SensorModel;
use crate::pins;
use crate::sensors::environment::{DhtModel, EnvironmentSample};
use crate::sensors::gas::GasReadout;
use crate::sensors::{Baseline, SensorHub};

// ── Simulation hooks (host builds) ────────────────────────────

/// `u32::MAX` marks a failing conversion.
const SIM_ADC_FAIL: u32 = u32::MAX;

static SIM_ADC: [AtomicU32; 2] = [AtomicU32::new(0), AtomicU32::new(0)];
static SIM_DHT_FRAME: AtomicU64 = AtomicU64::new(0);
static SIM_DHT_OK: AtomicBool = AtomicBool::new(false);

const fn sim_index(sensor: SensorModel) -> usize {
    match sensor {
        SensorModel::Mq135 => 0,
        SensorModel::Mq2 => 1,
    }
}

/// Inject the next raw count for `sensor`; `None` makes reads fail.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_adc(sensor: SensorModel, raw: Option<u16>) {
    SIM_ADC[sim_index(sensor)].store(raw.map_or(SIM_ADC_FAIL, u32::from), Ordering::Relaxed);
}

/// Inject the next DHT frame; `None` makes reads time out.
#[cfg(not(target_os = "espidf"))]
pub fn sim_set_dht_frame(frame: Option<[u8; 5]>) {
    if let Some(f) = frame {
        let mut packed = [0u8; 8];
        packed[..5].copy_from_slice(&f);
        SIM_DHT_FRAME.store(u64::from_le_bytes(packed), Ordering::Relaxed);
    }
    SIM_DHT_OK.store(frame.is_some(), Ordering::Relaxed);
}

// ───────────────────────────────────────────────────────────────
// ADC input
// ───────────────────────────────────────────────────────────────

/// One ADC1 channel feeding an MQ sensor's load resistor.
pub struct AdcInput {
    sensor: SensorModel,
    gpio: i32,
    channel: Option<u32>,
}

impl AdcInput {
    pub fn new(sensor: SensorModel, gpio: i32) -> Self {
        Self {
            sensor,
            gpio,
            channel: None,
        }
    }
}

impl AnalogInput for AdcInput {
    fn init(&mut self) -> Result<(), DriverError> {
        let channel = pins::adc1_channel(self.gpio).ok_or(DriverError::NotInitialised)?;
        #[cfg(target_os = "espidf")]
        if !hw_init::adc_ready() {
            return Err(DriverError::NotInitialised);
        }
        self.channel = Some(channel);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn read_raw_adc(&mut self) -> Result<u16, DriverError> {
        let channel = self.channel.ok_or(DriverError::NotInitialised)?;
        hw_init::adc1_read(channel)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_raw_adc(&mut self) -> Result<u16, DriverError> {
        self.channel.ok_or(DriverError::NotInitialised)?;
        let raw = SIM_ADC[sim_index(self.sensor)].load(Ordering::Relaxed);
        if raw == SIM_ADC_FAIL {
            return Err(DriverError::AdcReadFailed);
        }
        u16::try_from(raw).map_err(|_| DriverError::InvalidData)
    }
}

// ───────────────────────────────────────────────────────────────
// DHT single-wire line
// ───────────────────────────────────────────────────────────────

/// Bit-banged DHT11/DHT22 data line.
pub struct DhtLine {
    gpio: i32,
    model: DhtModel,
    ready: bool,
}

impl DhtLine {
    pub fn new(gpio: i32, model: DhtModel) -> Self {
        Self {
            gpio,
            model,
            ready: false,
        }
    }

    /// Host start signal length.
    #[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
    const fn start_low_us(&self) -> u32 {
        match self.model {
            DhtModel::Dht11 => 18_000,
            DhtModel::Dht22 => 1_100,
        }
    }
}

/// A data bit whose high phase lasts longer than this is a `1`.
#[cfg(target_os = "espidf")]
const BIT_THRESHOLD_US: u32 = 40;

/// Busy-wait until the line reads `level`. Returns the wait in µs.
#[cfg(target_os = "espidf")]
fn wait_for_level(gpio: i32, level: bool, timeout_us: u32) -> Result<u32, DriverError> {
    let start = hw_init::micros();
    loop {
        let elapsed = (hw_init::micros() - start) as u32;
        if hw_init::gpio_read(gpio) == level {
            return Ok(elapsed);
        }
        if elapsed > timeout_us {
            return Err(DriverError::Timeout);
        }
    }
}

impl ClimateInput for DhtLine {
    fn init(&mut self) -> Result<(), DriverError> {
        self.ready = true;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn read_frame(&mut self) -> Result<[u8; 5], DriverError> {
        if !self.ready {
            return Err(DriverError::NotInitialised);
        }
        let gpio = self.gpio;

        // Start signal, then release the line to the pull-up.
        hw_init::gpio_write(gpio, false);
        hw_init::delay_us(self.start_low_us());

        // The 40 bits are timed in µs; keep the scheduler out.
        esp_idf_svc::hal::interrupt::free(|| {
            hw_init::gpio_write(gpio, true);

            // Sensor response: ~80 µs low, ~80 µs high.
            wait_for_level(gpio, false, 100)?;
            wait_for_level(gpio, true, 100)?;
            wait_for_level(gpio, false, 100)?;

            let mut frame = [0u8; 5];
            for bit in 0..40 {
                wait_for_level(gpio, true, 80)?;
                let high_us = wait_for_level(gpio, false, 100)?;
                let byte = &mut frame[bit / 8];
                *byte <<= 1;
                if high_us > BIT_THRESHOLD_US {
                    *byte |= 1;
                }
            }
            Ok(frame)
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_frame(&mut self) -> Result<[u8; 5], DriverError> {
        if !self.ready {
            return Err(DriverError::NotInitialised);
        }
        log::trace!(
            "dht(sim): GPIO{} start {} µs",
            self.gpio,
            self.start_low_us()
        );
        if !SIM_DHT_OK.load(Ordering::Relaxed) {
            return Err(DriverError::Timeout);
        }
        let packed = SIM_DHT_FRAME.load(Ordering::Relaxed).to_le_bytes();
        let mut frame = [0u8; 5];
        frame.copy_from_slice(&packed[..5]);
        Ok(frame)
    }
}

// ───────────────────────────────────────────────────────────────
// Hardware adapter
// ───────────────────────────────────────────────────────────────

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<D> {
    sensor_hub: SensorHub<AdcInput, DhtLine, D>,
    buzzer: BuzzerDriver,
}

impl<D: DelayNs> HardwareAdapter<D> {
    pub fn new(sensor_hub: SensorHub<AdcInput, DhtLine, D>, buzzer: BuzzerDriver) -> Self {
        Self { sensor_hub, buzzer }
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<D: DelayNs> SensorPort for HardwareAdapter<D> {
    fn init(&mut self) {
        self.sensor_hub.init();
    }

    fn read_gas(&mut self, sensor: SensorModel) -> GasReadout {
        self.sensor_hub.read_gas(sensor)
    }

    fn read_environment(&mut self, now_ms: u64) -> Result<EnvironmentSample, DriverError> {
        self.sensor_hub.read_environment(now_ms)
    }

    fn last_environment(&self) -> Option<EnvironmentSample> {
        self.sensor_hub.last_environment()
    }

    fn calibrate(
        &mut self,
        sensor: SensorModel,
        sample_count: u32,
        settle_ms: u32,
    ) -> Result<f32, CalibrationError> {
        // Silence during calibration so the buzzer does not sit latched
        // through a multi-second run.
        self.buzzer.set(false);
        self.sensor_hub.calibrate(sensor, sample_count, settle_ms)
    }

    fn calibration_failed(&mut self, sensor: SensorModel, strict: bool) {
        self.sensor_hub.calibration_failed(sensor, strict);
    }

    fn set_r0(&mut self, sensor: SensorModel, r0: f32) {
        self.sensor_hub.set_r0(sensor, r0);
    }

    fn baseline(&self, sensor: SensorModel) -> Baseline {
        self.sensor_hub.baseline(sensor)
    }
}

// ── BuzzerPort implementation ─────────────────────────────────

impl<D> BuzzerPort for HardwareAdapter<D> {
    fn set_buzzer(&mut self, on: bool) {
        self.buzzer.set(on);
    }

    fn is_buzzer_on(&self) -> bool {
        self.buzzer.is_on()
    }
}
