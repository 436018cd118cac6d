//! Mock adapters for integration tests.
//!
//! The sensor side is the real [`SensorHub`] fed by scripted inputs, so the
//! whole raw → concentration chain runs exactly as on the device. Every
//! output port records what it was asked to do.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use airsense::app::events::AppEvent;
use airsense::app::ports::{
    AnalogInput, BuzzerPort, ClimateInput, ClockPort, CloudPort, ConfigError, ConfigPort,
    DisplayPort, EventSink, NetworkPort, SensorPort, StorageError, StoragePort,
};
use airsense::config::SystemConfig;
use airsense::error::{CalibrationError, DriverError, TransportError};
use airsense::gas::SensorModel;
use airsense::sensors::Baseline;
use airsense::sensors::SensorHub;
use airsense::sensors::environment::{DhtModel, EnvironmentSample, EnvironmentSensor};
use airsense::sensors::gas::{GasReadout, GasSensor};
use airsense::telemetry::SampleFrame;
use embedded_hal::delay::DelayNs;
use serde_json::Value;

/// DHT11 frame for 41.0 %RH, 22.5 °C.
pub const GOOD_DHT_FRAME: [u8; 5] = [41, 0, 22, 5, 68];

// ── Scripted inputs ───────────────────────────────────────────

pub type AdcHandle = Rc<Cell<Result<u16, DriverError>>>;
pub type DhtHandle = Rc<Cell<Result<[u8; 5], DriverError>>>;

pub struct ScriptedAdc {
    raw: AdcHandle,
    reads: Rc<Cell<u32>>,
}

impl AnalogInput for ScriptedAdc {
    fn init(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    fn read_raw_adc(&mut self) -> Result<u16, DriverError> {
        self.reads.set(self.reads.get() + 1);
        self.raw.get()
    }
}

pub struct ScriptedDht {
    frame: DhtHandle,
}

impl ClimateInput for ScriptedDht {
    fn init(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    fn read_frame(&mut self) -> Result<[u8; 5], DriverError> {
        self.frame.get()
    }
}

pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

// ── MockHardware ──────────────────────────────────────────────

/// Real sensor hub on scripted inputs, plus a recording buzzer.
pub struct MockHardware {
    hub: SensorHub<ScriptedAdc, ScriptedDht, NoDelay>,
    pub mq135: AdcHandle,
    pub mq2: AdcHandle,
    pub dht: DhtHandle,
    pub mq135_reads: Rc<Cell<u32>>,
    /// Every `set_buzzer` call, in order.
    pub buzzer_calls: Vec<bool>,
    buzzer_on: bool,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new(config: &SystemConfig) -> Self {
        let mq135: AdcHandle = Rc::new(Cell::new(Ok(1000)));
        let mq2: AdcHandle = Rc::new(Cell::new(Ok(800)));
        let dht: DhtHandle = Rc::new(Cell::new(Ok(GOOD_DHT_FRAME)));
        let mq135_reads = Rc::new(Cell::new(0));

        let hub = SensorHub::new(
            GasSensor::new(
                SensorModel::Mq135,
                ScriptedAdc {
                    raw: mq135.clone(),
                    reads: mq135_reads.clone(),
                },
                config.adc,
                config.r0_mq135,
            ),
            GasSensor::new(
                SensorModel::Mq2,
                ScriptedAdc {
                    raw: mq2.clone(),
                    reads: Rc::new(Cell::new(0)),
                },
                config.adc,
                config.r0_mq2,
            ),
            EnvironmentSensor::new(DhtModel::Dht11, ScriptedDht { frame: dht.clone() }),
            NoDelay,
        );

        Self {
            hub,
            mq135,
            mq2,
            dht,
            mq135_reads,
            buzzer_calls: Vec::new(),
            buzzer_on: false,
        }
    }

    pub fn set_raw(&self, sensor: SensorModel, raw: u16) {
        self.handle(sensor).set(Ok(raw));
    }

    pub fn fail_adc(&self, sensor: SensorModel) {
        self.handle(sensor).set(Err(DriverError::AdcReadFailed));
    }

    pub fn fail_dht(&self) {
        self.dht.set(Err(DriverError::Timeout));
    }

    fn handle(&self, sensor: SensorModel) -> &AdcHandle {
        match sensor {
            SensorModel::Mq135 => &self.mq135,
            SensorModel::Mq2 => &self.mq2,
        }
    }
}

impl SensorPort for MockHardware {
    fn init(&mut self) {
        self.hub.init();
    }

    fn read_gas(&mut self, sensor: SensorModel) -> GasReadout {
        self.hub.read_gas(sensor)
    }

    fn read_environment(&mut self, now_ms: u64) -> Result<EnvironmentSample, DriverError> {
        self.hub.read_environment(now_ms)
    }

    fn last_environment(&self) -> Option<EnvironmentSample> {
        self.hub.last_environment()
    }

    fn calibrate(
        &mut self,
        sensor: SensorModel,
        sample_count: u32,
        settle_ms: u32,
    ) -> Result<f32, CalibrationError> {
        self.hub.calibrate(sensor, sample_count, settle_ms)
    }

    fn calibration_failed(&mut self, sensor: SensorModel, strict: bool) {
        self.hub.calibration_failed(sensor, strict);
    }

    fn set_r0(&mut self, sensor: SensorModel, r0: f32) {
        self.hub.set_r0(sensor, r0);
    }

    fn baseline(&self, sensor: SensorModel) -> Baseline {
        self.hub.baseline(sensor)
    }
}

impl BuzzerPort for MockHardware {
    fn set_buzzer(&mut self, on: bool) {
        self.buzzer_calls.push(on);
        self.buzzer_on = on;
    }

    fn is_buzzer_on(&self) -> bool {
        self.buzzer_on
    }
}

// ── MockDisplay ───────────────────────────────────────────────

#[derive(Default)]
pub struct MockDisplay {
    pub frames: Vec<SampleFrame>,
}

impl DisplayPort for MockDisplay {
    fn render(&mut self, frame: &SampleFrame, _interval_ms: u32) {
        self.frames.push(frame.clone());
    }
}

// ── MockUplink ────────────────────────────────────────────────

/// Network gate plus cloud store.
pub struct MockUplink {
    pub online: bool,
    /// Every attempted push, successful or not.
    pub pushes: Vec<(String, Value)>,
    pub result: Result<(), TransportError>,
}

impl Default for MockUplink {
    fn default() -> Self {
        Self {
            online: true,
            pushes: Vec::new(),
            result: Ok(()),
        }
    }
}

impl CloudPort for MockUplink {
    fn push(&mut self, key: &str, record: &Value) -> Result<(), TransportError> {
        self.pushes.push((key.to_string(), record.clone()));
        self.result
    }
}

impl NetworkPort for MockUplink {
    fn is_online(&self) -> bool {
        self.online
    }
}

// ── MockClock ─────────────────────────────────────────────────

pub struct MockClock {
    pub now_ms: Cell<u64>,
    pub unix: Cell<Option<u64>>,
}

#[allow(dead_code)]
impl MockClock {
    pub fn synced(unix_secs: u64) -> Self {
        Self {
            now_ms: Cell::new(0),
            unix: Cell::new(Some(unix_secs)),
        }
    }

    pub fn unsynced() -> Self {
        Self {
            now_ms: Cell::new(0),
            unix: Cell::new(None),
        }
    }

    /// Move both clocks forward.
    pub fn advance(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get() + ms);
        if let Some(unix) = self.unix.get() {
            self.unix.set(Some(unix + ms / 1000));
        }
    }
}

impl ClockPort for MockClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }

    fn unix_secs(&self) -> Option<u64> {
        self.unix.get()
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── MockNvs ───────────────────────────────────────────────────

#[derive(Default)]
pub struct MockNvs {
    store: HashMap<String, Vec<u8>>,
    pub saved: RefCell<Vec<SystemConfig>>,
}

#[allow(dead_code)]
impl MockNvs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_count(&self) -> usize {
        self.saved.borrow().len()
    }
}

impl StoragePort for MockNvs {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.store.get(&format!("{namespace}::{key}")) {
            Some(v) if v.len() > buf.len() => Err(StorageError::BufferTooSmall),
            Some(v) => {
                buf[..v.len()].copy_from_slice(v);
                Ok(v.len())
            }
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.store
            .insert(format!("{namespace}::{key}"), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store.remove(&format!("{namespace}::{key}"));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store.contains_key(&format!("{namespace}::{key}"))
    }
}

impl ConfigPort for MockNvs {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        Ok(self
            .saved
            .borrow()
            .last()
            .cloned()
            .unwrap_or_default())
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        self.saved.borrow_mut().push(config.clone());
        Ok(())
    }
}

// ── Rig ───────────────────────────────────────────────────────

/// A started service wired to a full set of mocks.
pub struct Rig {
    pub app: airsense::app::service::AppService,
    pub hw: MockHardware,
    pub display: MockDisplay,
    pub uplink: MockUplink,
    pub clock: MockClock,
    pub sink: RecordingSink,
    pub nvs: MockNvs,
}

/// Unix time the mock clock is synced to.
pub const BOOT_UNIX_SECS: u64 = 1_700_000_000;

#[allow(dead_code)]
impl Rig {
    pub fn new(config: SystemConfig) -> Self {
        let mut hw = MockHardware::new(&config);
        let mut sink = RecordingSink::default();
        let mut app = airsense::app::service::AppService::new(config);
        app.start(&mut hw, &mut sink);
        Self {
            app,
            hw,
            display: MockDisplay::default(),
            uplink: MockUplink::default(),
            clock: MockClock::synced(BOOT_UNIX_SECS),
            sink,
            nvs: MockNvs::new(),
        }
    }

    /// Run one sampling cycle, then advance the clock by one period.
    pub fn cycle(&mut self) {
        self.app.run_cycle(
            &mut self.hw,
            &mut self.display,
            &mut self.uplink,
            &self.clock,
            &mut self.sink,
        );
        self.clock
            .advance(u64::from(self.app.config().sample_interval_ms));
    }

    pub fn cycles(&mut self, n: u32) {
        for _ in 0..n {
            self.cycle();
        }
    }

    pub fn command(&mut self, cmd: airsense::app::commands::AppCommand) {
        self.app.handle_command(cmd, &mut self.hw, &mut self.sink);
    }

    pub fn auto_save(&mut self) -> bool {
        self.app
            .auto_save_if_needed(&self.nvs, self.clock.now_ms(), &mut self.sink)
    }

    pub fn frame(&self) -> &SampleFrame {
        self.app.latest_frame().expect("no cycle has run")
    }
}
