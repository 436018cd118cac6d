//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the FSM and its shared context.
//! It exposes a clean, hardware-agnostic API.  All I/O flows through
//! port traits injected at call sites, making the entire service
//! testable with mock adapters.
//!
//! ```text
//!    SensorPort ──▶ ┌─────────────────────────┐ ──▶ EventSink
//!                   │       AppService         │
//!    BuzzerPort ◀── │  FSM · Alarms · Cadence  │ ──▶ DisplayPort
//!     ClockPort ──▶ └─────────────────────────┘ ──▶ CloudPort + NetworkPort
//! ```

use log::{LevelFilter, debug, info, warn};

use crate::alarm::{AlarmSource, AlarmThreshold, AlarmTransition};
use crate::config::SystemConfig;
use crate::error::TransportError;
use crate::fsm::context::FsmContext;
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::gas::SensorModel;
use crate::telemetry::{self, SampleFrame};

use super::commands::AppCommand;
use super::events::{AppEvent, CycleSummary};
use super::ports::{
    BuzzerPort, ClockPort, CloudPort, ConfigPort, DisplayPort, EventSink, NetworkPort, SensorPort,
};

/// Quiet period after the last config change before it is written to NVS.
pub const AUTO_SAVE_DELAY_MS: u64 = 5_000;

/// Upper bound on FSM ticks per cycle. A full cycle takes four.
const MAX_TICKS_PER_CYCLE: usize = 8;

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    fsm: Fsm,
    ctx: FsmContext,
    config_dirty: bool,
    /// First auto-save check that saw the config dirty.
    dirty_since_ms: Option<u64>,
    save_requested: bool,
    push_count: u32,
}

impl AppService {
    /// Construct the service from configuration.
    ///
    /// Does **not** start the FSM; call [`start`](Self::start) next.
    pub fn new(config: SystemConfig) -> Self {
        let ctx = FsmContext::new(config);
        let fsm = Fsm::new(build_state_table(), StateId::Idle);
        Self {
            fsm,
            ctx,
            config_dirty: false,
            dirty_since_ms: None,
            save_requested: false,
            push_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Initialise sensors, install configured baselines and start the FSM.
    /// Runs the boot calibration when `calibrate_on_boot` is set.
    pub fn start(&mut self, hw: &mut impl SensorPort, sink: &mut impl EventSink) {
        apply_log_level(self.ctx.config.debug_logging);
        let dht = self.ctx.config.board.dht;
        if self.ctx.config.sample_interval_ms < dht.min_interval_ms() {
            warn!(
                "{}: sampling every {} ms is faster than its {} ms minimum, expect read errors",
                dht.label(),
                self.ctx.config.sample_interval_ms,
                dht.min_interval_ms()
            );
        }
        hw.init();
        for sensor in SensorModel::ALL {
            hw.set_r0(sensor, self.ctx.config.r0(sensor));
        }
        if self.ctx.config.calibrate_on_boot {
            for sensor in SensorModel::ALL {
                self.calibrate_sensor(sensor, hw, sink);
            }
        }

        self.fsm.start(&mut self.ctx);
        let push_every_cycles = self.ctx.push_cadence.every();
        sink.emit(&AppEvent::Started { push_every_cycles });
        info!(
            "AppService started: cycle {} ms, cloud push every {} cycles",
            self.ctx.config.sample_interval_ms, push_every_cycles
        );
    }

    // ── Per-cycle orchestration ───────────────────────────────

    /// Run one full sampling cycle: sample → evaluate → publish.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`BuzzerPort`], which avoids a double mutable borrow while
    /// keeping the port boundary explicit. No failure in here aborts the
    /// cycle; unavailable readings are carried through as errors.
    pub fn run_cycle(
        &mut self,
        hw: &mut (impl SensorPort + BuzzerPort),
        display: &mut impl DisplayPort,
        uplink: &mut (impl CloudPort + NetworkPort),
        clock: &impl ClockPort,
        sink: &mut impl EventSink,
    ) {
        self.ctx.tick_pending = true;
        let mut pushed = false;

        for _ in 0..MAX_TICKS_PER_CYCLE {
            self.fsm.tick(&mut self.ctx);
            match self.fsm.current_state() {
                StateId::Sampling if !self.ctx.frame_ready => {
                    self.sample(hw, clock);
                }
                StateId::Publishing if !self.ctx.published => {
                    pushed = self.publish(hw, display, uplink, clock, sink);
                }
                StateId::Idle => break,
                _ => {}
            }
        }

        if let Some(frame) = self.ctx.frame.as_ref() {
            debug!("frame: {frame:?}");
            sink.emit(&AppEvent::CycleCompleted(summarize(frame, pushed)));
        }
    }

    fn sample(&mut self, hw: &mut impl SensorPort, clock: &impl ClockPort) {
        let now_ms = clock.now_ms();
        let mq135 = hw.read_gas(SensorModel::Mq135);
        let mq2 = hw.read_gas(SensorModel::Mq2);
        let environment = hw.read_environment(now_ms);
        if let Err(e) = environment {
            warn!("environment read failed: {e}");
        }
        self.ctx.frame = Some(SampleFrame::new(
            self.ctx.cycle,
            now_ms,
            mq135,
            mq2,
            environment,
        ));
        self.ctx.frame_ready = true;
    }

    /// Drive buzzer, display and (on push cycles) the cloud.
    /// Returns `true` if a record was uploaded.
    fn publish(
        &mut self,
        hw: &mut impl BuzzerPort,
        display: &mut impl DisplayPort,
        uplink: &mut (impl CloudPort + NetworkPort),
        clock: &impl ClockPort,
        sink: &mut impl EventSink,
    ) -> bool {
        let outputs = self.ctx.outputs;
        if hw.is_buzzer_on() != outputs.buzzer_on {
            debug!("buzzer -> {}", if outputs.buzzer_on { "on" } else { "off" });
        }
        hw.set_buzzer(outputs.buzzer_on);

        for t in &self.ctx.transitions {
            sink.emit(&match *t {
                AlarmTransition::Raised { source, value } => AppEvent::AlarmRaised { source, value },
                AlarmTransition::Cleared { source } => AppEvent::AlarmCleared { source },
            });
        }

        let mut pushed = false;
        if let Some(frame) = self.ctx.frame.as_ref() {
            display.render(frame, self.ctx.config.display_interval_ms);
            if outputs.push_due {
                pushed = push_frame(frame, &self.ctx.config, uplink, clock, sink);
            }
        }
        if pushed {
            self.push_count = self.push_count.wrapping_add(1);
        }

        self.ctx.published = true;
        pushed
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command (from the HTTP API or boot logic).
    /// Call between cycles.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        hw: &mut impl SensorPort,
        sink: &mut impl EventSink,
    ) {
        match cmd {
            AppCommand::UpdateConfig(new_config) => {
                self.update_config(new_config, hw, sink);
            }
            AppCommand::SetBuzzer {
                enabled,
                mq135_limit,
                mq2_limit,
            } => {
                let mut cfg = self.ctx.config.clone();
                cfg.buzzer_enabled = enabled;
                let limits = [(SensorModel::Mq135, mq135_limit), (SensorModel::Mq2, mq2_limit)];
                for (sensor, limit) in limits {
                    if let Some(limit) = limit {
                        if !set_threshold(&mut cfg, AlarmSource::Raw(sensor), limit) {
                            reject(sink, "alarm threshold table full");
                            return;
                        }
                    }
                }
                self.update_config(cfg, hw, sink);
            }
            AppCommand::SetAlarmLimit(source, limit) => {
                let mut cfg = self.ctx.config.clone();
                if !set_threshold(&mut cfg, source, limit) {
                    reject(sink, "alarm threshold table full");
                    return;
                }
                self.update_config(cfg, hw, sink);
            }
            AppCommand::SetR0(sensor, r0) => {
                let mut cfg = self.ctx.config.clone();
                cfg.set_r0(sensor, r0);
                self.update_config(cfg, hw, sink);
            }
            AppCommand::SetDebugLogging(enabled) => {
                let mut cfg = self.ctx.config.clone();
                cfg.debug_logging = enabled;
                self.update_config(cfg, hw, sink);
            }
            AppCommand::Calibrate(target) => match target {
                Some(sensor) => self.calibrate_sensor(sensor, hw, sink),
                None => {
                    for sensor in SensorModel::ALL {
                        self.calibrate_sensor(sensor, hw, sink);
                    }
                }
            },
            AppCommand::SaveConfig => {
                self.mark_config_dirty();
                self.save_requested = true;
                info!("Explicit config save requested (will flush on next auto-save check)");
            }
        }
    }

    fn update_config(
        &mut self,
        new_config: SystemConfig,
        hw: &mut impl SensorPort,
        sink: &mut impl EventSink,
    ) {
        if let Err(e) = new_config.validate() {
            warn!("Configuration update rejected: {e}");
            reject(sink, "configuration failed validation");
            return;
        }
        if new_config == self.ctx.config {
            return;
        }
        for sensor in SensorModel::ALL {
            let r0 = new_config.r0(sensor);
            if r0 != self.ctx.config.r0(sensor) {
                hw.set_r0(sensor, r0);
            }
        }
        if new_config.debug_logging != self.ctx.config.debug_logging {
            apply_log_level(new_config.debug_logging);
        }
        self.ctx.apply_config(new_config);
        self.mark_config_dirty();
        sink.emit(&AppEvent::ConfigChanged);
        info!("Configuration updated at runtime");
    }

    /// Clean-air calibration of one sensor. On success the measured R0
    /// also becomes the configured R0; on failure the failure policy from
    /// `strict_calibration` is applied. Either way sampling continues.
    fn calibrate_sensor(
        &mut self,
        sensor: SensorModel,
        hw: &mut impl SensorPort,
        sink: &mut impl EventSink,
    ) {
        let cfg = &self.ctx.config;
        info!(
            "{}: calibrating over {} samples",
            sensor.label(),
            cfg.calibration_samples
        );
        match hw.calibrate(sensor, cfg.calibration_samples, cfg.calibration_settle_ms) {
            Ok(r0) => {
                info!("{}: calibrated R0 = {r0:.3} kΩ", sensor.label());
                self.ctx.config.set_r0(sensor, r0);
                self.mark_config_dirty();
                sink.emit(&AppEvent::CalibrationSucceeded { sensor, r0 });
            }
            Err(error) => {
                let strict = cfg.strict_calibration;
                hw.calibration_failed(sensor, strict);
                let kept_r0 = hw.baseline(sensor).r0().ok();
                warn!(
                    "{}: calibration failed ({error}), R0 {}",
                    sensor.label(),
                    if kept_r0.is_some() { "kept" } else { "invalidated" }
                );
                sink.emit(&AppEvent::CalibrationFailed {
                    sensor,
                    error,
                    kept_r0,
                });
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Frame produced by the most recent cycle.
    pub fn latest_frame(&self) -> Option<&SampleFrame> {
        self.ctx.frame.as_ref()
    }

    /// Current FSM state. `Idle` between cycles.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// Sampling cycles run since startup.
    pub fn cycle_count(&self) -> u32 {
        self.ctx.cycle
    }

    /// Successful cloud uploads since startup.
    pub fn push_count(&self) -> u32 {
        self.push_count
    }

    pub fn config(&self) -> &SystemConfig {
        &self.ctx.config
    }

    /// Clone of the live configuration (for API read-back or delta updates).
    pub fn current_config(&self) -> SystemConfig {
        self.ctx.config.clone()
    }

    /// Cloud push cadence in cycles.
    pub fn push_every_cycles(&self) -> u32 {
        self.ctx.push_cadence.every()
    }

    // ── Config dirty-flag management ──────────────────────────

    /// Mark the config as modified.
    pub fn mark_config_dirty(&mut self) {
        if !self.config_dirty {
            self.config_dirty = true;
            self.dirty_since_ms = None;
        }
    }

    /// Save once the config has been dirty for [`AUTO_SAVE_DELAY_MS`], or
    /// immediately after [`AppCommand::SaveConfig`].
    /// Returns `true` if the config was saved.
    pub fn auto_save_if_needed(
        &mut self,
        storage: &impl ConfigPort,
        now_ms: u64,
        sink: &mut impl EventSink,
    ) -> bool {
        if !self.config_dirty {
            return false;
        }
        let since = *self.dirty_since_ms.get_or_insert(now_ms);
        if !self.save_requested && now_ms.saturating_sub(since) < AUTO_SAVE_DELAY_MS {
            return false;
        }
        self.save(storage, sink)
    }

    /// Force-save if dirty (call before restart).
    pub fn force_save_if_dirty(&mut self, storage: &impl ConfigPort, sink: &mut impl EventSink) {
        if self.config_dirty {
            self.save(storage, sink);
        }
    }

    fn save(&mut self, storage: &impl ConfigPort, sink: &mut impl EventSink) -> bool {
        match storage.save(&self.ctx.config) {
            Ok(()) => {
                self.config_dirty = false;
                self.save_requested = false;
                self.dirty_since_ms = None;
                info!("Config saved to NVS");
                sink.emit(&AppEvent::ConfigSaved);
                true
            }
            Err(e) => {
                warn!("Config save failed: {e}");
                false
            }
        }
    }

    /// Whether the config has unsaved changes.
    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }
}

// ── Helpers ───────────────────────────────────────────────────

/// Upload `frame` if cloud upload is enabled, the link is up and the wall
/// clock is synced. Failures are reported and otherwise ignored; the next
/// scheduled push is the retry.
fn push_frame(
    frame: &SampleFrame,
    config: &SystemConfig,
    uplink: &mut (impl CloudPort + NetworkPort),
    clock: &impl ClockPort,
    sink: &mut impl EventSink,
) -> bool {
    if !config.cloud_enabled {
        debug!("cloud push disabled");
        return false;
    }
    if !uplink.is_online() {
        sink.emit(&AppEvent::PushSkipped(TransportError::Offline));
        return false;
    }
    let Some(unix_secs) = clock.unix_secs() else {
        sink.emit(&AppEvent::PushSkipped(TransportError::ClockNotSynced));
        return false;
    };

    let key = telemetry::timestamp_key(unix_secs);
    let record = telemetry::cloud_record(frame);
    match uplink.push(&key, &record) {
        Ok(()) => {
            sink.emit(&AppEvent::PushSucceeded { key: unix_secs });
            true
        }
        Err(e) => {
            warn!("cloud push {key} failed: {e}");
            sink.emit(&AppEvent::PushFailed(e));
            false
        }
    }
}

/// Update the limit of `source` in `cfg`, adding it if absent.
/// Returns `false` if the threshold table is full.
fn set_threshold(cfg: &mut SystemConfig, source: AlarmSource, limit: f32) -> bool {
    if let Some(t) = cfg.alarm_thresholds.iter_mut().find(|t| t.source == source) {
        t.limit = limit;
        return true;
    }
    cfg.alarm_thresholds
        .push(AlarmThreshold { source, limit })
        .is_ok()
}

fn reject(sink: &mut impl EventSink, reason: &'static str) {
    warn!("Command rejected: {reason}");
    sink.emit(&AppEvent::CommandRejected(reason));
}

fn apply_log_level(debug: bool) {
    log::set_max_level(if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    });
}

fn summarize(frame: &SampleFrame, pushed: bool) -> CycleSummary {
    let env = frame.environment.as_ref().ok();
    CycleSummary {
        cycle: frame.cycle,
        mq135_raw: frame.mq135.raw_value(),
        mq2_raw: frame.mq2.raw_value(),
        temperature_c: env.map(|e| e.temperature_c),
        humidity_pct: env.map(|e| e.humidity_pct),
        score: frame.score,
        buzzer_on: frame.buzzer_on,
        pushed,
    }
}
