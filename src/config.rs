//! System configuration parameters
//!
//! All tunable parameters for the AirSense monitor. Values are loaded from
//! NVS at boot and can be changed at runtime over the local HTTP API.

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::alarm::{AlarmThreshold, MAX_THRESHOLDS};
use crate::app::ports::ConfigError;
use crate::gas::{AdcModel, SensorModel};
use crate::pins::{self, PinMap};
use crate::quality::ScoreMode;
use crate::sensors::environment::DhtModel;

/// Upper bound on a configured or calibrated R0 (kΩ).
pub const MAX_R0_KOHM: f32 = 1000.0;

/// Board revisions in the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoardRevision {
    RevA,
    RevB,
}

/// Everything that differs between board revisions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoardProfile {
    pub revision: BoardRevision,
    pub pins: PinMap,
    pub dht: DhtModel,
    /// Factory R0 presets (kΩ). Neither revision's value is authoritative;
    /// both are starting points until a calibration run.
    pub r0_mq135: f32,
    pub r0_mq2: f32,
}

impl BoardProfile {
    pub const fn rev_a() -> Self {
        Self {
            revision: BoardRevision::RevA,
            pins: pins::REV_A,
            dht: DhtModel::Dht11,
            r0_mq135: 2.0,
            r0_mq2: 8.5,
        }
    }

    pub const fn rev_b() -> Self {
        Self {
            revision: BoardRevision::RevB,
            pins: pins::REV_B,
            dht: DhtModel::Dht22,
            r0_mq135: 2.0,
            r0_mq2: 60.0,
        }
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Hardware ---
    pub board: BoardProfile,
    pub adc: AdcModel,

    // --- Baselines ---
    /// R0 used until (or instead of) a calibration run, kΩ.
    pub r0_mq135: f32,
    pub r0_mq2: f32,

    // --- Calibration ---
    /// Run clean-air calibration for both sensors at boot.
    pub calibrate_on_boot: bool,
    pub calibration_samples: u32,
    /// Spacing between calibration samples (ms).
    pub calibration_settle_ms: u32,
    /// On calibration failure: `true` marks the sensor unusable,
    /// `false` keeps the configured R0.
    pub strict_calibration: bool,

    // --- Alarms ---
    pub buzzer_enabled: bool,
    pub alarm_thresholds: Vec<AlarmThreshold, MAX_THRESHOLDS>,
    pub score_mode: ScoreMode,

    // --- Logging ---
    /// Debug-level logging (per-cycle frame dumps).
    pub debug_logging: bool,

    // --- Timing ---
    /// Sampling cycle period (ms).
    pub sample_interval_ms: u32,
    /// LCD page dwell time (ms).
    pub display_interval_ms: u32,
    /// Target spacing of cloud pushes (ms), rounded up to whole cycles.
    pub cloud_push_interval_ms: u32,
    /// Upper bound for one cloud request (ms).
    pub cloud_timeout_ms: u32,

    // --- Cloud ---
    pub cloud_enabled: bool,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self::for_board(BoardProfile::rev_a())
    }
}

impl SystemConfig {
    /// Defaults for a board revision.
    pub fn for_board(board: BoardProfile) -> Self {
        let mut alarm_thresholds = Vec::new();
        // Capacity is well above two; pushes cannot fail.
        let _ = alarm_thresholds.push(AlarmThreshold::raw(SensorModel::Mq135, 1500.0));
        let _ = alarm_thresholds.push(AlarmThreshold::raw(SensorModel::Mq2, 1100.0));

        Self {
            board,
            adc: AdcModel::default(),

            r0_mq135: board.r0_mq135,
            r0_mq2: board.r0_mq2,

            calibrate_on_boot: false,
            calibration_samples: 10,
            calibration_settle_ms: 500,
            strict_calibration: false,

            buzzer_enabled: false,
            alarm_thresholds,
            score_mode: ScoreMode::Average,

            debug_logging: false,

            sample_interval_ms: 1200_u32.max(board.dht.min_interval_ms()),
            display_interval_ms: 1200,
            cloud_push_interval_ms: 30_000,
            cloud_timeout_ms: 5_000,

            cloud_enabled: true,
        }
    }

    pub fn r0(&self, sensor: SensorModel) -> f32 {
        match sensor {
            SensorModel::Mq135 => self.r0_mq135,
            SensorModel::Mq2 => self.r0_mq2,
        }
    }

    pub fn set_r0(&mut self, sensor: SensorModel, r0: f32) {
        match sensor {
            SensorModel::Mq135 => self.r0_mq135 = r0,
            SensorModel::Mq2 => self.r0_mq2 = r0,
        }
    }

    /// Cloud push cadence in sampling cycles.
    pub fn push_every_cycles(&self) -> u32 {
        self.cloud_push_interval_ms
            .div_ceil(self.sample_interval_ms.max(1))
            .max(1)
    }

    /// Range-check every field.
    ///
    /// Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for r0 in [self.r0_mq135, self.r0_mq2] {
            if !r0.is_finite() || r0 <= 0.0 || r0 > MAX_R0_KOHM {
                return Err(ConfigError::ValidationFailed("R0 must be in (0, 1000] kΩ"));
            }
        }
        if !(8..=16).contains(&self.adc.bits) {
            return Err(ConfigError::ValidationFailed("adc.bits must be 8–16"));
        }
        if !(1.0..=5.5).contains(&self.adc.supply_volts) {
            return Err(ConfigError::ValidationFailed(
                "adc.supply_volts must be 1.0–5.5",
            ));
        }
        if !(0.1..=1000.0).contains(&self.adc.load_kohm) {
            return Err(ConfigError::ValidationFailed(
                "adc.load_kohm must be 0.1–1000",
            ));
        }
        if !(1..=1000).contains(&self.calibration_samples) {
            return Err(ConfigError::ValidationFailed(
                "calibration_samples must be 1–1000",
            ));
        }
        if self.calibration_settle_ms > 10_000 {
            return Err(ConfigError::ValidationFailed(
                "calibration_settle_ms must be ≤ 10000",
            ));
        }
        for t in &self.alarm_thresholds {
            if !t.limit.is_finite() || t.limit < 0.0 {
                return Err(ConfigError::ValidationFailed(
                    "alarm limit must be a finite value ≥ 0",
                ));
            }
        }
        if !(100..=60_000).contains(&self.sample_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "sample_interval_ms must be 100–60000",
            ));
        }
        if !(200..=60_000).contains(&self.display_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "display_interval_ms must be 200–60000",
            ));
        }
        if self.cloud_push_interval_ms < self.sample_interval_ms
            || self.cloud_push_interval_ms > 86_400_000
        {
            return Err(ConfigError::ValidationFailed(
                "cloud_push_interval_ms must be between sample_interval_ms and 24 h",
            ));
        }
        if !(500..=60_000).contains(&self.cloud_timeout_ms) {
            return Err(ConfigError::ValidationFailed(
                "cloud_timeout_ms must be 500–60000",
            ));
        }
        Ok(())
    }
}
