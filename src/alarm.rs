//! Alarm supervisor.
//!
//! Runs once per cycle in the `Evaluating` state, after the frame has been
//! sampled. Every configured [`AlarmThreshold`] is compared against the
//! fresh frame and the buzzer mirrors the result:
//!
//! ```text
//!   exceeded = value > limit        (value unavailable → not exceeded)
//!   buzzer   = buzzer_enabled && any(exceeded)
//! ```
//!
//! There is no hysteresis and no latching: a value that drops back to the
//! limit clears its alarm on the very next cycle.

use heapless::Vec;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::gas::{GasKind, SensorModel};
use crate::telemetry::SampleFrame;

/// Maximum number of configured thresholds.
pub const MAX_THRESHOLDS: usize = 8;

/// What a threshold watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmSource {
    /// Raw ADC count of a gas sensor.
    Raw(SensorModel),
    /// Concentration (ppm) of one gas channel.
    Gas(SensorModel, GasKind),
}

impl AlarmSource {
    pub fn sensor(self) -> SensorModel {
        match self {
            Self::Raw(m) | Self::Gas(m, _) => m,
        }
    }

    /// Channel label used in logs and the cloud record, e.g. `MQ135.Raw`.
    pub fn channel_name(self) -> &'static str {
        match self {
            Self::Raw(_) => "Raw",
            Self::Gas(_, gas) => gas.name(),
        }
    }

    /// Current value of this source in `frame`, if available.
    pub fn observe(self, frame: &SampleFrame) -> Option<f32> {
        let readout = frame.gas(self.sensor());
        match self {
            Self::Raw(_) => readout.raw_value().map(f32::from),
            Self::Gas(_, gas) => readout.value(gas),
        }
    }
}

impl core::fmt::Display for AlarmSource {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{}", self.sensor().key(), self.channel_name())
    }
}

/// A single alarm rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AlarmThreshold {
    pub source: AlarmSource,
    /// Strictly-greater-than limit, in the source's unit.
    pub limit: f32,
}

impl AlarmThreshold {
    pub const fn raw(sensor: SensorModel, limit: f32) -> Self {
        Self {
            source: AlarmSource::Raw(sensor),
            limit,
        }
    }

    pub const fn gas(sensor: SensorModel, gas: GasKind, limit: f32) -> Self {
        Self {
            source: AlarmSource::Gas(sensor, gas),
            limit,
        }
    }
}

/// Evaluated state of one threshold for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlarmState {
    pub source: AlarmSource,
    pub exceeded: bool,
    /// Timestamp (ms since boot) of the cycle the current run of
    /// exceedances started in. `None` while not exceeded.
    pub since: Option<u64>,
}

/// Change in alarm state worth reporting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlarmTransition {
    Raised { source: AlarmSource, value: f32 },
    Cleared { source: AlarmSource },
}

/// Alarm supervisor.
pub struct AlarmSupervisor {
    thresholds: Vec<AlarmThreshold, MAX_THRESHOLDS>,
    states: Vec<AlarmState, MAX_THRESHOLDS>,
    buzzer_enabled: bool,
}

impl AlarmSupervisor {
    pub fn new(thresholds: &[AlarmThreshold], buzzer_enabled: bool) -> Self {
        let mut sup = Self {
            thresholds: Vec::new(),
            states: Vec::new(),
            buzzer_enabled,
        };
        sup.set_thresholds(thresholds);
        sup
    }

    /// Replace the threshold set. Existing alarm states are dropped.
    pub fn set_thresholds(&mut self, thresholds: &[AlarmThreshold]) {
        if thresholds.len() > MAX_THRESHOLDS {
            warn!(
                "alarm: {} thresholds configured, only the first {MAX_THRESHOLDS} are used",
                thresholds.len()
            );
        }
        self.thresholds.clear();
        self.states.clear();
        for t in thresholds.iter().take(MAX_THRESHOLDS) {
            // Capacities match, pushes cannot fail.
            let _ = self.thresholds.push(*t);
            let _ = self.states.push(AlarmState {
                source: t.source,
                exceeded: false,
                since: None,
            });
        }
    }

    /// Update the limit of an existing threshold, or add it.
    /// Returns `false` if the set is full.
    pub fn set_limit(&mut self, source: AlarmSource, limit: f32) -> bool {
        if let Some(t) = self.thresholds.iter_mut().find(|t| t.source == source) {
            t.limit = limit;
            return true;
        }
        let added = self.thresholds.push(AlarmThreshold { source, limit }).is_ok();
        if added {
            let _ = self.states.push(AlarmState {
                source,
                exceeded: false,
                since: None,
            });
        }
        added
    }

    pub fn set_buzzer_enabled(&mut self, enabled: bool) {
        self.buzzer_enabled = enabled;
    }

    pub fn buzzer_enabled(&self) -> bool {
        self.buzzer_enabled
    }

    pub fn thresholds(&self) -> &[AlarmThreshold] {
        &self.thresholds
    }

    pub fn limit(&self, source: AlarmSource) -> Option<f32> {
        self.thresholds
            .iter()
            .find(|t| t.source == source)
            .map(|t| t.limit)
    }

    /// Evaluate every threshold against `frame`.
    ///
    /// Transitions are appended to `transitions` (oldest first). Returns the
    /// buzzer command for this cycle.
    pub fn evaluate(
        &mut self,
        frame: &SampleFrame,
        transitions: &mut Vec<AlarmTransition, MAX_THRESHOLDS>,
    ) -> bool {
        for (t, state) in self.thresholds.iter().zip(self.states.iter_mut()) {
            let value = t.source.observe(frame);
            let exceeded = value.is_some_and(|v| v > t.limit);

            match (state.exceeded, exceeded, value) {
                (false, true, Some(v)) => {
                    warn!("alarm raised: {} = {v:.1} > {:.1}", t.source, t.limit);
                    state.since = Some(frame.timestamp_ms);
                    let _ = transitions.push(AlarmTransition::Raised {
                        source: t.source,
                        value: v,
                    });
                }
                (true, false, _) => {
                    info!("alarm cleared: {}", t.source);
                    state.since = None;
                    let _ = transitions.push(AlarmTransition::Cleared { source: t.source });
                }
                _ => {}
            }
            state.exceeded = exceeded;
        }
        self.buzzer_enabled && self.any_exceeded()
    }

    pub fn states(&self) -> &[AlarmState] {
        &self.states
    }

    pub fn any_exceeded(&self) -> bool {
        self.states.iter().any(|s| s.exceeded)
    }
}
