//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single struct that state handlers read from and
//! write to: the frame sampled this cycle, the alarm supervisor, the push
//! cadence and the output decisions the service applies afterwards. Think
//! of it as the "blackboard" in a blackboard architecture.

use heapless::Vec;

use crate::alarm::{AlarmSupervisor, AlarmTransition, MAX_THRESHOLDS};
use crate::config::SystemConfig;
use crate::scheduler::Cadence;
use crate::telemetry::SampleFrame;

// ---------------------------------------------------------------------------
// Cycle outputs (written by state handlers; consumed by the service)
// ---------------------------------------------------------------------------

/// Decisions made during evaluation, applied by the service in `Publishing`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleOutputs {
    /// Buzzer command for this cycle.
    pub buzzer_on: bool,
    /// This is a push cycle.
    pub push_due: bool,
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct FsmContext {
    // -- Timing --
    /// Ticks elapsed since the current state was entered.
    pub ticks_in_state: u64,
    /// Monotonic total tick count.
    pub total_ticks: u64,
    /// Completed sampling cycles.
    pub cycle: u32,

    // -- Handshake with the service --
    /// Set by the service when the cycle timer fires.
    pub tick_pending: bool,
    /// Set by the service once the frame for this cycle is in place.
    pub frame_ready: bool,
    /// Set by the service once display/buzzer/cloud have been driven.
    pub published: bool,

    // -- Data --
    /// Latest frame. Overwritten every cycle.
    pub frame: Option<SampleFrame>,
    pub outputs: CycleOutputs,
    /// Alarm transitions raised during the current evaluation.
    pub transitions: Vec<AlarmTransition, MAX_THRESHOLDS>,

    // -- Policy --
    pub alarms: AlarmSupervisor,
    pub push_cadence: Cadence,
    pub config: SystemConfig,
}

impl FsmContext {
    /// Create a new context with the given configuration.
    pub fn new(config: SystemConfig) -> Self {
        Self {
            ticks_in_state: 0,
            total_ticks: 0,
            cycle: 0,
            tick_pending: false,
            frame_ready: false,
            published: false,
            frame: None,
            outputs: CycleOutputs::default(),
            transitions: Vec::new(),
            alarms: AlarmSupervisor::new(&config.alarm_thresholds, config.buzzer_enabled),
            push_cadence: Cadence::new(config.push_every_cycles()),
            config,
        }
    }

    /// Re-derive alarm and cadence policy after a config change.
    pub fn apply_config(&mut self, config: SystemConfig) {
        self.alarms.set_thresholds(&config.alarm_thresholds);
        self.alarms.set_buzzer_enabled(config.buzzer_enabled);
        self.push_cadence.set_every(config.push_every_cycles());
        self.config = config;
    }
}
