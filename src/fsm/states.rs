//! Concrete state handler functions and table builder.
//!
//! Each state is defined by three plain `fn` pointers: no closures, no
//! dynamic dispatch, no heap. Handlers are pure: sensor reads and output
//! I/O are done by the service between ticks, and the handlers only see
//! their results through the context flags.
//!
//! ```text
//!  IDLE ──[timer tick]──▶ SAMPLING ──[frame ready]──▶ EVALUATING
//!    ▲                                                     │
//!    │                                                [evaluated]
//!    │                                                     ▼
//!    └──────────────[published]───────────────────── PUBLISHING
//! ```

use log::debug;

use super::context::{CycleOutputs, FsmContext};
use super::{StateDescriptor, StateId};
use crate::quality::air_quality_score;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table. Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Idle
        StateDescriptor {
            id: StateId::Idle,
            name: "Idle",
            on_enter: None,
            on_exit: None,
            on_update: idle_update,
        },
        // Index 1: Sampling
        StateDescriptor {
            id: StateId::Sampling,
            name: "Sampling",
            on_enter: Some(sampling_enter),
            on_exit: None,
            on_update: sampling_update,
        },
        // Index 2: Evaluating
        StateDescriptor {
            id: StateId::Evaluating,
            name: "Evaluating",
            on_enter: Some(evaluating_enter),
            on_exit: None,
            on_update: evaluating_update,
        },
        // Index 3: Publishing
        StateDescriptor {
            id: StateId::Publishing,
            name: "Publishing",
            on_enter: Some(publishing_enter),
            on_exit: Some(publishing_exit),
            on_update: publishing_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE: waiting for the cycle timer
// ═══════════════════════════════════════════════════════════════════════════

fn idle_update(ctx: &mut FsmContext) -> Option<StateId> {
    if ctx.tick_pending {
        ctx.tick_pending = false;
        return Some(StateId::Sampling);
    }
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  SAMPLING: the service reads every sensor into `ctx.frame`
// ═══════════════════════════════════════════════════════════════════════════

fn sampling_enter(ctx: &mut FsmContext) {
    ctx.cycle = ctx.cycle.wrapping_add(1);
    ctx.frame_ready = false;
    ctx.outputs = CycleOutputs::default();
    ctx.transitions.clear();
}

fn sampling_update(ctx: &mut FsmContext) -> Option<StateId> {
    ctx.frame_ready.then_some(StateId::Evaluating)
}

// ═══════════════════════════════════════════════════════════════════════════
//  EVALUATING: thresholds, buzzer decision, score, push cadence
// ═══════════════════════════════════════════════════════════════════════════

fn evaluating_enter(ctx: &mut FsmContext) {
    // The push cadence counts cycles, not frames: it advances even if the
    // frame is missing so pushes stay one per K cycles.
    ctx.outputs.push_due = ctx.push_cadence.tick();

    let Some(frame) = ctx.frame.as_mut() else {
        ctx.outputs.buzzer_on = false;
        return;
    };
    let buzzer_on = ctx.alarms.evaluate(frame, &mut ctx.transitions);
    frame.alarms.clear();
    for state in ctx.alarms.states() {
        let _ = frame.alarms.push(*state);
    }
    frame.buzzer_on = buzzer_on;
    frame.score = air_quality_score(frame, ctx.config.score_mode);
    ctx.outputs.buzzer_on = buzzer_on;

    debug!(
        "EVALUATING: cycle {} buzzer={} push_due={} score={}",
        ctx.cycle, buzzer_on, ctx.outputs.push_due, frame.score
    );
}

fn evaluating_update(_ctx: &mut FsmContext) -> Option<StateId> {
    Some(StateId::Publishing)
}

// ═══════════════════════════════════════════════════════════════════════════
//  PUBLISHING: the service drives buzzer, display and cloud
// ═══════════════════════════════════════════════════════════════════════════

fn publishing_enter(ctx: &mut FsmContext) {
    ctx.published = false;
}

fn publishing_exit(ctx: &mut FsmContext) {
    ctx.frame_ready = false;
}

fn publishing_update(ctx: &mut FsmContext) -> Option<StateId> {
    ctx.published.then_some(StateId::Idle)
}
