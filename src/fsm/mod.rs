//! Sampling-cycle state machine.
//!
//! A fixed table of plain `fn` handlers, one row per phase:
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │  StateTable                                               │
//! │  ┌────────────┬──────────┬──────────┬───────────────────┐ │
//! │  │ StateId    │ on_enter │ on_exit  │ on_update         │ │
//! │  ├────────────┼──────────┼──────────┼───────────────────┤ │
//! │  │ Idle       │ -        │ -        │ fn(ctx)->Option<> │ │
//! │  │ Sampling   │ fn(ctx)  │ -        │ fn(ctx)->Option<> │ │
//! │  │ Evaluating │ fn(ctx)  │ -        │ fn(ctx)->Option<> │ │
//! │  │ Publishing │ fn(ctx)  │ fn(ctx)  │ fn(ctx)->Option<> │ │
//! │  └────────────┴──────────┴──────────┴───────────────────┘ │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! A tick runs `on_update` of the current phase; a `Some(next)` answer
//! runs `on_exit`, moves, then runs `on_enter` of `next`. Handlers share
//! one `&mut FsmContext` holding the frame, the alarm policy and the
//! output decisions.
//!
//! One sampling cycle is always `Idle → Sampling → Evaluating →
//! Publishing → Idle`; there are no other edges.

pub mod context;
pub mod states;

use context::FsmContext;
use log::{debug, info, warn};

/// The four phases of a sampling cycle, in order.
/// Discriminants index the table built by [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    Sampling = 1,
    Evaluating = 2,
    Publishing = 3,
}

impl StateId {
    pub const COUNT: usize = 4;

    pub const ALL: [Self; Self::COUNT] = [
        Self::Idle,
        Self::Sampling,
        Self::Evaluating,
        Self::Publishing,
    ];

    /// The only state reachable from `self`.
    pub const fn successor(self) -> Self {
        match self {
            Self::Idle => Self::Sampling,
            Self::Sampling => Self::Evaluating,
            Self::Evaluating => Self::Publishing,
            Self::Publishing => Self::Idle,
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// `on_enter` / `on_exit` hook. Runs once per transition.
pub type StateActionFn = fn(&mut FsmContext);

/// Per-tick handler. `Some(next)` requests a transition.
pub type StateUpdateFn = fn(&mut FsmContext) -> Option<StateId>;

/// One row of the state table.
pub struct StateDescriptor {
    pub id: StateId,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

/// Table-driven engine. Holds no domain data; everything a handler needs
/// is in the [`FsmContext`] passed to each call.
pub struct Fsm {
    table: [StateDescriptor; StateId::COUNT],
    current: StateId,
    /// Ticks since construction.
    ticks: u64,
    /// Value of `ticks` when `current` was entered.
    entered_at: u64,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; StateId::COUNT], initial: StateId) -> Self {
        debug_assert!(
            table.iter().zip(StateId::ALL).all(|(row, id)| row.id == id),
            "state table rows out of order"
        );
        Self {
            table,
            current: initial,
            ticks: 0,
            entered_at: 0,
        }
    }

    fn row(&self, id: StateId) -> &StateDescriptor {
        &self.table[id.index()]
    }

    /// Run `on_enter` of the initial state. Call once, before `tick`.
    pub fn start(&mut self, ctx: &mut FsmContext) {
        info!("FSM starting in {}", self.row(self.current).name);
        if let Some(enter) = self.row(self.current).on_enter {
            enter(ctx);
        }
    }

    /// One step: run `on_update` of the current state and follow the
    /// requested edge, if any. Requests for anything other than the
    /// cycle successor are refused and logged.
    pub fn tick(&mut self, ctx: &mut FsmContext) {
        self.ticks += 1;
        ctx.total_ticks = self.ticks;
        ctx.ticks_in_state = self.ticks - self.entered_at;

        let Some(next) = (self.row(self.current).on_update)(ctx) else {
            return;
        };
        if next != self.current.successor() {
            warn!(
                "FSM: refusing {} -> {}",
                self.row(self.current).name,
                self.row(next).name
            );
            return;
        }
        self.transition(next, ctx);
    }

    pub fn current_state(&self) -> StateId {
        self.current
    }

    pub fn ticks_in_current_state(&self) -> u64 {
        self.ticks - self.entered_at
    }

    fn transition(&mut self, next: StateId, ctx: &mut FsmContext) {
        debug!(
            "FSM: {} -> {}",
            self.row(self.current).name,
            self.row(next).name
        );
        if let Some(exit) = self.row(self.current).on_exit {
            exit(ctx);
        }
        self.current = next;
        self.entered_at = self.ticks;
        ctx.ticks_in_state = 0;
        if let Some(enter) = self.row(next).on_enter {
            enter(ctx);
        }
    }
}
