//! Cycle timing.
//!
//! The main loop is driven by a fixed-period [`TickTimer`]; slower work
//! (the cloud push) hangs off the cycle count through a [`Cadence`], so
//! it stays locked to the sampling rhythm instead of drifting on its own
//! clock.
//!
//! ```text
//!   now_ms ──▶ TickTimer(sample_interval) ──▶ cycle ──┬──▶ display   (every cycle)
//!                                                     └──▶ Cadence(K) ──▶ cloud push
//! ```

use log::debug;

/// Fires once every `every` calls to [`Cadence::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    every: u32,
    count: u32,
}

impl Cadence {
    /// `every` of 0 is treated as 1.
    pub const fn new(every: u32) -> Self {
        Self {
            every: if every == 0 { 1 } else { every },
            count: 0,
        }
    }

    /// Derive the cadence of a slower interval from the cycle period,
    /// rounding up so the slow task never runs more often than asked.
    pub fn from_intervals(cycle_ms: u32, slow_ms: u32) -> Self {
        Self::new(slow_ms.div_ceil(cycle_ms.max(1)))
    }

    /// Count one cycle. Returns `true` on the K-th, 2K-th, … call.
    pub fn tick(&mut self) -> bool {
        self.count += 1;
        if self.count >= self.every {
            self.count = 0;
            true
        } else {
            false
        }
    }

    pub fn every(&self) -> u32 {
        self.every
    }

    /// Change the period, keeping progress where possible.
    pub fn set_every(&mut self, every: u32) {
        self.every = every.max(1);
        if self.count >= self.every {
            self.count = self.every - 1;
        }
    }
}

/// Fixed-period timer polled from the main loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickTimer {
    period_ms: u32,
    next_due_ms: u64,
}

impl TickTimer {
    /// First tick is due immediately.
    pub const fn new(period_ms: u32, now_ms: u64) -> Self {
        Self {
            period_ms,
            next_due_ms: now_ms,
        }
    }

    /// `true` once per period. Missed periods are skipped, not replayed.
    pub fn poll(&mut self, now_ms: u64) -> bool {
        if now_ms < self.next_due_ms {
            return false;
        }
        let period = u64::from(self.period_ms.max(1));
        let late = now_ms - self.next_due_ms;
        if late >= period {
            debug!("tick timer: skipped {} periods", late / period);
        }
        self.next_due_ms = now_ms - (late % period) + period;
        true
    }

    pub fn period_ms(&self) -> u32 {
        self.period_ms
    }

    pub fn set_period(&mut self, period_ms: u32) {
        self.period_ms = period_ms;
    }

    /// Milliseconds until the next tick (0 if already due).
    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.next_due_ms.saturating_sub(now_ms)
    }
}
