//! ESP32 time adapter.
//!
//! Implements [`ClockPort`]: a monotonic millisecond counter for the
//! sampling scheduler and the SNTP-synced wall clock that keys cloud
//! records.
//!
//! - **`target_os = "espidf"`**: wraps `esp_timer_get_time()` and
//!   `gettimeofday()`.
//! - **`not(target_os = "espidf")`**: uses `std::time::Instant` plus an
//!   injectable wall clock for host-side testing and simulation.

use crate::app::ports::ClockPort;

/// Anything before 2020-01-01 means SNTP has not run yet.
pub const EPOCH_2020: u64 = 1_577_836_800;

/// Time adapter for the ESP32 platform.
pub struct Esp32Clock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    #[cfg(not(target_os = "espidf"))]
    sim_unix: Option<u64>,
}

impl Default for Esp32Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32Clock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
            #[cfg(not(target_os = "espidf"))]
            sim_unix: None,
        }
    }

    /// Pretend SNTP delivered `unix_secs` at this instant.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_sync(&mut self, unix_secs: u64) {
        let base = unix_secs.saturating_sub(self.start.elapsed().as_secs());
        self.sim_unix = Some(base);
    }

    /// Microseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }
}

impl ClockPort for Esp32Clock {
    fn now_ms(&self) -> u64 {
        self.uptime_us() / 1_000
    }

    #[cfg(target_os = "espidf")]
    fn unix_secs(&self) -> Option<u64> {
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, core::ptr::null_mut()) } != 0 {
            return None;
        }
        u64::try_from(tv.tv_sec).ok().filter(|&s| s >= EPOCH_2020)
    }

    #[cfg(not(target_os = "espidf"))]
    fn unix_secs(&self) -> Option<u64> {
        self.sim_unix
            .map(|base| base + self.start.elapsed().as_secs())
            .filter(|&s| s >= EPOCH_2020)
    }
}
