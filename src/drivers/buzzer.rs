//! Active piezo buzzer on a plain GPIO (HIGH = sounding).
//!
//! A dumb actuator: the alarm supervisor decides, this only switches the
//! pin and remembers the level so repeated commands are cheap.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the GPIO via hw_init helpers.
//! On host/test: tracks state in-memory only.

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;

pub struct BuzzerDriver {
    gpio: i32,
    on: bool,
    /// Number of off→on edges since boot.
    activations: u32,
}

impl BuzzerDriver {
    pub fn new(gpio: i32) -> Self {
        Self {
            gpio,
            on: false,
            activations: 0,
        }
    }

    pub fn set(&mut self, on: bool) {
        if on == self.on {
            return;
        }
        self.write_hw(on);
        if on {
            self.activations = self.activations.wrapping_add(1);
        }
        self.on = on;
    }

    #[cfg(target_os = "espidf")]
    fn write_hw(&self, on: bool) {
        hw_init::gpio_write(self.gpio, on);
    }

    #[cfg(not(target_os = "espidf"))]
    fn write_hw(&self, on: bool) {
        log::trace!("buzzer(sim): GPIO{} -> {}", self.gpio, u8::from(on));
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    pub fn activations(&self) -> u32 {
        self.activations
    }

    pub fn gpio(&self) -> i32 {
        self.gpio
    }
}
