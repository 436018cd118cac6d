//! GPIO / peripheral pin assignments for the AirSense boards.
//!
//! Single source of truth: drivers take a [`PinMap`] from the selected
//! [`BoardProfile`](crate::config::BoardProfile) rather than hard-coding
//! numbers.

use serde::{Deserialize, Serialize};

/// Pin assignment for one board revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinMap {
    /// MQ-135 analog output (ADC1).
    pub mq135_adc_gpio: i32,
    /// MQ-2 analog output (ADC1).
    pub mq2_adc_gpio: i32,
    /// Active buzzer, HIGH = sounding.
    pub buzzer_gpio: i32,
    /// DHT single-wire data line (open drain, external pull-up).
    pub dht_gpio: i32,
    /// LCD backpack I²C.
    pub i2c_sda_gpio: i32,
    pub i2c_scl_gpio: i32,
}

// ---------------------------------------------------------------------------
// Rev A: ESP32 DevKit, DHT11, first enclosure
// ---------------------------------------------------------------------------

pub const REV_A: PinMap = PinMap {
    mq135_adc_gpio: 34,
    mq2_adc_gpio: 35,
    buzzer_gpio: 23,
    dht_gpio: 19,
    i2c_sda_gpio: 21,
    i2c_scl_gpio: 22,
};

// ---------------------------------------------------------------------------
// Rev B: same analog front-end, DHT22 moved off the strapping-adjacent pin
// ---------------------------------------------------------------------------

pub const REV_B: PinMap = PinMap {
    mq135_adc_gpio: 34,
    mq2_adc_gpio: 35,
    buzzer_gpio: 23,
    dht_gpio: 18,
    i2c_sda_gpio: 21,
    i2c_scl_gpio: 22,
};

// ---------------------------------------------------------------------------
// Peripheral constants
// ---------------------------------------------------------------------------

/// PCF8574 backpack address of the 16x2 character LCD.
pub const LCD_I2C_ADDR: u8 = 0x27;
pub const LCD_COLUMNS: usize = 16;
pub const LCD_ROWS: usize = 2;
/// I²C bus speed for the LCD backpack.
pub const I2C_FREQ_HZ: u32 = 100_000;

/// ADC1 channel for an ESP32 (classic) GPIO, if the pin is on ADC1.
pub const fn adc1_channel(gpio: i32) -> Option<u32> {
    match gpio {
        36 => Some(0),
        37 => Some(1),
        38 => Some(2),
        39 => Some(3),
        32 => Some(4),
        33 => Some(5),
        34 => Some(6),
        35 => Some(7),
        _ => None,
    }
}
