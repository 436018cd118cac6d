//! 16x2 HD44780 character LCD behind a PCF8574 I²C backpack.
//!
//! [`Lcd1602`] is the byte-level driver, generic over the `embedded-hal`
//! I²C and delay traits so it runs against `esp_idf_hal::i2c::I2cDriver`
//! on the device and a recording bus in tests. [`LcdDisplay`] implements
//! [`DisplayPort`] on top of it with page rotation.
//!
//! Backpack bit layout: P0 = RS, P1 = RW, P2 = EN, P3 = backlight,
//! P4..P7 = D4..D7.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::{info, warn};

use crate::app::ports::DisplayPort;
use crate::display::{self, Line, Page, PageRotation};
use crate::pins::{LCD_COLUMNS, LCD_ROWS};
use crate::telemetry::SampleFrame;

const RS: u8 = 0x01;
const EN: u8 = 0x04;
const BACKLIGHT: u8 = 0x08;

const CMD_CLEAR: u8 = 0x01;
const CMD_ENTRY_MODE: u8 = 0x06;
const CMD_DISPLAY_ON: u8 = 0x0C;
const CMD_FUNCTION_4BIT_2LINE: u8 = 0x28;
const CMD_SET_DDRAM: u8 = 0x80;

const ROW_OFFSETS: [u8; LCD_ROWS] = [0x00, 0x40];

pub struct Lcd1602<I, D> {
    i2c: I,
    delay: D,
    addr: u8,
    backlight: u8,
}

impl<I: I2c, D: DelayNs> Lcd1602<I, D> {
    pub fn new(i2c: I, delay: D, addr: u8) -> Self {
        Self {
            i2c,
            delay,
            addr,
            backlight: BACKLIGHT,
        }
    }

    /// Power-on reset into 4-bit, two-line mode.
    pub fn init(&mut self) -> Result<(), I::Error> {
        self.delay.delay_ms(50);
        // Three 8-bit "function set" nibbles, then switch to 4-bit.
        for wait_us in [4_500, 4_500, 150] {
            self.write_nibble(0x30, 0)?;
            self.delay.delay_us(wait_us);
        }
        self.write_nibble(0x20, 0)?;
        self.command(CMD_FUNCTION_4BIT_2LINE)?;
        self.command(CMD_DISPLAY_ON)?;
        self.clear()?;
        self.command(CMD_ENTRY_MODE)
    }

    pub fn clear(&mut self) -> Result<(), I::Error> {
        self.command(CMD_CLEAR)?;
        self.delay.delay_ms(2);
        Ok(())
    }

    /// Overwrite a whole row, space-padded. Non-ASCII renders as `?`.
    pub fn write_line(&mut self, row: usize, text: &str) -> Result<(), I::Error> {
        let offset = ROW_OFFSETS[row.min(LCD_ROWS - 1)];
        self.command(CMD_SET_DDRAM | offset)?;
        let mut chars = text.chars();
        for _ in 0..LCD_COLUMNS {
            let c = chars.next().unwrap_or(' ');
            let byte = if c.is_ascii() { c as u8 } else { b'?' };
            self.send(byte, RS)?;
        }
        Ok(())
    }

    fn command(&mut self, cmd: u8) -> Result<(), I::Error> {
        self.send(cmd, 0)?;
        self.delay.delay_us(50);
        Ok(())
    }

    fn send(&mut self, byte: u8, mode: u8) -> Result<(), I::Error> {
        self.write_nibble(byte & 0xF0, mode)?;
        self.write_nibble((byte << 4) & 0xF0, mode)
    }

    fn write_nibble(&mut self, nibble: u8, mode: u8) -> Result<(), I::Error> {
        let data = nibble | mode | self.backlight;
        // Latch on the falling edge of EN.
        self.i2c.write(self.addr, &[data | EN])?;
        self.delay.delay_us(1);
        self.i2c.write(self.addr, &[data])?;
        self.delay.delay_us(50);
        Ok(())
    }

    pub fn release(self) -> (I, D) {
        (self.i2c, self.delay)
    }
}

/// [`DisplayPort`] adapter: rotates pages and rewrites only changed rows.
pub struct LcdDisplay<I, D> {
    lcd: Lcd1602<I, D>,
    rotation: PageRotation,
    shown: [Line; LCD_ROWS],
    healthy: bool,
}

impl<I: I2c, D: DelayNs> LcdDisplay<I, D> {
    /// Initialise the panel. A panel that fails to initialise is kept and
    /// retried on the next render.
    pub fn new(mut lcd: Lcd1602<I, D>) -> Self {
        let healthy = match lcd.init() {
            Ok(()) => {
                info!("lcd: 16x2 panel ready");
                true
            }
            Err(e) => {
                warn!("lcd: init failed ({e:?}), will retry");
                false
            }
        };
        Self {
            lcd,
            rotation: PageRotation::new(),
            shown: [Line::new(), Line::new()],
            healthy,
        }
    }

    pub fn page(&self) -> Page {
        self.rotation.current()
    }

    pub fn shown(&self) -> &[Line; LCD_ROWS] {
        &self.shown
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy
    }

    fn draw(&mut self, lines: &[Line; LCD_ROWS]) -> Result<(), I::Error> {
        if !self.healthy {
            self.lcd.init()?;
            self.shown = [Line::new(), Line::new()];
            self.healthy = true;
        }
        for (row, line) in lines.iter().enumerate() {
            if *line != self.shown[row] {
                self.lcd.write_line(row, line)?;
                self.shown[row] = line.clone();
            }
        }
        Ok(())
    }
}

impl<I: I2c, D: DelayNs> DisplayPort for LcdDisplay<I, D> {
    fn render(&mut self, frame: &SampleFrame, interval_ms: u32) {
        let page = self.rotation.advance(frame.timestamp_ms, interval_ms);
        let lines = display::render_page(page, frame);
        if let Err(e) = self.draw(&lines) {
            if self.healthy {
                warn!("lcd: write failed ({e:?})");
            }
            self.healthy = false;
        }
    }
}
