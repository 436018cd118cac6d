//! Character-LCD page layout (16x2).
//!
//! Formatting only; the I²C driver lives in `adapters::lcd`. Pages rotate
//! every display interval:
//!
//! ```text
//!   ┌────────────────┐ ┌────────────────┐ ┌────────────────┐ ┌────────────────┐
//!   │CO2 412.3ppm    │ │LPG 12.4ppm     │ │Temp 23.5C      │ │AQ score 42     │
//!   │NH4 3.1 CO 1.2  │ │H2 8.1 CO 2.2   │ │Hum  45%        │ │ALARM MQ135.Raw │
//!   └────────────────┘ └────────────────┘ └────────────────┘ └────────────────┘
//! ```
//!
//! Unavailable values are shown as `ERR`.

use core::fmt::Write as _;

use heapless::String;

use crate::gas::{GasKind, SensorModel};
use crate::pins::LCD_COLUMNS;
use crate::telemetry::SampleFrame;

pub type Line = String<LCD_COLUMNS>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Mq135,
    Mq2,
    Climate,
    Status,
}

impl Page {
    pub const ALL: [Self; 4] = [Self::Mq135, Self::Mq2, Self::Climate, Self::Status];

    pub fn next(self) -> Self {
        match self {
            Self::Mq135 => Self::Mq2,
            Self::Mq2 => Self::Climate,
            Self::Climate => Self::Status,
            Self::Status => Self::Mq135,
        }
    }
}

/// Page rotation driven by frame timestamps.
#[derive(Debug, Clone, Copy)]
pub struct PageRotation {
    current: Page,
    shown_since_ms: Option<u64>,
}

impl Default for PageRotation {
    fn default() -> Self {
        Self::new()
    }
}

impl PageRotation {
    pub const fn new() -> Self {
        Self {
            current: Page::Mq135,
            shown_since_ms: None,
        }
    }

    /// Page to show at `now_ms`, advancing once `interval_ms` has elapsed.
    pub fn advance(&mut self, now_ms: u64, interval_ms: u32) -> Page {
        match self.shown_since_ms {
            None => self.shown_since_ms = Some(now_ms),
            Some(since) if now_ms.saturating_sub(since) >= u64::from(interval_ms) => {
                self.current = self.current.next();
                self.shown_since_ms = Some(now_ms);
            }
            Some(_) => {}
        }
        self.current
    }

    pub fn current(&self) -> Page {
        self.current
    }
}

/// Compact numeric field: up to 5 characters, `ERR` when unavailable.
fn push_value(line: &mut Line, v: Option<f32>) {
    // Writes past the line width are truncated by heapless.
    let _ = match v {
        None => line.push_str("ERR").map_err(|_| core::fmt::Error),
        Some(v) if v < 1000.0 => write!(line, "{v:.1}"),
        Some(v) if v < 100_000.0 => write!(line, "{v:.0}"),
        Some(_) => line.push_str(">1e5").map_err(|_| core::fmt::Error),
    };
}

fn push(line: &mut Line, s: &str) {
    for c in s.chars() {
        if line.push(c).is_err() {
            break;
        }
    }
}

fn gas_page(frame: &SampleFrame, sensor: SensorModel, lead: GasKind, a: GasKind, b: GasKind) -> [Line; 2] {
    let readout = frame.gas(sensor);
    let mut top = Line::new();
    push(&mut top, lead.name());
    push(&mut top, " ");
    push_value(&mut top, readout.value(lead));
    push(&mut top, "ppm");

    let mut bottom = Line::new();
    push(&mut bottom, a.name());
    push(&mut bottom, " ");
    push_value(&mut bottom, readout.value(a));
    push(&mut bottom, " ");
    push(&mut bottom, b.name());
    push(&mut bottom, " ");
    push_value(&mut bottom, readout.value(b));
    [top, bottom]
}

/// Render one page of `frame` into two LCD lines.
pub fn render_page(page: Page, frame: &SampleFrame) -> [Line; 2] {
    match page {
        Page::Mq135 => gas_page(frame, SensorModel::Mq135, GasKind::Co2, GasKind::Ammonium, GasKind::Co),
        Page::Mq2 => gas_page(frame, SensorModel::Mq2, GasKind::Lpg, GasKind::Hydrogen, GasKind::Co),
        Page::Climate => {
            let env = frame.environment.as_ref().ok();
            let mut top = Line::new();
            push(&mut top, "Temp ");
            push_value(&mut top, env.map(|e| e.temperature_c));
            push(&mut top, "C");
            let mut bottom = Line::new();
            push(&mut bottom, "Hum  ");
            match env {
                Some(e) => {
                    let _ = write!(bottom, "{:.0}", e.humidity_pct);
                }
                None => push(&mut bottom, "ERR"),
            }
            push(&mut bottom, "%");
            [top, bottom]
        }
        Page::Status => {
            let mut top = Line::new();
            let _ = write!(top, "AQ score {}", frame.score);
            let mut bottom = Line::new();
            match frame.alarms.iter().find(|a| a.exceeded) {
                Some(a) => {
                    push(&mut bottom, "ALARM ");
                    let mut name: String<24> = String::new();
                    let _ = write!(name, "{}", a.source);
                    push(&mut bottom, &name);
                }
                None => push(&mut bottom, "No alarms"),
            }
            [top, bottom]
        }
    }
}
