//! Unified error types for the AirSense firmware.
//!
//! A single `Error` enum that every subsystem converts into, so the top-level
//! loop handles failures uniformly. All variants are `Copy` so they can be
//! stored in a sample frame and logged without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A sensor could not be read.
    Driver(DriverError),
    /// A clean-air calibration run failed.
    Calibration(CalibrationError),
    /// A cloud upload failed.
    Transport(TransportError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Driver(e) => write!(f, "driver: {e}"),
            Self::Calibration(e) => write!(f, "calibration: {e}"),
            Self::Transport(e) => write!(f, "transport: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl core::error::Error for Error {}

// ---------------------------------------------------------------------------
// Driver errors
// ---------------------------------------------------------------------------

/// Hardware-level read failures. Recovered per reading: the affected value is
/// marked unavailable for the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverError {
    /// ADC read returned an error.
    AdcReadFailed,
    /// The sensor did not answer in time.
    Timeout,
    /// Frame checksum mismatch (DHT).
    Checksum,
    /// Decoded value is outside the sensor's physical range.
    InvalidData,
    /// `read` was called before a successful `init`.
    NotInitialised,
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AdcReadFailed => write!(f, "ADC read failed"),
            Self::Timeout => write!(f, "sensor timeout"),
            Self::Checksum => write!(f, "checksum mismatch"),
            Self::InvalidData => write!(f, "implausible sensor data"),
            Self::NotInitialised => write!(f, "sensor not initialised"),
        }
    }
}

impl core::error::Error for DriverError {}

impl From<DriverError> for Error {
    fn from(e: DriverError) -> Self {
        Self::Driver(e)
    }
}

// ---------------------------------------------------------------------------
// Reading errors (per gas channel)
// ---------------------------------------------------------------------------

/// Why a concentration could not be produced for one gas channel.
///
/// Rendered as `ERR` on the LCD and `null` in JSON payloads; a reading that
/// carries one of these is never shown as a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingError {
    /// The underlying raw read failed.
    Driver(DriverError),
    /// Raw count above the ADC full scale.
    OutOfRange,
    /// Zero volts across the load resistor (sensor unplugged or heater off).
    Disconnected,
    /// Sensor resistance collapsed to zero or below (output at the rail).
    Saturated,
    /// Rs/R0 is zero, negative or not finite.
    InvalidRatio,
    /// No usable R0 for this sensor.
    Uncalibrated,
}

impl fmt::Display for ReadingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Driver(e) => write!(f, "{e}"),
            Self::OutOfRange => write!(f, "raw value above ADC range"),
            Self::Disconnected => write!(f, "sensor disconnected"),
            Self::Saturated => write!(f, "sensor saturated"),
            Self::InvalidRatio => write!(f, "invalid Rs/R0 ratio"),
            Self::Uncalibrated => write!(f, "sensor uncalibrated"),
        }
    }
}

impl From<DriverError> for ReadingError {
    fn from(e: DriverError) -> Self {
        Self::Driver(e)
    }
}

// ---------------------------------------------------------------------------
// Calibration errors
// ---------------------------------------------------------------------------

/// A calibration run was aborted. R0 is left untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    /// `sample_count` was zero.
    NoSamples,
    /// A raw read failed mid-run.
    Driver(DriverError),
    /// A sample produced an unusable resistance.
    InvalidSample(ReadingError),
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSamples => write!(f, "sample count must be > 0"),
            Self::Driver(e) => write!(f, "read failed: {e}"),
            Self::InvalidSample(e) => write!(f, "invalid sample: {e}"),
        }
    }
}

impl core::error::Error for CalibrationError {}

impl From<CalibrationError> for Error {
    fn from(e: CalibrationError) -> Self {
        Self::Calibration(e)
    }
}

impl From<ReadingError> for CalibrationError {
    fn from(e: ReadingError) -> Self {
        match e {
            ReadingError::Driver(d) => Self::Driver(d),
            other => Self::InvalidSample(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Cloud push failures. The upload for this cycle is skipped; the next
/// scheduled push tries again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// Network gate reports no connectivity.
    Offline,
    /// Wall clock not synced yet, so no timestamp key can be formed.
    ClockNotSynced,
    /// The request exceeded the configured timeout.
    Timeout,
    /// The server answered with a non-2xx status.
    HttpStatus(u16),
    /// Socket / TLS level failure.
    Io,
    /// The record could not be serialised.
    Encode,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offline => write!(f, "network offline"),
            Self::ClockNotSynced => write!(f, "clock not synced"),
            Self::Timeout => write!(f, "request timed out"),
            Self::HttpStatus(code) => write!(f, "HTTP status {code}"),
            Self::Io => write!(f, "I/O error"),
            Self::Encode => write!(f, "encode failed"),
        }
    }
}

impl core::error::Error for TransportError {}

impl From<TransportError> for Error {
    fn from(e: TransportError) -> Self {
        Self::Transport(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
