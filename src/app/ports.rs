//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (ADC, DHT line, buzzer, LCD, cloud uplink, storage)
//! implement these traits. The [`AppService`](super::service::AppService)
//! receives them at call sites, so the domain core never touches hardware
//! directly and every port can be replaced by a recording mock in tests.
//!
//! ## Security notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - **StoragePort** implementations SHOULD encrypt sensitive keys.

use crate::config::SystemConfig;
use crate::error::{CalibrationError, DriverError, TransportError};
use crate::gas::SensorModel;
use crate::sensors::Baseline;
use crate::sensors::environment::EnvironmentSample;
use crate::sensors::gas::GasReadout;
use crate::telemetry::SampleFrame;

// ───────────────────────────────────────────────────────────────
// Hardware driver contracts (consumed by the sensor drivers)
// ───────────────────────────────────────────────────────────────

/// One analog channel feeding an MQ sensor's load resistor.
pub trait AnalogInput {
    /// Configure the channel. Must succeed before the first read.
    fn init(&mut self) -> Result<(), DriverError>;

    /// One raw conversion in `[0, 2^bits − 1]`.
    fn read_raw_adc(&mut self) -> Result<u16, DriverError>;
}

/// Single-wire DHT data line.
pub trait ClimateInput {
    fn init(&mut self) -> Result<(), DriverError>;

    /// Clock out one 40-bit frame: humidity (2 bytes), temperature
    /// (2 bytes), checksum. Checksum is verified by the caller.
    fn read_frame(&mut self) -> Result<[u8; 5], DriverError>;
}

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: the domain calls this to obtain sensor data.
pub trait SensorPort {
    /// Initialise every sensor. Individual failures are logged and leave
    /// that sensor reporting `NotInitialised`.
    fn init(&mut self);

    /// Sample one gas sensor and evaluate all of its channels.
    fn read_gas(&mut self, sensor: SensorModel) -> GasReadout;

    /// Sample the temperature/humidity sensor.
    fn read_environment(&mut self, now_ms: u64) -> Result<EnvironmentSample, DriverError>;

    /// Last successful environment sample, if any.
    fn last_environment(&self) -> Option<EnvironmentSample>;

    /// Run a clean-air calibration. On success the new R0 is already
    /// installed in the sensor.
    fn calibrate(
        &mut self,
        sensor: SensorModel,
        sample_count: u32,
        settle_ms: u32,
    ) -> Result<f32, CalibrationError>;

    /// Apply the failure policy after a calibration error.
    fn calibration_failed(&mut self, sensor: SensorModel, strict: bool);

    /// Install a manually configured R0.
    fn set_r0(&mut self, sensor: SensorModel, r0: f32);

    fn baseline(&self, sensor: SensorModel) -> Baseline;
}

// ───────────────────────────────────────────────────────────────
// Actuator / output ports (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Alarm buzzer.
pub trait BuzzerPort {
    fn set_buzzer(&mut self, on: bool);

    fn is_buzzer_on(&self) -> bool;
}

/// Local display. Fire-and-forget.
pub trait DisplayPort {
    /// Show the latest frame. `interval_ms` is the page dwell time for
    /// displays that rotate between pages.
    fn render(&mut self, frame: &SampleFrame, interval_ms: u32);
}

/// Remote telemetry store.
pub trait CloudPort {
    /// Persist `record` under `key` (Unix seconds as a decimal string).
    fn push(&mut self, key: &str, record: &serde_json::Value) -> Result<(), TransportError>;
}

/// Network availability gate.
pub trait NetworkPort {
    fn is_online(&self) -> bool;
}

/// Time source.
pub trait ClockPort {
    /// Monotonic milliseconds since boot.
    fn now_ms(&self) -> u64;

    /// Wall-clock Unix seconds, `None` until the clock is synced.
    fn unix_secs(&self) -> Option<u64>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// # Security
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage for the config blob and credentials.
///
/// # Security
///
/// - Implementations SHOULD encrypt sensitive keys (WiFi passwords, tokens).
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST be atomic.
pub trait StoragePort {
    /// Read a value. Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key. Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations and provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    ValidationFailed(&'static str),
    /// Cloud upload is enabled but a required credential is absent.
    MissingCredentials(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Value does not fit the caller's buffer.
    BufferTooSmall,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::MissingCredentials(what) => write!(f, "missing credential: {}", what),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::error::Error for ConfigError {}

impl core::error::Error for StorageError {}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::NotFound => Self::Config("not found"),
            ConfigError::Corrupted => Self::Config("corrupted"),
            ConfigError::ValidationFailed(msg) | ConfigError::MissingCredentials(msg) => {
                Self::Config(msg)
            }
            ConfigError::StorageFull => Self::Config("storage full"),
            ConfigError::IoError => Self::Config("storage I/O error"),
        }
    }
}
