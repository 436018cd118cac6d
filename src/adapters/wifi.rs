//! WiFi station-mode adapter and cloud provisioning.
//!
//! Implements [`NetworkPort`], the only view the core has of connectivity:
//! a single "online" gate consulted before each cloud push.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: real ESP-IDF WiFi driver via `esp_idf_svc::wifi`.
//! - **all other targets**: simulation stubs for host-side tests.
//!
//! ## Reconnection policy
//!
//! On disconnect the adapter waits an exponential backoff (2 s → 4 s →
//! 8 s … capped at 60 s) before retrying. [`WifiAdapter::poll`] reports
//! link transitions as [`Event::NetworkUp`] / [`Event::NetworkDown`]; the
//! main loop owns the adapter, so these never go through the HTTP task's
//! queue.

use core::fmt;
use log::{error, info, warn};

use crate::app::ports::{ConfigError, NetworkPort, StorageError, StoragePort};
use crate::events::Event;

#[cfg(target_os = "espidf")]
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

// ───────────────────────────────────────────────────────────────
// Errors
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
    AlreadyConnected,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => {
                write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)")
            }
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
            Self::AlreadyConnected => write!(f, "already connected to AP"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Provisioning
// ───────────────────────────────────────────────────────────────

const CRED_NAMESPACE: &str = super::nvs::CRED_NAMESPACE;
const KEY_SSID: &str = "wifi_ssid";
const KEY_PASS: &str = "wifi_pass";
const KEY_URL: &str = "cloud_url";
const KEY_TOKEN: &str = "cloud_token";

/// WiFi credentials plus the cloud endpoint, as stored in the `auth`
/// namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Provisioning {
    pub ssid: heapless::String<32>,
    pub password: heapless::String<64>,
    /// Realtime-database root, e.g. `https://x.firebaseio.com`.
    pub cloud_url: heapless::String<128>,
    pub auth_token: heapless::String<128>,
}

fn read_string<const N: usize>(
    storage: &impl StoragePort,
    key: &str,
) -> Result<Option<heapless::String<N>>, ConfigError> {
    let mut buf = [0u8; N];
    match storage.read(CRED_NAMESPACE, key, &mut buf) {
        Ok(len) => {
            let s = core::str::from_utf8(&buf[..len]).map_err(|_| ConfigError::Corrupted)?;
            let mut out = heapless::String::new();
            out.push_str(s).map_err(|_| ConfigError::Corrupted)?;
            Ok(Some(out).filter(|s: &heapless::String<N>| !s.is_empty()))
        }
        Err(StorageError::NotFound) => Ok(None),
        Err(StorageError::BufferTooSmall) => Err(ConfigError::Corrupted),
        Err(_) => Err(ConfigError::IoError),
    }
}

impl Provisioning {
    /// Load credentials. With cloud upload enabled every field but the
    /// password is required; otherwise missing fields stay empty and the
    /// device runs offline.
    pub fn load(storage: &impl StoragePort, cloud_enabled: bool) -> Result<Self, ConfigError> {
        let ssid = read_string::<32>(storage, KEY_SSID)?;
        let password = read_string::<64>(storage, KEY_PASS)?.unwrap_or_default();
        let cloud_url = read_string::<128>(storage, KEY_URL)?;
        let auth_token = read_string::<128>(storage, KEY_TOKEN)?;

        if cloud_enabled {
            if ssid.is_none() {
                return Err(ConfigError::MissingCredentials(KEY_SSID));
            }
            if cloud_url.is_none() {
                return Err(ConfigError::MissingCredentials(KEY_URL));
            }
            if auth_token.is_none() {
                return Err(ConfigError::MissingCredentials(KEY_TOKEN));
            }
        }

        Ok(Self {
            ssid: ssid.unwrap_or_default(),
            password,
            cloud_url: cloud_url.unwrap_or_default(),
            auth_token: auth_token.unwrap_or_default(),
        })
    }

    pub fn store(&self, storage: &mut impl StoragePort) -> Result<(), StorageError> {
        storage.write(CRED_NAMESPACE, KEY_SSID, self.ssid.as_bytes())?;
        storage.write(CRED_NAMESPACE, KEY_PASS, self.password.as_bytes())?;
        storage.write(CRED_NAMESPACE, KEY_URL, self.cloud_url.as_bytes())?;
        storage.write(CRED_NAMESPACE, KEY_TOKEN, self.auth_token.as_bytes())
    }

    pub fn has_wifi(&self) -> bool {
        !self.ssid.is_empty()
    }
}

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
}

const INITIAL_BACKOFF_SECS: u32 = 2;
const MAX_BACKOFF_SECS: u32 = 60;

// ───────────────────────────────────────────────────────────────
// WiFi adapter
// ───────────────────────────────────────────────────────────────

pub struct WifiAdapter {
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    backoff_secs: u32,
    next_retry_ms: u64,
    #[cfg(target_os = "espidf")]
    wifi: Option<BlockingWifi<EspWifi<'static>>>,
    /// Simulation: remaining connect attempts that fail.
    #[cfg(not(target_os = "espidf"))]
    sim_failures: u32,
    #[cfg(not(target_os = "espidf"))]
    sim_link: bool,
}

impl Default for WifiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl WifiAdapter {
    pub fn new() -> Self {
        Self {
            state: WifiState::Disconnected,
            ssid: heapless::String::new(),
            password: heapless::String::new(),
            backoff_secs: INITIAL_BACKOFF_SECS,
            next_retry_ms: 0,
            #[cfg(target_os = "espidf")]
            wifi: None,
            #[cfg(not(target_os = "espidf"))]
            sim_failures: 0,
            #[cfg(not(target_os = "espidf"))]
            sim_link: false,
        }
    }

    /// Hand over the station driver built in `main` from the modem peripheral.
    #[cfg(target_os = "espidf")]
    pub fn attach(&mut self, wifi: BlockingWifi<EspWifi<'static>>) {
        self.wifi = Some(wifi);
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_fail_next(&mut self, attempts: u32) {
        self.sim_failures = attempts;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn sim_drop_link(&mut self) {
        self.sim_link = false;
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    pub fn backoff_secs(&self) -> u32 {
        self.backoff_secs
    }

    pub fn set_credentials(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        self.ssid.clear();
        self.ssid.push_str(ssid).map_err(|_| ConnectivityError::InvalidSsid)?;
        self.password.clear();
        self.password
            .push_str(password)
            .map_err(|_| ConnectivityError::InvalidPassword)?;
        info!("WiFi: credentials updated (SSID='{}')", self.ssid);
        Ok(())
    }

    pub fn connect(&mut self, now_ms: u64) -> Result<(), ConnectivityError> {
        if self.ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }
        if self.state == WifiState::Connected {
            return Err(ConnectivityError::AlreadyConnected);
        }

        info!("WiFi: connecting to '{}'", self.ssid);
        self.state = WifiState::Connecting;

        match self.platform_connect() {
            Ok(()) => {
                self.on_connected();
                Ok(())
            }
            Err(e) => {
                error!("WiFi: connection failed: {}", e);
                self.schedule_retry(0, now_ms);
                Err(e)
            }
        }
    }

    /// Drive reconnects and detect link loss. Call once per loop pass.
    pub fn poll(&mut self, now_ms: u64) -> Option<Event> {
        match self.state {
            WifiState::Reconnecting { attempt } if now_ms >= self.next_retry_ms => {
                info!("WiFi: reconnect attempt {} (backoff {}s)", attempt + 1, self.backoff_secs);
                match self.platform_connect() {
                    Ok(()) => {
                        self.on_connected();
                        Some(Event::NetworkUp)
                    }
                    Err(_) => {
                        self.backoff_secs = (self.backoff_secs * 2).min(MAX_BACKOFF_SECS);
                        self.schedule_retry(attempt + 1, now_ms);
                        None
                    }
                }
            }
            WifiState::Connected if !self.platform_is_connected() => {
                warn!("WiFi: connection lost, entering reconnect");
                self.schedule_retry(0, now_ms);
                Some(Event::NetworkDown)
            }
            _ => None,
        }
    }

    fn on_connected(&mut self) {
        self.state = WifiState::Connected;
        self.backoff_secs = INITIAL_BACKOFF_SECS;
        info!("WiFi: connected to '{}'", self.ssid);
    }

    fn schedule_retry(&mut self, attempt: u32, now_ms: u64) {
        self.state = WifiState::Reconnecting { attempt };
        self.next_retry_ms = now_ms + u64::from(self.backoff_secs) * 1_000;
    }

    // ── Platform-specific ─────────────────────────────────────

    #[cfg(target_os = "espidf")]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        let wifi = self.wifi.as_mut().ok_or(ConnectivityError::ConnectionFailed)?;
        let auth_method = if self.password.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        };
        let config = Configuration::Client(ClientConfiguration {
            ssid: self
                .ssid
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidSsid)?,
            password: self
                .password
                .as_str()
                .try_into()
                .map_err(|_| ConnectivityError::InvalidPassword)?,
            auth_method,
            ..Default::default()
        });
        wifi.set_configuration(&config)
            .map_err(|_| ConnectivityError::ConnectionFailed)?;
        if !wifi.is_started().unwrap_or(false) {
            wifi.start().map_err(|_| ConnectivityError::ConnectionFailed)?;
        }
        wifi.connect().map_err(|_| ConnectivityError::ConnectionFailed)?;
        wifi.wait_netif_up()
            .map_err(|_| ConnectivityError::ConnectionFailed)?;
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_connect(&mut self) -> Result<(), ConnectivityError> {
        if self.sim_failures > 0 {
            self.sim_failures -= 1;
            warn!("WiFi(sim): simulated connect failure");
            return Err(ConnectivityError::ConnectionFailed);
        }
        self.sim_link = true;
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn platform_is_connected(&self) -> bool {
        self.wifi
            .as_ref()
            .is_some_and(|w| w.is_connected().unwrap_or(false))
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_is_connected(&self) -> bool {
        self.sim_link
    }
}

impl NetworkPort for WifiAdapter {
    fn is_online(&self) -> bool {
        self.state == WifiState::Connected
    }
}

// ───────────────────────────────────────────────────────────────
// Tests
// ───────────────────────────────────────────────────────────────
