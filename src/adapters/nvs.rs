//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements both [`ConfigPort`] and [`StoragePort`] for the AirSense
//! monitor.
//!
//! # Security
//!
//! - Config validation: all fields are range-checked before persistence,
//!   and again after loading.
//! - Encrypted NVS: on ESP32, the "auth" namespace (WiFi and cloud
//!   credentials) lives on the encrypted NVS partition. The simulation
//!   backend uses plaintext (dev/test only).
//! - Namespace isolation: each subsystem uses its own namespace prefix.
//! - Atomic writes: ESP-IDF NVS commits are atomic per nvs_commit().

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::SystemConfig;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "airsense";
const CONFIG_KEY: &str = "syscfg";

/// Leading byte of the config blob. Bump when `SystemConfig` changes shape.
pub const CONFIG_FORMAT_VERSION: u8 = 1;

/// Upper bound for the postcard config blob.
#[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
const MAX_BLOB_SIZE: usize = 2000;

/// Namespace holding WiFi and cloud credentials.
pub const CRED_NAMESPACE: &str = "auth";

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Create a new NvsAdapter and initialise NVS flash.
    ///
    /// Returns `Err(ConfigError::IoError)` if flash initialisation fails
    /// unrecoverably. On first boot or after a version mismatch the NVS
    /// partition is erased and re-initialised automatically.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase are called from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{namespace}::{key}")
    }

    /// NVS names are at most 15 bytes plus the terminator.
    #[cfg(target_os = "espidf")]
    fn c_name(name: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let bytes = name.as_bytes();
        let len = bytes.len().min(15);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }

    /// Open an NVS namespace, execute a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let ns = Self::c_name(namespace);
        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        // SAFETY: ns is NUL-terminated and outlives the call.
        let ret = unsafe { nvs_open(ns.as_ptr().cast(), mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        // SAFETY: handle was opened above and is closed exactly once.
        unsafe {
            nvs_close(handle);
        }
        result
    }

    #[cfg(not(target_os = "espidf"))]
    fn load_blob(&self) -> Option<Vec<u8>> {
        self.store
            .borrow()
            .get(&Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY))
            .cloned()
    }

    #[cfg(target_os = "espidf")]
    fn load_blob(&self) -> Option<Vec<u8>> {
        let result = Self::with_nvs_handle(CONFIG_NAMESPACE, false, |handle| {
            let key = Self::c_name(CONFIG_KEY);
            let mut size: usize = 0;

            // First call: get size
            let ret = unsafe {
                nvs_get_blob(handle, key.as_ptr().cast(), core::ptr::null_mut(), &mut size)
            };
            if ret != ESP_OK || size == 0 || size > MAX_BLOB_SIZE {
                return Err(if ret == ESP_OK { ESP_FAIL } else { ret });
            }

            let mut buf = vec![0u8; size];
            let ret = unsafe {
                nvs_get_blob(handle, key.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            Ok(buf)
        });
        match result {
            Ok(bytes) => Some(bytes),
            Err(e) if e == ESP_ERR_NVS_NOT_FOUND => None,
            Err(e) => {
                warn!("NvsAdapter: NVS read error {e}");
                None
            }
        }
    }
}

/// Prefix an encoded config with its layout version.
pub fn encode_config(config: &SystemConfig) -> Result<Vec<u8>, ConfigError> {
    postcard::to_extend(config, vec![CONFIG_FORMAT_VERSION]).map_err(|_| ConfigError::IoError)
}

/// Inverse of [`encode_config`]. A blob written by a firmware with a
/// different layout is reported as corrupted.
pub fn decode_config(bytes: &[u8]) -> Result<SystemConfig, ConfigError> {
    let (&version, body) = bytes.split_first().ok_or(ConfigError::Corrupted)?;
    if version != CONFIG_FORMAT_VERSION {
        warn!("NvsAdapter: stored config is format v{version}, expected v{CONFIG_FORMAT_VERSION}");
        return Err(ConfigError::Corrupted);
    }
    let cfg: SystemConfig = postcard::from_bytes(body).map_err(|_| ConfigError::Corrupted)?;
    cfg.validate()?;
    Ok(cfg)
}

impl NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    fn store_blob(&self, bytes: Vec<u8>) -> Result<(), ConfigError> {
        self.store
            .borrow_mut()
            .insert(Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY), bytes);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn store_blob(&self, bytes: Vec<u8>) -> Result<(), ConfigError> {
        if bytes.len() > MAX_BLOB_SIZE {
            return Err(ConfigError::StorageFull);
        }
        let result = Self::with_nvs_handle(CONFIG_NAMESPACE, true, |handle| {
            let key = Self::c_name(CONFIG_KEY);
            // SAFETY: key is NUL-terminated; bytes outlives the call.
            let ret = unsafe {
                nvs_set_blob(handle, key.as_ptr().cast(), bytes.as_ptr().cast(), bytes.len())
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            match unsafe { nvs_commit(handle) } {
                ESP_OK => Ok(()),
                err => Err(err),
            }
        });
        match result {
            Ok(()) => Ok(()),
            Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE => Err(ConfigError::StorageFull),
            Err(e) => {
                warn!("NvsAdapter: NVS write error {e}");
                Err(ConfigError::IoError)
            }
        }
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let Some(bytes) = self.load_blob() else {
            info!("NvsAdapter: no stored config, using defaults");
            return Ok(SystemConfig::default());
        };
        let cfg = decode_config(&bytes)?;
        info!("NvsAdapter: loaded config ({} bytes)", bytes.len());
        Ok(cfg)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = encode_config(config)?;
        let len = bytes.len();
        self.store_blob(bytes)?;
        info!("NvsAdapter: config saved ({len} bytes)");
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            match self.store.borrow().get(&composite) {
                Some(data) if data.len() > buf.len() => Err(StorageError::BufferTooSmall),
                Some(data) => {
                    buf[..data.len()].copy_from_slice(data);
                    Ok(data.len())
                }
                None => Err(StorageError::NotFound),
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let key = Self::c_name(key);
                let mut size = buf.len();
                let ret = unsafe {
                    nvs_get_blob(handle, key.as_ptr().cast(), buf.as_mut_ptr().cast(), &mut size)
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(size)
            });
            match result {
                Ok(size) => Ok(size),
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => Err(StorageError::NotFound),
                Err(e) if e == ESP_ERR_NVS_INVALID_LENGTH => Err(StorageError::BufferTooSmall),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().insert(composite, data.to_vec());
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let key = Self::c_name(key);
                let ret = unsafe {
                    nvs_set_blob(handle, key.as_ptr().cast(), data.as_ptr().cast(), data.len())
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => Ok(()),
                Err(e) if e == ESP_ERR_NVS_NOT_ENOUGH_SPACE => Err(StorageError::Full),
                Err(_) => Err(StorageError::IoError),
            }
        }
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow_mut().remove(&composite);
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, true, |handle| {
                let key = Self::c_name(key);
                let ret = unsafe { nvs_erase_key(handle, key.as_ptr().cast()) };
                if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            result.map_err(|_| StorageError::IoError)
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        #[cfg(not(target_os = "espidf"))]
        {
            let composite = Self::composite_key(namespace, key);
            self.store.borrow().contains_key(&composite)
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(namespace, false, |handle| {
                let key = Self::c_name(key);
                let ret =
                    unsafe { nvs_find_key(handle, key.as_ptr().cast(), core::ptr::null_mut()) };
                Ok(ret == ESP_OK)
            });
            result.unwrap_or(false)
        }
    }
}
