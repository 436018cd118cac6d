//! Realtime-database uploader.
//!
//! Implements [`CloudPort`]: each record is written with an HTTP `PUT` to
//! `<cloud_url>/espData/<key>.json?auth=<token>`, so a retried key simply
//! overwrites itself.
//!
//! - **`target_os = "espidf"`**: `EspHttpConnection` over TLS using the
//!   IDF certificate bundle, bounded by `cloud_timeout_ms`.
//! - **host**: records every request in memory for tests.

use log::{debug, warn};
use serde_json::Value;

use crate::app::ports::CloudPort;
use crate::error::TransportError;
use crate::telemetry::CLOUD_BASE_PATH;

#[cfg(target_os = "espidf")]
use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
#[cfg(target_os = "espidf")]
use esp_idf_svc::http::Method;
#[cfg(target_os = "espidf")]
use esp_idf_svc::io::Write;

/// Full request URL for one record.
pub fn record_url(cloud_url: &str, key: &str, auth_token: &str) -> String {
    let base = cloud_url.trim_end_matches('/');
    if auth_token.is_empty() {
        format!("{base}/{CLOUD_BASE_PATH}/{key}.json")
    } else {
        format!("{base}/{CLOUD_BASE_PATH}/{key}.json?auth={auth_token}")
    }
}

pub struct FirebaseClient {
    cloud_url: heapless::String<128>,
    auth_token: heapless::String<128>,
    #[cfg_attr(not(target_os = "espidf"), allow(dead_code))]
    timeout_ms: u32,
    #[cfg(not(target_os = "espidf"))]
    sent: Vec<(String, Value)>,
    #[cfg(not(target_os = "espidf"))]
    sim_result: Result<(), TransportError>,
}

impl FirebaseClient {
    pub fn new(cloud_url: &str, auth_token: &str, timeout_ms: u32) -> Self {
        let mut url = heapless::String::new();
        let mut token = heapless::String::new();
        // Both fields come from `Provisioning`, which has the same capacity.
        let _ = url.push_str(cloud_url);
        let _ = token.push_str(auth_token);
        Self {
            cloud_url: url,
            auth_token: token,
            timeout_ms,
            #[cfg(not(target_os = "espidf"))]
            sent: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_result: Ok(()),
        }
    }

    pub fn set_timeout_ms(&mut self, timeout_ms: u32) {
        self.timeout_ms = timeout_ms;
    }

    /// URLs and bodies of every simulated request.
    #[cfg(not(target_os = "espidf"))]
    pub fn sent(&self) -> &[(String, Value)] {
        &self.sent
    }

    /// Outcome of the following simulated requests.
    #[cfg(not(target_os = "espidf"))]
    pub fn sim_respond(&mut self, result: Result<(), TransportError>) {
        self.sim_result = result;
    }

    #[cfg(target_os = "espidf")]
    fn put(&mut self, url: &str, body: &[u8]) -> Result<(), TransportError> {
        let config = Configuration {
            timeout: Some(core::time::Duration::from_millis(u64::from(self.timeout_ms))),
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            ..Default::default()
        };
        let mut conn = EspHttpConnection::new(&config).map_err(|_| TransportError::Io)?;

        let len = body.len().to_string();
        let headers = [
            ("Content-Type", "application/json"),
            ("Content-Length", len.as_str()),
        ];
        conn.initiate_request(Method::Put, url, &headers)
            .map_err(|_| TransportError::Io)?;
        conn.write_all(body).map_err(|_| TransportError::Io)?;
        conn.initiate_response().map_err(|e| {
            if e.code() == esp_idf_svc::sys::ESP_ERR_HTTP_EAGAIN {
                TransportError::Timeout
            } else {
                TransportError::Io
            }
        })?;

        match conn.status() {
            200..=299 => Ok(()),
            status => Err(TransportError::HttpStatus(status)),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn put(&mut self, url: &str, body: &[u8]) -> Result<(), TransportError> {
        let value: Value = serde_json::from_slice(body).map_err(|_| TransportError::Encode)?;
        self.sent.push((url.to_string(), value));
        self.sim_result
    }
}

impl CloudPort for FirebaseClient {
    fn push(&mut self, key: &str, record: &Value) -> Result<(), TransportError> {
        if self.cloud_url.is_empty() {
            return Err(TransportError::Offline);
        }
        let body = serde_json::to_vec(record).map_err(|_| TransportError::Encode)?;
        let url = record_url(&self.cloud_url, key, &self.auth_token);
        debug!("firebase: PUT {}/{key}.json ({} bytes)", CLOUD_BASE_PATH, body.len());
        self.put(&url, &body).inspect_err(|e| warn!("firebase: {e}"))
    }
}
