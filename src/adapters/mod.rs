//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to              |
//! |----------------|--------------------|--------------------------|
//! | `hardware`     | SensorPort         | ESP32 ADC1, DHT line     |
//! |                | BuzzerPort         | ESP32 GPIO               |
//! | `lcd`          | DisplayPort        | PCF8574 16x2 LCD (I²C)   |
//! | `firebase`     | CloudPort          | Realtime DB over HTTPS   |
//! | `wifi`         | NetworkPort        | ESP-IDF WiFi STA         |
//! | `time`         | ClockPort          | esp_timer + SNTP clock   |
//! | `log_sink`     | EventSink          | Serial log output        |
//! | `nvs`          | ConfigPort         | NVS / in-memory store    |
//! |                | StoragePort        |                          |

pub mod firebase;
pub mod hardware;
pub mod lcd;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod wifi;
