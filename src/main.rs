//! AirSense firmware entry point.
//!
//! Hexagonal architecture with a timer-driven sampling loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter    LcdDisplay     NvsAdapter    Esp32Clock    │
//! │  (Sensor+Buzzer)    (Display)      (Config+NVS)  (Clock)       │
//! │  WifiAdapter        FirebaseClient LogEventSink  EspHttpServer │
//! │  (Network)          (Cloud)        (EventSink)   (local API)   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  FSM · Calibration · Alarms · Score                    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  TickTimer (sampling period) · Event + command queues          │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Result;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::{Ets, FreeRtos};
use esp_idf_svc::hal::gpio::AnyIOPin;
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::units::Hertz;
use esp_idf_svc::http::server::{Configuration as HttpServerConfig, EspHttpConnection, EspHttpServer, Request};
use esp_idf_svc::http::Method as HttpMethod;
use esp_idf_svc::io::{Read, Write};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::sntp::{EspSntp, SyncStatus};
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use log::{error, info, warn};
use serde_json::Value;

use airsense::adapters::firebase::FirebaseClient;
use airsense::adapters::hardware::{AdcInput, DhtLine, HardwareAdapter};
use airsense::adapters::lcd::{Lcd1602, LcdDisplay};
use airsense::adapters::log_sink::LogEventSink;
use airsense::adapters::nvs::NvsAdapter;
use airsense::adapters::time::Esp32Clock;
use airsense::adapters::wifi::{Provisioning, WifiAdapter};
use airsense::app::api::{self, ApiResponse, ApiSnapshot, Method};
use airsense::app::ports::{ClockPort, CloudPort, ConfigPort, NetworkPort, SensorPort};
use airsense::app::service::AppService;
use airsense::config::SystemConfig;
use airsense::drivers::buzzer::BuzzerDriver;
use airsense::drivers::hw_init;
use airsense::error::TransportError;
use airsense::events::{self, CommandSender, Event};
use airsense::gas::SensorModel;
use airsense::pins;
use airsense::scheduler::TickTimer;
use airsense::sensors::environment::EnvironmentSensor;
use airsense::sensors::gas::GasSensor;
use airsense::sensors::SensorHub;

/// Largest POST body the API accepts.
const MAX_BODY: usize = 512;
/// Main-loop poll period between timer checks.
const LOOP_POLL_MS: u32 = 10;

// ── Uplink: network gate + cloud client as one port pair ──────

struct Uplink {
    wifi: WifiAdapter,
    cloud: FirebaseClient,
}

impl NetworkPort for Uplink {
    fn is_online(&self) -> bool {
        self.wifi.is_online()
    }
}

impl CloudPort for Uplink {
    fn push(&mut self, key: &str, record: &Value) -> Result<(), TransportError> {
        self.cloud.push(key, record)
    }
}

// ── HTTP API glue ─────────────────────────────────────────────

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn serve(
    mut req: Request<&mut EspHttpConnection<'_>>,
    method: Method,
    snapshot: &Mutex<ApiSnapshot>,
    commands: &Mutex<CommandSender>,
) -> Result<()> {
    let mut body = [0u8; MAX_BODY];
    let mut len = 0;
    if method == Method::Post {
        while len < MAX_BODY {
            let n = req.read(&mut body[len..])?;
            if n == 0 {
                break;
            }
            len += n;
        }
    }
    let path = req.uri().to_owned();

    let mut response = api::route(method, &path, &body[..len], &locked(snapshot));
    if !response.commands.is_empty() {
        let mut tx = locked(commands);
        for cmd in core::mem::take(&mut response.commands) {
            if events::send_command(&mut tx, cmd).is_err() {
                warn!("api: command queue full, rejecting {path}");
                response = ApiResponse::busy();
                break;
            }
        }
    }

    let bytes = serde_json::to_vec(&response.body)?;
    let mut resp = req.into_response(
        response.status,
        None,
        &[
            ("Content-Type", "application/json"),
            ("Access-Control-Allow-Origin", "*"),
        ],
    )?;
    resp.write_all(&bytes)?;
    Ok(())
}

fn start_http_server(
    snapshot: &Arc<Mutex<ApiSnapshot>>,
    commands: &Arc<Mutex<CommandSender>>,
) -> Result<EspHttpServer<'static>> {
    let mut server = EspHttpServer::new(&HttpServerConfig::default())?;
    let routes: [(&str, HttpMethod, Method); 8] = [
        ("/mq135", HttpMethod::Get, Method::Get),
        ("/mq2", HttpMethod::Get, Method::Get),
        ("/dht", HttpMethod::Get, Method::Get),
        ("/buzzer", HttpMethod::Get, Method::Get),
        ("/config", HttpMethod::Get, Method::Get),
        ("/calibrate", HttpMethod::Get, Method::Get),
        ("/buzzer", HttpMethod::Post, Method::Post),
        ("/config", HttpMethod::Post, Method::Post),
    ];
    for (path, http_method, method) in routes {
        let snapshot = Arc::clone(snapshot);
        let commands = Arc::clone(commands);
        server.fn_handler::<anyhow::Error, _>(path, http_method, move |req| {
            serve(req, method, &snapshot, &commands)
        })?;
    }
    info!("HTTP API listening on :80");
    Ok(server)
}

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  AirSense v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let nvs = NvsAdapter::new()?;
    let config = match nvs.load() {
        Ok(cfg) => {
            info!("Config loaded from NVS");
            cfg
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };
    info!(
        "Board {:?}: DHT {:?}, R0 MQ-135={} MQ-2={}",
        config.board.revision, config.board.dht, config.r0_mq135, config.r0_mq2
    );

    // Missing cloud credentials with upload enabled is the one fatal
    // configuration error.
    let provisioning = Provisioning::load(&nvs, config.cloud_enabled)?;

    // ── 3. Initialise hardware peripherals ────────────────────
    let board_pins = config.board.pins;
    if let Err(e) = hw_init::init_peripherals(&board_pins) {
        error!("HAL init failed: {}, halting", e);
        return Err(e.into());
    }

    // ── 4. Construct adapters ─────────────────────────────────
    let sensor_hub = SensorHub::new(
        GasSensor::new(
            SensorModel::Mq135,
            AdcInput::new(SensorModel::Mq135, board_pins.mq135_adc_gpio),
            config.adc,
            config.r0_mq135,
        ),
        GasSensor::new(
            SensorModel::Mq2,
            AdcInput::new(SensorModel::Mq2, board_pins.mq2_adc_gpio),
            config.adc,
            config.r0_mq2,
        ),
        EnvironmentSensor::new(config.board.dht, DhtLine::new(board_pins.dht_gpio, config.board.dht)),
        FreeRtos,
    );
    let mut hw = HardwareAdapter::new(sensor_hub, BuzzerDriver::new(board_pins.buzzer_gpio));

    // SAFETY: the pin numbers come from the board's PinMap and are not
    // claimed by any other driver.
    let (sda, scl) = unsafe {
        (
            AnyIOPin::new(board_pins.i2c_sda_gpio),
            AnyIOPin::new(board_pins.i2c_scl_gpio),
        )
    };
    let i2c_config = I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ));
    let i2c = I2cDriver::new(peripherals.i2c0, sda, scl, &i2c_config)?;
    let mut display = LcdDisplay::new(Lcd1602::new(i2c, Ets, pins::LCD_I2C_ADDR));

    let clock = Esp32Clock::new();
    let mut sink = LogEventSink::new();

    let mut wifi = WifiAdapter::new();
    wifi.attach(BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sysloop.clone(), Some(nvs_partition))?,
        sysloop,
    )?);
    if provisioning.has_wifi() {
        match wifi.set_credentials(&provisioning.ssid, &provisioning.password) {
            Ok(()) => {
                if let Err(e) = wifi.connect(clock.now_ms()) {
                    warn!("WiFi: initial connect failed ({}), retrying in background", e);
                }
            }
            Err(e) => warn!("WiFi: stored credentials rejected ({})", e),
        }
    } else {
        info!("WiFi: not provisioned, running offline");
    }
    let mut uplink = Uplink {
        wifi,
        cloud: FirebaseClient::new(
            &provisioning.cloud_url,
            &provisioning.auth_token,
            config.cloud_timeout_ms,
        ),
    };
    let sntp = EspSntp::new_default()?;
    let mut clock_synced = false;

    // ── 5. Construct app service ──────────────────────────────
    let mut app = AppService::new(config.clone());
    app.start(&mut hw, &mut sink);

    // ── 6. Local HTTP API ─────────────────────────────────────
    let snapshot = Arc::new(Mutex::new(ApiSnapshot::capture(None, None, app.config())));
    let (tx, mut rx) = events::command_channel();
    let tx = Arc::new(Mutex::new(tx));
    let _server = start_http_server(&snapshot, &tx)?;

    info!("System ready. Entering sampling loop.");

    // ── 7. Sampling loop ──────────────────────────────────────
    let mut timer = TickTimer::new(config.sample_interval_ms, clock.now_ms());

    loop {
        let now_ms = clock.now_ms();

        // The HTTP task is the only producer on the global queue; local
        // events are handled inline.
        let link_event = uplink.wifi.poll(now_ms);
        let sync_event = (!clock_synced && sntp.get_sync_status() == SyncStatus::Completed)
            .then(|| {
                clock_synced = true;
                Event::ClockSynced
            });

        let mut handle = |event: Event| match event {
            Event::CommandReceived => {
                while let Some(cmd) = rx.dequeue() {
                    app.handle_command(cmd, &mut hw, &mut sink);
                }
            }
            Event::NetworkUp => info!("Network up, cloud push enabled"),
            Event::NetworkDown => warn!("Network down, pushes skipped until reconnect"),
            Event::ClockSynced => info!("Wall clock synced: {:?}", clock.unix_secs()),
        };
        for event in [link_event, sync_event].into_iter().flatten() {
            handle(event);
        }
        events::drain_events(&mut handle);

        if timer.poll(now_ms) {
            uplink.cloud.set_timeout_ms(app.config().cloud_timeout_ms);
            app.run_cycle(&mut hw, &mut display, &mut uplink, &clock, &mut sink);
            *locked(&snapshot) = ApiSnapshot::capture(
                app.latest_frame(),
                hw.last_environment().as_ref(),
                app.config(),
            );
        }

        if timer.period_ms() != app.config().sample_interval_ms {
            timer.set_period(app.config().sample_interval_ms);
        }

        // Config auto-save (5 s debounce after last change).
        app.auto_save_if_needed(&nvs, now_ms, &mut sink);

        FreeRtos::delay_ms(LOOP_POLL_MS);
    }
}
