//! Local JSON API consumed by the dashboard.
//!
//! Pure request routing: the HTTP server adapter hands in method, path and
//! body, gets back a status, a JSON body and the commands to forward to
//! the main loop. Reads are answered from an [`ApiSnapshot`] the main loop
//! refreshes after every cycle, so no request ever touches a sensor.
//!
//! | Route            | Method | Answer / effect                                   |
//! |------------------|--------|---------------------------------------------------|
//! | `/mq135`, `/mq2` | GET    | channel map + `Raw`, `calibrated`, `score`        |
//! | `/dht`           | GET    | last good `temperature`, `humidity`               |
//! | `/buzzer`        | GET    | `status`, `MQ135_BUZZ_VALUE`, `MQ2_BUZZ_VALUE`    |
//! | `/buzzer`        | POST   | `SetBuzzer`                                       |
//! | `/config`        | GET    | `ENABLE_SERIAL_DEBUG`, `R0_MQ135`, `R0_MQ2`       |
//! | `/config`        | POST   | `SetDebugLogging`, `SetR0` ×2                     |
//! | `/calibrate`     | GET    | `Calibrate(None)`                                 |

use heapless::Vec;
use serde_json::{Map, Value, json};

use crate::alarm::AlarmSource;
use crate::config::SystemConfig;
use crate::gas::SensorModel;
use crate::sensors::environment::EnvironmentSample;
use crate::telemetry::{self, SampleFrame};

use super::commands::AppCommand;

/// Most commands a single request can produce.
pub const MAX_COMMANDS_PER_REQUEST: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Result of routing one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
    /// To be queued for the main loop, in order.
    pub commands: Vec<AppCommand, MAX_COMMANDS_PER_REQUEST>,
}

impl ApiResponse {
    fn ok(body: Value) -> Self {
        Self {
            status: 200,
            body,
            commands: Vec::new(),
        }
    }

    fn accepted(commands: Vec<AppCommand, MAX_COMMANDS_PER_REQUEST>) -> Self {
        Self {
            status: 202,
            body: json!({ "status": "queued" }),
            commands,
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            body: json!({ "error": message }),
            commands: Vec::new(),
        }
    }

    /// Answer for a request whose commands could not be queued.
    pub fn busy() -> Self {
        Self::error(503, "device busy, retry")
    }
}

/// Read-side state served by the API, refreshed once per cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiSnapshot {
    /// `null` until the first cycle completes.
    pub mq135: Value,
    pub mq2: Value,
    pub dht: Value,
    pub buzzer: Value,
    pub config: Value,
}

impl ApiSnapshot {
    pub fn capture(
        frame: Option<&SampleFrame>,
        last_environment: Option<&EnvironmentSample>,
        config: &SystemConfig,
    ) -> Self {
        Self {
            mq135: frame.map_or(Value::Null, |f| gas_view(f, SensorModel::Mq135)),
            mq2: frame.map_or(Value::Null, |f| gas_view(f, SensorModel::Mq2)),
            dht: telemetry::environment_json(last_environment),
            buzzer: buzzer_view(config),
            config: config_view(config),
        }
    }
}

fn gas_view(frame: &SampleFrame, sensor: SensorModel) -> Value {
    let mut view = telemetry::gas_json(frame.gas(sensor));
    if let Value::Object(obj) = &mut view {
        obj.insert("score".into(), json!(frame.score));
    }
    view
}

fn buzzer_view(config: &SystemConfig) -> Value {
    let limit = |sensor| {
        config
            .alarm_thresholds
            .iter()
            .find(|t| t.source == AlarmSource::Raw(sensor))
            .map_or(Value::Null, |t| json!(t.limit))
    };
    json!({
        "status": u8::from(config.buzzer_enabled),
        "MQ135_BUZZ_VALUE": limit(SensorModel::Mq135),
        "MQ2_BUZZ_VALUE": limit(SensorModel::Mq2),
    })
}

fn config_view(config: &SystemConfig) -> Value {
    json!({
        "ENABLE_SERIAL_DEBUG": u8::from(config.debug_logging),
        "R0_MQ135": config.r0_mq135,
        "R0_MQ2": config.r0_mq2,
    })
}

/// Route one request.
pub fn route(method: Method, path: &str, body: &[u8], snapshot: &ApiSnapshot) -> ApiResponse {
    let path = path.split('?').next().unwrap_or(path);
    match (method, path) {
        (Method::Get, "/mq135") => read(&snapshot.mq135),
        (Method::Get, "/mq2") => read(&snapshot.mq2),
        (Method::Get, "/dht") => ApiResponse::ok(snapshot.dht.clone()),
        (Method::Get, "/buzzer") => ApiResponse::ok(snapshot.buzzer.clone()),
        (Method::Get, "/config") => ApiResponse::ok(snapshot.config.clone()),
        (Method::Get, "/calibrate") => {
            let mut cmds = Vec::new();
            let _ = cmds.push(AppCommand::Calibrate(None));
            ApiResponse::accepted(cmds)
        }
        (Method::Post, "/buzzer") => match parse_body(body).and_then(|b| parse_buzzer(&b)) {
            Ok(cmd) => {
                let mut cmds = Vec::new();
                let _ = cmds.push(cmd);
                ApiResponse::accepted(cmds)
            }
            Err(msg) => ApiResponse::error(400, msg),
        },
        (Method::Post, "/config") => match parse_body(body).and_then(|b| parse_config(&b)) {
            Ok(cmds) => ApiResponse::accepted(cmds),
            Err(msg) => ApiResponse::error(400, msg),
        },
        (_, "/mq135" | "/mq2" | "/dht" | "/calibrate") => {
            ApiResponse::error(405, "method not allowed")
        }
        _ => ApiResponse::error(404, "not found"),
    }
}

fn read(view: &Value) -> ApiResponse {
    if view.is_null() {
        ApiResponse::error(503, "no sample yet")
    } else {
        ApiResponse::ok(view.clone())
    }
}

fn parse_body(body: &[u8]) -> Result<Map<String, Value>, &'static str> {
    match serde_json::from_slice(body) {
        Ok(Value::Object(obj)) => Ok(obj),
        Ok(_) => Err("body must be a JSON object"),
        Err(_) => Err("body is not valid JSON"),
    }
}

/// `true`/`false`, `1`/`0`, or the strings the dashboard form posts.
fn flag(v: &Value) -> Option<bool> {
    match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|n| n != 0.0),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "enable" | "enabled" | "on" | "true" | "1" => Some(true),
            "disable" | "disabled" | "off" | "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// JSON number or numeric string.
fn number(v: &Value) -> Option<f32> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }? as f32;
    n.is_finite().then_some(n)
}

/// Optional numeric field: absent is `Ok(None)`, present but malformed is
/// an error.
fn optional_number(
    body: &Map<String, Value>,
    key: &str,
    err: &'static str,
) -> Result<Option<f32>, &'static str> {
    body.get(key).map(|v| number(v).ok_or(err)).transpose()
}

fn parse_buzzer(body: &Map<String, Value>) -> Result<AppCommand, &'static str> {
    let enabled = body
        .get("state")
        .and_then(flag)
        .ok_or("state must be enable/disable")?;
    Ok(AppCommand::SetBuzzer {
        enabled,
        mq135_limit: optional_number(body, "MQ135_BUZZ_VALUE", "MQ135_BUZZ_VALUE must be a number")?,
        mq2_limit: optional_number(body, "MQ2_BUZZ_VALUE", "MQ2_BUZZ_VALUE must be a number")?,
    })
}

fn parse_config(
    body: &Map<String, Value>,
) -> Result<Vec<AppCommand, MAX_COMMANDS_PER_REQUEST>, &'static str> {
    let mut cmds = Vec::new();
    if let Some(v) = body.get("ENABLE_SERIAL_DEBUG") {
        let enabled = flag(v).ok_or("ENABLE_SERIAL_DEBUG must be enable/disable")?;
        let _ = cmds.push(AppCommand::SetDebugLogging(enabled));
    }
    if let Some(r0) = optional_number(body, "R0_MQ135", "R0_MQ135 must be a number")? {
        let _ = cmds.push(AppCommand::SetR0(SensorModel::Mq135, r0));
    }
    if let Some(r0) = optional_number(body, "R0_MQ2", "R0_MQ2 must be a number")? {
        let _ = cmds.push(AppCommand::SetR0(SensorModel::Mq2, r0));
    }
    if cmds.is_empty() {
        return Err("no recognised fields");
    }
    Ok(cmds)
}
