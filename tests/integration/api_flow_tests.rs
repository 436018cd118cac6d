//! HTTP API → command queue → AppService round trips.
//!
//! Requests are routed against a snapshot captured from the running
//! service, and the resulting commands are fed back exactly as the main
//! loop does.

use crate::mock_hw::Rig;

use airsense::app::api::{ApiSnapshot, Method, route};
use airsense::app::events::AppEvent;
use airsense::app::ports::SensorPort;
use airsense::config::SystemConfig;
use airsense::gas::SensorModel;
use serde_json::{Value, json};

fn snapshot(rig: &Rig) -> ApiSnapshot {
    let env = rig.hw.last_environment();
    ApiSnapshot::capture(rig.app.latest_frame(), env.as_ref(), rig.app.config())
}

/// Route one request and apply the commands it produced.
fn request(rig: &mut Rig, method: Method, path: &str, body: &Value) -> (u16, Value) {
    let body = serde_json::to_vec(body).unwrap();
    let snap = snapshot(rig);
    let resp = route(method, path, &body, &snap);
    for cmd in resp.commands {
        rig.command(cmd);
    }
    (resp.status, resp.body)
}

#[test]
fn readings_available_after_first_cycle() {
    let mut rig = Rig::new(SystemConfig::default());
    let (status, _) = request(&mut rig, Method::Get, "/mq135", &Value::Null);
    assert_eq!(status, 503);

    rig.cycle();

    let (status, body) = request(&mut rig, Method::Get, "/mq135", &Value::Null);
    assert_eq!(status, 200);
    assert_eq!(body["Raw"], 1000);
    assert_eq!(body["calibrated"], false);
    assert_eq!(body["score"], json!(rig.frame().score));

    let (_, dht) = request(&mut rig, Method::Get, "/dht", &Value::Null);
    assert_eq!(dht["temperature"], 22.5);
    assert_eq!(dht["humidity"], 41.0);
}

#[test]
fn dht_route_keeps_last_good_sample() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.cycle();
    rig.hw.fail_dht();
    rig.cycle();

    assert!(rig.frame().environment.is_err());
    let (_, dht) = request(&mut rig, Method::Get, "/dht", &Value::Null);
    assert_eq!(dht["temperature"], 22.5);
}

#[test]
fn post_buzzer_enables_alarm_output() {
    let mut rig = Rig::new(SystemConfig::default());
    let (status, _) = request(
        &mut rig,
        Method::Post,
        "/buzzer",
        &json!({ "state": "enable", "MQ135_BUZZ_VALUE": "1200" }),
    );
    assert_eq!(status, 202);
    assert!(rig.app.config().buzzer_enabled);
    assert!(rig.sink.events.contains(&AppEvent::ConfigChanged));

    let (_, view) = request(&mut rig, Method::Get, "/buzzer", &Value::Null);
    assert_eq!(view["status"], 1);
    assert_eq!(view["MQ135_BUZZ_VALUE"], 1200.0);
    assert_eq!(view["MQ2_BUZZ_VALUE"], 1100.0);

    rig.hw.set_raw(SensorModel::Mq135, 1300);
    rig.cycle();
    assert_eq!(rig.hw.buzzer_calls.last(), Some(&true));
}

#[test]
fn post_config_applies_every_field() {
    let mut rig = Rig::new(SystemConfig::default());
    let (status, _) = request(
        &mut rig,
        Method::Post,
        "/config",
        &json!({ "ENABLE_SERIAL_DEBUG": 1, "R0_MQ135": 3.5, "R0_MQ2": "12" }),
    );
    assert_eq!(status, 202);

    let cfg = rig.app.config();
    assert!(cfg.debug_logging);
    assert_eq!(cfg.r0_mq135, 3.5);
    assert_eq!(cfg.r0_mq2, 12.0);
    assert_eq!(rig.hw.baseline(SensorModel::Mq2).r0(), Ok(12.0));

    let (_, view) = request(&mut rig, Method::Get, "/config", &Value::Null);
    assert_eq!(view["ENABLE_SERIAL_DEBUG"], 1);
    assert_eq!(view["R0_MQ135"], 3.5);
}

#[test]
fn out_of_range_r0_is_rejected_by_service() {
    let mut rig = Rig::new(SystemConfig::default());
    let (status, _) = request(&mut rig, Method::Post, "/config", &json!({ "R0_MQ2": -1 }));

    // Parsing accepts it; validation in the service refuses it.
    assert_eq!(status, 202);
    assert_eq!(rig.app.config().r0_mq2, 8.5);
    assert!(matches!(
        rig.sink.events.last(),
        Some(AppEvent::CommandRejected(_))
    ));
    assert!(!rig.app.is_config_dirty());
}

#[test]
fn malformed_bodies_are_refused_without_commands() {
    let mut rig = Rig::new(SystemConfig::default());
    let before = rig.app.current_config();

    let (status, _) = request(&mut rig, Method::Post, "/buzzer", &json!({ "state": "maybe" }));
    assert_eq!(status, 400);
    let (status, _) = request(&mut rig, Method::Post, "/config", &json!({}));
    assert_eq!(status, 400);
    let (status, _) = request(&mut rig, Method::Post, "/config", &json!([1, 2]));
    assert_eq!(status, 400);

    assert_eq!(rig.app.current_config(), before);
}

#[test]
fn calibrate_route_runs_calibration() {
    let mut rig = Rig::new(SystemConfig::default());
    let (status, body) = request(&mut rig, Method::Get, "/calibrate", &Value::Null);
    assert_eq!(status, 202);
    assert_eq!(body["status"], "queued");
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::CalibrationSucceeded { .. })),
        2
    );

    rig.cycle();
    let (_, mq2) = request(&mut rig, Method::Get, "/mq2", &Value::Null);
    assert_eq!(mq2["calibrated"], true);
}

#[test]
fn unknown_routes_and_methods() {
    let mut rig = Rig::new(SystemConfig::default());
    let (status, _) = request(&mut rig, Method::Get, "/nope", &Value::Null);
    assert_eq!(status, 404);
    let (status, _) = request(&mut rig, Method::Post, "/dht", &Value::Null);
    assert_eq!(status, 405);
}
