//! Sampling cycle: sensors → alarms → buzzer / display / cloud.

use crate::mock_hw::{BOOT_UNIX_SECS, Rig};

use airsense::alarm::AlarmSource;
use airsense::app::events::AppEvent;
use airsense::config::SystemConfig;
use airsense::error::TransportError;
use airsense::fsm::StateId;
use airsense::gas::{GasKind, SensorModel};
use serde_json::Value;

fn buzzer_config() -> SystemConfig {
    SystemConfig {
        buzzer_enabled: true,
        ..SystemConfig::default()
    }
}

#[test]
fn cycle_returns_to_idle_and_renders() {
    let mut rig = Rig::new(SystemConfig::default());
    assert_eq!(rig.app.state(), StateId::Idle);

    rig.cycle();

    assert_eq!(rig.app.state(), StateId::Idle);
    assert_eq!(rig.app.cycle_count(), 1);
    assert_eq!(rig.display.frames.len(), 1);
    assert_eq!(rig.frame().cycle, 1);
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::CycleCompleted(_))),
        1
    );
}

#[test]
fn buzzer_mirrors_raw_threshold() {
    let mut rig = Rig::new(buzzer_config());
    let mut seen = Vec::new();

    for raw in [1499, 1501, 1499] {
        rig.hw.set_raw(SensorModel::Mq135, raw);
        rig.cycle();
        seen.push(*rig.hw.buzzer_calls.last().unwrap());
    }

    assert_eq!(seen, [false, true, false]);
    let src = AlarmSource::Raw(SensorModel::Mq135);
    assert!(rig.sink.events.contains(&AppEvent::AlarmRaised {
        source: src,
        value: 1501.0
    }));
    assert!(rig
        .sink
        .events
        .contains(&AppEvent::AlarmCleared { source: src }));
}

#[test]
fn limit_equal_to_reading_does_not_alarm() {
    let mut rig = Rig::new(buzzer_config());
    rig.hw.set_raw(SensorModel::Mq135, 1500);
    rig.cycle();
    assert_eq!(rig.hw.buzzer_calls, [false]);
}

#[test]
fn disabled_buzzer_stays_silent_but_alarm_is_reported() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.hw.set_raw(SensorModel::Mq2, 4000);
    rig.cycle();

    assert_eq!(rig.hw.buzzer_calls, [false]);
    assert!(rig.frame().any_alarm());
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::AlarmRaised { .. })),
        1
    );
}

#[test]
fn one_push_per_cadence() {
    let mut rig = Rig::new(SystemConfig::default());
    assert_eq!(rig.app.push_every_cycles(), 25);

    rig.cycles(24);
    assert!(rig.uplink.pushes.is_empty());

    rig.cycle();
    assert_eq!(rig.uplink.pushes.len(), 1);

    rig.cycles(50);
    assert_eq!(rig.uplink.pushes.len(), 3);
    assert_eq!(rig.app.push_count(), 3);
}

#[test]
fn configured_cadence_is_rounded_up() {
    let cfg = SystemConfig {
        sample_interval_ms: 1000,
        cloud_push_interval_ms: 2500,
        ..SystemConfig::default()
    };
    let mut rig = Rig::new(cfg);
    assert_eq!(rig.app.push_every_cycles(), 3);

    rig.cycles(9);
    assert_eq!(rig.uplink.pushes.len(), 3);
}

#[test]
fn record_is_keyed_by_unix_seconds() {
    let cfg = SystemConfig {
        cloud_push_interval_ms: 1200,
        ..SystemConfig::default()
    };
    let mut rig = Rig::new(cfg);
    rig.cycle();

    let (key, record) = &rig.uplink.pushes[0];
    assert_eq!(key, &BOOT_UNIX_SECS.to_string());
    assert_eq!(record["mq135"]["Raw"], 1000);
    assert_eq!(record["mq2"]["Raw"], 800);
    assert!(record["mq135"]["CO2"].is_number());
    assert!(record["mq2"]["LPG"].is_number());
    assert_eq!(record["dht"]["temperature"], 22.5);
    assert_eq!(record["dht"]["humidity"], 41.0);
    assert!(rig
        .sink
        .events
        .contains(&AppEvent::PushSucceeded { key: BOOT_UNIX_SECS }));
}

#[test]
fn dht_failure_still_publishes_gas_values() {
    let cfg = SystemConfig {
        cloud_push_interval_ms: 1200,
        ..SystemConfig::default()
    };
    let mut rig = Rig::new(cfg);
    rig.hw.fail_dht();
    rig.cycle();

    assert!(rig.frame().environment.is_err());
    let (_, record) = &rig.uplink.pushes[0];
    assert_eq!(record["dht"]["temperature"], Value::Null);
    assert_eq!(record["dht"]["humidity"], Value::Null);
    assert_eq!(record["mq135"]["Raw"], 1000);
    assert!(record["mq135"]["CO"].is_number());
}

#[test]
fn adc_failure_reports_null_channels() {
    let cfg = SystemConfig {
        cloud_push_interval_ms: 1200,
        ..SystemConfig::default()
    };
    let mut rig = Rig::new(cfg);
    rig.hw.fail_adc(SensorModel::Mq2);
    rig.cycle();

    let frame = rig.frame();
    assert!(frame.mq2.raw.is_err());
    assert!(frame.mq2.value(GasKind::Lpg).is_none());
    assert!(frame.mq135.value(GasKind::Co2).is_some());

    let (_, record) = &rig.uplink.pushes[0];
    assert_eq!(record["mq2"]["Raw"], Value::Null);
    assert_eq!(record["mq2"]["LPG"], Value::Null);
}

#[test]
fn push_failure_does_not_stop_sampling_or_retry() {
    let cfg = SystemConfig {
        sample_interval_ms: 1000,
        cloud_push_interval_ms: 3000,
        ..SystemConfig::default()
    };
    let mut rig = Rig::new(cfg);
    rig.uplink.result = Err(TransportError::HttpStatus(500));

    rig.cycles(3);
    assert_eq!(rig.uplink.pushes.len(), 1);
    assert!(rig
        .sink
        .events
        .contains(&AppEvent::PushFailed(TransportError::HttpStatus(500))));

    // Next two cycles make no request; the third is the next scheduled push.
    rig.cycles(2);
    assert_eq!(rig.uplink.pushes.len(), 1);
    rig.uplink.result = Ok(());
    rig.cycle();
    assert_eq!(rig.uplink.pushes.len(), 2);
    assert_eq!(rig.app.cycle_count(), 6);
    assert_eq!(rig.display.frames.len(), 6);
    assert_eq!(rig.app.push_count(), 1);
}

#[test]
fn offline_push_is_skipped() {
    let cfg = SystemConfig {
        cloud_push_interval_ms: 1200,
        ..SystemConfig::default()
    };
    let mut rig = Rig::new(cfg);
    rig.uplink.online = false;
    rig.cycle();

    assert!(rig.uplink.pushes.is_empty());
    assert!(rig
        .sink
        .events
        .contains(&AppEvent::PushSkipped(TransportError::Offline)));
}

#[test]
fn unsynced_clock_push_is_skipped() {
    let cfg = SystemConfig {
        cloud_push_interval_ms: 1200,
        ..SystemConfig::default()
    };
    let mut rig = Rig::new(cfg);
    rig.clock.unix.set(None);
    rig.cycle();

    assert!(rig.uplink.pushes.is_empty());
    assert!(rig
        .sink
        .events
        .contains(&AppEvent::PushSkipped(TransportError::ClockNotSynced)));
}

#[test]
fn cloud_disabled_makes_no_request() {
    let cfg = SystemConfig {
        cloud_enabled: false,
        cloud_push_interval_ms: 1200,
        ..SystemConfig::default()
    };
    let mut rig = Rig::new(cfg);
    rig.cycles(3);

    assert!(rig.uplink.pushes.is_empty());
    assert_eq!(
        rig.sink.count(|e| matches!(
            e,
            AppEvent::PushSkipped(_) | AppEvent::PushFailed(_) | AppEvent::PushSucceeded { .. }
        )),
        0
    );
}

#[test]
fn started_event_reports_cadence() {
    let rig = Rig::new(SystemConfig::default());
    assert_eq!(
        rig.sink.events.first(),
        Some(&AppEvent::Started {
            push_every_cycles: 25
        })
    );
}
