//! Config dirty-tracking, debounced auto-save and credential provisioning.

use crate::mock_hw::{MockNvs, Rig};

use airsense::adapters::nvs::NvsAdapter;
use airsense::adapters::wifi::Provisioning;
use airsense::app::commands::AppCommand;
use airsense::app::events::AppEvent;
use airsense::app::ports::{ConfigError, ConfigPort};
use airsense::app::service::AUTO_SAVE_DELAY_MS;
use airsense::config::{BoardProfile, SystemConfig};
use airsense::gas::SensorModel;

#[test]
fn auto_save_waits_for_quiet_period() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.command(AppCommand::SetR0(SensorModel::Mq135, 4.0));
    assert!(rig.app.is_config_dirty());

    // First check arms the debounce.
    assert!(!rig.auto_save());
    rig.clock.advance(AUTO_SAVE_DELAY_MS - 1);
    assert!(!rig.auto_save());
    assert_eq!(rig.nvs.save_count(), 0);

    rig.clock.advance(1);
    assert!(rig.auto_save());
    assert!(!rig.app.is_config_dirty());
    assert_eq!(rig.nvs.load().unwrap().r0_mq135, 4.0);
    assert!(rig.sink.events.contains(&AppEvent::ConfigSaved));
}

#[test]
fn save_command_flushes_on_next_check() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.command(AppCommand::SetDebugLogging(true));
    rig.command(AppCommand::SaveConfig);

    assert!(rig.auto_save());
    assert_eq!(rig.nvs.save_count(), 1);
    assert!(rig.nvs.load().unwrap().debug_logging);
}

#[test]
fn clean_config_is_never_written() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.cycles(3);
    rig.clock.advance(AUTO_SAVE_DELAY_MS * 2);
    assert!(!rig.auto_save());
    assert_eq!(rig.nvs.save_count(), 0);
}

#[test]
fn unchanged_update_does_not_dirty() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.command(AppCommand::UpdateConfig(SystemConfig::default()));
    assert!(!rig.app.is_config_dirty());
    assert!(!rig.sink.events.contains(&AppEvent::ConfigChanged));
}

#[test]
fn cadence_follows_config_update() {
    let mut rig = Rig::new(SystemConfig::default());
    let cfg = SystemConfig {
        cloud_push_interval_ms: 2400,
        ..rig.app.current_config()
    };
    rig.command(AppCommand::UpdateConfig(cfg));
    assert_eq!(rig.app.push_every_cycles(), 2);

    rig.cycles(4);
    assert_eq!(rig.uplink.pushes.len(), 2);
}

#[test]
fn force_save_before_restart() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.command(AppCommand::SetR0(SensorModel::Mq2, 20.0));
    rig.app.force_save_if_dirty(&rig.nvs, &mut rig.sink);
    assert_eq!(rig.nvs.save_count(), 1);
    assert!(!rig.app.is_config_dirty());
}

#[test]
fn nvs_config_survives_reboot() {
    let nvs = NvsAdapter::new().unwrap();
    let mut rig = Rig::new(nvs.load().unwrap());
    rig.command(AppCommand::SetBuzzer {
        enabled: true,
        mq135_limit: Some(1800.0),
        mq2_limit: None,
    });
    rig.command(AppCommand::SaveConfig);
    rig.app.auto_save_if_needed(&nvs, 0, &mut rig.sink);

    let reloaded = nvs.load().unwrap();
    assert!(reloaded.buzzer_enabled);
    assert_eq!(reloaded, rig.app.current_config());

    let rebooted = Rig::new(reloaded);
    assert!(rebooted.app.config().buzzer_enabled);
}

#[test]
fn board_presets_share_alarm_defaults() {
    let a = SystemConfig::for_board(BoardProfile::rev_a());
    let b = SystemConfig::for_board(BoardProfile::rev_b());
    assert_eq!(a.r0_mq2, 8.5);
    assert_eq!(b.r0_mq2, 60.0);
    assert_eq!(a.r0_mq135, b.r0_mq135);
    assert_eq!(a.alarm_thresholds, b.alarm_thresholds);
}

#[test]
fn provisioning_requires_cloud_credentials_when_enabled() {
    let mut nvs = MockNvs::new();
    assert_eq!(
        Provisioning::load(&nvs, true),
        Err(ConfigError::MissingCredentials("wifi_ssid"))
    );

    let creds = Provisioning {
        ssid: "lab".try_into().unwrap(),
        password: heapless::String::new(),
        cloud_url: "https://db.example.io".try_into().unwrap(),
        auth_token: "tok".try_into().unwrap(),
    };
    creds.store(&mut nvs).unwrap();

    // An open network has no password; that is not an error.
    let loaded = Provisioning::load(&nvs, true).unwrap();
    assert_eq!(loaded, creds);
    assert!(loaded.has_wifi());
}

#[test]
fn provisioning_optional_when_cloud_disabled() {
    let nvs = MockNvs::new();
    let loaded = Provisioning::load(&nvs, false).unwrap();
    assert!(!loaded.has_wifi());
    assert!(loaded.cloud_url.is_empty());
}
