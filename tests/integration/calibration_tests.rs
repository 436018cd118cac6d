//! Clean-air calibration through the service, and the full
//! raw → concentration chain on calibrated sensors.

use crate::mock_hw::Rig;

use airsense::app::commands::AppCommand;
use airsense::app::events::AppEvent;
use airsense::config::SystemConfig;
use airsense::error::{CalibrationError, DriverError, ReadingError};
use airsense::gas::{self, AdcModel, GasChannel, GasKind, SensorModel};
use airsense::sensors::Baseline;

fn approx(a: f32, b: f32, tol: f32) -> bool {
    (a - b).abs() <= tol
}

#[test]
fn raw_2048_with_r0_10_reads_about_100_ppm() {
    let channel = GasChannel::new(GasKind::Co2, -0.5, 1.0);
    let ppm = gas::concentration(&channel, &AdcModel::default(), 2048, 10.0).unwrap();
    assert!(approx(ppm, 100.0977, 0.01), "got {ppm}");
}

#[test]
fn frame_matches_formula_chain() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.command(AppCommand::SetR0(SensorModel::Mq135, 10.0));
    rig.hw.set_raw(SensorModel::Mq135, 2048);
    rig.cycle();

    let adc = AdcModel::default();
    for ch in SensorModel::Mq135.channels() {
        let expected = gas::concentration(ch, &adc, 2048, 10.0).unwrap();
        let got = rig.frame().mq135.value(ch.gas).unwrap();
        assert!(approx(got, expected, expected * 1e-4), "{}: {got} vs {expected}", ch.name());
    }
}

#[test]
fn calibration_installs_mean_over_clean_air_ratio() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.hw.set_raw(SensorModel::Mq135, 2048);
    let reads_before = rig.hw.mq135_reads.get();

    rig.command(AppCommand::Calibrate(Some(SensorModel::Mq135)));

    assert_eq!(rig.hw.mq135_reads.get() - reads_before, 10);
    let rs = AdcModel::default().resistance(2048).unwrap();
    let expected = rs / SensorModel::Mq135.clean_air_ratio();

    let r0 = match rig.sink.events.last() {
        Some(AppEvent::CalibrationSucceeded { sensor, r0 }) => {
            assert_eq!(*sensor, SensorModel::Mq135);
            *r0
        }
        other => panic!("unexpected event {other:?}"),
    };
    assert!(approx(r0, expected, 1e-5));
    assert_eq!(rig.app.config().r0_mq135, r0);
    assert!(rig.app.is_config_dirty());

    rig.cycle();
    assert!(rig.frame().mq135.calibrated);
    assert!(!rig.frame().mq2.calibrated);
    // Calibrated in the air it is now sampling: ratio is the clean-air ratio.
    let ratio = rig.frame().mq135.ratio.unwrap();
    assert!(approx(ratio, SensorModel::Mq135.clean_air_ratio(), 1e-4));
}

#[test]
fn calibrate_all_covers_both_sensors() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.command(AppCommand::Calibrate(None));

    let sensors: Vec<_> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::CalibrationSucceeded { sensor, .. } => Some(*sensor),
            _ => None,
        })
        .collect();
    assert_eq!(sensors, [SensorModel::Mq135, SensorModel::Mq2]);
}

#[test]
fn boot_calibration_runs_when_enabled() {
    let cfg = SystemConfig {
        calibrate_on_boot: true,
        ..SystemConfig::default()
    };
    let rig = Rig::new(cfg);
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::CalibrationSucceeded { .. })),
        2
    );
    assert!(rig.hw_baseline_is_calibrated(SensorModel::Mq2));
}

#[test]
fn failed_calibration_keeps_factory_r0() {
    let mut rig = Rig::new(SystemConfig::default());
    rig.hw.fail_adc(SensorModel::Mq135);

    rig.command(AppCommand::Calibrate(Some(SensorModel::Mq135)));

    assert_eq!(
        rig.sink.events.last(),
        Some(&AppEvent::CalibrationFailed {
            sensor: SensorModel::Mq135,
            error: CalibrationError::Driver(DriverError::AdcReadFailed),
            kept_r0: Some(2.0),
        })
    );
    assert_eq!(
        rig.hw_baseline(SensorModel::Mq135),
        Baseline::FactoryDefault(2.0)
    );
    assert!(!rig.app.is_config_dirty());

    // Sampling continues with the factory baseline once the ADC recovers.
    rig.hw.set_raw(SensorModel::Mq135, 1000);
    rig.cycle();
    assert!(rig.frame().mq135.value(GasKind::Co2).is_some());
    assert!(!rig.frame().mq135.calibrated);
}

#[test]
fn open_circuit_calibration_keeps_config_valid() {
    let mut rig = Rig::new(SystemConfig::default());
    // A barely-warmed MQ-135 reads near zero: R0 would be ~2272 kΩ.
    rig.hw.set_raw(SensorModel::Mq135, 5);

    rig.command(AppCommand::Calibrate(Some(SensorModel::Mq135)));

    assert_eq!(
        rig.sink.events.last(),
        Some(&AppEvent::CalibrationFailed {
            sensor: SensorModel::Mq135,
            error: CalibrationError::InvalidSample(ReadingError::InvalidRatio),
            kept_r0: Some(2.0),
        })
    );
    assert_eq!(rig.app.config().r0_mq135, 2.0);
    assert_eq!(rig.app.config().validate(), Ok(()));

    // Later config commands still apply.
    rig.command(AppCommand::SetBuzzer {
        enabled: true,
        mq135_limit: None,
        mq2_limit: None,
    });
    assert!(rig.app.config().buzzer_enabled);
}

#[test]
fn strict_calibration_failure_invalidates_sensor() {
    let cfg = SystemConfig {
        strict_calibration: true,
        ..SystemConfig::default()
    };
    let mut rig = Rig::new(cfg);
    rig.hw.fail_adc(SensorModel::Mq2);

    rig.command(AppCommand::Calibrate(Some(SensorModel::Mq2)));

    assert!(matches!(
        rig.sink.events.last(),
        Some(AppEvent::CalibrationFailed { kept_r0: None, .. })
    ));
    assert_eq!(rig.hw_baseline(SensorModel::Mq2), Baseline::Invalid);

    rig.hw.set_raw(SensorModel::Mq2, 800);
    rig.cycle();
    let mq2 = &rig.frame().mq2;
    assert_eq!(mq2.raw, Ok(800));
    assert_eq!(mq2.ratio, Err(ReadingError::Uncalibrated));
    assert!(mq2.channels.iter().all(|c| c.ok().is_none()));
    // The other sensor is unaffected.
    assert!(rig.frame().mq135.value(GasKind::Co2).is_some());
}

#[test]
fn manual_r0_replaces_invalid_baseline() {
    let cfg = SystemConfig {
        strict_calibration: true,
        ..SystemConfig::default()
    };
    let mut rig = Rig::new(cfg);
    rig.hw.fail_adc(SensorModel::Mq2);
    rig.command(AppCommand::Calibrate(Some(SensorModel::Mq2)));
    assert_eq!(rig.hw_baseline(SensorModel::Mq2), Baseline::Invalid);

    rig.command(AppCommand::SetR0(SensorModel::Mq2, 42.0));
    assert_eq!(
        rig.hw_baseline(SensorModel::Mq2),
        Baseline::FactoryDefault(42.0)
    );
}

impl Rig {
    fn hw_baseline(&self, sensor: SensorModel) -> Baseline {
        airsense::app::ports::SensorPort::baseline(&self.hw, sensor)
    }

    fn hw_baseline_is_calibrated(&self, sensor: SensorModel) -> bool {
        self.hw_baseline(sensor).is_calibrated()
    }
}
