use encoder_config::{ConfigStore, JointId, load_toml};
use encoder_core::mocks::ScriptedBus;
use encoder_core::{
    EncoderError, EncoderParams, HealthPhase, JointSensorSetup, NoRail, RotaryEncoder,
    ConflictResolver,
};
use encoder_traits::ManualClock;
use rstest::rstest;
use std::time::Duration;

fn joint_store(null: f32, clockwise: bool) -> (ConfigStore, JointId) {
    let toml = format!(
        "[[joints]]\nname = \"hip\"\ni2c_address = 0x40\nclockwise = {clockwise}\nnull_angle_deg = {null:?}\n"
    );
    let store = ConfigStore::new(load_toml(&toml).expect("parse"));
    let id = store.find("hip").expect("hip");
    (store, id)
}

fn encoder(store: &ConfigStore, id: JointId, bus: ScriptedBus) -> RotaryEncoder<ScriptedBus> {
    RotaryEncoder::builder()
        .with_bus(bus)
        .for_joint(store, id)
        .with_params(EncoderParams {
            variance_samples: 5,
            variance_threshold_deg2: 0.1,
            ..EncoderParams::default()
        })
        .with_clock(ManualClock::new())
        .build()
        .expect("build")
}

fn no_rail() -> ConflictResolver<NoRail> {
    ConflictResolver::new(NoRail, Duration::ZERO)
}

#[rstest]
#[case(true, 5.0)]
#[case(false, -5.0)]
fn null_ten_raw_fifteen(#[case] clockwise: bool, #[case] expected: f32) {
    let (store, id) = joint_store(10.0, clockwise);
    let mut enc = encoder(&store, id, ScriptedBus::new(0x40).then_angles(&[15.0]));
    assert!(enc.get_new_angle_from_sensor());
    assert_eq!(enc.raw_sensor_angle(), 15.0);
    assert!((enc.angle(&store) - expected).abs() < 1e-5);
}

#[test]
fn setup_probes_but_does_not_qualify() {
    let (store, id) = joint_store(0.0, true);
    let mut enc = encoder(&store, id, ScriptedBus::new(0x40).with_fallback(1.0));
    assert!(enc.setup(&mut no_rail()));
    assert!(enc.health().communication_works());
    assert!(!enc.health().passed_variance_check());
    assert_eq!(enc.health().phase(), HealthPhase::Calibrating);
    assert!(!enc.is_ok());
}

#[test]
fn setup_reports_missing_sensor() {
    let (store, id) = joint_store(0.0, true);
    let mut enc = encoder(&store, id, ScriptedBus::empty());
    assert!(!enc.setup(&mut no_rail()));
    assert!(!enc.health().communication_works());
}

#[test]
fn five_equal_samples_qualify() {
    let (store, id) = joint_store(0.0, true);
    let mut enc = encoder(&store, id, ScriptedBus::new(0x40).then_angles(&[30.0; 5]));
    enc.setup(&mut no_rail());
    let variance = enc.check_encoder_variance().expect("variance");
    assert_eq!(variance, 0.0);
    assert!(enc.health().passed_variance_check());
    assert!(enc.is_ok());
    assert_eq!(enc.last_variance(), Some(0.0));
}

#[test]
fn noisy_sensor_is_disqualified_until_rechecked() {
    let (store, id) = joint_store(0.0, true);
    let bus = ScriptedBus::new(0x40)
        .then_angles(&[10.0, 11.0, 9.0, 10.5, 9.5])
        .then_angles(&[10.0; 5])
        .with_fallback(10.0);
    let mut enc = encoder(&store, id, bus);
    enc.setup(&mut no_rail());
    let v = enc.check_encoder_variance().expect("variance");
    assert!(v >= 0.1);
    assert!(!enc.is_ok());

    // Good reads heal communication but not the qualification.
    assert!(enc.get_new_angle_from_sensor());
    assert!(!enc.is_ok());
    assert_eq!(enc.health().phase(), HealthPhase::Disqualified);

    enc.check_encoder_variance().expect("recheck");
    assert!(enc.is_ok());
}

#[test]
fn samples_across_the_seam_are_not_noise() {
    let (store, id) = joint_store(0.0, true);
    let bus = ScriptedBus::new(0x40).then_angles(&[359.9, 0.1, 359.9, 0.1, 0.0]);
    let mut enc = encoder(&store, id, bus);
    let stats = enc.fetch_sample().expect("stats");
    assert!(stats.variance < 0.02, "variance {}", stats.variance);
    assert!(stats.mean < 0.1 || stats.mean > 359.9);
}

#[rstest]
#[case(true, 5.0)]
#[case(false, -5.0)]
fn calibrated_burst_uses_null_and_direction(#[case] clockwise: bool, #[case] expected: f32) {
    let (store, id) = joint_store(10.0, clockwise);
    let bus = ScriptedBus::new(0x40).then_angles(&[14.0, 16.0, 15.0, 15.0, 15.0]);
    let mut enc = encoder(&store, id, bus);
    let stats = enc.fetch_calibrated_sample(&store).expect("stats");
    assert!((stats.mean - expected).abs() < 1e-4, "mean {}", stats.mean);
    assert!((stats.variance - 0.4).abs() < 1e-4, "variance {}", stats.variance);
    assert_eq!(stats.count, 5);
    // Sampling alone does not qualify the sensor.
    assert!(!enc.health().passed_variance_check());
}

#[test]
fn read_failure_inside_burst_disqualifies() {
    let (store, id) = joint_store(0.0, true);
    let bus = ScriptedBus::new(0x40)
        .then_angles(&[1.0, 1.0])
        .then_failures(1)
        .with_fallback(1.0);
    let mut enc = encoder(&store, id, bus);
    enc.setup(&mut no_rail());
    let err = enc.check_encoder_variance().expect_err("burst read fails");
    assert!(matches!(
        err.downcast_ref::<EncoderError>(),
        Some(EncoderError::Communication(_))
    ));
    assert!(!enc.health().passed_variance_check());
    // Burst reads leave the periodic failure counter alone.
    assert_eq!(enc.health().consecutive_failed_reads(), 0);
}

#[test]
fn eight_failures_trip_and_one_read_heals() {
    let (store, id) = joint_store(0.0, true);
    let bus = ScriptedBus::new(0x40)
        .then_angles(&[5.0; 5])
        .then_failures(8)
        .with_fallback(5.0);
    let mut enc = encoder(&store, id, bus);
    enc.setup(&mut no_rail());
    enc.check_encoder_variance().expect("qualify");
    assert!(enc.is_ok());

    for n in 1..=8u8 {
        assert!(!enc.get_new_angle_from_sensor());
        assert_eq!(enc.health().consecutive_failed_reads(), n);
    }
    assert!(!enc.is_ok());

    assert!(enc.get_new_angle_from_sensor());
    assert_eq!(enc.health().consecutive_failed_reads(), 0);
    assert!(enc.is_ok());
}

#[test]
fn failed_read_keeps_last_good_angle() {
    let (store, id) = joint_store(0.0, true);
    let bus = ScriptedBus::new(0x40).then_angles(&[42.0]).then_failures(1);
    let mut enc = encoder(&store, id, bus);
    assert!(enc.get_new_angle_from_sensor());
    assert!(!enc.get_new_angle_from_sensor());
    assert_eq!(enc.raw_sensor_angle(), 42.0);
}

#[test]
fn set_null_angle_writes_through_to_store() {
    let (mut store, id) = joint_store(0.0, true);
    let enc = encoder(&store, id, ScriptedBus::new(0x40));
    enc.set_null_angle(&mut store, 123.5);
    assert_eq!(enc.null_angle(&store), 123.5);
    assert_eq!(store[id].null_angle_deg, 123.5);
    assert_eq!(enc.config(&store).name, "hip");
}

#[test]
fn calibrate_stores_mean_as_null() {
    let (mut store, id) = joint_store(0.0, false);
    let bus = ScriptedBus::new(0x40)
        .then_angles(&[20.0, 20.2, 19.8, 20.0, 20.0])
        .then_angles(&[25.0]);
    let mut enc = encoder(&store, id, bus);
    let null = enc.calibrate_null_angle(&mut store).expect("calibrate");
    assert!((null - 20.0).abs() < 1e-4);
    assert!((store[id].null_angle_deg - 20.0).abs() < 1e-4);
    assert!(enc.get_new_angle_from_sensor());
    // Counter-clockwise mounting: +5 raw is -5 joint.
    assert!((enc.angle(&store) + 5.0).abs() < 1e-3);
}

#[test]
fn calibrate_refuses_noisy_sensor() {
    let (mut store, id) = joint_store(7.0, true);
    let bus = ScriptedBus::new(0x40).then_angles(&[0.0, 10.0, 0.0, 10.0, 0.0]);
    let mut enc = encoder(&store, id, bus);
    let err = enc.calibrate_null_angle(&mut store).expect_err("too noisy");
    assert!(matches!(
        err.downcast_ref::<EncoderError>(),
        Some(EncoderError::TooNoisy { .. })
    ));
    assert_eq!(store[id].null_angle_deg, 7.0);
}

#[test]
fn programmed_joint_uses_shifted_address() {
    let (_store, id) = joint_store(0.0, true);
    let enc = RotaryEncoder::builder()
        .with_bus(ScriptedBus::new(0x40))
        .with_config(id)
        .with_setup(JointSensorSetup {
            i2c_address: 0x40,
            program_i2c_address: true,
            clockwise: true,
        })
        .build()
        .expect("build");
    assert_eq!(enc.address(), 0x44);
}
