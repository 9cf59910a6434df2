use std::fs::{self, File};
use std::io::Write;

use encoder_config::{ConfigStore, load_null_angles_csv};
use rstest::rstest;
use tempfile::tempdir;

const CONFIG: &str = r#"
[bus]
power_pin = 17

[encoder]
variance_samples = 8

[[joints]]
name = "hip"
i2c_address = 0x40
program_i2c_address = true

[[joints]]
name = "knee"
i2c_address = 0x40
clockwise = false
null_angle_deg = -4.0
"#;

#[rstest]
fn saved_null_angle_survives_reload() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("joints.toml");
    fs::write(&path, CONFIG).unwrap();

    let mut store = ConfigStore::load(&path).expect("load");
    let hip = store.find("hip").expect("hip");
    store[hip].null_angle_deg = 12.25;
    store.save().expect("save");

    let reloaded = ConfigStore::load(&path).expect("reload");
    let hip = reloaded.find("hip").unwrap();
    assert_eq!(reloaded[hip].null_angle_deg, 12.25);
    assert_eq!(reloaded.config().encoder.variance_samples, 8);
    assert_eq!(reloaded.config().bus.power_pin, Some(17));
    let knee = reloaded.find("knee").unwrap();
    assert!(!reloaded[knee].clockwise);
    // No temp file is left next to the config.
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[rstest]
fn load_rejects_invalid_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[encoder]\nvariance_samples = 0\n").unwrap();
    let err = ConfigStore::load(&path).expect_err("invalid");
    assert!(format!("{err}").contains("variance_samples"));
}

#[rstest]
fn unbacked_store_cannot_save() {
    let cfg = encoder_config::load_toml(CONFIG).unwrap();
    let store = ConfigStore::new(cfg);
    assert!(store.save().is_err());
}

#[rstest]
fn calibration_sheet_applies_to_named_joints() {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("null.csv");
    let mut f = File::create(&csv).unwrap();
    writeln!(f, "joint,null_angle_deg").unwrap();
    writeln!(f, "knee, 3.5").unwrap();
    drop(f);

    let rows = load_null_angles_csv(&csv).expect("csv");
    let mut store = ConfigStore::new(encoder_config::load_toml(CONFIG).unwrap());
    assert_eq!(store.apply_null_angles(&rows).unwrap(), 1);
    let knee = store.find("knee").unwrap();
    assert_eq!(store[knee].null_angle_deg, 3.5);
}

#[rstest]
#[case("name,angle\nhip,1.0\n", "must have headers")]
#[case("joint,null_angle_deg\nhip,abc\n", "invalid CSV row 2")]
#[case("joint,null_angle_deg\n", "has no rows")]
fn calibration_sheet_errors(#[case] body: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let csv = dir.path().join("null.csv");
    fs::write(&csv, body).unwrap();
    let err = load_null_angles_csv(&csv).expect_err("bad sheet");
    assert!(format!("{err}").contains(needle), "{err}");
}

#[rstest]
fn persisting_one_joint_keeps_sheet_overrides_off_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("joints.toml");
    fs::write(&path, CONFIG).unwrap();

    let mut store = ConfigStore::load(&path).expect("load");
    let rows = vec![encoder_config::NullAngleRow {
        joint: "knee".into(),
        null_angle_deg: 12.5,
    }];
    store.apply_null_angles(&rows).unwrap();
    let hip = store.find("hip").unwrap();
    store[hip].null_angle_deg = 33.0;
    store.persist_null_angle(hip, 33.0).expect("persist");

    let reloaded = ConfigStore::load(&path).expect("reload");
    assert_eq!(reloaded[reloaded.find("hip").unwrap()].null_angle_deg, 33.0);
    assert_eq!(reloaded[reloaded.find("knee").unwrap()].null_angle_deg, -4.0);
    // The in-memory override is still in effect for this run.
    assert_eq!(store[store.find("knee").unwrap()].null_angle_deg, 12.5);
}

#[rstest]
fn unbacked_store_cannot_persist_null_angle() {
    let store = ConfigStore::new(encoder_config::load_toml(CONFIG).unwrap());
    let hip = store.find("hip").unwrap();
    assert!(store.persist_null_angle(hip, 1.0).is_err());
}
