use encoder_config::load_toml;
use rstest::rstest;

const JOINTS: &str = r#"
[[joints]]
name = "hip"
i2c_address = 0x40
program_i2c_address = true
null_angle_deg = 10.0

[[joints]]
name = "knee"
i2c_address = 0x40
clockwise = false
"#;

fn with_encoder(section: &str) -> String {
    format!("[encoder]\n{section}\n{JOINTS}")
}

#[rstest]
#[case("variance_samples = 0", "variance_samples must be >= 1")]
#[case("variance_threshold_deg2 = 0.0", "variance_threshold_deg2 must be > 0")]
#[case("variance_threshold_deg2 = -1.0", "variance_threshold_deg2 must be > 0")]
#[case("max_failed_reads = 0", "max_failed_reads must be >= 1")]
#[case("address_addon = 6", "multiple of 4")]
#[case("address_addon = 0", "multiple of 4")]
#[case("power_up_ms = 60000", "power_up_ms is unreasonably large")]
fn rejects_bad_encoder_tuning(#[case] section: &str, #[case] needle: &str) {
    let cfg = load_toml(&with_encoder(section)).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        format!("{err}").contains(needle),
        "expected {needle:?} in {err}"
    );
}

#[test]
fn accepts_tuned_encoder_section() {
    let toml = with_encoder(
        "variance_samples = 16\nvariance_threshold_deg2 = 0.05\nmax_failed_reads = 3\naddress_addon = 8",
    );
    let cfg = load_toml(&toml).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.encoder.variance_samples, 16);
}

#[test]
fn rejects_empty_joint_list() {
    let cfg = load_toml("[encoder]\nvariance_samples = 5\n").expect("parse TOML");
    let err = cfg.validate().expect_err("no joints");
    assert!(format!("{err}").contains("[[joints]]"));
}

#[test]
fn rejects_duplicate_joint_names() {
    let toml = r#"
[[joints]]
name = "hip"
i2c_address = 0x40

[[joints]]
name = "hip"
i2c_address = 0x41
"#;
    let err = load_toml(toml).unwrap().validate().expect_err("dup names");
    assert!(format!("{err}").contains("duplicate joint name"));
}

#[rstest]
// Both unprogrammed on one address: nothing separates them.
#[case(0x40, false, 0x40, false)]
// Programmed joint lands on a third joint's address.
#[case(0x40, true, 0x44, false)]
fn rejects_colliding_effective_addresses(
    #[case] a: u8,
    #[case] a_prog: bool,
    #[case] b: u8,
    #[case] b_prog: bool,
) {
    let toml = format!(
        "[[joints]]\nname = \"a\"\ni2c_address = {a}\nprogram_i2c_address = {a_prog}\n\n[[joints]]\nname = \"b\"\ni2c_address = {b}\nprogram_i2c_address = {b_prog}\n"
    );
    let err = load_toml(&toml).unwrap().validate().expect_err("collision");
    assert!(format!("{err}").contains("both end up at address"));
}

#[rstest]
#[case(0x03)]
#[case(0x78)]
fn rejects_reserved_addresses(#[case] addr: u8) {
    let toml = format!("[[joints]]\nname = \"a\"\ni2c_address = {addr}\n");
    let err = load_toml(&toml).unwrap().validate().expect_err("reserved");
    assert!(format!("{err}").contains("i2c_address"));
}

#[test]
fn rejects_programmed_address_past_range() {
    let toml = "[[joints]]\nname = \"a\"\ni2c_address = 0x74\nprogram_i2c_address = true\n";
    let err = load_toml(toml).unwrap().validate().expect_err("past range");
    assert!(format!("{err}").contains("programmed address"));
}

#[test]
fn rejects_unknown_rotation() {
    let toml = format!("[logging]\nrotation = \"weekly\"\n{JOINTS}");
    let err = load_toml(&toml).unwrap().validate().expect_err("rotation");
    assert!(format!("{err}").contains("logging.rotation"));
}

#[test]
fn shipped_sample_config_is_valid() {
    let cfg = load_toml(include_str!("../../etc/encoder.toml")).expect("parse sample");
    cfg.validate().expect("sample validates");
    assert_eq!(cfg.bus.power_pin, Some(17));
    assert_eq!(cfg.joints.len(), 2);
    assert_eq!(cfg.joints[0].effective_address(cfg.encoder.address_addon), 0x44);
}
