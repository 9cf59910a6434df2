#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    let Ok(cfg) = encoder_config::load_toml(data) else {
        return;
    };
    if cfg.validate().is_err() {
        return;
    }
    // A valid config must survive being written back by calibration.
    let text = cfg.to_toml_string().expect("serialize valid config");
    let again = encoder_config::load_toml(&text).expect("reparse saved config");
    again.validate().expect("saved config still valid");
    assert_eq!(cfg.joints, again.joints);
});
