use encoder_config::{ConfigStore, load_toml};
use encoder_core::mocks::ScriptedBus;
use encoder_core::{BuildError, EncoderParams, JointSensorSetup, RotaryEncoder};

fn setup() -> JointSensorSetup {
    JointSensorSetup {
        i2c_address: 0x40,
        program_i2c_address: false,
        clockwise: true,
    }
}

#[test]
fn builder_requires_bus_config_and_setup() {
    let store = ConfigStore::new(
        load_toml("[[joints]]\nname = \"hip\"\ni2c_address = 0x40\n").expect("parse"),
    );
    let id = store.find("hip").expect("hip");

    let err = RotaryEncoder::<ScriptedBus>::builder()
        .with_config(id)
        .with_setup(setup())
        .build()
        .expect_err("no bus");
    assert!(matches!(err.downcast_ref::<BuildError>(), Some(BuildError::MissingBus)));

    let err = RotaryEncoder::builder()
        .with_bus(ScriptedBus::new(0x40))
        .with_setup(setup())
        .build()
        .expect_err("no config");
    assert!(matches!(err.downcast_ref::<BuildError>(), Some(BuildError::MissingConfig)));

    let err = RotaryEncoder::builder()
        .with_bus(ScriptedBus::new(0x40))
        .with_config(id)
        .build()
        .expect_err("no setup");
    assert!(matches!(err.downcast_ref::<BuildError>(), Some(BuildError::MissingSetup)));
}

#[test]
fn builder_rejects_zero_sample_burst() {
    let store = ConfigStore::new(
        load_toml("[[joints]]\nname = \"hip\"\ni2c_address = 0x40\n").expect("parse"),
    );
    let id = store.find("hip").expect("hip");
    let err = RotaryEncoder::builder()
        .with_bus(ScriptedBus::new(0x40))
        .for_joint(&store, id)
        .with_params(EncoderParams {
            variance_samples: 0,
            ..EncoderParams::default()
        })
        .build()
        .expect_err("zero samples");
    assert!(format!("{err}").contains("variance_samples"));
}
