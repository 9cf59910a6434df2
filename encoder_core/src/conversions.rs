//! `From` implementations bridging `encoder_config` types to `encoder_core` types.

use std::time::Duration;

use crate::config::{EncoderParams, JointSensorSetup};

impl From<&encoder_config::EncoderCfg> for EncoderParams {
    fn from(c: &encoder_config::EncoderCfg) -> Self {
        Self {
            variance_samples: c.variance_samples,
            variance_threshold_deg2: c.variance_threshold_deg2,
            max_failed_reads: c.max_failed_reads,
            address_addon: c.address_addon,
            sample_interval: Duration::from_millis(c.sample_interval_ms),
            power_up: Duration::from_millis(c.power_up_ms),
        }
    }
}

impl From<&encoder_config::JointSensorConfig> for JointSensorSetup {
    fn from(c: &encoder_config::JointSensorConfig) -> Self {
        Self {
            i2c_address: c.i2c_address,
            program_i2c_address: c.program_i2c_address,
            clockwise: c.clockwise,
        }
    }
}
