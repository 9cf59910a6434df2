//! Runtime configuration types for the encoder core.
//!
//! These are what `RotaryEncoder` and `ConflictResolver` consume. They are
//! separate from the TOML-deserialized config in `encoder_config`.

use std::time::Duration;

/// Immutable wiring of one joint sensor, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointSensorSetup {
    /// Factory (base) I2C address.
    pub i2c_address: u8,
    /// Move this sensor to `i2c_address + address_addon` during bring-up.
    pub program_i2c_address: bool,
    /// Mechanical mounting direction.
    pub clockwise: bool,
}

/// Tuning shared by every encoder on a bus.
#[derive(Debug, Clone, PartialEq)]
pub struct EncoderParams {
    /// Reads per variance qualification burst.
    pub variance_samples: usize,
    /// Qualifies when burst variance is strictly below this (deg^2).
    pub variance_threshold_deg2: f32,
    /// `is_ok()` turns false at this many failed reads in a row.
    pub max_failed_reads: u8,
    /// Offset to the base address of a reprogrammed sensor.
    pub address_addon: u8,
    /// Pause between reads of one burst.
    pub sample_interval: Duration,
    /// Settle time after the companion rail is switched on.
    pub power_up: Duration,
}

impl Default for EncoderParams {
    fn default() -> Self {
        Self {
            variance_samples: 5,
            variance_threshold_deg2: 0.1,
            max_failed_reads: 8,
            address_addon: 4,
            sample_interval: Duration::from_millis(1),
            power_up: Duration::from_millis(20),
        }
    }
}
