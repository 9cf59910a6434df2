#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Joint angle sensing core (hardware-agnostic).
//!
//! Every bus access goes through `encoder_traits::AngleSensorBus` and the
//! companion power rail through `encoder_traits::PowerSwitch`.
//!
//! ## Architecture
//!
//! - **Statistics**: mean / population variance of a sample burst (`stats`)
//! - **Calibration**: null-angle offset and mounting sign (`calibration`)
//! - **Health**: variance qualification + failed-read counter (`health`)
//! - **Conflict resolution**: companion rail and address provisioning (`conflict`)
//! - **Encoder**: the per-joint facade (`encoder`)
//! - **Bank**: bring-up and polling of all joints on one bus (`bank`)
//!
//! ## Threading
//!
//! Nothing here spawns threads or keeps timers. Calls block for the duration
//! of their bus transactions; the owning control loop sets the cadence.

pub mod bank;
pub mod calibration;
pub mod config;
pub mod conflict;
mod conversions;
pub mod encoder;
pub mod error;
pub mod health;
pub mod hw_error;
pub mod mocks;
pub mod stats;

pub use bank::{BringUpReport, JointBank, JointStatus};
pub use config::{EncoderParams, JointSensorSetup};
pub use conflict::{ConflictResolver, NoRail, ProvisionOutcome};
pub use encoder::{RotaryEncoder, RotaryEncoderBuilder};
pub use error::{BuildError, EncoderError, Result};
pub use health::{HealthPhase, SensorHealth};
pub use stats::{SampleStats, compute_stats};

pub use encoder_config::{ConfigStore, JointId, JointSensorConfig};
