//! Per-joint rotary encoder: transport, calibration and health in one object.

use std::sync::Arc;

use encoder_config::{ConfigStore, JointId, JointSensorConfig};
use encoder_traits::clock::{Clock, MonotonicClock};
use encoder_traits::{AngleSensorBus, PowerSwitch};
use tracing::{debug, info, warn};

use crate::calibration::{calibrated_angle, normalize_degrees, unwrap_near};
use crate::config::{EncoderParams, JointSensorSetup};
use crate::conflict::ConflictResolver;
use crate::error::{BuildError, EncoderError, Result};
use crate::health::SensorHealth;
use crate::hw_error::map_bus_error;
use crate::stats::{SampleStats, compute_stats};

/// One joint's absolute angle sensor.
///
/// The joint's persisted record stays in the `ConfigStore`; the encoder only
/// keeps its `JointId`, so calibration calls take the store explicitly.
pub struct RotaryEncoder<B: AngleSensorBus> {
    bus: B,
    config: JointId,
    setup: JointSensorSetup,
    params: EncoderParams,
    health: SensorHealth,
    current_sensor_angle: f32,
    last_variance: Option<f32>,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl<B: AngleSensorBus> core::fmt::Debug for RotaryEncoder<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RotaryEncoder")
            .field("joint", &self.config)
            .field("address", &self.address())
            .field("raw_deg", &self.current_sensor_angle)
            .field("health", &self.health)
            .finish()
    }
}

impl<B: AngleSensorBus> RotaryEncoder<B> {
    pub fn builder() -> RotaryEncoderBuilder<B> {
        RotaryEncoderBuilder::default()
    }

    /// Bring the sensor onto the bus.
    ///
    /// Runs the address provisioning sequence when this joint's sensor is the
    /// one to be moved, then probes the active address. Variance qualification
    /// is a separate step (`check_encoder_variance`). Returns whether the
    /// sensor answered.
    pub fn setup<P: PowerSwitch>(&mut self, resolver: &mut ConflictResolver<P>) -> bool {
        if self.setup.program_i2c_address {
            let base = self.i2c_address(false);
            let target = self.i2c_address(true);
            if let Err(e) = resolver.provision(&mut self.bus, base, target) {
                warn!(joint = self.config.index(), error = %e, "address provisioning failed");
            }
        }
        let address = self.address();
        let present = self.bus.probe(address);
        self.health.record_setup(present);
        if present {
            info!(joint = self.config.index(), address, "sensor present");
        } else {
            warn!(joint = self.config.index(), address, "sensor does not answer");
        }
        present
    }

    pub fn joint(&self) -> JointId {
        self.config
    }

    /// This joint's persisted record.
    pub fn config<'s>(&self, store: &'s ConfigStore) -> &'s JointSensorConfig {
        &store[self.config]
    }

    pub fn config_mut<'s>(&self, store: &'s mut ConfigStore) -> &'s mut JointSensorConfig {
        &mut store[self.config]
    }

    pub fn joint_setup(&self) -> &JointSensorSetup {
        &self.setup
    }

    pub fn params(&self) -> &EncoderParams {
        &self.params
    }

    /// Overwrite the null angle, unconditionally.
    pub fn set_null_angle(&self, store: &mut ConfigStore, angle_deg: f32) {
        self.config_mut(store).null_angle_deg = angle_deg;
        info!(joint = self.config.index(), null_deg = angle_deg, "null angle set");
    }

    pub fn null_angle(&self, store: &ConfigStore) -> f32 {
        self.config(store).null_angle_deg
    }

    /// Calibrated angle of the last good read: `raw - null`, sign by mounting.
    pub fn angle(&self, store: &ConfigStore) -> f32 {
        calibrated_angle(
            self.current_sensor_angle,
            self.null_angle(store),
            self.is_clockwise(),
        )
    }

    /// Raw angle of the last good read, `[0, 360)`.
    pub fn raw_sensor_angle(&self) -> f32 {
        self.current_sensor_angle
    }

    /// One read from the sensor; the only place the failure counter moves.
    pub fn get_new_angle_from_sensor(&mut self) -> bool {
        match self.bus.read_angle(self.address()) {
            Ok(deg) => {
                self.current_sensor_angle = deg;
                self.health.record_read(true);
                debug!(joint = self.config.index(), raw_deg = deg, "angle read");
                true
            }
            Err(e) => {
                self.health.record_read(false);
                warn!(
                    joint = self.config.index(),
                    failed = self.health.consecutive_failed_reads(),
                    error = %map_bus_error(&e),
                    "angle read failed"
                );
                false
            }
        }
    }

    /// Read a burst of `variance_samples` raw angles and summarize it.
    ///
    /// Readings are unwrapped around the first one, so a sensor resting on the
    /// 0/360 seam is not mistaken for noise. The returned mean is in `[0, 360)`.
    pub fn fetch_sample(&mut self) -> Result<SampleStats> {
        let n = self.params.variance_samples;
        let address = self.address();
        let mut samples = Vec::with_capacity(n);
        for i in 0..n {
            if i > 0 {
                self.clock.sleep(self.params.sample_interval);
            }
            let deg = self
                .bus
                .read_angle(address)
                .map_err(|e| eyre::Report::new(map_bus_error(&e)))?;
            let deg = match samples.first() {
                Some(&first) => unwrap_near(first, deg),
                None => deg,
            };
            samples.push(deg);
        }
        let mut stats = compute_stats(&samples)?;
        stats.mean = normalize_degrees(stats.mean);
        Ok(stats)
    }

    /// Burst statistics of the calibrated angle.
    ///
    /// Same burst as [`fetch_sample`](Self::fetch_sample); the mean is mapped
    /// through the null angle and mounting direction, the spread is unchanged.
    pub fn fetch_calibrated_sample(&mut self, store: &ConfigStore) -> Result<SampleStats> {
        let raw = self.fetch_sample()?;
        Ok(SampleStats {
            mean: calibrated_angle(raw.mean, self.null_angle(store), self.is_clockwise()),
            ..raw
        })
    }

    /// One-shot noise qualification; sets `passed_variance_check`.
    ///
    /// Returns the measured variance. A read failure inside the burst
    /// disqualifies the sensor and is returned as the error.
    pub fn check_encoder_variance(&mut self) -> Result<f32> {
        match self.fetch_sample() {
            Ok(stats) => {
                let passed = stats.variance < self.params.variance_threshold_deg2;
                self.health.record_variance(passed);
                self.last_variance = Some(stats.variance);
                self.current_sensor_angle = stats.mean;
                if passed {
                    info!(
                        joint = self.config.index(),
                        variance = stats.variance,
                        "variance check passed"
                    );
                } else {
                    warn!(
                        joint = self.config.index(),
                        variance = stats.variance,
                        threshold = self.params.variance_threshold_deg2,
                        "variance check failed"
                    );
                }
                Ok(stats.variance)
            }
            Err(e) => {
                self.health.record_variance(false);
                self.last_variance = None;
                warn!(joint = self.config.index(), error = %e, "variance check aborted");
                Err(e)
            }
        }
    }

    /// Measure the resting raw angle and store it as the null angle.
    ///
    /// The burst doubles as a variance check; a noisy sensor is disqualified
    /// and the stored null angle is left untouched.
    pub fn calibrate_null_angle(&mut self, store: &mut ConfigStore) -> Result<f32> {
        let variance = self.check_encoder_variance()?;
        if !self.health.passed_variance_check() {
            return Err(EncoderError::TooNoisy {
                variance,
                threshold: self.params.variance_threshold_deg2,
            }
            .into());
        }
        let null = self.current_sensor_angle;
        self.set_null_angle(store, null);
        Ok(null)
    }

    pub fn is_ok(&self) -> bool {
        self.health.is_ok()
    }

    pub fn health(&self) -> &SensorHealth {
        &self.health
    }

    /// Variance measured by the last completed qualification run.
    pub fn last_variance(&self) -> Option<f32> {
        self.last_variance
    }

    /// Address the sensor answers at after setup.
    pub fn address(&self) -> u8 {
        self.i2c_address(self.setup.program_i2c_address)
    }

    fn i2c_address(&self, after: bool) -> u8 {
        if after {
            self.setup.i2c_address.saturating_add(self.params.address_addon)
        } else {
            self.setup.i2c_address
        }
    }

    fn is_clockwise(&self) -> bool {
        self.setup.clockwise
    }
}

/// Builder for `RotaryEncoder`. Bus, config handle and setup are required.
pub struct RotaryEncoderBuilder<B> {
    bus: Option<B>,
    config: Option<JointId>,
    setup: Option<JointSensorSetup>,
    params: Option<EncoderParams>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
}

impl<B> Default for RotaryEncoderBuilder<B> {
    fn default() -> Self {
        Self {
            bus: None,
            config: None,
            setup: None,
            params: None,
            clock: None,
        }
    }
}

impl<B: AngleSensorBus> RotaryEncoderBuilder<B> {
    pub fn with_bus(mut self, bus: B) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn with_config(mut self, id: JointId) -> Self {
        self.config = Some(id);
        self
    }

    pub fn with_setup(mut self, setup: JointSensorSetup) -> Self {
        self.setup = Some(setup);
        self
    }

    pub fn with_params(mut self, params: EncoderParams) -> Self {
        self.params = Some(params);
        self
    }

    pub fn with_clock(mut self, clock: impl Clock + Send + Sync + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Bind the joint's store record: handle plus the wiring read from it.
    pub fn for_joint(self, store: &ConfigStore, id: JointId) -> Self {
        let setup = JointSensorSetup::from(&store[id]);
        self.with_config(id).with_setup(setup)
    }

    pub fn build(self) -> Result<RotaryEncoder<B>> {
        let bus = self
            .bus
            .ok_or_else(|| eyre::Report::new(BuildError::MissingBus))?;
        let config = self
            .config
            .ok_or_else(|| eyre::Report::new(BuildError::MissingConfig))?;
        let setup = self
            .setup
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSetup))?;
        let params = self.params.unwrap_or_default();
        if params.variance_samples == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "variance_samples must be >= 1",
            )));
        }
        if params.max_failed_reads == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "max_failed_reads must be >= 1",
            )));
        }
        Ok(RotaryEncoder {
            bus,
            config,
            health: SensorHealth::new(params.max_failed_reads),
            setup,
            params,
            current_sensor_angle: 0.0,
            last_variance: None,
            clock: self
                .clock
                .unwrap_or_else(|| Arc::new(MonotonicClock::new())),
        })
    }
}
