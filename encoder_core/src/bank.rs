//! All joint encoders of one controller, sharing one bus.
//!
//! `bring_up` is the only place the companion rail is driven; `refresh` is the
//! per-cycle poll the control loop calls.

use encoder_config::{ConfigStore, JointId};
use encoder_traits::clock::Clock;
use encoder_traits::{AngleSensorBus, PowerSwitch};
use tracing::{info, warn};

use crate::config::EncoderParams;
use crate::conflict::ConflictResolver;
use crate::encoder::RotaryEncoder;
use crate::error::{EncoderError, Result};
use crate::health::HealthPhase;

/// Snapshot of one joint for reports and telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct JointStatus {
    pub joint: JointId,
    pub name: String,
    pub address: u8,
    pub raw_deg: f32,
    pub angle_deg: f32,
    pub null_deg: f32,
    pub variance: Option<f32>,
    pub communication_works: bool,
    pub passed_variance_check: bool,
    pub consecutive_failed_reads: u8,
    pub phase: HealthPhase,
    pub ok: bool,
}

/// Result of `JointBank::bring_up`.
#[derive(Debug, Clone)]
pub struct BringUpReport {
    pub joints: Vec<JointStatus>,
}

impl BringUpReport {
    pub fn all_ok(&self) -> bool {
        self.joints.iter().all(|j| j.ok)
    }

    pub fn unhealthy(&self) -> impl Iterator<Item = &JointStatus> {
        self.joints.iter().filter(|j| !j.ok)
    }
}

pub struct JointBank<B: AngleSensorBus> {
    joints: Vec<RotaryEncoder<B>>,
}

impl<B: AngleSensorBus> core::fmt::Debug for JointBank<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list().entries(self.joints.iter()).finish()
    }
}

impl<B: AngleSensorBus + Clone> JointBank<B> {
    /// One encoder per joint in `store`, each holding a clone of `bus`
    /// (typically an `Arc<Mutex<_>>` around the physical bus).
    ///
    /// The store is validated first; joints sharing an address would fight
    /// over the bus forever.
    pub fn from_store(
        store: &ConfigStore,
        bus: B,
        clock: impl Clock + Clone + Send + Sync + 'static,
    ) -> Result<Self> {
        store
            .config()
            .validate()
            .map_err(|e| EncoderError::Config(e.to_string()))?;
        let params = EncoderParams::from(&store.config().encoder);
        let joints = store
            .ids()
            .map(|id| {
                RotaryEncoder::builder()
                    .with_bus(bus.clone())
                    .for_joint(store, id)
                    .with_params(params.clone())
                    .with_clock(clock.clone())
                    .build()
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { joints })
    }
}

impl<B: AngleSensorBus> JointBank<B> {
    pub fn from_encoders(joints: Vec<RotaryEncoder<B>>) -> Self {
        Self { joints }
    }

    /// Set up every joint, then qualify every joint.
    ///
    /// Joints whose sensor gets reprogrammed go first: until they have moved,
    /// their companions share the factory address with them.
    pub fn bring_up<P: PowerSwitch>(
        &mut self,
        store: &ConfigStore,
        resolver: &mut ConflictResolver<P>,
    ) -> BringUpReport {
        let (programmed, plain): (Vec<usize>, Vec<usize>) = (0..self.joints.len())
            .partition(|&i| self.joints[i].joint_setup().program_i2c_address);
        for i in programmed.into_iter().chain(plain) {
            self.joints[i].setup(resolver);
        }
        for enc in &mut self.joints {
            if enc.health().communication_works() {
                // Failures are already logged and reflected in the health state.
                let _ = enc.check_encoder_variance();
            }
        }
        let report = BringUpReport {
            joints: self.status(store),
        };
        for j in report.unhealthy() {
            warn!(joint = %j.name, address = j.address, phase = ?j.phase, "joint not ready");
        }
        info!(
            joints = report.joints.len(),
            healthy = report.joints.iter().filter(|j| j.ok).count(),
            "bring-up finished"
        );
        report
    }

    /// One polling cycle: a fresh read for every joint. Returns how many succeeded.
    pub fn refresh(&mut self) -> usize {
        self.joints
            .iter_mut()
            .map(|enc| enc.get_new_angle_from_sensor())
            .filter(|ok| *ok)
            .count()
    }

    pub fn all_ok(&self) -> bool {
        self.joints.iter().all(|e| e.is_ok())
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn get(&self, id: JointId) -> Option<&RotaryEncoder<B>> {
        self.joints.iter().find(|e| e.joint() == id)
    }

    pub fn get_mut(&mut self, id: JointId) -> Option<&mut RotaryEncoder<B>> {
        self.joints.iter_mut().find(|e| e.joint() == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RotaryEncoder<B>> {
        self.joints.iter()
    }

    pub fn status(&self, store: &ConfigStore) -> Vec<JointStatus> {
        self.joints
            .iter()
            .map(|enc| {
                let h = enc.health();
                JointStatus {
                    joint: enc.joint(),
                    name: enc.config(store).name.clone(),
                    address: enc.address(),
                    raw_deg: enc.raw_sensor_angle(),
                    angle_deg: enc.angle(store),
                    null_deg: enc.null_angle(store),
                    variance: enc.last_variance(),
                    communication_works: h.communication_works(),
                    passed_variance_check: h.passed_variance_check(),
                    consecutive_failed_reads: h.consecutive_failed_reads(),
                    phase: h.phase(),
                    ok: h.is_ok(),
                }
            })
            .collect()
    }
}
