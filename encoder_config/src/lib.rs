#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema, validation and persistence for the joint encoders.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - `ConfigStore` owns the per-joint `JointSensorConfig` records for the
//!   lifetime of the controller and hands out `JointId` handles to them.
//! - Calibration sheets (`joint,null_angle_deg` CSV) can be applied in bulk.
use serde::{Deserialize, Serialize};
use std::ops::{Index, IndexMut};
use std::path::{Path, PathBuf};

pub mod util;

/// Lowest and highest non-reserved 7-bit I2C addresses.
pub const I2C_ADDRESS_MIN: u8 = 0x08;
pub const I2C_ADDRESS_MAX: u8 = 0x77;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct BusCfg {
    /// Linux I2C bus number (`/dev/i2c-N`), hardware backend only
    pub i2c_bus: u8,
    /// GPIO driving the companion sensors' supply
    pub power_pin: Option<u8>,
    /// Per-transaction timeout handed to the I2C driver
    pub read_timeout_ms: u32,
}

impl Default for BusCfg {
    fn default() -> Self {
        Self {
            i2c_bus: 1,
            power_pin: None,
            read_timeout_ms: 10,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct EncoderCfg {
    /// Reads per variance qualification burst
    pub variance_samples: usize,
    /// A sensor qualifies when its burst variance is below this (deg^2)
    pub variance_threshold_deg2: f32,
    /// Joint is unhealthy once this many reads in a row have failed
    pub max_failed_reads: u8,
    /// Offset added to the base address of a reprogrammed sensor
    pub address_addon: u8,
    /// Settle time after powering the companion rail back on
    pub power_up_ms: u64,
    /// Pause between reads of one burst
    pub sample_interval_ms: u64,
}

impl Default for EncoderCfg {
    fn default() -> Self {
        Self {
            variance_samples: 5,
            variance_threshold_deg2: 0.1,
            max_failed_reads: 8,
            address_addon: 4,
            power_up_ms: 20,
            sample_interval_ms: 1,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Persisted per-joint record. Wiring fields are read once at bring-up;
/// only `null_angle_deg` changes afterwards, through calibration.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct JointSensorConfig {
    pub name: String,
    /// Factory (base) I2C address of this joint's sensor
    pub i2c_address: u8,
    /// This joint's sensor is moved to `i2c_address + address_addon` at bring-up
    #[serde(default)]
    pub program_i2c_address: bool,
    /// Mechanical mounting; counter-clockwise mounting negates the angle
    #[serde(default = "default_clockwise")]
    pub clockwise: bool,
    /// Raw angle that corresponds to the joint's logical zero (degrees)
    #[serde(default)]
    pub null_angle_deg: f32,
}

fn default_clockwise() -> bool {
    true
}

impl JointSensorConfig {
    /// Address the sensor answers at once bring-up is done.
    pub fn effective_address(&self, address_addon: u8) -> u8 {
        if self.program_i2c_address {
            self.i2c_address.saturating_add(address_addon)
        } else {
            self.i2c_address
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub bus: BusCfg,
    #[serde(default)]
    pub encoder: EncoderCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub joints: Vec<JointSensorConfig>,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Encoder tuning
        let enc = &self.encoder;
        if enc.variance_samples == 0 {
            eyre::bail!("encoder.variance_samples must be >= 1");
        }
        if enc.variance_samples > 1000 {
            eyre::bail!("encoder.variance_samples is unreasonably large (>1000)");
        }
        if !(enc.variance_threshold_deg2.is_finite() && enc.variance_threshold_deg2 > 0.0) {
            eyre::bail!("encoder.variance_threshold_deg2 must be > 0");
        }
        if enc.max_failed_reads == 0 {
            eyre::bail!("encoder.max_failed_reads must be >= 1");
        }
        if enc.address_addon == 0 || enc.address_addon % 4 != 0 {
            eyre::bail!("encoder.address_addon must be a non-zero multiple of 4");
        }
        if enc.power_up_ms > 5_000 {
            eyre::bail!("encoder.power_up_ms is unreasonably large (>5s)");
        }
        if enc.sample_interval_ms > 1_000 {
            eyre::bail!("encoder.sample_interval_ms is unreasonably large (>1s)");
        }

        // Bus
        if self.bus.read_timeout_ms == 0 {
            eyre::bail!("bus.read_timeout_ms must be >= 1");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got {r:?}");
        }

        // Joints
        if self.joints.is_empty() {
            eyre::bail!("at least one [[joints]] entry is required");
        }
        let mut effective: Vec<(u8, &str)> = Vec::with_capacity(self.joints.len());
        for (i, j) in self.joints.iter().enumerate() {
            if j.name.trim().is_empty() {
                eyre::bail!("joints[{i}].name must not be empty");
            }
            if self.joints[..i].iter().any(|o| o.name == j.name) {
                eyre::bail!("duplicate joint name {:?}", j.name);
            }
            if !(I2C_ADDRESS_MIN..=I2C_ADDRESS_MAX).contains(&j.i2c_address) {
                eyre::bail!(
                    "joints[{i}].i2c_address {:#04x} outside {I2C_ADDRESS_MIN:#04x}..={I2C_ADDRESS_MAX:#04x}",
                    j.i2c_address
                );
            }
            if !j.null_angle_deg.is_finite() {
                eyre::bail!("joints[{i}].null_angle_deg must be finite");
            }
            let addr = u16::from(j.i2c_address)
                + if j.program_i2c_address {
                    u16::from(enc.address_addon)
                } else {
                    0
                };
            if addr > u16::from(I2C_ADDRESS_MAX) {
                eyre::bail!(
                    "joints[{i}] programmed address {addr:#04x} exceeds {I2C_ADDRESS_MAX:#04x}"
                );
            }
            let addr = addr as u8;
            if let Some((_, other)) = effective.iter().find(|(a, _)| *a == addr) {
                eyre::bail!(
                    "joints {:?} and {other:?} both end up at address {addr:#04x}",
                    j.name
                );
            }
            effective.push((addr, j.name.as_str()));
        }

        Ok(())
    }

    /// Serialize back to TOML (comments in the original file are not kept).
    pub fn to_toml_string(&self) -> eyre::Result<String> {
        toml::to_string_pretty(self).map_err(|e| eyre::eyre!("serialize config: {e}"))
    }
}

/// Handle to one joint's record inside a `ConfigStore`.
///
/// Only the store hands these out, so a handle always indexes its own store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointId(usize);

impl JointId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Owner of the persisted joint records. Outlives every encoder that refers to it.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    config: Config,
    path: Option<PathBuf>,
}

impl ConfigStore {
    /// Wrap an already validated config that is not backed by a file.
    pub fn new(config: Config) -> Self {
        Self { config, path: None }
    }

    /// Read, parse and validate a TOML file; `save()` writes back to it.
    pub fn load(path: &Path) -> eyre::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("read config {}: {e}", path.display()))?;
        let config = load_toml(&text)
            .map_err(|e| eyre::eyre!("invalid configuration in {}: {e}", path.display()))?;
        config.validate()?;
        Ok(Self {
            config,
            path: Some(path.to_path_buf()),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn ids(&self) -> impl Iterator<Item = JointId> + '_ {
        (0..self.config.joints.len()).map(JointId)
    }

    pub fn find(&self, name: &str) -> Option<JointId> {
        self.config
            .joints
            .iter()
            .position(|j| j.name == name)
            .map(JointId)
    }

    pub fn get(&self, id: JointId) -> Option<&JointSensorConfig> {
        self.config.joints.get(id.0)
    }

    pub fn get_mut(&mut self, id: JointId) -> Option<&mut JointSensorConfig> {
        self.config.joints.get_mut(id.0)
    }

    /// Apply a calibration sheet; unknown joint names are rejected before anything changes.
    pub fn apply_null_angles(&mut self, rows: &[NullAngleRow]) -> eyre::Result<usize> {
        let mut resolved = Vec::with_capacity(rows.len());
        for row in rows {
            let id = self
                .find(&row.joint)
                .ok_or_else(|| eyre::eyre!("calibration names unknown joint {:?}", row.joint))?;
            if !row.null_angle_deg.is_finite() {
                eyre::bail!("calibration for {:?} is not finite", row.joint);
            }
            resolved.push((id, row.null_angle_deg));
        }
        for (id, angle) in &resolved {
            self[*id].null_angle_deg = *angle;
        }
        Ok(resolved.len())
    }

    /// Write the store back to the file it was loaded from.
    pub fn save(&self) -> eyre::Result<()> {
        let Some(path) = self.path.as_deref() else {
            eyre::bail!("config store has no backing file");
        };
        self.save_to(path)
    }

    /// Persist one joint's null angle into the backing file, leaving every other
    /// record as it is on disk. In-memory overrides of other joints are not written.
    pub fn persist_null_angle(&self, id: JointId, null_angle_deg: f32) -> eyre::Result<()> {
        let Some(path) = self.path.as_deref() else {
            eyre::bail!("config store has no backing file");
        };
        let name = &self
            .get(id)
            .ok_or_else(|| eyre::eyre!("no joint with index {}", id.0))?
            .name;
        let mut on_disk = Self::load(path)?;
        let disk_id = on_disk
            .find(name)
            .ok_or_else(|| eyre::eyre!("joint {name:?} is missing from {}", path.display()))?;
        on_disk[disk_id].null_angle_deg = null_angle_deg;
        on_disk.save()
    }

    pub fn save_to(&self, path: &Path) -> eyre::Result<()> {
        let text = self.config.to_toml_string()?;
        util::write_atomic(path, text.as_bytes())
            .map_err(|e| eyre::eyre!("write config {}: {e}", path.display()))
    }
}

impl Index<JointId> for ConfigStore {
    type Output = JointSensorConfig;

    fn index(&self, id: JointId) -> &Self::Output {
        &self.config.joints[id.0]
    }
}

impl IndexMut<JointId> for ConfigStore {
    fn index_mut(&mut self, id: JointId) -> &mut Self::Output {
        &mut self.config.joints[id.0]
    }
}

/// Calibration sheet schema.
///
/// Expected headers:
/// joint,null_angle_deg
///
/// Example:
/// joint,null_angle_deg
/// hip,12.5
/// knee,-3.0
#[derive(Debug, Deserialize, Clone)]
pub struct NullAngleRow {
    pub joint: String,
    pub null_angle_deg: f32,
}

pub fn load_null_angles_csv(path: &Path) -> eyre::Result<Vec<NullAngleRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    // Enforce exact headers
    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["joint", "null_angle_deg"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "calibration CSV must have headers 'joint,null_angle_deg', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<NullAngleRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => {
                eyre::bail!("invalid CSV row {}: {}", idx + 2, e);
            }
        }
    }
    if rows.is_empty() {
        eyre::bail!("calibration CSV {:?} has no rows", path);
    }
    Ok(rows)
}
