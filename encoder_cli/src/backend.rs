//! Backend assembly: simulated devices by default, AS5048B over rppal with
//! `--features hardware` on Linux.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use encoder_config::{Config, ConfigStore};
use encoder_core::{ConflictResolver, EncoderParams};

use crate::cli::Commands;
use crate::run::run_command;

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
pub fn run_with_backend(
    cmd: &Commands,
    store: &mut ConfigStore,
    json_out: bool,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<()> {
    use encoder_hardware::SimulatedPowerRail;
    use std::sync::Mutex;

    let rail = SimulatedPowerRail::new();
    let bus = Arc::new(Mutex::new(sim::simulated_bus(store.config(), rail.clone())));
    let mut resolver = ConflictResolver::new(rail, power_up(store.config()));
    tracing::debug!("using simulated sensor bus");
    run_command(cmd, store, bus, &mut resolver, json_out, shutdown)
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn run_with_backend(
    cmd: &Commands,
    store: &mut ConfigStore,
    json_out: bool,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<()> {
    use encoder_core::NoRail;
    use encoder_hardware::as5048b::{As5048bBus, GpioPowerRail};
    use eyre::WrapErr;
    use std::sync::Mutex;

    let cfg = store.config();
    let (i2c_bus, timeout_ms, power_pin) = (cfg.bus.i2c_bus, cfg.bus.read_timeout_ms, cfg.bus.power_pin);
    let power_up = power_up(cfg);

    let bus = As5048bBus::new(i2c_bus, timeout_ms)
        .wrap_err_with(|| format!("open I2C bus {i2c_bus}"))?;
    let bus = Arc::new(Mutex::new(bus));
    match power_pin {
        Some(pin) => {
            let rail = GpioPowerRail::new(pin)
                .wrap_err_with(|| format!("open companion power pin {pin}"))?;
            let mut resolver = ConflictResolver::new(rail, power_up);
            run_command(cmd, store, bus, &mut resolver, json_out, shutdown)
        }
        None => {
            let mut resolver = ConflictResolver::new(NoRail, power_up);
            run_command(cmd, store, bus, &mut resolver, json_out, shutdown)
        }
    }
}

fn power_up(cfg: &Config) -> Duration {
    EncoderParams::from(&cfg.encoder).power_up
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
mod sim {
    use encoder_config::Config;
    use encoder_core::calibration::normalize_degrees;
    use encoder_hardware::{SimDevice, SimulatedBus, SimulatedPowerRail};

    /// Env knobs for exercising the CLI without hardware.
    const OFFSET_ENV: &str = "ENCODER_SIM_OFFSET_DEG";
    const JITTER_ENV: &str = "ENCODER_SIM_JITTER_DEG";

    fn env_f32(key: &str) -> f32 {
        std::env::var(key)
            .ok()
            .and_then(|v| v.trim().parse::<f32>().ok())
            .filter(|v| v.is_finite())
            .unwrap_or(0.0)
    }

    /// One simulated device per joint, resting `ENCODER_SIM_OFFSET_DEG` away
    /// from its null angle.
    ///
    /// A joint that keeps the factory address while another joint on the same
    /// base address gets reprogrammed is the companion and sits on the rail.
    pub fn simulated_bus(cfg: &Config, rail: SimulatedPowerRail) -> SimulatedBus {
        let offset = env_f32(OFFSET_ENV);
        let jitter = env_f32(JITTER_ENV);
        let mut bus = SimulatedBus::new(rail);
        for j in &cfg.joints {
            let companion = !j.program_i2c_address
                && cfg
                    .joints
                    .iter()
                    .any(|o| o.program_i2c_address && o.i2c_address == j.i2c_address);
            let raw = if j.clockwise {
                j.null_angle_deg + offset
            } else {
                j.null_angle_deg - offset
            };
            let mut device = SimDevice::new(j.i2c_address, normalize_degrees(raw)).with_jitter(jitter);
            if companion {
                device = device.on_switched_rail();
            }
            bus.add_device(device);
        }
        bus
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use encoder_config::load_toml;

        #[test]
        fn companion_goes_on_the_rail() {
            let cfg = load_toml(
                r#"
[[joints]]
name = "hip"
i2c_address = 0x40
program_i2c_address = true

[[joints]]
name = "knee"
i2c_address = 0x40

[[joints]]
name = "ankle"
i2c_address = 0x41
"#,
            )
            .unwrap();
            let rail = SimulatedPowerRail::new();
            let bus = simulated_bus(&cfg, rail);
            let switched: Vec<bool> = (0..3)
                .map(|i| bus.device(i).unwrap().is_switched())
                .collect();
            assert_eq!(switched, vec![false, true, false]);
        }
    }
}
