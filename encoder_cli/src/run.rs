//! Command execution: bring-up, reporting, monitoring and calibration.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use encoder_config::ConfigStore;
use encoder_core::{ConflictResolver, JointBank, JointStatus};
use encoder_traits::{AngleSensorBus, Clock, MonotonicClock, PowerSwitch};
use eyre::WrapErr;
use serde_json::json;
use tracing::info;

use crate::cli::Commands;

/// Returned by `self-check` when at least one joint is not ok.
#[derive(Debug, Clone)]
pub struct Unhealthy {
    pub joints: Vec<String>,
}

impl fmt::Display for Unhealthy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} joint(s) not ok: {}",
            self.joints.len(),
            self.joints.join(", ")
        )
    }
}

impl std::error::Error for Unhealthy {}

pub fn status_json(s: &JointStatus) -> serde_json::Value {
    json!({
        "joint": s.name,
        "address": s.address,
        "raw_deg": s.raw_deg,
        "angle_deg": s.angle_deg,
        "null_deg": s.null_deg,
        "variance_deg2": s.variance,
        "communication_works": s.communication_works,
        "passed_variance_check": s.passed_variance_check,
        "consecutive_failed_reads": s.consecutive_failed_reads,
        "phase": format!("{:?}", s.phase),
        "ok": s.ok,
    })
}

fn status_line(s: &JointStatus) -> String {
    let variance = s
        .variance
        .map_or_else(|| "-".to_string(), |v| format!("{v:.4}"));
    format!(
        "{:<12} addr={:#04x} raw={:>7.2} angle={:>8.2} null={:>7.2} var={} {}",
        s.name,
        s.address,
        s.raw_deg,
        s.angle_deg,
        s.null_deg,
        variance,
        if s.ok { "ok" } else { "NOT OK" }
    )
}

fn print_statuses(statuses: &[JointStatus], json_out: bool) {
    if json_out {
        let joints: Vec<_> = statuses.iter().map(status_json).collect();
        let ok = statuses.iter().all(|s| s.ok);
        println!("{}", json!({ "ok": ok, "joints": joints }));
    } else {
        for s in statuses {
            println!("{}", status_line(s));
        }
    }
}

/// Run one subcommand against an assembled backend.
pub fn run_command<B, P>(
    cmd: &Commands,
    store: &mut ConfigStore,
    bus: B,
    resolver: &mut ConflictResolver<P>,
    json_out: bool,
    shutdown: Arc<AtomicBool>,
) -> eyre::Result<()>
where
    B: AngleSensorBus + Clone,
    P: PowerSwitch,
{
    let clock = MonotonicClock::new();
    let mut bank = JointBank::from_store(store, bus, clock).wrap_err("assemble encoders")?;
    let report = bank.bring_up(store, resolver);

    match cmd {
        Commands::SelfCheck => {
            print_statuses(&report.joints, json_out);
            let unhealthy: Vec<String> = report.unhealthy().map(|j| j.name.clone()).collect();
            if !unhealthy.is_empty() {
                return Err(Unhealthy { joints: unhealthy }.into());
            }
            if !json_out {
                println!("self-check ok: {} joint(s)", report.joints.len());
            }
            Ok(())
        }
        Commands::Read => {
            bank.refresh();
            print_statuses(&bank.status(store), json_out);
            Ok(())
        }
        Commands::Monitor { hz, cycles } => {
            monitor(&mut bank, store, *hz, *cycles, json_out, &shutdown, &clock);
            Ok(())
        }
        Commands::Calibrate { joint, dry_run } => {
            let id = store
                .find(joint)
                .ok_or_else(|| eyre::eyre!("unknown joint {joint:?}"))?;
            let encoder = bank
                .get_mut(id)
                .ok_or_else(|| eyre::eyre!("unknown joint {joint:?}"))?;
            let null = encoder.calibrate_null_angle(store)?;
            let variance = encoder.last_variance();
            if !*dry_run {
                store
                    .persist_null_angle(id, null)
                    .wrap_err("save calibrated config")?;
                info!(joint = %joint, null_deg = null, "null angle saved");
            }
            if json_out {
                println!(
                    "{}",
                    json!({
                        "joint": joint,
                        "null_deg": null,
                        "variance_deg2": variance,
                        "saved": !*dry_run,
                    })
                );
            } else {
                let target = if *dry_run {
                    "not saved (dry run)".to_string()
                } else {
                    store
                        .path()
                        .map_or_else(String::new, |p| format!("saved to {}", p.display()))
                };
                println!("{joint}: null angle {null:.3} deg, {target}");
            }
            Ok(())
        }
    }
}

fn monitor<B: AngleSensorBus>(
    bank: &mut JointBank<B>,
    store: &ConfigStore,
    hz: u32,
    cycles: Option<u64>,
    json_out: bool,
    shutdown: &AtomicBool,
    clock: &impl Clock,
) {
    let period = Duration::from_secs(1) / hz.max(1);
    let mut done = 0u64;
    while !shutdown.load(Ordering::Relaxed) && cycles.is_none_or(|n| done < n) {
        let started = clock.now();
        bank.refresh();
        let statuses = bank.status(store);
        if json_out {
            let joints: Vec<_> = statuses.iter().map(status_json).collect();
            println!("{}", json!({ "cycle": done, "joints": joints }));
        } else {
            let line: Vec<String> = statuses
                .iter()
                .map(|s| {
                    format!(
                        "{}={:.2}{}",
                        s.name,
                        s.angle_deg,
                        if s.ok { "" } else { "!" }
                    )
                })
                .collect();
            println!("{done:>6} {}", line.join("  "));
        }
        done += 1;
        let spent = clock.now().saturating_duration_since(started);
        clock.sleep(period.saturating_sub(spent));
    }
    info!(cycles = done, "monitor stopped");
}
