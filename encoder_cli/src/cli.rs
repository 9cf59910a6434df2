//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "encoder", version, about = "Joint angle encoder CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/encoder.toml")]
    pub config: PathBuf,

    /// Optional null-angle CSV (strict header: joint,null_angle_deg)
    #[arg(long, value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// Print results and errors as JSON instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bring up every joint and report its health (exit code 3 if any joint is not ok)
    SelfCheck,
    /// Bring up, read every joint once and print the angles
    Read,
    /// Poll every joint at a fixed rate until Ctrl-C
    Monitor {
        /// Polling rate in Hz
        #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..=1000))]
        hz: u32,
        /// Stop after this many cycles instead of waiting for Ctrl-C
        #[arg(long, value_name = "N")]
        cycles: Option<u64>,
    },
    /// Measure the resting angle of one joint and save it as its null angle
    Calibrate {
        /// Joint name as in the config
        #[arg(long, value_name = "NAME")]
        joint: String,
        /// Measure and print, but do not write the config file
        #[arg(long, action = ArgAction::SetTrue)]
        dry_run: bool,
    },
}
