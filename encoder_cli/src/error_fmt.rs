//! Human-readable error descriptions and structured JSON error formatting.

use crate::run::Unhealthy;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use encoder_core::error::{BuildError, EncoderError};

    if let Some(u) = err.downcast_ref::<Unhealthy>() {
        return format!(
            "What happened: {u}.\nLikely causes: A sensor is missing, noisy, or shares its address with another sensor.\nHow to fix: Re-run with --log-level=info to see which step failed for each joint."
        );
    }

    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingBus => {
                "What happened: No bus was provided to the encoder.\nLikely causes: The I2C bus failed to open or was not wired into the builder.\nHow to fix: Check bus.i2c_bus in the config and that the I2C interface is enabled.".to_string()
            }
            BuildError::MissingConfig | BuildError::MissingSetup => format!(
                "What happened: Encoder is incomplete ({be}).\nLikely causes: The joint was not bound to its config record.\nHow to fix: Build encoders with for_joint(store, id)."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the [encoder] section, then rerun."
            ),
        };
    }

    if let Some(ee) = err.downcast_ref::<EncoderError>() {
        return match ee {
            EncoderError::Timeout => "What happened: Sensor read timed out.\nLikely causes: Loose SDA/SCL wiring, missing pull-ups, or timeout too low.\nHow to fix: Check the wiring and consider raising bus.read_timeout_ms.".to_string(),
            EncoderError::TooNoisy { variance, threshold } => format!(
                "What happened: Sensor reading is too noisy (variance {variance:.4} deg^2, limit {threshold}).\nLikely causes: The joint was moving, the magnet is misaligned, or the sensor is failing.\nHow to fix: Hold the joint still and retry; check magnet distance and centering."
            ),
            EncoderError::AddressProgramming(msg) => format!(
                "What happened: Could not move a sensor to its second address ({msg}).\nLikely causes: The companion sensor is not on the switched rail, or the rail pin is wrong.\nHow to fix: Check bus.power_pin and which joint has program_i2c_address = true."
            ),
            EncoderError::PowerRail(msg) => format!(
                "What happened: Companion power rail could not be switched ({msg}).\nLikely causes: Wrong GPIO pin or insufficient GPIO permissions.\nHow to fix: Fix bus.power_pin; ensure the process may access GPIO."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("unknown joint") {
        return format!(
            "What happened: {msg}.\nHow to fix: Use one of the [[joints]] names from the config."
        );
    }

    if lower.contains("read config") {
        let cause = err.source().map(|s| format!(" Cause: {s}")).unwrap_or_default();
        return format!(
            "What happened: {msg}.{cause}\nHow to fix: Pass --config with a readable TOML file (see etc/encoder.toml)."
        );
    }

    if lower.contains("invalid configuration")
        || lower.contains("must be")
        || lower.contains("duplicate")
        || lower.contains("end up at address")
        || lower.contains("joints[")
    {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("csv must have headers") {
        return "Invalid headers in null-angle CSV. Expected 'joint,null_angle_deg'.".to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes; 2 is left to clap for usage errors.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use encoder_core::error::EncoderError;
    if err.downcast_ref::<Unhealthy>().is_some() {
        return 3;
    }
    match err.downcast_ref::<EncoderError>() {
        Some(EncoderError::TooNoisy { .. }) => 4,
        Some(EncoderError::AddressProgramming(_) | EncoderError::PowerRail(_)) => 5,
        Some(EncoderError::Communication(_) | EncoderError::Timeout) => 6,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    use encoder_core::error::EncoderError;
    if err.downcast_ref::<Unhealthy>().is_some() {
        return "Unhealthy";
    }
    match err.downcast_ref::<EncoderError>() {
        Some(EncoderError::TooNoisy { .. }) => "TooNoisy",
        Some(EncoderError::AddressProgramming(_)) => "AddressProgramming",
        Some(EncoderError::PowerRail(_)) => "PowerRail",
        Some(EncoderError::Communication(_)) => "Communication",
        Some(EncoderError::Timeout) => "Timeout",
        _ => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use encoder_core::error::EncoderError;
    use serde_json::json;

    let msg = humanize(err);
    let details = match err.downcast_ref::<EncoderError>() {
        Some(EncoderError::TooNoisy {
            variance,
            threshold,
        }) => Some(json!({ "variance_deg2": variance, "threshold_deg2": threshold })),
        _ => err
            .downcast_ref::<Unhealthy>()
            .map(|u| json!({ "joints": u.joints })),
    };
    match details {
        Some(d) => json!({ "reason": reason_name(err), "details": d, "message": msg }),
        None => json!({ "reason": reason_name(err), "message": msg }),
    }
    .to_string()
}
