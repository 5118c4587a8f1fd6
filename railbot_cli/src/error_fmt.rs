//! Human-readable error descriptions and structured JSON error formatting.

use railbot_core::error::{BuildError, RailError, SelectorError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingMotors => {
                "What happened: No motors were provided to the robot.\nLikely causes: The motor backend failed to initialize or was not wired into the builder.\nHow to fix: Ensure the motor driver is created successfully and passed via with_motors(...).".to_string()
            }
            BuildError::MissingSensors => {
                "What happened: No IR sensors were provided to the robot.\nLikely causes: The ADC backend failed to initialize or was not wired into the builder.\nHow to fix: Ensure the sensor reader is created successfully and passed via with_sensors(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/railbot.toml for a sample."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<SelectorError>() {
        return match se {
            SelectorError::Unknown(s) => format!(
                "What happened: Unknown calibration selector {s:?}.\nLikely causes: A typo, or the wrong letter case.\nHow to fix: Use one of L, R, B, b or l."
            ),
            SelectorError::Reserved(s) => format!(
                "What happened: Calibration selector {s:?} is reserved and does nothing.\nLikely causes: The caller expected the front-sensor routine, which is not implemented.\nHow to fix: Use one of L, R, B, b or l."
            ),
        };
    }

    if let Some(re) = err.downcast_ref::<RailError>() {
        return match re {
            RailError::HardwareFault(detail) => format!(
                "What happened: A hardware device reported a fault ({detail}).\nLikely causes: An IR sensor or ADC channel is disconnected, or an encoder input is dead.\nHow to fix: Check the sensor and encoder wiring, then run `railbot self-check`."
            ),
            RailError::Hardware(detail) => format!(
                "What happened: Talking to the hardware failed ({detail}).\nLikely causes: GPIO, PWM or SPI access was lost or denied.\nHow to fix: Verify permissions and wiring; re-run with --log-level=debug for the failing operation."
            ),
            RailError::State(detail) => format!(
                "What happened: The routine could not run in the current state ({detail}).\nLikely causes: A prerequisite routine has not run in this session.\nHow to fix: Run cross-correct back (`b`) before cross-correct left (`l`)."
            ),
            RailError::Config(detail) => format!(
                "What happened: Configuration error ({detail}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err
        .chain()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open motor pins") || lower.contains("open ir adc") || lower.contains("open stop input") {
        return "What happened: Failed to initialize hardware pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO/SPI permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO and SPI.".to_string();
    }

    if lower.contains("invalid configuration")
        || lower.contains("read config")
        || (lower.contains("pins") && lower.contains("missing"))
    {
        return format!(
            "What happened: Configuration is invalid or incomplete ({msg}).\nLikely causes: A missing file, a missing [pins] section, or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
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

/// Stable exit codes per error class; anything unclassified returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 3;
    }
    if let Some(re) = err.downcast_ref::<RailError>() {
        return match re {
            RailError::Config(_) => 3,
            RailError::Hardware(_) | RailError::HardwareFault(_) => 5,
            RailError::State(_) => 6,
        };
    }
    1
}

/// Stable machine-readable name of the error class.
pub fn error_reason_name(err: &eyre::Report) -> &'static str {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingMotors | BuildError::MissingSensors => "MissingCollaborator",
            BuildError::InvalidConfig(_) => "InvalidConfig",
        };
    }
    if err.downcast_ref::<SelectorError>().is_some() {
        return "BadSelector";
    }
    if let Some(re) = err.downcast_ref::<RailError>() {
        return match re {
            RailError::Hardware(_) => "Hardware",
            RailError::HardwareFault(_) => "HardwareFault",
            RailError::Config(_) => "InvalidConfig",
            RailError::State(_) => "InvalidState",
        };
    }
    "Error"
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    json!({ "reason": error_reason_name(err), "message": humanize(err) }).to_string()
}
