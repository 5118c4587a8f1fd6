#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the rail robot.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - Every section is optional; omitted sections fall back to the values the
//!   robot was tuned with.
use serde::Deserialize;

/// Raspberry Pi wiring for the optional hardware backend.
#[derive(Debug, Deserialize, Clone)]
pub struct Pins {
    pub left_pwm_channel: u8,
    pub right_pwm_channel: u8,
    pub left_dir: u8,
    pub right_dir: u8,
    pub left_encoder: u8,
    pub right_encoder: u8,
    /// MCP3008 chip-select on SPI0 (0 or 1)
    pub adc_chip_select: u8,
    pub stop_in: Option<u8>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DriveCfg {
    pub min_power: u16,
    pub max_power: u16,
    /// Number of chunks the power range is divided into; one chunk is
    /// reserved at each end of the master profile.
    pub chunks: f64,
    /// Encoder counts for one forward move.
    pub forward_distance: i64,
    /// Wheel-base width in encoder counts; a quarter pivot is width*pi/4.
    pub wheel_width: f64,
    pub move_time_limit_ms: u64,
    /// Weight kept from the previous slave/master ratio on each update.
    pub ratio_weight: f64,
    pub starting_ratio: f64,
    /// Slave travel (counts) required before the ratio adapts.
    pub ratio_noise_floor: i64,
    pub settle_ms: u64,
    pub loop_pause_ms: u64,
}

impl Default for DriveCfg {
    fn default() -> Self {
        Self {
            min_power: 40,
            max_power: 255,
            chunks: 6.0,
            forward_distance: 1000,
            wheel_width: 600.0,
            move_time_limit_ms: 4000,
            ratio_weight: 0.4,
            starting_ratio: 1.0,
            ratio_noise_floor: 10,
            settle_ms: 2,
            loop_pause_ms: 2,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PrimitivesCfg {
    /// Pivot power per magnitude, weakest first.
    pub pivot_powers: Vec<u16>,
    pub pivot_pulse_ms: u64,
    /// Nudge power per |tier|, weakest first.
    pub nudge_powers: Vec<u16>,
    pub nudge_pulse_ms: u64,
    /// Pause after a pulse so the wheels stop before the next reading.
    pub settle_ms: u64,
}

impl Default for PrimitivesCfg {
    fn default() -> Self {
        Self {
            pivot_powers: vec![70, 110],
            pivot_pulse_ms: 20,
            nudge_powers: vec![70, 110],
            nudge_pulse_ms: 20,
            settle_ms: 40,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CalibrationCfg {
    pub sample_count: u32,
    pub back_calibration_threshold: i32,
    pub threshold_for_big_nudge: i32,
    pub side_pivot_threshold: i32,
    pub threshold_for_big_pivot: i32,
    pub threshold_for_side_distance: i32,
    pub left_correct_multiplier: f64,
    /// Wait for the motors to come to rest after a realignment.
    pub motor_settle_ms: u64,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            sample_count: 300,
            back_calibration_threshold: 5,
            threshold_for_big_nudge: 30,
            side_pivot_threshold: 8,
            threshold_for_big_pivot: 50,
            threshold_for_side_distance: 100,
            left_correct_multiplier: 0.2,
            motor_settle_ms: 200,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StopCfg {
    /// Treat low level as pressed when true
    pub active_low: bool,
}

impl Default for StopCfg {
    fn default() -> Self {
        Self { active_low: true }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Simulated robot used when no hardware backend is compiled in.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SimCfg {
    /// Encoder counts per millisecond at full power, per wheel.
    pub left_gain: f64,
    pub right_gain: f64,
    /// Starting pose relative to the rail.
    pub lateral_mm: f64,
    pub heading_deg: f64,
    pub back_left_gap_mm: f64,
    pub back_right_gap_mm: f64,
    /// Peak-to-peak amplitude of deterministic sensor noise (raw units).
    pub noise: u16,
    pub seed: u64,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            left_gain: 1.0,
            right_gain: 0.9,
            lateral_mm: 60.0,
            heading_deg: 0.0,
            back_left_gap_mm: 50.0,
            back_right_gap_mm: 50.0,
            noise: 0,
            seed: 1,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub pins: Option<Pins>,
    #[serde(default)]
    pub drive: DriveCfg,
    #[serde(default)]
    pub primitives: PrimitivesCfg,
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub stop: StopCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub sim: SimCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read and parse a config file.
pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    load_toml(&text).map_err(|e| eyre::eyre!("invalid configuration in {:?}: {}", path, e))
}

fn validate_levels(name: &str, levels: &[u16], drive: &DriveCfg) -> eyre::Result<()> {
    if levels.len() < 2 {
        eyre::bail!("primitives.{name} needs at least two power levels");
    }
    for p in levels {
        if *p < drive.min_power || *p > drive.max_power {
            eyre::bail!(
                "primitives.{name} level {p} outside [{}, {}]",
                drive.min_power,
                drive.max_power
            );
        }
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Drive
        let d = &self.drive;
        if d.min_power >= d.max_power {
            eyre::bail!("drive.min_power must be < drive.max_power");
        }
        if d.min_power == 0 {
            eyre::bail!("drive.min_power must be > 0");
        }
        if !(d.chunks.is_finite() && d.chunks > 2.0) {
            eyre::bail!("drive.chunks must be > 2");
        }
        if d.forward_distance <= 0 {
            eyre::bail!("drive.forward_distance must be > 0");
        }
        if !(d.wheel_width.is_finite() && d.wheel_width > 0.0) {
            eyre::bail!("drive.wheel_width must be > 0");
        }
        if d.move_time_limit_ms == 0 {
            eyre::bail!("drive.move_time_limit_ms must be >= 1");
        }
        if !(0.0..1.0).contains(&d.ratio_weight) {
            eyre::bail!("drive.ratio_weight must be in [0.0, 1.0)");
        }
        if !(d.starting_ratio.is_finite() && d.starting_ratio > 0.0) {
            eyre::bail!("drive.starting_ratio must be > 0");
        }
        if d.ratio_noise_floor < 0 {
            eyre::bail!("drive.ratio_noise_floor must be >= 0");
        }

        // Primitives
        validate_levels("pivot_powers", &self.primitives.pivot_powers, d)?;
        validate_levels("nudge_powers", &self.primitives.nudge_powers, d)?;
        if self.primitives.pivot_pulse_ms == 0 || self.primitives.nudge_pulse_ms == 0 {
            eyre::bail!("primitives pulse durations must be >= 1 ms");
        }

        // Calibration
        let c = &self.calibration;
        if c.sample_count == 0 {
            eyre::bail!("calibration.sample_count must be >= 1");
        }
        if c.back_calibration_threshold <= 0
            || c.threshold_for_big_nudge <= 0
            || c.side_pivot_threshold <= 0
            || c.threshold_for_big_pivot <= 0
            || c.threshold_for_side_distance <= 0
        {
            eyre::bail!("calibration thresholds must be > 0");
        }
        if !(c.left_correct_multiplier > 0.0 && c.left_correct_multiplier <= 1.0) {
            eyre::bail!("calibration.left_correct_multiplier must be in (0.0, 1.0]");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Sim
        if !(self.sim.left_gain > 0.0 && self.sim.right_gain > 0.0) {
            eyre::bail!("sim wheel gains must be > 0");
        }

        Ok(())
    }
}
