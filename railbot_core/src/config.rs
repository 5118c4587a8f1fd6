//! Runtime configuration types for the drive and calibration engines.
//!
//! These are the structs the control code reads at runtime. They are separate
//! from the TOML-deserialized config in `railbot_config`; see `conversions`.

/// Velocity-profile and adaptive-ratio parameters of the master/slave drive.
#[derive(Debug, Clone)]
pub struct DriveCfg {
    /// Lowest power that still turns the wheels.
    pub min_power: u16,
    /// Highest commandable power.
    pub max_power: u16,
    /// Shaping constant of the profile (NOC); must be > 2.
    pub chunks: f64,
    /// Encoder target of a forward move.
    pub forward_distance: i64,
    /// Distance between the wheels, in encoder units.
    pub wheel_width: f64,
    /// Wall-clock cap of one move.
    pub move_time_limit_ms: u64,
    /// Weight of the previous ratio in the blended update. Range: [0.0, 1.0).
    pub ratio_weight: f64,
    /// Ratio used before any move has been observed.
    pub starting_ratio: f64,
    /// Slave travel at or below this leaves the ratio untouched.
    pub ratio_noise_floor: i64,
    /// Pause between commanding power and reading the encoders.
    pub settle_ms: u64,
    /// Pause at the end of every loop iteration.
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

impl DriveCfg {
    /// `max_power - min_power` as a float.
    #[inline]
    pub fn power_range(&self) -> f64 {
        f64::from(self.max_power) - f64::from(self.min_power)
    }

    /// Headroom kept above min and below max so the slave can still be trimmed.
    #[inline]
    pub fn reserve(&self) -> f64 {
        self.power_range() / self.chunks
    }

    /// Encoder distance of a quarter turn in place.
    #[inline]
    pub fn pivot_distance(&self) -> i64 {
        (self.wheel_width * std::f64::consts::PI / 4.0).round() as i64
    }
}

/// Calibration primitive parameters: short open-loop pulses.
#[derive(Debug, Clone)]
pub struct PrimitiveCfg {
    /// Pivot power per magnitude; index 0 is the small pivot.
    pub pivot_powers: Vec<u16>,
    pub pivot_pulse_ms: u64,
    /// Nudge power per tier; index 0 is tier 1.
    pub nudge_powers: Vec<u16>,
    pub nudge_pulse_ms: u64,
    /// Pause after every pulse, with the motors off.
    pub settle_ms: u64,
}

impl Default for PrimitiveCfg {
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

/// Thresholds of the IR calibration routines, in native sensor units.
#[derive(Debug, Clone)]
pub struct CalibrationCfg {
    /// Raw reads averaged per sample.
    pub sample_count: u32,
    /// Back error at or below this is good.
    pub back_calibration_threshold: i32,
    /// Back error above this earns the big nudge.
    pub threshold_for_big_nudge: i32,
    /// Side difference at or below this is aligned.
    pub side_pivot_threshold: i32,
    /// Side difference above this earns the big pivot.
    pub threshold_for_big_pivot: i32,
    /// A side pair mean within this (exclusive) of the good distance is in place.
    pub threshold_for_side_distance: i32,
    /// Share of observed left drift folded into targets and offsets. Range: (0.0, 1.0].
    pub left_correct_multiplier: f64,
    /// Pause before re-measuring after a side alignment.
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
