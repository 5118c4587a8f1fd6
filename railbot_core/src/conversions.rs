//! `From` implementations bridging `railbot_config` types to `railbot_core` types.

use crate::config::{CalibrationCfg, DriveCfg, PrimitiveCfg};

// ── DriveCfg ─────────────────────────────────────────────────────────────────

impl From<&railbot_config::DriveCfg> for DriveCfg {
    fn from(c: &railbot_config::DriveCfg) -> Self {
        Self {
            min_power: c.min_power,
            max_power: c.max_power,
            chunks: c.chunks,
            forward_distance: c.forward_distance,
            wheel_width: c.wheel_width,
            move_time_limit_ms: c.move_time_limit_ms,
            ratio_weight: c.ratio_weight,
            starting_ratio: c.starting_ratio,
            ratio_noise_floor: c.ratio_noise_floor,
            settle_ms: c.settle_ms,
            loop_pause_ms: c.loop_pause_ms,
        }
    }
}

// ── PrimitiveCfg ─────────────────────────────────────────────────────────────

impl From<&railbot_config::PrimitivesCfg> for PrimitiveCfg {
    fn from(c: &railbot_config::PrimitivesCfg) -> Self {
        Self {
            pivot_powers: c.pivot_powers.clone(),
            pivot_pulse_ms: c.pivot_pulse_ms,
            nudge_powers: c.nudge_powers.clone(),
            nudge_pulse_ms: c.nudge_pulse_ms,
            settle_ms: c.settle_ms,
        }
    }
}

// ── CalibrationCfg ───────────────────────────────────────────────────────────

impl From<&railbot_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &railbot_config::CalibrationCfg) -> Self {
        Self {
            sample_count: c.sample_count,
            back_calibration_threshold: c.back_calibration_threshold,
            threshold_for_big_nudge: c.threshold_for_big_nudge,
            side_pivot_threshold: c.side_pivot_threshold,
            threshold_for_big_pivot: c.threshold_for_big_pivot,
            threshold_for_side_distance: c.threshold_for_side_distance,
            left_correct_multiplier: c.left_correct_multiplier,
            motor_settle_ms: c.motor_settle_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_match_runtime_defaults() {
        let file = railbot_config::Config::default();
        let drive = DriveCfg::from(&file.drive);
        let rt = DriveCfg::default();
        assert_eq!(drive.min_power, rt.min_power);
        assert_eq!(drive.max_power, rt.max_power);
        assert_eq!(drive.forward_distance, rt.forward_distance);
        let cal = CalibrationCfg::from(&file.calibration);
        assert_eq!(cal.sample_count, CalibrationCfg::default().sample_count);
        let prim = PrimitiveCfg::from(&file.primitives);
        assert_eq!(prim.pivot_powers, PrimitiveCfg::default().pivot_powers);
    }
}
