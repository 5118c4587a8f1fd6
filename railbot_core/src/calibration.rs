//! IR calibration engine.
//!
//! Each side of the robot carries a sensor pair straddling the wheel. When the
//! robot sits square to the rail, the pair difference plus that side's offset is
//! zero and the pair mean equals that side's good distance. The back pair faces
//! the rail behind the robot and is driven toward stored targets with per-wheel
//! nudges.
//!
//! None of the loops here carries an iteration cap; they end on convergence or
//! the stop signal.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use railbot_traits::{Clock, IrChannel, IrSensors, StopSignal};

use crate::config::CalibrationCfg;
use crate::drive::{DriveStrategy, PivotDirection};
use crate::error::{RailError, Result, SelectorError};
use crate::sampler::SensorSampler;

/// A side of the robot with a front sensor pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Pair ordered (sensor left of the wheel, sensor right of the wheel).
    pub fn pair(self) -> (IrChannel, IrChannel) {
        match self {
            Side::Left => (IrChannel::LeftFrontA, IrChannel::LeftFrontB),
            Side::Right => (IrChannel::RightFrontB, IrChannel::RightFrontA),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }
}

/// Offsets and targets learned during a session. Not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CalibrationProfile {
    pub left_offset: i32,
    pub right_offset: i32,
    pub good_distance_left: i32,
    pub good_distance_right: i32,
    pub back_left_target: i32,
    pub back_right_target: i32,
    /// Left pair mean recorded by `cross_correct_back_from_left`, consumed by
    /// `cross_correct_left_from_left`.
    pub left_distance_after_one_forward: Option<i32>,
}

impl CalibrationProfile {
    pub fn offset(&self, side: Side) -> i32 {
        match side {
            Side::Left => self.left_offset,
            Side::Right => self.right_offset,
        }
    }

    pub fn good_distance(&self, side: Side) -> i32 {
        match side {
            Side::Left => self.good_distance_left,
            Side::Right => self.good_distance_right,
        }
    }
}

/// The closed set of calibration operations reachable by selector text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationCommand {
    SideLeft,
    SideRight,
    BackAlign,
    CrossCorrectLeft,
    CrossCorrectBack,
}

impl CalibrationCommand {
    pub const ALL: [CalibrationCommand; 5] = [
        CalibrationCommand::SideLeft,
        CalibrationCommand::SideRight,
        CalibrationCommand::BackAlign,
        CalibrationCommand::CrossCorrectLeft,
        CalibrationCommand::CrossCorrectBack,
    ];

    pub fn selector(self) -> &'static str {
        match self {
            CalibrationCommand::SideLeft => "L",
            CalibrationCommand::SideRight => "R",
            CalibrationCommand::BackAlign => "B",
            CalibrationCommand::CrossCorrectLeft => "l",
            CalibrationCommand::CrossCorrectBack => "b",
        }
    }
}

/// Front alignment has a selector on the wire but no operation behind it.
const RESERVED_FRONT_SELECTOR: &str = "F";

impl FromStr for CalibrationCommand {
    type Err = SelectorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "L" => Ok(CalibrationCommand::SideLeft),
            "R" => Ok(CalibrationCommand::SideRight),
            "B" => Ok(CalibrationCommand::BackAlign),
            "l" => Ok(CalibrationCommand::CrossCorrectLeft),
            "b" => Ok(CalibrationCommand::CrossCorrectBack),
            RESERVED_FRONT_SELECTOR => Err(SelectorError::Reserved(s.to_string())),
            other => Err(SelectorError::Unknown(other.to_string())),
        }
    }
}

/// Reply of a calibration request. Displays as its wire token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationReply {
    /// Side alignment finished; `true` when the pair mean is near the good distance.
    Aligned(bool),
    Done,
    Bad,
}

impl CalibrationReply {
    pub const SUCCESS: &'static str = "1";
    pub const FAILURE: &'static str = "BAD";

    pub fn token(self) -> &'static str {
        match self {
            CalibrationReply::Aligned(true) | CalibrationReply::Done => Self::SUCCESS,
            CalibrationReply::Aligned(false) => "0",
            CalibrationReply::Bad => Self::FAILURE,
        }
    }
}

impl fmt::Display for CalibrationReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Nudge tier for one back sensor: positive when the sensor reads above its
/// target, negative below, 0 within the dead band.
pub fn back_tier(reading: i32, target: i32, cfg: &CalibrationCfg) -> i8 {
    let error = reading - target;
    if error > cfg.threshold_for_big_nudge {
        2
    } else if error > cfg.back_calibration_threshold {
        1
    } else if -error > cfg.threshold_for_big_nudge {
        -2
    } else if -error > cfg.back_calibration_threshold {
        -1
    } else {
        0
    }
}

/// Pivot needed to cancel a corrected side difference, or `None` when aligned.
pub fn side_pivot(difference: i32, cfg: &CalibrationCfg) -> Option<(PivotDirection, u8)> {
    if difference.abs() <= cfg.side_pivot_threshold {
        None
    } else if difference > cfg.threshold_for_big_pivot {
        Some((PivotDirection::Right, 2))
    } else if difference < -cfg.threshold_for_big_pivot {
        Some((PivotDirection::Left, 2))
    } else if difference > 0 {
        Some((PivotDirection::Right, 1))
    } else {
        Some((PivotDirection::Left, 1))
    }
}

/// `round(multiplier * delta)`, halves away from zero.
fn scaled(multiplier: f64, delta: i32) -> i32 {
    (multiplier * f64::from(delta)).round() as i32
}

pub struct CalibrationEngine<D, S> {
    drive: D,
    sampler: SensorSampler<S>,
    cfg: CalibrationCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    stop: Arc<dyn StopSignal>,
    profile: CalibrationProfile,
}

impl<D: DriveStrategy, S: IrSensors> CalibrationEngine<D, S> {
    pub fn new(
        drive: D,
        sensors: S,
        cfg: CalibrationCfg,
        clock: Arc<dyn Clock + Send + Sync>,
        stop: Arc<dyn StopSignal>,
    ) -> Self {
        let sampler = SensorSampler::new(sensors, cfg.sample_count);
        Self {
            drive,
            sampler,
            cfg,
            clock,
            stop,
            profile: CalibrationProfile::default(),
        }
    }

    pub fn profile(&self) -> &CalibrationProfile {
        &self.profile
    }

    /// Replace the profile, e.g. with values measured in an earlier session.
    pub fn set_profile(&mut self, profile: CalibrationProfile) {
        self.profile = profile;
    }

    pub fn drive(&self) -> &D {
        &self.drive
    }

    pub fn drive_mut(&mut self) -> &mut D {
        &mut self.drive
    }

    pub fn sampler_mut(&mut self) -> &mut SensorSampler<S> {
        &mut self.sampler
    }

    fn side_mean(&mut self, side: Side) -> Result<i32> {
        let (a, b) = self.sampler.sample_pair(side.pair())?;
        Ok((a + b) / 2)
    }

    /// Take the current pose as square: store the offset that zeroes the pair
    /// difference and the pair mean as the good distance.
    pub fn compute_side_offset(&mut self, side: Side) -> Result<()> {
        let (first, second) = self.sampler.sample_pair(side.pair())?;
        let offset = -(first - second);
        let good = (first + second) / 2;
        match side {
            Side::Left => {
                self.profile.left_offset = offset;
                self.profile.good_distance_left = good;
            }
            Side::Right => {
                self.profile.right_offset = offset;
                self.profile.good_distance_right = good;
            }
        }
        tracing::info!(side = side.as_str(), offset, good_distance = good, "side offset");
        Ok(())
    }

    /// Take the current back readings as the targets.
    pub fn compute_back_targets(&mut self) -> Result<()> {
        let left = self.sampler.sample(IrChannel::BackLeft)?;
        let right = self.sampler.sample(IrChannel::BackRight)?;
        self.profile.back_left_target = left;
        self.profile.back_right_target = right;
        tracing::info!(left, right, "back targets");
        Ok(())
    }

    /// Pivot until the corrected pair difference is within the threshold, then
    /// report whether the pair mean is near the good distance.
    pub fn align_side(&mut self, side: Side) -> Result<bool> {
        let offset = self.profile.offset(side);
        let mut pivots = 0_u32;
        loop {
            if self.stop.stop_requested() {
                tracing::info!(side = side.as_str(), pivots, "side alignment stopped");
                break;
            }
            let (first, second) = self.sampler.sample_pair(side.pair())?;
            let difference = first - second + offset;
            let Some((direction, magnitude)) = side_pivot(difference, &self.cfg) else {
                break;
            };
            tracing::debug!(side = side.as_str(), difference, ?direction, magnitude, "side pivot");
            self.drive.small_pivot(direction, magnitude)?;
            pivots += 1;
        }
        let distance = self.side_mean(side)?;
        let good = self.profile.good_distance(side);
        let aligned = (distance - good).abs() < self.cfg.threshold_for_side_distance;
        tracing::info!(
            side = side.as_str(),
            pivots,
            distance,
            good_distance = good,
            aligned,
            "side aligned"
        );
        Ok(aligned)
    }

    /// Nudge each wheel until both back readings sit within the dead band of
    /// their targets.
    pub fn align_back(&mut self) -> Result<()> {
        let mut nudges = 0_u32;
        loop {
            if self.stop.stop_requested() {
                tracing::info!(nudges, "back alignment stopped");
                return Ok(());
            }
            let left = self.sampler.sample(IrChannel::BackLeft)?;
            let right = self.sampler.sample(IrChannel::BackRight)?;
            let left_tier = back_tier(left, self.profile.back_left_target, &self.cfg);
            let right_tier = back_tier(right, self.profile.back_right_target, &self.cfg);
            if left_tier == 0 && right_tier == 0 {
                tracing::info!(nudges, left, right, "back aligned");
                return Ok(());
            }
            tracing::debug!(left, right, left_tier, right_tier, "back nudge");
            self.drive.nudge(left_tier, right_tier)?;
            nudges += 1;
        }
    }

    /// Shift the back targets against the left drift seen after a forward move,
    /// re-square the left side and record the resulting left distance.
    pub fn cross_correct_back_from_left(&mut self) -> Result<()> {
        let measured = self.side_mean(Side::Left)?;
        let amount = scaled(
            self.cfg.left_correct_multiplier / 2.0,
            measured - self.profile.good_distance_left,
        );
        self.profile.back_left_target -= amount;
        self.profile.back_right_target += amount;
        tracing::info!(
            measured,
            amount,
            back_left_target = self.profile.back_left_target,
            back_right_target = self.profile.back_right_target,
            "back targets corrected from left drift"
        );
        self.align_side(Side::Left)?;
        self.clock.sleep_ms(self.cfg.motor_settle_ms);
        let recorded = self.side_mean(Side::Left)?;
        self.profile.left_distance_after_one_forward = Some(recorded);
        tracing::debug!(recorded, "left distance after one forward");
        Ok(())
    }

    /// Fold the left drift since `cross_correct_back_from_left` into the left
    /// offset and re-square the left side.
    pub fn cross_correct_left_from_left(&mut self) -> Result<()> {
        let Some(reference) = self.profile.left_distance_after_one_forward else {
            return Err(eyre::Report::new(RailError::State(
                "left distance after one forward has not been recorded".into(),
            )));
        };
        let measured = self.side_mean(Side::Left)?;
        let correction = scaled(self.cfg.left_correct_multiplier, measured - reference);
        self.profile.left_offset += correction;
        tracing::info!(
            measured,
            reference,
            correction,
            left_offset = self.profile.left_offset,
            "left offset corrected"
        );
        self.align_side(Side::Left)?;
        Ok(())
    }

    /// Run one calibration operation. On error the profile is restored to its
    /// state before the call.
    pub fn calibrate(&mut self, command: CalibrationCommand) -> Result<CalibrationReply> {
        let snapshot = self.profile;
        let result = match command {
            CalibrationCommand::SideLeft => self.align_side(Side::Left).map(CalibrationReply::Aligned),
            CalibrationCommand::SideRight => {
                self.align_side(Side::Right).map(CalibrationReply::Aligned)
            }
            CalibrationCommand::BackAlign => self.align_back().map(|()| CalibrationReply::Done),
            CalibrationCommand::CrossCorrectLeft => self
                .cross_correct_left_from_left()
                .map(|()| CalibrationReply::Done),
            CalibrationCommand::CrossCorrectBack => self
                .cross_correct_back_from_left()
                .map(|()| CalibrationReply::Done),
        };
        if result.is_err() {
            self.profile = snapshot;
        }
        result
    }

    /// Text surface of `calibrate`: never fails, every failure is `Bad`.
    pub fn calibrate_text(&mut self, selector: &str) -> CalibrationReply {
        let command = match selector.parse::<CalibrationCommand>() {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "calibration request rejected");
                return CalibrationReply::Bad;
            }
        };
        match self.calibrate(command) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!(selector, error = %e, "calibration failed");
                CalibrationReply::Bad
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selectors_parse_and_round_trip() {
        for c in CalibrationCommand::ALL {
            assert_eq!(c.selector().parse::<CalibrationCommand>(), Ok(c));
        }
        assert_eq!(
            "F".parse::<CalibrationCommand>(),
            Err(SelectorError::Reserved("F".into()))
        );
        assert!(matches!(
            "x".parse::<CalibrationCommand>(),
            Err(SelectorError::Unknown(_))
        ));
    }

    #[test]
    fn reply_tokens() {
        assert_eq!(CalibrationReply::Aligned(true).to_string(), "1");
        assert_eq!(CalibrationReply::Aligned(false).to_string(), "0");
        assert_eq!(CalibrationReply::Done.to_string(), "1");
        assert_eq!(CalibrationReply::Bad.to_string(), "BAD");
    }

    #[test]
    fn side_pivot_tiers() {
        let cfg = CalibrationCfg::default();
        assert_eq!(side_pivot(8, &cfg), None);
        assert_eq!(side_pivot(-8, &cfg), None);
        assert_eq!(side_pivot(9, &cfg), Some((PivotDirection::Right, 1)));
        assert_eq!(side_pivot(50, &cfg), Some((PivotDirection::Right, 1)));
        assert_eq!(side_pivot(51, &cfg), Some((PivotDirection::Right, 2)));
        assert_eq!(side_pivot(-9, &cfg), Some((PivotDirection::Left, 1)));
        assert_eq!(side_pivot(-51, &cfg), Some((PivotDirection::Left, 2)));
    }

    #[test]
    fn scaled_rounds_half_away_from_zero() {
        assert_eq!(scaled(0.2, 10), 2);
        assert_eq!(scaled(0.5, 5), 3);
        assert_eq!(scaled(0.5, -5), -3);
        assert_eq!(scaled(0.2, 7), 1);
        // Half of the multiplier applied to an odd drift: 0.1 * 25 = 2.5 -> 3
        assert_eq!(scaled(0.1, 25), 3);
    }

    #[test]
    fn right_pair_is_back_sensor_first() {
        assert_eq!(
            Side::Right.pair(),
            (IrChannel::RightFrontB, IrChannel::RightFrontA)
        );
    }
}
