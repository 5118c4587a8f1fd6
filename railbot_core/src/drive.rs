//! Drive strategies: closed-loop moves plus the short open-loop pulses the
//! calibration routines are built from.
//!
//! `MasterSlaveDrive` profiles the left (master) wheel along a parabola and
//! trims the right (slave) wheel with an adaptive power ratio learned from the
//! encoders. Every move ends with both motors commanded to zero, whatever the
//! loop outcome.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use railbot_traits::{Clock, Direction, MotorPair, StopSignal, Wheel};

use crate::config::{DriveCfg, PrimitiveCfg};
use crate::error::{Result, SelectorError};
use crate::hw_error::hw_report;
use crate::profile;

const MASTER: Wheel = Wheel::Left;
const SLAVE: Wheel = Wheel::Right;

/// A closed-loop movement request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    Forward,
    PivotLeft,
    PivotRight,
}

impl Movement {
    /// Commanded direction of (left, right).
    pub fn directions(self) -> [Direction; 2] {
        match self {
            Movement::Forward => [Direction::Forward, Direction::Forward],
            Movement::PivotLeft => [Direction::Reverse, Direction::Forward],
            Movement::PivotRight => [Direction::Forward, Direction::Reverse],
        }
    }

    /// Encoder target of the master wheel.
    pub fn target(self, cfg: &DriveCfg) -> i64 {
        match self {
            Movement::Forward => cfg.forward_distance,
            Movement::PivotLeft | Movement::PivotRight => cfg.pivot_distance(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Movement::Forward => "forward",
            Movement::PivotLeft => "left",
            Movement::PivotRight => "right",
        }
    }
}

impl FromStr for Movement {
    type Err = SelectorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "F" | "forward" => Ok(Movement::Forward),
            "L" | "left" => Ok(Movement::PivotLeft),
            "R" | "right" => Ok(Movement::PivotRight),
            other => Err(SelectorError::Unknown(other.to_string())),
        }
    }
}

/// Turn sense of an in-place pivot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotDirection {
    Left,
    Right,
}

impl PivotDirection {
    fn directions(self) -> [Direction; 2] {
        match self {
            PivotDirection::Left => Movement::PivotLeft.directions(),
            PivotDirection::Right => Movement::PivotRight.directions(),
        }
    }
}

/// Why a move loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Reached,
    Stopped,
    TimedOut,
}

impl MoveOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            MoveOutcome::Reached => "reached",
            MoveOutcome::Stopped => "stopped",
            MoveOutcome::TimedOut => "timed_out",
        }
    }
}

/// Summary of a completed move.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveReport {
    pub movement: Movement,
    pub outcome: MoveOutcome,
    pub target: i64,
    /// Distance covered by (left, right), measured along the commanded direction.
    pub traveled: [i64; 2],
    /// Last non-zero power commanded on (left, right).
    pub last_power: [u16; 2],
    /// Adaptive ratio after the move.
    pub ratio: f64,
    pub iterations: u32,
    pub elapsed_ms: u64,
}

/// The motion contract the calibration engine is written against.
pub trait DriveStrategy {
    /// Run a closed-loop move. Motors are always off on return.
    fn move_robot(&mut self, movement: Movement) -> Result<MoveReport>;

    /// Short in-place turn. Magnitude 0 does nothing, 1 is the small pivot and
    /// larger magnitudes select stronger levels, saturating at the last one.
    fn small_pivot(&mut self, direction: PivotDirection, magnitude: u8) -> Result<()>;

    /// Short per-wheel pulse. Positive tiers push that wheel forward, negative
    /// tiers backward and 0 leaves it unpowered.
    fn nudge(&mut self, left_tier: i8, right_tier: i8) -> Result<()>;

    /// Record the current encoder counts as the new zero.
    fn reset(&mut self) -> Result<()>;
}

impl<T: DriveStrategy + ?Sized> DriveStrategy for Box<T> {
    fn move_robot(&mut self, movement: Movement) -> Result<MoveReport> {
        (**self).move_robot(movement)
    }
    fn small_pivot(&mut self, direction: PivotDirection, magnitude: u8) -> Result<()> {
        (**self).small_pivot(direction, magnitude)
    }
    fn nudge(&mut self, left_tier: i8, right_tier: i8) -> Result<()> {
        (**self).nudge(left_tier, right_tier)
    }
    fn reset(&mut self) -> Result<()> {
        (**self).reset()
    }
}

/// Power for `magnitude` from an ordered level table; 0 means off.
fn level_power(levels: &[u16], magnitude: u8) -> u16 {
    if magnitude == 0 || levels.is_empty() {
        return 0;
    }
    let idx = usize::from(magnitude).min(levels.len()) - 1;
    levels[idx]
}

pub struct MasterSlaveDrive<M> {
    motors: M,
    cfg: DriveCfg,
    primitives: PrimitiveCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    stop: Arc<dyn StopSignal>,
    ratio: f64,
    baseline: [i64; 2],
}

impl<M: MotorPair> MasterSlaveDrive<M> {
    pub fn new(
        motors: M,
        cfg: DriveCfg,
        primitives: PrimitiveCfg,
        clock: Arc<dyn Clock + Send + Sync>,
        stop: Arc<dyn StopSignal>,
    ) -> Self {
        let ratio = profile::clamp_ratio(&cfg, cfg.starting_ratio);
        Self {
            motors,
            cfg,
            primitives,
            clock,
            stop,
            ratio,
            baseline: [0, 0],
        }
    }

    /// Current adaptive slave/master power ratio.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn drive_cfg(&self) -> &DriveCfg {
        &self.cfg
    }

    pub fn motors_mut(&mut self) -> &mut M {
        &mut self.motors
    }

    fn set(&mut self, wheel: Wheel, power: u16, direction: Direction) -> Result<()> {
        self.motors
            .set_power(wheel, power, direction)
            .map_err(|e| hw_report(e, "set_power"))
    }

    fn encoder(&mut self, wheel: Wheel) -> Result<i64> {
        self.motors
            .read_encoder(wheel)
            .map_err(|e| hw_report(e, "reading encoder"))
    }

    /// Command zero power on both wheels. Both are attempted; the first
    /// failure is returned.
    pub fn halt(&mut self) -> Result<()> {
        let left = self.set(Wheel::Left, 0, Direction::Forward);
        let right = self.set(Wheel::Right, 0, Direction::Forward);
        left.and(right)
    }

    /// Run `body` with the motors, then halt regardless of its outcome.
    /// An error from `body` takes precedence over a halt failure.
    fn guarded<T>(&mut self, body: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let result = body(self);
        let halted = self.halt();
        match (result, halted) {
            (Ok(v), Ok(())) => Ok(v),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(halt_err)) => {
                tracing::warn!(error = %halt_err, "motor halt failed after drive error");
                Err(e)
            }
        }
    }

    fn run_profile(&mut self, movement: Movement) -> Result<MoveReport> {
        self.reset()?;
        let dirs = movement.directions();
        let target = movement.target(&self.cfg);
        let start = self.clock.now();
        let deadline = start + Duration::from_millis(self.cfg.move_time_limit_ms);

        let mut traveled = [0_i64; 2];
        let mut power = [0_u16; 2];
        let mut iterations = 0_u32;

        let outcome = loop {
            if traveled[MASTER.index()] >= target {
                break MoveOutcome::Reached;
            }
            if self.stop.stop_requested() {
                break MoveOutcome::Stopped;
            }
            if self.clock.now() >= deadline {
                break MoveOutcome::TimedOut;
            }
            iterations += 1;

            let r = profile::progress(traveled[MASTER.index()], target);
            power[MASTER.index()] = profile::master_power(&self.cfg, r);
            power[SLAVE.index()] =
                profile::slave_power(&self.cfg, power[MASTER.index()], self.ratio);
            for w in Wheel::ALL {
                self.set(w, power[w.index()], dirs[w.index()])?;
            }
            self.clock.sleep_ms(self.cfg.settle_ms);

            for w in Wheel::ALL {
                let count = self.encoder(w)?;
                traveled[w.index()] = (count - self.baseline[w.index()]) * dirs[w.index()].sign();
            }
            self.ratio = profile::update_ratio(
                &self.cfg,
                self.ratio,
                traveled[MASTER.index()],
                traveled[SLAVE.index()],
            );
            tracing::trace!(
                r,
                master_power = power[MASTER.index()],
                slave_power = power[SLAVE.index()],
                master_traveled = traveled[MASTER.index()],
                slave_traveled = traveled[SLAVE.index()],
                ratio = self.ratio,
                "drive step"
            );
            self.clock.sleep_ms(self.cfg.loop_pause_ms);
        };

        Ok(MoveReport {
            movement,
            outcome,
            target,
            traveled,
            last_power: power,
            ratio: self.ratio,
            iterations,
            elapsed_ms: self.clock.ms_since(start),
        })
    }

    fn pulse(&mut self, powers: [u16; 2], dirs: [Direction; 2], pulse_ms: u64) -> Result<()> {
        self.guarded(|d| {
            for w in Wheel::ALL {
                d.set(w, powers[w.index()], dirs[w.index()])?;
            }
            d.clock.sleep_ms(pulse_ms);
            Ok(())
        })?;
        self.clock.sleep_ms(self.primitives.settle_ms);
        Ok(())
    }
}

impl<M: MotorPair> DriveStrategy for MasterSlaveDrive<M> {
    fn move_robot(&mut self, movement: Movement) -> Result<MoveReport> {
        let report = self.guarded(|d| d.run_profile(movement))?;
        tracing::info!(
            movement = movement.as_str(),
            outcome = report.outcome.as_str(),
            target = report.target,
            left = report.traveled[0],
            right = report.traveled[1],
            ratio = report.ratio,
            iterations = report.iterations,
            elapsed_ms = report.elapsed_ms,
            "move finished"
        );
        Ok(report)
    }

    fn small_pivot(&mut self, direction: PivotDirection, magnitude: u8) -> Result<()> {
        let power = level_power(&self.primitives.pivot_powers, magnitude);
        if power == 0 {
            return Ok(());
        }
        tracing::debug!(?direction, magnitude, power, "pivot pulse");
        let pulse_ms = self.primitives.pivot_pulse_ms;
        self.pulse([power, power], direction.directions(), pulse_ms)
    }

    fn nudge(&mut self, left_tier: i8, right_tier: i8) -> Result<()> {
        let tiers = [left_tier, right_tier];
        let powers = tiers.map(|t| level_power(&self.primitives.nudge_powers, t.unsigned_abs()));
        if powers == [0, 0] {
            return Ok(());
        }
        let dirs = tiers.map(|t| Direction::from_sign(i64::from(t)));
        tracing::debug!(left_tier, right_tier, ?powers, "nudge pulse");
        let pulse_ms = self.primitives.nudge_pulse_ms;
        self.pulse(powers, dirs, pulse_ms)
    }

    fn reset(&mut self) -> Result<()> {
        for w in Wheel::ALL {
            self.baseline[w.index()] = self.encoder(w)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{PowerCommand, RecordingMotors};
    use railbot_traits::{ManualClock, NeverStop};

    fn drive(motors: RecordingMotors) -> MasterSlaveDrive<RecordingMotors> {
        MasterSlaveDrive::new(
            motors,
            DriveCfg::default(),
            PrimitiveCfg::default(),
            Arc::new(ManualClock::new()),
            Arc::new(NeverStop),
        )
    }

    #[test]
    fn level_table_saturates() {
        let levels = [70, 110];
        assert_eq!(level_power(&levels, 0), 0);
        assert_eq!(level_power(&levels, 1), 70);
        assert_eq!(level_power(&levels, 2), 110);
        assert_eq!(level_power(&levels, 9), 110);
        assert_eq!(level_power(&[], 1), 0);
    }

    #[test]
    fn movement_selectors() {
        assert_eq!("F".parse::<Movement>(), Ok(Movement::Forward));
        assert_eq!("left".parse::<Movement>(), Ok(Movement::PivotLeft));
        assert!("B".parse::<Movement>().is_err());
    }

    #[test]
    fn pivot_target_is_quarter_wheel_circumference() {
        // round(600 * pi / 4) = round(471.24)
        assert_eq!(Movement::PivotLeft.target(&DriveCfg::default()), 471);
    }

    #[test]
    fn nudge_drives_each_wheel_by_tier_sign() {
        let motors = RecordingMotors::new();
        let mut d = drive(motors.clone());
        d.nudge(2, -1).unwrap();
        let cmds = motors.commands();
        assert_eq!(
            cmds[0],
            PowerCommand {
                wheel: Wheel::Left,
                power: 110,
                direction: Direction::Forward
            }
        );
        assert_eq!(
            cmds[1],
            PowerCommand {
                wheel: Wheel::Right,
                power: 70,
                direction: Direction::Reverse
            }
        );
        assert_eq!(motors.applied().map(|(p, _)| p), [0, 0]);
    }

    #[test]
    fn zero_nudge_issues_nothing() {
        let motors = RecordingMotors::new();
        let mut d = drive(motors.clone());
        d.nudge(0, 0).unwrap();
        assert!(motors.commands().is_empty());
    }

    #[test]
    fn pivot_right_spins_wheels_oppositely() {
        let motors = RecordingMotors::new();
        let mut d = drive(motors.clone());
        d.small_pivot(PivotDirection::Right, 1).unwrap();
        let cmds = motors.commands();
        assert_eq!(cmds[0].direction, Direction::Forward);
        assert_eq!(cmds[1].direction, Direction::Reverse);
        assert_eq!(cmds[0].power, 70);
    }
}
