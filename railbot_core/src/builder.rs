//! Type-state builder for `Robot` and generic `build_engine` constructor.
//!
//! The builder enforces at compile time that motors and IR sensors are provided
//! before `build()` is available. `try_build()` is always available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use railbot_traits::{Clock, IrSensors, MonotonicClock, MotorPair, NeverStop, StopSignal};

use crate::calibration::{CalibrationCommand, CalibrationEngine, CalibrationProfile, CalibrationReply, Side};
use crate::config::{CalibrationCfg, DriveCfg, PrimitiveCfg};
use crate::drive::{DriveStrategy, MasterSlaveDrive, Movement, MoveReport};
use crate::error::{BuildError, Result};

// ── Public dynamic-dispatch wrapper ──────────────────────────────────────────

type DynEngine = CalibrationEngine<MasterSlaveDrive<Box<dyn MotorPair>>, Box<dyn IrSensors>>;

/// A fully wired robot: master/slave drive plus calibration engine over boxed
/// collaborators.
pub struct Robot {
    pub(crate) inner: DynEngine,
}

impl core::fmt::Debug for Robot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Robot")
            .field("profile", self.inner.profile())
            .finish_non_exhaustive()
    }
}

impl Robot {
    /// Start building a Robot.
    pub fn builder() -> RobotBuilder<Missing, Missing> {
        RobotBuilder::default()
    }

    pub fn move_robot(&mut self, movement: Movement) -> Result<MoveReport> {
        self.inner.drive_mut().move_robot(movement)
    }

    /// Current adaptive slave/master power ratio.
    pub fn ratio(&self) -> f64 {
        self.inner.drive().ratio()
    }

    pub fn compute_side_offset(&mut self, side: Side) -> Result<()> {
        self.inner.compute_side_offset(side)
    }

    pub fn compute_back_targets(&mut self) -> Result<()> {
        self.inner.compute_back_targets()
    }

    pub fn calibrate(&mut self, command: CalibrationCommand) -> Result<CalibrationReply> {
        self.inner.calibrate(command)
    }

    pub fn calibrate_text(&mut self, selector: &str) -> CalibrationReply {
        self.inner.calibrate_text(selector)
    }

    pub fn profile(&self) -> &CalibrationProfile {
        self.inner.profile()
    }

    /// Command zero power on both wheels.
    pub fn halt(&mut self) -> Result<()> {
        self.inner.drive_mut().halt()
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Robot`. All fields are validated on `build()`.
pub struct RobotBuilder<M, S> {
    motors: Option<Box<dyn MotorPair>>,
    sensors: Option<Box<dyn IrSensors>>,
    drive: Option<DriveCfg>,
    primitives: Option<PrimitiveCfg>,
    calibration: Option<CalibrationCfg>,
    profile: Option<CalibrationProfile>,
    stop: Option<Arc<dyn StopSignal>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    _m: PhantomData<M>,
    _s: PhantomData<S>,
}

impl Default for RobotBuilder<Missing, Missing> {
    fn default() -> Self {
        Self {
            motors: None,
            sensors: None,
            drive: None,
            primitives: None,
            calibration: None,
            profile: None,
            stop: None,
            clock: None,
            _m: PhantomData,
            _s: PhantomData,
        }
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

/// Reject runtime configs the control loops cannot run with.
pub fn validate(drive: &DriveCfg, primitives: &PrimitiveCfg, calibration: &CalibrationCfg) -> Result<()> {
    if drive.min_power == 0 || drive.min_power >= drive.max_power {
        return Err(invalid("power range must satisfy 0 < min_power < max_power"));
    }
    if !(drive.chunks.is_finite() && drive.chunks > 2.0) {
        return Err(invalid("chunks must be > 2"));
    }
    if drive.forward_distance <= 0 {
        return Err(invalid("forward_distance must be > 0"));
    }
    if !(drive.wheel_width.is_finite() && drive.wheel_width > 0.0) {
        return Err(invalid("wheel_width must be > 0"));
    }
    if drive.move_time_limit_ms == 0 {
        return Err(invalid("move_time_limit_ms must be >= 1"));
    }
    if !(0.0..1.0).contains(&drive.ratio_weight) {
        return Err(invalid("ratio_weight must be in [0, 1)"));
    }
    if !(drive.starting_ratio.is_finite() && drive.starting_ratio > 0.0) {
        return Err(invalid("starting_ratio must be > 0"));
    }
    for levels in [&primitives.pivot_powers, &primitives.nudge_powers] {
        if levels.len() < 2 {
            return Err(invalid("pivot and nudge tables need at least two power levels"));
        }
        if levels
            .iter()
            .any(|p| !(drive.min_power..=drive.max_power).contains(p))
        {
            return Err(invalid("pulse power levels must lie within [min_power, max_power]"));
        }
    }
    if primitives.pivot_pulse_ms == 0 || primitives.nudge_pulse_ms == 0 {
        return Err(invalid("pulse durations must be >= 1 ms"));
    }
    if calibration.sample_count == 0 {
        return Err(invalid("sample_count must be >= 1"));
    }
    if [
        calibration.back_calibration_threshold,
        calibration.threshold_for_big_nudge,
        calibration.side_pivot_threshold,
        calibration.threshold_for_big_pivot,
        calibration.threshold_for_side_distance,
    ]
    .iter()
    .any(|t| *t <= 0)
    {
        return Err(invalid("calibration thresholds must be > 0"));
    }
    if !(calibration.left_correct_multiplier > 0.0 && calibration.left_correct_multiplier <= 1.0) {
        return Err(invalid("left_correct_multiplier must be in (0, 1]"));
    }
    Ok(())
}

/// Validate configuration and construct the engine.
///
/// This is the single source of truth for validation and construction,
/// used by both `RobotBuilder::try_build()` and `build_engine()`.
#[allow(clippy::too_many_arguments)]
fn validate_and_build<M: MotorPair, S: IrSensors>(
    motors: M,
    sensors: S,
    drive: DriveCfg,
    primitives: PrimitiveCfg,
    calibration: CalibrationCfg,
    profile: Option<CalibrationProfile>,
    stop: Option<Arc<dyn StopSignal>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
) -> Result<CalibrationEngine<MasterSlaveDrive<M>, S>> {
    validate(&drive, &primitives, &calibration)?;

    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(c) => c,
        None => Arc::new(MonotonicClock::new()),
    };
    let stop: Arc<dyn StopSignal> = match stop {
        Some(s) => s,
        None => Arc::new(NeverStop),
    };

    let drive = MasterSlaveDrive::new(motors, drive, primitives, clock.clone(), stop.clone());
    let mut engine = CalibrationEngine::new(drive, sensors, calibration, clock, stop);
    if let Some(p) = profile {
        engine.set_profile(p);
    }
    Ok(engine)
}

impl<M, S> RobotBuilder<M, S> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Robot> {
        let motors = self
            .motors
            .ok_or_else(|| eyre::Report::new(BuildError::MissingMotors))?;
        let sensors = self
            .sensors
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSensors))?;

        let inner = validate_and_build(
            motors,
            sensors,
            self.drive.unwrap_or_default(),
            self.primitives.unwrap_or_default(),
            self.calibration.unwrap_or_default(),
            self.profile,
            self.stop,
            self.clock,
        )?;
        Ok(Robot { inner })
    }
}

/// Chainable setters that do not affect type-state.
impl<M, S> RobotBuilder<M, S> {
    pub fn with_drive(mut self, drive: DriveCfg) -> Self {
        self.drive = Some(drive);
        self
    }
    pub fn with_primitives(mut self, primitives: PrimitiveCfg) -> Self {
        self.primitives = Some(primitives);
        self
    }
    pub fn with_calibration(mut self, calibration: CalibrationCfg) -> Self {
        self.calibration = Some(calibration);
        self
    }
    /// Start from a known profile instead of an empty one.
    pub fn with_profile(mut self, profile: CalibrationProfile) -> Self {
        self.profile = Some(profile);
        self
    }
    /// Stop source polled by every loop; defaults to one that never fires.
    pub fn with_stop(mut self, stop: impl StopSignal + 'static) -> Self {
        self.stop = Some(Arc::new(stop));
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state
impl<S> RobotBuilder<Missing, S> {
    pub fn with_motors(self, motors: impl MotorPair + 'static) -> RobotBuilder<Set, S> {
        RobotBuilder {
            motors: Some(Box::new(motors)),
            sensors: self.sensors,
            drive: self.drive,
            primitives: self.primitives,
            calibration: self.calibration,
            profile: self.profile,
            stop: self.stop,
            clock: self.clock,
            _m: PhantomData,
            _s: PhantomData,
        }
    }
}

impl<M> RobotBuilder<M, Missing> {
    pub fn with_sensors(self, sensors: impl IrSensors + 'static) -> RobotBuilder<M, Set> {
        RobotBuilder {
            motors: self.motors,
            sensors: Some(Box::new(sensors)),
            drive: self.drive,
            primitives: self.primitives,
            calibration: self.calibration,
            profile: self.profile,
            stop: self.stop,
            clock: self.clock,
            _m: PhantomData,
            _s: PhantomData,
        }
    }
}

impl RobotBuilder<Set, Set> {
    /// Validate and build the Robot. Only available when motors and sensors are set.
    pub fn build(self) -> Result<Robot> {
        self.try_build()
    }
}

/// Statically-dispatched engine over concrete collaborators.
pub type RobotG<M, S> = CalibrationEngine<MasterSlaveDrive<M>, S>;

/// Build a statically-dispatched `RobotG` from concrete motors and sensors.
///
/// Delegates to the shared `validate_and_build`.
#[allow(clippy::too_many_arguments)]
pub fn build_engine<M, S>(
    motors: M,
    sensors: S,
    drive: DriveCfg,
    primitives: PrimitiveCfg,
    calibration: CalibrationCfg,
    stop: Option<Arc<dyn StopSignal>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
) -> Result<RobotG<M, S>>
where
    M: MotorPair,
    S: IrSensors,
{
    validate_and_build(motors, sensors, drive, primitives, calibration, None, stop, clock)
}
