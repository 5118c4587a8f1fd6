//! Deterministic simulated robot.
//!
//! One shared world model backs both the motor/encoder handle and the IR sensor
//! handle. The world integrates wheel travel from the currently applied powers
//! each time any handle touches it, using the injected clock, so a controller
//! running on a `ManualClock` sees reproducible encoder and sensor sequences.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use railbot_traits::{BoxError, Clock, Direction, IrChannel, IrSensors, MotorPair, Wheel};

use crate::error::HwError;

/// Full-scale raw IR reading.
pub const IR_FULL_SCALE: f64 = 1023.0;

#[derive(Debug, Clone)]
pub struct SimParams {
    /// Encoder counts per millisecond at `max_power`, per wheel.
    pub gain: [f64; 2],
    pub max_power: u16,
    /// Wheel-base width in encoder counts (1 count = 1 mm in the simulator).
    pub wheel_width: f64,
    /// Distance between the two sensors of one side, along the robot.
    pub sensor_spacing_mm: f64,
    /// Raw units lost per millimetre of clearance.
    pub ir_slope: f64,
    /// Distance from the left rail to the right rail minus the robot's width.
    pub corridor_mm: f64,
    pub lateral_mm: f64,
    pub heading_rad: f64,
    pub back_gap_mm: [f64; 2],
    pub noise: u16,
    pub seed: u64,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            gain: [1.0, 0.9],
            max_power: 255,
            wheel_width: 600.0,
            sensor_spacing_mm: 150.0,
            ir_slope: 1.0,
            corridor_mm: 120.0,
            lateral_mm: 60.0,
            heading_rad: 0.0,
            back_gap_mm: [50.0, 50.0],
            noise: 0,
            seed: 1,
        }
    }
}

/// Snapshot of the simulated pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimPose {
    pub lateral_mm: f64,
    pub heading_rad: f64,
    pub back_gap_mm: [f64; 2],
    pub encoder: [i64; 2],
}

struct World {
    params: SimParams,
    clock: Arc<dyn Clock + Send + Sync>,
    last_update: Instant,
    power: [(u16, Direction); 2],
    encoder: [f64; 2],
    lateral_mm: f64,
    heading_rad: f64,
    back_gap_mm: [f64; 2],
    rng: u64,
    faulty_channel: Option<IrChannel>,
}

impl World {
    fn advance(&mut self) {
        let now = self.clock.now();
        let dt_ms = now.saturating_duration_since(self.last_update).as_micros() as f64 / 1000.0;
        self.last_update = now;
        if dt_ms <= 0.0 {
            return;
        }
        let max = f64::from(self.params.max_power.max(1));
        let mut travel = [0.0_f64; 2];
        for w in Wheel::ALL {
            let (power, dir) = self.power[w.index()];
            let frac = (f64::from(power) / max).min(1.0);
            travel[w.index()] = frac * self.params.gain[w.index()] * dt_ms * dir.sign() as f64;
        }
        for (count, d) in self.encoder.iter_mut().zip(travel) {
            *count += d;
        }
        let (dl, dr) = (travel[0], travel[1]);
        let center = (dl + dr) / 2.0;
        // Positive heading turns the nose toward the left rail.
        self.heading_rad += (dr - dl) / self.params.wheel_width;
        self.lateral_mm -= center * self.heading_rad.sin();
        self.back_gap_mm[0] += dl;
        self.back_gap_mm[1] += dr;
    }

    fn clearance(&self, channel: IrChannel) -> f64 {
        let half = self.params.sensor_spacing_mm / 2.0;
        let tilt = half * self.heading_rad.sin();
        let right = self.params.corridor_mm - self.lateral_mm;
        match channel {
            IrChannel::LeftFrontA => self.lateral_mm - tilt,
            IrChannel::LeftFrontB => self.lateral_mm + tilt,
            IrChannel::RightFrontA => right + tilt,
            IrChannel::RightFrontB => right - tilt,
            IrChannel::BackLeft => self.back_gap_mm[0],
            IrChannel::BackRight => self.back_gap_mm[1],
        }
    }

    fn next_noise(&mut self) -> f64 {
        if self.params.noise == 0 {
            return 0.0;
        }
        // xorshift64
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng = x;
        let span = u64::from(self.params.noise) + 1;
        (x % span) as f64 - f64::from(self.params.noise) / 2.0
    }

    fn reading(&mut self, channel: IrChannel) -> u16 {
        let raw = IR_FULL_SCALE - self.params.ir_slope * self.clearance(channel) + self.next_noise();
        raw.round().clamp(0.0, IR_FULL_SCALE) as u16
    }
}

/// Owner of the shared world; hands out motor and sensor handles.
#[derive(Clone)]
pub struct SimRobot {
    world: Rc<RefCell<World>>,
}

impl SimRobot {
    pub fn new(params: SimParams, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let last_update = clock.now();
        let world = World {
            lateral_mm: params.lateral_mm,
            heading_rad: params.heading_rad,
            back_gap_mm: params.back_gap_mm,
            rng: params.seed.max(1),
            params,
            clock,
            last_update,
            power: [(0, Direction::Forward); 2],
            encoder: [0.0; 2],
            faulty_channel: None,
        };
        Self {
            world: Rc::new(RefCell::new(world)),
        }
    }

    pub fn motors(&self) -> SimMotors {
        SimMotors {
            world: self.world.clone(),
        }
    }

    pub fn sensors(&self) -> SimIr {
        SimIr {
            world: self.world.clone(),
        }
    }

    /// Make every read of `channel` fail from now on.
    pub fn inject_sensor_fault(&self, channel: IrChannel) {
        self.world.borrow_mut().faulty_channel = Some(channel);
    }

    pub fn pose(&self) -> SimPose {
        let mut w = self.world.borrow_mut();
        w.advance();
        SimPose {
            lateral_mm: w.lateral_mm,
            heading_rad: w.heading_rad,
            back_gap_mm: w.back_gap_mm,
            encoder: [w.encoder[0].floor() as i64, w.encoder[1].floor() as i64],
        }
    }

    /// Currently applied (power, direction) per wheel.
    pub fn applied_power(&self) -> [(u16, Direction); 2] {
        self.world.borrow().power
    }
}

pub struct SimMotors {
    world: Rc<RefCell<World>>,
}

impl MotorPair for SimMotors {
    fn set_power(
        &mut self,
        wheel: Wheel,
        power: u16,
        direction: Direction,
    ) -> Result<(), BoxError> {
        let mut w = self.world.borrow_mut();
        w.advance();
        w.power[wheel.index()] = (power, direction);
        Ok(())
    }

    fn read_encoder(&mut self, wheel: Wheel) -> Result<i64, BoxError> {
        let mut w = self.world.borrow_mut();
        w.advance();
        Ok(w.encoder[wheel.index()].floor() as i64)
    }
}

pub struct SimIr {
    world: Rc<RefCell<World>>,
}

impl IrSensors for SimIr {
    fn read_raw(&mut self, channel: IrChannel) -> Result<u16, BoxError> {
        let mut w = self.world.borrow_mut();
        if w.faulty_channel == Some(channel) {
            return Err(Box::new(HwError::Adc(channel.name())));
        }
        w.advance();
        Ok(w.reading(channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use railbot_traits::ManualClock;
    use std::time::Duration;

    fn robot(params: SimParams) -> (SimRobot, ManualClock) {
        let clock = ManualClock::new();
        (SimRobot::new(params, Arc::new(clock.clone())), clock)
    }

    #[test]
    fn encoders_follow_power_and_gain() {
        let (sim, clock) = robot(SimParams::default());
        let mut m = sim.motors();
        m.set_power(Wheel::Left, 255, Direction::Forward).unwrap();
        m.set_power(Wheel::Right, 255, Direction::Reverse).unwrap();
        clock.advance(Duration::from_millis(100));
        assert_eq!(m.read_encoder(Wheel::Left).unwrap(), 100);
        assert_eq!(m.read_encoder(Wheel::Right).unwrap(), -90);
    }

    #[test]
    fn level_pose_reads_balanced_pairs() {
        let (sim, _clock) = robot(SimParams::default());
        let mut ir = sim.sensors();
        let a = ir.read_raw(IrChannel::LeftFrontA).unwrap();
        let b = ir.read_raw(IrChannel::LeftFrontB).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, 963);
    }

    #[test]
    fn nose_toward_left_rail_brings_front_sensor_closer() {
        let (sim, _clock) = robot(SimParams {
            heading_rad: 0.1,
            ..SimParams::default()
        });
        let mut ir = sim.sensors();
        let a = ir.read_raw(IrChannel::LeftFrontA).unwrap();
        let b = ir.read_raw(IrChannel::LeftFrontB).unwrap();
        assert!(a > b, "front {a} should read closer than rear {b}");
        let ra = ir.read_raw(IrChannel::RightFrontA).unwrap();
        let rb = ir.read_raw(IrChannel::RightFrontB).unwrap();
        assert!(rb > ra, "right rear {rb} should read closer than right front {ra}");
    }

    #[test]
    fn injected_fault_surfaces_as_hw_error() {
        let (sim, _clock) = robot(SimParams::default());
        sim.inject_sensor_fault(IrChannel::BackLeft);
        let err = sim.sensors().read_raw(IrChannel::BackLeft).unwrap_err();
        assert!(err.downcast_ref::<HwError>().is_some());
    }
}
