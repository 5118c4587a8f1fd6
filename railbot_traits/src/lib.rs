//! Collaborator contracts shared by the railbot crates.
//!
//! Everything the control core needs from the outside world goes through the
//! traits in this crate: motor power and encoder counts (`MotorPair`), raw IR
//! channel reads (`IrSensors`), the operator stop input (`StopSignal`) and time
//! (`Clock`). Errors at these boundaries are boxed so that backends stay free to
//! use their own error types.

pub mod clock;
pub mod stop;

pub use clock::{Clock, ManualClock, MonotonicClock};
pub use stop::{AnyStop, NeverStop, StopFlag, StopSignal, StopState};

/// Boxed error type used at every collaborator boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One of the two drive wheels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wheel {
    Left,
    Right,
}

impl Wheel {
    pub const ALL: [Wheel; 2] = [Wheel::Left, Wheel::Right];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Wheel::Left => 0,
            Wheel::Right => 1,
        }
    }
}

/// Rotation sense of a wheel relative to the robot's forward direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl Direction {
    /// +1 for forward, -1 for reverse.
    #[inline]
    pub fn sign(self) -> i64 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => -1,
        }
    }

    /// Direction for a signed quantity; zero maps to forward.
    #[inline]
    pub fn from_sign(v: i64) -> Self {
        if v < 0 {
            Direction::Reverse
        } else {
            Direction::Forward
        }
    }
}

/// Logical IR sensor channels.
///
/// Each side carries two sensors, A toward the front of the robot and B toward
/// the back; the two back sensors face the rail behind the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IrChannel {
    LeftFrontA,
    LeftFrontB,
    RightFrontA,
    RightFrontB,
    BackLeft,
    BackRight,
}

impl IrChannel {
    pub const ALL: [IrChannel; 6] = [
        IrChannel::LeftFrontA,
        IrChannel::LeftFrontB,
        IrChannel::RightFrontA,
        IrChannel::RightFrontB,
        IrChannel::BackLeft,
        IrChannel::BackRight,
    ];

    pub fn name(self) -> &'static str {
        match self {
            IrChannel::LeftFrontA => "left_front_a",
            IrChannel::LeftFrontB => "left_front_b",
            IrChannel::RightFrontA => "right_front_a",
            IrChannel::RightFrontB => "right_front_b",
            IrChannel::BackLeft => "back_left",
            IrChannel::BackRight => "back_right",
        }
    }
}

/// Motor outputs and wheel encoders of a differential drive.
pub trait MotorPair {
    /// Command `power` (0 = off) on `wheel`, turning in `direction`.
    fn set_power(&mut self, wheel: Wheel, power: u16, direction: Direction)
    -> Result<(), BoxError>;

    /// Current encoder count of `wheel`. Counts increase while the wheel turns
    /// forward and decrease while it turns in reverse.
    fn read_encoder(&mut self, wheel: Wheel) -> Result<i64, BoxError>;
}

/// Raw analog access to the IR reflectance sensors (native 0..=1023 scale).
pub trait IrSensors {
    fn read_raw(&mut self, channel: IrChannel) -> Result<u16, BoxError>;
}

impl<T: MotorPair + ?Sized> MotorPair for Box<T> {
    fn set_power(
        &mut self,
        wheel: Wheel,
        power: u16,
        direction: Direction,
    ) -> Result<(), BoxError> {
        (**self).set_power(wheel, power, direction)
    }

    fn read_encoder(&mut self, wheel: Wheel) -> Result<i64, BoxError> {
        (**self).read_encoder(wheel)
    }
}

impl<T: IrSensors + ?Sized> IrSensors for Box<T> {
    fn read_raw(&mut self, channel: IrChannel) -> Result<u16, BoxError> {
        (**self).read_raw(channel)
    }
}
