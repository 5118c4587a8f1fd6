//! Collaborator backends for the rail robot.
//!
//! - `sim`: deterministic simulated robot (always available)
//! - `pi`: Raspberry Pi motors, encoders, MCP3008 IR ADC and stop button
//!   (behind the `hardware` feature)

pub mod error;
pub mod sim;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod pi;

pub use error::HwError;
pub use sim::{SimIr, SimMotors, SimParams, SimPose, SimRobot};
