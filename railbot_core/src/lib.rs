#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Rail-following control core (hardware-agnostic).
//!
//! All hardware interactions go through the `railbot_traits` collaborator
//! traits (`MotorPair`, `IrSensors`, `StopSignal`, `Clock`).
//!
//! ## Architecture
//!
//! - **Sampling**: averaged IR reads (`sampler`)
//! - **Drive**: velocity-profiled master/slave moves with adaptive ratio and
//!   short pivot/nudge pulses (`drive`, `profile`)
//! - **Calibration**: side and back alignment loops, cross corrections and the
//!   selector protocol (`calibration`)
//! - **Configuration**: runtime config structs (`config`) and conversions from
//!   the TOML schema (`conversions`)
//! - **Assembly**: type-state `Robot` builder (`builder`)

pub mod builder;
pub mod calibration;
pub mod config;
pub mod conversions;
pub mod drive;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod profile;
pub mod sampler;

pub use builder::{Missing, Robot, RobotBuilder, RobotG, Set, build_engine, validate};
pub use calibration::{
    CalibrationCommand, CalibrationEngine, CalibrationProfile, CalibrationReply, Side, back_tier,
    side_pivot,
};
pub use config::{CalibrationCfg, DriveCfg, PrimitiveCfg};
pub use drive::{DriveStrategy, MasterSlaveDrive, MoveOutcome, MoveReport, Movement, PivotDirection};
pub use error::{BuildError, RailError, Result, SelectorError};
pub use sampler::SensorSampler;
