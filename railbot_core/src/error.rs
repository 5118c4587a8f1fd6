use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum RailError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
}

/// Calibration selector text that does not name an implemented operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("unknown calibration selector {0:?}")]
    Unknown(String),
    #[error("calibration selector {0:?} is reserved and has no implementation")]
    Reserved(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing motors")]
    MissingMotors,
    #[error("missing IR sensors")]
    MissingSensors,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
