//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

use railbot_core::{Movement, Side};

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "railbot", version, about = "Rail robot drive and calibration CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/railbot.toml")]
    pub config: PathBuf,

    /// Print results and errors as JSON instead of text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); defaults to logging.level, then info
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum MoveArg {
    Forward,
    Left,
    Right,
}

impl From<MoveArg> for Movement {
    fn from(m: MoveArg) -> Self {
        match m {
            MoveArg::Forward => Movement::Forward,
            MoveArg::Left => Movement::PivotLeft,
            MoveArg::Right => Movement::PivotRight,
        }
    }
}

/// What a setup measurement records.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum SetupArg {
    /// Left pair offset and good distance
    Left,
    /// Right pair offset and good distance
    Right,
    /// Back sensor targets
    Back,
    /// All of the above
    All,
}

impl SetupArg {
    pub fn parse_token(s: &str) -> Option<Self> {
        match s {
            "L" | "left" => Some(SetupArg::Left),
            "R" | "right" => Some(SetupArg::Right),
            "B" | "back" => Some(SetupArg::Back),
            "A" | "all" => Some(SetupArg::All),
            _ => None,
        }
    }

    pub fn sides(self) -> &'static [Side] {
        match self {
            SetupArg::Left => &[Side::Left],
            SetupArg::Right => &[Side::Right],
            SetupArg::Back => &[],
            SetupArg::All => &[Side::Left, Side::Right],
        }
    }

    pub fn includes_back(self) -> bool {
        matches!(self, SetupArg::Back | SetupArg::All)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one profiled motion (forward one step, or a quarter-turn pivot)
    Move {
        #[arg(value_enum)]
        movement: MoveArg,
    },
    /// Run one calibration routine and print its reply token
    Calibrate {
        /// Selector: L, R, B, b or l
        selector: String,
        /// Measure offsets and back targets at the current pose first
        #[arg(long, action = ArgAction::SetTrue)]
        setup: bool,
    },
    /// Record offsets or targets at the current (reference) pose
    Setup {
        #[arg(value_enum, default_value = "all")]
        target: SetupArg,
    },
    /// Answer line commands on stdin until EOF or `quit`
    Serve,
    /// Quick health check (hardware presence / sim ok)
    SelfCheck,
}
