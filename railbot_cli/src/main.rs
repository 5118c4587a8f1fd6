//! `railbot`: drive and calibrate the rail robot from the command line.

mod cli;
mod commands;
mod error_fmt;
mod hw;

use std::sync::Arc;

use clap::Parser;
use eyre::WrapErr;
use railbot_config::{Config, Logging};
use railbot_core::{CalibrationCfg, DriveCfg, PrimitiveCfg, Robot};
use railbot_traits::{AnyStop, Clock, MonotonicClock, StopFlag};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);
    let _ = color_eyre::install();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            if JSON_MODE.get().copied().unwrap_or(false) {
                println!("{}", format_error_json(&e));
            } else {
                eprintln!("{}", humanize(&e));
            }
            tracing::error!(error = ?e, "command failed");
            std::process::exit(exit_code_for_error(&e));
        }
    }
}

fn console_level<'a>(flag: Option<&'a str>, configured: Option<&'a str>) -> &'a str {
    flag.or(configured).unwrap_or("info")
}

fn init_logging(cli: &Cli, logging: &Logging) -> eyre::Result<()> {
    use tracing_subscriber::Layer;

    // RUST_LOG wins, then an explicit --log-level, then the config file's level.
    let level = console_level(cli.log_level.as_deref(), logging.level.as_deref());
    let console_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    // Console logs go to stderr so stdout only carries results and reply tokens.
    let console = if cli.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(console_filter)
            .boxed()
    };

    let file = match logging.file.as_deref() {
        Some(path) => {
            let path = std::path::Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file {path:?} has no file name"))?;
            let appender = match logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                _ => tracing_appender::rolling::never(dir, name),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            let file_filter = EnvFilter::try_new(logging.level.as_deref().unwrap_or("info"))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(file_filter),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .wrap_err("initialize logging")?;
    Ok(())
}

fn load_config(cli: &Cli) -> eyre::Result<Config> {
    let cfg = railbot_config::load_file(&cli.config)?;
    cfg.validate()
        .wrap_err_with(|| format!("invalid configuration in {:?}", cli.config))?;
    Ok(cfg)
}

fn build_robot(
    cfg: &Config,
    backend: hw::Backend,
    stop: &StopFlag,
    clock: Arc<dyn Clock + Send + Sync>,
) -> eyre::Result<Robot> {
    let mut any = AnyStop::new().with(stop.clone());
    if let Some(button) = backend.button {
        any = any.with(button);
    }
    Robot::builder()
        .with_motors(backend.motors)
        .with_sensors(backend.sensors)
        .with_drive(DriveCfg::from(&cfg.drive))
        .with_primitives(PrimitiveCfg::from(&cfg.primitives))
        .with_calibration(CalibrationCfg::from(&cfg.calibration))
        .with_stop(any)
        .with_clock(clock)
        .build()
}

fn install_stop_handler(stop: &StopFlag) {
    let flag = stop.clone();
    let result = ctrlc::set_handler(move || {
        use railbot_traits::StopSignal;
        if flag.stop_requested() {
            // Second Ctrl-C: the current routine did not notice the first one.
            std::process::exit(130);
        }
        flag.request();
    });
    if let Err(e) = result {
        tracing::warn!(error = %e, "could not install Ctrl-C handler; stop input only");
    }
}

fn run(cli: Cli) -> eyre::Result<i32> {
    let cfg = load_config(&cli)?;
    init_logging(&cli, &cfg.logging)?;

    let stop = StopFlag::new();
    install_stop_handler(&stop);

    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let mut backend = hw::open(&cfg, clock.clone())?;
    tracing::info!(backend = backend.kind, config = %cli.config.display(), "backend ready");

    if matches!(cli.cmd, Commands::SelfCheck) {
        let report = hw::self_check(&mut backend)?;
        if cli.json {
            println!("{report}");
        } else {
            println!("self-check ok ({})", backend.kind);
        }
        return Ok(0);
    }

    let mut robot = build_robot(&cfg, backend, &stop, clock)?;
    match cli.cmd {
        Commands::Move { movement } => commands::run_move(&mut robot, movement.into(), cli.json),
        Commands::Calibrate { selector, setup } => {
            if setup {
                commands::run_setup(&mut robot, cli::SetupArg::All)?;
            }
            commands::run_calibrate(&mut robot, &selector, cli.json)?;
            Ok(0)
        }
        Commands::Setup { target } => {
            commands::run_setup(&mut robot, target)?;
            commands::print_profile(&robot, cli.json);
            Ok(0)
        }
        Commands::Serve => {
            let stdin = std::io::stdin();
            commands::serve(&mut robot, stdin.lock(), std::io::stdout(), &stop)?;
            Ok(0)
        }
        Commands::SelfCheck => Ok(0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_log_level_beats_the_config_file() {
        assert_eq!(console_level(Some("info"), Some("debug")), "info");
        assert_eq!(console_level(Some("trace"), None), "trace");
    }

    #[test]
    fn config_level_applies_without_a_flag() {
        assert_eq!(console_level(None, Some("debug")), "debug");
        assert_eq!(console_level(None, None), "info");
    }

    #[test]
    fn log_level_flag_is_optional() {
        let cli = Cli::try_parse_from(["railbot", "self-check"]).unwrap();
        assert_eq!(cli.log_level, None);
        let cli = Cli::try_parse_from(["railbot", "--log-level", "info", "self-check"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("info"));
    }
}
