//! Command execution and result printing.

use std::io::{BufRead, Write};

use railbot_core::{
    CalibrationCommand, CalibrationReply, MoveOutcome, MoveReport, Movement, Robot,
};
use railbot_traits::StopSignal;
use serde_json::json;

use crate::cli::SetupArg;

/// Exit code for a move that ended on a stop request.
pub const EXIT_STOPPED: i32 = 2;
/// Exit code for a move that ran out of time before reaching its target.
pub const EXIT_TIMED_OUT: i32 = 4;

pub fn outcome_exit_code(outcome: MoveOutcome) -> i32 {
    match outcome {
        MoveOutcome::Reached => 0,
        MoveOutcome::Stopped => EXIT_STOPPED,
        MoveOutcome::TimedOut => EXIT_TIMED_OUT,
    }
}

pub fn move_report_json(r: &MoveReport) -> serde_json::Value {
    json!({
        "movement": r.movement.as_str(),
        "outcome": r.outcome.as_str(),
        "target": r.target,
        "traveled": r.traveled,
        "last_power": r.last_power,
        "ratio": r.ratio,
        "iterations": r.iterations,
        "elapsed_ms": r.elapsed_ms,
    })
}

fn print_move_report(r: &MoveReport, json_mode: bool) {
    if json_mode {
        println!("{}", move_report_json(r));
    } else {
        println!(
            "move {}: {} (traveled {}/{} of {}, ratio {:.3}, {} iterations, {} ms)",
            r.movement.as_str(),
            r.outcome.as_str(),
            r.traveled[0],
            r.traveled[1],
            r.target,
            r.ratio,
            r.iterations,
            r.elapsed_ms
        );
    }
}

/// Run one motion; returns the process exit code for its outcome.
pub fn run_move(robot: &mut Robot, movement: Movement, json_mode: bool) -> eyre::Result<i32> {
    let report = robot.move_robot(movement)?;
    print_move_report(&report, json_mode);
    Ok(outcome_exit_code(report.outcome))
}

pub fn run_setup(robot: &mut Robot, target: SetupArg) -> eyre::Result<()> {
    for side in target.sides() {
        robot.compute_side_offset(*side)?;
    }
    if target.includes_back() {
        robot.compute_back_targets()?;
    }
    Ok(())
}

pub fn profile_json(robot: &Robot) -> serde_json::Value {
    let p = robot.profile();
    json!({
        "left_offset": p.left_offset,
        "right_offset": p.right_offset,
        "good_distance_left": p.good_distance_left,
        "good_distance_right": p.good_distance_right,
        "back_left_target": p.back_left_target,
        "back_right_target": p.back_right_target,
        "left_distance_after_one_forward": p.left_distance_after_one_forward,
    })
}

pub fn print_profile(robot: &Robot, json_mode: bool) {
    if json_mode {
        println!("{}", profile_json(robot));
        return;
    }
    let p = robot.profile();
    println!(
        "left: offset {} good {}; right: offset {} good {}; back targets {}/{}",
        p.left_offset,
        p.good_distance_left,
        p.right_offset,
        p.good_distance_right,
        p.back_left_target,
        p.back_right_target
    );
}

/// Run one calibration routine. The reply token is printed in every case, `BAD`
/// included, before any error is handed back to the caller.
pub fn run_calibrate(robot: &mut Robot, selector: &str, json_mode: bool) -> eyre::Result<()> {
    let result = selector
        .parse::<CalibrationCommand>()
        .map_err(eyre::Report::new)
        .and_then(|cmd| robot.calibrate(cmd));
    let reply = result.as_ref().map_or(CalibrationReply::Bad, |r| *r);
    if json_mode {
        println!(
            "{}",
            json!({ "selector": selector, "reply": reply.token(), "profile": profile_json(robot) })
        );
    } else {
        println!("{reply}");
    }
    result.map(|_| ())
}

fn reply_for_move(robot: &mut Robot, movement: Movement) -> &'static str {
    match robot.move_robot(movement) {
        Ok(report) if report.outcome == MoveOutcome::Reached => "1",
        Ok(report) => {
            tracing::warn!(outcome = report.outcome.as_str(), "move did not reach its target");
            "0"
        }
        Err(e) => {
            tracing::error!(error = %e, "move failed");
            "BAD"
        }
    }
}

/// One protocol line to one reply token; `None` ends the session.
pub fn handle_line(robot: &mut Robot, line: &str) -> Option<&'static str> {
    let mut words = line.split_whitespace();
    let verb = words.next()?;
    let arg = words.next().unwrap_or("");
    if words.next().is_some() {
        tracing::warn!(line, "trailing words in command");
        return Some("BAD");
    }
    let reply = match verb {
        "quit" => return None,
        "cal" => robot.calibrate_text(arg).token(),
        "setup" => match SetupArg::parse_token(arg) {
            Some(target) => match run_setup(robot, target) {
                Ok(()) => "1",
                Err(e) => {
                    tracing::error!(error = %e, "setup failed");
                    "BAD"
                }
            },
            None => "BAD",
        },
        "move" => match arg.parse::<Movement>() {
            Ok(m) => reply_for_move(robot, m),
            Err(e) => {
                tracing::warn!(error = %e, "unknown movement");
                "BAD"
            }
        },
        other => {
            tracing::warn!(verb = other, "unknown command");
            "BAD"
        }
    };
    Some(reply)
}

/// Answer line commands until EOF, `quit` or a stop request.
pub fn serve(
    robot: &mut Robot,
    input: impl BufRead,
    mut output: impl Write,
    stop: &dyn StopSignal,
) -> eyre::Result<()> {
    tracing::info!("serving line commands on stdin");
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if stop.stop_requested() {
            tracing::info!("stop requested; ending session");
            break;
        }
        match handle_line(robot, &line) {
            Some(reply) => {
                writeln!(output, "{reply}")?;
                output.flush()?;
            }
            None => break,
        }
    }
    robot.halt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use railbot_core::mocks::{RecordingMotors, ScriptedIr};
    use railbot_traits::{IrChannel, ManualClock, NeverStop};
    use std::sync::Arc;

    fn robot() -> Robot {
        let ir = ScriptedIr::new()
            .with_constant(IrChannel::LeftFrontA, 500)
            .with_constant(IrChannel::LeftFrontB, 500)
            .with_constant(IrChannel::BackLeft, 600)
            .with_constant(IrChannel::BackRight, 600);
        Robot::builder()
            .with_motors(RecordingMotors::new().with_counts_per_read(10, 10))
            .with_sensors(ir)
            .with_clock(Arc::new(ManualClock::new()))
            .build()
            .unwrap()
    }

    fn session(script: &str) -> String {
        let mut r = robot();
        let mut out = Vec::new();
        serve(&mut r, script.as_bytes(), &mut out, &NeverStop).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn session_answers_each_line() {
        let out = session("setup all\ncal L\ncal B\n\ncal X\nmove F\nsetup Q\n");
        assert_eq!(out, "1\n1\n1\nBAD\n1\nBAD\n");
    }

    #[test]
    fn quit_ends_the_session() {
        assert_eq!(session("setup L\nquit\ncal L\n"), "1\n");
    }

    #[test]
    fn cross_correct_left_before_back_is_bad() {
        assert_eq!(session("cal l\n"), "BAD\n");
    }

    #[test]
    fn extra_words_are_rejected() {
        assert_eq!(session("cal L R\nfly\n"), "BAD\nBAD\n");
    }

    #[test]
    fn exit_codes_follow_outcomes() {
        assert_eq!(outcome_exit_code(MoveOutcome::Reached), 0);
        assert_eq!(outcome_exit_code(MoveOutcome::Stopped), EXIT_STOPPED);
        assert_eq!(outcome_exit_code(MoveOutcome::TimedOut), EXIT_TIMED_OUT);
    }
}
