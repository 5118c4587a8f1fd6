use std::sync::Arc;

use railbot_core::mocks::{PowerCommand, RecordingMotors, StopOnPoll};
use railbot_core::profile::ratio_bounds;
use railbot_core::{
    DriveCfg, DriveStrategy, MasterSlaveDrive, MoveOutcome, Movement, PrimitiveCfg, RailError,
};
use railbot_traits::{Direction, ManualClock, NeverStop, StopFlag, StopSignal, Wheel};
use rstest::rstest;

fn drive_with(
    motors: RecordingMotors,
    clock: &ManualClock,
    stop: Arc<dyn StopSignal>,
) -> MasterSlaveDrive<RecordingMotors> {
    MasterSlaveDrive::new(
        motors,
        DriveCfg::default(),
        PrimitiveCfg::default(),
        Arc::new(clock.clone()),
        stop,
    )
}

fn last_two_are_zero(cmds: &[PowerCommand]) -> bool {
    cmds.len() >= 2 && cmds[cmds.len() - 2..].iter().all(|c| c.power == 0)
}

#[rstest]
fn forward_move_reaches_target_and_halts() {
    let clock = ManualClock::new();
    let motors = RecordingMotors::new().with_counts_per_read(10, 10);
    let mut d = drive_with(motors.clone(), &clock, Arc::new(NeverStop));

    let report = d.move_robot(Movement::Forward).unwrap();

    assert_eq!(report.outcome, MoveOutcome::Reached);
    assert_eq!(report.target, 1000);
    assert_eq!(report.traveled, [1000, 1000]);
    assert_eq!(report.iterations, 100);
    assert!((report.ratio - 1.0).abs() < 1e-12);
    assert!(last_two_are_zero(&motors.commands()));
    // 100 iterations of settle + loop pause
    assert_eq!(clock.elapsed().as_millis(), 400);
}

#[rstest]
fn slower_slave_raises_the_ratio_within_bounds() {
    let clock = ManualClock::new();
    let motors = RecordingMotors::new().with_counts_per_read(10, 8);
    let mut d = drive_with(motors, &clock, Arc::new(NeverStop));

    let report = d.move_robot(Movement::Forward).unwrap();
    let (lo, hi) = ratio_bounds(&DriveCfg::default());

    assert_eq!(report.outcome, MoveOutcome::Reached);
    assert!(report.ratio > 1.0 && report.ratio <= hi && report.ratio >= lo);
    assert!(report.last_power[1] >= report.last_power[0]);
}

#[rstest]
fn ratio_carries_over_to_the_next_move() {
    let clock = ManualClock::new();
    let motors = RecordingMotors::new().with_counts_per_read(10, 8);
    let mut d = drive_with(motors.clone(), &clock, Arc::new(NeverStop));

    d.move_robot(Movement::Forward).unwrap();
    let learned = d.ratio();
    motors.clear_commands();
    d.move_robot(Movement::Forward).unwrap();

    let cmds = motors.commands();
    // First iteration: master at the profile floor, slave trimmed by the learned ratio.
    assert_eq!(cmds[0].power, 76);
    assert_eq!(cmds[1].power, (76.0 * learned).round() as u16);
}

#[rstest]
fn stop_before_start_commands_only_the_halt() {
    let clock = ManualClock::new();
    let stop = StopFlag::new();
    stop.request();
    let motors = RecordingMotors::new().with_counts_per_read(10, 10);
    let mut d = drive_with(motors.clone(), &clock, Arc::new(stop));

    let report = d.move_robot(Movement::Forward).unwrap();

    assert_eq!(report.outcome, MoveOutcome::Stopped);
    assert_eq!(report.iterations, 0);
    let cmds = motors.commands();
    assert_eq!(cmds.len(), 2);
    assert!(last_two_are_zero(&cmds));
}

#[rstest]
#[case(2)]
#[case(5)]
fn stop_mid_move_ends_after_the_current_step(#[case] fire_at: u32) {
    let clock = ManualClock::new();
    let stop = StopOnPoll::new(fire_at);
    let motors = RecordingMotors::new().with_counts_per_read(10, 10);
    let mut d = drive_with(motors.clone(), &clock, Arc::new(stop.clone()));

    let report = d.move_robot(Movement::Forward).unwrap();

    assert_eq!(report.outcome, MoveOutcome::Stopped);
    assert_eq!(report.iterations, fire_at - 1);
    assert_eq!(stop.polls(), fire_at);
    let cmds = motors.commands();
    // Two power commands per step, then the halt.
    assert_eq!(cmds.len(), 2 * (fire_at as usize - 1) + 2);
    assert!(last_two_are_zero(&cmds));
}

#[rstest]
fn stalled_wheels_time_out() {
    let clock = ManualClock::new();
    let motors = RecordingMotors::new();
    let mut d = drive_with(motors.clone(), &clock, Arc::new(NeverStop));

    let report = d.move_robot(Movement::Forward).unwrap();

    assert_eq!(report.outcome, MoveOutcome::TimedOut);
    assert_eq!(report.traveled, [0, 0]);
    assert!(report.elapsed_ms >= 4000);
    assert!(last_two_are_zero(&motors.commands()));
}

#[rstest]
#[case(Movement::PivotLeft, Direction::Reverse, Direction::Forward)]
#[case(Movement::PivotRight, Direction::Forward, Direction::Reverse)]
fn pivots_spin_wheels_oppositely(
    #[case] movement: Movement,
    #[case] left: Direction,
    #[case] right: Direction,
) {
    let clock = ManualClock::new();
    let motors = RecordingMotors::new().with_counts_per_read(10, 10);
    let mut d = drive_with(motors.clone(), &clock, Arc::new(NeverStop));

    let report = d.move_robot(movement).unwrap();

    assert_eq!(report.target, 471);
    assert_eq!(report.outcome, MoveOutcome::Reached);
    assert!(report.traveled[0] >= 471);
    let cmds = motors.commands();
    assert_eq!((cmds[0].wheel, cmds[0].direction), (Wheel::Left, left));
    assert_eq!((cmds[1].wheel, cmds[1].direction), (Wheel::Right, right));
}

#[rstest]
fn encoder_failure_mid_move_still_halts() {
    let clock = ManualClock::new();
    // reset (2 reads) + one full iteration (2 reads), then the encoder dies
    let motors = RecordingMotors::new()
        .with_counts_per_read(10, 10)
        .fail_encoder_after(4);
    let mut d = drive_with(motors.clone(), &clock, Arc::new(NeverStop));

    let err = d.move_robot(Movement::Forward).unwrap_err();

    assert!(matches!(
        err.downcast_ref::<RailError>(),
        Some(RailError::Hardware(_))
    ));
    assert!(format!("{err:#}").contains("reading encoder"));
    let cmds = motors.commands();
    assert!(cmds.iter().any(|c| c.power > 0));
    assert!(last_two_are_zero(&cmds));
}

#[rstest]
fn halt_failure_is_reported() {
    let clock = ManualClock::new();
    let stop = StopFlag::new();
    stop.request();
    let motors = RecordingMotors::new().fail_set_power_after(0);
    let mut d = drive_with(motors, &clock, Arc::new(stop));

    let err = d.move_robot(Movement::Forward).unwrap_err();
    assert!(format!("{err:#}").contains("set_power"));
}

#[rstest]
fn reset_rebases_travel() {
    let clock = ManualClock::new();
    let motors = RecordingMotors::new().with_counts_per_read(10, 10);
    let mut d = drive_with(motors, &clock, Arc::new(NeverStop));

    d.move_robot(Movement::Forward).unwrap();
    let second = d.move_robot(Movement::Forward).unwrap();
    // Encoders keep counting across moves; travel is measured from each baseline.
    assert_eq!(second.traveled, [1000, 1000]);
}
