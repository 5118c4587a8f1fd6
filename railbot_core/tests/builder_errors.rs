use railbot_core::error::BuildError;
use railbot_core::mocks::{RecordingMotors, ScriptedIr};
use railbot_core::{CalibrationCfg, DriveCfg, PrimitiveCfg, Robot};
use rstest::rstest;

#[rstest]
fn builder_missing_motors_yields_typed_build_error() {
    let err = Robot::builder()
        // missing with_motors()
        .with_sensors(ScriptedIr::new())
        .try_build()
        .expect_err("should fail with MissingMotors");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingMotors) => {}
        other => panic!("expected MissingMotors, got: {other:?}"),
    }
}

#[rstest]
fn builder_missing_sensors_yields_typed_build_error() {
    let err = Robot::builder()
        .with_motors(RecordingMotors::new())
        .try_build()
        .expect_err("should fail with MissingSensors");

    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingSensors)
    ));
}

#[rstest]
fn defaults_build() {
    let robot = Robot::builder()
        .with_motors(RecordingMotors::new())
        .with_sensors(ScriptedIr::new())
        .build()
        .unwrap();
    assert_eq!(robot.profile().left_distance_after_one_forward, None);
}

#[rstest]
#[case::inverted_power(DriveCfg { min_power: 200, max_power: 100, ..DriveCfg::default() }, PrimitiveCfg::default(), CalibrationCfg::default())]
#[case::zero_min_power(DriveCfg { min_power: 0, ..DriveCfg::default() }, PrimitiveCfg::default(), CalibrationCfg::default())]
#[case::flat_profile(DriveCfg { chunks: 2.0, ..DriveCfg::default() }, PrimitiveCfg::default(), CalibrationCfg::default())]
#[case::no_distance(DriveCfg { forward_distance: 0, ..DriveCfg::default() }, PrimitiveCfg::default(), CalibrationCfg::default())]
#[case::ratio_weight_one(DriveCfg { ratio_weight: 1.0, ..DriveCfg::default() }, PrimitiveCfg::default(), CalibrationCfg::default())]
#[case::single_pivot_level(DriveCfg::default(), PrimitiveCfg { pivot_powers: vec![70], ..PrimitiveCfg::default() }, CalibrationCfg::default())]
#[case::nudge_level_too_high(DriveCfg::default(), PrimitiveCfg { nudge_powers: vec![70, 400], ..PrimitiveCfg::default() }, CalibrationCfg::default())]
#[case::zero_samples(DriveCfg::default(), PrimitiveCfg::default(), CalibrationCfg { sample_count: 0, ..CalibrationCfg::default() })]
#[case::zero_threshold(DriveCfg::default(), PrimitiveCfg::default(), CalibrationCfg { side_pivot_threshold: 0, ..CalibrationCfg::default() })]
#[case::multiplier_above_one(DriveCfg::default(), PrimitiveCfg::default(), CalibrationCfg { left_correct_multiplier: 1.5, ..CalibrationCfg::default() })]
fn invalid_configs_are_rejected(
    #[case] drive: DriveCfg,
    #[case] primitives: PrimitiveCfg,
    #[case] calibration: CalibrationCfg,
) {
    let err = Robot::builder()
        .with_motors(RecordingMotors::new())
        .with_sensors(ScriptedIr::new())
        .with_drive(drive)
        .with_primitives(primitives)
        .with_calibration(calibration)
        .build()
        .expect_err("config should be rejected");

    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[rstest]
fn ratio_is_readable_through_a_shared_reference() {
    let robot = Robot::builder()
        .with_motors(RecordingMotors::new())
        .with_sensors(ScriptedIr::new())
        .with_drive(DriveCfg {
            starting_ratio: 0.9,
            ..DriveCfg::default()
        })
        .build()
        .unwrap();
    let shared: &Robot = &robot;
    assert!((shared.ratio() - 0.9).abs() < 1e-12);
}
