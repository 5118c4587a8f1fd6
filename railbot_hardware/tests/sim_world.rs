use std::sync::Arc;
use std::time::Duration;

use railbot_hardware::{SimParams, SimRobot};
use railbot_traits::{Direction, IrChannel, IrSensors, ManualClock, MotorPair, Wheel};
use rstest::rstest;

fn sim(params: SimParams) -> (SimRobot, ManualClock) {
    let clock = ManualClock::new();
    (SimRobot::new(params, Arc::new(clock.clone())), clock)
}

#[rstest]
#[case(1)]
#[case(42)]
fn noise_stays_within_amplitude_and_repeats_per_seed(#[case] seed: u64) {
    let params = SimParams {
        noise: 6,
        seed,
        ..SimParams::default()
    };
    let read_all = |p: SimParams| {
        let (s, _clock) = sim(p);
        let mut ir = s.sensors();
        (0..50)
            .map(|_| ir.read_raw(IrChannel::LeftFrontA).unwrap())
            .collect::<Vec<_>>()
    };

    let first = read_all(params.clone());
    assert_eq!(first, read_all(params));
    assert!(first.iter().all(|r| (960..=966).contains(r)), "{first:?}");
}

#[rstest]
fn pivot_in_place_turns_without_sliding() {
    let (s, clock) = sim(SimParams {
        gain: [1.0, 1.0],
        ..SimParams::default()
    });
    let mut m = s.motors();
    m.set_power(Wheel::Left, 255, Direction::Reverse).unwrap();
    m.set_power(Wheel::Right, 255, Direction::Forward).unwrap();
    clock.advance(Duration::from_millis(30));
    m.set_power(Wheel::Left, 0, Direction::Forward).unwrap();
    m.set_power(Wheel::Right, 0, Direction::Forward).unwrap();

    let pose = s.pose();
    // 60 counts of differential travel over a 600 count wheel base.
    assert!((pose.heading_rad - 0.1).abs() < 1e-9, "{}", pose.heading_rad);
    assert!((pose.lateral_mm - 60.0).abs() < 1e-9);
    assert_eq!(pose.encoder, [-30, 30]);
}

#[rstest]
fn unpowered_wheels_hold_their_counts() {
    let (s, clock) = sim(SimParams::default());
    let mut m = s.motors();
    m.set_power(Wheel::Left, 255, Direction::Forward).unwrap();
    clock.advance(Duration::from_millis(10));
    m.set_power(Wheel::Left, 0, Direction::Forward).unwrap();
    clock.advance(Duration::from_millis(500));

    assert_eq!(m.read_encoder(Wheel::Left).unwrap(), 10);
    assert_eq!(m.read_encoder(Wheel::Right).unwrap(), 0);
    assert_eq!(s.applied_power()[0].0, 0);
}

#[rstest]
fn moving_forward_opens_the_back_gap() {
    let (s, clock) = sim(SimParams::default());
    let mut ir = s.sensors();
    let before = ir.read_raw(IrChannel::BackLeft).unwrap();

    let mut m = s.motors();
    m.set_power(Wheel::Left, 255, Direction::Forward).unwrap();
    clock.advance(Duration::from_millis(20));
    m.set_power(Wheel::Left, 0, Direction::Forward).unwrap();

    assert_eq!(ir.read_raw(IrChannel::BackLeft).unwrap(), before - 20);
}
