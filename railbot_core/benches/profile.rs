use std::sync::Arc;

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use railbot_core::mocks::RecordingMotors;
use railbot_core::profile::{master_power, progress, slave_power, update_ratio};
use railbot_core::{DriveCfg, DriveStrategy, MasterSlaveDrive, Movement, PrimitiveCfg};
use railbot_traits::{ManualClock, NeverStop};

// One control step worth of profile math over a synthetic encoder trace.
fn profile_trace(cfg: &DriveCfg, steps: i64) -> f64 {
    let mut ratio = cfg.starting_ratio;
    for i in 0..steps {
        let master_traveled = i * 10;
        let slave_traveled = i * 9;
        let r = progress(master_traveled, cfg.forward_distance);
        let m = master_power(cfg, r);
        let _s = slave_power(cfg, m, ratio);
        ratio = update_ratio(cfg, ratio, master_traveled, slave_traveled);
    }
    ratio
}

pub fn bench_profile(c: &mut Criterion) {
    let mut g = c.benchmark_group("profile");
    // BENCH_SAMPLE_SIZE=10 cargo bench -p railbot_core --bench profile
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE") {
        if let Ok(n) = ss.parse::<usize>() {
            g.sample_size(n.max(1));
        }
    } else {
        g.sample_size(50);
    }

    let cfg = DriveCfg::default();
    g.bench_function("step_math_100", |b| {
        b.iter(|| profile_trace(black_box(&cfg), black_box(100)));
    });

    g.bench_function("forward_move_recording_motors", |b| {
        b.iter_batched(
            || {
                MasterSlaveDrive::new(
                    RecordingMotors::new().with_counts_per_read(10, 9),
                    DriveCfg::default(),
                    PrimitiveCfg::default(),
                    Arc::new(ManualClock::new()),
                    Arc::new(NeverStop),
                )
            },
            |mut d| black_box(d.move_robot(Movement::Forward)),
            BatchSize::SmallInput,
        );
    });
    g.finish();
}

criterion_group!(benches, bench_profile);
criterion_main!(benches);
