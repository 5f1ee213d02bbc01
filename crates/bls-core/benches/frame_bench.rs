use bls_core::arbiter::Arbiter;
use bls_core::domain::{EmotionSample, SessionPhase};
use bls_core::interpolate::interpolate;
use bls_core::motion::MotionPattern;
use bls_core::stimulus::StimulusConfig;
use bls_core::{Drivers, EngineConfig, ManualClock, ManualScheduler, SessionController};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn benchmark_pattern_poses(c: &mut Criterion) {
    let mut group = c.benchmark_group("pattern_pose");
    for pattern in MotionPattern::ALL {
        group.bench_with_input(BenchmarkId::from_parameter(pattern.as_str()), &pattern, |b, p| {
            b.iter(|| p.pose(black_box(0.37)))
        });
    }
    group.finish();
}

fn benchmark_interpolate(c: &mut Criterion) {
    let from = StimulusConfig::default();
    let to = StimulusConfig {
        speed: 9.0,
        pattern: MotionPattern::Butterfly,
        size: 2.0,
        ..StimulusConfig::default()
    };
    c.bench_function("interpolate_config", |b| {
        b.iter(|| interpolate(black_box(&from), black_box(&to), black_box(0.42)))
    });
}

fn benchmark_arbitration(c: &mut Criterion) {
    let mut arbiter = Arbiter::default();
    let mut ts = 0i64;
    c.bench_function("arbiter_evaluate", |b| {
        b.iter(|| {
            ts += 250;
            let a = ((ts / 250) % 20) as f32 / 20.0;
            arbiter.evaluate(black_box(&EmotionSample::new(ts, a, 0.5)), SessionPhase::Desensitization)
        })
    });
}

fn benchmark_session_frame(c: &mut Criterion) {
    let clock = ManualClock::new(0.0);
    let mut ctl = match SessionController::new(
        EngineConfig::default(),
        Drivers::null(),
        ManualScheduler::new(),
        clock.clone(),
    ) {
        Ok(ctl) => ctl,
        Err(e) => panic!("default config rejected: {}", e),
    };
    ctl.start();

    c.bench_function("session_frame", |b| {
        b.iter(|| {
            clock.advance(16.0);
            ctl.scheduler_mut().take_pending();
            black_box(ctl.frame())
        })
    });
}

criterion_group!(
    benches,
    benchmark_pattern_poses,
    benchmark_interpolate,
    benchmark_arbitration,
    benchmark_session_frame
);
criterion_main!(benches);
