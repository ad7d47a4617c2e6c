use chrono::Utc;
use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use instance_monitor::{
    diff_snapshot, DiffSettings, IdleDetection, InstanceSnapshot, InstanceState, MonitorState,
};

fn make_snapshot(n: usize, flip: bool) -> Vec<InstanceSnapshot> {
    (0..n)
        .map(|i| {
            let state = if (i % 2 == 0) ^ flip {
                InstanceState::Running
            } else {
                InstanceState::Stopped
            };
            let mut inst = InstanceSnapshot::new(format!("instance-{i}"), state).with_cost(0.25);
            if i % 4 == 0 {
                let minutes = (i % 10) as i64;
                inst = inst.with_idle(IdleDetection::enabled("hibernate").pending_in(minutes));
            }
            inst
        })
        .collect()
}

fn bench_diff(c: &mut Criterion) {
    let mut group = c.benchmark_group("diff");
    let settings = DiffSettings::default();

    for &n in &[16usize, 256, 4096] {
        let seed = make_snapshot(n, false);
        let next = make_snapshot(n, true);
        group.throughput(Throughput::Elements(n as u64));

        group.bench_function(format!("steady/{n}"), |b| {
            let mut state = MonitorState::new();
            diff_snapshot(&mut state, &seed, &settings, Utc::now());
            b.iter(|| diff_snapshot(&mut state, &seed, &settings, Utc::now()));
        });

        group.bench_function(format!("all_changed/{n}"), |b| {
            b.iter_batched(
                || {
                    let mut state = MonitorState::new();
                    diff_snapshot(&mut state, &seed, &settings, Utc::now());
                    state
                },
                |mut state| diff_snapshot(&mut state, &next, &settings, Utc::now()),
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_diff);
criterion_main!(benches);
