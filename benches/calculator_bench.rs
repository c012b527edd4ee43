//! Calculator throughput: single funnels in both modes and the batch report.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use funnelsim::data::sample_records;
use funnelsim::funnel::{
    simulate, SimulationMode, SimulationParams, StageAdjustments, StageDefinition, StageKey,
};
use funnelsim::report::simulate_all_combinations;

fn funnel(stage_count: u32) -> Vec<StageDefinition> {
    (1..=stage_count)
        .map(|order| {
            let ptr = 0.3 + f64::from(order % 7) * 0.1;
            StageDefinition::new(format!("Stage {order}"), order, ptr)
        })
        .collect()
}

fn bench_calculator(c: &mut Criterion) {
    let mut group = c.benchmark_group("calculator");
    group.sample_size(100);

    for stage_count in [6u32, 64] {
        let stages = funnel(stage_count);
        let empty = StageAdjustments::new();
        let mut overrides = StageAdjustments::new();
        overrides.set(StageKey::new(stage_count / 2, format!("Stage {}", stage_count / 2)), 12.5);
        let mut sums = StageAdjustments::new();
        sums.set(StageKey::new(1, "Stage 1"), 4.0);

        group.throughput(Throughput::Elements(u64::from(stage_count)));
        group.bench_with_input(BenchmarkId::new("top_down", stage_count), &stages, |b, stages| {
            b.iter(|| {
                simulate(
                    black_box(stages),
                    SimulationParams::new(SimulationMode::TopDown, 1000.0),
                    &empty,
                    &sums,
                )
            })
        });
        group.bench_with_input(
            BenchmarkId::new("bottom_up_anchored", stage_count),
            &stages,
            |b, stages| {
                b.iter(|| {
                    simulate(
                        black_box(stages),
                        SimulationParams::new(SimulationMode::BottomUp, 10.0),
                        &overrides,
                        &sums,
                    )
                })
            },
        );
    }
    group.finish();

    let records = sample_records();
    let mut report = c.benchmark_group("report");
    report.bench_function("all_sample_combinations", |b| {
        b.iter(|| {
            simulate_all_combinations(
                black_box(&records),
                SimulationParams::new(SimulationMode::BottomUp, 10.0),
            )
        })
    });
    report.finish();
}

criterion_group!(benches, bench_calculator);
criterion_main!(benches);
