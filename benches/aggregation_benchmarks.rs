//! Aggregation kernel (C4/C6) benchmarks: reduction cost across match-set
//! size and aggregation kind.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use relfeat::aggregation::kernels::{reduce, Inputs};
use relfeat::aggregation::AggregationKind;
use std::time::Duration;

fn values_for(size: usize) -> Vec<f64> {
    (0..size).map(|i| (i % 997) as f64 * 0.37).collect()
}

fn bench_reduce(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregation_reduce");
    let kinds = [
        AggregationKind::Sum,
        AggregationKind::Avg,
        AggregationKind::Count,
        AggregationKind::Max,
        AggregationKind::Stddev,
        AggregationKind::CountDistinct,
    ];
    for size in [100usize, 1_000, 10_000] {
        let values = values_for(size);
        let times = vec![0.0; size];
        for kind in kinds {
            group.bench_with_input(BenchmarkId::new(format!("{kind:?}"), size), &size, |b, _| {
                b.iter(|| reduce(kind, Inputs { values: &values, times: &times, ref_ts: 0.0 }));
            });
        }
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(2));
    targets = bench_reduce
}
criterion_main!(benches);
