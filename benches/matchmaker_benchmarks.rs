//! Matchmaker (C5) benchmarks: building the per-population-row match list
//! across join fan-out sizes.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use relfeat::frame::column::{CatCol, NumCol};
use relfeat::frame::Df;
use relfeat::matchmaker::Matchmaker;
use relfeat::placeholder::{Edge, RelationshipTag};
use std::time::Duration;

fn two_level_frames(peripheral_rows_per_key: usize) -> (Df, Df, Edge) {
    let num_keys = 100;
    let mut pop = Df::new("population", num_keys);
    pop.add_join_key(CatCol::from_vec("jk", (0..num_keys as i32).collect())).unwrap();

    let perip_rows = num_keys * peripheral_rows_per_key;
    let mut perip = Df::new("peripheral", perip_rows);
    let jk: Vec<i32> = (0..perip_rows).map(|i| (i % num_keys) as i32).collect();
    perip.add_join_key(CatCol::from_vec("jk", jk)).unwrap();
    perip.add_numerical(NumCol::from_vec("amount", (0..perip_rows).map(|i| i as f64).collect())).unwrap();

    let edge = Edge {
        left_key_col: "jk".to_string(),
        right_key_col: "jk".to_string(),
        left_ts_col: None,
        right_ts_col: None,
        right_upper_ts_col: None,
        horizon: 0.0,
        memory: None,
        relationship: RelationshipTag::ManyToMany,
        allow_lagged_targets: false,
        child: Box::new(relfeat::placeholder::Placeholder::new("peripheral")),
    };

    (pop, perip, edge)
}

fn bench_make_matches(c: &mut Criterion) {
    let mut group = c.benchmark_group("matchmaker_make_matches");
    for fan_out in [10usize, 100, 1_000] {
        let (pop, perip, edge) = two_level_frames(fan_out);
        let matchmaker = Matchmaker::new(&pop, &perip, &edge).unwrap();
        let mut buf = Vec::new();

        group.bench_with_input(BenchmarkId::from_parameter(fan_out), &fan_out, |b, _| {
            b.iter(|| {
                for pop_row in 0..pop.nrows() {
                    matchmaker.make_matches(pop_row, &mut buf);
                }
            });
        });
    }
    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(2));
    targets = bench_make_matches
}
criterion_main!(benches);
