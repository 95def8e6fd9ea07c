//! Two-level snowflake (population -> peripheral1 -> peripheral2) through
//! the full `Pipeline::fit`/`transform` path: checks the
//! `transform(fit(X,y)).shape == (X.nrows, num_features)` / "every value
//! finite" invariant that must hold regardless of how close the boosted
//! features land to the ground-truth target.

use relfeat::frame::column::{CatCol, NumCol};
use relfeat::frame::Df;
use relfeat::pipeline::{Learner, Pipeline, PipelineHyperparameters};
use relfeat::placeholder::{Edge, Placeholder, RelationshipTag};

fn edge(left: &str, right: &str, child: Placeholder) -> Edge {
    Edge {
        left_key_col: left.to_string(),
        right_key_col: right.to_string(),
        left_ts_col: None,
        right_ts_col: None,
        right_upper_ts_col: None,
        horizon: 0.0,
        memory: None,
        relationship: RelationshipTag::ManyToMany,
        allow_lagged_targets: false,
        child: Box::new(child),
    }
}

#[test]
fn two_level_snowflake_produces_a_finite_feature_matrix() {
    let num_pop_rows = 40;

    // population: one row per group, jk1 = 0..39.
    let mut population = Df::new("population", num_pop_rows);
    population.add_join_key(CatCol::from_vec("jk1", (0..num_pop_rows as i32).collect())).unwrap();

    // peripheral1: 2 rows per population row, each with its own jk2.
    let perip1_rows = num_pop_rows * 2;
    let perip1_jk1: Vec<i32> = (0..num_pop_rows as i32).flat_map(|g| [g, g]).collect();
    let perip1_jk2: Vec<i32> = (0..perip1_rows as i32).collect();
    let perip1_column_01: Vec<f64> = (0..perip1_rows).map(|i| (i as f64) * 3.0 - 20.0).collect();

    let mut peripheral1 = Df::new("peripheral1", perip1_rows);
    peripheral1.add_join_key(CatCol::from_vec("jk1", perip1_jk1.clone())).unwrap();
    peripheral1.add_join_key(CatCol::from_vec("jk2", perip1_jk2.clone())).unwrap();
    peripheral1.add_numerical(NumCol::from_vec("column_01", perip1_column_01)).unwrap();

    // peripheral2: 3 rows per peripheral1 row, joined on jk2.
    let perip2_rows = perip1_rows * 3;
    let perip2_jk2: Vec<i32> = perip1_jk2.iter().flat_map(|&k| [k, k, k]).collect();
    let perip2_column_01: Vec<f64> = (0..perip2_rows).map(|i| ((i % 17) as f64) * 11.0 - 90.0).collect();

    // Ground-truth target: for every matched peripheral1 row, count how
    // many of its peripheral2 matches have column_01 < 250 (always true
    // here), then sum that count across the population row's peripheral1
    // matches.
    let subtargets: Vec<f64> = perip1_jk2
        .iter()
        .map(|&k2| perip2_jk2.iter().zip(&perip2_column_01).filter(|(&jk, &v)| jk == k2 && v < 250.0).count() as f64)
        .collect();
    let target: Vec<f64> = (0..num_pop_rows as i32)
        .map(|g| perip1_jk1.iter().zip(&subtargets).filter(|(&jk, _)| jk == g).map(|(_, &s)| s).sum())
        .collect();
    population.add_target(NumCol::from_vec("target", target)).unwrap();

    let mut peripheral2 = Df::new("peripheral2", perip2_rows);
    peripheral2.add_join_key(CatCol::from_vec("jk2", perip2_jk2)).unwrap();
    peripheral2.add_numerical(NumCol::from_vec("column_01", perip2_column_01)).unwrap();

    let peripheral1_placeholder =
        Placeholder::new("peripheral1").join(edge("jk2", "jk2", Placeholder::new("peripheral2")));
    let placeholder =
        Placeholder::new("population").with_target("target").join(edge("jk1", "jk1", peripheral1_placeholder));

    let hyper = PipelineHyperparameters {
        learner: Learner::Both,
        ensemble: relfeat::ensemble::EnsembleHyperparameters { num_trees: 5, ..Default::default() },
        ..Default::default()
    };

    let (pipeline, fit_features, warner) = Pipeline::fit(
        population.clone(),
        vec![peripheral1.clone(), peripheral2.clone()],
        placeholder,
        hyper,
    )
    .unwrap();
    assert_eq!(fit_features.nrows(), num_pop_rows);
    assert!(warner.is_empty());
    for name in fit_features.numerical_names() {
        let col = fit_features.numerical(name).unwrap();
        assert!(col.as_slice().iter().all(|v| v.is_finite()), "column {name} has a non-finite value");
    }

    let transformed = pipeline.transform(population, vec![peripheral1, peripheral2]).unwrap();
    assert_eq!(transformed.nrows(), num_pop_rows);
    assert_eq!(transformed.numerical_names().len(), fit_features.numerical_names().len());
}
