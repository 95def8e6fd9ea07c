//! Ensemble boosting against known-structure targets: a square-loss
//! regression with an exactly recoverable linear relationship, and a
//! cross-entropy classification with a clean separating boundary.

use relfeat::ensemble::{Ensemble, EnsembleHyperparameters};
use relfeat::frame::column::{CatCol, NumCol};
use relfeat::frame::Df;
use relfeat::placeholder::{Edge, Placeholder, RelationshipTag};
use relfeat::splitter::Hyperparameters as TreeHyperparameters;

fn direct_edge(child_name: &str) -> Edge {
    Edge {
        left_key_col: "jk".to_string(),
        right_key_col: "jk".to_string(),
        left_ts_col: None,
        right_ts_col: None,
        right_upper_ts_col: None,
        horizon: 0.0,
        memory: None,
        relationship: RelationshipTag::ManyToMany,
        allow_lagged_targets: false,
        child: Box::new(Placeholder::new(child_name)),
    }
}

#[test]
fn square_loss_boosting_drives_residual_well_below_the_target_variance() {
    // Two groups of population rows, each matched to two peripheral rows
    // whose amounts sum to a distinct, group-specific total; the target is
    // exactly that sum, so the candidate Sum/Count pool spans the needed
    // two-dimensional (slope, intercept-like) family.
    let num_groups = 2;
    let rows_per_group = 20;
    let nrows = num_groups * rows_per_group;

    let jk: Vec<i32> = (0..nrows).map(|i| (i % num_groups) as i32).collect();
    let group_sum = |g: i32| -> f64 {
        if g == 0 {
            12.0
        } else {
            97.0
        }
    };
    let target: Vec<f64> = jk.iter().map(|&g| group_sum(g)).collect();

    let mut population = Df::new("population", nrows);
    population.add_join_key(CatCol::from_vec("jk", jk.clone())).unwrap();
    population.add_target(NumCol::from_vec("target", target.clone())).unwrap();

    let peripheral_rows = nrows * 2;
    let peripheral_jk: Vec<i32> = (0..nrows).flat_map(|i| [jk[i], jk[i]]).collect();
    let amount: Vec<f64> = jk.iter().flat_map(|&g| {
        let s = group_sum(g);
        [s / 2.0, s / 2.0]
    }).collect();
    assert_eq!(peripheral_jk.len(), peripheral_rows);

    let mut peripheral = Df::new("peripheral", peripheral_rows);
    peripheral.add_join_key(CatCol::from_vec("jk", peripheral_jk)).unwrap();
    peripheral.add_numerical(NumCol::from_vec("amount", amount)).unwrap();

    let placeholder = Placeholder::new("population").with_target("target").join(direct_edge("peripheral"));

    let hyper = EnsembleHyperparameters {
        num_trees: 60,
        sampling_factor: 1.0,
        tree: TreeHyperparameters { max_depth: 2, min_samples_leaf: 1, ..Default::default() },
        num_threads: 0,
    };

    let ensemble = Ensemble::fit(&population, &[peripheral.clone()], &placeholder, "SquareLoss", hyper, 7).unwrap();
    let predictions = ensemble.transform(&population, &[peripheral], &placeholder).unwrap();
    assert_eq!(predictions.len(), nrows);
    assert!(predictions.iter().all(|v| v.is_finite()));

    let mean_target = target.iter().sum::<f64>() / target.len() as f64;
    let baseline_mse: f64 =
        target.iter().map(|t| (t - mean_target).powi(2)).sum::<f64>() / target.len() as f64;
    let fitted_mse: f64 = predictions
        .iter()
        .zip(&target)
        .map(|(p, t)| (p - t).powi(2))
        .sum::<f64>()
        / target.len() as f64;

    assert!(fitted_mse < baseline_mse * 0.1, "fitted_mse={fitted_mse} baseline_mse={baseline_mse}");
}

#[test]
fn cross_entropy_ensemble_beats_the_majority_class_baseline() {
    let nrows = 80;
    let jk: Vec<i32> = (0..nrows).collect();

    let mut population = Df::new("population", nrows as usize);
    population.add_join_key(CatCol::from_vec("jk", jk.clone())).unwrap();

    // Each population row is matched to 3 peripheral rows; the label is
    // 1 iff their column_01 sum is positive, giving the splitter a clean,
    // monotone boundary to find.
    let peripheral_rows = nrows as usize * 3;
    let mut peripheral_jk = Vec::with_capacity(peripheral_rows);
    let mut column_01 = Vec::with_capacity(peripheral_rows);
    let mut label = Vec::with_capacity(nrows as usize);
    for i in 0..nrows {
        let base = if i % 2 == 0 { 10.0 } else { -10.0 };
        for k in 0..3 {
            peripheral_jk.push(i);
            column_01.push(base + (k as f64) - 1.0);
        }
        let sum: f64 = (0..3).map(|k| base + (k as f64) - 1.0).sum();
        label.push(if sum > 0.0 { 1.0 } else { 0.0 });
    }

    let mut peripheral = Df::new("peripheral", peripheral_rows);
    peripheral.add_join_key(CatCol::from_vec("jk", peripheral_jk)).unwrap();
    peripheral.add_numerical(NumCol::from_vec("column_01", column_01)).unwrap();

    population.add_target(NumCol::from_vec("label", label.clone())).unwrap();

    let placeholder = Placeholder::new("population").with_target("label").join(direct_edge("peripheral"));

    let hyper = EnsembleHyperparameters {
        num_trees: 10,
        sampling_factor: 1.0,
        tree: TreeHyperparameters { max_depth: 2, min_samples_leaf: 1, ..Default::default() },
        num_threads: 0,
    };

    let ensemble =
        Ensemble::fit(&population, &[peripheral.clone()], &placeholder, "CrossEntropyLoss", hyper, 11).unwrap();
    let predictions = ensemble.transform(&population, &[peripheral], &placeholder).unwrap();
    assert_eq!(predictions.len(), nrows as usize);
    assert!(predictions.iter().all(|v| v.is_finite()));

    let correct = (0..predictions.len())
        .filter(|&i| ((predictions[i] > 0.5) as i32 as f64 - label[i]).abs() < 1e-9)
        .count();
    let accuracy = correct as f64 / nrows as f64;

    let positives = label.iter().filter(|&&l| l > 0.5).count();
    let majority_baseline = (positives.max(nrows as usize - positives)) as f64 / nrows as f64;

    assert!(accuracy > majority_baseline, "accuracy={accuracy} majority_baseline={majority_baseline}");
    assert!(accuracy > 0.7, "accuracy={accuracy}");
}
