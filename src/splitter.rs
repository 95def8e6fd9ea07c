//! Splitter (C7) — enumerates every candidate [`Condition`], scores each
//! with the active [`LossFunction`], and picks the best by gain with a
//! deterministic tie-break (spec §4.5).
//!
//! Relboost trees do not predict a constant per leaf: a leaf's
//! contribution to `yhat` is `weight * eta(row)`, the learned weight times
//! the aggregated value reaching that leaf. A split is therefore scored as
//! two independent weighted linear regressions of the gradient against
//! `eta1` (the branch where the condition holds) and `eta2` (its
//! complement), which is the relational generalization of XGBoost's
//! constant-leaf gain formula used directly by `SquareLoss`/
//! `CrossEntropyLoss`'s `split_gain`. Grounded on
//! `try_categorical_input`/`try_discrete_input`/`try_same_units_*`/
//! `try_time_stamps_diff` in
//! `original_source/.../relboost/decisiontrees/DecisionTreeNode.hpp`.

use crate::aggregation::state::AggregationState;
use crate::condition::{Condition, Side};
use crate::frame::Df;
use crate::loss::{GradHess, LossFunction};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Hyperparameters {
    pub lambda: f64,
    pub gamma: f64,
    pub min_samples_leaf: usize,
    pub max_depth: usize,
    /// Grid size for numerical-threshold candidates (quantile-spaced).
    pub num_thresholds: usize,
    /// Multiplied into every leaf weight at growth time (spec §4.5
    /// regularization list), distinct from the ensemble-level per-tree
    /// update rate computed by the loss function's line search.
    pub shrinkage: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Hyperparameters {
            lambda: 1.0,
            gamma: 0.0,
            min_samples_leaf: 1,
            num_thresholds: 9,
            max_depth: 3,
            shrinkage: 1.0,
        }
    }
}

pub struct CandidateSplit {
    pub condition: Condition,
    pub gain: f64,
    pub weight_left: f64,
    pub weight_right: f64,
}

/// `(sum_g*x, sum_h*x^2)` over every population row with a match in the
/// node, where `x` is that row's aggregate under the current partition.
fn weighted_score(etas: &[(u32, f64)], grad: &HashMap<u32, GradHess>) -> (f64, f64) {
    let mut sum_gx = 0.0;
    let mut sum_hxx = 0.0;
    for &(row, x) in etas {
        if x.is_nan() {
            continue;
        }
        if let Some(gh) = grad.get(&row) {
            sum_gx += gh.g * x;
            sum_hxx += gh.h * x * x;
        }
    }
    (sum_gx, sum_hxx)
}

fn score_to_gain(sum_gx: f64, sum_hxx: f64, lambda: f64) -> f64 {
    (sum_gx * sum_gx) / (sum_hxx + lambda)
}

fn quantile_grid(values: &[f64], n: usize) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup();
    if sorted.is_empty() {
        return Vec::new();
    }
    let mut grid: Vec<f64> = (1..=n)
        .map(|i| {
            let rank = (i as f64 / (n + 1) as f64) * (sorted.len() - 1) as f64;
            sorted[rank.round() as usize]
        })
        .collect();
    grid.sort_by(f64::total_cmp);
    grid.dedup();
    grid
}

/// Evaluates the current `Sigma` partition of `agg` against `grad`/`lambda`
/// and the node's un-split score, returning the gain and the two weights.
fn evaluate_current_partition(
    agg: &AggregationState<'_>,
    grad: &HashMap<u32, GradHess>,
    hyper: &Hyperparameters,
    parent_score: f64,
) -> (f64, f64, f64) {
    let etas = agg.update_and_clear();
    let left_pairs: Vec<(u32, f64)> = etas.iter().map(|e| (e.row, e.eta1)).collect();
    let right_pairs: Vec<(u32, f64)> = etas.iter().map(|e| (e.row, e.eta2)).collect();
    let (gx_l, hxx_l) = weighted_score(&left_pairs, grad);
    let (gx_r, hxx_r) = weighted_score(&right_pairs, grad);
    let score_l = score_to_gain(gx_l, hxx_l, hyper.lambda);
    let score_r = score_to_gain(gx_r, hxx_r, hyper.lambda);
    let gain = 0.5 * (score_l + score_r - parent_score) - hyper.gamma;
    let weight_left = hyper.shrinkage * (-gx_l / (hxx_l + hyper.lambda));
    let weight_right = hyper.shrinkage * (-gx_r / (hxx_r + hyper.lambda));
    (gain, weight_left, weight_right)
}

/// Tries every condition the node can split on and returns the best by
/// gain, with ties (within float epsilon) broken by `Condition::tie_break_key`
/// for reproducibility (spec §4.5, §8).
#[allow(clippy::too_many_arguments)]
pub fn find_best_split(
    agg: &mut AggregationState<'_>,
    grad: &HashMap<u32, GradHess>,
    hyper: &Hyperparameters,
    _loss: &dyn LossFunction,
    input: &Df,
    output: &Df,
) -> Option<CandidateSplit> {
    agg.activate_all();
    let parent_etas = agg.update_and_clear();
    let parent_pairs: Vec<(u32, f64)> = parent_etas.iter().map(|e| (e.row, e.eta1)).collect();
    let (gx_p, hxx_p) = weighted_score(&parent_pairs, grad);
    let parent_score = score_to_gain(gx_p, hxx_p, hyper.lambda);
    agg.commit();

    let mut best: Option<CandidateSplit> = None;
    let mut consider = |condition: Condition, gain: f64, wl: f64, wr: f64| {
        if !gain.is_finite() {
            return;
        }
        let better = match &best {
            None => true,
            Some(b) => {
                if (gain - b.gain).abs() > 1e-12 {
                    gain > b.gain
                } else {
                    condition.tie_break_key() < b.condition.tie_break_key()
                }
            }
        };
        if better {
            best = Some(CandidateSplit { condition, gain, weight_left: wl, weight_right: wr });
        }
    };

    for col in input.categorical_names() {
        let cat = input.categorical(col).or_else(|| input.any_categorical(col)).unwrap();
        let mut codes: Vec<i32> = cat.as_slice().iter().copied().filter(|c| !c.is_negative()).collect();
        codes.sort_unstable();
        codes.dedup();
        for code in codes {
            agg.set_by_categories(Side::Input, cat.as_slice(), &[code], true);
            let (gain, wl, wr) = evaluate_current_partition(agg, grad, hyper, parent_score);
            consider(
                Condition::CategoricalIn { side: Side::Input, column: col.to_string(), codes: vec![code] },
                gain,
                wl,
                wr,
            );
            agg.revert_to_commit();
        }
    }

    for col in input.numerical_names() {
        let num = input.numerical(col).or_else(|| input.any_numeric(col)).unwrap();
        for threshold in quantile_grid(num.as_slice(), hyper.num_thresholds) {
            agg.activate_from_above(Side::Input, num.as_slice(), threshold, true);
            let (gain, wl, wr) = evaluate_current_partition(agg, grad, hyper, parent_score);
            consider(
                Condition::NumericalGreater { side: Side::Input, column: col.to_string(), threshold },
                gain,
                wl,
                wr,
            );
            agg.revert_to_commit();
        }
    }

    for in_col in input.categorical_names() {
        for out_col in output.categorical_names() {
            let left = input.categorical(in_col).unwrap();
            let right = output.categorical(out_col).unwrap();
            agg.activate_same_units_categorical(left.as_slice(), right.as_slice(), true);
            let (gain, wl, wr) = evaluate_current_partition(agg, grad, hyper, parent_score);
            consider(
                Condition::SameUnitsCategoricalEquals {
                    input_column: in_col.to_string(),
                    output_column: out_col.to_string(),
                },
                gain,
                wl,
                wr,
            );
            agg.revert_to_commit();
        }
    }

    if let (Some(in_ts), Some(out_ts)) = (input.any_numeric("ts"), output.any_numeric("ts")) {
        for threshold in quantile_grid(in_ts.as_slice(), hyper.num_thresholds) {
            agg.activate_same_units_diff_above(in_ts.as_slice(), out_ts.as_slice(), threshold, true);
            let (gain, wl, wr) = evaluate_current_partition(agg, grad, hyper, parent_score);
            consider(
                Condition::TimestampDiffGreater {
                    input_ts_column: "ts".into(),
                    output_ts_column: "ts".into(),
                    threshold,
                },
                gain,
                wl,
                wr,
            );
            agg.revert_to_commit();
        }
    }

    best.filter(|c| c.gain > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::column::{CatCol, NumCol};
    use crate::matchmaker::Match;

    #[test]
    fn finds_the_separating_category() {
        let matches = vec![
            Match { ix_output: 0, ix_input: 0 },
            Match { ix_output: 0, ix_input: 1 },
            Match { ix_output: 1, ix_input: 2 },
            Match { ix_output: 1, ix_input: 3 },
        ];
        let values = vec![10.0, 10.0, 1.0, 1.0];
        let mut agg =
            AggregationState::new(crate::aggregation::AggregationKind::Sum, &matches, values, vec![], vec![]);

        let mut grad = HashMap::new();
        grad.insert(0, GradHess { g: -10.0, h: 1.0 });
        grad.insert(1, GradHess { g: -1.0, h: 1.0 });

        let mut input = Df::new("perip", 4);
        input.add_categorical(CatCol::from_vec("cat", vec![0, 0, 1, 1])).unwrap();
        let output = Df::new("pop", 2);

        let loss = crate::loss::SquareLoss;
        let hyper = Hyperparameters::default();
        let best = find_best_split(&mut agg, &grad, &hyper, &loss, &input, &output).unwrap();
        match best.condition {
            Condition::CategoricalIn { codes, .. } => assert_eq!(codes, vec![0]),
            _ => panic!("expected a categorical split"),
        }
    }

    #[test]
    fn numerical_threshold_grid_is_quantile_spaced() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let grid = quantile_grid(&values, 3);
        assert_eq!(grid.len(), 3);
        for t in &grid {
            assert!(*t >= 1.0 && *t <= 10.0);
        }
    }
}
