//! Decision tree (C9, node half) — one relational decision tree: matches
//! (not population rows) are recursively partitioned by [`Condition`], and
//! each leaf contributes `weight * aggregate(matches reaching that leaf)`
//! to every population row with at least one such match (spec §4.7).
//!
//! A single population row's matches can end up in different leaves, so
//! `transform` routes each match individually and sums the leaves'
//! contributions per row — this is what makes a Relboost tree a relational
//! generalization of an ordinary decision tree rather than one split per
//! row. Grounded on
//! `original_source/.../multirel/decisiontrees/DecisionTree.hpp` and the
//! `child_smaller_`/`child_greater_` structure in `DecisionTreeNode.hpp`.

use crate::aggregation::kernels::{self, Inputs};
use crate::aggregation::state::AggregationState;
use crate::aggregation::AggregationKind;
use crate::condition::{Condition, Side};
use crate::frame::Df;
use crate::loss::{GradHess, LossFunction};
use crate::matchmaker::Match;
use crate::splitter::{self, Hyperparameters};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf { weight: f64 },
    Split { condition: Condition, gain: f64, left: Box<TreeNode>, right: Box<TreeNode> },
}

impl TreeNode {
    pub fn leaf_count(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.leaf_count() + right.leaf_count(),
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    /// Sum of every split's gain in this subtree — the tree's contribution
    /// to a feature importance ranking (spec's `Pipeline.feature_importances`
    /// / `column_importances`).
    pub fn total_gain(&self) -> f64 {
        match self {
            TreeNode::Leaf { .. } => 0.0,
            TreeNode::Split { gain, left, right, .. } => gain + left.total_gain() + right.total_gain(),
        }
    }
}

/// Owned per-match arrays threaded through tree growth: the aggregated
/// value, its peripheral time companion (empty when unused) and the
/// population row's reference timestamp (same).
struct MatchData {
    matches: Vec<Match>,
    values: Vec<f64>,
    times: Vec<f64>,
    ref_ts: Vec<f64>,
}

impl MatchData {
    fn subset(&self, active: &[bool]) -> (MatchData, MatchData) {
        let mut left = MatchData { matches: vec![], values: vec![], times: vec![], ref_ts: vec![] };
        let mut right = MatchData { matches: vec![], values: vec![], times: vec![], ref_ts: vec![] };
        for (i, &is_active) in active.iter().enumerate() {
            let target = if is_active { &mut left } else { &mut right };
            target.matches.push(self.matches[i]);
            target.values.push(self.values[i]);
            if !self.times.is_empty() {
                target.times.push(self.times[i]);
            }
            if !self.ref_ts.is_empty() {
                target.ref_ts.push(self.ref_ts[i]);
            }
        }
        (left, right)
    }
}

fn leaf_weight(
    kind: AggregationKind,
    data: &MatchData,
    grad: &HashMap<u32, GradHess>,
    lambda: f64,
) -> f64 {
    let mut agg = AggregationState::new(kind, &data.matches, data.values.clone(), data.times.clone(), data.ref_ts.clone());
    agg.activate_all();
    let etas = agg.update_and_clear();
    let mut sum_gx = 0.0;
    let mut sum_hxx = 0.0;
    for e in &etas {
        if e.eta1.is_nan() {
            continue;
        }
        if let Some(gh) = grad.get(&e.row) {
            sum_gx += gh.g * e.eta1;
            sum_hxx += gh.h * e.eta1 * e.eta1;
        }
    }
    -sum_gx / (sum_hxx + lambda)
}

#[allow(clippy::too_many_arguments)]
fn fit_node(
    depth: usize,
    data: MatchData,
    kind: AggregationKind,
    grad: &HashMap<u32, GradHess>,
    hyper: &Hyperparameters,
    loss: &dyn LossFunction,
    input: &Df,
    output: &Df,
) -> TreeNode {
    let distinct_rows: std::collections::HashSet<u32> = data.matches.iter().map(|m| m.ix_output).collect();
    if depth >= hyper.max_depth || distinct_rows.len() < 2 * hyper.min_samples_leaf || data.matches.is_empty() {
        let w = if data.matches.is_empty() { 0.0 } else { hyper.shrinkage * leaf_weight(kind, &data, grad, hyper.lambda) };
        return TreeNode::Leaf { weight: w };
    }

    let mut agg =
        AggregationState::new(kind, &data.matches, data.values.clone(), data.times.clone(), data.ref_ts.clone());
    let best = splitter::find_best_split(&mut agg, grad, hyper, loss, input, output);

    match best {
        None => TreeNode::Leaf { weight: hyper.shrinkage * leaf_weight(kind, &data, grad, hyper.lambda) },
        Some(candidate) => {
            apply_condition(&mut agg, &candidate.condition, input, output);
            let active = agg.active_mask();
            let (left_data, right_data) = data.subset(&active);
            if left_data.matches.is_empty() || right_data.matches.is_empty() {
                return TreeNode::Leaf { weight: hyper.shrinkage * leaf_weight(kind, &data, grad, hyper.lambda) };
            }
            let left = fit_node(depth + 1, left_data, kind, grad, hyper, loss, input, output);
            let right = fit_node(depth + 1, right_data, kind, grad, hyper, loss, input, output);
            TreeNode::Split {
                condition: candidate.condition,
                gain: candidate.gain,
                left: Box::new(left),
                right: Box::new(right),
            }
        }
    }
}

/// Re-applies a chosen condition to `agg` so its `Sigma` reflects the
/// winning partition (the search loop reverts after every trial).
fn apply_condition(agg: &mut AggregationState<'_>, condition: &Condition, input: &Df, output: &Df) {
    match condition {
        Condition::CategoricalIn { side, column, codes } => {
            let col = match side {
                Side::Input => input.any_categorical(column),
                Side::Output => output.any_categorical(column),
            }
            .expect("condition column must exist");
            agg.set_by_categories(*side, col.as_slice(), codes, false);
        }
        Condition::NumericalGreater { side, column, threshold } => {
            let col = match side {
                Side::Input => input.any_numeric(column),
                Side::Output => output.any_numeric(column),
            }
            .expect("condition column must exist");
            agg.activate_from_above(*side, col.as_slice(), *threshold, false);
        }
        Condition::SameUnitsCategoricalEquals { input_column, output_column } => {
            let l = input.any_categorical(input_column).expect("input column must exist");
            let r = output.any_categorical(output_column).expect("output column must exist");
            agg.activate_same_units_categorical(l.as_slice(), r.as_slice(), false);
        }
        Condition::SameUnitsNumericalDiffGreater { input_column, output_column, threshold }
        | Condition::TimestampDiffGreater {
            input_ts_column: input_column,
            output_ts_column: output_column,
            threshold,
        } => {
            let l = input.any_numeric(input_column).expect("input column must exist");
            let r = output.any_numeric(output_column).expect("output column must exist");
            agg.activate_same_units_diff_above(l.as_slice(), r.as_slice(), *threshold, false);
        }
        Condition::TextTokenPresent { .. } => {
            // Realized upstream by the text splitter as a derived boolean
            // column consumed through `CategoricalIn`; never produced
            // directly by the splitter's search loop.
        }
    }
    agg.commit();
}

pub fn fit(
    matches: Vec<Match>,
    values: Vec<f64>,
    times: Vec<f64>,
    ref_ts: Vec<f64>,
    kind: AggregationKind,
    grad: &HashMap<u32, GradHess>,
    hyper: &Hyperparameters,
    loss: &dyn LossFunction,
    input: &Df,
    output: &Df,
) -> TreeNode {
    let data = MatchData { matches, values, times, ref_ts };
    fit_node(0, data, kind, grad, hyper, loss, input, output)
}

/// Sums every leaf's contribution for one population row's matches,
/// routing each match down the tree independently.
pub fn predict_row(
    node: &TreeNode,
    kind: AggregationKind,
    idxs: &[usize],
    matches: &[Match],
    values: &[f64],
    times: &[f64],
    ref_ts: &[f64],
    input: &Df,
    output: &Df,
) -> f64 {
    match node {
        TreeNode::Leaf { weight } => {
            if idxs.is_empty() {
                return 0.0;
            }
            let vals: Vec<f64> = idxs.iter().map(|&i| values[i]).filter(|v| !v.is_nan()).collect();
            let times_local: Vec<f64> = if times.is_empty() { vec![] } else { idxs.iter().map(|&i| times[i]).collect() };
            let ref_ts_local = idxs.iter().map(|&i| ref_ts.get(i).copied().unwrap_or(f64::NAN)).find(|t| !t.is_nan()).unwrap_or(f64::NAN);
            let agg_val = kernels::reduce(kind, Inputs { values: &vals, times: &times_local, ref_ts: ref_ts_local });
            if agg_val.is_nan() {
                0.0
            } else {
                weight * agg_val
            }
        }
        TreeNode::Split { condition, left, right, .. } => {
            let mut left_idxs = Vec::new();
            let mut right_idxs = Vec::new();
            for &i in idxs {
                if condition_holds(condition, input, output, &matches[i]) {
                    left_idxs.push(i);
                } else {
                    right_idxs.push(i);
                }
            }
            predict_row(left, kind, &left_idxs, matches, values, times, ref_ts, input, output)
                + predict_row(right, kind, &right_idxs, matches, values, times, ref_ts, input, output)
        }
    }
}

fn condition_holds(condition: &Condition, input: &Df, output: &Df, m: &Match) -> bool {
    match condition {
        Condition::CategoricalIn { side, column, codes } => {
            let (col, idx) = match side {
                Side::Input => (input.any_categorical(column), m.ix_input as usize),
                Side::Output => (output.any_categorical(column), m.ix_output as usize),
            };
            col.and_then(|c| c.get(idx)).map(|v| codes.contains(&v)).unwrap_or(false)
        }
        Condition::NumericalGreater { side, column, threshold } => {
            let (col, idx) = match side {
                Side::Input => (input.any_numeric(column), m.ix_input as usize),
                Side::Output => (output.any_numeric(column), m.ix_output as usize),
            };
            col.and_then(|c| c.get(idx)).map(|v| !v.is_nan() && v > *threshold).unwrap_or(false)
        }
        Condition::SameUnitsCategoricalEquals { input_column, output_column } => {
            let l = input.any_categorical(input_column).and_then(|c| c.get(m.ix_input as usize));
            let r = output.any_categorical(output_column).and_then(|c| c.get(m.ix_output as usize));
            matches!((l, r), (Some(a), Some(b)) if a == b)
        }
        Condition::SameUnitsNumericalDiffGreater { input_column, output_column, threshold }
        | Condition::TimestampDiffGreater {
            input_ts_column: input_column,
            output_ts_column: output_column,
            threshold,
        } => {
            let l = input.any_numeric(input_column).and_then(|c| c.get(m.ix_input as usize));
            let r = output.any_numeric(output_column).and_then(|c| c.get(m.ix_output as usize));
            match (l, r) {
                (Some(a), Some(b)) if !a.is_nan() && !b.is_nan() => (a - b).abs() > *threshold,
                _ => false,
            }
        }
        Condition::TextTokenPresent { .. } => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::column::CatCol;

    #[test]
    fn single_tree_fits_a_perfectly_separable_split() {
        let matches = vec![
            Match { ix_output: 0, ix_input: 0 },
            Match { ix_output: 0, ix_input: 1 },
            Match { ix_output: 1, ix_input: 2 },
            Match { ix_output: 1, ix_input: 3 },
            Match { ix_output: 2, ix_input: 0 },
            Match { ix_output: 3, ix_input: 2 },
        ];
        let values = vec![10.0, 10.0, 1.0, 1.0, 10.0, 1.0];
        let mut input = Df::new("perip", 4);
        input.add_categorical(CatCol::from_vec("cat", vec![0, 0, 1, 1])).unwrap();
        let output = Df::new("pop", 4);

        let mut grad = HashMap::new();
        grad.insert(0, GradHess { g: -10.0, h: 1.0 });
        grad.insert(1, GradHess { g: -1.0, h: 1.0 });
        grad.insert(2, GradHess { g: -10.0, h: 1.0 });
        grad.insert(3, GradHess { g: -1.0, h: 1.0 });

        let hyper = Hyperparameters::default();
        let loss = crate::loss::SquareLoss;
        let tree = fit(matches.clone(), values.clone(), vec![], vec![], AggregationKind::Sum, &grad, &hyper, &loss, &input, &output);
        assert!(tree.leaf_count() >= 2);

        for row in 0..4u32 {
            let idxs: Vec<usize> = matches.iter().enumerate().filter(|(_, m)| m.ix_output == row).map(|(i, _)| i).collect();
            let pred = predict_row(&tree, AggregationKind::Sum, &idxs, &matches, &values, &[], &[], &input, &output);
            if row == 0 || row == 2 {
                assert!(pred > 0.0, "row {row} should get a positive contribution");
            } else {
                assert!(pred < 0.0, "row {row} should get a negative contribution");
            }
        }
    }
}
