//! Ensemble (C9, boosting half) — composes [`crate::tree::TreeNode`]s fit
//! by C7/C8 into an additive model with a global intercept and a per-tree
//! update rate (spec §4.7), plus the sub-ensembles a snowflake schema's
//! propositionalization-tagged joins need (spec §4.9).
//!
//! Grounded on `original_source/.../multirel/ensemble/DecisionTreeEnsemble.hpp`:
//! `fit` orchestrates candidate sampling and tree growth exactly as its
//! `fit(TableHolder, ...)` overload does (sample K placeholders, grow each,
//! keep the best, update residuals); `subensembles_avg`/`subensembles_sum`
//! mirror its trivial accessors of the same name.

use crate::aggregation::AggregationKind;
use crate::coordinator::Coordinator;
use crate::error::{EngineError, EngineResult};
use crate::frame::Df;
use crate::loss::{self, GradHess, LossFunction};
use crate::matchmaker::{Match, Matchmaker};
use crate::placeholder::{Edge, Placeholder, RelationshipTag};
use crate::splitter::Hyperparameters;
use crate::tree::{self, TreeNode};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Aggregation kinds tried as boosting-round candidates. A subset of
/// `AggregationKind`'s full 29 variants (spec §4.4 lists them all as valid
/// FastProp features; the boosting search restricts itself to the ones
/// cheap to re-evaluate every candidate round, matching the original's
/// default candidate list rather than enumerating every aggregation).
const CANDIDATE_KINDS: &[AggregationKind] = &[
    AggregationKind::Avg,
    AggregationKind::Sum,
    AggregationKind::Count,
    AggregationKind::Max,
    AggregationKind::Min,
    AggregationKind::Stddev,
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct EnsembleHyperparameters {
    pub num_trees: usize,
    /// Fraction of the (edge, column, aggregation) candidate pool sampled
    /// without replacement each boosting round.
    pub sampling_factor: f64,
    pub tree: Hyperparameters,
    /// Worker count for the per-row prediction fan-out in `transform`/
    /// `raw_scores_direct` (spec §4.10); `0` means `max(2, hw_concurrency-2)`.
    pub num_threads: usize,
}

impl Default for EnsembleHyperparameters {
    fn default() -> Self {
        EnsembleHyperparameters {
            num_trees: 10,
            sampling_factor: 1.0,
            tree: Hyperparameters::default(),
            num_threads: 0,
        }
    }
}

/// One boosted tree plus the candidate it was grown from: which direct
/// edge off the population placeholder, which peripheral column was
/// aggregated, and under which `AggregationKind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedTree {
    pub edge_index: usize,
    pub column: String,
    pub aggregation: AggregationKind,
    pub node: TreeNode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ensemble {
    pub loss_name: String,
    pub intercept: f64,
    pub trees: Vec<FittedTree>,
    pub update_rates: Vec<f64>,
    pub hyper: EnsembleHyperparameters,
    /// One sub-ensemble per snowflake peripheral table (keyed by its
    /// `Df::name()`), fit against that table's own children, targeting the
    /// outer residual aggregated down through the join under AVG.
    pub subensembles_avg: HashMap<String, Ensemble>,
    /// The SUM-targeted counterpart, fit against the unnormalized residual
    /// sum rather than its per-row mean.
    pub subensembles_sum: HashMap<String, Ensemble>,
}

pub(crate) fn find_peripheral<'a>(peripheral: &'a [Df], edge: &Edge) -> EngineResult<&'a Df> {
    let name = edge.child.node_name();
    peripheral.iter().find(|df| df.name() == name).ok_or_else(|| {
        EngineError::validation(format!("no peripheral frame supplied for joined table '{name}'"))
    })
}

/// Gathers the per-match value/time/ref-time arrays `kind` needs out of
/// `column` on `input`, indexed by each match's `ix_input`/`ix_output`.
pub(crate) fn build_value_arrays(
    matches: &[Match],
    input: &Df,
    output: &Df,
    column: &str,
    kind: AggregationKind,
    right_ts_col: Option<&str>,
    left_ts_col: Option<&str>,
) -> EngineResult<(Vec<f64>, Vec<f64>, Vec<f64>)> {
    let col = input
        .any_numeric(column)
        .ok_or_else(|| EngineError::validation(format!("no numerical column '{column}' on '{}'", input.name())))?;
    let values: Vec<f64> = matches.iter().map(|m| col.get(m.ix_input as usize).unwrap_or(f64::NAN)).collect();
    let (times, ref_ts) = if kind.needs_time() {
        let times = right_ts_col
            .and_then(|c| input.any_numeric(c))
            .map(|tc| matches.iter().map(|m| tc.get(m.ix_input as usize).unwrap_or(f64::NAN)).collect())
            .unwrap_or_default();
        let ref_ts = left_ts_col
            .and_then(|c| output.any_numeric(c))
            .map(|tc| matches.iter().map(|m| tc.get(m.ix_output as usize).unwrap_or(f64::NAN)).collect())
            .unwrap_or_default();
        (times, ref_ts)
    } else {
        (Vec::new(), Vec::new())
    };
    Ok((values, times, ref_ts))
}

/// `mean(target)` under square loss, `logit(mean(target))` under
/// cross-entropy — the boosting-round starting point before any residual
/// has been subtracted (spec §4.7).
fn initial_intercept(loss_name: &str, target: &[f64]) -> f64 {
    let valid: Vec<f64> = target.iter().copied().filter(|v| !v.is_nan()).collect();
    let mean = if valid.is_empty() { 0.0 } else { valid.iter().sum::<f64>() / valid.len() as f64 };
    if loss_name == "CrossEntropyLoss" {
        let p = mean.clamp(1e-6, 1.0 - 1e-6);
        (p / (1.0 - p)).ln()
    } else {
        mean
    }
}

fn scale_tree(node: &TreeNode, factor: f64) -> TreeNode {
    match node {
        TreeNode::Leaf { weight } => TreeNode::Leaf { weight: weight * factor },
        TreeNode::Split { condition, gain, left, right } => TreeNode::Split {
            condition: condition.clone(),
            gain: *gain,
            left: Box::new(scale_tree(left, factor)),
            right: Box::new(scale_tree(right, factor)),
        },
    }
}

/// Materializes every match for `edge` across the whole population in one
/// pass — small enough for the seed-scale fits this engine targets;
/// `coordinator` (C12) is where a production-scale fit would instead fan
/// this out per row-range and reduce.
pub(crate) fn matches_for_edge(population: &Df, peripheral_df: &Df, edge: &Edge) -> EngineResult<Vec<Match>> {
    let mm = Matchmaker::new(population, peripheral_df, edge)?;
    let mut all = Vec::new();
    let mut buf = Vec::new();
    for row in 0..population.nrows() {
        mm.make_matches(row, &mut buf);
        all.extend_from_slice(&buf);
    }
    Ok(all)
}

fn group_by_output_row(matches: &[Match], nrows: usize) -> Vec<Vec<usize>> {
    let mut idx = vec![Vec::new(); nrows];
    for (i, m) in matches.iter().enumerate() {
        idx[m.ix_output as usize].push(i);
    }
    idx
}

impl Ensemble {
    /// Orchestrates the boosting loop of spec §4.7 over every direct
    /// (non-propositionalization) edge of `placeholder`, then fits the
    /// AVG/SUM sub-ensembles for any propositionalization-tagged grandchild
    /// joins (spec §4.9).
    pub fn fit(
        population: &Df,
        peripheral: &[Df],
        placeholder: &Placeholder,
        loss_name: &str,
        hyper: EnsembleHyperparameters,
        rng_seed: u64,
    ) -> EngineResult<Ensemble> {
        let mut ensemble = Self::fit_direct(population, peripheral, placeholder, loss_name, hyper, rng_seed)?;
        ensemble.fit_subensembles(population, peripheral, placeholder, hyper, rng_seed)?;
        Ok(ensemble)
    }

    fn fit_direct(
        population: &Df,
        peripheral: &[Df],
        placeholder: &Placeholder,
        loss_name: &str,
        hyper: EnsembleHyperparameters,
        rng_seed: u64,
    ) -> EngineResult<Ensemble> {
        let target_name = placeholder
            .targets
            .first()
            .ok_or_else(|| EngineError::validation("placeholder has no target column"))?;
        let target_col = population
            .target(target_name)
            .or_else(|| population.any_numeric(target_name))
            .ok_or_else(|| EngineError::validation(format!("population has no target column '{target_name}'")))?;
        let target: Vec<f64> = target_col.as_slice().to_vec();
        let loss = loss::by_name(loss_name)?;

        let intercept = initial_intercept(loss_name, &target);
        let mut yhat = vec![intercept; target.len()];

        let direct_edges: Vec<(usize, &Edge)> = placeholder
            .edges
            .iter()
            .enumerate()
            .filter(|(_, e)| e.relationship != RelationshipTag::Propositionalization)
            .collect();

        let mut pool: Vec<(usize, String, AggregationKind)> = Vec::new();
        for (idx, edge) in &direct_edges {
            let peripheral_df = find_peripheral(peripheral, edge)?;
            for col in peripheral_df.numerical_names() {
                for kind in CANDIDATE_KINDS {
                    pool.push((*idx, col.to_string(), *kind));
                }
            }
        }
        if pool.is_empty() {
            return Err(EngineError::validation("no numerical peripheral columns available to boost over"));
        }

        let mut rng = StdRng::seed_from_u64(rng_seed);
        let mut trees = Vec::new();
        let mut update_rates = Vec::new();

        for _ in 0..hyper.num_trees {
            let grad: HashMap<u32, GradHess> =
                (0..target.len()).map(|r| (r as u32, loss.gradients(target[r], yhat[r]))).collect();

            let sample_size = ((pool.len() as f64) * hyper.sampling_factor).ceil().max(1.0) as usize;
            let mut order: Vec<usize> = (0..pool.len()).collect();
            order.shuffle(&mut rng);
            order.truncate(sample_size.min(pool.len()));

            let mut best: Option<(f64, usize, TreeNode, Vec<f64>)> = None;
            for pool_idx in order {
                let (edge_idx, column, kind) = pool[pool_idx].clone();
                let edge = direct_edges.iter().find(|(i, _)| *i == edge_idx).unwrap().1;
                let peripheral_df = find_peripheral(peripheral, edge)?;
                let matches = matches_for_edge(population, peripheral_df, edge)?;
                if matches.is_empty() {
                    continue;
                }
                let (values, times, ref_ts) = build_value_arrays(
                    &matches,
                    peripheral_df,
                    population,
                    &column,
                    kind,
                    edge.right_ts_col.as_deref(),
                    edge.left_ts_col.as_deref(),
                )?;
                let node = tree::fit(
                    matches.clone(),
                    values.clone(),
                    times.clone(),
                    ref_ts.clone(),
                    kind,
                    &grad,
                    &hyper.tree,
                    loss.as_ref(),
                    peripheral_df,
                    population,
                );

                let by_row = group_by_output_row(&matches, target.len());
                let mut preds = vec![0.0; target.len()];
                for row in 0..target.len() {
                    preds[row] = tree::predict_row(
                        &node,
                        kind,
                        &by_row[row],
                        &matches,
                        &values,
                        &times,
                        &ref_ts,
                        peripheral_df,
                        population,
                    );
                }
                let gain: f64 = (0..target.len())
                    .map(|r| {
                        let gh = grad[&(r as u32)];
                        -gh.g * preds[r] - 0.5 * gh.h * preds[r] * preds[r]
                    })
                    .sum();
                if best.as_ref().is_none_or(|(g, ..)| gain > *g) {
                    best = Some((gain, pool_idx, node, preds));
                }
            }

            let Some((gain, pool_idx, node, preds)) = best else { break };
            if gain <= 0.0 {
                break;
            }
            let rate = loss.update_rate(&yhat, &preds, &target);
            if rate == 0.0 || !rate.is_finite() {
                break;
            }
            for row in 0..target.len() {
                yhat[row] += rate * preds[row];
            }
            let (edge_idx, column, kind) = pool[pool_idx].clone();
            trees.push(FittedTree { edge_index: edge_idx, column, aggregation: kind, node: scale_tree(&node, rate) });
            update_rates.push(rate);
        }

        Ok(Ensemble {
            loss_name: loss_name.to_string(),
            intercept,
            trees,
            update_rates,
            hyper,
            subensembles_avg: HashMap::new(),
            subensembles_sum: HashMap::new(),
        })
    }

    /// For every direct edge whose child table itself carries
    /// propositionalization-tagged joins, fits an AVG-targeted and a
    /// SUM-targeted sub-ensemble against that table (spec §4.9). This is a
    /// one-shot fit against the outer model's final residual rather than
    /// the spec's per-outer-commit iterative refit — see DESIGN.md for the
    /// tradeoff.
    fn fit_subensembles(
        &mut self,
        population: &Df,
        peripheral: &[Df],
        placeholder: &Placeholder,
        hyper: EnsembleHyperparameters,
        rng_seed: u64,
    ) -> EngineResult<()> {
        let residual = self.residual(population, peripheral, placeholder)?;
        for edge in &placeholder.edges {
            if edge.relationship == RelationshipTag::Propositionalization {
                continue;
            }
            if edge.child.propositionalization_edges().is_empty() {
                continue;
            }
            let peripheral_df = find_peripheral(peripheral, edge)?;
            let matches = matches_for_edge(population, peripheral_df, edge)?;
            let mut sum = vec![0.0_f64; peripheral_df.nrows()];
            let mut count = vec![0usize; peripheral_df.nrows()];
            for m in &matches {
                sum[m.ix_input as usize] += residual[m.ix_output as usize];
                count[m.ix_input as usize] += 1;
            }
            let avg_target: Vec<f64> =
                sum.iter().zip(&count).map(|(&s, &c)| if c > 0 { s / c as f64 } else { f64::NAN }).collect();

            let mut inner_pop_avg = peripheral_df.clone();
            inner_pop_avg.add_target(crate::frame::column::NumCol::from_vec("__subfeature_target", avg_target))?;
            let mut inner_pop_sum = peripheral_df.clone();
            inner_pop_sum.add_target(crate::frame::column::NumCol::from_vec("__subfeature_target", sum))?;

            let mut inner_ph = (*edge.child).clone();
            inner_ph.targets = vec!["__subfeature_target".to_string()];

            let avg_ensemble =
                Ensemble::fit(&inner_pop_avg, peripheral, &inner_ph, "SquareLoss", hyper, rng_seed.wrapping_add(1))?;
            let sum_ensemble =
                Ensemble::fit(&inner_pop_sum, peripheral, &inner_ph, "SquareLoss", hyper, rng_seed.wrapping_add(2))?;

            self.subensembles_avg.insert(peripheral_df.name().to_string(), avg_ensemble);
            self.subensembles_sum.insert(peripheral_df.name().to_string(), sum_ensemble);
        }
        Ok(())
    }

    /// Raw (pre-transform) residual `target - yhat` under the current
    /// model — used to seed sub-ensemble targets.
    fn residual(&self, population: &Df, peripheral: &[Df], placeholder: &Placeholder) -> EngineResult<Vec<f64>> {
        let target_name =
            placeholder.targets.first().ok_or_else(|| EngineError::validation("placeholder has no target column"))?;
        let target_col = population
            .target(target_name)
            .or_else(|| population.any_numeric(target_name))
            .ok_or_else(|| EngineError::validation(format!("population has no target column '{target_name}'")))?;
        let raw = self.raw_scores_direct(population, peripheral, placeholder)?;
        Ok(target_col.as_slice().iter().zip(&raw).map(|(&t, &y)| t - y).collect())
    }

    /// `intercept + sum(direct tree contributions)`, before the loss's
    /// `transform` link — the quantity boosting actually descends on.
    fn raw_scores_direct(&self, population: &Df, peripheral: &[Df], placeholder: &Placeholder) -> EngineResult<Vec<f64>> {
        let coordinator = Coordinator::new(self.hyper.num_threads)?;
        let mut yhat = vec![self.intercept; population.nrows()];
        for ft in &self.trees {
            let edge = &placeholder.edges[ft.edge_index];
            let peripheral_df = find_peripheral(peripheral, edge)?;
            let matches = matches_for_edge(population, peripheral_df, edge)?;
            if matches.is_empty() {
                continue;
            }
            let (values, times, ref_ts) = build_value_arrays(
                &matches,
                peripheral_df,
                population,
                &ft.column,
                ft.aggregation,
                edge.right_ts_col.as_deref(),
                edge.left_ts_col.as_deref(),
            )?;
            let by_row = group_by_output_row(&matches, population.nrows());
            let contributions = coordinator.map_rows(population.nrows(), |row| {
                tree::predict_row(
                    &ft.node,
                    ft.aggregation,
                    &by_row[row],
                    &matches,
                    &values,
                    &times,
                    &ref_ts,
                    peripheral_df,
                    population,
                )
            })?;
            for (y, c) in yhat.iter_mut().zip(contributions) {
                *y += c;
            }
        }
        Ok(yhat)
    }

    /// Full transform: `intercept + sum(update_rate-scaled tree
    /// contributions)`, then the loss's link function if classifying (spec
    /// §4.7).
    pub fn transform(&self, population: &Df, peripheral: &[Df], placeholder: &Placeholder) -> EngineResult<Vec<f64>> {
        let loss = loss::by_name(&self.loss_name)?;
        let coordinator = Coordinator::new(self.hyper.num_threads)?;
        let mut yhat = vec![self.intercept; population.nrows()];
        for ft in &self.trees {
            let edge = &placeholder.edges[ft.edge_index];
            let peripheral_df = find_peripheral(peripheral, edge)?;
            let matches = matches_for_edge(population, peripheral_df, edge)?;
            if matches.is_empty() {
                continue;
            }
            let (values, times, ref_ts) = build_value_arrays(
                &matches,
                peripheral_df,
                population,
                &ft.column,
                ft.aggregation,
                edge.right_ts_col.as_deref(),
                edge.left_ts_col.as_deref(),
            )?;
            let by_row = group_by_output_row(&matches, population.nrows());
            let contributions = coordinator.map_rows(population.nrows(), |row| {
                tree::predict_row(
                    &ft.node,
                    ft.aggregation,
                    &by_row[row],
                    &matches,
                    &values,
                    &times,
                    &ref_ts,
                    peripheral_df,
                    population,
                )
            })?;
            for (y, c) in yhat.iter_mut().zip(contributions) {
                *y += c;
            }
        }
        Ok(yhat.into_iter().map(|w| loss.transform(w)).collect())
    }

    pub fn num_features(&self) -> usize {
        self.trees.len()
    }

    pub fn is_classification(&self) -> bool {
        self.loss_name != "SquareLoss"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::column::{CatCol, NumCol};

    fn two_level_schema() -> (Df, Vec<Df>, Placeholder) {
        let mut pop = Df::new("population", 4);
        pop.add_join_key(CatCol::from_vec("jk", vec![0, 1, 2, 3])).unwrap();
        pop.add_target(NumCol::from_vec("target", vec![10.0, 1.0, 10.0, 1.0])).unwrap();

        let mut perip = Df::new("peripheral", 4);
        perip.add_join_key(CatCol::from_vec("jk", vec![0, 1, 2, 3])).unwrap();
        perip.add_numerical(NumCol::from_vec("amount", vec![100.0, 1.0, 100.0, 1.0])).unwrap();

        let edge = Edge {
            left_key_col: "jk".into(),
            right_key_col: "jk".into(),
            left_ts_col: None,
            right_ts_col: None,
            right_upper_ts_col: None,
            horizon: 0.0,
            memory: None,
            relationship: RelationshipTag::ManyToMany,
            allow_lagged_targets: false,
            child: Box::new(Placeholder::new("peripheral")),
        };
        let placeholder = Placeholder::new("population").with_target("target").join(edge);
        (pop, vec![perip], placeholder)
    }

    #[test]
    fn fits_and_transforms_with_finite_output() {
        let (pop, peripheral, placeholder) = two_level_schema();
        let hyper = EnsembleHyperparameters { num_trees: 3, sampling_factor: 1.0, ..Default::default() };
        let ensemble = Ensemble::fit(&pop, &peripheral, &placeholder, "SquareLoss", hyper, 42).unwrap();
        assert!(!ensemble.trees.is_empty());
        let preds = ensemble.transform(&pop, &peripheral, &placeholder).unwrap();
        assert_eq!(preds.len(), 4);
        assert!(preds.iter().all(|p| p.is_finite()));
        // Rows 0/2 have a high-amount peripheral match, rows 1/3 a low one.
        assert!(preds[0] > preds[1]);
        assert!(preds[2] > preds[3]);
    }

    #[test]
    fn cross_entropy_predictions_stay_in_unit_interval() {
        let mut pop = Df::new("population", 4);
        pop.add_join_key(CatCol::from_vec("jk", vec![0, 1, 2, 3])).unwrap();
        pop.add_target(NumCol::from_vec("target", vec![1.0, 0.0, 1.0, 0.0])).unwrap();
        let mut perip = Df::new("peripheral", 4);
        perip.add_join_key(CatCol::from_vec("jk", vec![0, 1, 2, 3])).unwrap();
        perip.add_numerical(NumCol::from_vec("amount", vec![100.0, 1.0, 100.0, 1.0])).unwrap();
        let edge = Edge {
            left_key_col: "jk".into(),
            right_key_col: "jk".into(),
            left_ts_col: None,
            right_ts_col: None,
            right_upper_ts_col: None,
            horizon: 0.0,
            memory: None,
            relationship: RelationshipTag::ManyToMany,
            allow_lagged_targets: false,
            child: Box::new(Placeholder::new("peripheral")),
        };
        let placeholder = Placeholder::new("population").with_target("target").join(edge);
        let hyper = EnsembleHyperparameters { num_trees: 5, sampling_factor: 1.0, ..Default::default() };
        let ensemble = Ensemble::fit(&pop, &[perip.clone()], &placeholder, "CrossEntropyLoss", hyper, 7).unwrap();
        let preds = ensemble.transform(&pop, &[perip], &placeholder).unwrap();
        assert_eq!(preds.len(), 4);
        assert!(preds.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }
}
