//! FastProp (C11) — spec §4.9: single-pass propositionalization catalog.
//!
//! Grounded on `original_source/.../fastprop/Maker.cpp`/`algorithm/FastProp`:
//! the original builds one feature per (joined table, aggregation, column,
//! optional condition) tuple and evaluates the whole catalog in a single
//! pass over the matches, with no boosting loop. This is the no-boosting
//! counterpart to `ensemble::Ensemble`, sharing its match-materialization
//! helpers rather than duplicating them.

use crate::aggregation::state::AggregationState;
use crate::aggregation::{AggregationKind, EwmaWindow};
use crate::condition::{Condition, Side};
use crate::ensemble::{build_value_arrays, find_peripheral, matches_for_edge, Ensemble};
use crate::error::{EngineError, EngineResult};
use crate::frame::column::NumCol;
use crate::frame::Df;
use crate::placeholder::{Placeholder, RelationshipTag};
use serde::{Deserialize, Serialize};

/// Representative percentiles enumerated for `AggregationKind::Quantile`
/// features rather than all 99 integer percentiles, which would dominate
/// the already-large `O(tables × aggregations × columns × |conditions|)`
/// catalog for no practical benefit.
const QUANTILES: &[u8] = &[1, 5, 25, 50, 75, 95, 99];

const EWMA_WINDOWS: &[EwmaWindow] =
    &[EwmaWindow::OneHour, EwmaWindow::OneDay, EwmaWindow::SevenDays, EwmaWindow::ThirtyDays];

/// The maximum number of distinct codes of a categorical column that get
/// their own `CategoricalIn` conditioned feature; bounds the `|conditions|`
/// factor of the catalog for high-cardinality columns.
const MAX_CONDITION_CODES: usize = 5;

fn all_aggregation_kinds() -> Vec<AggregationKind> {
    use AggregationKind::*;
    let mut out = vec![
        Avg,
        AvgTimeBetween,
        Count,
        CountAboveMean,
        CountBelowMean,
        CountDistinct,
        CountMinusCountDistinct,
        CountDistinctOverCount,
        First,
        Last,
        Kurtosis,
        Max,
        Median,
        Min,
        Mode,
        NumMax,
        NumMin,
        Skew,
        Sum,
        Stddev,
        TimeSinceFirstMaximum,
        TimeSinceFirstMinimum,
        TimeSinceLastMaximum,
        TimeSinceLastMinimum,
        Trend,
        Var,
        VariationCoefficient,
    ];
    out.extend(EWMA_WINDOWS.iter().map(|&w| Ewma(w)));
    out.extend(QUANTILES.iter().map(|&q| Quantile(q)));
    out
}

/// One catalog entry: which direct edge, which peripheral column, which
/// aggregation, and an optional categorical filter applied before reducing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureSpec {
    pub edge_index: usize,
    pub column: String,
    pub aggregation: AggregationKind,
    pub condition: Option<Condition>,
    /// Column name this feature is published under.
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FastProp {
    pub specs: Vec<FeatureSpec>,
}

fn distinct_codes(peripheral_df: &Df, column: &str) -> Vec<i32> {
    let Some(col) = peripheral_df.any_categorical(column) else { return Vec::new() };
    let mut codes: Vec<i32> = col.as_slice().iter().copied().filter(|&c| c >= 0).collect();
    codes.sort_unstable();
    codes.dedup();
    codes.truncate(MAX_CONDITION_CODES);
    codes
}

impl FastProp {
    /// Builds the feature catalog over every direct (non-propositionalization)
    /// edge of `placeholder`. Fitting FastProp is pure enumeration against
    /// the schema — there are no statistics to learn, so `fit` and
    /// `fit_transform` differ only in whether a feature matrix is returned.
    pub fn fit(peripheral: &[Df], placeholder: &Placeholder) -> EngineResult<FastProp> {
        let mut specs = Vec::new();
        for (edge_index, edge) in placeholder.edges.iter().enumerate() {
            if edge.relationship == RelationshipTag::Propositionalization {
                continue;
            }
            let peripheral_df = find_peripheral(peripheral, edge)?;
            for column in peripheral_df.numerical_names() {
                for kind in all_aggregation_kinds() {
                    let name = format!("fastprop_{}_{}_{:?}", peripheral_df.name(), column, kind);
                    specs.push(FeatureSpec {
                        edge_index,
                        column: column.to_string(),
                        aggregation: kind,
                        condition: None,
                        name,
                    });
                }
            }
            for column in peripheral_df.categorical_names() {
                for code in distinct_codes(peripheral_df, column) {
                    let name = format!("fastprop_{}_{}_eq_{}_count", peripheral_df.name(), column, code);
                    specs.push(FeatureSpec {
                        edge_index,
                        column: peripheral_df
                            .numerical_names()
                            .first()
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| column.to_string()),
                        aggregation: AggregationKind::Count,
                        condition: Some(Condition::CategoricalIn {
                            side: Side::Input,
                            column: column.to_string(),
                            codes: vec![code],
                        }),
                        name,
                    });
                }
            }
        }
        Ok(FastProp { specs })
    }

    fn compute_one(
        &self,
        population: &Df,
        peripheral_df: &Df,
        edge: &crate::placeholder::Edge,
        spec: &FeatureSpec,
    ) -> EngineResult<Vec<f64>> {
        let matches = matches_for_edge(population, peripheral_df, edge)?;
        let mut out = vec![spec.aggregation.neutral(); population.nrows()];
        if matches.is_empty() {
            return Ok(out);
        }
        let (values, times, ref_ts) = build_value_arrays(
            &matches,
            peripheral_df,
            population,
            &spec.column,
            spec.aggregation,
            edge.right_ts_col.as_deref(),
            edge.left_ts_col.as_deref(),
        )?;
        let mut state = AggregationState::new(spec.aggregation, &matches, values, times, ref_ts);

        let row_vals: Vec<(u32, f64)> = match &spec.condition {
            None => state.aggregate_all(),
            Some(Condition::CategoricalIn { side, column, codes }) => {
                let condition_col = match side {
                    Side::Input => peripheral_df.any_categorical(column),
                    Side::Output => population.any_categorical(column),
                }
                .ok_or_else(|| {
                    EngineError::validation(format!("no categorical column '{column}' for FastProp condition"))
                })?;
                state.set_by_categories(*side, condition_col.as_slice(), codes, false);
                state.update_and_clear().into_iter().map(|e| (e.row, e.eta1)).collect()
            }
            Some(other) => {
                return Err(EngineError::validation(format!(
                    "FastProp does not support condition kind {other:?}"
                )))
            }
        };
        for (row, val) in row_vals {
            out[row as usize] = val;
        }
        Ok(out)
    }

    /// Evaluates the whole catalog in one pass, returning a feature frame
    /// whose columns are named after each spec's catalog entry.
    pub fn transform(&self, population: &Df, peripheral: &[Df], placeholder: &Placeholder) -> EngineResult<Df> {
        let mut out = Df::new(format!("{}#fastprop", population.name()), population.nrows());
        for spec in &self.specs {
            let edge = &placeholder.edges[spec.edge_index];
            let peripheral_df = find_peripheral(peripheral, edge)?;
            let values = self.compute_one(population, peripheral_df, edge, spec)?;
            out.add_numerical(NumCol::from_vec(spec.name.clone(), values))?;
        }
        Ok(out)
    }

    pub fn fit_transform(
        peripheral: &[Df],
        placeholder: &Placeholder,
        population: &Df,
    ) -> EngineResult<(FastProp, Df)> {
        let fastprop = FastProp::fit(peripheral, placeholder)?;
        let features = fastprop.transform(population, peripheral, placeholder)?;
        Ok((fastprop, features))
    }

    pub fn num_features(&self) -> usize {
        self.specs.len()
    }
}

/// Subfeature columns (spec §4.9 second half): for every propositionalization
/// edge whose child carries a fitted sub-ensemble, aggregates that
/// sub-ensemble's own predictions on its child rows back up to the
/// population level under AVG and SUM, producing two extra feature columns
/// per tagged edge. Kept separate from [`FastProp::transform`] since it
/// needs an already-fitted [`Ensemble`] rather than a bare schema.
pub fn subfeature_columns(
    population: &Df,
    peripheral: &[Df],
    placeholder: &Placeholder,
    ensemble: &Ensemble,
) -> EngineResult<Df> {
    let mut out = Df::new(format!("{}#subfeatures", population.name()), population.nrows());
    for edge in &placeholder.edges {
        if edge.relationship == RelationshipTag::Propositionalization {
            continue;
        }
        let peripheral_df = find_peripheral(peripheral, edge)?;
        let Some(avg_sub) = ensemble.subensembles_avg.get(peripheral_df.name()) else { continue };
        let Some(sum_sub) = ensemble.subensembles_sum.get(peripheral_df.name()) else { continue };

        let child_placeholder = (*edge.child).clone();
        let avg_preds = avg_sub.transform(peripheral_df, peripheral, &child_placeholder)?;
        let sum_preds = sum_sub.transform(peripheral_df, peripheral, &child_placeholder)?;

        let matches = matches_for_edge(population, peripheral_df, edge)?;
        let mut avg_out = vec![f64::NAN; population.nrows()];
        let mut sum_out = vec![0.0_f64; population.nrows()];
        let mut sum_count = vec![0usize; population.nrows()];
        let mut avg_sum = vec![0.0_f64; population.nrows()];
        for m in &matches {
            let row = m.ix_output as usize;
            avg_sum[row] += avg_preds[m.ix_input as usize];
            sum_count[row] += 1;
            sum_out[row] += sum_preds[m.ix_input as usize];
        }
        for row in 0..population.nrows() {
            if sum_count[row] > 0 {
                avg_out[row] = avg_sum[row] / sum_count[row] as f64;
            }
        }

        out.add_numerical(NumCol::from_vec(format!("subfeature_avg_{}", peripheral_df.name()), avg_out))?;
        out.add_numerical(NumCol::from_vec(format!("subfeature_sum_{}", peripheral_df.name()), sum_out))?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::column::CatCol;
    use crate::placeholder::Edge;

    fn two_level_schema() -> (Df, Vec<Df>, Placeholder) {
        let mut pop = Df::new("population", 4);
        pop.add_join_key(CatCol::from_vec("jk", vec![0, 1, 2, 3])).unwrap();

        let mut perip = Df::new("peripheral", 5);
        perip.add_join_key(CatCol::from_vec("jk", vec![0, 0, 1, 2, 3])).unwrap();
        perip.add_numerical(NumCol::from_vec("amount", vec![10.0, 20.0, 5.0, 7.0, 8.0])).unwrap();
        let cat_code = perip.cat_encoding.intern("wire");
        let other_code = perip.cat_encoding.intern("ach");
        perip
            .add_categorical(CatCol::from_vec("method", vec![cat_code, other_code, cat_code, other_code, cat_code]))
            .unwrap();

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
        let placeholder = Placeholder::new("population").join(edge);
        (pop, vec![perip], placeholder)
    }

    #[test]
    fn catalog_covers_every_aggregation_kind_per_column() {
        let (_, peripheral, placeholder) = two_level_schema();
        let fastprop = FastProp::fit(&peripheral, &placeholder).unwrap();
        let plain_features =
            fastprop.specs.iter().filter(|s| s.condition.is_none() && s.column == "amount").count();
        assert_eq!(plain_features, all_aggregation_kinds().len());
    }

    #[test]
    fn transform_produces_one_column_per_spec_with_right_row_count() {
        let (pop, peripheral, placeholder) = two_level_schema();
        let (fastprop, features) = FastProp::fit_transform(&peripheral, &placeholder, &pop).unwrap();
        assert_eq!(features.nrows(), 4);
        assert_eq!(features.numerical_names().len(), fastprop.num_features());
        let sum_col = features
            .numerical_names()
            .into_iter()
            .find(|n| n.contains("amount") && n.contains("Sum"))
            .unwrap();
        let sum_feature = features.numerical(sum_col).unwrap();
        assert_eq!(sum_feature.get(0), Some(30.0)); // rows 0,1 of peripheral: 10+20
    }

    #[test]
    fn conditioned_count_feature_only_counts_matching_category() {
        let (pop, peripheral, placeholder) = two_level_schema();
        let (_, features) = FastProp::fit_transform(&peripheral, &placeholder, &pop).unwrap();
        let wire_count_col = features
            .numerical_names()
            .into_iter()
            .find(|n| n.contains("method") && n.contains("count"))
            .unwrap();
        let col = features.numerical(wire_count_col).unwrap();
        assert!(col.as_slice().iter().all(|v| v.is_finite()));
    }
}
