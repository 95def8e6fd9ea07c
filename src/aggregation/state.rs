//! Aggregation state (`AS`) — owns one node's match subset plus the
//! aggregated-value/time columns extracted for it, and exposes the
//! candidate-evaluation capability set the splitter (C7) drives: activate
//! by category/threshold, commit the accepted split, or revert to the last
//! commit (spec §3, §4.4).

use super::active_set::ActiveSet;
use super::kernels::{self, Inputs};
use super::AggregationKind;
use crate::condition::Side;
use crate::matchmaker::Match;
use std::collections::HashMap;

/// One population row's aggregate under the current active partition.
#[derive(Debug, Clone, Copy)]
pub struct RowEta {
    pub row: u32,
    pub eta1: f64,
    pub eta2: f64,
}

pub struct AggregationState<'a> {
    kind: AggregationKind,
    matches: &'a [Match],
    values: Vec<f64>,
    times: Vec<f64>,
    ref_ts: Vec<f64>,
    active: ActiveSet,
    committed: Vec<bool>,
    rows_index: HashMap<u32, Vec<usize>>,
}

impl<'a> AggregationState<'a> {
    /// `values[i]`/`times[i]`/`ref_ts[i]` are the aggregated value, the
    /// peripheral event time and the population row's reference time for
    /// `matches[i]`; `times`/`ref_ts` may be left empty when `kind` does not
    /// need them (`AggregationKind::needs_time`).
    pub fn new(
        kind: AggregationKind,
        matches: &'a [Match],
        values: Vec<f64>,
        times: Vec<f64>,
        ref_ts: Vec<f64>,
    ) -> Self {
        assert_eq!(values.len(), matches.len());
        let is_null: Vec<bool> = values.iter().map(|v| v.is_nan()).collect();
        let mut rows_index: HashMap<u32, Vec<usize>> = HashMap::new();
        for (i, m) in matches.iter().enumerate() {
            rows_index.entry(m.ix_output).or_default().push(i);
        }
        let active = ActiveSet::new(is_null);
        let committed = active.snapshot();
        AggregationState { kind, matches, values, times, ref_ts, active, committed, rows_index }
    }

    /// Count of (non-null) matches, per the capability set's
    /// `deactivate_samples_with_null_values` diagnostic.
    pub fn null_count(&self) -> usize {
        (0..self.active.len()).filter(|&i| self.active.is_null(i)).count()
    }

    pub fn activate_all(&mut self) {
        self.active.activate_all();
    }

    pub fn deactivate_all(&mut self) {
        self.active.deactivate_all();
    }

    /// Current `Sigma` membership, one flag per match in construction
    /// order — used by the tree grower to partition a node's matches
    /// between its two children once a split has been committed.
    pub fn active_mask(&self) -> Vec<bool> {
        self.active.snapshot()
    }

    fn index_for(side: Side, m: &Match) -> usize {
        match side {
            Side::Input => m.ix_input as usize,
            Side::Output => m.ix_output as usize,
        }
    }

    /// Full-overwrite membership: activates every match whose value in
    /// `condition_col` (indexed by `ix_input` or `ix_output` depending on
    /// `side`) is a member of `codes`, deactivating every other match —
    /// symmetric with `activate_from_above`/`activate_from_below` so a
    /// candidate trial always starts from a known (all-active) baseline.
    pub fn set_by_categories(&mut self, side: Side, condition_col: &[i32], codes: &[i32], journal: bool) {
        let wanted: std::collections::HashSet<i32> = codes.iter().copied().collect();
        for (i, m) in self.matches.iter().enumerate() {
            let v = condition_col[Self::index_for(side, m)];
            self.active.set(i, wanted.contains(&v), journal);
        }
    }

    /// Activates matches with `condition_col[idx] > threshold`,
    /// deactivating everything else so repeated calls over the same
    /// pre-sorted buffer behave like a streaming threshold sweep.
    pub fn activate_from_above(&mut self, side: Side, condition_col: &[f64], threshold: f64, journal: bool) {
        for (i, m) in self.matches.iter().enumerate() {
            let v = condition_col[Self::index_for(side, m)];
            let want = !v.is_nan() && v > threshold;
            self.active.set(i, want, journal);
        }
    }

    /// Symmetric counterpart: activates `condition_col[idx] <= threshold`.
    pub fn activate_from_below(&mut self, side: Side, condition_col: &[f64], threshold: f64, journal: bool) {
        for (i, m) in self.matches.iter().enumerate() {
            let v = condition_col[Self::index_for(side, m)];
            let want = !v.is_nan() && v <= threshold;
            self.active.set(i, want, journal);
        }
    }

    /// Activates matches where `left[ix_input] == right[ix_output]`
    /// (same-units categorical equality).
    pub fn activate_same_units_categorical(&mut self, left: &[i32], right: &[i32], journal: bool) {
        for (i, m) in self.matches.iter().enumerate() {
            let want = left[m.ix_input as usize] == right[m.ix_output as usize];
            self.active.set(i, want, journal);
        }
    }

    /// Activates matches where `|left[ix_input] - right[ix_output]| >
    /// threshold` (same-units numerical difference, or a timestamp
    /// difference when `left`/`right` are timestamp columns).
    pub fn activate_same_units_diff_above(&mut self, left: &[f64], right: &[f64], threshold: f64, journal: bool) {
        for (i, m) in self.matches.iter().enumerate() {
            let l = left[m.ix_input as usize];
            let r = right[m.ix_output as usize];
            let want = !l.is_nan() && !r.is_nan() && (l - r).abs() > threshold;
            self.active.set(i, want, journal);
        }
    }

    /// Baselines the current membership: `revert_to_commit` after this call
    /// restores exactly this partition.
    pub fn commit(&mut self) {
        self.committed = self.active.snapshot();
        self.active.checkpoint();
    }

    /// Restores membership to the last `commit()` (or, if none occurred
    /// yet, the all-inactive initial state).
    pub fn revert_to_commit(&mut self) {
        self.active.rollback_to(&self.committed);
    }

    /// Computes eta1 (active-side reduction) and eta2 (inactive-side
    /// reduction) for every population row with at least one match, under
    /// the current `Sigma` partition. This is the "hand running yhat to the
    /// loss function" step of spec §4.4's capability list; it always
    /// recomputes rather than tracking incremental per-row sums, which
    /// keeps every aggregation (including MIN/MAX/quantiles, which have no
    /// cheap incremental update) uniform at the cost of an `O(matches in
    /// node)` pass per call.
    pub fn update_and_clear(&self) -> Vec<RowEta> {
        let mut out = Vec::with_capacity(self.rows_index.len());
        let mut active_vals = Vec::new();
        let mut active_times = Vec::new();
        let mut inactive_vals = Vec::new();
        let mut inactive_times = Vec::new();
        for (&row, idxs) in &self.rows_index {
            active_vals.clear();
            active_times.clear();
            inactive_vals.clear();
            inactive_times.clear();
            let mut ref_ts = f64::NAN;
            for &i in idxs {
                if self.active.is_null(i) {
                    continue;
                }
                if !self.ref_ts.is_empty() {
                    ref_ts = self.ref_ts[i];
                }
                if self.active.is_active(i) {
                    active_vals.push(self.values[i]);
                    if !self.times.is_empty() {
                        active_times.push(self.times[i]);
                    }
                } else {
                    inactive_vals.push(self.values[i]);
                    if !self.times.is_empty() {
                        inactive_times.push(self.times[i]);
                    }
                }
            }
            let eta1 = kernels::reduce(
                self.kind,
                Inputs { values: &active_vals, times: &active_times, ref_ts },
            );
            let eta2 = kernels::reduce(
                self.kind,
                Inputs { values: &inactive_vals, times: &inactive_times, ref_ts },
            );
            out.push(RowEta { row, eta1, eta2 });
        }
        out
    }

    /// The full-match (no split) aggregate per row, i.e. `eta1` with
    /// everything activated — used to materialize a FastProp feature column
    /// (C11) where there is no split to evaluate.
    pub fn aggregate_all(&mut self) -> Vec<(u32, f64)> {
        self.activate_all();
        self.update_and_clear().into_iter().map(|e| (e.row, e.eta1)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::Side;
    use crate::matchmaker::Match;

    fn matches() -> Vec<Match> {
        vec![
            Match { ix_output: 0, ix_input: 0 },
            Match { ix_output: 0, ix_input: 1 },
            Match { ix_output: 0, ix_input: 2 },
            Match { ix_output: 1, ix_input: 3 },
        ]
    }

    #[test]
    fn sum_splits_correctly_by_category_condition() {
        let m = matches();
        let values = vec![10.0, 20.0, 30.0, 40.0];
        let mut st = AggregationState::new(AggregationKind::Sum, &m, values, vec![], vec![]);
        let condition_col = vec![1, 2, 1, 1]; // indexed by ix_input
        st.set_by_categories(Side::Input, &condition_col, &[1], false);
        let etas = st.update_and_clear();
        let row0 = etas.iter().find(|e| e.row == 0).unwrap();
        assert_eq!(row0.eta1, 40.0); // matches 0 and 2 (values 10+30)
        assert_eq!(row0.eta2, 20.0); // match 1
    }

    #[test]
    fn revert_to_commit_restores_exact_partition() {
        let m = matches();
        let values = vec![1.0, 2.0, 3.0, 4.0];
        let mut st = AggregationState::new(AggregationKind::Sum, &m, values, vec![], vec![]);
        st.activate_from_above(Side::Input, &[5.0, 1.0, 5.0, 0.0], 2.0, false);
        st.commit();
        let baseline = st.update_and_clear();
        st.activate_from_above(Side::Input, &[100.0, 100.0, 100.0, 100.0], 2.0, true);
        st.revert_to_commit();
        let restored = st.update_and_clear();
        for (a, b) in baseline.iter().zip(restored.iter()) {
            assert_eq!(a.eta1, b.eta1);
            assert_eq!(a.eta2, b.eta2);
        }
    }

    #[test]
    fn null_values_never_contribute_to_either_side() {
        let m = matches();
        let values = vec![f64::NAN, 2.0, 3.0, 4.0];
        let mut st = AggregationState::new(AggregationKind::Count, &m, values, vec![], vec![]);
        st.activate_all();
        let row0 = st.update_and_clear().into_iter().find(|e| e.row == 0).unwrap();
        assert_eq!(row0.eta1, 2.0); // only the two non-null matches of row 0
    }
}
