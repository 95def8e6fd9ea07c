//! Time-window index (C4).
//!
//! Given a peripheral frame and a join key, groups rows by key and sorts
//! each group by `lower_ts`, then answers "which rows have `lower_ts <= t`
//! and (`upper_ts` is null or `upper_ts > t`)" in `O(log n)` to find the
//! candidate range plus a linear filter over it (spec §4.2).

use crate::frame::column::{CatCol, NumCol};

#[derive(Clone, Copy)]
struct Entry {
    lower_ts: f64,
    /// `f64::INFINITY` when the row has no upper bound.
    upper_ts: f64,
    row: u32,
}

pub struct TimeWindowIndex {
    groups: std::collections::HashMap<i32, Vec<Entry>>,
    memory: Option<f64>,
}

impl TimeWindowIndex {
    /// Builds the index. `upper` is the (optional) explicit upper-timestamp
    /// column; when absent it is synthesized as `lower_ts + memory` (or
    /// left unbounded if `memory` is also absent), per spec §4.2. Rows with
    /// a null `lower_ts` or a null join key are excluded up front.
    pub fn build(jk: &CatCol, lower: &NumCol, upper: Option<&NumCol>, memory: Option<f64>) -> Self {
        let mut groups: std::collections::HashMap<i32, Vec<Entry>> = std::collections::HashMap::new();
        let n = jk.len().min(lower.len());
        for i in 0..n {
            let code = jk[i];
            if code.is_negative() {
                continue;
            }
            let lower_ts = lower[i];
            if lower_ts.is_nan() {
                continue;
            }
            let upper_ts = match upper {
                Some(u) => {
                    let v = u[i];
                    if v.is_nan() {
                        memory.map_or(f64::INFINITY, |m| lower_ts + m)
                    } else {
                        v
                    }
                }
                None => memory.map_or(f64::INFINITY, |m| lower_ts + m),
            };
            groups.entry(code).or_default().push(Entry { lower_ts, upper_ts, row: i as u32 });
        }
        for v in groups.values_mut() {
            v.sort_by(|a, b| a.lower_ts.total_cmp(&b.lower_ts));
        }
        TimeWindowIndex { groups, memory }
    }

    /// Rows whose key equals `code` and whose window contains `t`: `lower_ts
    /// <= t < upper_ts` (upper open; unbounded rows always satisfy it).
    pub fn query(&self, code: i32, t: f64) -> Vec<u32> {
        let Some(entries) = self.groups.get(&code) else {
            return Vec::new();
        };
        // Rightmost index with lower_ts <= t.
        let upper_bound = entries.partition_point(|e| e.lower_ts <= t);
        if upper_bound == 0 {
            return Vec::new();
        }
        let mut out = Vec::new();
        for e in entries[..upper_bound].iter().rev() {
            if let Some(m) = self.memory {
                if e.lower_ts + m < t {
                    // Sorted ascending by lower_ts: everything further back
                    // is even older, so the memory bound can never be
                    // satisfied again.
                    break;
                }
            }
            if e.upper_ts > t {
                out.push(e.row);
            }
        }
        out.reverse();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_window_correctness_scenario() {
        // spec §8 scenario 5: population row at ts=100; peripheral rows at
        // lower_ts in {50, 99, 100, 101} with upper_ts = lower_ts + 10.
        let jk = CatCol::from_vec("jk", vec![0, 0, 0, 0]);
        let lower = NumCol::from_vec("lower", vec![50.0, 99.0, 100.0, 101.0]);
        let upper = NumCol::from_vec("upper", vec![60.0, 109.0, 110.0, 111.0]);
        let idx = TimeWindowIndex::build(&jk, &lower, Some(&upper), None);
        let mut rows = idx.query(0, 100.0);
        rows.sort_unstable();
        assert_eq!(rows, vec![1, 2]);
    }

    #[test]
    fn null_lower_ts_is_excluded() {
        let jk = CatCol::from_vec("jk", vec![0, 0]);
        let lower = NumCol::from_vec("lower", vec![f64::NAN, 5.0]);
        let idx = TimeWindowIndex::build(&jk, &lower, None, None);
        assert_eq!(idx.query(0, 10.0), vec![1]);
    }

    #[test]
    fn synthesized_upper_from_memory() {
        let jk = CatCol::from_vec("jk", vec![0]);
        let lower = NumCol::from_vec("lower", vec![0.0]);
        let idx = TimeWindowIndex::build(&jk, &lower, None, Some(5.0));
        assert_eq!(idx.query(0, 4.0), vec![0]);
        assert_eq!(idx.query(0, 6.0), Vec::<u32>::new());
    }

    #[test]
    fn unbounded_upper_when_no_memory_or_column() {
        let jk = CatCol::from_vec("jk", vec![0]);
        let lower = NumCol::from_vec("lower", vec![0.0]);
        let idx = TimeWindowIndex::build(&jk, &lower, None, None);
        assert_eq!(idx.query(0, 1_000_000.0), vec![0]);
    }
}
