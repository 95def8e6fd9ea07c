//! Reduction formulas for every [`AggregationKind`](super::AggregationKind).
//!
//! Each function takes the already-filtered (non-null, active) `(value,
//! time)` pairs for one population row and its reference timestamp, and
//! returns the aggregated scalar. Boundary cases (zero matches, one match,
//! all-equal values) follow spec §8's explicit table rather than whatever a
//! naive formula would produce (e.g. skew/kurtosis return `0.0`, not `NaN`,
//! when the active values have zero variance).

use super::{AggregationKind, EwmaWindow};

/// One population row's active inputs to a reduction: the values to be
/// aggregated, their peripheral timestamps (only populated when the
/// aggregation needs them), and the population row's own reference
/// timestamp.
pub struct Inputs<'a> {
    pub values: &'a [f64],
    pub times: &'a [f64],
    pub ref_ts: f64,
}

pub fn reduce(kind: AggregationKind, input: Inputs<'_>) -> f64 {
    let values = input.values;
    if values.is_empty() {
        return kind.neutral();
    }
    match kind {
        AggregationKind::Avg => mean(values),
        AggregationKind::AvgTimeBetween => avg_time_between(input.times),
        AggregationKind::Count => values.len() as f64,
        AggregationKind::CountAboveMean => {
            let m = mean(values);
            values.iter().filter(|&&v| v > m).count() as f64
        }
        AggregationKind::CountBelowMean => {
            let m = mean(values);
            values.iter().filter(|&&v| v < m).count() as f64
        }
        AggregationKind::CountDistinct => count_distinct(values) as f64,
        AggregationKind::CountMinusCountDistinct => {
            values.len() as f64 - count_distinct(values) as f64
        }
        AggregationKind::CountDistinctOverCount => count_distinct(values) as f64 / values.len() as f64,
        AggregationKind::Ewma(window) => ewma(values, input.times, input.ref_ts, window),
        AggregationKind::First => values[0],
        AggregationKind::Last => values[values.len() - 1],
        AggregationKind::Kurtosis => kurtosis(values),
        AggregationKind::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregationKind::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        AggregationKind::Median => percentile_sorted(values, 50.0),
        AggregationKind::Mode => mode(values),
        AggregationKind::NumMax => {
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            values.iter().filter(|&&v| v == max).count() as f64
        }
        AggregationKind::NumMin => {
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            values.iter().filter(|&&v| v == min).count() as f64
        }
        AggregationKind::Quantile(p) => percentile_sorted(values, p as f64),
        AggregationKind::Skew => skew(values),
        AggregationKind::Sum => values.iter().sum(),
        AggregationKind::Stddev => variance(values).sqrt(),
        AggregationKind::Var => variance(values),
        AggregationKind::VariationCoefficient => {
            let m = mean(values);
            if m == 0.0 {
                f64::NAN
            } else {
                variance(values).sqrt() / m
            }
        }
        AggregationKind::TimeSinceFirstMaximum => time_since_extremum(values, input.times, input.ref_ts, true, true),
        AggregationKind::TimeSinceLastMaximum => time_since_extremum(values, input.times, input.ref_ts, true, false),
        AggregationKind::TimeSinceFirstMinimum => time_since_extremum(values, input.times, input.ref_ts, false, true),
        AggregationKind::TimeSinceLastMinimum => time_since_extremum(values, input.times, input.ref_ts, false, false),
        AggregationKind::Trend => trend(values, input.times),
    }
}

/// `Median`, `Quantile*`, `Min`, `Max`, `NumMax`, `NumMin` and `Mode` are
/// computed over a value-sorted copy; callers that evaluate many candidates
/// over the same active set should sort once and reuse the buffer rather
/// than calling `reduce` per candidate when `needs_sorting()` is true.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

fn skew(values: &[f64]) -> f64 {
    let var = variance(values);
    if var == 0.0 {
        return 0.0;
    }
    let m = mean(values);
    let sd = var.sqrt();
    let n = values.len() as f64;
    values.iter().map(|v| ((v - m) / sd).powi(3)).sum::<f64>() / n
}

fn kurtosis(values: &[f64]) -> f64 {
    let var = variance(values);
    if var == 0.0 {
        return 0.0;
    }
    let m = mean(values);
    let sd = var.sqrt();
    let n = values.len() as f64;
    values.iter().map(|v| ((v - m) / sd).powi(4)).sum::<f64>() / n - 3.0
}

fn count_distinct(values: &[f64]) -> usize {
    let mut sorted: Vec<u64> = values.iter().map(|v| v.to_bits()).collect();
    sorted.sort_unstable();
    sorted.dedup();
    sorted.len()
}

fn mode(values: &[f64]) -> f64 {
    use std::collections::HashMap;
    let mut counts: HashMap<u64, (f64, usize)> = HashMap::new();
    for &v in values {
        let e = counts.entry(v.to_bits()).or_insert((v, 0));
        e.1 += 1;
    }
    counts
        .values()
        .max_by_key(|(_, c)| *c)
        .map(|(v, _)| *v)
        .unwrap_or(f64::NAN)
}

/// Nearest-rank percentile over a freshly sorted copy of `values`.
/// `p` is in `[0, 100]`.
fn percentile_sorted(values: &[f64], p: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = rank - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

fn avg_time_between(times: &[f64]) -> f64 {
    if times.len() < 2 {
        return f64::NAN;
    }
    let mut sorted = times.to_vec();
    sorted.sort_by(f64::total_cmp);
    let diffs: Vec<f64> = sorted.windows(2).map(|w| w[1] - w[0]).collect();
    mean(&diffs)
}

fn ewma(values: &[f64], times: &[f64], ref_ts: f64, window: EwmaWindow) -> f64 {
    let half_life = window.half_life_seconds();
    let ln2 = std::f64::consts::LN_2;
    let mut weight_sum = 0.0;
    let mut value_sum = 0.0;
    for (&v, &t) in values.iter().zip(times) {
        if t.is_nan() || ref_ts.is_nan() || t > ref_ts {
            continue;
        }
        let w = (-((ref_ts - t) * ln2) / half_life).exp();
        weight_sum += w;
        value_sum += w * v;
    }
    if weight_sum == 0.0 {
        f64::NAN
    } else {
        value_sum / weight_sum
    }
}

/// `ref_ts - t` for the value at the first/last occurrence (in natural
/// match order, i.e. the order `values`/`times` were supplied in) of the
/// max/min value.
fn time_since_extremum(values: &[f64], times: &[f64], ref_ts: f64, want_max: bool, want_first: bool) -> f64 {
    if times.iter().all(|t| t.is_nan()) || ref_ts.is_nan() {
        return f64::NAN;
    }
    let extreme = if want_max {
        values.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    } else {
        values.iter().copied().fold(f64::INFINITY, f64::min)
    };
    let mut found: Option<f64> = None;
    let iter: Box<dyn Iterator<Item = (usize, &f64)>> = if want_first {
        Box::new(values.iter().enumerate())
    } else {
        Box::new(values.iter().enumerate().rev())
    };
    for (i, &v) in iter {
        if v == extreme && !times[i].is_nan() {
            found = Some(times[i]);
            break;
        }
    }
    found.map_or(f64::NAN, |t| ref_ts - t)
}

/// Ordinary-least-squares slope of `value ~ time`.
fn trend(values: &[f64], times: &[f64]) -> f64 {
    let pairs: Vec<(f64, f64)> = times
        .iter()
        .zip(values)
        .filter(|(t, _)| !t.is_nan())
        .map(|(&t, &v)| (t, v))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }
    let n = pairs.len() as f64;
    let mean_t = pairs.iter().map(|(t, _)| t).sum::<f64>() / n;
    let mean_v = pairs.iter().map(|(_, v)| v).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_t = 0.0;
    for &(t, v) in &pairs {
        cov += (t - mean_t) * (v - mean_v);
        var_t += (t - mean_t).powi(2);
    }
    if var_t == 0.0 {
        0.0
    } else {
        cov / var_t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(values: &[f64]) -> Inputs<'_> {
        Inputs { values, times: &[], ref_ts: f64::NAN }
    }

    #[test]
    fn empty_returns_neutral_element() {
        assert_eq!(reduce(AggregationKind::Sum, inputs(&[])), 0.0);
        assert!(reduce(AggregationKind::Avg, inputs(&[])).is_nan());
        assert!(reduce(AggregationKind::Min, inputs(&[])).is_nan());
    }

    #[test]
    fn single_match_boundary_cases() {
        assert_eq!(reduce(AggregationKind::Median, inputs(&[5.0])), 5.0);
        assert_eq!(reduce(AggregationKind::Quantile(90), inputs(&[5.0])), 5.0);
        assert_eq!(reduce(AggregationKind::Stddev, inputs(&[5.0])), 0.0);
    }

    #[test]
    fn all_equal_values_have_zero_spread_and_skew() {
        let v = [3.0, 3.0, 3.0, 3.0];
        assert_eq!(reduce(AggregationKind::Var, inputs(&v)), 0.0);
        assert_eq!(reduce(AggregationKind::Skew, inputs(&v)), 0.0);
        assert_eq!(reduce(AggregationKind::Kurtosis, inputs(&v)), 0.0);
    }

    #[test]
    fn sum_and_avg_agree_with_hand_computation() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(reduce(AggregationKind::Sum, inputs(&v)), 10.0);
        assert_eq!(reduce(AggregationKind::Avg, inputs(&v)), 2.5);
        assert_eq!(reduce(AggregationKind::Count, inputs(&v)), 4.0);
    }

    #[test]
    fn count_distinct_dedups_exact_float_matches() {
        let v = [1.0, 1.0, 2.0, 3.0, 3.0, 3.0];
        assert_eq!(count_distinct(&v), 3);
        assert_eq!(reduce(AggregationKind::CountMinusCountDistinct, inputs(&v)), 3.0);
    }

    #[test]
    fn ewma_weights_recent_observations_more() {
        let values = [1.0, 100.0];
        let times = [0.0, 100.0];
        let input = Inputs { values: &values, times: &times, ref_ts: 100.0 };
        let out = reduce(AggregationKind::Ewma(EwmaWindow::OneSecond), input);
        assert!(out > 50.0); // the near-ref_ts 100.0 observation dominates
    }

    #[test]
    fn trend_recovers_exact_linear_slope() {
        let values = [2.0, 4.0, 6.0, 8.0];
        let times = [0.0, 1.0, 2.0, 3.0];
        let input = Inputs { values: &values, times: &times, ref_ts: f64::NAN };
        assert!((reduce(AggregationKind::Trend, input) - 2.0).abs() < 1e-9);
    }
}
