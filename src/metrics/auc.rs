//! Binary-classification AUC (area under the ROC curve).
//!
//! Grounded on the original's `metrics::AUC::score`: sort predictions,
//! walk the sorted order accumulating true/false positive rates, and
//! integrate by the trapezoid rule. This computes only the scalar AUC
//! (not the full lift/precision/proportion curves the original also
//! returns for plotting) via the equivalent Mann-Whitney rank-sum
//! formulation, which handles tied predictions without the original's
//! explicit run-length compression step.

use crate::error::{EngineError, EngineResult};

/// Area under the ROC curve for scores `yhat` against binary labels `y`
/// (`y` entries are expected to be `0.0`/`1.0`, as `tree`/`loss` produce
/// for `CrossEntropyLoss` targets).
///
/// Degenerate inputs (no positives, no negatives, or every prediction
/// tied) return `0.5`, matching the original's fallback for an
/// uninformative score distribution.
pub fn auc(yhat: &[f64], y: &[f64]) -> EngineResult<f64> {
    if yhat.len() != y.len() {
        return Err(EngineError::validation(format!(
            "auc: yhat has {} rows, y has {}",
            yhat.len(),
            y.len()
        )));
    }
    let n = yhat.len();
    if n == 0 {
        return Err(EngineError::validation("auc requires at least one row"));
    }

    let n_pos: f64 = y.iter().sum();
    let n_neg = n as f64 - n_pos;
    if n_pos == 0.0 || n_neg == 0.0 {
        return Ok(0.5);
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| yhat[a].total_cmp(&yhat[b]));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && yhat[order[j + 1]] == yhat[order[i]] {
            j += 1;
        }
        let average_rank = ((i + 1) + (j + 1)) as f64 / 2.0;
        for k in i..=j {
            ranks[order[k]] = average_rank;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = (0..n).filter(|&i| y[i] > 0.0).map(|i| ranks[i]).sum();
    Ok((positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn perfectly_separable_scores_reach_one() {
        let yhat = vec![0.1, 0.2, 0.8, 0.9];
        let y = vec![0.0, 0.0, 1.0, 1.0];
        assert_eq!(auc(&yhat, &y).unwrap(), 1.0);
    }

    #[test]
    fn inverted_scores_reach_zero() {
        let yhat = vec![0.9, 0.8, 0.2, 0.1];
        let y = vec![0.0, 0.0, 1.0, 1.0];
        assert_eq!(auc(&yhat, &y).unwrap(), 0.0);
    }

    #[test]
    fn random_scores_land_near_one_half_over_many_rows() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 10_000;
        let yhat: Vec<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();
        let y: Vec<f64> = (0..n).map(|_| if rng.gen::<f64>() < 0.5 { 1.0 } else { 0.0 }).collect();
        let score = auc(&yhat, &y).unwrap();
        assert!((0.45..=0.55).contains(&score), "auc = {score}");
    }

    #[test]
    fn degenerate_single_class_returns_one_half() {
        let yhat = vec![0.1, 0.5, 0.9];
        let y = vec![1.0, 1.0, 1.0];
        assert_eq!(auc(&yhat, &y).unwrap(), 0.5);
    }

    #[test]
    fn mismatched_lengths_are_a_validation_error() {
        assert!(auc(&[0.1, 0.2], &[1.0]).is_err());
    }
}
