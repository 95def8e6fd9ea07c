//! AUC on a separable binary problem, end-to-end through `metrics::auc`.

use rand::rngs::StdRng;
use rand::Rng;
use rand::SeedableRng;
use relfeat::metrics::auc;

#[test]
fn perfect_separation_reaches_an_auc_of_one() {
    let yhat: Vec<f64> = (0..200).map(|i| i as f64 / 200.0).collect();
    let y: Vec<f64> = (0..200).map(|i| if i < 100 { 0.0 } else { 1.0 }).collect();
    let score = auc(&yhat, &y).unwrap();
    assert!((score - 1.0).abs() < 1e-9);
}

#[test]
fn random_scores_land_near_one_half() {
    let mut rng = StdRng::seed_from_u64(1234);
    let n = 10_000;
    let yhat: Vec<f64> = (0..n).map(|_| rng.gen::<f64>()).collect();
    let y: Vec<f64> = (0..n).map(|_| if rng.gen::<bool>() { 1.0 } else { 0.0 }).collect();
    let score = auc(&yhat, &y).unwrap();
    assert!((0.45..=0.55).contains(&score), "auc was {score}");
}
