//! Pipeline — top-level fit/transform orchestration tying C1-C12 together
//! (spec §2 data-flow: "raw frames → C10 → (C1, C2, C3, C4) → C5 → either
//! C11 or (C6 <-> C7 <-> C8) → C9").
//!
//! Grounded on `storage_engine/mod.rs` + `execution/mod.rs`'s lifecycle
//! shape (a fitted, immutable artifact produced from raw inputs plus a
//! hyperparameter struct, held behind the project's lock once published);
//! re-keyed from Datalog view materialization to feature-learning fit.

use crate::error::EngineResult;
use crate::fastprop::{self, FastProp};
use crate::ensemble::{Ensemble, EnsembleHyperparameters};
use crate::frame::column::NumCol;
use crate::frame::Df;
use crate::placeholder::Placeholder;
use crate::preprocessor::Preprocessor;
use crate::warner::Warner;
use serde::{Deserialize, Serialize};

/// Which feature learner(s) a pipeline runs. Spec §2 names them as
/// alternatives ("either C11 or C6<->C7<->C8"), but nothing prevents
/// running both and concatenating their outputs, which the original does
/// for its combined `fast_prop` + `relboost` feature learner setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Learner {
    FastPropOnly,
    EnsembleOnly,
    Both,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineHyperparameters {
    pub learner: Learner,
    pub add_imputation_dummies: bool,
    pub loss_name: String,
    pub ensemble: EnsembleHyperparameters,
    pub rng_seed: u64,
}

impl Default for PipelineHyperparameters {
    fn default() -> Self {
        PipelineHyperparameters {
            learner: Learner::Both,
            add_imputation_dummies: true,
            loss_name: "SquareLoss".to_string(),
            ensemble: EnsembleHyperparameters::default(),
            rng_seed: 42,
        }
    }
}

/// A fitted pipeline: the preprocessor's fitted state (imputation means,
/// text-splitter column list) plus whichever feature learner(s) were
/// trained. `transform` replays all of it against fresh frames with the
/// same schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    preprocessor: Preprocessor,
    fastprop: Option<FastProp>,
    ensemble: Option<Ensemble>,
    placeholder: Placeholder,
    hyper: PipelineHyperparameters,
}

fn copy_numerical_columns(from: &Df, into: &mut Df) -> EngineResult<()> {
    for name in from.numerical_names() {
        let col = from.numerical(name).expect("name came from numerical_names");
        into.add_numerical(NumCol::from_vec(name.to_string(), col.as_slice().to_vec()))?;
    }
    Ok(())
}

impl Pipeline {
    /// Fits the preprocessor, then the configured feature learner(s), on
    /// `population`/`peripheral` under `placeholder`'s schema. Returns the
    /// fitted pipeline's own feature matrix (what `fit` already computed,
    /// so a caller need not immediately call `transform` again) alongside
    /// any accumulated warnings.
    pub fn fit(
        population: Df,
        peripheral: Vec<Df>,
        placeholder: Placeholder,
        hyper: PipelineHyperparameters,
    ) -> EngineResult<(Pipeline, Df, Warner)> {
        let mut warner = Warner::new();
        warner.scan_numerical(&population);
        for df in &peripheral {
            warner.scan_numerical(df);
        }

        let mut preprocessor = Preprocessor::new(hyper.add_imputation_dummies);
        let (population, mut peripheral, derived) = preprocessor.fit_transform(population, peripheral)?;
        peripheral.extend(derived);

        let mut features = Df::new(format!("{}#features", population.name()), population.nrows());

        let fastprop = match hyper.learner {
            Learner::FastPropOnly | Learner::Both => {
                let (fastprop, fastprop_features) = FastProp::fit_transform(&peripheral, &placeholder, &population)?;
                copy_numerical_columns(&fastprop_features, &mut features)?;
                Some(fastprop)
            }
            Learner::EnsembleOnly => None,
        };

        let ensemble = match hyper.learner {
            Learner::EnsembleOnly | Learner::Both => {
                let ensemble = Ensemble::fit(
                    &population,
                    &peripheral,
                    &placeholder,
                    &hyper.loss_name,
                    hyper.ensemble,
                    hyper.rng_seed,
                )?;
                let scores = ensemble.transform(&population, &peripheral, &placeholder)?;
                features.add_numerical(NumCol::from_vec("ensemble_score", scores))?;
                let subfeatures = fastprop::subfeature_columns(&population, &peripheral, &placeholder, &ensemble)?;
                copy_numerical_columns(&subfeatures, &mut features)?;
                Some(ensemble)
            }
            Learner::FastPropOnly => None,
        };

        let pipeline = Pipeline { preprocessor, fastprop, ensemble, placeholder, hyper };
        Ok((pipeline, features, warner))
    }

    /// Replays the fitted preprocessor and feature learner(s) on fresh
    /// frames sharing `population`'s/`peripheral`'s schema.
    pub fn transform(&self, population: Df, peripheral: Vec<Df>) -> EngineResult<Df> {
        let (population, mut peripheral, derived) = self.preprocessor.transform(population, peripheral)?;
        peripheral.extend(derived);

        let mut features = Df::new(format!("{}#features", population.name()), population.nrows());

        if let Some(fastprop) = &self.fastprop {
            let fastprop_features = fastprop.transform(&population, &peripheral, &self.placeholder)?;
            copy_numerical_columns(&fastprop_features, &mut features)?;
        }

        if let Some(ensemble) = &self.ensemble {
            let scores = ensemble.transform(&population, &peripheral, &self.placeholder)?;
            features.add_numerical(NumCol::from_vec("ensemble_score", scores))?;
            let subfeatures = fastprop::subfeature_columns(&population, &peripheral, &self.placeholder, ensemble)?;
            copy_numerical_columns(&subfeatures, &mut features)?;
        }

        Ok(features)
    }

    /// Re-runs the non-fatal checks `fit` ran, without refitting anything;
    /// spec's `Pipeline.check` operation.
    pub fn check(&self, population: &Df, peripheral: &[Df]) -> Warner {
        let mut warner = Warner::new();
        warner.scan_numerical(population);
        for df in peripheral {
            warner.scan_numerical(df);
        }
        warner
    }

    /// Per-(edge, column, aggregation) feature importance: each boosted
    /// tree's total gain, summed across trees that share a catalog entry.
    /// Spec's `Pipeline.feature_importances`.
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        let Some(ensemble) = &self.ensemble else { return Vec::new() };
        let mut totals: std::collections::HashMap<String, f64> = std::collections::HashMap::new();
        for ft in &ensemble.trees {
            let key = format!("{}.{}[{:?}]", ft.edge_index, ft.column, ft.aggregation);
            *totals.entry(key).or_insert(0.0) += ft.node.total_gain();
        }
        let mut out: Vec<(String, f64)> = totals.into_iter().collect();
        out.sort_by(|a, b| b.1.total_cmp(&a.1));
        out
    }

    /// Per-input-column importance: `feature_importances` collapsed by the
    /// peripheral column a feature read from, ignoring which aggregation or
    /// edge produced it. Spec's `Pipeline.column_importances`.
    pub fn column_importances(&self) -> Vec<(String, f64)> {
        let Some(ensemble) = &self.ensemble else { return Vec::new() };
        let mut totals: std::collections::HashMap<String, f64> = std::collections::HashMap::new();
        for ft in &ensemble.trees {
            *totals.entry(ft.column.clone()).or_insert(0.0) += ft.node.total_gain();
        }
        let mut out: Vec<(String, f64)> = totals.into_iter().collect();
        out.sort_by(|a, b| b.1.total_cmp(&a.1));
        out
    }

    pub fn num_features(&self) -> usize {
        let fastprop_n = self.fastprop.as_ref().map(FastProp::num_features).unwrap_or(0);
        let ensemble_n = self.ensemble.as_ref().map(Ensemble::num_features).unwrap_or(0);
        fastprop_n + ensemble_n
    }
}
