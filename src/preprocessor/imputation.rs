//! Imputation (C10 stage 2) — spec §4.8 item 2.
//!
//! Grounded on `original_source/.../engine/Imputation.cpp`: mean-impute each
//! eligible numerical column at fit, replay the stored mean at transform,
//! and optionally emit a companion `is_null` dummy. Fatal at fit if a column
//! is all-NaN or carries an infinite value.

use super::Marker;
use crate::error::{EngineError, EngineResult};
use crate::frame::column::{NumCol, Subrole};
use crate::frame::Df;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Fitted {
    mean: f64,
    needs_dummy: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Imputation {
    add_dummies: bool,
    fitted: HashMap<(Marker, String), Fitted>,
}

fn dummy_name(col: &str) -> String {
    format!("{col}#is_null")
}

impl Imputation {
    pub fn new(add_dummies: bool) -> Self {
        Imputation { add_dummies, fitted: HashMap::new() }
    }

    fn eligible_columns(df: &Df) -> Vec<String> {
        df.numerical_names()
            .into_iter()
            .filter(|name| {
                let col = df.numerical(name).expect("name came from numerical_names()");
                !col.has_subrole(Subrole::ExcludeFromImputation)
            })
            .map(str::to_string)
            .collect()
    }

    fn impute_column(col: &NumCol, mean: f64) -> (NumCol, bool) {
        let mut any = false;
        let values: Vec<f64> = col
            .as_slice()
            .iter()
            .map(|&v| {
                if v.is_nan() {
                    any = true;
                    mean
                } else {
                    v
                }
            })
            .collect();
        (NumCol::from_vec(col.name(), values), any)
    }

    fn dummy_column(col: &NumCol) -> NumCol {
        let values: Vec<f64> =
            col.as_slice().iter().map(|&v| if v.is_nan() { 1.0 } else { 0.0 }).collect();
        NumCol::from_vec(dummy_name(col.name()), values).with_subrole(Subrole::ImputationDummy)
    }

    fn fit_df(&mut self, marker: Marker, df: Df) -> EngineResult<Df> {
        let mut df = df;
        for name in Self::eligible_columns(&df) {
            let original = df.numerical(&name).expect("just listed").clone();

            let all_nan = original.as_slice().iter().all(|v| v.is_nan());
            if all_nan {
                return Err(EngineError::plausibility(format!(
                    "cannot impute column '{name}': all values are NaN; set a subrole that excludes it from imputation instead"
                )));
            }
            let has_inf = original.as_slice().iter().any(|v| v.is_infinite());
            if has_inf {
                return Err(EngineError::plausibility(format!(
                    "cannot impute column '{name}': contains infinite values; set a subrole that excludes it from imputation instead"
                )));
            }

            let finite: Vec<f64> = original.as_slice().iter().copied().filter(|v| !v.is_nan()).collect();
            let mean = finite.iter().sum::<f64>() / finite.len() as f64;

            let (imputed, any_imputation) = Self::impute_column(&original, mean);
            let needs_dummy = self.add_dummies && any_imputation;

            df.add_numerical(imputed)?;
            if needs_dummy {
                df.add_numerical(Self::dummy_column(&original))?;
            }

            self.fitted.insert((marker, name), Fitted { mean, needs_dummy });
        }
        Ok(df)
    }

    fn transform_df(&self, marker: Marker, df: Df) -> EngineResult<Df> {
        let mut df = df;
        let names: Vec<String> =
            self.fitted.keys().filter(|(m, _)| *m == marker).map(|(_, c)| c.clone()).collect();
        for name in names {
            let fitted = self.fitted[&(marker, name.clone())];
            let Some(original) = df.numerical(&name).cloned() else { continue };
            let (imputed, _) = Self::impute_column(&original, fitted.mean);
            df.add_numerical(imputed)?;
            if fitted.needs_dummy {
                df.add_numerical(Self::dummy_column(&original))?;
            }
        }
        Ok(df)
    }

    pub fn fit_transform(
        &mut self,
        population: Df,
        peripheral: Vec<Df>,
    ) -> EngineResult<(Df, Vec<Df>)> {
        self.fitted.clear();
        let population = self.fit_df(Marker::Population, population)?;
        let mut out = Vec::with_capacity(peripheral.len());
        for (i, df) in peripheral.into_iter().enumerate() {
            out.push(self.fit_df(Marker::Peripheral(i), df)?);
        }
        Ok((population, out))
    }

    pub fn transform(&self, population: Df, peripheral: Vec<Df>) -> EngineResult<(Df, Vec<Df>)> {
        let population = self.transform_df(Marker::Population, population)?;
        let mut out = Vec::with_capacity(peripheral.len());
        for (i, df) in peripheral.into_iter().enumerate() {
            out.push(self.transform_df(Marker::Peripheral(i), df)?);
        }
        Ok((population, out))
    }
}
