//! Preprocessor pipeline (C10) — spec §4.8.
//!
//! Three fit/transform stages run in order ahead of feature learning: text
//! splitting, imputation, join-key synthesis. Each stage records what it did
//! at fit and replays exactly that at transform, mirroring the teacher's
//! `preprocessors::Preprocessor` fit/transform split (`PreprocessorImpl.hpp`).
//! Join-key synthesis is invoked per declared edge during schema resolution
//! rather than scanned over every frame, so it is exposed as free functions
//! here instead of living on [`Preprocessor`].

pub mod imputation;
pub mod join_key_synthesis;
pub mod text_splitter;

pub use imputation::Imputation;
pub use join_key_synthesis::{synthesize_composite_key, synthesize_row_id_key};
pub use text_splitter::TextSplitter;

use crate::error::EngineResult;
use crate::frame::Df;
use serde::{Deserialize, Serialize};

/// Which table a fitted column belongs to, for re-identifying it at
/// transform time (spec §4.8's per-column parameter replay).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Marker {
    Population,
    /// Index into the `peripheral` slice passed to fit/transform.
    Peripheral(usize),
}

/// Stages 1-2 of the preprocessor pipeline, run in fixed order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preprocessor {
    pub text_splitter: TextSplitter,
    pub imputation: Imputation,
}

impl Preprocessor {
    pub fn new(add_dummies: bool) -> Self {
        Preprocessor { text_splitter: TextSplitter::default(), imputation: Imputation::new(add_dummies) }
    }

    /// Fits both stages and returns the transformed population, the
    /// transformed peripheral frames (original ones, in order), and any new
    /// frames the text splitter derived from text columns — the caller is
    /// responsible for wiring those into the placeholder as
    /// `Propositionalization`-tagged children of the frame they came from.
    pub fn fit_transform(
        &mut self,
        population: Df,
        peripheral: Vec<Df>,
    ) -> EngineResult<(Df, Vec<Df>, Vec<Df>)> {
        let (population, peripheral, derived) = self.text_splitter.fit_transform(population, peripheral)?;
        let (population, peripheral) = self.imputation.fit_transform(population, peripheral)?;
        Ok((population, peripheral, derived))
    }

    pub fn transform(&self, population: Df, peripheral: Vec<Df>) -> EngineResult<(Df, Vec<Df>, Vec<Df>)> {
        let (population, peripheral, derived) = self.text_splitter.transform(population, peripheral)?;
        let (population, peripheral) = self.imputation.transform(population, peripheral)?;
        Ok((population, peripheral, derived))
    }
}
