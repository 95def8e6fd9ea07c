//! Scoring metrics (spec §8 seed test 2: "AUC on a separable binary
//! problem").

pub mod auc;

pub use auc::auc;
