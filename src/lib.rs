//! # relfeat
//!
//! A relational feature-engineering engine: given a population table, a
//! tree of joined peripheral tables (a [`placeholder::Placeholder`]), and
//! optional targets, produces a numerical feature matrix via single-pass
//! propositionalization (FastProp, C11) and/or gradient-boosted relational
//! decision trees (Relboost/Multirel/RelMT, C6-C9).
//!
//! ## Data flow
//!
//! ```text
//! raw frames (CSV/Parquet/Arrow)
//!     -> encoding (C2) + frame (C1)
//!     -> preprocessor (C10): imputation, join-key synthesis, text splitting
//!     -> join_index / time_window / matchmaker (C3): placeholder-driven row matching
//!     -> aggregation (C4) + condition/splitter (C5) + loss/tree/ensemble (C6-C9)
//!        and/or fastprop (C11)
//!     -> pipeline: orchestrates the above into a fitted, persistable artifact
//!     -> coordinator (C12): thread-pool sizing, row-range reduction shared by C4/C9
//! ```
//!
//! `project` publishes fitted frames/pipelines behind a lock; `storage`
//! persists them; `protocol` exposes fit/transform/check over a localhost
//! socket; `sql_deploy` transpiles a fitted feature into a portable SQL
//! statement.

pub mod config;
pub mod encoding;
pub mod frame;
pub mod join_index;
pub mod time_window;
pub mod placeholder;
pub mod matchmaker;
pub mod aggregation;
pub mod condition;
pub mod splitter;
pub mod loss;
pub mod tree;
pub mod ensemble;
pub mod preprocessor;
pub mod fastprop;
pub mod coordinator;
pub mod pipeline;

pub mod error;
pub mod warner;
pub mod metrics;
pub mod sql_deploy;

pub mod storage;
pub mod project;
pub mod protocol;
pub mod execution;

pub use config::Config;
pub use error::{EngineError, EngineResult};
pub use pipeline::{Pipeline, PipelineHyperparameters};
pub use project::Project;
