//! Storage (spec §6 "Persisted model layout" and "Core operations exposed"
//! `DataFrame.{from_csv,from_db,...,save,load}`).
//!
//! - [`csv`]: human-readable ingestion/export.
//! - [`parquet`]: columnar interop format via Arrow.
//! - [`arrow_convert`]: `Df` <-> Arrow `RecordBatch`, shared by `parquet`
//!   and by the protocol layer's Arrow IPC frames.
//! - [`model_io`]: the project's own little-endian binary layout for
//!   persisted frames, pipelines, and encodings.

pub mod arrow_convert;
pub mod csv;
pub mod error;
pub mod model_io;
pub mod parquet;

pub use error::{StorageError, StorageResult};
