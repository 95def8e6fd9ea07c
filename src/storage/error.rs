//! Storage errors (spec §7 "Validation"/"Internal invariant" categories as
//! they apply to on-disk formats).

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Malformed input (bad CSV row width, unreadable manifest, wrong
    /// column width).
    #[error("{0}")]
    Validation(String),

    /// On-disk data failed a self-check (checksum mismatch, truncated
    /// column file, manifest referencing a missing column).
    #[error("corrupt data: {0}")]
    Corrupt(String),
}

pub type StorageResult<T> = Result<T, StorageError>;
