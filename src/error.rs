//! Crate-wide error taxonomy.
//!
//! Mirrors the five classes from the error-handling design: validation,
//! plausibility, resource, internal invariant, and cancellation. Handlers at
//! the protocol boundary convert any [`EngineError`] into a response string;
//! nothing below that boundary panics on a user-reachable path.

use std::io;
use thiserror::Error;

/// Top-level error type returned by fit/transform/check and all the
/// manager-level operations (`DataFrame.*`, `Pipeline.*`, `Project.*`).
#[derive(Error, Debug)]
pub enum EngineError {
    /// Wrong arity, missing column, bad role, nonexistent frame/pipeline.
    /// No state change occurs before this is raised.
    #[error("validation error: {0}")]
    Validation(String),

    /// Target is all-null, a column is all-NaN, infinite values appear
    /// where not allowed, or a join key has an unexpected type. Raised at
    /// fit time; nothing is published.
    #[error("plausibility error: {0}")]
    Plausibility(String),

    /// Out-of-memory on scratch space, disk full, or a closed socket.
    #[error("resource error: {0}")]
    Resource(String),

    /// An internal invariant was violated (inconsistent counts, a
    /// non-finite `sum(h+lambda)`, ...). This is a bug upstream; the
    /// project state remains at the last committed snapshot.
    #[error("internal invariant violated: {0}")]
    Internal(String),

    /// The caller disconnected or the cancellation flag was observed.
    /// No publication occurs.
    #[error("operation cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Storage(#[from] crate::storage::error::StorageError),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        EngineError::Validation(msg.into())
    }

    pub fn plausibility(msg: impl Into<String>) -> Self {
        EngineError::Plausibility(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        EngineError::Internal(msg.into())
    }

    /// Whether this error class permits a (possibly future) retry; used by
    /// the protocol layer to decide whether to log at `warn` or `error`.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Internal(_))
    }
}
