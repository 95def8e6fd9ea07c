//! Coordinator (C12) — thread pool sizing, row-range partitioning, and
//! cross-thread reduction of sufficient statistics, spec §4.10/§5.
//!
//! A `Coordinator` owns one `rayon::ThreadPool` built fresh per fit or
//! transform call ("a fixed worker pool created per fit/transform, joined
//! before return", §9) rather than configuring rayon's global pool, so two
//! concurrent fits with different configured thread counts never fight over
//! process-wide state — the same reasoning the teacher's `StorageEngine`
//! applies with `ThreadPoolBuilder::build_global`, adapted here to a
//! per-call scoped pool instead of a process-global one since this engine's
//! fits are one-shot, not a long-lived server loop.
//!
//! Parallelization unit is a contiguous range of population rows (§4.10):
//! each worker computes its own partial sufficient statistics over its
//! range, and the coordinator thread sums the partials. Reductions are
//! commutative (sums), so result order never depends on how ranges were
//! sliced or which worker finished first.

use crate::error::{EngineError, EngineResult};
use rayon::prelude::*;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// `max(2, hw_concurrency - 2)` when `configured` is `0` (spec §4.10);
/// otherwise the caller's request is honored verbatim.
pub fn thread_count(configured: usize) -> usize {
    if configured == 0 {
        (num_cpus::get().saturating_sub(2)).max(2)
    } else {
        configured
    }
}

/// Splits `0..nrows` into `nthreads` contiguous, roughly equal ranges. The
/// last range absorbs the remainder so every row is covered exactly once
/// and no range is empty unless `nrows < nthreads`.
pub fn row_ranges(nrows: usize, nthreads: usize) -> Vec<Range<usize>> {
    if nrows == 0 || nthreads == 0 {
        return Vec::new();
    }
    let nthreads = nthreads.min(nrows);
    let chunk = nrows / nthreads;
    let remainder = nrows % nthreads;
    let mut ranges = Vec::with_capacity(nthreads);
    let mut start = 0;
    for i in 0..nthreads {
        let size = chunk + if i < remainder { 1 } else { 0 };
        ranges.push(start..start + size);
        start += size;
    }
    ranges
}

/// A worker pool sized per request (or per hardware concurrency) and a
/// shared cancellation flag workers observe between candidate-evaluation
/// batches (spec §5 "cooperative... workers observe a shared cancellation
/// flag after every candidate").
pub struct Coordinator {
    pool: rayon::ThreadPool,
    nthreads: usize,
    cancel: Arc<AtomicBool>,
}

impl Coordinator {
    pub fn new(configured_threads: usize) -> EngineResult<Self> {
        let nthreads = thread_count(configured_threads);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(nthreads)
            .thread_name(|i| format!("relfeat-worker-{i}"))
            .build()
            .map_err(|e| EngineError::internal(format!("failed to build worker pool: {e}")))?;
        Ok(Coordinator { pool, nthreads, cancel: Arc::new(AtomicBool::new(false)) })
    }

    pub fn num_threads(&self) -> usize {
        self.nthreads
    }

    /// Clone of the shared flag, for a caller (e.g. the request layer
    /// closing a socket) to set from outside the pool.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Partitions `0..nrows` into one range per worker, runs `local` on
    /// each range inside the pool, and folds the partial results together
    /// with `combine`. `local` and `combine` must be commutative-reduction
    /// friendly: ranges may be processed in any order. Checked against the
    /// cancellation flag before dispatch and after collection; a cancelled
    /// coordinator never calls `combine` on a partial result computed after
    /// cancellation was observed.
    pub fn reduce_rows<T, L, C>(&self, nrows: usize, zero: T, local: L, combine: C) -> EngineResult<T>
    where
        T: Send,
        L: Fn(Range<usize>) -> T + Sync,
        C: Fn(T, T) -> T + Sync,
    {
        if self.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let ranges = row_ranges(nrows, self.nthreads);
        let partials: Vec<T> = self.pool.install(|| ranges.into_par_iter().map(|range| local(range)).collect());
        if self.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        Ok(partials.into_iter().fold(zero, combine))
    }

    /// Maps every row `0..nrows` independently inside the pool (one output
    /// per row, no reduction) — the shape `Ensemble::transform`'s per-row
    /// tree-prediction loop needs.
    pub fn map_rows<T, F>(&self, nrows: usize, f: F) -> EngineResult<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> T + Sync,
    {
        if self.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        let out = self.pool.install(|| (0..nrows).into_par_iter().map(&f).collect());
        if self.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        Ok(out)
    }
}
