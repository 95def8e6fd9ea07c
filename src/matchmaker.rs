//! Matchmaker (C5) — produces, for a population row, the ordered sequence
//! of peripheral rows satisfying join-key equality plus the configured
//! temporal window.
//!
//! Match density can be large (10^4-10^6 per population row); the scratch
//! buffer is owned by the caller and reused across calls (spec §4.3:
//! "memory reuse is mandatory").

use crate::encoding::NULL_CODE;
use crate::error::EngineResult;
use crate::frame::column::{CatCol, NumCol};
use crate::frame::Df;
use crate::join_index::JoinIndex;
use crate::placeholder::Edge;
use crate::time_window::TimeWindowIndex;
use std::sync::Arc;

/// One (population-row, peripheral-row) pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub ix_output: u32,
    pub ix_input: u32,
}

/// Per-thread scratch buffer reused across `make_matches` calls, so tree
/// growth does not allocate per population row per node.
#[derive(Default)]
pub struct MatchBuffer {
    pub matches: Vec<Match>,
}

/// Builds the ordered match list for one edge of a `Placeholder` tree.
/// Holds cheap `Arc`-backed clones of the relevant columns/indices so it can
/// be constructed once per tree-growth call and reused across every
/// population row.
pub struct Matchmaker {
    pop_jk: CatCol,
    pop_ts: Option<NumCol>,
    horizon: f64,
    peripheral_join_index: Arc<JoinIndex>,
    peripheral_time_window: Option<Arc<TimeWindowIndex>>,
}

impl Matchmaker {
    pub fn new(population: &Df, peripheral: &Df, edge: &Edge) -> EngineResult<Self> {
        let pop_jk = population
            .join_key(&edge.left_key_col)
            .or_else(|| population.any_categorical(&edge.left_key_col))
            .ok_or_else(|| {
                crate::error::EngineError::validation(format!(
                    "population frame '{}' has no join-key column '{}'",
                    population.name(),
                    edge.left_key_col
                ))
            })?
            .clone();

        let pop_ts = edge
            .left_ts_col
            .as_ref()
            .map(|c| {
                population.any_numeric(c).cloned().ok_or_else(|| {
                    crate::error::EngineError::validation(format!(
                        "population frame '{}' has no timestamp column '{c}'",
                        population.name()
                    ))
                })
            })
            .transpose()?;

        let peripheral_join_index = peripheral.join_index(&edge.right_key_col)?;

        let peripheral_time_window = match (&edge.right_ts_col, &pop_ts) {
            (Some(right_ts), Some(_)) => Some(peripheral.time_window_index(
                &edge.right_key_col,
                right_ts,
                edge.right_upper_ts_col.as_deref(),
                edge.memory,
            )?),
            _ => None,
        };

        Ok(Matchmaker {
            pop_jk,
            pop_ts,
            horizon: edge.horizon,
            peripheral_join_index,
            peripheral_time_window,
        })
    }

    /// Fills `buf` (cleared first) with the matches for `pop_row`, ordered
    /// by `ix_input` ascending — the default order every aggregation that
    /// does not declare `needs_sorting` relies on.
    pub fn make_matches(&self, pop_row: usize, buf: &mut Vec<Match>) {
        buf.clear();
        let code = self.pop_jk.get(pop_row).unwrap_or(NULL_CODE);
        if code.is_negative() {
            return;
        }
        match (&self.pop_ts, &self.peripheral_time_window) {
            (Some(ts_col), Some(twi)) => {
                let t = match ts_col.get(pop_row) {
                    Some(t) if !t.is_nan() => t + self.horizon,
                    _ => return,
                };
                for r in twi.query(code, t) {
                    buf.push(Match { ix_output: pop_row as u32, ix_input: r });
                }
            }
            _ => {
                for &r in self.peripheral_join_index.rows(code) {
                    buf.push(Match { ix_output: pop_row as u32, ix_input: r });
                }
            }
        }
    }

    /// Convenience, allocating API for tests and small callers.
    pub fn make_matches_owned(&self, pop_row: usize) -> Vec<Match> {
        let mut buf = Vec::new();
        self.make_matches(pop_row, &mut buf);
        buf
    }
}
