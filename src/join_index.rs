//! Join index (C3) — `jk -> [rownum]` for a single join-key column.
//!
//! Grounded on the teacher's `hash_index.rs` (key -> tuple-rows hash index
//! with stats), simplified: once join-key values are dense, non-negative
//! `i32` codes (the `Enc`-encoded representation spec §3 mandates), a
//! `HashMap<i32, Vec<u32>>` is all the Bloom-filter layer there existed to
//! approximate, so it is dropped.

use crate::frame::column::CatCol;
use std::collections::HashMap;

/// For one join-key column: `code -> sorted row indices`. Built in one pass
/// (`O(N + K)` for `N` rows and `K` distinct codes); queries are `O(1)`
/// hash lookup plus the cost of reading the returned slice.
pub struct JoinIndex {
    rows_by_code: HashMap<i32, Vec<u32>>,
}

impl JoinIndex {
    pub fn build(col: &CatCol) -> Self {
        let mut rows_by_code: HashMap<i32, Vec<u32>> = HashMap::new();
        for (i, code) in col.as_slice().iter().enumerate() {
            // A row with a null key contributes to no match (spec §4.2).
            if code.is_negative() {
                continue;
            }
            rows_by_code.entry(*code).or_default().push(i as u32);
        }
        JoinIndex { rows_by_code }
    }

    /// Peripheral row indices whose join key equals `code`, in ascending
    /// row order (rows were appended in scan order during `build`, which is
    /// ascending).
    pub fn rows(&self, code: i32) -> &[u32] {
        self.rows_by_code.get(&code).map_or(&[], Vec::as_slice)
    }

    pub fn distinct_codes(&self) -> usize {
        self.rows_by_code.len()
    }
}
