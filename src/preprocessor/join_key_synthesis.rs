//! Join-key synthesis (C10 stage 3) — spec §4.8 item 3.
//!
//! Invoked per declared edge, not scanned automatically: when a placeholder
//! edge names a composite key (more than one column per side) or no key at
//! all, the schema-resolution step calls one of these on both the left and
//! right frame before the edge's `left_key_col`/`right_key_col` are set to
//! the synthesized column's name. Encoding goes through the frame's shared
//! `jk_encoding` (C2), so a composite key built the same way on both sides
//! of a join produces matching codes.

use crate::encoding::Enc;
use crate::error::{EngineError, EngineResult};
use crate::frame::column::{CatCol, Subrole};
use crate::frame::Df;
use std::fmt::Write as _;
use std::sync::Arc;

/// Builds a `\x1f`-joined string per row from `columns` (categoricals are
/// decoded back to their original string via `jk_encoding`/`cat_encoding`;
/// numericals are formatted with full precision) and interns it through
/// `jk_encoding`, so the same combination of values always maps to the same
/// surrogate code regardless of which frame it was built from.
pub fn synthesize_composite_key(df: &mut Df, columns: &[String], new_name: &str) -> EngineResult<()> {
    if columns.is_empty() {
        return Err(EngineError::validation("composite join key needs at least one column"));
    }

    let jk_encoding = df.jk_encoding.clone();
    let mut codes = Vec::with_capacity(df.nrows());
    for row in 0..df.nrows() {
        let mut key = String::new();
        for (i, col_name) in columns.iter().enumerate() {
            if i > 0 {
                key.push('\u{1f}');
            }
            write_row_value(df, col_name, row, &mut key)?;
        }
        codes.push(jk_encoding.intern(&key));
    }

    df.add_join_key(CatCol::from_vec(new_name, codes).with_subrole(Subrole::SynthesizedJoinKey))
}

fn write_row_value(df: &Df, col_name: &str, row: usize, out: &mut String) -> EngineResult<()> {
    if let Some(col) = df.any_categorical(col_name) {
        let code = col.get(row).unwrap_or(-1);
        let decoded = df.cat_encoding.decode(code).or_else(|| df.jk_encoding.decode(code));
        out.push_str(decoded.as_deref().unwrap_or(""));
        return Ok(());
    }
    if let Some(col) = df.any_numeric(col_name) {
        let _ = write!(out, "{}", col.get(row).unwrap_or(f64::NAN));
        return Ok(());
    }
    Err(EngineError::validation(format!(
        "no column '{col_name}' on frame '{}' to synthesize a join key from",
        df.name()
    )))
}

/// For a join with no declared key at all: the surrogate is just the row
/// index. Only meaningful when both sides of the edge are already aligned
/// one-to-one by position.
pub fn synthesize_row_id_key(df: &mut Df, new_name: &str) -> EngineResult<()> {
    let codes: Vec<i32> = (0..df.nrows() as i32).collect();
    df.add_join_key(CatCol::from_vec(new_name, codes).with_subrole(Subrole::SynthesizedJoinKey))
}

/// Convenience for interning the same composite key on both sides of an
/// edge through a single shared dictionary, for callers that keep the two
/// frames' `jk_encoding`s separate and need them to agree on this one key.
pub fn shared_encoding_for(left: &Df, right: &Df) -> Arc<Enc> {
    if Arc::ptr_eq(&left.jk_encoding, &right.jk_encoding) {
        left.jk_encoding.clone()
    } else {
        let merged = Enc::new();
        merged.append(&left.jk_encoding);
        merged.append(&right.jk_encoding);
        Arc::new(merged)
    }
}
