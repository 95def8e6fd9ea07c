//! Columnar store (C1) — typed, immutable-after-publication columns.
//!
//! A column is a named, contiguous, typed sequence backed either by an
//! owned heap allocation or by a memory-mapped file; both routes present
//! the same `&[T]` view, so downstream code never needs to know which one
//! it has (spec §4.1: "both routes yield the same interface").
//!
//! Columns are immutable once built: "mutation" at the frame level always
//! means publishing a brand new column under a name, never rewriting one in
//! place (spec §3: "columns themselves are immutable copy-on-write").

use memmap2::Mmap;
use std::collections::HashSet;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

/// A tag influencing how the preprocessor and splitter treat a column,
/// independent of its role. Only the subroles this engine actually acts on
/// are modeled (legacy subroles from the original that no consumer reads
/// are not carried over).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subrole {
    /// Imputation (C10 stage 2) must skip this column even though it is
    /// numerical.
    ExcludeFromImputation,
    /// This column was synthesized by join-key synthesis (C10 stage 3)
    /// rather than supplied by the user.
    SynthesizedJoinKey,
    /// This column was derived by the text-field splitter (C10 stage 1):
    /// a `parent#col` token column.
    DerivedFromText,
    /// A companion `is_null` dummy column emitted by imputation.
    ImputationDummy,
}

/// Trait implemented by the two underlying storage scalars, `f64` (numeric
/// / timestamp) and `i32` (category code / join-key code).
pub trait ColumnElement: Copy + Send + Sync + 'static {
    const NULL: Self;
    fn is_null(self) -> bool;
}

impl ColumnElement for f64 {
    const NULL: Self = f64::NAN;
    fn is_null(self) -> bool {
        self.is_nan()
    }
}

impl ColumnElement for i32 {
    const NULL: Self = -1;
    fn is_null(self) -> bool {
        self < 0
    }
}

/// Either an owned heap buffer or a memory-mapped file, exposing the same
/// `&[T]` view either way.
enum Backing<T: ColumnElement> {
    Heap(Arc<Vec<T>>),
    /// `mmap` is kept alive for as long as any column views it; `offset`
    /// and `len` describe the `[T]` slice within it (the file may hold a
    /// small header before the raw element bytes).
    Mapped {
        mmap: Arc<Mmap>,
        offset: usize,
        len: usize,
        _t: std::marker::PhantomData<T>,
    },
}

impl<T: ColumnElement> Backing<T> {
    fn as_slice(&self) -> &[T] {
        match self {
            Backing::Heap(v) => v.as_slice(),
            Backing::Mapped { mmap, offset, len, .. } => {
                let byte_len = len * std::mem::size_of::<T>();
                let bytes = &mmap[*offset..*offset + byte_len];
                // SAFETY: `T` is `f64` or `i32`, both plain-old-data with no
                // padding/alignment surprises relative to their on-disk
                // little-endian layout produced by `storage::model_io`; the
                // mmap region is exactly `len * size_of::<T>()` bytes and
                // outlives this slice via the `Arc<Mmap>` held alongside it.
                unsafe { std::slice::from_raw_parts(bytes.as_ptr().cast::<T>(), *len) }
            }
        }
    }
}

impl<T: ColumnElement> Clone for Backing<T> {
    fn clone(&self) -> Self {
        match self {
            Backing::Heap(v) => Backing::Heap(v.clone()),
            Backing::Mapped { mmap, offset, len, _t } => Backing::Mapped {
                mmap: mmap.clone(),
                offset: *offset,
                len: *len,
                _t: *_t,
            },
        }
    }
}

/// A named, typed, immutable column.
#[derive(Clone)]
pub struct Col<T: ColumnElement> {
    name: String,
    unit: Option<String>,
    subroles: HashSet<Subrole>,
    data: Backing<T>,
}

impl<T: ColumnElement> Col<T> {
    /// Builds a column that owns a heap copy of `data`.
    pub fn from_vec(name: impl Into<String>, data: Vec<T>) -> Self {
        Col {
            name: name.into(),
            unit: None,
            subroles: HashSet::new(),
            data: Backing::Heap(Arc::new(data)),
        }
    }

    /// Builds a column view over a memory-mapped file. `offset`/`len` are
    /// in elements, not bytes.
    pub fn from_mmap(
        name: impl Into<String>,
        path: impl AsRef<Path>,
        offset: usize,
        len: usize,
    ) -> std::io::Result<Self> {
        let file = std::fs::File::open(path)?;
        // SAFETY: standard mmap precondition — the file must not be mutated
        // by another process while mapped. Model files under the project
        // root are only ever written by this process, and only before they
        // are published (renamed into place), matching the "columns are
        // immutable after publication" invariant.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Col {
            name: name.into(),
            unit: None,
            subroles: HashSet::new(),
            data: Backing::Mapped {
                mmap: Arc::new(mmap),
                offset,
                len,
                _t: std::marker::PhantomData,
            },
        })
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_subrole(mut self, subrole: Subrole) -> Self {
        self.subroles.insert(subrole);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Col { name: name.into(), ..self.clone() }
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn subroles(&self) -> &HashSet<Subrole> {
        &self.subroles
    }

    pub fn has_subrole(&self, s: Subrole) -> bool {
        self.subroles.contains(&s)
    }

    pub fn len(&self) -> usize {
        self.data.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_slice(&self) -> &[T] {
        self.data.as_slice()
    }

    pub fn get(&self, i: usize) -> Option<T> {
        self.data.as_slice().get(i).copied()
    }

    pub fn is_null(&self, i: usize) -> bool {
        self.get(i).map(ColumnElement::is_null).unwrap_or(true)
    }
}

impl<T: ColumnElement> Deref for Col<T> {
    type Target = [T];
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

/// Numeric/timestamp column (f64-backed): numericals, timestamps, targets.
pub type NumCol = Col<f64>;
/// Category-code/join-key column (i32-backed, codes into an [`crate::encoding::Enc`]).
pub type CatCol = Col<i32>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heap_column_roundtrips_values_and_nulls() {
        let col = NumCol::from_vec("x", vec![1.0, f64::NAN, 3.0]);
        assert_eq!(col.len(), 3);
        assert!(!col.is_null(0));
        assert!(col.is_null(1));
        assert_eq!(col.get(2), Some(3.0));
    }

    #[test]
    fn category_null_sentinel_is_negative() {
        let col = CatCol::from_vec("c", vec![0, 1, -1]);
        assert!(!col.is_null(0));
        assert!(col.is_null(2));
    }

    #[test]
    fn mmap_column_matches_heap_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("col.bin");
        let values: Vec<f64> = vec![1.5, 2.5, 3.5, f64::NAN];
        {
            use std::io::Write;
            let mut f = std::fs::File::create(&path).unwrap();
            for v in &values {
                f.write_all(&v.to_le_bytes()).unwrap();
            }
        }
        let col = NumCol::from_mmap("x", &path, 0, values.len()).unwrap();
        assert_eq!(col.get(0), Some(1.5));
        assert_eq!(col.get(2), Some(3.5));
        assert!(col.is_null(3));
    }
}
