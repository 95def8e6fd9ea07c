//! Frame (C1) — `Df`, a named map of role-keyed, immutable columns.
//!
//! A role is not column-intrinsic: the same column value data may be
//! re-roled (e.g. a numerical column can also serve as a same-units
//! comparison column). `Df` itself is mutated only by adding or removing
//! whole columns; columns are copy-on-write (spec §3).

pub mod column;

use crate::encoding::Enc;
use crate::join_index::JoinIndex;
use crate::time_window::TimeWindowIndex;
use column::{CatCol, NumCol};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// Raw (untokenized) text column. Consumed only by the text-field splitter
/// (C10 stage 1), which replaces it with a derived join-key + child frame.
#[derive(Clone)]
pub struct TextCol {
    name: String,
    values: Arc<Vec<Option<String>>>,
}

impl TextCol {
    pub fn from_vec(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        TextCol { name: name.into(), values: Arc::new(values) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&str> {
        self.values.get(i).and_then(|o| o.as_deref())
    }
}

/// Which role-bucket a column currently lives in. A column's underlying
/// data never changes when re-roled; only which bucket of the frame it
/// lives under does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    JoinKey,
    TimeStamp,
    Categorical,
    Numerical,
    Target,
    Text,
    Unused,
}

/// A relational table: a name plus six role-keyed buckets of columns, as
/// described in spec §3.
pub struct Df {
    name: String,
    join_keys: HashMap<String, CatCol>,
    time_stamps: HashMap<String, NumCol>,
    categoricals: HashMap<String, CatCol>,
    numericals: HashMap<String, NumCol>,
    targets: HashMap<String, NumCol>,
    text: HashMap<String, TextCol>,
    unused_num: HashMap<String, NumCol>,
    unused_cat: HashMap<String, CatCol>,
    nrows: usize,

    /// Shared categorical-value dictionary (by reference, per spec §4.1).
    pub cat_encoding: Arc<Enc>,
    /// Shared join-key dictionary (by reference, per spec §4.1).
    pub jk_encoding: Arc<Enc>,

    /// Lazily-built join indices, cached per join-key column name and
    /// invalidated whenever a column of that name is replaced (columns are
    /// immutable, so replacement is the only way the cached index could go
    /// stale).
    join_index_cache: RwLock<HashMap<String, Arc<JoinIndex>>>,
    /// Lazily-built time-window indices, keyed by (join-key column,
    /// lower-ts column).
    time_window_cache: RwLock<HashMap<(String, String), Arc<TimeWindowIndex>>>,
}

impl Clone for Df {
    /// Column data is shared (`Arc`-backed), so cloning a frame is cheap;
    /// the lazily-built index caches are not carried over and rebuild on
    /// first use against the clone.
    fn clone(&self) -> Self {
        Df {
            name: self.name.clone(),
            join_keys: self.join_keys.clone(),
            time_stamps: self.time_stamps.clone(),
            categoricals: self.categoricals.clone(),
            numericals: self.numericals.clone(),
            targets: self.targets.clone(),
            text: self.text.clone(),
            unused_num: self.unused_num.clone(),
            unused_cat: self.unused_cat.clone(),
            nrows: self.nrows,
            cat_encoding: self.cat_encoding.clone(),
            jk_encoding: self.jk_encoding.clone(),
            join_index_cache: RwLock::new(HashMap::new()),
            time_window_cache: RwLock::new(HashMap::new()),
        }
    }
}

impl Df {
    pub fn new(name: impl Into<String>, nrows: usize) -> Self {
        Df {
            name: name.into(),
            join_keys: HashMap::new(),
            time_stamps: HashMap::new(),
            categoricals: HashMap::new(),
            numericals: HashMap::new(),
            targets: HashMap::new(),
            text: HashMap::new(),
            unused_num: HashMap::new(),
            unused_cat: HashMap::new(),
            nrows,
            cat_encoding: Arc::new(Enc::new()),
            jk_encoding: Arc::new(Enc::new()),
            join_index_cache: RwLock::new(HashMap::new()),
            time_window_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_encodings(mut self, cat_encoding: Arc<Enc>, jk_encoding: Arc<Enc>) -> Self {
        self.cat_encoding = cat_encoding;
        self.jk_encoding = jk_encoding;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    fn check_len(&self, col_len: usize, col_name: &str) -> crate::error::EngineResult<()> {
        if col_len != self.nrows {
            return Err(crate::error::EngineError::validation(format!(
                "column '{}' has length {} but frame '{}' has {} rows",
                col_name, col_len, self.name, self.nrows
            )));
        }
        Ok(())
    }

    /// Adds (or replaces) a join-key column. Invalidates any cached join
    /// index for this column name.
    pub fn add_join_key(&mut self, col: CatCol) -> crate::error::EngineResult<()> {
        self.check_len(col.len(), col.name())?;
        self.join_index_cache.write().remove(col.name());
        self.join_keys.insert(col.name().to_string(), col);
        Ok(())
    }

    pub fn add_time_stamp(&mut self, col: NumCol) -> crate::error::EngineResult<()> {
        self.check_len(col.len(), col.name())?;
        self.time_window_cache.write().retain(|(_, ts), _| ts != col.name());
        self.time_stamps.insert(col.name().to_string(), col);
        Ok(())
    }

    pub fn add_categorical(&mut self, col: CatCol) -> crate::error::EngineResult<()> {
        self.check_len(col.len(), col.name())?;
        self.categoricals.insert(col.name().to_string(), col);
        Ok(())
    }

    pub fn add_numerical(&mut self, col: NumCol) -> crate::error::EngineResult<()> {
        self.check_len(col.len(), col.name())?;
        self.numericals.insert(col.name().to_string(), col);
        Ok(())
    }

    pub fn add_target(&mut self, col: NumCol) -> crate::error::EngineResult<()> {
        self.check_len(col.len(), col.name())?;
        self.targets.insert(col.name().to_string(), col);
        Ok(())
    }

    pub fn add_text(&mut self, col: TextCol) -> crate::error::EngineResult<()> {
        self.check_len(col.len(), col.name())?;
        self.text.insert(col.name().to_string(), col);
        Ok(())
    }

    pub fn add_unused_numerical(&mut self, col: NumCol) -> crate::error::EngineResult<()> {
        self.check_len(col.len(), col.name())?;
        self.unused_num.insert(col.name().to_string(), col);
        Ok(())
    }

    pub fn add_unused_categorical(&mut self, col: CatCol) -> crate::error::EngineResult<()> {
        self.check_len(col.len(), col.name())?;
        self.unused_cat.insert(col.name().to_string(), col);
        Ok(())
    }

    pub fn remove_text(&mut self, name: &str) -> Option<TextCol> {
        self.text.remove(name)
    }

    pub fn join_key(&self, name: &str) -> Option<&CatCol> {
        self.join_keys.get(name)
    }

    pub fn time_stamp(&self, name: &str) -> Option<&NumCol> {
        self.time_stamps.get(name)
    }

    pub fn categorical(&self, name: &str) -> Option<&CatCol> {
        self.categoricals.get(name)
    }

    pub fn numerical(&self, name: &str) -> Option<&NumCol> {
        self.numericals.get(name)
    }

    pub fn target(&self, name: &str) -> Option<&NumCol> {
        self.targets.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&TextCol> {
        self.text.get(name)
    }

    /// Looks up any f64-backed column regardless of role (numerical,
    /// timestamp, or target) — used by the splitter/aggregation kernel,
    /// which address columns by name without caring which bucket a column
    /// happens to be filed under.
    pub fn any_numeric(&self, name: &str) -> Option<&NumCol> {
        self.numericals
            .get(name)
            .or_else(|| self.time_stamps.get(name))
            .or_else(|| self.targets.get(name))
            .or_else(|| self.unused_num.get(name))
    }

    pub fn any_categorical(&self, name: &str) -> Option<&CatCol> {
        self.categoricals
            .get(name)
            .or_else(|| self.join_keys.get(name))
            .or_else(|| self.unused_cat.get(name))
    }

    pub fn categorical_names(&self) -> Vec<&str> {
        self.categoricals.keys().map(String::as_str).collect()
    }

    pub fn numerical_names(&self) -> Vec<&str> {
        self.numericals.keys().map(String::as_str).collect()
    }

    pub fn target_names(&self) -> Vec<&str> {
        self.targets.keys().map(String::as_str).collect()
    }

    pub fn text_names(&self) -> Vec<&str> {
        self.text.keys().map(String::as_str).collect()
    }

    pub fn join_key_names(&self) -> Vec<&str> {
        self.join_keys.keys().map(String::as_str).collect()
    }

    /// Returns the cached join index for `jk_col`, building it on first
    /// use. O(1) amortized per lookup after the first.
    pub fn join_index(&self, jk_col: &str) -> crate::error::EngineResult<Arc<JoinIndex>> {
        if let Some(idx) = self.join_index_cache.read().get(jk_col) {
            return Ok(idx.clone());
        }
        let col = self.join_key(jk_col).ok_or_else(|| {
            crate::error::EngineError::validation(format!(
                "no join-key column '{jk_col}' on frame '{}'",
                self.name
            ))
        })?;
        let idx = Arc::new(JoinIndex::build(col));
        self.join_index_cache.write().insert(jk_col.to_string(), idx.clone());
        Ok(idx)
    }

    /// Returns the cached time-window index over (`jk_col`, `lower_ts_col`,
    /// `upper_ts_col`), building it on first use.
    pub fn time_window_index(
        &self,
        jk_col: &str,
        lower_ts_col: &str,
        upper_ts_col: Option<&str>,
        memory: Option<f64>,
    ) -> crate::error::EngineResult<Arc<TimeWindowIndex>> {
        let key = (jk_col.to_string(), lower_ts_col.to_string());
        if let Some(idx) = self.time_window_cache.read().get(&key) {
            return Ok(idx.clone());
        }
        let jk = self.join_key(jk_col).ok_or_else(|| {
            crate::error::EngineError::validation(format!(
                "no join-key column '{jk_col}' on frame '{}'",
                self.name
            ))
        })?;
        let lower = self.any_numeric(lower_ts_col).ok_or_else(|| {
            crate::error::EngineError::validation(format!(
                "no timestamp column '{lower_ts_col}' on frame '{}'",
                self.name
            ))
        })?;
        let upper = upper_ts_col.map(|c| self.any_numeric(c)).transpose()?.flatten();
        let idx = Arc::new(TimeWindowIndex::build(jk, lower, upper, memory));
        self.time_window_cache.write().insert(key, idx.clone());
        Ok(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use column::CatCol as Cat;
    use column::NumCol as Num;

    #[test]
    fn add_rejects_length_mismatch() {
        let mut df = Df::new("pop", 3);
        let bad = Num::from_vec("x", vec![1.0, 2.0]);
        assert!(df.add_numerical(bad).is_err());
        let good = Num::from_vec("x", vec![1.0, 2.0, 3.0]);
        assert!(df.add_numerical(good).is_ok());
    }

    #[test]
    fn join_index_is_cached_and_invalidated_on_replace() {
        let mut df = Df::new("perip", 3);
        df.add_join_key(Cat::from_vec("jk", vec![0, 0, 1])).unwrap();
        let idx1 = df.join_index("jk").unwrap();
        let idx2 = df.join_index("jk").unwrap();
        assert!(Arc::ptr_eq(&idx1, &idx2));
        df.add_join_key(Cat::from_vec("jk", vec![1, 1, 1])).unwrap();
        let idx3 = df.join_index("jk").unwrap();
        assert!(!Arc::ptr_eq(&idx1, &idx3));
    }
}
