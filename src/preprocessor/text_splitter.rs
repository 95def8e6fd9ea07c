//! Text-field splitter (C10 stage 1) — spec §4.8 item 1.
//!
//! Grounded on `original_source/.../engine/TextFieldSplitter.cpp`: a text
//! column explodes into a derived `parent#col` frame of (rowid, token) rows,
//! one row per token, and the parent loses the text column in favor of a
//! synthesized `rowid` join key linking it to the derived frame.

use super::Marker;
use crate::error::EngineResult;
use crate::frame::column::{CatCol, Subrole};
use crate::frame::Df;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{L}+|\p{N}+").unwrap());

fn tokenize(text: &str) -> Vec<String> {
    TOKEN_RE.find_iter(&text.to_lowercase()).map(|m| m.as_str().to_string()).collect()
}

/// Which (marker, column) pairs had a text column at fit time, so transform
/// knows which columns to split without re-discovering them from the
/// possibly-different transform-time schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct FittedColumn {
    marker: Marker,
    column: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextSplitter {
    fitted: Vec<FittedColumn>,
}

impl TextSplitter {
    fn split_df(df: &Df, marker: Marker) -> EngineResult<(Df, Vec<Df>)> {
        let names: Vec<String> = df.text_names().into_iter().map(str::to_string).collect();
        if names.is_empty() {
            return Ok((df.clone(), Vec::new()));
        }

        let mut parent = df.clone();
        let rowid = CatCol::from_vec("rowid", (0..df.nrows() as i32).collect())
            .with_subrole(Subrole::SynthesizedJoinKey);
        parent.add_join_key(rowid)?;

        let mut derived = Vec::with_capacity(names.len());
        for name in &names {
            let text_col = df.text(name).expect("name came from text_names()");
            let mut rowids = Vec::new();
            let mut tokens = Vec::new();
            for i in 0..text_col.len() {
                let Some(value) = text_col.get(i) else { continue };
                for tok in tokenize(value) {
                    rowids.push(i as i32);
                    tokens.push(parent.cat_encoding.intern(&tok));
                }
            }
            let mut child = Df::new(format!("{}#{}", df.name(), name), rowids.len())
                .with_encodings(parent.cat_encoding.clone(), parent.jk_encoding.clone());
            child.add_join_key(
                CatCol::from_vec("rowid", rowids).with_subrole(Subrole::SynthesizedJoinKey),
            )?;
            child.add_categorical(
                CatCol::from_vec(name.as_str(), tokens).with_subrole(Subrole::DerivedFromText),
            )?;
            derived.push(child);
            parent.remove_text(name);
        }

        Ok((parent, derived))
    }

    pub fn fit_transform(
        &mut self,
        population: Df,
        peripheral: Vec<Df>,
    ) -> EngineResult<(Df, Vec<Df>, Vec<Df>)> {
        self.fitted.clear();
        for name in population.text_names() {
            self.fitted.push(FittedColumn { marker: Marker::Population, column: name.to_string() });
        }
        for (i, df) in peripheral.iter().enumerate() {
            for name in df.text_names() {
                self.fitted.push(FittedColumn { marker: Marker::Peripheral(i), column: name.to_string() });
            }
        }
        self.transform(population, peripheral)
    }

    pub fn transform(
        &self,
        population: Df,
        peripheral: Vec<Df>,
    ) -> EngineResult<(Df, Vec<Df>, Vec<Df>)> {
        let (population, mut all_derived) = Self::split_df(&population, Marker::Population)?;

        let mut new_peripheral = Vec::with_capacity(peripheral.len());
        for (i, df) in peripheral.into_iter().enumerate() {
            let (df, derived) = Self::split_df(&df, Marker::Peripheral(i))?;
            new_peripheral.push(df);
            all_derived.extend(derived);
        }

        Ok((population, new_peripheral, all_derived))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_text_column_into_one_row_per_token() {
        let mut df = Df::new("docs", 2);
        df.add_text(crate::frame::TextCol::from_vec(
            "body",
            vec![Some("Hello, World!".to_string()), Some("foo bar42".to_string())],
        ))
        .unwrap();

        let mut splitter = TextSplitter::default();
        let (parent, peripheral, derived) = splitter.fit_transform(df, Vec::new()).unwrap();

        assert!(parent.text("body").is_none());
        assert!(parent.join_key("rowid").is_some());
        assert!(peripheral.is_empty());
        assert_eq!(derived.len(), 1);

        let child = &derived[0];
        assert_eq!(child.name(), "docs#body");
        assert_eq!(child.nrows(), 4); // "hello" "world" + "foo" "bar42"
        let rowid = child.join_key("rowid").unwrap();
        assert_eq!(rowid.as_slice(), &[0, 0, 1, 1]);
    }

    #[test]
    fn frame_without_text_columns_is_untouched() {
        let df = Df::new("plain", 3);
        let mut splitter = TextSplitter::default();
        let (parent, peripheral, derived) = splitter.fit_transform(df, Vec::new()).unwrap();
        assert_eq!(parent.nrows(), 3);
        assert!(peripheral.is_empty());
        assert!(derived.is_empty());
    }
}
