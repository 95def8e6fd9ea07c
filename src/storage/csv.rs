//! CSV ingestion/export (`DataFrame.from_csv`/`to_csv`, spec §6).
//!
//! Column typing is inferred at load: a column parses as numerical if every
//! non-empty value in it parses as `f64`; otherwise it is interned as
//! categorical. Empty fields become nulls (`NaN` for numerical, `NULL_CODE`
//! for categorical) rather than triggering a parse error.

use crate::encoding::{Enc, NULL_CODE};
use crate::frame::column::{CatCol, NumCol};
use crate::frame::Df;
use crate::storage::error::{StorageError, StorageResult};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct CsvOptions {
    pub delimiter: char,
    pub has_header: bool,
    pub quote_char: char,
    pub trim_whitespace: bool,
}

impl Default for CsvOptions {
    fn default() -> Self {
        CsvOptions { delimiter: ',', has_header: true, quote_char: '"', trim_whitespace: true }
    }
}

/// Loads a CSV file into a `Df` with inferred column roles: every non-null
/// column becomes `numerical` if all its values parse as `f64`, else
/// `categorical` (interned against `cat_encoding`). Role reclassification
/// (e.g. marking a column as the join key or target) is the caller's job —
/// this only builds a generic frame.
pub fn load_df_from_csv<P: AsRef<Path>>(
    path: P,
    name: impl Into<String>,
    cat_encoding: Arc<Enc>,
    jk_encoding: Arc<Enc>,
) -> StorageResult<Df> {
    load_df_from_csv_with_options(path, name, cat_encoding, jk_encoding, CsvOptions::default())
}

pub fn load_df_from_csv_with_options<P: AsRef<Path>>(
    path: P,
    name: impl Into<String>,
    cat_encoding: Arc<Enc>,
    jk_encoding: Arc<Enc>,
    options: CsvOptions,
) -> StorageResult<Df> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut lines = reader.lines();

    let mut header: Vec<String> = Vec::new();
    if options.has_header {
        if let Some(line) = lines.next() {
            header = parse_csv_line(&line?, &options).into_iter().map(str::to_string).collect();
        }
    }

    let mut rows: Vec<Vec<String>> = Vec::new();
    for (row_num, line) in lines.enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields: Vec<String> = parse_csv_line(&line, &options).into_iter().map(str::to_string).collect();
        if header.is_empty() {
            header = (0..fields.len()).map(|i| format!("col{i}")).collect();
        }
        if fields.len() != header.len() {
            return Err(StorageError::Validation(format!(
                "row {} has {} fields, expected {}",
                row_num + 1,
                fields.len(),
                header.len()
            )));
        }
        rows.push(fields);
    }

    let nrows = rows.len();
    let mut df = Df::new(name, nrows).with_encodings(cat_encoding, jk_encoding);

    for (col_idx, col_name) in header.iter().enumerate() {
        let field_at = |r: usize| rows[r][col_idx].trim();
        let all_numeric = (0..nrows).all(|r| {
            let s = field_at(r);
            s.is_empty() || s.parse::<f64>().is_ok()
        });

        if all_numeric {
            let values: Vec<f64> = (0..nrows)
                .map(|r| {
                    let s = field_at(r);
                    if s.is_empty() { f64::NAN } else { s.parse::<f64>().unwrap() }
                })
                .collect();
            df.add_numerical(NumCol::from_vec(col_name.clone(), values))
                .map_err(|e| StorageError::Validation(e.to_string()))?;
        } else {
            let codes: Vec<i32> = (0..nrows)
                .map(|r| {
                    let s = field_at(r);
                    if s.is_empty() { NULL_CODE } else { df.cat_encoding.intern(s) }
                })
                .collect();
            df.add_categorical(CatCol::from_vec(col_name.clone(), codes))
                .map_err(|e| StorageError::Validation(e.to_string()))?;
        }
    }

    Ok(df)
}

/// Writes a frame's numerical, categorical, target and join-key columns to
/// CSV (one combined table; text/unused columns are omitted since they play
/// no further role once fit has consumed them).
pub fn save_df_to_csv<P: AsRef<Path>>(path: P, df: &Df) -> StorageResult<()> {
    save_df_to_csv_with_options(path, df, CsvOptions::default())
}

pub fn save_df_to_csv_with_options<P: AsRef<Path>>(path: P, df: &Df, options: CsvOptions) -> StorageResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    let mut num_names: Vec<String> = df.numerical_names().into_iter().map(str::to_string).collect();
    num_names.extend(df.target_names().into_iter().map(str::to_string));
    let mut cat_names: Vec<String> = df.categorical_names().into_iter().map(str::to_string).collect();
    cat_names.extend(df.join_key_names().into_iter().map(str::to_string));

    let header: Vec<String> =
        num_names.iter().chain(cat_names.iter()).map(|n| escape_csv_field(n, &options)).collect();
    if options.has_header {
        writeln!(writer, "{}", header.join(&options.delimiter.to_string()))?;
    }

    for row in 0..df.nrows() {
        let mut fields: Vec<String> = Vec::with_capacity(num_names.len() + cat_names.len());
        for name in &num_names {
            let col = df.any_numeric(name).expect("name came from this frame");
            fields.push(format_f64(col.get(row).unwrap_or(f64::NAN)));
        }
        for name in &cat_names {
            let col = df.any_categorical(name).expect("name came from this frame");
            let code = col.get(row).unwrap_or(-1);
            let s = df.cat_encoding.decode(code).or_else(|| df.jk_encoding.decode(code)).unwrap_or_default();
            fields.push(escape_csv_field(&s, &options));
        }
        writeln!(writer, "{}", fields.join(&options.delimiter.to_string()))?;
    }

    writer.flush()?;
    Ok(())
}

fn format_f64(f: f64) -> String {
    if f.is_nan() {
        String::new()
    } else {
        f.to_string()
    }
}

fn parse_csv_line<'a>(line: &'a str, options: &CsvOptions) -> Vec<&'a str> {
    let mut fields = Vec::new();
    let mut current_start = 0;
    let mut in_quotes = false;
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c == options.quote_char && !in_quotes {
            in_quotes = true;
            current_start = i + 1;
        } else if c == options.quote_char && in_quotes {
            if i + 1 < chars.len() && chars[i + 1] == options.quote_char {
                i += 1;
            } else {
                in_quotes = false;
            }
        } else if c == options.delimiter && !in_quotes {
            fields.push(trim_field(&line[current_start..i], options));
            current_start = i + 1;
        }
        i += 1;
    }
    fields.push(trim_field(&line[current_start..], options));
    fields
}

fn trim_field<'a>(field: &'a str, options: &CsvOptions) -> &'a str {
    let field = if options.trim_whitespace { field.trim() } else { field };
    field.trim_matches(options.quote_char)
}

fn escape_csv_field(s: &str, options: &CsvOptions) -> String {
    let needs_quoting =
        s.contains(options.delimiter) || s.contains(options.quote_char) || s.contains('\n') || s.contains('\r');
    if needs_quoting {
        let escaped = s.replace(options.quote_char, &format!("{0}{0}", options.quote_char));
        format!("{0}{1}{0}", options.quote_char, escaped)
    } else {
        s.to_string()
    }
}
