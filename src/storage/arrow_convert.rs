//! `Df` <-> Arrow `RecordBatch` conversion (spec §6 "Arrow frames": "schema
//! fields carrying the column name, unit, and subroles in metadata").
//!
//! Each field's metadata records `role` (which bucket of the frame the
//! column came from) and, where present, `unit` and a comma-joined
//! `subroles` list, so a batch round-trips back into the same frame shape
//! it was built from.

use crate::encoding::Enc;
use crate::frame::column::{CatCol, NumCol, Subrole};
use crate::frame::{Df, TextCol};
use crate::storage::error::{StorageError, StorageResult};
use arrow::array::{Array, Float64Array, Int32Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::collections::HashMap;
use std::sync::Arc;

const META_ROLE: &str = "role";
const META_UNIT: &str = "unit";
const META_SUBROLES: &str = "subroles";

fn subrole_to_str(s: Subrole) -> &'static str {
    match s {
        Subrole::ExcludeFromImputation => "exclude_from_imputation",
        Subrole::SynthesizedJoinKey => "synthesized_join_key",
        Subrole::DerivedFromText => "derived_from_text",
        Subrole::ImputationDummy => "imputation_dummy",
    }
}

fn subrole_from_str(s: &str) -> Option<Subrole> {
    match s {
        "exclude_from_imputation" => Some(Subrole::ExcludeFromImputation),
        "synthesized_join_key" => Some(Subrole::SynthesizedJoinKey),
        "derived_from_text" => Some(Subrole::DerivedFromText),
        "imputation_dummy" => Some(Subrole::ImputationDummy),
        _ => None,
    }
}

fn num_field(name: &str, role: &str, col: &NumCol) -> Field {
    let mut md = HashMap::new();
    md.insert(META_ROLE.to_string(), role.to_string());
    if let Some(u) = col.unit() {
        md.insert(META_UNIT.to_string(), u.to_string());
    }
    let subroles: Vec<&str> = col.subroles().iter().copied().map(subrole_to_str).collect();
    if !subroles.is_empty() {
        md.insert(META_SUBROLES.to_string(), subroles.join(","));
    }
    Field::new(name, DataType::Float64, true).with_metadata(md)
}

fn cat_field(name: &str, role: &str, col: &CatCol) -> Field {
    let mut md = HashMap::new();
    md.insert(META_ROLE.to_string(), role.to_string());
    let subroles: Vec<&str> = col.subroles().iter().copied().map(subrole_to_str).collect();
    if !subroles.is_empty() {
        md.insert(META_SUBROLES.to_string(), subroles.join(","));
    }
    Field::new(name, DataType::Int32, true).with_metadata(md)
}

/// Converts a frame to a single `RecordBatch` holding every column across
/// every role bucket (text columns as UTF-8, everything else as its native
/// `f64`/`i32` scalar type).
pub fn df_to_record_batch(df: &Df) -> StorageResult<RecordBatch> {
    let mut fields = Vec::new();
    let mut arrays: Vec<Arc<dyn Array>> = Vec::new();

    for name in df.join_key_names() {
        let col = df.join_key(name).expect("name from join_key_names");
        fields.push(cat_field(name, "join_key", col));
        arrays.push(Arc::new(Int32Array::from(col.as_slice().to_vec())));
    }
    for name in df.categorical_names() {
        let col = df.categorical(name).expect("name from categorical_names");
        fields.push(cat_field(name, "categorical", col));
        arrays.push(Arc::new(Int32Array::from(col.as_slice().to_vec())));
    }
    for name in df.numerical_names() {
        let col = df.numerical(name).expect("name from numerical_names");
        fields.push(num_field(name, "numerical", col));
        arrays.push(Arc::new(Float64Array::from(col.as_slice().to_vec())));
    }
    for name in df.target_names() {
        let col = df.target(name).expect("name from target_names");
        fields.push(num_field(name, "target", col));
        arrays.push(Arc::new(Float64Array::from(col.as_slice().to_vec())));
    }
    for name in df.text_names() {
        let col = df.text(name).expect("name from text_names");
        let mut md = HashMap::new();
        md.insert(META_ROLE.to_string(), "text".to_string());
        fields.push(Field::new(name, DataType::Utf8, true).with_metadata(md));
        let values: Vec<Option<&str>> = (0..col.len()).map(|i| col.get(i)).collect();
        arrays.push(Arc::new(StringArray::from(values)));
    }

    let schema = Arc::new(Schema::new(fields));
    RecordBatch::try_new(schema, arrays).map_err(StorageError::from)
}

/// Rebuilds a frame from a `RecordBatch` produced by [`df_to_record_batch`],
/// filing each field back into the role bucket its `role` metadata names.
pub fn record_batch_to_df(
    batch: &RecordBatch,
    name: impl Into<String>,
    cat_encoding: Arc<Enc>,
    jk_encoding: Arc<Enc>,
) -> StorageResult<Df> {
    let nrows = batch.num_rows();
    let mut df = Df::new(name, nrows).with_encodings(cat_encoding, jk_encoding);

    for field in batch.schema().fields() {
        let role = field
            .metadata()
            .get(META_ROLE)
            .ok_or_else(|| StorageError::Corrupt(format!("field '{}' missing role metadata", field.name())))?
            .clone();
        let subroles: Vec<Subrole> = field
            .metadata()
            .get(META_SUBROLES)
            .map(|s| s.split(',').filter_map(subrole_from_str).collect())
            .unwrap_or_default();
        let array = batch.column_with_name(field.name()).expect("field came from this batch's schema").clone();

        match role.as_str() {
            "text" => {
                let arr = array.as_any().downcast_ref::<StringArray>().ok_or_else(|| {
                    StorageError::Corrupt(format!("field '{}' declared text but is not Utf8", field.name()))
                })?;
                let values: Vec<Option<String>> = (0..arr.len())
                    .map(|i| if arr.is_null(i) { None } else { Some(arr.value(i).to_string()) })
                    .collect();
                df.add_text(TextCol::from_vec(field.name().clone(), values))
                    .map_err(|e| StorageError::Validation(e.to_string()))?;
            }
            "join_key" | "categorical" => {
                let arr = array.as_any().downcast_ref::<Int32Array>().ok_or_else(|| {
                    StorageError::Corrupt(format!("field '{}' declared {} but is not Int32", field.name(), role))
                })?;
                let mut col = CatCol::from_vec(field.name().clone(), arr.values().to_vec());
                for s in subroles {
                    col = col.with_subrole(s);
                }
                if role == "join_key" {
                    df.add_join_key(col)
                } else {
                    df.add_categorical(col)
                }
                .map_err(|e| StorageError::Validation(e.to_string()))?;
            }
            "numerical" | "target" => {
                let arr = array.as_any().downcast_ref::<Float64Array>().ok_or_else(|| {
                    StorageError::Corrupt(format!("field '{}' declared {} but is not Float64", field.name(), role))
                })?;
                let mut col = NumCol::from_vec(field.name().clone(), arr.values().to_vec());
                if let Some(u) = field.metadata().get(META_UNIT) {
                    col = col.with_unit(u.clone());
                }
                for s in subroles {
                    col = col.with_subrole(s);
                }
                if role == "target" {
                    df.add_target(col)
                } else {
                    df.add_numerical(col)
                }
                .map_err(|e| StorageError::Validation(e.to_string()))?;
            }
            other => return Err(StorageError::Corrupt(format!("unknown role metadata '{other}'"))),
        }
    }

    Ok(df)
}
