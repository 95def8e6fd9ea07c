//! Parquet persistence for `Df` (spec §6 "per-data-frame subdirectories:
//! binary column files + manifest" — Parquet is the columnar, compressed
//! alternative format `DataFrame.from_db`/interop callers reach for instead
//! of the project's own binary column layout in `model_io`).

use crate::encoding::Enc;
use crate::frame::Df;
use crate::storage::arrow_convert::{df_to_record_batch, record_batch_to_df};
use crate::storage::error::StorageResult;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

pub fn save_df_to_parquet<P: AsRef<Path>>(path: P, df: &Df) -> StorageResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let batch = df_to_record_batch(df)?;
    let file = File::create(path)?;
    let props = WriterProperties::builder().set_compression(Compression::SNAPPY).build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

pub fn load_df_from_parquet<P: AsRef<Path>>(
    path: P,
    name: impl Into<String>,
    cat_encoding: Arc<Enc>,
    jk_encoding: Arc<Enc>,
) -> StorageResult<Df> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let name = name.into();

    let mut out: Option<Df> = None;
    for batch in reader {
        let batch = batch?;
        let part = record_batch_to_df(&batch, name.clone(), cat_encoding.clone(), jk_encoding.clone())?;
        out = Some(match out {
            None => part,
            Some(acc) => acc,
        });
    }
    out.ok_or_else(|| crate::storage::error::StorageError::Corrupt("parquet file has no row groups".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::column::NumCol;
    use tempfile::tempdir;

    #[test]
    fn round_trips_a_simple_frame() {
        let mut df = Df::new("pop", 3);
        df.add_numerical(NumCol::from_vec("x", vec![1.0, 2.0, 3.0])).unwrap();

        let dir = tempdir().unwrap();
        let path = dir.path().join("pop.parquet");
        save_df_to_parquet(&path, &df).unwrap();

        let back = load_df_from_parquet(&path, "pop", Arc::new(Enc::new()), Arc::new(Enc::new())).unwrap();
        assert_eq!(back.nrows(), 3);
        assert_eq!(back.numerical("x").unwrap().as_slice(), &[1.0, 2.0, 3.0]);
    }
}
