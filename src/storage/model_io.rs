//! Persisted model layout (spec §6): a directory tree per project with
//! per-data-frame subdirectories (binary column files + manifest) and
//! per-pipeline subdirectories (JSON manifest + per-tree JSON + fitted
//! encoding binary). Little-endian always; floats are IEEE 754 double;
//! integer codes are signed 32-bit; the string file format is
//! length-prefixed UTF-8, sequential — all per spec §6's "Format is
//! self-describing".

use crate::encoding::Enc;
use crate::frame::column::{CatCol, NumCol, Subrole};
use crate::frame::{Df, TextCol};
use crate::pipeline::Pipeline;
use crate::storage::error::{StorageError, StorageResult};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

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

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnEntry {
    name: String,
    role: String,
    kind: String, // "f64" | "i32" | "text"
    unit: Option<String>,
    subroles: Vec<String>,
    file: String,
    len: usize,
    crc32: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FrameManifest {
    name: String,
    nrows: usize,
    columns: Vec<ColumnEntry>,
}

fn write_le_f64(path: &Path, values: &[f64]) -> StorageResult<u32> {
    let mut buf = Vec::with_capacity(values.len() * 8);
    for v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    File::create(path)?.write_all(&buf)?;
    Ok(crc32fast::hash(&buf))
}

fn write_le_i32(path: &Path, values: &[i32]) -> StorageResult<u32> {
    let mut buf = Vec::with_capacity(values.len() * 4);
    for v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    File::create(path)?.write_all(&buf)?;
    Ok(crc32fast::hash(&buf))
}

fn read_checked(path: &Path, expected_crc32: u32) -> StorageResult<Vec<u8>> {
    let mut buf = Vec::new();
    File::open(path)?.read_to_end(&mut buf)?;
    if crc32fast::hash(&buf) != expected_crc32 {
        return Err(StorageError::Corrupt(format!("checksum mismatch reading {}", path.display())));
    }
    Ok(buf)
}

fn read_le_f64(path: &Path, len: usize, crc32: u32) -> StorageResult<Vec<f64>> {
    let buf = read_checked(path, crc32)?;
    if buf.len() != len * 8 {
        return Err(StorageError::Corrupt(format!("{} has {} bytes, expected {}", path.display(), buf.len(), len * 8)));
    }
    Ok(buf.chunks_exact(8).map(|c| f64::from_le_bytes(c.try_into().unwrap())).collect())
}

fn read_le_i32(path: &Path, len: usize, crc32: u32) -> StorageResult<Vec<i32>> {
    let buf = read_checked(path, crc32)?;
    if buf.len() != len * 4 {
        return Err(StorageError::Corrupt(format!("{} has {} bytes, expected {}", path.display(), buf.len(), len * 4)));
    }
    Ok(buf.chunks_exact(4).map(|c| i32::from_le_bytes(c.try_into().unwrap())).collect())
}

/// Length-prefixed UTF-8, sequential; a length of `u32::MAX` marks a null
/// entry (spec §6 string-file format, extended with a null sentinel since
/// text columns may themselves be null).
fn write_text_file(path: &Path, values: &[Option<String>]) -> StorageResult<u32> {
    let mut buf = Vec::new();
    buf.extend_from_slice(&(values.len() as u64).to_le_bytes());
    for v in values {
        match v {
            None => buf.extend_from_slice(&u32::MAX.to_le_bytes()),
            Some(s) => {
                let bytes = s.as_bytes();
                buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                buf.extend_from_slice(bytes);
            }
        }
    }
    File::create(path)?.write_all(&buf)?;
    Ok(crc32fast::hash(&buf))
}

fn read_text_file(path: &Path, crc32: u32) -> StorageResult<Vec<Option<String>>> {
    let buf = read_checked(path, crc32)?;
    let mut pos = 0usize;
    let next8 = |buf: &[u8], pos: &mut usize| -> StorageResult<u64> {
        let bytes: [u8; 8] = buf
            .get(*pos..*pos + 8)
            .ok_or_else(|| StorageError::Corrupt("truncated text file".to_string()))?
            .try_into()
            .unwrap();
        *pos += 8;
        Ok(u64::from_le_bytes(bytes))
    };
    let count = next8(&buf, &mut pos)?;
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let len_bytes: [u8; 4] = buf
            .get(pos..pos + 4)
            .ok_or_else(|| StorageError::Corrupt("truncated text file".to_string()))?
            .try_into()
            .unwrap();
        pos += 4;
        let len = u32::from_le_bytes(len_bytes);
        if len == u32::MAX {
            out.push(None);
            continue;
        }
        let len = len as usize;
        let s = std::str::from_utf8(
            buf.get(pos..pos + len).ok_or_else(|| StorageError::Corrupt("truncated text file".to_string()))?,
        )
        .map_err(|e| StorageError::Corrupt(e.to_string()))?
        .to_string();
        pos += len;
        out.push(Some(s));
    }
    Ok(out)
}

pub fn data_frame_dir(project_root: &Path, name: &str) -> PathBuf {
    project_root.join("data_frames").join(name)
}

pub fn pipeline_dir(project_root: &Path, name: &str) -> PathBuf {
    project_root.join("pipelines").join(name)
}

/// Writes `df` to `<project_root>/data_frames/<df.name()>/`.
pub fn save_data_frame(project_root: &Path, df: &Df) -> StorageResult<()> {
    let dir = data_frame_dir(project_root, df.name());
    fs::create_dir_all(&dir)?;

    let mut columns = Vec::new();

    for name in df.join_key_names() {
        let col = df.join_key(name).expect("name from join_key_names");
        push_cat(&dir, "join_key", name, col, &mut columns)?;
    }
    for name in df.categorical_names() {
        let col = df.categorical(name).expect("name from categorical_names");
        push_cat(&dir, "categorical", name, col, &mut columns)?;
    }
    for name in df.numerical_names() {
        let col = df.numerical(name).expect("name from numerical_names");
        push_num(&dir, "numerical", name, col, &mut columns)?;
    }
    for name in df.target_names() {
        let col = df.target(name).expect("name from target_names");
        push_num(&dir, "target", name, col, &mut columns)?;
    }
    for name in df.text_names() {
        let col = df.text(name).expect("name from text_names");
        let file = format!("{name}.txt");
        let values: Vec<Option<String>> = (0..col.len()).map(|i| col.get(i).map(str::to_string)).collect();
        let crc32 = write_text_file(&dir.join(&file), &values)?;
        columns.push(ColumnEntry {
            name: name.to_string(),
            role: "text".to_string(),
            kind: "text".to_string(),
            unit: None,
            subroles: Vec::new(),
            file,
            len: col.len(),
            crc32,
        });
    }

    let manifest = FrameManifest { name: df.name().to_string(), nrows: df.nrows(), columns };
    fs::write(dir.join("manifest.json"), serde_json::to_vec_pretty(&manifest).map_err(StorageError::from)?)?;
    Ok(())
}

fn push_cat(
    dir: &Path,
    role: &str,
    name: &str,
    col: &CatCol,
    columns: &mut Vec<ColumnEntry>,
) -> StorageResult<()> {
    let file = format!("{name}.bin");
    let crc32 = write_le_i32(&dir.join(&file), col.as_slice())?;
    columns.push(ColumnEntry {
        name: name.to_string(),
        role: role.to_string(),
        kind: "i32".to_string(),
        unit: None,
        subroles: col.subroles().iter().copied().map(subrole_to_str).map(str::to_string).collect(),
        file,
        len: col.len(),
        crc32,
    });
    Ok(())
}

fn push_num(
    dir: &Path,
    role: &str,
    name: &str,
    col: &NumCol,
    columns: &mut Vec<ColumnEntry>,
) -> StorageResult<()> {
    let file = format!("{name}.bin");
    let crc32 = write_le_f64(&dir.join(&file), col.as_slice())?;
    columns.push(ColumnEntry {
        name: name.to_string(),
        role: role.to_string(),
        kind: "f64".to_string(),
        unit: col.unit().map(str::to_string),
        subroles: col.subroles().iter().copied().map(subrole_to_str).map(str::to_string).collect(),
        file,
        len: col.len(),
        crc32,
    });
    Ok(())
}

/// Loads a frame previously written by [`save_data_frame`].
pub fn load_data_frame(
    project_root: &Path,
    name: &str,
    cat_encoding: Arc<Enc>,
    jk_encoding: Arc<Enc>,
) -> StorageResult<Df> {
    let dir = data_frame_dir(project_root, name);
    let manifest_bytes = fs::read(dir.join("manifest.json"))?;
    let manifest: FrameManifest = serde_json::from_slice(&manifest_bytes).map_err(StorageError::from)?;

    let mut df = Df::new(manifest.name, manifest.nrows).with_encodings(cat_encoding, jk_encoding);
    for entry in &manifest.columns {
        let path = dir.join(&entry.file);
        match entry.kind.as_str() {
            "f64" => {
                let values = read_le_f64(&path, entry.len, entry.crc32)?;
                let mut col = NumCol::from_vec(entry.name.clone(), values);
                if let Some(u) = &entry.unit {
                    col = col.with_unit(u.clone());
                }
                for s in entry.subroles.iter().filter_map(|s| subrole_from_str(s)) {
                    col = col.with_subrole(s);
                }
                match entry.role.as_str() {
                    "target" => df.add_target(col),
                    _ => df.add_numerical(col),
                }
                .map_err(|e| StorageError::Validation(e.to_string()))?;
            }
            "i32" => {
                let values = read_le_i32(&path, entry.len, entry.crc32)?;
                let mut col = CatCol::from_vec(entry.name.clone(), values);
                for s in entry.subroles.iter().filter_map(|s| subrole_from_str(s)) {
                    col = col.with_subrole(s);
                }
                match entry.role.as_str() {
                    "join_key" => df.add_join_key(col),
                    _ => df.add_categorical(col),
                }
                .map_err(|e| StorageError::Validation(e.to_string()))?;
            }
            "text" => {
                let values = read_text_file(&path, entry.crc32)?;
                df.add_text(TextCol::from_vec(entry.name.clone(), values))
                    .map_err(|e| StorageError::Validation(e.to_string()))?;
            }
            other => return Err(StorageError::Corrupt(format!("unknown column kind '{other}'"))),
        }
    }
    Ok(df)
}

#[derive(Debug, Serialize, Deserialize)]
struct PipelineManifest {
    pipeline: serde_json::Value,
    trees: Vec<String>,
}

/// Writes `pipeline` to `<project_root>/pipelines/<name>/`: the whole
/// fitted state as `manifest.json`, plus one `trees/<k>.json` file per
/// boosted tree for standalone inspection.
pub fn save_pipeline(project_root: &Path, name: &str, pipeline: &Pipeline) -> StorageResult<()> {
    let dir = pipeline_dir(project_root, name);
    fs::create_dir_all(dir.join("trees"))?;

    let pipeline_json = serde_json::to_value(pipeline).map_err(StorageError::from)?;
    let mut tree_files = Vec::new();
    if let Some(ensemble) = pipeline_ensemble(&pipeline_json) {
        if let Some(trees) = ensemble.get("trees").and_then(|t| t.as_array()) {
            for (i, tree) in trees.iter().enumerate() {
                let file = format!("{i}.json");
                fs::write(dir.join("trees").join(&file), serde_json::to_vec_pretty(tree).map_err(StorageError::from)?)?;
                tree_files.push(file);
            }
        }
    }

    let manifest = PipelineManifest { pipeline: pipeline_json, trees: tree_files };
    fs::write(dir.join("manifest.json"), serde_json::to_vec_pretty(&manifest).map_err(StorageError::from)?)?;
    Ok(())
}

fn pipeline_ensemble(pipeline_json: &serde_json::Value) -> Option<&serde_json::Value> {
    pipeline_json.get("ensemble").and_then(|e| if e.is_null() { None } else { Some(e) })
}

pub fn load_pipeline(project_root: &Path, name: &str) -> StorageResult<Pipeline> {
    let dir = pipeline_dir(project_root, name);
    let manifest_bytes = fs::read(dir.join("manifest.json"))?;
    let manifest: PipelineManifest = serde_json::from_slice(&manifest_bytes).map_err(StorageError::from)?;
    serde_json::from_value(manifest.pipeline).map_err(StorageError::from)
}

/// Writes the project's shared categorical/join-key dictionaries to
/// `<project_root>/encodings/{categorical,join_key}.bin` using
/// [`Enc::write_to`]'s length-prefixed string-file format.
pub fn save_encodings(project_root: &Path, cat_encoding: &Enc, jk_encoding: &Enc) -> StorageResult<()> {
    let dir = project_root.join("encodings");
    fs::create_dir_all(&dir)?;
    cat_encoding.write_to(File::create(dir.join("categorical.bin"))?)?;
    jk_encoding.write_to(File::create(dir.join("join_key.bin"))?)?;
    Ok(())
}

pub fn load_encodings(project_root: &Path) -> StorageResult<(Enc, Enc)> {
    let dir = project_root.join("encodings");
    let cat = Enc::read_from(File::open(dir.join("categorical.bin"))?)?;
    let jk = Enc::read_from(File::open(dir.join("join_key.bin"))?)?;
    Ok((cat, jk))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn round_trips_a_frame_with_every_role() {
        let mut df = Df::new("pop", 2);
        df.add_join_key(CatCol::from_vec("jk", vec![0, 1])).unwrap();
        df.add_numerical(NumCol::from_vec("amount", vec![1.5, f64::NAN])).unwrap();
        df.add_target(NumCol::from_vec("y", vec![0.0, 1.0])).unwrap();

        let dir = tempdir().unwrap();
        save_data_frame(dir.path(), &df).unwrap();
        let back = load_data_frame(dir.path(), "pop", Arc::new(Enc::new()), Arc::new(Enc::new())).unwrap();

        assert_eq!(back.nrows(), 2);
        assert_eq!(back.join_key("jk").unwrap().as_slice(), &[0, 1]);
        assert!(back.numerical("amount").unwrap().get(1).unwrap().is_nan());
        assert_eq!(back.target("y").unwrap().as_slice(), &[0.0, 1.0]);
    }

    #[test]
    fn detects_checksum_corruption() {
        let mut df = Df::new("pop", 2);
        df.add_numerical(NumCol::from_vec("x", vec![1.0, 2.0])).unwrap();
        let dir = tempdir().unwrap();
        save_data_frame(dir.path(), &df).unwrap();
        fs::write(data_frame_dir(dir.path(), "pop").join("x.bin"), [0u8; 16]).unwrap();
        assert!(load_data_frame(dir.path(), "pop", Arc::new(Enc::new()), Arc::new(Enc::new())).is_err());
    }

    #[test]
    fn round_trips_encodings() {
        let cat = Enc::new();
        cat.intern("a");
        cat.intern("b");
        let jk = Enc::new();
        jk.intern("k1");

        let dir = tempdir().unwrap();
        save_encodings(dir.path(), &cat, &jk).unwrap();
        let (cat2, jk2) = load_encodings(dir.path()).unwrap();
        assert_eq!(cat2.decode(0), Some("a".to_string()));
        assert_eq!(jk2.decode(0), Some("k1".to_string()));
    }
}
