//! Project registry (spec §6 `Project.{delete,list_projects,list_data_frames,
//! list_pipelines}`) — the container named in §5 "Shared resources": "the
//! global read/write lock guards the project's `{frames, models,
//! encodings}` maps."
//!
//! Grounded on `storage_engine/mod.rs`'s multi-entity-registry-behind-a-lock
//! shape, re-keyed from a multi-database Datalog store to a single
//! project's `{frames, pipelines}` plus the two shared encodings every
//! frame in the project draws from (spec §4.1: categorical and join-key
//! dictionaries are shared by reference, not per-frame).

use crate::encoding::Enc;
use crate::error::{EngineError, EngineResult};
use crate::frame::Df;
use crate::pipeline::Pipeline;
use crate::storage::model_io;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A project: a named directory under the configured project root holding
/// fitted data frames and pipelines, all sharing one pair of encodings.
pub struct Project {
    name: String,
    root_dir: PathBuf,
    frames: RwLock<HashMap<String, Arc<Df>>>,
    pipelines: RwLock<HashMap<String, Arc<Pipeline>>>,
    cat_encoding: Arc<Enc>,
    jk_encoding: Arc<Enc>,
}

impl Project {
    /// Path this project would live at under `projects_root`.
    fn dir_for(projects_root: &Path, name: &str) -> PathBuf {
        projects_root.join(name)
    }

    /// Creates a fresh, empty project directory (spec §6 "Environment:
    /// honors a configured project root directory").
    pub fn create(projects_root: &Path, name: impl Into<String>) -> EngineResult<Project> {
        let name = name.into();
        let dir = Self::dir_for(projects_root, &name);
        if dir.exists() {
            return Err(EngineError::validation(format!("project '{name}' already exists")));
        }
        std::fs::create_dir_all(&dir)?;
        Ok(Project {
            name,
            root_dir: dir,
            frames: RwLock::new(HashMap::new()),
            pipelines: RwLock::new(HashMap::new()),
            cat_encoding: Arc::new(Enc::new()),
            jk_encoding: Arc::new(Enc::new()),
        })
    }

    /// Opens a previously saved project, reloading its encodings and every
    /// persisted frame/pipeline found under its directory.
    pub fn open(projects_root: &Path, name: impl Into<String>) -> EngineResult<Project> {
        let name = name.into();
        let dir = Self::dir_for(projects_root, &name);
        if !dir.exists() {
            return Err(EngineError::validation(format!("project '{name}' does not exist")));
        }

        let (cat_encoding, jk_encoding) = if dir.join("encodings").exists() {
            let (cat, jk) = model_io::load_encodings(&dir)?;
            (Arc::new(cat), Arc::new(jk))
        } else {
            (Arc::new(Enc::new()), Arc::new(Enc::new()))
        };

        let mut frames = HashMap::new();
        let frames_dir = dir.join("data_frames");
        if frames_dir.exists() {
            for entry in std::fs::read_dir(&frames_dir)? {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                let frame_name = entry.file_name().to_string_lossy().to_string();
                let df = model_io::load_data_frame(&dir, &frame_name, cat_encoding.clone(), jk_encoding.clone())?;
                frames.insert(frame_name, Arc::new(df));
            }
        }

        let mut pipelines = HashMap::new();
        let pipelines_dir = dir.join("pipelines");
        if pipelines_dir.exists() {
            for entry in std::fs::read_dir(&pipelines_dir)? {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                let pipeline_name = entry.file_name().to_string_lossy().to_string();
                let pipeline = model_io::load_pipeline(&dir, &pipeline_name)?;
                pipelines.insert(pipeline_name, Arc::new(pipeline));
            }
        }

        Ok(Project {
            name,
            root_dir: dir,
            frames: RwLock::new(frames),
            pipelines: RwLock::new(pipelines),
            cat_encoding,
            jk_encoding,
        })
    }

    /// Opens the project if it exists, else creates it — the default
    /// project's lazy-creation behavior at server startup.
    pub fn open_or_create(projects_root: &Path, name: impl Into<String>) -> EngineResult<Project> {
        let name = name.into();
        if Self::dir_for(projects_root, &name).exists() {
            Project::open(projects_root, name)
        } else {
            Project::create(projects_root, name)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cat_encoding(&self) -> Arc<Enc> {
        self.cat_encoding.clone()
    }

    pub fn jk_encoding(&self) -> Arc<Enc> {
        self.jk_encoding.clone()
    }

    /// `Project.list_projects`: every subdirectory of `projects_root`.
    pub fn list_projects(projects_root: &Path) -> EngineResult<Vec<String>> {
        if !projects_root.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in std::fs::read_dir(projects_root)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// `Project.list_data_frames`.
    pub fn list_data_frames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.frames.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// `Project.list_pipelines`.
    pub fn list_pipelines(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pipelines.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn data_frame(&self, name: &str) -> EngineResult<Arc<Df>> {
        self.frames
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::validation(format!("no data frame '{name}' in project '{}'", self.name)))
    }

    pub fn pipeline(&self, name: &str) -> EngineResult<Arc<Pipeline>> {
        self.pipelines
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::validation(format!("no pipeline '{name}' in project '{}'", self.name)))
    }

    /// Publishes `df` under its own name, replacing any frame previously
    /// published under that name (spec §5: "mutation = replace-with-new-
    /// value under the lock").
    pub fn put_data_frame(&self, df: Df) -> Arc<Df> {
        let df = Arc::new(df);
        self.frames.write().insert(df.name().to_string(), df.clone());
        df
    }

    pub fn put_pipeline(&self, name: impl Into<String>, pipeline: Pipeline) -> Arc<Pipeline> {
        let pipeline = Arc::new(pipeline);
        self.pipelines.write().insert(name.into(), pipeline.clone());
        pipeline
    }

    /// Persists every frame and pipeline currently published, plus the
    /// shared encodings, under this project's directory.
    pub fn save_all(&self) -> EngineResult<()> {
        model_io::save_encodings(&self.root_dir, &self.cat_encoding, &self.jk_encoding)?;
        for df in self.frames.read().values() {
            model_io::save_data_frame(&self.root_dir, df)?;
        }
        for (name, pipeline) in self.pipelines.read().iter() {
            model_io::save_pipeline(&self.root_dir, name, pipeline)?;
        }
        Ok(())
    }

    pub fn save_data_frame(&self, name: &str) -> EngineResult<()> {
        let df = self.data_frame(name)?;
        model_io::save_data_frame(&self.root_dir, &df)?;
        Ok(())
    }

    pub fn save_pipeline(&self, name: &str) -> EngineResult<()> {
        let pipeline = self.pipeline(name)?;
        model_io::save_pipeline(&self.root_dir, name, &pipeline)?;
        Ok(())
    }

    /// `Project.delete`: removes this project's entire directory tree.
    /// Consumes `self` since every in-memory frame/pipeline it held is
    /// gone once the backing directory is gone.
    pub fn delete(self) -> EngineResult<()> {
        std::fs::remove_dir_all(&self.root_dir)?;
        Ok(())
    }
}
