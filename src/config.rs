//! Configuration System
//!
//! Provides hierarchical configuration loading from:
//! - config.toml (default configuration)
//! - config.local.toml (git-ignored local overrides)
//! - Environment variables (RELFEAT_* prefix)
//!
//! ## Example
//!
//! ```toml
//! # config.toml
//! [project]
//! root_dir = "/var/lib/relfeat/projects"
//!
//! [performance]
//! num_threads = 0
//! tmp_dir = "/tmp/relfeat"
//! ```
//!
//! Environment variable overrides:
//! ```bash
//! RELFEAT_PROJECT__ROOT_DIR=/custom/path
//! RELFEAT_PERFORMANCE__NUM_THREADS=8
//! ```

use figment::{Figment, providers::{Env, Format, Toml}};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration struct (spec §6 "Environment").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub project: ProjectConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub protocol: ProtocolConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Project-root configuration: where data frames, pipelines, and encodings
/// are persisted per spec §6's "persisted model layout".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Base directory for all project storage.
    pub root_dir: PathBuf,

    /// Default project name (created on startup if missing).
    pub default_project: String,
}

/// Hardware and scratch-space tuning (spec §4.10/§5/§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Worker thread count for fit/transform. `0` means
    /// `max(2, hw_concurrency - 2)`, resolved by `coordinator::thread_count`.
    #[serde(default)]
    pub num_threads: usize,

    /// Directory for memory-mapped scratch columns (spec §4.1 "backed by
    /// heap or memory-mapped file").
    #[serde(default = "default_tmp_dir")]
    pub tmp_dir: PathBuf,
}

fn default_tmp_dir() -> PathBuf {
    std::env::temp_dir().join("relfeat")
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        PerformanceConfig { num_threads: 0, tmp_dir: default_tmp_dir() }
    }
}

/// Request-layer configuration (spec §6 "Request protocol").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Bind address; spec requires localhost only.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Maximum number of concurrently handled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

fn default_bind_addr() -> String {
    "127.0.0.1:5439".to_string()
}

fn default_max_connections() -> usize {
    64
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        ProtocolConfig { bind_addr: default_bind_addr(), max_connections: default_max_connections() }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig { level: default_log_level(), format: default_log_format() }
    }
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// Merges in order:
    /// 1. config.toml (base configuration)
    /// 2. config.local.toml (local overrides, git-ignored)
    /// 3. Environment variables (RELFEAT_* prefix)
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file("config.toml"))
            .merge(Toml::file("config.local.toml"))
            .merge(Env::prefixed("RELFEAT_").split("__"))
            .extract()
    }

    /// Load configuration from a specific file path.
    pub fn from_file(path: &str) -> Result<Self, figment::Error> {
        Figment::new().merge(Toml::file(path)).merge(Env::prefixed("RELFEAT_").split("__")).extract()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            project: ProjectConfig { root_dir: PathBuf::from("./projects"), default_project: "default".to_string() },
            performance: PerformanceConfig::default(),
            protocol: ProtocolConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_roots() {
        let config = Config::default();
        assert_eq!(config.project.default_project, "default");
        assert_eq!(config.project.root_dir, PathBuf::from("./projects"));
        assert_eq!(config.performance.num_threads, 0);
        assert_eq!(config.protocol.bind_addr, "127.0.0.1:5439");
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        assert!(toml_str.contains("[project]"));
        assert!(toml_str.contains("[performance]"));
        assert!(toml_str.contains("[protocol]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.project.default_project, config.project.default_project);
    }
}
