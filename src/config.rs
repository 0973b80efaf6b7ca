//! Engine configuration loaded from `transforma.toml`.
//!
//! The [`EngineConfig`] struct holds every tunable of the job engine.
//! Keys missing from the file fall back to defaults, and a missing file
//! means all defaults. `TRANSFORMA_JOBS_DIR` takes precedence over the file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const CONFIG_FILE: &str = "transforma.toml";
pub const JOBS_DIR_ENV: &str = "TRANSFORMA_JOBS_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Root directory holding one working directory per job.
    #[serde(default = "default_jobs_dir")]
    pub jobs_dir: PathBuf,

    /// Simulation command line, run inside the job's working directory.
    #[serde(default = "default_command")]
    pub command: Vec<String>,

    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_jobs_dir() -> PathBuf {
    PathBuf::from("simulation_files")
}

fn default_command() -> Vec<String> {
    vec!["sleep".to_string(), "3".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            jobs_dir: default_jobs_dir(),
            command: default_command(),
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Load `transforma.toml` from the current directory, then apply the
    /// environment override.
    pub fn load() -> Result<Self> {
        let config = Self::from_path(Path::new(CONFIG_FILE))?;
        Ok(config.with_jobs_dir_override(std::env::var(JOBS_DIR_ENV).ok()))
    }

    /// Read a config file, or return defaults if it does not exist.
    pub fn from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config: EngineConfig = toml::from_str(&contents)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        if config.command.is_empty() {
            anyhow::bail!("{}: `command` must not be empty", path.display());
        }
        Ok(config)
    }

    /// Replace `jobs_dir` when a non-empty override is given.
    pub fn with_jobs_dir_override(mut self, jobs_dir: Option<String>) -> Self {
        if let Some(dir) = jobs_dir
            && !dir.is_empty()
        {
            self.jobs_dir = PathBuf::from(dir);
        }
        self
    }
}
