//! Data directory layout and `config.yaml`.
//!
//! Directory structure:
//! ~/.sweeplab/
//!   config.yaml          # Runner delays, formula set
//!   sweeplab.log         # Diagnostics
//!   runs/
//!     2026-10-18_14-03-59/
//!       log.txt
//!       results.csv

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sweeplab_core::formula::FormulaKind;
use sweeplab_core::runner::RunnerConfig;
use sweeplab_core::store::RunsDirectory;

const CONFIG_FILE: &str = "config.yaml";
const RUNS_DIR: &str = "runs";

/// Configuration stored in config.yaml
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Pause after each computed value, in milliseconds
    pub step_delay_ms: u64,
    /// Pause between series, in milliseconds
    pub series_delay_ms: u64,
    pub formula: FormulaKind,
}

impl Default for AppConfig {
    fn default() -> Self {
        let runner = RunnerConfig::default();
        Self {
            step_delay_ms: runner.step_delay.as_millis() as u64,
            series_delay_ms: runner.series_delay.as_millis() as u64,
            formula: FormulaKind::default(),
        }
    }
}

impl AppConfig {
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            step_delay: Duration::from_millis(self.step_delay_ms),
            series_delay: Duration::from_millis(self.series_delay_ms),
        }
    }
}

/// Error types for configuration loading
#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "IO error: {msg}"),
            ConfigError::Parse(msg) => write!(f, "Parse error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// The data directory holding configuration, diagnostics and runs
#[derive(Debug, Clone)]
pub struct DataDirectory {
    root: PathBuf,
}

impl DataDirectory {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Get the default data directory path (~/.sweeplab/)
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sweeplab")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn runs(&self) -> RunsDirectory {
        RunsDirectory::new(self.root.join(RUNS_DIR))
    }

    /// Load config.yaml, falling back to defaults when it doesn't exist.
    pub fn load_config(&self) -> Result<AppConfig, ConfigError> {
        let config_path = self.config_path();
        if !config_path.exists() {
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|e| ConfigError::Io(format!("Failed to read config: {e}")))?;

        serde_saphyr::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse config: {e}")))
    }
}
