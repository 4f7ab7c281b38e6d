//! Run configuration.
//!
//! Values come from three layers: built-in defaults, an optional JSON file,
//! and command-line flags (see [`crate::cli`]), each overriding the previous.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::survey::sampler::DEFAULT_STEP;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Options controlling harvest and assay runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Flat directory the harvester copies into and the assay reads from.
    pub staging_dir: PathBuf,

    /// Directory receiving `assay.csv` and the geoposition traces.
    pub output_dir: PathBuf,

    /// Extension of survey logs, without the dot.
    pub extension: String,

    /// Sampling step in meters.
    pub step: u64,

    /// Maximum number of files processed at once.
    pub concurrency: usize,

    /// Abort the run on the first failed file.
    pub strict: bool,

    /// Per-file processing limit in seconds.
    pub file_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            staging_dir: PathBuf::from("public/files"),
            output_dir: PathBuf::from("public/outputs"),
            extension: "xml".to_string(),
            step: DEFAULT_STEP,
            concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            strict: false,
            file_timeout_secs: 300,
        }
    }
}

impl Config {
    /// Loads a JSON config file; missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.step == 0 {
            return Err(ConfigError::Invalid("step must be positive".to_string()));
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "concurrency must be positive".to_string(),
            ));
        }
        if self.extension.is_empty() || self.extension.starts_with('.') {
            return Err(ConfigError::Invalid(format!(
                "extension must be a bare suffix like \"xml\", got {:?}",
                self.extension
            )));
        }
        Ok(())
    }

    pub fn file_timeout(&self) -> Duration {
        Duration::from_secs(self.file_timeout_secs)
    }
}
