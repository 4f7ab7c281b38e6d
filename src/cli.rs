//! Command-line interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Config, ConfigError};

/// CLI arguments for the survey assay tool.
#[derive(Debug, Parser)]
#[command(name = "trecho-assay")]
#[command(about = "Harvest road-survey XML logs and export geoposition and assay CSVs")]
pub struct CliArgs {
    /// JSON config file; flags given here override its values.
    #[arg(long, global = true, env = "TRECHO_ASSAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Flat directory holding the harvested logs.
    #[arg(long, global = true)]
    pub staging_dir: Option<PathBuf>,

    /// Directory receiving the CSV outputs.
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,

    /// Extension of survey logs, without the dot.
    #[arg(long, global = true)]
    pub extension: Option<String>,

    /// Sampling step in meters.
    #[arg(long, global = true)]
    pub step: Option<u64>,

    /// Maximum number of files processed at once.
    #[arg(long, global = true)]
    pub concurrency: Option<usize>,

    /// Abort on the first file that fails.
    #[arg(long, global = true)]
    pub strict: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Copy survey logs found under SOURCE into the staging directory.
    Harvest {
        source: PathBuf,
    },
    /// Process the staging directory and write the CSV outputs.
    Assay,
    /// Harvest SOURCE, then run the assay.
    Run {
        source: PathBuf,
    },
}

impl CliArgs {
    /// Resolve defaults, the config file, and flags into one validated config.
    pub fn to_config(&self) -> Result<Config, ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(dir) = &self.staging_dir {
            config.staging_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(extension) = &self.extension {
            config.extension = extension.clone();
        }
        if let Some(step) = self.step {
            config.step = step;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency;
        }
        config.strict |= self.strict;

        config.validate()?;
        Ok(config)
    }
}
