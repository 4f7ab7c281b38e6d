//! Top-level run commands shared by the binary and the integration tests.

use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::harvest::{HarvestError, HarvestStats, Harvester};
use crate::output::{write_outputs, OutputError, OutputSummary};
use crate::survey::{AssayPipeline, AssayRun, DadosTrechoParser, PipelineError};

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Harvest failed: {0}")]
    Harvest(#[from] HarvestError),
    #[error("Assay failed: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("Writing outputs failed: {0}")]
    Output(#[from] OutputError),
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Copies the survey logs under `source` into the configured staging directory.
pub async fn harvest(config: &Config, source: &Path) -> Result<HarvestStats, RunError> {
    let harvester = Harvester::new(config.extension.clone());
    let source = source.to_path_buf();
    let staging = config.staging_dir.clone();

    let stats =
        tokio::task::spawn_blocking(move || harvester.harvest(&source, &staging)).await??;
    Ok(stats)
}

/// Processes the staging directory and writes every CSV output.
pub async fn assay(config: &Config) -> Result<(AssayRun, OutputSummary), RunError> {
    config.validate()?;

    let pipeline = AssayPipeline::new(Arc::new(DadosTrechoParser::new()))
        .with_step(config.step)
        .with_concurrency(config.concurrency)
        .with_timeout(config.file_timeout())
        .with_strict(config.strict)
        .with_extension(config.extension.clone());

    let run = pipeline.execute(&config.staging_dir).await?;

    let output_dir = config.output_dir.clone();
    let batch = run.batch.clone();
    let summary = tokio::task::spawn_blocking(move || write_outputs(&batch, &output_dir)).await??;

    Ok((run, summary))
}
