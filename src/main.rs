use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use trecho_assay::cli::{CliArgs, Command};
use trecho_assay::runner::{self, RunError};

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = CliArgs::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Run failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: CliArgs) -> Result<(), RunError> {
    let config = args.to_config()?;

    match &args.command {
        Command::Harvest { source } => {
            runner::harvest(&config, source).await?;
        }
        Command::Assay => assay(&config).await?,
        Command::Run { source } => {
            runner::harvest(&config, source).await?;
            assay(&config).await?;
        }
    }
    Ok(())
}

async fn assay(config: &trecho_assay::Config) -> Result<(), RunError> {
    let (run, summary) = runner::assay(config).await?;

    for failure in &run.batch.failures {
        warn!(code = %failure.code, reason = %failure.reason, "File skipped");
    }
    info!(
        stretches = run.batch.len(),
        failed = run.stats.files_failed,
        assay = %summary.assay_file.display(),
        "Done"
    );
    Ok(())
}
