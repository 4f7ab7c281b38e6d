use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, instrument};

use crate::model::FileReport;
use crate::survey::sampler::Sampler;
use crate::survey::summarizer::Summarizer;
use crate::survey::traits::{AssayError, SurveyStage};
use crate::traits::{LogParser, ParseError};

/// Why a single input file produced no report.
#[derive(Error, Debug)]
pub enum FileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse failed: {0}")]
    Parse(#[from] ParseError),
    #[error("Assay failed: {0}")]
    Assay(#[from] AssayError),
    #[error("Timed out after {limit:?}")]
    Timeout { limit: Duration },
    #[error("Task failed: {0}")]
    Task(String),
}

/// Report for one file plus the bookkeeping the run statistics need.
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub report: FileReport,
    pub skipped_entries: usize,
}

/// Runs parser → sampler → summarizer for one file at a time, bounded by a
/// semaphore so a whole directory can be fanned out at once.
pub struct SurveyExecutor<P> {
    semaphore: Arc<Semaphore>,
    parser: Arc<P>,
    sampler: Sampler,
    summarizer: Summarizer,
}

impl<P> SurveyExecutor<P>
where
    P: LogParser + 'static,
{
    /// Sampler and summarizer share `step`, so the summarizer always finds the
    /// last key the sampler produced.
    pub fn new(parser: Arc<P>, concurrency_limit: usize, step: u64) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(concurrency_limit)),
            parser,
            sampler: Sampler::new(step),
            summarizer: Summarizer::new(step),
        }
    }

    /// Waits for a free processing slot. The slot is held until the permit drops.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, FileError> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|e| FileError::Task(format!("Semaphore error: {}", e)))
    }

    pub async fn execute(&self, path: PathBuf) -> Result<ProcessedFile, FileError> {
        let _permit = self.acquire().await?;
        self.process(path).await
    }

    /// Runs one file without taking a slot; callers pair it with [`acquire`](Self::acquire).
    #[instrument(skip(self, path), fields(file = %path.display()))]
    pub async fn process(&self, path: PathBuf) -> Result<ProcessedFile, FileError> {
        info!("Computing file with format: {}", self.parser.format_id());

        let content = tokio::fs::read(&path).await?;
        let log = self.parser.parse(&content).await?;

        let trace = self
            .sampler
            .execute(log.entries.as_slice())
            .unwrap_or_else(|never| match never {});
        debug!(stage = self.sampler.stage_name(), samples = trace.samples.len(), "Stage completed");

        let assay = self.summarizer.execute((&log.header, &trace.samples))?;
        debug!(stage = self.summarizer.stage_name(), stretch = %assay.name, "Stage completed");

        info!(
            entries = log.entries.len(),
            samples = trace.samples.len(),
            geopositions = trace.geopositions.len(),
            "Finished file"
        );

        Ok(ProcessedFile {
            report: FileReport {
                assay,
                samples: trace.samples,
                geopositions: trace.geopositions,
            },
            skipped_entries: log.skipped_entries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GeoPosition, HeaderRecord, RawEntry, SurveyLog};
    use async_trait::async_trait;

    /// Ignores the file content and returns a fixed log.
    struct FixedParser {
        log: SurveyLog,
    }

    #[async_trait]
    impl LogParser for FixedParser {
        fn format_id(&self) -> &str {
            "fixed"
        }

        async fn parse(&self, _content: &[u8]) -> Result<SurveyLog, ParseError> {
            Ok(self.log.clone())
        }
    }

    fn temp_file(tag: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "executor_{}_{}_{}.xml",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .subsec_nanos()
        ));
        std::fs::write(&path, b"<ignored/>").unwrap();
        path
    }

    fn log_with(odometers: &[f64]) -> SurveyLog {
        SurveyLog {
            header: HeaderRecord {
                stretch_name: "BR-116".to_string(),
                ..HeaderRecord::default()
            },
            entries: odometers
                .iter()
                .map(|&odometer| RawEntry {
                    odometer,
                    timestamp: "2023-05-10T08:00:00".to_string(),
                    position: GeoPosition { lat: 1.0, long: 2.0 },
                    temperature: 20.0,
                    altitude: 10.0,
                })
                .collect(),
            skipped_entries: 3,
        }
    }

    #[tokio::test]
    async fn test_executor_produces_report() {
        let parser = Arc::new(FixedParser {
            log: log_with(&[0.0, 5.0, 10.0]),
        });
        let executor = SurveyExecutor::new(parser, 2, 5);
        let path = temp_file("ok");

        let processed = executor.execute(path.clone()).await.unwrap();
        assert_eq!(processed.report.samples.len(), 3);
        assert_eq!(processed.report.geopositions.len(), 1);
        assert_eq!(processed.report.assay.name, "BR-116");
        assert_eq!(processed.skipped_entries, 3);

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_executor_reports_empty_trace() {
        let parser = Arc::new(FixedParser {
            log: log_with(&[1.0, 2.0]),
        });
        let executor = SurveyExecutor::new(parser, 1, 5);
        let path = temp_file("empty");

        let result = executor.execute(path.clone()).await;
        assert!(matches!(result, Err(FileError::Assay(AssayError::EmptyInput))));

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_executor_reports_unreadable_file() {
        let parser = Arc::new(FixedParser {
            log: log_with(&[0.0]),
        });
        let executor = SurveyExecutor::new(parser, 1, 5);

        let result = executor
            .execute(PathBuf::from("/nonexistent/survey/file.xml"))
            .await;
        assert!(matches!(result, Err(FileError::Io(_))));
    }
}
