//! Batch assay pipeline.
//!
//! This module provides the [`AssayPipeline`] coordinator that runs every
//! staged survey file through the [`SurveyExecutor`] with:
//! - Concurrent per-file tasks via `tokio`, bounded by the executor semaphore
//! - A per-file timeout
//! - Structured logging via `tracing`
//! - Failure isolation: a bad file is logged and skipped unless strict mode is on

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::executor::{FileError, ProcessedFile, SurveyExecutor};
use crate::harvest::collector::matches_extension;
use crate::model::{AssayBatch, FileFailure};
use crate::survey::sampler::DEFAULT_STEP;
use crate::traits::LogParser;

// ============================================================================
// Pipeline Types
// ============================================================================

/// Complete run result: the accumulated reports and statistics.
#[derive(Debug)]
pub struct AssayRun {
    /// Reports keyed by file code, in file order
    pub batch: AssayBatch,

    /// Processing statistics
    pub stats: RunStats,
}

/// Statistics about one pipeline run.
#[derive(Debug, Default, Clone)]
pub struct RunStats {
    /// Total time spent on the run (milliseconds)
    pub total_duration_ms: u64,

    /// Input files found in the staging directory
    pub files_seen: usize,

    /// Files that produced a report
    pub files_processed: usize,

    /// Files that failed and were skipped
    pub files_failed: usize,

    /// Samples selected across all processed files
    pub samples_total: usize,

    /// Log entries dropped while parsing processed files
    pub entries_skipped: usize,
}

// ============================================================================
// Pipeline Errors
// ============================================================================

/// Errors that abort a whole run.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    /// The staging directory could not be listed
    #[error("Cannot read input directory '{}': {source}", path.display())]
    InputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A file failed while strict mode was enabled
    #[error("File '{code}' failed: {source}")]
    FileFailed {
        code: String,
        #[source]
        source: FileError,
    },

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ============================================================================
// Pipeline Executor
// ============================================================================

/// Batch driver over a flat directory of survey logs.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use trecho_assay::survey::{AssayPipeline, DadosTrechoParser};
///
/// let pipeline = AssayPipeline::new(Arc::new(DadosTrechoParser::new()))
///     .with_concurrency(4)
///     .with_strict(false);
/// let run = pipeline.execute(Path::new("public/files")).await?;
/// println!("{} stretches", run.batch.len());
/// ```
pub struct AssayPipeline<P>
where
    P: LogParser + 'static,
{
    parser: Arc<P>,

    /// Spacing between samples, shared by sampler and summarizer
    step: u64,

    /// Maximum number of files processed at once
    concurrency: usize,

    /// Timeout for each file once it holds a slot (default: 5 minutes)
    file_timeout: Duration,

    /// Abort on the first failed file instead of skipping it
    strict: bool,

    /// Extension of the files to process, without the dot
    extension: String,
}

impl<P> AssayPipeline<P>
where
    P: LogParser + 'static,
{
    /// Creates a new pipeline for the given parser.
    ///
    /// Default configuration:
    /// - Step: 5 m
    /// - Concurrency: available parallelism
    /// - Timeout: 5 minutes per file
    /// - Strict: disabled
    /// - Extension: `xml`
    pub fn new(parser: Arc<P>) -> Self {
        Self {
            parser,
            step: DEFAULT_STEP,
            concurrency: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            file_timeout: Duration::from_secs(300),
            strict: false,
            extension: "xml".to_string(),
        }
    }

    pub fn with_step(mut self, step: u64) -> Self {
        self.step = step;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.file_timeout = timeout;
        self
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Processes every matching file of `input_dir`.
    ///
    /// Files are taken in filename order and the batch keeps that order no
    /// matter which task finishes first.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if the directory cannot be listed, or if a
    /// file fails while strict mode is enabled.
    pub async fn execute(&self, input_dir: &Path) -> Result<AssayRun, PipelineError> {
        let start = std::time::Instant::now();
        let mut stats = RunStats::default();
        let mut batch = AssayBatch::new();

        let files = self.list_inputs(input_dir).await?;
        stats.files_seen = files.len();
        info!(
            dir = %input_dir.display(),
            files = files.len(),
            step = self.step,
            "Starting assay run"
        );

        let executor = Arc::new(SurveyExecutor::new(
            Arc::clone(&self.parser),
            self.concurrency,
            self.step,
        ));
        let limit = self.file_timeout;

        let mut handles = files
            .into_iter()
            .map(|path| {
                let code = file_code(&path);
                let executor = Arc::clone(&executor);
                let handle = tokio::spawn(async move {
                    let _permit = executor.acquire().await?;
                    match timeout(limit, executor.process(path)).await {
                        Ok(result) => result,
                        Err(_) => Err(FileError::Timeout { limit }),
                    }
                });
                (code, handle)
            })
            .collect::<Vec<_>>()
            .into_iter();

        while let Some((code, handle)) = handles.next() {
            let outcome: Result<ProcessedFile, FileError> = handle
                .await
                .map_err(|e| FileError::Task(e.to_string()))
                .and_then(|result| result);

            match outcome {
                Ok(processed) => {
                    stats.files_processed += 1;
                    stats.samples_total += processed.report.samples.len();
                    stats.entries_skipped += processed.skipped_entries;
                    batch.insert(code, processed.report);
                }
                Err(source) if self.strict => {
                    for (_, pending) in handles {
                        pending.abort();
                    }
                    return Err(PipelineError::FileFailed { code, source });
                }
                Err(e) => {
                    warn!(code = %code, error = %e, "Skipping file");
                    stats.files_failed += 1;
                    batch.failures.push(FileFailure {
                        code,
                        reason: e.to_string(),
                    });
                }
            }
        }

        stats.total_duration_ms = start.elapsed().as_millis() as u64;
        info!(
            processed = stats.files_processed,
            failed = stats.files_failed,
            samples = stats.samples_total,
            skipped_entries = stats.entries_skipped,
            duration_ms = stats.total_duration_ms,
            "Assay run completed"
        );

        Ok(AssayRun { batch, stats })
    }

    async fn list_inputs(&self, dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
        let mut reader = tokio::fs::read_dir(dir)
            .await
            .map_err(|source| PipelineError::InputDir {
                path: dir.to_path_buf(),
                source,
            })?;

        let mut files = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && matches_extension(&path, &self.extension) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// File code used to key outputs: the filename without its extension.
pub fn file_code(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SurveyLog;
    use crate::survey::formats::DadosTrechoParser;
    use crate::traits::ParseError;
    use async_trait::async_trait;

    /// Parses like [`DadosTrechoParser`] after a fixed delay.
    struct SlowParser {
        delay: Duration,
        inner: DadosTrechoParser,
    }

    #[async_trait]
    impl LogParser for SlowParser {
        fn format_id(&self) -> &str {
            "slow"
        }

        async fn parse(&self, content: &[u8]) -> Result<SurveyLog, ParseError> {
            tokio::time::sleep(self.delay).await;
            self.inner.parse(content).await
        }
    }

    fn slow_pipeline(delay: Duration) -> AssayPipeline<SlowParser> {
        AssayPipeline::new(Arc::new(SlowParser {
            delay,
            inner: DadosTrechoParser::new(),
        }))
    }

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "assay_pipeline_{}_{}_{}",
            tag,
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .subsec_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn survey_xml(name: &str, odometers: &[u32]) -> String {
        let logs: String = odometers
            .iter()
            .map(|o| {
                format!(
                    r#"<Log Hodometro="{o}" DataHora="2023-05-10T08:00:{:02}"><GPS X="-46.{o}" Y="-23.{o}"/><Barometro Temp="22" Altitude="700"/></Log>"#,
                    o % 60
                )
            })
            .collect();
        format!(
            "<DadosTrecho><Trecho><NomeTrecho>{name}</NomeTrecho><Placa>P</Placa><IRI>IRI</IRI><Operador>D</Operador></Trecho><Logs>{logs}</Logs></DadosTrecho>"
        )
    }

    fn pipeline() -> AssayPipeline<DadosTrechoParser> {
        AssayPipeline::new(Arc::new(DadosTrechoParser::new())).with_concurrency(2)
    }

    #[test]
    fn test_file_code_strips_extension() {
        assert_eq!(file_code(Path::new("/tmp/files/116BMG0010.xml")), "116BMG0010");
        assert_eq!(file_code(Path::new("plain")), "plain");
    }

    #[tokio::test]
    async fn test_pipeline_processes_in_file_order() {
        let dir = temp_dir("order");
        std::fs::write(dir.join("b.xml"), survey_xml("B", &[0, 5, 10])).unwrap();
        std::fs::write(dir.join("a.xml"), survey_xml("A", &[0, 5])).unwrap();
        std::fs::write(dir.join("notes.txt"), "not a survey").unwrap();

        let run = pipeline().execute(&dir).await.unwrap();

        let codes: Vec<&str> = run.batch.iter().map(|(c, _)| c).collect();
        assert_eq!(codes, vec!["a", "b"]);
        assert_eq!(run.stats.files_seen, 2);
        assert_eq!(run.stats.files_processed, 2);
        assert_eq!(run.stats.samples_total, 5);

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_pipeline_isolates_failures() {
        let dir = temp_dir("isolate");
        std::fs::write(dir.join("good.xml"), survey_xml("Good", &[0, 5])).unwrap();
        std::fs::write(dir.join("empty.xml"), survey_xml("Empty", &[3, 4])).unwrap();
        std::fs::write(dir.join("broken.xml"), "<DadosTrecho><Trecho/>").unwrap();

        let run = pipeline().execute(&dir).await.unwrap();

        assert_eq!(run.batch.len(), 1);
        assert!(run.batch.get("good").is_some());
        assert_eq!(run.stats.files_failed, 2);
        let failed: Vec<&str> = run.batch.failures.iter().map(|f| f.code.as_str()).collect();
        assert_eq!(failed, vec!["broken", "empty"]);

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_strict_mode_aborts_run() {
        let dir = temp_dir("strict");
        std::fs::write(dir.join("a.xml"), survey_xml("A", &[0, 5])).unwrap();
        std::fs::write(dir.join("b.xml"), "<Other/>").unwrap();

        let result = pipeline().with_strict(true).execute(&dir).await;
        match result {
            Err(PipelineError::FileFailed { code, .. }) => assert_eq!(code, "b"),
            other => panic!("expected strict failure, got {other:?}"),
        }

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_queued_files_do_not_time_out() {
        let dir = temp_dir("queued");
        for code in ["a", "b", "c", "d"] {
            std::fs::write(dir.join(format!("{code}.xml")), survey_xml(code, &[0, 5])).unwrap();
        }

        let run = slow_pipeline(Duration::from_millis(200))
            .with_concurrency(1)
            .with_timeout(Duration::from_millis(600))
            .execute(&dir)
            .await
            .unwrap();

        assert_eq!(run.stats.files_processed, 4);
        assert_eq!(run.stats.files_failed, 0);
        assert!(run.batch.failures.is_empty());

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_stuck_file_times_out() {
        let dir = temp_dir("stuck");
        std::fs::write(dir.join("slow.xml"), survey_xml("Slow", &[0, 5])).unwrap();

        let run = slow_pipeline(Duration::from_millis(500))
            .with_timeout(Duration::from_millis(100))
            .execute(&dir)
            .await
            .unwrap();

        assert_eq!(run.stats.files_failed, 1);
        assert!(run.batch.is_empty());
        assert_eq!(run.batch.failures[0].code, "slow");
        assert_eq!(run.batch.failures[0].reason, "Timed out after 100ms");

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn test_missing_input_dir() {
        let result = pipeline()
            .execute(Path::new("/nonexistent/assay/input"))
            .await;
        assert!(matches!(result, Err(PipelineError::InputDir { .. })));
    }

    #[tokio::test]
    async fn test_custom_step_flows_to_both_stages() {
        let dir = temp_dir("step");
        std::fs::write(dir.join("s.xml"), survey_xml("S", &[0, 5, 10, 15, 20])).unwrap();

        let run = pipeline().with_step(10).execute(&dir).await.unwrap();
        let report = run.batch.get("s").unwrap();

        assert_eq!(report.samples.len(), 3);
        assert_eq!(format!("{:.3}", report.assay.end_km), "0.020");

        std::fs::remove_dir_all(dir).ok();
    }
}
