//! Core traits and error types for the survey transform stages.
//!
//! - Stage abstraction via [`SurveyStage`], implemented by the sampler and
//!   the summarizer
//! - Standardized error handling for the summarizer

use thiserror::Error;

use crate::model::Meterage;

// ============================================================================
// Stage Trait
// ============================================================================

/// Generic transform stage that turns Input → Output.
///
/// The per-file executor chains stages through this trait so every stage is
/// logged and timed the same way.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync` so one stage value can serve
/// every file task of a run.
///
/// # Examples
///
/// ```ignore
/// let trace = Sampler::new(5).execute(&log.entries)?;
/// let assay = Summarizer::new(5).execute((&log.header, &trace.samples))?;
/// ```
pub trait SurveyStage<'a>: Send + Sync {
    /// Input type consumed by this stage
    type Input;

    /// Output type produced by this stage
    type Output;

    /// Error type for stage failures
    type Error: std::error::Error + Send + Sync + 'static;

    /// Executes the stage.
    ///
    /// Stages are pure: the same input always yields the same output and the
    /// input is never mutated.
    fn execute(&self, input: Self::Input) -> Result<Self::Output, Self::Error>;

    /// Returns a human-readable name for this stage, used in logs.
    fn stage_name(&self) -> &'static str;
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur while summarizing a sampled trace.
#[derive(Error, Debug)]
pub enum AssayError {
    /// The sampler selected no entries, so there is no first or last sample
    #[error("No samples to summarize")]
    EmptyInput,

    /// The first or last sample key is absent from the sample map
    #[error("No sample at meterage {0}")]
    MissingSample(Meterage),

    /// A sample timestamp could not be read as a calendar date and time
    #[error("Unrecognized timestamp: {0:?}")]
    Timestamp(String),
}
