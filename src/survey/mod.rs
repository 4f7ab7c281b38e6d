//! Survey module - turns staged survey logs into assay reports.
//!
//! This module provides the core of the transform:
//! - **Formats**: [`DadosTrechoParser`] reads the vehicle's XML logs
//! - **Stages**: [`Sampler`] and [`Summarizer`] behind the [`SurveyStage`] trait
//! - **Pipeline**: batch driver via [`pipeline::AssayPipeline`]

pub mod formats;
pub mod pipeline;
pub mod sampler;
pub mod summarizer;
pub mod traits;

// Re-export commonly used types
pub use formats::DadosTrechoParser;
pub use sampler::{Sampler, DEFAULT_STEP, GEO_STRIDE};
pub use summarizer::Summarizer;
pub use traits::{AssayError, SurveyStage};

pub use pipeline::{file_code, AssayPipeline, AssayRun, PipelineError, RunStats};
