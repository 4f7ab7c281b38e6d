//! Fixed-step sampling of a survey log.

use std::convert::Infallible;

use tracing::debug;

use crate::model::{Meterage, RawEntry, SampleRecord, SampledTrace};
use crate::survey::traits::SurveyStage;

/// Default spacing between samples, in meters.
pub const DEFAULT_STEP: u64 = 5;

/// Every n-th sample is also kept as a geoposition.
pub const GEO_STRIDE: usize = 4;

/// Selects the entries sitting exactly on multiples of `step`.
///
/// The expected position starts at 0 and only moves forward when an entry
/// lands on it, so stray or repeated readings never shift later matches.
#[derive(Debug, Clone, Copy)]
pub struct Sampler {
    step: u64,
}

impl Default for Sampler {
    fn default() -> Self {
        Self::new(DEFAULT_STEP)
    }
}

impl Sampler {
    /// `step` must be positive; [`Config`](crate::config::Config) validates it.
    pub fn new(step: u64) -> Self {
        Self { step }
    }

    pub fn sample(&self, entries: &[RawEntry]) -> SampledTrace {
        let mut trace = SampledTrace::default();
        let mut expected: u64 = 0;

        for entry in entries {
            let position = entry.odometer_position();
            if position < 0 || position as u64 != expected {
                continue;
            }

            let key = Meterage(expected);
            if trace.samples.len() % GEO_STRIDE == 0 {
                trace.geopositions.insert(key, entry.position);
            }
            trace.samples.insert(key, SampleRecord::from(entry));
            expected += self.step;
        }

        debug!(
            entries = entries.len(),
            samples = trace.samples.len(),
            geopositions = trace.geopositions.len(),
            "Sampled entries"
        );
        trace
    }
}

impl<'a> SurveyStage<'a> for Sampler {
    type Input = &'a [RawEntry];
    type Output = SampledTrace;
    type Error = Infallible;

    fn execute(&self, input: Self::Input) -> Result<Self::Output, Self::Error> {
        Ok(self.sample(input))
    }

    fn stage_name(&self) -> &'static str {
        "sampler"
    }
}
