//! Folds a sampled trace into its per-stretch assay record.

use chrono::{DateTime, NaiveDateTime};

use crate::model::{AssayRecord, HeaderRecord, Meterage, SampleMap, SampleRecord};
use crate::survey::sampler::DEFAULT_STEP;
use crate::survey::traits::{AssayError, SurveyStage};

const METERS_PER_KM: f64 = 1000.0;

/// Naive layouts accepted for `DataHora`, tried in order.
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
];

/// Builds the assay record from the first and last samples.
///
/// The last sample is looked up at `(N - 1) * step`, so the summarizer must be
/// built with the same step as the [`Sampler`](crate::survey::sampler::Sampler)
/// that produced the trace.
#[derive(Debug, Clone, Copy)]
pub struct Summarizer {
    step: u64,
}

impl Default for Summarizer {
    fn default() -> Self {
        Self::new(DEFAULT_STEP)
    }
}

impl Summarizer {
    pub fn new(step: u64) -> Self {
        Self { step }
    }

    pub fn summarize(
        &self,
        header: &HeaderRecord,
        samples: &SampleMap,
    ) -> Result<AssayRecord, AssayError> {
        if samples.is_empty() {
            return Err(AssayError::EmptyInput);
        }

        let first = lookup(samples, Meterage(0))?;
        let last_key = Meterage((samples.len() as u64 - 1) * self.step);
        let last = lookup(samples, last_key)?;

        let start_km = first.odometer / METERS_PER_KM;
        let end_km = last.odometer / METERS_PER_KM;

        Ok(AssayRecord {
            name: header.stretch_name.clone(),
            start_km: round_km(start_km),
            end_km: round_km(end_km),
            extension_km: round_km(end_km - start_km),
            vehicle_plate: header.vehicle_plate.clone(),
            asset_type: header.asset_type.clone(),
            driver: header.driver.clone(),
            start_position: first.position,
            end_position: last.position,
            started_at: parse_timestamp(&first.timestamp)?,
            finished_at: parse_timestamp(&last.timestamp)?,
        })
    }
}

impl<'a> SurveyStage<'a> for Summarizer {
    type Input = (&'a HeaderRecord, &'a SampleMap);
    type Output = AssayRecord;
    type Error = AssayError;

    fn execute(&self, (header, samples): Self::Input) -> Result<Self::Output, Self::Error> {
        self.summarize(header, samples)
    }

    fn stage_name(&self) -> &'static str {
        "summarizer"
    }
}

fn lookup(samples: &SampleMap, key: Meterage) -> Result<&SampleRecord, AssayError> {
    samples.get(&key).ok_or(AssayError::MissingSample(key))
}

/// Rounds to three decimals, halves away from zero.
pub fn round_km(km: f64) -> f64 {
    (km * METERS_PER_KM).round() / METERS_PER_KM
}

/// Reads a survey timestamp as a wall-clock date and time.
///
/// Offsets are accepted but not applied: the clock reading is kept as written.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, AssayError> {
    let raw = raw.trim();

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Ok(with_offset.naive_local());
    }

    let naive = raw.strip_suffix('Z').unwrap_or(raw);
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(naive, format).ok())
        .ok_or_else(|| AssayError::Timestamp(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GeoPosition, SampleRecord};

    fn header() -> HeaderRecord {
        HeaderRecord {
            stretch_name: "Km 10".to_string(),
            vehicle_plate: "ABC1234".to_string(),
            asset_type: "IRI".to_string(),
            driver: "J.Silva".to_string(),
        }
    }

    fn sample(odometer: f64, timestamp: &str) -> SampleRecord {
        SampleRecord {
            position: GeoPosition {
                lat: -23.5 - odometer / 1e5,
                long: -46.6 - odometer / 1e5,
            },
            temperature: 21.0,
            altitude: 760.0,
            timestamp: timestamp.to_string(),
            odometer,
        }
    }

    fn trace(odometers: &[f64]) -> SampleMap {
        odometers
            .iter()
            .enumerate()
            .map(|(i, &o)| {
                let ts = format!("2023-05-10T08:15:{:02}", i);
                (Meterage(i as u64 * 5), sample(o, &ts))
            })
            .collect()
    }

    #[test]
    fn test_empty_samples_are_rejected() {
        let result = Summarizer::default().summarize(&header(), &SampleMap::new());
        assert!(matches!(result, Err(AssayError::EmptyInput)));
    }

    #[test]
    fn test_kilometer_rounding() {
        let assay = Summarizer::default()
            .summarize(&header(), &trace(&[123456.0]))
            .unwrap();
        assert_eq!(format!("{:.3}", assay.start_km), "123.456");

        let assay = Summarizer::default()
            .summarize(&header(), &trace(&[1000.0]))
            .unwrap();
        assert_eq!(format!("{:.3}", assay.start_km), "1.000");
        assert_eq!(format!("{:.3}", assay.extension_km), "0.000");
    }

    #[test]
    fn test_round_km_halves_away_from_zero() {
        assert_eq!(round_km(0.0125), 0.013);
        assert_eq!(round_km(-0.0125), -0.013);
        assert_eq!(round_km(2.0004), 2.0);
    }

    #[test]
    fn test_last_sample_comes_from_step_formula() {
        let samples = trace(&[0.0, 5.0, 10.0, 15.0, 20.0]);
        let assay = Summarizer::default().summarize(&header(), &samples).unwrap();

        let last = &samples[&Meterage(20)];
        assert_eq!(assay.end_position, last.position);
        assert_eq!(format!("{:.3}", assay.end_km), "0.020");
        assert_eq!(format!("{:.3}", assay.extension_km), "0.020");
        assert_eq!(assay.end_time(), "08:15:04");
    }

    #[test]
    fn test_extension_uses_unrounded_distances() {
        let samples = trace(&[1000.4, 1005.4, 2000.6]);
        let assay = Summarizer::default().summarize(&header(), &samples).unwrap();
        assert_eq!(format!("{:.3}", assay.start_km), "1.000");
        assert_eq!(format!("{:.3}", assay.end_km), "2.001");
        assert_eq!(format!("{:.3}", assay.extension_km), "1.000");
    }

    #[test]
    fn test_missing_last_key_is_an_error() {
        let mut samples = trace(&[0.0, 5.0]);
        let moved = samples.remove(&Meterage(5)).unwrap();
        samples.insert(Meterage(7), moved);

        match Summarizer::default().summarize(&header(), &samples) {
            Err(AssayError::MissingSample(key)) => assert_eq!(key, Meterage(5)),
            other => panic!("expected missing sample, got {other:?}"),
        }
    }

    #[test]
    fn test_header_passes_through_and_time_is_formatted() {
        let mut samples = trace(&[0.0, 5.0, 10.0]);
        samples.get_mut(&Meterage(0)).unwrap().timestamp = "2023-01-02T07:05:09".into();
        samples.get_mut(&Meterage(10)).unwrap().timestamp = "2023-01-02T19:45:00.250".into();

        let assay = Summarizer::default().summarize(&header(), &samples).unwrap();
        assert_eq!(assay.name, "Km 10");
        assert_eq!(assay.vehicle_plate, "ABC1234");
        assert_eq!(assay.asset_type, "IRI");
        assert_eq!(assay.driver, "J.Silva");
        assert_eq!(assay.date(), "02/01/2023");
        assert_eq!(assay.start_time(), "07:05:09");
        assert_eq!(assay.end_time(), "19:45:00");
    }

    #[test]
    fn test_timestamp_layouts_keep_wall_clock() {
        let expected = "10/05/2023 23:30:15";
        for raw in [
            "2023-05-10T23:30:15",
            "2023-05-10 23:30:15",
            "2023-05-10T23:30:15Z",
            "2023-05-10T23:30:15-03:00",
            "10/05/2023 23:30:15",
        ] {
            let parsed = parse_timestamp(raw).unwrap();
            assert_eq!(parsed.format("%d/%m/%Y %H:%M:%S").to_string(), expected, "{raw}");
        }
    }

    #[test]
    fn test_unparseable_timestamp() {
        let mut samples = trace(&[0.0]);
        samples.get_mut(&Meterage(0)).unwrap().timestamp = "yesterday".into();
        assert!(matches!(
            Summarizer::default().summarize(&header(), &samples),
            Err(AssayError::Timestamp(_))
        ));
    }
}
