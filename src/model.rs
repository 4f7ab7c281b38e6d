use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Width of the zero-padded meterage label (`00000`, `00005`, ...).
pub const LABEL_WIDTH: usize = 5;

/// Header section of a survey log (`DadosTrecho/Trecho`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderRecord {
    pub stretch_name: String,
    pub vehicle_plate: String,
    pub asset_type: String, // instrument type, e.g. "IRI"
    pub driver: String,
}

/// Latitude/longitude pair as read from the `GPS` element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub lat: f64,
    pub long: f64,
}

impl fmt::Display for GeoPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.long)
    }
}

/// One sensor sample, in source order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEntry {
    /// Cumulative distance in meters, as recorded.
    pub odometer: f64,
    pub timestamp: String,
    pub position: GeoPosition,
    pub temperature: f64,
    pub altitude: f64,
}

impl RawEntry {
    /// Odometer reading truncated towards zero, the value the sampler matches on.
    pub fn odometer_position(&self) -> i64 {
        self.odometer.trunc() as i64
    }
}

/// Parsed contents of one survey file.
#[derive(Debug, Clone, Default)]
pub struct SurveyLog {
    pub header: HeaderRecord,
    pub entries: Vec<RawEntry>,
    /// Entries dropped during parsing because a field was missing or not numeric.
    pub skipped_entries: usize,
}

/// Positional key of a sample: the sampled distance in meters.
///
/// Ordering is numeric; the zero-padded label is only a rendering concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Meterage(pub u64);

impl fmt::Display for Meterage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.0, width = LABEL_WIDTH)
    }
}

/// A raw entry selected by the sampler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    pub position: GeoPosition,
    pub temperature: f64,
    pub altitude: f64,
    pub timestamp: String,
    pub odometer: f64,
}

impl From<&RawEntry> for SampleRecord {
    fn from(entry: &RawEntry) -> Self {
        Self {
            position: entry.position,
            temperature: entry.temperature,
            altitude: entry.altitude,
            timestamp: entry.timestamp.clone(),
            odometer: entry.odometer,
        }
    }
}

pub type SampleMap = BTreeMap<Meterage, SampleRecord>;
pub type GeoMap = BTreeMap<Meterage, GeoPosition>;

/// Output of the sampler for one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampledTrace {
    pub samples: SampleMap,
    pub geopositions: GeoMap,
}

/// Per-stretch summary row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssayRecord {
    pub name: String,
    pub start_km: f64,
    pub end_km: f64,
    pub extension_km: f64,
    pub vehicle_plate: String,
    pub asset_type: String,
    pub driver: String,
    pub start_position: GeoPosition,
    pub end_position: GeoPosition,
    pub started_at: NaiveDateTime,
    pub finished_at: NaiveDateTime,
}

impl AssayRecord {
    /// Survey date as `DD/MM/YYYY`, taken from the first sample.
    pub fn date(&self) -> String {
        self.started_at.format("%d/%m/%Y").to_string()
    }

    pub fn start_time(&self) -> String {
        self.started_at.format("%H:%M:%S").to_string()
    }

    pub fn end_time(&self) -> String {
        self.finished_at.format("%H:%M:%S").to_string()
    }
}

/// Everything produced for one input file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub assay: AssayRecord,
    pub samples: SampleMap,
    pub geopositions: GeoMap,
}

/// A file that could not be turned into a report.
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub code: String,
    pub reason: String,
}

/// Accumulated results of one run, keyed by file code in processing order.
#[derive(Debug, Clone, Default)]
pub struct AssayBatch {
    reports: IndexMap<String, FileReport>,
    pub failures: Vec<FileFailure>,
}

impl AssayBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a report. A code seen before keeps its slot and takes the new report.
    pub fn insert(&mut self, code: impl Into<String>, report: FileReport) {
        self.reports.insert(code.into(), report);
    }

    pub fn get(&self, code: &str) -> Option<&FileReport> {
        self.reports.get(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FileReport)> {
        self.reports.iter().map(|(c, r)| (c.as_str(), r))
    }

    pub fn len(&self) -> usize {
        self.reports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }
}
