//! CSV writers for the geoposition traces and the assay table.

use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::model::{AssayBatch, AssayRecord, GeoMap};

pub const ASSAY_FILE_NAME: &str = "assay.csv";
pub const GEOPOSITION_SUFFIX: &str = "_geoposition.csv";

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Serialize)]
struct GeoRow {
    #[serde(rename = "Meterage")]
    meterage: String,
    #[serde(rename = "Lat")]
    lat: String,
    #[serde(rename = "Long")]
    long: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct AssayRow<'a> {
    name: &'a str,
    start_km: String,
    end_km: String,
    stretch_extension: String,
    vehicle_plate: &'a str,
    asset_type: &'a str,
    driver: &'a str,
    start_position: String,
    end_position: String,
    date: String,
    start_time: String,
    end_time: String,
}

impl<'a> From<&'a AssayRecord> for AssayRow<'a> {
    fn from(assay: &'a AssayRecord) -> Self {
        Self {
            name: &assay.name,
            start_km: format!("{:.3}", assay.start_km),
            end_km: format!("{:.3}", assay.end_km),
            stretch_extension: format!("{:.3}", assay.extension_km),
            vehicle_plate: &assay.vehicle_plate,
            asset_type: &assay.asset_type,
            driver: &assay.driver,
            start_position: assay.start_position.to_string(),
            end_position: assay.end_position.to_string(),
            date: assay.date(),
            start_time: assay.start_time(),
            end_time: assay.end_time(),
        }
    }
}

/// Files written by [`write_outputs`].
#[derive(Debug, Default, Clone)]
pub struct OutputSummary {
    pub geoposition_files: Vec<PathBuf>,
    pub assay_file: PathBuf,
}

/// Path of the geoposition trace for a file code.
pub fn geoposition_path(output_dir: &Path, code: &str) -> PathBuf {
    output_dir.join(format!("{code}{GEOPOSITION_SUFFIX}"))
}

/// Writes `Meterage,Lat,Long` rows in ascending meterage order.
pub fn write_geoposition_file(path: &Path, geopositions: &GeoMap) -> Result<(), OutputError> {
    let mut wtr = csv::Writer::from_path(path)?;
    if geopositions.is_empty() {
        wtr.write_record(["Meterage", "Lat", "Long"])?;
    }
    for (meterage, position) in geopositions {
        wtr.serialize(GeoRow {
            meterage: meterage.to_string(),
            lat: position.lat.to_string(),
            long: position.long.to_string(),
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes one assay row per report, in batch order.
pub fn write_assay_file(path: &Path, batch: &AssayBatch) -> Result<(), OutputError> {
    let mut wtr = csv::Writer::from_path(path)?;
    if batch.is_empty() {
        wtr.write_record([
            "Name",
            "StartKm",
            "EndKm",
            "StretchExtension",
            "VehiclePlate",
            "AssetType",
            "Driver",
            "StartPosition",
            "EndPosition",
            "Date",
            "StartTime",
            "EndTime",
        ])?;
    }
    for (_, report) in batch.iter() {
        wtr.serialize(AssayRow::from(&report.assay))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes every geoposition trace and the assay table into `output_dir`,
/// creating it if needed.
pub fn write_outputs(batch: &AssayBatch, output_dir: &Path) -> Result<OutputSummary, OutputError> {
    std::fs::create_dir_all(output_dir)?;

    let mut summary = OutputSummary::default();
    for (code, report) in batch.iter() {
        let path = geoposition_path(output_dir, code);
        write_geoposition_file(&path, &report.geopositions)?;
        summary.geoposition_files.push(path);
    }

    summary.assay_file = output_dir.join(ASSAY_FILE_NAME);
    write_assay_file(&summary.assay_file, batch)?;

    info!(
        dir = %output_dir.display(),
        geoposition_files = summary.geoposition_files.len(),
        assay_rows = batch.len(),
        "Outputs written"
    );
    Ok(summary)
}
