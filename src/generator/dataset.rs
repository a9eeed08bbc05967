use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{AppError, Result};
use crate::models::{EmergencyType, LabeledSample};

/// Exact header of the dataset file
pub const DATASET_COLUMNS: [&str; 13] = [
    "timestamp",
    "temperature",
    "humidity",
    "air_quality",
    "wind_speed",
    "precipitation",
    "population_density",
    "building_density",
    "hour_of_day",
    "day_of_week",
    "is_holiday",
    "emergency_type",
    "emergency_probability",
];

/// Row as written by the generator; field order is the column order
#[derive(Debug, Serialize)]
struct DatasetRow {
    timestamp: String,
    temperature: f64,
    humidity: f64,
    air_quality: f64,
    wind_speed: f64,
    precipitation: f64,
    population_density: f64,
    building_density: f64,
    hour_of_day: u32,
    day_of_week: u32,
    is_holiday: u8,
    emergency_type: EmergencyType,
    emergency_probability: f64,
}

impl From<&LabeledSample> for DatasetRow {
    fn from(sample: &LabeledSample) -> Self {
        let features = &sample.features;
        Self {
            timestamp: sample
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Micros, true),
            temperature: features.temperature,
            humidity: features.humidity,
            air_quality: features.air_quality,
            wind_speed: features.wind_speed,
            precipitation: features.precipitation,
            population_density: features.population_density,
            building_density: features.building_density,
            hour_of_day: features.hour_of_day as u32,
            day_of_week: features.day_of_week as u32,
            is_holiday: u8::from(features.is_holiday()),
            emergency_type: sample.emergency_type,
            emergency_probability: sample.emergency_probability,
        }
    }
}

/// Row as read by the trainer; empty numeric cells are missing values
#[derive(Debug, Clone, Deserialize)]
pub struct RawDatasetRow {
    pub timestamp: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub air_quality: Option<f64>,
    pub wind_speed: Option<f64>,
    pub precipitation: Option<f64>,
    pub population_density: Option<f64>,
    pub building_density: Option<f64>,
    pub hour_of_day: Option<f64>,
    pub day_of_week: Option<f64>,
    pub is_holiday: Option<f64>,
    pub emergency_type: String,
    pub emergency_probability: Option<f64>,
}

impl RawDatasetRow {
    /// The ten numeric feature cells preceding the derived calendar columns
    pub fn numeric_features(&self) -> [Option<f64>; 10] {
        [
            self.temperature,
            self.humidity,
            self.air_quality,
            self.wind_speed,
            self.precipitation,
            self.population_density,
            self.building_density,
            self.hour_of_day,
            self.day_of_week,
            self.is_holiday,
        ]
    }
}

/// Write samples to `path`, creating parent directories as needed
pub fn write_dataset(path: &Path, samples: &[LabeledSample]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    if samples.is_empty() {
        writer.write_record(DATASET_COLUMNS)?;
    }
    for sample in samples {
        writer.serialize(DatasetRow::from(sample))?;
    }
    writer.flush()?;

    info!("Wrote {} records to {}", samples.len(), path.display());
    Ok(())
}

/// Read a dataset file, validating its header and labels
pub fn read_dataset(path: &Path) -> Result<Vec<RawDatasetRow>> {
    if !path.exists() {
        return Err(AppError::Data(format!(
            "Dataset not found: {}",
            path.display()
        )));
    }

    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    if headers.iter().ne(DATASET_COLUMNS.iter().copied()) {
        return Err(AppError::Data(format!(
            "Unexpected dataset header in {}: {:?}",
            path.display(),
            headers.iter().collect::<Vec<_>>()
        )));
    }

    let mut rows = Vec::new();
    for (line, result) in reader.deserialize::<RawDatasetRow>().enumerate() {
        let row = result
            .map_err(|e| AppError::Data(format!("Malformed row {}: {}", line + 2, e)))?;
        EmergencyType::parse(&row.emergency_type)
            .map_err(|e| AppError::Data(format!("Row {}: {}", line + 2, e)))?;
        rows.push(row);
    }

    Ok(rows)
}
