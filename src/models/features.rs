use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::emergency::EmergencyType;
use crate::error::{AppError, Result};

/// Column order of the feature vector shared by generation, training and inference
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
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
    "month",
    "day_of_year",
];

/// Length of every feature vector
pub const FEATURE_COUNT: usize = 12;

/// One situation to classify, in training-time column order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Celsius
    pub temperature: f64,
    /// Percent
    pub humidity: f64,
    /// AQI
    pub air_quality: f64,
    /// km/h
    pub wind_speed: f64,
    /// mm
    pub precipitation: f64,
    /// people/km²
    pub population_density: f64,
    /// Ratio in [0, 1]
    pub building_density: f64,
    pub hour_of_day: f64,
    /// Monday = 0
    pub day_of_week: f64,
    pub is_holiday: f64,
    pub month: f64,
    pub day_of_year: f64,
}

impl FeatureRecord {
    pub fn to_vec(&self) -> Vec<f64> {
        vec![
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
            self.month,
            self.day_of_year,
        ]
    }

    /// Rebuild a record from a raw vector, which must have exactly `FEATURE_COUNT` entries
    pub fn from_slice(values: &[f64]) -> Result<Self> {
        if values.len() != FEATURE_COUNT {
            return Err(AppError::Layout {
                expected: FEATURE_COUNT,
                actual: values.len(),
            });
        }

        Ok(Self {
            temperature: values[0],
            humidity: values[1],
            air_quality: values[2],
            wind_speed: values[3],
            precipitation: values[4],
            population_density: values[5],
            building_density: values[6],
            hour_of_day: values[7],
            day_of_week: values[8],
            is_holiday: values[9],
            month: values[10],
            day_of_year: values[11],
        })
    }

    /// Overwrite the temporal columns from a timestamp
    pub fn with_timestamp(mut self, timestamp: &DateTime<Utc>) -> Self {
        self.hour_of_day = timestamp.hour() as f64;
        self.day_of_week = timestamp.weekday().num_days_from_monday() as f64;
        self.month = timestamp.month() as f64;
        self.day_of_year = timestamp.ordinal() as f64;
        self
    }

    pub fn is_holiday(&self) -> bool {
        self.is_holiday >= 0.5
    }
}

/// A generated observation with its ground-truth label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledSample {
    pub timestamp: DateTime<Utc>,
    pub features: FeatureRecord,
    pub emergency_type: EmergencyType,
    /// Hit probability used while generating; diagnostics only, never a training target
    pub emergency_probability: f64,
}
