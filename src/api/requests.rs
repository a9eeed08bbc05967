use crate::error::{AppError, Result};
use crate::models::{EmergencyType, FeatureRecord, Severity};
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

/// One set of observed conditions to classify.
///
/// Every feature is optional; missing values fall back to typical conditions
/// and the calendar columns fall back to the request time. Sensor readings are
/// only required to be finite, since noisy sensors legitimately leave their
/// nominal ranges.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PredictionRequest {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub air_quality: Option<f64>,
    pub wind_speed: Option<f64>,
    pub precipitation: Option<f64>,
    pub population_density: Option<f64>,
    pub building_density: Option<f64>,
    #[validate(range(min = 0.0, max = 23.0))]
    pub hour_of_day: Option<f64>,
    #[validate(range(min = 0.0, max = 6.0))]
    pub day_of_week: Option<f64>,
    pub is_holiday: Option<HolidayFlag>,
    #[validate(range(min = 1.0, max = 12.0))]
    pub month: Option<f64>,
    #[validate(range(min = 1.0, max = 366.0))]
    pub day_of_year: Option<f64>,

    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    pub location_name: Option<String>,
}

/// Holiday marker given either as a boolean or as a number (non-zero is set)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HolidayFlag {
    Bool(bool),
    Number(f64),
}

impl HolidayFlag {
    pub fn is_set(self) -> bool {
        match self {
            HolidayFlag::Bool(flag) => flag,
            HolidayFlag::Number(n) => n != 0.0,
        }
    }
}

/// Calendar value from the request, or `fallback` when absent; must be a whole number
fn calendar_value(name: &str, value: Option<f64>, fallback: u32) -> Result<f64> {
    match value {
        Some(v) if v.fract() != 0.0 => Err(AppError::Validation(format!(
            "{} must be a whole number, got {}",
            name, v
        ))),
        Some(v) => Ok(v),
        None => Ok(fallback as f64),
    }
}

impl PredictionRequest {
    /// Validate and fill defaults, producing a record in training-time column order
    pub fn to_record(&self, now: DateTime<Utc>) -> Result<FeatureRecord> {
        self.validate()?;

        let values = [
            self.temperature,
            self.humidity,
            self.air_quality,
            self.wind_speed,
            self.precipitation,
            self.population_density,
            self.building_density,
        ];
        if values.iter().flatten().any(|v| !v.is_finite()) {
            return Err(AppError::Validation(
                "feature values must be finite numbers".to_string(),
            ));
        }

        let holiday = self.is_holiday.map(HolidayFlag::is_set).unwrap_or(false);

        Ok(FeatureRecord {
            temperature: self.temperature.unwrap_or(25.0),
            humidity: self.humidity.unwrap_or(50.0),
            air_quality: self.air_quality.unwrap_or(50.0),
            wind_speed: self.wind_speed.unwrap_or(5.0),
            precipitation: self.precipitation.unwrap_or(2.0),
            population_density: self.population_density.unwrap_or(500.0),
            building_density: self.building_density.unwrap_or(0.5),
            hour_of_day: calendar_value("hour_of_day", self.hour_of_day, now.hour())?,
            day_of_week: calendar_value(
                "day_of_week",
                self.day_of_week,
                now.weekday().num_days_from_monday(),
            )?,
            is_holiday: if holiday { 1.0 } else { 0.0 },
            month: calendar_value("month", self.month, now.month())?,
            day_of_year: calendar_value("day_of_year", self.day_of_year, now.ordinal())?,
        })
    }

    pub fn location(&self) -> Location {
        Location {
            latitude: self.latitude,
            longitude: self.longitude,
            location_name: self.location_name.clone().unwrap_or_default(),
        }
    }
}

/// Location metadata echoed back untouched; the model never sees it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub emergency_type: EmergencyType,
    pub severity: Severity,
    pub confidence: f64,
    pub probabilities: BTreeMap<EmergencyType, f64>,
    pub recommendations: Vec<String>,
    pub location: Location,
}

/// Compact per-record result of a batch request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPrediction {
    pub emergency_type: EmergencyType,
    pub severity: Severity,
    pub confidence: f64,
    pub location: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon_july_10() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let record = PredictionRequest::default().to_record(noon_july_10()).unwrap();

        assert_eq!(record.temperature, 25.0);
        assert_eq!(record.humidity, 50.0);
        assert_eq!(record.air_quality, 50.0);
        assert_eq!(record.wind_speed, 5.0);
        assert_eq!(record.precipitation, 2.0);
        assert_eq!(record.population_density, 500.0);
        assert_eq!(record.building_density, 0.5);
        assert_eq!(record.hour_of_day, 12.0);
        assert_eq!(record.day_of_week, 2.0);
        assert_eq!(record.is_holiday, 0.0);
        assert_eq!(record.month, 7.0);
        assert_eq!(record.day_of_year, 192.0);
    }

    #[test]
    fn test_explicit_values_win() {
        let request: PredictionRequest = serde_json::from_str(
            r#"{"temperature": 41.5, "is_holiday": true, "hour_of_day": 3, "month": 1}"#,
        )
        .unwrap();
        let record = request.to_record(noon_july_10()).unwrap();

        assert_eq!(record.temperature, 41.5);
        assert_eq!(record.is_holiday, 1.0);
        assert_eq!(record.hour_of_day, 3.0);
        assert_eq!(record.month, 1.0);
        assert_eq!(record.day_of_year, 192.0);
    }

    #[test]
    fn test_out_of_range_values_are_rejected() {
        let request = PredictionRequest {
            hour_of_day: Some(24.0),
            ..PredictionRequest::default()
        };
        let err = request.to_record(noon_july_10()).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        let request = PredictionRequest {
            month: Some(6.5),
            ..PredictionRequest::default()
        };
        let err = request.to_record(noon_july_10()).unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }

    #[test]
    fn test_generated_value_forms_are_accepted() {
        let request: PredictionRequest = serde_json::from_str(
            r#"{"humidity": 105.0, "air_quality": -3.0, "building_density": 1.2,
                "is_holiday": 1, "hour_of_day": 14.0, "day_of_week": 6}"#,
        )
        .unwrap();
        let record = request.to_record(noon_july_10()).unwrap();

        assert_eq!(record.humidity, 105.0);
        assert_eq!(record.air_quality, -3.0);
        assert_eq!(record.is_holiday, 1.0);
        assert_eq!(record.hour_of_day, 14.0);
        assert_eq!(record.day_of_week, 6.0);

        let request: PredictionRequest = serde_json::from_str(r#"{"is_holiday": 0}"#).unwrap();
        assert_eq!(request.to_record(noon_july_10()).unwrap().is_holiday, 0.0);
    }

    #[test]
    fn test_location_is_passed_through() {
        let request = PredictionRequest {
            latitude: Some(40.7),
            longitude: Some(-74.0),
            location_name: Some("Harbor".to_string()),
            ..PredictionRequest::default()
        };
        let location = request.location();
        assert_eq!(location.latitude, Some(40.7));
        assert_eq!(location.location_name, "Harbor");
        assert_eq!(PredictionRequest::default().location().location_name, "");
    }
}
