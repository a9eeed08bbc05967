use crate::error::{AppError, Result};
use crate::generator::RawDatasetRow;
use crate::models::{EmergencyType, FEATURE_COUNT};
use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const NAIVE_TIMESTAMP_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f%:z",
];

/// Parse an ISO-8601 timestamp; naive forms are read as UTC
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    if let Ok(timestamp) = DateTime::parse_from_str(value, NAIVE_TIMESTAMP_FORMATS[2]) {
        return Ok(timestamp.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS[..2]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| AppError::Data(format!("Unparseable timestamp: {:?}", value)))
}

/// Month (1-12) and day of year (1-366) of a timestamp
pub fn decompose_timestamp(value: &str) -> Result<(u32, u32)> {
    let timestamp = parse_timestamp(value)?;
    Ok((timestamp.month(), timestamp.ordinal()))
}

/// Turn dataset rows into a raw feature matrix (NaN marks missing cells) and labels
pub fn rows_to_matrix(rows: &[RawDatasetRow]) -> Result<(Array2<f64>, Vec<EmergencyType>)> {
    let mut features = Array2::from_elem((rows.len(), FEATURE_COUNT), f64::NAN);
    let mut labels = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        let (month, day_of_year) = decompose_timestamp(&row.timestamp)?;
        for (j, value) in row.numeric_features().iter().enumerate() {
            features[[i, j]] = value.unwrap_or(f64::NAN);
        }
        features[[i, 10]] = month as f64;
        features[[i, 11]] = day_of_year as f64;

        labels.push(
            EmergencyType::parse(&row.emergency_type)
                .map_err(|e| AppError::Data(e.to_string()))?,
        );
    }

    Ok((features, labels))
}

/// Bidirectional mapping between emergency categories and class ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    /// Sorted labels; a label's position is its class id
    classes: Vec<EmergencyType>,
}

impl LabelEncoder {
    /// Fit on every observed label; ids follow lexicographic label order
    pub fn fit(labels: &[EmergencyType]) -> Self {
        let mut classes: Vec<EmergencyType> = labels.to_vec();
        classes.sort_by_key(|c| c.to_string());
        classes.dedup();
        Self { classes }
    }

    pub fn classes(&self) -> &[EmergencyType] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn transform(&self, label: EmergencyType) -> Result<usize> {
        self.classes
            .iter()
            .position(|c| *c == label)
            .ok_or_else(|| AppError::Validation(format!("Label {} was not seen during fit", label)))
    }

    pub fn transform_all(&self, labels: &[EmergencyType]) -> Result<Vec<usize>> {
        labels.iter().map(|&label| self.transform(label)).collect()
    }

    pub fn inverse_transform(&self, class_id: usize) -> Result<EmergencyType> {
        self.classes.get(class_id).copied().ok_or_else(|| {
            AppError::Prediction(format!(
                "Class id {} outside the {} known classes",
                class_id,
                self.classes.len()
            ))
        })
    }

    /// Attach labels to one row of class probabilities
    pub fn label_probabilities(&self, row: ArrayView1<f64>) -> BTreeMap<EmergencyType, f64> {
        self.classes
            .iter()
            .zip(row.iter())
            .map(|(&label, &probability)| (label, probability))
            .collect()
    }
}

/// Replaces missing values with per-column training means
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanImputer {
    means: Array1<f64>,
}

impl MeanImputer {
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        let means = x
            .axis_iter(Axis(1))
            .enumerate()
            .map(|(j, column)| {
                let present: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
                if present.is_empty() {
                    Err(AppError::Data(format!(
                        "Column {} has no values to impute from",
                        j
                    )))
                } else {
                    Ok(present.iter().sum::<f64>() / present.len() as f64)
                }
            })
            .collect::<Result<Vec<f64>>>()?;

        Ok(Self {
            means: Array1::from_vec(means),
        })
    }

    pub fn n_features(&self) -> usize {
        self.means.len()
    }

    pub fn means(&self) -> &Array1<f64> {
        &self.means
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = x.clone();
        for mut row in out.axis_iter_mut(Axis(0)) {
            for (value, mean) in row.iter_mut().zip(self.means.iter()) {
                if value.is_nan() {
                    *value = *mean;
                }
            }
        }
        out
    }
}

/// Standardizes features with training-split mean and standard deviation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        if x.nrows() == 0 {
            return Err(AppError::Data("Cannot fit a scaler on zero rows".to_string()));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| AppError::Data("Cannot fit a scaler on zero rows".to_string()))?;
        // population standard deviation; constant columns keep unit scale
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|std| if std > f64::EPSILON { std } else { 1.0 });

        Ok(Self { mean, scale })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    pub fn transform(&self, x: &Array2<f64>) -> Array2<f64> {
        (x - &self.mean) / &self.scale
    }
}

/// Imputer and scaler fit together on the training split
#[derive(Debug, Clone, PartialEq)]
pub struct FeaturePreprocessor {
    pub imputer: MeanImputer,
    pub scaler: StandardScaler,
}

impl FeaturePreprocessor {
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        let imputer = MeanImputer::fit(x)?;
        let scaler = StandardScaler::fit(&imputer.transform(x))?;
        Ok(Self { imputer, scaler })
    }

    pub fn n_features(&self) -> usize {
        self.scaler.n_features()
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features() {
            return Err(AppError::Layout {
                expected: self.n_features(),
                actual: x.ncols(),
            });
        }
        Ok(self.scaler.transform(&self.imputer.transform(x)))
    }

    /// Transform a single feature vector into a one-row matrix
    pub fn transform_one(&self, features: &[f64]) -> Result<Array2<f64>> {
        if features.len() != self.n_features() {
            return Err(AppError::Layout {
                expected: self.n_features(),
                actual: features.len(),
            });
        }
        let row = Array2::from_shape_vec((1, features.len()), features.to_vec())
            .map_err(|e| AppError::Internal(format!("Failed to create feature array: {}", e)))?;
        self.transform(&row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_decompose_timestamp_formats() {
        assert_eq!(decompose_timestamp("2024-07-10T18:30:00Z").unwrap(), (7, 192));
        assert_eq!(
            decompose_timestamp("2023-02-01 08:00:00.123456+00:00").unwrap(),
            (2, 32)
        );
        assert_eq!(decompose_timestamp("2023-12-31 23:00:00").unwrap(), (12, 365));
        assert!(decompose_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_label_encoder_sorted_ids() {
        let encoder = LabelEncoder::fit(&[
            EmergencyType::None,
            EmergencyType::Fire,
            EmergencyType::Accident,
            EmergencyType::None,
            EmergencyType::NaturalDisaster,
            EmergencyType::Medical,
        ]);

        assert_eq!(
            encoder.classes(),
            &[
                EmergencyType::Accident,
                EmergencyType::Fire,
                EmergencyType::Medical,
                EmergencyType::NaturalDisaster,
                EmergencyType::None,
            ]
        );
        assert_eq!(encoder.transform(EmergencyType::Fire).unwrap(), 1);
        assert_eq!(encoder.inverse_transform(4).unwrap(), EmergencyType::None);
        assert!(encoder.inverse_transform(5).is_err());
    }

    #[test]
    fn test_label_encoder_rejects_unseen_label() {
        let encoder = LabelEncoder::fit(&[EmergencyType::Fire, EmergencyType::None]);
        assert!(encoder.transform(EmergencyType::Medical).is_err());
    }

    #[test]
    fn test_imputer_uses_fitted_means() {
        let train = array![[1.0, f64::NAN], [3.0, 4.0], [f64::NAN, 8.0]];
        let imputer = MeanImputer::fit(&train).unwrap();
        assert_eq!(imputer.means(), &array![2.0, 6.0]);

        let test = array![[f64::NAN, f64::NAN], [10.0, 1.0]];
        let filled = imputer.transform(&test);
        assert_eq!(filled, array![[2.0, 6.0], [10.0, 1.0]]);
    }

    #[test]
    fn test_imputer_rejects_empty_column() {
        let train = array![[1.0, f64::NAN], [3.0, f64::NAN]];
        assert!(MeanImputer::fit(&train).is_err());
    }

    #[test]
    fn test_scaler_standardizes_training_data() {
        let train = array![[1.0, 5.0], [3.0, 5.0], [5.0, 5.0]];
        let scaler = StandardScaler::fit(&train).unwrap();
        let scaled = scaler.transform(&train);

        let column_means = scaled.mean_axis(Axis(0)).unwrap();
        assert!(column_means.iter().all(|m| m.abs() < 1e-12));
        assert!((scaled.column(0).std(0.0) - 1.0).abs() < 1e-12);
        // constant column is centred but not divided by zero
        assert!(scaled.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_scaler_reuses_training_statistics() {
        let train = array![[0.0], [10.0]];
        let scaler = StandardScaler::fit(&train).unwrap();
        let scaled = scaler.transform(&array![[15.0]]);
        assert!((scaled[[0, 0]] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_preprocessor_layout_check() {
        let train = array![[1.0, 2.0], [3.0, 4.0]];
        let preprocessor = FeaturePreprocessor::fit(&train).unwrap();

        assert!(preprocessor.transform_one(&[1.0, 2.0]).is_ok());
        let err = preprocessor.transform_one(&[1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(err.error_code(), "LAYOUT_ERROR");
    }
}
