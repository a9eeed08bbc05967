use crate::error::{AppError, Result};
use crate::models::{EmergencyType, Severity};
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Prediction result with confidence score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Predicted category
    pub emergency_type: EmergencyType,

    /// Probability mass of the predicted category (0.0 - 1.0)
    pub confidence: f64,

    /// Probability of every category the label encoder knows
    pub class_probabilities: BTreeMap<EmergencyType, f64>,

    /// Rule-derived severity
    pub severity: Severity,
}

impl PredictionResult {
    pub fn new(emergency_type: EmergencyType, confidence: f64) -> Self {
        Self {
            emergency_type,
            confidence,
            class_probabilities: BTreeMap::new(),
            severity: Severity::derive(emergency_type, confidence),
        }
    }

    pub fn with_probabilities(mut self, probabilities: BTreeMap<EmergencyType, f64>) -> Self {
        self.class_probabilities = probabilities;
        self
    }
}

/// Preprocessed feature matrix with encoded class ids
#[derive(Debug, Clone)]
pub struct TrainingDataset {
    /// Feature matrix (n_samples × n_features)
    pub features: Array2<f64>,

    /// Encoded class id per row
    pub labels: Vec<usize>,

    /// Number of samples
    pub n_samples: usize,

    /// Number of features
    pub n_features: usize,
}

impl TrainingDataset {
    pub fn new(features: Array2<f64>, labels: Vec<usize>) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(AppError::Data(format!(
                "{} feature rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }

        Ok(Self {
            n_samples: features.nrows(),
            n_features: features.ncols(),
            features,
            labels,
        })
    }

    /// Number of distinct class ids present
    pub fn n_distinct_classes(&self) -> usize {
        let mut classes = self.labels.clone();
        classes.sort_unstable();
        classes.dedup();
        classes.len()
    }

    fn select(&self, indices: &[usize]) -> TrainingDataset {
        TrainingDataset {
            features: self.features.select(Axis(0), indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            n_samples: indices.len(),
            n_features: self.n_features,
        }
    }

    /// Split into train/test sets, preserving class proportions
    ///
    /// Each class sends `round(count * test_size)` rows, capped so at least one stays in
    /// training, to the test split. Rows keep their original relative order.
    pub fn stratified_split(&self, test_size: f64, seed: u64) -> (TrainingDataset, TrainingDataset) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, &label) in self.labels.iter().enumerate() {
            by_class.entry(label).or_default().push(i);
        }

        let mut train_indices = Vec::with_capacity(self.n_samples);
        let mut test_indices = Vec::new();
        for (_, mut indices) in by_class {
            indices.shuffle(&mut rng);
            let n_test = ((indices.len() as f64 * test_size).round() as usize)
                .min(indices.len().saturating_sub(1));
            test_indices.extend_from_slice(&indices[..n_test]);
            train_indices.extend_from_slice(&indices[n_test..]);
        }
        train_indices.sort_unstable();
        test_indices.sort_unstable();

        (self.select(&train_indices), self.select(&test_indices))
    }
}

/// Model evaluation metrics (classification report)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: f64,

    /// Macro-averaged precision
    pub precision: f64,

    /// Macro-averaged recall
    pub recall: f64,

    /// Macro-averaged F1 score
    pub f1_score: f64,

    /// Support-weighted F1 score
    pub weighted_f1_score: f64,

    /// Confusion matrix, rows are true classes and columns predicted classes
    pub confusion_matrix: Option<Array2<usize>>,

    /// Per-class metrics keyed by class label
    pub per_class_metrics: BTreeMap<String, ClassMetrics>,
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ModelMetrics {
    pub fn new() -> Self {
        Self {
            accuracy: 0.0,
            precision: 0.0,
            recall: 0.0,
            f1_score: 0.0,
            weighted_f1_score: 0.0,
            confusion_matrix: None,
            per_class_metrics: BTreeMap::new(),
        }
    }
}

impl Default for ModelMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Model metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,

    /// Model version
    pub version: String,

    /// Model type
    pub model_type: ModelType,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Number of training samples
    pub n_training_samples: usize,

    /// Number of features
    pub n_features: usize,

    /// Hyperparameters
    pub hyperparameters: BTreeMap<String, String>,
}

impl ModelMetadata {
    pub fn new(model_type: ModelType, hyperparameters: BTreeMap<String, String>) -> Self {
        Self {
            name: model_type.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            model_type,
            trained_at: chrono::Utc::now(),
            n_training_samples: 0,
            n_features: 0,
            hyperparameters,
        }
    }
}

/// Classifier families trained and compared on every run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Bootstrap-bagged decision trees
    RandomForest,

    /// Softmax gradient boosting over regression trees
    GradientBoosting,

    /// Multinomial logistic regression
    LogisticRegression,

    /// Platt-calibrated one-vs-rest linear SVM
    SVM,
}

impl ModelType {
    /// Training order; also the tie-break order of model selection
    pub const ALL: [ModelType; 4] = [
        ModelType::RandomForest,
        ModelType::GradientBoosting,
        ModelType::LogisticRegression,
        ModelType::SVM,
    ];

    /// Key used in artifact files and the results summary
    pub fn family_name(&self) -> &'static str {
        match self {
            ModelType::RandomForest => "random_forest",
            ModelType::GradientBoosting => "gradient_boosting",
            ModelType::LogisticRegression => "logistic_regression",
            ModelType::SVM => "svm",
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::RandomForest => write!(f, "Random Forest"),
            ModelType::GradientBoosting => write!(f, "Gradient Boosting"),
            ModelType::LogisticRegression => write!(f, "Logistic Regression"),
            ModelType::SVM => write!(f, "Support Vector Machine"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(labels: Vec<usize>) -> TrainingDataset {
        let n = labels.len();
        let features = Array2::from_shape_fn((n, 2), |(i, j)| (i * 2 + j) as f64);
        TrainingDataset::new(features, labels).unwrap()
    }

    #[test]
    fn test_training_dataset_shape() {
        let data = dataset(vec![0, 1, 0]);

        assert_eq!(data.n_samples, 3);
        assert_eq!(data.n_features, 2);
        assert_eq!(data.n_distinct_classes(), 2);
    }

    #[test]
    fn test_mismatched_labels_rejected() {
        let features = Array2::zeros((3, 2));
        assert!(TrainingDataset::new(features, vec![0, 1]).is_err());
    }

    #[test]
    fn test_stratified_split_preserves_proportions() {
        let labels: Vec<usize> = (0..100).map(|i| if i < 70 { 0 } else { 1 }).collect();
        let data = dataset(labels);
        let (train, test) = data.stratified_split(0.2, 42);

        assert_eq!(train.n_samples, 80);
        assert_eq!(test.n_samples, 20);
        assert_eq!(test.labels.iter().filter(|&&l| l == 0).count(), 14);
        assert_eq!(test.labels.iter().filter(|&&l| l == 1).count(), 6);
        assert_eq!(train.n_features, 2);
    }

    #[test]
    fn test_stratified_split_is_seeded() {
        let labels: Vec<usize> = (0..50).map(|i| i % 3).collect();
        let data = dataset(labels);
        let (a_train, a_test) = data.stratified_split(0.2, 7);
        let (b_train, b_test) = data.stratified_split(0.2, 7);

        assert_eq!(a_train.features, b_train.features);
        assert_eq!(a_test.labels, b_test.labels);
    }

    #[test]
    fn test_singleton_class_stays_in_training() {
        let data = dataset(vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        let (train, _) = data.stratified_split(0.5, 1);
        assert!(train.labels.contains(&1));
    }

    #[test]
    fn test_prediction_result_derives_severity() {
        let prediction = PredictionResult::new(EmergencyType::Fire, 0.85);
        assert_eq!(prediction.severity, Severity::Critical);
        assert_eq!(prediction.confidence, 0.85);
    }

    #[test]
    fn test_model_type_names() {
        assert_eq!(ModelType::LogisticRegression.to_string(), "Logistic Regression");
        assert_eq!(ModelType::SVM.family_name(), "svm");
        assert_eq!(ModelType::ALL[0], ModelType::RandomForest);
    }
}
