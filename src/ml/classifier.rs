use crate::config::TrainingSettings;
use crate::error::{AppError, Result};
use crate::ml::ensemble::{GradientBoostingClassifier, RandomForestClassifier};
use crate::ml::linear::{LogisticRegressionClassifier, SvmClassifier};
use crate::ml::models::{ClassMetrics, ModelMetadata, ModelMetrics, ModelType, TrainingDataset};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::collections::BTreeMap;

/// Trait for classifiers
pub trait Classifier: Send + Sync {
    /// Fit on a preprocessed dataset whose labels are ids in `0..n_classes`
    fn train(&mut self, dataset: &TrainingDataset, n_classes: usize) -> Result<()>;

    /// Class probabilities, one row per sample and one column per class id
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>>;

    /// Predict class ids
    fn predict(&self, features: &Array2<f64>) -> Result<Vec<usize>> {
        Ok(argmax_rows(&self.predict_proba(features)?))
    }

    /// Get model metadata
    fn metadata(&self) -> &ModelMetadata;

    /// Get model type
    fn model_type(&self) -> ModelType;

    /// Check if model is trained
    fn is_trained(&self) -> bool;
}

/// A classifier of any family, in persistable form
#[derive(Serialize, Deserialize)]
pub enum ClassifierModel {
    RandomForest(RandomForestClassifier),
    GradientBoosting(GradientBoostingClassifier),
    LogisticRegression(LogisticRegressionClassifier),
    Svm(SvmClassifier),
}

impl ClassifierModel {
    /// Create an untrained classifier of the given family
    pub fn new(model_type: ModelType, settings: &TrainingSettings) -> Self {
        match model_type {
            ModelType::RandomForest => ClassifierModel::RandomForest(RandomForestClassifier::new(
                settings.n_estimators,
                settings.seed,
            )),
            ModelType::GradientBoosting => {
                ClassifierModel::GradientBoosting(GradientBoostingClassifier::new(
                    settings.boosting_rounds,
                    settings.learning_rate,
                    settings.boosting_max_depth,
                ))
            }
            ModelType::LogisticRegression => ClassifierModel::LogisticRegression(
                LogisticRegressionClassifier::new(settings.logistic_max_iterations),
            ),
            ModelType::SVM => ClassifierModel::Svm(SvmClassifier::new(settings.svm_c)),
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            ClassifierModel::RandomForest(model) => model,
            ClassifierModel::GradientBoosting(model) => model,
            ClassifierModel::LogisticRegression(model) => model,
            ClassifierModel::Svm(model) => model,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            ClassifierModel::RandomForest(model) => model,
            ClassifierModel::GradientBoosting(model) => model,
            ClassifierModel::LogisticRegression(model) => model,
            ClassifierModel::Svm(model) => model,
        }
    }
}

impl Classifier for ClassifierModel {
    fn train(&mut self, dataset: &TrainingDataset, n_classes: usize) -> Result<()> {
        self.inner_mut().train(dataset, n_classes)
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        self.inner().predict_proba(features)
    }

    fn metadata(&self) -> &ModelMetadata {
        self.inner().metadata()
    }

    fn model_type(&self) -> ModelType {
        self.inner().model_type()
    }

    fn is_trained(&self) -> bool {
        self.inner().is_trained()
    }
}

pub(crate) fn ndarray_to_densematrix(arr: &Array2<f64>) -> DenseMatrix<f64> {
    let shape = arr.shape();
    let data: Vec<f64> = arr.iter().copied().collect();
    DenseMatrix::new(shape[0], shape[1], data, false)
}

pub(crate) fn ensure_trained(trained: bool, model_type: ModelType) -> Result<()> {
    if trained {
        Ok(())
    } else {
        Err(AppError::Prediction(format!("{} model not trained", model_type)))
    }
}

/// Index of the largest value per row; the first one wins ties
pub fn argmax_rows(proba: &Array2<f64>) -> Vec<usize> {
    proba
        .axis_iter(Axis(0))
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f64::NEG_INFINITY), |(best, best_value), (i, &value)| {
                    if value > best_value {
                        (i, value)
                    } else {
                        (best, best_value)
                    }
                })
                .0
        })
        .collect()
}

/// Row-wise softmax of raw scores
pub fn softmax_rows(scores: &Array2<f64>) -> Array2<f64> {
    let mut proba = scores.clone();
    for mut row in proba.axis_iter_mut(Axis(0)) {
        let max = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        row.mapv_inplace(|v| (v - max).exp());
        let total = row.sum();
        row.mapv_inplace(|v| v / total);
    }
    proba
}

/// Accuracy and per-class precision/recall/F1 of predictions against ground truth
pub fn calculate_metrics(y_true: &[usize], y_pred: &[usize], class_names: &[String]) -> ModelMetrics {
    let n_samples = y_true.len();
    let n_classes = class_names.len();
    if n_samples == 0 || n_classes == 0 {
        return ModelMetrics::new();
    }

    let mut confusion = Array2::<usize>::zeros((n_classes, n_classes));
    for (&t, &p) in y_true.iter().zip(y_pred.iter()) {
        if t < n_classes && p < n_classes {
            confusion[[t, p]] += 1;
        }
    }

    let correct = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    let accuracy = correct as f64 / n_samples as f64;

    let mut per_class = BTreeMap::new();
    let mut weighted_f1 = 0.0;

    for (class_idx, name) in class_names.iter().enumerate() {
        let tp = confusion[[class_idx, class_idx]];
        let predicted = confusion.column(class_idx).sum();
        let support = confusion.row(class_idx).sum();

        let precision = if predicted > 0 {
            tp as f64 / predicted as f64
        } else {
            0.0
        };

        let recall = if support > 0 {
            tp as f64 / support as f64
        } else {
            0.0
        };

        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        weighted_f1 += f1 * support as f64;
        per_class.insert(
            name.clone(),
            ClassMetrics {
                precision,
                recall,
                f1_score: f1,
                support,
            },
        );
    }

    // Calculate macro-averaged metrics
    let avg_precision: f64 =
        per_class.values().map(|m| m.precision).sum::<f64>() / n_classes as f64;
    let avg_recall: f64 = per_class.values().map(|m| m.recall).sum::<f64>() / n_classes as f64;
    let avg_f1: f64 = per_class.values().map(|m| m.f1_score).sum::<f64>() / n_classes as f64;

    ModelMetrics {
        accuracy,
        precision: avg_precision,
        recall: avg_recall,
        f1_score: avg_f1,
        weighted_f1_score: weighted_f1 / n_samples as f64,
        confusion_matrix: Some(confusion),
        per_class_metrics: per_class,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_test_dataset(n_samples: usize) -> TrainingDataset {
        // three blobs on the corners of a triangle
        let mut rows = Vec::with_capacity(n_samples * 2);
        let mut labels = Vec::with_capacity(n_samples);
        for i in 0..n_samples {
            let class = i % 3;
            let jitter = (i as f64 * 0.37).sin() * 0.3;
            rows.push(if class == 1 { 3.0 } else { 0.0 } + jitter);
            rows.push(if class == 2 { 3.0 } else { 0.0 } - jitter * 0.5);
            labels.push(class);
        }
        let features = Array2::from_shape_vec((n_samples, 2), rows).unwrap();
        TrainingDataset::new(features, labels).unwrap()
    }

    fn small_settings() -> TrainingSettings {
        TrainingSettings {
            n_estimators: 15,
            boosting_rounds: 20,
            logistic_max_iterations: 200,
            ..TrainingSettings::default()
        }
    }

    #[test]
    fn test_every_family_learns_separable_data() {
        let dataset = create_test_dataset(90);
        for model_type in ModelType::ALL {
            let mut classifier = ClassifierModel::new(model_type, &small_settings());
            assert!(!classifier.is_trained());

            classifier.train(&dataset, 3).unwrap();
            assert!(classifier.is_trained());
            assert_eq!(classifier.model_type(), model_type);
            assert_eq!(classifier.metadata().n_training_samples, 90);

            let predictions = classifier.predict(&dataset.features).unwrap();
            let correct = predictions
                .iter()
                .zip(dataset.labels.iter())
                .filter(|(p, t)| p == t)
                .count();
            assert!(
                correct as f64 / 90.0 > 0.9,
                "{} only got {} right",
                model_type,
                correct
            );
        }
    }

    #[test]
    fn test_probabilities_are_distributions() {
        let dataset = create_test_dataset(60);
        for model_type in ModelType::ALL {
            let mut classifier = ClassifierModel::new(model_type, &small_settings());
            classifier.train(&dataset, 3).unwrap();

            let proba = classifier.predict_proba(&dataset.features).unwrap();
            assert_eq!(proba.shape(), &[60, 3]);
            for row in proba.axis_iter(Axis(0)) {
                assert!((row.sum() - 1.0).abs() < 1e-6, "{} row sums to {}", model_type, row.sum());
                assert!(row.iter().all(|p| (0.0..=1.0).contains(p)));
            }
        }
    }

    #[test]
    fn test_untrained_model_refuses_to_predict() {
        let classifier = ClassifierModel::new(ModelType::LogisticRegression, &small_settings());
        let err = classifier.predict_proba(&Array2::zeros((1, 2))).unwrap_err();
        assert_eq!(err.error_code(), "PREDICTION_ERROR");
    }

    #[test]
    fn test_argmax_first_wins_ties() {
        let proba = array![[0.2, 0.4, 0.4], [0.9, 0.05, 0.05]];
        assert_eq!(argmax_rows(&proba), vec![1, 0]);
    }

    #[test]
    fn test_softmax_rows_normalizes() {
        let proba = softmax_rows(&array![[1000.0, 1000.0], [0.0, f64::NEG_INFINITY]]);
        assert!((proba[[0, 0]] - 0.5).abs() < 1e-12);
        assert_eq!(proba[[1, 0]], 1.0);
        assert_eq!(proba[[1, 1]], 0.0);
    }

    #[test]
    fn test_calculate_metrics() {
        let names: Vec<String> = vec!["a".into(), "b".into()];
        let metrics = calculate_metrics(&[0, 0, 1, 1], &[0, 1, 1, 1], &names);

        assert_eq!(metrics.accuracy, 0.75);
        let a = &metrics.per_class_metrics["a"];
        assert_eq!(a.precision, 1.0);
        assert_eq!(a.recall, 0.5);
        assert_eq!(a.support, 2);
        let b = &metrics.per_class_metrics["b"];
        assert!((b.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(b.recall, 1.0);
        assert_eq!(metrics.confusion_matrix.unwrap(), array![[1, 1], [0, 2]]);
    }
}
