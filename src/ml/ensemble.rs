use crate::error::{AppError, Result};
use crate::ml::classifier::{ensure_trained, ndarray_to_densematrix, softmax_rows, Classifier};
use crate::ml::models::{ModelMetadata, ModelType, TrainingDataset};
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters, SplitCriterion,
};
use smartcore::tree::decision_tree_regressor::{
    DecisionTreeRegressor, DecisionTreeRegressorParameters,
};
use std::collections::BTreeMap;

type ClassificationTree = DecisionTreeClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>;
type RegressionTree = DecisionTreeRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// Bootstrap-bagged Gini trees; class probability is the share of tree votes
#[derive(Serialize, Deserialize)]
pub struct RandomForestClassifier {
    metadata: ModelMetadata,
    n_estimators: usize,
    seed: u64,
    n_classes: usize,
    trees: Vec<ClassificationTree>,
    trained: bool,
}

impl RandomForestClassifier {
    pub fn new(n_estimators: usize, seed: u64) -> Self {
        let hyperparameters: BTreeMap<String, String> = [
            ("n_estimators".to_string(), n_estimators.to_string()),
            ("seed".to_string(), seed.to_string()),
        ]
        .into_iter()
        .collect();

        Self {
            metadata: ModelMetadata::new(ModelType::RandomForest, hyperparameters),
            n_estimators,
            seed,
            n_classes: 0,
            trees: Vec::new(),
            trained: false,
        }
    }
}

impl Classifier for RandomForestClassifier {
    fn train(&mut self, dataset: &TrainingDataset, n_classes: usize) -> Result<()> {
        let n = dataset.n_samples;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut trees = Vec::with_capacity(self.n_estimators);

        for _ in 0..self.n_estimators {
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            let x = ndarray_to_densematrix(&dataset.features.select(ndarray::Axis(0), &sample));
            let y: Vec<i32> = sample.iter().map(|&i| dataset.labels[i] as i32).collect();

            let params = DecisionTreeClassifierParameters::default()
                .with_criterion(SplitCriterion::Gini);

            let tree = DecisionTreeClassifier::fit(&x, &y, params)
                .map_err(|e| AppError::Internal(format!("Failed to train decision tree: {}", e)))?;
            trees.push(tree);
        }

        self.trees = trees;
        self.n_classes = n_classes;
        self.trained = true;
        self.metadata.n_training_samples = dataset.n_samples;
        self.metadata.n_features = dataset.n_features;
        self.metadata.trained_at = chrono::Utc::now();

        Ok(())
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        ensure_trained(self.trained, ModelType::RandomForest)?;

        let x = ndarray_to_densematrix(features);
        let vote = 1.0 / self.trees.len() as f64;
        let mut proba = Array2::zeros((features.nrows(), self.n_classes));

        for tree in &self.trees {
            let votes = tree
                .predict(&x)
                .map_err(|e| AppError::Prediction(format!("Prediction failed: {}", e)))?;
            for (i, &class) in votes.iter().enumerate() {
                let class = class as usize;
                if class < self.n_classes {
                    proba[[i, class]] += vote;
                }
            }
        }

        Ok(proba)
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn model_type(&self) -> ModelType {
        ModelType::RandomForest
    }

    fn is_trained(&self) -> bool {
        self.trained
    }
}

/// Multiclass gradient boosting on the softmax loss.
///
/// Each round fits one shallow regression tree per class to the residual
/// `onehot - softmax(F)` and adds it to that class score with shrinkage.
/// Scores start from the log class priors.
#[derive(Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    metadata: ModelMetadata,
    n_rounds: usize,
    learning_rate: f64,
    max_depth: u16,
    n_classes: usize,
    initial_scores: Vec<f64>,
    stages: Vec<Vec<RegressionTree>>,
    trained: bool,
}

impl GradientBoostingClassifier {
    pub fn new(n_rounds: usize, learning_rate: f64, max_depth: u16) -> Self {
        let hyperparameters: BTreeMap<String, String> = [
            ("n_rounds".to_string(), n_rounds.to_string()),
            ("learning_rate".to_string(), learning_rate.to_string()),
            ("max_depth".to_string(), max_depth.to_string()),
        ]
        .into_iter()
        .collect();

        Self {
            metadata: ModelMetadata::new(ModelType::GradientBoosting, hyperparameters),
            n_rounds,
            learning_rate,
            max_depth,
            n_classes: 0,
            initial_scores: Vec::new(),
            stages: Vec::new(),
            trained: false,
        }
    }

    fn log_priors(labels: &[usize], n_classes: usize) -> Vec<f64> {
        let mut counts = vec![0usize; n_classes];
        for &label in labels {
            if label < n_classes {
                counts[label] += 1;
            }
        }
        let total = labels.len().max(1) as f64;
        counts
            .into_iter()
            .map(|count| (count as f64 / total).max(1e-12).ln())
            .collect()
    }
}

impl Classifier for GradientBoostingClassifier {
    fn train(&mut self, dataset: &TrainingDataset, n_classes: usize) -> Result<()> {
        let n = dataset.n_samples;
        let x = ndarray_to_densematrix(&dataset.features);
        let initial_scores = Self::log_priors(&dataset.labels, n_classes);

        let mut scores = Array2::from_shape_fn((n, n_classes), |(_, k)| initial_scores[k]);
        let mut stages = Vec::with_capacity(self.n_rounds);

        for _ in 0..self.n_rounds {
            let proba = softmax_rows(&scores);
            let mut stage = Vec::with_capacity(n_classes);

            for k in 0..n_classes {
                let residual: Vec<f64> = (0..n)
                    .map(|i| {
                        let target = if dataset.labels[i] == k { 1.0 } else { 0.0 };
                        target - proba[[i, k]]
                    })
                    .collect();

                let params = DecisionTreeRegressorParameters::default()
                    .with_max_depth(self.max_depth);
                let tree = DecisionTreeRegressor::fit(&x, &residual, params).map_err(|e| {
                    AppError::Internal(format!("Failed to train boosting stage: {}", e))
                })?;

                let update = tree
                    .predict(&x)
                    .map_err(|e| AppError::Internal(format!("Boosting stage failed: {}", e)))?;
                for (i, value) in update.iter().enumerate() {
                    scores[[i, k]] += self.learning_rate * value;
                }
                stage.push(tree);
            }

            stages.push(stage);
        }

        self.initial_scores = initial_scores;
        self.stages = stages;
        self.n_classes = n_classes;
        self.trained = true;
        self.metadata.n_training_samples = dataset.n_samples;
        self.metadata.n_features = dataset.n_features;
        self.metadata.trained_at = chrono::Utc::now();

        Ok(())
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        ensure_trained(self.trained, ModelType::GradientBoosting)?;

        let x = ndarray_to_densematrix(features);
        let initial = Array1::from_vec(self.initial_scores.clone());
        let mut scores = Array2::from_shape_fn((features.nrows(), self.n_classes), |(_, k)| {
            initial[k]
        });

        for stage in &self.stages {
            for (k, tree) in stage.iter().enumerate() {
                let update = tree
                    .predict(&x)
                    .map_err(|e| AppError::Prediction(format!("Prediction failed: {}", e)))?;
                for (i, value) in update.iter().enumerate() {
                    scores[[i, k]] += self.learning_rate * value;
                }
            }
        }

        Ok(softmax_rows(&scores))
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn model_type(&self) -> ModelType {
        ModelType::GradientBoosting
    }

    fn is_trained(&self) -> bool {
        self.trained
    }
}
