use crate::error::{AppError, Result};
use crate::ml::classifier::{ensure_trained, softmax_rows, Classifier};
use crate::ml::models::{ModelMetadata, ModelType, TrainingDataset};
use linfa::prelude::*;
use linfa_logistic::MultiLogisticRegression;
use linfa_svm::Svm;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Multinomial logistic regression.
///
/// Only the fitted coefficients are kept: `weights` is `(n_features, n_classes)`
/// with columns in class-id order, so scoring is `softmax(x · W + b)`.
#[derive(Serialize, Deserialize)]
pub struct LogisticRegressionClassifier {
    metadata: ModelMetadata,
    max_iterations: u64,
    weights: Array2<f64>,
    intercept: Array1<f64>,
    trained: bool,
}

impl LogisticRegressionClassifier {
    pub fn new(max_iterations: u64) -> Self {
        let hyperparameters: BTreeMap<String, String> =
            [("max_iterations".to_string(), max_iterations.to_string())]
                .into_iter()
                .collect();

        Self {
            metadata: ModelMetadata::new(ModelType::LogisticRegression, hyperparameters),
            max_iterations,
            weights: Array2::zeros((0, 0)),
            intercept: Array1::zeros(0),
            trained: false,
        }
    }
}

impl Classifier for LogisticRegressionClassifier {
    fn train(&mut self, dataset: &TrainingDataset, n_classes: usize) -> Result<()> {
        let targets = Array1::from_vec(dataset.labels.clone());
        let linfa_dataset = Dataset::new(dataset.features.clone(), targets);

        let model = MultiLogisticRegression::default()
            .max_iterations(self.max_iterations)
            .fit(&linfa_dataset)
            .map_err(|e| {
                AppError::Internal(format!("Failed to train logistic regression: {}", e))
            })?;

        // Classes absent from the training split never win
        let mut weights = Array2::zeros((dataset.n_features, n_classes));
        let mut intercept = Array1::from_elem(n_classes, f64::NEG_INFINITY);
        for (column, &class) in model.classes().iter().enumerate() {
            if class < n_classes {
                weights
                    .column_mut(class)
                    .assign(&model.params().column(column));
                intercept[class] = model.intercept()[column];
            }
        }

        self.weights = weights;
        self.intercept = intercept;
        self.trained = true;
        self.metadata.n_training_samples = dataset.n_samples;
        self.metadata.n_features = dataset.n_features;
        self.metadata.trained_at = chrono::Utc::now();

        Ok(())
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        ensure_trained(self.trained, ModelType::LogisticRegression)?;
        let scores = features.dot(&self.weights) + &self.intercept;
        Ok(softmax_rows(&scores))
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn model_type(&self) -> ModelType {
        ModelType::LogisticRegression
    }

    fn is_trained(&self) -> bool {
        self.trained
    }
}

/// One linear machine of the one-vs-rest SVM, with its Platt sigmoid
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OneVsRestMachine {
    class_id: usize,
    weights: Array1<f64>,
    rho: f64,
    platt_a: f64,
    platt_b: f64,
}

impl OneVsRestMachine {
    fn decision_values(&self, features: &Array2<f64>) -> Array1<f64> {
        features.dot(&self.weights) - self.rho
    }
}

/// One-vs-rest linear SVM with Platt-scaled probabilities normalized across classes
#[derive(Serialize, Deserialize)]
pub struct SvmClassifier {
    metadata: ModelMetadata,
    c: f64,
    n_classes: usize,
    machines: Vec<OneVsRestMachine>,
    trained: bool,
}

impl SvmClassifier {
    pub fn new(c: f64) -> Self {
        let hyperparameters: BTreeMap<String, String> =
            [("c".to_string(), c.to_string()), ("kernel".to_string(), "linear".to_string())]
                .into_iter()
                .collect();

        Self {
            metadata: ModelMetadata::new(ModelType::SVM, hyperparameters),
            c,
            n_classes: 0,
            machines: Vec::new(),
            trained: false,
        }
    }
}

impl Classifier for SvmClassifier {
    fn train(&mut self, dataset: &TrainingDataset, n_classes: usize) -> Result<()> {
        let mut machines = Vec::with_capacity(n_classes);

        for class_id in 0..n_classes {
            let positives: Vec<bool> = dataset.labels.iter().map(|&l| l == class_id).collect();
            if !positives.iter().any(|&p| p) {
                continue;
            }

            let targets = Array1::from_vec(positives.clone());
            let linfa_dataset = Dataset::new(dataset.features.clone(), targets);

            let svm = Svm::<_, bool>::params()
                .pos_neg_weights(self.c, self.c)
                .linear_kernel()
                .fit(&linfa_dataset)
                .map_err(|e| AppError::Internal(format!("Failed to train SVM: {}", e)))?;

            // w = sum(alpha_i * x_i)
            let mut weights = Array1::zeros(dataset.n_features);
            for (i, &alpha) in svm.alpha.iter().enumerate() {
                weights.scaled_add(alpha, &dataset.features.row(i));
            }

            let mut machine = OneVsRestMachine {
                class_id,
                weights,
                rho: svm.rho,
                platt_a: 0.0,
                platt_b: 0.0,
            };
            let decisions = machine.decision_values(&dataset.features).to_vec();
            let (a, b) = fit_platt(&decisions, &positives);
            machine.platt_a = a;
            machine.platt_b = b;

            tracing::debug!(class_id, platt_a = a, platt_b = b, "Fitted one-vs-rest machine");
            machines.push(machine);
        }

        self.machines = machines;
        self.n_classes = n_classes;
        self.trained = true;
        self.metadata.n_training_samples = dataset.n_samples;
        self.metadata.n_features = dataset.n_features;
        self.metadata.trained_at = chrono::Utc::now();

        Ok(())
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Array2<f64>> {
        ensure_trained(self.trained, ModelType::SVM)?;

        let mut proba = Array2::zeros((features.nrows(), self.n_classes));
        for machine in &self.machines {
            let decisions = machine.decision_values(features);
            for (i, &f) in decisions.iter().enumerate() {
                proba[[i, machine.class_id]] = platt_probability(f, machine.platt_a, machine.platt_b);
            }
        }

        for mut row in proba.axis_iter_mut(Axis(0)) {
            let total = row.sum();
            if total > 0.0 {
                row.mapv_inplace(|p| p / total);
            } else {
                row.fill(1.0 / self.n_classes as f64);
            }
        }

        Ok(proba)
    }

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn model_type(&self) -> ModelType {
        ModelType::SVM
    }

    fn is_trained(&self) -> bool {
        self.trained
    }
}

/// `P(positive | f) = 1 / (1 + exp(a * f + b))`
fn platt_probability(f: f64, a: f64, b: f64) -> f64 {
    let z = a * f + b;
    if z >= 0.0 {
        let e = (-z).exp();
        e / (1.0 + e)
    } else {
        1.0 / (1.0 + z.exp())
    }
}

/// `ln(1 + exp(z))` without overflow
fn log1p_exp(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

/// Fit the Platt sigmoid by Newton's method with backtracking on the
/// regularized targets `(n+ + 1) / (n+ + 2)` and `1 / (n- + 2)`.
fn fit_platt(decisions: &[f64], positives: &[bool]) -> (f64, f64) {
    const MAX_ITERATIONS: usize = 100;
    const MIN_STEP: f64 = 1e-10;
    const SIGMA: f64 = 1e-12;
    const TOLERANCE: f64 = 1e-5;

    let n_pos = positives.iter().filter(|&&p| p).count() as f64;
    let n_neg = positives.len() as f64 - n_pos;
    let hi = (n_pos + 1.0) / (n_pos + 2.0);
    let lo = 1.0 / (n_neg + 2.0);
    let targets: Vec<f64> = positives.iter().map(|&p| if p { hi } else { lo }).collect();

    let objective = |a: f64, b: f64| -> f64 {
        decisions
            .iter()
            .zip(&targets)
            .map(|(&f, &t)| {
                let z = a * f + b;
                log1p_exp(z) - (1.0 - t) * z
            })
            .sum()
    };

    let mut a = 0.0;
    let mut b = ((n_neg + 1.0) / (n_pos + 1.0)).ln();
    let mut value = objective(a, b);

    for _ in 0..MAX_ITERATIONS {
        let (mut g_a, mut g_b) = (0.0, 0.0);
        let (mut h_aa, mut h_ab, mut h_bb) = (SIGMA, 0.0, SIGMA);
        for (&f, &t) in decisions.iter().zip(&targets) {
            // d/dz of the loss is sigmoid(z) - (1 - t)
            let s = 1.0 - platt_probability(f, a, b);
            let d = s - (1.0 - t);
            let h = s * (1.0 - s);
            g_a += d * f;
            g_b += d;
            h_aa += h * f * f;
            h_ab += h * f;
            h_bb += h;
        }

        if g_a.abs() < TOLERANCE && g_b.abs() < TOLERANCE {
            break;
        }

        let det = h_aa * h_bb - h_ab * h_ab;
        if det.abs() < f64::EPSILON {
            break;
        }
        let d_a = -(h_bb * g_a - h_ab * g_b) / det;
        let d_b = -(h_aa * g_b - h_ab * g_a) / det;
        let slope = g_a * d_a + g_b * d_b;

        let mut step = 1.0;
        let mut improved = false;
        while step >= MIN_STEP {
            let (next_a, next_b) = (a + step * d_a, b + step * d_b);
            let next_value = objective(next_a, next_b);
            if next_value < value + 1e-4 * step * slope {
                a = next_a;
                b = next_b;
                value = next_value;
                improved = true;
                break;
            }
            step /= 2.0;
        }

        if !improved {
            break;
        }
    }

    (a, b)
}
