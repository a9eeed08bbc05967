/// Machine learning pipeline for emergency classification
///
/// This module provides:
/// - Timestamp decomposition, label encoding, mean imputation and standard scaling
/// - Four classifier families (bagged trees, boosted trees, logistic regression, linear SVM)
/// - Training with stratified hold-out evaluation and best-model selection
/// - Versioned artifact persistence
/// - A predictor with atomic reload for single and batch inference

pub mod artifacts;
pub mod classifier;
pub mod ensemble;
pub mod features;
pub mod linear;
pub mod models;
pub mod service;
pub mod trainer;

pub use artifacts::{ArtifactHeader, ArtifactSet, FamilySummary, FORMAT_VERSION};
pub use classifier::{calculate_metrics, Classifier, ClassifierModel};
pub use ensemble::{GradientBoostingClassifier, RandomForestClassifier};
pub use features::{FeaturePreprocessor, LabelEncoder, MeanImputer, StandardScaler};
pub use linear::{LogisticRegressionClassifier, SvmClassifier};
pub use models::{
    ClassMetrics, ModelMetadata, ModelMetrics, ModelType, PredictionResult, TrainingDataset,
};
pub use service::{Predictor, PredictorStatus};
pub use trainer::{Trainer, TrainingOutcome, TrainingReport};
