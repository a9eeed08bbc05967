use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Dataset and artifact locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Synthetic data generation
    #[serde(default)]
    pub generator: GeneratorSettings,

    /// Model training
    #[serde(default)]
    pub training: TrainingSettings,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from file and environment
    pub fn load() -> std::result::Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/default.toml".to_string());

        config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: EMERGENCY__)
            .add_source(
                config::Environment::with_prefix("EMERGENCY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Reject values the trainer cannot work with
    pub fn validate(&self) -> Result<()> {
        let training = &self.training;
        if !(training.test_size > 0.0 && training.test_size < 1.0) {
            return Err(AppError::Configuration(format!(
                "training.test_size must be in (0, 1), got {}",
                training.test_size
            )));
        }
        if training.n_estimators == 0 || training.boosting_rounds == 0 {
            return Err(AppError::Configuration(
                "training.n_estimators and training.boosting_rounds must be at least 1"
                    .to_string(),
            ));
        }
        if training.learning_rate <= 0.0 {
            return Err(AppError::Configuration(format!(
                "training.learning_rate must be positive, got {}",
                training.learning_rate
            )));
        }
        if !(0.0..1.0).contains(&self.generator.outlier_fraction) {
            return Err(AppError::Configuration(format!(
                "generator.outlier_fraction must be in [0, 1), got {}",
                self.generator.outlier_fraction
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Generated dataset consumed by the trainer
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,

    /// Directory holding the persisted artifact set
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            dataset_path: default_dataset_path(),
            model_dir: default_model_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorSettings {
    /// Number of hourly records to generate
    #[serde(default = "default_num_records")]
    pub num_records: usize,

    /// Seed shared by both random streams
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Share of rows receiving injected sensor noise
    #[serde(default = "default_outlier_fraction")]
    pub outlier_fraction: f64,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            num_records: default_num_records(),
            seed: default_seed(),
            outlier_fraction: default_outlier_fraction(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSettings {
    /// Held-out share of the dataset
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    /// Seed for the split and every randomized family
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Trees in the bagging ensemble
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,

    /// Boosting stages
    #[serde(default = "default_boosting_rounds")]
    pub boosting_rounds: usize,

    /// Shrinkage applied to each boosting stage
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// Depth of the boosting regression trees
    #[serde(default = "default_boosting_max_depth")]
    pub boosting_max_depth: u16,

    /// Optimizer iterations for logistic regression
    #[serde(default = "default_logistic_max_iterations")]
    pub logistic_max_iterations: u64,

    /// SVM soft-margin penalty
    #[serde(default = "default_svm_c")]
    pub svm_c: f64,
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            test_size: default_test_size(),
            seed: default_seed(),
            n_estimators: default_n_estimators(),
            boosting_rounds: default_boosting_rounds(),
            learning_rate: default_learning_rate(),
            boosting_max_depth: default_boosting_max_depth(),
            logistic_max_iterations: default_logistic_max_iterations(),
            svm_c: default_svm_c(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("ml_models/training_data/emergency_data.csv")
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("ml_models/trained")
}

fn default_num_records() -> usize {
    1000
}

fn default_seed() -> u64 {
    42
}

fn default_outlier_fraction() -> f64 {
    0.01
}

fn default_test_size() -> f64 {
    0.2
}

fn default_n_estimators() -> usize {
    100
}

fn default_boosting_rounds() -> usize {
    100
}

fn default_learning_rate() -> f64 {
    0.1
}

fn default_boosting_max_depth() -> u16 {
    3
}

fn default_logistic_max_iterations() -> u64 {
    1000
}

fn default_svm_c() -> f64 {
    1.0
}

fn default_log_level() -> String {
    "info".to_string()
}
