//! Shared fixtures for the integration tests
//!
//! Small datasets and reduced ensemble sizes keep a full train/persist/load
//! cycle fast enough to run per test.

#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use emergency_predictor::config::TrainingSettings;
use emergency_predictor::generator::{write_dataset, GeneratorConfig, SyntheticDataGenerator};
use emergency_predictor::ml::{Trainer, TrainingOutcome};
use emergency_predictor::models::LabeledSample;
use std::path::{Path, PathBuf};

pub fn fixed_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn fast_settings() -> TrainingSettings {
    TrainingSettings {
        n_estimators: 10,
        boosting_rounds: 10,
        logistic_max_iterations: 200,
        ..TrainingSettings::default()
    }
}

pub fn generate_samples(num_records: usize, seed: u64) -> Vec<LabeledSample> {
    SyntheticDataGenerator::new(GeneratorConfig {
        seed,
        outlier_fraction: 0.01,
    })
    .generate_from(fixed_start(), num_records)
    .unwrap()
}

/// Generate a dataset and write it under `dir`
pub fn write_generated_dataset(dir: &Path, num_records: usize, seed: u64) -> PathBuf {
    let path = dir.join("data").join("emergency_data.csv");
    write_dataset(&path, &generate_samples(num_records, seed)).unwrap();
    path
}

/// Generate, train and persist into `dir/model`
pub fn train_model(dir: &Path, seed: u64) -> (PathBuf, TrainingOutcome) {
    let dataset = write_generated_dataset(dir, 300, seed);
    let model_dir = dir.join("model");
    let outcome = Trainer::new(fast_settings(), &model_dir)
        .train_file(&dataset)
        .unwrap();
    (model_dir, outcome)
}
