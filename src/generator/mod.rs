/// Synthetic training data
///
/// This module provides:
/// - A seeded generator simulating hourly environmental readings and emergency outcomes
/// - The probabilistic label model used to decide whether an emergency occurs
/// - Reading and writing the CSV dataset exchanged with the trainer

pub mod dataset;
pub mod synthetic;

pub use dataset::{read_dataset, write_dataset, RawDatasetRow, DATASET_COLUMNS};
pub use synthetic::{emergency_probability, GeneratorConfig, SyntheticDataGenerator};
