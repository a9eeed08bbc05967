/// Integration tests for the generator → dataset file → preprocessor contract
mod common;

use emergency_predictor::{
    generator::{read_dataset, write_dataset, DATASET_COLUMNS},
    ml::features::rows_to_matrix,
    models::{EmergencyType, FEATURE_COUNT},
};
use std::collections::BTreeMap;

#[test]
fn test_dataset_file_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let first = dir.path().join("first.csv");
    let second = dir.path().join("second.csv");

    write_dataset(&first, &common::generate_samples(500, 42)).unwrap();
    write_dataset(&second, &common::generate_samples(500, 42)).unwrap();
    assert_eq!(std::fs::read(&first).unwrap(), std::fs::read(&second).unwrap());

    let other = dir.path().join("other.csv");
    write_dataset(&other, &common::generate_samples(500, 43)).unwrap();
    assert_ne!(std::fs::read(&first).unwrap(), std::fs::read(&other).unwrap());
}

#[test]
fn test_generated_file_feeds_the_preprocessor() {
    let dir = tempfile::tempdir().unwrap();
    let path = common::write_generated_dataset(dir.path(), 400, 42);

    let header = std::fs::read_to_string(&path).unwrap();
    assert_eq!(header.lines().next().unwrap(), DATASET_COLUMNS.join(","));

    let rows = read_dataset(&path).unwrap();
    assert_eq!(rows.len(), 400);

    let (matrix, labels) = rows_to_matrix(&rows).unwrap();
    assert_eq!(matrix.shape(), &[400, FEATURE_COUNT]);
    assert!(matrix.iter().all(|v| v.is_finite()));

    let mut counts: BTreeMap<EmergencyType, usize> = BTreeMap::new();
    for label in labels {
        *counts.entry(label).or_default() += 1;
    }
    assert!(counts.len() >= 2, "expected several classes, got {:?}", counts);
    assert!(counts.contains_key(&EmergencyType::None));
}

#[test]
fn test_probabilities_and_labels_agree() {
    for sample in common::generate_samples(1000, 3) {
        assert!((0.01..=0.95).contains(&sample.emergency_probability));
        assert_eq!(
            sample.features.month,
            chrono::Datelike::month(&sample.timestamp) as f64
        );
    }
}
