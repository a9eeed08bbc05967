use crate::config::TrainingSettings;
use crate::error::{AppError, Result};
use crate::generator::{read_dataset, RawDatasetRow};
use crate::ml::artifacts::{ArtifactSet, FamilySummary};
use crate::ml::classifier::{calculate_metrics, Classifier, ClassifierModel};
use crate::ml::features::{rows_to_matrix, FeaturePreprocessor, LabelEncoder};
use crate::ml::models::{ModelMetrics, ModelType, TrainingDataset};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Fitted classifier of one family with its held-out evaluation
#[derive(Clone, Serialize)]
pub struct TrainingReport {
    pub family: ModelType,
    pub accuracy: f64,
    pub metrics: ModelMetrics,
    #[serde(skip)]
    pub model: Arc<ClassifierModel>,
}

/// Result of a training run
pub struct TrainingOutcome {
    pub run_id: Uuid,
    /// One report per family, in training order
    pub reports: Vec<TrainingReport>,
    pub best: ModelType,
    /// The selected classifier with the preprocessing it was trained against
    pub artifacts: ArtifactSet,
}

impl TrainingOutcome {
    /// `{family: {accuracy}}` summary persisted next to the artifacts
    pub fn summary(&self) -> BTreeMap<String, FamilySummary> {
        self.reports
            .iter()
            .map(|r| {
                (
                    r.family.family_name().to_string(),
                    FamilySummary {
                        accuracy: r.accuracy,
                    },
                )
            })
            .collect()
    }
}

/// Fits every classifier family, keeps the most accurate one and persists it
pub struct Trainer {
    settings: TrainingSettings,
    model_dir: PathBuf,
}

impl Trainer {
    pub fn new(settings: TrainingSettings, model_dir: impl Into<PathBuf>) -> Self {
        Self {
            settings,
            model_dir: model_dir.into(),
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Read a dataset file, train on it and persist the winning artifact set
    pub fn train_file(&self, dataset_path: &Path) -> Result<TrainingOutcome> {
        let rows = read_dataset(dataset_path)?;
        info!(path = %dataset_path.display(), rows = rows.len(), "Loaded dataset");
        self.train(&rows)
    }

    /// Train on already-read rows and persist the winning artifact set.
    ///
    /// Nothing is written unless every family trained successfully.
    pub fn train(&self, rows: &[RawDatasetRow]) -> Result<TrainingOutcome> {
        let outcome = self.fit(rows)?;
        outcome.artifacts.save(&self.model_dir, &outcome.summary())?;
        Ok(outcome)
    }

    /// Train and select without touching the filesystem
    pub fn fit(&self, rows: &[RawDatasetRow]) -> Result<TrainingOutcome> {
        if rows.is_empty() {
            return Err(AppError::Data("Dataset has no rows".to_string()));
        }

        let (raw, labels) = rows_to_matrix(rows)?;
        let encoder = LabelEncoder::fit(&labels);
        if encoder.n_classes() < 2 {
            return Err(AppError::Data(format!(
                "Need at least two distinct classes, found {}",
                encoder.n_classes()
            )));
        }

        let dataset = TrainingDataset::new(raw, encoder.transform_all(&labels)?)?;
        let (train, test) = dataset.stratified_split(self.settings.test_size, self.settings.seed);
        if test.n_samples == 0 {
            return Err(AppError::Data(format!(
                "{} rows are too few to hold out a test split",
                dataset.n_samples
            )));
        }
        info!(
            train_rows = train.n_samples,
            test_rows = test.n_samples,
            classes = encoder.n_classes(),
            "Split dataset"
        );

        let preprocessor = FeaturePreprocessor::fit(&train.features)?;
        let train = TrainingDataset::new(preprocessor.transform(&train.features)?, train.labels)?;
        let test_features = preprocessor.transform(&test.features)?;
        let class_names: Vec<String> = encoder.classes().iter().map(|c| c.to_string()).collect();

        let mut reports: Vec<TrainingReport> = Vec::with_capacity(ModelType::ALL.len());
        let mut best: Option<usize> = None;

        for model_type in ModelType::ALL {
            info!(family = model_type.family_name(), "Training classifier");

            let mut model = ClassifierModel::new(model_type, &self.settings);
            model.train(&train, encoder.n_classes())?;

            let predictions = model.predict(&test_features)?;
            let metrics = calculate_metrics(&test.labels, &predictions, &class_names);
            let accuracy = metrics.accuracy;

            info!(
                family = model_type.family_name(),
                accuracy = accuracy,
                macro_f1 = metrics.f1_score,
                "Evaluated classifier"
            );

            // Strictly greater: on a tie the earlier family stays selected
            let replace = match best {
                Some(i) => accuracy > reports[i].accuracy,
                None => true,
            };
            if replace {
                best = Some(reports.len());
            }

            reports.push(TrainingReport {
                family: model_type,
                accuracy,
                metrics,
                model: Arc::new(model),
            });
        }

        let winner = best
            .map(|i| &reports[i])
            .ok_or_else(|| AppError::Internal("No classifier was trained".to_string()))?;
        let best_type = winner.family;
        let classifier = Arc::clone(&winner.model);
        info!(
            family = best_type.family_name(),
            accuracy = winner.accuracy,
            "Selected best classifier"
        );

        let run_id = Uuid::new_v4();
        Ok(TrainingOutcome {
            run_id,
            reports,
            best: best_type,
            artifacts: ArtifactSet::new(run_id, classifier, preprocessor, encoder),
        })
    }
}
