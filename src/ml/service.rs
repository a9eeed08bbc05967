use crate::error::{AppError, Result};
use crate::ml::artifacts::ArtifactSet;
use crate::ml::models::PredictionResult;
use crate::models::{EmergencyType, FeatureRecord};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// An artifact set together with the moment it became active
struct LoadedModel {
    artifacts: ArtifactSet,
    loaded_at: DateTime<Utc>,
}

/// Serves predictions from the most recently loaded artifact set.
///
/// The active set sits behind an `Arc`; `load`/`reload` build the new set
/// completely and then swap the pointer, so a prediction always runs against
/// one consistent {classifier, scaler, label encoder} triple.
pub struct Predictor {
    model_dir: PathBuf,
    current: RwLock<Option<Arc<LoadedModel>>>,
}

/// Snapshot of what the predictor is serving
#[derive(Debug, Clone, Serialize)]
pub struct PredictorStatus {
    pub loaded: bool,
    pub model_dir: PathBuf,
    pub family: Option<String>,
    pub run_id: Option<Uuid>,
    pub trained_at: Option<DateTime<Utc>>,
    pub loaded_at: Option<DateTime<Utc>>,
    pub classes: Vec<EmergencyType>,
    pub n_features: Option<usize>,
}

impl Predictor {
    /// Create an empty predictor for the given artifact directory
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            current: RwLock::new(None),
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Load the artifact set from disk
    pub fn load(&self) -> Result<()> {
        let run_id = self.swap_in()?;
        info!(model_dir = %self.model_dir.display(), run_id = %run_id, "Model loaded");
        Ok(())
    }

    /// Replace the active artifact set with the one currently on disk.
    ///
    /// On failure the previously loaded set keeps serving.
    pub fn reload(&self) -> Result<()> {
        let previous = self.current.read().as_ref().map(|m| m.artifacts.header.run_id);
        match self.swap_in() {
            Ok(run_id) => {
                info!(
                    previous = ?previous,
                    run_id = %run_id,
                    "Model reloaded"
                );
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Reload failed, keeping current model");
                Err(e)
            }
        }
    }

    fn swap_in(&self) -> Result<Uuid> {
        let artifacts = ArtifactSet::load(&self.model_dir)?;
        let run_id = artifacts.header.run_id;
        let loaded = Arc::new(LoadedModel {
            artifacts,
            loaded_at: Utc::now(),
        });
        *self.current.write() = Some(loaded);
        Ok(run_id)
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn status(&self) -> PredictorStatus {
        let current = self.snapshot();
        match current {
            Some(model) => {
                let header = &model.artifacts.header;
                PredictorStatus {
                    loaded: true,
                    model_dir: self.model_dir.clone(),
                    family: Some(header.family.clone()),
                    run_id: Some(header.run_id),
                    trained_at: Some(header.created_at),
                    loaded_at: Some(model.loaded_at),
                    classes: model.artifacts.label_encoder.classes().to_vec(),
                    n_features: Some(header.n_features),
                }
            }
            None => PredictorStatus {
                loaded: false,
                model_dir: self.model_dir.clone(),
                family: None,
                run_id: None,
                trained_at: None,
                loaded_at: None,
                classes: Vec::new(),
                n_features: None,
            },
        }
    }

    fn snapshot(&self) -> Option<Arc<LoadedModel>> {
        self.current.read().clone()
    }

    fn active(&self) -> Result<Arc<LoadedModel>> {
        self.snapshot().ok_or_else(|| {
            AppError::Prediction(format!(
                "No model loaded from {}",
                self.model_dir.display()
            ))
        })
    }

    /// Predict from a raw feature vector in training-time column order
    pub fn predict(&self, features: &[f64]) -> Result<PredictionResult> {
        let model = self.active()?;
        model.artifacts.predict(features)
    }

    pub fn predict_record(&self, record: &FeatureRecord) -> Result<PredictionResult> {
        self.predict(&record.to_vec())
    }

    /// Predict every vector independently; results keep the input order
    pub fn predict_batch(&self, batch: &[Vec<f64>]) -> Vec<Result<PredictionResult>> {
        // One snapshot for the whole batch so a concurrent reload cannot split it
        let model = match self.active() {
            Ok(model) => model,
            Err(e) => {
                return batch
                    .iter()
                    .map(|_| Err(AppError::Prediction(e.to_string())))
                    .collect()
            }
        };

        batch
            .iter()
            .enumerate()
            .map(|(index, features)| {
                let result = model.artifacts.predict(features);
                if let Err(e) = &result {
                    warn!(index = index, error = %e, "Batch item failed");
                }
                result
            })
            .collect()
    }
}
