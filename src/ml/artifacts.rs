//! Persisted artifact set: classifier, imputer, scaler and label encoder.
//!
//! Every file is a bincode envelope whose header names the training run that
//! produced it. A load only succeeds when all four headers agree, so a
//! directory caught halfway through a rename is rejected rather than mixed.

use crate::error::{AppError, Result};
use crate::ml::classifier::{argmax_rows, Classifier, ClassifierModel};
use crate::ml::features::{FeaturePreprocessor, LabelEncoder, MeanImputer, StandardScaler};
use crate::ml::models::{ModelType, PredictionResult};
use bincode::Options;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Bumped whenever an artifact payload changes shape
pub const FORMAT_VERSION: u32 = 1;

pub const CLASSIFIER_FILE: &str = "classifier.bin";
pub const SCALER_FILE: &str = "scaler.bin";
pub const IMPUTER_FILE: &str = "imputer.bin";
pub const LABEL_ENCODER_FILE: &str = "label_encoder.bin";
pub const RESULTS_FILE: &str = "training_results.json";

/// Header written in front of every artifact payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub format_version: u32,
    pub n_features: usize,
    pub run_id: Uuid,
    pub family: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    header: &'a ArtifactHeader,
    payload: &'a T,
}

#[derive(Deserialize)]
struct Envelope<T> {
    header: ArtifactHeader,
    payload: T,
}

/// Held-out score of one family, as written to the results summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FamilySummary {
    pub accuracy: f64,
}

/// Everything needed to reproduce inference for one training run
pub struct ArtifactSet {
    pub header: ArtifactHeader,
    pub classifier: Arc<ClassifierModel>,
    pub preprocessor: FeaturePreprocessor,
    pub label_encoder: LabelEncoder,
}

impl ArtifactSet {
    pub fn new(
        run_id: Uuid,
        classifier: Arc<ClassifierModel>,
        preprocessor: FeaturePreprocessor,
        label_encoder: LabelEncoder,
    ) -> Self {
        let header = ArtifactHeader {
            format_version: FORMAT_VERSION,
            n_features: preprocessor.n_features(),
            run_id,
            family: classifier.model_type().family_name().to_string(),
            created_at: Utc::now(),
        };

        Self {
            header,
            classifier,
            preprocessor,
            label_encoder,
        }
    }

    pub fn model_type(&self) -> ModelType {
        self.classifier.model_type()
    }

    /// Scale one raw feature vector, score it and map the winning class back to its label
    pub fn predict(&self, features: &[f64]) -> Result<PredictionResult> {
        let x = self.preprocessor.transform_one(features)?;
        let proba = self.classifier.predict_proba(&x)?;

        let class_id = argmax_rows(&proba)
            .first()
            .copied()
            .ok_or_else(|| AppError::Prediction("Classifier returned no scores".to_string()))?;
        let row = proba.row(0);
        let emergency_type = self.label_encoder.inverse_transform(class_id)?;
        let confidence = row[class_id];

        if confidence < 0.5 {
            debug!(
                emergency_type = %emergency_type,
                confidence = confidence,
                "Low-confidence prediction"
            );
        }

        Ok(PredictionResult::new(emergency_type, confidence)
            .with_probabilities(self.label_encoder.label_probabilities(row)))
    }

    /// Write every artifact plus the results summary into `model_dir`.
    ///
    /// Files are serialized into a staging directory first and only renamed into
    /// place once all of them were written.
    pub fn save(&self, model_dir: &Path, results: &BTreeMap<String, FamilySummary>) -> Result<()> {
        fs::create_dir_all(model_dir)?;
        let staging = model_dir.join(format!(".staging-{}", self.header.run_id));
        fs::create_dir_all(&staging)?;

        let written = self.write_all(&staging, results);
        if let Err(e) = written {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        for file in [
            CLASSIFIER_FILE,
            SCALER_FILE,
            IMPUTER_FILE,
            LABEL_ENCODER_FILE,
            RESULTS_FILE,
        ] {
            fs::rename(staging.join(file), model_dir.join(file))?;
        }
        fs::remove_dir_all(&staging)?;

        info!(
            model_dir = %model_dir.display(),
            run_id = %self.header.run_id,
            family = %self.header.family,
            "Artifacts persisted"
        );
        Ok(())
    }

    fn write_all(&self, dir: &Path, results: &BTreeMap<String, FamilySummary>) -> Result<()> {
        write_envelope(&dir.join(CLASSIFIER_FILE), &self.header, self.classifier.as_ref())?;
        write_envelope(&dir.join(SCALER_FILE), &self.header, &self.preprocessor.scaler)?;
        write_envelope(&dir.join(IMPUTER_FILE), &self.header, &self.preprocessor.imputer)?;
        write_envelope(&dir.join(LABEL_ENCODER_FILE), &self.header, &self.label_encoder)?;

        let mut writer = BufWriter::new(File::create(dir.join(RESULTS_FILE))?);
        serde_json::to_writer_pretty(&mut writer, results)?;
        writer.flush()?;
        Ok(())
    }

    /// Read and cross-check the artifact set stored in `model_dir`
    pub fn load(model_dir: &Path) -> Result<Self> {
        let classifier: Envelope<ClassifierModel> = read_envelope(&model_dir.join(CLASSIFIER_FILE))?;
        let scaler: Envelope<StandardScaler> = read_envelope(&model_dir.join(SCALER_FILE))?;
        let imputer: Envelope<MeanImputer> = read_envelope(&model_dir.join(IMPUTER_FILE))?;
        let encoder: Envelope<LabelEncoder> = read_envelope(&model_dir.join(LABEL_ENCODER_FILE))?;

        let header = classifier.header;
        for other in [&scaler.header, &imputer.header, &encoder.header] {
            if other.run_id != header.run_id {
                return Err(AppError::Load(format!(
                    "Artifacts come from different training runs ({} vs {})",
                    header.run_id, other.run_id
                )));
            }
        }
        for h in [&header, &scaler.header, &imputer.header, &encoder.header] {
            if h.format_version != FORMAT_VERSION {
                return Err(AppError::Load(format!(
                    "Unsupported artifact format version {} (expected {})",
                    h.format_version, FORMAT_VERSION
                )));
            }
        }

        let preprocessor = FeaturePreprocessor {
            imputer: imputer.payload,
            scaler: scaler.payload,
        };
        let widths = [
            header.n_features,
            preprocessor.imputer.n_features(),
            preprocessor.scaler.n_features(),
            classifier.payload.metadata().n_features,
        ];
        if widths.iter().any(|&w| w != header.n_features) {
            return Err(AppError::Load(format!(
                "Artifacts disagree on the feature count: {:?}",
                widths
            )));
        }
        if encoder.payload.n_classes() == 0 {
            return Err(AppError::Load("Label encoder has no classes".to_string()));
        }

        Ok(Self {
            header,
            classifier: Arc::new(classifier.payload),
            preprocessor,
            label_encoder: encoder.payload,
        })
    }
}

/// Read the per-family accuracy summary written next to the artifacts
pub fn read_results(model_dir: &Path) -> Result<BTreeMap<String, FamilySummary>> {
    let path = model_dir.join(RESULTS_FILE);
    let file = File::open(&path).map_err(|e| load_error(&path, e))?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| load_error(&path, e))
}

/// Fixed-width integers, matching `bincode::serialize`
fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

fn write_envelope<T: Serialize>(path: &Path, header: &ArtifactHeader, payload: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    codec().serialize_into(&mut writer, &EnvelopeRef { header, payload })?;
    writer.flush()?;
    debug!(path = %path.display(), "Wrote artifact");
    Ok(())
}

fn read_envelope<T: DeserializeOwned>(path: &Path) -> Result<Envelope<T>> {
    let file = File::open(path).map_err(|e| load_error(path, e))?;
    // A length prefix can never claim more bytes than the file holds
    let limit = file.metadata().map_err(|e| load_error(path, e))?.len();
    codec()
        .with_limit(limit)
        .deserialize_from(BufReader::new(file))
        .map_err(|e| load_error(path, e))
}

fn load_error(path: &Path, err: impl std::fmt::Display) -> AppError {
    AppError::Load(format!("{}: {}", path.display(), err))
}
