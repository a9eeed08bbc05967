use serde_json::{json, Value};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Malformed or insufficient training data; aborts the whole training run
    #[error("Data error: {0}")]
    Data(String),

    /// Missing, unreadable or incompatible model artifacts
    #[error("Load error: {0}")]
    Load(String),

    /// Feature vector shape does not match the training-time layout
    #[error("Layout error: expected {expected} features, got {actual}")]
    Layout { expected: usize, actual: usize },

    /// Prediction requested before a model was loaded, or the model failed to score
    #[error("Prediction error: {0}")]
    Prediction(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Data(_) => "DATA_ERROR",
            AppError::Load(_) => "LOAD_ERROR",
            AppError::Layout { .. } => "LAYOUT_ERROR",
            AppError::Prediction(_) => "PREDICTION_ERROR",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller can retry or continue serving after this error
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Load(_)
                | AppError::Layout { .. }
                | AppError::Prediction(_)
                | AppError::Validation(_)
        )
    }

    /// Structured error payload for the inference boundary
    pub fn to_payload(&self) -> Value {
        let error_code = self.error_code();
        let message = self.to_string();

        tracing::debug!(error_code = error_code, message = %message, "Request error");

        json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        })
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from bincode::Error
impl From<bincode::Error> for AppError {
    fn from(err: bincode::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Dataset parsing failures are data errors
impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        AppError::Data(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
