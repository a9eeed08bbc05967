use crate::api::recommendations::recommendations;
use crate::api::requests::{BatchPrediction, PredictionRequest, PredictionResponse};
use crate::error::{AppError, Result};
use crate::ml::Predictor;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

/// Run one typed request through the predictor
pub fn predict_request(
    predictor: &Predictor,
    request: &PredictionRequest,
    now: DateTime<Utc>,
) -> Result<PredictionResponse> {
    let record = request.to_record(now)?;
    let result = predictor.predict_record(&record)?;

    Ok(PredictionResponse {
        prediction_id: Uuid::new_v4(),
        timestamp: now,
        emergency_type: result.emergency_type,
        severity: result.severity,
        confidence: result.confidence,
        recommendations: recommendations(result.emergency_type, result.severity)
            .iter()
            .map(|r| r.to_string())
            .collect(),
        probabilities: result.class_probabilities,
        location: request.location(),
    })
}

/// Single prediction endpoint: a request object in, a response or error payload out
pub fn handle_predict(predictor: &Predictor, body: &Value, now: DateTime<Utc>) -> Value {
    let response = serde_json::from_value::<PredictionRequest>(body.clone())
        .map_err(|e| AppError::Validation(format!("invalid prediction request: {}", e)))
        .and_then(|request| predict_request(predictor, &request, now))
        .and_then(|response| Ok(serde_json::to_value(response)?));

    match response {
        Ok(value) => value,
        Err(e) => e.to_payload(),
    }
}

/// Batch endpoint: `{"records": [...]}` in, `{"predictions": [...]}` out.
///
/// Items keep the input order. A failing item is reported as an error payload
/// in its slot; the other items are still scored.
pub fn handle_batch(predictor: &Predictor, body: &Value, now: DateTime<Utc>) -> Value {
    let records = match body.get("records") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(records)) => records.clone(),
        Some(_) => {
            return AppError::Validation("\"records\" must be an array".to_string()).to_payload()
        }
    };

    let requests: Vec<std::result::Result<PredictionRequest, String>> = records
        .into_iter()
        .map(|record| {
            serde_json::from_value::<PredictionRequest>(record)
                .map_err(|e| format!("invalid prediction request: {}", e))
        })
        .collect();

    let prepared: Vec<Result<Vec<f64>>> = requests
        .iter()
        .map(|request| match request {
            Ok(request) => request.to_record(now).map(|record| record.to_vec()),
            Err(message) => Err(AppError::Validation(message.clone())),
        })
        .collect();

    let valid: Vec<Vec<f64>> = prepared
        .iter()
        .filter_map(|features| features.as_ref().ok().cloned())
        .collect();
    let mut scored = predictor.predict_batch(&valid).into_iter();

    let predictions: Vec<Value> = requests
        .iter()
        .zip(prepared)
        .map(|(request, features)| {
            let location = request
                .as_ref()
                .ok()
                .and_then(|r| r.location_name.clone())
                .unwrap_or_else(|| "Unknown".to_string());

            let outcome = features
                .and_then(|_| {
                    scored.next().unwrap_or_else(|| {
                        Err(AppError::Internal("batch result missing".to_string()))
                    })
                })
                .and_then(|result| {
                    Ok(serde_json::to_value(BatchPrediction {
                        emergency_type: result.emergency_type,
                        severity: result.severity,
                        confidence: result.confidence,
                        location: location.clone(),
                    })?)
                });

            match outcome {
                Ok(value) => value,
                Err(e) => {
                    let mut payload = e.to_payload();
                    payload["location"] = Value::String(location);
                    payload
                }
            }
        })
        .collect();

    debug!(items = predictions.len(), "Batch handled");
    json!({ "predictions": predictions })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unloaded_predictor_yields_error_payload() {
        let predictor = Predictor::new("does/not/exist");
        let response = handle_predict(&predictor, &json!({"temperature": 30}), Utc::now());
        assert_eq!(response["error"]["code"], "PREDICTION_ERROR");
    }

    #[test]
    fn test_malformed_request_yields_validation_payload() {
        let predictor = Predictor::new("does/not/exist");
        let response = handle_predict(&predictor, &json!({"temperature": "hot"}), Utc::now());
        assert_eq!(response["error"]["code"], "VALIDATION_ERROR");
    }

    #[test]
    fn test_batch_reports_each_item() {
        let predictor = Predictor::new("does/not/exist");
        let body = json!({"records": [{"location_name": "North"}, {"hour_of_day": 99}]});
        let response = handle_batch(&predictor, &body, Utc::now());

        let predictions = response["predictions"].as_array().unwrap();
        assert_eq!(predictions.len(), 2);
        assert_eq!(predictions[0]["error"]["code"], "PREDICTION_ERROR");
        assert_eq!(predictions[0]["location"], "North");
        assert_eq!(predictions[1]["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(predictions[1]["location"], "Unknown");
    }

    #[test]
    fn test_batch_without_records_is_empty() {
        let predictor = Predictor::new("does/not/exist");
        let response = handle_batch(&predictor, &json!({}), Utc::now());
        assert_eq!(response["predictions"], json!([]));

        let response = handle_batch(&predictor, &json!({"records": 5}), Utc::now());
        assert_eq!(response["error"]["code"], "VALIDATION_ERROR");
    }
}
