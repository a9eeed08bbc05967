//! Inference boundary: request defaults, response shaping, recommendations and
//! structured error payloads. Transport-agnostic; callers hand in JSON values.

pub mod handlers;
pub mod recommendations;
pub mod requests;

pub use handlers::{handle_batch, handle_predict, predict_request};
pub use recommendations::recommendations;
pub use requests::{
    BatchPrediction, HolidayFlag, Location, PredictionRequest, PredictionResponse,
};
