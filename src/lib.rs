//! Emergency type and severity prediction.
//!
//! The pipeline runs leaves first: [`generator`] produces a labeled dataset,
//! [`ml`] preprocesses it, trains and selects a classifier and persists the
//! artifacts, and [`ml::Predictor`] serves predictions from them. [`api`] maps
//! loosely typed requests onto the predictor.

pub mod api;
pub mod config;
pub mod error;
pub mod generator;
pub mod ml;
pub mod models;

pub use error::{AppError, Result};
