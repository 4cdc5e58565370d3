//! Prediction and inference
//!
//! Load trained bundles and answer single-match requests.

pub mod inference;

pub use inference::{format_prediction, PredictionResponse, Predictor};
