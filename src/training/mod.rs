//! Model training
//!
//! Training loop, class weighting, and evaluation metrics.

pub mod metrics;
pub mod trainer;

pub use metrics::{Evaluation, TrainingHistory};
pub use trainer::OutcomeTrainer;
