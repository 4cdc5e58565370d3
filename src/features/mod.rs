//! Feature extraction
//!
//! Rolling form, odds normalization, and the column schemas shared by
//! training and serving.

pub mod adapter;
pub mod odds;
pub mod rolling;
pub mod schema;

pub use adapter::{FeatureParityAdapter, FormInput, PredictionRequest};
pub use odds::{OddsFeatures, OddsNormalizer, TeamOdds};
pub use rolling::{FormSnapshot, RollingFormComputer};
pub use schema::{FeatureSchema, FeatureVector};
