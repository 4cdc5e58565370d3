//! Outcome classifiers
//!
//! The [`Classifier`] seam, the burn feed-forward network behind it, and the
//! on-disk bundle format.

pub mod bundle;
pub mod classifier;
pub mod mlp;

pub use bundle::{BundleInfo, ModelBundle};
pub use classifier::{Classifier, LabelMap};
pub use mlp::{MlpClassifier, NetConfig};
