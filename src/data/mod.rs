//! Match data ingestion and dataset construction
//!
//! League CSV loading, team-perspective labeling, feature tables and
//! chronological splitting.

pub mod dataset;
pub mod ingest;
pub mod labeler;
pub mod split;

pub use dataset::{ExclusionReport, FeatureTable, LabeledSample};
pub use ingest::{MatchTable, RawMatch};
pub use labeler::{MatchLabeler, TeamMatch};
pub use split::DatasetSplitter;
