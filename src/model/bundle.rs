//! Persisted model bundles
//!
//! A bundle directory holds `bundle.json` (schema, window, column names,
//! label map, network shape, normalization) and `model.mpk` (weights). Every
//! field is validated on load.

use burn::tensor::backend::Backend;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::features::schema::FeatureSchema;
use crate::model::classifier::{Classifier, LabelMap};
use crate::model::mlp::{FeatureNormalization, MlpClassifier, NetConfig, OutcomeNet};
use crate::{FormError, Outcome, Result};

pub const MANIFEST_FILE: &str = "bundle.json";
pub const WEIGHTS_FILE: &str = "model.mpk";
const FORMAT_VERSION: u32 = 1;

/// Training provenance stored with a bundle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BundleInfo {
    pub team: String,
    pub train_rows: usize,
    pub test_accuracy: Option<f64>,
    pub trained_at: Option<DateTime<Utc>>,
}

/// On-disk description of a bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    pub format_version: u32,
    pub schema: FeatureSchema,
    pub window: usize,
    pub feature_names: Vec<String>,
    pub label_map: LabelMap,
    /// Inverse of `label_map`, stored for readers of the JSON
    pub class_labels: BTreeMap<usize, Outcome>,
    pub net: NetConfig,
    pub normalization: FeatureNormalization,
    pub info: BundleInfo,
}

/// A classifier together with everything needed to feed it
#[derive(Debug, Clone)]
pub struct ModelBundle<C> {
    classifier: C,
    schema: FeatureSchema,
    window: usize,
    feature_names: Vec<String>,
    label_map: LabelMap,
    info: BundleInfo,
}

impl<C: Classifier> ModelBundle<C> {
    /// Bundle a classifier, checking its columns and labels
    pub fn new(
        classifier: C,
        schema: FeatureSchema,
        window: usize,
        feature_names: Vec<String>,
        label_map: LabelMap,
        info: BundleInfo,
    ) -> Result<Self> {
        schema.check_names(window, &feature_names)?;
        label_map.validate()?;
        Ok(ModelBundle {
            classifier,
            schema,
            window,
            feature_names,
            label_map,
            info,
        })
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn schema(&self) -> FeatureSchema {
        self.schema
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn label_map(&self) -> &LabelMap {
        &self.label_map
    }

    pub fn info(&self) -> &BundleInfo {
        &self.info
    }
}

impl<B: Backend> ModelBundle<MlpClassifier<B>> {
    /// Write manifest and weights into `dir`, creating it if needed
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        let manifest = BundleManifest {
            format_version: FORMAT_VERSION,
            schema: self.schema,
            window: self.window,
            feature_names: self.feature_names.clone(),
            label_map: self.label_map.clone(),
            class_labels: self.label_map.index_to_outcome(),
            net: self.classifier.config().clone(),
            normalization: self.classifier.normalization().clone(),
            info: self.info.clone(),
        };
        let json = serde_json::to_string_pretty(&manifest)?;
        std::fs::write(dir.join(MANIFEST_FILE), json)?;
        self.classifier.net().save(&dir.join(WEIGHTS_FILE))?;

        log::info!("Saved model bundle to {}", dir.display());
        Ok(())
    }

    /// Read and validate a bundle directory
    pub fn load(dir: &Path, device: &B::Device) -> Result<Self> {
        let manifest = read_manifest(dir)?;
        if manifest.class_labels != manifest.label_map.index_to_outcome() {
            return Err(FormError::Model(
                "Stored class labels disagree with the label map".to_string(),
            ));
        }
        if manifest.net.input_dim != manifest.feature_names.len() {
            return Err(FormError::Model(format!(
                "Network input width {} does not match {} stored columns",
                manifest.net.input_dim,
                manifest.feature_names.len()
            )));
        }

        let weights = dir.join(WEIGHTS_FILE);
        if !weights.exists() {
            return Err(FormError::NoModel);
        }
        let net = OutcomeNet::<B>::load(device, &weights, &manifest.net)?;
        let classifier =
            MlpClassifier::new(net, manifest.normalization, manifest.net, device.clone())?;

        let bundle = Self::new(
            classifier,
            manifest.schema,
            manifest.window,
            manifest.feature_names,
            manifest.label_map,
            manifest.info,
        )?;
        log::info!(
            "Loaded {} model (window {}) from {}",
            bundle.schema,
            bundle.window,
            dir.display()
        );
        Ok(bundle)
    }
}

/// Read a bundle manifest without loading weights
pub fn read_manifest(dir: &Path) -> Result<BundleManifest> {
    let path = dir.join(MANIFEST_FILE);
    if !path.exists() {
        return Err(FormError::NoModel);
    }
    let manifest: BundleManifest = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
    if manifest.format_version != FORMAT_VERSION {
        return Err(FormError::Model(format!(
            "Unsupported bundle format version {} (expected {})",
            manifest.format_version, FORMAT_VERSION
        )));
    }
    Ok(manifest)
}
