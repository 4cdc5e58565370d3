//! Feed-forward outcome classifier
//!
//! Architecture: Input(dim) → [Linear → ReLU → Dropout]* → Linear(3) → softmax
//!
//! With no hidden layers this is multinomial logistic regression.

use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig};
use burn::record::{FullPrecisionSettings, Recorder};
use burn::tensor::activation::{relu, softmax};
use burn::tensor::backend::Backend;
use burn::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::features::schema::FeatureVector;
use crate::model::classifier::{Classifier, NUM_CLASSES};
use crate::{FormError, Result};

/// Network shape, persisted alongside the weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetConfig {
    pub input_dim: usize,
    /// Hidden layer widths; empty for a linear model
    pub hidden_dims: Vec<usize>,
    pub dropout: f64,
    pub num_classes: usize,
}

impl NetConfig {
    pub fn new(input_dim: usize, hidden_dims: Vec<usize>, dropout: f64) -> Self {
        NetConfig {
            input_dim,
            hidden_dims,
            dropout,
            num_classes: NUM_CLASSES,
        }
    }
}

/// A single hidden layer block: Linear → ReLU → Dropout
#[derive(Module, Debug)]
pub struct HiddenBlock<B: Backend> {
    linear: Linear<B>,
    dropout: Dropout,
}

impl<B: Backend> HiddenBlock<B> {
    pub fn new(device: &B::Device, in_dim: usize, out_dim: usize, dropout: f64) -> Self {
        HiddenBlock {
            linear: LinearConfig::new(in_dim, out_dim).init(device),
            dropout: DropoutConfig::new(dropout).init(),
        }
    }

    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.linear.forward(x);
        let x = relu(x);
        self.dropout.forward(x)
    }
}

#[derive(Module, Debug)]
pub struct OutcomeNet<B: Backend> {
    hidden: Vec<HiddenBlock<B>>,
    head: Linear<B>,
}

impl<B: Backend> OutcomeNet<B> {
    pub fn new(device: &B::Device, config: &NetConfig) -> Self {
        let mut hidden = Vec::with_capacity(config.hidden_dims.len());
        let mut in_dim = config.input_dim;
        for &width in &config.hidden_dims {
            hidden.push(HiddenBlock::new(device, in_dim, width, config.dropout));
            in_dim = width;
        }

        OutcomeNet {
            hidden,
            head: LinearConfig::new(in_dim, config.num_classes).init(device),
        }
    }

    /// Class logits [batch, num_classes]
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let x = self.hidden.iter().fold(x, |x, block| block.forward(x));
        self.head.forward(x)
    }

    /// Save weights to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let recorder = burn::record::NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        recorder
            .record(self.clone().into_record(), path.to_path_buf())
            .map_err(|e| FormError::Io(std::io::Error::other(e.to_string())))
    }

    /// Load weights from file into a network of the given shape
    pub fn load(device: &B::Device, path: &Path, config: &NetConfig) -> Result<Self> {
        let recorder = burn::record::NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let record = recorder
            .load(path.to_path_buf(), device)
            .map_err(|e| FormError::Io(std::io::Error::other(e.to_string())))?;

        let model = Self::new(device, config);
        Ok(model.load_record(record))
    }
}

/// Z-score parameters computed from training rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureNormalization {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

impl FeatureNormalization {
    pub fn fit(rows: &[FeatureVector]) -> Self {
        let dim = rows.first().map(|r| r.len()).unwrap_or(0);
        let mut sum = vec![0.0f32; dim];
        let mut sum_sq = vec![0.0f32; dim];

        for row in rows {
            for (j, &v) in row.values().iter().enumerate().take(dim) {
                let v = v as f32;
                sum[j] += v;
                sum_sq[j] += v * v;
            }
        }

        let n = rows.len().max(1) as f32;
        let mean: Vec<f32> = sum.iter().map(|s| s / n).collect();
        let std: Vec<f32> = sum_sq
            .iter()
            .zip(mean.iter())
            .map(|(sq, m)| ((sq / n - m * m).max(0.0).sqrt()).max(0.001))
            .collect();

        FeatureNormalization { mean, std }
    }

    /// (x - mean) / std, broadcast over the batch
    pub fn normalize<B: Backend>(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = x.device();
        let mean = Tensor::<B, 1>::from_floats(self.mean.as_slice(), &device).unsqueeze_dim(0);
        let std = Tensor::<B, 1>::from_floats(self.std.as_slice(), &device).unsqueeze_dim(0);
        (x - mean) / std
    }
}

/// Stack feature vectors into a [rows, dim] tensor
pub fn feature_tensor<B: Backend>(
    rows: &[FeatureVector],
    dim: usize,
    device: &B::Device,
) -> Result<Tensor<B, 2>> {
    if let Some(bad) = rows.iter().find(|r| r.len() != dim) {
        return Err(FormError::Model(format!(
            "Model expects {} features, got {}",
            dim,
            bad.len()
        )));
    }
    let flat: Vec<f32> = rows
        .iter()
        .flat_map(|r| r.values().iter().map(|&v| v as f32))
        .collect();
    Ok(Tensor::<B, 1>::from_floats(flat.as_slice(), device).reshape([rows.len(), dim]))
}

/// Trained network plus the normalization it was trained with
#[derive(Debug, Clone)]
pub struct MlpClassifier<B: Backend> {
    net: OutcomeNet<B>,
    norm: FeatureNormalization,
    config: NetConfig,
    device: B::Device,
}

impl<B: Backend> MlpClassifier<B> {
    pub fn new(
        net: OutcomeNet<B>,
        norm: FeatureNormalization,
        config: NetConfig,
        device: B::Device,
    ) -> Result<Self> {
        if norm.mean.len() != config.input_dim || norm.std.len() != config.input_dim {
            return Err(FormError::Model(format!(
                "Normalization has {} columns, network expects {}",
                norm.mean.len(),
                config.input_dim
            )));
        }
        if config.num_classes != NUM_CLASSES {
            return Err(FormError::Model(format!(
                "Network has {} classes, expected {}",
                config.num_classes, NUM_CLASSES
            )));
        }
        Ok(MlpClassifier {
            net,
            norm,
            config,
            device,
        })
    }

    pub fn config(&self) -> &NetConfig {
        &self.config
    }

    pub fn normalization(&self) -> &FeatureNormalization {
        &self.norm
    }

    pub fn net(&self) -> &OutcomeNet<B> {
        &self.net
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }
}

impl<B: Backend> Classifier for MlpClassifier<B> {
    fn predict_proba(&self, inputs: &[FeatureVector]) -> Result<Vec<[f64; NUM_CLASSES]>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let x = feature_tensor::<B>(inputs, self.config.input_dim, &self.device)?;
        let x = self.norm.normalize(x);
        let probs = softmax(self.net.forward(x), 1);

        let flat = probs
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| FormError::Model(format!("Failed to read probabilities: {:?}", e)))?;

        Ok(flat
            .chunks(NUM_CLASSES)
            .map(|c| {
                let total: f64 = c.iter().map(|&p| p as f64).sum();
                let mut row = [0.0; NUM_CLASSES];
                for (slot, &p) in row.iter_mut().zip(c) {
                    *slot = p as f64 / total;
                }
                row
            })
            .collect())
    }
}
