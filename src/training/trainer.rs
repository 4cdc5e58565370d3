//! Full-batch training for the outcome classifier
//!
//! Inputs are z-scored with statistics from the training rows only. Class
//! weights follow the "balanced" rule n / (k * count) when enabled.

use burn::module::AutodiffModule;
use burn::nn::loss::CrossEntropyLossConfig;
use burn::optim::decay::WeightDecayConfig;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::backend::AutodiffBackend;
use burn::tensor::{ElementConversion, Int, Tensor};

use crate::data::dataset::{unzip_samples, LabeledSample};
use crate::data::split::expanding_folds;
use crate::features::schema::FeatureVector;
use crate::model::classifier::{Classifier, LabelMap, NUM_CLASSES};
use crate::model::mlp::{feature_tensor, FeatureNormalization, MlpClassifier, NetConfig, OutcomeNet};
use crate::training::metrics::{Evaluation, TrainingHistory};
use crate::{FormError, Outcome, Result, TrainingConfig};

/// Balanced class weights; absent classes get weight 1
pub fn balanced_class_weights(labels: &[usize]) -> [f32; NUM_CLASSES] {
    let mut counts = [0usize; NUM_CLASSES];
    for &l in labels {
        if l < NUM_CLASSES {
            counts[l] += 1;
        }
    }
    let n = labels.len() as f32;
    counts.map(|c| {
        if c == 0 {
            1.0
        } else {
            n / (NUM_CLASSES as f32 * c as f32)
        }
    })
}

/// Trains [`MlpClassifier`]s on an autodiff backend
pub struct OutcomeTrainer<B: AutodiffBackend> {
    device: B::Device,
    config: TrainingConfig,
    label_map: LabelMap,
}

impl<B: AutodiffBackend> OutcomeTrainer<B> {
    pub fn new(device: B::Device, config: TrainingConfig) -> Self {
        OutcomeTrainer {
            device,
            config,
            label_map: LabelMap::default(),
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn label_map(&self) -> &LabelMap {
        &self.label_map
    }

    /// Fit a classifier on feature rows and their outcomes
    pub fn fit(
        &self,
        inputs: &[FeatureVector],
        outcomes: &[Outcome],
    ) -> Result<(MlpClassifier<B::InnerBackend>, TrainingHistory)> {
        if inputs.is_empty() {
            return Err(FormError::DegenerateSplit { train: 0, test: 0 });
        }
        if inputs.len() != outcomes.len() {
            return Err(FormError::Model(format!(
                "{} feature rows but {} labels",
                inputs.len(),
                outcomes.len()
            )));
        }

        let labels = self.label_map.encode_all(outcomes);
        let net_config = NetConfig::new(
            inputs[0].len(),
            self.config.hidden_dims.clone(),
            self.config.dropout,
        );
        let norm = FeatureNormalization::fit(inputs);
        log::debug!("Feature normalization: mean={:?}, std={:?}", norm.mean, norm.std);

        let x = norm.normalize(feature_tensor::<B>(inputs, net_config.input_dim, &self.device)?);
        let targets: Vec<i32> = labels.iter().map(|&l| l as i32).collect();
        let y = Tensor::<B, 1, Int>::from_ints(targets.as_slice(), &self.device);

        let weights = if self.config.class_balanced {
            let w = balanced_class_weights(&labels);
            log::info!("Class weights (L/D/W): {:.3} {:.3} {:.3}", w[0], w[1], w[2]);
            Some(w.to_vec())
        } else {
            None
        };
        let loss_fn = CrossEntropyLossConfig::new()
            .with_weights(weights)
            .init(&self.device);

        let mut model = OutcomeNet::<B>::new(&self.device, &net_config);
        let mut optimizer = AdamConfig::new()
            .with_weight_decay(Some(WeightDecayConfig::new(self.config.weight_decay as f32)))
            .init::<B, OutcomeNet<B>>();

        let mut history = TrainingHistory::new();
        log::info!(
            "Training on {} rows x {} features for {} epochs",
            inputs.len(),
            net_config.input_dim,
            self.config.epochs
        );

        for epoch in 0..self.config.epochs {
            let logits = model.forward(x.clone());
            let loss = loss_fn.forward(logits, y.clone());
            let loss_val: f32 = loss.clone().into_scalar().elem();
            if !loss_val.is_finite() {
                return Err(FormError::Model(format!("Loss diverged at epoch {}", epoch + 1)));
            }
            history.record_epoch(epoch, loss_val as f64);

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(self.config.learning_rate, model, grads);

            if (epoch + 1) % 50 == 0 || epoch + 1 == self.config.epochs {
                log::info!(
                    "Epoch {}/{}: loss {:.4} (change {:+.5})",
                    epoch + 1,
                    self.config.epochs,
                    loss_val,
                    -history.last_improvement().unwrap_or(0.0)
                );
            }
        }

        let classifier = MlpClassifier::new(model.valid(), norm, net_config, self.device.clone())?;
        Ok((classifier, history))
    }

    /// Fit on `train`, score on `test`
    pub fn fit_and_evaluate(
        &self,
        train: &[LabeledSample],
        test: &[LabeledSample],
    ) -> Result<(MlpClassifier<B::InnerBackend>, Evaluation)> {
        let (x_train, y_train) = unzip_samples(train);
        let (x_test, y_test) = unzip_samples(test);

        let (classifier, history) = self.fit(&x_train, &y_train)?;
        if let Some(loss) = history.final_loss() {
            log::info!(
                "Final training loss {:.4} (best {:.4} at epoch {})",
                loss,
                history.best_loss,
                history.best_epoch + 1
            );
        }

        let probs = classifier.predict_proba(&x_test)?;
        let eval = Evaluation::from_probabilities(&self.label_map.encode_all(&y_test), &probs);
        Ok((classifier, eval))
    }

    /// Expanding-window cross-validation over date-ordered samples
    pub fn cross_validate(&self, samples: &[LabeledSample], folds: usize) -> Result<Vec<Evaluation>> {
        expanding_folds(samples.len(), folds)?
            .into_iter()
            .enumerate()
            .map(|(k, (train, test))| {
                log::info!("Fold {}/{}: train {} rows, test {} rows", k + 1, folds, train.len(), test.len());
                let (_, eval) = self.fit_and_evaluate(&samples[train], &samples[test])?;
                log::info!("Fold {} accuracy {:.2}%", k + 1, eval.accuracy * 100.0);
                Ok(eval)
            })
            .collect()
    }
}
