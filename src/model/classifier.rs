//! Classifier interface and label encoding

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::features::schema::FeatureVector;
use crate::{FormError, Outcome, Result};

/// Number of outcome classes
pub const NUM_CLASSES: usize = 3;

/// A trained multinomial classifier over feature vectors
///
/// Probabilities are indexed by class index; see [`LabelMap`].
pub trait Classifier {
    /// Class probabilities per input row, each summing to 1
    fn predict_proba(&self, inputs: &[FeatureVector]) -> Result<Vec<[f64; NUM_CLASSES]>>;

    /// Most probable class index per input row
    fn predict(&self, inputs: &[FeatureVector]) -> Result<Vec<usize>> {
        Ok(self.predict_proba(inputs)?.iter().map(argmax).collect())
    }

    /// Class indices this classifier emits
    fn classes(&self) -> Vec<usize> {
        (0..NUM_CLASSES).collect()
    }
}

/// Index of the largest probability; ties go to the lower index
pub fn argmax(probs: &[f64; NUM_CLASSES]) -> usize {
    probs
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &p)| if p > best.1 { (i, p) } else { best })
        .0
}

/// Bidirectional mapping between outcomes and class indices
///
/// Fixed as Loss=0, Draw=1, Win=2 and persisted with every model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMap {
    to_index: BTreeMap<Outcome, usize>,
}

impl Default for LabelMap {
    fn default() -> Self {
        LabelMap {
            to_index: Outcome::ALL.iter().enumerate().map(|(i, &o)| (o, i)).collect(),
        }
    }
}

impl LabelMap {
    pub fn encode(&self, outcome: Outcome) -> usize {
        // validate() guarantees every outcome is present
        self.to_index.get(&outcome).copied().unwrap_or(outcome as usize)
    }

    pub fn decode(&self, index: usize) -> Result<Outcome> {
        self.to_index
            .iter()
            .find(|(_, &i)| i == index)
            .map(|(&o, _)| o)
            .ok_or_else(|| FormError::Model(format!("Unknown class index {}", index)))
    }

    pub fn encode_all(&self, outcomes: &[Outcome]) -> Vec<usize> {
        outcomes.iter().map(|&o| self.encode(o)).collect()
    }

    /// Index-to-outcome view, in index order
    pub fn index_to_outcome(&self) -> BTreeMap<usize, Outcome> {
        self.to_index.iter().map(|(&o, &i)| (i, o)).collect()
    }

    /// Check the mapping is a bijection between all outcomes and 0..3
    pub fn validate(&self) -> Result<()> {
        let indices = self.index_to_outcome();
        let complete = self.to_index.len() == NUM_CLASSES
            && indices.len() == NUM_CLASSES
            && indices.keys().copied().eq(0..NUM_CLASSES);
        if !complete {
            return Err(FormError::Model(format!(
                "Label map must assign Loss, Draw, Win to 0, 1, 2; got {:?}",
                self.to_index
            )));
        }
        Ok(())
    }
}
