//! Training metrics and evaluation

use serde::Serialize;
use std::fmt;

use crate::model::classifier::NUM_CLASSES;
use crate::Outcome;

/// Per-class precision, recall and F1
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ClassReport {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// True rows of this class
    pub support: usize,
}

/// Held-out evaluation of a classifier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    /// Rows are true class, columns are predicted class
    pub confusion: [[usize; NUM_CLASSES]; NUM_CLASSES],
    pub per_class: [ClassReport; NUM_CLASSES],
    pub accuracy: f64,
    pub macro_f1: f64,
    /// Mean negative log-likelihood of the true class, when probabilities are known
    pub log_loss: Option<f64>,
    pub total: usize,
}

impl Evaluation {
    /// Score predicted class indices against true ones
    pub fn from_predictions(truth: &[usize], predicted: &[usize]) -> Self {
        let mut confusion = [[0usize; NUM_CLASSES]; NUM_CLASSES];
        for (&t, &p) in truth.iter().zip(predicted) {
            if t < NUM_CLASSES && p < NUM_CLASSES {
                confusion[t][p] += 1;
            }
        }

        let total: usize = confusion.iter().flatten().sum();
        let correct: usize = (0..NUM_CLASSES).map(|k| confusion[k][k]).sum();

        let mut per_class = [ClassReport::default(); NUM_CLASSES];
        for (k, report) in per_class.iter_mut().enumerate() {
            let tp = confusion[k][k] as f64;
            let predicted_k: usize = (0..NUM_CLASSES).map(|t| confusion[t][k]).sum();
            let support: usize = confusion[k].iter().sum();

            let precision = ratio(tp, predicted_k as f64);
            let recall = ratio(tp, support as f64);
            *report = ClassReport {
                precision,
                recall,
                f1: ratio(2.0 * precision * recall, precision + recall),
                support,
            };
        }

        Evaluation {
            confusion,
            macro_f1: per_class.iter().map(|r| r.f1).sum::<f64>() / NUM_CLASSES as f64,
            per_class,
            accuracy: ratio(correct as f64, total as f64),
            log_loss: None,
            total,
        }
    }

    /// Score probabilities: argmax predictions plus log loss
    pub fn from_probabilities(truth: &[usize], probs: &[[f64; NUM_CLASSES]]) -> Self {
        let predicted: Vec<usize> = probs.iter().map(crate::model::classifier::argmax).collect();
        let mut eval = Self::from_predictions(truth, &predicted);

        let n = truth.len().min(probs.len());
        if n > 0 {
            let nll: f64 = truth
                .iter()
                .zip(probs)
                .map(|(&t, p)| -p.get(t).copied().unwrap_or(0.0).clamp(1e-15, 1.0).ln())
                .sum();
            eval.log_loss = Some(nll / n as f64);
        }
        eval
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>8} {:>9} {:>8} {:>8} {:>8}", "", "precision", "recall", "f1", "support")?;
        for (outcome, r) in Outcome::ALL.iter().zip(self.per_class.iter()) {
            writeln!(
                f,
                "{:>8} {:>9.3} {:>8.3} {:>8.3} {:>8}",
                outcome.to_string(),
                r.precision,
                r.recall,
                r.f1,
                r.support
            )?;
        }
        writeln!(f)?;
        write!(
            f,
            "Accuracy: {:.2}% | Macro F1: {:.3} | n = {}",
            self.accuracy * 100.0,
            self.macro_f1,
            self.total
        )?;
        if let Some(ll) = self.log_loss {
            write!(f, " | Log loss: {:.4}", ll)?;
        }
        writeln!(f)?;
        writeln!(f)?;
        writeln!(f, "Confusion (rows = actual, cols = predicted L/D/W):")?;
        for (outcome, row) in Outcome::ALL.iter().zip(self.confusion.iter()) {
            writeln!(f, "{:>8} {:>5} {:>5} {:>5}", outcome.to_string(), row[0], row[1], row[2])?;
        }
        Ok(())
    }
}

/// Loss per epoch for a training run
#[derive(Debug, Clone, Default)]
pub struct TrainingHistory {
    pub losses: Vec<f64>,
    pub best_loss: f64,
    pub best_epoch: usize,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self {
            best_loss: f64::INFINITY,
            ..Default::default()
        }
    }

    pub fn record_epoch(&mut self, epoch: usize, loss: f64) {
        self.losses.push(loss);
        if loss < self.best_loss {
            self.best_loss = loss;
            self.best_epoch = epoch;
        }
    }

    pub fn final_loss(&self) -> Option<f64> {
        self.losses.last().copied()
    }

    /// Get improvement from last epoch
    pub fn last_improvement(&self) -> Option<f64> {
        if self.losses.len() < 2 {
            return None;
        }
        let n = self.losses.len();
        Some(self.losses[n - 2] - self.losses[n - 1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluation_counts() {
        let truth = [0, 0, 1, 1, 2, 2, 2];
        let pred = [0, 1, 1, 1, 2, 0, 2];
        let eval = Evaluation::from_predictions(&truth, &pred);

        assert_eq!(eval.total, 7);
        assert!((eval.accuracy - 5.0 / 7.0).abs() < 1e-12);
        assert_eq!(eval.confusion[0], [1, 1, 0]);
        assert_eq!(eval.confusion[2], [1, 0, 2]);

        // Loss: tp 1, predicted 2, support 2
        assert!((eval.per_class[0].precision - 0.5).abs() < 1e-12);
        assert!((eval.per_class[0].recall - 0.5).abs() < 1e-12);
        // Draw: tp 2, predicted 3, support 2
        assert!((eval.per_class[1].precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((eval.per_class[1].recall - 1.0).abs() < 1e-12);
        assert!((eval.per_class[1].f1 - 0.8).abs() < 1e-12);
        assert_eq!(eval.per_class[2].support, 3);
    }

    #[test]
    fn test_never_predicted_class_scores_zero() {
        let eval = Evaluation::from_predictions(&[0, 1, 2], &[2, 2, 2]);
        assert_eq!(eval.per_class[0].precision, 0.0);
        assert_eq!(eval.per_class[0].f1, 0.0);
        assert!(eval.to_string().contains("Accuracy: 33.33%"));
    }

    #[test]
    fn test_log_loss() {
        let eval = Evaluation::from_probabilities(&[2, 0], &[[0.1, 0.2, 0.7], [0.5, 0.25, 0.25]]);
        let expected = -(0.7f64.ln() + 0.5f64.ln()) / 2.0;
        assert!((eval.log_loss.unwrap() - expected).abs() < 1e-12);
        assert_eq!(eval.accuracy, 1.0);
    }

    #[test]
    fn test_history_tracks_best() {
        let mut history = TrainingHistory::new();
        history.record_epoch(0, 1.1);
        history.record_epoch(1, 0.9);
        history.record_epoch(2, 0.95);
        assert_eq!(history.best_epoch, 1);
        assert_eq!(history.final_loss(), Some(0.95));
        assert!((history.last_improvement().unwrap() + 0.05).abs() < 1e-12);
    }
}
