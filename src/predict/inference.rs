//! Model inference for predictions

use serde::Serialize;

use crate::features::adapter::{FeatureParityAdapter, PredictionRequest};
use crate::features::rolling::FormSnapshot;
use crate::model::bundle::ModelBundle;
use crate::model::classifier::{argmax, Classifier};
use crate::{ConfidenceLevel, Outcome, Result};

/// Outcome probabilities from the subject team's perspective
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OutcomeProbabilities {
    pub win: f64,
    pub draw: f64,
    pub loss: f64,
}

impl OutcomeProbabilities {
    pub fn get(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Win => self.win,
            Outcome::Draw => self.draw,
            Outcome::Loss => self.loss,
        }
    }

    pub fn max(&self) -> f64 {
        self.win.max(self.draw).max(self.loss)
    }
}

/// Result of a single prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResponse {
    pub label: Outcome,
    pub probabilities: OutcomeProbabilities,
    pub confidence: ConfidenceLevel,
    pub warnings: Vec<String>,
    /// Rolling form the features were built from
    pub form: FormSnapshot,
    /// Model input in column order
    pub features: Vec<(String, f64)>,
}

/// Predictor for single-team match outcomes
pub struct Predictor<C: Classifier> {
    bundle: ModelBundle<C>,
    adapter: FeatureParityAdapter,
}

impl<C: Classifier> Predictor<C> {
    /// Create a predictor serving a bundle's exact feature columns
    pub fn new(bundle: ModelBundle<C>) -> Result<Self> {
        let adapter = FeatureParityAdapter::new(
            bundle.schema(),
            bundle.window(),
            bundle.feature_names().to_vec(),
        )?;
        Ok(Predictor { bundle, adapter })
    }

    pub fn bundle(&self) -> &ModelBundle<C> {
        &self.bundle
    }

    pub fn adapter(&self) -> &FeatureParityAdapter {
        &self.adapter
    }

    /// Predict a single match
    pub fn predict(&self, request: &PredictionRequest) -> Result<PredictionResponse> {
        let adapted = self.adapter.adapt(request)?;
        let probs = self
            .bundle
            .classifier()
            .predict_proba(std::slice::from_ref(&adapted.vector))?;
        let probs = probs.first().copied().ok_or_else(|| {
            crate::FormError::Model("Classifier returned no probabilities".to_string())
        })?;

        let labels = self.bundle.label_map();
        let probabilities = OutcomeProbabilities {
            win: probs[labels.encode(Outcome::Win)],
            draw: probs[labels.encode(Outcome::Draw)],
            loss: probs[labels.encode(Outcome::Loss)],
        };
        let label = labels.decode(argmax(&probs))?;

        log::debug!(
            "Predicted {} (W {:.3} / D {:.3} / L {:.3})",
            label,
            probabilities.win,
            probabilities.draw,
            probabilities.loss
        );

        Ok(PredictionResponse {
            label,
            confidence: ConfidenceLevel::from_max_probability(probabilities.max()),
            probabilities,
            warnings: adapted.warnings.iter().map(|w| w.to_string()).collect(),
            form: adapted.form,
            features: adapted.vector.named_values(),
        })
    }

    /// Predict multiple matches; each request succeeds or fails on its own
    pub fn predict_batch(&self, requests: &[PredictionRequest]) -> Vec<Result<PredictionResponse>> {
        requests.iter().map(|r| self.predict(r)).collect()
    }
}

/// Format a prediction for display
pub fn format_prediction(response: &PredictionResponse, team: &str, is_home: bool) -> String {
    let venue = if is_home { "home" } else { "away" };
    let mut out = format!(
        r#"
┌─────────────────────────────────────────────────┐
│  {} ({})
├─────────────────────────────────────────────────┤
│  Prediction:   {}
│  Win:          {:.1}%
│  Draw:         {:.1}%
│  Loss:         {:.1}%
│  Confidence:   {}
└─────────────────────────────────────────────────┘
"#,
        team,
        venue,
        response.label,
        response.probabilities.win * 100.0,
        response.probabilities.draw * 100.0,
        response.probabilities.loss * 100.0,
        response.confidence
    );
    for warning in &response.warnings {
        out.push_str(&format!("Warning: {}\n", warning));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::adapter::FormInput;
    use crate::features::schema::{FeatureSchema, FeatureVector};
    use crate::model::bundle::BundleInfo;
    use crate::model::classifier::{LabelMap, NUM_CLASSES};
    use crate::FormError;

    /// Scores Win by the WinRate column so tests can steer the output
    struct WinRateStub;

    impl Classifier for WinRateStub {
        fn predict_proba(&self, inputs: &[FeatureVector]) -> Result<Vec<[f64; NUM_CLASSES]>> {
            Ok(inputs
                .iter()
                .map(|v| {
                    let w = v.get("WinRate_5").unwrap_or(0.0);
                    let rest = (1.0 - w) / 2.0;
                    [rest, rest, w]
                })
                .collect())
        }
    }

    fn predictor(schema: FeatureSchema) -> Predictor<WinRateStub> {
        let bundle = ModelBundle::new(
            WinRateStub,
            schema,
            5,
            schema.feature_names(5),
            LabelMap::default(),
            BundleInfo::default(),
        )
        .unwrap();
        Predictor::new(bundle).unwrap()
    }

    fn request(form: &str) -> PredictionRequest {
        PredictionRequest {
            is_home: true,
            odds_win: 1.8,
            odds_draw: 3.6,
            odds_loss: 4.5,
            form: FormInput::parse_streak(form).unwrap(),
        }
    }

    #[test]
    fn test_predict_streak() {
        let response = predictor(FeatureSchema::FormOdds).predict(&request("W,W,W,W,D")).unwrap();
        assert_eq!(response.label, Outcome::Win);
        assert!((response.probabilities.win - 0.8).abs() < 1e-12);
        assert!((response.probabilities.draw - 0.1).abs() < 1e-12);
        assert_eq!(response.confidence, ConfidenceLevel::High);
        assert_eq!(response.warnings.len(), 1);
        assert_eq!(response.features.len(), 9);
        assert_eq!(response.features[0], ("IsHome".to_string(), 1.0));
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let p = predictor(FeatureSchema::FormOddsPlus);
        for form in ["W,W,D,L,W", "L,L,L,L,L", "D,D,W,L,D"] {
            let r = p.predict(&request(form)).unwrap();
            let total = r.probabilities.win + r.probabilities.draw + r.probabilities.loss;
            assert!((total - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_low_confidence_loss() {
        let r = predictor(FeatureSchema::Form).predict(&request("L,L,L,L,L")).unwrap();
        // Loss and Draw tie at 0.5; the lower class index wins
        assert_eq!(r.label, Outcome::Loss);
        assert_eq!(r.confidence, ConfidenceLevel::Medium);
    }

    #[test]
    fn test_batch_reports_each_request() {
        let p = predictor(FeatureSchema::FormOdds);
        let mut bad = request("W,W,W,W,W");
        bad.form = FormInput::parse_streak("W,W").unwrap();
        let results = p.predict_batch(&[request("W,D,L,W,W"), bad]);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(FormError::InputFormat(_))));
    }

    #[test]
    fn test_format_prediction() {
        let r = predictor(FeatureSchema::FormOdds).predict(&request("W,W,W,W,D")).unwrap();
        let text = format_prediction(&r, "Chelsea", true);
        assert!(text.contains("Chelsea (home)"));
        assert!(text.contains("Win:          80.0%"));
        assert!(text.contains("Warning:"));
    }
}
