//! Serving-time feature reconstruction
//!
//! Rebuilds the exact feature vector a model was trained on from one of three
//! request shapes: explicit form values, a W/D/L streak, or scorelines.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

use crate::features::odds::{OddsFeatures, TeamOdds};
use crate::features::rolling::{FormEntry, FormSnapshot};
use crate::features::schema::{FeatureRow, FeatureSchema, FeatureVector};
use crate::{FormError, Outcome, Result};

static SCORELINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{1,3})\s*-\s*(\d{1,3})$").unwrap());

/// A malformed prediction request
///
/// Positions are 1-based, as a user would count them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("expected exactly {expected} {kind}, got {actual}")]
    WrongLength {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("result {position} ({text:?}) is not one of W, D, L")]
    BadToken { position: usize, text: String },

    #[error("scoreline {position} ({text:?}) is not of the form 2-1")]
    BadScoreline { position: usize, text: String },

    #[error("odds must be positive decimal prices (win={win}, draw={draw}, loss={loss})")]
    InvalidOdds { win: f64, draw: f64, loss: f64 },

    #[error("form value {name} is not a finite number")]
    NonFiniteForm { name: &'static str },
}

/// One of the subject team's recent scorelines, subject goals first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scoreline {
    pub goals_for: u32,
    pub goals_against: u32,
}

/// Recent form as supplied by a caller
#[derive(Debug, Clone, PartialEq)]
pub enum FormInput {
    /// Rolling values given directly
    Explicit(FormSnapshot),
    /// Most recent results as outcome tokens
    Streak(Vec<Outcome>),
    /// Most recent results as scorelines
    Scorelines(Vec<Scoreline>),
}

/// Comma-separated items, trimmed; blank input has none
fn items(text: &str) -> Vec<&str> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    text.split(',').map(str::trim).collect()
}

impl FormInput {
    /// Parse `"W,W,D,L,W"`; case is ignored, empty items are errors
    pub fn parse_streak(text: &str) -> std::result::Result<Self, InputError> {
        let tokens = items(text)
            .into_iter()
            .enumerate()
            .map(|(i, t)| match t.to_uppercase().as_str() {
                "W" => Ok(Outcome::Win),
                "D" => Ok(Outcome::Draw),
                "L" => Ok(Outcome::Loss),
                _ => Err(InputError::BadToken {
                    position: i + 1,
                    text: t.to_string(),
                }),
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(FormInput::Streak(tokens))
    }

    /// Parse `"2-1, 0-0, 1-2"` with the subject team's goals first
    ///
    /// Goal counts are limited to three digits.
    pub fn parse_scorelines(text: &str) -> std::result::Result<Self, InputError> {
        let scorelines = items(text)
            .into_iter()
            .enumerate()
            .map(|(i, t)| {
                let bad = || InputError::BadScoreline {
                    position: i + 1,
                    text: t.to_string(),
                };
                let caps = SCORELINE.captures(t).ok_or_else(bad)?;
                let goals_for = caps[1].parse::<u32>().map_err(|_| bad())?;
                let goals_against = caps[2].parse::<u32>().map_err(|_| bad())?;
                Ok(Scoreline {
                    goals_for,
                    goals_against,
                })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(FormInput::Scorelines(scorelines))
    }

    fn mode(&self) -> &'static str {
        match self {
            FormInput::Explicit(_) => "explicit",
            FormInput::Streak(_) => "results",
            FormInput::Scorelines(_) => "scorelines",
        }
    }
}

/// A single prediction request
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRequest {
    pub is_home: bool,
    /// Decimal odds for the subject team winning, drawing, losing
    pub odds_win: f64,
    pub odds_draw: f64,
    pub odds_loss: f64,
    pub form: FormInput,
}

/// Known approximations in a reconstructed vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AdapterWarning {
    /// Streak input carries no goals; goal columns were set to zero
    GoalsNotDerivable,
}

impl fmt::Display for AdapterWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterWarning::GoalsNotDerivable => write!(
                f,
                "goals for/against cannot be derived from W/D/L results and were set to 0; \
                 pass scorelines or explicit values for better accuracy"
            ),
        }
    }
}

/// Feature vector reconstructed for a request
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptedFeatures {
    pub vector: FeatureVector,
    pub form: FormSnapshot,
    pub warnings: Vec<AdapterWarning>,
}

/// Builds serving-time feature vectors matching a trained model's columns
#[derive(Debug, Clone)]
pub struct FeatureParityAdapter {
    schema: FeatureSchema,
    window: usize,
    expected: Vec<String>,
}

impl FeatureParityAdapter {
    /// Adapter for a model trained on `expected` columns
    ///
    /// Fails if the columns cannot be produced from (schema, window).
    pub fn new(schema: FeatureSchema, window: usize, expected: Vec<String>) -> Result<Self> {
        if window == 0 {
            return Err(FormError::Config("Rolling window must be positive".to_string()));
        }
        schema.check_names(window, &expected)?;
        Ok(FeatureParityAdapter {
            schema,
            window,
            expected,
        })
    }

    pub fn schema(&self) -> FeatureSchema {
        self.schema
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn feature_names(&self) -> &[String] {
        &self.expected
    }

    /// Derive the rolling form values for a request
    pub fn form_snapshot(
        &self,
        input: &FormInput,
    ) -> std::result::Result<(FormSnapshot, Vec<AdapterWarning>), InputError> {
        match input {
            FormInput::Explicit(snapshot) => {
                let names = ["form_points", "goals_for", "goals_against", "goal_diff", "win_rate"];
                if let Some((name, _)) = names
                    .iter()
                    .zip(snapshot.to_vec())
                    .find(|(_, v)| !v.is_finite())
                {
                    return Err(InputError::NonFiniteForm { name: *name });
                }
                Ok((*snapshot, Vec::new()))
            }
            FormInput::Streak(tokens) => {
                self.check_length(input, tokens.len())?;
                let entries: Vec<FormEntry> =
                    tokens.iter().map(|&o| FormEntry::outcome_only(o)).collect();
                Ok((
                    FormSnapshot::aggregate(&entries, self.window),
                    vec![AdapterWarning::GoalsNotDerivable],
                ))
            }
            FormInput::Scorelines(scorelines) => {
                self.check_length(input, scorelines.len())?;
                let entries: Vec<FormEntry> = scorelines
                    .iter()
                    .map(|s| FormEntry::from_score(s.goals_for, s.goals_against))
                    .collect();
                Ok((FormSnapshot::aggregate(&entries, self.window), Vec::new()))
            }
        }
    }

    /// Build the model input for a request
    pub fn adapt(&self, request: &PredictionRequest) -> Result<AdaptedFeatures> {
        let odds = TeamOdds::new(request.odds_win, request.odds_draw, request.odds_loss).ok_or(
            InputError::InvalidOdds {
                win: request.odds_win,
                draw: request.odds_draw,
                loss: request.odds_loss,
            },
        )?;
        let (form, warnings) = self.form_snapshot(&request.form)?;
        for warning in &warnings {
            log::warn!("{}", warning);
        }

        let row = FeatureRow {
            is_home: request.is_home,
            form,
            odds: Some(OddsFeatures::from_odds(odds)),
        };
        let vector = self.schema.vectorize(self.window, &row)?;
        if vector.names() != self.expected.as_slice() {
            return Err(FormError::SchemaMismatch {
                expected: self.expected.clone(),
                actual: vector.names().to_vec(),
            });
        }

        Ok(AdaptedFeatures {
            vector,
            form,
            warnings,
        })
    }

    fn check_length(&self, input: &FormInput, actual: usize) -> std::result::Result<(), InputError> {
        if actual != self.window {
            return Err(InputError::WrongLength {
                kind: input.mode(),
                expected: self.window,
                actual,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(schema: FeatureSchema) -> FeatureParityAdapter {
        FeatureParityAdapter::new(schema, 5, schema.feature_names(5)).unwrap()
    }

    fn request(form: FormInput) -> PredictionRequest {
        PredictionRequest {
            is_home: true,
            odds_win: 2.0,
            odds_draw: 3.0,
            odds_loss: 4.0,
            form,
        }
    }

    #[test]
    fn test_streak_mode() {
        let input = FormInput::parse_streak("W,W,D,L,W").unwrap();
        let (form, warnings) = adapter(FeatureSchema::FormOdds).form_snapshot(&input).unwrap();
        assert_eq!(form.form_points, 10.0);
        assert!((form.win_rate - 0.6).abs() < 1e-12);
        assert_eq!(form.goals_for, 0.0);
        assert_eq!(form.goals_against, 0.0);
        assert_eq!(form.goal_diff, 0.0);
        assert_eq!(warnings, vec![AdapterWarning::GoalsNotDerivable]);
    }

    #[test]
    fn test_scoreline_mode() {
        let input = FormInput::parse_scorelines("2-1, 0-0, 1-2, 3-0, 1-1").unwrap();
        let (form, warnings) = adapter(FeatureSchema::FormOdds).form_snapshot(&input).unwrap();
        assert_eq!(form.goals_for, 7.0);
        assert_eq!(form.goals_against, 4.0);
        assert_eq!(form.goal_diff, 3.0);
        assert_eq!(form.form_points, 8.0);
        assert!((form.win_rate - 0.4).abs() < 1e-12);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_streak_and_scorelines_agree_on_points() {
        let a = adapter(FeatureSchema::Form);
        let streak = FormInput::parse_streak("W,D,L,W,D").unwrap();
        let scores = FormInput::parse_scorelines("2-1,1-1,0-3,4-2,0-0").unwrap();
        let (s1, _) = a.form_snapshot(&streak).unwrap();
        let (s2, _) = a.form_snapshot(&scores).unwrap();
        assert_eq!(s1.form_points, s2.form_points);
        assert_eq!(s1.win_rate, s2.win_rate);
    }

    #[test]
    fn test_explicit_mode_passes_through() {
        let snapshot = FormSnapshot {
            form_points: 11.0,
            goals_for: 9.0,
            goals_against: 3.0,
            goal_diff: 6.0,
            win_rate: 0.6,
        };
        let adapted = adapter(FeatureSchema::FormOdds)
            .adapt(&request(FormInput::Explicit(snapshot)))
            .unwrap();
        assert_eq!(adapted.form, snapshot);
        assert!(adapted.warnings.is_empty());
        assert_eq!(
            adapted.vector.values(),
            &[1.0, 11.0, 9.0, 3.0, 6.0, 0.6, 2.0, 3.0, 4.0]
        );
    }

    #[test]
    fn test_output_matches_model_columns() {
        for schema in FeatureSchema::ALL {
            let a = adapter(schema);
            let adapted = a
                .adapt(&request(FormInput::parse_streak("W,W,D,L,W").unwrap()))
                .unwrap();
            assert_eq!(adapted.vector.names(), schema.feature_names(5).as_slice());
        }
    }

    #[test]
    fn test_mismatched_model_columns_rejected() {
        let err = FeatureParityAdapter::new(
            FeatureSchema::FormOdds,
            5,
            FeatureSchema::FormOddsPlus.feature_names(5),
        )
        .unwrap_err();
        assert!(matches!(err, FormError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_wrong_length() {
        let a = adapter(FeatureSchema::FormOdds);
        let err = a
            .adapt(&request(FormInput::parse_streak("W,W,D,L").unwrap()))
            .unwrap_err();
        assert!(matches!(
            err,
            FormError::InputFormat(InputError::WrongLength {
                expected: 5,
                actual: 4,
                ..
            })
        ));

        let err = a
            .adapt(&request(FormInput::parse_scorelines("1-0,1-0,1-0,1-0,1-0,1-0").unwrap()))
            .unwrap_err();
        assert!(matches!(
            err,
            FormError::InputFormat(InputError::WrongLength { actual: 6, .. })
        ));
    }

    #[test]
    fn test_malformed_elements_identified() {
        assert_eq!(
            FormInput::parse_streak("W, X, D").unwrap_err(),
            InputError::BadToken {
                position: 2,
                text: "X".to_string()
            }
        );
        assert_eq!(
            FormInput::parse_scorelines("2-1, 0-0, two-one").unwrap_err(),
            InputError::BadScoreline {
                position: 3,
                text: "two-one".to_string()
            }
        );
        assert!(FormInput::parse_scorelines("2-1,-1-0").is_err());
        assert_eq!(
            FormInput::parse_streak("W,,W,D,L,W").unwrap_err(),
            InputError::BadToken {
                position: 2,
                text: String::new()
            }
        );
        assert_eq!(
            FormInput::parse_scorelines("2-1, 1-0, ").unwrap_err(),
            InputError::BadScoreline {
                position: 3,
                text: String::new()
            }
        );
        assert!(FormInput::parse_streak("w,d,l").is_ok());
    }

    #[test]
    fn test_invalid_odds_rejected() {
        let mut req = request(FormInput::parse_streak("W,W,D,L,W").unwrap());
        req.odds_draw = 0.0;
        let err = adapter(FeatureSchema::FormOdds).adapt(&req).unwrap_err();
        assert!(matches!(err, FormError::InputFormat(InputError::InvalidOdds { .. })));
    }

    #[test]
    fn test_non_finite_explicit_value() {
        let snapshot = FormSnapshot {
            win_rate: f64::NAN,
            ..FormSnapshot::default()
        };
        let err = adapter(FeatureSchema::Form)
            .form_snapshot(&FormInput::Explicit(snapshot))
            .unwrap_err();
        assert_eq!(err, InputError::NonFiniteForm { name: "win_rate" });
    }

    #[test]
    fn test_oversized_scorelines_fail_the_request() {
        let huge = ["4000000000-0"; 5].join(",");
        assert_eq!(
            FormInput::parse_scorelines(&huge).unwrap_err(),
            InputError::BadScoreline {
                position: 1,
                text: "4000000000-0".to_string()
            }
        );
        assert!(FormInput::parse_scorelines("1000-0").is_err());

        let (form, _) = adapter(FeatureSchema::FormOdds)
            .form_snapshot(&FormInput::parse_scorelines("999-0,999-0,999-0,999-0,999-0").unwrap())
            .unwrap();
        assert_eq!(form.goals_for, 4995.0);
        assert_eq!(form.goal_diff, 4995.0);
    }
}
