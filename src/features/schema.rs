//! Feature schemas shared by training and serving
//!
//! Column names and values are produced together from a single list, so the
//! order a model is trained on is the order every request is served with.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::features::odds::{OddsFeatures, TeamOdds};
use crate::features::rolling::FormSnapshot;
use crate::{FormError, Result};

/// Which columns a model consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureSchema {
    /// Venue plus rolling form
    Form,
    /// Form plus team-perspective decimal odds
    FormOdds,
    /// Form, odds, implied probabilities, overround and log-odds
    FormOddsPlus,
}

impl FeatureSchema {
    pub const ALL: [FeatureSchema; 3] = [
        FeatureSchema::Form,
        FeatureSchema::FormOdds,
        FeatureSchema::FormOddsPlus,
    ];

    pub fn needs_odds(&self) -> bool {
        !matches!(self, FeatureSchema::Form)
    }

    /// Number of columns
    pub fn dim(&self) -> usize {
        match self {
            FeatureSchema::Form => 1 + FormSnapshot::DIM,
            FeatureSchema::FormOdds => 1 + FormSnapshot::DIM + 3,
            FeatureSchema::FormOddsPlus => 1 + FormSnapshot::DIM + 3 + 7,
        }
    }

    /// Ordered column names for a given rolling window
    pub fn feature_names(&self, window: usize) -> Vec<String> {
        // Names do not depend on values; any valid odds will do
        let placeholder = TeamOdds {
            win: 1.0,
            draw: 1.0,
            loss: 1.0,
        };
        let row = FeatureRow {
            is_home: false,
            form: FormSnapshot::default(),
            odds: Some(OddsFeatures::from_odds(placeholder)),
        };
        self.columns(window, &row)
            .into_iter()
            .map(|(name, _)| name)
            .collect()
    }

    /// Build the model input for one row
    ///
    /// Fails with a schema mismatch when the schema needs odds the row lacks.
    pub fn vectorize(&self, window: usize, row: &FeatureRow) -> Result<FeatureVector> {
        if self.needs_odds() && row.odds.is_none() {
            return Err(FormError::SchemaMismatch {
                expected: self.feature_names(window),
                actual: FeatureSchema::Form.feature_names(window),
            });
        }

        let (names, values): (Vec<String>, Vec<f64>) =
            self.columns(window, row).into_iter().unzip();
        Ok(FeatureVector {
            schema: *self,
            names,
            values,
        })
    }

    /// Verify a stored column list against this schema
    pub fn check_names(&self, window: usize, names: &[String]) -> Result<()> {
        let expected = self.feature_names(window);
        if expected.as_slice() != names {
            return Err(FormError::SchemaMismatch {
                expected: names.to_vec(),
                actual: expected,
            });
        }
        Ok(())
    }

    fn columns(&self, window: usize, row: &FeatureRow) -> Vec<(String, f64)> {
        let mut cols = vec![
            ("IsHome".to_string(), if row.is_home { 1.0 } else { 0.0 }),
            (format!("FormPoints_{}", window), row.form.form_points),
            (format!("GoalsFor_{}", window), row.form.goals_for),
            (format!("GoalsAgainst_{}", window), row.form.goals_against),
            (format!("GoalDiff_{}", window), row.form.goal_diff),
            (format!("WinRate_{}", window), row.form.win_rate),
        ];

        let Some(odds) = row.odds.as_ref().filter(|_| self.needs_odds()) else {
            return cols;
        };
        cols.extend([
            ("Odds_Win".to_string(), odds.odds.win),
            ("Odds_Draw".to_string(), odds.odds.draw),
            ("Odds_Loss".to_string(), odds.odds.loss),
        ]);

        if *self == FeatureSchema::FormOddsPlus {
            cols.extend([
                ("ImpP_Win".to_string(), odds.implied_win),
                ("ImpP_Draw".to_string(), odds.implied_draw),
                ("ImpP_Loss".to_string(), odds.implied_loss),
                ("Overround".to_string(), odds.overround),
                ("LogOdds_Win".to_string(), odds.log_odds_win),
                ("LogOdds_Draw".to_string(), odds.log_odds_draw),
                ("LogOdds_Loss".to_string(), odds.log_odds_loss),
            ]);
        }
        cols
    }
}

impl fmt::Display for FeatureSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureSchema::Form => write!(f, "form"),
            FeatureSchema::FormOdds => write!(f, "form_odds"),
            FeatureSchema::FormOddsPlus => write!(f, "form_odds_plus"),
        }
    }
}

impl FromStr for FeatureSchema {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "form" => Ok(FeatureSchema::Form),
            "form_odds" => Ok(FeatureSchema::FormOdds),
            "form_odds_plus" => Ok(FeatureSchema::FormOddsPlus),
            _ => Err(format!(
                "Unknown schema: {}. Use form, form_odds, or form_odds_plus.",
                s
            )),
        }
    }
}

/// Everything a feature vector can be built from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow {
    pub is_home: bool,
    pub form: FormSnapshot,
    pub odds: Option<OddsFeatures>,
}

/// Named, ordered model input
///
/// Only [`FeatureSchema::vectorize`] constructs these.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    schema: FeatureSchema,
    names: Vec<String>,
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn schema(&self) -> FeatureSchema {
        self.schema
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of a named column
    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }

    /// (name, value) pairs in column order
    pub fn named_values(&self) -> Vec<(String, f64)> {
        self.names.iter().cloned().zip(self.values.iter().copied()).collect()
    }
}
