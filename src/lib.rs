//! Single-team football outcome prediction
//!
//! Predicts Win/Draw/Loss for one team from leakage-safe rolling form and
//! devigged bookmaker odds, with identical feature construction at training
//! and serving time.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;
pub mod training;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::features::adapter::InputError;
use crate::features::schema::FeatureSchema;

/// Full-time result code as published in league match files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultCode {
    Home,
    Draw,
    Away,
}

impl ResultCode {
    /// Parse the `FTR` column value (`H`, `D`, `A`)
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_uppercase().as_str() {
            "H" => Some(ResultCode::Home),
            "D" => Some(ResultCode::Draw),
            "A" => Some(ResultCode::Away),
            _ => None,
        }
    }

    /// Result implied by the goal tally
    pub fn from_goals(home_goals: u8, away_goals: u8) -> Self {
        match home_goals.cmp(&away_goals) {
            std::cmp::Ordering::Greater => ResultCode::Home,
            std::cmp::Ordering::Less => ResultCode::Away,
            std::cmp::Ordering::Equal => ResultCode::Draw,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ResultCode::Home => "H",
            ResultCode::Draw => "D",
            ResultCode::Away => "A",
        }
    }
}

/// Match outcome from the subject team's perspective
///
/// Declaration order is the class-index order used by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Loss,
    Draw,
    Win,
}

impl Outcome {
    /// All outcomes in class-index order
    pub const ALL: [Outcome; 3] = [Outcome::Loss, Outcome::Draw, Outcome::Win];

    /// Outcome for the subject team given venue and result code
    pub fn from_perspective(is_home: bool, result: ResultCode) -> Self {
        match (result, is_home) {
            (ResultCode::Draw, _) => Outcome::Draw,
            (ResultCode::Home, true) | (ResultCode::Away, false) => Outcome::Win,
            (ResultCode::Home, false) | (ResultCode::Away, true) => Outcome::Loss,
        }
    }

    /// Outcome implied by a scoreline (subject goals first)
    pub fn from_scoreline(goals_for: u32, goals_against: u32) -> Self {
        match goals_for.cmp(&goals_against) {
            std::cmp::Ordering::Greater => Outcome::Win,
            std::cmp::Ordering::Less => Outcome::Loss,
            std::cmp::Ordering::Equal => Outcome::Draw,
        }
    }

    /// League points: Win=3, Draw=1, Loss=0
    pub fn points(&self) -> u32 {
        match self {
            Outcome::Win => 3,
            Outcome::Draw => 1,
            Outcome::Loss => 0,
        }
    }

    /// Single-letter token (`W`, `D`, `L`)
    pub fn token(&self) -> char {
        match self {
            Outcome::Win => 'W',
            Outcome::Draw => 'D',
            Outcome::Loss => 'L',
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Win => write!(f, "Win"),
            Outcome::Draw => write!(f, "Draw"),
            Outcome::Loss => write!(f, "Loss"),
        }
    }
}

/// A single league match record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub date: NaiveDate,
    pub season: String,
    pub home_team: String,
    pub away_team: String,
    pub home_goals: u8,
    pub away_goals: u8,
    pub result: ResultCode,
    /// Bookmaker decimal odds for a home win
    pub home_odds: Option<f64>,
    pub draw_odds: Option<f64>,
    pub away_odds: Option<f64>,
}

impl MatchRecord {
    /// Check whether a team played in this match
    pub fn involves(&self, team: &str) -> bool {
        self.home_team == team || self.away_team == team
    }

    /// Check if a team was playing at home
    pub fn is_home(&self, team: &str) -> Option<bool> {
        if team == self.home_team {
            Some(true)
        } else if team == self.away_team {
            Some(false)
        } else {
            None
        }
    }

    /// Get the opponent for a given team
    pub fn opponent(&self, team: &str) -> Option<&str> {
        self.is_home(team).map(|home| {
            if home {
                self.away_team.as_str()
            } else {
                self.home_team.as_str()
            }
        })
    }

    /// Goals scored by a specific team
    pub fn goals_for(&self, team: &str) -> Option<u8> {
        self.is_home(team)
            .map(|home| if home { self.home_goals } else { self.away_goals })
    }

    /// Goals conceded by a specific team
    pub fn goals_against(&self, team: &str) -> Option<u8> {
        self.is_home(team)
            .map(|home| if home { self.away_goals } else { self.home_goals })
    }

    /// Whether the result code agrees with the goal tally
    pub fn is_consistent(&self) -> bool {
        ResultCode::from_goals(self.home_goals, self.away_goals) == self.result
    }
}

/// Confidence band derived from the largest predicted probability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceLevel {
    High,   // max probability >= 0.60
    Medium, // max probability >= 0.45
    Low,
}

impl ConfidenceLevel {
    pub fn from_max_probability(p: f64) -> Self {
        if p >= 0.60 {
            ConfidenceLevel::High
        } else if p >= 0.45 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceLevel::High => write!(f, "High"),
            ConfidenceLevel::Medium => write!(f, "Medium"),
            ConfidenceLevel::Low => write!(f, "Low"),
        }
    }
}

/// Application-wide errors
///
/// Records excluded for missing history or odds are not errors; they are
/// counted in [`data::dataset::ExclusionReport`].
#[derive(Debug, Error)]
pub enum FormError {
    #[error("Match table is missing required columns: {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error("Invalid prediction input: {0}")]
    InputFormat(#[from] InputError),

    #[error("Feature schema mismatch: model expects [{}], got [{}]", expected.join(", "), actual.join(", "))]
    SchemaMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Degenerate split: train has {train} rows, test has {test} rows")]
    DegenerateSplit { train: usize, test: usize },

    #[error("Model not trained - run `matchform train` first")]
    NoModel,

    #[error("Model error: {0}")]
    Model(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FormError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub features: FeatureConfig,
    pub training: TrainingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding the season CSV files
    pub raw_dir: String,
    /// File name prefix of the league files (e.g. `E0` for the Premier League)
    pub file_prefix: String,
    /// Bookmaker column prefix; odds are read from `<prefix>H/D/A`
    pub bookmaker: String,
    pub bundle_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub team: String,
    pub window: usize,
    pub schema: FeatureSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub train_fraction: f64,
    pub epochs: usize,
    pub learning_rate: f64,
    pub weight_decay: f64,
    pub hidden_dims: Vec<usize>,
    pub dropout: f64,
    pub class_balanced: bool,
    pub cv_folds: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data: DataConfig {
                raw_dir: "data/raw".to_string(),
                file_prefix: "E0".to_string(),
                bookmaker: "B365".to_string(),
                bundle_dir: "outputs/model".to_string(),
            },
            features: FeatureConfig {
                team: "Chelsea".to_string(),
                window: 5,
                schema: FeatureSchema::FormOdds,
            },
            training: TrainingConfig {
                train_fraction: 0.8,
                epochs: 300,
                learning_rate: 1e-2,
                weight_decay: 1e-4,
                hidden_dims: vec![32, 16],
                dropout: 0.1,
                class_balanced: true,
                cv_folds: 5,
            },
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FormError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| FormError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| FormError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_perspective() {
        assert_eq!(Outcome::from_perspective(true, ResultCode::Home), Outcome::Win);
        assert_eq!(Outcome::from_perspective(false, ResultCode::Home), Outcome::Loss);
        assert_eq!(Outcome::from_perspective(true, ResultCode::Away), Outcome::Loss);
        assert_eq!(Outcome::from_perspective(false, ResultCode::Away), Outcome::Win);
        assert_eq!(Outcome::from_perspective(true, ResultCode::Draw), Outcome::Draw);
        assert_eq!(Outcome::from_perspective(false, ResultCode::Draw), Outcome::Draw);
    }

    #[test]
    fn test_result_code_parsing() {
        assert_eq!(ResultCode::from_code("H"), Some(ResultCode::Home));
        assert_eq!(ResultCode::from_code(" d "), Some(ResultCode::Draw));
        assert_eq!(ResultCode::from_code("A"), Some(ResultCode::Away));
        assert_eq!(ResultCode::from_code("X"), None);
        assert_eq!(ResultCode::from_goals(2, 1), ResultCode::Home);
        assert_eq!(ResultCode::from_goals(0, 0), ResultCode::Draw);
    }

    #[test]
    fn test_confidence_bands() {
        assert_eq!(ConfidenceLevel::from_max_probability(0.61), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_max_probability(0.60), ConfidenceLevel::High);
        assert_eq!(ConfidenceLevel::from_max_probability(0.50), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_max_probability(0.40), ConfidenceLevel::Low);
    }

    #[test]
    fn test_config_round_trip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.features.window, 5);
        assert_eq!(parsed.features.schema, FeatureSchema::FormOdds);
        assert_eq!(parsed.data.bookmaker, "B365");
    }
}
