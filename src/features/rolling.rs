//! Rolling form computation
//!
//! Form over a team's last `window` matches, strictly before the match being
//! described.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::data::labeler::TeamMatch;
use crate::{FormError, Outcome, Result};

/// One prior match as seen by the form aggregate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormEntry {
    pub outcome: Outcome,
    pub goals_for: u32,
    pub goals_against: u32,
}

impl FormEntry {
    /// Entry with unknown goals (both recorded as zero)
    pub fn outcome_only(outcome: Outcome) -> Self {
        FormEntry {
            outcome,
            goals_for: 0,
            goals_against: 0,
        }
    }

    /// Entry from a scoreline; the outcome follows from the goal comparison
    pub fn from_score(goals_for: u32, goals_against: u32) -> Self {
        FormEntry {
            outcome: Outcome::from_scoreline(goals_for, goals_against),
            goals_for,
            goals_against,
        }
    }
}

impl From<&TeamMatch> for FormEntry {
    fn from(m: &TeamMatch) -> Self {
        FormEntry {
            outcome: m.outcome,
            goals_for: m.goals_for as u32,
            goals_against: m.goals_against as u32,
        }
    }
}

/// Form aggregates over a fixed window of prior matches
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FormSnapshot {
    /// Summed league points
    pub form_points: f64,
    /// Summed goals scored
    pub goals_for: f64,
    /// Summed goals conceded
    pub goals_against: f64,
    /// goals_for - goals_against
    pub goal_diff: f64,
    /// Wins divided by the window size
    pub win_rate: f64,
}

impl FormSnapshot {
    /// Number of form values
    pub const DIM: usize = 5;

    /// Aggregate prior matches
    ///
    /// The win-rate denominator is always `window`, never the number of
    /// entries supplied.
    pub fn aggregate<'a>(entries: impl IntoIterator<Item = &'a FormEntry>, window: usize) -> Self {
        let mut points = 0u64;
        let mut goals_for = 0u64;
        let mut goals_against = 0u64;
        let mut wins = 0u64;

        for entry in entries {
            points += u64::from(entry.outcome.points());
            goals_for += u64::from(entry.goals_for);
            goals_against += u64::from(entry.goals_against);
            if entry.outcome == Outcome::Win {
                wins += 1;
            }
        }

        FormSnapshot {
            form_points: points as f64,
            goals_for: goals_for as f64,
            goals_against: goals_against as f64,
            goal_diff: goals_for as f64 - goals_against as f64,
            win_rate: wins as f64 / window as f64,
        }
    }

    /// Convert to flat vector
    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.form_points,
            self.goals_for,
            self.goals_against,
            self.goal_diff,
            self.win_rate,
        ]
    }

    pub fn is_finite(&self) -> bool {
        self.to_vec().iter().all(|v| v.is_finite())
    }
}

/// Computes shifted rolling form over a team's chronological matches
#[derive(Debug, Clone, Copy)]
pub struct RollingFormComputer {
    window: usize,
}

impl RollingFormComputer {
    pub fn new(window: usize) -> Result<Self> {
        if window == 0 {
            return Err(FormError::Config("Rolling window must be positive".to_string()));
        }
        Ok(RollingFormComputer { window })
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Attach a form snapshot to every match
    ///
    /// Matches must be in ascending date order. The snapshot at position `i`
    /// is built from positions `i - window .. i` only, and is `None` while
    /// fewer than `window` prior matches exist.
    pub fn compute<'a>(&self, matches: &'a [TeamMatch]) -> Vec<(&'a TeamMatch, Option<FormSnapshot>)> {
        let mut recent: VecDeque<FormEntry> = VecDeque::with_capacity(self.window + 1);
        let mut out = Vec::with_capacity(matches.len());

        for m in matches {
            let snapshot = if recent.len() == self.window {
                Some(FormSnapshot::aggregate(&recent, self.window))
            } else {
                None
            };
            out.push((m, snapshot));

            recent.push_back(FormEntry::from(m));
            if recent.len() > self.window {
                recent.pop_front();
            }
        }

        out
    }
}
