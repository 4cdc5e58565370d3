//! Labeled feature tables for training
//!
//! Joins labeled matches with their rolling form and odds features. Rows
//! that cannot be featurized are dropped and counted, never imputed.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::io::Write;

use crate::data::ingest::MatchTable;
use crate::data::labeler::{MatchLabeler, TeamMatch};
use crate::data::split::DatasetSplitter;
use crate::features::odds::OddsNormalizer;
use crate::features::rolling::RollingFormComputer;
use crate::features::schema::{FeatureRow, FeatureSchema, FeatureVector};
use crate::{Outcome, Result};

/// Counts of rows dropped on the way to a feature table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExclusionReport {
    pub unparseable_date: usize,
    /// Goals missing or result code unreadable
    pub missing_result: usize,
    /// Result code disagrees with the goals
    pub inconsistent_result: usize,
    /// Fewer than `window` prior matches
    pub insufficient_history: usize,
    /// Schema needs odds the match lacks
    pub missing_odds: usize,
}

impl ExclusionReport {
    pub fn total(&self) -> usize {
        self.unparseable_date
            + self.missing_result
            + self.inconsistent_result
            + self.insufficient_history
            + self.missing_odds
    }

    pub fn merge(&mut self, other: &ExclusionReport) {
        self.unparseable_date += other.unparseable_date;
        self.missing_result += other.missing_result;
        self.inconsistent_result += other.inconsistent_result;
        self.insufficient_history += other.insufficient_history;
        self.missing_odds += other.missing_odds;
    }
}

impl fmt::Display for ExclusionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} excluded (bad date {}, no result {}, inconsistent result {}, short history {}, no odds {})",
            self.total(),
            self.unparseable_date,
            self.missing_result,
            self.inconsistent_result,
            self.insufficient_history,
            self.missing_odds
        )
    }
}

/// One training example
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    pub date: NaiveDate,
    pub season: String,
    pub opponent: String,
    pub features: FeatureVector,
    pub outcome: Outcome,
}

/// Split a slice of samples into model inputs and labels
pub fn unzip_samples(samples: &[LabeledSample]) -> (Vec<FeatureVector>, Vec<Outcome>) {
    samples
        .iter()
        .map(|s| (s.features.clone(), s.outcome))
        .unzip()
}

/// Date-ordered feature table for one team
#[derive(Debug, Clone)]
pub struct FeatureTable {
    schema: FeatureSchema,
    window: usize,
    samples: Vec<LabeledSample>,
    exclusions: ExclusionReport,
}

impl FeatureTable {
    /// Featurize a team's labeled matches (ascending date order)
    pub fn build(matches: &[TeamMatch], schema: FeatureSchema, window: usize) -> Result<Self> {
        let computer = RollingFormComputer::new(window)?;
        let mut exclusions = ExclusionReport::default();
        let mut samples = Vec::with_capacity(matches.len());

        for (m, snapshot) in computer.compute(matches) {
            let Some(form) = snapshot else {
                exclusions.insufficient_history += 1;
                continue;
            };
            let odds = OddsNormalizer::normalize(m);
            if schema.needs_odds() && odds.is_none() {
                log::debug!("No usable odds for {} v {}", m.date, m.opponent);
                exclusions.missing_odds += 1;
                continue;
            }

            let row = FeatureRow {
                is_home: m.is_home,
                form,
                odds,
            };
            samples.push(LabeledSample {
                date: m.date,
                season: m.season.clone(),
                opponent: m.opponent.clone(),
                features: schema.vectorize(window, &row)?,
                outcome: m.outcome,
            });
        }

        log::info!(
            "Built {} feature rows ({} schema, window {}); {}",
            samples.len(),
            schema,
            window,
            exclusions
        );
        Ok(FeatureTable {
            schema,
            window,
            samples,
            exclusions,
        })
    }

    /// Label a league table for `team` and featurize the result
    pub fn from_league(
        table: &MatchTable,
        team: &str,
        schema: FeatureSchema,
        window: usize,
    ) -> Result<Self> {
        let (matches, label_report) = MatchLabeler::new(team).label(table);
        let mut built = Self::build(&matches, schema, window)?;
        built.exclusions.merge(&label_report);
        Ok(built)
    }

    pub fn schema(&self) -> FeatureSchema {
        self.schema
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.schema.feature_names(self.window)
    }

    pub fn samples(&self) -> &[LabeledSample] {
        &self.samples
    }

    pub fn exclusions(&self) -> &ExclusionReport {
        &self.exclusions
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn features(&self) -> Vec<FeatureVector> {
        self.samples.iter().map(|s| s.features.clone()).collect()
    }

    pub fn labels(&self) -> Vec<Outcome> {
        self.samples.iter().map(|s| s.outcome).collect()
    }

    /// Rows per outcome, in class-index order
    pub fn class_counts(&self) -> [usize; 3] {
        let mut counts = [0usize; 3];
        for s in &self.samples {
            counts[s.outcome as usize] += 1;
        }
        counts
    }

    /// Chronological train/test split; both sides must be non-empty
    pub fn split(&self, splitter: &DatasetSplitter) -> Result<(Vec<LabeledSample>, Vec<LabeledSample>)> {
        let (train, test) = splitter.split_checked(&self.samples)?;
        if let (Some(last), Some(first)) = (train.last(), test.first()) {
            log::info!(
                "Train: {} rows up to {}, test: {} rows from {}",
                train.len(),
                last.date,
                test.len(),
                first.date
            );
        }
        Ok((train, test))
    }

    /// Write the table as CSV: identifying columns, features, then the label
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut out = csv::Writer::from_writer(writer);

        let mut header = vec!["Date".to_string(), "Season".to_string(), "Opponent".to_string()];
        header.extend(self.feature_names());
        header.push("Outcome".to_string());
        out.write_record(&header)?;

        for s in &self.samples {
            let mut record = vec![s.date.to_string(), s.season.clone(), s.opponent.clone()];
            record.extend(s.features.values().iter().map(|v| v.to_string()));
            record.push(s.outcome.token().to_string());
            out.write_record(&record)?;
        }
        out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ingest::RawMatch;
    use crate::ResultCode;

    fn team_match(day: u32, goals_for: u8, goals_against: u8, odds: bool) -> TeamMatch {
        let result = ResultCode::from_goals(goals_for, goals_against);
        TeamMatch {
            date: NaiveDate::from_ymd_opt(2019, 3, day).unwrap(),
            season: "E0_1819".to_string(),
            opponent: format!("Opp{}", day),
            is_home: true,
            goals_for,
            goals_against,
            result,
            outcome: Outcome::from_perspective(true, result),
            home_odds: odds.then_some(2.0),
            draw_odds: odds.then_some(3.4),
            away_odds: odds.then_some(3.9),
        }
    }

    fn matches() -> Vec<TeamMatch> {
        (1..=10)
            .map(|d| team_match(d, (d % 3) as u8, 1, d != 8))
            .collect()
    }

    #[test]
    fn test_build_excludes_short_history() {
        let table = FeatureTable::build(&matches(), FeatureSchema::Form, 5).unwrap();
        assert_eq!(table.len(), 5);
        assert_eq!(table.exclusions().insufficient_history, 5);
        assert_eq!(table.exclusions().missing_odds, 0);
        assert_eq!(table.samples()[0].opponent, "Opp6");
    }

    #[test]
    fn test_build_excludes_missing_odds() {
        let table = FeatureTable::build(&matches(), FeatureSchema::FormOdds, 5).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.exclusions().missing_odds, 1);
        assert!(table.samples().iter().all(|s| s.opponent != "Opp8"));
        for s in table.samples() {
            assert_eq!(s.features.names(), table.feature_names().as_slice());
            assert!(s.features.values().iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_class_counts_and_labels() {
        let table = FeatureTable::build(&matches(), FeatureSchema::Form, 5).unwrap();
        // Days 6..=10 score 0,1,2,0,1 against 1
        assert_eq!(
            table.labels(),
            vec![Outcome::Loss, Outcome::Draw, Outcome::Win, Outcome::Loss, Outcome::Draw]
        );
        assert_eq!(table.class_counts(), [2, 2, 1]);
    }

    #[test]
    fn test_from_league_merges_reports() {
        let rows = vec![
            RawMatch {
                season: "E0_1819".to_string(),
                date: "bad".to_string(),
                home_team: "Chelsea".to_string(),
                away_team: "Spurs".to_string(),
                home_goals: Some(1),
                away_goals: Some(0),
                result: "H".to_string(),
                ..RawMatch::default()
            },
            RawMatch {
                season: "E0_1819".to_string(),
                date: "01/09/2018".to_string(),
                home_team: "Chelsea".to_string(),
                away_team: "Spurs".to_string(),
                home_goals: Some(1),
                away_goals: Some(0),
                result: "H".to_string(),
                ..RawMatch::default()
            },
        ];
        let table =
            FeatureTable::from_league(&MatchTable::from_rows(rows), "Chelsea", FeatureSchema::Form, 1)
                .unwrap();
        assert!(table.is_empty());
        assert_eq!(table.exclusions().unparseable_date, 1);
        assert_eq!(table.exclusions().insufficient_history, 1);
        assert_eq!(table.exclusions().total(), 2);
    }

    #[test]
    fn test_split_is_chronological() {
        let many: Vec<TeamMatch> = (1..=28).map(|d| team_match(d, (d % 4) as u8, 1, true)).collect();
        let table = FeatureTable::build(&many, FeatureSchema::FormOddsPlus, 3).unwrap();
        let (train, test) = table.split(&DatasetSplitter::new(0.8).unwrap()).unwrap();
        assert_eq!(train.len() + test.len(), table.len());
        assert_eq!(train.len(), 20);
        assert!(train.last().unwrap().date < test.first().unwrap().date);
    }

    #[test]
    fn test_write_csv() {
        let table = FeatureTable::build(&matches(), FeatureSchema::Form, 5).unwrap();
        let mut buf = Vec::new();
        table.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "Date,Season,Opponent,IsHome,FormPoints_5,GoalsFor_5,GoalsAgainst_5,GoalDiff_5,WinRate_5,Outcome"
        );
        assert_eq!(lines.count(), 5);
    }
}
