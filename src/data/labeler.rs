//! Team-perspective match labeling
//!
//! Filters a league table down to one team's matches and labels each from
//! that team's point of view.

use chrono::NaiveDate;

use crate::data::dataset::ExclusionReport;
use crate::data::ingest::{MatchTable, RawMatch};
use crate::{MatchRecord, Outcome, ResultCode};

/// Parse a league-file date
///
/// League files are day-first, with two- or four-digit years depending on
/// the season; ISO dates are accepted as well.
pub fn parse_match_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    let format = match text.rsplit_once('/') {
        Some((_, year)) if year.len() == 2 => "%d/%m/%y",
        Some(_) => "%d/%m/%Y",
        None => "%Y-%m-%d",
    };
    NaiveDate::parse_from_str(text, format).ok()
}

/// A match seen from the subject team's side
#[derive(Debug, Clone, PartialEq)]
pub struct TeamMatch {
    pub date: NaiveDate,
    pub season: String,
    pub opponent: String,
    pub is_home: bool,
    pub goals_for: u8,
    pub goals_against: u8,
    pub result: ResultCode,
    pub outcome: Outcome,
    /// Bookmaker odds for the home side, draw, and away side
    pub home_odds: Option<f64>,
    pub draw_odds: Option<f64>,
    pub away_odds: Option<f64>,
}

impl TeamMatch {
    /// Derive the team-perspective view of a match, or None if the team did not play
    pub fn from_record(record: &MatchRecord, team: &str) -> Option<Self> {
        let is_home = record.is_home(team)?;
        Some(TeamMatch {
            date: record.date,
            season: record.season.clone(),
            opponent: record.opponent(team)?.to_string(),
            is_home,
            goals_for: record.goals_for(team)?,
            goals_against: record.goals_against(team)?,
            result: record.result,
            outcome: Outcome::from_perspective(is_home, record.result),
            home_odds: record.home_odds,
            draw_odds: record.draw_odds,
            away_odds: record.away_odds,
        })
    }

    pub fn points(&self) -> u32 {
        self.outcome.points()
    }
}

/// Labels one team's matches from a league-wide table
#[derive(Debug, Clone)]
pub struct MatchLabeler {
    team: String,
}

impl MatchLabeler {
    pub fn new(team: impl Into<String>) -> Self {
        MatchLabeler { team: team.into() }
    }

    pub fn team(&self) -> &str {
        &self.team
    }

    /// Produce the team's matches in ascending date order
    ///
    /// Rows with unparseable dates, missing goals, or a result code that
    /// disagrees with the goals are dropped and counted.
    pub fn label(&self, table: &MatchTable) -> (Vec<TeamMatch>, ExclusionReport) {
        let mut report = ExclusionReport::default();
        let mut matches = Vec::new();

        for raw in table.rows() {
            if raw.home_team != self.team && raw.away_team != self.team {
                continue;
            }
            let Some(record) = self.to_record(raw, &mut report) else {
                continue;
            };
            if let Some(m) = TeamMatch::from_record(&record, &self.team) {
                matches.push(m);
            }
        }

        // Stable sort keeps file order for same-day fixtures
        matches.sort_by_key(|m| m.date);

        if report.total() > 0 {
            log::info!("{}: dropped {} unusable match rows", self.team, report.total());
        }
        log::info!("{}: {} matches labeled", self.team, matches.len());
        (matches, report)
    }

    fn to_record(&self, raw: &RawMatch, report: &mut ExclusionReport) -> Option<MatchRecord> {
        let Some(date) = parse_match_date(&raw.date) else {
            log::debug!("Unparseable date {:?} ({} v {})", raw.date, raw.home_team, raw.away_team);
            report.unparseable_date += 1;
            return None;
        };
        let (Some(home_goals), Some(away_goals)) = (raw.home_goals, raw.away_goals) else {
            log::debug!("Missing goals on {} ({} v {})", date, raw.home_team, raw.away_team);
            report.missing_result += 1;
            return None;
        };
        let result = if raw.result.trim().is_empty() {
            ResultCode::from_goals(home_goals, away_goals)
        } else {
            match ResultCode::from_code(&raw.result) {
                Some(code) => code,
                None => {
                    log::debug!("Unknown result code {:?} on {}", raw.result, date);
                    report.missing_result += 1;
                    return None;
                }
            }
        };

        let record = MatchRecord {
            date,
            season: raw.season.clone(),
            home_team: raw.home_team.clone(),
            away_team: raw.away_team.clone(),
            home_goals,
            away_goals,
            result,
            home_odds: raw.home_odds,
            draw_odds: raw.draw_odds,
            away_odds: raw.away_odds,
        };
        if !record.is_consistent() {
            log::warn!(
                "Result {} disagrees with score {}-{} on {} ({} v {})",
                result.code(),
                home_goals,
                away_goals,
                date,
                raw.home_team,
                raw.away_team
            );
            report.inconsistent_result += 1;
            return None;
        }
        Some(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(date: &str, home: &str, away: &str, hg: u8, ag: u8, ftr: &str) -> RawMatch {
        RawMatch {
            season: "E0_1819".to_string(),
            date: date.to_string(),
            home_team: home.to_string(),
            away_team: away.to_string(),
            home_goals: Some(hg),
            away_goals: Some(ag),
            result: ftr.to_string(),
            home_odds: Some(2.0),
            draw_odds: Some(3.0),
            away_odds: Some(4.0),
        }
    }

    #[test]
    fn test_parse_match_date() {
        assert_eq!(parse_match_date("18/08/2018"), NaiveDate::from_ymd_opt(2018, 8, 18));
        assert_eq!(parse_match_date("18/08/18"), NaiveDate::from_ymd_opt(2018, 8, 18));
        assert_eq!(parse_match_date("2018-08-18"), NaiveDate::from_ymd_opt(2018, 8, 18));
        assert_eq!(parse_match_date("not a date"), None);
        assert_eq!(parse_match_date("31/02/2018"), None);
    }

    #[test]
    fn test_labels_from_team_perspective() {
        let table = MatchTable::from_rows(vec![
            raw("18/08/2018", "Chelsea", "Arsenal", 3, 2, "H"),
            raw("11/08/2018", "Huddersfield", "Chelsea", 0, 3, "A"),
            raw("12/08/2018", "Liverpool", "West Ham", 4, 0, "H"),
            raw("26/08/2018", "Newcastle", "Chelsea", 1, 1, "D"),
            raw("01/09/2018", "Chelsea", "Bournemouth", 0, 2, "A"),
        ]);

        let (matches, report) = MatchLabeler::new("Chelsea").label(&table);
        assert_eq!(report.total(), 0);
        assert_eq!(matches.len(), 4);

        // Sorted ascending by date
        assert_eq!(matches[0].opponent, "Huddersfield");
        assert!(!matches[0].is_home);
        assert_eq!((matches[0].goals_for, matches[0].goals_against), (3, 0));
        assert_eq!(matches[0].outcome, Outcome::Win);

        assert_eq!(matches[1].opponent, "Arsenal");
        assert!(matches[1].is_home);
        assert_eq!(matches[1].outcome, Outcome::Win);

        assert_eq!(matches[2].outcome, Outcome::Draw);
        assert!(!matches[2].is_home);

        assert_eq!(matches[3].outcome, Outcome::Loss);
        assert_eq!((matches[3].goals_for, matches[3].goals_against), (0, 2));
    }

    #[test]
    fn test_outcome_agrees_with_venue_and_result() {
        let table = MatchTable::from_rows(vec![
            raw("01/08/2018", "Chelsea", "A", 1, 0, "H"),
            raw("02/08/2018", "B", "Chelsea", 1, 0, "H"),
            raw("03/08/2018", "Chelsea", "C", 0, 1, "A"),
            raw("04/08/2018", "D", "Chelsea", 0, 1, "A"),
            raw("05/08/2018", "Chelsea", "E", 1, 1, "D"),
            raw("06/08/2018", "F", "Chelsea", 2, 2, "D"),
        ]);
        let (matches, _) = MatchLabeler::new("Chelsea").label(&table);
        for m in &matches {
            let win = (m.is_home && m.result == ResultCode::Home)
                || (!m.is_home && m.result == ResultCode::Away);
            let loss = (m.is_home && m.result == ResultCode::Away)
                || (!m.is_home && m.result == ResultCode::Home);
            assert_eq!(m.outcome == Outcome::Win, win);
            assert_eq!(m.outcome == Outcome::Loss, loss);
            assert_eq!(m.outcome == Outcome::Draw, m.result == ResultCode::Draw);
        }
    }

    #[test]
    fn test_unusable_rows_are_counted() {
        let mut no_goals = raw("20/08/2018", "Chelsea", "B", 0, 0, "D");
        no_goals.home_goals = None;
        let table = MatchTable::from_rows(vec![
            raw("garbage", "Chelsea", "A", 1, 0, "H"),
            no_goals,
            raw("21/08/2018", "Chelsea", "C", 2, 0, "A"),
            raw("22/08/2018", "Chelsea", "D", 2, 0, ""),
        ]);
        let (matches, report) = MatchLabeler::new("Chelsea").label(&table);
        assert_eq!(report.unparseable_date, 1);
        assert_eq!(report.missing_result, 1);
        assert_eq!(report.inconsistent_result, 1);
        // Blank result code is derived from the goals
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].result, ResultCode::Home);
        assert_eq!(matches[0].outcome, Outcome::Win);
    }
}
