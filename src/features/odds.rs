//! Bookmaker odds features
//!
//! Re-orients home/draw/away decimal odds to the subject team and removes
//! the bookmaker margin proportionally.

use serde::{Deserialize, Serialize};

use crate::data::labeler::TeamMatch;

/// Decimal odds from the subject team's perspective
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TeamOdds {
    pub win: f64,
    pub draw: f64,
    pub loss: f64,
}

impl TeamOdds {
    /// Validated odds; every price must be finite and strictly positive
    pub fn new(win: f64, draw: f64, loss: f64) -> Option<Self> {
        let valid = |o: f64| o.is_finite() && o > 0.0;
        if valid(win) && valid(draw) && valid(loss) {
            Some(TeamOdds { win, draw, loss })
        } else {
            None
        }
    }

    /// Re-orient home/draw/away odds by venue
    pub fn from_match_odds(
        is_home: bool,
        home: Option<f64>,
        draw: Option<f64>,
        away: Option<f64>,
    ) -> Option<Self> {
        let (win, loss) = if is_home { (home?, away?) } else { (away?, home?) };
        Self::new(win, draw?, loss)
    }

    pub fn to_array(&self) -> [f64; 3] {
        [self.win, self.draw, self.loss]
    }
}

/// Odds-derived features for one match
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OddsFeatures {
    pub odds: TeamOdds,
    /// Devigged implied probabilities; these sum to 1
    pub implied_win: f64,
    pub implied_draw: f64,
    pub implied_loss: f64,
    /// Sum of raw reciprocals before normalization
    pub overround: f64,
    pub log_odds_win: f64,
    pub log_odds_draw: f64,
    pub log_odds_loss: f64,
}

impl OddsFeatures {
    /// Devig validated odds
    pub fn from_odds(odds: TeamOdds) -> Self {
        let raw_win = 1.0 / odds.win;
        let raw_draw = 1.0 / odds.draw;
        let raw_loss = 1.0 / odds.loss;
        let overround = raw_win + raw_draw + raw_loss;

        OddsFeatures {
            odds,
            implied_win: raw_win / overround,
            implied_draw: raw_draw / overround,
            implied_loss: raw_loss / overround,
            overround,
            log_odds_win: odds.win.ln(),
            log_odds_draw: odds.draw.ln(),
            log_odds_loss: odds.loss.ln(),
        }
    }

    /// Bookmaker margin as a fraction (overround - 1)
    pub fn margin(&self) -> f64 {
        self.overround - 1.0
    }
}

/// Maps a team's match odds onto odds features
pub struct OddsNormalizer;

impl OddsNormalizer {
    /// Odds features for a match, or None when any price is missing or invalid
    pub fn normalize(m: &TeamMatch) -> Option<OddsFeatures> {
        TeamOdds::from_match_odds(m.is_home, m.home_odds, m.draw_odds, m.away_odds)
            .map(OddsFeatures::from_odds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Outcome, ResultCode};
    use chrono::NaiveDate;

    fn with_odds(is_home: bool, home: Option<f64>, draw: Option<f64>, away: Option<f64>) -> TeamMatch {
        TeamMatch {
            date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            season: "E0_1920".to_string(),
            opponent: "Arsenal".to_string(),
            is_home,
            goals_for: 1,
            goals_against: 0,
            result: if is_home { ResultCode::Home } else { ResultCode::Away },
            outcome: Outcome::Win,
            home_odds: home,
            draw_odds: draw,
            away_odds: away,
        }
    }

    #[test]
    fn test_devig_example() {
        let features = OddsFeatures::from_odds(TeamOdds::new(2.0, 3.0, 4.0).unwrap());
        assert!((features.overround - 1.083_333_333).abs() < 1e-6);
        assert!((features.implied_win - 0.461_538).abs() < 1e-4);
        assert!((features.implied_draw - 0.307_692).abs() < 1e-4);
        assert!((features.implied_loss - 0.230_769).abs() < 1e-4);
        assert!((features.log_odds_win - 2.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_implied_probabilities_sum_to_one() {
        let prices = [1.01, 1.2, 1.5, 2.0, 3.3, 4.75, 7.0, 15.0, 41.0];
        for &w in &prices {
            for &d in &prices {
                for &l in &prices {
                    let f = OddsFeatures::from_odds(TeamOdds::new(w, d, l).unwrap());
                    let sum = f.implied_win + f.implied_draw + f.implied_loss;
                    assert!((sum - 1.0).abs() < 1e-9);
                    assert!(f.overround > 0.0);
                }
            }
        }
    }

    #[test]
    fn test_overround_of_real_book() {
        // Bookmaker prices carry a margin: overround above one
        let f = OddsFeatures::from_odds(TeamOdds::new(1.61, 4.0, 6.5).unwrap());
        assert!(f.overround >= 1.0 - 1e-9);
        assert!(f.margin() > 0.0);
    }

    #[test]
    fn test_reorientation_by_venue() {
        let home = OddsNormalizer::normalize(&with_odds(true, Some(1.5), Some(4.0), Some(6.0))).unwrap();
        assert_eq!(home.odds, TeamOdds { win: 1.5, draw: 4.0, loss: 6.0 });

        let away = OddsNormalizer::normalize(&with_odds(false, Some(1.5), Some(4.0), Some(6.0))).unwrap();
        assert_eq!(away.odds, TeamOdds { win: 6.0, draw: 4.0, loss: 1.5 });
    }

    #[test]
    fn test_invalid_odds_excluded() {
        assert!(OddsNormalizer::normalize(&with_odds(true, None, Some(3.0), Some(4.0))).is_none());
        assert!(OddsNormalizer::normalize(&with_odds(true, Some(2.0), None, Some(4.0))).is_none());
        assert!(OddsNormalizer::normalize(&with_odds(true, Some(0.0), Some(3.0), Some(4.0))).is_none());
        assert!(OddsNormalizer::normalize(&with_odds(false, Some(2.0), Some(3.0), Some(-1.5))).is_none());
        assert!(OddsNormalizer::normalize(&with_odds(true, Some(f64::NAN), Some(3.0), Some(4.0))).is_none());
    }
}
