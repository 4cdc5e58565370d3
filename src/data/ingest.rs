//! League match file ingestion
//!
//! Reads football-data.co.uk style CSV files into an untyped match table.
//! Typing (dates, result codes) is left to the labeler so unparseable rows
//! can be counted rather than aborting the load.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use crate::{FormError, Result};

/// Columns every league file must provide
pub const REQUIRED_COLUMNS: [&str; 6] = ["Date", "HomeTeam", "AwayTeam", "FTHG", "FTAG", "FTR"];

/// One row of a league file, as read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawMatch {
    pub season: String,
    pub date: String,
    pub home_team: String,
    pub away_team: String,
    pub home_goals: Option<u8>,
    pub away_goals: Option<u8>,
    pub result: String,
    pub home_odds: Option<f64>,
    pub draw_odds: Option<f64>,
    pub away_odds: Option<f64>,
}

/// League-wide match table, possibly spanning several seasons
#[derive(Debug, Clone, Default)]
pub struct MatchTable {
    rows: Vec<RawMatch>,
}

impl MatchTable {
    /// Build a table from rows already in memory
    pub fn from_rows(rows: Vec<RawMatch>) -> Self {
        MatchTable { rows }
    }

    /// Read one season file from any reader
    ///
    /// Fails with a schema error listing every required column the header lacks.
    pub fn from_reader<R: Read>(reader: R, season: &str, bookmaker: &str) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let index: HashMap<&str, usize> = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h, i))
            .collect();

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| !index.contains_key(*c))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(FormError::Schema { missing });
        }

        let odds_cols = [
            format!("{}H", bookmaker),
            format!("{}D", bookmaker),
            format!("{}A", bookmaker),
        ];
        let odds_idx: Vec<Option<usize>> = odds_cols
            .iter()
            .map(|c| index.get(c.as_str()).copied())
            .collect();
        if odds_idx.iter().any(|i| i.is_none()) {
            log::debug!("{}: bookmaker columns {:?} not all present", season, odds_cols);
        }

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let field = |name: &str| -> &str {
                index
                    .get(name)
                    .and_then(|&i| record.get(i))
                    .unwrap_or("")
            };
            let odds = |i: Option<usize>| -> Option<f64> {
                i.and_then(|i| record.get(i)).and_then(|v| v.parse::<f64>().ok())
            };

            // Trailing blank lines in the league files parse as empty records
            if field("HomeTeam").is_empty() && field("AwayTeam").is_empty() {
                continue;
            }

            rows.push(RawMatch {
                season: season.to_string(),
                date: field("Date").to_string(),
                home_team: field("HomeTeam").to_string(),
                away_team: field("AwayTeam").to_string(),
                home_goals: field("FTHG").parse().ok(),
                away_goals: field("FTAG").parse().ok(),
                result: field("FTR").to_string(),
                home_odds: odds(odds_idx[0]),
                draw_odds: odds(odds_idx[1]),
                away_odds: odds(odds_idx[2]),
            });
        }

        Ok(MatchTable { rows })
    }

    /// Load every `<prefix>*.csv` file in a directory, in file-name order
    ///
    /// Each row is tagged with its file stem as the season tag.
    pub fn load_dir(dir: &Path, prefix: &str, bookmaker: &str) -> Result<Self> {
        let mut files: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| {
                FormError::Config(format!("Failed to read data directory {}: {}", dir.display(), e))
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
                name.starts_with(prefix) && name.to_lowercase().ends_with(".csv")
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(FormError::Config(format!(
                "No {}*.csv files found in {}",
                prefix,
                dir.display()
            )));
        }

        let mut table = MatchTable::default();
        for path in &files {
            let season = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();
            let file = std::fs::File::open(path)?;
            let season_table = Self::from_reader(file, &season, bookmaker)?;
            log::info!("Loaded {} rows from {}", season_table.len(), path.display());
            table.rows.extend(season_table.rows);
        }

        log::info!("Loaded {} files, {} matches", files.len(), table.len());
        Ok(table)
    }

    pub fn rows(&self) -> &[RawMatch] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
