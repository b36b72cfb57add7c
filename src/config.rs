use chrono::NaiveDate;

use crate::error::{AppError, Result};

pub const FANTASY_API_URL: &str = "https://api.fantasyliga.example/v2";
pub const LEAGUE_API_URL: &str = "https://stats.acbliga.example/api";

/// Every manager starts the season with the same cash patrimony.
pub const STARTING_PATRIMONY: i64 = 40_000_000;

/// Tokens shorter than this are dropped before name matching.
pub const MIN_TOKEN_LEN: usize = 3;

/// Generic club/corporate suffixes that carry no identity when matching
/// team names across providers.
pub const NAME_STOP_WORDS: &[&str] = &["CLUB", "BALONCESTO", "BASKET", "SAD"];

/// Suffix the fantasy provider appends to the display name of a
/// rescheduled round. Stripped during round canonicalization.
pub const POSTPONED_MARKER: &str = "(aplazada)";

/// Page size used when walking paged provider endpoints.
pub const PROVIDER_PAGE_SIZE: usize = 200;

/// Timeout for individual provider HTTP calls (seconds).
pub const PROVIDER_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct Config {
    pub fantasy_api_url: String,
    pub league_api_url: String,
    pub log_level: String,
    pub db_path: String,
    /// League id on the fantasy platform (FANTASY_LEAGUE_ID)
    pub fantasy_league_id: String,
    /// Season identifier on the official stats source (LEAGUE_SEASON)
    pub league_season: String,
    /// First day of the season (LEAGUE_START_DATE, `YYYY-MM-DD`).
    /// Used to resolve initial-squad acquisition prices.
    pub league_start_date: NaiveDate,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let league_start_date = parse_league_start(
            &std::env::var("LEAGUE_START_DATE").unwrap_or_else(|_| "2025-09-01".to_string()),
        )?;

        Ok(Self {
            fantasy_api_url: std::env::var("FANTASY_API_URL")
                .unwrap_or_else(|_| FANTASY_API_URL.to_string()),
            league_api_url: std::env::var("LEAGUE_API_URL")
                .unwrap_or_else(|_| LEAGUE_API_URL.to_string()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "fantasy.db".to_string()),
            fantasy_league_id: std::env::var("FANTASY_LEAGUE_ID").unwrap_or_default(),
            league_season: std::env::var("LEAGUE_SEASON")
                .unwrap_or_else(|_| "2025-26".to_string()),
            league_start_date,
        })
    }
}

pub fn parse_league_start(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
        AppError::Config(format!("LEAGUE_START_DATE must be YYYY-MM-DD, got {s:?}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn league_start_must_be_a_real_iso_date() {
        assert_eq!(
            parse_league_start("2025-09-01").unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()
        );
        assert!(parse_league_start("01/09/2025").is_err());
        assert!(parse_league_start("2025-02-30").is_err());
        assert!(parse_league_start("").is_err());
    }
}
