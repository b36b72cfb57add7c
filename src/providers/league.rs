//! Adapter for the official-league statistics source: teams, rounds,
//! schedule, standings, and per-round player stats.

use serde_json::Value;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::providers::{http_client, val_bool, val_i64, val_str};
use crate::rounds::RawRound;

#[derive(Debug, Clone)]
pub struct RawLeagueTeam {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct RawMatch {
    pub id: i64,
    pub round_id: i64,
    pub home_team_id: Option<String>,
    pub away_team_id: Option<String>,
    pub date: Option<String>,
    pub home_score: Option<i64>,
    pub away_score: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct RawStanding {
    pub team_id: String,
    pub round_id: i64,
    pub position: i64,
    pub wins: i64,
    pub losses: i64,
}

#[derive(Debug, Clone)]
pub struct RawPlayerStat {
    pub player_id: i64,
    pub round_id: i64,
    pub points: i64,
    pub rating: i64,
    pub minutes: i64,
}

pub struct LeagueClient {
    client: reqwest::Client,
    base_url: String,
    season: String,
}

impl LeagueClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: cfg.league_api_url.clone(),
            season: cfg.league_season.clone(),
        })
    }

    async fn get_array(&self, path: &str) -> Result<Vec<Value>> {
        let url = format!("{}{}", self.base_url, path);
        let resp: Value = self.client.get(&url).send().await?.json().await?;
        match resp.as_array() {
            Some(a) => Ok(a.clone()),
            None => Err(AppError::Provider(format!("{path} response was not an array"))),
        }
    }

    pub async fn fetch_teams(&self) -> Result<Vec<RawLeagueTeam>> {
        let items = self
            .get_array(&format!("/seasons/{}/teams", self.season))
            .await?;
        Ok(items
            .iter()
            .filter_map(|item| {
                Some(RawLeagueTeam {
                    id: val_str(item, "id")
                        .or_else(|| val_i64(item, "id").map(|i| i.to_string()))?,
                    name: val_str(item, "name")?,
                })
            })
            .collect())
    }

    pub async fn fetch_rounds(&self) -> Result<Vec<RawRound>> {
        let items = self
            .get_array(&format!("/seasons/{}/rounds", self.season))
            .await?;
        Ok(items
            .iter()
            .filter_map(|item| {
                Some(RawRound {
                    id: val_i64(item, "id")?,
                    name: val_str(item, "name")?,
                    postponed: val_bool(item, "postponed"),
                })
            })
            .collect())
    }

    pub async fn fetch_schedule(&self) -> Result<Vec<RawMatch>> {
        let items = self
            .get_array(&format!("/seasons/{}/matches", self.season))
            .await?;
        Ok(items
            .iter()
            .filter_map(|item| {
                Some(RawMatch {
                    id: val_i64(item, "id")?,
                    round_id: val_i64(item, "round_id")?,
                    home_team_id: val_str(item, "home_team_id"),
                    away_team_id: val_str(item, "away_team_id"),
                    date: val_str(item, "date"),
                    home_score: val_i64(item, "home_score"),
                    away_score: val_i64(item, "away_score"),
                })
            })
            .collect())
    }

    pub async fn fetch_standings(&self) -> Result<Vec<RawStanding>> {
        let items = self
            .get_array(&format!("/seasons/{}/standings", self.season))
            .await?;
        Ok(items
            .iter()
            .filter_map(|item| {
                Some(RawStanding {
                    team_id: val_str(item, "team_id")?,
                    round_id: val_i64(item, "round_id")?,
                    position: val_i64(item, "position")?,
                    wins: val_i64(item, "wins").unwrap_or(0),
                    losses: val_i64(item, "losses").unwrap_or(0),
                })
            })
            .collect())
    }

    pub async fn fetch_player_stats(&self, round_id: i64) -> Result<Vec<RawPlayerStat>> {
        let items = self
            .get_array(&format!("/seasons/{}/rounds/{round_id}/stats", self.season))
            .await?;
        Ok(items
            .iter()
            .filter_map(|item| {
                Some(RawPlayerStat {
                    player_id: val_i64(item, "player_id")?,
                    round_id,
                    points: val_i64(item, "points").unwrap_or(0),
                    rating: val_i64(item, "rating").unwrap_or(0),
                    minutes: val_i64(item, "minutes").unwrap_or(0),
                })
            })
            .collect())
    }

    /// Cosmetic crest lookup, one call per team (enrichment stage).
    pub async fn fetch_team_crest(&self, team_id: &str) -> Result<Option<String>> {
        let url = format!("{}/teams/{team_id}/media", self.base_url);
        let resp: Value = self.client.get(&url).send().await?.json().await?;
        Ok(val_str(&resp, "crest_url"))
    }
}
