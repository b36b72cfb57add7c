//! Adapter for the fantasy-league platform: managers, players, market prices,
//! the transfer feed, lineups, and bonus payouts.

use serde_json::Value;
use tracing::debug;

use crate::config::{Config, PROVIDER_PAGE_SIZE};
use crate::error::{AppError, Result};
use crate::providers::{http_client, val_i64, val_str};
use crate::types::{Owner, TransferEvent};

#[derive(Debug, Clone)]
pub struct RawManager {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct RawPlayer {
    pub id: i64,
    pub name: String,
    pub position: String,
    pub team_fantasy_id: Option<String>,
    pub price: i64,
    pub status: String,
}

#[derive(Debug, Clone)]
pub struct RawFantasyTeam {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct RawBonus {
    pub manager_id: i64,
    pub amount: i64,
    pub ts: i64,
}

/// (player_id, current owner) pairs from the league's roster snapshot.
pub type OwnershipSnapshot = Vec<(i64, Owner)>;

#[derive(Debug, Clone)]
pub struct RawLineupSlot {
    pub manager_id: i64,
    pub round_id: i64,
    pub player_id: i64,
    pub starter: bool,
}

/// Counts of feed entries that could not be used. Reported with the stage
/// outcome; individual bad records are skipped, not fatal.
#[derive(Debug, Default)]
pub struct FeedStats {
    pub total: usize,
    pub malformed: usize,
}

pub struct FantasyClient {
    client: reqwest::Client,
    base_url: String,
    league_id: String,
}

impl FantasyClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        Ok(Self {
            client: http_client()?,
            base_url: cfg.fantasy_api_url.clone(),
            league_id: cfg.fantasy_league_id.clone(),
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

    pub async fn fetch_managers(&self) -> Result<Vec<RawManager>> {
        let items = self
            .get_array(&format!("/leagues/{}/managers", self.league_id))
            .await?;
        let mut managers = Vec::new();
        for item in &items {
            let (Some(id), Some(name)) = (val_i64(item, "id"), val_str(item, "name")) else {
                debug!("skipping malformed manager record");
                continue;
            };
            managers.push(RawManager { id, name });
        }
        Ok(managers)
    }

    /// Paged walk over the player pool.
    pub async fn fetch_players(&self) -> Result<(Vec<RawPlayer>, FeedStats)> {
        let mut players = Vec::new();
        let mut stats = FeedStats::default();
        let mut offset = 0usize;

        loop {
            let items = self
                .get_array(&format!(
                    "/players?limit={PROVIDER_PAGE_SIZE}&offset={offset}"
                ))
                .await?;
            if items.is_empty() {
                break;
            }
            stats.total += items.len();

            for item in &items {
                match parse_player(item) {
                    Some(p) => players.push(p),
                    None => stats.malformed += 1,
                }
            }

            if items.len() < PROVIDER_PAGE_SIZE {
                break;
            }
            offset += PROVIDER_PAGE_SIZE;
        }

        Ok((players, stats))
    }

    pub async fn fetch_teams(&self) -> Result<Vec<RawFantasyTeam>> {
        let items = self.get_array("/teams").await?;
        Ok(items
            .iter()
            .filter_map(|item| {
                Some(RawFantasyTeam {
                    id: val_str(item, "id").or_else(|| val_i64(item, "id").map(|i| i.to_string()))?,
                    name: val_str(item, "name")?,
                })
            })
            .collect())
    }

    /// The transfer feed, oldest first. Entries carry the provider's own
    /// event id, which the store uses to deduplicate replays.
    pub async fn fetch_transfers(&self) -> Result<(Vec<TransferEvent>, FeedStats)> {
        let items = self
            .get_array(&format!("/leagues/{}/transfers", self.league_id))
            .await?;
        let mut stats = FeedStats { total: items.len(), malformed: 0 };
        let mut events = Vec::new();

        for item in &items {
            match parse_transfer(item) {
                Some(t) => events.push(t),
                None => stats.malformed += 1,
            }
        }

        events.sort_by_key(|t| (t.ts, t.id));
        Ok((events, stats))
    }

    pub async fn fetch_ownership(&self) -> Result<OwnershipSnapshot> {
        let items = self
            .get_array(&format!("/leagues/{}/rosters", self.league_id))
            .await?;
        Ok(items
            .iter()
            .filter_map(|item| {
                let player_id = val_i64(item, "player_id")?;
                let owner = Owner::from_db(val_i64(item, "manager_id"));
                Some((player_id, owner))
            })
            .collect())
    }

    pub async fn fetch_bonuses(&self) -> Result<Vec<RawBonus>> {
        let items = self
            .get_array(&format!("/leagues/{}/bonuses", self.league_id))
            .await?;
        Ok(items
            .iter()
            .filter_map(|item| {
                Some(RawBonus {
                    manager_id: val_i64(item, "manager_id")?,
                    amount: val_i64(item, "amount")?,
                    ts: val_i64(item, "timestamp")?,
                })
            })
            .collect())
    }

    pub async fn fetch_lineups(&self, round_id: i64) -> Result<Vec<RawLineupSlot>> {
        let items = self
            .get_array(&format!("/leagues/{}/lineups?round={round_id}", self.league_id))
            .await?;
        Ok(items
            .iter()
            .filter_map(|item| {
                Some(RawLineupSlot {
                    manager_id: val_i64(item, "manager_id")?,
                    round_id,
                    player_id: val_i64(item, "player_id")?,
                    starter: item.get("starter").and_then(|s| s.as_bool()).unwrap_or(false),
                })
            })
            .collect())
    }

    /// Cosmetic profile lookup, one call per manager (enrichment stage).
    pub async fn fetch_manager_avatar(&self, manager_id: i64) -> Result<Option<String>> {
        let url = format!("{}/managers/{manager_id}/profile", self.base_url);
        let resp: Value = self.client.get(&url).send().await?.json().await?;
        Ok(val_str(&resp, "avatar_url"))
    }
}

fn parse_player(v: &Value) -> Option<RawPlayer> {
    Some(RawPlayer {
        id: val_i64(v, "id")?,
        name: val_str(v, "name")?,
        position: val_str(v, "position").unwrap_or_default(),
        team_fantasy_id: val_str(v, "team_id")
            .or_else(|| val_i64(v, "team_id").map(|i| i.to_string())),
        price: val_i64(v, "price").unwrap_or(0),
        status: val_str(v, "status").unwrap_or_else(|| "ok".to_string()),
    })
}

fn parse_transfer(v: &Value) -> Option<TransferEvent> {
    Some(TransferEvent {
        id: val_i64(v, "id")?,
        player_id: val_i64(v, "player_id")?,
        // Absent side = the open market.
        buyer: Owner::from_db(val_i64(v, "buyer_id")),
        seller: Owner::from_db(val_i64(v, "seller_id")),
        price: val_i64(v, "price")?,
        ts: val_i64(v, "timestamp")?,
    })
}
