/// Database row types matching schema.sql. Used by sqlx for typed reads.

#[derive(Debug, sqlx::FromRow)]
pub struct PlayerRow {
    pub id: i64,
    pub name: String,
    pub position: String,
    pub team_id: Option<i64>,
    pub price: i64,
    pub owner_id: Option<i64>,
    pub status: String,
}

#[derive(Debug, sqlx::FromRow)]
pub struct TeamRow {
    pub id: i64,
    pub name: String,
    pub fantasy_id: Option<String>,
    pub league_id: Option<String>,
    pub crest_url: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct RoundRow {
    pub id: i64,
    pub name: String,
    pub postponed: i64,
    pub canonical_id: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct TransferRow {
    pub id: i64,
    pub player_id: i64,
    pub buyer_id: Option<i64>,
    pub seller_id: Option<i64>,
    pub price: i64,
    pub ts: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ManagerRow {
    pub id: i64,
    pub name: String,
    pub avatar_url: Option<String>,
}
