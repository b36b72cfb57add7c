use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Ownership
// ---------------------------------------------------------------------------

/// A transfer participant: either a league manager or the open market.
/// Stored as a nullable manager id (NULL = market).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Owner {
    Market,
    Manager(i64),
}

impl Owner {
    pub fn from_db(manager_id: Option<i64>) -> Self {
        match manager_id {
            Some(id) => Owner::Manager(id),
            None => Owner::Market,
        }
    }

    pub fn to_db(self) -> Option<i64> {
        match self {
            Owner::Manager(id) => Some(id),
            Owner::Market => None,
        }
    }

    pub fn is_manager(self, manager_id: i64) -> bool {
        self == Owner::Manager(manager_id)
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Owner::Market => write!(f, "market"),
            Owner::Manager(id) => write!(f, "manager:{id}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Core entities
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manager {
    pub id: i64,
    pub name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Guard,
    Forward,
    Center,
    Unknown,
}

impl Position {
    pub fn parse(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "guard" | "base" | "escolta" => Position::Guard,
            "forward" | "alero" | "ala-pivot" => Position::Forward,
            "center" | "pivot" => Position::Center,
            _ => Position::Unknown,
        }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Position::Guard => "guard",
            Position::Forward => "forward",
            Position::Center => "center",
            Position::Unknown => "unknown",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: i64,
    pub name: String,
    pub position: Position,
    pub team_id: Option<i64>,
    pub price: i64,
    /// Current holder. `Owner::Market` means the player sits on the open market.
    pub owner: Owner,
    /// Provider status flag: "ok", "injured", "doubtful", ...
    pub status: String,
}

/// A team as reconciled across both providers. Either external id may be
/// missing if entity matching could not link the records (reported, not fatal).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub fantasy_id: Option<String>,
    pub league_id: Option<String>,
    pub crest_url: Option<String>,
}

/// A scheduled round. `canonical_id` equals `id` unless this round is a
/// postponed duplicate of an earlier one, in which case it points there.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    pub id: i64,
    pub name: String,
    pub postponed: bool,
    pub canonical_id: i64,
}

// ---------------------------------------------------------------------------
// Transfers and money
// ---------------------------------------------------------------------------

/// One accepted transfer. Append-only; per-player timestamp order is the only
/// ownership history the providers expose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub id: i64,
    pub player_id: i64,
    pub buyer: Owner,
    pub seller: Owner,
    pub price: i64,
    /// Unix seconds.
    pub ts: i64,
}

/// Daily price snapshot, one per player per day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketValuation {
    pub player_id: i64,
    /// ISO date, `YYYY-MM-DD`.
    pub date: String,
    pub price: i64,
}

/// Derived once by the inference engine; insert-if-absent, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialSquadAssignment {
    pub manager_id: i64,
    pub player_id: i64,
    /// None when neither a valuation nor a current price could be resolved.
    pub price: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedgerKind {
    Purchase,
    Sale,
    Bonus,
}

impl LedgerKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "purchase" => Some(LedgerKind::Purchase),
            "sale" => Some(LedgerKind::Sale),
            "bonus" => Some(LedgerKind::Bonus),
            _ => None,
        }
    }
}

impl std::fmt::Display for LedgerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LedgerKind::Purchase => "purchase",
            LedgerKind::Sale => "sale",
            LedgerKind::Bonus => "bonus",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub manager_id: i64,
    pub kind: LedgerKind,
    pub amount: i64,
    pub ts: i64,
}
