use sqlx::SqlitePool;

use crate::db::models::{ManagerRow, PlayerRow, RoundRow, TeamRow, TransferRow};
use crate::error::Result;
use crate::types::{
    InitialSquadAssignment, LedgerEntry, LedgerKind, Manager, MarketValuation, Owner, Player,
    Position, Round, Team, TransferEvent,
};

/// Typed query helpers over the shared pool. All writes are idempotent:
/// keyed inserts use `INSERT OR IGNORE`, mutable rows use upserts, so any
/// stage can be re-run without duplicating data.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // -- managers -----------------------------------------------------------

    pub async fn upsert_manager(&self, id: i64, name: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO managers (id, name) VALUES (?, ?)
             ON CONFLICT(id) DO UPDATE SET name = excluded.name",
        )
        .bind(id)
        .bind(name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_manager_avatar(&self, id: i64, avatar_url: &str) -> Result<()> {
        sqlx::query("UPDATE managers SET avatar_url = ? WHERE id = ?")
            .bind(avatar_url)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn all_managers(&self) -> Result<Vec<Manager>> {
        let rows = sqlx::query_as::<_, ManagerRow>(
            "SELECT id, name, avatar_url FROM managers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| Manager { id: r.id, name: r.name, avatar_url: r.avatar_url })
            .collect())
    }

    // -- players ------------------------------------------------------------

    /// `team_id` is deliberately not part of the upsert: ingestion records
    /// the provider-side `fantasy_team_id`, and `relink_player_teams`
    /// resolves it to an internal team once links exist.
    pub async fn upsert_player(
        &self,
        id: i64,
        name: &str,
        position: &str,
        fantasy_team_id: Option<&str>,
        price: i64,
        status: &str,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO players (id, name, position, fantasy_team_id, price, status)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 position = excluded.position,
                 fantasy_team_id = excluded.fantasy_team_id,
                 price = excluded.price,
                 status = excluded.status",
        )
        .bind(id)
        .bind(name)
        .bind(position)
        .bind(fantasy_team_id)
        .bind(price)
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_player_owner(&self, player_id: i64, owner: Owner) -> Result<()> {
        sqlx::query("UPDATE players SET owner_id = ? WHERE id = ?")
            .bind(owner.to_db())
            .bind(player_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Resolve every stored provider team id against the linked teams table.
    /// Players ingested before any links existed pick up their team here;
    /// re-running is a no-op beyond re-writing the same values.
    pub async fn relink_player_teams(&self) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE players
             SET team_id = (SELECT t.id FROM teams t
                            WHERE t.fantasy_id = players.fantasy_team_id)
             WHERE fantasy_team_id IS NOT NULL
               AND EXISTS (SELECT 1 FROM teams t
                           WHERE t.fantasy_id = players.fantasy_team_id)",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn all_players(&self) -> Result<Vec<Player>> {
        let rows = sqlx::query_as::<_, PlayerRow>(
            "SELECT id, name, position, team_id, price, owner_id, status
             FROM players ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(player_from_row).collect())
    }

    pub async fn players_owned_by(&self, manager_id: i64) -> Result<Vec<Player>> {
        let rows = sqlx::query_as::<_, PlayerRow>(
            "SELECT id, name, position, team_id, price, owner_id, status
             FROM players WHERE owner_id = ? ORDER BY id",
        )
        .bind(manager_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(player_from_row).collect())
    }

    pub async fn player_price(&self, player_id: i64) -> Result<Option<i64>> {
        let price: Option<(i64,)> =
            sqlx::query_as("SELECT price FROM players WHERE id = ?")
                .bind(player_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(price.map(|(p,)| p))
    }

    // -- teams --------------------------------------------------------------

    /// Insert a team seen on the official-league side, keyed by its league id.
    pub async fn upsert_league_team(&self, league_id: &str, name: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO teams (name, league_id) VALUES (?, ?)
             ON CONFLICT(league_id) DO UPDATE SET name = excluded.name",
        )
        .bind(name)
        .bind(league_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Attach a fantasy-provider id to an already-known team.
    pub async fn link_team_fantasy_id(&self, league_id: &str, fantasy_id: &str) -> Result<()> {
        sqlx::query("UPDATE teams SET fantasy_id = ? WHERE league_id = ?")
            .bind(fantasy_id)
            .bind(league_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_team_crest(&self, league_id: &str, crest_url: &str) -> Result<()> {
        sqlx::query("UPDATE teams SET crest_url = ? WHERE league_id = ?")
            .bind(crest_url)
            .bind(league_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn all_teams(&self) -> Result<Vec<Team>> {
        let rows = sqlx::query_as::<_, TeamRow>(
            "SELECT id, name, fantasy_id, league_id, crest_url FROM teams ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| Team {
                id: r.id,
                name: r.name,
                fantasy_id: r.fantasy_id,
                league_id: r.league_id,
                crest_url: r.crest_url,
            })
            .collect())
    }

    pub async fn team_id_by_league_id(&self, league_id: &str) -> Result<Option<i64>> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM teams WHERE league_id = ?")
                .bind(league_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id,)| id))
    }

    // -- rounds -------------------------------------------------------------

    pub async fn upsert_round(
        &self,
        id: i64,
        name: &str,
        postponed: bool,
        canonical_id: i64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO rounds (id, name, postponed, canonical_id) VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 postponed = excluded.postponed,
                 canonical_id = excluded.canonical_id",
        )
        .bind(id)
        .bind(name)
        .bind(postponed)
        .bind(canonical_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn all_rounds(&self) -> Result<Vec<Round>> {
        let rows = sqlx::query_as::<_, RoundRow>(
            "SELECT id, name, postponed, canonical_id FROM rounds ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| Round {
                id: r.id,
                name: r.name,
                postponed: r.postponed != 0,
                canonical_id: r.canonical_id,
            })
            .collect())
    }

    pub async fn canonical_round_id(&self, round_id: i64) -> Result<Option<i64>> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT canonical_id FROM rounds WHERE id = ?")
                .bind(round_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(id,)| id))
    }

    // -- schedule / standings / stats / lineups -----------------------------

    pub async fn upsert_match(
        &self,
        id: i64,
        round_id: i64,
        home_team_id: Option<i64>,
        away_team_id: Option<i64>,
        date: Option<&str>,
        home_score: Option<i64>,
        away_score: Option<i64>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO matches (id, round_id, home_team_id, away_team_id, date, home_score, away_score)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 round_id = excluded.round_id,
                 home_team_id = excluded.home_team_id,
                 away_team_id = excluded.away_team_id,
                 date = excluded.date,
                 home_score = excluded.home_score,
                 away_score = excluded.away_score",
        )
        .bind(id)
        .bind(round_id)
        .bind(home_team_id)
        .bind(away_team_id)
        .bind(date)
        .bind(home_score)
        .bind(away_score)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_standing(
        &self,
        team_id: i64,
        round_id: i64,
        position: i64,
        wins: i64,
        losses: i64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO standings (team_id, round_id, position, wins, losses)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(team_id, round_id) DO UPDATE SET
                 position = excluded.position,
                 wins = excluded.wins,
                 losses = excluded.losses",
        )
        .bind(team_id)
        .bind(round_id)
        .bind(position)
        .bind(wins)
        .bind(losses)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_player_stat(
        &self,
        player_id: i64,
        round_id: i64,
        points: i64,
        rating: i64,
        minutes: i64,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO player_stats (player_id, round_id, points, rating, minutes)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(player_id, round_id) DO UPDATE SET
                 points = excluded.points,
                 rating = excluded.rating,
                 minutes = excluded.minutes",
        )
        .bind(player_id)
        .bind(round_id)
        .bind(points)
        .bind(rating)
        .bind(minutes)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_lineup_slot(
        &self,
        manager_id: i64,
        round_id: i64,
        player_id: i64,
        starter: bool,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO lineups (manager_id, round_id, player_id, starter)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(manager_id, round_id, player_id) DO UPDATE SET
                 starter = excluded.starter",
        )
        .bind(manager_id)
        .bind(round_id)
        .bind(player_id)
        .bind(starter)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // -- transfers ----------------------------------------------------------

    /// Keyed by the provider-native event id, so replaying the feed never
    /// duplicates the log.
    pub async fn insert_transfer(&self, t: &TransferEvent) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO transfers (id, player_id, buyer_id, seller_id, price, ts)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(t.id)
        .bind(t.player_id)
        .bind(t.buyer.to_db())
        .bind(t.seller.to_db())
        .bind(t.price)
        .bind(t.ts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All transfers in which the manager appears on either side, ascending
    /// by timestamp.
    pub async fn transfers_for_manager(&self, manager_id: i64) -> Result<Vec<TransferEvent>> {
        let rows = sqlx::query_as::<_, TransferRow>(
            "SELECT id, player_id, buyer_id, seller_id, price, ts
             FROM transfers WHERE buyer_id = ? OR seller_id = ?
             ORDER BY ts, id",
        )
        .bind(manager_id)
        .bind(manager_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(transfer_from_row).collect())
    }

    // -- market valuations --------------------------------------------------

    pub async fn insert_market_value(&self, v: &MarketValuation) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO market_values (player_id, date, price) VALUES (?, ?, ?)",
        )
        .bind(v.player_id)
        .bind(&v.date)
        .bind(v.price)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Latest snapshot on or before `date` (ISO dates compare as strings).
    pub async fn valuation_on_or_before(
        &self,
        player_id: i64,
        date: &str,
    ) -> Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT price FROM market_values
             WHERE player_id = ? AND date <= ?
             ORDER BY date DESC LIMIT 1",
        )
        .bind(player_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(p,)| p))
    }

    // -- initial squads -----------------------------------------------------

    /// Insert-if-absent: the first inference run wins, re-runs are no-ops.
    pub async fn insert_initial_squad(&self, a: &InitialSquadAssignment) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO initial_squads (manager_id, player_id, price)
             VALUES (?, ?, ?)",
        )
        .bind(a.manager_id)
        .bind(a.player_id)
        .bind(a.price)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn initial_squad_cost(&self, manager_id: i64) -> Result<i64> {
        let row: (Option<i64>,) = sqlx::query_as(
            "SELECT SUM(price) FROM initial_squads WHERE manager_id = ?",
        )
        .bind(manager_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0.unwrap_or(0))
    }

    pub async fn initial_squad_count(&self, manager_id: i64) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM initial_squads WHERE manager_id = ?",
        )
        .bind(manager_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    // -- ledger -------------------------------------------------------------

    /// (manager, kind, ts) is unique, so replaying the bonus feed is a no-op.
    pub async fn insert_ledger_entry(&self, entry: &LedgerEntry) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO ledger_entries (manager_id, kind, amount, ts)
             VALUES (?, ?, ?, ?)",
        )
        .bind(entry.manager_id)
        .bind(entry.kind.to_string())
        .bind(entry.amount)
        .bind(entry.ts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stored ledger rows for one manager, ascending by timestamp. Rows with
    /// an unknown kind are skipped rather than failing the read.
    pub async fn ledger_entries_for_manager(&self, manager_id: i64) -> Result<Vec<LedgerEntry>> {
        let rows: Vec<(i64, String, i64, i64)> = sqlx::query_as(
            "SELECT manager_id, kind, amount, ts FROM ledger_entries
             WHERE manager_id = ? ORDER BY ts, id",
        )
        .bind(manager_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .filter_map(|(manager_id, kind, amount, ts)| {
                Some(LedgerEntry { manager_id, kind: LedgerKind::parse(&kind)?, amount, ts })
            })
            .collect())
    }
}

fn player_from_row(r: PlayerRow) -> Player {
    Player {
        id: r.id,
        name: r.name,
        position: Position::parse(&r.position),
        team_id: r.team_id,
        price: r.price,
        owner: Owner::from_db(r.owner_id),
        status: r.status,
    }
}

fn transfer_from_row(r: TransferRow) -> TransferEvent {
    TransferEvent {
        id: r.id,
        player_id: r.player_id,
        buyer: Owner::from_db(r.buyer_id),
        seller: Owner::from_db(r.seller_id),
        price: r.price,
        ts: r.ts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_memory;

    fn transfer(id: i64, player_id: i64, buyer: Owner, seller: Owner, ts: i64) -> TransferEvent {
        TransferEvent { id, player_id, buyer, seller, price: 100_000, ts }
    }

    #[tokio::test]
    async fn transfer_insert_is_idempotent() {
        let store = Store::new(connect_memory().await.unwrap());
        store.upsert_manager(1, "ana").await.unwrap();
        store.upsert_player(7, "p", "guard", None, 0, "ok").await.unwrap();

        let t = transfer(42, 7, Owner::Manager(1), Owner::Market, 1000);
        store.insert_transfer(&t).await.unwrap();
        store.insert_transfer(&t).await.unwrap();

        let events = store.transfers_for_manager(1).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0], t);
    }

    #[tokio::test]
    async fn transfers_sorted_by_timestamp() {
        let store = Store::new(connect_memory().await.unwrap());
        store.upsert_manager(1, "ana").await.unwrap();
        store.upsert_player(7, "p", "guard", None, 0, "ok").await.unwrap();

        store
            .insert_transfer(&transfer(2, 7, Owner::Market, Owner::Manager(1), 2000))
            .await
            .unwrap();
        store
            .insert_transfer(&transfer(1, 7, Owner::Manager(1), Owner::Market, 1000))
            .await
            .unwrap();

        let events = store.transfers_for_manager(1).await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].ts < events[1].ts);
    }

    #[tokio::test]
    async fn bonus_replay_is_ignored() {
        let store = Store::new(connect_memory().await.unwrap());
        store.upsert_manager(1, "ana").await.unwrap();

        let entry = LedgerEntry {
            manager_id: 1,
            kind: LedgerKind::Bonus,
            amount: 500_000,
            ts: 1234,
        };
        store.insert_ledger_entry(&entry).await.unwrap();
        store.insert_ledger_entry(&entry).await.unwrap();

        let entries = store.ledger_entries_for_manager(1).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].amount, 500_000);
    }

    #[tokio::test]
    async fn relink_resolves_player_team_references() {
        let store = Store::new(connect_memory().await.unwrap());
        store.upsert_player(7, "p", "guard", Some("ft1"), 0, "ok").await.unwrap();
        store.upsert_player(8, "q", "center", None, 0, "ok").await.unwrap();

        // No linked teams yet: nothing resolves.
        assert_eq!(store.relink_player_teams().await.unwrap(), 0);

        store.upsert_league_team("lg1", "Real Madrid").await.unwrap();
        store.link_team_fantasy_id("lg1", "ft1").await.unwrap();
        assert_eq!(store.relink_player_teams().await.unwrap(), 1);

        let teams = store.all_teams().await.unwrap();
        let players = store.all_players().await.unwrap();
        assert_eq!(players[0].team_id, Some(teams[0].id));
        assert_eq!(players[1].team_id, None);
    }

    #[tokio::test]
    async fn valuation_lookup_picks_latest_on_or_before() {
        let store = Store::new(connect_memory().await.unwrap());
        store.upsert_player(7, "p", "guard", None, 0, "ok").await.unwrap();
        for (date, price) in [
            ("2025-08-20", 900_000),
            ("2025-08-30", 950_000),
            ("2025-09-05", 990_000),
        ] {
            store
                .insert_market_value(&MarketValuation {
                    player_id: 7,
                    date: date.to_string(),
                    price,
                })
                .await
                .unwrap();
        }

        let price = store.valuation_on_or_before(7, "2025-09-01").await.unwrap();
        assert_eq!(price, Some(950_000));

        let none = store.valuation_on_or_before(7, "2025-08-01").await.unwrap();
        assert_eq!(none, None);
    }
}
