use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::db::store::Store;
use crate::error::Result;
use crate::types::{InitialSquadAssignment, TransferEvent};

/// Reconstructs each manager's pre-transfer squad from the transfer log and
/// the current ownership snapshot. Neither provider exposes the squads that
/// were assigned at league setup, so they have to be inferred.
pub struct InferenceEngine {
    store: Store,
    /// Day the league started; acquisition prices resolve against the
    /// latest valuation on or before it.
    league_start: NaiveDate,
}

#[derive(Debug, Default)]
pub struct InferenceStats {
    pub managers: usize,
    pub assignments: usize,
    pub unpriced: usize,
    pub alternation_violations: usize,
}

/// True when the player belongs to the manager's initial squad.
///
/// `events` is every transfer involving this (manager, player) pair, sorted
/// ascending by timestamp. Only the first event matters: a manager selling a
/// player they were never seen acquiring must have owned it before the log
/// begins. No events at all means the player is in the set purely through
/// current ownership, which is also classified initial. A buy-sell-rebuy
/// chain is excluded correctly because the first event is a buy.
pub fn is_initial(manager_id: i64, events: &[TransferEvent]) -> bool {
    match events.first() {
        None => true,
        Some(first) => first.seller.is_manager(manager_id),
    }
}

/// Count alternation breaks in one (manager, player) event sequence: two
/// consecutive sells without an intervening buy, or two consecutive buys
/// without an intervening sell. Under correct provider data this is zero;
/// a non-zero count is a data-quality signal, never an error.
pub fn alternation_violations(manager_id: i64, events: &[TransferEvent]) -> usize {
    let mut violations = 0;
    let mut prev_was_buy: Option<bool> = None;
    for event in events {
        let is_buy = event.buyer.is_manager(manager_id);
        if prev_was_buy == Some(is_buy) {
            violations += 1;
        }
        prev_was_buy = Some(is_buy);
    }
    violations
}

impl InferenceEngine {
    pub fn new(store: Store, league_start: NaiveDate) -> Self {
        Self { store, league_start }
    }

    /// Infer and persist initial squads for every manager. Writes use
    /// insert-if-absent, so repeated runs are no-ops for rows that exist.
    /// Managers are processed concurrently; each writes disjoint rows.
    pub async fn run(&self) -> Result<InferenceStats> {
        let managers = self.store.all_managers().await?;

        // Rendered once: the valuation table keys on ISO date strings.
        let league_start = self.league_start.to_string();
        let tasks = managers.iter().map(|m| {
            let store = self.store.clone();
            let league_start = league_start.clone();
            let manager_id = m.id;
            async move { infer_manager(&store, manager_id, &league_start).await }
        });

        let mut stats = InferenceStats { managers: managers.len(), ..Default::default() };
        for result in join_all(tasks).await {
            let per_manager = result?;
            stats.assignments += per_manager.assignments;
            stats.unpriced += per_manager.unpriced;
            stats.alternation_violations += per_manager.alternation_violations;
        }

        info!(
            managers = stats.managers,
            assignments = stats.assignments,
            unpriced = stats.unpriced,
            anomalies = stats.alternation_violations,
            "Initial-squad inference complete",
        );
        Ok(stats)
    }
}

#[derive(Debug, Default)]
struct ManagerStats {
    assignments: usize,
    unpriced: usize,
    alternation_violations: usize,
}

async fn infer_manager(store: &Store, manager_id: i64, league_start: &str) -> Result<ManagerStats> {
    let events = store.transfers_for_manager(manager_id).await?;

    // Per-player event sequences, already timestamp-ordered by the query.
    let mut by_player: BTreeMap<i64, Vec<TransferEvent>> = BTreeMap::new();
    for event in events {
        by_player.entry(event.player_id).or_default().push(event);
    }

    // Candidates: ever sold by this manager, plus currently owned.
    let mut candidates: BTreeSet<i64> = by_player
        .iter()
        .filter(|(_, evs)| evs.iter().any(|e| e.seller.is_manager(manager_id)))
        .map(|(player_id, _)| *player_id)
        .collect();
    for player in store.players_owned_by(manager_id).await? {
        candidates.insert(player.id);
    }

    let mut stats = ManagerStats::default();

    for player_id in candidates {
        let events = by_player.get(&player_id).map(Vec::as_slice).unwrap_or(&[]);

        let violations = alternation_violations(manager_id, events);
        if violations > 0 {
            warn!(
                manager_id,
                player_id,
                violations,
                "transfer sequence breaks buy/sell alternation",
            );
            stats.alternation_violations += violations;
        }

        if !is_initial(manager_id, events) {
            continue;
        }
        if events.is_empty() {
            debug!(manager_id, player_id, "classified initial with no transfer history");
        }

        let price = resolve_acquisition_price(store, player_id, league_start).await?;
        if price.is_none() {
            stats.unpriced += 1;
        }
        store
            .insert_initial_squad(&InitialSquadAssignment { manager_id, player_id, price })
            .await?;
        stats.assignments += 1;
    }

    Ok(stats)
}

/// Latest market valuation on or before league start, falling back to the
/// player's current price, then to None (resolved downstream as unpriced).
async fn resolve_acquisition_price(
    store: &Store,
    player_id: i64,
    league_start: &str,
) -> Result<Option<i64>> {
    if let Some(price) = store.valuation_on_or_before(player_id, league_start).await? {
        return Ok(Some(price));
    }
    Ok(store.player_price(player_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::connect_memory;
    use crate::types::{MarketValuation, Owner};

    fn event(id: i64, player_id: i64, buyer: Owner, seller: Owner, ts: i64) -> TransferEvent {
        TransferEvent { id, player_id, buyer, seller, price: 500_000, ts }
    }

    fn league_start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 1).unwrap()
    }

    #[test]
    fn no_history_is_initial() {
        assert!(is_initial(1, &[]));
    }

    #[test]
    fn first_event_sell_is_initial() {
        let events = vec![event(1, 7, Owner::Market, Owner::Manager(1), 100)];
        assert!(is_initial(1, &events));
    }

    #[test]
    fn first_event_buy_is_not_initial() {
        let events = vec![
            event(1, 7, Owner::Manager(1), Owner::Market, 100),
            event(2, 7, Owner::Market, Owner::Manager(1), 200),
            event(3, 7, Owner::Manager(1), Owner::Market, 300),
        ];
        // Bought, sold, re-bought: still excluded — only the first event counts.
        assert!(!is_initial(1, &events));
    }

    #[test]
    fn alternation_clean_sequence_has_no_violations() {
        let events = vec![
            event(1, 7, Owner::Manager(1), Owner::Market, 100),
            event(2, 7, Owner::Market, Owner::Manager(1), 200),
            event(3, 7, Owner::Manager(1), Owner::Market, 300),
        ];
        assert_eq!(alternation_violations(1, &events), 0);
    }

    #[test]
    fn alternation_double_sell_is_flagged() {
        let events = vec![
            event(1, 7, Owner::Market, Owner::Manager(1), 100),
            event(2, 7, Owner::Market, Owner::Manager(1), 200),
        ];
        assert_eq!(alternation_violations(1, &events), 1);
    }

    async fn seeded_store() -> Store {
        let store = Store::new(connect_memory().await.unwrap());
        store.upsert_manager(1, "ana").await.unwrap();
        store.upsert_manager(2, "luis").await.unwrap();
        store
    }

    #[tokio::test]
    async fn owned_player_with_no_history_gets_current_price() {
        let store = seeded_store().await;
        store.upsert_player(7, "p7", "guard", None, 1_200_000, "ok").await.unwrap();
        store.set_player_owner(7, Owner::Manager(1)).await.unwrap();

        let engine = InferenceEngine::new(store.clone(), league_start());
        let stats = engine.run().await.unwrap();
        assert_eq!(stats.assignments, 1);
        assert_eq!(stats.unpriced, 0);
        assert_eq!(store.initial_squad_cost(1).await.unwrap(), 1_200_000);
    }

    #[tokio::test]
    async fn valuation_beats_current_price() {
        let store = seeded_store().await;
        store.upsert_player(7, "p7", "guard", None, 1_200_000, "ok").await.unwrap();
        store.set_player_owner(7, Owner::Manager(1)).await.unwrap();
        store
            .insert_market_value(&MarketValuation {
                player_id: 7,
                date: "2025-08-28".to_string(),
                price: 900_000,
            })
            .await
            .unwrap();

        let engine = InferenceEngine::new(store.clone(), league_start());
        engine.run().await.unwrap();
        assert_eq!(store.initial_squad_cost(1).await.unwrap(), 900_000);
    }

    #[tokio::test]
    async fn bought_player_is_excluded() {
        let store = seeded_store().await;
        store.upsert_player(7, "p7", "guard", None, 800_000, "ok").await.unwrap();
        store.set_player_owner(7, Owner::Manager(1)).await.unwrap();
        store
            .insert_transfer(&event(1, 7, Owner::Manager(1), Owner::Market, 100))
            .await
            .unwrap();

        let engine = InferenceEngine::new(store.clone(), league_start());
        let stats = engine.run().await.unwrap();
        assert_eq!(stats.assignments, 0);
        assert_eq!(store.initial_squad_count(1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn sold_player_is_initial_even_if_not_owned_now() {
        let store = seeded_store().await;
        store.upsert_player(7, "p7", "guard", None, 800_000, "ok").await.unwrap();
        store
            .insert_transfer(&event(1, 7, Owner::Manager(2), Owner::Manager(1), 100))
            .await
            .unwrap();

        let engine = InferenceEngine::new(store.clone(), league_start());
        engine.run().await.unwrap();
        assert_eq!(store.initial_squad_count(1).await.unwrap(), 1);
        // The buying side never sold and owns nothing in the snapshot, so it
        // is not even a candidate.
        assert_eq!(store.initial_squad_count(2).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn rerun_writes_no_duplicates() {
        let store = seeded_store().await;
        store.upsert_player(7, "p7", "guard", None, 800_000, "ok").await.unwrap();
        store.set_player_owner(7, Owner::Manager(1)).await.unwrap();

        let engine = InferenceEngine::new(store.clone(), league_start());
        engine.run().await.unwrap();
        engine.run().await.unwrap();
        assert_eq!(store.initial_squad_count(1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_manager_yields_empty_squad() {
        let store = seeded_store().await;
        let engine = InferenceEngine::new(store.clone(), league_start());
        let stats = engine.run().await.unwrap();
        assert_eq!(stats.assignments, 0);
    }
}
