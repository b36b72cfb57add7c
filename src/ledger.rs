use serde::Serialize;

use crate::db::store::Store;
use crate::error::Result;
use crate::types::{LedgerEntry, LedgerKind, TransferEvent};

/// Everything needed to reconcile one manager's finances. Gathered from the
/// store, then folded by pure arithmetic — no I/O below this point.
#[derive(Debug, Default, Clone)]
pub struct LedgerInputs {
    pub starting_patrimony: i64,
    pub initial_squad_cost: i64,
    pub total_purchases: i64,
    pub total_sales: i64,
    pub total_bonuses: i64,
    pub current_squad_value: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LedgerSummary {
    pub initial_squad_cost: i64,
    pub initial_balance: i64,
    pub total_purchases: i64,
    pub total_sales: i64,
    pub total_bonuses: i64,
    pub current_balance: i64,
    pub current_squad_value: i64,
    pub total_patrimony: i64,
    /// Mark-to-market gain/loss from price movement alone, trading netted out.
    pub player_value_change: i64,
}

/// Fold the inputs into a balance sheet. All sums are zero over empty sets,
/// so a manager with no activity reconciles to their starting position.
pub fn reconcile(inputs: &LedgerInputs) -> LedgerSummary {
    let initial_balance = inputs.starting_patrimony - inputs.initial_squad_cost;
    let current_balance =
        initial_balance - inputs.total_purchases + inputs.total_sales + inputs.total_bonuses;
    let total_patrimony = current_balance + inputs.current_squad_value;
    let player_value_change = inputs.current_squad_value
        - (inputs.initial_squad_cost + inputs.total_purchases - inputs.total_sales);

    LedgerSummary {
        initial_squad_cost: inputs.initial_squad_cost,
        initial_balance,
        total_purchases: inputs.total_purchases,
        total_sales: inputs.total_sales,
        total_bonuses: inputs.total_bonuses,
        current_balance,
        current_squad_value: inputs.current_squad_value,
        total_patrimony,
        player_value_change,
    }
}

/// Purchase and sale entries are a derived view over the transfer log; only
/// bonuses live as stored ledger rows.
pub fn entries_from_transfers(manager_id: i64, events: &[TransferEvent]) -> Vec<LedgerEntry> {
    let mut entries = Vec::new();
    for event in events {
        if event.buyer.is_manager(manager_id) {
            entries.push(LedgerEntry {
                manager_id,
                kind: LedgerKind::Purchase,
                amount: event.price,
                ts: event.ts,
            });
        }
        if event.seller.is_manager(manager_id) {
            entries.push(LedgerEntry {
                manager_id,
                kind: LedgerKind::Sale,
                amount: event.price,
                ts: event.ts,
            });
        }
    }
    entries
}

/// Sum a ledger view into (purchases, sales, bonuses).
pub fn entry_totals(entries: &[LedgerEntry]) -> (i64, i64, i64) {
    let mut purchases = 0;
    let mut sales = 0;
    let mut bonuses = 0;
    for entry in entries {
        match entry.kind {
            LedgerKind::Purchase => purchases += entry.amount,
            LedgerKind::Sale => sales += entry.amount,
            LedgerKind::Bonus => bonuses += entry.amount,
        }
    }
    (purchases, sales, bonuses)
}

/// Assemble one manager's full ledger view from the store and reconcile it:
/// derived trade entries plus stored bonus rows.
pub async fn reconcile_manager(
    store: &Store,
    manager_id: i64,
    starting_patrimony: i64,
) -> Result<LedgerSummary> {
    let events = store.transfers_for_manager(manager_id).await?;
    let mut entries = entries_from_transfers(manager_id, &events);
    entries.extend(store.ledger_entries_for_manager(manager_id).await?);
    let (total_purchases, total_sales, total_bonuses) = entry_totals(&entries);

    let current_squad_value = store
        .players_owned_by(manager_id)
        .await?
        .iter()
        .map(|p| p.price)
        .sum();

    let inputs = LedgerInputs {
        starting_patrimony,
        initial_squad_cost: store.initial_squad_cost(manager_id).await?,
        total_purchases,
        total_sales,
        total_bonuses,
        current_squad_value,
    };
    Ok(reconcile(&inputs))
}
