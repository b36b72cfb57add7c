use std::future::Future;
use std::time::Instant;

use futures_util::future::join_all;
use tracing::{error, info, warn};

use crate::config::{Config, STARTING_PATRIMONY};
use crate::db::store::Store;
use crate::error::Result;
use crate::inference::InferenceEngine;
use crate::ledger::reconcile_manager;
use crate::matcher::{match_teams, TeamRecord};
use crate::providers::fantasy::FantasyClient;
use crate::providers::league::LeagueClient;
use crate::providers::today_iso;
use crate::rounds::{canonical_id, canonical_map};
use crate::types::{LedgerEntry, LedgerKind, MarketValuation, Owner};

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// Pipeline stages in execution order. Each stage assumes every earlier
/// stage's entities already exist, so the orchestrator never reorders or
/// parallelizes across stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Players,
    TeamLinks,
    Schedule,
    Standings,
    PlayerStats,
    Lineups,
    MarketMovements,
    OwnershipSnapshot,
    InitialSquads,
    TeamCrests,
    ManagerAvatars,
}

impl Stage {
    pub const ALL: [Stage; 11] = [
        Stage::Players,
        Stage::TeamLinks,
        Stage::Schedule,
        Stage::Standings,
        Stage::PlayerStats,
        Stage::Lineups,
        Stage::MarketMovements,
        Stage::OwnershipSnapshot,
        Stage::InitialSquads,
        Stage::TeamCrests,
        Stage::ManagerAvatars,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::Players => "players",
            Stage::TeamLinks => "team-links",
            Stage::Schedule => "schedule",
            Stage::Standings => "standings",
            Stage::PlayerStats => "player-stats",
            Stage::Lineups => "lineups",
            Stage::MarketMovements => "market",
            Stage::OwnershipSnapshot => "ownership",
            Stage::InitialSquads => "initial-squads",
            Stage::TeamCrests => "team-crests",
            Stage::ManagerAvatars => "manager-avatars",
        }
    }

    pub fn parse(s: &str) -> Option<Stage> {
        Stage::ALL.iter().copied().find(|stage| stage.name() == s)
    }

    /// Cosmetic stages whose upstream data rarely changes; skipped in
    /// daily mode.
    pub fn is_enrichment(self) -> bool {
        matches!(self, Stage::TeamCrests | Stage::ManagerAvatars)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Run exactly one stage (replay/debugging).
    pub only: Option<Stage>,
    /// Daily mode: skip the enrichment block, run everything the reporting
    /// layer reads freshly.
    pub daily: bool,
}

pub fn plan(opts: &SyncOptions) -> Vec<Stage> {
    if let Some(stage) = opts.only {
        return vec![stage];
    }
    Stage::ALL
        .iter()
        .copied()
        .filter(|stage| !(opts.daily && stage.is_enrichment()))
        .collect()
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct StageOutcome {
    pub stage: Stage,
    pub elapsed_ms: u64,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
pub struct SyncReport {
    pub outcomes: Vec<StageOutcome>,
    /// True when a fatal first-stage failure cut the run short.
    pub aborted: bool,
}

impl SyncReport {
    pub fn success(&self) -> bool {
        !self.aborted && self.outcomes.iter().all(|o| o.error.is_none())
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.error.is_some()).count()
    }
}

/// Run the given stages in order, recording one outcome each. A failed stage
/// is logged and execution continues, except that a player-ingestion failure
/// aborts the run outright: every later stage depends on players existing.
pub async fn execute<F, Fut>(stages: &[Stage], mut run_stage: F) -> SyncReport
where
    F: FnMut(Stage) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let mut report = SyncReport::default();

    for &stage in stages {
        info!(stage = %stage, "stage starting");
        let started = Instant::now();
        let result = run_stage(stage).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(()) => {
                info!(stage = %stage, elapsed_ms, "stage complete");
                report.outcomes.push(StageOutcome { stage, elapsed_ms, error: None });
            }
            Err(e) => {
                error!(stage = %stage, elapsed_ms, "stage failed: {e}");
                report
                    .outcomes
                    .push(StageOutcome { stage, elapsed_ms, error: Some(e.to_string()) });
                if stage == Stage::Players {
                    error!("player ingestion failed; aborting run");
                    report.aborted = true;
                    break;
                }
            }
        }
    }

    report
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

pub struct SyncRunner {
    cfg: Config,
    store: Store,
    fantasy: FantasyClient,
    league: LeagueClient,
}

impl SyncRunner {
    pub fn new(cfg: Config, store: Store) -> Result<Self> {
        let fantasy = FantasyClient::new(&cfg)?;
        let league = LeagueClient::new(&cfg)?;
        Ok(Self { cfg, store, fantasy, league })
    }

    pub async fn run(&self, opts: &SyncOptions) -> SyncReport {
        let stages = plan(opts);
        info!(
            stages = stages.len(),
            daily = opts.daily,
            "sync run starting: {}",
            stages.iter().map(|s| s.name()).collect::<Vec<_>>().join(" -> "),
        );

        let report = execute(&stages, |stage| self.run_stage(stage)).await;

        let succeeded = report.outcomes.iter().filter(|o| o.error.is_none()).count();
        info!(
            succeeded,
            failed = report.failed(),
            aborted = report.aborted,
            "sync run finished",
        );
        for outcome in &report.outcomes {
            if let Some(err) = &outcome.error {
                warn!(stage = %outcome.stage, "failed: {err}");
            }
        }

        if stages.contains(&Stage::InitialSquads) && report.success() {
            if let Err(e) = self.log_ledger_summaries().await {
                warn!("ledger summary failed: {e}");
            }
        }

        report
    }

    async fn run_stage(&self, stage: Stage) -> Result<()> {
        match stage {
            Stage::Players => self.run_players().await,
            Stage::TeamLinks => self.run_team_links().await,
            Stage::Schedule => self.run_schedule().await,
            Stage::Standings => self.run_standings().await,
            Stage::PlayerStats => self.run_player_stats().await,
            Stage::Lineups => self.run_lineups().await,
            Stage::MarketMovements => self.run_market_movements().await,
            Stage::OwnershipSnapshot => self.run_ownership_snapshot().await,
            Stage::InitialSquads => self.run_initial_squads().await,
            Stage::TeamCrests => self.run_team_crests().await,
            Stage::ManagerAvatars => self.run_manager_avatars().await,
        }
    }

    async fn run_players(&self) -> Result<()> {
        let managers = self.fantasy.fetch_managers().await?;
        for m in &managers {
            self.store.upsert_manager(m.id, &m.name).await?;
        }

        let (players, stats) = self.fantasy.fetch_players().await?;
        for p in &players {
            self.store
                .upsert_player(
                    p.id,
                    &p.name,
                    &p.position,
                    p.team_fantasy_id.as_deref(),
                    p.price,
                    &p.status,
                )
                .await?;
        }

        info!(
            managers = managers.len(),
            players = players.len(),
            malformed = stats.malformed,
            "player ingestion complete",
        );
        Ok(())
    }

    async fn run_team_links(&self) -> Result<()> {
        let league_teams = self.league.fetch_teams().await?;
        for t in &league_teams {
            self.store.upsert_league_team(&t.id, &t.name).await?;
        }

        let fantasy_teams = self.fantasy.fetch_teams().await?;

        let league_records: Vec<TeamRecord> = league_teams
            .iter()
            .map(|t| TeamRecord::new(t.id.clone(), t.name.clone()))
            .collect();
        let fantasy_records: Vec<TeamRecord> = fantasy_teams
            .iter()
            .map(|t| TeamRecord::new(t.id.clone(), t.name.clone()))
            .collect();

        let outcome = match_teams(&league_records, &fantasy_records);
        for (league_id, fantasy_id) in &outcome.mapped {
            self.store.link_team_fantasy_id(league_id, fantasy_id).await?;
        }
        for fantasy_id in &outcome.unmatched {
            // Expected when providers disagree on naming; an operator links
            // these by hand.
            warn!(%fantasy_id, "team has no league match");
        }

        // Players ingested before any teams existed carry no team reference;
        // their stored provider team ids resolve now that the links exist.
        let players_relinked = self.store.relink_player_teams().await?;

        info!(
            linked = outcome.mapped.len(),
            unmatched = outcome.unmatched.len(),
            players_relinked,
            "team linking complete",
        );
        Ok(())
    }

    async fn run_schedule(&self) -> Result<()> {
        let rounds = self.league.fetch_rounds().await?;
        let map = canonical_map(&rounds);
        for r in &rounds {
            self.store
                .upsert_round(r.id, &r.name, r.postponed, canonical_id(r, &map))
                .await?;
        }

        let matches = self.league.fetch_schedule().await?;
        for m in &matches {
            let home = match &m.home_team_id {
                Some(id) => self.store.team_id_by_league_id(id).await?,
                None => None,
            };
            let away = match &m.away_team_id {
                Some(id) => self.store.team_id_by_league_id(id).await?,
                None => None,
            };
            self.store
                .upsert_match(m.id, m.round_id, home, away, m.date.as_deref(), m.home_score, m.away_score)
                .await?;
        }

        info!(rounds = rounds.len(), matches = matches.len(), "schedule ingestion complete");
        Ok(())
    }

    async fn run_standings(&self) -> Result<()> {
        let standings = self.league.fetch_standings().await?;
        let mut written = 0usize;
        let mut unresolved = 0usize;

        for s in &standings {
            let Some(team_id) = self.store.team_id_by_league_id(&s.team_id).await? else {
                unresolved += 1;
                continue;
            };
            let round_id = self
                .store
                .canonical_round_id(s.round_id)
                .await?
                .unwrap_or(s.round_id);
            self.store
                .upsert_standing(team_id, round_id, s.position, s.wins, s.losses)
                .await?;
            written += 1;
        }

        if unresolved > 0 {
            warn!(unresolved, "standings rows referenced unknown teams");
        }
        info!(written, "standings ingestion complete");
        Ok(())
    }

    async fn run_player_stats(&self) -> Result<()> {
        let rounds = self.store.all_rounds().await?;

        // Per-round fetches are independent reads; fan out, then write
        // sequentially against canonical round ids.
        let fetches = rounds
            .iter()
            .map(|r| self.league.fetch_player_stats(r.id));
        let results = join_all(fetches).await;

        let mut written = 0usize;
        for (round, result) in rounds.iter().zip(results) {
            let stats = result?;
            for s in &stats {
                self.store
                    .upsert_player_stat(s.player_id, round.canonical_id, s.points, s.rating, s.minutes)
                    .await?;
                written += 1;
            }
        }

        info!(rounds = rounds.len(), written, "player stats ingestion complete");
        Ok(())
    }

    async fn run_lineups(&self) -> Result<()> {
        let rounds = self.store.all_rounds().await?;

        let fetches = rounds.iter().map(|r| self.fantasy.fetch_lineups(r.id));
        let results = join_all(fetches).await;

        let mut written = 0usize;
        for (round, result) in rounds.iter().zip(results) {
            let slots = result?;
            for slot in &slots {
                self.store
                    .upsert_lineup_slot(slot.manager_id, round.canonical_id, slot.player_id, slot.starter)
                    .await?;
                written += 1;
            }
        }

        info!(written, "lineup ingestion complete");
        Ok(())
    }

    async fn run_market_movements(&self) -> Result<()> {
        let (transfers, stats) = self.fantasy.fetch_transfers().await?;
        for t in &transfers {
            self.store.insert_transfer(t).await?;
        }

        let bonuses = self.fantasy.fetch_bonuses().await?;
        for b in &bonuses {
            self.store
                .insert_ledger_entry(&LedgerEntry {
                    manager_id: b.manager_id,
                    kind: LedgerKind::Bonus,
                    amount: b.amount,
                    ts: b.ts,
                })
                .await?;
        }

        // Daily snapshot of every player's current price; keyed on
        // (player, day) so re-running within a day is a no-op.
        let today = today_iso();
        let players = self.store.all_players().await?;
        for p in &players {
            self.store
                .insert_market_value(&MarketValuation {
                    player_id: p.id,
                    date: today.clone(),
                    price: p.price,
                })
                .await?;
        }

        info!(
            transfers = transfers.len(),
            malformed = stats.malformed,
            bonuses = bonuses.len(),
            valuations = players.len(),
            "market ingestion complete",
        );
        Ok(())
    }

    async fn run_ownership_snapshot(&self) -> Result<()> {
        let snapshot = self.fantasy.fetch_ownership().await?;
        let mut market_held = 0usize;
        for (player_id, owner) in &snapshot {
            if *owner == Owner::Market {
                market_held += 1;
            }
            self.store.set_player_owner(*player_id, *owner).await?;
        }
        info!(players = snapshot.len(), market_held, "ownership snapshot complete");
        Ok(())
    }

    async fn run_initial_squads(&self) -> Result<()> {
        let engine = InferenceEngine::new(self.store.clone(), self.cfg.league_start_date);
        engine.run().await?;
        Ok(())
    }

    async fn run_team_crests(&self) -> Result<()> {
        let teams = self.store.all_teams().await?;
        let with_league_id: Vec<_> = teams
            .iter()
            .filter_map(|t| t.league_id.clone())
            .collect();

        let fetches = with_league_id.iter().map(|id| async move {
            (id.clone(), self.league.fetch_team_crest(id).await)
        });

        for (league_id, result) in join_all(fetches).await {
            match result {
                Ok(Some(url)) => self.store.set_team_crest(&league_id, &url).await?,
                Ok(None) => {}
                Err(e) => warn!(%league_id, "crest fetch failed: {e}"),
            }
        }
        Ok(())
    }

    async fn run_manager_avatars(&self) -> Result<()> {
        let managers = self.store.all_managers().await?;

        let fetches = managers.iter().map(|m| async move {
            (m.id, self.fantasy.fetch_manager_avatar(m.id).await)
        });

        for (manager_id, result) in join_all(fetches).await {
            match result {
                Ok(Some(url)) => self.store.set_manager_avatar(manager_id, &url).await?,
                Ok(None) => {}
                Err(e) => warn!(manager_id, "avatar fetch failed: {e}"),
            }
        }
        Ok(())
    }

    /// Reporting hook: once squads are inferred, every manager's balance
    /// sheet reconciles from the log. Logged here so a run doubles as a
    /// financial sanity check.
    async fn log_ledger_summaries(&self) -> Result<()> {
        let managers = self.store.all_managers().await?;

        let tasks = managers.iter().map(|m| {
            let store = self.store.clone();
            let manager_id = m.id;
            async move {
                reconcile_manager(&store, manager_id, STARTING_PATRIMONY)
                    .await
                    .map(|s| (manager_id, s))
            }
        });

        for result in join_all(tasks).await {
            let (manager_id, summary) = result?;
            info!(
                manager_id,
                balance = summary.current_balance,
                squad_value = summary.current_squad_value,
                patrimony = summary.total_patrimony,
                value_change = summary.player_value_change,
                "ledger reconciled",
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::cell::RefCell;

    fn fail(msg: &str) -> AppError {
        AppError::Provider(msg.to_string())
    }

    #[tokio::test]
    async fn all_stages_succeed() {
        let report = execute(&Stage::ALL, |_| async { Ok(()) }).await;
        assert!(report.success());
        assert_eq!(report.outcomes.len(), Stage::ALL.len());
    }

    #[tokio::test]
    async fn player_failure_aborts_run() {
        let attempted = RefCell::new(Vec::new());
        let report = execute(&Stage::ALL, |stage| {
            attempted.borrow_mut().push(stage);
            async move {
                if stage == Stage::Players {
                    Err(fail("provider down"))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(report.aborted);
        assert!(!report.success());
        assert_eq!(*attempted.borrow(), vec![Stage::Players]);
        assert_eq!(report.outcomes.len(), 1);
    }

    #[tokio::test]
    async fn later_failure_continues_to_remaining_stages() {
        let attempted = RefCell::new(Vec::new());
        let report = execute(&Stage::ALL, |stage| {
            attempted.borrow_mut().push(stage);
            async move {
                if stage == Stage::Standings {
                    Err(fail("provider down"))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(!report.aborted);
        assert!(!report.success());
        assert_eq!(report.failed(), 1);
        assert_eq!(attempted.borrow().len(), Stage::ALL.len());
    }

    #[test]
    fn plan_full_run_covers_all_stages() {
        let stages = plan(&SyncOptions::default());
        assert_eq!(stages, Stage::ALL.to_vec());
    }

    #[test]
    fn plan_daily_skips_enrichment_block() {
        let stages = plan(&SyncOptions { only: None, daily: true });
        assert!(!stages.iter().any(|s| s.is_enrichment()));
        assert!(stages.contains(&Stage::InitialSquads));
        assert_eq!(stages.len(), Stage::ALL.len() - 2);
    }

    #[test]
    fn plan_single_stage() {
        let stages = plan(&SyncOptions { only: Some(Stage::Schedule), daily: false });
        assert_eq!(stages, vec![Stage::Schedule]);
    }

    #[test]
    fn stage_names_round_trip() {
        for stage in Stage::ALL {
            assert_eq!(Stage::parse(stage.name()), Some(stage));
        }
        assert_eq!(Stage::parse("nope"), None);
    }
}
