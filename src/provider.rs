use std::collections::HashMap;
use std::env;
use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::Utc;

use crate::captaincy::{captain_score, defcon, joker_score, tier_captains};
use crate::engine_api;
use crate::explosivity::{Explosivity, explosivity_index, recent_form, rotation_risk};
use crate::fpl_api::{self, Bootstrap, Element, Fixture, HistoryRow};
use crate::price_watch::price_rise;
use crate::projection::{fixture_multiplier, fixture_run, rank_players, round2};
use crate::snapshot;
use crate::squad::{TOTAL_BUDGET, build_optimal_squad, pick_first_team};
use crate::state::{
    DashboardData, Delta, ExtendedPlayer, PlayerRow, ProviderCommand, SquadPlayer,
};
use crate::tracker::{GwPrediction, Tracker};

const JOKER_TOP_N: usize = 10;
const RISER_TOP_N: usize = 20;

/// Explosivity floor for a joker listing.
const JOKER_MIN_EXPLOSIVITY: f32 = 30.0;

/// Minutes threshold for the explosivity benchmark pool.
const STARTER_MINUTES: f32 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EngineSource {
    Remote,
    Local,
    Snapshot,
}

fn engine_source() -> EngineSource {
    match env::var("ENGINE_SOURCE")
        .unwrap_or_default()
        .to_lowercase()
        .as_str()
    {
        "local" => EngineSource::Local,
        "snapshot" => EngineSource::Snapshot,
        _ => EngineSource::Remote,
    }
}

/// Spawns the single worker thread that owns every fetch and computation.
/// Commands are processed strictly in order, so a superseded request can
/// never overwrite a newer result.
pub fn spawn_provider(tx: Sender<Delta>, cmd_rx: Receiver<ProviderCommand>) {
    thread::spawn(move || run(tx, cmd_rx));
}

fn run(tx: Sender<Delta>, cmd_rx: Receiver<ProviderCommand>) {
    let source = engine_source();
    let refresh_interval = Duration::from_secs(
        env::var("FPL_POLL_SECS")
            .ok()
            .and_then(|val| val.parse::<u64>().ok())
            .unwrap_or(900)
            .max(60),
    );

    let _ = tx.send(Delta::Log(format!(
        "[INFO] Engine source: {}",
        source_label(source)
    )));
    handle_command(&tx, source, ProviderCommand::RefreshAll);
    let mut last_refresh = Instant::now();

    loop {
        match cmd_rx.recv_timeout(Duration::from_millis(500)) {
            Ok(cmd) => {
                if matches!(cmd, ProviderCommand::RefreshAll) {
                    last_refresh = Instant::now();
                }
                handle_command(&tx, source, cmd);
            }
            Err(RecvTimeoutError::Timeout) => {
                if last_refresh.elapsed() >= refresh_interval {
                    handle_command(&tx, source, ProviderCommand::RefreshAll);
                    last_refresh = Instant::now();
                }
            }
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}

fn source_label(source: EngineSource) -> &'static str {
    match source {
        EngineSource::Remote => "remote",
        EngineSource::Local => "local",
        EngineSource::Snapshot => "snapshot",
    }
}

fn handle_command(tx: &Sender<Delta>, source: EngineSource, cmd: ProviderCommand) {
    match cmd {
        ProviderCommand::RefreshAll => refresh_all(tx, source),
        ProviderCommand::FetchPlayers { position } => fetch_players(tx, source, position),
        ProviderCommand::FetchJokers { max_ownership } => fetch_jokers(tx, source, max_ownership),
        ProviderCommand::FetchRisers => fetch_risers(tx, source),
        ProviderCommand::FetchModelStatus => fetch_model_status(tx, source),
        ProviderCommand::LoadGameweek { gameweek } => load_gameweek(tx, gameweek),
    }
}

fn refresh_all(tx: &Sender<Delta>, source: EngineSource) {
    let result = match source {
        EngineSource::Remote => remote_refresh_all(tx),
        EngineSource::Local => local_refresh_all(tx),
        EngineSource::Snapshot => Err(anyhow::anyhow!("snapshot source")),
    };

    if let Err(err) = result {
        if source != EngineSource::Snapshot {
            let _ = tx.send(Delta::Log(format!(
                "[WARN] {} refresh failed: {err}; falling back to snapshot",
                source_label(source)
            )));
        }
        if snapshot_refresh(tx).is_err() {
            let _ = tx.send(Delta::Offline(err.to_string()));
        }
    }

    send_history_index(tx);
}

fn remote_refresh_all(tx: &Sender<Delta>) -> Result<()> {
    let players = engine_api::fetch_players(None)?;
    let _ = tx.send(Delta::SetPlayers(players));

    let jokers = engine_api::fetch_jokers(JOKER_TOP_N, 100.0)?;
    let _ = tx.send(Delta::SetJokers(jokers));

    let risers = engine_api::fetch_price_risers(RISER_TOP_N)?;
    let _ = tx.send(Delta::SetRisers(risers));

    match engine_api::fetch_model_status() {
        Ok(status) => {
            let _ = tx.send(Delta::SetModelStatus(status));
        }
        Err(err) => {
            let _ = tx.send(Delta::Log(format!("[WARN] Model status error: {err}")));
        }
    }

    // The dashboard snapshot is generated out of band; missing is not fatal.
    match snapshot::load_dashboard(&snapshot::data_dir()) {
        Ok(dashboard) => {
            let _ = tx.send(Delta::SetDashboard(dashboard));
        }
        Err(err) => {
            let _ = tx.send(Delta::Log(format!("[INFO] No dashboard snapshot: {err}")));
        }
    }

    Ok(())
}

fn snapshot_refresh(tx: &Sender<Delta>) -> Result<()> {
    let dashboard = snapshot::load_dashboard(&snapshot::data_dir())?;
    let _ = tx.send(Delta::Log(format!(
        "[INFO] Serving gameweek {} from snapshot",
        dashboard.gameweek
    )));
    let _ = tx.send(Delta::SetDashboard(dashboard));
    Ok(())
}

fn send_history_index(tx: &Sender<Delta>) {
    let dir = snapshot::data_dir();
    let gameweeks = snapshot::list_history_gameweeks(&dir);
    let metadata = snapshot::load_metadata(&dir);
    let _ = tx.send(Delta::SetHistoryIndex {
        gameweeks,
        metadata,
    });
}

fn fetch_players(tx: &Sender<Delta>, source: EngineSource, position: Option<u8>) {
    let result = match source {
        EngineSource::Remote => engine_api::fetch_players(position),
        EngineSource::Local => local_players(position),
        EngineSource::Snapshot => Ok(Vec::new()),
    };
    match result {
        Ok(players) if !players.is_empty() => {
            let _ = tx.send(Delta::SetPlayers(players));
        }
        Ok(_) => {
            let _ = tx.send(Delta::Log("[INFO] No ranked players available".to_string()));
        }
        Err(err) => {
            let _ = tx.send(Delta::Log(format!("[WARN] Players fetch failed: {err}")));
        }
    }
}

fn fetch_jokers(tx: &Sender<Delta>, source: EngineSource, max_ownership: f32) {
    let result = match source {
        EngineSource::Remote => engine_api::fetch_jokers(JOKER_TOP_N, max_ownership),
        EngineSource::Local => local_refresh_extended(tx).map(|ext| {
            select_jokers(&ext, JOKER_TOP_N, max_ownership)
        }),
        EngineSource::Snapshot => Ok(Vec::new()),
    };
    match result {
        Ok(jokers) => {
            let _ = tx.send(Delta::SetJokers(jokers));
        }
        Err(err) => {
            let _ = tx.send(Delta::Log(format!("[WARN] Jokers fetch failed: {err}")));
        }
    }
}

fn fetch_risers(tx: &Sender<Delta>, source: EngineSource) {
    let result = match source {
        EngineSource::Remote => engine_api::fetch_price_risers(RISER_TOP_N),
        EngineSource::Local => local_refresh_extended(tx).map(|ext| select_risers(&ext, RISER_TOP_N)),
        EngineSource::Snapshot => Ok(Vec::new()),
    };
    match result {
        Ok(risers) => {
            let _ = tx.send(Delta::SetRisers(risers));
        }
        Err(err) => {
            let _ = tx.send(Delta::Log(format!("[WARN] Price risers fetch failed: {err}")));
        }
    }
}

fn fetch_model_status(tx: &Sender<Delta>, source: EngineSource) {
    let result = match source {
        EngineSource::Remote => engine_api::fetch_model_status(),
        _ => Tracker::open(&snapshot::data_dir())
            .evaluate()
            .ok_or_else(|| anyhow::anyhow!("no evaluated gameweeks yet")),
    };
    match result {
        Ok(status) => {
            let _ = tx.send(Delta::SetModelStatus(status));
        }
        Err(err) => {
            let _ = tx.send(Delta::Log(format!("[INFO] Model status: {err}")));
        }
    }
}

fn load_gameweek(tx: &Sender<Delta>, gameweek: Option<u32>) {
    let Some(gw) = gameweek else {
        let _ = tx.send(Delta::SetHistorySnapshot {
            gameweek: None,
            dashboard: None,
        });
        return;
    };
    match snapshot::load_history_snapshot(&snapshot::data_dir(), gw) {
        Ok(dashboard) => {
            let _ = tx.send(Delta::SetHistorySnapshot {
                gameweek: Some(gw),
                dashboard: Some(dashboard),
            });
        }
        Err(err) => {
            let _ = tx.send(Delta::Log(format!("[WARN] Gameweek {gw} load failed: {err}")));
        }
    }
}

// ---------------------------------------------------------------------------
// Local engine: compute everything from the FPL API directly.
// ---------------------------------------------------------------------------

fn local_refresh_all(tx: &Sender<Delta>) -> Result<()> {
    let bootstrap = fpl_api::bootstrap_static()?;
    let fixtures = fpl_api::fixtures()?;

    let players = rank_players(&bootstrap, &fixtures);
    let _ = tx.send(Delta::SetPlayers(players));

    let candidates = collect_candidates(tx, &bootstrap, &fixtures)?;
    let (extended, pool) = build_rows(&bootstrap, &fixtures, &candidates);

    let _ = tx.send(Delta::SetJokers(select_jokers(&extended, JOKER_TOP_N, 100.0)));
    let _ = tx.send(Delta::SetRisers(select_risers(&extended, RISER_TOP_N)));

    let gameweek = fpl_api::upcoming_gameweek(&bootstrap);
    let dashboard = build_dashboard(pool, gameweek);
    let status = update_tracker(tx, gameweek, &dashboard);
    if let Some(status) = status {
        let _ = tx.send(Delta::SetModelStatus(status));
    }
    let _ = tx.send(Delta::SetDashboard(dashboard));
    Ok(())
}

/// One full local engine pass for the static generator: computes the
/// dashboard and updates the tracker, leaving snapshot writes to the caller.
/// Progress lands on `tx` as `Delta::Log`.
pub fn compute_dashboard(tx: &Sender<Delta>) -> Result<DashboardData> {
    let bootstrap = fpl_api::bootstrap_static()?;
    let fixtures = fpl_api::fixtures()?;
    let candidates = collect_candidates(tx, &bootstrap, &fixtures)?;
    let (_, pool) = build_rows(&bootstrap, &fixtures, &candidates);
    let gameweek = fpl_api::upcoming_gameweek(&bootstrap);
    let dashboard = build_dashboard(pool, gameweek);
    let _ = update_tracker(tx, gameweek, &dashboard);
    Ok(dashboard)
}

fn local_players(position: Option<u8>) -> Result<Vec<PlayerRow>> {
    let bootstrap = fpl_api::bootstrap_static()?;
    let fixtures = fpl_api::fixtures()?;
    let mut players = rank_players(&bootstrap, &fixtures);
    if let Some(pos) = position {
        players.retain(|p| p.position == pos);
    }
    Ok(players)
}

fn local_refresh_extended(tx: &Sender<Delta>) -> Result<Vec<ExtendedPlayer>> {
    let bootstrap = fpl_api::bootstrap_static()?;
    let fixtures = fpl_api::fixtures()?;
    let candidates = collect_candidates(tx, &bootstrap, &fixtures)?;
    let (extended, _) = build_rows(&bootstrap, &fixtures, &candidates);
    Ok(extended)
}

struct Candidate<'a> {
    el: &'a Element,
    history: Vec<HistoryRow>,
    avg_minutes: f32,
    difficulty: u8,
}

fn candidate_limit() -> usize {
    env::var("ENGINE_CANDIDATES")
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or(120)
        .clamp(30, 300)
}

/// Pre-filters the player pool by season output, then pulls per-player
/// histories. Summaries are the expensive part, so the cut happens first.
fn collect_candidates<'a>(
    tx: &Sender<Delta>,
    bootstrap: &'a Bootstrap,
    fixtures: &[Fixture],
) -> Result<Vec<Candidate<'a>>> {
    let gw = fpl_api::upcoming_gameweek(bootstrap);
    let gw_fixtures = fpl_api::gameweek_fixtures(fixtures, gw);
    let difficulty = fpl_api::team_difficulty_map(&gw_fixtures);

    let mut ranked: Vec<&Element> = bootstrap
        .elements
        .iter()
        .filter(|el| el.status == "a" || el.status == "d")
        .collect();
    ranked.sort_by(|a, b| {
        let ka = a.form() * 1.5 + a.points_per_game();
        let kb = b.form() * 1.5 + b.points_per_game();
        kb.partial_cmp(&ka).unwrap_or(std::cmp::Ordering::Equal)
    });
    ranked.truncate(candidate_limit());

    let mut candidates = Vec::with_capacity(ranked.len());
    let mut errors = 0usize;
    for el in ranked {
        let history = match fpl_api::element_summary(el.id) {
            Ok(summary) => summary.history,
            Err(_) => {
                errors += 1;
                continue;
            }
        };
        let last5 = &history[history.len().saturating_sub(5)..];
        let avg_minutes = if last5.is_empty() {
            0.0
        } else {
            last5.iter().map(|m| m.minutes).sum::<u32>() as f32 / last5.len() as f32
        };
        candidates.push(Candidate {
            el,
            history,
            avg_minutes,
            difficulty: difficulty.get(&el.team).copied().unwrap_or(3),
        });
    }

    if errors > 0 {
        let _ = tx.send(Delta::Log(format!(
            "[WARN] {errors} player summaries failed; continuing without them"
        )));
    }
    if candidates.is_empty() {
        return Err(anyhow::anyhow!("no player summaries available"));
    }
    Ok(candidates)
}

fn build_rows(
    bootstrap: &Bootstrap,
    fixtures: &[Fixture],
    candidates: &[Candidate<'_>],
) -> (Vec<ExtendedPlayer>, Vec<SquadPlayer>) {
    let gw = fpl_api::upcoming_gameweek(bootstrap);
    let gw_fixtures = fpl_api::gameweek_fixtures(fixtures, gw);
    let labels = fpl_api::next_fixture_labels(&bootstrap.teams, &gw_fixtures);
    let team_names: HashMap<u32, &str> = bootstrap
        .teams
        .iter()
        .map(|t| (t.id, t.name.as_str()))
        .collect();

    let starters: Vec<&Element> = candidates
        .iter()
        .filter(|c| c.avg_minutes >= STARTER_MINUTES)
        .map(|c| c.el)
        .collect();

    let mut extended = Vec::with_capacity(candidates.len());
    let mut pool = Vec::with_capacity(candidates.len());

    for c in candidates {
        let el = c.el;
        let price = el.price();
        let chance_mult = el
            .chance_of_playing_next_round
            .map(|chance| chance / 100.0)
            .unwrap_or(1.0);
        let predicted =
            round2(el.ep_next() * fixture_multiplier(el.element_type, c.difficulty) * chance_mult);
        let value_score = if price > 0.0 {
            round2(predicted / price)
        } else {
            0.0
        };
        let team = team_names
            .get(&el.team)
            .map(|n| n.to_string())
            .unwrap_or_else(|| "Unknown".to_string());
        let next_fixture = labels.get(&el.team).cloned().unwrap_or_default();

        let explosivity = if c.avg_minutes >= STARTER_MINUTES && !starters.is_empty() {
            explosivity_index(el, &c.history, &starters, c.difficulty)
        } else {
            Explosivity::default()
        };

        let form = recent_form(&c.history, 5);
        let rotation = rotation_risk(&form.minutes);
        let captain = captain_score(el, &c.history);
        let joker = joker_score(el, &c.history, c.difficulty);
        let price_trend = price_rise(&c.history);
        let run = fixture_run(el.team, fixtures, 4);
        let run_value = if run.difficulty > 0.0 {
            round2(predicted / run.difficulty)
        } else {
            0.0
        };

        extended.push(ExtendedPlayer {
            id: el.id,
            web_name: el.web_name.clone(),
            team: team.clone(),
            position: el.element_type,
            price,
            form: el.form(),
            difficulty: c.difficulty,
            predicted_points: predicted,
            value_score,
            ownership: el.ownership(),
            ict_index: el.ict_index(),
            next_fixture: next_fixture.clone(),
            recent_avg_points: form.avg_points,
            form_trend: form.trend.as_str().to_string(),
            starting_probability: rotation.starting_probability,
            rotation_risk: rotation.risk.as_str().to_string(),
            captain_score: captain.score,
            double_digit_hauls: captain.double_digit_hauls,
            joker_score: joker.score,
            is_differential: joker.is_differential,
            explosivity_index: explosivity.index,
            haul_probability: explosivity.haul_probability,
            hauls_this_season: explosivity.hauls,
            price_rise_probability: price_trend.probability,
            net_transfers: price_trend.net_transfers,
            transfer_trend: price_trend.trend.as_str().to_string(),
            fixture_run_difficulty: run.difficulty,
            fixture_run_value: run_value,
        });

        pool.push(SquadPlayer {
            id: el.id,
            web_name: el.web_name.clone(),
            team,
            team_id: el.team,
            position: el.element_type,
            price,
            predicted_points: predicted,
            goals: el.goals_scored,
            assists: el.assists,
            xg: round2(el.xg()),
            xa: round2(el.xa()),
            avg_minutes: (c.avg_minutes * 10.0).round() / 10.0,
            next_fixture,
            next_fixture_difficulty: c.difficulty,
            explosivity: explosivity.index,
            defcon: defcon(el, c.difficulty),
            ownership: el.ownership(),
            hauls: explosivity.hauls,
        });
    }

    (extended, pool)
}

fn select_jokers(extended: &[ExtendedPlayer], top_n: usize, max_ownership: f32) -> Vec<ExtendedPlayer> {
    let mut jokers: Vec<ExtendedPlayer> = extended
        .iter()
        .filter(|p| p.explosivity_index > JOKER_MIN_EXPLOSIVITY)
        .filter(|p| max_ownership >= 100.0 || p.ownership <= max_ownership)
        .cloned()
        .collect();
    jokers.sort_by(|a, b| {
        b.explosivity_index
            .partial_cmp(&a.explosivity_index)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    jokers.truncate(top_n);
    jokers
}

fn select_risers(extended: &[ExtendedPlayer], top_n: usize) -> Vec<ExtendedPlayer> {
    let mut risers: Vec<ExtendedPlayer> = extended.to_vec();
    risers.sort_by(|a, b| {
        b.price_rise_probability
            .partial_cmp(&a.price_rise_probability)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                b.net_transfers.cmp(&a.net_transfers),
            )
    });
    risers.truncate(top_n);
    risers
}

fn build_dashboard(pool: Vec<SquadPlayer>, gameweek: u32) -> DashboardData {
    let optimized = build_optimal_squad(&pool, TOTAL_BUDGET);
    let (starters, bench) = pick_first_team(pool);

    let mut full_squad = starters.clone();
    full_squad.extend(bench.iter().cloned());
    let recommendations = tier_captains(&full_squad);

    let total_projected: f32 = starters.iter().map(|p| p.predicted_points).sum();

    DashboardData {
        status: "online".to_string(),
        last_updated: Some(Utc::now().to_rfc3339()),
        gameweek,
        total_projected_points: round2(total_projected),
        squad: starters,
        bench,
        optimized_squad: optimized,
        recommendations,
    }
}

/// Snapshots this gameweek's squad projections, backfills last week's
/// actuals, records efficiency and returns the refreshed model status.
fn update_tracker(
    tx: &Sender<Delta>,
    gameweek: u32,
    dashboard: &DashboardData,
) -> Option<crate::state::ModelStatus> {
    let dir = snapshot::data_dir();
    let mut tracker = Tracker::open(&dir);

    let previous = gameweek.saturating_sub(1);
    if previous >= 1 && tracker.needs_actuals(previous) {
        match fpl_api::event_live_points(previous) {
            Ok(actuals) if !actuals.is_empty() => {
                let matched = tracker.apply_actuals(previous, &actuals);
                let _ = tx.send(Delta::Log(format!(
                    "[INFO] Gameweek {previous}: matched {matched} actuals"
                )));
                if let Some(eff) = tracker.efficiency(previous) {
                    if let Err(err) = snapshot::record_efficiency(&dir, previous, eff) {
                        let _ = tx.send(Delta::Log(format!(
                            "[WARN] Efficiency write failed: {err}"
                        )));
                    }
                }
            }
            Ok(_) => {}
            Err(err) => {
                let _ = tx.send(Delta::Log(format!(
                    "[WARN] Actuals fetch for gameweek {previous} failed: {err}"
                )));
            }
        }
    }

    let predictions: Vec<GwPrediction> = dashboard
        .squad
        .iter()
        .chain(dashboard.bench.iter())
        .map(|p| GwPrediction {
            id: p.id,
            web_name: p.web_name.clone(),
            predicted_points: p.predicted_points,
            predicted_explosivity: p.explosivity,
            actual_points: None,
        })
        .collect();
    if tracker.record_predictions(gameweek, predictions) {
        let _ = tx.send(Delta::Log(format!(
            "[INFO] Tracked predictions for gameweek {gameweek}"
        )));
    }
    if let Err(err) = tracker.save() {
        let _ = tx.send(Delta::Log(format!("[WARN] Tracker save failed: {err}")));
    }

    tracker.evaluate()
}
