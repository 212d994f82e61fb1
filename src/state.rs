use std::collections::{HashMap, VecDeque};
use std::env;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Wire shapes. These mirror the engine's JSON boundary (players, jokers,
// price risers, model status, dashboard snapshots) and are parsed tolerantly:
// every field the upstream may omit carries a default.
// ---------------------------------------------------------------------------

/// One row of the ranked players payload.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlayerRow {
    pub id: u32,
    #[serde(default)]
    pub code: u64,
    #[serde(default)]
    pub web_name: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub team_id: u32,
    #[serde(default)]
    pub position: u8,
    #[serde(default)]
    pub price: f32,
    #[serde(default)]
    pub form: f32,
    #[serde(default)]
    pub xg_90: f32,
    #[serde(default)]
    pub xa_90: f32,
    #[serde(default)]
    pub difficulty: u8,
    #[serde(default)]
    pub predicted_points: f32,
    #[serde(default)]
    pub value_score: f32,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub chance_of_playing: Option<f32>,
    #[serde(default)]
    pub ownership: f32,
    #[serde(default)]
    pub ict_index: f32,
    #[serde(default)]
    pub next_fixture: String,
}

/// Extended player analytics row (jokers, price risers). The upstream payload
/// is a superset of `PlayerRow`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ExtendedPlayer {
    pub id: u32,
    #[serde(default)]
    pub web_name: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub position: u8,
    #[serde(default)]
    pub price: f32,
    #[serde(default)]
    pub form: f32,
    #[serde(default)]
    pub difficulty: u8,
    #[serde(default)]
    pub predicted_points: f32,
    #[serde(default)]
    pub value_score: f32,
    #[serde(default)]
    pub ownership: f32,
    #[serde(default)]
    pub ict_index: f32,
    #[serde(default)]
    pub next_fixture: String,
    #[serde(default)]
    pub recent_avg_points: f32,
    #[serde(default)]
    pub form_trend: String,
    #[serde(default)]
    pub starting_probability: f32,
    #[serde(default)]
    pub rotation_risk: String,
    #[serde(default)]
    pub captain_score: f32,
    #[serde(default)]
    pub double_digit_hauls: u32,
    #[serde(default)]
    pub joker_score: f32,
    #[serde(default)]
    pub is_differential: bool,
    #[serde(default)]
    pub explosivity_index: f32,
    #[serde(default)]
    pub haul_probability: f32,
    #[serde(default)]
    pub hauls_this_season: u32,
    #[serde(default)]
    pub price_rise_probability: f32,
    #[serde(default)]
    pub net_transfers: i64,
    #[serde(default)]
    pub transfer_trend: String,
    #[serde(default)]
    pub fixture_run_difficulty: f32,
    #[serde(default)]
    pub fixture_run_value: f32,
}

/// A first-team/bench entry inside a dashboard snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SquadPlayer {
    pub id: u32,
    #[serde(default)]
    pub web_name: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub team_id: u32,
    #[serde(default)]
    pub position: u8,
    #[serde(default)]
    pub price: f32,
    #[serde(default)]
    pub predicted_points: f32,
    #[serde(default)]
    pub goals: u32,
    #[serde(default)]
    pub assists: u32,
    #[serde(default, rename = "xG")]
    pub xg: f32,
    #[serde(default, rename = "xA")]
    pub xa: f32,
    #[serde(default)]
    pub avg_minutes: f32,
    #[serde(default)]
    pub next_fixture: String,
    #[serde(default)]
    pub next_fixture_difficulty: u8,
    #[serde(default)]
    pub explosivity: f32,
    #[serde(default)]
    pub defcon: f32,
    #[serde(default)]
    pub ownership: f32,
    #[serde(default)]
    pub hauls: u32,
}

impl SquadPlayer {
    /// Minutes gate for first-team eligibility, matching the engine's
    /// starter constraint.
    pub fn can_start(&self) -> bool {
        self.avg_minutes >= 65.0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptainPick {
    #[serde(flatten)]
    pub player: SquadPlayer,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelWeights {
    #[serde(default)]
    pub form_weight: f32,
    #[serde(default)]
    pub fdr_weight: f32,
    #[serde(default)]
    pub ict_weight: f32,
    #[serde(default)]
    pub model_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Recommendations {
    #[serde(default)]
    pub obvious: Option<CaptainPick>,
    #[serde(default)]
    pub joker: Option<CaptainPick>,
    #[serde(default)]
    pub fun_one: Option<CaptainPick>,
    #[serde(default)]
    pub weights: Option<ModelWeights>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OptimizedSquad {
    #[serde(default)]
    pub formation: String,
    #[serde(default)]
    pub starting_11: Vec<SquadPlayer>,
    #[serde(default)]
    pub bench: Vec<SquadPlayer>,
    #[serde(default)]
    pub total_cost: f32,
    #[serde(default)]
    pub total_predicted_points: f32,
    #[serde(default)]
    pub bench_predicted_points: f32,
}

fn default_status_offline() -> String {
    "offline".to_string()
}

/// `dashboard_data.json` / `history/gw_<N>.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardData {
    #[serde(default = "default_status_offline")]
    pub status: String,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub gameweek: u32,
    #[serde(default)]
    pub total_projected_points: f32,
    #[serde(default)]
    pub squad: Vec<SquadPlayer>,
    #[serde(default)]
    pub bench: Vec<SquadPlayer>,
    #[serde(default)]
    pub optimized_squad: Option<OptimizedSquad>,
    #[serde(default)]
    pub recommendations: Recommendations,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GwEvaluation {
    #[serde(default)]
    pub gameweek: u32,
    #[serde(default)]
    pub top5_avg: f32,
    #[serde(default)]
    pub overall_avg: f32,
    #[serde(default)]
    pub lift: f32,
    #[serde(default)]
    pub rmse: f32,
    #[serde(default)]
    pub success: bool,
}

/// `/api/model-status` payload; only `status` is guaranteed by the contract.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub consecutive_failures: u32,
    #[serde(default)]
    pub recent_results: Vec<GwEvaluation>,
}

/// One `history/metadata.json` entry, keyed by gameweek string.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct GwMeta {
    #[serde(default)]
    pub efficiency: f64,
}

// ---------------------------------------------------------------------------
// UI state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Dashboard,
    Players,
    Jokers,
    PriceWatch,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionFilter {
    All,
    Gk,
    Def,
    Mid,
    Fwd,
}

impl PositionFilter {
    pub fn cycle(self) -> Self {
        match self {
            PositionFilter::All => PositionFilter::Gk,
            PositionFilter::Gk => PositionFilter::Def,
            PositionFilter::Def => PositionFilter::Mid,
            PositionFilter::Mid => PositionFilter::Fwd,
            PositionFilter::Fwd => PositionFilter::All,
        }
    }

    pub fn element_type(self) -> Option<u8> {
        match self {
            PositionFilter::All => None,
            PositionFilter::Gk => Some(1),
            PositionFilter::Def => Some(2),
            PositionFilter::Mid => Some(3),
            PositionFilter::Fwd => Some(4),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PositionFilter::All => "ALL",
            PositionFilter::Gk => "GK",
            PositionFilter::Def => "DEF",
            PositionFilter::Mid => "MID",
            PositionFilter::Fwd => "FWD",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerSort {
    Predicted,
    Value,
    Form,
    Ownership,
}

impl PlayerSort {
    pub fn cycle(self) -> Self {
        match self {
            PlayerSort::Predicted => PlayerSort::Value,
            PlayerSort::Value => PlayerSort::Form,
            PlayerSort::Form => PlayerSort::Ownership,
            PlayerSort::Ownership => PlayerSort::Predicted,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PlayerSort::Predicted => "PROJ",
            PlayerSort::Value => "VALUE",
            PlayerSort::Form => "FORM",
            PlayerSort::Ownership => "OWN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataStatus {
    Loading,
    Online,
    Offline(String),
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub screen: Screen,
    pub position_filter: PositionFilter,
    pub sort: PlayerSort,
    pub selected: usize,
    pub players: Vec<PlayerRow>,
    pub jokers: Vec<ExtendedPlayer>,
    pub risers: Vec<ExtendedPlayer>,
    pub dashboard: Option<DashboardData>,
    pub model_status: Option<ModelStatus>,
    pub history_gameweeks: Vec<u32>,
    /// Index into `history_gameweeks`; `None` shows the live dashboard.
    pub history_selected: Option<usize>,
    /// Snapshot loaded for the History screen.
    pub history_dashboard: Option<DashboardData>,
    pub history_metadata: HashMap<String, GwMeta>,
    pub status: DataStatus,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
    pub joker_max_ownership: f32,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        let joker_max_ownership = env::var("JOKER_MAX_OWNERSHIP")
            .ok()
            .and_then(|val| val.parse::<f32>().ok())
            .unwrap_or(100.0)
            .clamp(1.0, 100.0);
        Self {
            screen: Screen::Dashboard,
            position_filter: PositionFilter::All,
            sort: PlayerSort::Predicted,
            selected: 0,
            players: Vec::new(),
            jokers: Vec::new(),
            risers: Vec::new(),
            dashboard: None,
            model_status: None,
            history_gameweeks: Vec::new(),
            history_selected: None,
            history_dashboard: None,
            history_metadata: HashMap::new(),
            status: DataStatus::Loading,
            logs: VecDeque::with_capacity(200),
            help_overlay: false,
            joker_max_ownership,
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        const MAX_LOGS: usize = 200;
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn filtered_players(&self) -> Vec<&PlayerRow> {
        match self.position_filter.element_type() {
            None => self.players.iter().collect(),
            Some(pos) => self.players.iter().filter(|p| p.position == pos).collect(),
        }
    }

    pub fn cycle_position_filter(&mut self) {
        self.position_filter = self.position_filter.cycle();
        self.selected = 0;
    }

    pub fn cycle_sort(&mut self) {
        self.sort = self.sort.cycle();
        self.sort_players();
        self.selected = 0;
    }

    pub fn sort_players(&mut self) {
        let key = self.sort;
        self.players.sort_by(|a, b| {
            let (ka, kb) = match key {
                PlayerSort::Predicted => (a.predicted_points, b.predicted_points),
                PlayerSort::Value => (a.value_score, b.value_score),
                PlayerSort::Form => (a.form, b.form),
                PlayerSort::Ownership => (a.ownership, b.ownership),
            };
            kb.partial_cmp(&ka).unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    pub fn visible_rows(&self) -> usize {
        match self.screen {
            Screen::Players => self.filtered_players().len(),
            Screen::Jokers => self.jokers.len(),
            Screen::PriceWatch => self.risers.len(),
            Screen::History => self.history_gameweeks.len(),
            Screen::Dashboard => 0,
        }
    }

    pub fn select_next(&mut self) {
        let total = self.visible_rows();
        if total == 0 {
            self.selected = 0;
            return;
        }
        self.selected = (self.selected + 1).min(total - 1);
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    pub fn set_screen(&mut self, screen: Screen) {
        if self.screen != screen {
            self.screen = screen;
            self.selected = 0;
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self.status, DataStatus::Offline(_))
    }

    pub fn efficiency_for(&self, gameweek: u32) -> Option<f64> {
        self.history_metadata
            .get(&gameweek.to_string())
            .map(|m| m.efficiency)
    }

    /// The gameweek the History screen currently points at, if any.
    pub fn selected_history_gameweek(&self) -> Option<u32> {
        let idx = self.history_selected?;
        self.history_gameweeks.get(idx).copied()
    }

    pub fn model_status_label(&self) -> &str {
        self.model_status
            .as_ref()
            .map(|m| m.status.as_str())
            .unwrap_or("unknown")
    }
}

// ---------------------------------------------------------------------------
// Provider protocol. The provider thread owns all fetching and computation;
// the UI applies deltas in arrival order from a single channel, so a stale
// response can never overwrite a newer one.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub enum Delta {
    SetPlayers(Vec<PlayerRow>),
    SetJokers(Vec<ExtendedPlayer>),
    SetRisers(Vec<ExtendedPlayer>),
    SetDashboard(DashboardData),
    SetModelStatus(ModelStatus),
    SetHistoryIndex {
        gameweeks: Vec<u32>,
        metadata: HashMap<String, GwMeta>,
    },
    SetHistorySnapshot {
        gameweek: Option<u32>,
        dashboard: Option<DashboardData>,
    },
    Offline(String),
    Log(String),
}

#[derive(Debug, Clone)]
pub enum ProviderCommand {
    RefreshAll,
    FetchPlayers { position: Option<u8> },
    FetchJokers { max_ownership: f32 },
    FetchRisers,
    FetchModelStatus,
    LoadGameweek { gameweek: Option<u32> },
}

pub fn apply_delta(state: &mut AppState, delta: Delta) {
    match delta {
        Delta::SetPlayers(players) => {
            state.status = DataStatus::Online;
            state.players = players;
            state.sort_players();
            clamp_selection(state);
        }
        Delta::SetJokers(jokers) => {
            state.status = DataStatus::Online;
            state.jokers = jokers;
            clamp_selection(state);
        }
        Delta::SetRisers(risers) => {
            state.status = DataStatus::Online;
            state.risers = risers;
            clamp_selection(state);
        }
        Delta::SetDashboard(dashboard) => {
            if dashboard.status != "offline" {
                state.status = DataStatus::Online;
            }
            state.dashboard = Some(dashboard);
        }
        Delta::SetModelStatus(status) => {
            state.model_status = Some(status);
        }
        Delta::SetHistoryIndex {
            mut gameweeks,
            metadata,
        } => {
            gameweeks.sort_unstable();
            gameweeks.dedup();
            state.history_gameweeks = gameweeks;
            state.history_metadata = metadata;
            clamp_selection(state);
        }
        Delta::SetHistorySnapshot { gameweek, dashboard } => {
            state.history_dashboard = dashboard;
            state.history_selected = gameweek.and_then(|gw| {
                state.history_gameweeks.iter().position(|g| *g == gw)
            });
        }
        Delta::Offline(reason) => {
            state.status = DataStatus::Offline(reason.clone());
            state.push_log(format!("[WARN] Offline: {reason}"));
        }
        Delta::Log(msg) => state.push_log(msg),
    }
}

fn clamp_selection(state: &mut AppState) {
    let total = state.visible_rows();
    if total == 0 {
        state.selected = 0;
    } else if state.selected >= total {
        state.selected = total - 1;
    }
}

pub fn screen_label(screen: Screen) -> &'static str {
    match screen {
        Screen::Dashboard => "DASHBOARD",
        Screen::Players => "PLAYERS",
        Screen::Jokers => "JOKERS",
        Screen::PriceWatch => "PRICE WATCH",
        Screen::History => "HISTORY",
    }
}
