use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::http_cache::fetch_json_cached;
use crate::http_client::http_client;

const FPL_BASE_URL: &str = "https://fantasy.premierleague.com/api";

// The FPL API rarely changes mid-day; summaries churn even less.
const BOOTSTRAP_MAX_AGE_SECS: u64 = 15 * 60;
const FIXTURES_MAX_AGE_SECS: u64 = 15 * 60;
const SUMMARY_MAX_AGE_SECS: u64 = 6 * 60 * 60;
const LIVE_MAX_AGE_SECS: u64 = 30 * 60;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Bootstrap {
    #[serde(default)]
    pub events: Vec<GwEvent>,
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub elements: Vec<Element>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GwEvent {
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_next: bool,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub deadline_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Team {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub short_name: String,
}

/// One row of `bootstrap-static`'s `elements`. The API serializes most of its
/// numeric columns as strings ("5.4"), so those stay `Option<String>` with
/// parsed accessors below.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Element {
    pub id: u32,
    #[serde(default)]
    pub code: u64,
    #[serde(default)]
    pub web_name: String,
    #[serde(default)]
    pub team: u32,
    #[serde(default)]
    pub element_type: u8,
    #[serde(default)]
    pub now_cost: u32,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub minutes: u32,
    #[serde(default)]
    pub total_points: i32,
    #[serde(default)]
    pub goals_scored: u32,
    #[serde(default)]
    pub assists: u32,
    #[serde(default)]
    pub chance_of_playing_next_round: Option<f32>,
    #[serde(default)]
    pub form: Option<String>,
    #[serde(default)]
    pub ep_next: Option<String>,
    #[serde(default)]
    pub points_per_game: Option<String>,
    #[serde(default)]
    pub selected_by_percent: Option<String>,
    #[serde(default)]
    pub ict_index: Option<String>,
    #[serde(default)]
    pub expected_goals: Option<String>,
    #[serde(default)]
    pub expected_assists: Option<String>,
    #[serde(default)]
    pub expected_goals_per_90: Option<String>,
    #[serde(default)]
    pub expected_assists_per_90: Option<String>,
    #[serde(default)]
    pub expected_goals_conceded_per_90: Option<String>,
    #[serde(default)]
    pub defensive_contribution_per_90: Option<String>,
}

impl Element {
    pub fn price(&self) -> f32 {
        self.now_cost as f32 / 10.0
    }

    pub fn form(&self) -> f32 {
        parse_num(&self.form)
    }

    pub fn ep_next(&self) -> f32 {
        parse_num(&self.ep_next)
    }

    pub fn points_per_game(&self) -> f32 {
        parse_num(&self.points_per_game)
    }

    pub fn ownership(&self) -> f32 {
        parse_num(&self.selected_by_percent)
    }

    pub fn ict_index(&self) -> f32 {
        parse_num(&self.ict_index)
    }

    pub fn xg(&self) -> f32 {
        parse_num(&self.expected_goals)
    }

    pub fn xa(&self) -> f32 {
        parse_num(&self.expected_assists)
    }

    pub fn xg_per_90(&self) -> f32 {
        parse_num(&self.expected_goals_per_90)
    }

    pub fn xa_per_90(&self) -> f32 {
        parse_num(&self.expected_assists_per_90)
    }

    pub fn xgc_per_90(&self) -> Option<f32> {
        self.expected_goals_conceded_per_90
            .as_deref()
            .and_then(|s| s.trim().parse::<f32>().ok())
    }

    pub fn defensive_per_90(&self) -> f32 {
        parse_num(&self.defensive_contribution_per_90)
    }
}

fn parse_num(raw: &Option<String>) -> f32 {
    raw.as_deref()
        .and_then(|s| s.trim().parse::<f32>().ok())
        .unwrap_or(0.0)
}

fn default_fdr() -> u8 {
    3
}

#[derive(Debug, Clone, Deserialize)]
pub struct Fixture {
    pub id: u32,
    #[serde(default)]
    pub event: Option<u32>,
    #[serde(default)]
    pub finished: bool,
    #[serde(default)]
    pub team_h: u32,
    #[serde(default)]
    pub team_a: u32,
    #[serde(default = "default_fdr")]
    pub team_h_difficulty: u8,
    #[serde(default = "default_fdr")]
    pub team_a_difficulty: u8,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ElementSummary {
    #[serde(default)]
    pub history: Vec<HistoryRow>,
}

/// One finished-gameweek row of a player's `element-summary` history.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct HistoryRow {
    #[serde(default)]
    pub round: u32,
    #[serde(default)]
    pub total_points: i32,
    #[serde(default)]
    pub minutes: u32,
    #[serde(default)]
    pub transfers_in: i64,
    #[serde(default)]
    pub transfers_out: i64,
    #[serde(default)]
    pub recoveries: u32,
    #[serde(default)]
    pub clearances_blocks_interceptions: u32,
    #[serde(default)]
    pub tackles: u32,
    #[serde(default)]
    pub defensive_contribution: u32,
}

impl HistoryRow {
    /// Defensive actions for the bonus check; older seasons lack the rolled-up
    /// column, so fall back to summing its parts.
    pub fn defensive_actions(&self) -> u32 {
        if self.defensive_contribution > 0 {
            self.defensive_contribution
        } else {
            self.recoveries + self.clearances_blocks_interceptions + self.tackles
        }
    }
}

pub fn bootstrap_static() -> Result<Bootstrap> {
    let client = http_client()?;
    let url = format!("{FPL_BASE_URL}/bootstrap-static/");
    let body = fetch_json_cached(client, &url, BOOTSTRAP_MAX_AGE_SECS)
        .context("bootstrap-static request failed")?;
    parse_bootstrap_json(&body)
}

pub fn fixtures() -> Result<Vec<Fixture>> {
    let client = http_client()?;
    let url = format!("{FPL_BASE_URL}/fixtures/");
    let body =
        fetch_json_cached(client, &url, FIXTURES_MAX_AGE_SECS).context("fixtures request failed")?;
    parse_fixtures_json(&body)
}

pub fn element_summary(player_id: u32) -> Result<ElementSummary> {
    let client = http_client()?;
    let url = format!("{FPL_BASE_URL}/element-summary/{player_id}/");
    let body = fetch_json_cached(client, &url, SUMMARY_MAX_AGE_SECS)
        .context("element-summary request failed")?;
    parse_element_summary_json(&body)
}

/// Actual points per player for a finished gameweek, from the live endpoint.
pub fn event_live_points(gameweek: u32) -> Result<HashMap<u32, f32>> {
    let client = http_client()?;
    let url = format!("{FPL_BASE_URL}/event/{gameweek}/live/");
    let body =
        fetch_json_cached(client, &url, LIVE_MAX_AGE_SECS).context("event live request failed")?;
    parse_event_live_json(&body)
}

pub fn parse_bootstrap_json(raw: &str) -> Result<Bootstrap> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Bootstrap::default());
    }
    serde_json::from_str(trimmed).context("invalid bootstrap-static json")
}

pub fn parse_fixtures_json(raw: &str) -> Result<Vec<Fixture>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed).context("invalid fixtures json")
}

pub fn parse_element_summary_json(raw: &str) -> Result<ElementSummary> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(ElementSummary::default());
    }
    serde_json::from_str(trimmed).context("invalid element-summary json")
}

pub fn parse_event_live_json(raw: &str) -> Result<HashMap<u32, f32>> {
    #[derive(Deserialize)]
    struct Live {
        #[serde(default)]
        elements: Vec<LiveElement>,
    }
    #[derive(Deserialize)]
    struct LiveElement {
        id: u32,
        #[serde(default)]
        stats: LiveStats,
    }
    #[derive(Deserialize, Default)]
    struct LiveStats {
        #[serde(default)]
        total_points: f32,
    }

    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(HashMap::new());
    }
    let live: Live = serde_json::from_str(trimmed).context("invalid event live json")?;
    Ok(live
        .elements
        .into_iter()
        .map(|e| (e.id, e.stats.total_points))
        .collect())
}

/// The next active gameweek, per `events[].is_next`. Defaults to 1 when the
/// flag is missing (pre-season payloads).
pub fn upcoming_gameweek(bootstrap: &Bootstrap) -> u32 {
    bootstrap
        .events
        .iter()
        .find(|e| e.is_next)
        .map(|e| e.id)
        .unwrap_or(1)
}

pub fn next_deadline(bootstrap: &Bootstrap) -> Option<(u32, String)> {
    bootstrap
        .events
        .iter()
        .find(|e| e.is_next)
        .and_then(|e| e.deadline_time.clone().map(|d| (e.id, d)))
}

pub fn gameweek_fixtures<'a>(fixtures: &'a [Fixture], gameweek: u32) -> Vec<&'a Fixture> {
    fixtures
        .iter()
        .filter(|f| f.event == Some(gameweek))
        .collect()
}

/// Per-team FDR for one gameweek. Teams with a blank slot are absent; callers
/// default those to 3.
pub fn team_difficulty_map(gw_fixtures: &[&Fixture]) -> HashMap<u32, u8> {
    let mut map = HashMap::with_capacity(gw_fixtures.len() * 2);
    for f in gw_fixtures {
        map.insert(f.team_h, f.team_h_difficulty);
        map.insert(f.team_a, f.team_a_difficulty);
    }
    map
}

/// Raw fixture-opponent labels per team ("Manchester City (H)"), exactly the
/// heterogeneous strings `fixture_label::format_fixture` normalizes for
/// display. Blank-gameweek teams get an empty label.
pub fn next_fixture_labels(teams: &[Team], gw_fixtures: &[&Fixture]) -> HashMap<u32, String> {
    let names: HashMap<u32, &str> = teams.iter().map(|t| (t.id, t.name.as_str())).collect();
    let mut labels = HashMap::with_capacity(gw_fixtures.len() * 2);
    for f in gw_fixtures {
        if let Some(away) = names.get(&f.team_a) {
            labels.insert(f.team_h, format!("{away} (H)"));
        }
        if let Some(home) = names.get(&f.team_h) {
            labels.insert(f.team_a, format!("{home} (A)"));
        }
    }
    labels
}
