use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::state::{DashboardData, GwMeta};

const DASHBOARD_FILE: &str = "dashboard_data.json";
const HISTORY_DIR: &str = "history";
const METADATA_FILE: &str = "metadata.json";

/// Root of the static snapshot tree: `dashboard_data.json` plus
/// `history/gw_<N>.json` and `history/metadata.json`.
pub fn data_dir() -> PathBuf {
    std::env::var("FPL_DATA_DIR")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("data"))
}

pub fn load_dashboard(dir: &Path) -> Result<DashboardData> {
    let path = dir.join(DASHBOARD_FILE);
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("no dashboard snapshot at {}", path.display()))?;
    parse_dashboard_json(&raw)
}

pub fn parse_dashboard_json(raw: &str) -> Result<DashboardData> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Err(anyhow::anyhow!("empty dashboard snapshot"));
    }
    serde_json::from_str(trimmed).context("invalid dashboard json")
}

pub fn save_dashboard(dir: &Path, dashboard: &DashboardData) -> Result<()> {
    write_json_atomic(&dir.join(DASHBOARD_FILE), dashboard)
}

pub fn history_snapshot_path(dir: &Path, gameweek: u32) -> PathBuf {
    dir.join(HISTORY_DIR).join(format!("gw_{gameweek}.json"))
}

pub fn save_history_snapshot(dir: &Path, dashboard: &DashboardData) -> Result<()> {
    write_json_atomic(&history_snapshot_path(dir, dashboard.gameweek), dashboard)
}

pub fn load_history_snapshot(dir: &Path, gameweek: u32) -> Result<DashboardData> {
    let path = history_snapshot_path(dir, gameweek);
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("no history snapshot at {}", path.display()))?;
    parse_dashboard_json(&raw)
}

/// Gameweeks with a stored snapshot, ascending.
pub fn list_history_gameweeks(dir: &Path) -> Vec<u32> {
    let Ok(entries) = fs::read_dir(dir.join(HISTORY_DIR)) else {
        return Vec::new();
    };
    let mut gameweeks: Vec<u32> = entries
        .filter_map(|e| e.ok())
        .filter_map(|e| gameweek_from_file_name(&e.file_name().to_string_lossy()))
        .collect();
    gameweeks.sort_unstable();
    gameweeks.dedup();
    gameweeks
}

fn gameweek_from_file_name(name: &str) -> Option<u32> {
    name.strip_prefix("gw_")?.strip_suffix(".json")?.parse().ok()
}

pub fn load_metadata(dir: &Path) -> HashMap<String, GwMeta> {
    let path = dir.join(HISTORY_DIR).join(METADATA_FILE);
    let Ok(raw) = fs::read_to_string(path) else {
        return HashMap::new();
    };
    parse_metadata_json(&raw).unwrap_or_default()
}

pub fn parse_metadata_json(raw: &str) -> Result<HashMap<String, GwMeta>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(HashMap::new());
    }
    serde_json::from_str(trimmed).context("invalid history metadata json")
}

/// Upserts one gameweek's efficiency into `history/metadata.json`.
pub fn record_efficiency(dir: &Path, gameweek: u32, efficiency: f64) -> Result<()> {
    let mut metadata = load_metadata(dir);
    metadata.insert(gameweek.to_string(), GwMeta { efficiency });
    write_json_atomic(&dir.join(HISTORY_DIR).join(METADATA_FILE), &metadata)
}

fn write_json_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(value).context("serialize snapshot")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}
