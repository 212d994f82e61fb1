use anyhow::{Context, Result};

use crate::http_cache::fetch_json_fresh;
use crate::http_client::http_client;
use crate::state::{ExtendedPlayer, ModelStatus, PlayerRow};

const DEFAULT_ENGINE_URL: &str = "http://localhost:5001";

/// Base URL of the prediction engine service. Fetches against it are always
/// fresh: the dashboard either shows live engine output or falls back to the
/// static snapshot, never a silently stale body.
pub fn engine_base_url() -> String {
    std::env::var("ENGINE_URL")
        .ok()
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_ENGINE_URL.to_string())
}

pub fn fetch_players(position: Option<u8>) -> Result<Vec<PlayerRow>> {
    let client = http_client()?;
    let base = engine_base_url();
    let url = match position {
        Some(pos) => format!("{base}/api/players?position={pos}"),
        None => format!("{base}/api/players"),
    };
    let body = fetch_json_fresh(client, &url).context("players request failed")?;
    parse_players_json(&body)
}

pub fn fetch_jokers(top_n: usize, max_ownership: f32) -> Result<Vec<ExtendedPlayer>> {
    let client = http_client()?;
    let url = format!(
        "{}/api/jokers?top_n={top_n}&max_ownership={max_ownership}",
        engine_base_url()
    );
    let body = fetch_json_fresh(client, &url).context("jokers request failed")?;
    parse_extended_players_json(&body)
}

pub fn fetch_price_risers(top_n: usize) -> Result<Vec<ExtendedPlayer>> {
    let client = http_client()?;
    let url = format!("{}/api/price-risers?top_n={top_n}", engine_base_url());
    let body = fetch_json_fresh(client, &url).context("price risers request failed")?;
    parse_extended_players_json(&body)
}

pub fn fetch_model_status() -> Result<ModelStatus> {
    let client = http_client()?;
    let url = format!("{}/api/model-status", engine_base_url());
    let body = fetch_json_fresh(client, &url).context("model status request failed")?;
    parse_model_status_json(&body)
}

pub fn parse_players_json(raw: &str) -> Result<Vec<PlayerRow>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed).context("invalid players json")
}

pub fn parse_extended_players_json(raw: &str) -> Result<Vec<ExtendedPlayer>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(Vec::new());
    }
    serde_json::from_str(trimmed).context("invalid extended players json")
}

/// The engine reports `null` while it has nothing tracked yet; that is an
/// unknown status, not an error.
pub fn parse_model_status_json(raw: &str) -> Result<ModelStatus> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(ModelStatus {
            status: "unknown".to_string(),
            ..ModelStatus::default()
        });
    }
    serde_json::from_str(trimmed).context("invalid model status json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_payloads_degrade_gracefully() {
        assert!(parse_players_json("null").unwrap().is_empty());
        assert!(parse_extended_players_json("").unwrap().is_empty());
        assert_eq!(parse_model_status_json("null").unwrap().status, "unknown");
    }

    #[test]
    fn minimal_model_status_parses() {
        let status = parse_model_status_json(r#"{"status": "Healthy"}"#).unwrap();
        assert_eq!(status.status, "Healthy");
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.recent_results.is_empty());
    }
}
