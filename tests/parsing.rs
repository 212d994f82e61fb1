use std::fs;
use std::path::PathBuf;

use fpl_terminal::engine_api::{
    parse_extended_players_json, parse_model_status_json, parse_players_json,
};
use fpl_terminal::fpl_api::{
    parse_bootstrap_json, parse_element_summary_json, parse_fixtures_json, upcoming_gameweek,
};
use fpl_terminal::snapshot::{parse_dashboard_json, parse_metadata_json};

fn read_fixture(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    fs::read_to_string(path).expect("fixture file should be readable")
}

#[test]
fn parses_bootstrap_fixture() {
    let raw = read_fixture("bootstrap_static.json");
    let bootstrap = parse_bootstrap_json(&raw).expect("fixture should parse");
    assert_eq!(bootstrap.teams.len(), 4);
    assert_eq!(bootstrap.elements.len(), 5);
    assert_eq!(upcoming_gameweek(&bootstrap), 21);

    let saka = &bootstrap.elements[0];
    assert_eq!(saka.web_name, "Saka");
    assert_eq!(saka.form(), 6.2);
    assert_eq!(saka.ep_next(), 6.8);
    assert_eq!(saka.price(), 10.2);
    assert_eq!(saka.chance_of_playing_next_round, None);

    let doubtful = &bootstrap.elements[2];
    assert_eq!(doubtful.chance_of_playing_next_round, Some(75.0));
    assert_eq!(doubtful.xgc_per_90(), Some(1.1));
}

#[test]
fn parses_fixtures_fixture() {
    let raw = read_fixture("fixtures.json");
    let fixtures = parse_fixtures_json(&raw).expect("fixture should parse");
    assert_eq!(fixtures.len(), 5);
    assert_eq!(fixtures[0].event, Some(20));
    assert!(fixtures[0].finished);
    // Unscheduled fixtures keep a null event.
    assert_eq!(fixtures[4].event, None);
}

#[test]
fn parses_element_summary_fixture() {
    let raw = read_fixture("element_summary.json");
    let summary = parse_element_summary_json(&raw).expect("fixture should parse");
    assert_eq!(summary.history.len(), 5);
    assert_eq!(summary.history[1].total_points, 12);
    // Rolled-up defensive column wins over the split parts.
    assert_eq!(summary.history[1].defensive_actions(), 11);
    assert_eq!(summary.history[0].defensive_actions(), 9);
}

#[test]
fn parses_engine_players_fixture() {
    let raw = read_fixture("engine_players.json");
    let players = parse_players_json(&raw).expect("fixture should parse");
    assert_eq!(players.len(), 2);
    assert_eq!(players[0].web_name, "Haaland");
    assert_eq!(players[0].predicted_points, 9.02);
    assert_eq!(players[0].next_fixture, "Arsenal (A)");
    // chance_of_playing was omitted on the second row.
    assert_eq!(players[1].chance_of_playing, None);
}

#[test]
fn parses_engine_jokers_fixture() {
    let raw = read_fixture("engine_jokers.json");
    let jokers = parse_extended_players_json(&raw).expect("fixture should parse");
    assert_eq!(jokers.len(), 2);
    assert_eq!(jokers[0].form_trend, "up");
    assert_eq!(jokers[0].explosivity_index, 64.2);
    assert!(jokers[0].is_differential);

    // The sparse row relies on defaults for every omitted column.
    assert_eq!(jokers[1].price_rise_probability, 0.0);
    assert_eq!(jokers[1].net_transfers, 0);
    assert_eq!(jokers[1].rotation_risk, "");
}

#[test]
fn parses_model_status_fixture() {
    let raw = read_fixture("model_status.json");
    let status = parse_model_status_json(&raw).expect("fixture should parse");
    assert_eq!(status.status, "Healthy");
    assert_eq!(status.consecutive_failures, 1);
    assert_eq!(status.recent_results.len(), 2);
    assert!(status.recent_results[0].success);
    assert!(!status.recent_results[1].success);
}

#[test]
fn parses_dashboard_fixture() {
    let raw = read_fixture("dashboard_data.json");
    let dashboard = parse_dashboard_json(&raw).expect("fixture should parse");
    assert_eq!(dashboard.status, "online");
    assert_eq!(dashboard.gameweek, 21);
    assert_eq!(dashboard.squad.len(), 2);
    assert_eq!(dashboard.bench.len(), 1);

    let haaland = &dashboard.squad[1];
    assert_eq!(haaland.xg, 14.8);
    assert!(haaland.can_start());

    let optimized = dashboard.optimized_squad.expect("optimized squad present");
    assert_eq!(optimized.formation, "3-4-3");

    let obvious = dashboard.recommendations.obvious.expect("obvious pick");
    assert_eq!(obvious.player.id, 102);
    assert!(obvious.reason.contains("most reliable"));
    let weights = dashboard.recommendations.weights.expect("weights");
    assert_eq!(weights.model_type, "heuristic");
}

#[test]
fn parses_metadata_fixture() {
    let raw = read_fixture("metadata.json");
    let metadata = parse_metadata_json(&raw).expect("fixture should parse");
    assert_eq!(metadata.len(), 2);
    assert_eq!(metadata.get("20").map(|m| m.efficiency), Some(104.2));
}

#[test]
fn null_bodies_parse_to_empty_data() {
    assert!(parse_players_json("null").unwrap().is_empty());
    assert!(parse_extended_players_json("null").unwrap().is_empty());
    assert!(parse_fixtures_json("null").unwrap().is_empty());
    assert_eq!(parse_model_status_json("null").unwrap().status, "unknown");
}
