use std::collections::HashMap;

use fpl_terminal::state::{
    AppState, DashboardData, DataStatus, Delta, PlayerRow, PlayerSort, PositionFilter, Screen,
    apply_delta,
};

fn player(id: u32, position: u8, predicted: f32, value: f32) -> PlayerRow {
    PlayerRow {
        id,
        web_name: format!("P{id}"),
        position,
        predicted_points: predicted,
        value_score: value,
        ..PlayerRow::default()
    }
}

fn dashboard(gameweek: u32) -> DashboardData {
    DashboardData {
        status: "online".to_string(),
        last_updated: None,
        gameweek,
        total_projected_points: 50.0,
        squad: Vec::new(),
        bench: Vec::new(),
        optimized_squad: None,
        recommendations: Default::default(),
    }
}

#[test]
fn position_filter_narrows_the_table() {
    let mut state = AppState::new();
    apply_delta(
        &mut state,
        Delta::SetPlayers(vec![
            player(1, 3, 7.0, 0.7),
            player(2, 4, 6.0, 0.8),
            player(3, 3, 5.0, 0.5),
        ]),
    );

    assert_eq!(state.filtered_players().len(), 3);
    state.position_filter = PositionFilter::Mid;
    let mids = state.filtered_players();
    assert_eq!(mids.len(), 2);
    assert!(mids.iter().all(|p| p.position == 3));

    state.position_filter = PositionFilter::Gk;
    assert!(state.filtered_players().is_empty());
}

#[test]
fn sort_cycle_reorders_players() {
    let mut state = AppState::new();
    apply_delta(
        &mut state,
        Delta::SetPlayers(vec![player(1, 3, 7.0, 0.5), player(2, 4, 6.0, 0.9)]),
    );
    // Default ranking is by projection.
    assert_eq!(state.players[0].id, 1);

    state.cycle_sort();
    assert_eq!(state.sort, PlayerSort::Value);
    assert_eq!(state.players[0].id, 2);
}

#[test]
fn set_players_clamps_a_stale_selection() {
    let mut state = AppState::new();
    state.screen = Screen::Players;
    apply_delta(
        &mut state,
        Delta::SetPlayers((1..=10).map(|i| player(i, 3, 5.0, 0.5)).collect()),
    );
    state.selected = 9;

    apply_delta(
        &mut state,
        Delta::SetPlayers(vec![player(1, 3, 5.0, 0.5), player(2, 3, 4.0, 0.4)]),
    );
    assert_eq!(state.selected, 1);
}

#[test]
fn successful_data_clears_the_offline_state() {
    let mut state = AppState::new();
    apply_delta(&mut state, Delta::Offline("connection refused".to_string()));
    assert!(state.is_offline());
    assert!(matches!(state.status, DataStatus::Offline(_)));

    apply_delta(&mut state, Delta::SetPlayers(vec![player(1, 3, 5.0, 0.5)]));
    assert_eq!(state.status, DataStatus::Online);
}

#[test]
fn offline_snapshot_dashboard_does_not_claim_online() {
    let mut state = AppState::new();
    apply_delta(&mut state, Delta::Offline("engine down".to_string()));

    let mut snapshot = dashboard(20);
    snapshot.status = "offline".to_string();
    apply_delta(&mut state, Delta::SetDashboard(snapshot));
    assert!(state.is_offline());
    assert_eq!(state.dashboard.as_ref().map(|d| d.gameweek), Some(20));
}

#[test]
fn history_snapshot_tracks_the_selected_gameweek() {
    let mut state = AppState::new();
    apply_delta(
        &mut state,
        Delta::SetHistoryIndex {
            gameweeks: vec![21, 19, 20, 19],
            metadata: HashMap::new(),
        },
    );
    // Sorted and de-duplicated.
    assert_eq!(state.history_gameweeks, vec![19, 20, 21]);

    apply_delta(
        &mut state,
        Delta::SetHistorySnapshot {
            gameweek: Some(20),
            dashboard: Some(dashboard(20)),
        },
    );
    assert_eq!(state.selected_history_gameweek(), Some(20));
    assert_eq!(state.history_dashboard.as_ref().map(|d| d.gameweek), Some(20));

    // Back to live.
    apply_delta(
        &mut state,
        Delta::SetHistorySnapshot {
            gameweek: None,
            dashboard: None,
        },
    );
    assert_eq!(state.selected_history_gameweek(), None);
    assert!(state.history_dashboard.is_none());
}

#[test]
fn selection_moves_within_screen_bounds() {
    let mut state = AppState::new();
    state.screen = Screen::Players;
    apply_delta(
        &mut state,
        Delta::SetPlayers(vec![player(1, 3, 5.0, 0.5), player(2, 3, 4.0, 0.4)]),
    );

    state.select_next();
    assert_eq!(state.selected, 1);
    state.select_next();
    assert_eq!(state.selected, 1);
    state.select_prev();
    assert_eq!(state.selected, 0);
    state.select_prev();
    assert_eq!(state.selected, 0);
}

#[test]
fn switching_screens_resets_selection() {
    let mut state = AppState::new();
    state.screen = Screen::Players;
    apply_delta(
        &mut state,
        Delta::SetPlayers(vec![player(1, 3, 5.0, 0.5), player(2, 3, 4.0, 0.4)]),
    );
    state.select_next();
    assert_eq!(state.selected, 1);

    state.set_screen(Screen::Jokers);
    assert_eq!(state.selected, 0);
}

#[test]
fn efficiency_lookup_uses_string_keys() {
    let mut state = AppState::new();
    apply_delta(
        &mut state,
        Delta::SetHistoryIndex {
            gameweeks: vec![19],
            metadata: HashMap::from([(
                "19".to_string(),
                fpl_terminal::state::GwMeta { efficiency: 91.5 },
            )]),
        },
    );
    assert_eq!(state.efficiency_for(19), Some(91.5));
    assert_eq!(state.efficiency_for(20), None);
}

#[test]
fn log_ring_is_bounded() {
    let mut state = AppState::new();
    for i in 0..250 {
        apply_delta(&mut state, Delta::Log(format!("[INFO] line {i}")));
    }
    assert_eq!(state.logs.len(), 200);
    assert_eq!(state.logs.front().map(String::as_str), Some("[INFO] line 50"));
}
