use std::collections::HashMap;

use crate::fpl_api::{Bootstrap, Element, Fixture, gameweek_fixtures, next_fixture_labels, team_difficulty_map, upcoming_gameweek};
use crate::state::PlayerRow;

/// Players under this many season minutes are too small a sample to rank.
pub const MIN_SEASON_MINUTES: u32 = 270;

const DEFAULT_DIFFICULTY: u8 = 3;

/// Small fixture adjustment on top of FPL's own `ep_next` baseline. Clean
/// sheets make GK/DEF more fixture-dependent than attackers.
pub fn fixture_multiplier(position: u8, difficulty: u8) -> f32 {
    if position == 1 || position == 2 {
        match difficulty {
            0..=2 => 1.15,
            3 => 1.0,
            4 => 0.9,
            _ => 0.8,
        }
    } else {
        match difficulty {
            0..=2 => 1.1,
            3 => 1.0,
            _ => 0.95,
        }
    }
}

/// Projects one bootstrap element for the upcoming gameweek, or `None` when
/// the player is filtered out (unavailable, or sample too small).
pub fn project_player(
    el: &Element,
    team_names: &HashMap<u32, &str>,
    difficulty: &HashMap<u32, u8>,
    fixture_labels: &HashMap<u32, String>,
) -> Option<PlayerRow> {
    // 'a' = available, 'd' = doubtful; everyone else is out.
    if el.status != "a" && el.status != "d" {
        return None;
    }
    if el.minutes < MIN_SEASON_MINUTES {
        return None;
    }

    let price = el.price();
    let fdr = difficulty
        .get(&el.team)
        .copied()
        .unwrap_or(DEFAULT_DIFFICULTY);

    let mut predicted = el.ep_next() * fixture_multiplier(el.element_type, fdr);
    if let Some(chance) = el.chance_of_playing_next_round {
        predicted *= chance / 100.0;
    }

    let value_score = if price > 0.0 { predicted / price } else { 0.0 };

    Some(PlayerRow {
        id: el.id,
        code: el.code,
        web_name: el.web_name.clone(),
        team: team_names
            .get(&el.team)
            .map(|n| n.to_string())
            .unwrap_or_else(|| "Unknown".to_string()),
        team_id: el.team,
        position: el.element_type,
        price,
        form: el.form(),
        xg_90: el.xg_per_90(),
        xa_90: el.xa_per_90(),
        difficulty: fdr,
        predicted_points: round2(predicted),
        value_score: round2(value_score),
        status: el.status.clone(),
        chance_of_playing: el.chance_of_playing_next_round,
        ownership: el.ownership(),
        ict_index: el.ict_index(),
        next_fixture: fixture_labels.get(&el.team).cloned().unwrap_or_default(),
    })
}

/// Full ranked projection pass over a bootstrap payload, sorted by projected
/// points descending.
pub fn rank_players(bootstrap: &Bootstrap, fixtures: &[Fixture]) -> Vec<PlayerRow> {
    let gw = upcoming_gameweek(bootstrap);
    let gw_fixtures = gameweek_fixtures(fixtures, gw);
    let difficulty = team_difficulty_map(&gw_fixtures);
    let labels = next_fixture_labels(&bootstrap.teams, &gw_fixtures);
    let team_names: HashMap<u32, &str> = bootstrap
        .teams
        .iter()
        .map(|t| (t.id, t.name.as_str()))
        .collect();

    let mut rows: Vec<PlayerRow> = bootstrap
        .elements
        .iter()
        .filter_map(|el| project_player(el, &team_names, &difficulty, &labels))
        .collect();
    rows.sort_by(|a, b| {
        b.predicted_points
            .partial_cmp(&a.predicted_points)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    rows
}

#[derive(Debug, Clone, Copy)]
pub struct FixtureRun {
    pub difficulty: f32,
    pub fixtures_analyzed: usize,
    pub rating: &'static str,
}

/// Mean FDR over a team's next `num_gameweeks` unfinished fixtures.
pub fn fixture_run(team_id: u32, fixtures: &[Fixture], num_gameweeks: usize) -> FixtureRun {
    let mut upcoming: Vec<&Fixture> = fixtures
        .iter()
        .filter(|f| !f.finished && f.event.is_some())
        .filter(|f| f.team_h == team_id || f.team_a == team_id)
        .collect();
    upcoming.sort_by_key(|f| f.event.unwrap_or(u32::MAX));
    upcoming.truncate(num_gameweeks);

    if upcoming.is_empty() {
        return FixtureRun {
            difficulty: DEFAULT_DIFFICULTY as f32,
            fixtures_analyzed: 0,
            rating: "average",
        };
    }

    let sum: u32 = upcoming
        .iter()
        .map(|f| {
            if f.team_h == team_id {
                f.team_h_difficulty as u32
            } else {
                f.team_a_difficulty as u32
            }
        })
        .sum();
    let avg = sum as f32 / upcoming.len() as f32;

    let rating = if avg <= 2.5 {
        "excellent"
    } else if avg <= 3.0 {
        "good"
    } else if avg <= 3.5 {
        "average"
    } else {
        "difficult"
    };

    FixtureRun {
        difficulty: round2(avg),
        fixtures_analyzed: upcoming.len(),
        rating,
    }
}

pub fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fpl_api::Team;

    fn element(id: u32, status: &str, minutes: u32, ep_next: &str, position: u8) -> Element {
        Element {
            id,
            web_name: format!("P{id}"),
            team: 1,
            element_type: position,
            now_cost: 80,
            status: status.to_string(),
            minutes,
            ep_next: Some(ep_next.to_string()),
            form: Some("4.0".to_string()),
            ..Element::default()
        }
    }

    fn context() -> (
        HashMap<u32, &'static str>,
        HashMap<u32, u8>,
        HashMap<u32, String>,
    ) {
        let names = HashMap::from([(1, "Arsenal")]);
        let difficulty = HashMap::from([(1, 2u8)]);
        let labels = HashMap::from([(1, "Man City (H)".to_string())]);
        (names, difficulty, labels)
    }

    #[test]
    fn unavailable_players_are_filtered() {
        let (names, diff, labels) = context();
        let el = element(1, "i", 900, "6.0", 3);
        assert!(project_player(&el, &names, &diff, &labels).is_none());
    }

    #[test]
    fn low_minute_players_are_filtered() {
        let (names, diff, labels) = context();
        let el = element(1, "a", MIN_SEASON_MINUTES - 1, "6.0", 3);
        assert!(project_player(&el, &names, &diff, &labels).is_none());
    }

    #[test]
    fn attacker_gets_easy_fixture_boost() {
        let (names, diff, labels) = context();
        let el = element(1, "a", 900, "6.0", 3);
        let row = project_player(&el, &names, &diff, &labels).unwrap();
        // 6.0 * 1.1 for a MID against FDR 2
        assert_eq!(row.predicted_points, 6.6);
        assert_eq!(row.next_fixture, "Man City (H)");
        assert_eq!(row.value_score, 0.83);
    }

    #[test]
    fn availability_penalty_scales_projection() {
        let (names, diff, labels) = context();
        let mut el = element(1, "d", 900, "6.0", 3);
        el.chance_of_playing_next_round = Some(50.0);
        let row = project_player(&el, &names, &diff, &labels).unwrap();
        assert_eq!(row.predicted_points, 3.3);
    }

    #[test]
    fn defender_multipliers_are_steeper() {
        assert_eq!(fixture_multiplier(2, 2), 1.15);
        assert_eq!(fixture_multiplier(2, 5), 0.8);
        assert_eq!(fixture_multiplier(4, 5), 0.95);
        assert_eq!(fixture_multiplier(3, 3), 1.0);
    }

    #[test]
    fn blank_gameweek_defaults_to_average_difficulty() {
        let names = HashMap::from([(1, "Arsenal")]);
        let el = element(1, "a", 900, "5.0", 2);
        let row = project_player(&el, &names, &HashMap::new(), &HashMap::new()).unwrap();
        assert_eq!(row.difficulty, 3);
        assert_eq!(row.predicted_points, 5.0);
        assert!(row.next_fixture.is_empty());
    }

    #[test]
    fn fixture_run_rates_easy_schedules() {
        let fixtures = vec![
            Fixture {
                id: 1,
                event: Some(10),
                finished: false,
                team_h: 1,
                team_a: 2,
                team_h_difficulty: 2,
                team_a_difficulty: 4,
            },
            Fixture {
                id: 2,
                event: Some(11),
                finished: false,
                team_h: 3,
                team_a: 1,
                team_h_difficulty: 3,
                team_a_difficulty: 2,
            },
            Fixture {
                id: 3,
                event: Some(9),
                finished: true,
                team_h: 1,
                team_a: 4,
                team_h_difficulty: 5,
                team_a_difficulty: 5,
            },
        ];
        let run = fixture_run(1, &fixtures, 4);
        assert_eq!(run.fixtures_analyzed, 2);
        assert_eq!(run.difficulty, 2.0);
        assert_eq!(run.rating, "excellent");
    }

    #[test]
    fn rank_players_sorts_by_projection() {
        let bootstrap = Bootstrap {
            events: Vec::new(),
            teams: vec![Team {
                id: 1,
                name: "Arsenal".to_string(),
                short_name: "ARS".to_string(),
            }],
            elements: vec![
                element(1, "a", 900, "4.0", 3),
                element(2, "a", 900, "7.0", 3),
            ],
        };
        let rows = rank_players(&bootstrap, &[]);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, 2);
    }
}
