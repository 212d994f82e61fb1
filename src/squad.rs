use std::collections::HashMap;

use crate::state::{OptimizedSquad, SquadPlayer};

/// Legal formations as (GK, DEF, MID, FWD). FPL allows 3-5 defenders,
/// 2-5 midfielders and 1-3 forwards around a single keeper.
pub const FORMATIONS: [(&str, [usize; 4]); 8] = [
    ("3-4-3", [1, 3, 4, 3]),
    ("3-5-2", [1, 3, 5, 2]),
    ("4-4-2", [1, 4, 4, 2]),
    ("4-3-3", [1, 4, 3, 3]),
    ("4-5-1", [1, 4, 5, 1]),
    ("5-3-2", [1, 5, 3, 2]),
    ("5-2-3", [1, 5, 2, 3]),
    ("5-4-1", [1, 5, 4, 1]),
];

pub const TOTAL_BUDGET: f32 = 100.0;
pub const MAX_PLAYERS_PER_TEAM: usize = 3;

// Cheapest realistic bench is roughly a 4.0 keeper plus three 4.5 outfielders.
const BENCH_RESERVE: f32 = 17.5;
const BENCH_RESERVE_FLOOR: f32 = 16.5;

/// Defender-luxury margin: a 4th/5th defender must beat the best available
/// attacker by this much to take a starting slot.
const DEFENDER_LUXURY_MARGIN: f32 = 0.8;

/// Splits a processed candidate pool into the best starting XI plus a 4-man
/// bench, unconstrained by budget. Starters must pass the minutes gate where
/// possible; the bench takes the next best regardless of minutes.
pub fn pick_first_team(mut processed: Vec<SquadPlayer>) -> (Vec<SquadPlayer>, Vec<SquadPlayer>) {
    processed.sort_by(|a, b| {
        b.predicted_points
            .partial_cmp(&a.predicted_points)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut starters: Vec<SquadPlayer> = Vec::with_capacity(11);
    let mut remaining = processed;
    let mut counts = [0usize; 5];

    // Mandatory minima first: 1 GK, 3 DEF, 2 MID, 1 FWD.
    let minima = [0usize, 1, 3, 2, 1];
    let mut idx = 0;
    while idx < remaining.len() {
        let pos = remaining[idx].position as usize;
        if pos >= 1
            && pos <= 4
            && counts[pos] < minima[pos]
            && remaining[idx].can_start()
        {
            let p = remaining.remove(idx);
            counts[pos] += 1;
            starters.push(p);
        } else {
            idx += 1;
        }
    }

    // Fill to 11, favoring attackers: extra defenders have to earn the slot.
    let maxima = [0usize, 1, 5, 5, 3];
    while starters.len() < 11 && !remaining.is_empty() {
        let best_def = remaining
            .iter()
            .position(|p| p.position == 2 && counts[2] < maxima[2] && p.can_start());
        let best_atk = remaining.iter().position(|p| {
            (p.position == 3 || p.position == 4)
                && counts[p.position as usize] < maxima[p.position as usize]
                && p.can_start()
        });

        let pick = match (best_def, best_atk) {
            (None, None) => {
                // Nobody passes the minutes gate; take the best remaining
                // player whose slot is still open.
                match remaining
                    .iter()
                    .position(|p| counts[p.position as usize] < maxima[p.position as usize])
                {
                    Some(i) => i,
                    None => break,
                }
            }
            (Some(d), None) => d,
            (None, Some(a)) => a,
            (Some(d), Some(a)) => {
                let def_pts = remaining[d].predicted_points;
                let atk_pts = remaining[a].predicted_points;
                let defender_is_luxury = counts[2] >= 3;
                if defender_is_luxury && def_pts < atk_pts + DEFENDER_LUXURY_MARGIN {
                    a
                } else if def_pts > atk_pts {
                    d
                } else {
                    a
                }
            }
        };

        let p = remaining.remove(pick);
        counts[p.position as usize] += 1;
        starters.push(p);
    }

    remaining.sort_by(|a, b| {
        b.predicted_points
            .partial_cmp(&a.predicted_points)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let bench: Vec<SquadPlayer> = remaining.into_iter().take(4).collect();
    (starters, bench)
}

/// Budget-constrained 15-man squad: tries every formation greedily within
/// `budget` minus a bench reserve, keeps the highest-scoring XI, then fills
/// the bench from what is left.
pub fn build_optimal_squad(pool: &[SquadPlayer], budget: f32) -> Option<OptimizedSquad> {
    let mut by_position: [Vec<&SquadPlayer>; 5] = Default::default();
    for p in pool {
        let pos = p.position as usize;
        if (1..=4).contains(&pos) {
            by_position[pos].push(p);
        }
    }
    for list in by_position.iter_mut() {
        list.sort_by(|a, b| {
            b.predicted_points
                .partial_cmp(&a.predicted_points)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    }

    let starting_budget = budget - BENCH_RESERVE;
    let mut best: Option<(&str, StartingEleven)> = None;
    for (name, shape) in FORMATIONS {
        let Some(eleven) = select_starting_11(&by_position, shape, starting_budget) else {
            continue;
        };
        let better = best
            .as_ref()
            .map(|(_, b)| eleven.total_points > b.total_points)
            .unwrap_or(true);
        if better {
            best = Some((name, eleven));
        }
    }

    // Retry with the absolute-minimum bench reserve before giving up.
    let (formation, eleven) = match best {
        Some(found) => found,
        None => (
            "4-4-2",
            select_starting_11(&by_position, [1, 4, 4, 2], budget - BENCH_RESERVE_FLOOR)?,
        ),
    };

    let remaining_budget = budget - eleven.total_cost;
    let bench = select_bench(&eleven.players, remaining_budget, &by_position);
    let bench_cost: f32 = bench.iter().map(|p| p.price).sum();
    let bench_points: f32 = bench.iter().map(|p| p.predicted_points).sum();

    Some(OptimizedSquad {
        formation: formation.to_string(),
        total_cost: round1(eleven.total_cost + bench_cost),
        total_predicted_points: round2(eleven.total_points),
        bench_predicted_points: round2(bench_points),
        starting_11: eleven.players,
        bench,
    })
}

struct StartingEleven {
    players: Vec<SquadPlayer>,
    total_cost: f32,
    total_points: f32,
}

fn select_starting_11(
    by_position: &[Vec<&SquadPlayer>; 5],
    shape: [usize; 4],
    budget: f32,
) -> Option<StartingEleven> {
    let mut selected: Vec<SquadPlayer> = Vec::with_capacity(11);
    let mut total_cost = 0.0f32;
    let mut total_points = 0.0f32;
    let mut team_counts: HashMap<u32, usize> = HashMap::new();

    // Keeper first, leaving an even share of budget for the outfield.
    let mut picked_gk = false;
    for p in by_position[1].iter().take(5) {
        let slots_left = (11 - selected.len()) as f32;
        if p.price <= (budget - total_cost) / slots_left {
            selected.push((*p).clone());
            total_cost += p.price;
            total_points += p.predicted_points;
            *team_counts.entry(p.team_id).or_insert(0) += 1;
            picked_gk = true;
            break;
        }
    }
    if !picked_gk {
        return None;
    }

    for (pos, want) in [(2usize, shape[1]), (3, shape[2]), (4, shape[3])] {
        let mut got = 0;
        for p in &by_position[pos] {
            if got >= want {
                break;
            }
            let team_count = team_counts.get(&p.team_id).copied().unwrap_or(0);
            if team_count < MAX_PLAYERS_PER_TEAM && total_cost + p.price <= budget {
                selected.push((*p).clone());
                total_cost += p.price;
                total_points += p.predicted_points;
                *team_counts.entry(p.team_id).or_insert(0) += 1;
                got += 1;
            }
        }
        if got < want {
            return None;
        }
    }

    Some(StartingEleven {
        players: selected,
        total_cost: round1(total_cost),
        total_points,
    })
}

fn select_bench(
    starting_11: &[SquadPlayer],
    remaining_budget: f32,
    by_position: &[Vec<&SquadPlayer>; 5],
) -> Vec<SquadPlayer> {
    let mut bench: Vec<SquadPlayer> = Vec::with_capacity(4);
    let mut selected_ids: Vec<u32> = starting_11.iter().map(|p| p.id).collect();
    let mut team_counts: HashMap<u32, usize> = HashMap::new();
    for p in starting_11 {
        *team_counts.entry(p.team_id).or_insert(0) += 1;
    }
    let mut budget = remaining_budget;

    // Backup keeper: cheapest that leaves room for three outfielders.
    let mut keepers: Vec<&SquadPlayer> = by_position[1].iter().copied().collect();
    keepers.sort_by(|a, b| {
        a.price
            .partial_cmp(&b.price)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for p in keepers {
        let team_count = team_counts.get(&p.team_id).copied().unwrap_or(0);
        if !selected_ids.contains(&p.id)
            && team_count < MAX_PLAYERS_PER_TEAM
            && p.price <= budget - 12.0
        {
            bench.push(p.clone());
            budget -= p.price;
            selected_ids.push(p.id);
            *team_counts.entry(p.team_id).or_insert(0) += 1;
            break;
        }
    }

    // Outfield bench by value for money.
    let mut outfield: Vec<&SquadPlayer> = by_position[2]
        .iter()
        .chain(by_position[3].iter())
        .chain(by_position[4].iter())
        .copied()
        .collect();
    outfield.sort_by(|a, b| {
        value_score(b)
            .partial_cmp(&value_score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for p in outfield {
        if bench.len() >= 4 {
            break;
        }
        let team_count = team_counts.get(&p.team_id).copied().unwrap_or(0);
        if !selected_ids.contains(&p.id) && team_count < MAX_PLAYERS_PER_TEAM && p.price <= budget {
            bench.push(p.clone());
            budget -= p.price;
            selected_ids.push(p.id);
            *team_counts.entry(p.team_id).or_insert(0) += 1;
        }
    }

    bench
}

fn value_score(p: &SquadPlayer) -> f32 {
    if p.price > 0.0 {
        p.predicted_points / p.price
    } else {
        0.0
    }
}

fn round1(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f32) -> f32 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(id: u32, position: u8, predicted: f32, price: f32, team_id: u32) -> SquadPlayer {
        SquadPlayer {
            id,
            web_name: format!("P{id}"),
            team_id,
            position,
            price,
            predicted_points: predicted,
            avg_minutes: 90.0,
            ..SquadPlayer::default()
        }
    }

    fn sample_pool() -> Vec<SquadPlayer> {
        let mut pool = Vec::new();
        let mut id = 0;
        // Two keepers, ten defenders, ten midfielders, six forwards across
        // enough clubs that the 3-per-team cap never binds.
        for i in 0..2 {
            id += 1;
            pool.push(player(id, 1, 5.0 - i as f32, 5.0 - i as f32 * 0.8, 20 + id));
        }
        for i in 0..10 {
            id += 1;
            pool.push(player(id, 2, 5.5 - i as f32 * 0.3, 6.0 - i as f32 * 0.2, id));
        }
        for i in 0..10 {
            id += 1;
            pool.push(player(id, 3, 7.5 - i as f32 * 0.4, 8.0 - i as f32 * 0.3, id));
        }
        for i in 0..6 {
            id += 1;
            pool.push(player(id, 4, 7.0 - i as f32 * 0.5, 8.5 - i as f32 * 0.5, id));
        }
        pool
    }

    #[test]
    fn first_team_respects_formation_bounds() {
        let (starters, bench) = pick_first_team(sample_pool());
        assert_eq!(starters.len(), 11);
        assert_eq!(bench.len(), 4);

        let count = |pos: u8| starters.iter().filter(|p| p.position == pos).count();
        assert_eq!(count(1), 1);
        assert!((3..=5).contains(&count(2)));
        assert!((2..=5).contains(&count(3)));
        assert!((1..=3).contains(&count(4)));
    }

    #[test]
    fn minutes_gate_keeps_fringe_players_off_the_xi() {
        let mut pool = sample_pool();
        // Best projection in the pool, but barely plays.
        pool.push(SquadPlayer {
            avg_minutes: 20.0,
            ..player(99, 4, 12.0, 11.0, 30)
        });
        let (starters, bench) = pick_first_team(pool);
        assert!(!starters.iter().any(|p| p.id == 99));
        assert!(bench.iter().any(|p| p.id == 99));
    }

    #[test]
    fn optimal_squad_fits_the_budget() {
        let squad = build_optimal_squad(&sample_pool(), TOTAL_BUDGET).expect("squad builds");
        assert_eq!(squad.starting_11.len(), 11);
        assert!(squad.total_cost <= TOTAL_BUDGET + 0.01);
        assert!(!squad.formation.is_empty());
        assert!(squad.total_predicted_points > 0.0);
        // Bench keeper present.
        assert!(squad.bench.iter().any(|p| p.position == 1));
    }

    #[test]
    fn team_cap_is_enforced() {
        // Every attacker from the same club; only three may start.
        let mut pool = Vec::new();
        for i in 0..2 {
            pool.push(player(100 + i, 1, 4.5, 4.5, 50 + i));
        }
        for i in 0..6 {
            pool.push(player(1 + i, 2, 4.0, 4.5, 60 + i));
        }
        for i in 0..6 {
            pool.push(player(10 + i, 3, 5.0, 5.0, 70 + i));
        }
        for i in 0..5 {
            pool.push(player(20 + i, 4, 8.0, 6.0, 7)); // all club 7
        }
        let squad = build_optimal_squad(&pool, TOTAL_BUDGET).expect("squad builds");
        let club7 = squad
            .starting_11
            .iter()
            .chain(squad.bench.iter())
            .filter(|p| p.team_id == 7)
            .count();
        assert!(club7 <= MAX_PLAYERS_PER_TEAM);
    }

    #[test]
    fn impossible_budget_yields_none() {
        assert!(build_optimal_squad(&sample_pool(), 30.0).is_none());
    }
}
