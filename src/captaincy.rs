use crate::explosivity::{FormTrend, count_hauls, recent_form};
use crate::fpl_api::{Element, HistoryRow};
use crate::state::{CaptainPick, ModelWeights, Recommendations, SquadPlayer};

/// A player must reach this explosivity before any captaincy tier considers
/// them.
pub const EXPLOSIVITY_FLOOR: f32 = 33.0;

pub const MODEL_TYPE: &str = "heuristic";

#[derive(Debug, Clone, Copy, Default)]
pub struct CaptainScore {
    pub score: f32,
    pub double_digit_hauls: u32,
}

/// Multi-factor captain suitability (0-100): explosiveness, form, threat,
/// position and an ownership sweet spot.
pub fn captain_score(el: &Element, history: &[HistoryRow]) -> CaptainScore {
    let mut score = 0.0f32;

    let hauls = count_hauls(history);
    if !history.is_empty() {
        let high_scores: Vec<f32> = history
            .iter()
            .filter(|m| m.total_points >= 10)
            .map(|m| m.total_points as f32)
            .collect();
        let spread = if high_scores.len() > 1 {
            population_std(&high_scores)
        } else {
            0.0
        };
        score += (hauls as f32 * 5.0).min(25.0);
        score += (spread * 2.0).min(15.0);
    }

    score += (el.form() * 3.0).min(20.0);
    score += (el.ep_next() * 2.0).min(20.0);

    score += match el.element_type {
        4 => 15.0,
        3 => 10.0,
        2 => 5.0,
        _ => 0.0,
    };

    let ownership = el.ownership();
    score += if (10.0..=40.0).contains(&ownership) {
        10.0
    } else if ownership > 40.0 {
        5.0
    } else {
        3.0
    };

    CaptainScore {
        score: round1(score.min(100.0)),
        double_digit_hauls: hauls,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JokerScore {
    pub score: f32,
    pub is_differential: bool,
}

/// Joker (differential captain) score. Two admissible profiles: low-owned
/// differentials under 15%, and cheap high-owned players with explosive
/// underlying numbers. Everyone else scores zero.
pub fn joker_score(el: &Element, history: &[HistoryRow], difficulty: u8) -> JokerScore {
    if el.element_type != 3 && el.element_type != 4 {
        return JokerScore::default();
    }

    let ownership = el.ownership();
    let price = el.price();
    let is_differential = ownership < 15.0;
    let is_value_explosive = ownership > 15.0 && price < 8.5;
    if !is_differential && !is_value_explosive {
        return JokerScore::default();
    }

    let mut score = 0.0f32;

    if !history.is_empty() {
        let hauls = count_hauls(history) as f32;
        let explosion_rate = hauls / history.len() as f32;
        score += (explosion_rate * 100.0).min(40.0);
    }

    let underlying = (el.xg_per_90() + el.xa_per_90()) * 15.0;
    score += underlying.min(30.0);

    if !history.is_empty() {
        let form = recent_form(history, 6);
        if form.trend == FormTrend::Up {
            score += 25.0;
        } else if form.avg_points > 5.0 {
            score += 15.0;
        } else if form.trend == FormTrend::Stable {
            score += 10.0;
        }
    }

    score += match difficulty {
        0..=2 => 20.0,
        3 => 10.0,
        _ => 0.0,
    };

    score += (el.ict_index() / 8.0).min(15.0);

    if is_value_explosive {
        score += ((8.5 - price) * 5.0).max(0.0);
    }
    if is_differential {
        score += ((15.0 - ownership) * 1.5).max(0.0);
    }

    JokerScore {
        score: round1(score.min(100.0)),
        is_differential: true,
    }
}

/// Defensive contribution score (0-100) for GK/DEF: clean-sheet foundation
/// plus defensive work rate plus attacking upside.
pub fn defcon(el: &Element, difficulty: u8) -> f32 {
    if el.element_type != 1 && el.element_type != 2 {
        return 0.0;
    }
    let cs_prob = if difficulty > 0 {
        1.0 / difficulty as f32
    } else {
        0.2
    };
    let attacking_threat = el.xg_per_90() * 1.5 + el.xa_per_90() * 1.2;
    let score = cs_prob * 60.0 + el.defensive_per_90() * 4.0 + attacking_threat * 400.0;
    round1(score.min(100.0))
}

/// Categorizes a squad into the three captaincy tiers. Attacking tiers only
/// consider MID/FWD; the fun one is the best defensive prospect by defcon.
pub fn tier_captains(squad: &[SquadPlayer]) -> Recommendations {
    let weights = Some(ModelWeights {
        form_weight: 0.7,
        fdr_weight: 0.5,
        ict_weight: 0.3,
        model_type: MODEL_TYPE.to_string(),
    });

    if squad.is_empty() {
        return Recommendations {
            weights,
            ..Recommendations::default()
        };
    }

    let mut attacking: Vec<&SquadPlayer> = squad
        .iter()
        .filter(|p| (p.position == 3 || p.position == 4) && p.explosivity >= EXPLOSIVITY_FLOOR)
        .collect();
    if attacking.is_empty() {
        attacking = squad
            .iter()
            .filter(|p| p.position == 3 || p.position == 4)
            .collect();
    }

    let mut defensive: Vec<&SquadPlayer> = squad
        .iter()
        .filter(|p| (p.position == 1 || p.position == 2) && p.explosivity >= EXPLOSIVITY_FLOOR)
        .collect();
    if defensive.is_empty() {
        defensive = squad
            .iter()
            .filter(|p| p.position == 1 || p.position == 2)
            .collect();
    }

    attacking.sort_by(|a, b| {
        b.predicted_points
            .partial_cmp(&a.predicted_points)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let obvious = attacking.first().map(|p| CaptainPick {
        player: (*p).clone(),
        reason: format!(
            "The algorithm identifies {} as the most reliable pick with {} projected points.",
            p.web_name, p.predicted_points
        ),
    });

    let mut joker_pool: Vec<&SquadPlayer> = attacking
        .iter()
        .copied()
        .filter(|p| p.ownership < 15.0)
        .collect();
    joker_pool.sort_by(|a, b| {
        b.explosivity
            .partial_cmp(&a.explosivity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    if joker_pool.is_empty() {
        // Nobody under 15% owned; take the best relative differential.
        joker_pool = attacking.clone();
        joker_pool.sort_by(|a, b| {
            a.ownership
                .partial_cmp(&b.ownership)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(
                    b.explosivity
                        .partial_cmp(&a.explosivity)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        });
    }
    let joker = joker_pool.first().map(|p| {
        let reason = if p.ownership < 15.0 {
            format!(
                "{} offers high explosivity ({}) combined with low ownership ({}%), a classic differential.",
                p.web_name, p.explosivity, p.ownership
            )
        } else {
            format!(
                "{} is selected as the best relative differential ({}% ownership) with explosive potential.",
                p.web_name, p.ownership
            )
        };
        CaptainPick {
            player: (*p).clone(),
            reason,
        }
    });

    defensive.sort_by(|a, b| {
        b.defcon
            .partial_cmp(&a.defcon)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let fun_one = defensive.first().map(|p| {
        let reason = if p.defcon > 70.0 {
            format!(
                "Elite defcon level ({}): {} is picked for their massive clean sheet bonus and offensive participation.",
                p.defcon, p.web_name
            )
        } else {
            "The best defensive attacking prospect available, focusing on clean sheet security."
                .to_string()
        };
        CaptainPick {
            player: (*p).clone(),
            reason,
        }
    });

    Recommendations {
        obvious,
        joker,
        fun_one,
        weights,
    }
}

fn population_std(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f32>() / values.len() as f32;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / values.len() as f32;
    var.sqrt()
}

fn round1(v: f32) -> f32 {
    (v * 10.0).round() / 10.0
}
