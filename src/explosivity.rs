use crate::fpl_api::{Element, HistoryRow};

/// A haul is a double-digit gameweek.
pub const HAUL_POINTS: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormTrend {
    Up,
    Down,
    Stable,
}

impl FormTrend {
    pub fn as_str(self) -> &'static str {
        match self {
            FormTrend::Up => "up",
            FormTrend::Down => "down",
            FormTrend::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecentForm {
    pub avg_points: f32,
    pub minutes: Vec<u32>,
    pub trend: FormTrend,
    pub consistency: f32,
    pub matches: usize,
}

/// Averages, spread and trend over the last `num_matches` history rows.
/// Trend compares the halves of the window at +-20%.
pub fn recent_form(history: &[HistoryRow], num_matches: usize) -> RecentForm {
    if history.is_empty() || num_matches == 0 {
        return RecentForm {
            avg_points: 0.0,
            minutes: Vec::new(),
            trend: FormTrend::Stable,
            consistency: 0.0,
            matches: 0,
        };
    }

    let start = history.len().saturating_sub(num_matches);
    let recent = &history[start..];
    let points: Vec<f32> = recent.iter().map(|m| m.total_points as f32).collect();
    let minutes: Vec<u32> = recent.iter().map(|m| m.minutes).collect();

    let avg = mean(&points);
    let consistency = if points.len() > 1 { std_dev(&points) } else { 0.0 };

    let trend = if points.len() >= 4 {
        let mid = points.len() / 2;
        let first = mean(&points[..mid]);
        let second = mean(&points[mid..]);
        if second > first * 1.2 {
            FormTrend::Up
        } else if second < first * 0.8 {
            FormTrend::Down
        } else {
            FormTrend::Stable
        }
    } else {
        FormTrend::Stable
    };

    RecentForm {
        avg_points: round2(avg),
        minutes,
        trend,
        consistency: round2(consistency),
        matches: recent.len(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RiskBand {
    Low,
    Medium,
    High,
}

impl RiskBand {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskBand::Low => "low",
            RiskBand::Medium => "medium",
            RiskBand::High => "high",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RotationRisk {
    pub starting_probability: f32,
    pub min_70_probability: f32,
    pub risk: RiskBand,
    pub avg_minutes: f32,
}

/// Rotation exposure from recent minutes. 85+ minutes counts as a start.
pub fn rotation_risk(minutes: &[u32]) -> RotationRisk {
    if minutes.is_empty() {
        return RotationRisk {
            starting_probability: 0.0,
            min_70_probability: 0.0,
            risk: RiskBand::High,
            avg_minutes: 0.0,
        };
    }

    let avg = minutes.iter().sum::<u32>() as f32 / minutes.len() as f32;
    let starts = minutes.iter().filter(|m| **m >= 85).count() as f32;
    let seventy = minutes.iter().filter(|m| **m >= 70).count() as f32;
    let starting_prob = starts / minutes.len() as f32 * 100.0;
    let min_70_prob = seventy / minutes.len() as f32 * 100.0;

    let risk = if avg >= 75.0 && starting_prob >= 70.0 {
        RiskBand::Low
    } else if avg >= 50.0 && starting_prob >= 40.0 {
        RiskBand::Medium
    } else {
        RiskBand::High
    };

    RotationRisk {
        starting_probability: round1(starting_prob),
        min_70_probability: round1(min_70_prob),
        risk,
        avg_minutes: round1(avg),
    }
}

pub fn count_hauls(history: &[HistoryRow]) -> u32 {
    history
        .iter()
        .filter(|m| m.total_points >= HAUL_POINTS)
        .count() as u32
}

/// Beta prior on the per-gameweek haul rate, by position. Attackers haul far
/// more often than keepers, so their prior mass sits higher.
fn haul_prior(position: u8) -> (f64, f64) {
    match position {
        1 => (0.5, 9.5),
        2 => (1.0, 9.0),
        3 => (2.5, 7.5),
        4 => (3.5, 6.5),
        _ => (1.0, 9.0),
    }
}

/// Posterior haul probability and its uncertainty after updating the
/// positional prior with this season's hauls.
pub fn haul_posterior(position: u8, history: &[HistoryRow]) -> (f64, f64, u32) {
    let (alpha, beta) = haul_prior(position);
    let hauls = count_hauls(history);
    let non_hauls = history.len() as u32 - hauls;

    let a = alpha + hauls as f64;
    let b = beta + non_hauls as f64;
    let prob = a / (a + b);
    let uncertainty = (a * b / ((a + b).powi(2) * (a + b + 1.0))).sqrt();
    (prob, uncertainty, hauls)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Explosivity {
    pub index: f32,
    pub haul_probability: f32,
    pub hauls: u32,
}

/// Bayesian explosivity index (0-100): haul posterior blended with
/// position-specific underlying output, decayed recent form, team reliance
/// and the next fixture. `starters` is the 60+ minute benchmark pool.
pub fn explosivity_index(
    el: &Element,
    history: &[HistoryRow],
    starters: &[&Element],
    difficulty: u8,
) -> Explosivity {
    let (haul_prob, uncertainty, hauls) = haul_posterior(el.element_type, history);

    let underlying = underlying_score(el, history, starters);
    let form = decayed_form_score(history);
    let reliance = team_reliance(el, starters);
    let fix_mult = fixture_haul_multiplier(difficulty);

    let base = haul_prob * 100.0 * 0.35 + underlying * 0.30 + form * 0.25 + reliance * 0.10;
    let adjusted = base * fix_mult;
    let index = (adjusted + uncertainty * 40.0).min(100.0);

    Explosivity {
        index: round1(index as f32),
        haul_probability: round1((haul_prob * 100.0) as f32),
        hauls,
    }
}

fn underlying_score(el: &Element, history: &[HistoryRow], starters: &[&Element]) -> f64 {
    match el.element_type {
        2 => {
            // Defenders: clean sheets first, then attacking returns, general
            // bonus threat, and a work-rate bonus for 10+ defensive actions.
            let xgc = el.xgc_per_90().unwrap_or(1.5) as f64;
            let clean_sheet = ((2.0 - xgc) / 2.0 * 100.0).clamp(0.0, 100.0);
            let attacking = ((el.xg_per_90() + el.xa_per_90()) as f64 * 80.0).min(100.0);
            let bps = (el.ict_index() as f64 / 10.0).min(100.0);

            let mut def_bonus: f64 = 0.0;
            let start = history.len().saturating_sub(5);
            for row in &history[start..] {
                if row.defensive_actions() >= 10 {
                    def_bonus += 20.0;
                }
            }

            let mut score = clean_sheet * 0.40
                + attacking * 0.30
                + bps * 0.20
                + def_bonus.min(100.0) * 0.10;
            if def_bonus > 0.0 {
                score += def_bonus * 0.5;
            }
            score.min(100.0)
        }
        1 => {
            let xgc = el.xgc_per_90().unwrap_or(1.5) as f64;
            let clean_sheet = ((2.0 - xgc) / 2.0 * 100.0).clamp(0.0, 100.0);
            let saves = (el.ict_index() as f64 / 8.0).min(100.0);
            clean_sheet * 0.70 + saves * 0.30
        }
        _ => {
            // Attackers: xGI percentile among starters of the same position.
            let combined = (el.xg_per_90() + el.xa_per_90()) as f64;
            let pool: Vec<f64> = starters
                .iter()
                .filter(|p| p.element_type == el.element_type)
                .map(|p| (p.xg_per_90() + p.xa_per_90()) as f64)
                .collect();
            if pool.is_empty() {
                return 50.0;
            }
            let below = pool.iter().filter(|v| **v < combined).count();
            below as f64 / pool.len() as f64 * 100.0
        }
    }
}

/// Last five gameweeks, most recent weighted heaviest, scaled so a 15-point
/// average saturates the score.
fn decayed_form_score(history: &[HistoryRow]) -> f64 {
    let points: Vec<f64> = history
        .iter()
        .rev()
        .take(5)
        .map(|m| m.total_points as f64)
        .collect();
    if points.is_empty() {
        return 50.0;
    }

    let mut weighted = 0.0;
    let mut weight_sum = 0.0;
    for (k, p) in points.iter().enumerate() {
        let w = (-0.3 * k as f64).exp();
        weighted += w * p;
        weight_sum += w;
    }
    ((weighted / weight_sum) / 15.0 * 100.0).min(100.0)
}

fn fixture_haul_multiplier(difficulty: u8) -> f64 {
    match difficulty {
        1 => 1.4,
        2 => 1.2,
        3 => 1.0,
        4 => 0.85,
        5 => 0.7,
        _ => 1.0,
    }
}

/// Share of the club's total ICT this player carries, capped at 30.
fn team_reliance(el: &Element, starters: &[&Element]) -> f64 {
    let team_ict: f64 = starters
        .iter()
        .filter(|p| p.team == el.team)
        .map(|p| p.ict_index() as f64)
        .sum();
    if team_ict <= 0.0 {
        return 0.0;
    }
    (el.ict_index() as f64 / team_ict * 300.0).min(30.0)
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

fn std_dev(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f32>() / values.len() as f32;
    var.sqrt()
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

    fn rows(points: &[i32]) -> Vec<HistoryRow> {
        points
            .iter()
            .enumerate()
            .map(|(i, p)| HistoryRow {
                round: i as u32 + 1,
                total_points: *p,
                minutes: 90,
                ..HistoryRow::default()
            })
            .collect()
    }

    #[test]
    fn empty_history_is_stable_and_scoreless() {
        let form = recent_form(&[], 6);
        assert_eq!(form.matches, 0);
        assert_eq!(form.avg_points, 0.0);
        assert_eq!(form.trend, FormTrend::Stable);
    }

    #[test]
    fn improving_run_trends_up() {
        let history = rows(&[1, 2, 8, 9]);
        let form = recent_form(&history, 6);
        assert_eq!(form.trend, FormTrend::Up);

        let fading = rows(&[9, 8, 2, 1]);
        assert_eq!(recent_form(&fading, 6).trend, FormTrend::Down);
    }

    #[test]
    fn recent_form_uses_only_the_window() {
        let history = rows(&[0, 0, 0, 0, 6, 6]);
        let form = recent_form(&history, 2);
        assert_eq!(form.matches, 2);
        assert_eq!(form.avg_points, 6.0);
    }

    #[test]
    fn rotation_bands_follow_minutes() {
        let nailed = rotation_risk(&[90, 90, 88, 90, 85]);
        assert_eq!(nailed.risk, RiskBand::Low);
        assert_eq!(nailed.starting_probability, 100.0);

        let fringe = rotation_risk(&[10, 0, 25, 15]);
        assert_eq!(fringe.risk, RiskBand::High);

        assert_eq!(rotation_risk(&[]).risk, RiskBand::High);
    }

    #[test]
    fn haul_posterior_moves_with_evidence() {
        let quiet = rows(&[2, 3, 1, 4, 2, 3, 2, 1]);
        let (p_quiet, _, hauls_quiet) = haul_posterior(4, &quiet);
        assert_eq!(hauls_quiet, 0);

        let explosive = rows(&[12, 3, 15, 4, 11, 3, 13, 2]);
        let (p_explosive, _, hauls) = haul_posterior(4, &explosive);
        assert_eq!(hauls, 4);
        assert!(p_explosive > p_quiet);

        // Same evidence, attacker prior sits above keeper prior.
        let (p_fwd, _, _) = haul_posterior(4, &quiet);
        let (p_gk, _, _) = haul_posterior(1, &quiet);
        assert!(p_fwd > p_gk);
    }

    #[test]
    fn explosivity_rewards_haulers_and_fixtures() {
        let hauler = Element {
            id: 1,
            element_type: 4,
            team: 1,
            expected_goals_per_90: Some("0.7".to_string()),
            expected_assists_per_90: Some("0.3".to_string()),
            ict_index: Some("250.0".to_string()),
            ..Element::default()
        };
        let passenger = Element {
            id: 2,
            element_type: 4,
            team: 1,
            expected_goals_per_90: Some("0.1".to_string()),
            expected_assists_per_90: Some("0.1".to_string()),
            ict_index: Some("40.0".to_string()),
            ..Element::default()
        };
        let starters: Vec<&Element> = vec![&hauler, &passenger];

        let hot = explosivity_index(&hauler, &rows(&[12, 6, 15, 8, 11]), &starters, 2);
        let cold = explosivity_index(&passenger, &rows(&[1, 2, 0, 2, 1]), &starters, 2);
        assert!(hot.index > cold.index);
        assert!(hot.haul_probability > cold.haul_probability);
        assert_eq!(hot.hauls, 3);
        assert!(hot.index <= 100.0);

        // A brutal fixture drags the same profile down.
        let hard = explosivity_index(&hauler, &rows(&[12, 6, 15, 8, 11]), &starters, 5);
        assert!(hard.index < hot.index);
    }
}
