use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::state::{GwEvaluation, ModelStatus};

const TRACKER_FILE: &str = "prediction_history.json";
const TRACKER_VERSION: u32 = 1;

/// Consecutive non-positive-lift gameweeks before the model is flagged.
const FAILURE_STREAK_LIMIT: u32 = 5;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrackerData {
    version: u32,
    #[serde(default)]
    gameweeks: HashMap<String, GwRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GwRecord {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub evaluated: bool,
    #[serde(default)]
    pub predictions: Vec<GwPrediction>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GwPrediction {
    pub id: u32,
    #[serde(default)]
    pub web_name: String,
    #[serde(default)]
    pub predicted_points: f32,
    #[serde(default)]
    pub predicted_explosivity: f32,
    #[serde(default)]
    pub actual_points: Option<f32>,
}

/// Rolling record of what the model predicted per gameweek, evaluated once
/// actuals land. Backs the model-status feed.
#[derive(Debug)]
pub struct Tracker {
    path: PathBuf,
    data: TrackerData,
}

impl Tracker {
    pub fn open(dir: &Path) -> Self {
        let path = dir.join(TRACKER_FILE);
        let data = fs::read_to_string(&path)
            .ok()
            .and_then(|raw| serde_json::from_str::<TrackerData>(&raw).ok())
            .filter(|d| d.version == TRACKER_VERSION)
            .unwrap_or_default();
        Self { path, data }
    }

    pub fn save(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).ok();
        }
        let mut data = self.data.clone();
        data.version = TRACKER_VERSION;
        let json = serde_json::to_string_pretty(&data).context("serialize tracker")?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).context("write tracker")?;
        fs::rename(&tmp, &self.path).context("swap tracker")?;
        Ok(())
    }

    /// Stores a prediction snapshot for a gameweek. The first snapshot wins;
    /// later calls (possibly made after matches kicked off) are ignored.
    pub fn record_predictions(&mut self, gameweek: u32, predictions: Vec<GwPrediction>) -> bool {
        let key = gameweek.to_string();
        if self.data.gameweeks.contains_key(&key) {
            return false;
        }
        self.data.gameweeks.insert(
            key,
            GwRecord {
                timestamp: Utc::now().to_rfc3339(),
                evaluated: false,
                predictions,
            },
        );
        true
    }

    /// Backfills actual points for a tracked gameweek. Returns how many
    /// predictions were matched.
    pub fn apply_actuals(&mut self, gameweek: u32, actuals: &HashMap<u32, f32>) -> usize {
        let Some(record) = self.data.gameweeks.get_mut(&gameweek.to_string()) else {
            return 0;
        };
        let mut updated = 0;
        for p in &mut record.predictions {
            if let Some(actual) = actuals.get(&p.id) {
                p.actual_points = Some(*actual);
                updated += 1;
            }
        }
        if updated > 0 {
            record.evaluated = true;
        }
        updated
    }

    pub fn is_tracked(&self, gameweek: u32) -> bool {
        self.data.gameweeks.contains_key(&gameweek.to_string())
    }

    pub fn needs_actuals(&self, gameweek: u32) -> bool {
        self.data
            .gameweeks
            .get(&gameweek.to_string())
            .map(|r| !r.evaluated)
            .unwrap_or(false)
    }

    pub fn evaluate(&self) -> Option<ModelStatus> {
        evaluate_records(&self.data)
    }

    /// Realized share of the projected points for an evaluated gameweek,
    /// in percent.
    pub fn efficiency(&self, gameweek: u32) -> Option<f64> {
        let record = self.data.gameweeks.get(&gameweek.to_string())?;
        if !record.evaluated {
            return None;
        }
        let scored: Vec<&GwPrediction> = record
            .predictions
            .iter()
            .filter(|p| p.actual_points.is_some())
            .collect();
        let predicted: f64 = scored.iter().map(|p| p.predicted_points as f64).sum();
        if predicted <= 0.0 {
            return None;
        }
        let actual: f64 = scored
            .iter()
            .map(|p| p.actual_points.unwrap_or(0.0) as f64)
            .sum();
        Some((actual / predicted * 100.0 * 10.0).round() / 10.0)
    }
}

/// Scores every evaluated gameweek: did the five most explosive picks beat
/// the field, and how far off were the point projections.
pub fn evaluate_records(data: &TrackerData) -> Option<ModelStatus> {
    let mut results: Vec<GwEvaluation> = Vec::new();

    for (gw, record) in &data.gameweeks {
        if !record.evaluated {
            continue;
        }
        let Ok(gameweek) = gw.parse::<u32>() else {
            continue;
        };
        let valid: Vec<&GwPrediction> = record
            .predictions
            .iter()
            .filter(|p| p.actual_points.is_some())
            .collect();
        if valid.is_empty() {
            continue;
        }

        let mut by_explosivity = valid.clone();
        by_explosivity.sort_by(|a, b| {
            b.predicted_explosivity
                .partial_cmp(&a.predicted_explosivity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let top5: Vec<f32> = by_explosivity
            .iter()
            .take(5)
            .filter_map(|p| p.actual_points)
            .collect();
        let all: Vec<f32> = valid.iter().filter_map(|p| p.actual_points).collect();

        let top5_avg = mean(&top5);
        let overall_avg = mean(&all);
        let mse = valid
            .iter()
            .map(|p| {
                let err = p.predicted_points - p.actual_points.unwrap_or(0.0);
                err * err
            })
            .sum::<f32>()
            / valid.len() as f32;

        results.push(GwEvaluation {
            gameweek,
            top5_avg,
            overall_avg,
            lift: top5_avg - overall_avg,
            rmse: mse.sqrt(),
            success: top5_avg > overall_avg,
        });
    }

    if results.is_empty() {
        return None;
    }
    results.sort_by_key(|r| r.gameweek);

    let mut consecutive_failures = 0;
    for r in results.iter().rev() {
        if r.lift <= 0.0 {
            consecutive_failures += 1;
        } else {
            break;
        }
    }

    let status = if consecutive_failures >= FAILURE_STREAK_LIMIT {
        "Underperforming"
    } else {
        "Healthy"
    };

    let recent_start = results.len().saturating_sub(5);
    Some(ModelStatus {
        status: status.to_string(),
        consecutive_failures,
        recent_results: results[recent_start..].to_vec(),
    })
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prediction(id: u32, predicted: f32, explosivity: f32, actual: Option<f32>) -> GwPrediction {
        GwPrediction {
            id,
            web_name: format!("P{id}"),
            predicted_points: predicted,
            predicted_explosivity: explosivity,
            actual_points: actual,
        }
    }

    fn data_with(gameweeks: Vec<(u32, Vec<GwPrediction>)>) -> TrackerData {
        let mut data = TrackerData {
            version: TRACKER_VERSION,
            gameweeks: HashMap::new(),
        };
        for (gw, predictions) in gameweeks {
            let evaluated = predictions.iter().any(|p| p.actual_points.is_some());
            data.gameweeks.insert(
                gw.to_string(),
                GwRecord {
                    timestamp: String::new(),
                    evaluated,
                    predictions,
                },
            );
        }
        data
    }

    fn lift_gameweek(lift_positive: bool) -> Vec<GwPrediction> {
        // Six players; the five most explosive either beat or trail the field.
        let top_actual = if lift_positive { 8.0 } else { 2.0 };
        let mut preds: Vec<GwPrediction> = (1..=5)
            .map(|id| prediction(id, 6.0, 80.0, Some(top_actual)))
            .collect();
        preds.push(prediction(6, 4.0, 10.0, Some(5.0)));
        preds
    }

    #[test]
    fn unevaluated_history_has_no_status() {
        let data = data_with(vec![(7, vec![prediction(1, 5.0, 50.0, None)])]);
        assert!(evaluate_records(&data).is_none());
    }

    #[test]
    fn positive_lift_is_healthy() {
        let data = data_with(vec![(7, lift_gameweek(true))]);
        let status = evaluate_records(&data).unwrap();
        assert_eq!(status.status, "Healthy");
        assert_eq!(status.consecutive_failures, 0);
        assert_eq!(status.recent_results.len(), 1);
        assert!(status.recent_results[0].success);
        assert!(status.recent_results[0].lift > 0.0);
    }

    #[test]
    fn five_failures_flag_the_model() {
        let gws: Vec<(u32, Vec<GwPrediction>)> =
            (1..=5).map(|gw| (gw, lift_gameweek(false))).collect();
        let status = evaluate_records(&data_with(gws)).unwrap();
        assert_eq!(status.status, "Underperforming");
        assert_eq!(status.consecutive_failures, 5);
    }

    #[test]
    fn a_recovery_resets_the_streak() {
        let mut gws: Vec<(u32, Vec<GwPrediction>)> =
            (1..=4).map(|gw| (gw, lift_gameweek(false))).collect();
        gws.push((5, lift_gameweek(true)));
        let status = evaluate_records(&data_with(gws)).unwrap();
        assert_eq!(status.status, "Healthy");
        assert_eq!(status.consecutive_failures, 0);
    }

    #[test]
    fn recent_results_are_ordered_and_capped() {
        let gws: Vec<(u32, Vec<GwPrediction>)> =
            (1..=8).map(|gw| (gw, lift_gameweek(true))).collect();
        let status = evaluate_records(&data_with(gws)).unwrap();
        assert_eq!(status.recent_results.len(), 5);
        assert_eq!(status.recent_results.first().map(|r| r.gameweek), Some(4));
        assert_eq!(status.recent_results.last().map(|r| r.gameweek), Some(8));
    }

    #[test]
    fn rmse_measures_projection_error() {
        let data = data_with(vec![(
            3,
            vec![
                prediction(1, 6.0, 50.0, Some(2.0)),
                prediction(2, 4.0, 40.0, Some(8.0)),
            ],
        )]);
        let status = evaluate_records(&data).unwrap();
        assert_eq!(status.recent_results[0].rmse, 4.0);
    }

    #[test]
    fn first_snapshot_wins_and_actuals_mark_evaluated() {
        let dir = std::env::temp_dir().join("fpl_terminal_tracker_test");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        let mut tracker = Tracker::open(&dir);
        assert!(tracker.record_predictions(9, vec![prediction(1, 5.0, 60.0, None)]));
        assert!(!tracker.record_predictions(9, vec![prediction(2, 1.0, 1.0, None)]));
        assert!(tracker.needs_actuals(9));

        let actuals = HashMap::from([(1u32, 7.0f32)]);
        assert_eq!(tracker.apply_actuals(9, &actuals), 1);
        assert!(!tracker.needs_actuals(9));
        assert_eq!(tracker.efficiency(9), Some(140.0));

        tracker.save().unwrap();
        let reloaded = Tracker::open(&dir);
        assert!(reloaded.is_tracked(9));
        assert_eq!(reloaded.efficiency(9), Some(140.0));

        let _ = fs::remove_dir_all(&dir);
    }
}
