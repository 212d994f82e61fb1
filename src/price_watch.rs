use crate::fpl_api::HistoryRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferTrend {
    Rising,
    Falling,
    Stable,
}

impl TransferTrend {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferTrend::Rising => "rising",
            TransferTrend::Falling => "falling",
            TransferTrend::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PriceTrend {
    pub probability: f32,
    pub net_transfers: i64,
    pub trend: TransferTrend,
}

impl Default for PriceTrend {
    fn default() -> Self {
        Self {
            probability: 0.0,
            net_transfers: 0,
            trend: TransferTrend::Stable,
        }
    }
}

/// Price-rise likelihood from net transfers over the last three gameweeks.
/// Sustained positive volume maps onto stepped probability bands.
pub fn price_rise(history: &[HistoryRow]) -> PriceTrend {
    if history.len() < 3 {
        return PriceTrend::default();
    }

    let recent = &history[history.len() - 3..];
    let nets: Vec<i64> = recent
        .iter()
        .map(|m| m.transfers_in - m.transfers_out)
        .collect();
    let total: i64 = nets.iter().sum();

    let trend = if nets.iter().all(|n| *n > 0) {
        TransferTrend::Rising
    } else if nets.iter().all(|n| *n < 0) {
        TransferTrend::Falling
    } else {
        TransferTrend::Stable
    };

    let probability = if total > 100_000 {
        80.0
    } else if total > 50_000 {
        60.0
    } else if total > 20_000 {
        40.0
    } else if total > 0 {
        20.0
    } else {
        0.0
    };

    PriceTrend {
        probability,
        net_transfers: total,
        trend,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(nets: &[i64]) -> Vec<HistoryRow> {
        nets.iter()
            .map(|&n| HistoryRow {
                transfers_in: n.max(0),
                transfers_out: (-n).max(0),
                ..HistoryRow::default()
            })
            .collect()
    }

    #[test]
    fn short_history_is_stable() {
        let trend = price_rise(&rows(&[50_000, 60_000]));
        assert_eq!(trend.probability, 0.0);
        assert_eq!(trend.trend, TransferTrend::Stable);
    }

    #[test]
    fn sustained_inflows_rise() {
        let trend = price_rise(&rows(&[40_000, 35_000, 45_000]));
        assert_eq!(trend.trend, TransferTrend::Rising);
        assert_eq!(trend.probability, 80.0);
        assert_eq!(trend.net_transfers, 120_000);
    }

    #[test]
    fn sustained_outflows_fall() {
        let trend = price_rise(&rows(&[-30_000, -10_000, -5_000]));
        assert_eq!(trend.trend, TransferTrend::Falling);
        assert_eq!(trend.probability, 0.0);
    }

    #[test]
    fn mixed_signs_are_stable_but_can_still_rise() {
        let trend = price_rise(&rows(&[60_000, -5_000, 10_000]));
        assert_eq!(trend.trend, TransferTrend::Stable);
        assert_eq!(trend.probability, 60.0);
    }

    #[test]
    fn only_last_three_rows_count() {
        let trend = price_rise(&rows(&[1_000_000, 5_000, 5_000, 5_000]));
        assert_eq!(trend.net_transfers, 15_000);
        assert_eq!(trend.probability, 20.0);
    }
}
