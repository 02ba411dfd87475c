// src/impact/historical.rs
use serde::Serialize;

use crate::market::{round_to, AssetType};
use crate::tracker::TrackedEvent;

/// Horizon whose category means feed the historical aggregate.
pub const HISTORICAL_HORIZON: &str = "60m";

/// Mean category move across archived releases (0 when never observed).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistoricalStats {
    pub avg_equity_move: f64,
    pub avg_fx_move: f64,
    pub avg_bond_move: f64,
    pub avg_vol_move: f64,
    /// Events whose historical-horizon report had at least one category.
    pub events_considered: usize,
}

#[derive(Default)]
struct Mean {
    sum: f64,
    n: usize,
}

impl Mean {
    fn push(&mut self, x: f64) {
        self.sum += x;
        self.n += 1;
    }

    fn value(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            round_to(self.sum / self.n as f64, 2)
        }
    }
}

pub fn analyze_historical<'a, I>(events: I) -> HistoricalStats
where
    I: IntoIterator<Item = &'a TrackedEvent>,
{
    let (mut eq, mut fx, mut bond, mut vol) = (
        Mean::default(),
        Mean::default(),
        Mean::default(),
        Mean::default(),
    );
    let mut considered = 0usize;

    for ev in events {
        let Some(report) = ev.impacts.get(HISTORICAL_HORIZON) else {
            continue;
        };
        let cats = &report.category_impacts;
        if cats.is_empty() {
            continue;
        }
        considered += 1;
        for (category, acc) in [
            (AssetType::Equity, &mut eq),
            (AssetType::Fx, &mut fx),
            (AssetType::Bond, &mut bond),
            (AssetType::Volatility, &mut vol),
        ] {
            if let Some(c) = cats.get(&category) {
                acc.push(c.avg_percent_change);
            }
        }
    }

    HistoricalStats {
        avg_equity_move: eq.value(),
        avg_fx_move: fx.value(),
        avg_bond_move: bond.value(),
        avg_vol_move: vol.value(),
        events_considered: considered,
    }
}
