//! Stop-loss / take-profit plan for a detected signal
//!
//! Stop goes under the lowest low of the trailing window (signal bar included),
//! take-profit sits `risk_reward_ratio` stop-distances above the entry.

use serde::{Deserialize, Serialize};

use crate::config::StrategyConfig;
use crate::types::PriceBar;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskPlan {
    pub stop_loss: f64,
    pub take_profit: f64,
    pub risk_reward_ratio: f64,
}

impl RiskPlan {
    /// Entry minus stop; never negative for well-formed OHLC bars
    pub fn stop_distance(&self, entry: f64) -> f64 {
        entry - self.stop_loss
    }
}

/// Build the risk plan for a signal at `index`.
///
/// `index` must be inside `bars`.
pub fn compute_risk_plan(bars: &[PriceBar], index: usize, config: &StrategyConfig) -> RiskPlan {
    let start = index.saturating_sub(config.stop_lookback);
    let stop_loss = bars[start..=index]
        .iter()
        .map(|b| b.low)
        .fold(f64::INFINITY, f64::min);

    let entry = bars[index].close;
    let stop_distance = entry - stop_loss;
    let take_profit = entry + stop_distance * config.risk_reward_ratio;

    RiskPlan {
        stop_loss,
        take_profit,
        risk_reward_ratio: config.risk_reward_ratio,
    }
}
