//! Full pipeline: price bars → indicators → signals

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::StrategyConfig;
use crate::detector::detect_signals;
use crate::error::EngineResult;
use crate::indicators::compute_indicators;
use crate::types::{AlignedIndicators, IndicatorSnapshot, PriceBar, Signal};

/// Everything the chart and signal list need from one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub indicators: AlignedIndicators,
    pub signals: Vec<Signal>,
    pub latest: IndicatorSnapshot,
}

impl Analysis {
    /// Last `n` signals, newest first
    pub fn recent_signals(&self, n: usize) -> Vec<&Signal> {
        self.signals.iter().rev().take(n).collect()
    }
}

/// Readings at the final bar
pub fn latest_snapshot(indicators: &AlignedIndicators) -> IndicatorSnapshot {
    let last = |len: usize| len.checked_sub(1);
    IndicatorSnapshot {
        ema: last(indicators.ema.len()).and_then(|i| indicators.ema[i]),
        rsi: last(indicators.rsi.len()).and_then(|i| indicators.rsi[i]),
        macd_hist: last(indicators.macd.len()).and_then(|i| indicators.macd_histogram(i)),
    }
}

/// Run the adapter, detector and risk calculator over `bars`.
///
/// Pure: identical input always yields identical output.
pub fn analyze(bars: &[PriceBar], config: &StrategyConfig) -> EngineResult<Analysis> {
    let indicators = compute_indicators(bars, config)?;
    let signals = detect_signals(bars, &indicators, config)?;
    let latest = latest_snapshot(&indicators);

    info!(
        bars = bars.len(),
        signals = signals.len(),
        "Signal scan complete"
    );

    Ok(Analysis {
        indicators,
        signals,
        latest,
    })
}
