//! Types shared by the indicator adapter, detector and risk calculator

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single trading-period bar (OHLCV)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// An indicator aligned index-for-index with its price series.
///
/// `None` marks an index before the indicator's first valid computation.
pub type IndicatorSeries<T> = Vec<Option<T>>;

/// MACD line and signal line at one index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdPoint {
    pub macd: f64,
    pub signal: f64,
}

impl MacdPoint {
    pub fn new(macd: f64, signal: f64) -> Self {
        Self { macd, signal }
    }

    /// MACD minus signal. Derived on demand, never stored.
    pub fn histogram(&self) -> f64 {
        self.macd - self.signal
    }
}

/// The three indicator series consumed by the detector, each of length N
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignedIndicators {
    pub ema: IndicatorSeries<f64>,
    pub rsi: IndicatorSeries<f64>,
    pub macd: IndicatorSeries<MacdPoint>,
}

impl AlignedIndicators {
    /// MACD histogram at `index`, if both lines are defined there
    pub fn macd_histogram(&self, index: usize) -> Option<f64> {
        self.macd
            .get(index)
            .copied()
            .flatten()
            .map(|p| p.histogram())
    }
}

/// A detected buy opportunity with its risk plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub time: DateTime<Utc>,
    /// Entry price (close of the signal bar)
    pub price: f64,
    pub ema: f64,
    pub rsi: f64,
    pub macd_hist: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub risk_reward_ratio: f64,
}

/// Last-bar indicator readings, as shown next to the chart
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub ema: Option<f64>,
    pub rsi: Option<f64>,
    pub macd_hist: Option<f64>,
}
