//! Strategy parameters for the BNF buy-signal pipeline

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Tunable constants of the indicator adapter, detector and risk calculator.
///
/// Defaults reproduce the classic setup: EMA(25), RSI(14), MACD(12, 26, 9),
/// a 10% five-bar drop, a 20% gap below the EMA and a 1:3 risk/reward plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// EMA period (default: 25)
    pub ema_period: usize,
    /// RSI period (default: 14)
    pub rsi_period: usize,
    /// MACD fast EMA period (default: 12)
    pub macd_fast: usize,
    /// MACD slow EMA period (default: 26)
    pub macd_slow: usize,
    /// MACD signal line EMA period (default: 9)
    pub macd_signal: usize,
    /// First index the detector scans (default: 25)
    pub scan_start: usize,
    /// Bars back for the price-drop check (default: 5)
    pub drop_lookback: usize,
    /// Minimum fractional drop over `drop_lookback` bars (default: 0.10)
    pub drop_threshold: f64,
    /// Minimum fractional distance of close below the EMA (default: 0.20)
    pub distance_threshold: f64,
    /// RSI strictly below this is oversold (default: 30)
    pub rsi_oversold: f64,
    /// Prior bars searched for the stop-loss low (default: 10)
    pub stop_lookback: usize,
    /// Take-profit multiple of the stop distance (default: 3)
    pub risk_reward_ratio: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            ema_period: 25,
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            scan_start: 25,
            drop_lookback: 5,
            drop_threshold: 0.10,
            distance_threshold: 0.20,
            rsi_oversold: 30.0,
            stop_lookback: 10,
            risk_reward_ratio: 3.0,
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> EngineResult<()> {
        let periods = [
            ("ema_period", self.ema_period),
            ("rsi_period", self.rsi_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, p)| *p == 0) {
            return Err(EngineError::InvalidConfig(format!("{} must be > 0", name)));
        }
        if self.macd_fast >= self.macd_slow {
            return Err(EngineError::InvalidConfig(format!(
                "macd_fast ({}) must be below macd_slow ({})",
                self.macd_fast, self.macd_slow
            )));
        }
        // Detector reads index i - 1 for the MACD cross.
        if self.scan_start == 0 {
            return Err(EngineError::InvalidConfig("scan_start must be > 0".into()));
        }
        if !(self.risk_reward_ratio.is_finite() && self.risk_reward_ratio > 0.0) {
            return Err(EngineError::InvalidConfig(
                "risk_reward_ratio must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Leading bars before EMA produces a value
    pub fn ema_warmup(&self) -> usize {
        self.ema_period.saturating_sub(1)
    }

    /// Leading bars before RSI produces a value (needs `period` price changes)
    pub fn rsi_warmup(&self) -> usize {
        self.rsi_period
    }

    /// Leading bars before both the MACD line and its signal line exist
    pub fn macd_warmup(&self) -> usize {
        self.macd_slow.saturating_sub(1) + self.macd_signal.saturating_sub(1)
    }
}
