//! BNF buy-signal detector
//!
//! Scans aligned price/indicator series and emits a buy signal wherever four
//! conditions hold on the same bar:
//! 1. close fell at least 10% over the last 5 bars
//! 2. close sits at least 20% below EMA(25)
//! 3. RSI(14) is oversold (< 30)
//! 4. MACD histogram crossed from below 0 to above 0
//!
//! Undefined indicator values fail their condition; they are never errors.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::StrategyConfig;
use crate::error::{EngineError, EngineResult};
use crate::risk::compute_risk_plan;
use crate::types::{AlignedIndicators, PriceBar, Signal};

/// Outcome of the four buy conditions at one index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSet {
    pub price_dropped: bool,
    pub distance_check: bool,
    pub rsi_oversold: bool,
    pub macd_signal: bool,
}

impl ConditionSet {
    pub fn all(&self) -> bool {
        self.price_dropped && self.distance_check && self.rsi_oversold && self.macd_signal
    }
}

// ============================================================================
// Conditions
// ============================================================================

/// Close dropped by at least `drop_threshold` over `drop_lookback` bars.
///
/// Bars with less history than the lookback never qualify. With the default
/// scan floor (25) this guard cannot trigger.
pub fn price_dropped(bars: &[PriceBar], index: usize, config: &StrategyConfig) -> bool {
    if index < config.drop_lookback {
        return false;
    }
    let past = bars[index - config.drop_lookback].close;
    let current = bars[index].close;
    (past - current) / past >= config.drop_threshold
}

/// Fractional distance of `close` below `ema`; 0 when the EMA is undefined
pub fn ema_distance(ema: Option<f64>, close: f64) -> f64 {
    match ema {
        Some(ema) if ema != 0.0 => (ema - close) / ema,
        _ => 0.0,
    }
}

pub fn distance_check(ema: Option<f64>, close: f64, config: &StrategyConfig) -> bool {
    ema_distance(ema, close) >= config.distance_threshold
}

/// A defined RSI below the threshold. An RSI of exactly 0 is oversold.
pub fn rsi_oversold(rsi: Option<f64>, config: &StrategyConfig) -> bool {
    matches!(rsi, Some(v) if v < config.rsi_oversold)
}

/// Histogram at `index` is positive while the one before was negative.
pub fn macd_cross_up(indicators: &AlignedIndicators, index: usize) -> bool {
    let Some(prev_index) = index.checked_sub(1) else {
        return false;
    };
    match (
        indicators.macd_histogram(prev_index),
        indicators.macd_histogram(index),
    ) {
        (Some(prev), Some(current)) => prev < 0.0 && current > 0.0,
        _ => false,
    }
}

/// Evaluate all four conditions at `index` (must be inside `bars`).
pub fn evaluate_conditions(
    bars: &[PriceBar],
    indicators: &AlignedIndicators,
    index: usize,
    config: &StrategyConfig,
) -> ConditionSet {
    let close = bars[index].close;
    let ema = indicators.ema.get(index).copied().flatten();
    let rsi = indicators.rsi.get(index).copied().flatten();

    ConditionSet {
        price_dropped: price_dropped(bars, index, config),
        distance_check: distance_check(ema, close, config),
        rsi_oversold: rsi_oversold(rsi, config),
        macd_signal: macd_cross_up(indicators, index),
    }
}

fn check_lengths(expected: usize, indicators: &AlignedIndicators) -> EngineResult<()> {
    let lengths = [
        ("ema", indicators.ema.len()),
        ("rsi", indicators.rsi.len()),
        ("macd", indicators.macd.len()),
    ];
    for (series, actual) in lengths {
        if actual != expected {
            return Err(EngineError::LengthMismatch {
                series,
                expected,
                actual,
            });
        }
    }
    Ok(())
}

// ============================================================================
// Scan
// ============================================================================

/// Scan `scan_start..len` in ascending order, emitting at most one signal per bar.
pub fn detect_signals(
    bars: &[PriceBar],
    indicators: &AlignedIndicators,
    config: &StrategyConfig,
) -> EngineResult<Vec<Signal>> {
    check_lengths(bars.len(), indicators)?;

    let mut signals = Vec::new();

    for index in config.scan_start..bars.len() {
        let conditions = evaluate_conditions(bars, indicators, index, config);
        if !conditions.all() {
            continue;
        }

        // all() implies every indicator is defined here
        let (Some(ema), Some(rsi), Some(macd_hist)) = (
            indicators.ema[index],
            indicators.rsi[index],
            indicators.macd_histogram(index),
        ) else {
            continue;
        };

        let bar = &bars[index];
        let plan = compute_risk_plan(bars, index, config);

        debug!(
            index,
            time = %bar.time,
            price = bar.close,
            stop_loss = plan.stop_loss,
            take_profit = plan.take_profit,
            "Buy signal"
        );

        signals.push(Signal {
            time: bar.time,
            price: bar.close,
            ema,
            rsi,
            macd_hist,
            stop_loss: plan.stop_loss,
            take_profit: plan.take_profit,
            risk_reward_ratio: plan.risk_reward_ratio,
        });
    }

    Ok(signals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::compute_indicators;
    use crate::sample::sample_bars;
    use crate::types::MacdPoint;
    use chrono::{Duration, TimeZone, Utc};

    const SIGNAL_BAR: usize = 25;

    fn make_bars(closes: &[f64]) -> Vec<PriceBar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar {
                time: start + Duration::days(i as i64),
                open: c,
                high: c + 1.0,
                low: c - 1.0,
                close: c,
                volume: 100_000,
            })
            .collect()
    }

    /// 40 bars: flat at 100 through bar 20, down to 88 at bar 25, then flat.
    /// EMA 110 (25% above close), RSI 25, histogram -0.5 → +0.3 at bar 25.
    fn crash_scenario() -> (Vec<PriceBar>, AlignedIndicators) {
        let mut closes = vec![100.0; 40];
        for (k, close) in [97.6, 95.2, 92.8, 90.4, 88.0].into_iter().enumerate() {
            closes[21 + k] = close;
        }
        for close in closes.iter_mut().skip(26) {
            *close = 88.0;
        }
        let bars = make_bars(&closes);

        let mut ema = vec![None; 40];
        let mut rsi = vec![None; 40];
        let mut macd = vec![None; 40];
        for i in 24..40 {
            ema[i] = Some(closes[i] * 1.25);
        }
        for i in 14..40 {
            rsi[i] = Some(25.0);
        }
        for i in 20..40 {
            // positive histogram everywhere except bar 24
            macd[i] = Some(MacdPoint::new(0.5, 0.2));
        }
        macd[24] = Some(MacdPoint::new(-1.0, -0.5));
        macd[25] = Some(MacdPoint::new(-0.2, -0.5));

        (bars, AlignedIndicators { ema, rsi, macd })
    }

    #[test]
    fn test_crash_scenario_emits_one_signal() {
        let (bars, ind) = crash_scenario();
        let signals = detect_signals(&bars, &ind, &StrategyConfig::default()).unwrap();

        assert_eq!(signals.len(), 1);
        let signal = &signals[0];
        assert_eq!(signal.time, bars[SIGNAL_BAR].time);
        assert_eq!(signal.price, 88.0);
        assert_eq!(signal.ema, 110.0);
        assert_eq!(signal.rsi, 25.0);
        assert!((signal.macd_hist - 0.3).abs() < 1e-12);
        // lowest low over bars 15..=25 is 87 (bar 25)
        assert_eq!(signal.stop_loss, 87.0);
        assert_eq!(signal.take_profit, 91.0);
        assert_eq!(signal.risk_reward_ratio, 3.0);
    }

    #[test]
    fn test_rsi_not_oversold_emits_nothing() {
        let (bars, mut ind) = crash_scenario();
        ind.rsi[SIGNAL_BAR] = Some(35.0);
        let signals = detect_signals(&bars, &ind, &StrategyConfig::default()).unwrap();
        assert!(signals.is_empty());
    }

    /// Same crash shape as `crash_scenario`, five bars earlier and cut to 24 bars,
    /// so every condition holds at bar 20.
    fn early_crash() -> (Vec<PriceBar>, AlignedIndicators) {
        let mut closes = vec![100.0; 24];
        for (k, close) in [97.6, 95.2, 92.8, 90.4, 88.0].into_iter().enumerate() {
            closes[16 + k] = close;
        }
        for close in closes.iter_mut().skip(21) {
            *close = 88.0;
        }
        let bars = make_bars(&closes);

        let ema = closes.iter().map(|c| Some(c * 1.25)).collect();
        let rsi = vec![Some(25.0); 24];
        let mut macd = vec![Some(MacdPoint::new(0.5, 0.2)); 24];
        macd[19] = Some(MacdPoint::new(-1.0, -0.5));
        macd[20] = Some(MacdPoint::new(-0.2, -0.5));

        (bars, AlignedIndicators { ema, rsi, macd })
    }

    #[test]
    fn test_series_below_scan_floor_is_empty() {
        let (bars, ind) = early_crash();
        let config = StrategyConfig::default();

        assert!(evaluate_conditions(&bars, &ind, 20, &config).all());
        assert!(detect_signals(&bars, &ind, &config).unwrap().is_empty());

        // The same bar fires once the floor is lowered
        let lowered = StrategyConfig {
            scan_start: 5,
            ..Default::default()
        };
        let signals = detect_signals(&bars, &ind, &lowered).unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].time, bars[20].time);
    }

    #[test]
    fn test_undefined_ema_blocks_signal() {
        let (bars, mut ind) = crash_scenario();
        ind.ema[SIGNAL_BAR] = None;

        let config = StrategyConfig::default();
        let conditions = evaluate_conditions(&bars, &ind, SIGNAL_BAR, &config);
        assert!(conditions.price_dropped);
        assert!(!conditions.distance_check);
        assert!(conditions.rsi_oversold);
        assert!(conditions.macd_signal);

        assert!(detect_signals(&bars, &ind, &config).unwrap().is_empty());
    }

    #[test]
    fn test_undefined_rsi_blocks_signal() {
        let (bars, mut ind) = crash_scenario();
        ind.rsi[SIGNAL_BAR] = None;
        assert!(detect_signals(&bars, &ind, &StrategyConfig::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_zero_rsi_is_oversold() {
        let (bars, mut ind) = crash_scenario();
        ind.rsi[SIGNAL_BAR] = Some(0.0);
        let signals = detect_signals(&bars, &ind, &StrategyConfig::default()).unwrap();
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].rsi, 0.0);
    }

    #[test]
    fn test_histogram_from_exactly_zero_is_not_a_cross() {
        let (bars, mut ind) = crash_scenario();
        ind.macd[SIGNAL_BAR - 1] = Some(MacdPoint::new(-0.5, -0.5));
        assert!(!macd_cross_up(&ind, SIGNAL_BAR));
        assert!(detect_signals(&bars, &ind, &StrategyConfig::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_undefined_previous_macd_blocks_signal() {
        let (bars, mut ind) = crash_scenario();
        ind.macd[SIGNAL_BAR - 1] = None;
        assert!(!macd_cross_up(&ind, SIGNAL_BAR));
        assert!(detect_signals(&bars, &ind, &StrategyConfig::default())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_macd_cross_at_index_zero_is_false() {
        let (_, ind) = crash_scenario();
        assert!(!macd_cross_up(&ind, 0));
    }

    #[test]
    fn test_drop_guard_is_unreachable_with_default_floor() {
        let config = StrategyConfig::default();
        assert!(config.scan_start >= config.drop_lookback);

        // Guard still answers false on its own below the lookback
        let bars = make_bars(&[100.0, 50.0, 20.0, 10.0, 5.0, 1.0]);
        for i in 0..config.drop_lookback {
            assert!(!price_dropped(&bars, i, &config));
        }
        assert!(price_dropped(&bars, 5, &config));
    }

    #[test]
    fn test_distance_with_zero_ema_is_zero() {
        assert_eq!(ema_distance(Some(0.0), 10.0), 0.0);
        assert_eq!(ema_distance(None, 10.0), 0.0);
        assert!((ema_distance(Some(100.0), 80.0) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_length_mismatch_is_rejected() {
        let (bars, mut ind) = crash_scenario();
        ind.rsi.pop();
        let err = detect_signals(&bars, &ind, &StrategyConfig::default()).unwrap_err();
        assert_eq!(
            err,
            EngineError::LengthMismatch {
                series: "rsi",
                expected: 40,
                actual: 39,
            }
        );
    }

    #[test]
    fn test_signals_are_chronological() {
        let (bars, mut ind) = crash_scenario();
        // Second crash leg: another 10% drop into bar 35 with a fresh cross
        let mut bars = bars;
        for (k, close) in [86.0, 84.0, 82.0, 80.0, 78.0].into_iter().enumerate() {
            bars[31 + k].close = close;
            bars[31 + k].low = close - 1.0;
            ind.ema[31 + k] = Some(close * 1.3);
        }
        ind.macd[34] = Some(MacdPoint::new(-1.0, 0.0));
        ind.macd[35] = Some(MacdPoint::new(1.0, 0.0));

        let signals = detect_signals(&bars, &ind, &StrategyConfig::default()).unwrap();
        assert_eq!(signals.len(), 2);
        assert_eq!(signals[0].time, bars[25].time);
        assert_eq!(signals[1].time, bars[35].time);
    }

    /// 30 bars flat at 150, 70 steps of -1.5 down to 45, then one flat bar.
    ///
    /// The histogram creeps up towards 0 through the steady decline and turns
    /// positive on the pause at bar 100, while the 5-bar drop is still ~12%.
    fn steady_decline_then_pause() -> Vec<PriceBar> {
        let mut closes = vec![150.0; 30];
        for _ in 0..70 {
            let next = closes[closes.len() - 1] - 1.5;
            closes.push(next);
        }
        closes.push(45.0);
        make_bars(&closes)
    }

    #[test]
    fn test_computed_indicators_fire_after_steady_decline() {
        let config = StrategyConfig::default();
        let bars = steady_decline_then_pause();
        let ind = compute_indicators(&bars, &config).unwrap();

        let hist_before = ind.macd_histogram(99).unwrap();
        let hist_at = ind.macd_histogram(100).unwrap();
        assert!(hist_before < 0.0, "hist[99] = {}", hist_before);
        assert!(hist_at > 0.0, "hist[100] = {}", hist_at);

        let signals = detect_signals(&bars, &ind, &config).unwrap();
        assert_eq!(signals.len(), 1);

        let signal = &signals[0];
        assert_eq!(signal.time, bars[100].time);
        assert_eq!(signal.price, 45.0);
        assert!(signal.rsi < 30.0);
        assert!(ema_distance(Some(signal.ema), signal.price) >= 0.20);
        // lowest low over bars 90..=100 is 44 (bars 99 and 100)
        assert_eq!(signal.stop_loss, 44.0);
        assert_eq!(signal.take_profit, 48.0);
    }

    #[test]
    fn test_signals_match_recomputed_conditions() {
        let config = StrategyConfig::default();
        let (crash_bars, crash_ind) = crash_scenario();
        let decline_bars = steady_decline_then_pause();
        let decline_ind = compute_indicators(&decline_bars, &config).unwrap();
        let mut cases = vec![(crash_bars, crash_ind), (decline_bars, decline_ind)];
        for seed in 0..50 {
            let bars = sample_bars(seed, 120);
            let ind = compute_indicators(&bars, &config).unwrap();
            cases.push((bars, ind));
        }

        let mut total = 0;
        for (bars, ind) in &cases {
            let signals = detect_signals(bars, ind, &config).unwrap();
            total += signals.len();

            let expected: Vec<usize> = (0..bars.len())
                .filter(|&i| i >= config.scan_start)
                .filter(|&i| evaluate_conditions(bars, ind, i, &config).all())
                .collect();
            assert_eq!(signals.len(), expected.len());

            for (signal, &index) in signals.iter().zip(&expected) {
                assert!(index >= 25);
                assert_eq!(signal.time, bars[index].time);
                assert!(signal.stop_loss <= signal.price);
                assert_eq!(
                    signal.take_profit,
                    signal.price + 3.0 * (signal.price - signal.stop_loss)
                );
            }
        }
        assert!(total >= 2);
    }
}
