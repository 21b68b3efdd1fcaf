//! Indicator adapter
//!
//! Runs EMA, RSI and MACD over a close series, drops each indicator's
//! warm-up outputs, then left-pads the remainder with `None` so every series
//! lines up index-for-index with the price bars.
//!
//! Every EMA here is seeded with the simple average of its first `period`
//! inputs and RSI uses Wilder smoothing (`α = 1 / period`). Both seeds are
//! `ta`'s `SimpleMovingAverage`; the smoothing steps are streamed through
//! `ta::Next`.

use ta::indicators::SimpleMovingAverage;
use ta::Next;
use tracing::debug;

use crate::config::StrategyConfig;
use crate::error::{EngineError, EngineResult};
use crate::types::{AlignedIndicators, IndicatorSeries, MacdPoint, PriceBar};

// ============================================================================
// Alignment
// ============================================================================

/// Pad `raw` on the left with `None` up to `len` entries.
///
/// `raw` must not be longer than `len`; every raw value keeps its order.
pub fn left_pad<T>(raw: Vec<T>, len: usize) -> IndicatorSeries<T> {
    debug_assert!(raw.len() <= len, "raw indicator longer than price series");
    let pad = len.saturating_sub(raw.len());
    let mut out = Vec::with_capacity(pad + raw.len());
    out.extend(std::iter::repeat_with(|| None).take(pad));
    out.extend(raw.into_iter().map(Some));
    out
}

fn invalid_period(name: &str, period: usize) -> EngineError {
    EngineError::InvalidConfig(format!("{} period {} rejected by indicator", name, period))
}

// ============================================================================
// Streaming indicators
// ============================================================================

/// EMA with `α = 2 / (period + 1)`, seeded by the SMA of the first `period` inputs.
///
/// Yields `None` until the seed is complete.
#[derive(Debug, Clone)]
struct SeededEma {
    period: usize,
    alpha: f64,
    seed: SimpleMovingAverage,
    seen: usize,
    current: Option<f64>,
}

impl SeededEma {
    fn new(name: &str, period: usize) -> EngineResult<Self> {
        let seed = SimpleMovingAverage::new(period).map_err(|_| invalid_period(name, period))?;
        Ok(Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            seed,
            seen: 0,
            current: None,
        })
    }
}

impl Next<f64> for SeededEma {
    type Output = Option<f64>;

    fn next(&mut self, input: f64) -> Option<f64> {
        match self.current {
            Some(prev) => self.current = Some(self.alpha.mul_add(input - prev, prev)),
            None => {
                let mean = self.seed.next(input);
                self.seen += 1;
                if self.seen == self.period {
                    self.current = Some(mean);
                }
            }
        }
        self.current
    }
}

/// Wilder RSI over closes.
///
/// The first value needs `period` price changes (`period + 1` closes); it
/// uses plain averages of those changes. After that:
///
/// ```text
/// avg = (prev_avg × (period − 1) + x) / period
/// RSI = 100 × avg_gain / (avg_gain + avg_loss)
/// ```
#[derive(Debug, Clone)]
struct WilderRsi {
    period: f64,
    seed_len: usize,
    gain_seed: SimpleMovingAverage,
    loss_seed: SimpleMovingAverage,
    seen: usize,
    prev_close: Option<f64>,
    averages: Option<(f64, f64)>,
}

impl WilderRsi {
    fn new(period: usize) -> EngineResult<Self> {
        let seed = || SimpleMovingAverage::new(period).map_err(|_| invalid_period("RSI", period));
        Ok(Self {
            period: period as f64,
            seed_len: period,
            gain_seed: seed()?,
            loss_seed: seed()?,
            seen: 0,
            prev_close: None,
            averages: None,
        })
    }

    fn from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
        let sum = avg_gain + avg_loss;
        if sum == 0.0 {
            50.0
        } else {
            100.0 * avg_gain / sum
        }
    }
}

impl Next<f64> for WilderRsi {
    type Output = Option<f64>;

    fn next(&mut self, close: f64) -> Option<f64> {
        let prev = self.prev_close.replace(close)?;
        let change = close - prev;
        let (gain, loss) = (change.max(0.0), (-change).max(0.0));

        let (avg_gain, avg_loss) = match self.averages {
            Some((g, l)) => (
                g.mul_add(self.period - 1.0, gain) / self.period,
                l.mul_add(self.period - 1.0, loss) / self.period,
            ),
            None => {
                let g = self.gain_seed.next(gain);
                let l = self.loss_seed.next(loss);
                self.seen += 1;
                if self.seen < self.seed_len {
                    return None;
                }
                (g, l)
            }
        };

        self.averages = Some((avg_gain, avg_loss));
        Some(Self::from_averages(avg_gain, avg_loss))
    }
}

// ============================================================================
// Raw indicator outputs (warm-up already dropped)
// ============================================================================

/// EMA values from the first bar with a full `period` of history
pub fn ema_raw(closes: &[f64], period: usize) -> EngineResult<Vec<f64>> {
    let mut ema = SeededEma::new("EMA", period)?;
    Ok(closes.iter().filter_map(|&close| ema.next(close)).collect())
}

/// RSI values from the first bar with `period` price changes behind it
pub fn rsi_raw(closes: &[f64], period: usize) -> EngineResult<Vec<f64>> {
    let mut rsi = WilderRsi::new(period)?;
    Ok(closes.iter().filter_map(|&close| rsi.next(close)).collect())
}

/// MACD line + signal line, from the first bar where both are warmed up
///
/// The MACD line starts once the slow EMA is seeded; the signal line is a
/// seeded EMA of the MACD line.
pub fn macd_raw(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> EngineResult<Vec<MacdPoint>> {
    let mut fast_ema = SeededEma::new("MACD fast", fast)?;
    let mut slow_ema = SeededEma::new("MACD slow", slow)?;
    let mut signal_ema = SeededEma::new("MACD signal", signal)?;

    Ok(closes
        .iter()
        .filter_map(|&close| {
            let fast_value = fast_ema.next(close);
            let slow_value = slow_ema.next(close);
            let line = fast_value? - slow_value?;
            Some(MacdPoint::new(line, signal_ema.next(line)?))
        })
        .collect())
}

// ============================================================================
// Adapter entry point
// ============================================================================

/// Compute EMA, RSI and MACD for `bars`, each aligned to `bars.len()`.
///
/// Rejects an empty series here so the detector never has to.
pub fn compute_indicators(
    bars: &[PriceBar],
    config: &StrategyConfig,
) -> EngineResult<AlignedIndicators> {
    if bars.is_empty() {
        return Err(EngineError::EmptySeries);
    }
    config.validate()?;

    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    let n = closes.len();

    let ema = ema_raw(&closes, config.ema_period)?;
    let rsi = rsi_raw(&closes, config.rsi_period)?;
    let macd = macd_raw(
        &closes,
        config.macd_fast,
        config.macd_slow,
        config.macd_signal,
    )?;

    debug!(
        bars = n,
        ema = ema.len(),
        rsi = rsi.len(),
        macd = macd.len(),
        "Computed raw indicators"
    );

    Ok(AlignedIndicators {
        ema: left_pad(ema, n),
        rsi: left_pad(rsi, n),
        macd: left_pad(macd, n),
    })
}
