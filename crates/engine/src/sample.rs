//! Synthetic daily price bars for demos and tests
//!
//! Random walk starting at 100 with one bar per day from 2024-01-01 UTC.
//! Prices are rounded to cents.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::PriceBar;

pub const DEFAULT_SAMPLE_DAYS: usize = 100;

const START_PRICE: f64 = 100.0;

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn sample_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Generate `days` bars from the given RNG
pub fn generate_sample_bars<R: Rng>(rng: &mut R, days: usize) -> Vec<PriceBar> {
    let start = sample_start();
    let mut base_price = START_PRICE;
    let mut bars = Vec::with_capacity(days);

    for day in 0..days {
        base_price += rng.gen_range(-2.5..2.5);

        let open = base_price;
        let close = base_price + rng.gen_range(-1.5..1.5);
        let high = open.max(close) + rng.gen_range(0.0..2.0);
        let low = open.min(close) - rng.gen_range(0.0..2.0);

        bars.push(PriceBar {
            time: start + Duration::days(day as i64),
            open: round_cents(open),
            high: round_cents(high),
            low: round_cents(low),
            close: round_cents(close),
            volume: rng.gen_range(100_000..1_100_000),
        });
    }

    bars
}

/// Reproducible sample series for a given seed
pub fn sample_bars(seed: u64, days: usize) -> Vec<PriceBar> {
    let mut rng = StdRng::seed_from_u64(seed);
    generate_sample_bars(&mut rng, days)
}
