//! Binance public API client for price bars (no authentication required)

use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::types::PriceBar;

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";
const MAX_KLINES_PER_REQUEST: u32 = 1000;
/// Upper bound on requests made by one paginated fetch
pub const DEFAULT_MAX_PAGES: usize = 20;

/// Binance public market data client
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    max_pages: usize,
}

/// Raw kline data from Binance API (array of arrays)
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct RawKline(
    i64,    // 0: Open time
    String, // 1: Open
    String, // 2: High
    String, // 3: Low
    String, // 4: Close
    String, // 5: Volume
    i64,    // 6: Close time
    String, // 7: Quote asset volume
    u64,    // 8: Number of trades
    String, // 9: Taker buy base
    String, // 10: Taker buy quote
    String, // 11: Ignore
);

impl RawKline {
    /// `None` if any price field fails to parse
    fn into_price_bar(self) -> Option<PriceBar> {
        let volume: f64 = self.5.parse().ok()?;
        Some(PriceBar {
            time: DateTime::<Utc>::from_timestamp_millis(self.0)?,
            open: self.1.parse().ok()?,
            high: self.2.parse().ok()?,
            low: self.3.parse().ok()?,
            close: self.4.parse().ok()?,
            volume: volume.max(0.0).round() as u64,
        })
    }
}

impl BinanceClient {
    /// Client against the public Binance endpoint
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_pages: DEFAULT_MAX_PAGES,
        })
    }

    /// Limit paginated fetches to `max_pages` requests (at least one)
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch price bars for a symbol, oldest first
    pub async fn get_bars(
        &self,
        symbol: &str,
        interval: &str,
        start_time: Option<i64>,
        end_time: Option<i64>,
        limit: Option<u32>,
    ) -> Result<Vec<PriceBar>> {
        let mut url = format!(
            "{}/api/v3/klines?symbol={}&interval={}",
            self.base_url, symbol, interval
        );

        if let Some(start) = start_time {
            url.push_str(&format!("&startTime={}", start));
        }
        if let Some(end) = end_time {
            url.push_str(&format!("&endTime={}", end));
        }

        let limit = limit.unwrap_or(500).min(MAX_KLINES_PER_REQUEST);
        url.push_str(&format!("&limit={}", limit));

        debug!(symbol, interval, "Fetching klines from Binance");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Binance API error {}: {}", status, body);
        }

        let raw_klines: Vec<RawKline> = response.json().await?;
        let bars = convert_klines(raw_klines);

        debug!(count = bars.len(), "Fetched price bars");
        Ok(bars)
    }

    /// Fetch bars with automatic pagination for ranges > 1000 bars.
    ///
    /// Stops after `max_pages` requests; the result is then truncated at the
    /// last fetched bar.
    pub async fn get_bars_paginated(
        &self,
        symbol: &str,
        interval: &str,
        start_time: i64,
        end_time: i64,
    ) -> Result<Vec<PriceBar>> {
        let mut all_bars: Vec<PriceBar> = Vec::new();
        let mut current_start = start_time;

        info!(symbol, interval, "Fetching paginated klines from Binance");

        let mut pages = 0;
        while current_start < end_time {
            if pages == self.max_pages {
                warn!(
                    pages,
                    fetched = all_bars.len(),
                    "Page limit reached, kline range truncated"
                );
                break;
            }
            pages += 1;

            let bars = self
                .get_bars(
                    symbol,
                    interval,
                    Some(current_start),
                    Some(end_time),
                    Some(MAX_KLINES_PER_REQUEST),
                )
                .await?;

            let Some(last_open) = bars.last().map(|b| b.time.timestamp_millis()) else {
                break;
            };
            all_bars.extend(bars);

            // Move start past the last candle's open
            if last_open < current_start {
                break;
            }
            current_start = last_open + 1;

            // Small delay to respect rate limits
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        }

        info!(total = all_bars.len(), "Paginated kline fetch complete");
        Ok(all_bars)
    }
}

fn convert_klines(raw: Vec<RawKline>) -> Vec<PriceBar> {
    raw.into_iter().filter_map(RawKline::into_price_bar).collect()
}
