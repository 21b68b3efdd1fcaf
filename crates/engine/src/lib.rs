//! Toolist trading-strategy engine — BNF buy-signal detection
//!
//! Provides:
//! - Indicator adapter (SMA-seeded EMA, Wilder RSI, MACD on `ta` primitives, aligned to the bars)
//! - Four-condition buy-signal detector
//! - Stop-loss / take-profit risk plans
//! - Sample price generator and Binance public API client for price bars

pub mod api;
pub mod config;
pub mod detector;
pub mod error;
pub mod indicators;
pub mod pipeline;
pub mod risk;
pub mod sample;
pub mod types;

// Re-exports for convenience
pub use api::BinanceClient;
pub use config::StrategyConfig;
pub use detector::{detect_signals, evaluate_conditions, ConditionSet};
pub use error::{EngineError, EngineResult};
pub use indicators::{compute_indicators, left_pad};
pub use pipeline::{analyze, latest_snapshot, Analysis};
pub use risk::{compute_risk_plan, RiskPlan};
pub use sample::{generate_sample_bars, sample_bars, DEFAULT_SAMPLE_DAYS};
pub use types::*;
