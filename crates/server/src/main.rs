//! Toolist Signals — BNF buy-signal scanner
//!
//! Usage:
//!   toolist-signals serve --port 3002                 — Launch web server with chart UI
//!   toolist-signals scan --seed 7                     — Scan sample data from CLI
//!   toolist-signals scan --symbol BTCUSDT --interval 1d

use axum::{
    extract::{Query, State},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use engine::{
    analyze, sample_bars, Analysis, BinanceClient, EngineResult, PriceBar, StrategyConfig,
    DEFAULT_SAMPLE_DAYS,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
/// Signals shown in the "recent" list, newest first
const RECENT_SIGNALS: usize = 5;
const MAX_SAMPLE_DAYS: usize = 5000;

#[derive(Parser)]
#[command(name = "toolist-signals")]
#[command(about = "BNF buy-signal scanner (EMA/RSI/MACD)", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON file with strategy parameters (missing keys use defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the signal web server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 3002)]
        port: u16,
    },
    /// Scan one price series from CLI (no web server)
    Scan {
        /// Seed for sample data (random when omitted)
        #[arg(long)]
        seed: Option<u64>,
        /// Number of sample days
        #[arg(long, default_value_t = DEFAULT_SAMPLE_DAYS)]
        days: usize,
        /// JSON file holding an array of price bars
        #[arg(long, conflicts_with = "symbol")]
        input: Option<PathBuf>,
        /// Binance symbol to fetch instead of sample data
        #[arg(long)]
        symbol: Option<String>,
        /// Binance kline interval
        #[arg(long, default_value = "1d")]
        interval: String,
        /// Number of Binance bars
        #[arg(long, default_value_t = 200)]
        limit: u32,
        /// Print the full analysis as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Where a scan gets its bars
#[derive(Debug, Clone, PartialEq)]
enum BarSource {
    Sample { seed: u64, days: usize },
    File(PathBuf),
    Binance {
        symbol: String,
        interval: String,
        limit: u32,
    },
}

impl BarSource {
    fn label(&self) -> String {
        match self {
            Self::Sample { seed, days } => format!("sample (seed {}, {} days)", seed, days),
            Self::File(path) => path.display().to_string(),
            Self::Binance {
                symbol, interval, ..
            } => format!("binance {} {}", symbol, interval),
        }
    }
}

#[derive(Clone)]
struct AppState {
    binance: Arc<BinanceClient>,
    config: Arc<StrategyConfig>,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,toolist_signals=debug")
    } else {
        EnvFilter::new("info,engine=info,toolist_signals=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

fn load_config(path: Option<&Path>) -> anyhow::Result<StrategyConfig> {
    let config = match path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path.display(), e))?;
            serde_json::from_str::<StrategyConfig>(&raw)?
        }
        None => StrategyConfig::default(),
    };
    config.validate()?;
    Ok(config)
}

fn binance_client() -> anyhow::Result<BinanceClient> {
    match std::env::var("TOOLIST_BINANCE_URL") {
        Ok(url) => BinanceClient::with_base_url(url),
        Err(_) => BinanceClient::new(),
    }
}

fn default_seed() -> u64 {
    Utc::now().timestamp_millis().unsigned_abs()
}

/// Cap a requested sample length at `MAX_SAMPLE_DAYS`
fn clamp_sample_days(days: usize) -> usize {
    if days > MAX_SAMPLE_DAYS {
        info!(
            requested = days,
            max = MAX_SAMPLE_DAYS,
            "Sample length capped"
        );
        return MAX_SAMPLE_DAYS;
    }
    days
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(&host, port, config).await?;
        }
        Commands::Scan {
            seed,
            days,
            input,
            symbol,
            interval,
            limit,
            json,
        } => {
            let source = match (input, symbol) {
                (Some(path), _) => BarSource::File(path),
                (None, Some(symbol)) => BarSource::Binance {
                    symbol: symbol.to_uppercase(),
                    interval,
                    limit,
                },
                (None, None) => BarSource::Sample {
                    seed: seed.unwrap_or_else(default_seed),
                    days: clamp_sample_days(days),
                },
            };
            cmd_scan(source, json, config).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Serve command — Axum web server
// ============================================================================

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api_health))
        .route("/signals", post(api_analyze_bars))
        .route("/signals/sample", get(api_sample_signals))
        .route("/signals/binance", get(api_binance_signals))
        .with_state(state)
}

async fn cmd_serve(host: &str, port: u16, config: StrategyConfig) -> anyhow::Result<()> {
    info!("Toolist Signals v{} starting...", APP_VERSION);

    let state = AppState {
        binance: Arc::new(binance_client()?),
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Chart UI assets: env override, then dist/ next to the binary, then ./dist
    let static_dir = match std::env::var("TOOLIST_STATIC_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(_) => {
            let exe_path = std::env::current_exe().unwrap_or_default();
            let exe_dir = exe_path.parent().unwrap_or(Path::new("."));
            let dist_dir = exe_dir.join("dist");
            if dist_dir.exists() {
                dist_dir
            } else {
                PathBuf::from("dist")
            }
        }
    };

    let app = Router::new()
        .nest("/api", build_router(state))
        .fallback_service(ServeDir::new(&static_dir))
        .layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Toolist Signals v{} ===", APP_VERSION);
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /api/health              - Health check");
    println!("  POST /api/signals             - Scan posted price bars");
    println!("  GET  /api/signals/sample      - Scan generated sample data");
    println!("  GET  /api/signals/binance     - Scan Binance klines");
    println!("\n  Static files: {}", static_dir.display());
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Scan command — CLI mode (no web server)
// ============================================================================

async fn load_bars(source: &BarSource) -> anyhow::Result<Vec<PriceBar>> {
    match source {
        BarSource::Sample { seed, days } => Ok(sample_bars(*seed, *days)),
        BarSource::File(path) => {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
            Ok(serde_json::from_str(&raw)?)
        }
        BarSource::Binance {
            symbol,
            interval,
            limit,
        } => {
            binance_client()?
                .get_bars(symbol, interval, None, None, Some(*limit))
                .await
        }
    }
}

async fn cmd_scan(source: BarSource, json: bool, config: StrategyConfig) -> anyhow::Result<()> {
    let bars = load_bars(&source).await?;
    if bars.is_empty() {
        anyhow::bail!("No price bars from {}", source.label());
    }

    let analysis = analyze(&bars, &config)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    println!("\n=== Toolist Signals v{} ===", APP_VERSION);
    println!("Source: {} ({} bars)", source.label(), bars.len());
    print_snapshot(&analysis);
    print_signals(&analysis);
    Ok(())
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.2}", v))
}

fn print_snapshot(analysis: &Analysis) {
    let latest = &analysis.latest;
    println!(
        "Latest: EMA(25) {}  RSI(14) {}  MACD hist {}",
        fmt_opt(latest.ema),
        fmt_opt(latest.rsi),
        fmt_opt(latest.macd_hist)
    );
}

fn print_signals(analysis: &Analysis) {
    if analysis.signals.is_empty() {
        println!("\nNo bar meets all four buy conditions.");
        return;
    }

    println!(
        "\nBuy signals: {} (latest {} shown)",
        analysis.signals.len(),
        analysis.signals.len().min(RECENT_SIGNALS)
    );
    println!(
        "  {:<20} {:>10} {:>10} {:>10} {:>6} {:>7} {:>9}",
        "Time", "Entry", "Stop", "Target", "R:R", "RSI", "MACD hist"
    );
    println!("  {}", "-".repeat(80));
    for s in analysis.recent_signals(RECENT_SIGNALS) {
        println!(
            "  {:<20} {:>10.2} {:>10.2} {:>10.2} {:>6} {:>7.2} {:>9.2}",
            s.time.format("%Y-%m-%d %H:%M").to_string(),
            s.price,
            s.stop_loss,
            s.take_profit,
            format!("1:{}", s.risk_reward_ratio),
            s.rsi,
            s.macd_hist,
        );
    }
}

// ============================================================================
// API Handlers
// ============================================================================

fn analysis_json(
    source: &str,
    bars: Vec<PriceBar>,
    result: EngineResult<Analysis>,
) -> Json<serde_json::Value> {
    match result {
        Ok(analysis) => {
            let recent: Vec<_> = analysis
                .recent_signals(RECENT_SIGNALS)
                .into_iter()
                .cloned()
                .collect();
            Json(serde_json::json!({
                "success": true,
                "source": source,
                "count": analysis.signals.len(),
                "recent": recent,
                "bars": bars,
                "analysis": analysis,
            }))
        }
        Err(e) => {
            error!(source, "Signal scan failed: {}", e);
            Json(serde_json::json!({
                "success": false,
                "message": format!("Signal scan failed: {}", e),
            }))
        }
    }
}

/// GET /api/health
async fn api_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "toolist-signals",
        "version": APP_VERSION,
    }))
}

/// POST /api/signals — scan caller-supplied bars
async fn api_analyze_bars(
    State(state): State<AppState>,
    Json(bars): Json<Vec<PriceBar>>,
) -> Json<serde_json::Value> {
    info!(bars = bars.len(), "Scanning posted bars");
    let result = analyze(&bars, &state.config);
    analysis_json("posted", bars, result)
}

/// GET /api/signals/sample — scan freshly generated sample data
async fn api_sample_signals(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    let seed = params
        .get("seed")
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(default_seed);
    let days = clamp_sample_days(
        params
            .get("days")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SAMPLE_DAYS),
    );

    let bars = sample_bars(seed, days);
    let result = analyze(&bars, &state.config);
    analysis_json(&BarSource::Sample { seed, days }.label(), bars, result)
}

/// GET /api/signals/binance — fetch klines then scan them
async fn api_binance_signals(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    let symbol = params
        .get("symbol")
        .map(|s| s.to_uppercase())
        .unwrap_or_else(|| "BTCUSDT".to_string());
    let interval = params
        .get("interval")
        .cloned()
        .unwrap_or_else(|| "1d".to_string());
    let start_time: Option<i64> = params.get("start_time").and_then(|s| s.parse().ok());
    let end_time: Option<i64> = params.get("end_time").and_then(|s| s.parse().ok());
    let limit: Option<u32> = params.get("limit").and_then(|s| s.parse().ok());

    let fetched = if let (Some(start), Some(end)) = (start_time, end_time) {
        state
            .binance
            .get_bars_paginated(&symbol, &interval, start, end)
            .await
    } else {
        state
            .binance
            .get_bars(&symbol, &interval, start_time, end_time, limit)
            .await
    };

    match fetched {
        Ok(bars) => {
            let result = analyze(&bars, &state.config);
            let source = format!("binance {} {}", symbol, interval);
            analysis_json(&source, bars, result)
        }
        Err(e) => {
            error!("Binance klines error: {}", e);
            Json(serde_json::json!({
                "success": false,
                "message": format!("Failed to fetch klines: {}", e),
            }))
        }
    }
}
