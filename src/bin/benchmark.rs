//! Synthetic-load benchmark for the analytics pipeline.
//!
//! Generates random-walk minute candles for a set of instruments, fans
//! them through the engine repeatedly and reports per-iteration timing
//! plus cache/pool statistics.

use anyhow::{Context, Result};
use candlelab::application::market_data::indicator_set::IndicatorKind;
use candlelab::application::market_data::table::TimestampContext;
use candlelab::domain::market::candle::Candle;
use candlelab::domain::market::timeframe::Timeframe;
use candlelab::{AnalysisJob, AnalyticsEngine, EngineConfig};
use clap::Parser;
use rand::Rng;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "benchmark", about = "Drive the analytics engine with synthetic candles")]
struct Args {
    /// Number of instruments to analyze per batch
    #[arg(long, default_value_t = 16)]
    symbols: usize,

    /// Minute candles generated per instrument
    #[arg(long, default_value_t = 2880)]
    candles: usize,

    /// Target aggregation timeframe (1m, 3m, 5m, 15m, 30m, 1h, 4h, 1d)
    #[arg(long, default_value = "5m")]
    timeframe: String,

    /// Batch iterations (second and later iterations exercise the cache)
    #[arg(long, default_value_t = 3)]
    iterations: usize,
}

fn synthetic_candles(symbol: &str, count: usize, start_ms: i64) -> Vec<Candle> {
    let mut rng = rand::rng();
    let mut price = rng.random_range(50.0..50_000.0f64);
    let mut candles = Vec::with_capacity(count);

    for i in 0..count {
        let drift: f64 = rng.random_range(-0.004..0.004);
        let open = price;
        let close = open * (1.0 + drift);
        let high = open.max(close) * (1.0 + rng.random_range(0.0..0.002));
        let low = open.min(close) * (1.0 - rng.random_range(0.0..0.002));
        let volume = rng.random_range(100.0..10_000.0f64);
        price = close;

        candles.push(Candle {
            symbol: symbol.to_string(),
            timestamp: start_ms + i as i64 * 60_000,
            open: Decimal::from_f64_retain(open).unwrap_or_default(),
            high: Decimal::from_f64_retain(high).unwrap_or_default(),
            low: Decimal::from_f64_retain(low).unwrap_or_default(),
            close: Decimal::from_f64_retain(close).unwrap_or_default(),
            volume: Decimal::from_f64_retain(volume).unwrap_or_default(),
            open_interest: Decimal::ZERO,
            interval: Timeframe::OneMin,
        });
    }
    candles
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let timeframe = Timeframe::from_str(&args.timeframe)
        .map_err(|e| anyhow::anyhow!(e))
        .context("--timeframe")?;

    let config = EngineConfig::from_env()?;
    let engine = AnalyticsEngine::new(config)?;

    let start_ms = chrono::Utc::now().timestamp_millis() - args.candles as i64 * 60_000;
    let indicators = vec![
        IndicatorKind::Sma { period: 20 },
        IndicatorKind::Ema { period: 12 },
        IndicatorKind::Rsi { period: 14 },
        IndicatorKind::Atr { period: 14 },
        IndicatorKind::Vwap,
        IndicatorKind::Bollinger { period: 20, multiplier: 2.0 },
    ];

    info!(
        "Generating {} instruments x {} candles, target {}",
        args.symbols, args.candles, timeframe
    );
    let jobs: Vec<AnalysisJob> = (0..args.symbols)
        .map(|i| {
            let symbol = format!("SYN{:03}/USD", i);
            AnalysisJob {
                candles: synthetic_candles(&symbol, args.candles, start_ms),
                symbol,
                timeframe,
                indicators: indicators.clone(),
                context: TimestampContext::Generated,
                timeout: Some(Duration::from_secs(30)),
            }
        })
        .collect();

    for iteration in 1..=args.iterations {
        let started = Instant::now();
        let results = engine.analyze_batch(jobs.clone(), Duration::from_secs(120))?;
        let elapsed = started.elapsed();

        let failures = results.iter().filter(|r| !r.is_success()).count();
        let cached = results
            .iter()
            .filter_map(|r| r.output.as_ref())
            .filter(|report| report.from_cache)
            .count();

        info!(
            "Iteration {}: {} jobs in {:.1}ms ({} from cache, {} failed)",
            iteration,
            results.len(),
            elapsed.as_secs_f64() * 1000.0,
            cached,
            failures
        );
    }

    let cache_stats = engine.cache_stats();
    info!(
        "Cache: {} hits / {} requests ({:.1}% hit rate), EMA compute latency {:.2}ms, {} evictions",
        cache_stats.hits,
        cache_stats.total_requests,
        cache_stats.hit_rate * 100.0,
        cache_stats.ema_compute_latency_ms,
        cache_stats.evictions
    );

    let pool_stats = engine.pool_stats();
    info!(
        "Table pool: {} created, {} reused, {} returned",
        pool_stats.created, pool_stats.reused, pool_stats.returned
    );

    if let Some(text) = engine.metrics_text() {
        println!("{}", text);
    }

    Ok(())
}
