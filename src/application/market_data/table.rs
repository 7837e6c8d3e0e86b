use crate::domain::errors::AnalyticsError;
use crate::domain::market::candle::{AggregatedCandle, Candle};
use crate::domain::market::timeframe::Timeframe;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::sync::atomic::{AtomicU64, Ordering};

/// Describes where a candle batch's timestamps came from, which decides
/// whether they are re-expressed on canonical whole-second UTC boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampContext {
    /// Timestamps already on canonical boundaries; passed through.
    Canonical,
    /// Externally sourced (broker feed, third-party file); normalized.
    External,
    /// Freshly generated in-process; normalized.
    Generated,
    /// Alignment must be preserved exactly as supplied.
    PreserveAlignment,
}

impl TimestampContext {
    fn normalizes(&self) -> bool {
        matches!(self, TimestampContext::External | TimestampContext::Generated)
    }
}

static NEXT_TABLE_ID: AtomicU64 = AtomicU64::new(1);

/// Columnar projection of a candle batch for vectorized access.
///
/// Built per call and optionally drawn from [`TablePool`]; it copies the
/// fields it needs and never holds references into the source candles.
///
/// [`TablePool`]: crate::application::market_data::table_pool::TablePool
#[derive(Debug)]
pub struct CandleTable {
    id: u64,
    timestamps: Vec<i64>,
    symbols: Vec<String>,
    opens: Vec<Decimal>,
    highs: Vec<Decimal>,
    lows: Vec<Decimal>,
    closes: Vec<Decimal>,
    volumes: Vec<Decimal>,
    open_interests: Vec<Decimal>,
    intervals: Vec<Timeframe>,
}

#[derive(Debug, Deserialize)]
struct CsvCandleRecord {
    timestamp: i64,
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
    #[serde(default)]
    open_interest: Option<String>,
}

impl CandleTable {
    pub fn new() -> Self {
        Self {
            id: NEXT_TABLE_ID.fetch_add(1, Ordering::Relaxed),
            timestamps: Vec::new(),
            symbols: Vec::new(),
            opens: Vec::new(),
            highs: Vec::new(),
            lows: Vec::new(),
            closes: Vec::new(),
            volumes: Vec::new(),
            open_interests: Vec::new(),
            intervals: Vec::new(),
        }
    }

    /// Builds a table from a candle sequence. Empty input yields an empty
    /// table, not an error.
    pub fn from_candles(candles: &[Candle], context: TimestampContext) -> Self {
        let mut table = Self::new();
        table.load_candles(candles, context);
        table
    }

    /// Fills a (possibly pooled) table with a new candle batch, replacing
    /// any prior contents.
    pub fn load_candles(&mut self, candles: &[Candle], context: TimestampContext) {
        self.clear();
        self.timestamps.reserve(candles.len());

        for candle in candles {
            let ts = if context.normalizes() {
                // Truncate to whole-second UTC alignment; sub-second
                // precision is not meaningful for candle period starts.
                candle.timestamp - candle.timestamp.rem_euclid(1000)
            } else {
                candle.timestamp
            };

            self.timestamps.push(ts);
            self.symbols.push(candle.symbol.clone());
            self.opens.push(candle.open);
            self.highs.push(candle.high);
            self.lows.push(candle.low);
            self.closes.push(candle.close);
            self.volumes.push(candle.volume);
            self.open_interests.push(candle.open_interest);
            self.intervals.push(candle.interval);
        }
    }

    /// Parses OHLCV rows from CSV. A single malformed numeric cell fails
    /// the whole table; partial zero-filled tables are never produced.
    pub fn from_csv_records<R: Read>(
        reader: R,
        symbol: &str,
        interval: Timeframe,
    ) -> Result<Self, AnalyticsError> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let mut table = Self::new();

        for (row, record) in csv_reader.deserialize::<CsvCandleRecord>().enumerate() {
            let record = record.map_err(|e| {
                AnalyticsError::computation(format!("CSV row {}: {}", row + 1, e))
            })?;

            let parse = |field: &str, value: &str| -> Result<Decimal, AnalyticsError> {
                value.trim().parse::<Decimal>().map_err(|_| {
                    AnalyticsError::computation(format!(
                        "CSV row {}: malformed {} value '{}'",
                        row + 1,
                        field,
                        value
                    ))
                })
            };

            table.timestamps.push(record.timestamp);
            table.symbols.push(symbol.to_string());
            table.opens.push(parse("open", &record.open)?);
            table.highs.push(parse("high", &record.high)?);
            table.lows.push(parse("low", &record.low)?);
            table.closes.push(parse("close", &record.close)?);
            table.volumes.push(parse("volume", &record.volume)?);
            table.open_interests.push(match &record.open_interest {
                Some(oi) => parse("open_interest", oi)?,
                None => Decimal::ZERO,
            });
            table.intervals.push(interval);
        }

        Ok(table)
    }

    /// Stable per-instance identity, used by the pool to detect
    /// double-release.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Clears all columns, keeping allocated capacity for reuse.
    pub fn clear(&mut self) {
        self.timestamps.clear();
        self.symbols.clear();
        self.opens.clear();
        self.highs.clear();
        self.lows.clear();
        self.closes.clear();
        self.volumes.clear();
        self.open_interests.clear();
        self.intervals.clear();
    }

    // Column accessors. Each slice length equals `len()`; empty tables
    // return empty slices.

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn opens(&self) -> &[Decimal] {
        &self.opens
    }

    pub fn highs(&self) -> &[Decimal] {
        &self.highs
    }

    pub fn lows(&self) -> &[Decimal] {
        &self.lows
    }

    pub fn closes(&self) -> &[Decimal] {
        &self.closes
    }

    pub fn volumes(&self) -> &[Decimal] {
        &self.volumes
    }

    pub fn open_interests(&self) -> &[Decimal] {
        &self.open_interests
    }

    // f64 views feed the indicator calculator. Lossy by design; the
    // Decimal columns above remain the round-trip source of truth.

    pub fn opens_f64(&self) -> Vec<f64> {
        Self::to_f64(&self.opens)
    }

    pub fn highs_f64(&self) -> Vec<f64> {
        Self::to_f64(&self.highs)
    }

    pub fn lows_f64(&self) -> Vec<f64> {
        Self::to_f64(&self.lows)
    }

    pub fn closes_f64(&self) -> Vec<f64> {
        Self::to_f64(&self.closes)
    }

    pub fn volumes_f64(&self) -> Vec<f64> {
        Self::to_f64(&self.volumes)
    }

    fn to_f64(column: &[Decimal]) -> Vec<f64> {
        column
            .iter()
            .map(|d| d.to_f64().unwrap_or(f64::NAN))
            .collect()
    }

    /// Reconstructs the candle sequence. Lossless on OHLCV fields for any
    /// non-empty table; timestamp precision depends on the build context
    /// (bounded to whole seconds when normalization applied).
    pub fn to_candles(&self) -> Vec<Candle> {
        (0..self.len())
            .map(|i| Candle {
                symbol: self.symbols[i].clone(),
                timestamp: self.timestamps[i],
                open: self.opens[i],
                high: self.highs[i],
                low: self.lows[i],
                close: self.closes[i],
                volume: self.volumes[i],
                open_interest: self.open_interests[i],
                interval: self.intervals[i],
            })
            .collect()
    }

    /// Reconstructs rows as aggregated candles labeled with `timeframe`,
    /// one source row per output (candle_count = 1).
    pub fn to_aggregated_candles(&self, timeframe: Timeframe) -> Vec<AggregatedCandle> {
        (0..self.len())
            .map(|i| AggregatedCandle {
                symbol: self.symbols[i].clone(),
                timeframe,
                open: self.opens[i],
                high: self.highs[i],
                low: self.lows[i],
                close: self.closes[i],
                volume: self.volumes[i],
                open_interest: self.open_interests[i],
                timestamp: self.timestamps[i],
                candle_count: 1,
            })
            .collect()
    }
}

impl Default for CandleTable {
    fn default() -> Self {
        Self::new()
    }
}
