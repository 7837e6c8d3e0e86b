use crate::domain::errors::AnalyticsError;
use crate::domain::market::candle::{AggregatedCandle, Candle};
use crate::domain::market::timeframe::Timeframe;
use tracing::debug;

/// Buckets a sorted candle batch into `timeframe`-aligned intervals and
/// reduces each bucket to one OHLCV candle.
///
/// Streaming-style reduction over the finite batch: a bucket closes and
/// emits as soon as a candle belonging to the next bucket appears; the
/// trailing open bucket flushes at end of input. Candles are assumed
/// ascending by timestamp (caller responsibility). Missing candles inside
/// an interval do not invalidate a bucket; it reflects the candles present.
pub fn aggregate(
    candles: &[Candle],
    timeframe: Timeframe,
) -> Result<Vec<AggregatedCandle>, AnalyticsError> {
    if candles.is_empty() {
        return Ok(Vec::new());
    }

    let symbol = &candles[0].symbol;
    let mut output = Vec::new();
    let mut bucket: Option<AggregatedCandle> = None;

    for candle in candles {
        if candle.symbol != *symbol {
            return Err(AnalyticsError::computation(format!(
                "Mixed symbols in aggregation batch: '{}' and '{}'",
                symbol, candle.symbol
            )));
        }

        let period_start = timeframe.period_start(candle.timestamp);

        let belongs_to_open = bucket.as_ref().is_some_and(|b| b.timestamp == period_start);
        if belongs_to_open {
            bucket
                .as_mut()
                .expect("open bucket verified by belongs_to_open check")
                .merge(candle);
        } else {
            // Next interval reached (or first candle); close any open bucket.
            if let Some(completed) = bucket.take() {
                output.push(completed);
            }
            bucket = Some(AggregatedCandle::from_first(candle, timeframe, period_start));
        }
    }

    if let Some(trailing) = bucket {
        output.push(trailing);
    }

    debug!(
        "Aggregated {} candles into {} {} buckets for {}",
        candles.len(),
        output.len(),
        timeframe,
        symbol
    );

    Ok(output)
}
