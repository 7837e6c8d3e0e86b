use crate::domain::market::timeframe::Timeframe;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A fixed-duration price/volume summary for one instrument.
///
/// Produced upstream (feed handler, persistence layer); read-only inside
/// the analytics engine. `timestamp` is the period start in Unix
/// milliseconds UTC.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub timestamp: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub open_interest: Decimal,
    pub interval: Timeframe,
}

impl Candle {
    /// Typical price used by volume-weighted calculations.
    pub fn typical_price(&self) -> Decimal {
        (self.high + self.low + self.close) / Decimal::from(3)
    }
}

/// A candle produced by reducing several finer-grained candles into one
/// coarser interval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AggregatedCandle {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub open_interest: Decimal,
    /// Start timestamp of this timeframe period (in milliseconds)
    pub timestamp: i64,
    /// Number of source candles merged into this one
    pub candle_count: usize,
}

impl AggregatedCandle {
    /// Creates a new aggregated candle from the first member of its bucket.
    pub fn from_first(candle: &Candle, timeframe: Timeframe, period_start: i64) -> Self {
        Self {
            symbol: candle.symbol.clone(),
            timeframe,
            open: candle.open,
            high: candle.high,
            low: candle.low,
            close: candle.close,
            volume: candle.volume,
            open_interest: candle.open_interest,
            timestamp: period_start,
            candle_count: 1,
        }
    }

    /// Merges a later candle from the same bucket.
    ///
    /// Open stays the first member's open; high/low widen; close tracks the
    /// latest member; volume and open interest accumulate.
    pub fn merge(&mut self, candle: &Candle) {
        if candle.high > self.high {
            self.high = candle.high;
        }
        if candle.low < self.low {
            self.low = candle.low;
        }
        self.close = candle.close;
        self.volume += candle.volume;
        self.open_interest += candle.open_interest;
        self.candle_count += 1;
    }

    /// End timestamp (exclusive) of this timeframe period.
    pub fn end_timestamp(&self) -> i64 {
        self.timestamp + self.timeframe.to_millis()
    }

    /// Flattens back into a plain candle at the aggregated interval.
    pub fn into_candle(self) -> Candle {
        Candle {
            symbol: self.symbol,
            timestamp: self.timestamp,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
            open_interest: self.open_interest,
            interval: self.timeframe,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn minute_candle(ts: i64, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Candle {
        Candle {
            symbol: "BTC/USD".to_string(),
            timestamp: ts,
            open,
            high,
            low,
            close,
            volume: dec!(1000),
            open_interest: dec!(50),
            interval: Timeframe::OneMin,
        }
    }

    #[test]
    fn test_from_first() {
        let base = 1_704_067_200_000i64;
        let c = minute_candle(base, dec!(100), dec!(105), dec!(99), dec!(103));
        let agg = AggregatedCandle::from_first(&c, Timeframe::FiveMin, base);

        assert_eq!(agg.symbol, "BTC/USD");
        assert_eq!(agg.open, dec!(100));
        assert_eq!(agg.close, dec!(103));
        assert_eq!(agg.candle_count, 1);
        assert_eq!(agg.end_timestamp(), base + 300_000);
    }

    #[test]
    fn test_merge_reduction_rules() {
        let base = 1_704_067_200_000i64;
        let first = minute_candle(base, dec!(100), dec!(105), dec!(98), dec!(102));
        let mut agg = AggregatedCandle::from_first(&first, Timeframe::FiveMin, base);

        agg.merge(&minute_candle(base + 60_000, dec!(102), dec!(107), dec!(101), dec!(106)));
        agg.merge(&minute_candle(base + 120_000, dec!(106), dec!(108), dec!(104), dec!(105)));

        assert_eq!(agg.open, dec!(100)); // first member's open
        assert_eq!(agg.high, dec!(108)); // max of highs
        assert_eq!(agg.low, dec!(98)); // min of lows
        assert_eq!(agg.close, dec!(105)); // last member's close
        assert_eq!(agg.volume, dec!(3000)); // summed
        assert_eq!(agg.open_interest, dec!(150)); // summed
        assert_eq!(agg.candle_count, 3);
    }

    #[test]
    fn test_into_candle_keeps_interval() {
        let base = 1_704_067_200_000i64;
        let c = minute_candle(base, dec!(100), dec!(105), dec!(99), dec!(103));
        let agg = AggregatedCandle::from_first(&c, Timeframe::FiveMin, base);
        let flattened = agg.into_candle();

        assert_eq!(flattened.interval, Timeframe::FiveMin);
        assert_eq!(flattened.open, dec!(100));
        assert_eq!(flattened.volume, dec!(1000));
    }

    #[test]
    fn test_typical_price() {
        let c = minute_candle(0, dec!(100), dec!(110), dec!(90), dec!(100));
        assert_eq!(c.typical_price(), dec!(100));
    }
}
