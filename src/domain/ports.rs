use crate::domain::market::candle::Candle;
use crate::domain::market::timeframe::Timeframe;
use anyhow::Result;
use async_trait::async_trait;

// Need async_trait for async functions in traits
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Fetch candles for a symbol, ascending by timestamp, covering
    /// `[start_ms, end_ms)` at the given base interval. The engine never
    /// fetches data itself; implementations decide transport and storage.
    async fn fetch_candles(
        &self,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
        interval: Timeframe,
    ) -> Result<Vec<Candle>>;
}
