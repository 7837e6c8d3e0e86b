//! Pure indicator calculations over aligned series.
//!
//! Every function returns a series of the same length as its input, with
//! `f64::NAN` sentinels in positions that lack sufficient lookback. Short
//! input is not an error; a partial series remains useful to callers.

/// Trailing simple moving average. Undefined before `period` samples.
pub fn sma(series: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; series.len()];
    if period == 0 || series.len() < period {
        return out;
    }

    for i in (period - 1)..series.len() {
        let window = &series[i + 1 - period..=i];
        out[i] = window.iter().sum::<f64>() / period as f64;
    }
    out
}

/// Exponential moving average with alpha = 2 / (period + 1), seeded with
/// SMA(period) at the first defined position.
pub fn ema(series: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; series.len()];
    if period == 0 || series.len() < period {
        return out;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let seed: f64 = series[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = seed;

    let mut prev = seed;
    for i in period..series.len() {
        prev = alpha * series[i] + (1.0 - alpha) * prev;
        out[i] = prev;
    }
    out
}

/// Relative strength index with Wilder smoothing, bounded to [0, 100].
/// First defined at index `period` (one delta per sample).
pub fn rsi(series: &[f64], period: usize) -> Vec<f64> {
    let mut out = vec![f64::NAN; series.len()];
    if period == 0 || series.len() <= period {
        return out;
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    for i in 1..=period {
        let delta = series[i] - series[i - 1];
        if delta > 0.0 {
            avg_gain += delta;
        } else {
            avg_loss += -delta;
        }
    }
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    out[period] = rsi_value(avg_gain, avg_loss);

    let n = period as f64;
    for i in (period + 1)..series.len() {
        let delta = series[i] - series[i - 1];
        let (gain, loss) = if delta > 0.0 { (delta, 0.0) } else { (0.0, -delta) };
        avg_gain = (avg_gain * (n - 1.0) + gain) / n;
        avg_loss = (avg_loss * (n - 1.0) + loss) / n;
        out[i] = rsi_value(avg_gain, avg_loss);
    }
    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}

/// Average true range with Wilder smoothing.
///
/// True range = max(high - low, |high - prevClose|, |low - prevClose|).
/// Inputs must be equal-length; a mismatch yields an all-sentinel series.
pub fn atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<f64> {
    let len = highs.len();
    let mut out = vec![f64::NAN; len];
    if period == 0 || lows.len() != len || closes.len() != len || len < period {
        return out;
    }

    let true_range = |i: usize| -> f64 {
        if i == 0 {
            highs[0] - lows[0]
        } else {
            let prev_close = closes[i - 1];
            (highs[i] - lows[i])
                .max((highs[i] - prev_close).abs())
                .max((lows[i] - prev_close).abs())
        }
    };

    let mut seed = 0.0;
    for i in 0..period {
        seed += true_range(i);
    }
    let mut prev = seed / period as f64;
    out[period - 1] = prev;

    let n = period as f64;
    for i in period..len {
        prev = (prev * (n - 1.0) + true_range(i)) / n;
        out[i] = prev;
    }
    out
}

/// Cumulative volume-weighted average price. Session resets are the
/// caller's responsibility: pre-slice the window before calling.
pub fn vwap(prices: &[f64], volumes: &[f64]) -> Vec<f64> {
    let len = prices.len();
    let mut out = vec![f64::NAN; len];
    if volumes.len() != len {
        return out;
    }

    let mut cum_pv = 0.0;
    let mut cum_v = 0.0;
    for i in 0..len {
        cum_pv += prices[i] * volumes[i];
        cum_v += volumes[i];
        if cum_v > 0.0 {
            out[i] = cum_pv / cum_v;
        }
    }
    out
}

/// Bollinger bands over a trailing window.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    pub middle: Vec<f64>,
    pub upper: Vec<f64>,
    pub lower: Vec<f64>,
    pub band_width: Vec<f64>,
}

/// Middle = SMA(period); upper/lower = middle +/- multiplier * stddev;
/// band_width = (upper - lower) / middle.
///
/// The standard deviation is the direct two-pass population form
/// `sqrt(mean((x - mean)^2))`. The algebraically equivalent
/// `mean(x^2) - mean(x)^2` expansion cancels catastrophically when price
/// levels are large relative to their variance and must not be used here.
pub fn bollinger(series: &[f64], period: usize, multiplier: f64) -> BollingerBands {
    let len = series.len();
    let mut bands = BollingerBands {
        middle: vec![f64::NAN; len],
        upper: vec![f64::NAN; len],
        lower: vec![f64::NAN; len],
        band_width: vec![f64::NAN; len],
    };
    if period == 0 || len < period {
        return bands;
    }

    for i in (period - 1)..len {
        let window = &series[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance =
            window.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / period as f64;
        let std_dev = variance.sqrt();

        let upper = mean + multiplier * std_dev;
        let lower = mean - multiplier * std_dev;

        bands.middle[i] = mean;
        bands.upper[i] = upper;
        bands.lower[i] = lower;
        bands.band_width[i] = if mean != 0.0 {
            (upper - lower) / mean
        } else {
            f64::NAN
        };
    }
    bands
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() < tolerance,
            "expected {} within {} of {}",
            actual,
            tolerance,
            expected
        );
    }

    #[test]
    fn test_sma_reference_values() {
        let out = sma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(out.len(), 5);
        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_close(out[2], 2.0, 1e-12);
        assert_close(out[3], 3.0, 1e-12);
        assert_close(out[4], 4.0, 1e-12);
    }

    #[test]
    fn test_sma_short_input_all_sentinel() {
        let out = sma(&[1.0, 2.0], 5);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_sma_zero_period_degenerate() {
        let out = sma(&[1.0, 2.0, 3.0], 0);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let series = [10.0, 12.0, 14.0, 13.0, 15.0];
        let out = ema(&series, 3);

        assert!(out[0].is_nan());
        assert!(out[1].is_nan());
        assert_close(out[2], 12.0, 1e-12); // SMA seed

        // alpha = 0.5: ema[3] = 0.5*13 + 0.5*12 = 12.5
        assert_close(out[3], 12.5, 1e-12);
        assert_close(out[4], 13.75, 1e-12);
    }

    #[test]
    fn test_rsi_bounds_and_warmup() {
        // Strictly rising series: RSI pegs at 100
        let rising: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let out = rsi(&rising, 14);

        for v in &out[..14] {
            assert!(v.is_nan());
        }
        for v in &out[14..] {
            assert_close(*v, 100.0, 1e-9);
        }

        // Strictly falling series: RSI pegs at 0
        let falling: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        let out = rsi(&falling, 14);
        for v in &out[14..] {
            assert_close(*v, 0.0, 1e-9);
        }
    }

    #[test]
    fn test_rsi_known_sequence() {
        // Alternating equal gains/losses settle RSI near 50.
        let series: Vec<f64> = (0..40)
            .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
            .collect();
        let out = rsi(&series, 14);
        let last = out[39];
        assert!(last > 40.0 && last < 60.0, "got {}", last);
    }

    #[test]
    fn test_atr_constant_range() {
        // Constant 2-point range, no gaps: ATR converges to 2.
        let n = 20;
        let highs = vec![102.0; n];
        let lows = vec![100.0; n];
        let closes = vec![101.0; n];
        let out = atr(&highs, &lows, &closes, 5);

        for v in &out[..4] {
            assert!(v.is_nan());
        }
        for v in &out[4..] {
            assert_close(*v, 2.0, 1e-9);
        }
    }

    #[test]
    fn test_atr_gap_included_via_prev_close() {
        // Day 2 gaps above day 1's close: TR uses |high - prevClose|.
        let highs = vec![102.0, 110.0];
        let lows = vec![100.0, 108.0];
        let closes = vec![101.0, 109.0];
        let out = atr(&highs, &lows, &closes, 2);

        // TR = [2, max(2, |110-101|, |108-101|)] = [2, 9]; seed mean = 5.5
        assert_close(out[1], 5.5, 1e-9);
    }

    #[test]
    fn test_atr_length_mismatch_all_sentinel() {
        let out = atr(&[1.0, 2.0], &[1.0], &[1.0, 2.0], 1);
        assert!(out.iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_vwap_cumulative() {
        let prices = [10.0, 20.0, 30.0];
        let volumes = [1.0, 1.0, 2.0];
        let out = vwap(&prices, &volumes);

        assert_close(out[0], 10.0, 1e-12);
        assert_close(out[1], 15.0, 1e-12);
        assert_close(out[2], (10.0 + 20.0 + 60.0) / 4.0, 1e-12);
    }

    #[test]
    fn test_vwap_zero_volume_prefix() {
        let out = vwap(&[10.0, 20.0], &[0.0, 5.0]);
        assert!(out[0].is_nan());
        assert_close(out[1], 20.0, 1e-12);
    }

    #[test]
    fn test_bollinger_reference_window() {
        // Window [1..=5]: mean 3, population variance 2
        let series = [1.0, 2.0, 3.0, 4.0, 5.0];
        let bands = bollinger(&series, 5, 2.0);

        let std = 2.0f64.sqrt();
        assert_close(bands.middle[4], 3.0, 1e-12);
        assert_close(bands.upper[4], 3.0 + 2.0 * std, 1e-12);
        assert_close(bands.lower[4], 3.0 - 2.0 * std, 1e-12);
        assert_close(bands.band_width[4], 4.0 * std / 3.0, 1e-12);
        assert!(bands.middle[3].is_nan());
    }

    #[test]
    fn test_bollinger_band_width_non_negative() {
        let series: Vec<f64> = (0..50)
            .map(|i| 68_000.0 + ((i * 37) % 11) as f64 - 5.0)
            .collect();
        let bands = bollinger(&series, 20, 2.0);

        for w in bands.band_width.iter().filter(|w| !w.is_nan()) {
            assert!(*w >= 0.0);
        }
    }

    #[test]
    fn test_bollinger_precision_at_large_price_levels() {
        // Large price level, tiny variance: the naive expansion loses
        // precision here; the two-pass form must not.
        let base = 1_000_000.0;
        let series: Vec<f64> = (0..20).map(|i| base + (i % 2) as f64 * 0.01).collect();
        let bands = bollinger(&series, 20, 2.0);

        // Population std of a 50/50 two-point distribution {0, 0.01} is 0.005.
        let std = (bands.upper[19] - bands.middle[19]) / 2.0;
        assert_close(std, 0.005, 1e-9);
    }

    #[test]
    fn test_full_length_invariant() {
        let series = [1.0, 2.0, 3.0];
        assert_eq!(sma(&series, 2).len(), 3);
        assert_eq!(ema(&series, 2).len(), 3);
        assert_eq!(rsi(&series, 2).len(), 3);
        assert_eq!(vwap(&series, &series).len(), 3);
        let bands = bollinger(&series, 2, 2.0);
        assert_eq!(bands.middle.len(), 3);
        assert_eq!(bands.band_width.len(), 3);
    }
}
