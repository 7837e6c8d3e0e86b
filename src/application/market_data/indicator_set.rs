use crate::application::market_data::indicators;
use crate::application::market_data::table::CandleTable;
use crate::domain::errors::AnalyticsError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A requested indicator with its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorKind {
    Sma { period: usize },
    Ema { period: usize },
    Rsi { period: usize },
    Atr { period: usize },
    Vwap,
    Bollinger { period: usize, multiplier: f64 },
}

impl IndicatorKind {
    /// Stable label; participates in cache keys, so renaming is a
    /// data-version bump.
    pub fn label(&self) -> String {
        match self {
            IndicatorKind::Sma { period } => format!("sma_{}", period),
            IndicatorKind::Ema { period } => format!("ema_{}", period),
            IndicatorKind::Rsi { period } => format!("rsi_{}", period),
            IndicatorKind::Atr { period } => format!("atr_{}", period),
            IndicatorKind::Vwap => "vwap".to_string(),
            IndicatorKind::Bollinger { period, multiplier } => {
                format!("bb_{}_{}", period, multiplier)
            }
        }
    }

    pub fn validate(&self) -> Result<(), AnalyticsError> {
        let period = match self {
            IndicatorKind::Sma { period }
            | IndicatorKind::Ema { period }
            | IndicatorKind::Rsi { period }
            | IndicatorKind::Atr { period } => *period,
            IndicatorKind::Vwap => return Ok(()),
            IndicatorKind::Bollinger { period, multiplier } => {
                if *multiplier <= 0.0 || !multiplier.is_finite() {
                    return Err(AnalyticsError::validation(format!(
                        "Bollinger multiplier must be positive and finite, got {}",
                        multiplier
                    )));
                }
                *period
            }
        };

        if period == 0 {
            return Err(AnalyticsError::validation(format!(
                "Indicator period must be >= 1 for {}",
                self.label()
            )));
        }
        Ok(())
    }
}

/// Named indicator series for one (symbol, timeframe, window) — every
/// series has one value per input timestamp.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IndicatorSet {
    pub series: BTreeMap<String, Vec<f64>>,
}

impl IndicatorSet {
    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    /// Series names in sorted order (BTreeMap iteration order).
    pub fn names(&self) -> Vec<String> {
        self.series.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Derives every requested indicator from the table in one pass over its
/// f64 column views. Parameters are validated up front; the numeric
/// functions themselves never fail on short input.
pub fn compute_set(
    table: &CandleTable,
    kinds: &[IndicatorKind],
) -> Result<IndicatorSet, AnalyticsError> {
    for kind in kinds {
        kind.validate()?;
    }

    let closes = table.closes_f64();
    let mut set = IndicatorSet::default();

    for kind in kinds {
        let label = kind.label();
        match kind {
            IndicatorKind::Sma { period } => {
                set.series.insert(label, indicators::sma(&closes, *period));
            }
            IndicatorKind::Ema { period } => {
                set.series.insert(label, indicators::ema(&closes, *period));
            }
            IndicatorKind::Rsi { period } => {
                set.series.insert(label, indicators::rsi(&closes, *period));
            }
            IndicatorKind::Atr { period } => {
                let highs = table.highs_f64();
                let lows = table.lows_f64();
                set.series
                    .insert(label, indicators::atr(&highs, &lows, &closes, *period));
            }
            IndicatorKind::Vwap => {
                let volumes = table.volumes_f64();
                set.series.insert(label, indicators::vwap(&closes, &volumes));
            }
            IndicatorKind::Bollinger { period, multiplier } => {
                let bands = indicators::bollinger(&closes, *period, *multiplier);
                set.series.insert(format!("{}_middle", label), bands.middle);
                set.series.insert(format!("{}_upper", label), bands.upper);
                set.series.insert(format!("{}_lower", label), bands.lower);
                set.series.insert(format!("{}_width", label), bands.band_width);
            }
        }
    }

    Ok(set)
}
