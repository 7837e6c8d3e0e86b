use crate::domain::errors::AnalyticsError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported aggregation intervals.
///
/// The set is closed: any other label is rejected at the validation
/// boundary rather than silently defaulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    OneMin,
    ThreeMin,
    FiveMin,
    FifteenMin,
    ThirtyMin,
    OneHour,
    FourHour,
    OneDay,
}

impl Timeframe {
    /// Duration of this timeframe in minutes.
    pub fn to_minutes(&self) -> usize {
        match self {
            Timeframe::OneMin => 1,
            Timeframe::ThreeMin => 3,
            Timeframe::FiveMin => 5,
            Timeframe::FifteenMin => 15,
            Timeframe::ThirtyMin => 30,
            Timeframe::OneHour => 60,
            Timeframe::FourHour => 240,
            Timeframe::OneDay => 1440,
        }
    }

    /// Duration in seconds.
    pub fn to_seconds(&self) -> i64 {
        (self.to_minutes() * 60) as i64
    }

    /// Duration in milliseconds.
    pub fn to_millis(&self) -> i64 {
        self.to_seconds() * 1000
    }

    /// Canonical short label ("1m", "4h", ...). Stable: used in cache keys.
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::OneMin => "1m",
            Timeframe::ThreeMin => "3m",
            Timeframe::FiveMin => "5m",
            Timeframe::FifteenMin => "15m",
            Timeframe::ThirtyMin => "30m",
            Timeframe::OneHour => "1h",
            Timeframe::FourHour => "4h",
            Timeframe::OneDay => "1d",
        }
    }

    /// All supported timeframes in ascending order.
    pub fn all() -> Vec<Timeframe> {
        vec![
            Timeframe::OneMin,
            Timeframe::ThreeMin,
            Timeframe::FiveMin,
            Timeframe::FifteenMin,
            Timeframe::ThirtyMin,
            Timeframe::OneHour,
            Timeframe::FourHour,
            Timeframe::OneDay,
        ]
    }

    /// Checks if a timestamp aligns with the start of this timeframe period.
    pub fn is_period_start(&self, timestamp_ms: i64) -> bool {
        self.period_start(timestamp_ms) == timestamp_ms
    }

    /// Returns the start timestamp (ms) of the period containing `timestamp_ms`.
    ///
    /// Sub-hour intervals truncate on minute-of-hour boundaries (a 5m bucket
    /// minute is `(minute / 5) * 5`); hourly and above truncate on hour/day
    /// boundaries in UTC.
    pub fn period_start(&self, timestamp_ms: i64) -> i64 {
        let timestamp_sec = timestamp_ms.div_euclid(1000);
        let period_sec = self.to_seconds();

        let period_start_sec = match self {
            Timeframe::OneDay => timestamp_sec - timestamp_sec.rem_euclid(86_400),
            _ => timestamp_sec - timestamp_sec.rem_euclid(period_sec),
        };

        period_start_sec * 1000
    }
}

/// Validate a raw timeframe label, rejecting anything outside the
/// enumerated set.
pub fn validate_timeframe(label: &str) -> Result<Timeframe, AnalyticsError> {
    Timeframe::from_str(label)
}

impl FromStr for Timeframe {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "1m" | "1min" | "onemin" => Ok(Timeframe::OneMin),
            "3m" | "3min" | "threemin" => Ok(Timeframe::ThreeMin),
            "5m" | "5min" | "fivemin" => Ok(Timeframe::FiveMin),
            "15m" | "15min" | "fifteenmin" => Ok(Timeframe::FifteenMin),
            "30m" | "30min" | "thirtymin" => Ok(Timeframe::ThirtyMin),
            "1h" | "1hour" | "onehour" => Ok(Timeframe::OneHour),
            "4h" | "4hour" | "fourhour" => Ok(Timeframe::FourHour),
            "1d" | "1day" | "oneday" => Ok(Timeframe::OneDay),
            _ => Err(AnalyticsError::validation(format!(
                "Invalid timeframe: '{}'. Valid options: 1m, 3m, 5m, 15m, 30m, 1h, 4h, 1d",
                s
            ))),
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_minutes() {
        assert_eq!(Timeframe::OneMin.to_minutes(), 1);
        assert_eq!(Timeframe::ThreeMin.to_minutes(), 3);
        assert_eq!(Timeframe::FiveMin.to_minutes(), 5);
        assert_eq!(Timeframe::ThirtyMin.to_minutes(), 30);
        assert_eq!(Timeframe::FourHour.to_minutes(), 240);
        assert_eq!(Timeframe::OneDay.to_minutes(), 1440);
    }

    #[test]
    fn test_from_str() {
        assert_eq!(Timeframe::from_str("1m").unwrap(), Timeframe::OneMin);
        assert_eq!(Timeframe::from_str("3Min").unwrap(), Timeframe::ThreeMin);
        assert_eq!(Timeframe::from_str("30m").unwrap(), Timeframe::ThirtyMin);
        assert_eq!(Timeframe::from_str("1h").unwrap(), Timeframe::OneHour);
        assert_eq!(Timeframe::from_str("4Hour").unwrap(), Timeframe::FourHour);
        assert_eq!(Timeframe::from_str("1d").unwrap(), Timeframe::OneDay);
    }

    #[test]
    fn test_from_str_rejects_unknown_labels() {
        for label in ["2m", "7m", "1w", "daily", "", "60"] {
            let err = validate_timeframe(label).unwrap_err();
            assert!(
                matches!(err, AnalyticsError::Validation { .. }),
                "expected validation error for {:?}",
                label
            );
        }
    }

    #[test]
    fn test_period_start_five_min() {
        let tf = Timeframe::FiveMin;
        // 2024-01-01 00:00:00 UTC
        let base = 1_704_067_200_000i64;

        assert_eq!(tf.period_start(base), base);
        assert_eq!(tf.period_start(base + 3 * 60 * 1000), base);
        assert_eq!(tf.period_start(base + 5 * 60 * 1000), base + 5 * 60 * 1000);
        assert_eq!(tf.period_start(base + 7 * 60 * 1000 + 123), base + 5 * 60 * 1000);
    }

    #[test]
    fn test_period_start_hour_and_day() {
        let base = 1_704_067_200_000i64; // midnight UTC
        let mid_morning = base + (10 * 3600 + 42 * 60) * 1000; // 10:42:00

        assert_eq!(Timeframe::OneHour.period_start(mid_morning), base + 10 * 3600 * 1000);
        assert_eq!(Timeframe::FourHour.period_start(mid_morning), base + 8 * 3600 * 1000);
        assert_eq!(Timeframe::OneDay.period_start(mid_morning), base);
    }

    #[test]
    fn test_is_period_start() {
        let tf = Timeframe::FiveMin;
        let base = 1_704_067_200_000i64;

        assert!(tf.is_period_start(base));
        assert!(tf.is_period_start(base + 5 * 60 * 1000));
        assert!(!tf.is_period_start(base + 3 * 60 * 1000));
    }

    #[test]
    fn test_label_round_trip() {
        for tf in Timeframe::all() {
            assert_eq!(Timeframe::from_str(tf.label()).unwrap(), tf);
        }
    }
}
