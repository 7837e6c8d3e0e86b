use thiserror::Error;

/// Errors produced by the analytics engine.
///
/// Degraded-but-successful paths (e.g. insufficient indicator lookback)
/// do not surface here; they yield NaN-filled output instead.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    #[error("Submission queue full: capacity {capacity}")]
    Capacity { capacity: usize },

    #[error("Task cancelled: {reason}")]
    Cancelled { reason: String },

    #[error("Scheduler shut down: {reason}")]
    Shutdown { reason: String },

    #[error("Computation failed: {reason}")]
    Computation { reason: String },
}

impl AnalyticsError {
    pub fn validation(reason: impl Into<String>) -> Self {
        AnalyticsError::Validation {
            reason: reason.into(),
        }
    }

    pub fn computation(reason: impl Into<String>) -> Self {
        AnalyticsError::Computation {
            reason: reason.into(),
        }
    }

    /// True for errors that indicate the caller should back off and retry,
    /// as opposed to a permanently failing input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnalyticsError::Capacity { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_formatting() {
        let err = AnalyticsError::validation("unknown timeframe '7m'");
        let msg = err.to_string();
        assert!(msg.contains("Validation failed"));
        assert!(msg.contains("7m"));
    }

    #[test]
    fn test_capacity_is_retryable() {
        let err = AnalyticsError::Capacity { capacity: 1000 };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("1000"));

        let err = AnalyticsError::computation("mixed symbols");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_cancelled_distinguishable_from_computation() {
        let cancelled = AnalyticsError::Cancelled {
            reason: "deadline exceeded".to_string(),
        };
        assert!(matches!(cancelled, AnalyticsError::Cancelled { .. }));
        assert!(!matches!(cancelled, AnalyticsError::Computation { .. }));
    }
}
