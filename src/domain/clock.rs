use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Injectable time source driving interval alignment and cache expiry.
///
/// Production code uses [`SystemClock`]; tests use [`ManualClock`] to make
/// TTL behavior deterministic.
pub trait Clock: Send + Sync {
    /// Current Unix timestamp in milliseconds (UTC).
    fn now_millis(&self) -> i64;
}

/// Wall-clock backed by `chrono::Utc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually advanced clock for deterministic tests.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now_ms: Arc::new(AtomicI64::new(start_ms)),
        }
    }

    pub fn advance_millis(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    pub fn set_millis(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(1_704_067_200_000);
        assert_eq!(clock.now_millis(), 1_704_067_200_000);

        clock.advance_millis(60_000);
        assert_eq!(clock.now_millis(), 1_704_067_260_000);
    }

    #[test]
    fn test_manual_clock_shared_across_clones() {
        let clock = ManualClock::new(0);
        let other = clock.clone();
        clock.advance_millis(500);
        assert_eq!(other.now_millis(), 500);
    }

    #[test]
    fn test_system_clock_is_sane() {
        // 2024-01-01 as a lower bound
        assert!(SystemClock.now_millis() > 1_704_067_200_000);
    }
}
