use prometheus::core::{AtomicF64, GenericGauge};
use prometheus::Histogram;
use std::time::Instant;

/// RAII guard that tracks one in-flight operation: increments the gauge on
/// construction, then records elapsed time and decrements on drop.
pub struct LatencyGuard {
    start: Instant,
    histogram: Histogram,
    in_flight: Option<GenericGauge<AtomicF64>>,
}

impl LatencyGuard {
    pub fn new(histogram: Histogram) -> Self {
        Self {
            start: Instant::now(),
            histogram,
            in_flight: None,
        }
    }

    /// Additionally tracks the operation on an in-flight gauge.
    pub fn with_in_flight(histogram: Histogram, gauge: GenericGauge<AtomicF64>) -> Self {
        gauge.inc();
        Self {
            start: Instant::now(),
            histogram,
            in_flight: Some(gauge),
        }
    }
}

impl Drop for LatencyGuard {
    fn drop(&mut self) {
        self.histogram.observe(self.start.elapsed().as_secs_f64());
        if let Some(gauge) = &self.in_flight {
            gauge.dec();
        }
    }
}
