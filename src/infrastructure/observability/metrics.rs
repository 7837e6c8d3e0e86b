//! Prometheus metrics definitions for the analytics engine.
//!
//! All metrics use the `candlelab_` prefix. The engine only exposes them
//! through read accessors; export transport is the caller's concern.

use prometheus::{
    core::{AtomicF64, GenericGauge},
    CounterVec, Gauge, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

/// Engine-level metrics registry.
#[derive(Clone)]
pub struct EngineMetrics {
    registry: Arc<Registry>,
    /// Analyses performed, by symbol and timeframe
    pub analyses_total: CounterVec,
    /// Analysis failures, by error kind
    pub analysis_errors_total: CounterVec,
    /// Cache hits observed by the engine
    pub cache_hits_total: IntCounter,
    /// Cache misses observed by the engine
    pub cache_misses_total: IntCounter,
    /// Indicator compute latency in seconds
    pub compute_latency_seconds: Histogram,
    /// Tasks currently executing in the scheduler
    pub tasks_in_flight: GenericGauge<AtomicF64>,
    /// Tasks completed across all batches
    pub tasks_completed_total: IntCounter,
}

impl EngineMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let analyses_total = CounterVec::new(
            Opts::new(
                "candlelab_analyses_total",
                "Analyses performed by symbol and timeframe",
            ),
            &["symbol", "timeframe"],
        )?;
        registry.register(Box::new(analyses_total.clone()))?;

        let analysis_errors_total = CounterVec::new(
            Opts::new(
                "candlelab_analysis_errors_total",
                "Analysis failures by error kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(analysis_errors_total.clone()))?;

        let cache_hits_total = IntCounter::with_opts(Opts::new(
            "candlelab_cache_hits_total",
            "Indicator cache hits",
        ))?;
        registry.register(Box::new(cache_hits_total.clone()))?;

        let cache_misses_total = IntCounter::with_opts(Opts::new(
            "candlelab_cache_misses_total",
            "Indicator cache misses",
        ))?;
        registry.register(Box::new(cache_misses_total.clone()))?;

        let compute_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "candlelab_compute_latency_seconds",
                "Indicator computation latency in seconds",
            )
            .buckets(vec![
                0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5,
            ]),
        )?;
        registry.register(Box::new(compute_latency_seconds.clone()))?;

        let tasks_in_flight = Gauge::with_opts(Opts::new(
            "candlelab_tasks_in_flight",
            "Tasks currently executing in the scheduler",
        ))?;
        registry.register(Box::new(tasks_in_flight.clone()))?;

        let tasks_completed_total = IntCounter::with_opts(Opts::new(
            "candlelab_tasks_completed_total",
            "Tasks completed across all batches",
        ))?;
        registry.register(Box::new(tasks_completed_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            analyses_total,
            analysis_errors_total,
            cache_hits_total,
            cache_misses_total,
            compute_latency_seconds,
            tasks_in_flight,
            tasks_completed_total,
        })
    }

    /// Renders the registry in the Prometheus text exposition format.
    pub fn gather(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        Ok(encoder.encode_to_string(&self.registry.gather())?)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
