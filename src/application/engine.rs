use crate::application::market_data::aggregator::aggregate;
use crate::application::market_data::indicator_cache::{CacheKey, CacheStats, IndicatorCache};
use crate::application::market_data::indicator_set::{compute_set, IndicatorKind, IndicatorSet};
use crate::application::market_data::table::{CandleTable, TimestampContext};
use crate::application::market_data::table_pool::{PoolStats, TablePool};
use crate::application::scheduler::worker_pool::{Task, TaskResult, WorkerPool, WorkerPoolConfig};
use crate::config::EngineConfig;
use crate::domain::clock::{Clock, SystemClock};
use crate::domain::errors::AnalyticsError;
use crate::domain::market::candle::{AggregatedCandle, Candle};
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ports::CandleSource;
use crate::infrastructure::observability::latency_tracker::LatencyGuard;
use crate::infrastructure::observability::metrics::EngineMetrics;
use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Bumped whenever the shape or semantics of cached indicator sets
/// change, so stale entries age out instead of being misread.
pub const DATA_VERSION: u32 = 1;

/// One instrument's analysis request.
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub symbol: String,
    pub candles: Vec<Candle>,
    pub timeframe: Timeframe,
    pub indicators: Vec<IndicatorKind>,
    pub context: TimestampContext,
    /// Optional per-task deadline when run through `analyze_batch`.
    pub timeout: Option<Duration>,
}

/// Output of one pipeline run.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub window_start_ms: i64,
    pub window_end_ms: i64,
    /// Aggregated candles at the target timeframe.
    pub candles: Vec<AggregatedCandle>,
    pub indicators: Arc<IndicatorSet>,
    pub from_cache: bool,
}

struct EngineCore {
    config: EngineConfig,
    cache: IndicatorCache,
    table_pool: TablePool,
    metrics: Option<EngineMetrics>,
}

/// Facade over the full pipeline: adapter -> aggregator -> indicators,
/// with the cache, table pool and scheduler wired in as owned,
/// explicitly constructed instances.
#[derive(Clone)]
pub struct AnalyticsEngine {
    core: Arc<EngineCore>,
}

impl AnalyticsEngine {
    pub fn new(config: EngineConfig) -> anyhow::Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Injectable clock variant for deterministic TTL behavior in tests.
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        config.validate().map_err(|e| anyhow::anyhow!(e))?;

        let metrics = if config.enable_metrics {
            Some(EngineMetrics::new()?)
        } else {
            None
        };

        let cache = IndicatorCache::new(config.cache_capacity, clock);
        let table_pool = TablePool::new(config.table_pool_size);

        info!(
            "AnalyticsEngine: initialized (workers={}, queue={}, cache_ttl={:?})",
            config.worker_count, config.queue_capacity, config.cache_ttl
        );

        Ok(Self {
            core: Arc::new(EngineCore {
                config,
                cache,
                table_pool,
                metrics,
            }),
        })
    }

    /// Runs the pipeline for one instrument synchronously.
    pub fn analyze(&self, job: &AnalysisJob) -> Result<AnalysisReport, AnalyticsError> {
        self.core.analyze(job)
    }

    /// Fans a batch of independent jobs out over a bounded worker pool and
    /// fans the results back in. Per-job failures (including capacity
    /// rejections) are isolated in the returned results; they never abort
    /// sibling jobs.
    pub fn analyze_batch(
        &self,
        jobs: Vec<AnalysisJob>,
        wait_timeout: Duration,
    ) -> Result<Vec<TaskResult<AnalysisReport>>, AnalyticsError> {
        let pool: WorkerPool<AnalysisReport> = WorkerPool::new(WorkerPoolConfig {
            workers: self.core.config.worker_count,
            queue_capacity: self.core.config.queue_capacity,
            shutdown_grace: self.core.config.shutdown_grace,
        });
        pool.start()?;

        let mut results: Vec<TaskResult<AnalysisReport>> = Vec::with_capacity(jobs.len());
        let mut submitted = 0usize;

        for job in jobs {
            let timeout = job.timeout;
            let core = self.core.clone();
            let mut task = Task::new(move |token| {
                if token.is_cancelled() {
                    return Err(AnalyticsError::Cancelled {
                        reason: "cancelled before analysis".to_string(),
                    });
                }
                core.analyze(&job)
            });
            if let Some(timeout) = timeout {
                task = task.with_timeout(timeout);
            }

            let task_id = task.id;
            match pool.submit(task) {
                Ok(_) => submitted += 1,
                Err(error) => {
                    // Rejected before it ever ran; surface it alongside the
                    // real results so the caller can decide retry/drop/shed.
                    results.push(TaskResult {
                        id: task_id,
                        output: None,
                        error: Some(error),
                        duration: Duration::ZERO,
                        worker_id: usize::MAX,
                    });
                }
            }
        }

        pool.wait(wait_timeout);
        for _ in 0..submitted {
            match pool.next_result(Duration::from_millis(100)) {
                Some(result) => {
                    if let Some(metrics) = &self.core.metrics {
                        metrics.tasks_completed_total.inc();
                    }
                    results.push(result);
                }
                None => break,
            }
        }

        let stats = pool.stats();
        debug!(
            "analyze_batch: {} submitted, {} completed, avg {:.2}ms",
            stats.submitted, stats.completed, stats.avg_processing_ms
        );
        pool.shutdown();

        Ok(results)
    }

    /// Pulls candles from the injected source, then runs the pipeline.
    pub async fn fetch_and_analyze(
        &self,
        source: &dyn CandleSource,
        symbol: &str,
        start_ms: i64,
        end_ms: i64,
        base_interval: Timeframe,
        timeframe: Timeframe,
        indicators: Vec<IndicatorKind>,
    ) -> anyhow::Result<AnalysisReport> {
        let candles = source
            .fetch_candles(symbol, start_ms, end_ms, base_interval)
            .await?;

        let job = AnalysisJob {
            symbol: symbol.to_string(),
            candles,
            timeframe,
            indicators,
            context: TimestampContext::External,
            timeout: None,
        };
        Ok(self.analyze(&job)?)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.core.cache.stats()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.core.table_pool.stats()
    }

    /// Drops every cached entry for a symbol (best-effort pattern
    /// invalidation). Returns the number removed.
    pub fn invalidate_symbol(&self, symbol: &str) -> usize {
        self.core.cache.invalidate_symbol(symbol)
    }

    pub fn clear_cache(&self) {
        self.core.cache.clear();
    }

    /// Prometheus text exposition of engine metrics, when enabled.
    pub fn metrics_text(&self) -> Option<String> {
        self.core
            .metrics
            .as_ref()
            .and_then(|m| m.gather().ok())
    }
}

impl EngineCore {
    fn analyze(&self, job: &AnalysisJob) -> Result<AnalysisReport, AnalyticsError> {
        let mut table = self.table_pool.acquire();
        let result = self.analyze_with_table(&mut table, job);
        self.table_pool.release(table);

        match &result {
            Ok(report) => {
                if let Some(metrics) = &self.metrics {
                    metrics
                        .analyses_total
                        .with_label_values(&[job.symbol.as_str(), job.timeframe.label()])
                        .inc();
                    if report.from_cache {
                        metrics.cache_hits_total.inc();
                    } else {
                        metrics.cache_misses_total.inc();
                    }
                }
            }
            Err(error) => {
                if let Some(metrics) = &self.metrics {
                    metrics
                        .analysis_errors_total
                        .with_label_values(&[error_kind(error)])
                        .inc();
                }
            }
        }
        result
    }

    fn analyze_with_table(
        &self,
        table: &mut CandleTable,
        job: &AnalysisJob,
    ) -> Result<AnalysisReport, AnalyticsError> {
        // Aggregation at the candles' own interval is the identity, so a
        // single unconditional pass covers both reshaped and pass-through
        // requests.
        let buckets = aggregate(&job.candles, job.timeframe)?;
        let working: Vec<Candle> = buckets.iter().cloned().map(|b| b.into_candle()).collect();
        table.load_candles(&working, job.context);

        let (window_start_ms, window_end_ms) = match (table.timestamps().first(), table.timestamps().last()) {
            (Some(first), Some(last)) => (*first, *last + job.timeframe.to_millis()),
            _ => (0, 0),
        };

        let labels: Vec<String> = job.indicators.iter().map(|k| k.label()).collect();

        let (indicators, from_cache) = if self.config.enable_caching {
            let key = CacheKey::new(
                &job.symbol,
                job.timeframe.label(),
                window_start_ms,
                window_end_ms,
                &labels,
                DATA_VERSION,
            );

            let computed = Cell::new(false);
            let value = self.cache.get_or_compute(&key, self.config.cache_ttl, || {
                computed.set(true);
                let _guard = self
                    .metrics
                    .as_ref()
                    .map(|m| LatencyGuard::new(m.compute_latency_seconds.clone()));
                compute_set(table, &job.indicators)
            })?;
            (value, !computed.get())
        } else {
            let _guard = self
                .metrics
                .as_ref()
                .map(|m| LatencyGuard::new(m.compute_latency_seconds.clone()));
            (Arc::new(compute_set(table, &job.indicators)?), false)
        };

        Ok(AnalysisReport {
            symbol: job.symbol.clone(),
            timeframe: job.timeframe,
            window_start_ms,
            window_end_ms,
            candles: buckets,
            indicators,
            from_cache,
        })
    }
}

fn error_kind(error: &AnalyticsError) -> &'static str {
    match error {
        AnalyticsError::Validation { .. } => "validation",
        AnalyticsError::Capacity { .. } => "capacity",
        AnalyticsError::Cancelled { .. } => "cancelled",
        AnalyticsError::Shutdown { .. } => "shutdown",
        AnalyticsError::Computation { .. } => "computation",
    }
}
