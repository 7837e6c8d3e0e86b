//! Configuration module for the analytics engine.
//!
//! Options load from `CANDLELAB_*` environment variables with documented
//! defaults; invalid values are rejected at load time rather than
//! silently defaulted.

use crate::domain::errors::AnalyticsError;
use crate::domain::market::timeframe::Timeframe;
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Recognized engine options.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum cached indicator sets before eviction. Default 1024.
    pub cache_capacity: usize,
    /// Cache entry time-to-live. Default 30 minutes.
    pub cache_ttl: Duration,
    /// Worker threads in the scheduler pool. Default 4.
    pub worker_count: usize,
    /// Bounded submission-queue capacity. Default 1000.
    pub queue_capacity: usize,
    /// Timeframe assumed when a caller does not specify one. Default 5m.
    pub default_timeframe: Timeframe,
    /// Serve indicator sets from the cache. Default true.
    pub enable_caching: bool,
    /// Register prometheus metrics. Default true.
    pub enable_metrics: bool,
    /// Columnar tables retained by the object pool. Default 16.
    pub table_pool_size: usize,
    /// Grace period for in-flight tasks at shutdown. Default 5 seconds.
    pub shutdown_grace: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1024,
            cache_ttl: Duration::from_secs(30 * 60),
            worker_count: 4,
            queue_capacity: 1000,
            default_timeframe: Timeframe::FiveMin,
            enable_caching: true,
            enable_metrics: true,
            table_pool_size: 16,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from the environment (and `.env` if present).
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            cache_capacity: parse_env("CANDLELAB_CACHE_CAPACITY", defaults.cache_capacity)?,
            cache_ttl: Duration::from_secs(parse_env(
                "CANDLELAB_CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )?),
            worker_count: parse_env("CANDLELAB_WORKER_COUNT", defaults.worker_count)?,
            queue_capacity: parse_env("CANDLELAB_QUEUE_CAPACITY", defaults.queue_capacity)?,
            default_timeframe: match env::var("CANDLELAB_DEFAULT_TIMEFRAME") {
                Ok(raw) => Timeframe::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!(e))
                    .context("CANDLELAB_DEFAULT_TIMEFRAME")?,
                Err(_) => defaults.default_timeframe,
            },
            enable_caching: parse_env_bool("CANDLELAB_ENABLE_CACHING", defaults.enable_caching)?,
            enable_metrics: parse_env_bool("CANDLELAB_ENABLE_METRICS", defaults.enable_metrics)?,
            table_pool_size: parse_env("CANDLELAB_TABLE_POOL_SIZE", defaults.table_pool_size)?,
            shutdown_grace: Duration::from_secs(parse_env(
                "CANDLELAB_SHUTDOWN_GRACE_SECS",
                defaults.shutdown_grace.as_secs(),
            )?),
        };

        config.validate().map_err(|e| anyhow::anyhow!(e))?;
        Ok(config)
    }

    /// Rejects configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), AnalyticsError> {
        if self.worker_count == 0 {
            return Err(AnalyticsError::validation("worker_count must be >= 1"));
        }
        if self.queue_capacity == 0 {
            return Err(AnalyticsError::validation("queue_capacity must be >= 1"));
        }
        if self.cache_capacity == 0 {
            return Err(AnalyticsError::validation("cache_capacity must be >= 1"));
        }
        if self.cache_ttl.is_zero() {
            return Err(AnalyticsError::validation("cache_ttl must be > 0"));
        }
        Ok(())
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} = '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}

fn parse_env_bool(key: &str, default: bool) -> Result<bool> {
    match env::var(key) {
        Ok(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => anyhow::bail!("{} must be a boolean, got '{}'", key, other),
        },
        Err(_) => Ok(default),
    }
}
