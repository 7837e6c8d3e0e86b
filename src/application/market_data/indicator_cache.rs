use crate::application::market_data::indicator_set::IndicatorSet;
use crate::domain::clock::Clock;
use crate::domain::errors::AnalyticsError;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

/// Deterministic cache key for one computed indicator set.
///
/// The digest covers symbol, timeframe label, window bounds, the sorted
/// indicator-name list and a data-version tag; any schema change bumps the
/// version instead of keeping parallel implementations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    digest: String,
    symbol: String,
}

impl CacheKey {
    pub fn new(
        symbol: &str,
        timeframe_label: &str,
        window_start_ms: i64,
        window_end_ms: i64,
        indicator_names: &[String],
        data_version: u32,
    ) -> Self {
        let mut names: Vec<&str> = indicator_names.iter().map(|s| s.as_str()).collect();
        names.sort_unstable();

        let mut hasher = Sha256::new();
        hasher.update(symbol.as_bytes());
        hasher.update(b"|");
        hasher.update(timeframe_label.as_bytes());
        hasher.update(b"|");
        hasher.update(window_start_ms.to_be_bytes());
        hasher.update(window_end_ms.to_be_bytes());
        for name in &names {
            hasher.update(name.as_bytes());
            hasher.update(b",");
        }
        hasher.update(data_version.to_be_bytes());

        Self {
            digest: hex::encode(hasher.finalize()),
            symbol: symbol.to_string(),
        }
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

struct CacheEntry {
    value: Arc<IndicatorSet>,
    symbol: String,
    created_at_ms: i64,
    expires_at_ms: i64,
}

impl CacheEntry {
    fn is_valid(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at_ms
    }
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub total_requests: u64,
    pub hit_rate: f64,
    pub evictions: u64,
    /// Exponential moving average of compute latency in milliseconds
    /// (alpha = 0.1).
    pub ema_compute_latency_ms: f64,
    pub entries: usize,
}

const LATENCY_EMA_ALPHA: f64 = 0.1;

/// TTL-bounded store of computed indicator sets.
///
/// Entries are valid while `now < expiry` and lazily evicted on access
/// otherwise. Writes are last-writer-wins; values are deterministic
/// functions of the key, so concurrent recomputation is wasteful but
/// never incorrect.
pub struct IndicatorCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
    capacity: usize,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    latency_ema_ms: Mutex<Option<f64>>,
}

impl std::fmt::Debug for IndicatorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorCache")
            .field("capacity", &self.capacity)
            .finish()
    }
}

impl IndicatorCache {
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
            capacity,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
            latency_ema_ms: Mutex::new(None),
        }
    }

    /// Returns the cached set if present and unexpired. An expired entry
    /// counts as a miss and is evicted on the spot.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<IndicatorSet>> {
        let now_ms = self.clock.now_millis();

        {
            let entries = self.read_entries();
            match entries.get(key.digest()) {
                Some(entry) if entry.is_valid(now_ms) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return Some(entry.value.clone());
                }
                Some(_) => {} // expired; fall through to evict
                None => {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
            }
        }

        let mut entries = self.write_entries();
        // Re-check under the write lock; another thread may have replaced
        // the entry with a fresh one.
        match entries.get(key.digest()) {
            Some(entry) if entry.is_valid(now_ms) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            Some(_) => {
                entries.remove(key.digest());
                self.evictions.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("IndicatorCache: expired entry evicted for {}", key.symbol());
                None
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Inserts or wholesale-replaces the entry; no partial mutation.
    pub fn set(&self, key: &CacheKey, value: Arc<IndicatorSet>, ttl: Duration) {
        let now_ms = self.clock.now_millis();
        let entry = CacheEntry {
            value,
            symbol: key.symbol().to_string(),
            created_at_ms: now_ms,
            expires_at_ms: now_ms + ttl.as_millis() as i64,
        };

        let mut entries = self.write_entries();
        entries.insert(key.digest().to_string(), entry);
        self.enforce_capacity(&mut entries, now_ms);
    }

    /// The standard call pattern: serve a valid entry, otherwise compute,
    /// store, and serve. Concurrent identical computations are permitted
    /// (last writer wins).
    pub fn get_or_compute<F>(
        &self,
        key: &CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<Arc<IndicatorSet>, AnalyticsError>
    where
        F: FnOnce() -> Result<IndicatorSet, AnalyticsError>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }

        let started = Instant::now();
        let value = Arc::new(compute()?);
        self.observe_latency(started.elapsed());

        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    /// Loads a serialized indicator-set snapshot. A snapshot that fails to
    /// deserialize is treated as a miss: nothing is stored, any stale
    /// entry under the key is evicted, and corrupted data is never served.
    pub fn load_snapshot(&self, key: &CacheKey, snapshot_json: &str, ttl: Duration) -> bool {
        match serde_json::from_str::<IndicatorSet>(snapshot_json) {
            Ok(set) => {
                self.set(key, Arc::new(set), ttl);
                true
            }
            Err(e) => {
                tracing::warn!(
                    "IndicatorCache: discarding corrupt snapshot for {}: {}",
                    key.symbol(),
                    e
                );
                if self.write_entries().remove(key.digest()).is_some() {
                    self.evictions.fetch_add(1, Ordering::Relaxed);
                }
                false
            }
        }
    }

    /// Removes one entry. Returns true if it existed.
    pub fn delete(&self, key: &CacheKey) -> bool {
        self.write_entries().remove(key.digest()).is_some()
    }

    /// Best-effort pattern invalidation: drops every entry for a symbol.
    pub fn invalidate_symbol(&self, symbol: &str) -> usize {
        let mut entries = self.write_entries();
        let before = entries.len();
        entries.retain(|_, entry| entry.symbol != symbol);
        let removed = before - entries.len();
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
        removed
    }

    pub fn clear(&self) {
        let mut entries = self.write_entries();
        let removed = entries.len();
        entries.clear();
        self.evictions.fetch_add(removed as u64, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_entries().is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            total_requests: total,
            hit_rate: if total > 0 { hits as f64 / total as f64 } else { 0.0 },
            evictions: self.evictions.load(Ordering::Relaxed),
            ema_compute_latency_ms: self.latency_ema().unwrap_or(0.0),
            entries: self.len(),
        }
    }

    /// Expired entries are purged first; if still over capacity, the
    /// oldest-created entries go.
    fn enforce_capacity(&self, entries: &mut HashMap<String, CacheEntry>, now_ms: i64) {
        if entries.len() <= self.capacity {
            return;
        }

        let before = entries.len();
        entries.retain(|_, entry| entry.is_valid(now_ms));

        while entries.len() > self.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at_ms)
                .map(|(digest, _)| digest.clone());
            match oldest {
                Some(digest) => {
                    entries.remove(&digest);
                }
                None => break,
            }
        }

        let evicted = before - entries.len();
        self.evictions.fetch_add(evicted as u64, Ordering::Relaxed);
    }

    fn observe_latency(&self, elapsed: Duration) {
        let sample_ms = elapsed.as_secs_f64() * 1000.0;
        let mut ema = match self.latency_ema_ms.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *ema = Some(match *ema {
            Some(prev) => LATENCY_EMA_ALPHA * sample_ms + (1.0 - LATENCY_EMA_ALPHA) * prev,
            None => sample_ms,
        });
    }

    fn latency_ema(&self) -> Option<f64> {
        match self.latency_ema_ms.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("IndicatorCache: read lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("IndicatorCache: write lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
