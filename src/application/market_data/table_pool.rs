use crate::application::market_data::table::CandleTable;
use std::collections::HashSet;
use std::sync::Mutex;

/// Pool statistics snapshot.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    pub created: u64,
    pub reused: u64,
    pub returned: u64,
}

struct PoolInner {
    free: Vec<CandleTable>,
    /// Ids of tables currently sitting in `free`; release of an id already
    /// present is a no-op.
    pooled_ids: HashSet<u64>,
    stats: PoolStats,
}

/// Bounds allocation churn by recycling columnar tables across calls.
///
/// A table moves Free -> InUse on `acquire` and back on `release`. A
/// released table must never be read again by the releasing caller.
pub struct TablePool {
    inner: Mutex<PoolInner>,
    max_size: usize,
}

impl std::fmt::Debug for TablePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TablePool")
            .field("max_size", &self.max_size)
            .finish()
    }
}

impl TablePool {
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Mutex::new(PoolInner {
                free: Vec::with_capacity(max_size),
                pooled_ids: HashSet::with_capacity(max_size),
                stats: PoolStats::default(),
            }),
            max_size,
        }
    }

    /// Returns a reset, ready-to-use table, reusing a pooled one when
    /// available.
    pub fn acquire(&self) -> CandleTable {
        let mut inner = self.lock();

        if let Some(table) = inner.free.pop() {
            inner.pooled_ids.remove(&table.id());
            inner.stats.reused += 1;
            tracing::debug!("TablePool: reusing table {}", table.id());
            table
        } else {
            inner.stats.created += 1;
            CandleTable::new()
        }
    }

    /// Clears the table and returns it for reuse. Beyond `max_size` the
    /// table is dropped. Releasing a table that is already pooled is a
    /// no-op.
    pub fn release(&self, mut table: CandleTable) {
        table.clear();

        let mut inner = self.lock();

        if inner.pooled_ids.contains(&table.id()) {
            tracing::warn!("TablePool: double release of table {} ignored", table.id());
            return;
        }

        if inner.free.len() >= self.max_size {
            // Pool full; let the table drop.
            return;
        }

        inner.pooled_ids.insert(table.id());
        inner.free.push(table);
        inner.stats.returned += 1;
    }

    pub fn available(&self) -> usize {
        self.lock().free.len()
    }

    pub fn stats(&self) -> PoolStats {
        self.lock().stats
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PoolInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("TablePool: lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
