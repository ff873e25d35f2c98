use serde::Serialize;

/// Snapshot of cache counters. All fields are zero for a fresh cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub current_size: usize,
    pub max_size: usize,
    pub utilization: f64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub evictions: u64,
    pub expirations: u64,
    pub invalidations: u64,
    pub compressed_entries: usize,
    pub persist_flushes: u64,
    pub persist_failures: u64,
}

/// Outcome of one [`ResponseCache::optimize`](super::ResponseCache::optimize) pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OptimizeReport {
    /// Entries removed, expired ones included.
    pub removed: usize,
    /// Bytes released.
    pub freed: usize,
    /// Of `removed`, how many were already past `expires_at`.
    pub expired: usize,
}
