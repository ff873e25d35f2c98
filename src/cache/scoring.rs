//! Eviction and retention scores.

use super::entry::CacheEntry;

const MS_PER_HOUR: f64 = 3_600_000.0;
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
/// Quality floor so zero-quality entries rank as most evictable instead of dividing by zero.
const MIN_QUALITY: f64 = 0.01;

/// Space-reclamation rank: higher is evicted first (stale and low quality).
///
/// Idle time is offset by 1ms so quality still orders entries touched in the same instant.
pub fn eviction_score<T>(entry: &CacheEntry<T>, now_ms: i64) -> f64 {
    let idle_ms = (now_ms - entry.last_accessed).max(0) as f64 + 1.0;
    idle_ms / entry.quality.max(MIN_QUALITY)
}

/// Composite retention score used by `optimize()`: lower is removed first.
///
/// `quality×30 + min(accesses×5, 25) + max(0, 20−ageHours) + max(0, 15−idleHours) + max(0, 10−sizeMB)`
pub fn retention_score<T>(entry: &CacheEntry<T>, now_ms: i64) -> f64 {
    let age_hours = (now_ms - entry.created_at).max(0) as f64 / MS_PER_HOUR;
    let idle_hours = (now_ms - entry.last_accessed).max(0) as f64 / MS_PER_HOUR;
    let size_mb = entry.size as f64 / BYTES_PER_MB;

    entry.quality * 30.0
        + (entry.access_count as f64 * 5.0).min(25.0)
        + (20.0 - age_hours).max(0.0)
        + (15.0 - idle_hours).max(0.0)
        + (10.0 - size_mb).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::entry::StoredValue;
    use std::collections::BTreeSet;

    fn entry(quality: f64, access_count: u64, created_at: i64, last_accessed: i64) -> CacheEntry<()> {
        CacheEntry {
            value: StoredValue::Raw(()),
            created_at,
            expires_at: created_at + 1,
            access_count,
            last_accessed,
            quality,
            size: 0,
            tags: BTreeSet::new(),
        }
    }

    #[test]
    fn test_retention_score_fresh_entry() {
        let e = entry(1.0, 0, 0, 0);
        // 30 + 0 + 20 + 15 + 10
        assert!((retention_score(&e, 0) - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_retention_access_bonus_caps_at_25() {
        let e = entry(0.0, 100, 0, 0);
        assert!((retention_score(&e, 0) - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_retention_decays_with_age_and_idle() {
        let e = entry(0.5, 0, 0, 0);
        let hours = |h: i64| h * 3_600_000;
        let later = retention_score(&e, hours(30));
        // 15 + 0 + 0 + 0 + 10
        assert!((later - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_eviction_prefers_low_quality_and_stale() {
        let fresh_good = entry(0.9, 0, 0, 1_000);
        let fresh_bad = entry(0.1, 0, 0, 1_000);
        let stale_good = entry(0.9, 0, 0, 0);
        assert!(eviction_score(&fresh_bad, 1_000) > eviction_score(&fresh_good, 1_000));
        assert!(eviction_score(&stale_good, 1_000) > eviction_score(&fresh_good, 1_000));
    }
}
