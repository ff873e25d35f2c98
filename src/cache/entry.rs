//! Cache entry model.

use std::collections::BTreeSet;
use std::sync::Arc;

/// A cached value, either held as-is or as a deflated JSON document.
#[derive(Debug, Clone)]
pub enum StoredValue<T> {
    Raw(T),
    Compressed(Arc<[u8]>),
}

impl<T> StoredValue<T> {
    #[inline]
    pub fn is_compressed(&self) -> bool {
        matches!(self, StoredValue::Compressed(_))
    }
}

/// One cache slot plus the bookkeeping eviction relies on.
///
/// Timestamps are Unix milliseconds. `expires_at > created_at` holds for every entry the
/// cache admits.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: StoredValue<T>,
    pub created_at: i64,
    pub expires_at: i64,
    pub access_count: u64,
    pub last_accessed: i64,
    /// Completeness score in `[0, 1]`; low quality is evicted first.
    pub quality: f64,
    /// Estimated bytes charged against the cache capacity.
    pub size: usize,
    pub tags: BTreeSet<String>,
}

impl<T> CacheEntry<T> {
    #[inline]
    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms > self.expires_at
    }

    #[inline]
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn meta(&self) -> EntryMeta {
        EntryMeta {
            created_at: self.created_at,
            expires_at: self.expires_at,
            access_count: self.access_count,
            last_accessed: self.last_accessed,
            quality: self.quality,
            size: self.size,
            tags: self.tags.clone(),
            compressed: self.value.is_compressed(),
        }
    }
}

/// Read-only view of an entry's bookkeeping (no value).
#[derive(Debug, Clone, PartialEq)]
pub struct EntryMeta {
    pub created_at: i64,
    pub expires_at: i64,
    pub access_count: u64,
    pub last_accessed: i64,
    pub quality: f64,
    pub size: usize,
    pub tags: BTreeSet<String>,
    pub compressed: bool,
}
