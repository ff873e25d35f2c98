//! Quality-weighted response cache.
//!
//! Entries carry a TTL, a quality score and a tag set. Space is reclaimed by evicting the
//! entries with the highest `idle_time / quality` ratio first; `optimize()` additionally
//! trims the lowest-retention fraction once usage crosses a threshold. An optional
//! [`PersistentKv`] receives a debounced JSON snapshot of the whole table.

pub mod codec;
pub mod config;
pub mod entry;
pub mod error;
pub mod persistence;
pub mod response;
pub mod scoring;
pub mod types;


pub use config::{
    CacheConfig, DEFAULT_COMPRESSION_THRESHOLD, DEFAULT_MAX_SIZE_BYTES, DEFAULT_PERSIST_DEBOUNCE,
    DEFAULT_PERSIST_KEY, DEFAULT_QUALITY, DEFAULT_TTL, EvictionPriority, SetOptions,
};
pub use entry::{CacheEntry, EntryMeta, StoredValue};
pub use error::{CacheError, CacheResult};
pub use persistence::{FileKv, MemoryKv, PersistedEntry, PersistedTable, PersistentKv};
pub use response::{Cacheable, INVALIDATE_TAG_PREFIX, ResponseCache};
pub use scoring::{eviction_score, retention_score};
pub use types::{CacheStats, OptimizeReport};
