//! Quality/TTL/tag-aware response cache.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Weak};
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use parking_lot::Mutex;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::codec;
use super::config::{CacheConfig, DEFAULT_QUALITY, SetOptions};
use super::entry::{CacheEntry, EntryMeta, StoredValue};
use super::error::{CacheError, CacheResult};
use super::persistence::{PersistedEntry, PersistedTable, PersistentKv};
use super::scoring::{eviction_score, retention_score};
use super::types::{CacheStats, OptimizeReport};
use crate::clock::{Clock, system_clock};

/// Request-tag prefix that forces a miss (and removal) for entries carrying the suffix tag.
pub const INVALIDATE_TAG_PREFIX: &str = "invalidate:";

/// Bounds every cached value type must satisfy.
pub trait Cacheable: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Cacheable for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

struct CacheState<T> {
    entries: HashMap<String, CacheEntry<T>>,
    current_size: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
    invalidations: u64,
    persist_flushes: u64,
    persist_failures: u64,
}

impl<T> CacheState<T> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            current_size: 0,
            hits: 0,
            misses: 0,
            evictions: 0,
            expirations: 0,
            invalidations: 0,
            persist_flushes: 0,
            persist_failures: 0,
        }
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry<T>> {
        let entry = self.entries.remove(key)?;
        self.current_size = self.current_size.saturating_sub(entry.size);
        Some(entry)
    }

    fn insert_entry(&mut self, key: String, entry: CacheEntry<T>) {
        self.current_size += entry.size;
        if let Some(old) = self.entries.insert(key, entry) {
            self.current_size = self.current_size.saturating_sub(old.size);
        }
    }

    /// Removes entries in descending eviction-score order until `target` bytes are freed.
    fn evict_for_space(&mut self, target: usize, now_ms: i64) -> (usize, usize) {
        let mut ranked: Vec<(String, f64)> = self
            .entries
            .iter()
            .map(|(k, e)| (k.clone(), eviction_score(e, now_ms)))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let mut removed = 0;
        let mut freed = 0;
        for (key, _) in ranked {
            if freed >= target {
                break;
            }
            if let Some(entry) = self.remove_entry(&key) {
                freed += entry.size;
                removed += 1;
            }
        }
        self.evictions += removed as u64;
        (removed, freed)
    }

    fn remove_where<F>(&mut self, mut pred: F) -> (usize, usize)
    where
        F: FnMut(&str, &CacheEntry<T>) -> bool,
    {
        let keys: Vec<String> = self
            .entries
            .iter()
            .filter(|(k, e)| pred(k, e))
            .map(|(k, _)| k.clone())
            .collect();
        let mut freed = 0;
        for key in &keys {
            if let Some(entry) = self.remove_entry(key) {
                freed += entry.size;
            }
        }
        (keys.len(), freed)
    }
}

struct Persistence {
    kv: Arc<dyn PersistentKv>,
    notify: Arc<Notify>,
    shutdown: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct CacheInner<T> {
    state: Mutex<CacheState<T>>,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    persistence: Option<Persistence>,
    flush_lock: tokio::sync::Mutex<()>,
}

/// Shared, cloneable handle to a response cache.
///
/// Every mutation runs under a single mutex so `current_size` and the entry count never
/// drift apart. Values are decoded outside the lock.
pub struct ResponseCache<T> {
    inner: Arc<CacheInner<T>>,
}

impl<T> Clone for ResponseCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for ResponseCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ResponseCache")
            .field("entries", &state.entries.len())
            .field("current_size", &state.current_size)
            .field("max_size", &self.inner.config.max_size_bytes)
            .field("persistent", &self.inner.persistence.is_some())
            .finish()
    }
}

impl<T: Cacheable> ResponseCache<T> {
    /// Creates an in-memory cache using the system clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, system_clock())
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(CacheState::new()),
                config,
                clock,
                persistence: None,
                flush_lock: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Creates a cache that mirrors its table into `kv`.
    ///
    /// Spawns the debounced flush task, so this must be called within a Tokio runtime.
    /// Call [`load_persisted`](Self::load_persisted) afterwards to restore a previous table.
    pub fn with_persistence(
        config: CacheConfig,
        kv: Arc<dyn PersistentKv>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let notify = Arc::new(Notify::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let debounce = config.persist_debounce;

        let inner = Arc::new(CacheInner {
            state: Mutex::new(CacheState::new()),
            config,
            clock,
            persistence: Some(Persistence {
                kv,
                notify: Arc::clone(&notify),
                shutdown: shutdown_tx,
                task: Mutex::new(None),
            }),
            flush_lock: tokio::sync::Mutex::new(()),
        });

        let handle = tokio::spawn(run_flusher(
            Arc::downgrade(&inner),
            notify,
            shutdown_rx,
            debounce,
        ));
        if let Some(p) = &inner.persistence {
            *p.task.lock() = Some(handle);
        }

        Self { inner }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Looks up `key`.
    ///
    /// Expired entries are removed and reported as a miss. A request tag of the form
    /// `invalidate:<T>` removes the entry (and misses) when the entry carries tag `T`.
    pub fn get<S: AsRef<str>>(&self, key: &str, tags: &[S]) -> Option<T> {
        let now = self.inner.clock.now_ms();

        enum Lookup<T> {
            Missing,
            Expired,
            Invalidated(String),
            Hit(StoredValue<T>),
        }

        let stored = {
            let mut state = self.inner.state.lock();
            let lookup = match state.entries.get_mut(key) {
                None => Lookup::Missing,
                Some(entry) if entry.is_expired(now) => Lookup::Expired,
                Some(entry) => match forced_invalidation(tags, &entry.tags) {
                    Some(tag) => Lookup::Invalidated(tag.to_string()),
                    None => {
                        entry.access_count += 1;
                        entry.last_accessed = now;
                        Lookup::Hit(entry.value.clone())
                    }
                },
            };

            match lookup {
                Lookup::Missing => {
                    state.misses += 1;
                    return None;
                }
                Lookup::Expired => {
                    state.remove_entry(key);
                    state.expirations += 1;
                    state.misses += 1;
                    drop(state);
                    debug!(key = key, "Cache entry expired");
                    self.schedule_flush();
                    return None;
                }
                Lookup::Invalidated(tag) => {
                    state.remove_entry(key);
                    state.invalidations += 1;
                    state.misses += 1;
                    drop(state);
                    debug!(key = key, tag = %tag, "Cache entry busted by request tag");
                    self.schedule_flush();
                    return None;
                }
                Lookup::Hit(stored) => {
                    state.hits += 1;
                    stored
                }
            }
        };

        match codec::decode(&stored) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = key, error = %e, "Failed to decode cache entry, dropping it");
                let mut state = self.inner.state.lock();
                state.remove_entry(key);
                state.hits = state.hits.saturating_sub(1);
                state.misses += 1;
                drop(state);
                self.schedule_flush();
                None
            }
        }
    }

    /// Inserts or replaces `key`. Returns `false` when the value was not admitted
    /// (zero TTL, or larger than the whole cache).
    pub fn set(&self, key: &str, value: T, options: SetOptions) -> bool {
        let ttl = options.ttl.unwrap_or(self.inner.config.default_ttl);
        let ttl_ms = ttl.as_millis().min(i64::MAX as u128) as i64;
        if ttl_ms <= 0 {
            warn!(key = key, "Refusing cache entry with zero TTL");
            return false;
        }

        let quality = if options.quality.is_finite() {
            options.quality.clamp(0.0, 1.0)
        } else {
            DEFAULT_QUALITY
        };

        let (stored, size) = codec::encode(value, self.inner.config.compression_threshold);
        let max_size = self.inner.config.max_size_bytes;
        if size > max_size {
            warn!(
                key = key,
                size = size,
                max_size = max_size,
                "Cache entry larger than capacity, not stored"
            );
            return false;
        }

        let now = self.inner.clock.now_ms();
        let entry = CacheEntry {
            value: stored,
            created_at: now,
            expires_at: now.saturating_add(ttl_ms),
            access_count: 0,
            last_accessed: now,
            quality,
            size,
            tags: options.tags.into_iter().collect::<BTreeSet<_>>(),
        };

        {
            let mut state = self.inner.state.lock();
            state.remove_entry(key);

            let available = max_size.saturating_sub(state.current_size);
            if available < size {
                let shortfall = size - available;
                let target = (shortfall as f64 * options.priority.multiplier()).ceil() as usize;
                let (removed, freed) = state.evict_for_space(target, now);
                debug!(
                    removed = removed,
                    freed = freed,
                    target = target,
                    "Evicted entries to admit new value"
                );
            }

            state.insert_entry(key.to_string(), entry);
        }

        self.schedule_flush();
        true
    }

    /// Removes a single key. Returns whether it was present.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.inner.state.lock().remove_entry(key).is_some();
        if removed {
            self.schedule_flush();
        }
        removed
    }

    /// Removes every entry carrying at least one of `tags`.
    #[instrument(skip(self, tags), fields(tag_count = tags.len()))]
    pub fn invalidate_by_tags<S: AsRef<str>>(&self, tags: &[S]) -> usize {
        if tags.is_empty() {
            return 0;
        }
        let (removed, _) = {
            let mut state = self.inner.state.lock();
            let result = state.remove_where(|_, e| tags.iter().any(|t| e.has_tag(t.as_ref())));
            state.invalidations += result.0 as u64;
            result
        };
        if removed > 0 {
            info!(removed = removed, "Invalidated cache entries by tag");
            self.schedule_flush();
        }
        removed
    }

    /// Removes every entry whose key contains `pattern`, or all entries when `None`.
    #[instrument(skip(self))]
    pub fn clear(&self, pattern: Option<&str>) -> usize {
        let (removed, _) = self
            .inner
            .state
            .lock()
            .remove_where(|k, _| pattern.is_none_or(|p| k.contains(p)));
        if removed > 0 {
            info!(removed = removed, "Cleared cache entries");
            self.schedule_flush();
        }
        removed
    }

    /// Drops expired entries, then, if usage exceeds the optimize threshold, removes the
    /// lowest-retention fraction of what remains.
    #[instrument(skip(self))]
    pub fn optimize(&self) -> OptimizeReport {
        let now = self.inner.clock.now_ms();
        let config = &self.inner.config;

        let report = {
            let mut state = self.inner.state.lock();
            let (expired, mut freed) = state.remove_where(|_, e| e.is_expired(now));
            state.expirations += expired as u64;
            let mut removed = expired;

            let threshold = config.max_size_bytes as f64 * config.optimize_threshold;
            if state.current_size as f64 > threshold && !state.entries.is_empty() {
                let count =
                    (state.entries.len() as f64 * config.optimize_fraction).ceil() as usize;
                let mut ranked: Vec<(String, f64)> = state
                    .entries
                    .iter()
                    .map(|(k, e)| (k.clone(), retention_score(e, now)))
                    .collect();
                ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

                for (key, _) in ranked.into_iter().take(count) {
                    if let Some(entry) = state.remove_entry(&key) {
                        freed += entry.size;
                        removed += 1;
                        state.evictions += 1;
                    }
                }
            }

            OptimizeReport {
                removed,
                freed,
                expired,
            }
        };

        if report.removed > 0 {
            info!(
                removed = report.removed,
                freed = report.freed,
                expired = report.expired,
                "Cache optimized"
            );
            self.schedule_flush();
        }
        report
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.inner.state.lock();
        let max_size = self.inner.config.max_size_bytes;
        let lookups = state.hits + state.misses;
        CacheStats {
            entry_count: state.entries.len(),
            current_size: state.current_size,
            max_size,
            utilization: if max_size == 0 {
                0.0
            } else {
                state.current_size as f64 / max_size as f64
            },
            hits: state.hits,
            misses: state.misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                state.hits as f64 / lookups as f64
            },
            evictions: state.evictions,
            expirations: state.expirations,
            invalidations: state.invalidations,
            compressed_entries: state
                .entries
                .values()
                .filter(|e| e.value.is_compressed())
                .count(),
            persist_flushes: state.persist_flushes,
            persist_failures: state.persist_failures,
        }
    }

    /// Entry bookkeeping without counting as an access.
    pub fn entry_meta(&self, key: &str) -> Option<EntryMeta> {
        self.inner.state.lock().entries.get(key).map(|e| e.meta())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.state.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().entries.is_empty()
    }

    pub fn is_persistent(&self) -> bool {
        self.inner.persistence.is_some()
    }

    /// Writes the table immediately, bypassing the debounce.
    pub async fn flush_now(&self) -> CacheResult<()> {
        self.inner.flush().await
    }

    /// Restores a previously persisted table. Expired entries are discarded.
    pub async fn load_persisted(&self) -> CacheResult<usize> {
        let Some(persistence) = &self.inner.persistence else {
            return Ok(0);
        };
        let Some(raw) = persistence
            .kv
            .get_item(&self.inner.config.persist_key)
            .await?
        else {
            return Ok(0);
        };

        let table: PersistedTable =
            serde_json::from_str(&raw).map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        let now = self.inner.clock.now_ms();
        let max_size = self.inner.config.max_size_bytes;
        let mut restored = 0usize;
        let mut discarded = 0usize;

        let mut state = self.inner.state.lock();
        for (key, persisted) in table {
            if now > persisted.expires_at || persisted.expires_at <= persisted.created_at {
                discarded += 1;
                continue;
            }

            let value = match restore_value::<T>(&persisted) {
                Ok(v) => v,
                Err(e) => {
                    warn!(key = %key, error = %e, "Skipping unreadable persisted entry");
                    discarded += 1;
                    continue;
                }
            };

            if state.current_size + persisted.size > max_size {
                discarded += 1;
                continue;
            }

            state.remove_entry(&key);
            state.insert_entry(
                key,
                CacheEntry {
                    value,
                    created_at: persisted.created_at,
                    expires_at: persisted.expires_at,
                    access_count: persisted.access_count,
                    last_accessed: persisted.last_accessed,
                    quality: persisted.quality.clamp(0.0, 1.0),
                    size: persisted.size,
                    tags: persisted.tags,
                },
            );
            restored += 1;
        }
        drop(state);

        info!(
            restored = restored,
            discarded = discarded,
            "Restored persisted cache table"
        );
        Ok(restored)
    }

    /// Stops the flush task and writes one final snapshot.
    pub async fn shutdown(&self) {
        let Some(persistence) = &self.inner.persistence else {
            return;
        };
        let _ = persistence.shutdown.send(true);
        let task = persistence.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        if let Err(e) = self.inner.flush().await {
            warn!(error = %e, "Final cache flush failed");
        }
    }

    fn schedule_flush(&self) {
        if let Some(persistence) = &self.inner.persistence {
            persistence.notify.notify_one();
        }
    }
}

impl<T: Cacheable> CacheInner<T> {
    fn snapshot_json(&self) -> CacheResult<String> {
        let table: PersistedTable = {
            let state = self.state.lock();
            state
                .entries
                .iter()
                .filter_map(|(key, entry)| {
                    let (data, compressed) = match &entry.value {
                        StoredValue::Raw(v) => match serde_json::to_value(v) {
                            Ok(data) => (data, false),
                            Err(e) => {
                                warn!(key = %key, error = %e, "Skipping unserializable entry");
                                return None;
                            }
                        },
                        StoredValue::Compressed(bytes) => {
                            (serde_json::Value::String(BASE64.encode(bytes)), true)
                        }
                    };
                    Some((
                        key.clone(),
                        PersistedEntry {
                            data,
                            compressed,
                            created_at: entry.created_at,
                            expires_at: entry.expires_at,
                            access_count: entry.access_count,
                            last_accessed: entry.last_accessed,
                            quality: entry.quality,
                            size: entry.size,
                            tags: entry.tags.clone(),
                        },
                    ))
                })
                .collect()
        };

        serde_json::to_string(&table).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })
    }

    async fn flush(&self) -> CacheResult<()> {
        let Some(persistence) = &self.persistence else {
            return Ok(());
        };
        let _guard = self.flush_lock.lock().await;

        let result = match self.snapshot_json() {
            Ok(json) => persistence.kv.set_item(&self.config.persist_key, json).await,
            Err(e) => Err(e),
        };

        let mut state = self.state.lock();
        match result {
            Ok(()) => {
                state.persist_flushes += 1;
                debug!(entries = state.entries.len(), "Cache table persisted");
                Ok(())
            }
            Err(e) => {
                state.persist_failures += 1;
                warn!(error = %e, "Cache persistence failed, in-memory state unaffected");
                Err(e)
            }
        }
    }
}

async fn run_flusher<T: Cacheable>(
    inner: Weak<CacheInner<T>>,
    notify: Arc<Notify>,
    mut shutdown: watch::Receiver<bool>,
    debounce: Duration,
) {
    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            _ = notify.notified() => {}
        }

        // Quiet period: every new mutation restarts the wait.
        loop {
            tokio::select! {
                _ = shutdown.changed() => return,
                _ = notify.notified() => continue,
                _ = tokio::time::sleep(debounce) => break,
            }
        }

        let Some(inner) = inner.upgrade() else {
            return;
        };
        let _ = inner.flush().await;
    }
}

fn forced_invalidation<'a, S: AsRef<str>>(
    request_tags: &'a [S],
    entry_tags: &BTreeSet<String>,
) -> Option<&'a str> {
    request_tags
        .iter()
        .filter_map(|t| t.as_ref().strip_prefix(INVALIDATE_TAG_PREFIX))
        .find(|t| entry_tags.contains(*t))
}

fn restore_value<T: Cacheable>(persisted: &PersistedEntry) -> CacheResult<StoredValue<T>> {
    if persisted.compressed {
        let encoded = persisted
            .data
            .as_str()
            .ok_or_else(|| CacheError::Serialization {
                reason: "compressed entry data is not a string".to_string(),
            })?;
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;
        Ok(StoredValue::Compressed(Arc::from(bytes)))
    } else {
        serde_json::from_value::<T>(persisted.data.clone())
            .map(StoredValue::Raw)
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })
    }
}
